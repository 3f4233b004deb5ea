//! Playback controller
//!
//! Owns the enabled flag and the current comment track, reacts to host
//! events and renders a placement tick while playback runs. Fetches run on
//! the tokio runtime; each one carries a generation number and a
//! cancellation token, and its finished track is handed back over a channel
//! as a single value. Only the result of the newest generation is applied.

use crate::host::{props, HostEvent, PlayerHost};
use crate::{DanmakuOptions, Result};
use danmaku_client::{fetch_danmaku, DanmakuApi};
use danmaku_core::{CommentTrack, FrameParams, Viewport};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Wake interval while comments are rendering
pub const TICK_INTERVAL: Duration = Duration::from_millis(5);

/// Client message that toggles the overlay
pub const TOGGLE_MESSAGE: &str = "toggle-danmaku";

type FetchOutcome = (u64, danmaku_client::Result<CommentTrack>);

/// Visible state of the overlay
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    Disabled,
    /// Enabled while comments are being fetched or after a failed fetch
    Unavailable,
    /// Enabled with comments ready
    Available,
}

/// Whether the event loop keeps running
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Shutdown,
}

#[derive(Debug)]
struct Fetch {
    generation: u64,
    token: CancellationToken,
}

/// Event loop state for one player client
pub struct Controller<H: PlayerHost> {
    host: H,
    api: Arc<dyn DanmakuApi>,
    runtime: Handle,
    options: DanmakuOptions,
    enabled: bool,
    track: Option<CommentTrack>,
    fetch: Option<Fetch>,
    generation: u64,
    outcome_tx: UnboundedSender<FetchOutcome>,
    outcome_rx: UnboundedReceiver<FetchOutcome>,
    needs_redraw: bool,
}

impl<H: PlayerHost> Controller<H> {
    /// Creates a disabled controller; fetches are spawned on `runtime`
    pub fn new(
        host: H,
        api: Arc<dyn DanmakuApi>,
        runtime: Handle,
        options: DanmakuOptions,
    ) -> Self {
        let (outcome_tx, outcome_rx) = mpsc::unbounded_channel();
        Self {
            host,
            api,
            runtime,
            options,
            enabled: false,
            track: None,
            fetch: None,
            generation: 0,
            outcome_tx,
            outcome_rx,
            needs_redraw: false,
        }
    }

    /// Current overlay state
    pub fn state(&self) -> State {
        match (self.enabled, &self.track) {
            (false, _) => State::Disabled,
            (true, None) => State::Unavailable,
            (true, Some(_)) => State::Available,
        }
    }

    /// Runs the event loop until the host shuts down
    pub fn run(mut self) {
        loop {
            let timeout = (self.enabled && self.is_playing()).then_some(TICK_INTERVAL);
            let event = self.host.wait_event(timeout);
            if self.step(event) == Flow::Shutdown {
                info!("shutting down");
                return;
            }
        }
    }

    /// Processes one event, applies finished fetches and renders a frame if
    /// the overlay is live
    pub fn step(&mut self, event: HostEvent) -> Flow {
        if self.handle_event(event) == Flow::Shutdown {
            return Flow::Shutdown;
        }
        self.collect_fetches();

        if self.enabled && self.track.is_some() {
            let redraw = std::mem::take(&mut self.needs_redraw);
            if self.is_playing() || redraw {
                self.render();
            }
        }
        Flow::Continue
    }

    fn handle_event(&mut self, event: HostEvent) -> Flow {
        match event {
            HostEvent::Shutdown => {
                self.cancel_fetch();
                return Flow::Shutdown;
            }
            HostEvent::FileLoaded => {
                self.cancel_fetch();
                self.track = None;
                self.report(self.host.remove_overlay());
                if self.enabled {
                    self.start_fetch();
                }
            }
            HostEvent::Seek => {
                if let (true, Some(track)) = (self.enabled, &mut self.track) {
                    track.reset();
                    self.needs_redraw = true;
                }
            }
            HostEvent::ClientMessage(args) => {
                if args.first().map(String::as_str) == Some(TOGGLE_MESSAGE) {
                    self.toggle();
                }
            }
            HostEvent::PropertyChange(name) => debug!(%name, "property changed"),
            HostEvent::Idle => {}
        }
        Flow::Continue
    }

    fn toggle(&mut self) {
        if self.enabled {
            self.enabled = false;
            self.report(self.host.remove_overlay());
            self.report(self.host.show_text("Danmaku: off"));
            return;
        }

        self.enabled = true;
        match &mut self.track {
            Some(track) => {
                track.reset();
                let count = track.len();
                self.needs_redraw = true;
                self.show_loaded(count);
            }
            None => {
                self.report(self.host.show_text("Danmaku: on"));
                self.start_fetch();
            }
        }
    }

    fn start_fetch(&mut self) {
        self.cancel_fetch();

        let path = match self.host.string(props::PATH) {
            Ok(path) => PathBuf::from(path),
            Err(e) => {
                warn!(error = %e, "no file to fetch comments for");
                return;
            }
        };

        self.generation += 1;
        let generation = self.generation;
        let token = CancellationToken::new();
        self.fetch = Some(Fetch {
            generation,
            token: token.clone(),
        });

        info!(generation, path = %path.display(), "fetching comments");
        let api = Arc::clone(&self.api);
        let outcomes = self.outcome_tx.clone();
        let waker = self.host.waker();
        self.runtime.spawn(async move {
            let result = fetch_danmaku(&token, api.as_ref(), &path).await;
            if token.is_cancelled() {
                debug!(generation, "fetch cancelled");
                return;
            }
            if outcomes.send((generation, result)).is_ok() {
                waker.wake();
            }
        });
    }

    fn cancel_fetch(&mut self) {
        if let Some(fetch) = self.fetch.take() {
            debug!(generation = fetch.generation, "cancelling fetch");
            fetch.token.cancel();
        }
    }

    fn collect_fetches(&mut self) {
        while let Ok((generation, result)) = self.outcome_rx.try_recv() {
            if self.fetch.as_ref().map(|f| f.generation) != Some(generation) {
                debug!(generation, "discarding superseded fetch");
                continue;
            }
            self.fetch = None;

            match result {
                Ok(track) => {
                    let count = track.len();
                    self.track = Some(track);
                    if self.enabled {
                        self.needs_redraw = true;
                        self.show_loaded(count);
                    }
                }
                Err(e) if e.is_cancelled() => {}
                Err(e) => {
                    error!(generation, error = %e, "failed to fetch comments");
                    if self.enabled {
                        self.report(self.host.show_text(&format!("Danmaku: {e}")));
                    }
                }
            }
        }
    }

    fn render(&mut self) {
        let frame = match self.frame_params() {
            Ok(frame) => frame,
            Err(e) => {
                debug!(error = %e, "skipping frame");
                return;
            }
        };
        let Some(track) = self.track.as_mut() else {
            return;
        };

        let markup = track.tick(&frame);
        let result = self.host.set_overlay(
            &markup,
            frame.viewport.width as i64,
            frame.viewport.height as i64,
        );
        self.report(result);
    }

    fn frame_params(&self) -> Result<FrameParams> {
        let width = self.positive(props::OSD_WIDTH)?;
        let height = self.positive(props::OSD_HEIGHT)?;
        let font_size = match self.options.font_size {
            Some(size) => size,
            None => self.positive(props::OSD_FONT_SIZE)?,
        };

        Ok(FrameParams {
            viewport: Viewport::new(width, height),
            position: self.host.double(props::TIME_POS)?,
            font_size,
            speed: self.host.double(props::SPEED)?,
            elapsed: TICK_INTERVAL.as_secs_f64(),
        })
    }

    fn positive(&self, name: &str) -> Result<f64> {
        let value = self.host.double(name)?;
        if value > 0.0 {
            Ok(value)
        } else {
            Err(crate::Error::PropertyUnavailable(name.to_string()))
        }
    }

    fn is_playing(&self) -> bool {
        matches!(self.host.flag(props::PAUSE), Ok(false))
    }

    fn show_loaded(&self, count: usize) {
        let plural = if count == 1 { "" } else { "s" };
        self.report(
            self.host
                .show_text(&format!("Loaded {count} danmaku comment{plural}")),
        );
    }

    fn report(&self, result: Result<()>) {
        if let Err(e) = result {
            warn!(error = %e, "host command failed");
        }
    }
}

impl<H: PlayerHost> Drop for Controller<H> {
    fn drop(&mut self) {
        self.cancel_fetch();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::Wakeup;
    use async_trait::async_trait;
    use danmaku_client::api::{
        CommentResponse, EpisodeMatch, MatchRequest, MatchResponse, RawComment,
    };
    use std::cell::RefCell;
    use std::collections::HashMap;
    use std::io::Write;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Instant;
    use tokio::sync::Notify;

    #[derive(Default)]
    struct CountingWaker(AtomicUsize);

    impl Wakeup for CountingWaker {
        fn wake(&self) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    struct FakeHost {
        doubles: HashMap<&'static str, f64>,
        paused: bool,
        path: String,
        texts: RefCell<Vec<String>>,
        overlays: RefCell<Vec<String>>,
        removed: RefCell<usize>,
        waker: Arc<CountingWaker>,
    }

    impl FakeHost {
        fn new(path: &std::path::Path) -> Self {
            let doubles = HashMap::from([
                (props::OSD_WIDTH, 1280.0),
                (props::OSD_HEIGHT, 720.0),
                (props::OSD_FONT_SIZE, 55.0),
                (props::TIME_POS, 0.0),
                (props::SPEED, 1.0),
            ]);
            Self {
                doubles,
                paused: false,
                path: path.display().to_string(),
                texts: RefCell::new(Vec::new()),
                overlays: RefCell::new(Vec::new()),
                removed: RefCell::new(0),
                waker: Arc::new(CountingWaker::default()),
            }
        }

        fn last_text(&self) -> Option<String> {
            self.texts.borrow().last().cloned()
        }
    }

    impl PlayerHost for FakeHost {
        fn wait_event(&mut self, _timeout: Option<Duration>) -> HostEvent {
            HostEvent::Shutdown
        }

        fn flag(&self, name: &str) -> Result<bool> {
            match name {
                props::PAUSE => Ok(self.paused),
                _ => Err(crate::Error::PropertyUnavailable(name.to_string())),
            }
        }

        fn double(&self, name: &str) -> Result<f64> {
            self.doubles
                .get(name)
                .copied()
                .ok_or_else(|| crate::Error::PropertyUnavailable(name.to_string()))
        }

        fn string(&self, name: &str) -> Result<String> {
            match name {
                props::PATH => Ok(self.path.clone()),
                _ => Err(crate::Error::PropertyUnavailable(name.to_string())),
            }
        }

        fn show_text(&self, text: &str) -> Result<()> {
            self.texts.borrow_mut().push(text.to_string());
            Ok(())
        }

        fn set_overlay(&self, markup: &str, _width: i64, _height: i64) -> Result<()> {
            self.overlays.borrow_mut().push(markup.to_string());
            Ok(())
        }

        fn remove_overlay(&self) -> Result<()> {
            *self.removed.borrow_mut() += 1;
            Ok(())
        }

        fn waker(&self) -> Arc<dyn Wakeup> {
            self.waker.clone()
        }
    }

    /// Comment service whose responses are chosen per call; calls listed in
    /// `blocked` wait until `release` is notified.
    struct FakeApi {
        episodes: Vec<u64>,
        tracks: Vec<Vec<&'static str>>,
        calls: AtomicUsize,
        blocked: Vec<usize>,
        release: Notify,
    }

    impl FakeApi {
        fn new(episodes: Vec<u64>, tracks: Vec<Vec<&'static str>>) -> Self {
            Self {
                episodes,
                tracks,
                calls: AtomicUsize::new(0),
                blocked: Vec::new(),
                release: Notify::new(),
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl DanmakuApi for FakeApi {
        async fn match_file(&self, _request: &MatchRequest) -> danmaku_client::Result<MatchResponse> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if self.blocked.contains(&call) {
                self.release.notified().await;
            }
            Ok(MatchResponse {
                is_matched: self.episodes.len() == 1,
                matches: self
                    .episodes
                    .iter()
                    .map(|&episode_id| EpisodeMatch { episode_id })
                    .collect(),
            })
        }

        async fn comments(&self, _episode_id: u64) -> danmaku_client::Result<CommentResponse> {
            let call = self.calls().saturating_sub(1).min(self.tracks.len() - 1);
            let comments = self.tracks[call]
                .iter()
                .enumerate()
                .map(|(i, m)| RawComment {
                    cid: i as u64,
                    p: format!("{}.0,1,16777215,user", i),
                    m: m.to_string(),
                })
                .collect::<Vec<_>>();
            Ok(CommentResponse {
                count: comments.len(),
                comments,
            })
        }
    }

    struct Fixture {
        runtime: tokio::runtime::Runtime,
        api: Arc<FakeApi>,
        _media: tempfile::NamedTempFile,
    }

    impl Fixture {
        fn new(api: FakeApi) -> (Self, Controller<FakeHost>) {
            let mut media = tempfile::Builder::new().suffix(".mkv").tempfile().unwrap();
            media.write_all(b"not really a video").unwrap();

            let runtime = tokio::runtime::Runtime::new().unwrap();
            let api = Arc::new(api);
            let controller = Controller::new(
                FakeHost::new(media.path()),
                api.clone(),
                runtime.handle().clone(),
                DanmakuOptions::default(),
            );
            (
                Self {
                    runtime,
                    api,
                    _media: media,
                },
                controller,
            )
        }
    }

    fn toggle() -> HostEvent {
        HostEvent::ClientMessage(vec![TOGGLE_MESSAGE.to_string()])
    }

    fn settle(controller: &mut Controller<FakeHost>) {
        let deadline = Instant::now() + Duration::from_secs(5);
        while controller.fetch.is_some() {
            assert!(Instant::now() < deadline, "fetch did not finish");
            std::thread::sleep(Duration::from_millis(1));
            controller.collect_fetches();
        }
    }

    #[test]
    fn test_enable_fetches_and_renders() {
        let (fixture, mut controller) =
            Fixture::new(FakeApi::new(vec![7], vec![vec!["one", "two"]]));
        assert_eq!(controller.state(), State::Disabled);

        controller.step(toggle());
        assert_eq!(controller.host.last_text().as_deref(), Some("Danmaku: on"));
        assert_eq!(controller.state(), State::Unavailable);

        settle(&mut controller);
        assert_eq!(controller.state(), State::Available);
        assert_eq!(
            controller.host.last_text().as_deref(),
            Some("Loaded 2 danmaku comments")
        );
        let deadline = Instant::now() + Duration::from_secs(5);
        while controller.host.waker.0.load(Ordering::SeqCst) == 0 {
            assert!(Instant::now() < deadline, "host was never woken");
            std::thread::sleep(Duration::from_millis(1));
        }

        controller.step(HostEvent::Idle);
        let overlays = controller.host.overlays.borrow();
        assert_eq!(overlays.len(), 1);
        let lines: Vec<_> = overlays[0].lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].ends_with("one"));
        assert!(lines[1].ends_with("two"));
        assert_eq!(fixture.api.calls(), 1);
    }

    #[test]
    fn test_reenable_uses_cached_track() {
        let (fixture, mut controller) =
            Fixture::new(FakeApi::new(vec![7], vec![vec!["only"]]));
        controller.step(toggle());
        settle(&mut controller);
        controller.step(HostEvent::Idle);

        controller.step(toggle());
        assert_eq!(controller.state(), State::Disabled);
        assert_eq!(controller.host.last_text().as_deref(), Some("Danmaku: off"));
        let removed = *controller.host.removed.borrow();
        assert!(removed >= 1);

        controller.handle_event(toggle());
        assert_eq!(controller.state(), State::Available);
        assert_eq!(
            controller.host.last_text().as_deref(),
            Some("Loaded 1 danmaku comment")
        );
        let track = controller.track.as_ref().unwrap();
        assert!(track.iter().all(|c| c.x.is_none() && c.lane.is_none()));
        assert!(controller.fetch.is_none());
        assert_eq!(fixture.api.calls(), 1);
    }

    #[test]
    fn test_seek_resets_positions_without_refetch() {
        let (fixture, mut controller) =
            Fixture::new(FakeApi::new(vec![7], vec![vec!["a", "b"]]));
        controller.step(toggle());
        settle(&mut controller);
        controller.step(HostEvent::Idle);
        assert!(controller.track.as_ref().unwrap().get(0).unwrap().is_placed());

        controller.handle_event(HostEvent::Seek);
        let track = controller.track.as_ref().unwrap();
        assert!(track.iter().all(|c| !c.is_placed()));
        assert!(controller.needs_redraw);
        assert_eq!(fixture.api.calls(), 1);
    }

    #[test]
    fn test_file_loaded_invalidates_and_refetches() {
        let (fixture, mut controller) =
            Fixture::new(FakeApi::new(vec![7], vec![vec!["old"], vec!["new", "newer"]]));
        controller.step(toggle());
        settle(&mut controller);

        controller.step(HostEvent::FileLoaded);
        assert_eq!(controller.state(), State::Unavailable);
        settle(&mut controller);
        assert_eq!(controller.track.as_ref().unwrap().len(), 2);
        assert_eq!(fixture.api.calls(), 2);
    }

    #[test]
    fn test_file_loaded_while_disabled_does_not_fetch() {
        let (fixture, mut controller) = Fixture::new(FakeApi::new(vec![7], vec![vec!["x"]]));
        controller.step(HostEvent::FileLoaded);
        assert!(controller.fetch.is_none());
        assert_eq!(*controller.host.removed.borrow(), 1);
        assert_eq!(fixture.api.calls(), 0);
    }

    #[test]
    fn test_superseded_fetch_is_discarded() {
        let mut api = FakeApi::new(vec![7], vec![vec!["stale"], vec!["fresh", "fresher"]]);
        api.blocked = vec![0];
        let (fixture, mut controller) = Fixture::new(api);

        controller.step(toggle());
        let first = controller.fetch.as_ref().unwrap().token.clone();
        let deadline = Instant::now() + Duration::from_secs(5);
        while fixture.api.calls() == 0 {
            assert!(Instant::now() < deadline, "first fetch never started");
            std::thread::sleep(Duration::from_millis(1));
        }

        controller.step(HostEvent::FileLoaded);
        assert!(first.is_cancelled());
        settle(&mut controller);

        fixture.api.release.notify_waiters();
        std::thread::sleep(Duration::from_millis(20));
        controller.collect_fetches();

        let track = controller.track.as_ref().unwrap();
        assert_eq!(track.len(), 2);
        assert_eq!(track.get(0).unwrap().message, "fresh");
    }

    #[test]
    fn test_failed_fetch_stays_unavailable() {
        let (fixture, mut controller) =
            Fixture::new(FakeApi::new(vec![1, 2], vec![vec!["x"]]));
        controller.step(toggle());
        settle(&mut controller);

        assert_eq!(controller.state(), State::Unavailable);
        assert_eq!(
            controller.host.last_text().as_deref(),
            Some("Danmaku: multiple matching episodes (2)")
        );
        assert!(controller.host.overlays.borrow().is_empty());
        assert_eq!(fixture.api.calls(), 1);
    }

    #[test]
    fn test_paused_renders_only_after_changes() {
        let (_fixture, mut controller) = Fixture::new(FakeApi::new(vec![7], vec![vec!["a"]]));
        controller.host.paused = true;
        controller.step(toggle());
        settle(&mut controller);

        controller.step(HostEvent::Idle);
        controller.step(HostEvent::Idle);
        assert_eq!(controller.host.overlays.borrow().len(), 1);

        controller.step(HostEvent::Seek);
        assert_eq!(controller.host.overlays.borrow().len(), 2);
    }

    #[test]
    fn test_font_size_option_overrides_host() {
        let (_fixture, mut controller) = Fixture::new(FakeApi::new(vec![7], vec![vec!["a"]]));
        controller.options.font_size = Some(40.0);
        controller.step(toggle());
        settle(&mut controller);
        controller.step(HostEvent::Idle);

        // 40 * 720 / 1440
        assert!(controller.host.overlays.borrow()[0].contains("\\fs20.0"));
    }

    #[test]
    fn test_invalid_viewport_skips_frame() {
        let (_fixture, mut controller) = Fixture::new(FakeApi::new(vec![7], vec![vec!["a"]]));
        controller.host.doubles.insert(props::OSD_WIDTH, 0.0);
        controller.step(toggle());
        settle(&mut controller);
        controller.step(HostEvent::Idle);

        assert!(controller.host.overlays.borrow().is_empty());
        assert!(!controller.track.as_ref().unwrap().get(0).unwrap().is_placed());
    }

    #[test]
    fn test_unrelated_messages_are_ignored() {
        let (_fixture, mut controller) = Fixture::new(FakeApi::new(vec![7], vec![vec!["a"]]));
        controller.step(HostEvent::ClientMessage(vec!["something-else".to_string()]));
        controller.step(HostEvent::ClientMessage(Vec::new()));
        assert_eq!(controller.state(), State::Disabled);
        assert!(controller.host.texts.borrow().is_empty());
    }

    #[test]
    fn test_shutdown_cancels_fetch() {
        let mut api = FakeApi::new(vec![7], vec![vec!["a"]]);
        api.blocked = vec![0];
        let (_fixture, mut controller) = Fixture::new(api);
        controller.step(toggle());
        let token = controller.fetch.as_ref().unwrap().token.clone();

        assert_eq!(controller.step(HostEvent::Shutdown), Flow::Shutdown);
        assert!(token.is_cancelled());
    }
}
