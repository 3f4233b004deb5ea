//! Danmaku mpv plugin
//!
//! Built as a C plugin (`cplugins`) loaded by mpv. mpv calls
//! [`mpv_open_cplugin`] on a dedicated thread; the plugin runs the
//! [`Controller`] event loop there until the player shuts down, while comment
//! fetches run on a small tokio runtime owned by the plugin.

mod host;
mod mpv_bindings;

use danmaku_client::DandanplayClient;
use danmaku_player::host::props;
use danmaku_player::{Controller, DanmakuOptions};
use host::MpvHost;
use libc::c_int;
use mpv_bindings::{mpv_handle, MpvApi};
use std::panic::{self, AssertUnwindSafe};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, info_span};
use tracing_subscriber::EnvFilter;

/// How long shutdown waits for in-flight fetch tasks to stop
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(1);

/// Result type for plugin startup
type Result<T> = std::result::Result<T, Error>;

/// Errors that prevent the plugin from starting
#[derive(Debug, thiserror::Error)]
enum Error {
    #[error("mpv did not provide {0}")]
    MissingSymbol(&'static str),

    #[error("Player error: {0}")]
    Player(#[from] danmaku_player::Error),

    #[error("Client error: {0}")]
    Client(#[from] danmaku_client::Error),

    #[error("Failed to start runtime: {0}")]
    Runtime(#[from] std::io::Error),
}

/// Plugin entry point called by mpv
///
/// Returns 0 after a clean shutdown and -1 if the plugin failed to start.
///
/// # Safety
///
/// Must only be called by mpv with a valid client handle.
#[no_mangle]
pub unsafe extern "C" fn mpv_open_cplugin(handle: *mut mpv_handle) -> c_int {
    if handle.is_null() {
        return -1;
    }
    let result = panic::catch_unwind(AssertUnwindSafe(|| unsafe { run(handle) }));
    match result {
        Ok(Ok(())) => 0,
        Ok(Err(e)) => {
            error!("danmaku plugin failed: {e}");
            -1
        }
        Err(_) => {
            eprintln!("danmaku plugin panicked");
            -1
        }
    }
}

unsafe fn run(handle: *mut mpv_handle) -> Result<()> {
    let api = MpvApi::load().map_err(Error::MissingSymbol)?;
    let host = unsafe { MpvHost::new(handle, api) };
    let client_name = host.client_name();

    init_logging();
    let span = info_span!("plugin", client = %client_name);
    let _guard = span.enter();

    let options = load_options(&host, &client_name)?;
    host.observe(props::PAUSE)?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(1)
        .thread_name("danmaku-fetch")
        .enable_all()
        .build()?;
    let api = Arc::new(DandanplayClient::new(&options.client_config())?);

    info!("danmaku plugin started");
    Controller::new(host, api, runtime.handle().clone(), options).run();

    stop_runtime(runtime);
    Ok(())
}

/// Stops the fetch runtime, letting worker polls that are already running
/// finish first. They may still wake the client handle, which mpv frees
/// once the plugin returns.
fn stop_runtime(runtime: tokio::runtime::Runtime) {
    runtime.shutdown_timeout(SHUTDOWN_TIMEOUT);
}

fn load_options(host: &MpvHost, client_name: &str) -> Result<DanmakuOptions> {
    let path = host.expand_path(&format!("~~/script-opts/{client_name}.conf"))?;
    let path = PathBuf::from(path);
    let options = DanmakuOptions::load(&path)?;
    info!(path = %path.display(), ?options, "options loaded");
    Ok(options)
}

/// Logs to stderr, filtered by `RUST_LOG` (default `info`)
fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    // mpv may load the plugin more than once per process.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::mpsc;

    #[test]
    fn test_stop_runtime_waits_for_running_poll() {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(1)
            .build()
            .unwrap();
        let woke = Arc::new(AtomicBool::new(false));
        let (started_tx, started_rx) = mpsc::channel();

        let flag = Arc::clone(&woke);
        runtime.spawn(async move {
            started_tx.send(()).unwrap();
            std::thread::sleep(Duration::from_millis(100));
            flag.store(true, Ordering::SeqCst);
        });
        started_rx.recv().unwrap();

        stop_runtime(runtime);
        assert!(woke.load(Ordering::SeqCst));
    }
}
