//! Host player boundary
//!
//! The controller only talks to the player through [`PlayerHost`]; binding
//! to a concrete player happens in an adapter crate.

use crate::Result;
use std::sync::Arc;
use std::time::Duration;

/// Player properties read by the controller
pub mod props {
    pub const PATH: &str = "path";
    pub const PAUSE: &str = "pause";
    pub const OSD_WIDTH: &str = "osd-width";
    pub const OSD_HEIGHT: &str = "osd-height";
    pub const OSD_FONT_SIZE: &str = "osd-font-size";
    pub const TIME_POS: &str = "time-pos";
    pub const SPEED: &str = "speed";
}

/// Events delivered by the host
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostEvent {
    /// The wait timed out or was interrupted by a [`Wakeup`]
    Idle,
    Shutdown,
    FileLoaded,
    Seek,
    PropertyChange(String),
    /// A message sent to this client, split into its arguments
    ClientMessage(Vec<String>),
}

/// Thread-safe handle that interrupts [`PlayerHost::wait_event`]
pub trait Wakeup: Send + Sync {
    fn wake(&self);
}

/// Query, command and event surface of the host player
pub trait PlayerHost {
    /// Blocks until the next event, or until `timeout` elapses when given
    fn wait_event(&mut self, timeout: Option<Duration>) -> HostEvent;

    fn flag(&self, name: &str) -> Result<bool>;

    fn double(&self, name: &str) -> Result<f64>;

    fn string(&self, name: &str) -> Result<String>;

    /// Shows a transient status message
    fn show_text(&self, text: &str) -> Result<()>;

    /// Replaces the overlay with `markup` laid out on a `width` x `height` canvas
    fn set_overlay(&self, markup: &str, width: i64, height: i64) -> Result<()>;

    fn remove_overlay(&self) -> Result<()>;

    /// Returns a handle other threads can use to wake the event wait
    fn waker(&self) -> Arc<dyn Wakeup>;
}
