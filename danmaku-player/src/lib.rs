//! Danmaku Player Library
//!
//! This library drives danmaku overlays inside a host media player: it reacts
//! to player events, runs comment fetches in the background and renders the
//! placed comments on every tick while playback runs.

pub mod controller;
pub mod host;
pub mod options;

pub use controller::{Controller, Flow, State};
pub use host::{HostEvent, PlayerHost, Wakeup};
pub use options::DanmakuOptions;

/// Result type for danmaku-player operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for danmaku-player operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Host error: {0}")]
    Host(String),

    #[error("Property unavailable: {0}")]
    PropertyUnavailable(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
