//! Danmaku Core Library
//!
//! This library provides the comment records, the time-ordered comment track
//! and the lane placement engine that turns a playback position into overlay
//! markup for horizontally scrolling comments.

pub mod color;
pub mod comment;
pub mod overlay;
pub mod placement;
pub mod track;

pub use color::Rgb;
pub use comment::Comment;
pub use placement::{FrameParams, LaneLayout, Viewport, DURATION};
pub use track::CommentTrack;

/// Result type for danmaku-core operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for danmaku-core operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Malformed comment record: invalid {field} {value:?}")]
    MalformedRecord {
        /// Name of the offending field
        field: &'static str,
        /// Raw text of the offending field
        value: String,
    },
}
