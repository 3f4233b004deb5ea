//! Danmaku Client Library
//!
//! This library matches local media files against a remote comment service
//! and loads their comments into a [`CommentTrack`].

pub mod api;
pub mod fingerprint;
pub mod identify;
pub mod loader;

pub use api::{DandanplayClient, DanmakuApi};
pub use identify::identify;
pub use loader::load;

use danmaku_core::CommentTrack;
use std::future::Future;
use std::path::Path;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Result type for danmaku-client operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for danmaku-client operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Request failed: {0}")]
    Fetch(#[from] reqwest::Error),

    #[error("Unexpected response status: {0}")]
    Status(reqwest::StatusCode),

    #[error("Invalid response body: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("No file name in path: {0}")]
    InvalidPath(String),

    #[error("no matching episode")]
    NoMatch,

    #[error("multiple matching episodes ({0})")]
    AmbiguousMatch(usize),

    #[error("Cancelled")]
    Cancelled,
}

impl Error {
    /// Returns true if the operation stopped because its token was cancelled
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Error::Cancelled)
    }
}

/// Client configuration
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base URL of the comment service API
    pub base_url: String,
    /// Per-request timeout
    pub timeout: Duration,
    /// User agent sent with every request
    pub user_agent: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.dandanplay.net/api/v2".to_string(),
            timeout: Duration::from_secs(30),
            user_agent: concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

/// Matches `path` and loads its comments as one cancellable pipeline
pub async fn fetch_danmaku(
    token: &CancellationToken,
    api: &dyn DanmakuApi,
    path: &Path,
) -> Result<CommentTrack> {
    let episode_id = identify(token, api, path).await?;
    load(token, api, episode_id).await
}

/// Runs `future` unless `token` is cancelled first
pub(crate) async fn checkpoint<T>(
    token: &CancellationToken,
    future: impl Future<Output = Result<T>>,
) -> Result<T> {
    tokio::select! {
        biased;
        _ = token.cancelled() => Err(Error::Cancelled),
        result = future => result,
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeApi;
    use std::io::Write;

    #[tokio::test]
    async fn test_fetch_pipeline() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"media").unwrap();

        let api = FakeApi::matching(
            &[42],
            serde_json::json!({
                "count": 2,
                "comments": [
                    { "cid": 1, "p": "3.5,1,255,u", "m": "later" },
                    { "cid": 2, "p": "1.0,1,16777215,u", "m": "earlier" },
                ],
            }),
        );

        let track = fetch_danmaku(&CancellationToken::new(), &api, file.path())
            .await
            .unwrap();
        assert_eq!(track.len(), 2);
        assert_eq!(track.get(0).unwrap().message, "earlier");
    }

    #[tokio::test]
    async fn test_cancelled_pipeline_stops() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"media").unwrap();
        let api = FakeApi::matching(&[1], serde_json::json!({ "count": 0, "comments": [] }));

        let token = CancellationToken::new();
        token.cancel();
        let err = fetch_danmaku(&token, &api, file.path()).await.unwrap_err();
        assert!(err.is_cancelled());
        assert!(api.requests.lock().unwrap().is_empty());
    }
}
