//! Comment service API

use crate::{ClientConfig, Error, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tracing::debug;

/// Body of a file match request
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchRequest {
    /// Base name of the media file
    pub file_name: String,
    /// Hex MD5 of the first 16 MiB of the file
    pub file_hash: String,
}

/// Response to a file match request
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchResponse {
    pub is_matched: bool,
    #[serde(default)]
    pub matches: Vec<EpisodeMatch>,
}

/// One candidate episode for a matched file
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EpisodeMatch {
    pub episode_id: u64,
}

/// Comment list for an episode
#[derive(Debug, Clone, Deserialize)]
pub struct CommentResponse {
    #[serde(default)]
    pub count: usize,
    #[serde(default)]
    pub comments: Vec<RawComment>,
}

/// A comment as sent by the service
#[derive(Debug, Clone, Deserialize)]
pub struct RawComment {
    #[serde(default)]
    pub cid: u64,
    /// `time,mode,color,user` parameter string
    pub p: String,
    /// Message text
    pub m: String,
}

/// Remote service used to identify media and fetch its comments
#[async_trait]
pub trait DanmakuApi: Send + Sync {
    /// Looks up episodes matching a file fingerprint
    async fn match_file(&self, request: &MatchRequest) -> Result<MatchResponse>;

    /// Fetches every comment of an episode, related sources included
    async fn comments(&self, episode_id: u64) -> Result<CommentResponse>;
}

/// HTTP client for the dandanplay comment service
#[derive(Debug, Clone)]
pub struct DandanplayClient {
    http: Client,
    base_url: String,
}

impl DandanplayClient {
    /// Creates a client for the given configuration
    pub fn new(config: &ClientConfig) -> Result<Self> {
        let http = Client::builder()
            .timeout(config.timeout)
            .user_agent(config.user_agent.as_str())
            .build()?;

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    async fn decode<T: DeserializeOwned>(response: reqwest::Response) -> Result<T> {
        let status = response.status();
        if !status.is_success() {
            return Err(Error::Status(status));
        }
        let body = response.bytes().await?;
        Ok(serde_json::from_slice(&body)?)
    }
}

#[async_trait]
impl DanmakuApi for DandanplayClient {
    async fn match_file(&self, request: &MatchRequest) -> Result<MatchResponse> {
        let url = format!("{}/match", self.base_url);
        debug!(%url, file = %request.file_name, hash = %request.file_hash, "matching file");
        let response = self.http.post(&url).json(request).send().await?;
        Self::decode(response).await
    }

    async fn comments(&self, episode_id: u64) -> Result<CommentResponse> {
        let url = format!("{}/comment/{}", self.base_url, episode_id);
        debug!(%url, episode_id, "fetching comments");
        let response = self
            .http
            .get(&url)
            .query(&[("withRelated", "true")])
            .send()
            .await?;
        Self::decode(response).await
    }
}
