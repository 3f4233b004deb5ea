//! Media identification against the comment service

use crate::api::{DanmakuApi, MatchRequest, MatchResponse};
use crate::fingerprint::fingerprint;
use crate::{checkpoint, Error, Result};
use std::path::Path;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Resolves a local media file to the episode it belongs to.
///
/// Only an unambiguous single match is accepted; several candidates are
/// reported as [`Error::AmbiguousMatch`] rather than guessed between.
pub async fn identify(
    token: &CancellationToken,
    api: &dyn DanmakuApi,
    path: &Path,
) -> Result<u64> {
    let file_name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .ok_or_else(|| Error::InvalidPath(path.display().to_string()))?;

    let file_hash = checkpoint(token, fingerprint(path)).await?;
    debug!(file = %file_name, hash = %file_hash, "computed fingerprint");

    let request = MatchRequest {
        file_name,
        file_hash,
    };
    let response = checkpoint(token, api.match_file(&request)).await?;
    let episode_id = select_episode(&response)?;
    info!(file = %request.file_name, episode_id, "matched episode");
    Ok(episode_id)
}

fn select_episode(response: &MatchResponse) -> Result<u64> {
    match response.matches.as_slice() {
        [] => Err(Error::NoMatch),
        [only] if response.is_matched => Ok(only.episode_id),
        [_] => Err(Error::NoMatch),
        many => Err(Error::AmbiguousMatch(many.len())),
    }
}
