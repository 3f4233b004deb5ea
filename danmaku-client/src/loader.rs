//! Comment loading
//!
//! Raw entries are parsed one by one. A malformed entry is logged and
//! skipped so a single bad record does not discard the rest of the track;
//! only transport and decoding failures fail the load.

use crate::api::DanmakuApi;
use crate::{checkpoint, Result};
use danmaku_core::{Comment, CommentTrack};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Fetches and parses the comments of an episode into a sorted track
pub async fn load(
    token: &CancellationToken,
    api: &dyn DanmakuApi,
    episode_id: u64,
) -> Result<CommentTrack> {
    let response = checkpoint(token, api.comments(episode_id)).await?;

    let mut comments = Vec::with_capacity(response.comments.len());
    let mut skipped = 0usize;
    for raw in &response.comments {
        match Comment::parse(&raw.p, &raw.m) {
            Ok(comment) => comments.push(comment),
            Err(e) => {
                skipped += 1;
                warn!(episode_id, cid = raw.cid, error = %e, "skipping comment");
            }
        }
    }

    let track = CommentTrack::from_unsorted(comments);
    info!(
        episode_id,
        reported = response.count,
        loaded = track.len(),
        skipped,
        "loaded comments"
    );
    Ok(track)
}
