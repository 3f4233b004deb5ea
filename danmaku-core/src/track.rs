//! Time-ordered comment track

use crate::placement::{self, FrameParams};
use crate::Comment;

/// Complete set of comments for one media file, sorted by appearance time
#[derive(Debug, Clone, Default)]
pub struct CommentTrack {
    comments: Vec<Comment>,
}

impl CommentTrack {
    /// Builds a track, stable-sorting the comments by time so entries with
    /// equal times keep their original order
    pub fn from_unsorted(mut comments: Vec<Comment>) -> Self {
        comments.sort_by(|a, b| a.time.total_cmp(&b.time));
        Self { comments }
    }

    /// Number of comments in the track
    pub fn len(&self) -> usize {
        self.comments.len()
    }

    /// Returns true if the track holds no comments
    pub fn is_empty(&self) -> bool {
        self.comments.is_empty()
    }

    /// Gets a comment by index
    pub fn get(&self, index: usize) -> Option<&Comment> {
        self.comments.get(index)
    }

    /// Iterates the comments in time order
    pub fn iter(&self) -> impl Iterator<Item = &Comment> {
        self.comments.iter()
    }

    /// Clears the position and lane of every comment
    pub fn reset(&mut self) {
        self.comments.iter_mut().for_each(Comment::reset);
    }

    /// Runs one placement tick and returns the overlay markup for it
    pub fn tick(&mut self, frame: &FrameParams) -> String {
        placement::place(&mut self.comments, frame).join("\n")
    }
}
