//! Lane placement engine
//!
//! Every tick walks the time-ordered comments that are due, gives each new
//! comment a starting position and a lane, emits its overlay line and then
//! moves it left by the distance covered during one tick. Lanes are assigned
//! greedily: the first lane whose trailing edge is already left of the
//! comment, otherwise the least occupied lane.

use crate::{overlay, Comment};

/// Seconds a comment takes to cross the full viewport width
pub const DURATION: f64 = 12.0;

/// Overlay canvas size in pixels
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub width: f64,
    pub height: f64,
}

impl Viewport {
    /// Creates a viewport of the given size
    pub fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }

    /// Horizontal distance a comment travels per second at normal speed
    pub fn scroll_rate(&self) -> f64 {
        self.width / DURATION
    }
}

/// Vertical lane geometry derived from the host font size
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LaneLayout {
    /// Height of one lane, also used as the rendered font size
    pub lane_height: f64,
    /// Gap between two lanes
    pub spacing: f64,
    /// Number of lanes that fit in the viewport (at least one)
    pub lanes: usize,
}

impl LaneLayout {
    /// Computes the layout for a host font size (scaled against a 720 line
    /// reference) and a viewport height
    pub fn new(font_size: f64, viewport_height: f64) -> Self {
        let lane_height = font_size * viewport_height / 1440.0;
        let spacing = lane_height / 10.0;
        let pitch = lane_height + spacing;
        let lanes = if pitch > 0.0 {
            (viewport_height / pitch).floor() as usize
        } else {
            0
        };

        Self {
            lane_height,
            spacing,
            lanes: lanes.max(1),
        }
    }

    /// Top edge of a lane
    pub fn lane_y(&self, lane: usize) -> f64 {
        lane as f64 * (self.lane_height + self.spacing)
    }

    /// Horizontal room a comment occupies including the trailing gap
    pub fn extent(&self, comment: &Comment) -> f64 {
        comment.display_width as f64 * self.lane_height + self.spacing
    }
}

/// Inputs for a single placement tick
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameParams {
    pub viewport: Viewport,
    /// Current playback position in seconds
    pub position: f64,
    /// Host font size before viewport scaling
    pub font_size: f64,
    /// Playback speed multiplier
    pub speed: f64,
    /// Seconds the comments advance after this frame is drawn
    pub elapsed: f64,
}

/// Places every due comment and returns one overlay line per visible comment.
///
/// `comments` must be sorted by time; processing stops at the first comment
/// that is not due yet.
pub fn place(comments: &mut [Comment], frame: &FrameParams) -> Vec<String> {
    let layout = LaneLayout::new(frame.font_size, frame.viewport.height);
    let width = frame.viewport.width;
    let step = frame.viewport.scroll_rate() * frame.speed * frame.elapsed;

    // Rightmost edge reached by any comment in each lane during this tick.
    // Lanes past the number of due comments can never be needed.
    let due = comments.partition_point(|c| c.time <= frame.position + DURATION / 2.0);
    let mut rows: Vec<Option<f64>> = vec![None; layout.lanes.min(due)];
    let mut lines = Vec::new();

    for comment in comments.iter_mut() {
        if comment.time > frame.position + DURATION / 2.0 {
            break;
        }

        let time = comment.time;
        let x = *comment
            .x
            .get_or_insert_with(|| width - (frame.position - time) * width / DURATION);
        let extent = layout.extent(comment);
        if x + extent < 0.0 {
            continue;
        }

        let lane = *comment.lane.get_or_insert_with(|| assign_lane(&rows, x));
        lines.push(overlay::event_line(
            comment,
            x,
            layout.lane_y(lane),
            layout.lane_height,
        ));

        let next = x - step;
        comment.x = Some(next);
        if let Some(end) = rows.get_mut(lane) {
            let new_end = next + extent;
            *end = Some(end.map_or(new_end, |end| end.max(new_end)));
        }
    }

    lines
}

/// Picks the first lane that is free at `x`, falling back to the lane with
/// the smallest trailing edge (lowest index on ties).
fn assign_lane(rows: &[Option<f64>], x: f64) -> usize {
    if let Some(lane) = rows
        .iter()
        .position(|end| end.map_or(true, |end| end < x))
    {
        return lane;
    }

    let mut best = 0;
    let mut best_end = f64::INFINITY;
    for (lane, end) in rows.iter().enumerate() {
        if let Some(end) = *end {
            if end < best_end {
                best = lane;
                best_end = end;
            }
        }
    }
    best
}
