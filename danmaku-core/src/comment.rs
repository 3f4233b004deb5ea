//! Comment records for danmaku overlays

use crate::{Error, Result, Rgb};
use unicode_segmentation::UnicodeSegmentation;

/// A single scrolling comment and its placement state
#[derive(Debug, Clone, PartialEq)]
pub struct Comment {
    /// Text ready for overlay markup (newlines escaped as `\N`)
    pub message: String,
    /// Number of grapheme clusters in the original text
    pub display_width: usize,
    /// Playback time in seconds at which the comment enters the screen
    pub time: f64,
    /// Text color
    pub color: Rgb,
    /// Horizontal position in overlay pixels, `None` until first placed
    pub x: Option<f64>,
    /// Lane index, `None` until first placed
    pub lane: Option<usize>,
}

impl Comment {
    /// Creates an unplaced comment from its display text
    pub fn new(message: &str, time: f64, color: Rgb) -> Self {
        Self {
            message: message.replace('\n', "\\N"),
            display_width: message.graphemes(true).count(),
            time,
            color,
            x: None,
            lane: None,
        }
    }

    /// Parses a raw service entry.
    ///
    /// `params` is the comma separated `time,mode,color[,extra]` string and
    /// `message` the comment text.
    pub fn parse(params: &str, message: &str) -> Result<Self> {
        let mut fields = params.splitn(4, ',');
        let time = fields.next().unwrap_or_default();
        let _mode = fields.next();
        let color = fields.next().ok_or_else(|| Error::MalformedRecord {
            field: "params",
            value: params.to_string(),
        })?;

        let time = time
            .trim()
            .parse::<f64>()
            .ok()
            .filter(|t| t.is_finite())
            .ok_or_else(|| Error::MalformedRecord {
                field: "time",
                value: time.to_string(),
            })?;
        let color = color
            .trim()
            .parse::<u32>()
            .map_err(|_| Error::MalformedRecord {
                field: "color",
                value: color.to_string(),
            })?;

        Ok(Self::new(message, time, Rgb::from_packed(color)))
    }

    /// Clears the placement state so the comment is placed afresh
    pub fn reset(&mut self) {
        self.x = None;
        self.lane = None;
    }

    /// Returns true once the engine has positioned this comment
    pub fn is_placed(&self) -> bool {
        self.x.is_some()
    }
}
