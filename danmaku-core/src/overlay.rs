//! ASS overlay markup for placed comments

use crate::Comment;

/// Alpha applied to every comment (`00` opaque, `FF` invisible)
pub const ALPHA: u8 = 0x30;

/// Outline width around the glyphs
pub const BORDER: f64 = 1.5;

/// Formats one overlay event line for a comment drawn at `(x, y)`.
///
/// The override block pins the position, disables wrapping and sets the
/// color, alpha, font size and border before the message text.
pub fn event_line(comment: &Comment, x: f64, y: f64, font_size: f64) -> String {
    format!(
        "{{\\pos({:.1},{:.1})\\c{}\\alpha&H{:02X}\\fs{:.1}\\bord{}\\b1\\q2}}{}",
        x,
        y,
        comment.color.to_ass(),
        ALPHA,
        font_size,
        BORDER,
        comment.message
    )
}
