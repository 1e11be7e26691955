//! Label measurement. Diagram labels use `<br/>` for line breaks while canvas
//! text uses `\n`; both are understood here.

use unicode_width::UnicodeWidthStr;

/// Average glyph advance as a fraction of the font size.
const CHAR_WIDTH_RATIO: f64 = 0.6;
/// Line height as a multiple of the font size.
pub const LINE_HEIGHT: f64 = 1.25;
const TEXT_PAD_X: f64 = 20.0;
const TEXT_PAD_Y: f64 = 10.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TextSize {
    pub width: f64,
    pub height: f64,
}

pub fn display_width(s: &str) -> usize {
    UnicodeWidthStr::width(s)
}

/// Split a label into its visual lines. Recognizes `\n` and the `<br>`,
/// `<br/>` and `<br />` tags in any letter case.
pub fn label_lines(label: &str) -> Vec<&str> {
    let mut lines = Vec::new();
    for segment in label.split('\n') {
        let mut rest = segment;
        while let Some((start, len)) = find_br(rest) {
            lines.push(&rest[..start]);
            rest = &rest[start + len..];
        }
        lines.push(rest);
    }
    lines
}

fn find_br(s: &str) -> Option<(usize, usize)> {
    let bytes = s.as_bytes();
    let mut from = 0;
    while let Some(offset) = s[from..].find('<') {
        let start = from + offset;
        let tail = &bytes[start..];
        if tail.len() >= 4 && tail[1..3].eq_ignore_ascii_case(b"br") {
            let len = match &tail[3..] {
                [b'>', ..] => Some(4),
                [b'/', b'>', ..] => Some(5),
                [b' ', b'/', b'>', ..] => Some(6),
                _ => None,
            };
            if let Some(len) = len {
                return Some((start, len));
            }
        }
        from = start + 1;
    }
    None
}

/// Canvas text for a diagram label (`<br/>` becomes a newline).
pub fn label_to_canvas_text(label: &str) -> String {
    label_lines(label).join("\n")
}

/// Diagram label for canvas text (newlines become `<br/>`).
pub fn canvas_text_to_label(text: &str) -> String {
    text.lines().map(str::trim_end).collect::<Vec<_>>().join("<br/>")
}

/// Heuristic text box size at the given font size, padded for layout.
pub fn estimate_text_size(text: &str, font_size: f64) -> TextSize {
    let lines = label_lines(text);
    let widest = lines.iter().map(|l| display_width(l)).max().unwrap_or(0);
    #[allow(clippy::cast_precision_loss)]
    let (widest, count) = (widest as f64, lines.len() as f64);
    TextSize {
        width: widest * font_size * CHAR_WIDTH_RATIO + TEXT_PAD_X,
        height: count * font_size * LINE_HEIGHT + TEXT_PAD_Y,
    }
}
