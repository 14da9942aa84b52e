//! Owned recognition results

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::ffi::RawBoundingBox;

/// Quadrilateral in image pixel coordinates.
///
/// Corners are kept in the order the engine produced them; text may be
/// skewed or rotated, so the box is not necessarily axis-aligned.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
    pub x3: f32,
    pub y3: f32,
    pub x4: f32,
    pub y4: f32,
}

/// Axis-aligned rectangle projected from a [`BoundingBox`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl BoundingBox {
    /// Corners in received order.
    pub fn points(&self) -> [(f32, f32); 4] {
        [
            (self.x1, self.y1),
            (self.x2, self.y2),
            (self.x3, self.y3),
            (self.x4, self.y4),
        ]
    }

    /// Rectangle anchored at corner 1, with width along the top edge and
    /// height along the left edge.
    pub fn rect(&self) -> Rect {
        Rect {
            x: self.x1,
            y: self.y1,
            width: self.x2 - self.x1,
            height: self.y4 - self.y1,
        }
    }
}

impl From<RawBoundingBox> for BoundingBox {
    fn from(raw: RawBoundingBox) -> Self {
        Self {
            x1: raw.x1,
            y1: raw.y1,
            x2: raw.x2,
            y2: raw.y2,
            x3: raw.x3,
            y3: raw.y3,
            x4: raw.x4,
            y4: raw.y4,
        }
    }
}

impl fmt::Display for BoundingBox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "({},{}),({},{}),({},{}),({},{})",
            self.x1, self.y1, self.x2, self.y2, self.x3, self.y3, self.x4, self.y4
        )
    }
}

/// Single recognized word
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Word {
    pub text: String,
    pub bounding_box: BoundingBox,
}

impl fmt::Display for Word {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.text, self.bounding_box)
    }
}

/// Recognized line. `text` comes from the engine directly and is not
/// necessarily the concatenation of `words`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Line {
    pub text: String,
    pub bounding_box: BoundingBox,
    pub words: Vec<Word>,
}

impl fmt::Display for Line {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.text, self.bounding_box)
    }
}

/// Complete OCR result for one image, lines in document order
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RecognitionResult {
    pub lines: Vec<Line>,
}

impl RecognitionResult {
    /// Line texts joined with `'\n'`.
    pub fn text(&self) -> String {
        self.lines
            .iter()
            .map(|line| line.text.as_str())
            .collect::<Vec<_>>()
            .join("\n")
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn word_count(&self) -> usize {
        self.lines.iter().map(|line| line.words.len()).sum()
    }
}

impl fmt::Display for RecognitionResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(text: &str) -> Line {
        Line {
            text: text.to_string(),
            bounding_box: BoundingBox::default(),
            words: Vec::new(),
        }
    }

    #[test]
    fn test_text_joins_lines_in_order() {
        let result = RecognitionResult {
            lines: vec![line("first"), line(""), line("third")],
        };
        assert_eq!(result.text(), "first\n\nthird");
        assert_eq!(result.to_string(), result.text());
    }

    #[test]
    fn test_empty_result_has_empty_text() {
        let result = RecognitionResult::default();
        assert!(result.is_empty());
        assert_eq!(result.text(), "");
        assert_eq!(result.word_count(), 0);
    }

    #[test]
    fn test_rect_projection_of_skewed_box() {
        let bbox = BoundingBox {
            x1: 10.0,
            y1: 20.0,
            x2: 110.0,
            y2: 25.0,
            x3: 108.0,
            y3: 55.0,
            x4: 8.0,
            y4: 50.0,
        };
        let rect = bbox.rect();
        assert_eq!(rect.x, 10.0);
        assert_eq!(rect.y, 20.0);
        assert_eq!(rect.width, 100.0);
        assert_eq!(rect.height, 30.0);
        assert_eq!(bbox.points()[3], (8.0, 50.0));
    }

    #[test]
    fn test_line_display() {
        let mut l = line("HI");
        l.bounding_box.x2 = 4.0;
        assert_eq!(l.to_string(), "HI: (0,0),(4,0),(0,0),(0,0)");
    }
}
