use serde::{Deserialize, Serialize};

use crate::geometry::BBox;

/// A positioned text token.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Word {
    pub text: String,
    pub bbox: BBox,
}

impl Word {
    pub fn new(text: impl Into<String>, bbox: impl Into<BBox>) -> Self {
        Self {
            text: text.into(),
            bbox: bbox.into(),
        }
    }
}

/// One page as produced by a layout provider: words in reading order plus the
/// page size.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PageLayout {
    pub width: f64,
    pub height: f64,
    pub words: Vec<Word>,
}

impl PageLayout {
    pub fn new(width: f64, height: f64, words: Vec<Word>) -> Self {
        Self {
            width,
            height,
            words,
        }
    }

    /// Page extents used for corner jumps.
    ///
    /// Falls back to the furthest word edge on each axis when the provider
    /// did not report a usable page size.
    pub fn extents(&self) -> (f64, f64) {
        let max_x = if self.width > 0.0 {
            self.width
        } else {
            self.words.iter().map(|w| w.bbox.x1).fold(0.0, f64::max)
        };
        let max_y = if self.height > 0.0 {
            self.height
        } else {
            self.words.iter().map(|w| w.bbox.y1).fold(0.0, f64::max)
        };
        (max_x, max_y)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_word_new_from_tuple() {
        let w = Word::new("Total", (30.0, 10.0, 10.0, 20.0));
        assert_eq!(w.text, "Total");
        assert_eq!(w.bbox, BBox::new(10.0, 10.0, 30.0, 20.0));
    }

    #[test]
    fn test_extents_use_page_size() {
        let layout = PageLayout::new(612.0, 792.0, vec![Word::new("a", (0.0, 0.0, 5.0, 5.0))]);
        assert_eq!(layout.extents(), (612.0, 792.0));
    }

    #[test]
    fn test_extents_fall_back_to_words() {
        let layout = PageLayout::new(
            0.0,
            0.0,
            vec![
                Word::new("a", (0.0, 0.0, 50.0, 5.0)),
                Word::new("b", (10.0, 40.0, 20.0, 70.0)),
            ],
        );
        assert_eq!(layout.extents(), (50.0, 70.0));
    }

    #[test]
    fn test_word_serde_shape() {
        let w = Word::new("x", (1.0, 2.0, 3.0, 4.0));
        let json = serde_json::to_value(&w).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"text": "x", "bbox": {"x0": 1.0, "y0": 2.0, "x1": 3.0, "y1": 4.0}})
        );
    }
}
