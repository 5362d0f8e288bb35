//! Turn text spans into positioned words.
//!
//! Spans are split on whitespace with a uniform per-glyph advance, flipped
//! from PDF user space (bottom-left origin, baseline `y`) to page-image
//! coordinates (top-left origin, `y` downward), and ordered for reading:
//! lines top to bottom, words left to right.

use std::cmp::Ordering;

use pdfse_core::word::Word;

use crate::cleanup::cleanup_word;
use crate::parser::spans::{TextSpan, APPROX_CHAR_WIDTH_RATIO};

/// Baselines closer than this many points belong to the same line.
const Y_TOLERANCE: f32 = 1.0;

/// Share of the font size above the baseline.
const ASCENT_RATIO: f32 = 0.8;

/// Share of the font size below the baseline.
const DESCENT_RATIO: f32 = 0.2;

/// A word still carrying its PDF baseline for line grouping.
struct PlacedWord {
    baseline: f32,
    word: Word,
}

/// Split one span into words.
fn split_span(span: &TextSpan, page_height: f32) -> Vec<PlacedWord> {
    let chars: Vec<char> = span.text.chars().collect();
    if chars.is_empty() {
        return Vec::new();
    }

    let advance = if span.width > 0.0 {
        span.width / chars.len() as f32
    } else {
        span.font_size * APPROX_CHAR_WIDTH_RATIO
    };
    let top = page_height - (span.y + span.font_size * ASCENT_RATIO);
    let bottom = page_height - (span.y - span.font_size * DESCENT_RATIO);

    let mut words = Vec::new();
    let mut start: Option<usize> = None;

    // A trailing sentinel space closes the last word.
    for (i, c) in chars.iter().copied().chain(std::iter::once(' ')).enumerate() {
        match (c.is_whitespace(), start) {
            (false, None) => start = Some(i),
            (true, Some(s)) => {
                let text = cleanup_word(&chars[s..i].iter().collect::<String>());
                if !text.is_empty() {
                    let x0 = span.x + s as f32 * advance;
                    let x1 = span.x + i as f32 * advance;
                    words.push(PlacedWord {
                        baseline: span.y,
                        word: Word::new(text, (x0 as f64, top as f64, x1 as f64, bottom as f64)),
                    });
                }
                start = None;
            }
            _ => {}
        }
    }

    words
}

/// Build the words of a page from its spans, in reading order.
pub fn spans_to_words(spans: &[TextSpan], page_height: f32) -> Vec<Word> {
    let mut placed: Vec<PlacedWord> = spans
        .iter()
        .flat_map(|span| split_span(span, page_height))
        .collect();

    if placed.is_empty() {
        return Vec::new();
    }

    // Top of page first (highest baseline), then left to right.
    placed.sort_by(|a, b| {
        b.baseline
            .partial_cmp(&a.baseline)
            .unwrap_or(Ordering::Equal)
            .then(a.word.bbox.x0.total_cmp(&b.word.bbox.x0))
    });

    let mut lines: Vec<Vec<PlacedWord>> = Vec::new();
    let mut current_y = placed[0].baseline;

    for word in placed {
        match lines.last_mut() {
            Some(line) if (word.baseline - current_y).abs() <= Y_TOLERANCE => line.push(word),
            _ => {
                current_y = word.baseline;
                lines.push(vec![word]);
            }
        }
    }

    lines
        .into_iter()
        .flat_map(|mut line| {
            line.sort_by(|a, b| a.word.bbox.x0.total_cmp(&b.word.bbox.x0));
            line.into_iter().map(|placed| placed.word)
        })
        .collect()
}
