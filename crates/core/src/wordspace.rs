//! Spatial cursor engine over the positioned words of one page.
//!
//! A [`WordSpace`] owns the words, a cursor point, and a text buffer. Every
//! operation is infallible: a query that matches nothing leaves the cursor
//! where it was, and an invalid pattern is treated as matching nothing. This
//! lets command trees from an unreliable generator degrade to "field not
//! found" instead of aborting a batch.
//!
//! # Operation groups
//!
//! | Group | Operations |
//! |-------|------------|
//! | Directional | [`move_left`](WordSpace::move_left), [`move_right`](WordSpace::move_right), [`move_up`](WordSpace::move_up), [`move_down`](WordSpace::move_down) |
//! | Document order | [`move_next`](WordSpace::move_next), [`move_previous`](WordSpace::move_previous), [`move_first`](WordSpace::move_first), [`move_last`](WordSpace::move_last) |
//! | Anchors | [`anchor_to_text`](WordSpace::anchor_to_text), [`anchor_to_regex`](WordSpace::anchor_to_regex), [`anchor_to_nearest`](WordSpace::anchor_to_nearest) |
//! | Corners | `move_cursor_to_corner_{left,right,top,bottom}` |
//! | Sentences | `move_to_sentence_{begin,end}`, `collect_{leading,trailing,whole}_sentence` |
//! | Buffer | [`collect`](WordSpace::collect), [`clear_text_buffer`](WordSpace::clear_text_buffer), [`drain_text`](WordSpace::drain_text) |

use std::collections::HashSet;

use log::debug;
use regex::{Regex, RegexBuilder};

use crate::geometry::{
    normalize_text, point_to_bbox_squared_distance, strip_diacritics, BBox, Point,
};
use crate::word::{PageLayout, Word};

/// Two words belong to the same sentence only if their heights differ by at
/// most this fraction of the larger height.
const SENTENCE_HEIGHT_TOLERANCE: f64 = 0.10;

/// Direction for [`WordSpace::move_towards`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Left,
    Right,
    Up,
    Down,
}

/// Word indices making up the sentence around the current word.
///
/// `left` and `right` are both ordered left-to-right, so
/// `left ++ [current] ++ right` reads the sentence in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentenceRun {
    pub left: Vec<usize>,
    pub current: usize,
    pub right: Vec<usize>,
}

impl SentenceRun {
    pub fn first(&self) -> usize {
        self.left.first().copied().unwrap_or(self.current)
    }

    pub fn last(&self) -> usize {
        self.right.last().copied().unwrap_or(self.current)
    }
}

#[derive(Debug, Clone)]
pub struct WordSpace {
    words: Vec<Word>,
    max_x: f64,
    max_y: f64,
    cursor: Point,
    buffer: String,
}

impl WordSpace {
    pub fn new(words: Vec<Word>, max_x: f64, max_y: f64) -> Self {
        Self {
            words,
            max_x,
            max_y,
            cursor: Point::default(),
            buffer: String::new(),
        }
    }

    pub fn from_layout(layout: PageLayout) -> Self {
        let (max_x, max_y) = layout.extents();
        Self::new(layout.words, max_x, max_y)
    }

    pub fn words(&self) -> &[Word] {
        &self.words
    }

    pub fn cursor(&self) -> Point {
        self.cursor
    }

    pub fn extents(&self) -> (f64, f64) {
        (self.max_x, self.max_y)
    }

    /// Raw buffer contents, including the trailing separator.
    pub fn text(&self) -> &str {
        &self.buffer
    }

    // -----------------------------------------------------------------------
    // Current word
    // -----------------------------------------------------------------------

    /// Index of the first word, in document order, whose box contains the
    /// cursor. Overlapping boxes resolve to the earliest word.
    pub fn current_index(&self) -> Option<usize> {
        self.words.iter().position(|w| w.bbox.contains(self.cursor))
    }

    pub fn current_word(&self) -> Option<&Word> {
        self.current_index().map(|i| &self.words[i])
    }

    /// The current word's box, or a degenerate box at the cursor.
    fn reference_box(&self) -> BBox {
        self.current_word()
            .map(|w| w.bbox)
            .unwrap_or_else(|| BBox::from_point(self.cursor))
    }

    fn move_to_index(&mut self, index: usize) {
        if let Some(word) = self.words.get(index) {
            self.cursor = word.bbox.center();
        }
    }

    pub fn reset_cursor(&mut self) {
        self.cursor = Point::default();
    }

    // -----------------------------------------------------------------------
    // Directional navigation
    // -----------------------------------------------------------------------

    /// Move to the `jump`-th closest word strictly beyond the reference box in
    /// `direction` that overlaps it on the cross axis.
    pub fn move_towards(&mut self, direction: Direction, jump: usize) {
        let reference = self.reference_box();

        let mut candidates: Vec<(f64, usize)> = self
            .words
            .iter()
            .enumerate()
            .filter_map(|(i, w)| {
                let b = &w.bbox;
                match direction {
                    Direction::Right if b.x0 > reference.x1 && b.overlaps_vertically(&reference) => {
                        Some((b.x0, i))
                    }
                    Direction::Left if b.x1 < reference.x0 && b.overlaps_vertically(&reference) => {
                        Some((-b.x1, i))
                    }
                    Direction::Down
                        if b.y0 > reference.y1 && b.overlaps_horizontally(&reference) =>
                    {
                        Some((b.y0, i))
                    }
                    Direction::Up if b.y1 < reference.y0 && b.overlaps_horizontally(&reference) => {
                        Some((-b.y1, i))
                    }
                    _ => None,
                }
            })
            .collect();

        // Stable sort: equal distances keep document order.
        candidates.sort_by(|a, b| a.0.total_cmp(&b.0));

        if let Some(&(_, index)) = candidates.get(jump) {
            self.move_to_index(index);
        }
    }

    pub fn move_left(&mut self, jump: usize) {
        self.move_towards(Direction::Left, jump);
    }

    pub fn move_right(&mut self, jump: usize) {
        self.move_towards(Direction::Right, jump);
    }

    pub fn move_up(&mut self, jump: usize) {
        self.move_towards(Direction::Up, jump);
    }

    pub fn move_down(&mut self, jump: usize) {
        self.move_towards(Direction::Down, jump);
    }

    // -----------------------------------------------------------------------
    // Document-order navigation
    // -----------------------------------------------------------------------

    pub fn move_next(&mut self, jump: usize) {
        if let Some(current) = self.current_index() {
            let target = current.saturating_add(jump.saturating_add(1));
            self.move_to_index(target.min(self.words.len() - 1));
        }
    }

    pub fn move_previous(&mut self, jump: usize) {
        if let Some(current) = self.current_index() {
            self.move_to_index(current.saturating_sub(jump.saturating_add(1)));
        }
    }

    pub fn move_first(&mut self) {
        self.move_to_index(0);
    }

    pub fn move_last(&mut self) {
        if let Some(last) = self.words.len().checked_sub(1) {
            self.move_to_index(last);
        }
    }

    // -----------------------------------------------------------------------
    // Anchors
    // -----------------------------------------------------------------------

    /// Move to the start of the `occurrence`-th run of consecutive words that
    /// spell `text` (split on whitespace). Out-of-range occurrences clamp to
    /// the last match.
    pub fn anchor_to_text(&mut self, text: &str, occurrence: usize, include_normalized: bool) {
        let parts: Vec<String> = text
            .split_whitespace()
            .map(|p| {
                if include_normalized {
                    normalize_text(p)
                } else {
                    p.to_string()
                }
            })
            .collect();

        if parts.is_empty() || parts.len() > self.words.len() {
            return;
        }

        let texts = self.comparable_texts(include_normalized);
        let matches: Vec<usize> = (0..=texts.len() - parts.len())
            .filter(|&start| {
                parts
                    .iter()
                    .zip(&texts[start..])
                    .all(|(part, word)| part == word)
            })
            .collect();

        self.move_to_occurrence(&matches, occurrence);
    }

    /// Move to the word where the `occurrence`-th match of `pattern` begins.
    ///
    /// Word texts are joined with single spaces so a pattern may span several
    /// words. With `include_normalized`, both the joined text and the pattern
    /// have their diacritics stripped and the match ignores case.
    pub fn anchor_to_regex(&mut self, pattern: &str, occurrence: usize, include_normalized: bool) {
        let regex = if include_normalized {
            compile(&strip_diacritics(pattern), true)
        } else {
            compile(pattern, false)
        };
        let Some(regex) = regex else {
            return;
        };

        let texts = self.comparable_texts(include_normalized);
        let mut haystack = String::new();
        let mut ends = Vec::with_capacity(texts.len());
        for (i, text) in texts.iter().enumerate() {
            if i > 0 {
                haystack.push(' ');
            }
            haystack.push_str(text);
            ends.push(haystack.len());
        }

        let mut seen = HashSet::new();
        let matches: Vec<usize> = regex
            .find_iter(&haystack)
            // A match starting on a separator belongs to the following word.
            .filter_map(|m| ends.iter().position(|&end| m.start() < end))
            .filter(|&i| seen.insert(i))
            .collect();

        self.move_to_occurrence(&matches, occurrence);
    }

    /// Move to the word closest to the cursor, never the one under it.
    pub fn anchor_to_nearest(&mut self) {
        let current = self.current_index();
        let mut best: Option<(f64, usize)> = None;

        for (i, word) in self.words.iter().enumerate() {
            if Some(i) == current {
                continue;
            }
            let d = point_to_bbox_squared_distance(self.cursor, &word.bbox);
            if best.map_or(true, |(best_d, _)| d < best_d) {
                best = Some((d, i));
            }
        }

        if let Some((_, index)) = best {
            self.move_to_index(index);
        }
    }

    fn comparable_texts(&self, include_normalized: bool) -> Vec<String> {
        self.words
            .iter()
            .map(|w| {
                if include_normalized {
                    normalize_text(&w.text)
                } else {
                    w.text.clone()
                }
            })
            .collect()
    }

    fn move_to_occurrence(&mut self, matches: &[usize], occurrence: usize) {
        if let Some(last) = matches.len().checked_sub(1) {
            self.move_to_index(matches[occurrence.min(last)]);
        }
    }

    // -----------------------------------------------------------------------
    // Corner jumps
    // -----------------------------------------------------------------------

    pub fn move_cursor_to_corner_left(&mut self) {
        self.cursor.x = 0.0;
    }

    pub fn move_cursor_to_corner_right(&mut self) {
        self.cursor.x = self.max_x;
    }

    pub fn move_cursor_to_corner_top(&mut self) {
        self.cursor.y = 0.0;
    }

    pub fn move_cursor_to_corner_bottom(&mut self) {
        self.cursor.y = self.max_y;
    }

    // -----------------------------------------------------------------------
    // Sentences
    // -----------------------------------------------------------------------

    /// Infer the sentence around the current word from layout alone: a run of
    /// words on the cursor's horizontal band with similar heights and gaps no
    /// wider than a word's height.
    pub fn sentence_run(&self) -> Option<SentenceRun> {
        let current = self.current_index()?;

        let mut right = Vec::new();
        let mut visited = HashSet::from([current]);
        let mut last = current;
        while let Some(next) = self.sentence_neighbor(last, Direction::Right, &visited) {
            visited.insert(next);
            right.push(next);
            last = next;
        }

        let mut left = Vec::new();
        let mut last = current;
        while let Some(prev) = self.sentence_neighbor(last, Direction::Left, &visited) {
            visited.insert(prev);
            left.push(prev);
            last = prev;
        }
        left.reverse();

        Some(SentenceRun {
            left,
            current,
            right,
        })
    }

    /// The adjacent word on the cursor's band next to `from`, if it continues
    /// the sentence.
    fn sentence_neighbor(
        &self,
        from: usize,
        direction: Direction,
        visited: &HashSet<usize>,
    ) -> Option<usize> {
        let base = &self.words[from].bbox;
        let cy = self.cursor.y;

        let on_band = |(i, w): &(usize, &Word)| {
            !visited.contains(i) && w.bbox.y0 <= cy && cy <= w.bbox.y1
        };

        let (index, candidate) = match direction {
            Direction::Right => self
                .words
                .iter()
                .enumerate()
                .filter(on_band)
                .filter(|(_, w)| w.bbox.x0 >= base.x1)
                .min_by(|a, b| a.1.bbox.x0.total_cmp(&b.1.bbox.x0))?,
            Direction::Left => self
                .words
                .iter()
                .enumerate()
                .filter(on_band)
                .filter(|(_, w)| w.bbox.x1 <= base.x0)
                .min_by(|a, b| b.1.bbox.x1.total_cmp(&a.1.bbox.x1))?,
            Direction::Up | Direction::Down => return None,
        };

        let (h_base, h_cand) = (base.height(), candidate.bbox.height());
        let similar_height =
            (h_base - h_cand).abs() <= SENTENCE_HEIGHT_TOLERANCE * h_base.max(h_cand);

        let gap = match direction {
            Direction::Right => candidate.bbox.x0 - base.x1,
            _ => base.x0 - candidate.bbox.x1,
        };

        (similar_height && gap <= h_base).then_some(index)
    }

    pub fn move_to_sentence_begin(&mut self) {
        if let Some(run) = self.sentence_run() {
            self.move_to_index(run.first());
        }
    }

    pub fn move_to_sentence_end(&mut self) {
        if let Some(run) = self.sentence_run() {
            self.move_to_index(run.last());
        }
    }

    pub fn collect_leading_sentence(&mut self) {
        if let Some(run) = self.sentence_run() {
            let indices: Vec<usize> = run.left.iter().copied().chain([run.current]).collect();
            self.push_words(&indices);
        }
    }

    pub fn collect_trailing_sentence(&mut self) {
        if let Some(run) = self.sentence_run() {
            let indices: Vec<usize> = [run.current].into_iter().chain(run.right).collect();
            self.push_words(&indices);
        }
    }

    pub fn collect_whole_sentence(&mut self) {
        if let Some(run) = self.sentence_run() {
            let indices: Vec<usize> = run
                .left
                .iter()
                .copied()
                .chain([run.current])
                .chain(run.right)
                .collect();
            self.push_words(&indices);
        }
    }

    // -----------------------------------------------------------------------
    // Checks
    // -----------------------------------------------------------------------

    /// Case-insensitive search of `pattern` in the current word. When the raw
    /// text does not match and `fallback` is set, retries with diacritics
    /// stripped from both sides.
    pub fn check_current_word_matches_regex(&self, pattern: &str, fallback: bool) -> bool {
        let Some(word) = self.current_word() else {
            return false;
        };

        if compile(pattern, true).is_some_and(|re| re.is_match(&word.text)) {
            return true;
        }

        fallback
            && compile(&strip_diacritics(pattern), true)
                .is_some_and(|re| re.is_match(&normalize_text(&word.text)))
    }

    // -----------------------------------------------------------------------
    // Text buffer
    // -----------------------------------------------------------------------

    /// Append the current word, if any, followed by a space.
    pub fn collect(&mut self) {
        if let Some(index) = self.current_index() {
            self.push_words(&[index]);
        }
    }

    fn push_words(&mut self, indices: &[usize]) {
        for &i in indices {
            self.buffer.push_str(&self.words[i].text);
            self.buffer.push(' ');
        }
    }

    pub fn clear_text_buffer(&mut self) {
        self.buffer.clear();
    }

    /// Buffer contents without the final separator.
    pub fn read_text(&self) -> &str {
        self.buffer.strip_suffix(' ').unwrap_or(&self.buffer)
    }

    /// Read the buffer and clear it.
    pub fn drain_text(&mut self) -> String {
        let text = self.read_text().to_string();
        self.buffer.clear();
        text
    }
}

fn compile(pattern: &str, case_insensitive: bool) -> Option<Regex> {
    RegexBuilder::new(pattern)
        .case_insensitive(case_insensitive)
        .build()
        .map_err(|e| debug!("ignoring invalid pattern {:?}: {}", pattern, e))
        .ok()
}
