//! Text-run extraction from a page content stream.
//!
//! Walks the text operators of one page with a simplified PDF text-state
//! machine and emits a [`TextSpan`] per shown string. Positions are in PDF
//! user space: origin at the bottom-left, `y` is the baseline.

use super::backend::{Operand, PageId, PdfBackend};
use crate::PdfError;

/// A run of text painted by one show operator (or one part of a `TJ`).
#[derive(Debug, Clone, PartialEq)]
pub struct TextSpan {
    pub text: String,
    /// Left edge of the first glyph.
    pub x: f32,
    /// Baseline.
    pub y: f32,
    /// Pen advance over the whole run.
    pub width: f32,
    /// Rendered font size (font size scaled by the text matrix).
    pub font_size: f32,
}

/// Glyph advance as a fraction of the font size. Font metrics are not read.
pub const APPROX_CHAR_WIDTH_RATIO: f32 = 0.5;

/// A `TJ` adjustment moving right by more than this fraction of a glyph
/// advance is a word gap and splits the run.
const TJ_WORD_GAP_RATIO: f32 = 0.3;

/// `[a, b, c, d, e, f]`, as in the `Tm` operator.
type Matrix = [f32; 6];

const IDENTITY: Matrix = [1.0, 0.0, 0.0, 1.0, 0.0, 0.0];

/// `translate(tx, ty) x m`.
fn translated(m: &Matrix, tx: f32, ty: f32) -> Matrix {
    [
        m[0],
        m[1],
        m[2],
        m[3],
        m[0] * tx + m[2] * ty + m[4],
        m[1] * tx + m[3] * ty + m[5],
    ]
}

/// Text state parameters, named after their operators.
struct TextState {
    font: Vec<u8>,
    size: f32,
    /// Text matrix.
    tm: Matrix,
    /// Text line matrix.
    tlm: Matrix,
    /// Character spacing.
    tc: f32,
    /// Word spacing.
    tw: f32,
    /// Horizontal scaling as a factor (`Tz` / 100).
    th: f32,
    /// Leading.
    tl: f32,
    /// Rise.
    ts: f32,
}

impl TextState {
    fn new() -> Self {
        Self {
            font: Vec::new(),
            size: 0.0,
            tm: IDENTITY,
            tlm: IDENTITY,
            tc: 0.0,
            tw: 0.0,
            th: 1.0,
            tl: 0.0,
            ts: 0.0,
        }
    }

    fn pen(&self) -> (f32, f32) {
        (self.tm[4], self.tm[5] + self.ts)
    }

    /// Font size after the text matrix: `size * |(b, d)|`.
    fn rendered_size(&self) -> f32 {
        (self.size * self.tm[1].hypot(self.tm[3])).abs()
    }

    fn glyph_advance(&self) -> f32 {
        self.size * APPROX_CHAR_WIDTH_RATIO * self.th
    }

    /// Set one of the single-number parameters; other operators are ignored.
    fn set_parameter(&mut self, operator: &str, value: f32) {
        match operator {
            "Tc" => self.tc = value,
            "Tw" => self.tw = value,
            "Tz" => self.th = value / 100.0,
            "TL" => self.tl = value,
            "Ts" => self.ts = value,
            _ => {}
        }
    }

    fn begin_text(&mut self) {
        self.tm = IDENTITY;
        self.tlm = IDENTITY;
    }

    fn set_matrix(&mut self, m: Matrix) {
        self.tm = m;
        self.tlm = m;
    }

    fn move_line(&mut self, tx: f32, ty: f32) {
        self.tlm = translated(&self.tlm, tx, ty);
        self.tm = self.tlm;
    }

    fn next_line(&mut self) {
        self.move_line(0.0, -self.tl);
    }

    /// Move the pen `dx` unscaled text-space units along the baseline.
    fn shift(&mut self, dx: f32) {
        self.tm = translated(&self.tm, dx, 0.0);
    }

    /// Move the pen past `text` as if it had been painted.
    fn paint(&mut self, text: &str) {
        let advance = self.glyph_advance();
        let dx: f32 = text
            .chars()
            .map(|c| advance + self.tc + if c == ' ' { self.tw } else { 0.0 })
            .sum();
        self.shift(dx);
    }
}

/// Text being accumulated for one span.
struct PendingSpan {
    text: String,
    origin: (f32, f32),
}

impl PendingSpan {
    fn at(state: &TextState) -> Self {
        Self {
            text: String::new(),
            origin: state.pen(),
        }
    }

    /// Emit the run, measuring its width up to the current pen. Blank runs
    /// are dropped.
    fn finish(self, state: &TextState, spans: &mut Vec<TextSpan>) {
        if self.text.trim().is_empty() {
            return;
        }
        let (x, y) = self.origin;
        spans.push(TextSpan {
            text: self.text,
            x,
            y,
            width: (state.pen().0 - x).max(0.0),
            font_size: state.rendered_size(),
        });
    }
}

/// Walks one page's operators, collecting spans in content-stream order.
struct SpanCollector<'a> {
    backend: &'a dyn PdfBackend,
    page: PageId,
    state: TextState,
    spans: Vec<TextSpan>,
}

impl SpanCollector<'_> {
    fn decode(&self, operand: &Operand) -> Option<String> {
        match operand {
            Operand::Str(bytes) => {
                Some(self.backend.decode_text(self.page, &self.state.font, bytes))
            }
            _ => None,
        }
    }

    fn apply(&mut self, operator: &str, operands: &[Operand]) {
        let number = |i: usize| operands.get(i).and_then(Operand::number);

        match operator {
            "BT" => self.state.begin_text(),
            "Tf" => {
                if let (Some(Operand::Name(font)), Some(size)) = (operands.first(), number(1)) {
                    self.state.font = font.clone();
                    self.state.size = size;
                }
            }
            "Tm" => {
                let values: Vec<f32> = operands.iter().filter_map(Operand::number).collect();
                if let Ok(m) = Matrix::try_from(values) {
                    self.state.set_matrix(m);
                }
            }
            "Td" | "TD" => {
                if let (Some(tx), Some(ty)) = (number(0), number(1)) {
                    if operator == "TD" {
                        self.state.tl = -ty;
                    }
                    self.state.move_line(tx, ty);
                }
            }
            "T*" => self.state.next_line(),
            "Tj" => {
                if let Some(text) = operands.first() {
                    self.show(text);
                }
            }
            "'" => {
                self.state.next_line();
                if let Some(text) = operands.first() {
                    self.show(text);
                }
            }
            "\"" => {
                if let (Some(tw), Some(tc), Some(text)) = (number(0), number(1), operands.get(2)) {
                    self.state.tw = tw;
                    self.state.tc = tc;
                    self.state.next_line();
                    self.show(text);
                }
            }
            "TJ" => {
                if let Some(Operand::Array(items)) = operands.first() {
                    self.show_adjusted(items);
                }
            }
            other => {
                if let Some(value) = number(0) {
                    self.state.set_parameter(other, value);
                }
            }
        }
    }

    fn show(&mut self, operand: &Operand) {
        let Some(text) = self.decode(operand) else {
            return;
        };
        let mut pending = PendingSpan::at(&self.state);
        self.state.paint(&text);
        pending.text = text;
        pending.finish(&self.state, &mut self.spans);
    }

    /// `TJ`: strings interleaved with adjustments in thousandths of a
    /// text-space unit (positive moves left). A rightward move wider than a
    /// fraction of a glyph closes the run.
    fn show_adjusted(&mut self, items: &[Operand]) {
        let mut pending = PendingSpan::at(&self.state);

        for item in items {
            if let Some(fragment) = self.decode(item) {
                if pending.text.is_empty() {
                    pending = PendingSpan::at(&self.state);
                }
                self.state.paint(&fragment);
                pending.text.push_str(&fragment);
            } else if let Some(adjustment) = item.number() {
                let dx = -adjustment / 1000.0 * self.state.size * self.state.th;
                let gap = dx > self.state.glyph_advance() * TJ_WORD_GAP_RATIO;
                if gap && !pending.text.is_empty() {
                    let done = std::mem::replace(&mut pending, PendingSpan::at(&self.state));
                    done.finish(&self.state, &mut self.spans);
                }
                self.state.shift(dx);
            }
        }

        pending.finish(&self.state, &mut self.spans);
    }
}

/// Produce the [`TextSpan`]s of one page in content-stream order.
///
/// Handles `BT`, `Tf`, `Tm`, `Td`, `TD`, `T*`, `TL`, `Tc`, `Tw`, `Tz`, `Ts`,
/// `Tj`, `'`, `"` and `TJ`; everything else is ignored.
pub fn extract_page_spans(
    backend: &dyn PdfBackend,
    page: PageId,
) -> Result<Vec<TextSpan>, PdfError> {
    let mut collector = SpanCollector {
        backend,
        page,
        state: TextState::new(),
        spans: Vec::new(),
    };

    for op in backend.page_operations(page)? {
        collector.apply(&op.operator, &op.operands);
    }

    Ok(collector.spans)
}
