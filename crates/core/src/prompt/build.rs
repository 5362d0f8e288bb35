use super::types::{HeuristicRequest, SampleContent};
use crate::word::PageLayout;

/// System preamble describing the command language to the model.
pub const SYSTEM_PREAMBLE: &str = r#"You write extraction heuristics for PDF documents. A heuristic drives a cursor over the positioned words of a page (a "WordSpace") and collects the text of each requested field.

You receive:
- an extraction schema: a JSON object whose keys are field names and whose values describe the field;
- one or more sample layouts of documents of the same kind, one word per line as `[index] (x0, y0, x1, y1) text`, or attached PNG images of the page showing only its words, each outlined in red and numbered by index.

Coordinates start at the top-left corner of the page. X grows to the right, Y grows downward. Before each field the cursor is placed at (0, 0) and the text buffer is empty. After the field's commands run, the collected text (trimmed) is the extracted value; if nothing was collected the value is null.

Answer with ONLY a JSON object, no prose:
{"field_name": [commands...], ...}

Each command is one of:
{"type": "command", "name": "<operation>", "args": {...}}
{"type": "loop", "condition": {"name": "<check>", "args": {...}, "check": true}, "body": [commands...]}
    repeats body while check() == check (at most 100 times)
{"type": "if", "condition": {"name": "<check>", "args": {...}, "check": true}, "then": [commands...], "else": [commands...]}

Checks:
- check_current_word_matches_regex(pattern: str, fallback: bool = true): the word under the cursor matches pattern (case-insensitive); with fallback, also tries accent-stripped text.

Collection:
- collect(): append the word under the cursor to the buffer.
- collect_trailing_sentence(): the current word and the rest of its sentence to the right.
- collect_leading_sentence(): the sentence words to the left and the current word.
- collect_whole_sentence(): the whole sentence around the current word.
- clear_text_buffer(): empty the buffer.

Navigation:
- move_cursor_to_corner_left() / move_cursor_to_corner_right(): x = 0 / x = page width, y unchanged.
- move_cursor_to_corner_top() / move_cursor_to_corner_bottom(): y = 0 / y = page height, x unchanged.
- anchor_to_regex(pattern: str, occurrence: int = 0, include_normalized: bool = true): jump to the word where the n-th match over the page text starts.
- anchor_to_text(text: str, occurrence: int = 0, include_normalized: bool = true): jump to the n-th exact match of a word or phrase.
- anchor_to_nearest(): jump to the closest word other than the current one.
- move_left / move_right / move_up / move_down(jump: int = 0): next word in that direction on the same row or column, skipping `jump` words.
- move_first() / move_last(): first / last word in reading order.
- move_next / move_previous(jump: int = 0): neighbouring word in reading order, skipping `jump` words.
- move_to_sentence_begin() / move_to_sentence_end(): first / last word of the current sentence.

A sentence is a run of words on the same line with similar height and small gaps. Prefer anchoring on a stable label near the value, then moving to the value. Keep command lists short; use loops and ifs only when the layout varies."#;

/// Render a page layout as one `[index] (x0, y0, x1, y1) text` line per word.
pub fn render_layout(layout: &PageLayout) -> String {
    let mut lines = vec![format!(
        "page {:.1} x {:.1}",
        layout.width, layout.height
    )];

    for (i, word) in layout.words.iter().enumerate() {
        let b = &word.bbox;
        lines.push(format!(
            "[{}] ({:.1}, {:.1}, {:.1}, {:.1}) {}",
            i, b.x0, b.y0, b.x1, b.y1, word.text
        ));
    }

    lines.join("\n")
}

/// Build the user prompt for a heuristic request.
///
/// Assembles the schema and one rendered layout per sample into a single
/// prompt string. Image samples only get a reference to their attachment.
pub fn build_prompt(request: &HeuristicRequest) -> String {
    let schema = serde_json::to_string_pretty(&request.schema).unwrap_or_else(|_| "{}".into());
    let mut parts = vec![format!("// Extraction schema\n{}", schema)];

    let mut attached = 0;
    for (i, sample) in request.samples.iter().enumerate() {
        let body = match &sample.content {
            SampleContent::Layout(layout) => render_layout(layout),
            SampleContent::Image(_) => {
                attached += 1;
                format!("(rendered page, attached image {})", attached)
            }
        };
        parts.push(format!("// Sample {} ({})\n{}", i + 1, sample.name, body));
    }

    parts.push(format!(
        "// Instruction\nWrite the heuristic for the fields: {}",
        request
            .schema
            .keys()
            .map(String::as_str)
            .collect::<Vec<_>>()
            .join(", ")
    ));

    parts.join("\n\n")
}
