use crate::prelude::{eprintln, *};
use log::debug;
use pdfse_core::heuristics::{Entry, Extraction, ExtractionSchema, Heuristic};
use pdfse_core::interpreter::extract_fields;
use pdfse_core::word::PageLayout;
use pdfse_core::wordspace::WordSpace;
use std::path::Path;

/// Read the first page of a PDF as positioned words.
pub fn load_layout(path: &Path) -> Result<PageLayout> {
    load_page_layout(path, 0)
}

pub fn load_page_layout(path: &Path, page: usize) -> Result<PageLayout> {
    let document_error = |reason: String| Error::Document {
        path: path.display().to_string(),
        reason,
    };

    let bytes = std::fs::read(path).map_err(|e| document_error(e.to_string()))?;
    let layout = pdf::page_layout(&bytes, page).map_err(|e| document_error(e.to_string()))?;
    debug!("{}: {} words", path.display(), layout.words.len());

    Ok(layout)
}

/// Draw the words of `layout` onto a PNG.
pub fn render_layout_png(path: &Path, layout: &PageLayout) -> Result<Vec<u8>> {
    let png = pdf::render::render_png(layout).map_err(|e| Error::Document {
        path: path.display().to_string(),
        reason: e.to_string(),
    })?;
    debug!("{}: rendered {} bytes", path.display(), png.len());

    Ok(png)
}

/// Every schema field, absent.
pub fn empty_extraction(schema: &ExtractionSchema) -> Extraction {
    schema.keys().map(|field| (field.clone(), None)).collect()
}

/// Extract one dataset entry with its label's heuristic.
///
/// A document that cannot be read yields every field absent.
pub fn process_entry(entry: &Entry, heuristic: &Heuristic) -> Extraction {
    match load_layout(&entry.pdf_path) {
        Ok(layout) => {
            let mut ws = WordSpace::from_layout(layout);
            extract_fields(&mut ws, heuristic, &entry.extraction_schema)
        }
        Err(e) => {
            eprintln!("{} Error processing entry #{}: {}", fail_mark(), entry.id, e);
            empty_extraction(&entry.extraction_schema)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::write_pdf;
    use pdfse_core::heuristics::heuristic_from_value;
    use serde_json::json;
    use tempfile::TempDir;

    fn entry(path: &Path, fields: &[&str]) -> Entry {
        Entry {
            id: 1,
            label: "invoice".into(),
            pdf_path: path.to_path_buf(),
            extraction_schema: fields
                .iter()
                .map(|f| (f.to_string(), f.to_string()))
                .collect(),
        }
    }

    #[test]
    fn test_process_entry() {
        let dir = TempDir::new().unwrap();
        let path = write_pdf(
            dir.path(),
            "a.pdf",
            &[(50, 700, "Invoice 2024"), (50, 650, "Total: 99.90")],
        );
        let heuristic = heuristic_from_value(&json!({
            "total": [
                {"type": "command", "name": "anchor_to_text", "args": {"text": "total:"}},
                {"type": "command", "name": "move_right"},
                {"type": "command", "name": "collect"}
            ],
            "ignored": [{"type": "command", "name": "collect"}]
        }));

        let extraction = process_entry(&entry(&path, &["total", "number"]), &heuristic);
        assert_eq!(extraction.len(), 2);
        assert_eq!(extraction["total"].as_deref(), Some("99.90"));
        assert_eq!(extraction["number"], None);
    }

    #[test]
    fn test_unreadable_document_yields_absent_fields() {
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("missing.pdf");
        let heuristic = heuristic_from_value(&json!({
            "total": [{"type": "command", "name": "collect"}]
        }));

        let extraction = process_entry(&entry(&missing, &["total", "date"]), &heuristic);
        assert_eq!(extraction, empty_extraction(&entry(&missing, &["total", "date"]).extraction_schema));
        assert!(extraction.values().all(Option::is_none));
    }

    #[test]
    fn test_render_layout_png() {
        let dir = TempDir::new().unwrap();
        let path = write_pdf(dir.path(), "a.pdf", &[(50, 700, "Total: 99.90")]);
        let layout = load_layout(&path).unwrap();

        let png = render_layout_png(&path, &layout).unwrap();
        assert!(png.starts_with(&[0x89, b'P', b'N', b'G']));
    }

    #[test]
    fn test_load_layout_reports_path() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("broken.pdf");
        std::fs::write(&path, b"not a pdf").unwrap();

        let err = load_layout(&path).unwrap_err();
        assert!(err.to_string().contains("broken.pdf"));
    }
}
