use crate::prelude::*;
use pdfse_core::heuristics::{Entry, ExtractionSchema};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// One row of the dataset file, before ids and path resolution.
#[derive(Debug, Deserialize)]
struct DatasetEntry {
    label: String,
    pdf_path: PathBuf,
    extraction_schema: ExtractionSchema,
}

/// Load the dataset: a JSON list of `{label, pdf_path, extraction_schema}`.
///
/// PDF paths are resolved against the dataset's directory and entries get
/// 1-based ids in file order. A missing or invalid dataset is fatal.
pub fn load_dataset(path: &Path) -> Result<Vec<Entry>> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::Dataset(f!("cannot read {}: {}", path.display(), e)))?;

    let rows: Vec<DatasetEntry> = serde_json::from_str(&content)
        .map_err(|e| Error::Dataset(f!("invalid dataset {}: {}", path.display(), e)))?;

    let base = dataset_dir(path);

    Ok(rows
        .into_iter()
        .enumerate()
        .map(|(index, row)| Entry {
            id: index + 1,
            label: row.label,
            pdf_path: base.join(row.pdf_path),
            extraction_schema: row.extraction_schema,
        })
        .collect())
}

/// Directory the dataset's PDF paths are relative to.
pub fn dataset_dir(path: &Path) -> &Path {
    path.parent().unwrap_or(Path::new(""))
}

/// `pdf_path` as written relative to the dataset directory.
pub fn relative_pdf_path(pdf_path: &Path, base: &Path) -> String {
    pdf_path
        .strip_prefix(base)
        .unwrap_or(pdf_path)
        .display()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_load_dataset() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("dataset.json");
        std::fs::write(
            &path,
            r#"[
                {"label": "invoice", "pdf_path": "files/a.pdf", "extraction_schema": {"total": "Total due"}},
                {"label": "receipt", "pdf_path": "b.pdf", "extraction_schema": {}}
            ]"#,
        )
        .unwrap();

        let entries = load_dataset(&path).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].id, 1);
        assert_eq!(entries[1].id, 2);
        assert_eq!(entries[0].pdf_path, dir.path().join("files/a.pdf"));
        assert_eq!(entries[0].extraction_schema["total"], "Total due");
        assert_eq!(
            relative_pdf_path(&entries[0].pdf_path, dataset_dir(&path)),
            Path::new("files").join("a.pdf").display().to_string()
        );
    }

    #[test]
    fn test_missing_dataset_is_fatal() {
        let dir = TempDir::new().unwrap();
        let err = load_dataset(&dir.path().join("missing.json")).unwrap_err();
        assert!(err.to_string().contains("Dataset error"));
    }

    #[test]
    fn test_invalid_dataset_is_fatal() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("dataset.json");
        std::fs::write(&path, r#"[{"label": 3}]"#).unwrap();
        assert!(load_dataset(&path).is_err());
    }

    #[test]
    fn test_relative_path_outside_base() {
        let outside = Path::new("/elsewhere/c.pdf");
        assert_eq!(
            relative_pdf_path(outside, Path::new("/data")),
            outside.display().to_string()
        );
    }
}
