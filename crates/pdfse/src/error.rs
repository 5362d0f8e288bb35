#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("Dataset error: {0}")]
    Dataset(String),

    #[error("Cannot read document {path}: {reason}")]
    Document { path: String, reason: String },

    #[error("Heuristic generation failed: {0}")]
    Generation(String),
}
