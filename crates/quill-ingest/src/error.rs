//! Error types for the quill-ingest crate.
//!
//! Job outcomes (rejected, failed, timed out, cancelled) are values, not
//! errors; see [`crate::job::ImportOutcome`].

use thiserror::Error;

#[derive(Error, Debug)]
pub enum IngestError {
    #[error("Editor error: {0}")]
    Editor(#[from] quill_editor::EditorError),

    #[error("Import ended without a game: {0}")]
    NotImported(String),
}

pub type Result<T> = std::result::Result<T, IngestError>;
