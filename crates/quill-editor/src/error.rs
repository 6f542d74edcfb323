//! Error types for the quill-editor crate.

use thiserror::Error;

use quill_api::ApiError;
use quill_core::{CoreError, ExitId, LocationId};

#[derive(Error, Debug)]
pub enum EditorError {
    /// The full-game fetch failed; nothing was loaded.
    #[error("Failed to load game {game_id}: {source}")]
    Load {
        game_id: String,
        #[source]
        source: ApiError,
    },

    /// A write was rejected by the backend. The graph was not reloaded.
    #[error("{operation} failed: {source}")]
    Write {
        operation: &'static str,
        #[source]
        source: ApiError,
    },

    #[error("Location not found: {0}")]
    LocationNotFound(LocationId),

    #[error("Exit not found: {0}")]
    ExitNotFound(ExitId),

    #[error("Exit target {0} is not a location of this game")]
    UnknownTarget(LocationId),

    #[error("Invalid exit: {0}")]
    InvalidExit(String),

    #[error("Scenario import returned no game id")]
    MissingGameId,

    #[error(transparent)]
    Core(#[from] CoreError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, EditorError>;
