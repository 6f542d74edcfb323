//! quill-ingest: Document ingestion client for the Quill admin backend.
//!
//! Uploads a source document, follows the server-side ingestion job until it
//! produces a game, applies title/author/cover overrides, and hands the new
//! game to the scenario editor.

pub mod config;
pub mod error;
pub mod job;

pub use config::IngestConfig;
pub use error::IngestError;
pub use job::{import_controls, ImportHandle, ImportJobClient, ImportOutcome, ImportOverrides};

use std::sync::Arc;

use quill_api::AdminBackend;
use quill_core::events::Notifier;
use quill_editor::ScenarioEditor;

/// Open the editor on the game produced by a finished import.
pub async fn open_imported<B>(
    backend: Arc<B>,
    outcome: &ImportOutcome,
    notifier: Notifier,
) -> error::Result<ScenarioEditor<B>>
where
    B: AdminBackend + ?Sized,
{
    let game_id = outcome
        .game_id()
        .cloned()
        .ok_or_else(|| IngestError::NotImported(outcome.user_message()))?;
    Ok(ScenarioEditor::open(backend, game_id, notifier).await?)
}
