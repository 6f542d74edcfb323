//! quill-editor: Scenario graph editor for narrative games.
//!
//! Loads a game from the admin backend, reconciles its exits from whichever
//! source holds them, and keeps a normalized in-memory view. Every edit is a
//! single backend write followed by a full reload; a failed write is surfaced
//! and the reload skipped. A saved write whose reload fails still succeeds and
//! leaves the editor marked stale. Emits editor events for every load, write
//! and failure.

pub mod error;
pub mod exits;
pub mod flow;
pub mod locations;
pub mod ordering;
pub mod reconcile;
pub mod scenario;
pub mod store;

pub use error::EditorError;
pub use flow::FlowOverview;
pub use ordering::{Direction, MoveOutcome, MovePlan};
pub use reconcile::{EdgeSource, ReconciledEdges};
pub use store::GraphStore;

use std::sync::Arc;

use quill_api::{AdminBackend, ApiError};
use quill_core::document::ScenarioDocument;
use quill_core::events::{EventPayload, Notifier};
use quill_core::GameId;

use crate::error::Result;

/// An editing session over one game.
pub struct ScenarioEditor<B: AdminBackend + ?Sized> {
    backend: Arc<B>,
    game_id: GameId,
    store: GraphStore,
    notifier: Notifier,
    stale: bool,
}

impl<B: AdminBackend + ?Sized> ScenarioEditor<B> {
    /// Create an editor without loading anything.
    pub fn new(backend: Arc<B>, game_id: GameId) -> Self {
        Self {
            backend,
            game_id,
            store: GraphStore::new(),
            notifier: Notifier::disabled(),
            stale: false,
        }
    }

    /// Deliver editor events to `notifier`.
    pub fn with_notifier(mut self, notifier: Notifier) -> Self {
        self.notifier = notifier;
        self
    }

    /// Create an editor and load the game.
    pub async fn open(backend: Arc<B>, game_id: GameId, notifier: Notifier) -> Result<Self> {
        let mut editor = Self::new(backend, game_id).with_notifier(notifier);
        editor.reload().await?;
        Ok(editor)
    }

    /// Fetch the full game, reconcile its exits and replace the store.
    ///
    /// Only the full-game fetch is required; exit sources that fail are
    /// treated as empty.
    pub async fn reload(&mut self) -> Result<()> {
        let game = self
            .backend
            .fetch_full_game(&self.game_id)
            .await
            .map_err(|source| EditorError::Load {
                game_id: self.game_id.to_string(),
                source,
            })?;

        let edges =
            reconcile::reconcile_edges(self.backend.as_ref(), &self.game_id, &game.locations).await;
        let source = edges.source;
        self.store.replace(game, edges);
        self.stale = false;

        tracing::info!(
            game_id = %self.game_id,
            locations = self.store.location_count(),
            exits = self.store.exit_count(),
            source = %source,
            "Graph loaded"
        );
        self.notify(EventPayload::GraphLoaded {
            locations: self.store.location_count(),
            exits: self.store.exit_count(),
            source: source.to_string(),
        });
        Ok(())
    }

    pub fn game_id(&self) -> &GameId {
        &self.game_id
    }

    pub fn store(&self) -> &GraphStore {
        &self.store
    }

    pub fn backend(&self) -> &Arc<B> {
        &self.backend
    }

    /// True when a saved write could not be followed by a reload.
    pub fn is_stale(&self) -> bool {
        self.stale
    }

    /// Read-only overview of the flow with its warnings.
    pub fn flow(&self) -> FlowOverview {
        FlowOverview::build(&self.store)
    }

    /// Export the loaded game as a portable scenario document.
    pub fn export(&self) -> ScenarioDocument {
        scenario::export_scenario(&self.store)
    }

    pub(crate) fn notify(&self, payload: EventPayload) {
        self.notifier.emit(Some(&self.game_id), payload);
    }

    /// Reload after a saved write. A failed reload does not undo the write: it
    /// is logged, reported as [`EventPayload::ViewStale`] and the editor is
    /// marked stale until the next successful reload.
    pub(crate) async fn refresh_after_write(&mut self, operation: &'static str) {
        if let Err(err) = self.reload().await {
            tracing::warn!(game_id = %self.game_id, operation, error = %err, "Reload after write failed");
            self.stale = true;
            self.notify(EventPayload::ViewStale {
                operation: operation.to_string(),
                message: err.to_string(),
            });
        }
    }

    /// Report a rejected write and build the error returned to the caller.
    pub(crate) fn write_failed(&self, operation: &'static str, source: ApiError) -> EditorError {
        tracing::error!(game_id = %self.game_id, operation, error = %source, "Write failed");
        self.notify(EventPayload::WriteFailed {
            operation: operation.to_string(),
            message: source.to_string(),
        });
        EditorError::Write { operation, source }
    }
}
