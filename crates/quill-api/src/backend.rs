//! The backend surface consumed by the editor and the import job client.

use async_trait::async_trait;

use quill_core::document::{ImportedScenario, ScenarioDocument};
use quill_core::{
    Exit, ExitDraft, ExitId, ExitPatch, Game, GameId, GameInfo, GamePatch, JobId, JobSnapshot,
    JobTicket, Location, LocationDraft, LocationId, LocationPatch, SourceDocument,
};

use crate::client::{ApiClient, ApiError};

/// Trait for admin backends.
///
/// No operation is transactional and none carries a concurrency token:
/// the last writer wins at the field level.
#[async_trait]
pub trait AdminBackend: Send + Sync {
    /// Fetch a game with nested locations.
    async fn fetch_full_game(&self, game_id: &GameId) -> Result<Game, ApiError>;

    /// Fetch all exits of a game (aggregate source).
    async fn fetch_game_exits(&self, game_id: &GameId) -> Result<Vec<Exit>, ApiError>;

    /// Fetch the exits of one location (per-location source).
    async fn fetch_location_exits(&self, location_id: &LocationId)
        -> Result<Vec<Exit>, ApiError>;

    async fn patch_game(&self, game_id: &GameId, patch: &GamePatch) -> Result<GameInfo, ApiError>;

    async fn create_location(
        &self,
        game_id: &GameId,
        draft: &LocationDraft,
    ) -> Result<Location, ApiError>;

    async fn patch_location(
        &self,
        location_id: &LocationId,
        patch: &LocationPatch,
    ) -> Result<Location, ApiError>;

    async fn delete_location(&self, location_id: &LocationId) -> Result<(), ApiError>;

    async fn create_exit(&self, location_id: &LocationId, draft: &ExitDraft)
        -> Result<Exit, ApiError>;

    async fn patch_exit(&self, exit_id: &ExitId, patch: &ExitPatch) -> Result<Exit, ApiError>;

    async fn delete_exit(&self, exit_id: &ExitId) -> Result<(), ApiError>;

    /// Submit a document and start an ingestion job.
    async fn start_ingest(&self, document: &SourceDocument) -> Result<JobTicket, ApiError>;

    /// Observe an ingestion job.
    async fn poll_ingest(&self, job_id: &JobId) -> Result<JobSnapshot, ApiError>;

    /// Create a game from a scenario document.
    async fn import_scenario(
        &self,
        document: &ScenarioDocument,
    ) -> Result<ImportedScenario, ApiError>;
}

#[async_trait]
impl AdminBackend for ApiClient {
    async fn fetch_full_game(&self, game_id: &GameId) -> Result<Game, ApiError> {
        ApiClient::fetch_full_game(self, game_id).await
    }

    async fn fetch_game_exits(&self, game_id: &GameId) -> Result<Vec<Exit>, ApiError> {
        ApiClient::fetch_game_exits(self, game_id).await
    }

    async fn fetch_location_exits(
        &self,
        location_id: &LocationId,
    ) -> Result<Vec<Exit>, ApiError> {
        ApiClient::fetch_location_exits(self, location_id).await
    }

    async fn patch_game(&self, game_id: &GameId, patch: &GamePatch) -> Result<GameInfo, ApiError> {
        ApiClient::patch_game(self, game_id, patch).await
    }

    async fn create_location(
        &self,
        game_id: &GameId,
        draft: &LocationDraft,
    ) -> Result<Location, ApiError> {
        ApiClient::create_location(self, game_id, draft).await
    }

    async fn patch_location(
        &self,
        location_id: &LocationId,
        patch: &LocationPatch,
    ) -> Result<Location, ApiError> {
        ApiClient::patch_location(self, location_id, patch).await
    }

    async fn delete_location(&self, location_id: &LocationId) -> Result<(), ApiError> {
        ApiClient::delete_location(self, location_id).await
    }

    async fn create_exit(
        &self,
        location_id: &LocationId,
        draft: &ExitDraft,
    ) -> Result<Exit, ApiError> {
        ApiClient::create_exit(self, location_id, draft).await
    }

    async fn patch_exit(&self, exit_id: &ExitId, patch: &ExitPatch) -> Result<Exit, ApiError> {
        ApiClient::patch_exit(self, exit_id, patch).await
    }

    async fn delete_exit(&self, exit_id: &ExitId) -> Result<(), ApiError> {
        ApiClient::delete_exit(self, exit_id).await
    }

    async fn start_ingest(&self, document: &SourceDocument) -> Result<JobTicket, ApiError> {
        ApiClient::start_ingest(self, document).await
    }

    async fn poll_ingest(&self, job_id: &JobId) -> Result<JobSnapshot, ApiError> {
        ApiClient::poll_ingest(self, job_id).await
    }

    async fn import_scenario(
        &self,
        document: &ScenarioDocument,
    ) -> Result<ImportedScenario, ApiError> {
        ApiClient::import_scenario(self, document).await
    }
}
