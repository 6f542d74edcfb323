//! Write operations against the admin backend.
//!
//! Every call returns the backend's view of the written entity; callers
//! reload the graph afterwards instead of trusting local patches.

use reqwest::multipart::{Form, Part};
use reqwest::Method;

use quill_core::document::{ImportedScenario, ScenarioDocument};
use quill_core::{
    Exit, ExitDraft, ExitId, ExitPatch, GameId, GameInfo, GamePatch, JobTicket, Location,
    LocationDraft, LocationId, LocationPatch, SourceDocument,
};

use crate::client::{decode, ApiClient, ApiError};
use crate::queries::paths::segment;

/// REST paths of the write endpoints.
pub mod paths {
    use super::*;

    pub const INGEST: &str = "/admin/ingest-import";
    pub const SCENARIO_IMPORT: &str = "/admin/scenario/import";

    pub fn game(game_id: &GameId) -> String {
        format!("/admin/games/{}", segment(game_id.as_str()))
    }

    pub fn game_locations(game_id: &GameId) -> String {
        format!("/games/{}/locations", segment(game_id.as_str()))
    }

    pub fn location(location_id: &LocationId) -> String {
        format!("/locations/{}", segment(location_id.as_str()))
    }

    pub fn location_exits(location_id: &LocationId) -> String {
        format!("/locations/{}/exits", segment(location_id.as_str()))
    }

    pub fn exit(exit_id: &ExitId) -> String {
        format!("/exits/{}", segment(exit_id.as_str()))
    }
}

impl ApiClient {
    // ── Game ─────────────────────────────────────────────────────

    /// Patch game metadata.
    pub async fn patch_game(&self, game_id: &GameId, patch: &GamePatch) -> Result<GameInfo, ApiError> {
        self.send_json(Method::PATCH, &paths::game(game_id), patch)
            .await
    }

    // ── Locations ────────────────────────────────────────────────

    pub async fn create_location(
        &self,
        game_id: &GameId,
        draft: &LocationDraft,
    ) -> Result<Location, ApiError> {
        self.send_json(Method::POST, &paths::game_locations(game_id), draft)
            .await
    }

    pub async fn patch_location(
        &self,
        location_id: &LocationId,
        patch: &LocationPatch,
    ) -> Result<Location, ApiError> {
        self.send_json(Method::PATCH, &paths::location(location_id), patch)
            .await
    }

    pub async fn delete_location(&self, location_id: &LocationId) -> Result<(), ApiError> {
        self.delete(&paths::location(location_id)).await
    }

    // ── Exits ────────────────────────────────────────────────────

    pub async fn create_exit(
        &self,
        location_id: &LocationId,
        draft: &ExitDraft,
    ) -> Result<Exit, ApiError> {
        self.send_json(Method::POST, &paths::location_exits(location_id), draft)
            .await
    }

    pub async fn patch_exit(&self, exit_id: &ExitId, patch: &ExitPatch) -> Result<Exit, ApiError> {
        self.send_json(Method::PATCH, &paths::exit(exit_id), patch)
            .await
    }

    pub async fn delete_exit(&self, exit_id: &ExitId) -> Result<(), ApiError> {
        self.delete(&paths::exit(exit_id)).await
    }

    // ── Ingestion / scenario import ──────────────────────────────

    /// Upload a document and start an ingestion job.
    pub async fn start_ingest(&self, document: &SourceDocument) -> Result<JobTicket, ApiError> {
        let part = Part::bytes(document.bytes.clone())
            .file_name(document.file_name.clone())
            .mime_str(&document.content_type)?;
        let form = Form::new().part("file", part);

        let builder = self.request(Method::POST, paths::INGEST).multipart(form);
        let body = self.send(Method::POST, paths::INGEST, builder).await?;
        decode(paths::INGEST, &body)
    }

    /// Create a new game from a scenario document.
    pub async fn import_scenario(
        &self,
        document: &ScenarioDocument,
    ) -> Result<ImportedScenario, ApiError> {
        self.send_json(Method::POST, paths::SCENARIO_IMPORT, document)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_paths() {
        assert_eq!(paths::game(&GameId::new("5")), "/admin/games/5");
        assert_eq!(paths::game_locations(&GameId::new("5")), "/games/5/locations");
        assert_eq!(paths::location(&LocationId::new("9")), "/locations/9");
        assert_eq!(paths::exit(&ExitId::new("e")), "/exits/e");
        assert_eq!(paths::location(&LocationId::new("x y")), "/locations/x%20y");
    }
}
