//! Read operations against the admin backend.

use quill_core::{Exit, Game, GameId, JobId, JobSnapshot, LocationId};

use crate::client::{ApiClient, ApiError};

/// REST paths of the read endpoints.
pub mod paths {
    use std::borrow::Cow;

    use super::*;

    /// Percent-encode an opaque id for use as one path segment.
    pub fn segment(id: &str) -> Cow<'_, str> {
        urlencoding::encode(id)
    }

    pub fn full_game(game_id: &GameId) -> String {
        format!("/admin/games/{}/full", segment(game_id.as_str()))
    }

    pub fn game_exits(game_id: &GameId) -> String {
        format!("/games/{}/exits", segment(game_id.as_str()))
    }

    pub fn location_exits(location_id: &LocationId) -> String {
        format!("/locations/{}/exits", segment(location_id.as_str()))
    }

    pub fn ingest_job(job_id: &JobId) -> String {
        format!("/admin/ingest-import/{}", segment(job_id.as_str()))
    }
}

impl ApiClient {
    /// Fetch a game with its nested locations (each optionally carrying inline exits).
    pub async fn fetch_full_game(&self, game_id: &GameId) -> Result<Game, ApiError> {
        self.get_json(&paths::full_game(game_id)).await
    }

    /// Fetch every exit of a game, each tagged with its owning location.
    pub async fn fetch_game_exits(&self, game_id: &GameId) -> Result<Vec<Exit>, ApiError> {
        self.get_json(&paths::game_exits(game_id)).await
    }

    /// Fetch the exits of one location.
    pub async fn fetch_location_exits(
        &self,
        location_id: &LocationId,
    ) -> Result<Vec<Exit>, ApiError> {
        self.get_json(&paths::location_exits(location_id)).await
    }

    /// Fetch the current status of an ingestion job.
    pub async fn poll_ingest(&self, job_id: &JobId) -> Result<JobSnapshot, ApiError> {
        self.get_json(&paths::ingest_job(job_id)).await
    }
}
