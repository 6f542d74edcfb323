//! Location create, update and delete, plus game metadata edits.

use quill_api::AdminBackend;
use quill_core::events::EventPayload;
use quill_core::{GameInfo, GamePatch, Location, LocationDraft, LocationId, LocationPatch};

use crate::error::{EditorError, Result};
use crate::store::GraphStore;
use crate::ScenarioEditor;

/// Order for a location appended after every existing one.
pub fn next_order(store: &GraphStore) -> i64 {
    store.locations().iter().map(|l| l.order).max().unwrap_or(0) + 1
}

fn patched_fields(patch: &GamePatch) -> Vec<String> {
    [
        ("title", patch.title.is_some()),
        ("description", patch.description.is_some()),
        ("author", patch.author.is_some()),
        ("coverUrl", patch.cover_url.is_some()),
        ("rules", patch.rules.is_some()),
        ("status", patch.status.is_some()),
    ]
    .into_iter()
    .filter(|(_, set)| *set)
    .map(|(name, _)| name.to_string())
    .collect()
}

impl<B: AdminBackend + ?Sized> ScenarioEditor<B> {
    /// Add a location. Without an explicit order it is appended last.
    pub async fn add_location(&mut self, mut draft: LocationDraft) -> Result<Location> {
        if draft.order.is_none() {
            draft.order = Some(next_order(&self.store));
        }

        let created = match self.backend.create_location(&self.game_id, &draft).await {
            Ok(location) => location,
            Err(source) => return Err(self.write_failed("add_location", source)),
        };

        tracing::info!(location_id = %created.id, order = created.order, "Location added");
        self.notify(EventPayload::LocationAdded {
            location_id: created.id.clone(),
        });

        self.refresh_after_write("add_location").await;
        Ok(created)
    }

    pub async fn update_location(
        &mut self,
        location_id: &LocationId,
        patch: LocationPatch,
    ) -> Result<Location> {
        if !self.store.contains_location(location_id) {
            return Err(EditorError::LocationNotFound(location_id.clone()));
        }

        let updated = match self.backend.patch_location(location_id, &patch).await {
            Ok(location) => location,
            Err(source) => return Err(self.write_failed("update_location", source)),
        };

        tracing::info!(location_id = %location_id, "Location updated");
        self.notify(EventPayload::LocationUpdated {
            location_id: location_id.clone(),
        });

        self.refresh_after_write("update_location").await;
        Ok(updated)
    }

    /// Delete a location. Exits elsewhere that target it are not touched and
    /// show up as dangling in the flow overview.
    pub async fn delete_location(&mut self, location_id: &LocationId) -> Result<()> {
        if !self.store.contains_location(location_id) {
            return Err(EditorError::LocationNotFound(location_id.clone()));
        }

        if let Err(source) = self.backend.delete_location(location_id).await {
            return Err(self.write_failed("delete_location", source));
        }

        let inbound = self
            .store
            .all_exits()
            .iter()
            .filter(|e| e.target_location_id.as_ref() == Some(location_id))
            .count();
        tracing::info!(location_id = %location_id, inbound, "Location deleted");
        self.notify(EventPayload::LocationDeleted {
            location_id: location_id.clone(),
        });

        self.refresh_after_write("delete_location").await;
        Ok(())
    }

    /// Patch the game's metadata. An empty patch is not sent.
    pub async fn update_game(&mut self, patch: GamePatch) -> Result<Option<GameInfo>> {
        if patch.is_empty() {
            return Ok(self.store.info().cloned());
        }

        let updated = match self.backend.patch_game(&self.game_id, &patch).await {
            Ok(info) => info,
            Err(source) => return Err(self.write_failed("update_game", source)),
        };

        let fields = patched_fields(&patch);
        tracing::info!(game_id = %self.game_id, ?fields, "Game updated");
        self.notify(EventPayload::GameUpdated { fields });

        self.refresh_after_write("update_game").await;
        Ok(Some(updated))
    }
}
