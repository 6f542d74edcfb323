//! Exit create, update and delete.

use quill_api::AdminBackend;
use quill_core::events::EventPayload;
use quill_core::{Exit, ExitDraft, ExitId, ExitPatch, ExitType, LocationId};

use crate::error::{EditorError, Result};
use crate::store::GraphStore;
use crate::ScenarioEditor;

fn has_text(text: Option<&str>) -> bool {
    text.is_some_and(|t| !t.trim().is_empty())
}

/// Check the fields of an exit against the loaded graph.
fn validate_fields(
    store: &GraphStore,
    exit_type: ExitType,
    button_text: Option<&str>,
    trigger_text: Option<&str>,
    target: Option<&LocationId>,
) -> Result<()> {
    match exit_type {
        ExitType::Button if !has_text(button_text) => {
            return Err(EditorError::InvalidExit(
                "a BUTTON exit needs button text".to_string(),
            ))
        }
        ExitType::Trigger if !has_text(trigger_text) => {
            return Err(EditorError::InvalidExit(
                "a TRIGGER exit needs trigger text".to_string(),
            ))
        }
        _ => {}
    }
    if let Some(target) = target {
        if !store.contains_location(target) {
            return Err(EditorError::UnknownTarget(target.clone()));
        }
    }
    Ok(())
}

pub fn validate_draft(store: &GraphStore, draft: &ExitDraft) -> Result<()> {
    validate_fields(
        store,
        draft.exit_type,
        draft.button_text.as_deref(),
        draft.trigger_text.as_deref(),
        draft.target_location_id.as_ref(),
    )
}

/// Validate the exit that results from applying `patch` to `current`.
///
/// Only a target that the patch sets is checked against the graph; an
/// existing dangling target is left for the flow overview to report.
pub fn validate_patch(store: &GraphStore, current: &Exit, patch: &ExitPatch) -> Result<()> {
    let mut merged = current.clone();
    patch.apply_to(&mut merged);
    let new_target = patch
        .target_location_id
        .as_ref()
        .and_then(|target| target.as_ref());
    validate_fields(
        store,
        merged.exit_type,
        merged.button_text.as_deref(),
        merged.trigger_text.as_deref(),
        new_target,
    )
}

impl<B: AdminBackend + ?Sized> ScenarioEditor<B> {
    /// Create an exit leaving `location_id`.
    ///
    /// The created exit is staged in the store right away; the reload that
    /// follows replaces it with whatever the backend reports.
    pub async fn create_exit(&mut self, location_id: &LocationId, draft: ExitDraft) -> Result<Exit> {
        if !self.store.contains_location(location_id) {
            return Err(EditorError::LocationNotFound(location_id.clone()));
        }
        validate_draft(&self.store, &draft)?;

        let created = match self.backend.create_exit(location_id, &draft).await {
            Ok(exit) => exit,
            Err(source) => return Err(self.write_failed("create_exit", source)),
        };
        let mut staged = created.clone();
        staged.location_id = Some(location_id.clone());
        self.store.stage_exit(staged);

        tracing::info!(exit_id = %created.id, location_id = %location_id, exit_type = %created.exit_type, "Exit created");
        self.notify(EventPayload::ExitCreated {
            exit_id: created.id.clone(),
            location_id: location_id.clone(),
        });

        self.refresh_after_write("create_exit").await;
        Ok(created)
    }

    pub async fn update_exit(&mut self, exit_id: &ExitId, patch: ExitPatch) -> Result<Exit> {
        let current = self
            .store
            .exit(exit_id)
            .ok_or_else(|| EditorError::ExitNotFound(exit_id.clone()))?;
        validate_patch(&self.store, current, &patch)?;

        let updated = match self.backend.patch_exit(exit_id, &patch).await {
            Ok(exit) => exit,
            Err(source) => return Err(self.write_failed("update_exit", source)),
        };

        tracing::info!(exit_id = %exit_id, "Exit updated");
        self.notify(EventPayload::ExitUpdated {
            exit_id: exit_id.clone(),
        });

        self.refresh_after_write("update_exit").await;
        Ok(updated)
    }

    pub async fn delete_exit(&mut self, exit_id: &ExitId) -> Result<()> {
        if self.store.exit(exit_id).is_none() {
            return Err(EditorError::ExitNotFound(exit_id.clone()));
        }

        if let Err(source) = self.backend.delete_exit(exit_id).await {
            return Err(self.write_failed("delete_exit", source));
        }

        tracing::info!(exit_id = %exit_id, "Exit deleted");
        self.notify(EventPayload::ExitDeleted {
            exit_id: exit_id.clone(),
        });

        self.refresh_after_write("delete_exit").await;
        Ok(())
    }
}
