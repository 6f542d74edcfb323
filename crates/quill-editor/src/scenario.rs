//! Scenario export and import.
//!
//! Export turns the loaded graph into a portable document where locations
//! are keyed `L1..LN` by position; import posts such a document to create a
//! new game.

use std::collections::HashMap;
use std::path::Path;

use quill_api::AdminBackend;
use quill_core::document::{ScenarioDocument, ScenarioExit, ScenarioGame, ScenarioLocation};
use quill_core::{GameId, LocationId};

use crate::error::{EditorError, Result};
use crate::store::GraphStore;

/// Build a scenario document from the loaded graph.
pub fn export_scenario(store: &GraphStore) -> ScenarioDocument {
    let game = store
        .info()
        .map(|info| ScenarioGame {
            title: info.title.clone(),
            description: info.description.clone(),
            author: info.author.clone(),
            cover_url: info.cover_url.clone(),
            rules: info.rules.clone(),
            status: info.status,
        })
        .unwrap_or_default();

    let keys: HashMap<&LocationId, String> = store
        .locations()
        .iter()
        .enumerate()
        .map(|(i, l)| (&l.id, format!("L{}", i + 1)))
        .collect();

    let locations = store
        .locations()
        .iter()
        .map(|l| ScenarioLocation {
            key: keys[&l.id].clone(),
            order: l.order,
            title: l.title.clone(),
            description: l.description.clone(),
            rules_prompt: l.rules_prompt.clone(),
            background_url: l.background_url.clone(),
            music_url: l.music_url.clone(),
        })
        .collect();

    let mut exits = Vec::with_capacity(store.exit_count());
    for location in store.locations() {
        for exit in store.exits_of(&location.id) {
            let to_key = match &exit.target_location_id {
                Some(target) => match keys.get(target) {
                    Some(key) => Some(key.clone()),
                    None => {
                        tracing::warn!(exit_id = %exit.id, target = %target, "Exit target is not a location of the game, exported without target");
                        None
                    }
                },
                None => None,
            };
            exits.push(ScenarioExit {
                from_key: keys[&location.id].clone(),
                exit_type: exit.exit_type,
                button_text: exit.button_text.clone(),
                trigger_text: exit.trigger_text.clone(),
                to_key,
                is_game_over: exit.is_game_over,
            });
        }
    }

    let orphans = store.exit_count().saturating_sub(exits.len());
    if orphans > 0 {
        tracing::warn!(orphans, "Exits without a known owning location were not exported");
    }

    ScenarioDocument {
        game,
        locations,
        exits,
    }
}

pub fn write_export(document: &ScenarioDocument, path: &Path) -> Result<()> {
    std::fs::write(path, document.to_json_pretty()?)?;
    tracing::info!(
        path = %path.display(),
        locations = document.locations.len(),
        exits = document.exits.len(),
        "Scenario exported"
    );
    Ok(())
}

/// Read and validate a scenario document.
pub fn read_document(path: &Path) -> Result<ScenarioDocument> {
    let json = std::fs::read_to_string(path)?;
    let document = ScenarioDocument::from_json(&json)?;
    document.validate()?;
    Ok(document)
}

/// Create a new game from a document; returns its id.
pub async fn import_scenario<B>(backend: &B, document: &ScenarioDocument) -> Result<GameId>
where
    B: AdminBackend + ?Sized,
{
    document.validate()?;

    let imported = backend
        .import_scenario(document)
        .await
        .map_err(|source| EditorError::Write {
            operation: "import_scenario",
            source,
        })?;
    let game_id = imported.game_id.ok_or(EditorError::MissingGameId)?;

    tracing::info!(
        game_id = %game_id,
        locations = document.locations.len(),
        exits = document.exits.len(),
        "Scenario imported"
    );
    Ok(game_id)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use quill_api::InMemoryBackend;
    use quill_core::events::Notifier;
    use quill_core::{ExitDraft, ExitType};

    use super::*;
    use crate::ScenarioEditor;

    async fn seeded() -> ScenarioEditor<InMemoryBackend> {
        let backend = Arc::new(InMemoryBackend::new());
        let game = backend.insert_game("Lighthouse");
        let shore = backend.insert_location(&game, "Shore", 10);
        let tower = backend.insert_location(&game, "Tower", 20);
        let lamp = backend.insert_location(&game, "Lamp room", 30);
        backend.insert_exit(&shore, ExitDraft::button("Climb", tower.clone()));
        backend.insert_exit(&tower, ExitDraft::trigger("up", lamp.clone()));
        backend.insert_exit(&tower, ExitDraft::button("Down", shore.clone()));
        backend.insert_exit(&lamp, ExitDraft::game_over("Fall"));
        ScenarioEditor::open(backend, game, Notifier::disabled())
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_export_keys_follow_position() {
        let editor = seeded().await;
        let doc = editor.export();

        let keys: Vec<&str> = doc.locations.iter().map(|l| l.key.as_str()).collect();
        assert_eq!(keys, vec!["L1", "L2", "L3"]);
        assert_eq!(doc.locations[1].order, 20);
        assert_eq!(doc.exits.len(), 4);
        assert_eq!(doc.exits[0].from_key, "L1");
        assert_eq!(doc.exits[0].to_key.as_deref(), Some("L2"));
        assert_eq!(doc.exits[3].exit_type, ExitType::Gameover);
        assert_eq!(doc.exits[3].to_key, None);
        doc.validate().unwrap();
    }

    #[tokio::test]
    async fn test_round_trip_preserves_structure() {
        let editor = seeded().await;
        let doc = editor.export();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("lighthouse.json");
        write_export(&doc, &path).unwrap();

        let read = read_document(&path).unwrap();
        assert_eq!(read, doc);

        let backend = editor.backend().clone();
        let game_id = import_scenario(backend.as_ref(), &read).await.unwrap();
        let copy = ScenarioEditor::open(backend, game_id, Notifier::disabled())
            .await
            .unwrap();

        assert_eq!(copy.store().location_count(), 3);
        assert_eq!(copy.store().exit_count(), 4);
        assert_eq!(copy.export().exits, doc.exits);
        assert_eq!(copy.export().locations, doc.locations);
    }

    #[tokio::test]
    async fn test_dangling_target_exports_without_key() {
        let backend = Arc::new(InMemoryBackend::new());
        let game = backend.insert_game("Broken");
        let a = backend.insert_location(&game, "A", 1);
        let b = backend.insert_location(&game, "B", 2);
        backend.insert_exit(&a, ExitDraft::button("To B", b.clone()));
        let mut editor = ScenarioEditor::open(backend, game, Notifier::disabled())
            .await
            .unwrap();
        editor.delete_location(&b).await.unwrap();

        let doc = editor.export();
        assert_eq!(doc.exits.len(), 1);
        assert_eq!(doc.exits[0].to_key, None);
        doc.validate().unwrap();
    }

    #[tokio::test]
    async fn test_invalid_document_is_not_posted() {
        let editor = seeded().await;
        let mut doc = editor.export();
        doc.exits[0].to_key = Some("L99".to_string());
        let backend = editor.backend().clone();
        backend.clear_calls();

        let err = import_scenario(backend.as_ref(), &doc).await.unwrap_err();
        assert!(matches!(err, EditorError::Core(_)));
        assert!(backend.calls().is_empty());
    }
}
