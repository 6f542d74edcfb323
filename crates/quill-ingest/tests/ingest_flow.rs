//! Document on disk → ingestion job → editor on the new game.

use std::sync::Arc;
use std::time::Duration;

use quill_api::memory::{IngestStart, PollStep};
use quill_api::InMemoryBackend;
use quill_core::events::{EventPayload, Notifier};
use quill_core::{ExitDraft, JobId, JobSnapshot, SourceDocument};
use quill_ingest::job::ImportPhase;
use quill_ingest::{
    import_controls, open_imported, ImportJobClient, ImportOutcome, ImportOverrides, IngestConfig,
};

fn write_document(dir: &tempfile::TempDir) -> SourceDocument {
    let path = dir.path().join("lighthouse.md");
    std::fs::write(&path, "# The Lighthouse\n\nA keeper climbs the tower.").unwrap();
    SourceDocument::read(&path).unwrap()
}

#[tokio::test(start_paused = true)]
async fn test_imported_game_opens_with_overrides() {
    let backend = Arc::new(InMemoryBackend::new());
    let game = backend.insert_game("lighthouse.md");
    let shore = backend.insert_location(&game, "Shore", 1);
    let tower = backend.insert_location(&game, "Tower", 2);
    backend.insert_exit(&shore, ExitDraft::button("Climb", tower.clone()));
    backend.insert_exit(&tower, ExitDraft::game_over("Jump"));
    backend.script_ingest(
        IngestStart::Job(JobId::new("job-42")),
        vec![
            PollStep::Report(JobSnapshot::running("extracting text")),
            PollStep::Report(JobSnapshot::running("building locations")),
            PollStep::Report(JobSnapshot::done(game.clone())),
        ],
    );

    let dir = tempfile::tempdir().unwrap();
    let document = write_document(&dir);
    assert_eq!(document.content_type, "text/markdown");

    let (notifier, mut rx) = Notifier::channel();
    let (handle, controls) = import_controls();
    handle.set_overrides(ImportOverrides {
        title: Some("The Lighthouse".to_string()),
        ..ImportOverrides::default()
    });
    let config = IngestConfig {
        poll_interval_ms: 500,
        max_attempts: 10,
    };

    let started = tokio::time::Instant::now();
    let outcome = ImportJobClient::new(backend.clone(), config)
        .with_notifier(notifier)
        .run(&document, controls)
        .await;

    assert!(started.elapsed() >= Duration::from_millis(1500));
    assert_eq!(outcome.phase(), ImportPhase::Done);

    let mut kinds = Vec::new();
    while let Ok(event) = rx.try_recv() {
        kinds.push(match event.payload {
            EventPayload::ImportStarted { .. } => "started",
            EventPayload::ImportProgress { .. } => "progress",
            EventPayload::ImportFinished { .. } => "finished",
            _ => "other",
        });
    }
    assert_eq!(kinds, vec!["started", "progress", "progress", "finished"]);

    let editor = open_imported(backend.clone(), &outcome, Notifier::disabled())
        .await
        .unwrap();
    let flow = editor.flow();
    assert_eq!(flow.title, "The Lighthouse");
    assert_eq!(flow.entries.len(), 2);
    assert!(flow.is_clean());
}

#[tokio::test(start_paused = true)]
async fn test_small_attempt_cap_times_out() {
    let backend = Arc::new(InMemoryBackend::new());
    let dir = tempfile::tempdir().unwrap();
    let document = write_document(&dir);
    let (_handle, controls) = import_controls();
    let config = IngestConfig {
        poll_interval_ms: 100,
        max_attempts: 3,
    };

    let outcome = ImportJobClient::new(backend.clone(), config)
        .run(&document, controls)
        .await;

    assert!(matches!(outcome, ImportOutcome::TimedOut { attempts: 3, .. }));
    assert_eq!(backend.poll_count(), 3);
}
