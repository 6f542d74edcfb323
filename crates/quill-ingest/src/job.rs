//! Ingestion job client.
//!
//! Uploads a document, then polls the job until it finishes, fails, runs out
//! of attempts or is cancelled:
//!
//! ```text
//! STARTING ──► POLLING ──► DONE | ERROR | TIMEOUT | CANCELLED
//! ```
//!
//! Each attempt waits the poll interval first and polls second. The server
//! job is never cancelled; cancelling only stops this client from waiting.

use std::fmt;
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::watch;
use tokio::time::{sleep_until, Instant};

use quill_api::AdminBackend;
use quill_core::events::{EventPayload, Notifier};
use quill_core::{GameId, GamePatch, JobId, JobStatus, SourceDocument};

use crate::config::IngestConfig;

/// Metadata applied to the imported game once the job is done.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportOverrides {
    pub title: Option<String>,
    pub author: Option<String>,
    pub cover_url: Option<String>,
}

impl ImportOverrides {
    pub fn is_empty(&self) -> bool {
        self.title.is_none() && self.author.is_none() && self.cover_url.is_none()
    }

    fn to_patch(&self) -> GamePatch {
        GamePatch {
            title: self.title.clone(),
            author: self.author.clone(),
            cover_url: self.cover_url.clone(),
            ..GamePatch::default()
        }
    }
}

/// Caller side of a running import.
#[derive(Debug)]
pub struct ImportHandle {
    cancel: watch::Sender<bool>,
    overrides: watch::Sender<ImportOverrides>,
}

impl ImportHandle {
    /// Stop waiting for the job. Takes effect immediately, even mid-wait.
    pub fn cancel(&self) {
        self.cancel.send_replace(true);
    }

    /// Replace the overrides; the latest value is read when the job is done.
    pub fn set_overrides(&self, overrides: ImportOverrides) {
        self.overrides.send_replace(overrides);
    }
}

/// Job side of a running import.
#[derive(Debug)]
pub struct ImportControls {
    cancel: watch::Receiver<bool>,
    overrides: watch::Receiver<ImportOverrides>,
}

pub fn import_controls() -> (ImportHandle, ImportControls) {
    let (cancel_tx, cancel_rx) = watch::channel(false);
    let (overrides_tx, overrides_rx) = watch::channel(ImportOverrides::default());
    (
        ImportHandle {
            cancel: cancel_tx,
            overrides: overrides_tx,
        },
        ImportControls {
            cancel: cancel_rx,
            overrides: overrides_rx,
        },
    )
}

/// Terminal state of the job state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ImportPhase {
    Starting,
    Polling,
    Done,
    Error,
    Timeout,
    Cancelled,
}

impl fmt::Display for ImportPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ImportPhase::Starting => "STARTING",
            ImportPhase::Polling => "POLLING",
            ImportPhase::Done => "DONE",
            ImportPhase::Error => "ERROR",
            ImportPhase::Timeout => "TIMEOUT",
            ImportPhase::Cancelled => "CANCELLED",
        })
    }
}

/// How an import session ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ImportOutcome {
    Done {
        game_id: GameId,
        overrides_applied: bool,
    },
    /// The upload failed or returned no job id. Nothing was polled.
    Rejected { message: String },
    /// A poll request itself failed.
    PollFailed { job_id: JobId, message: String },
    /// The job reported an error.
    JobFailed { job_id: JobId, message: String },
    TimedOut { job_id: JobId, attempts: u32 },
    Cancelled { job_id: JobId },
}

impl ImportOutcome {
    pub fn phase(&self) -> ImportPhase {
        match self {
            ImportOutcome::Done { .. } => ImportPhase::Done,
            ImportOutcome::Rejected { .. }
            | ImportOutcome::PollFailed { .. }
            | ImportOutcome::JobFailed { .. } => ImportPhase::Error,
            ImportOutcome::TimedOut { .. } => ImportPhase::Timeout,
            ImportOutcome::Cancelled { .. } => ImportPhase::Cancelled,
        }
    }

    pub fn game_id(&self) -> Option<&GameId> {
        match self {
            ImportOutcome::Done { game_id, .. } => Some(game_id),
            _ => None,
        }
    }

    pub fn job_id(&self) -> Option<&JobId> {
        match self {
            ImportOutcome::Done { .. } | ImportOutcome::Rejected { .. } => None,
            ImportOutcome::PollFailed { job_id, .. }
            | ImportOutcome::JobFailed { job_id, .. }
            | ImportOutcome::TimedOut { job_id, .. }
            | ImportOutcome::Cancelled { job_id } => Some(job_id),
        }
    }

    /// Text shown to the person who started the import.
    pub fn user_message(&self) -> String {
        match self {
            ImportOutcome::Done { game_id, .. } => {
                format!("Import finished. Opening game {game_id}.")
            }
            ImportOutcome::Rejected { message } => format!("Import could not start: {message}"),
            ImportOutcome::PollFailed { .. } => {
                "Import failed: the job status could not be read.".to_string()
            }
            ImportOutcome::JobFailed { message, .. } => message.clone(),
            ImportOutcome::TimedOut { .. } => "Import is taking too long. It may still finish \
                 on the server; check the game list later."
                .to_string(),
            ImportOutcome::Cancelled { .. } => {
                "Import cancelled. The job may still finish on the server.".to_string()
            }
        }
    }

    fn label(&self) -> &'static str {
        match self {
            ImportOutcome::Done { .. } => "done",
            ImportOutcome::Rejected { .. } => "rejected",
            ImportOutcome::PollFailed { .. } => "poll_failed",
            ImportOutcome::JobFailed { .. } => "job_failed",
            ImportOutcome::TimedOut { .. } => "timed_out",
            ImportOutcome::Cancelled { .. } => "cancelled",
        }
    }
}

/// Drives one ingestion job at a time.
pub struct ImportJobClient<B: AdminBackend + ?Sized> {
    backend: Arc<B>,
    config: IngestConfig,
    notifier: Notifier,
}

impl<B: AdminBackend + ?Sized> ImportJobClient<B> {
    pub fn new(backend: Arc<B>, config: IngestConfig) -> Self {
        Self {
            backend,
            config,
            notifier: Notifier::disabled(),
        }
    }

    pub fn with_notifier(mut self, notifier: Notifier) -> Self {
        self.notifier = notifier;
        self
    }

    /// Upload `document` and follow the job to a terminal state.
    pub async fn run(&self, document: &SourceDocument, controls: ImportControls) -> ImportOutcome {
        let ImportControls {
            cancel,
            overrides,
        } = controls;

        tracing::info!(phase = %ImportPhase::Starting, file = %document.file_name, bytes = document.bytes.len(), "Uploading document");
        let ticket = match self.backend.start_ingest(document).await {
            Ok(ticket) => ticket,
            Err(e) => {
                return self.finish(ImportOutcome::Rejected {
                    message: e.to_string(),
                })
            }
        };
        let Some(job_id) = ticket.job_id else {
            return self.finish(ImportOutcome::Rejected {
                message: "the server did not return a job id".to_string(),
            });
        };

        tracing::info!(phase = %ImportPhase::Polling, job_id = %job_id, "Ingestion job started");
        self.notifier.emit(
            None,
            EventPayload::ImportStarted {
                job_id: job_id.clone(),
            },
        );

        let outcome = self.poll(job_id, cancel, &overrides).await;
        self.finish(outcome)
    }

    async fn poll(
        &self,
        job_id: JobId,
        mut cancel: watch::Receiver<bool>,
        overrides: &watch::Receiver<ImportOverrides>,
    ) -> ImportOutcome {
        let interval = self.config.poll_interval();
        let mut watching_cancel = true;
        let mut last_label: Option<String> = None;

        for attempt in 1..=self.config.max_attempts {
            let deadline = Instant::now() + interval;
            loop {
                tokio::select! {
                    _ = sleep_until(deadline) => break,
                    cancelled = async { cancel.wait_for(|c| *c).await.is_ok() }, if watching_cancel => {
                        if cancelled {
                            tracing::info!(job_id = %job_id, attempt, "Import cancelled while waiting");
                            return ImportOutcome::Cancelled { job_id };
                        }
                        // Handle dropped without cancelling.
                        watching_cancel = false;
                    }
                }
            }

            let snapshot = match self.backend.poll_ingest(&job_id).await {
                Ok(snapshot) => snapshot,
                Err(e) => {
                    tracing::error!(job_id = %job_id, attempt, error = %e, "Job status request failed");
                    return ImportOutcome::PollFailed {
                        job_id,
                        message: e.to_string(),
                    };
                }
            };

            match (snapshot.status, snapshot.game_id) {
                (JobStatus::Error, _) => {
                    let message = snapshot
                        .error
                        .unwrap_or_else(|| "The import job failed.".to_string());
                    return ImportOutcome::JobFailed { job_id, message };
                }
                (JobStatus::Done, Some(game_id)) => {
                    tracing::info!(job_id = %job_id, attempt, game_id = %game_id, "Ingestion job done");
                    let requested = overrides.borrow().clone();
                    let overrides_applied = self.apply_overrides(&game_id, &requested).await;
                    return ImportOutcome::Done {
                        game_id,
                        overrides_applied,
                    };
                }
                (JobStatus::Done, None) => {
                    tracing::debug!(job_id = %job_id, attempt, "Job reported done without a game id, still polling");
                }
                (status, _) => {
                    tracing::debug!(job_id = %job_id, attempt, ?status, "Job still running");
                }
            }

            if let Some(label) = snapshot.progress {
                if last_label.as_ref() != Some(&label) {
                    tracing::info!(job_id = %job_id, attempt, progress = %label, "Import progress");
                    self.notifier.emit(
                        None,
                        EventPayload::ImportProgress {
                            job_id: job_id.clone(),
                            attempt,
                            label: label.clone(),
                        },
                    );
                    last_label = Some(label);
                }
            }
        }

        ImportOutcome::TimedOut {
            job_id,
            attempts: self.config.max_attempts,
        }
    }

    /// Best effort: a failure is logged and otherwise ignored.
    async fn apply_overrides(&self, game_id: &GameId, overrides: &ImportOverrides) -> bool {
        if overrides.is_empty() {
            return false;
        }
        match self.backend.patch_game(game_id, &overrides.to_patch()).await {
            Ok(_) => {
                tracing::info!(game_id = %game_id, "Import overrides applied");
                true
            }
            Err(e) => {
                tracing::warn!(game_id = %game_id, error = %e, "Failed to apply import overrides");
                false
            }
        }
    }

    fn finish(&self, outcome: ImportOutcome) -> ImportOutcome {
        let message = outcome.user_message();
        match outcome.phase() {
            ImportPhase::Done | ImportPhase::Cancelled => {
                tracing::info!(phase = %outcome.phase(), "{message}")
            }
            _ => tracing::warn!(phase = %outcome.phase(), outcome = outcome.label(), "{message}"),
        }
        self.notifier.emit(
            outcome.game_id(),
            EventPayload::ImportFinished {
                job_id: outcome.job_id().cloned(),
                outcome: outcome.label().to_string(),
                message,
            },
        );
        outcome
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use quill_api::memory::{IngestStart, PollStep, WriteKind};
    use quill_api::InMemoryBackend;
    use quill_core::JobSnapshot;

    use super::*;

    fn document() -> SourceDocument {
        SourceDocument {
            file_name: "lighthouse.pdf".to_string(),
            content_type: "application/pdf".to_string(),
            bytes: b"%PDF-1.7".to_vec(),
        }
    }

    fn client(backend: &Arc<InMemoryBackend>) -> ImportJobClient<InMemoryBackend> {
        ImportJobClient::new(backend.clone(), IngestConfig::default())
    }

    fn reports(steps: Vec<JobSnapshot>) -> Vec<PollStep> {
        steps.into_iter().map(PollStep::Report).collect()
    }

    #[tokio::test(start_paused = true)]
    async fn test_gives_up_after_exactly_max_attempts() {
        let backend = Arc::new(InMemoryBackend::new());
        let (_handle, controls) = import_controls();
        let started = Instant::now();

        let outcome = client(&backend).run(&document(), controls).await;

        assert_eq!(
            outcome,
            ImportOutcome::TimedOut {
                job_id: JobId::new("job-1"),
                attempts: 600,
            }
        );
        assert_eq!(backend.poll_count(), 600);
        assert!(started.elapsed() >= Duration::from_secs(1200));
        assert!(outcome.user_message().contains("game list"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_done_with_game_id_stops_polling() {
        let backend = Arc::new(InMemoryBackend::new());
        let game = backend.insert_game("Imported");
        backend.script_ingest(
            IngestStart::Job(JobId::new("job-7")),
            reports(vec![
                JobSnapshot::running("parsing"),
                JobSnapshot::running("parsing"),
                JobSnapshot::running("building graph"),
                JobSnapshot::done(game.clone()),
            ]),
        );
        let (notifier, mut rx) = Notifier::channel();
        let (_handle, controls) = import_controls();

        let outcome = client(&backend)
            .with_notifier(notifier)
            .run(&document(), controls)
            .await;

        assert_eq!(outcome.game_id(), Some(&game));
        assert_eq!(outcome.phase(), ImportPhase::Done);
        assert_eq!(backend.poll_count(), 4);

        let mut labels = Vec::new();
        while let Ok(event) = rx.try_recv() {
            if let EventPayload::ImportProgress { label, .. } = event.payload {
                labels.push(label);
            }
        }
        assert_eq!(labels, vec!["parsing", "building graph"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_done_without_game_id_keeps_polling() {
        let backend = Arc::new(InMemoryBackend::new());
        let game = backend.insert_game("Imported");
        let incomplete = JobSnapshot {
            game_id: None,
            ..JobSnapshot::done(game.clone())
        };
        backend.script_ingest(
            IngestStart::Job(JobId::new("job-1")),
            reports(vec![incomplete, JobSnapshot::done(game.clone())]),
        );
        let (_handle, controls) = import_controls();

        let outcome = client(&backend).run(&document(), controls).await;

        assert_eq!(outcome.game_id(), Some(&game));
        assert_eq!(backend.poll_count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_job_error_is_reported_verbatim() {
        let backend = Arc::new(InMemoryBackend::new());
        backend.script_ingest(
            IngestStart::Job(JobId::new("job-1")),
            reports(vec![
                JobSnapshot::running("parsing"),
                JobSnapshot::failed("Unsupported file: scan.tiff"),
            ]),
        );
        let (_handle, controls) = import_controls();

        let outcome = client(&backend).run(&document(), controls).await;

        assert_eq!(outcome.phase(), ImportPhase::Error);
        assert_eq!(outcome.user_message(), "Unsupported file: scan.tiff");
        assert_eq!(backend.poll_count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rejected_start_never_polls() {
        for start in [IngestStart::Fail, IngestStart::MissingJobId] {
            let backend = Arc::new(InMemoryBackend::new());
            backend.script_ingest(start, Vec::new());
            let (_handle, controls) = import_controls();

            let outcome = client(&backend).run(&document(), controls).await;

            assert!(matches!(outcome, ImportOutcome::Rejected { .. }));
            assert_eq!(backend.poll_count(), 0);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_poll_stops_with_generic_message() {
        let backend = Arc::new(InMemoryBackend::new());
        backend.script_ingest(
            IngestStart::Job(JobId::new("job-1")),
            vec![PollStep::Report(JobSnapshot::running("parsing")), PollStep::Fail],
        );
        let (_handle, controls) = import_controls();

        let outcome = client(&backend).run(&document(), controls).await;

        assert!(matches!(outcome, ImportOutcome::PollFailed { .. }));
        assert!(!outcome.user_message().contains("503"));
        assert_eq!(backend.poll_count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_overrides_set_during_the_wait_are_applied() {
        let backend = Arc::new(InMemoryBackend::new());
        let game = backend.insert_game("Untitled import");
        backend.script_ingest(
            IngestStart::Job(JobId::new("job-1")),
            reports(vec![
                JobSnapshot::running("parsing"),
                JobSnapshot::running("parsing"),
                JobSnapshot::done(game.clone()),
            ]),
        );
        let (handle, controls) = import_controls();
        let job = client(&backend);
        let doc = document();

        let (outcome, ()) = tokio::join!(job.run(&doc, controls), async {
            tokio::time::sleep(Duration::from_secs(3)).await;
            handle.set_overrides(ImportOverrides {
                title: Some("The Lighthouse".to_string()),
                author: Some("R. Keeper".to_string()),
                cover_url: None,
            });
        });

        assert_eq!(
            outcome,
            ImportOutcome::Done {
                game_id: game.clone(),
                overrides_applied: true,
            }
        );
        let info = backend.game(&game).unwrap();
        assert_eq!(info.title, "The Lighthouse");
        assert_eq!(info.author.as_deref(), Some("R. Keeper"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_override_failure_is_swallowed() {
        let backend = Arc::new(InMemoryBackend::new());
        let game = backend.insert_game("Untitled import");
        backend.script_ingest(
            IngestStart::Job(JobId::new("job-1")),
            reports(vec![JobSnapshot::done(game.clone())]),
        );
        backend.fail_write(WriteKind::PatchGame, 1);
        let (handle, controls) = import_controls();
        handle.set_overrides(ImportOverrides {
            title: Some("Renamed".to_string()),
            ..ImportOverrides::default()
        });

        let outcome = client(&backend).run(&document(), controls).await;

        assert_eq!(
            outcome,
            ImportOutcome::Done {
                game_id: game.clone(),
                overrides_applied: false,
            }
        );
        assert_eq!(backend.game(&game).unwrap().title, "Untitled import");
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_interrupts_the_wait() {
        let backend = Arc::new(InMemoryBackend::new());
        let (handle, controls) = import_controls();
        let job = client(&backend);
        let doc = document();
        let started = Instant::now();

        let (outcome, ()) = tokio::join!(job.run(&doc, controls), async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            handle.cancel();
        });

        assert_eq!(
            outcome,
            ImportOutcome::Cancelled {
                job_id: JobId::new("job-1"),
            }
        );
        assert_eq!(backend.poll_count(), 2);
        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_secs(5) && elapsed < Duration::from_secs(6));
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropped_handle_does_not_cancel() {
        let backend = Arc::new(InMemoryBackend::new());
        let game = backend.insert_game("Imported");
        backend.script_ingest(
            IngestStart::Job(JobId::new("job-1")),
            reports(vec![JobSnapshot::running("parsing"), JobSnapshot::done(game.clone())]),
        );
        let (handle, controls) = import_controls();
        drop(handle);

        let outcome = client(&backend).run(&document(), controls).await;

        assert_eq!(outcome.game_id(), Some(&game));
    }

    #[test]
    fn test_outcomes_map_to_terminal_phases() {
        let job_id = JobId::new("j");
        assert_eq!(
            ImportOutcome::TimedOut {
                job_id: job_id.clone(),
                attempts: 600
            }
            .phase(),
            ImportPhase::Timeout
        );
        assert_eq!(
            ImportOutcome::Rejected {
                message: "x".into()
            }
            .phase(),
            ImportPhase::Error
        );
        let json = serde_json::to_value(ImportOutcome::Cancelled { job_id }).unwrap();
        assert_eq!(json["outcome"], "cancelled");
    }
}
