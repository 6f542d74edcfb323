//! In-memory admin backend.
//!
//! Behaves like the REST backend, including its inconsistencies: each of the
//! three exit sources can be switched to serve, return nothing, or fail, and
//! writes can be made to fail on demand. Used by tests and offline demos.

use std::collections::{HashMap, HashSet, VecDeque};

use async_trait::async_trait;
use parking_lot::Mutex;

use quill_core::document::{ImportedScenario, ScenarioDocument};
use quill_core::{
    Exit, ExitDraft, ExitId, ExitPatch, Game, GameId, GameInfo, GamePatch, GameStatus, JobId,
    JobSnapshot, JobTicket, Location, LocationDraft, LocationId, LocationPatch, SourceDocument,
};

use crate::backend::AdminBackend;
use crate::client::ApiError;
use crate::{mutations, queries};

/// How one exit source answers reads.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SourceBehavior {
    #[default]
    Serve,
    /// Answer successfully with no exits.
    Empty,
    /// Answer with an error.
    Fail,
}

/// Write operations that can be made to fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WriteKind {
    PatchGame,
    CreateLocation,
    PatchLocation,
    DeleteLocation,
    CreateExit,
    PatchExit,
    DeleteExit,
    StartIngest,
    ImportScenario,
}

/// Scripted answer to the ingestion start call.
#[derive(Debug, Clone, PartialEq)]
pub enum IngestStart {
    Job(JobId),
    /// Successful response without a job id.
    MissingJobId,
    Fail,
}

/// Scripted answer to one poll.
#[derive(Debug, Clone, PartialEq)]
pub enum PollStep {
    Report(JobSnapshot),
    Fail,
}

#[derive(Debug, Clone)]
struct WriteFault {
    kind: WriteKind,
    remaining: usize,
}

#[derive(Debug, Clone)]
struct StoredLocation {
    game_id: GameId,
    location: Location,
}

#[derive(Debug, Default)]
struct State {
    games: Vec<GameInfo>,
    locations: Vec<StoredLocation>,
    exits: Vec<Exit>,
    next_id: u64,
    aggregate: SourceBehavior,
    inline: SourceBehavior,
    per_location: SourceBehavior,
    failing_locations: HashSet<LocationId>,
    full_game_fails: bool,
    write_faults: Vec<WriteFault>,
    ingest_start: Option<IngestStart>,
    poll_script: VecDeque<PollStep>,
    last_poll: Option<PollStep>,
    polls: u32,
    calls: Vec<String>,
}

impl State {
    fn next_id(&mut self, prefix: &str) -> String {
        self.next_id += 1;
        format!("{prefix}-{}", self.next_id)
    }

    fn record(&mut self, call: String) {
        self.calls.push(call);
    }

    fn check_fault(&mut self, kind: WriteKind) -> Result<(), ApiError> {
        let mut failed = false;
        self.write_faults.retain_mut(|fault| {
            if fault.kind != kind {
                return true;
            }
            fault.remaining -= 1;
            if fault.remaining == 0 {
                failed = true;
                false
            } else {
                true
            }
        });
        if failed {
            Err(ApiError::Rejected(format!("injected {kind:?} failure")))
        } else {
            Ok(())
        }
    }

    fn game(&self, game_id: &GameId) -> Result<&GameInfo, ApiError> {
        self.games
            .iter()
            .find(|g| &g.id == game_id)
            .ok_or_else(|| not_found("game", game_id.as_str()))
    }

    fn location_mut(&mut self, location_id: &LocationId) -> Result<&mut StoredLocation, ApiError> {
        self.locations
            .iter_mut()
            .find(|l| &l.location.id == location_id)
            .ok_or_else(|| not_found("location", location_id.as_str()))
    }

    fn locations_of(&self, game_id: &GameId) -> impl Iterator<Item = &Location> + '_ {
        let game_id = game_id.clone();
        self.locations
            .iter()
            .filter(move |l| l.game_id == game_id)
            .map(|l| &l.location)
    }

    fn exits_of(&self, location_id: &LocationId) -> Vec<Exit> {
        self.exits
            .iter()
            .filter(|e| e.location_id.as_ref() == Some(location_id))
            .cloned()
            .collect()
    }

    fn add_game(&mut self, info: GameInfo) {
        self.games.push(info);
    }

    fn add_location(&mut self, game_id: &GameId, draft: &LocationDraft) -> Location {
        let order = draft.order.unwrap_or_else(|| {
            self.locations_of(game_id)
                .map(|l| l.order)
                .max()
                .unwrap_or(0)
                + 1
        });
        let location = Location {
            id: LocationId::new(self.next_id("loc")),
            order,
            title: draft.title.clone(),
            description: draft.description.clone(),
            background_url: draft.background_url.clone(),
            music_url: draft.music_url.clone(),
            rules_prompt: draft.rules_prompt.clone(),
            exits: None,
        };
        self.locations.push(StoredLocation {
            game_id: game_id.clone(),
            location: location.clone(),
        });
        location
    }

    fn add_exit(&mut self, location_id: &LocationId, draft: &ExitDraft) -> Exit {
        let id = ExitId::new(self.next_id("exit"));
        let exit = draft.clone().into_exit(id, location_id.clone());
        self.exits.push(exit.clone());
        exit
    }
}

fn not_found(kind: &'static str, id: &str) -> ApiError {
    ApiError::NotFound {
        kind,
        id: id.to_string(),
    }
}

/// Deterministic in-process backend.
#[derive(Debug, Default)]
pub struct InMemoryBackend {
    state: Mutex<State>,
}

impl InMemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    // ── Seeding ──────────────────────────────────────────────────

    pub fn insert_game(&self, title: &str) -> GameId {
        let mut state = self.state.lock();
        let id = GameId::new(state.next_id("game"));
        state.add_game(GameInfo {
            id: id.clone(),
            title: title.to_string(),
            description: None,
            author: None,
            cover_url: None,
            rules: None,
            status: GameStatus::Draft,
        });
        id
    }

    pub fn insert_location(&self, game_id: &GameId, title: &str, order: i64) -> LocationId {
        let draft = LocationDraft {
            title: title.to_string(),
            order: Some(order),
            ..LocationDraft::default()
        };
        self.state.lock().add_location(game_id, &draft).id
    }

    pub fn insert_exit(&self, location_id: &LocationId, draft: ExitDraft) -> ExitId {
        self.state.lock().add_exit(location_id, &draft).id
    }

    // ── Behavior switches ────────────────────────────────────────

    /// Behavior of `GET /games/{id}/exits`.
    pub fn set_aggregate(&self, behavior: SourceBehavior) {
        self.state.lock().aggregate = behavior;
    }

    /// Behavior of the inline `exits` on the full-game fetch.
    pub fn set_inline(&self, behavior: SourceBehavior) {
        self.state.lock().inline = behavior;
    }

    /// Behavior of `GET /locations/{id}/exits`.
    pub fn set_per_location(&self, behavior: SourceBehavior) {
        self.state.lock().per_location = behavior;
    }

    /// Make the per-location fetch of one location fail.
    pub fn fail_location_fetch(&self, location_id: &LocationId) {
        self.state.lock().failing_locations.insert(location_id.clone());
    }

    /// Make every full-game fetch fail until switched back.
    pub fn fail_game_fetch(&self, fail: bool) {
        self.state.lock().full_game_fails = fail;
    }

    /// Make the `nth` upcoming call (1-based) of `kind` fail.
    pub fn fail_write(&self, kind: WriteKind, nth: usize) {
        self.state.lock().write_faults.push(WriteFault {
            kind,
            remaining: nth.max(1),
        });
    }

    /// Script the ingestion job. The last poll step repeats once the script runs out.
    pub fn script_ingest(&self, start: IngestStart, steps: Vec<PollStep>) {
        let mut state = self.state.lock();
        state.ingest_start = Some(start);
        state.poll_script = steps.into();
        state.last_poll = None;
        state.polls = 0;
    }

    // ── Inspection ───────────────────────────────────────────────

    pub fn poll_count(&self) -> u32 {
        self.state.lock().polls
    }

    /// Every backend call so far, as `METHOD /path`.
    pub fn calls(&self) -> Vec<String> {
        self.state.lock().calls.clone()
    }

    pub fn clear_calls(&self) {
        self.state.lock().calls.clear();
    }

    pub fn game(&self, game_id: &GameId) -> Option<GameInfo> {
        self.state.lock().game(game_id).ok().cloned()
    }

    /// Locations of a game sorted by order.
    pub fn locations(&self, game_id: &GameId) -> Vec<Location> {
        let state = self.state.lock();
        let mut locations: Vec<Location> = state.locations_of(game_id).cloned().collect();
        locations.sort_by_key(|l| l.order);
        locations
    }

    /// Exits owned by locations of a game.
    pub fn exits(&self, game_id: &GameId) -> Vec<Exit> {
        let state = self.state.lock();
        let owners: HashSet<&LocationId> = state.locations_of(game_id).map(|l| &l.id).collect();
        state
            .exits
            .iter()
            .filter(|e| e.location_id.as_ref().is_some_and(|id| owners.contains(id)))
            .cloned()
            .collect()
    }
}

#[async_trait]
impl AdminBackend for InMemoryBackend {
    async fn fetch_full_game(&self, game_id: &GameId) -> Result<Game, ApiError> {
        let mut state = self.state.lock();
        state.record(format!("GET {}", queries::paths::full_game(game_id)));
        if state.full_game_fails {
            return Err(ApiError::Rejected("injected full-game fetch failure".to_string()));
        }

        let info = state.game(game_id)?.clone();
        let inline = state.inline == SourceBehavior::Serve;
        let locations = state
            .locations_of(game_id)
            .map(|l| {
                let mut location = l.clone();
                if inline {
                    location.exits = Some(state.exits_of(&l.id));
                }
                location
            })
            .collect();

        Ok(Game { info, locations })
    }

    async fn fetch_game_exits(&self, game_id: &GameId) -> Result<Vec<Exit>, ApiError> {
        let behavior = {
            let mut state = self.state.lock();
            state.record(format!("GET {}", queries::paths::game_exits(game_id)));
            state.aggregate
        };
        match behavior {
            SourceBehavior::Serve => Ok(self.exits(game_id)),
            SourceBehavior::Empty => Ok(Vec::new()),
            SourceBehavior::Fail => Err(ApiError::Rejected("aggregate exits unavailable".into())),
        }
    }

    async fn fetch_location_exits(
        &self,
        location_id: &LocationId,
    ) -> Result<Vec<Exit>, ApiError> {
        let mut state = self.state.lock();
        state.record(format!("GET {}", queries::paths::location_exits(location_id)));

        if state.failing_locations.contains(location_id) {
            return Err(ApiError::Rejected(format!(
                "exits of {location_id} unavailable"
            )));
        }
        match state.per_location {
            // This endpoint does not tag exits with their owner.
            SourceBehavior::Serve => Ok(state
                .exits_of(location_id)
                .into_iter()
                .map(|mut e| {
                    e.location_id = None;
                    e
                })
                .collect()),
            SourceBehavior::Empty => Ok(Vec::new()),
            SourceBehavior::Fail => Err(ApiError::Rejected("location exits unavailable".into())),
        }
    }

    async fn patch_game(&self, game_id: &GameId, patch: &GamePatch) -> Result<GameInfo, ApiError> {
        let mut state = self.state.lock();
        state.record(format!("PATCH {}", mutations::paths::game(game_id)));
        state.check_fault(WriteKind::PatchGame)?;

        let info = state
            .games
            .iter_mut()
            .find(|g| &g.id == game_id)
            .ok_or_else(|| not_found("game", game_id.as_str()))?;
        patch.apply_to(info);
        Ok(info.clone())
    }

    async fn create_location(
        &self,
        game_id: &GameId,
        draft: &LocationDraft,
    ) -> Result<Location, ApiError> {
        let mut state = self.state.lock();
        state.record(format!("POST {}", mutations::paths::game_locations(game_id)));
        state.check_fault(WriteKind::CreateLocation)?;
        state.game(game_id)?;
        Ok(state.add_location(game_id, draft))
    }

    async fn patch_location(
        &self,
        location_id: &LocationId,
        patch: &LocationPatch,
    ) -> Result<Location, ApiError> {
        let mut state = self.state.lock();
        state.record(format!("PATCH {}", mutations::paths::location(location_id)));
        state.check_fault(WriteKind::PatchLocation)?;

        let stored = state.location_mut(location_id)?;
        patch.apply_to(&mut stored.location);
        Ok(stored.location.clone())
    }

    async fn delete_location(&self, location_id: &LocationId) -> Result<(), ApiError> {
        let mut state = self.state.lock();
        state.record(format!("DELETE {}", mutations::paths::location(location_id)));
        state.check_fault(WriteKind::DeleteLocation)?;

        let before = state.locations.len();
        state.locations.retain(|l| &l.location.id != location_id);
        if state.locations.len() == before {
            return Err(not_found("location", location_id.as_str()));
        }
        // Owned exits go with the location; exits targeting it are left dangling.
        state
            .exits
            .retain(|e| e.location_id.as_ref() != Some(location_id));
        Ok(())
    }

    async fn create_exit(
        &self,
        location_id: &LocationId,
        draft: &ExitDraft,
    ) -> Result<Exit, ApiError> {
        let mut state = self.state.lock();
        state.record(format!("POST {}", mutations::paths::location_exits(location_id)));
        state.check_fault(WriteKind::CreateExit)?;
        state.location_mut(location_id)?;
        Ok(state.add_exit(location_id, draft))
    }

    async fn patch_exit(&self, exit_id: &ExitId, patch: &ExitPatch) -> Result<Exit, ApiError> {
        let mut state = self.state.lock();
        state.record(format!("PATCH {}", mutations::paths::exit(exit_id)));
        state.check_fault(WriteKind::PatchExit)?;

        let exit = state
            .exits
            .iter_mut()
            .find(|e| &e.id == exit_id)
            .ok_or_else(|| not_found("exit", exit_id.as_str()))?;
        patch.apply_to(exit);
        Ok(exit.clone())
    }

    async fn delete_exit(&self, exit_id: &ExitId) -> Result<(), ApiError> {
        let mut state = self.state.lock();
        state.record(format!("DELETE {}", mutations::paths::exit(exit_id)));
        state.check_fault(WriteKind::DeleteExit)?;

        let before = state.exits.len();
        state.exits.retain(|e| &e.id != exit_id);
        if state.exits.len() == before {
            return Err(not_found("exit", exit_id.as_str()));
        }
        Ok(())
    }

    async fn start_ingest(&self, document: &SourceDocument) -> Result<JobTicket, ApiError> {
        let mut state = self.state.lock();
        state.record(format!("POST {}", mutations::paths::INGEST));
        tracing::debug!(file = %document.file_name, bytes = document.bytes.len(), "Ingest upload");
        state.check_fault(WriteKind::StartIngest)?;

        match state
            .ingest_start
            .clone()
            .unwrap_or_else(|| IngestStart::Job(JobId::new("job-1")))
        {
            IngestStart::Job(job_id) => Ok(JobTicket {
                job_id: Some(job_id),
            }),
            IngestStart::MissingJobId => Ok(JobTicket::default()),
            IngestStart::Fail => Err(ApiError::Status {
                method: "POST".to_string(),
                path: mutations::paths::INGEST.to_string(),
                status: 502,
                body: "ingestion service unavailable".to_string(),
            }),
        }
    }

    async fn poll_ingest(&self, job_id: &JobId) -> Result<JobSnapshot, ApiError> {
        let mut state = self.state.lock();
        state.record(format!("GET {}", queries::paths::ingest_job(job_id)));
        state.polls += 1;

        let step = match state.poll_script.pop_front() {
            Some(step) => step,
            None => state
                .last_poll
                .clone()
                .unwrap_or_else(|| PollStep::Report(JobSnapshot::running("queued"))),
        };
        state.last_poll = Some(step.clone());

        match step {
            PollStep::Report(snapshot) => Ok(snapshot),
            PollStep::Fail => Err(ApiError::Status {
                method: "GET".to_string(),
                path: queries::paths::ingest_job(job_id),
                status: 503,
                body: "poll failed".to_string(),
            }),
        }
    }

    async fn import_scenario(
        &self,
        document: &ScenarioDocument,
    ) -> Result<ImportedScenario, ApiError> {
        let mut state = self.state.lock();
        state.record(format!("POST {}", mutations::paths::SCENARIO_IMPORT));
        state.check_fault(WriteKind::ImportScenario)?;
        document
            .validate()
            .map_err(|e| ApiError::Rejected(e.to_string()))?;

        let game_id = GameId::new(state.next_id("game"));
        state.add_game(GameInfo {
            id: game_id.clone(),
            title: document.game.title.clone(),
            description: document.game.description.clone(),
            author: document.game.author.clone(),
            cover_url: document.game.cover_url.clone(),
            rules: document.game.rules.clone(),
            status: document.game.status,
        });

        let mut ids: HashMap<&str, LocationId> = HashMap::with_capacity(document.locations.len());
        for scenario_location in &document.locations {
            let draft = LocationDraft {
                title: scenario_location.title.clone(),
                order: Some(scenario_location.order),
                description: scenario_location.description.clone(),
                background_url: scenario_location.background_url.clone(),
                music_url: scenario_location.music_url.clone(),
                rules_prompt: scenario_location.rules_prompt.clone(),
            };
            let location = state.add_location(&game_id, &draft);
            ids.insert(scenario_location.key.as_str(), location.id);
        }

        for scenario_exit in &document.exits {
            // validate() guarantees both keys resolve.
            let Some(from) = ids.get(scenario_exit.from_key.as_str()).cloned() else {
                continue;
            };
            let draft = ExitDraft {
                exit_type: scenario_exit.exit_type,
                button_text: scenario_exit.button_text.clone(),
                trigger_text: scenario_exit.trigger_text.clone(),
                target_location_id: scenario_exit
                    .to_key
                    .as_deref()
                    .and_then(|key| ids.get(key).cloned()),
                is_game_over: scenario_exit.is_game_over,
            };
            state.add_exit(&from, &draft);
        }

        Ok(ImportedScenario {
            game_id: Some(game_id),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seeded() -> (InMemoryBackend, GameId, LocationId, LocationId) {
        let backend = InMemoryBackend::new();
        let game = backend.insert_game("Lighthouse");
        let shore = backend.insert_location(&game, "Shore", 1);
        let tower = backend.insert_location(&game, "Tower", 2);
        backend.insert_exit(&shore, ExitDraft::button("Climb", tower.clone()));
        (backend, game, shore, tower)
    }

    #[tokio::test]
    async fn test_sources_follow_behavior_switches() {
        let (backend, game, shore, _) = seeded();

        assert_eq!(backend.fetch_game_exits(&game).await.unwrap().len(), 1);
        let per_location = backend.fetch_location_exits(&shore).await.unwrap();
        assert_eq!(per_location.len(), 1);
        assert!(per_location[0].location_id.is_none());

        backend.set_aggregate(SourceBehavior::Empty);
        backend.set_inline(SourceBehavior::Empty);
        assert!(backend.fetch_game_exits(&game).await.unwrap().is_empty());
        let full = backend.fetch_full_game(&game).await.unwrap();
        assert!(full.locations.iter().all(|l| l.exits.is_none()));

        backend.fail_location_fetch(&shore);
        assert!(backend.fetch_location_exits(&shore).await.is_err());
    }

    #[tokio::test]
    async fn test_injected_fault_hits_only_the_nth_call() {
        let (backend, _, shore, tower) = seeded();
        backend.fail_write(WriteKind::PatchLocation, 2);

        assert!(backend
            .patch_location(&shore, &LocationPatch::order(5))
            .await
            .is_ok());
        assert!(backend
            .patch_location(&tower, &LocationPatch::order(6))
            .await
            .is_err());
        assert!(backend
            .patch_location(&tower, &LocationPatch::order(6))
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn test_deleting_a_location_leaves_incoming_exits_dangling() {
        let (backend, game, shore, tower) = seeded();
        backend.insert_exit(&tower, ExitDraft::button("Down", shore.clone()));

        backend.delete_location(&shore).await.unwrap();
        let exits = backend.exits(&game);
        assert_eq!(exits.len(), 1);
        assert_eq!(exits[0].target_location_id, Some(shore));
    }

    #[tokio::test]
    async fn test_poll_script_repeats_last_step() {
        let backend = InMemoryBackend::new();
        backend.script_ingest(
            IngestStart::Job(JobId::new("j")),
            vec![PollStep::Report(JobSnapshot::running("parsing"))],
        );
        let job = JobId::new("j");
        for _ in 0..3 {
            let snap = backend.poll_ingest(&job).await.unwrap();
            assert_eq!(snap.progress.as_deref(), Some("parsing"));
        }
        assert_eq!(backend.poll_count(), 3);
    }

    #[tokio::test]
    async fn test_calls_are_recorded_as_rest_paths() {
        let (backend, game, _, _) = seeded();
        backend.clear_calls();
        backend.fetch_full_game(&game).await.unwrap();
        backend.fetch_game_exits(&game).await.unwrap();
        assert_eq!(
            backend.calls(),
            vec![
                format!("GET /admin/games/{game}/full"),
                format!("GET /games/{game}/exits"),
            ]
        );
    }
}
