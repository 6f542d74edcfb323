//! Core domain types for the scenario graph.
//!
//! A game is a directed graph: locations are the nodes, exits are the edges.
//! These types mirror the admin backend's JSON (camelCase field names).

use std::fmt;
use std::path::Path;

use serde::{Deserialize, Deserializer, Serialize};

use crate::error::CoreError;

// ── Identifiers ───────────────────────────────────────────────────

/// Backend ids arrive either as strings or as integers.
#[derive(Deserialize)]
#[serde(untagged)]
enum RawId {
    Text(String),
    Number(i64),
}

impl RawId {
    fn into_string(self) -> String {
        match self {
            RawId::Text(s) => s,
            RawId::Number(n) => n.to_string(),
        }
    }
}

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Serialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_string())
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                RawId::deserialize(deserializer).map(|raw| Self(raw.into_string()))
            }
        }
    };
}

string_id!(
    /// Identifier of a game.
    GameId
);
string_id!(
    /// Identifier of a location (graph node).
    LocationId
);
string_id!(
    /// Identifier of an exit (graph edge).
    ExitId
);
string_id!(
    /// Identifier of a backend ingestion job.
    JobId
);

// ── Game ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GameStatus {
    #[default]
    Draft,
    Test,
    Published,
}

/// Game metadata without its locations.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GameInfo {
    pub id: GameId,
    #[serde(default)]
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cover_url: Option<String>,
    /// Narrative rules handed to the runtime interpreter.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rules: Option<String>,
    #[serde(default)]
    pub status: GameStatus,
}

/// A game as returned by the full-game fetch: metadata plus nested locations.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Game {
    #[serde(flatten)]
    pub info: GameInfo,
    #[serde(default)]
    pub locations: Vec<Location>,
}

/// Partial game update. Unset fields are left untouched by the backend.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GamePatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cover_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rules: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<GameStatus>,
}

impl GamePatch {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Apply the set fields onto `info`.
    pub fn apply_to(&self, info: &mut GameInfo) {
        if let Some(title) = &self.title {
            info.title = title.clone();
        }
        if self.description.is_some() {
            info.description = self.description.clone();
        }
        if self.author.is_some() {
            info.author = self.author.clone();
        }
        if self.cover_url.is_some() {
            info.cover_url = self.cover_url.clone();
        }
        if self.rules.is_some() {
            info.rules = self.rules.clone();
        }
        if let Some(status) = self.status {
            info.status = status;
        }
    }
}

// ── Location (node) ───────────────────────────────────────────────

/// A scene in the narrative graph.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Location {
    pub id: LocationId,
    /// Position among the game's locations. Expected unique per game.
    #[serde(default)]
    pub order: i64,
    #[serde(default)]
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub background_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub music_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rules_prompt: Option<String>,
    /// Exits embedded by the full-game fetch. `None` when the backend sent none.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exits: Option<Vec<Exit>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LocationDraft {
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub background_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub music_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rules_prompt: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LocationPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub background_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub music_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rules_prompt: Option<String>,
}

impl LocationPatch {
    /// A patch that only moves the location.
    pub fn order(order: i64) -> Self {
        Self {
            order: Some(order),
            ..Self::default()
        }
    }

    pub fn apply_to(&self, location: &mut Location) {
        if let Some(order) = self.order {
            location.order = order;
        }
        if let Some(title) = &self.title {
            location.title = title.clone();
        }
        if self.description.is_some() {
            location.description = self.description.clone();
        }
        if self.background_url.is_some() {
            location.background_url = self.background_url.clone();
        }
        if self.music_url.is_some() {
            location.music_url = self.music_url.clone();
        }
        if self.rules_prompt.is_some() {
            location.rules_prompt = self.rules_prompt.clone();
        }
    }
}

// ── Exit (edge) ───────────────────────────────────────────────────

/// The kind of transition an exit represents.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExitType {
    Button,
    Trigger,
    Gameover,
}

impl fmt::Display for ExitType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ExitType::Button => "BUTTON",
            ExitType::Trigger => "TRIGGER",
            ExitType::Gameover => "GAMEOVER",
        })
    }
}

impl std::str::FromStr for ExitType {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "BUTTON" => Ok(ExitType::Button),
            "TRIGGER" => Ok(ExitType::Trigger),
            "GAMEOVER" => Ok(ExitType::Gameover),
            _ => Err(CoreError::InvalidDocument(format!(
                "unknown exit type {s:?}, expected BUTTON, TRIGGER or GAMEOVER"
            ))),
        }
    }
}

/// A directed transition out of a location.
///
/// `target_location_id` and `is_game_over` are independent: an exit may carry
/// both, and nothing here decides which one wins.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Exit {
    pub id: ExitId,
    /// Owning location. Absent on some per-location responses.
    #[serde(default, alias = "fromKey", skip_serializing_if = "Option::is_none")]
    pub location_id: Option<LocationId>,
    #[serde(rename = "type")]
    pub exit_type: ExitType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub button_text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trigger_text: Option<String>,
    #[serde(default)]
    pub target_location_id: Option<LocationId>,
    #[serde(default)]
    pub is_game_over: bool,
}

impl Exit {
    /// A BUTTON or TRIGGER exit that leads somewhere.
    pub fn is_live(&self) -> bool {
        matches!(self.exit_type, ExitType::Button | ExitType::Trigger)
            && self.target_location_id.is_some()
    }

    pub fn ends_game(&self) -> bool {
        self.exit_type == ExitType::Gameover || self.is_game_over
    }

    /// Carries both a target and the game-over flag.
    pub fn is_ambiguous(&self) -> bool {
        self.target_location_id.is_some() && self.is_game_over
    }

    /// The text a player sees or types for this exit.
    pub fn label(&self) -> &str {
        let text = match self.exit_type {
            ExitType::Button => self.button_text.as_deref(),
            ExitType::Trigger => self.trigger_text.as_deref(),
            ExitType::Gameover => self.button_text.as_deref(),
        };
        text.unwrap_or("")
    }
}

/// Fields for a new exit.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ExitDraft {
    #[serde(rename = "type")]
    pub exit_type: ExitType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub button_text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trigger_text: Option<String>,
    #[serde(default)]
    pub target_location_id: Option<LocationId>,
    #[serde(default)]
    pub is_game_over: bool,
}

impl ExitDraft {
    pub fn button(text: &str, target: LocationId) -> Self {
        Self {
            exit_type: ExitType::Button,
            button_text: Some(text.to_string()),
            trigger_text: None,
            target_location_id: Some(target),
            is_game_over: false,
        }
    }

    pub fn trigger(phrase: &str, target: LocationId) -> Self {
        Self {
            exit_type: ExitType::Trigger,
            button_text: None,
            trigger_text: Some(phrase.to_string()),
            target_location_id: Some(target),
            is_game_over: false,
        }
    }

    pub fn game_over(text: &str) -> Self {
        Self {
            exit_type: ExitType::Gameover,
            button_text: Some(text.to_string()),
            trigger_text: None,
            target_location_id: None,
            is_game_over: true,
        }
    }

    /// Materialize the draft as an exit with the given identity.
    pub fn into_exit(self, id: ExitId, location_id: LocationId) -> Exit {
        Exit {
            id,
            location_id: Some(location_id),
            exit_type: self.exit_type,
            button_text: self.button_text,
            trigger_text: self.trigger_text,
            target_location_id: self.target_location_id,
            is_game_over: self.is_game_over,
        }
    }
}

/// Partial exit update. `target_location_id: Some(None)` clears the target.
#[derive(Debug, Clone, Default, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ExitPatch {
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub exit_type: Option<ExitType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub button_text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trigger_text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_location_id: Option<Option<LocationId>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_game_over: Option<bool>,
}

impl ExitPatch {
    pub fn apply_to(&self, exit: &mut Exit) {
        if let Some(exit_type) = self.exit_type {
            exit.exit_type = exit_type;
        }
        if self.button_text.is_some() {
            exit.button_text = self.button_text.clone();
        }
        if self.trigger_text.is_some() {
            exit.trigger_text = self.trigger_text.clone();
        }
        if let Some(target) = &self.target_location_id {
            exit.target_location_id = target.clone();
        }
        if let Some(flag) = self.is_game_over {
            exit.is_game_over = flag;
        }
    }
}

// ── Ingestion job ─────────────────────────────────────────────────

/// Response of the ingestion start call.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct JobTicket {
    #[serde(default)]
    pub job_id: Option<JobId>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Starting,
    Progress,
    Done,
    Error,
    /// Any status this client does not know; treated as still running.
    #[serde(other)]
    Unknown,
}

/// One observation of an ingestion job.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct JobSnapshot {
    pub status: JobStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub progress: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub game_id: Option<GameId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl JobSnapshot {
    pub fn running(progress: &str) -> Self {
        Self {
            status: JobStatus::Progress,
            progress: Some(progress.to_string()),
            game_id: None,
            error: None,
        }
    }

    pub fn done(game_id: GameId) -> Self {
        Self {
            status: JobStatus::Done,
            progress: None,
            game_id: Some(game_id),
            error: None,
        }
    }

    pub fn failed(message: &str) -> Self {
        Self {
            status: JobStatus::Error,
            progress: None,
            game_id: None,
            error: Some(message.to_string()),
        }
    }
}

/// A document submitted for ingestion.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceDocument {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

impl SourceDocument {
    /// Read a document from disk, guessing its content type from the extension.
    pub fn read(path: &Path) -> Result<Self, CoreError> {
        let bytes = std::fs::read(path)?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "document".to_string());
        let content_type = content_type_for(path).to_string();
        Ok(Self {
            file_name,
            content_type,
            bytes,
        })
    }
}

fn content_type_for(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .map(|e| e.to_string_lossy().to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "pdf" => "application/pdf",
        "docx" => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        "txt" => "text/plain",
        "md" => "text/markdown",
        "json" => "application/json",
        _ => "application/octet-stream",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_type_serializes_screaming() {
        assert_eq!(
            serde_json::to_string(&ExitType::Gameover).unwrap(),
            "\"GAMEOVER\""
        );
        let parsed: ExitType = serde_json::from_str("\"TRIGGER\"").unwrap();
        assert_eq!(parsed, ExitType::Trigger);
        assert!(serde_json::from_str::<ExitType>("\"LINK\"").is_err());
    }

    #[test]
    fn test_exit_accepts_numeric_ids_and_from_key() {
        let json = r#"{
            "id": 42,
            "fromKey": 7,
            "type": "BUTTON",
            "buttonText": "Open the door",
            "targetLocationId": "loc-9",
            "isGameOver": false
        }"#;
        let exit: Exit = serde_json::from_str(json).unwrap();
        assert_eq!(exit.id, ExitId::new("42"));
        assert_eq!(exit.location_id, Some(LocationId::new("7")));
        assert!(exit.is_live());
        assert!(!exit.is_ambiguous());
        assert_eq!(exit.label(), "Open the door");
    }

    #[test]
    fn test_exit_with_target_and_flag_is_ambiguous() {
        let exit = ExitDraft {
            is_game_over: true,
            ..ExitDraft::button("Jump", LocationId::new("b"))
        }
        .into_exit(ExitId::new("e1"), LocationId::new("a"));
        assert!(exit.is_ambiguous());
        assert!(exit.ends_game());
        assert!(exit.is_live());
    }

    #[test]
    fn test_game_flattens_metadata() {
        let json = r#"{
            "id": "g1",
            "title": "The Lighthouse",
            "status": "TEST",
            "locations": [
                {"id": "l1", "order": 1, "title": "Shore", "exits": []},
                {"id": "l2", "order": 2, "title": "Tower"}
            ]
        }"#;
        let game: Game = serde_json::from_str(json).unwrap();
        assert_eq!(game.info.title, "The Lighthouse");
        assert_eq!(game.info.status, GameStatus::Test);
        assert_eq!(game.locations[0].exits, Some(vec![]));
        assert_eq!(game.locations[1].exits, None);
    }

    #[test]
    fn test_exit_patch_serializes_cleared_target_as_null() {
        let patch = ExitPatch {
            target_location_id: Some(None),
            ..ExitPatch::default()
        };
        let json = serde_json::to_value(&patch).unwrap();
        assert_eq!(json, serde_json::json!({ "targetLocationId": null }));
    }

    #[test]
    fn test_unknown_job_status_is_tolerated() {
        let snap: JobSnapshot =
            serde_json::from_str(r#"{"status": "queued", "progress": "waiting"}"#).unwrap();
        assert_eq!(snap.status, JobStatus::Unknown);
        assert_eq!(snap.progress.as_deref(), Some("waiting"));
    }

    #[test]
    fn test_source_document_guesses_content_type() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("script.PDF");
        std::fs::write(&path, b"%PDF-1.7").unwrap();
        let doc = SourceDocument::read(&path).unwrap();
        assert_eq!(doc.file_name, "script.PDF");
        assert_eq!(doc.content_type, "application/pdf");
        assert_eq!(doc.bytes, b"%PDF-1.7");
    }
}
