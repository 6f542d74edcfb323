//! Portable scenario document used by export and import.
//!
//! Locations are referenced by document-local keys (`key`, `fromKey`, `toKey`)
//! rather than backend ids, so a document can be imported into a fresh game.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::types::{ExitType, GameId, GameStatus};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScenarioDocument {
    pub game: ScenarioGame,
    #[serde(default)]
    pub locations: Vec<ScenarioLocation>,
    #[serde(default)]
    pub exits: Vec<ScenarioExit>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ScenarioGame {
    #[serde(default)]
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cover_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rules: Option<String>,
    #[serde(default)]
    pub status: GameStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ScenarioLocation {
    pub key: String,
    pub order: i64,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub rules_prompt: Option<String>,
    #[serde(default)]
    pub background_url: Option<String>,
    #[serde(default)]
    pub music_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ScenarioExit {
    pub from_key: String,
    #[serde(rename = "type")]
    pub exit_type: ExitType,
    #[serde(default)]
    pub button_text: Option<String>,
    #[serde(default)]
    pub trigger_text: Option<String>,
    #[serde(default)]
    pub to_key: Option<String>,
    #[serde(default)]
    pub is_game_over: bool,
}

/// Response of the scenario import call.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ImportedScenario {
    #[serde(default)]
    pub game_id: Option<GameId>,
}

impl ScenarioDocument {
    pub fn from_json(json: &str) -> Result<Self, CoreError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn to_json_pretty(&self) -> Result<String, CoreError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Check that keys are unique and every exit endpoint resolves.
    pub fn validate(&self) -> Result<(), CoreError> {
        let mut keys = HashSet::with_capacity(self.locations.len());
        for location in &self.locations {
            if location.key.is_empty() {
                return Err(CoreError::InvalidDocument(format!(
                    "location {:?} has an empty key",
                    location.title
                )));
            }
            if !keys.insert(location.key.as_str()) {
                return Err(CoreError::InvalidDocument(format!(
                    "duplicate location key {:?}",
                    location.key
                )));
            }
        }

        for (i, exit) in self.exits.iter().enumerate() {
            if !keys.contains(exit.from_key.as_str()) {
                return Err(CoreError::InvalidDocument(format!(
                    "exit #{i} leaves unknown location {:?}",
                    exit.from_key
                )));
            }
            if let Some(to) = &exit.to_key {
                if !keys.contains(to.as_str()) {
                    return Err(CoreError::InvalidDocument(format!(
                        "exit #{i} targets unknown location {to:?}"
                    )));
                }
            }
        }

        Ok(())
    }
}
