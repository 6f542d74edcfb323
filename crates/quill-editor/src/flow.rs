//! Read-only flow overview: every location in order with where its exits lead.

use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;

use quill_core::{Exit, ExitId, ExitType, LocationId};

use crate::reconcile::EdgeSource;
use crate::store::GraphStore;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Destination {
    Location {
        location_id: LocationId,
        title: String,
    },
    /// Target id that is not a location of the game.
    Dangling { location_id: LocationId },
    GameOver,
    /// Both a target and the game-over flag; which one wins is undefined.
    Ambiguous {
        location_id: LocationId,
        title: Option<String>,
    },
    Nowhere,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "warning", rename_all = "snake_case")]
pub enum FlowWarning {
    DanglingTarget {
        exit_id: ExitId,
        location_id: LocationId,
        target: LocationId,
    },
    /// Live BUTTON or TRIGGER with neither a target nor the game-over flag.
    MissingTarget {
        exit_id: ExitId,
        location_id: LocationId,
    },
    MissingText {
        exit_id: ExitId,
        exit_type: ExitType,
    },
    AmbiguousGameOver {
        exit_id: ExitId,
        target: LocationId,
    },
    DuplicateOrder {
        order: i64,
        locations: Vec<LocationId>,
    },
    /// Exit owned by something that is not a location of the game.
    OrphanExit { exit_id: ExitId, owner: LocationId },
}

impl fmt::Display for FlowWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FlowWarning::DanglingTarget {
                exit_id,
                location_id,
                target,
            } => write!(f, "exit {exit_id} in {location_id} targets missing location {target}"),
            FlowWarning::MissingTarget {
                exit_id,
                location_id,
            } => write!(f, "exit {exit_id} in {location_id} leads nowhere"),
            FlowWarning::MissingText { exit_id, exit_type } => {
                write!(f, "{exit_type} exit {exit_id} has no text")
            }
            FlowWarning::AmbiguousGameOver { exit_id, target } => write!(
                f,
                "exit {exit_id} targets {target} and also ends the game"
            ),
            FlowWarning::DuplicateOrder { order, locations } => {
                let ids: Vec<&str> = locations.iter().map(LocationId::as_str).collect();
                write!(f, "order {order} shared by {}", ids.join(", "))
            }
            FlowWarning::OrphanExit { exit_id, owner } => {
                write!(f, "exit {exit_id} belongs to unknown location {owner}")
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FlowExit {
    pub exit_id: ExitId,
    pub exit_type: ExitType,
    pub label: String,
    pub destination: Destination,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FlowEntry {
    pub location_id: LocationId,
    pub order: i64,
    pub title: String,
    pub exits: Vec<FlowExit>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FlowOverview {
    pub title: String,
    pub source: EdgeSource,
    pub entries: Vec<FlowEntry>,
    pub warnings: Vec<FlowWarning>,
}

impl FlowOverview {
    pub fn build(store: &GraphStore) -> Self {
        let mut warnings = duplicate_orders(store);

        let entries = store
            .locations()
            .iter()
            .map(|location| FlowEntry {
                location_id: location.id.clone(),
                order: location.order,
                title: location.title.clone(),
                exits: store
                    .exits_of(&location.id)
                    .into_iter()
                    .map(|exit| describe(store, &location.id, exit, &mut warnings))
                    .collect(),
            })
            .collect();

        for owner in store.orphan_owners() {
            for exit in store.exits_of(owner) {
                warnings.push(FlowWarning::OrphanExit {
                    exit_id: exit.id.clone(),
                    owner: owner.clone(),
                });
            }
        }

        Self {
            title: store.info().map(|i| i.title.clone()).unwrap_or_default(),
            source: store.source(),
            entries,
            warnings,
        }
    }

    pub fn is_clean(&self) -> bool {
        self.warnings.is_empty()
    }
}

fn duplicate_orders(store: &GraphStore) -> Vec<FlowWarning> {
    let mut by_order: BTreeMap<i64, Vec<LocationId>> = BTreeMap::new();
    for location in store.locations() {
        by_order
            .entry(location.order)
            .or_default()
            .push(location.id.clone());
    }
    by_order
        .into_iter()
        .filter(|(_, ids)| ids.len() > 1)
        .map(|(order, locations)| FlowWarning::DuplicateOrder { order, locations })
        .collect()
}

fn describe(
    store: &GraphStore,
    owner: &LocationId,
    exit: &Exit,
    warnings: &mut Vec<FlowWarning>,
) -> FlowExit {
    let missing_text = match exit.exit_type {
        ExitType::Button => exit.button_text.as_deref().map_or(true, |t| t.trim().is_empty()),
        ExitType::Trigger => exit.trigger_text.as_deref().map_or(true, |t| t.trim().is_empty()),
        ExitType::Gameover => false,
    };
    if missing_text {
        warnings.push(FlowWarning::MissingText {
            exit_id: exit.id.clone(),
            exit_type: exit.exit_type,
        });
    }

    if let Some(target) = &exit.target_location_id {
        if !store.contains_location(target) {
            warnings.push(FlowWarning::DanglingTarget {
                exit_id: exit.id.clone(),
                location_id: owner.clone(),
                target: target.clone(),
            });
        }
    }

    let destination = match (&exit.target_location_id, exit.is_ambiguous()) {
        (Some(target), true) => {
            warnings.push(FlowWarning::AmbiguousGameOver {
                exit_id: exit.id.clone(),
                target: target.clone(),
            });
            Destination::Ambiguous {
                location_id: target.clone(),
                title: store.location(target).map(|l| l.title.clone()),
            }
        }
        (Some(target), false) => match store.location(target) {
            Some(location) => Destination::Location {
                location_id: target.clone(),
                title: location.title.clone(),
            },
            None => Destination::Dangling {
                location_id: target.clone(),
            },
        },
        (None, _) if exit.ends_game() => Destination::GameOver,
        (None, _) => {
            warnings.push(FlowWarning::MissingTarget {
                exit_id: exit.id.clone(),
                location_id: owner.clone(),
            });
            Destination::Nowhere
        }
    };

    FlowExit {
        exit_id: exit.id.clone(),
        exit_type: exit.exit_type,
        label: exit.label().to_string(),
        destination,
    }
}

impl fmt::Display for Destination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Destination::Location { title, .. } => write!(f, "→ {title}"),
            Destination::Dangling { location_id } => write!(f, "→ ?{location_id} (missing)"),
            Destination::GameOver => f.write_str("→ GAME OVER"),
            Destination::Ambiguous { location_id, title } => write!(
                f,
                "→ {} or GAME OVER (ambiguous)",
                title.as_deref().unwrap_or(location_id.as_str())
            ),
            Destination::Nowhere => f.write_str("→ (nowhere)"),
        }
    }
}

impl fmt::Display for FlowOverview {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{} [exits: {}]", self.title, self.source)?;
        for entry in &self.entries {
            writeln!(f, "{:>4}. {} ({})", entry.order, entry.title, entry.location_id)?;
            for exit in &entry.exits {
                writeln!(
                    f,
                    "        [{}] {:?} {}",
                    exit.exit_type, exit.label, exit.destination
                )?;
            }
        }
        if !self.warnings.is_empty() {
            writeln!(f, "Warnings:")?;
            for warning in &self.warnings {
                writeln!(f, "  - {warning}")?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use quill_core::{ExitDraft, Game, GameId, GameInfo, GameStatus, Location};

    use super::*;
    use crate::reconcile::ReconciledEdges;

    fn location(id: &str, order: i64) -> Location {
        Location {
            id: LocationId::new(id),
            order,
            title: format!("Room {id}"),
            description: None,
            background_url: None,
            music_url: None,
            rules_prompt: None,
            exits: None,
        }
    }

    fn store_with(locations: Vec<Location>, exits: Vec<(&str, &str, ExitDraft)>) -> GraphStore {
        let mut by_location: HashMap<LocationId, Vec<Exit>> = HashMap::new();
        for (id, owner, draft) in exits {
            let owner = LocationId::new(owner);
            by_location
                .entry(owner.clone())
                .or_default()
                .push(draft.into_exit(ExitId::new(id), owner));
        }
        let mut store = GraphStore::new();
        store.replace(
            Game {
                info: GameInfo {
                    id: GameId::new("g"),
                    title: "Lighthouse".to_string(),
                    description: None,
                    author: None,
                    cover_url: None,
                    rules: None,
                    status: GameStatus::Draft,
                },
                locations,
            },
            ReconciledEdges {
                source: EdgeSource::Aggregate,
                by_location,
            },
        );
        store
    }

    #[test]
    fn test_clean_graph_resolves_targets() {
        let store = store_with(
            vec![location("a", 1), location("b", 2)],
            vec![
                ("e1", "a", ExitDraft::button("Climb", LocationId::new("b"))),
                ("e2", "b", ExitDraft::game_over("Jump")),
            ],
        );
        let flow = FlowOverview::build(&store);
        assert!(flow.is_clean(), "{:?}", flow.warnings);
        assert_eq!(
            flow.entries[0].exits[0].destination,
            Destination::Location {
                location_id: LocationId::new("b"),
                title: "Room b".to_string(),
            }
        );
        assert_eq!(flow.entries[1].exits[0].destination, Destination::GameOver);
        let text = flow.to_string();
        assert!(text.contains("→ Room b"));
        assert!(text.contains("GAME OVER"));
    }

    #[test]
    fn test_reports_every_kind_of_problem() {
        let ambiguous = ExitDraft {
            is_game_over: true,
            ..ExitDraft::button("Leap", LocationId::new("a"))
        };
        let no_target = ExitDraft {
            target_location_id: None,
            ..ExitDraft::trigger("wander", LocationId::new("a"))
        };
        let no_text = ExitDraft {
            button_text: None,
            ..ExitDraft::button("x", LocationId::new("a"))
        };
        let store = store_with(
            vec![location("a", 1), location("b", 1)],
            vec![
                ("e1", "a", ExitDraft::button("Gone", LocationId::new("zz"))),
                ("e2", "a", ambiguous),
                ("e3", "b", no_target),
                ("e4", "b", no_text),
                ("e5", "ghost", ExitDraft::game_over("End")),
            ],
        );

        let flow = FlowOverview::build(&store);
        let kinds: Vec<&str> = flow
            .warnings
            .iter()
            .map(|w| match w {
                FlowWarning::DanglingTarget { .. } => "dangling",
                FlowWarning::MissingTarget { .. } => "missing_target",
                FlowWarning::MissingText { .. } => "missing_text",
                FlowWarning::AmbiguousGameOver { .. } => "ambiguous",
                FlowWarning::DuplicateOrder { .. } => "duplicate_order",
                FlowWarning::OrphanExit { .. } => "orphan",
            })
            .collect();
        assert_eq!(
            kinds,
            vec![
                "duplicate_order",
                "dangling",
                "ambiguous",
                "missing_target",
                "missing_text",
                "orphan"
            ]
        );
        assert!(matches!(
            flow.entries[0].exits[1].destination,
            Destination::Ambiguous { .. }
        ));
    }
}
