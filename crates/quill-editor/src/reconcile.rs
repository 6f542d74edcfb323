//! Edge reconciliation across the backend's three exit sources.
//!
//! The sources are consulted in a fixed order and exactly one of them is
//! trusted per pass: the aggregate fetch, then the exits embedded in the
//! full-game fetch, then one fetch per location. They are never merged.

use std::collections::{HashMap, HashSet};
use std::fmt;

use futures::future::join_all;
use serde::Serialize;

use quill_api::AdminBackend;
use quill_core::{Exit, ExitId, GameId, Location, LocationId};

/// Which source supplied the edges of a reconciliation pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeSource {
    /// `GET /games/{id}/exits`
    Aggregate,
    /// `exits` embedded in the full-game fetch.
    Inline,
    /// `GET /locations/{id}/exits` for every location.
    PerLocation,
    /// No source had any exit.
    #[default]
    Empty,
}

impl fmt::Display for EdgeSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            EdgeSource::Aggregate => "aggregate",
            EdgeSource::Inline => "inline",
            EdgeSource::PerLocation => "per-location",
            EdgeSource::Empty => "empty",
        })
    }
}

/// Exits grouped by owning location, all from a single source.
#[derive(Debug, Clone, Default)]
pub struct ReconciledEdges {
    pub source: EdgeSource,
    pub by_location: HashMap<LocationId, Vec<Exit>>,
}

impl ReconciledEdges {
    pub fn total(&self) -> usize {
        self.by_location.values().map(Vec::len).sum()
    }
}

/// Groups exits by owner, keeping the first occurrence of each exit id.
#[derive(Default)]
struct Grouper {
    seen: HashSet<ExitId>,
    by_location: HashMap<LocationId, Vec<Exit>>,
}

impl Grouper {
    fn push(&mut self, owner: &LocationId, mut exit: Exit) {
        if !self.seen.insert(exit.id.clone()) {
            tracing::debug!(exit_id = %exit.id, "Duplicate exit in source, keeping first");
            return;
        }
        exit.location_id = Some(owner.clone());
        self.by_location.entry(owner.clone()).or_default().push(exit);
    }

    fn finish(self, source: EdgeSource) -> ReconciledEdges {
        let source = if self.by_location.is_empty() {
            EdgeSource::Empty
        } else {
            source
        };
        ReconciledEdges {
            source,
            by_location: self.by_location,
        }
    }
}

/// Build the edge view of a game from whichever source currently holds data.
///
/// `locations` must come from the full-game fetch so that their inline
/// `exits` are available. Read failures count as "no data" for that source.
pub async fn reconcile_edges<B>(
    backend: &B,
    game_id: &GameId,
    locations: &[Location],
) -> ReconciledEdges
where
    B: AdminBackend + ?Sized,
{
    match backend.fetch_game_exits(game_id).await {
        Ok(exits) if !exits.is_empty() => return from_aggregate(exits),
        Ok(_) => tracing::debug!(game_id = %game_id, "Aggregate exit source is empty"),
        Err(e) => {
            tracing::warn!(game_id = %game_id, error = %e, "Aggregate exit fetch failed, treating as empty")
        }
    }

    if has_inline_exits(locations) {
        return from_inline(locations);
    }

    from_per_location(backend, locations).await
}

fn has_inline_exits(locations: &[Location]) -> bool {
    locations
        .iter()
        .any(|l| l.exits.as_ref().is_some_and(|exits| !exits.is_empty()))
}

fn from_aggregate(exits: Vec<Exit>) -> ReconciledEdges {
    let received = exits.len();
    let mut grouper = Grouper::default();
    for exit in exits {
        match exit.location_id.clone() {
            Some(owner) => grouper.push(&owner, exit),
            None => tracing::warn!(exit_id = %exit.id, "Aggregate exit has no owning location, dropped"),
        }
    }

    // The aggregate source answered, so it keeps precedence even if nothing survived.
    let edges = ReconciledEdges {
        source: EdgeSource::Aggregate,
        by_location: grouper.by_location,
    };
    if edges.total() == 0 {
        tracing::warn!(received, "Every aggregate exit lacked an owning location, all dropped");
    }
    edges
}

fn from_inline(locations: &[Location]) -> ReconciledEdges {
    let mut grouper = Grouper::default();
    for location in locations {
        for exit in location.exits.iter().flatten() {
            grouper.push(&location.id, exit.clone());
        }
    }
    grouper.finish(EdgeSource::Inline)
}

async fn from_per_location<B>(backend: &B, locations: &[Location]) -> ReconciledEdges
where
    B: AdminBackend + ?Sized,
{
    let fetches = locations.iter().map(|location| async move {
        (&location.id, backend.fetch_location_exits(&location.id).await)
    });
    let results = join_all(fetches).await;

    let mut grouper = Grouper::default();
    let mut failures = 0usize;
    for (location_id, result) in results {
        match result {
            Ok(exits) => {
                for exit in exits {
                    grouper.push(location_id, exit);
                }
            }
            Err(e) => {
                failures += 1;
                tracing::warn!(location_id = %location_id, error = %e, "Location exit fetch failed, treating as no exits");
            }
        }
    }

    if failures > 0 {
        tracing::info!(failures, locations = locations.len(), "Per-location reconciliation finished with failures");
    }
    grouper.finish(EdgeSource::PerLocation)
}
