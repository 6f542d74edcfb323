//! Normalized in-memory view of one game's graph.
//!
//! Locations and exits are stored once, keyed by id. The per-location exit
//! map, the flat exit list and the nested game view are projections computed
//! on demand, so there is nothing to keep in sync by hand.

use std::collections::HashMap;

use quill_core::{Exit, ExitId, Game, GameInfo, Location, LocationId};

use crate::reconcile::{EdgeSource, ReconciledEdges};

#[derive(Debug, Clone, Default)]
pub struct GraphStore {
    info: Option<GameInfo>,
    /// Sorted by `order`; ties keep the backend's array position.
    locations: Vec<Location>,
    exits: HashMap<ExitId, Exit>,
    /// Owner → exit ids, in source order.
    outgoing: HashMap<LocationId, Vec<ExitId>>,
    source: EdgeSource,
}

impl GraphStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the whole view with a freshly loaded game and its reconciled edges.
    pub fn replace(&mut self, game: Game, edges: ReconciledEdges) {
        let mut locations = game.locations;
        for location in &mut locations {
            location.exits = None;
        }
        locations.sort_by_key(|l| l.order);

        self.info = Some(game.info);
        self.locations = locations;
        self.exits.clear();
        self.outgoing.clear();
        self.source = edges.source;

        for (owner, exits) in edges.by_location {
            for exit in exits {
                self.insert_exit(owner.clone(), exit);
            }
        }
    }

    /// Make a just-created exit visible before the confirming reload.
    /// The next [`replace`](Self::replace) discards it.
    pub fn stage_exit(&mut self, exit: Exit) {
        if let Some(owner) = exit.location_id.clone() {
            self.insert_exit(owner, exit);
        }
    }

    fn insert_exit(&mut self, owner: LocationId, exit: Exit) {
        let id = exit.id.clone();
        if self.exits.insert(id.clone(), exit).is_none() {
            self.outgoing.entry(owner).or_default().push(id);
        }
    }

    pub fn info(&self) -> Option<&GameInfo> {
        self.info.as_ref()
    }

    pub fn source(&self) -> EdgeSource {
        self.source
    }

    pub fn locations(&self) -> &[Location] {
        &self.locations
    }

    pub fn location(&self, id: &LocationId) -> Option<&Location> {
        self.locations.iter().find(|l| &l.id == id)
    }

    /// Index of a location in the sorted list.
    pub fn position(&self, id: &LocationId) -> Option<usize> {
        self.locations.iter().position(|l| &l.id == id)
    }

    pub fn contains_location(&self, id: &LocationId) -> bool {
        self.position(id).is_some()
    }

    pub fn exit(&self, id: &ExitId) -> Option<&Exit> {
        self.exits.get(id)
    }

    pub fn location_count(&self) -> usize {
        self.locations.len()
    }

    pub fn exit_count(&self) -> usize {
        self.exits.len()
    }

    /// Exits leaving one location.
    pub fn exits_of(&self, id: &LocationId) -> Vec<&Exit> {
        self.outgoing
            .get(id)
            .map(|ids| ids.iter().filter_map(|e| self.exits.get(e)).collect())
            .unwrap_or_default()
    }

    /// Owners that have exits but are not locations of the game.
    pub fn orphan_owners(&self) -> Vec<&LocationId> {
        let mut orphans: Vec<&LocationId> = self
            .outgoing
            .keys()
            .filter(|owner| !self.contains_location(owner))
            .collect();
        orphans.sort();
        orphans
    }

    /// Projection: location id → its exits.
    pub fn exit_map(&self) -> HashMap<LocationId, Vec<Exit>> {
        self.outgoing
            .keys()
            .map(|owner| {
                let exits = self.exits_of(owner).into_iter().cloned().collect();
                (owner.clone(), exits)
            })
            .collect()
    }

    /// Projection: every exit once, in location order, orphans last.
    pub fn all_exits(&self) -> Vec<&Exit> {
        self.locations
            .iter()
            .map(|l| &l.id)
            .chain(self.orphan_owners())
            .flat_map(|owner| self.exits_of(owner))
            .collect()
    }

    /// Projection: the game with exits embedded in their locations.
    pub fn game_view(&self) -> Option<Game> {
        let info = self.info.clone()?;
        let locations = self
            .locations
            .iter()
            .map(|l| {
                let mut location = l.clone();
                location.exits = Some(self.exits_of(&l.id).into_iter().cloned().collect());
                location
            })
            .collect();
        Some(Game { info, locations })
    }

    pub fn orders(&self) -> Vec<i64> {
        self.locations.iter().map(|l| l.order).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quill_core::{ExitDraft, GameId, GameStatus};

    fn location(id: &str, order: i64) -> Location {
        Location {
            id: LocationId::new(id),
            order,
            title: id.to_uppercase(),
            description: None,
            background_url: None,
            music_url: None,
            rules_prompt: None,
            exits: Some(vec![]),
        }
    }

    fn game(locations: Vec<Location>) -> Game {
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
        }
    }

    fn exit(id: &str, from: &str, to: &str) -> Exit {
        ExitDraft::button("go", LocationId::new(to))
            .into_exit(ExitId::new(id), LocationId::new(from))
    }

    fn edges(exits: Vec<Exit>) -> ReconciledEdges {
        let mut by_location: HashMap<LocationId, Vec<Exit>> = HashMap::new();
        for e in exits {
            by_location
                .entry(e.location_id.clone().unwrap())
                .or_default()
                .push(e);
        }
        ReconciledEdges {
            source: EdgeSource::Aggregate,
            by_location,
        }
    }

    #[test]
    fn test_locations_sorted_with_stable_ties() {
        let mut store = GraphStore::new();
        store.replace(
            game(vec![location("c", 3), location("a", 1), location("b", 1)]),
            ReconciledEdges::default(),
        );
        let ids: Vec<&str> = store.locations().iter().map(|l| l.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
        assert!(store.locations().iter().all(|l| l.exits.is_none()));
    }

    #[test]
    fn test_projections_contain_each_exit_once() {
        let mut store = GraphStore::new();
        store.replace(
            game(vec![location("a", 1), location("b", 2)]),
            edges(vec![
                exit("e1", "b", "a"),
                exit("e2", "a", "b"),
                exit("e3", "ghost", "a"),
            ]),
        );

        let flat: Vec<&str> = store.all_exits().iter().map(|e| e.id.as_str()).collect();
        assert_eq!(flat, vec!["e2", "e1", "e3"]);

        let map = store.exit_map();
        assert_eq!(map.values().map(Vec::len).sum::<usize>(), 3);
        assert_eq!(store.orphan_owners(), vec![&LocationId::new("ghost")]);

        let view = store.game_view().unwrap();
        assert_eq!(view.locations[0].exits.as_ref().unwrap().len(), 1);
    }

    #[test]
    fn test_staged_exit_is_discarded_by_next_replace() {
        let mut store = GraphStore::new();
        let g = game(vec![location("a", 1), location("b", 2)]);
        store.replace(g.clone(), ReconciledEdges::default());

        store.stage_exit(exit("pending", "a", "b"));
        assert_eq!(store.exits_of(&LocationId::new("a")).len(), 1);

        store.replace(g, ReconciledEdges::default());
        assert_eq!(store.exit_count(), 0);
        assert_eq!(store.source(), EdgeSource::Empty);
    }
}
