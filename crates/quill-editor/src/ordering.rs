//! Location ordering: move a location one step up or down.
//!
//! A move is planned from the sorted location list before anything is
//! written. The plan touches as few records as possible:
//! - one write when an unused order value fits between the new neighbors,
//! - a swap of the two order values otherwise,
//! - a renumbering to `1..=N` when the current orders contain duplicates.

use std::str::FromStr;

use serde::Serialize;

use quill_api::AdminBackend;
use quill_core::events::EventPayload;
use quill_core::{Location, LocationId, LocationPatch};

use crate::error::{EditorError, Result};
use crate::ScenarioEditor;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Up,
    Down,
}

impl FromStr for Direction {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "up" => Ok(Direction::Up),
            "down" => Ok(Direction::Down),
            _ => Err(format!("Invalid direction: {s}. Choose: up, down")),
        }
    }
}

/// One persisted order change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OrderWrite {
    pub location_id: LocationId,
    pub from: i64,
    pub to: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum MovePlan {
    /// Already first (up) or last (down).
    Noop,
    Single(OrderWrite),
    /// Moved location first, neighbor second.
    Swap([OrderWrite; 2]),
    Renumber(Vec<OrderWrite>),
}

impl MovePlan {
    pub fn writes(&self) -> &[OrderWrite] {
        match self {
            MovePlan::Noop => &[],
            MovePlan::Single(write) => std::slice::from_ref(write),
            MovePlan::Swap(writes) => writes,
            MovePlan::Renumber(writes) => writes,
        }
    }

    pub fn is_noop(&self) -> bool {
        self.writes().is_empty()
    }
}

/// Result of a move, for the front end to scroll `focus` into view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MoveOutcome {
    pub focus: LocationId,
    pub plan: MovePlan,
}

fn strictly_increasing(locations: &[Location]) -> bool {
    locations.windows(2).all(|w| w[0].order < w[1].order)
}

/// Plan a move over `locations`, which must be sorted by order.
pub fn plan_move(
    locations: &[Location],
    location_id: &LocationId,
    direction: Direction,
) -> Result<MovePlan> {
    let idx = locations
        .iter()
        .position(|l| &l.id == location_id)
        .ok_or_else(|| EditorError::LocationNotFound(location_id.clone()))?;

    let neighbor = match direction {
        Direction::Up => idx.checked_sub(1),
        Direction::Down => Some(idx + 1).filter(|&n| n < locations.len()),
    };
    let Some(neighbor) = neighbor else {
        return Ok(MovePlan::Noop);
    };

    if !strictly_increasing(locations) {
        return Ok(renumber(locations, idx, neighbor));
    }

    let moved = &locations[idx];
    let next = &locations[neighbor];

    let beyond = match direction {
        Direction::Up => neighbor.checked_sub(1),
        Direction::Down => Some(neighbor + 1).filter(|&b| b < locations.len()),
    };
    if let Some(beyond) = beyond {
        let (low, high) = match direction {
            Direction::Up => (locations[beyond].order, next.order),
            Direction::Down => (next.order, locations[beyond].order),
        };
        if high - low >= 2 {
            return Ok(MovePlan::Single(OrderWrite {
                location_id: moved.id.clone(),
                from: moved.order,
                to: low + (high - low) / 2,
            }));
        }
    }

    Ok(MovePlan::Swap([
        OrderWrite {
            location_id: moved.id.clone(),
            from: moved.order,
            to: next.order,
        },
        OrderWrite {
            location_id: next.id.clone(),
            from: next.order,
            to: moved.order,
        },
    ]))
}

fn renumber(locations: &[Location], idx: usize, neighbor: usize) -> MovePlan {
    let mut sequence: Vec<&Location> = locations.iter().collect();
    sequence.swap(idx, neighbor);

    let writes: Vec<OrderWrite> = sequence
        .iter()
        .enumerate()
        .filter_map(|(i, location)| {
            let to = i as i64 + 1;
            (location.order != to).then(|| OrderWrite {
                location_id: location.id.clone(),
                from: location.order,
                to,
            })
        })
        .collect();

    if writes.is_empty() {
        MovePlan::Noop
    } else {
        MovePlan::Renumber(writes)
    }
}

impl<B: AdminBackend + ?Sized> ScenarioEditor<B> {
    /// Move a location one step, then reload the graph.
    ///
    /// Writes are issued one at a time; if one fails, the writes already
    /// applied are reverted and the error is returned without reloading.
    pub async fn move_location(
        &mut self,
        location_id: &LocationId,
        direction: Direction,
    ) -> Result<MoveOutcome> {
        let plan = plan_move(self.store.locations(), location_id, direction)?;
        let outcome = MoveOutcome {
            focus: location_id.clone(),
            plan,
        };
        if outcome.plan.is_noop() {
            tracing::debug!(location_id = %location_id, ?direction, "Move is a no-op");
            return Ok(outcome);
        }

        let writes = outcome.plan.writes();
        for (applied, write) in writes.iter().enumerate() {
            let patch = LocationPatch::order(write.to);
            if let Err(source) = self.backend.patch_location(&write.location_id, &patch).await {
                self.revert_orders(&writes[..applied]).await;
                return Err(self.write_failed("move_location", source));
            }
        }

        tracing::info!(
            location_id = %location_id,
            ?direction,
            writes = writes.len(),
            "Location moved"
        );
        self.notify(EventPayload::LocationMoved {
            location_id: location_id.clone(),
            writes: writes.len(),
        });

        self.refresh_after_write("move_location").await;
        Ok(outcome)
    }

    async fn revert_orders(&self, applied: &[OrderWrite]) {
        for write in applied.iter().rev() {
            let patch = LocationPatch::order(write.from);
            match self.backend.patch_location(&write.location_id, &patch).await {
                Ok(_) => tracing::info!(location_id = %write.location_id, order = write.from, "Order write reverted"),
                Err(e) => tracing::error!(
                    location_id = %write.location_id,
                    order = write.from,
                    error = %e,
                    "Failed to revert order write; orders may contain a duplicate"
                ),
            }
        }
    }
}
