#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Per-faction objective state machines and the win/loss policy.
//!
//! Objectives start `Pending` and move once, to either `Completed` or
//! `Failed`. Every transition is applied before its [`ObjectiveEvent`] is
//! emitted, so observers always see the state the event describes.

use std::collections::BTreeMap;

use outpost_core::{FactionId, Ticks, WorldHost};
use tracing::{debug, info};

/// Ticks after scenario start during which no faction can be defeated.
///
/// Starting forces arrive through reinforcements, so "no units yet" must not
/// be mistaken for defeat on the first ticks.
pub const DEFEAT_GRACE_TICKS: Ticks = Ticks::new(2);

/// Identifier of a tracked objective.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectiveId(u32);

impl ObjectiveId {
    /// Retrieves the numeric representation of the identifier.
    #[must_use]
    pub const fn get(&self) -> u32 {
        self.0
    }
}

/// Whether an objective gates victory.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ObjectiveKind {
    /// Required for victory; failing it loses the game.
    Primary,
    /// Optional bonus goal.
    Secondary,
}

/// Progress of an objective.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ObjectiveState {
    /// Not yet resolved.
    Pending,
    /// Achieved. Terminal.
    Completed,
    /// Missed. Terminal.
    Failed,
}

impl ObjectiveState {
    /// Reports whether the state can no longer change.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        !matches!(self, Self::Pending)
    }
}

/// Final result reached by a faction.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Outcome {
    /// Every primary objective was completed.
    Won,
    /// A primary objective failed.
    Lost,
}

/// A tracked mission goal.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Objective {
    id: ObjectiveId,
    faction: FactionId,
    kind: ObjectiveKind,
    description: String,
    state: ObjectiveState,
}

impl Objective {
    /// Identifier of the objective.
    #[must_use]
    pub const fn id(&self) -> ObjectiveId {
        self.id
    }

    /// Faction pursuing the objective.
    #[must_use]
    pub const fn faction(&self) -> FactionId {
        self.faction
    }

    /// Whether the objective gates victory.
    #[must_use]
    pub const fn kind(&self) -> ObjectiveKind {
        self.kind
    }

    /// Text shown to the player.
    #[must_use]
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Current progress.
    #[must_use]
    pub const fn state(&self) -> ObjectiveState {
        self.state
    }
}

/// Notifications emitted by the tracker after each state change.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ObjectiveEvent {
    /// A new objective was registered.
    Added {
        /// Faction pursuing the objective.
        faction: FactionId,
        /// Identifier of the new objective.
        objective: ObjectiveId,
        /// Whether the objective gates victory.
        kind: ObjectiveKind,
        /// Text shown to the player.
        description: String,
    },
    /// An objective was completed.
    Completed {
        /// Faction pursuing the objective.
        faction: FactionId,
        /// Identifier of the objective.
        objective: ObjectiveId,
    },
    /// An objective failed.
    Failed {
        /// Faction pursuing the objective.
        faction: FactionId,
        /// Identifier of the objective.
        objective: ObjectiveId,
    },
    /// A faction completed all of its primary objectives.
    PlayerWon {
        /// Winning faction.
        faction: FactionId,
    },
    /// A faction failed one of its primary objectives.
    PlayerLost {
        /// Losing faction.
        faction: FactionId,
    },
}

impl ObjectiveEvent {
    /// Faction the notification concerns.
    #[must_use]
    pub const fn faction(&self) -> FactionId {
        match self {
            Self::Added { faction, .. }
            | Self::Completed { faction, .. }
            | Self::Failed { faction, .. }
            | Self::PlayerWon { faction }
            | Self::PlayerLost { faction } => *faction,
        }
    }
}

/// Owner of every objective record.
#[derive(Debug, Default)]
pub struct ObjectiveTracker {
    objectives: Vec<Objective>,
    outcomes: BTreeMap<FactionId, Outcome>,
}

impl ObjectiveTracker {
    /// Creates a tracker without objectives.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a new pending objective and announces it.
    pub fn add_objective(
        &mut self,
        faction: FactionId,
        kind: ObjectiveKind,
        description: impl Into<String>,
        out: &mut Vec<ObjectiveEvent>,
    ) -> ObjectiveId {
        let id = ObjectiveId(self.objectives.len() as u32);
        let description = description.into();
        debug!(objective = id.get(), faction = faction.get(), ?kind, %description, "objective added");
        self.objectives.push(Objective {
            id,
            faction,
            kind,
            description: description.clone(),
            state: ObjectiveState::Pending,
        });
        out.push(ObjectiveEvent::Added {
            faction,
            objective: id,
            kind,
            description,
        });
        id
    }

    /// Completes a pending objective. Returns `false` without notifying when
    /// the objective is unknown or already terminal.
    pub fn mark_completed(&mut self, id: ObjectiveId, out: &mut Vec<ObjectiveEvent>) -> bool {
        self.transition(id, ObjectiveState::Completed, out)
    }

    /// Fails a pending objective. Returns `false` without notifying when the
    /// objective is unknown or already terminal.
    pub fn mark_failed(&mut self, id: ObjectiveId, out: &mut Vec<ObjectiveEvent>) -> bool {
        self.transition(id, ObjectiveState::Failed, out)
    }

    /// Looks up an objective.
    #[must_use]
    pub fn objective(&self, id: ObjectiveId) -> Option<&Objective> {
        self.objectives.get(id.0 as usize)
    }

    /// Objectives of a faction in registration order.
    pub fn objectives_of(&self, faction: FactionId) -> impl Iterator<Item = &Objective> {
        self.objectives
            .iter()
            .filter(move |objective| objective.faction == faction)
    }

    /// Final result of the faction, once decided.
    #[must_use]
    pub fn outcome(&self, faction: FactionId) -> Option<Outcome> {
        self.outcomes.get(&faction).copied()
    }

    fn transition(
        &mut self,
        id: ObjectiveId,
        target: ObjectiveState,
        out: &mut Vec<ObjectiveEvent>,
    ) -> bool {
        let Some(objective) = self.objectives.get_mut(id.0 as usize) else {
            debug!(objective = id.get(), "transition on unknown objective ignored");
            return false;
        };

        if objective.state.is_terminal() {
            return false;
        }

        objective.state = target;
        let faction = objective.faction;
        info!(objective = id.get(), faction = faction.get(), state = ?target, "objective resolved");
        out.push(match target {
            ObjectiveState::Failed => ObjectiveEvent::Failed {
                faction,
                objective: id,
            },
            _ => ObjectiveEvent::Completed {
                faction,
                objective: id,
            },
        });

        self.settle(faction, out);
        true
    }

    fn settle(&mut self, faction: FactionId, out: &mut Vec<ObjectiveEvent>) {
        if self.outcomes.contains_key(&faction) {
            return;
        }

        let mut primaries = self
            .objectives
            .iter()
            .filter(|objective| objective.faction == faction)
            .filter(|objective| objective.kind == ObjectiveKind::Primary)
            .peekable();
        if primaries.peek().is_none() {
            return;
        }

        let mut all_completed = true;
        let mut any_failed = false;
        for objective in primaries {
            match objective.state {
                ObjectiveState::Failed => any_failed = true,
                ObjectiveState::Pending => all_completed = false,
                ObjectiveState::Completed => {}
            }
        }

        let outcome = if any_failed {
            Outcome::Lost
        } else if all_completed {
            Outcome::Won
        } else {
            return;
        };

        info!(faction = faction.get(), ?outcome, "faction outcome decided");
        let _ = self.outcomes.insert(faction, outcome);
        out.push(match outcome {
            Outcome::Won => ObjectiveEvent::PlayerWon { faction },
            Outcome::Lost => ObjectiveEvent::PlayerLost { faction },
        });
    }
}

/// Reports whether `faction` has been defeated `elapsed` ticks after the
/// scenario started.
///
/// A faction is defeated once it holds no required units, but never within
/// [`DEFEAT_GRACE_TICKS`] of the start.
pub fn is_defeated<W: WorldHost + ?Sized>(world: &W, faction: FactionId, elapsed: Ticks) -> bool {
    elapsed > DEFEAT_GRACE_TICKS && world.has_no_required_units(faction)
}

#[cfg(test)]
mod tests {
    use super::*;

    const PLAYER: FactionId = FactionId::new(1);
    const ENEMY: FactionId = FactionId::new(2);

    #[test]
    fn objectives_resolve_exactly_once() {
        let mut tracker = ObjectiveTracker::new();
        let mut events = Vec::new();
        let bonus = tracker.add_objective(PLAYER, ObjectiveKind::Secondary, "Bonus", &mut events);
        events.clear();

        assert!(tracker.mark_completed(bonus, &mut events));
        assert_eq!(
            events,
            vec![ObjectiveEvent::Completed {
                faction: PLAYER,
                objective: bonus,
            }]
        );

        events.clear();
        assert!(!tracker.mark_completed(bonus, &mut events));
        assert!(!tracker.mark_failed(bonus, &mut events));
        assert!(events.is_empty(), "terminal objectives never re-notify");
        assert_eq!(
            tracker.objective(bonus).map(Objective::state),
            Some(ObjectiveState::Completed)
        );
    }

    #[test]
    fn completing_every_primary_wins() {
        let mut tracker = ObjectiveTracker::new();
        let mut events = Vec::new();
        let first = tracker.add_objective(PLAYER, ObjectiveKind::Primary, "First", &mut events);
        let second = tracker.add_objective(PLAYER, ObjectiveKind::Primary, "Second", &mut events);
        let _ = tracker.add_objective(PLAYER, ObjectiveKind::Secondary, "Bonus", &mut events);
        events.clear();

        assert!(tracker.mark_completed(first, &mut events));
        assert_eq!(tracker.outcome(PLAYER), None);

        assert!(tracker.mark_completed(second, &mut events));
        assert_eq!(tracker.outcome(PLAYER), Some(Outcome::Won));
        assert_eq!(
            events.last(),
            Some(&ObjectiveEvent::PlayerWon { faction: PLAYER })
        );
    }

    #[test]
    fn failing_a_primary_loses_once() {
        let mut tracker = ObjectiveTracker::new();
        let mut events = Vec::new();
        let survive = tracker.add_objective(ENEMY, ObjectiveKind::Primary, "Survive", &mut events);
        let hold = tracker.add_objective(ENEMY, ObjectiveKind::Primary, "Hold", &mut events);
        events.clear();

        assert!(tracker.mark_failed(survive, &mut events));
        assert!(tracker.mark_failed(hold, &mut events));

        let losses = events
            .iter()
            .filter(|event| matches!(event, ObjectiveEvent::PlayerLost { .. }))
            .count();
        assert_eq!(losses, 1);
        assert_eq!(tracker.outcome(ENEMY), Some(Outcome::Lost));
    }

    #[test]
    fn secondary_objectives_never_decide_outcome() {
        let mut tracker = ObjectiveTracker::new();
        let mut events = Vec::new();
        let bonus = tracker.add_objective(PLAYER, ObjectiveKind::Secondary, "Bonus", &mut events);

        assert!(tracker.mark_failed(bonus, &mut events));
        assert_eq!(tracker.outcome(PLAYER), None);
        assert_eq!(tracker.objectives_of(PLAYER).count(), 1);
        assert_eq!(tracker.objectives_of(ENEMY).count(), 0);
    }
}
