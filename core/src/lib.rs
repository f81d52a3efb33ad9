#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Core contracts shared across the Abandoned Outpost mission layer.
//!
//! This crate defines the message surface that connects the world
//! collaborator with the mission orchestration systems. The world reports
//! [`Event`] values describing what happened during a tick, the systems react
//! deterministically, and every observable effect is requested back through
//! the [`WorldHost`] trait. Test harnesses and adapters drive the sandbox
//! world with [`Command`] values.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Number of simulation steps executed per second of scenario time.
pub const TICKS_PER_SECOND: u64 = 25;

/// Absolute simulation step measured from the start of the game.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Tick(u64);

impl Tick {
    /// The first simulation step.
    pub const ZERO: Self = Self(0);

    /// Creates a tick from its numeric index.
    #[must_use]
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    /// Retrieves the numeric index of the tick.
    #[must_use]
    pub const fn get(&self) -> u64 {
        self.0
    }

    /// Returns the tick reached after waiting for `delay`.
    #[must_use]
    pub const fn saturating_add(self, delay: Ticks) -> Self {
        Self(self.0.saturating_add(delay.get()))
    }

    /// Returns the number of ticks elapsed since `earlier`, or zero when
    /// `earlier` lies in the future.
    #[must_use]
    pub const fn since(self, earlier: Tick) -> Ticks {
        Ticks::new(self.0.saturating_sub(earlier.0))
    }
}

impl fmt::Display for Tick {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Span of simulation time measured in ticks.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Ticks(u64);

impl Ticks {
    /// An empty span.
    pub const ZERO: Self = Self(0);

    /// Creates a span from a raw tick count.
    #[must_use]
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    /// Converts whole seconds of scenario time into ticks.
    #[must_use]
    pub const fn from_seconds(seconds: u64) -> Self {
        Self(seconds.saturating_mul(TICKS_PER_SECOND))
    }

    /// Converts whole minutes of scenario time into ticks.
    #[must_use]
    pub const fn from_minutes(minutes: u64) -> Self {
        Self::from_seconds(minutes.saturating_mul(60))
    }

    /// Retrieves the raw tick count.
    #[must_use]
    pub const fn get(&self) -> u64 {
        self.0
    }

    /// Reports whether the span is empty.
    #[must_use]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// Multiplies the span by `factor`, saturating on overflow.
    #[must_use]
    pub const fn saturating_mul(self, factor: u64) -> Self {
        Self(self.0.saturating_mul(factor))
    }
}

/// Unique identifier of an actor placed in the world.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityId(u32);

impl EntityId {
    /// Creates a new entity identifier with the provided numeric value.
    #[must_use]
    pub const fn new(value: u32) -> Self {
        Self(value)
    }

    /// Retrieves the numeric representation of the identifier.
    #[must_use]
    pub const fn get(&self) -> u32 {
        self.0
    }
}

/// Identifier of a controlling side.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FactionId(u32);

impl FactionId {
    /// Creates a new faction identifier with the provided numeric value.
    #[must_use]
    pub const fn new(value: u32) -> Self {
        Self(value)
    }

    /// Retrieves the numeric representation of the identifier.
    #[must_use]
    pub const fn get(&self) -> u32 {
        self.0
    }
}

/// Handle correlating an accepted production request with its completion.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ProductionTicket(u64);

impl ProductionTicket {
    /// Creates a ticket from its numeric value.
    #[must_use]
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    /// Retrieves the numeric value of the ticket.
    #[must_use]
    pub const fn get(&self) -> u64 {
        self.0
    }
}

/// Location of a single map cell expressed as column and row coordinates.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CellCoord {
    column: u32,
    row: u32,
}

impl CellCoord {
    /// Creates a new map cell coordinate.
    #[must_use]
    pub const fn new(column: u32, row: u32) -> Self {
        Self { column, row }
    }

    /// Zero-based column index of the cell.
    #[must_use]
    pub const fn column(&self) -> u32 {
        self.column
    }

    /// Zero-based row index of the cell.
    #[must_use]
    pub const fn row(&self) -> u32 {
        self.row
    }
}

/// Name of a producible or placeable actor type, e.g. `"e1"` or `"harv"`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UnitType(String);

impl UnitType {
    /// Creates a unit type from its name.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Name of the unit type.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UnitType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Named selector choosing one row from every difficulty-indexed table.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DifficultyTier {
    /// Relaxed timings and light forces.
    Easy,
    /// The reference configuration.
    Normal,
    /// Aggressive timings and heavy forces.
    Hard,
}

impl DifficultyTier {
    /// Every tier in ascending order of difficulty.
    pub const ALL: [Self; 3] = [Self::Easy, Self::Normal, Self::Hard];

    /// Lowercase key used in configuration files.
    #[must_use]
    pub const fn key(self) -> &'static str {
        match self {
            Self::Easy => "easy",
            Self::Normal => "normal",
            Self::Hard => "hard",
        }
    }
}

impl fmt::Display for DifficultyTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl FromStr for DifficultyTier {
    type Err = UnknownTierError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|tier| tier.key().eq_ignore_ascii_case(value.trim()))
            .ok_or_else(|| UnknownTierError(value.to_owned()))
    }
}

/// Error returned when a string does not name a difficulty tier.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
#[error("unknown difficulty tier `{0}`; expected easy, normal or hard")]
pub struct UnknownTierError(String);

/// Trait-like properties an actor may expose to the mission layer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    /// The actor is a structure.
    Building,
    /// The structure can repair itself when ordered to.
    SelfRepair,
    /// The actor collects resources.
    Harvester,
}

/// Engagement rules applied to a unit.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stance {
    /// Never fire.
    HoldFire,
    /// Fire only when fired upon.
    ReturnFire,
    /// Engage enemies within range without pursuing.
    Defend,
    /// Engage and pursue anything hostile.
    AttackAnything,
}

/// Presentation channel used for on-screen messages.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum MessageCategory {
    /// Mission narration.
    Mission,
    /// Objective progress notices.
    Objective,
    /// Arrival of reinforcements or unlocked support powers.
    Support,
}

/// Ordered waypoint path assigned to a unit for patrolling.
///
/// Routes are immutable once built; units hold their own copy of the order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PatrolRoute {
    waypoints: Vec<CellCoord>,
    looping: bool,
    wait: Ticks,
}

impl PatrolRoute {
    /// Creates a new patrol route.
    #[must_use]
    pub fn new(waypoints: Vec<CellCoord>, looping: bool, wait: Ticks) -> Self {
        Self {
            waypoints,
            looping,
            wait,
        }
    }

    /// Waypoints visited in order.
    #[must_use]
    pub fn waypoints(&self) -> &[CellCoord] {
        &self.waypoints
    }

    /// Reports whether the patrol restarts after the last waypoint.
    #[must_use]
    pub const fn looping(&self) -> bool {
        self.looping
    }

    /// Time spent waiting at every stop.
    #[must_use]
    pub const fn wait(&self) -> Ticks {
        self.wait
    }
}

/// Events reported by the world collaborator after processing a tick.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Event {
    /// Indicates that the simulation clock advanced to `tick`.
    TimeAdvanced {
        /// Tick reached by the simulation.
        tick: Tick,
    },
    /// An actor became visible to a faction for the first time.
    Discovered {
        /// Actor that was discovered.
        entity: EntityId,
        /// Faction that discovered the actor.
        by: FactionId,
    },
    /// An actor took damage.
    Damaged {
        /// Actor that was damaged.
        entity: EntityId,
        /// Actor responsible for the damage, if known.
        attacker: Option<EntityId>,
    },
    /// An actor died or was destroyed.
    Killed {
        /// Actor that died.
        entity: EntityId,
    },
    /// An actor ran out of queued orders.
    Idle {
        /// Actor that became idle.
        entity: EntityId,
    },
    /// A previously accepted production request delivered its units.
    ProductionCompleted {
        /// Ticket handed to the world when the request was accepted.
        ticket: ProductionTicket,
        /// Structure that produced the units.
        factory: EntityId,
        /// Units created by the request, in production order.
        units: Vec<EntityId>,
    },
}

/// Commands that drive the sandbox world from tests and adapters.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Command {
    /// Advances the simulation clock by a single tick.
    Tick,
    /// Removes hit points from an actor, killing it at zero.
    Damage {
        /// Actor receiving the damage.
        entity: EntityId,
        /// Hit points removed.
        amount: u32,
        /// Actor responsible for the damage, if any.
        attacker: Option<EntityId>,
    },
    /// Kills an actor outright.
    Kill {
        /// Actor to kill.
        entity: EntityId,
    },
    /// Reveals an actor to a faction.
    Reveal {
        /// Actor being revealed.
        entity: EntityId,
        /// Faction that discovers it.
        by: FactionId,
    },
    /// Makes a production structure refuse its next `attempts` requests.
    RefuseProduction {
        /// Structure that should report itself busy.
        factory: EntityId,
        /// Number of consecutive requests to refuse.
        attempts: u32,
    },
    /// Transfers an actor to another faction.
    Capture {
        /// Actor changing hands.
        entity: EntityId,
        /// New owner.
        faction: FactionId,
    },
}

/// Contract implemented by the world collaborator.
///
/// The mission layer never simulates movement, combat or production itself;
/// it queries the world through this trait and requests every effect back
/// through it. Queries on unknown or dead actors answer conservatively
/// (`None`, `false`, empty) and actions on them are ignored.
pub trait WorldHost {
    /// Current simulation tick.
    fn now(&self) -> Tick;

    /// Reports whether the actor is dead or unknown.
    fn is_dead(&self, entity: EntityId) -> bool;

    /// Faction currently controlling the actor.
    fn owner(&self, entity: EntityId) -> Option<FactionId>;

    /// Current hit points of the actor.
    fn health(&self, entity: EntityId) -> Option<u32>;

    /// Maximum hit points of the actor.
    fn max_health(&self, entity: EntityId) -> Option<u32>;

    /// Reports whether the actor exposes the capability.
    fn has_capability(&self, entity: EntityId, capability: Capability) -> bool;

    /// Cell occupied by the actor.
    fn location(&self, entity: EntityId) -> Option<CellCoord>;

    /// Resolves a named map actor.
    fn named_actor(&self, name: &str) -> Option<EntityId>;

    /// Resolves a named map waypoint.
    fn waypoint(&self, name: &str) -> Option<CellCoord>;

    /// Living actors controlled by the faction, in ascending identifier order.
    fn actors_owned_by(&self, faction: FactionId) -> Vec<EntityId>;

    /// Reports whether the faction lost every unit that keeps it in the game.
    fn has_no_required_units(&self, faction: FactionId) -> bool;

    /// Living combat units of the faction able to attack ground targets.
    fn ground_attackers(&self, faction: FactionId) -> Vec<EntityId>;

    /// Removes the actor from the world.
    fn destroy(&mut self, entity: EntityId);

    /// Orders the actor to patrol the route.
    fn patrol(&mut self, entity: EntityId, route: &PatrolRoute);

    /// Queues a move that engages anything met on the way.
    fn attack_move(&mut self, entity: EntityId, location: CellCoord);

    /// Queues an open-ended search-and-destroy order.
    fn hunt(&mut self, entity: EntityId);

    /// Clears every queued order.
    fn stop(&mut self, entity: EntityId);

    /// Sends a harvester looking for resources.
    fn find_resources(&mut self, entity: EntityId);

    /// Starts repairing a structure; repeated calls while repairing are harmless.
    fn start_repair(&mut self, entity: EntityId);

    /// Changes the engagement rules of the actor.
    fn set_stance(&mut self, entity: EntityId, stance: Stance);

    /// Transfers the actor to another faction.
    fn change_owner(&mut self, entity: EntityId, faction: FactionId);

    /// Requests production of `units` at `factory`.
    ///
    /// Returns `false` when production could not start (factory busy). When
    /// `true` is returned the world later reports
    /// [`Event::ProductionCompleted`] carrying `ticket`.
    fn build(&mut self, factory: EntityId, units: &[UnitType], ticket: ProductionTicket) -> bool;

    /// Creates a new actor for the faction at the location.
    fn spawn(&mut self, faction: FactionId, unit_type: &UnitType, location: CellCoord) -> EntityId;

    /// Queues a plain move through the path.
    fn move_along(&mut self, entity: EntityId, path: &[CellCoord]);

    /// Makes a support power available to the faction.
    fn grant_power(&mut self, faction: FactionId, power: &str);

    /// Shows a message to the player.
    fn display_message(&mut self, text: &str, category: MessageCategory);

    /// Plays a speech notification for the faction.
    fn play_speech(&mut self, faction: FactionId, key: &str);
}

/// Configuration problems detected while setting up a scenario.
///
/// These are never recoverable at run time; setup fails loudly instead of
/// falling back to defaults.
#[derive(Debug, Error)]
pub enum ConfigurationError {
    /// A difficulty-indexed table lacks a row for the tier in use.
    #[error("parameter table `{table}` has no entry for difficulty tier `{tier}`")]
    MissingTier {
        /// Name of the offending table.
        table: &'static str,
        /// Tier that was requested.
        tier: DifficultyTier,
    },
    /// A pool that must offer at least one choice is empty.
    #[error("parameter table `{table}` must contain at least one entry")]
    EmptyPool {
        /// Name of the offending table.
        table: &'static str,
    },
    /// A delay range has its minimum above its maximum.
    #[error("delay range `{table}` is inverted for tier `{tier}`: {min} > {max}")]
    InvertedRange {
        /// Name of the offending range.
        table: &'static str,
        /// Tier whose row is inverted.
        tier: DifficultyTier,
        /// Lower bound found in the table.
        min: u64,
        /// Upper bound found in the table.
        max: u64,
    },
    /// A delay range given in ticks has its minimum above its maximum.
    #[error("delay range `{table}` is inverted: {min} > {max} ticks")]
    InvertedDelay {
        /// Name of the offending range.
        table: &'static str,
        /// Lower bound in ticks.
        min: u64,
        /// Upper bound in ticks.
        max: u64,
    },
    /// A threshold fraction falls outside `0.0..=1.0`.
    #[error("threshold `{table}` for tier `{tier}` must lie within 0.0..=1.0, found {value}")]
    InvalidThreshold {
        /// Name of the offending table.
        table: &'static str,
        /// Tier whose row is invalid.
        tier: DifficultyTier,
        /// Value found in the table.
        value: f64,
    },
    /// The map does not contain an actor referenced by name.
    #[error("map does not define an actor named `{0}`")]
    UnknownActor(String),
    /// The map does not contain a waypoint referenced by name.
    #[error("map does not define a waypoint named `{0}`")]
    UnknownWaypoint(String),
    /// The configuration text could not be parsed.
    #[error("failed to parse configuration")]
    Parse(#[from] toml::de::Error),
}

#[cfg(test)]
mod tests {
    use super::{DifficultyTier, Tick, Ticks, TICKS_PER_SECOND};

    #[test]
    fn duration_helpers_follow_tick_rate() {
        assert_eq!(Ticks::from_seconds(5).get(), 5 * TICKS_PER_SECOND);
        assert_eq!(Ticks::from_minutes(2), Ticks::from_seconds(120));
    }

    #[test]
    fn elapsed_ticks_saturate_when_earlier_is_later() {
        let start = Tick::new(10);
        assert_eq!(Tick::new(13).since(start), Ticks::new(3));
        assert_eq!(Tick::new(4).since(start), Ticks::ZERO);
    }

    #[test]
    fn tiers_parse_case_insensitively() {
        assert_eq!("Hard".parse::<DifficultyTier>(), Ok(DifficultyTier::Hard));
        assert_eq!(" easy ".parse::<DifficultyTier>(), Ok(DifficultyTier::Easy));
        assert!("brutal".parse::<DifficultyTier>().is_err());
    }
}
