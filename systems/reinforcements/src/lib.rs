#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Delivery of reinforcement waves along an entry path.
//!
//! Unit `i` of a wave is delivered `i * per_unit_delay` ticks after the wave
//! was requested, the first one on the next tick. Delivering a unit spawns it
//! at the first cell of the path, moves it along the remaining cells and then
//! applies the wave's [`ArrivalOrder`].

use outpost_core::{
    CellCoord, ConfigurationError, EntityId, FactionId, Stance, Tick, Ticks, UnitType, WorldHost,
};
use outpost_system_scheduler::ScheduledEventQueue;
use serde::Deserialize;
use tracing::debug;

/// Order applied to every unit of a wave right after it is spawned.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArrivalOrder {
    /// Keep the default behaviour of the unit.
    #[default]
    Hold,
    /// Assign an engagement stance.
    SetStance(Stance),
    /// Send the unit hunting once it has entered the map.
    Hunt,
}

impl ArrivalOrder {
    fn apply<W: WorldHost + ?Sized>(self, world: &mut W, entity: EntityId) {
        match self {
            Self::Hold => {}
            Self::SetStance(stance) => world.set_stance(entity, stance),
            Self::Hunt => world.hunt(entity),
        }
    }
}

/// Unit spawned by [`ReinforcementScheduler::deliver_due`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Delivered {
    /// Spawned actor.
    pub entity: EntityId,
    /// Owner of the actor.
    pub faction: FactionId,
    /// Type of the actor.
    pub unit_type: UnitType,
    /// Tick the delivery was due at.
    pub fire_tick: Tick,
}

#[derive(Clone, Debug)]
struct Pending {
    faction: FactionId,
    unit_type: UnitType,
    path: Vec<CellCoord>,
    on_arrival: ArrivalOrder,
}

/// Schedules and performs reinforcement deliveries.
#[derive(Debug, Default)]
pub struct ReinforcementScheduler {
    queue: ScheduledEventQueue<Pending>,
}

impl ReinforcementScheduler {
    /// Creates a scheduler without pending deliveries.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues one delivery per unit, spaced by `per_unit_delay` from the
    /// first one, which arrives on the next tick.
    ///
    /// Returns the tick of the last delivery. An empty path is a
    /// configuration error since units need a cell to enter from.
    pub fn reinforce<W: WorldHost + ?Sized>(
        &mut self,
        world: &W,
        faction: FactionId,
        units: &[UnitType],
        path: &[CellCoord],
        per_unit_delay: Ticks,
        on_arrival: ArrivalOrder,
    ) -> Result<Option<Tick>, ConfigurationError> {
        if path.is_empty() {
            return Err(ConfigurationError::EmptyPool {
                table: "reinforcement_path",
            });
        }

        self.queue.advance(world.now());
        let mut last = None;
        for (index, unit_type) in units.iter().enumerate() {
            let delay = Ticks::new(
                per_unit_delay
                    .saturating_mul(index as u64)
                    .get()
                    .saturating_add(1),
            );
            last = Some(self.queue.schedule(
                delay,
                Pending {
                    faction,
                    unit_type: unit_type.clone(),
                    path: path.to_vec(),
                    on_arrival,
                },
            ));
        }

        debug!(
            faction = faction.get(),
            units = units.len(),
            spacing = per_unit_delay.get(),
            "reinforcements queued"
        );
        Ok(last)
    }

    /// Spawns every unit whose delivery is due at the world's current tick.
    pub fn deliver_due<W: WorldHost + ?Sized>(&mut self, world: &mut W, out: &mut Vec<Delivered>) {
        self.queue.advance(world.now());
        while let Some(event) = self.queue.pop_due() {
            let pending = event.task;
            let Some((entry, rest)) = pending.path.split_first() else {
                continue;
            };

            let entity = world.spawn(pending.faction, &pending.unit_type, *entry);
            world.move_along(entity, rest);
            pending.on_arrival.apply(world, entity);
            debug!(
                entity = entity.get(),
                unit = %pending.unit_type,
                tick = event.fire_tick.get(),
                "reinforcement delivered"
            );
            out.push(Delivered {
                entity,
                faction: pending.faction,
                unit_type: pending.unit_type,
                fire_tick: event.fire_tick,
            });
        }
    }

    /// Number of deliveries still waiting.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.queue.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn arrival_orders_parse_from_toml() {
        #[derive(Deserialize)]
        struct Wrapper {
            first: ArrivalOrder,
            second: ArrivalOrder,
        }

        let wrapper: Wrapper =
            toml::from_str("first = \"hunt\"\nsecond = { set_stance = \"defend\" }\n")
                .expect("parses");
        assert_eq!(wrapper.first, ArrivalOrder::Hunt);
        assert_eq!(wrapper.second, ArrivalOrder::SetStance(Stance::Defend));
    }
}
