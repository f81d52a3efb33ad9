#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Health-threshold repair policy for self-repairing structures.

use std::collections::BTreeMap;

use outpost_core::{Capability, EntityId, Event, FactionId, WorldHost};
use outpost_system_triggers::{TriggerFired, TriggerRegistry};
use tracing::{debug, trace};

/// Repair policy attached to one structure.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RepairRule {
    building: EntityId,
    threshold: f64,
}

impl RepairRule {
    /// Structure the rule watches.
    #[must_use]
    pub const fn building(&self) -> EntityId {
        self.building
    }

    /// Fraction of maximum health below which repairs start.
    #[must_use]
    pub const fn threshold(&self) -> f64 {
        self.threshold
    }

    fn needs_repair(&self, health: u32, max_health: u32) -> bool {
        f64::from(health) < self.threshold * f64::from(max_health)
    }
}

/// Watches damage on a faction's self-repairing structures and orders repairs.
///
/// Every damage event re-evaluates the rule. Repeated requests while a
/// repair is already running are passed through to the world unchanged.
#[derive(Debug)]
pub struct RepairWatcher {
    faction: FactionId,
    rules: BTreeMap<EntityId, RepairRule>,
    triggers: TriggerRegistry<()>,
    fired: Vec<TriggerFired<()>>,
}

impl RepairWatcher {
    /// Creates one rule per structure of `faction` that can repair itself.
    pub fn install<W: WorldHost + ?Sized>(world: &W, faction: FactionId, threshold: f64) -> Self {
        let mut watcher = Self {
            faction,
            rules: BTreeMap::new(),
            triggers: TriggerRegistry::new(),
            fired: Vec::new(),
        };

        for building in world.actors_owned_by(faction) {
            if !world.has_capability(building, Capability::Building)
                || !world.has_capability(building, Capability::SelfRepair)
            {
                continue;
            }

            watcher.triggers.on_damaged(building, ());
            let _ = watcher
                .rules
                .insert(building, RepairRule { building, threshold });
        }

        debug!(
            faction = faction.get(),
            buildings = watcher.rules.len(),
            threshold,
            "repair rules installed"
        );
        watcher
    }

    /// Evaluates damage events and pushes every structure ordered to repair.
    pub fn handle<W: WorldHost + ?Sized>(
        &mut self,
        world: &mut W,
        events: &[Event],
        out: &mut Vec<EntityId>,
    ) {
        self.triggers.handle(events, &mut self.fired);
        for fired in self.fired.drain(..) {
            let Some(rule) = self.rules.get(&fired.entity) else {
                continue;
            };

            if world.owner(rule.building) != Some(self.faction) {
                trace!(building = rule.building.get(), "repair skipped for lost structure");
                continue;
            }

            let (Some(health), Some(max_health)) =
                (world.health(rule.building), world.max_health(rule.building))
            else {
                continue;
            };

            if rule.needs_repair(health, max_health) {
                debug!(building = rule.building.get(), health, max_health, "repair ordered");
                world.start_repair(rule.building);
                out.push(rule.building);
            }
        }

        for event in events {
            if let Event::Killed { entity } = event {
                let _ = self.rules.remove(entity);
            }
        }
    }

    /// Rules still in effect.
    pub fn rules(&self) -> impl Iterator<Item = &RepairRule> {
        self.rules.values()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn threshold_is_strict() {
        let rule = RepairRule {
            building: EntityId::new(1),
            threshold: 0.5,
        };
        assert!(!rule.needs_repair(500, 1000));
        assert!(rule.needs_repair(499, 1000));
        assert!(!RepairRule {
            building: EntityId::new(1),
            threshold: 0.0,
        }
        .needs_repair(0, 1000));
    }
}
