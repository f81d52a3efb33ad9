#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Binding table that maps world conditions to tagged script actions.
//!
//! The registry never inspects the world. The world collaborator detects
//! discoveries, damage, deaths and idleness and reports them as [`Event`]
//! values; [`TriggerRegistry::handle`] matches those events against the
//! registered bindings and emits the bound actions for the caller to
//! dispatch. Actions registered while dispatching only observe later events.

use std::collections::BTreeSet;

use outpost_core::{EntityId, Event, FactionId};
use tracing::{debug, trace};

/// World condition a trigger listens for.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Condition {
    /// The source became visible to a faction.
    Discovered,
    /// The source took damage.
    Damaged,
    /// The source died.
    Killed,
    /// Every member of the source group died.
    AllKilled,
    /// The source ran out of orders.
    Idle,
}

/// Action bound to a trigger together with its persistence.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Binding<A> {
    /// Removed after its first firing.
    OneShot(A),
    /// Kept until the governing entity (or every group member) is gone.
    Persistent(A),
}

impl<A> Binding<A> {
    /// Action fired by the binding.
    #[must_use]
    pub fn action(&self) -> &A {
        match self {
            Self::OneShot(action) | Self::Persistent(action) => action,
        }
    }

    /// Reports whether the binding is discarded after firing once.
    #[must_use]
    pub const fn is_one_shot(&self) -> bool {
        matches!(self, Self::OneShot(_))
    }
}

/// Identifier of an entity group registered with the registry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GroupId(u32);

impl GroupId {
    /// Retrieves the numeric representation of the identifier.
    #[must_use]
    pub const fn get(&self) -> u32 {
        self.0
    }
}

/// Action released by a matching world event.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TriggerFired<A> {
    /// Action that was bound to the trigger.
    pub action: A,
    /// Entity whose event fired the trigger. For group triggers this is the
    /// member that caused the firing.
    pub entity: EntityId,
    /// Faction that discovered the entity, for discovery triggers.
    pub instigator: Option<FactionId>,
    /// Actor responsible for the damage, for damage triggers.
    pub attacker: Option<EntityId>,
}

#[derive(Clone, Debug)]
struct EntityTrigger<A> {
    entity: EntityId,
    condition: Condition,
    binding: Binding<A>,
}

#[derive(Clone, Debug)]
struct GroupTrigger<A> {
    id: GroupId,
    condition: Condition,
    alive: BTreeSet<EntityId>,
    binding: Binding<A>,
}

/// Registry of condition-to-action bindings keyed by entity or group.
#[derive(Debug)]
pub struct TriggerRegistry<A> {
    entity_triggers: Vec<EntityTrigger<A>>,
    group_triggers: Vec<GroupTrigger<A>>,
    next_group: u32,
}

impl<A> Default for TriggerRegistry<A> {
    fn default() -> Self {
        Self {
            entity_triggers: Vec::new(),
            group_triggers: Vec::new(),
            next_group: 0,
        }
    }
}

impl<A: Clone> TriggerRegistry<A> {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Fires `action` every time `entity` is discovered by a faction.
    ///
    /// Guarding against repeated discoveries is the action handler's job.
    pub fn on_discovered(&mut self, entity: EntityId, action: A) {
        self.bind(entity, Condition::Discovered, Binding::Persistent(action));
    }

    /// Fires `action` every time any living member of `group` is discovered.
    pub fn on_group_discovered(&mut self, group: &[EntityId], action: A) -> GroupId {
        self.bind_group(group, Condition::Discovered, Binding::Persistent(action))
    }

    /// Fires `action` on every damage event of `entity`.
    pub fn on_damaged(&mut self, entity: EntityId, action: A) {
        self.bind(entity, Condition::Damaged, Binding::Persistent(action));
    }

    /// Fires `action` once when `entity` dies.
    pub fn on_killed(&mut self, entity: EntityId, action: A) {
        self.bind(entity, Condition::Killed, Binding::OneShot(action));
    }

    /// Fires `action` exactly once, on the death of the last living member of
    /// `group`.
    ///
    /// Callers pass the members that are alive at registration. An empty
    /// group never fires.
    pub fn on_all_killed(&mut self, group: &[EntityId], action: A) -> GroupId {
        self.bind_group(group, Condition::AllKilled, Binding::OneShot(action))
    }

    /// Fires `action` every time `entity` becomes idle.
    pub fn on_idle(&mut self, entity: EntityId, action: A) {
        self.bind(entity, Condition::Idle, Binding::Persistent(action));
    }

    /// Matches world events against the registered bindings and emits the
    /// bound actions in event order.
    pub fn handle(&mut self, events: &[Event], out: &mut Vec<TriggerFired<A>>) {
        for event in events {
            match event {
                Event::Discovered { entity, by } => {
                    self.fire_entity(*entity, Condition::Discovered, Some(*by), None, out);
                    self.fire_group_discovered(*entity, *by, out);
                }
                Event::Damaged { entity, attacker } => {
                    self.fire_entity(*entity, Condition::Damaged, None, *attacker, out);
                }
                Event::Idle { entity } => {
                    self.fire_entity(*entity, Condition::Idle, None, None, out);
                }
                Event::Killed { entity } => {
                    self.fire_entity(*entity, Condition::Killed, None, None, out);
                    self.forget_entity(*entity);
                    self.record_group_death(*entity, out);
                }
                Event::TimeAdvanced { .. } | Event::ProductionCompleted { .. } => {}
            }
        }
    }

    /// Reports whether a trigger for `condition` is bound to `entity`.
    #[must_use]
    pub fn watches(&self, entity: EntityId, condition: Condition) -> bool {
        self.entity_triggers
            .iter()
            .any(|trigger| trigger.entity == entity && trigger.condition == condition)
    }

    /// Number of living members tracked for the group, or `None` once the
    /// group trigger has been retired.
    #[must_use]
    pub fn live_count(&self, group: GroupId) -> Option<usize> {
        self.group_triggers
            .iter()
            .find(|trigger| trigger.id == group)
            .map(|trigger| trigger.alive.len())
    }

    /// Number of bindings currently held, entity and group alike.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entity_triggers.len() + self.group_triggers.len()
    }

    /// Reports whether the registry holds no binding.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn bind(&mut self, entity: EntityId, condition: Condition, binding: Binding<A>) {
        trace!(entity = entity.get(), ?condition, "trigger registered");
        self.entity_triggers.push(EntityTrigger {
            entity,
            condition,
            binding,
        });
    }

    fn bind_group(
        &mut self,
        group: &[EntityId],
        condition: Condition,
        binding: Binding<A>,
    ) -> GroupId {
        let id = GroupId(self.next_group);
        self.next_group = self.next_group.wrapping_add(1);

        let alive: BTreeSet<EntityId> = group.iter().copied().collect();
        if alive.is_empty() {
            debug!(group = id.get(), ?condition, "empty group trigger ignored");
            return id;
        }

        trace!(group = id.get(), members = alive.len(), ?condition, "group trigger registered");
        self.group_triggers.push(GroupTrigger {
            id,
            condition,
            alive,
            binding,
        });
        id
    }

    fn fire_entity(
        &mut self,
        entity: EntityId,
        condition: Condition,
        instigator: Option<FactionId>,
        attacker: Option<EntityId>,
        out: &mut Vec<TriggerFired<A>>,
    ) {
        self.entity_triggers.retain(|trigger| {
            if trigger.entity != entity || trigger.condition != condition {
                return true;
            }

            out.push(TriggerFired {
                action: trigger.binding.action().clone(),
                entity,
                instigator,
                attacker,
            });
            !trigger.binding.is_one_shot()
        });
    }

    fn fire_group_discovered(
        &mut self,
        entity: EntityId,
        by: FactionId,
        out: &mut Vec<TriggerFired<A>>,
    ) {
        self.group_triggers.retain(|trigger| {
            if trigger.condition != Condition::Discovered || !trigger.alive.contains(&entity) {
                return true;
            }

            out.push(TriggerFired {
                action: trigger.binding.action().clone(),
                entity,
                instigator: Some(by),
                attacker: None,
            });
            !trigger.binding.is_one_shot()
        });
    }

    fn forget_entity(&mut self, entity: EntityId) {
        self.entity_triggers.retain(|trigger| trigger.entity != entity);
    }

    fn record_group_death(&mut self, entity: EntityId, out: &mut Vec<TriggerFired<A>>) {
        self.group_triggers.retain_mut(|trigger| {
            if !trigger.alive.remove(&entity) {
                return true;
            }

            if !trigger.alive.is_empty() {
                return true;
            }

            if trigger.condition == Condition::AllKilled {
                debug!(group = trigger.id.get(), last = entity.get(), "group wiped out");
                out.push(TriggerFired {
                    action: trigger.binding.action().clone(),
                    entity,
                    instigator: None,
                    attacker: None,
                });
            }
            false
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(values: &[u32]) -> Vec<EntityId> {
        values.iter().copied().map(EntityId::new).collect()
    }

    fn killed(value: u32) -> Event {
        Event::Killed {
            entity: EntityId::new(value),
        }
    }

    fn damaged(value: u32) -> Event {
        Event::Damaged {
            entity: EntityId::new(value),
            attacker: None,
        }
    }

    #[test]
    fn all_killed_fires_only_on_last_death() {
        let mut registry = TriggerRegistry::new();
        let group = registry.on_all_killed(&ids(&[1, 2, 3, 4]), "wiped");
        let mut out = Vec::new();

        registry.handle(&[killed(1), killed(2), killed(3)], &mut out);
        assert!(out.is_empty(), "three of four dead must not fire");
        assert_eq!(registry.live_count(group), Some(1));

        registry.handle(&[killed(4)], &mut out);
        assert_eq!(
            out,
            vec![TriggerFired {
                action: "wiped",
                entity: EntityId::new(4),
                instigator: None,
                attacker: None,
            }]
        );
        assert_eq!(registry.live_count(group), None);

        out.clear();
        registry.handle(&[killed(4), killed(1)], &mut out);
        assert!(out.is_empty(), "all-killed fires exactly once");
    }

    #[test]
    fn repeated_death_reports_do_not_double_count() {
        let mut registry = TriggerRegistry::new();
        let _ = registry.on_all_killed(&ids(&[7, 8]), ());
        let mut out = Vec::new();

        registry.handle(&[killed(7), killed(7), killed(7)], &mut out);
        assert!(out.is_empty());

        registry.handle(&[killed(8)], &mut out);
        assert_eq!(out.len(), 1);
    }

    #[test]
    fn damage_triggers_persist_until_entity_dies() {
        let mut registry = TriggerRegistry::new();
        registry.on_damaged(EntityId::new(5), "hit");
        let mut out = Vec::new();

        registry.handle(&[damaged(5), damaged(5), damaged(6)], &mut out);
        assert_eq!(out.len(), 2);

        registry.handle(&[killed(5)], &mut out);
        assert!(!registry.watches(EntityId::new(5), Condition::Damaged));

        out.clear();
        registry.handle(&[damaged(5)], &mut out);
        assert!(out.is_empty());
    }

    #[test]
    fn killed_triggers_fire_once() {
        let mut registry = TriggerRegistry::new();
        registry.on_killed(EntityId::new(2), "dead");
        registry.on_killed(EntityId::new(2), "also dead");
        let mut out = Vec::new();

        registry.handle(&[killed(2), killed(2)], &mut out);
        let actions: Vec<_> = out.iter().map(|fired| fired.action).collect();
        assert_eq!(actions, vec!["dead", "also dead"]);
        assert!(registry.is_empty());
    }

    #[test]
    fn group_discovery_reports_discoverer_for_every_event() {
        let mut registry = TriggerRegistry::new();
        let _ = registry.on_group_discovered(&ids(&[10, 11]), "seen");
        let player = FactionId::new(1);
        let enemy = FactionId::new(2);
        let mut out = Vec::new();

        registry.handle(
            &[
                Event::Discovered {
                    entity: EntityId::new(11),
                    by: enemy,
                },
                Event::Discovered {
                    entity: EntityId::new(10),
                    by: player,
                },
            ],
            &mut out,
        );

        let discoverers: Vec<_> = out.iter().map(|fired| fired.instigator).collect();
        assert_eq!(discoverers, vec![Some(enemy), Some(player)]);
    }

    #[test]
    fn idle_triggers_fire_on_every_idle_report() {
        let mut registry = TriggerRegistry::new();
        registry.on_idle(EntityId::new(3), "idle");
        let mut out = Vec::new();
        let idle = Event::Idle {
            entity: EntityId::new(3),
        };

        registry.handle(&[idle.clone(), idle], &mut out);
        assert_eq!(out.len(), 2);
        assert!(registry.watches(EntityId::new(3), Condition::Idle));
    }

    #[test]
    fn empty_groups_never_fire() {
        let mut registry: TriggerRegistry<()> = TriggerRegistry::new();
        let group = registry.on_all_killed(&[], ());
        assert_eq!(registry.live_count(group), None);
        assert!(registry.is_empty());
    }
}
