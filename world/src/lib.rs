#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Deterministic sandbox world implementing the mission-layer collaborator.
//!
//! The sandbox keeps just enough state to exercise the orchestration systems:
//! actors with owners, hit points and capabilities, queued orders that finish
//! after a fixed number of ticks, production queues that can be told to
//! refuse requests, and a journal of every action requested through
//! [`WorldHost`]. Tests and adapters advance it with [`apply`].

mod map;

use std::collections::{BTreeMap, BTreeSet, VecDeque};

use outpost_core::{
    Capability, CellCoord, Command, EntityId, Event, FactionId, MessageCategory, PatrolRoute,
    ProductionTicket, Stance, Tick, Ticks, UnitType, WorldHost,
};
use tracing::{debug, trace};

pub use map::{ActorPlacement, ActorTemplate, MapDefinition, MapError};

const DEFAULT_PRODUCTION_TIME: Ticks = Ticks::from_seconds(8);
const DEFAULT_LEG_TIME: Ticks = Ticks::from_seconds(4);
const ATTACK_MOVE_TIME: Ticks = Ticks::from_seconds(6);
const REPAIR_PER_TICK: u32 = 2;
const FALLBACK_MAX_HEALTH: u32 = 100;

/// Order queued on an actor.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Order {
    /// Plain movement through the listed cells.
    Move(Vec<CellCoord>),
    /// Patrol along a route.
    Patrol(PatrolRoute),
    /// Move that engages anything on the way.
    AttackMove(CellCoord),
    /// Open-ended search-and-destroy.
    Hunt,
    /// Resource gathering.
    FindResources,
}

/// Record of an action requested through [`WorldHost`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum JournalEntry {
    /// An actor was removed.
    Destroyed(EntityId),
    /// A patrol was assigned.
    Patrol {
        /// Ordered actor.
        entity: EntityId,
        /// Assigned route.
        route: PatrolRoute,
    },
    /// An attack-move was queued.
    AttackMove {
        /// Ordered actor.
        entity: EntityId,
        /// Destination.
        location: CellCoord,
    },
    /// A hunt was queued.
    Hunt(EntityId),
    /// Orders were cleared.
    Stop(EntityId),
    /// A harvester was sent gathering.
    FindResources(EntityId),
    /// A repair was requested.
    StartRepair(EntityId),
    /// A stance was changed.
    SetStance {
        /// Ordered actor.
        entity: EntityId,
        /// New stance.
        stance: Stance,
    },
    /// An actor changed hands.
    OwnerChanged {
        /// Transferred actor.
        entity: EntityId,
        /// New owner.
        faction: FactionId,
    },
    /// A production request was accepted.
    BuildAccepted {
        /// Producing structure.
        factory: EntityId,
        /// Requested units.
        units: Vec<UnitType>,
        /// Ticket of the request.
        ticket: ProductionTicket,
    },
    /// A production request was refused.
    BuildRefused {
        /// Structure that refused.
        factory: EntityId,
    },
    /// An actor was created by script.
    Spawned {
        /// New actor.
        entity: EntityId,
        /// Owner of the actor.
        faction: FactionId,
        /// Type of the actor.
        unit_type: UnitType,
    },
    /// A move was queued.
    MoveAlong {
        /// Ordered actor.
        entity: EntityId,
        /// Cells to traverse.
        path: Vec<CellCoord>,
    },
    /// A support power was granted.
    PowerGranted {
        /// Receiving faction.
        faction: FactionId,
        /// Power key.
        power: String,
    },
    /// A message was shown.
    Message {
        /// Shown text.
        text: String,
        /// Presentation channel.
        category: MessageCategory,
    },
    /// A speech notification was played.
    Speech {
        /// Listening faction.
        faction: FactionId,
        /// Notification key.
        key: String,
    },
}

#[derive(Clone, Debug)]
struct Actor {
    unit_type: UnitType,
    owner: FactionId,
    health: u32,
    max_health: u32,
    capabilities: Vec<Capability>,
    attacker: bool,
    required: bool,
    location: CellCoord,
    stance: Option<Stance>,
    repairing: bool,
    orders: VecDeque<QueuedOrder>,
    discovered_by: BTreeSet<FactionId>,
}

#[derive(Clone, Debug)]
struct QueuedOrder {
    order: Order,
    remaining: Option<u64>,
}

#[derive(Clone, Debug)]
struct Production {
    ticket: ProductionTicket,
    factory: EntityId,
    units: Vec<UnitType>,
    ready_at: Tick,
}

/// Authoritative sandbox world state.
#[derive(Debug)]
pub struct World {
    tick: Tick,
    next_entity: u32,
    actors: BTreeMap<EntityId, Actor>,
    names: BTreeMap<String, EntityId>,
    waypoints: BTreeMap<String, CellCoord>,
    templates: BTreeMap<UnitType, ActorTemplate>,
    productions: Vec<Production>,
    refusals: BTreeMap<EntityId, u32>,
    powers: BTreeSet<(FactionId, String)>,
    journal: Vec<JournalEntry>,
    production_time: Ticks,
    leg_time: Ticks,
}

impl Default for World {
    fn default() -> Self {
        Self::new()
    }
}

impl World {
    /// Creates an empty sandbox at tick zero.
    #[must_use]
    pub fn new() -> Self {
        Self {
            tick: Tick::ZERO,
            next_entity: 1,
            actors: BTreeMap::new(),
            names: BTreeMap::new(),
            waypoints: BTreeMap::new(),
            templates: BTreeMap::new(),
            productions: Vec::new(),
            refusals: BTreeMap::new(),
            powers: BTreeSet::new(),
            journal: Vec::new(),
            production_time: DEFAULT_PRODUCTION_TIME,
            leg_time: DEFAULT_LEG_TIME,
        }
    }

    /// Populates a sandbox from a map definition.
    pub fn from_map(map: &MapDefinition) -> Result<Self, MapError> {
        let mut world = Self::new();
        for (name, template) in &map.templates {
            world.define_template(UnitType::new(name.clone()), template.clone());
        }

        for (name, location) in &map.waypoints {
            world.add_waypoint(name, *location);
        }

        for placement in &map.actors {
            if !world.templates.contains_key(&placement.unit_type) {
                return Err(MapError::UnknownTemplate(placement.unit_type.to_string()));
            }

            if let Some(name) = &placement.name {
                if world.names.contains_key(name) {
                    return Err(MapError::DuplicateName(name.clone()));
                }
            }

            let entity = world.place(
                placement.name.as_deref(),
                &placement.unit_type,
                placement.owner,
                placement.location,
            );
            if let Some(health) = placement.health {
                if let Some(actor) = world.actors.get_mut(&entity) {
                    actor.health = health.min(actor.max_health).max(1);
                }
            }
        }

        Ok(world)
    }

    /// Registers or replaces the template used for actors of `unit_type`.
    pub fn define_template(&mut self, unit_type: UnitType, template: ActorTemplate) {
        let _ = self.templates.insert(unit_type, template);
    }

    /// Registers a named waypoint.
    pub fn add_waypoint(&mut self, name: &str, location: CellCoord) {
        let _ = self.waypoints.insert(name.to_owned(), location);
    }

    /// Places a new actor, optionally under a map name.
    pub fn place(
        &mut self,
        name: Option<&str>,
        unit_type: &UnitType,
        owner: FactionId,
        location: CellCoord,
    ) -> EntityId {
        let entity = EntityId::new(self.next_entity);
        self.next_entity = self.next_entity.saturating_add(1);

        let template = self.templates.get(unit_type).cloned().unwrap_or(ActorTemplate {
            max_health: FALLBACK_MAX_HEALTH,
            capabilities: Vec::new(),
            attacker: true,
            required: true,
        });
        let _ = self.actors.insert(
            entity,
            Actor {
                unit_type: unit_type.clone(),
                owner,
                health: template.max_health,
                max_health: template.max_health,
                capabilities: template.capabilities,
                attacker: template.attacker,
                required: template.required,
                location,
                stance: None,
                repairing: false,
                orders: VecDeque::new(),
                discovered_by: BTreeSet::new(),
            },
        );

        if let Some(name) = name {
            let _ = self.names.insert(name.to_owned(), entity);
        }

        trace!(entity = entity.get(), %unit_type, owner = owner.get(), "actor placed");
        entity
    }

    /// Overrides how long accepted production takes.
    pub fn set_production_time(&mut self, duration: Ticks) {
        self.production_time = duration;
    }

    /// Overrides how long each movement leg takes.
    pub fn set_leg_time(&mut self, duration: Ticks) {
        self.leg_time = duration;
    }

    /// Forgets every journal entry recorded so far.
    pub fn clear_journal(&mut self) {
        self.journal.clear();
    }

    fn record(&mut self, entry: JournalEntry) {
        self.journal.push(entry);
    }

    fn order_duration(&self, order: &Order) -> Option<u64> {
        let legs = |count: usize| self.leg_time.get().saturating_mul(count.max(1) as u64);
        match order {
            Order::Move(path) => Some(legs(path.len())),
            Order::Patrol(route) if route.looping() => None,
            Order::Patrol(route) => {
                let stops = route.waypoints().len() as u64;
                Some(legs(route.waypoints().len()) + route.wait().get().saturating_mul(stops))
            }
            Order::AttackMove(_) => Some(ATTACK_MOVE_TIME.get()),
            Order::Hunt | Order::FindResources => None,
        }
    }

    fn queue_order(&mut self, entity: EntityId, order: Order) -> bool {
        let remaining = self.order_duration(&order);
        let Some(actor) = self.actors.get_mut(&entity) else {
            return false;
        };
        actor.orders.push_back(QueuedOrder { order, remaining });
        true
    }

    fn kill(&mut self, entity: EntityId, out_events: &mut Vec<Event>) {
        if self.actors.remove(&entity).is_none() {
            return;
        }

        self.names.retain(|_, id| *id != entity);
        let _ = self.refusals.remove(&entity);
        debug!(entity = entity.get(), "actor killed");
        out_events.push(Event::Killed { entity });
    }

    fn advance(&mut self, out_events: &mut Vec<Event>) {
        self.tick = self.tick.saturating_add(Ticks::new(1));
        out_events.push(Event::TimeAdvanced { tick: self.tick });

        for (entity, actor) in self.actors.iter_mut() {
            if actor.repairing {
                actor.health = actor.health.saturating_add(REPAIR_PER_TICK).min(actor.max_health);
                if actor.health == actor.max_health {
                    actor.repairing = false;
                }
            }

            let Some(front) = actor.orders.front_mut() else {
                continue;
            };
            let Some(remaining) = front.remaining.as_mut() else {
                continue;
            };

            *remaining = remaining.saturating_sub(1);
            if *remaining > 0 {
                continue;
            }

            if let Some(finished) = actor.orders.pop_front() {
                match finished.order {
                    Order::Move(path) => {
                        if let Some(last) = path.last() {
                            actor.location = *last;
                        }
                    }
                    Order::Patrol(route) => {
                        if let Some(last) = route.waypoints().last() {
                            actor.location = *last;
                        }
                    }
                    Order::AttackMove(location) => actor.location = location,
                    Order::Hunt | Order::FindResources => {}
                }
            }

            if actor.orders.is_empty() {
                out_events.push(Event::Idle { entity: *entity });
            }
        }

        let now = self.tick;
        let (ready, waiting): (Vec<Production>, Vec<Production>) = self
            .productions
            .drain(..)
            .partition(|production| production.ready_at <= now);
        self.productions = waiting;

        for production in ready {
            let Some(factory) = self.actors.get(&production.factory) else {
                debug!(ticket = production.ticket.get(), "production lost with its factory");
                continue;
            };
            let owner = factory.owner;
            let location = factory.location;
            let units = production
                .units
                .iter()
                .map(|unit_type| self.place(None, unit_type, owner, location))
                .collect();
            out_events.push(Event::ProductionCompleted {
                ticket: production.ticket,
                factory: production.factory,
                units,
            });
        }
    }
}

/// Applies the provided command to the world, mutating state deterministically.
pub fn apply(world: &mut World, command: Command, out_events: &mut Vec<Event>) {
    match command {
        Command::Tick => world.advance(out_events),
        Command::Damage {
            entity,
            amount,
            attacker,
        } => {
            let Some(actor) = world.actors.get_mut(&entity) else {
                return;
            };
            actor.health = actor.health.saturating_sub(amount);
            if actor.health == 0 {
                world.kill(entity, out_events);
            } else {
                out_events.push(Event::Damaged { entity, attacker });
            }
        }
        Command::Kill { entity } => world.kill(entity, out_events),
        Command::Reveal { entity, by } => {
            if let Some(actor) = world.actors.get_mut(&entity) {
                if actor.discovered_by.insert(by) {
                    out_events.push(Event::Discovered { entity, by });
                }
            }
        }
        Command::RefuseProduction { factory, attempts } => {
            let _ = world.refusals.insert(factory, attempts);
        }
        Command::Capture { entity, faction } => {
            if let Some(actor) = world.actors.get_mut(&entity) {
                actor.owner = faction;
            }
        }
    }
}

impl WorldHost for World {
    fn now(&self) -> Tick {
        self.tick
    }

    fn is_dead(&self, entity: EntityId) -> bool {
        !self.actors.contains_key(&entity)
    }

    fn owner(&self, entity: EntityId) -> Option<FactionId> {
        self.actors.get(&entity).map(|actor| actor.owner)
    }

    fn health(&self, entity: EntityId) -> Option<u32> {
        self.actors.get(&entity).map(|actor| actor.health)
    }

    fn max_health(&self, entity: EntityId) -> Option<u32> {
        self.actors.get(&entity).map(|actor| actor.max_health)
    }

    fn has_capability(&self, entity: EntityId, capability: Capability) -> bool {
        self.actors
            .get(&entity)
            .is_some_and(|actor| actor.capabilities.contains(&capability))
    }

    fn location(&self, entity: EntityId) -> Option<CellCoord> {
        self.actors.get(&entity).map(|actor| actor.location)
    }

    fn named_actor(&self, name: &str) -> Option<EntityId> {
        self.names.get(name).copied()
    }

    fn waypoint(&self, name: &str) -> Option<CellCoord> {
        self.waypoints.get(name).copied()
    }

    fn actors_owned_by(&self, faction: FactionId) -> Vec<EntityId> {
        self.actors
            .iter()
            .filter(|(_, actor)| actor.owner == faction)
            .map(|(entity, _)| *entity)
            .collect()
    }

    fn has_no_required_units(&self, faction: FactionId) -> bool {
        !self
            .actors
            .values()
            .any(|actor| actor.owner == faction && actor.required)
    }

    fn ground_attackers(&self, faction: FactionId) -> Vec<EntityId> {
        self.actors
            .iter()
            .filter(|(_, actor)| actor.owner == faction && actor.attacker)
            .map(|(entity, _)| *entity)
            .collect()
    }

    fn destroy(&mut self, entity: EntityId) {
        if self.actors.remove(&entity).is_some() {
            self.names.retain(|_, id| *id != entity);
            self.record(JournalEntry::Destroyed(entity));
        }
    }

    fn patrol(&mut self, entity: EntityId, route: &PatrolRoute) {
        if self.queue_order(entity, Order::Patrol(route.clone())) {
            self.record(JournalEntry::Patrol {
                entity,
                route: route.clone(),
            });
        }
    }

    fn attack_move(&mut self, entity: EntityId, location: CellCoord) {
        if self.queue_order(entity, Order::AttackMove(location)) {
            self.record(JournalEntry::AttackMove { entity, location });
        }
    }

    fn hunt(&mut self, entity: EntityId) {
        if self.queue_order(entity, Order::Hunt) {
            self.record(JournalEntry::Hunt(entity));
        }
    }

    fn stop(&mut self, entity: EntityId) {
        if let Some(actor) = self.actors.get_mut(&entity) {
            actor.orders.clear();
            self.record(JournalEntry::Stop(entity));
        }
    }

    fn find_resources(&mut self, entity: EntityId) {
        if self.queue_order(entity, Order::FindResources) {
            self.record(JournalEntry::FindResources(entity));
        }
    }

    fn start_repair(&mut self, entity: EntityId) {
        if let Some(actor) = self.actors.get_mut(&entity) {
            actor.repairing = true;
            self.record(JournalEntry::StartRepair(entity));
        }
    }

    fn set_stance(&mut self, entity: EntityId, stance: Stance) {
        if let Some(actor) = self.actors.get_mut(&entity) {
            actor.stance = Some(stance);
            self.record(JournalEntry::SetStance { entity, stance });
        }
    }

    fn change_owner(&mut self, entity: EntityId, faction: FactionId) {
        if let Some(actor) = self.actors.get_mut(&entity) {
            actor.owner = faction;
            self.record(JournalEntry::OwnerChanged { entity, faction });
        }
    }

    fn build(&mut self, factory: EntityId, units: &[UnitType], ticket: ProductionTicket) -> bool {
        if !self.actors.contains_key(&factory) {
            return false;
        }

        let busy = self
            .productions
            .iter()
            .any(|production| production.factory == factory);
        let refused = !busy
            && match self.refusals.get_mut(&factory) {
                Some(remaining) if *remaining > 0 => {
                    *remaining -= 1;
                    true
                }
                _ => false,
            };

        if busy || refused {
            self.record(JournalEntry::BuildRefused { factory });
            return false;
        }

        self.productions.push(Production {
            ticket,
            factory,
            units: units.to_vec(),
            ready_at: self.tick.saturating_add(self.production_time),
        });
        self.record(JournalEntry::BuildAccepted {
            factory,
            units: units.to_vec(),
            ticket,
        });
        true
    }

    fn spawn(&mut self, faction: FactionId, unit_type: &UnitType, location: CellCoord) -> EntityId {
        let entity = self.place(None, unit_type, faction, location);
        self.record(JournalEntry::Spawned {
            entity,
            faction,
            unit_type: unit_type.clone(),
        });
        entity
    }

    fn move_along(&mut self, entity: EntityId, path: &[CellCoord]) {
        if path.is_empty() {
            return;
        }

        if self.queue_order(entity, Order::Move(path.to_vec())) {
            self.record(JournalEntry::MoveAlong {
                entity,
                path: path.to_vec(),
            });
        }
    }

    fn grant_power(&mut self, faction: FactionId, power: &str) {
        let _ = self.powers.insert((faction, power.to_owned()));
        self.record(JournalEntry::PowerGranted {
            faction,
            power: power.to_owned(),
        });
    }

    fn display_message(&mut self, text: &str, category: MessageCategory) {
        self.record(JournalEntry::Message {
            text: text.to_owned(),
            category,
        });
    }

    fn play_speech(&mut self, faction: FactionId, key: &str) {
        self.record(JournalEntry::Speech {
            faction,
            key: key.to_owned(),
        });
    }
}

/// Query functions that provide read-only access to the world state.
pub mod query {
    use outpost_core::{EntityId, FactionId, Stance, UnitType};

    use super::{JournalEntry, Order, World};

    /// Every action requested through the collaborator contract, in order.
    #[must_use]
    pub fn journal(world: &World) -> &[JournalEntry] {
        &world.journal
    }

    /// Orders queued on the actor, front first.
    #[must_use]
    pub fn orders(world: &World, entity: EntityId) -> Vec<Order> {
        world
            .actors
            .get(&entity)
            .map(|actor| actor.orders.iter().map(|queued| queued.order.clone()).collect())
            .unwrap_or_default()
    }

    /// Stance assigned to the actor, if any.
    #[must_use]
    pub fn stance(world: &World, entity: EntityId) -> Option<Stance> {
        world.actors.get(&entity).and_then(|actor| actor.stance)
    }

    /// Reports whether the structure is currently repairing.
    #[must_use]
    pub fn is_repairing(world: &World, entity: EntityId) -> bool {
        world.actors.get(&entity).is_some_and(|actor| actor.repairing)
    }

    /// Reports whether the faction was granted the support power.
    #[must_use]
    pub fn has_power(world: &World, faction: FactionId, power: &str) -> bool {
        world.powers.contains(&(faction, power.to_owned()))
    }

    /// Type of the actor.
    #[must_use]
    pub fn unit_type(world: &World, entity: EntityId) -> Option<&UnitType> {
        world.actors.get(&entity).map(|actor| &actor.unit_type)
    }

    /// Number of living actors.
    #[must_use]
    pub fn actor_count(world: &World) -> usize {
        world.actors.len()
    }

    /// Number of production requests still in progress.
    #[must_use]
    pub fn pending_productions(world: &World) -> usize {
        world.productions.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PLAYER: FactionId = FactionId::new(1);
    const ENEMY: FactionId = FactionId::new(2);

    fn tick(world: &mut World, count: u64) -> Vec<Event> {
        let mut events = Vec::new();
        for _ in 0..count {
            apply(world, Command::Tick, &mut events);
        }
        events
    }

    #[test]
    fn damage_reports_until_the_actor_dies() {
        let mut world = World::new();
        let tank = world.place(None, &UnitType::new("mtnk"), PLAYER, CellCoord::new(1, 1));
        let mut events = Vec::new();

        apply(
            &mut world,
            Command::Damage {
                entity: tank,
                amount: 40,
                attacker: None,
            },
            &mut events,
        );
        apply(
            &mut world,
            Command::Damage {
                entity: tank,
                amount: 80,
                attacker: None,
            },
            &mut events,
        );

        assert_eq!(
            events,
            vec![
                Event::Damaged {
                    entity: tank,
                    attacker: None,
                },
                Event::Killed { entity: tank },
            ]
        );
        assert!(world.is_dead(tank));
        assert!(world.has_no_required_units(PLAYER));
    }

    #[test]
    fn discovery_is_reported_once_per_faction() {
        let mut world = World::new();
        let hut = world.place(Some("hut"), &UnitType::new("hut"), ENEMY, CellCoord::new(0, 0));
        let mut events = Vec::new();

        for _ in 0..3 {
            apply(&mut world, Command::Reveal { entity: hut, by: PLAYER }, &mut events);
        }
        assert_eq!(events.len(), 1);
        assert_eq!(world.named_actor("hut"), Some(hut));
    }

    #[test]
    fn refused_production_counts_down_before_accepting() {
        let mut world = World::new();
        world.set_production_time(Ticks::new(3));
        let barracks = world.place(None, &UnitType::new("pyle"), ENEMY, CellCoord::new(4, 4));
        let mut events = Vec::new();
        apply(
            &mut world,
            Command::RefuseProduction {
                factory: barracks,
                attempts: 2,
            },
            &mut events,
        );

        let units = [UnitType::new("e1")];
        assert!(!world.build(barracks, &units, ProductionTicket::new(1)));
        assert!(!world.build(barracks, &units, ProductionTicket::new(1)));
        assert!(world.build(barracks, &units, ProductionTicket::new(1)));
        assert!(
            !world.build(barracks, &units, ProductionTicket::new(2)),
            "a factory producing is busy"
        );

        let events = tick(&mut world, 3);
        let completed: Vec<_> = events
            .iter()
            .filter_map(|event| match event {
                Event::ProductionCompleted { ticket, units, .. } => Some((*ticket, units.len())),
                _ => None,
            })
            .collect();
        assert_eq!(completed, vec![(ProductionTicket::new(1), 1)]);
    }

    #[test]
    fn finite_orders_report_idle_when_drained() {
        let mut world = World::new();
        world.set_leg_time(Ticks::new(2));
        let scout = world.place(None, &UnitType::new("bggy"), ENEMY, CellCoord::new(0, 0));
        let route = PatrolRoute::new(vec![CellCoord::new(3, 0)], false, Ticks::ZERO);
        world.patrol(scout, &route);

        let events = tick(&mut world, 2);
        assert!(events.contains(&Event::Idle { entity: scout }));
        assert_eq!(world.location(scout), Some(CellCoord::new(3, 0)));

        world.hunt(scout);
        let events = tick(&mut world, 50);
        assert!(!events.contains(&Event::Idle { entity: scout }));
    }
}
