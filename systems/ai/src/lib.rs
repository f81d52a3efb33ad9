#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Scripted behaviour of the opposing faction.
//!
//! The scheduler owns three self-sustaining chains:
//!
//! * production requests that retry every [`BUILD_RETRY_DELAY`] until the
//!   factory accepts them or can no longer produce for the faction,
//! * guard patrols that are rebuilt after a member dies,
//! * attack waves whose successor is always scheduled, whatever became of
//!   the current wave.
//!
//! Production is asynchronous: an accepted request is remembered under its
//! [`ProductionTicket`] and completed when the world reports
//! [`Event::ProductionCompleted`].

use std::collections::BTreeMap;

use outpost_core::{
    CellCoord, ConfigurationError, EntityId, Event, FactionId, PatrolRoute, ProductionTicket,
    Ticks, UnitType, WorldHost,
};
use outpost_system_scheduler::ScheduledEventQueue;
use outpost_system_triggers::{TriggerFired, TriggerRegistry};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tracing::{debug, info, trace};

/// Delay before a refused production request is tried again.
pub const BUILD_RETRY_DELAY: Ticks = Ticks::from_seconds(5);

/// Identifier of a guard patrol.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GuardId(u32);

impl GuardId {
    /// Retrieves the numeric representation of the identifier.
    #[must_use]
    pub const fn get(&self) -> u32 {
        self.0
    }
}

/// How a guard patrol tracks its members across rebuilds.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum GuardMode {
    /// Rebuilt units become the members watched by the next cycle.
    Renewable,
    /// The original members are watched forever; rebuilt units only patrol.
    Fixed,
}

/// Behaviour of a unit produced for an attack wave.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum AttackerState {
    /// Walking the attack path.
    Patrolling,
    /// Hunting anything hostile. Terminal.
    Seeking,
}

/// Work run once a production request delivers its units.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BuildCompletion {
    /// Send the units down the attack path with the given index.
    AttackWave {
        /// Index into the configured attack paths.
        path: usize,
    },
    /// Send the units on the guard's patrol route and re-arm the guard.
    GuardRebuilt(GuardId),
    /// Send the harvester gathering and watch it.
    Harvester,
}

/// Production request with its retry policy.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BuildRequest {
    factory: EntityId,
    units: Vec<UnitType>,
    completion: BuildCompletion,
    retry_delay: Ticks,
}

impl BuildRequest {
    /// Creates a request retried every [`BUILD_RETRY_DELAY`].
    #[must_use]
    pub fn new(factory: EntityId, units: Vec<UnitType>, completion: BuildCompletion) -> Self {
        Self {
            factory,
            units,
            completion,
            retry_delay: BUILD_RETRY_DELAY,
        }
    }

    /// Structure asked to produce the units.
    #[must_use]
    pub const fn factory(&self) -> EntityId {
        self.factory
    }

    /// Units requested, in production order.
    #[must_use]
    pub fn units(&self) -> &[UnitType] {
        &self.units
    }
}

/// Result of a single production attempt.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BuildOutcome {
    /// The factory accepted the request.
    Started(ProductionTicket),
    /// The factory refused; the request was rescheduled.
    Retrying,
    /// The factory is dead or no longer ours; the request was dropped.
    Aborted,
}

/// Tasks placed on the scheduler's delay queue.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AiTask {
    /// Try a production request again.
    Build(BuildRequest),
    /// Launch the next attack wave.
    AttackWave,
    /// Rebuild a guard patrol.
    RespawnGuard(GuardId),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum AiTrigger {
    GuardMemberKilled(GuardId),
    AttackerIdle,
    HarvesterDamaged,
    HarvesterKilled,
}

/// Escalating attack-wave parameters.
#[derive(Clone, Debug, PartialEq)]
pub struct AttackPlan {
    /// Structure producing the waves.
    pub factory: EntityId,
    /// Delay before the first wave.
    pub first_delay: Ticks,
    /// Lower bound of the delay between waves.
    pub delay_min: Ticks,
    /// Upper bound of the delay between waves.
    pub delay_max: Ticks,
    /// Unit lists a wave is drawn from.
    pub compositions: Vec<Vec<UnitType>>,
    /// Paths a wave walks before hunting.
    pub paths: Vec<Vec<CellCoord>>,
}

/// Harvester replacement parameters.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HarvesterPlan {
    /// Structure producing replacement harvesters.
    pub factory: EntityId,
    /// Type of the replacement.
    pub unit_type: UnitType,
}

/// Configuration parameters required to construct the scheduler.
#[derive(Clone, Debug, PartialEq)]
pub struct Config {
    /// Faction the scheduler plays for.
    pub faction: FactionId,
    /// Seed of the wave and delay draws.
    pub seed: u64,
    /// Delay before a killed guard is rebuilt.
    pub guard_respawn_delay: Ticks,
    /// Attack-wave parameters.
    pub attack: AttackPlan,
    /// Harvester replacement, when the faction has a refinery economy.
    pub harvester: Option<HarvesterPlan>,
}

#[derive(Clone, Debug)]
struct Guard {
    mode: GuardMode,
    factory: EntityId,
    units: Vec<UnitType>,
    members: Vec<EntityId>,
    route: PatrolRoute,
}

/// Deterministic scheduler driving the opposing faction.
#[derive(Debug)]
pub struct AiScheduler {
    config: Config,
    rng: ChaCha8Rng,
    queue: ScheduledEventQueue<AiTask>,
    triggers: TriggerRegistry<AiTrigger>,
    fired: Vec<TriggerFired<AiTrigger>>,
    in_flight: BTreeMap<ProductionTicket, BuildCompletion>,
    next_ticket: u64,
    guards: Vec<Guard>,
    attackers: BTreeMap<EntityId, AttackerState>,
    waves_launched: u32,
}

impl AiScheduler {
    /// Creates a scheduler after validating the attack plan.
    pub fn new(config: Config) -> Result<Self, ConfigurationError> {
        let attack = &config.attack;
        if attack.compositions.is_empty() || attack.compositions.iter().any(Vec::is_empty) {
            return Err(ConfigurationError::EmptyPool {
                table: "attack_compositions",
            });
        }
        if attack.paths.is_empty() || attack.paths.iter().any(Vec::is_empty) {
            return Err(ConfigurationError::EmptyPool {
                table: "attack_paths",
            });
        }
        if attack.delay_min > attack.delay_max {
            return Err(ConfigurationError::InvertedDelay {
                table: "attack_delay",
                min: attack.delay_min.get(),
                max: attack.delay_max.get(),
            });
        }

        Ok(Self {
            rng: ChaCha8Rng::seed_from_u64(config.seed),
            config,
            queue: ScheduledEventQueue::default(),
            triggers: TriggerRegistry::new(),
            fired: Vec::new(),
            in_flight: BTreeMap::new(),
            next_ticket: 1,
            guards: Vec::new(),
            attackers: BTreeMap::new(),
            waves_launched: 0,
        })
    }

    /// Faction the scheduler plays for.
    #[must_use]
    pub const fn faction(&self) -> FactionId {
        self.config.faction
    }

    /// Schedules the first attack wave.
    pub fn start<W: WorldHost + ?Sized>(&mut self, world: &W) {
        self.queue.advance(world.now());
        let fire = self
            .queue
            .schedule(self.config.attack.first_delay, AiTask::AttackWave);
        info!(faction = self.faction().get(), first_wave = fire.get(), "attack chain started");
    }

    /// Registers a guard patrol, sends its members on the route and arms it.
    pub fn add_guard<W: WorldHost + ?Sized>(
        &mut self,
        world: &mut W,
        factory: EntityId,
        units: Vec<UnitType>,
        members: Vec<EntityId>,
        route: PatrolRoute,
        mode: GuardMode,
    ) -> GuardId {
        let id = GuardId(self.guards.len() as u32);
        for member in &members {
            world.patrol(*member, &route);
        }

        self.guards.push(Guard {
            mode,
            factory,
            units,
            members,
            route,
        });
        self.arm_guard(world, id);
        id
    }

    /// Watches a harvester: damage rallies the army, death orders a
    /// replacement.
    pub fn watch_harvester(&mut self, harvester: EntityId) {
        self.triggers.on_damaged(harvester, AiTrigger::HarvesterDamaged);
        self.triggers.on_killed(harvester, AiTrigger::HarvesterKilled);
    }

    /// Attempts a production request, rescheduling it when refused.
    pub fn build<W: WorldHost + ?Sized>(
        &mut self,
        world: &mut W,
        request: BuildRequest,
    ) -> BuildOutcome {
        let factory = request.factory;
        if world.is_dead(factory) || world.owner(factory) != Some(self.faction()) {
            debug!(factory = factory.get(), "production aborted; factory unavailable");
            return BuildOutcome::Aborted;
        }

        let ticket = ProductionTicket::new(self.next_ticket);
        self.next_ticket = self.next_ticket.wrapping_add(1);
        if world.build(factory, &request.units, ticket) {
            trace!(factory = factory.get(), ticket = ticket.get(), "production started");
            let _ = self.in_flight.insert(ticket, request.completion);
            return BuildOutcome::Started(ticket);
        }

        self.queue.advance(world.now());
        let retry = self.queue.schedule(request.retry_delay, AiTask::Build(request));
        debug!(
            factory = factory.get(),
            retry = retry.get(),
            "factory busy; production retried later"
        );
        BuildOutcome::Retrying
    }

    /// Launches one attack wave and schedules the next one.
    pub fn attack<W: WorldHost + ?Sized>(&mut self, world: &mut W) {
        let attack = &self.config.attack;
        let pick = self.rng.gen_range(0..attack.compositions.len());
        let composition = attack.compositions[pick].clone();
        let path = self.rng.gen_range(0..attack.paths.len());
        let delay = Ticks::new(
            self.rng
                .gen_range(attack.delay_min.get()..=attack.delay_max.get()),
        );
        let factory = attack.factory;

        self.waves_launched = self.waves_launched.saturating_add(1);
        info!(
            wave = self.waves_launched,
            units = composition.len(),
            path,
            "attack wave ordered"
        );
        let _ = self.build(
            world,
            BuildRequest::new(factory, composition, BuildCompletion::AttackWave { path }),
        );

        self.queue.advance(world.now());
        let next = self.queue.schedule(delay, AiTask::AttackWave);
        debug!(next = next.get(), "next attack wave scheduled");
    }

    /// Runs every task due at the world's current tick.
    pub fn tick<W: WorldHost + ?Sized>(&mut self, world: &mut W) {
        self.queue.advance(world.now());
        while let Some(event) = self.queue.pop_due() {
            match event.task {
                AiTask::Build(request) => {
                    let _ = self.build(world, request);
                }
                AiTask::AttackWave => self.attack(world),
                AiTask::RespawnGuard(id) => self.respawn_guard(world, id),
            }
        }
    }

    /// Reacts to world events: completed production, deaths, damage and idleness.
    pub fn handle<W: WorldHost + ?Sized>(&mut self, world: &mut W, events: &[Event]) {
        self.triggers.handle(events, &mut self.fired);
        let fired: Vec<_> = self.fired.drain(..).collect();
        for fired in fired {
            self.dispatch(world, fired);
        }

        for event in events {
            match event {
                Event::ProductionCompleted { ticket, units, .. } => {
                    if let Some(completion) = self.in_flight.remove(ticket) {
                        self.complete(world, completion, units);
                    }
                }
                Event::Killed { entity } => {
                    let _ = self.attackers.remove(entity);
                }
                _ => {}
            }
        }
    }

    /// Number of accepted requests still waiting for their units.
    #[must_use]
    pub fn pending_productions(&self) -> usize {
        self.in_flight.len()
    }

    /// Tasks waiting on the delay queue, in firing order.
    #[must_use]
    pub fn queue(&self) -> &ScheduledEventQueue<AiTask> {
        &self.queue
    }

    /// Behaviour of a unit produced for an attack wave.
    #[must_use]
    pub fn attacker_state(&self, entity: EntityId) -> Option<AttackerState> {
        self.attackers.get(&entity).copied()
    }

    /// Members currently watched by a guard.
    #[must_use]
    pub fn guard_members(&self, id: GuardId) -> Option<&[EntityId]> {
        self.guards
            .get(id.0 as usize)
            .map(|guard| guard.members.as_slice())
    }

    /// Number of attack waves ordered so far.
    #[must_use]
    pub const fn waves_launched(&self) -> u32 {
        self.waves_launched
    }

    fn dispatch<W: WorldHost + ?Sized>(&mut self, world: &mut W, fired: TriggerFired<AiTrigger>) {
        match fired.action {
            AiTrigger::GuardMemberKilled(id) => {
                self.queue.advance(world.now());
                let fire = self
                    .queue
                    .schedule(self.config.guard_respawn_delay, AiTask::RespawnGuard(id));
                debug!(guard = id.get(), respawn = fire.get(), "guard member lost");
            }
            AiTrigger::AttackerIdle => {
                if world.is_dead(fired.entity) {
                    return;
                }
                let state = self.attackers.entry(fired.entity).or_insert(AttackerState::Seeking);
                if *state == AttackerState::Patrolling {
                    trace!(entity = fired.entity.get(), "attacker reached the end of its path");
                }
                *state = AttackerState::Seeking;
                world.hunt(fired.entity);
            }
            AiTrigger::HarvesterDamaged => {
                let Some(target) = world.location(fired.entity) else {
                    return;
                };
                let defenders = world.ground_attackers(self.faction());
                debug!(
                    defenders = defenders.len(),
                    ?target,
                    attacker = ?fired.attacker,
                    "harvester under attack"
                );
                for defender in defenders {
                    world.attack_move(defender, target);
                    world.hunt(defender);
                }
            }
            AiTrigger::HarvesterKilled => {
                let Some(plan) = self.config.harvester.clone() else {
                    return;
                };
                info!(factory = plan.factory.get(), "harvester lost; ordering replacement");
                let _ = self.build(
                    world,
                    BuildRequest::new(
                        plan.factory,
                        vec![plan.unit_type],
                        BuildCompletion::Harvester,
                    ),
                );
            }
        }
    }

    fn complete<W: WorldHost + ?Sized>(
        &mut self,
        world: &mut W,
        completion: BuildCompletion,
        units: &[EntityId],
    ) {
        let faction = self.faction();
        let owned: Vec<EntityId> = units
            .iter()
            .copied()
            .filter(|unit| world.owner(*unit) == Some(faction))
            .collect();

        match completion {
            BuildCompletion::AttackWave { path } => {
                let Some(cells) = self.config.attack.paths.get(path) else {
                    return;
                };
                let route = PatrolRoute::new(cells.clone(), false, Ticks::ZERO);
                for unit in owned {
                    world.patrol(unit, &route);
                    let _ = self.attackers.insert(unit, AttackerState::Patrolling);
                    self.triggers.on_idle(unit, AiTrigger::AttackerIdle);
                }
            }
            BuildCompletion::GuardRebuilt(id) => {
                let Some(guard) = self.guards.get_mut(id.0 as usize) else {
                    return;
                };
                for unit in &owned {
                    world.patrol(*unit, &guard.route);
                }
                if guard.mode == GuardMode::Renewable {
                    guard.members = owned;
                }
                self.arm_guard(world, id);
            }
            BuildCompletion::Harvester => {
                for unit in owned {
                    world.find_resources(unit);
                    self.watch_harvester(unit);
                }
            }
        }
    }

    fn respawn_guard<W: WorldHost + ?Sized>(&mut self, world: &mut W, id: GuardId) {
        let Some(guard) = self.guards.get(id.0 as usize) else {
            return;
        };
        let request = BuildRequest::new(
            guard.factory,
            guard.units.clone(),
            BuildCompletion::GuardRebuilt(id),
        );
        debug!(guard = id.get(), "rebuilding guard patrol");
        let _ = self.build(world, request);
    }

    fn arm_guard<W: WorldHost + ?Sized>(&mut self, world: &W, id: GuardId) {
        let Some(guard) = self.guards.get(id.0 as usize) else {
            return;
        };
        let Some(member) = guard.members.iter().copied().find(|member| !world.is_dead(*member))
        else {
            debug!(guard = id.get(), "no living guard member; patrol cycle ends");
            return;
        };

        trace!(guard = id.get(), member = member.get(), "guard armed");
        self.triggers.on_killed(member, AiTrigger::GuardMemberKilled(id));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> Config {
        Config {
            faction: FactionId::new(2),
            seed: 7,
            guard_respawn_delay: Ticks::from_seconds(30),
            attack: AttackPlan {
                factory: EntityId::new(1),
                first_delay: Ticks::from_seconds(60),
                delay_min: Ticks::from_seconds(10),
                delay_max: Ticks::from_seconds(20),
                compositions: vec![vec![UnitType::new("e1")]],
                paths: vec![vec![CellCoord::new(1, 1)]],
            },
            harvester: None,
        }
    }

    #[test]
    fn retry_delay_is_five_seconds() {
        assert_eq!(BUILD_RETRY_DELAY, Ticks::new(125));
        let request = BuildRequest::new(EntityId::new(3), vec![], BuildCompletion::Harvester);
        assert_eq!(request.retry_delay, BUILD_RETRY_DELAY);
    }

    #[test]
    fn empty_pools_are_rejected() {
        let mut empty_paths = config();
        empty_paths.attack.paths.clear();
        assert!(matches!(
            AiScheduler::new(empty_paths),
            Err(ConfigurationError::EmptyPool { table: "attack_paths" })
        ));

        let mut empty_wave = config();
        empty_wave.attack.compositions = vec![vec![]];
        assert!(AiScheduler::new(empty_wave).is_err());
    }
}
