#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! The "Abandoned Outpost" mission script.
//!
//! [`Scenario::world_loaded`] wires every system against the world once.
//! Afterwards the host calls [`Scenario::tick`] on every simulation step and
//! [`Scenario::handle`] with the events the world reported for that step.
//! The script never polls the world outside those two entry points.

mod config;

use outpost_core::{
    ConfigurationError, DifficultyTier, EntityId, Event, FactionId, MessageCategory, PatrolRoute,
    Tick, Ticks, WorldHost,
};
use outpost_system_ai::{AiScheduler, AttackPlan, Config as AiConfig, GuardMode, HarvesterPlan};
use outpost_system_difficulty::TierParameters;
use outpost_system_objectives::{
    is_defeated, ObjectiveEvent, ObjectiveId, ObjectiveKind, ObjectiveTracker, Outcome,
};
use outpost_system_reinforcements::ReinforcementScheduler;
use outpost_system_repair::RepairWatcher;
use outpost_system_scheduler::ScheduledEventQueue;
use outpost_system_triggers::{TriggerFired, TriggerRegistry};
use tracing::{debug, info};

pub use config::{
    ActorNames, FactionConfig, GuardConfig, GuardPolicy, HarvesterConfig, MessageTexts,
    ObjectiveTexts, ReinforcementConfig, ScenarioConfig,
};

use config::Resolver;

/// Identifiers of every objective the scenario registers.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ScenarioObjectives {
    /// Primary objective of the player.
    pub player_primary: ObjectiveId,
    /// Primary objective of the enemy.
    pub enemy_primary: ObjectiveId,
    /// Secondary: find the hidden outpost.
    pub locate_outpost: ObjectiveId,
    /// Secondary: clear the outpost garrison.
    pub clear_garrison: ObjectiveId,
    /// Secondary: destroy every SAM site.
    pub destroy_sams: ObjectiveId,
}

/// Scenario-wide state shared by the script handlers.
#[derive(Clone, Debug, PartialEq)]
pub struct ScenarioContext {
    /// Human-controlled side.
    pub player: FactionId,
    /// Scripted opposing side.
    pub enemy: FactionId,
    /// Owner of the hidden outpost until it is found.
    pub abandoned: FactionId,
    /// Selected difficulty.
    pub tier: DifficultyTier,
    /// Parameters resolved for the selected difficulty.
    pub parameters: TierParameters,
    /// Tick the scenario was loaded at.
    pub start: Tick,
    /// Objectives registered at load time.
    pub objectives: ScenarioObjectives,
    /// Structures of the hidden outpost.
    pub hidden_base: Vec<EntityId>,
    /// Set once the player found the hidden outpost.
    pub base_discovered: bool,
    /// Set once the outpost garrison was wiped out.
    pub garrison_cleared: bool,
}

/// Actions bound to world conditions by the script.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum ScriptAction {
    HiddenBaseDiscovered,
    SamSitesDestroyed,
    GarrisonCleared,
}

/// Work deferred with [`Scenario::after_delay`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ScenarioTask {
    /// Show a message.
    Message {
        /// Shown text.
        text: String,
        /// Presentation channel.
        category: MessageCategory,
    },
    /// Play a speech notification.
    Speech {
        /// Listening faction.
        faction: FactionId,
        /// Notification key.
        key: String,
    },
}

/// Running mission script.
#[derive(Debug)]
pub struct Scenario {
    context: ScenarioContext,
    config: ScenarioConfig,
    objectives: ObjectiveTracker,
    triggers: TriggerRegistry<ScriptAction>,
    fired: Vec<TriggerFired<ScriptAction>>,
    queue: ScheduledEventQueue<ScenarioTask>,
    reinforcements: ReinforcementScheduler,
    repair: RepairWatcher,
    ai: AiScheduler,
    notifications: Vec<ObjectiveEvent>,
    repairs_ordered: usize,
}

impl Scenario {
    /// Sets the scenario up against a freshly loaded world.
    ///
    /// Fails when the selected tier is missing from a table or the script
    /// refers to actors or waypoints the map does not define.
    pub fn world_loaded<W: WorldHost + ?Sized>(
        world: &mut W,
        config: ScenarioConfig,
        tier: DifficultyTier,
        seed: u64,
    ) -> Result<Self, ConfigurationError> {
        let parameters = config.profile.resolve(tier)?;
        let factions = config.factions;
        let start = world.now();

        for name in &parameters.removals {
            let entity = world
                .named_actor(name)
                .ok_or_else(|| ConfigurationError::UnknownActor(name.clone()))?;
            world.destroy(entity);
        }

        let resolver = Resolver::new(&*world, &parameters.removals);
        let hidden_base = resolver.group(&config.actors.hidden_base)?;
        let sam_sites = resolver.group(&config.actors.sam_sites)?;
        let garrison = resolver.group(&config.actors.garrison)?;
        let attack_factory = resolver.actor(&config.actors.attack_factory)?;
        let entry_path = resolver.path(&config.reinforcements.path)?;
        let attack_paths = config
            .attack_paths
            .iter()
            .map(|names| resolver.path(names))
            .collect::<Result<Vec<_>, _>>()?;
        let harvester = match &config.actors.harvester {
            Some(harvester) => Some((
                resolver.group(std::slice::from_ref(&harvester.name))?,
                HarvesterPlan {
                    factory: resolver.actor(&harvester.factory)?,
                    unit_type: harvester.unit_type.clone(),
                },
            )),
            None => None,
        };
        let mut guards = Vec::with_capacity(config.guards.len());
        for guard in &config.guards {
            let route = PatrolRoute::new(
                resolver.path(&guard.route)?,
                guard.looping,
                Ticks::from_seconds(guard.wait_seconds),
            );
            guards.push((
                resolver.actor(&guard.factory)?,
                guard.units.clone(),
                resolver.group(&guard.members)?,
                route,
                GuardMode::from(guard.mode),
            ));
        }

        let mut ai = AiScheduler::new(AiConfig {
            faction: factions.enemy,
            seed,
            guard_respawn_delay: parameters.guard_respawn_delay,
            attack: AttackPlan {
                factory: attack_factory,
                first_delay: parameters.first_attack_delay,
                delay_min: parameters.attack_delay_min,
                delay_max: parameters.attack_delay_max,
                compositions: parameters.attack_compositions.clone(),
                paths: attack_paths,
            },
            harvester: harvester.as_ref().map(|(_, plan)| plan.clone()),
        })?;

        let mut notifications = Vec::new();
        let mut objectives = ObjectiveTracker::new();
        let texts = &config.objectives;
        let ids = ScenarioObjectives {
            player_primary: objectives.add_objective(
                factions.player,
                ObjectiveKind::Primary,
                texts.player_primary.clone(),
                &mut notifications,
            ),
            enemy_primary: objectives.add_objective(
                factions.enemy,
                ObjectiveKind::Primary,
                texts.enemy_primary.clone(),
                &mut notifications,
            ),
            locate_outpost: objectives.add_objective(
                factions.player,
                ObjectiveKind::Secondary,
                texts.locate_outpost.clone(),
                &mut notifications,
            ),
            clear_garrison: objectives.add_objective(
                factions.player,
                ObjectiveKind::Secondary,
                texts.clear_garrison.clone(),
                &mut notifications,
            ),
            destroy_sams: objectives.add_objective(
                factions.player,
                ObjectiveKind::Secondary,
                texts.destroy_sams.clone(),
                &mut notifications,
            ),
        };

        let mut triggers = TriggerRegistry::new();
        let _ = triggers.on_group_discovered(&hidden_base, ScriptAction::HiddenBaseDiscovered);
        let _ = triggers.on_all_killed(&sam_sites, ScriptAction::SamSitesDestroyed);
        let _ = triggers.on_all_killed(&garrison, ScriptAction::GarrisonCleared);

        let repair = RepairWatcher::install(&*world, factions.enemy, parameters.repair_threshold);

        let mut reinforcements = ReinforcementScheduler::new();
        let last_arrival = reinforcements.reinforce(
            &*world,
            factions.player,
            &config.reinforcements.units,
            &entry_path,
            parameters.reinforcement_interval,
            config.reinforcements.on_arrival,
        )?;

        for (factory, units, members, route, mode) in guards {
            let _ = ai.add_guard(world, factory, units, members, route, mode);
        }
        if let Some((watched, _)) = &harvester {
            for entity in watched {
                ai.watch_harvester(*entity);
            }
        }
        ai.start(&*world);

        info!(
            %tier,
            seed,
            removed = parameters.removals.len(),
            sam_sites = sam_sites.len(),
            "scenario loaded"
        );

        let mut scenario = Self {
            context: ScenarioContext {
                player: factions.player,
                enemy: factions.enemy,
                abandoned: factions.abandoned,
                tier,
                parameters,
                start,
                objectives: ids,
                hidden_base,
                base_discovered: false,
                garrison_cleared: false,
            },
            config,
            objectives,
            triggers,
            fired: Vec::new(),
            queue: ScheduledEventQueue::new(start),
            reinforcements,
            repair,
            ai,
            notifications: Vec::new(),
            repairs_ordered: 0,
        };

        world.display_message(&scenario.config.messages.intro, MessageCategory::Mission);
        scenario.publish(world, notifications);
        if let Some(last) = last_arrival {
            let text = scenario.config.messages.reinforcements_arrived.clone();
            let _ = scenario.after_delay(
                world,
                last.since(start),
                ScenarioTask::Message {
                    text,
                    category: MessageCategory::Support,
                },
            );
        }
        Ok(scenario)
    }

    /// Runs everything due at the world's current tick and evaluates the
    /// win/loss policy.
    pub fn tick<W: WorldHost + ?Sized>(&mut self, world: &mut W) {
        let mut delivered = Vec::new();
        self.reinforcements.deliver_due(world, &mut delivered);

        // Narration due this tick sees the units delivered above.
        self.queue.advance(world.now());
        while let Some(event) = self.queue.pop_due() {
            match event.task {
                ScenarioTask::Message { text, category } => world.display_message(&text, category),
                ScenarioTask::Speech { faction, key } => world.play_speech(faction, &key),
            }
        }

        self.ai.tick(world);
        self.evaluate_outcome(world);
    }

    /// Dispatches the events the world reported for the current tick.
    pub fn handle<W: WorldHost + ?Sized>(&mut self, world: &mut W, events: &[Event]) {
        self.triggers.handle(events, &mut self.fired);
        let fired: Vec<_> = self.fired.drain(..).collect();
        for fired in fired {
            self.dispatch(world, fired);
        }

        let mut repaired = Vec::new();
        self.repair.handle(world, events, &mut repaired);
        self.repairs_ordered += repaired.len();
        self.ai.handle(world, events);
    }

    /// Defers `task` by `delay` ticks; a zero delay runs it on the next tick.
    pub fn after_delay<W: WorldHost + ?Sized>(
        &mut self,
        world: &W,
        delay: Ticks,
        task: ScenarioTask,
    ) -> Tick {
        self.queue.advance(world.now());
        self.queue.schedule(delay, task)
    }

    /// Removes and returns the objective notifications addressed to `faction`.
    pub fn drain_notifications(&mut self, faction: FactionId) -> Vec<ObjectiveEvent> {
        let (drained, kept) = self
            .notifications
            .drain(..)
            .partition(|event| event.faction() == faction);
        self.notifications = kept;
        drained
    }

    /// Scenario-wide state.
    #[must_use]
    pub fn context(&self) -> &ScenarioContext {
        &self.context
    }

    /// Objective records.
    #[must_use]
    pub fn objectives(&self) -> &ObjectiveTracker {
        &self.objectives
    }

    /// Final result of the player, once decided.
    #[must_use]
    pub fn outcome(&self) -> Option<Outcome> {
        self.objectives.outcome(self.context.player)
    }

    /// Opposing-faction scheduler.
    #[must_use]
    pub fn ai(&self) -> &AiScheduler {
        &self.ai
    }

    /// Number of repair orders issued so far.
    #[must_use]
    pub const fn repairs_ordered(&self) -> usize {
        self.repairs_ordered
    }

    fn evaluate_outcome<W: WorldHost + ?Sized>(&mut self, world: &mut W) {
        let elapsed = world.now().since(self.context.start);
        let ids = self.context.objectives;
        let mut events = Vec::new();

        if is_defeated(&*world, self.context.player, elapsed) {
            let _ = self.objectives.mark_completed(ids.enemy_primary, &mut events);
            let _ = self.objectives.mark_failed(ids.player_primary, &mut events);
        }

        if is_defeated(&*world, self.context.enemy, elapsed) {
            let _ = self.objectives.mark_completed(ids.player_primary, &mut events);
            let _ = self.objectives.mark_failed(ids.enemy_primary, &mut events);
            if self.context.base_discovered {
                let _ = self.objectives.mark_completed(ids.clear_garrison, &mut events);
            }
        }

        if !events.is_empty() {
            self.publish(world, events);
        }
    }

    fn dispatch<W: WorldHost + ?Sized>(
        &mut self,
        world: &mut W,
        fired: TriggerFired<ScriptAction>,
    ) {
        let ids = self.context.objectives;
        let mut events = Vec::new();
        match fired.action {
            ScriptAction::HiddenBaseDiscovered => {
                if fired.instigator != Some(self.context.player) || self.context.base_discovered {
                    return;
                }

                self.context.base_discovered = true;
                for structure in &self.context.hidden_base {
                    world.change_owner(*structure, self.context.player);
                    world.stop(*structure);
                }
                info!(structure = fired.entity.get(), "hidden outpost discovered");
                world.display_message(
                    &self.config.messages.outpost_found,
                    MessageCategory::Mission,
                );
                let _ = self.objectives.mark_completed(ids.locate_outpost, &mut events);
                if self.context.garrison_cleared {
                    let _ = self.objectives.mark_completed(ids.clear_garrison, &mut events);
                }
                self.publish(world, events);
            }
            ScriptAction::SamSitesDestroyed => {
                let _ = self.objectives.mark_completed(ids.destroy_sams, &mut events);
                self.publish(world, events);
                world.grant_power(self.context.player, &self.config.support_power);
                world.display_message(
                    &self.config.messages.airstrike_ready,
                    MessageCategory::Support,
                );
                info!(power = %self.config.support_power, "support power unlocked");
            }
            ScriptAction::GarrisonCleared => {
                self.context.garrison_cleared = true;
                debug!("outpost garrison wiped out");
                if self.context.base_discovered {
                    let _ = self.objectives.mark_completed(ids.clear_garrison, &mut events);
                    self.publish(world, events);
                }
            }
        }
    }

    /// Forwards objective notifications to the world and queues them for the host.
    fn publish<W: WorldHost + ?Sized>(&mut self, world: &mut W, events: Vec<ObjectiveEvent>) {
        for event in &events {
            let faction = event.faction();
            match event {
                ObjectiveEvent::Added {
                    objective, kind, ..
                } => {
                    if faction == self.context.player {
                        let label = match kind {
                            ObjectiveKind::Primary => "Primary objective",
                            ObjectiveKind::Secondary => "Secondary objective",
                        };
                        self.announce(world, label, *objective);
                    }
                }
                ObjectiveEvent::Completed { objective, .. } => {
                    if faction == self.context.player {
                        self.announce(world, "Objective completed", *objective);
                    }
                    world.play_speech(faction, "ObjectiveMet");
                }
                ObjectiveEvent::Failed { objective, .. } => {
                    if faction == self.context.player {
                        self.announce(world, "Objective failed", *objective);
                    }
                    world.play_speech(faction, "ObjectiveNotMet");
                }
                ObjectiveEvent::PlayerWon { .. } => world.play_speech(faction, "Win"),
                ObjectiveEvent::PlayerLost { .. } => world.play_speech(faction, "Lose"),
            }
        }
        self.notifications.extend(events);
    }

    fn announce<W: WorldHost + ?Sized>(&self, world: &mut W, label: &str, objective: ObjectiveId) {
        if let Some(record) = self.objectives.objective(objective) {
            let text = format!("{label}: {}", record.description());
            world.display_message(&text, MessageCategory::Objective);
        }
    }
}
