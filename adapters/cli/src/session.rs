use std::fmt;

use anyhow::{Context, Result};
use outpost_core::{Command, DifficultyTier, Ticks, WorldHost};
use outpost_scenario::{Scenario, ScenarioConfig};
use outpost_system_objectives::{ObjectiveKind, ObjectiveState, Outcome};
use outpost_world::{self as world, query, World};
use tracing::info;

/// Result of a headless run.
#[derive(Debug)]
pub(crate) struct Summary {
    tier: DifficultyTier,
    seed: u64,
    ticks: u64,
    outcome: Option<Outcome>,
    objectives: Vec<(ObjectiveKind, String, ObjectiveState)>,
    waves: u32,
    repairs: usize,
    actors: usize,
}

/// Loads the scenario into `world` and advances it until the player's
/// outcome is decided or `minutes` of mission time have passed.
pub(crate) fn play(
    mut world: World,
    config: ScenarioConfig,
    tier: DifficultyTier,
    seed: u64,
    minutes: u64,
) -> Result<Summary> {
    let mut scenario = Scenario::world_loaded(&mut world, config, tier, seed)
        .with_context(|| format!("scenario cannot start on {tier} difficulty"))?;

    let start = world.now();
    let limit = Ticks::from_minutes(minutes);
    let mut events = Vec::new();
    while world.now().since(start) < limit && scenario.outcome().is_none() {
        events.clear();
        world::apply(&mut world, Command::Tick, &mut events);
        scenario.tick(&mut world);
        scenario.handle(&mut world, &events);
    }

    let player = scenario.context().player;
    let objectives = scenario
        .objectives()
        .objectives_of(player)
        .map(|objective| {
            (
                objective.kind(),
                objective.description().to_owned(),
                objective.state(),
            )
        })
        .collect();
    let ticks = world.now().since(start).get();
    info!(ticks, outcome = ?scenario.outcome(), "session finished");

    Ok(Summary {
        tier,
        seed,
        ticks,
        outcome: scenario.outcome(),
        objectives,
        waves: scenario.ai().waves_launched(),
        repairs: scenario.repairs_ordered(),
        actors: query::actor_count(&world),
    })
}

impl fmt::Display for Summary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "difficulty: {}", self.tier)?;
        writeln!(f, "seed: {}", self.seed)?;
        writeln!(f, "ticks simulated: {}", self.ticks)?;
        match self.outcome {
            Some(Outcome::Won) => writeln!(f, "outcome: won")?,
            Some(Outcome::Lost) => writeln!(f, "outcome: lost")?,
            None => writeln!(f, "outcome: undecided")?,
        }
        writeln!(f, "objectives:")?;
        for (kind, description, state) in &self.objectives {
            let kind = match kind {
                ObjectiveKind::Primary => "primary",
                ObjectiveKind::Secondary => "secondary",
            };
            let state = match state {
                ObjectiveState::Pending => "pending",
                ObjectiveState::Completed => "completed",
                ObjectiveState::Failed => "failed",
            };
            writeln!(f, "  [{state}] {kind}: {description}")?;
        }
        writeln!(f, "attack waves: {}", self.waves)?;
        writeln!(f, "repair orders: {}", self.repairs)?;
        writeln!(f, "actors alive: {}", self.actors)
    }
}
