#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Command-line adapter that plays the outpost mission headlessly.

mod session;

use std::{fs, path::PathBuf, process::ExitCode};

use anyhow::{Context, Result};
use clap::Parser;
use outpost_core::DifficultyTier;
use outpost_scenario::ScenarioConfig;
use outpost_world::{MapDefinition, World};
use tracing_subscriber::EnvFilter;

/// Runs the outpost mission against the sandbox world and prints a summary.
#[derive(Debug, Parser)]
#[command(name = "outpost", version)]
#[command(about = "Plays the scripted outpost mission without a renderer")]
struct Cli {
    /// Difficulty tier: easy, normal or hard.
    #[arg(long, default_value = "normal")]
    difficulty: DifficultyTier,

    /// Seed of the enemy's random choices.
    #[arg(long, default_value_t = 0)]
    seed: u64,

    /// Minutes of mission time to simulate.
    #[arg(long, default_value_t = 10)]
    minutes: u64,

    /// Scenario script to load instead of the built-in one.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Sandbox map to load instead of the built-in one.
    #[arg(long)]
    map: Option<PathBuf>,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging();

    match run(&cli) {
        Ok(summary) => {
            print!("{summary}");
            ExitCode::SUCCESS
        }
        Err(error) => {
            eprintln!("error: {error:#}");
            ExitCode::FAILURE
        }
    }
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn run(cli: &Cli) -> Result<session::Summary> {
    let config = match &cli.config {
        Some(path) => {
            let contents = fs::read_to_string(path)
                .with_context(|| format!("failed to read scenario config {}", path.display()))?;
            ScenarioConfig::from_toml(&contents)
                .with_context(|| format!("invalid scenario config {}", path.display()))?
        }
        None => ScenarioConfig::builtin().context("built-in scenario config is invalid")?,
    };

    let map = match &cli.map {
        Some(path) => {
            let contents = fs::read_to_string(path)
                .with_context(|| format!("failed to read map {}", path.display()))?;
            MapDefinition::from_toml(&contents)
                .with_context(|| format!("invalid map {}", path.display()))?
        }
        None => MapDefinition::builtin().context("built-in map is invalid")?,
    };
    let world = World::from_map(&map).context("map does not describe a consistent world")?;

    session::play(world, config, cli.difficulty, cli.seed, cli.minutes)
}
