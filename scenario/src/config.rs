use std::collections::BTreeSet;

use outpost_core::{CellCoord, ConfigurationError, EntityId, FactionId, UnitType, WorldHost};
use outpost_system_ai::GuardMode;
use outpost_system_difficulty::DifficultyProfile;
use outpost_system_reinforcements::ArrivalOrder;
use serde::Deserialize;

const BUILTIN_CONFIG: &str = include_str!("../data/outpost.toml");

/// Complete script data of the scenario.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ScenarioConfig {
    /// Faction identifiers.
    pub factions: FactionConfig,
    /// Difficulty-indexed tables.
    pub profile: DifficultyProfile,
    /// Named map actors the script refers to.
    pub actors: ActorNames,
    /// Waypoint paths attack waves may take.
    pub attack_paths: Vec<Vec<String>>,
    /// Guard patrols started at load time.
    #[serde(default)]
    pub guards: Vec<GuardConfig>,
    /// Starting forces of the player.
    pub reinforcements: ReinforcementConfig,
    /// Objective descriptions.
    pub objectives: ObjectiveTexts,
    /// Narration shown to the player.
    pub messages: MessageTexts,
    /// Support power granted once the SAM sites fall.
    pub support_power: String,
}

/// Faction identifiers used by the scenario.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FactionConfig {
    /// Human-controlled side.
    pub player: FactionId,
    /// Scripted opposing side.
    pub enemy: FactionId,
    /// Owner of the hidden outpost until the player finds it.
    pub abandoned: FactionId,
}

/// Map names of the actors the script interacts with.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ActorNames {
    /// Structure producing attack waves.
    pub attack_factory: String,
    /// Defensive structures guarding the airspace.
    pub sam_sites: Vec<String>,
    /// Structures of the hidden outpost.
    pub hidden_base: Vec<String>,
    /// Enemy units occupying the outpost.
    pub garrison: Vec<String>,
    /// Enemy harvester and its replacement policy.
    #[serde(default)]
    pub harvester: Option<HarvesterConfig>,
}

/// Enemy harvester watched by the script.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HarvesterConfig {
    /// Map name of the harvester.
    pub name: String,
    /// Map name of the structure producing replacements.
    pub factory: String,
    /// Type of the replacement.
    pub unit_type: UnitType,
}

/// Membership policy of a guard patrol.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GuardPolicy {
    /// Rebuilt units replace the members.
    Renewable,
    /// The original members stay the watched group.
    Fixed,
}

impl From<GuardPolicy> for GuardMode {
    fn from(policy: GuardPolicy) -> Self {
        match policy {
            GuardPolicy::Renewable => Self::Renewable,
            GuardPolicy::Fixed => Self::Fixed,
        }
    }
}

/// Guard patrol started at load time.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GuardConfig {
    /// Map name of the structure rebuilding the guard.
    pub factory: String,
    /// Units produced when the guard is rebuilt.
    pub units: Vec<UnitType>,
    /// Map names of the pre-placed members.
    pub members: Vec<String>,
    /// Waypoints of the patrol route.
    pub route: Vec<String>,
    /// Whether the route restarts after the last waypoint.
    #[serde(default = "loops_by_default")]
    pub looping: bool,
    /// Seconds spent at every stop.
    #[serde(default)]
    pub wait_seconds: u64,
    /// Membership policy.
    pub mode: GuardPolicy,
}

fn loops_by_default() -> bool {
    true
}

/// Starting forces delivered to the player.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ReinforcementConfig {
    /// Waypoints of the entry path; units spawn at the first one.
    pub path: Vec<String>,
    /// Units delivered, in order.
    pub units: Vec<UnitType>,
    /// Order given to every unit once spawned.
    #[serde(default)]
    pub on_arrival: ArrivalOrder,
}

/// Descriptions of the scenario objectives.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ObjectiveTexts {
    /// Primary objective of the player.
    pub player_primary: String,
    /// Primary objective of the enemy.
    pub enemy_primary: String,
    /// Secondary: find the hidden outpost.
    pub locate_outpost: String,
    /// Secondary: clear the outpost of enemy troops.
    pub clear_garrison: String,
    /// Secondary: destroy every SAM site.
    pub destroy_sams: String,
}

/// Narration shown during the scenario.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MessageTexts {
    /// Shown at load time.
    pub intro: String,
    /// Shown when the outpost changes hands.
    pub outpost_found: String,
    /// Shown when the support power unlocks.
    pub airstrike_ready: String,
    /// Shown after the last starting unit arrived.
    pub reinforcements_arrived: String,
}

impl ScenarioConfig {
    /// Parses script data from TOML text.
    pub fn from_toml(contents: &str) -> Result<Self, ConfigurationError> {
        Ok(toml::from_str(contents)?)
    }

    /// Script data shipped with the crate.
    pub fn builtin() -> Result<Self, ConfigurationError> {
        Self::from_toml(BUILTIN_CONFIG)
    }
}

/// Looks up map names against the world, skipping actors removed at setup.
pub(crate) struct Resolver<'a, W: ?Sized> {
    world: &'a W,
    removed: BTreeSet<&'a str>,
}

impl<'a, W: WorldHost + ?Sized> Resolver<'a, W> {
    pub(crate) fn new(world: &'a W, removed: &'a [String]) -> Self {
        Self {
            world,
            removed: removed.iter().map(String::as_str).collect(),
        }
    }

    pub(crate) fn actor(&self, name: &str) -> Result<EntityId, ConfigurationError> {
        self.world
            .named_actor(name)
            .ok_or_else(|| ConfigurationError::UnknownActor(name.to_owned()))
    }

    /// Living actors behind `names`; names removed by the tier are skipped.
    pub(crate) fn group(&self, names: &[String]) -> Result<Vec<EntityId>, ConfigurationError> {
        let mut group = Vec::with_capacity(names.len());
        for name in names {
            if self.removed.contains(name.as_str()) {
                continue;
            }
            let entity = self.actor(name)?;
            if !self.world.is_dead(entity) {
                group.push(entity);
            }
        }
        Ok(group)
    }

    pub(crate) fn path(&self, names: &[String]) -> Result<Vec<CellCoord>, ConfigurationError> {
        names
            .iter()
            .map(|name| {
                self.world
                    .waypoint(name)
                    .ok_or_else(|| ConfigurationError::UnknownWaypoint(name.clone()))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use outpost_core::{DifficultyTier, Stance};

    #[test]
    fn builtin_config_defines_every_tier() {
        let config = ScenarioConfig::builtin().expect("built-in config parses");
        config.profile.validate_all().expect("every tier is complete");

        for tier in DifficultyTier::ALL {
            let parameters = config.profile.resolve(tier).expect("tier resolves");
            assert!(!parameters.attack_compositions.is_empty());
        }
        assert_eq!(config.actors.sam_sites.len(), 4);
        assert_eq!(
            config.reinforcements.on_arrival,
            ArrivalOrder::SetStance(Stance::Defend)
        );
    }

    #[test]
    fn malformed_config_is_a_configuration_error() {
        assert!(matches!(
            ScenarioConfig::from_toml("support_power = 3"),
            Err(ConfigurationError::Parse(_))
        ));
    }
}
