use std::collections::BTreeMap;

use outpost_core::{Capability, CellCoord, FactionId, UnitType};
use serde::Deserialize;
use thiserror::Error;

const SUPPORTED_MAP_VERSION: u32 = 1;
const BUILTIN_MAP: &str = include_str!("../data/outpost.toml");

/// Problems found while loading a map definition.
#[derive(Debug, Error)]
pub enum MapError {
    /// The map text is not valid TOML for a [`MapDefinition`].
    #[error("failed to parse map definition")]
    Parse(#[from] toml::de::Error),
    /// The map declares a format version this crate does not read.
    #[error("unsupported map version {found}; expected {expected}")]
    UnsupportedVersion {
        /// Version declared by the map.
        found: u32,
        /// Version understood by the loader.
        expected: u32,
    },
    /// An actor placement references an undefined template.
    #[error("actor placement references unknown template `{0}`")]
    UnknownTemplate(String),
    /// Two placements share a map name.
    #[error("map name `{0}` is used by more than one actor")]
    DuplicateName(String),
}

/// Static properties shared by every actor of one type.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ActorTemplate {
    /// Hit points of a fresh actor.
    pub max_health: u32,
    /// Capabilities exposed to the mission layer.
    #[serde(default)]
    pub capabilities: Vec<Capability>,
    /// Whether the actor counts as a ground attacker of its owner.
    #[serde(default)]
    pub attacker: bool,
    /// Whether the owner is defeated once no actor of this kind remains.
    #[serde(default = "required_by_default")]
    pub required: bool,
}

fn required_by_default() -> bool {
    true
}

/// Actor present when the map loads.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ActorPlacement {
    /// Script-visible name, if any.
    #[serde(default)]
    pub name: Option<String>,
    /// Template the actor is built from.
    #[serde(rename = "type")]
    pub unit_type: UnitType,
    /// Owning faction.
    pub owner: FactionId,
    /// Starting cell.
    pub location: CellCoord,
    /// Starting hit points, defaulting to the template maximum.
    #[serde(default)]
    pub health: Option<u32>,
}

/// Serialized description of a sandbox map.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MapDefinition {
    /// Format version of the map file.
    pub version: u32,
    /// Actor templates keyed by unit type.
    pub templates: BTreeMap<String, ActorTemplate>,
    /// Named cells referenced by scenario scripts.
    #[serde(default)]
    pub waypoints: BTreeMap<String, CellCoord>,
    /// Actors placed at load time.
    #[serde(default)]
    pub actors: Vec<ActorPlacement>,
}

impl MapDefinition {
    /// Parses a map definition from TOML text.
    pub fn from_toml(contents: &str) -> Result<Self, MapError> {
        let map: Self = toml::from_str(contents)?;
        if map.version != SUPPORTED_MAP_VERSION {
            return Err(MapError::UnsupportedVersion {
                found: map.version,
                expected: SUPPORTED_MAP_VERSION,
            });
        }
        Ok(map)
    }

    /// The outpost map shipped with the crate.
    pub fn builtin() -> Result<Self, MapError> {
        Self::from_toml(BUILTIN_MAP)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::World;
    use outpost_core::WorldHost;

    #[test]
    fn builtin_map_loads_into_a_world() {
        let map = MapDefinition::builtin().expect("built-in map parses");
        let world = World::from_map(&map).expect("built-in map is consistent");

        for name in ["hand", "sam1", "sam4", "outpost_yard", "harvester"] {
            assert!(world.named_actor(name).is_some(), "missing actor {name}");
        }
        assert!(world.waypoint("entry_start").is_some());
    }

    #[test]
    fn unknown_versions_are_rejected() {
        let error = MapDefinition::from_toml("version = 7\n[templates]\n").unwrap_err();
        assert!(matches!(
            error,
            MapError::UnsupportedVersion { found: 7, expected: 1 }
        ));
    }

    #[test]
    fn placements_must_reference_templates() {
        let map = MapDefinition::from_toml(
            r#"
            version = 1

            [templates.e1]
            max_health = 50
            attacker = true

            [[actors]]
            type = "ltnk"
            owner = 2
            location = { column = 1, row = 1 }
            "#,
        )
        .expect("parses");

        assert!(matches!(
            World::from_map(&map),
            Err(MapError::UnknownTemplate(name)) if name == "ltnk"
        ));
    }
}
