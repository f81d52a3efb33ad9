#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Difficulty-indexed parameter tables.
//!
//! Every tunable of the scenario that varies with the difficulty selector is
//! stored as a [`TierTable`]. Systems never branch on the tier themselves;
//! they call [`resolve`], which fails loudly with
//! [`ConfigurationError::MissingTier`] instead of silently defaulting.

use outpost_core::{ConfigurationError, DifficultyTier, Ticks, UnitType};
use serde::{Deserialize, Serialize};

/// One value per difficulty tier. Rows may be absent; resolving an absent row
/// is a configuration error.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TierTable<T> {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    easy: Option<T>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    normal: Option<T>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    hard: Option<T>,
}

impl<T> TierTable<T> {
    /// Creates a table defining every tier.
    #[must_use]
    pub fn new(easy: T, normal: T, hard: T) -> Self {
        Self {
            easy: Some(easy),
            normal: Some(normal),
            hard: Some(hard),
        }
    }

    /// Returns the table with the row for `tier` replaced.
    #[must_use]
    pub fn with(mut self, tier: DifficultyTier, value: T) -> Self {
        *self.slot_mut(tier) = Some(value);
        self
    }

    /// Returns the table with the row for `tier` removed.
    #[must_use]
    pub fn without(mut self, tier: DifficultyTier) -> Self {
        *self.slot_mut(tier) = None;
        self
    }

    /// Row defined for `tier`, if any.
    #[must_use]
    pub fn get(&self, tier: DifficultyTier) -> Option<&T> {
        match tier {
            DifficultyTier::Easy => self.easy.as_ref(),
            DifficultyTier::Normal => self.normal.as_ref(),
            DifficultyTier::Hard => self.hard.as_ref(),
        }
    }

    fn slot_mut(&mut self, tier: DifficultyTier) -> &mut Option<T> {
        match tier {
            DifficultyTier::Easy => &mut self.easy,
            DifficultyTier::Normal => &mut self.normal,
            DifficultyTier::Hard => &mut self.hard,
        }
    }
}

/// Looks up the row of `table` for `tier`.
///
/// `name` identifies the table in the error reported when the row is missing.
pub fn resolve<'a, T>(
    tier: DifficultyTier,
    name: &'static str,
    table: &'a TierTable<T>,
) -> Result<&'a T, ConfigurationError> {
    table
        .get(tier)
        .ok_or(ConfigurationError::MissingTier { table: name, tier })
}

/// Every difficulty-indexed table used by the scenario.
///
/// Delays are written in seconds of scenario time and converted to ticks on
/// resolution.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DifficultyProfile {
    /// Named map actors removed before the scenario starts.
    pub removals: TierTable<Vec<String>>,
    /// Delay between the start of the scenario and the first attack wave.
    pub first_attack_seconds: TierTable<u64>,
    /// Lower bound of the random delay between attack waves.
    pub attack_delay_min_seconds: TierTable<u64>,
    /// Upper bound of the random delay between attack waves.
    pub attack_delay_max_seconds: TierTable<u64>,
    /// Production profiles attack waves are drawn from.
    pub attack_compositions: TierTable<Vec<Vec<UnitType>>>,
    /// Delay before a killed guard patrol is rebuilt.
    pub guard_respawn_seconds: TierTable<u64>,
    /// Health fraction below which damaged structures start repairing.
    pub repair_threshold: TierTable<f64>,
    /// Spacing between reinforcements delivered at scenario start.
    pub reinforcement_interval_seconds: TierTable<u64>,
}

/// Concrete parameter values of a single tier.
#[derive(Clone, Debug, PartialEq)]
pub struct TierParameters {
    /// Tier the parameters were resolved for.
    pub tier: DifficultyTier,
    /// Named map actors removed before the scenario starts.
    pub removals: Vec<String>,
    /// Delay before the first attack wave.
    pub first_attack_delay: Ticks,
    /// Lower bound of the delay between attack waves.
    pub attack_delay_min: Ticks,
    /// Upper bound of the delay between attack waves.
    pub attack_delay_max: Ticks,
    /// Production profiles attack waves are drawn from.
    pub attack_compositions: Vec<Vec<UnitType>>,
    /// Delay before a killed guard patrol is rebuilt.
    pub guard_respawn_delay: Ticks,
    /// Health fraction below which damaged structures start repairing.
    pub repair_threshold: f64,
    /// Spacing between starting reinforcements.
    pub reinforcement_interval: Ticks,
}

impl DifficultyProfile {
    /// Checks that every table defines a valid row for `tier`.
    pub fn validate(&self, tier: DifficultyTier) -> Result<(), ConfigurationError> {
        self.resolve(tier).map(|_| ())
    }

    /// Resolves every table for `tier`, validating ranges and pools.
    pub fn resolve(&self, tier: DifficultyTier) -> Result<TierParameters, ConfigurationError> {
        let removals = resolve(tier, "removals", &self.removals)?.clone();
        let first_attack = *resolve(tier, "first_attack_seconds", &self.first_attack_seconds)?;
        let delay_min = *resolve(
            tier,
            "attack_delay_min_seconds",
            &self.attack_delay_min_seconds,
        )?;
        let delay_max = *resolve(
            tier,
            "attack_delay_max_seconds",
            &self.attack_delay_max_seconds,
        )?;
        if delay_min > delay_max {
            return Err(ConfigurationError::InvertedRange {
                table: "attack_delay_seconds",
                tier,
                min: delay_min,
                max: delay_max,
            });
        }

        let compositions = resolve(tier, "attack_compositions", &self.attack_compositions)?;
        if compositions.is_empty() || compositions.iter().any(Vec::is_empty) {
            return Err(ConfigurationError::EmptyPool {
                table: "attack_compositions",
            });
        }

        let guard_respawn = *resolve(tier, "guard_respawn_seconds", &self.guard_respawn_seconds)?;
        let repair_threshold = *resolve(tier, "repair_threshold", &self.repair_threshold)?;
        if !(0.0..=1.0).contains(&repair_threshold) {
            return Err(ConfigurationError::InvalidThreshold {
                table: "repair_threshold",
                tier,
                value: repair_threshold,
            });
        }

        let interval = *resolve(
            tier,
            "reinforcement_interval_seconds",
            &self.reinforcement_interval_seconds,
        )?;

        Ok(TierParameters {
            tier,
            removals,
            first_attack_delay: Ticks::from_seconds(first_attack),
            attack_delay_min: Ticks::from_seconds(delay_min),
            attack_delay_max: Ticks::from_seconds(delay_max),
            attack_compositions: compositions.clone(),
            guard_respawn_delay: Ticks::from_seconds(guard_respawn),
            repair_threshold,
            reinforcement_interval: Ticks::from_seconds(interval),
        })
    }

    /// Checks that every table defines a valid row for every tier.
    pub fn validate_all(&self) -> Result<(), ConfigurationError> {
        DifficultyTier::ALL
            .into_iter()
            .try_for_each(|tier| self.validate(tier))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile() -> DifficultyProfile {
        DifficultyProfile {
            removals: TierTable::new(vec!["gun1".into(), "gun2".into()], vec![], vec![]),
            first_attack_seconds: TierTable::new(300, 240, 180),
            attack_delay_min_seconds: TierTable::new(120, 90, 60),
            attack_delay_max_seconds: TierTable::new(180, 150, 90),
            attack_compositions: TierTable::new(
                vec![vec![UnitType::new("e1")]],
                vec![vec![UnitType::new("e1"), UnitType::new("e1")]],
                vec![vec![UnitType::new("ltnk"), UnitType::new("e1")]],
            ),
            guard_respawn_seconds: TierTable::new(90, 60, 30),
            repair_threshold: TierTable::new(0.4, 0.5, 0.6),
            reinforcement_interval_seconds: TierTable::new(2, 2, 1),
        }
    }

    #[test]
    fn resolve_reports_missing_rows() {
        let table = TierTable::new(1, 2, 3).without(DifficultyTier::Normal);
        assert_eq!(resolve(DifficultyTier::Hard, "sample", &table).ok(), Some(&3));

        let error = resolve(DifficultyTier::Normal, "sample", &table).unwrap_err();
        assert!(matches!(
            error,
            ConfigurationError::MissingTier {
                table: "sample",
                tier: DifficultyTier::Normal
            }
        ));
    }

    #[test]
    fn every_tier_resolves_to_ticks() {
        let profile = profile();
        profile.validate_all().expect("sample profile is complete");

        let hard = profile.resolve(DifficultyTier::Hard).expect("hard resolves");
        assert_eq!(hard.attack_delay_min, Ticks::from_seconds(60));
        assert_eq!(hard.guard_respawn_delay, Ticks::from_seconds(30));
        assert!((hard.repair_threshold - 0.6).abs() < f64::EPSILON);
    }

    #[test]
    fn inverted_delay_ranges_are_rejected() {
        let mut profile = profile();
        profile.attack_delay_min_seconds =
            profile.attack_delay_min_seconds.with(DifficultyTier::Easy, 500);

        assert!(matches!(
            profile.resolve(DifficultyTier::Easy),
            Err(ConfigurationError::InvertedRange { min: 500, max: 180, .. })
        ));
        assert!(profile.validate_all().is_err());
    }

    #[test]
    fn empty_composition_pools_are_rejected() {
        let mut profile = profile();
        profile.attack_compositions = profile.attack_compositions.with(DifficultyTier::Hard, vec![]);

        assert!(matches!(
            profile.resolve(DifficultyTier::Hard),
            Err(ConfigurationError::EmptyPool { .. })
        ));
    }

    #[test]
    fn tables_parse_from_toml_with_missing_rows() {
        #[derive(Deserialize)]
        struct Wrapper {
            delay: TierTable<u64>,
        }

        let wrapper: Wrapper = toml::from_str("[delay]\neasy = 10\nhard = 30\n").expect("parses");
        assert_eq!(wrapper.delay.get(DifficultyTier::Easy), Some(&10));
        assert_eq!(wrapper.delay.get(DifficultyTier::Normal), None);
    }
}
