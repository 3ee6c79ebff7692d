//! Mission engine configuration.
//!
//! Every field has a default, and deserialization fills missing fields
//! from those defaults, so a partial JSON document is a valid config.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::area::SweepPattern;
use crate::tour::TourSolverKind;
use crate::types::EngineError;

/// Serde support for `std::time::Duration` as fractional seconds.
pub(crate) mod duration_serde {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    /// Serialize a `Duration` as fractional seconds (`f64`).
    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        duration.as_secs_f64().serialize(serializer)
    }

    /// Deserialize a `Duration` from fractional seconds (`f64`).
    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(deserializer)?;
        Duration::try_from_secs_f64(secs).map_err(|_| {
            serde::de::Error::custom(
                "duration seconds must be finite, non-negative, and representable as a Duration",
            )
        })
    }
}

/// Top-level configuration shared by every planner operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MissionConfig {
    /// Upper bound on the number of waypoints a mission may carry.
    pub waypoint_limit: usize,
    /// Tour optimizer settings.
    pub tour: TourConfig,
    /// Area decomposition settings.
    pub area: AreaConfig,
    /// Site selection settings.
    pub selection: SelectionConfig,
}

impl MissionConfig {
    /// Default for [`waypoint_limit`](Self::waypoint_limit).
    pub const DEFAULT_WAYPOINT_LIMIT: usize = 100;

    /// Check every value for range and consistency.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::InvalidConfig`] naming the first offending
    /// field.
    pub fn validate(&self) -> Result<(), EngineError> {
        if self.waypoint_limit == 0 {
            return Err(EngineError::InvalidConfig(
                "waypoint_limit must be at least 1".to_string(),
            ));
        }
        self.tour.validate()?;
        self.area.validate()?;
        self.selection.validate()
    }
}

impl Default for MissionConfig {
    fn default() -> Self {
        Self {
            waypoint_limit: Self::DEFAULT_WAYPOINT_LIMIT,
            tour: TourConfig::default(),
            area: AreaConfig::default(),
            selection: SelectionConfig::default(),
        }
    }
}

/// Tour optimizer settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TourConfig {
    /// Which solver to run.
    pub solver: TourSolverKind,

    /// Wall-clock ceiling for the improvement phase.
    #[serde(with = "duration_serde")]
    pub time_budget: Duration,

    /// Optional cap on guided-local-search iterations.
    ///
    /// When set, the search stops at whichever of the two limits is hit
    /// first. Useful for reproducible runs.
    pub max_iterations: Option<u64>,

    /// Scale of the arc penalty relative to the average arc cost of the
    /// first local optimum (guided local search lambda coefficient).
    pub penalty_factor: f64,
}

impl TourConfig {
    /// Default for [`time_budget`](Self::time_budget).
    pub const DEFAULT_TIME_BUDGET: Duration = Duration::from_secs(1);
    /// Default for [`penalty_factor`](Self::penalty_factor).
    pub const DEFAULT_PENALTY_FACTOR: f64 = 0.1;

    fn validate(&self) -> Result<(), EngineError> {
        if self.time_budget.is_zero() {
            return Err(EngineError::InvalidConfig(
                "tour.time_budget must be positive".to_string(),
            ));
        }
        if !self.penalty_factor.is_finite() || self.penalty_factor < 0.0 {
            return Err(EngineError::InvalidConfig(format!(
                "tour.penalty_factor must be finite and non-negative, got {}",
                self.penalty_factor
            )));
        }
        Ok(())
    }
}

impl Default for TourConfig {
    fn default() -> Self {
        Self {
            solver: TourSolverKind::default(),
            time_budget: Self::DEFAULT_TIME_BUDGET,
            max_iterations: None,
            penalty_factor: Self::DEFAULT_PENALTY_FACTOR,
        }
    }
}

/// Area decomposition settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AreaConfig {
    /// Minimum spacing in metres between consecutive points on an edge.
    pub min_spacing_m: u32,
    /// Order in which the two subdivided edges are interleaved.
    pub sweep: SweepPattern,
}

impl AreaConfig {
    /// Default for [`min_spacing_m`](Self::min_spacing_m).
    pub const DEFAULT_MIN_SPACING_M: u32 = 15;

    fn validate(&self) -> Result<(), EngineError> {
        if self.min_spacing_m == 0 {
            return Err(EngineError::InvalidConfig(
                "area.min_spacing_m must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for AreaConfig {
    fn default() -> Self {
        Self {
            min_spacing_m: Self::DEFAULT_MIN_SPACING_M,
            sweep: SweepPattern::default(),
        }
    }
}

/// Site selection settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SelectionConfig {
    /// Minimum separation in metres between two selected sites.
    pub min_spacing_m: u32,
    /// Sites with more water than this percentage are discarded.
    pub max_water_pct: f64,
    /// Sites with more exposed soil than this percentage are discarded.
    /// Disabled when `None`.
    pub max_exposed_soil_pct: Option<f64>,
}

impl SelectionConfig {
    /// Default for [`min_spacing_m`](Self::min_spacing_m).
    pub const DEFAULT_MIN_SPACING_M: u32 = 15;
    /// Default for [`max_water_pct`](Self::max_water_pct).
    pub const DEFAULT_MAX_WATER_PCT: f64 = 40.0;

    fn validate(&self) -> Result<(), EngineError> {
        let check = |name: &str, value: f64| {
            if value.is_finite() && (0.0..=100.0).contains(&value) {
                Ok(())
            } else {
                Err(EngineError::InvalidConfig(format!(
                    "selection.{name} must be a percentage in [0, 100], got {value}"
                )))
            }
        };
        check("max_water_pct", self.max_water_pct)?;
        if let Some(soil) = self.max_exposed_soil_pct {
            check("max_exposed_soil_pct", soil)?;
        }
        Ok(())
    }
}

impl Default for SelectionConfig {
    fn default() -> Self {
        Self {
            min_spacing_m: Self::DEFAULT_MIN_SPACING_M,
            max_water_pct: Self::DEFAULT_MAX_WATER_PCT,
            max_exposed_soil_pct: None,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = MissionConfig::default();
        assert_eq!(config.waypoint_limit, 100);
        assert_eq!(config.tour.solver, TourSolverKind::GuidedLocalSearch);
        assert_eq!(config.tour.time_budget, Duration::from_secs(1));
        assert!(config.tour.max_iterations.is_none());
        assert_eq!(config.area.min_spacing_m, 15);
        assert_eq!(config.area.sweep, SweepPattern::ZigZag);
        assert_eq!(config.selection.min_spacing_m, 15);
        assert!((config.selection.max_water_pct - 40.0).abs() < f64::EPSILON);
        assert!(config.selection.max_exposed_soil_pct.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn partial_json_fills_defaults() {
        let config: MissionConfig =
            serde_json::from_str(r#"{"waypoint_limit": 20, "tour": {"time_budget": 0.25}}"#)
                .unwrap();
        assert_eq!(config.waypoint_limit, 20);
        assert_eq!(config.tour.time_budget, Duration::from_millis(250));
        assert_eq!(config.tour.solver, TourSolverKind::GuidedLocalSearch);
        assert_eq!(config.area, AreaConfig::default());
    }

    #[test]
    fn serde_round_trip() {
        let config = MissionConfig {
            waypoint_limit: 42,
            tour: TourConfig {
                solver: TourSolverKind::Exact,
                time_budget: Duration::from_millis(500),
                max_iterations: Some(200),
                penalty_factor: 0.3,
            },
            area: AreaConfig {
                min_spacing_m: 250,
                sweep: SweepPattern::Boustrophedon,
            },
            selection: SelectionConfig {
                min_spacing_m: 10,
                max_water_pct: 35.0,
                max_exposed_soil_pct: Some(50.0),
            },
        };
        let json = serde_json::to_string(&config).unwrap();
        let back: MissionConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(config, back);
    }

    #[test]
    fn negative_duration_rejected_by_serde() {
        let result: Result<TourConfig, _> = serde_json::from_str(r#"{"time_budget": -1.0}"#);
        assert!(result.is_err());
    }

    #[test]
    fn validate_rejects_zero_limit() {
        let config = MissionConfig {
            waypoint_limit: 0,
            ..MissionConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(EngineError::InvalidConfig(_))
        ));
    }

    #[test]
    fn validate_rejects_zero_budget() {
        let mut config = MissionConfig::default();
        config.tour.time_budget = Duration::ZERO;
        assert!(matches!(
            config.validate(),
            Err(EngineError::InvalidConfig(_))
        ));
    }

    #[test]
    fn validate_rejects_bad_percentages() {
        let mut config = MissionConfig::default();
        config.selection.max_water_pct = 140.0;
        assert!(config.validate().is_err());

        let mut config = MissionConfig::default();
        config.selection.max_exposed_soil_pct = Some(f64::NAN);
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_zero_area_spacing() {
        let mut config = MissionConfig::default();
        config.area.min_spacing_m = 0;
        assert!(config.validate().is_err());
    }
}
