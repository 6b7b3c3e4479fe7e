//! Risk engine tuning loaded from TOML.
//!
//! The defaults ship embedded in the binary (`risk.toml` at the crate
//! root). Deployments can point `RISK_CONFIG` at their own file with the
//! same shape to recalibrate thresholds for local crime density.

use std::path::Path;

use crime_risk_risk_models::{RiskLevel, RiskTier};
use serde::Deserialize;

use crate::RiskError;

const EMBEDDED_CONFIG: &str = include_str!("../risk.toml");

/// A count band: counts strictly below `below` (and at or above the
/// previous band's bound) map to `level`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct RiskBand {
    /// Exclusive upper bound on the crime count.
    pub below: u32,
    /// Level assigned to counts in this band.
    pub level: RiskLevel,
}

/// Ordered count-to-level mapping.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RiskThresholds {
    /// Bands in ascending order of `below`.
    pub bands: Vec<RiskBand>,
    /// Level for counts at or beyond the last band.
    pub above: RiskLevel,
}

impl RiskThresholds {
    /// Maps a crime count to its risk level.
    #[must_use]
    pub fn level_for(&self, count: u32) -> RiskLevel {
        self.bands
            .iter()
            .find(|band| count < band.below)
            .map_or(self.above, |band| band.level)
    }

    fn validate(&self) -> Result<(), RiskError> {
        if self.bands.is_empty() {
            return Err(config_error("thresholds.bands must not be empty"));
        }

        for pair in self.bands.windows(2) {
            if pair[1].below <= pair[0].below {
                return Err(config_error(format!(
                    "threshold bounds must strictly increase ({} then {})",
                    pair[0].below, pair[1].below
                )));
            }
            if pair[1].level <= pair[0].level {
                return Err(config_error(format!(
                    "threshold levels must strictly increase ({} then {})",
                    pair[0].level, pair[1].level
                )));
            }
        }

        if let Some(last) = self.bands.last()
            && self.above <= last.level
        {
            return Err(config_error(format!(
                "thresholds.above ({}) must be higher than the last band ({})",
                self.above, last.level
            )));
        }

        Ok(())
    }
}

/// Segment weights for the route safety score.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct RouteWeights {
    /// Penalty weight for each high-tier segment.
    pub high_weight: f64,
    /// Penalty weight for each medium-tier segment.
    pub medium_weight: f64,
}

/// Probability bands for grid prediction cells.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct GridBands {
    /// Probability at or above which a cell is high risk.
    pub high_probability: f64,
    /// Probability at or above which a cell is medium risk.
    pub medium_probability: f64,
    /// `minRisk` used when the caller doesn't supply one.
    pub default_min_risk: f64,
}

impl GridBands {
    /// Derives the tier for a cell probability.
    #[must_use]
    pub fn tier_for(&self, probability: f64) -> RiskTier {
        if probability >= self.high_probability {
            RiskTier::High
        } else if probability >= self.medium_probability {
            RiskTier::Medium
        } else {
            RiskTier::Low
        }
    }
}

/// Complete risk engine configuration.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RiskConfig {
    /// Perimeter radius in meters.
    pub radius_meters: f64,
    /// Minimum breakdown percentage for a crime type tip.
    pub tip_percentage_threshold: f64,
    /// Maximum tips per assessment, including the level tip.
    pub max_tips: usize,
    /// Count-to-level mapping.
    pub thresholds: RiskThresholds,
    /// Route safety score weights.
    pub route: RouteWeights,
    /// Grid probability bands.
    pub grid: GridBands,
}

impl RiskConfig {
    /// Returns the configuration embedded at compile time.
    ///
    /// # Panics
    ///
    /// Panics if the embedded `risk.toml` is malformed, which the test
    /// suite guards against.
    #[must_use]
    pub fn embedded() -> Self {
        Self::from_toml_str(EMBEDDED_CONFIG)
            .unwrap_or_else(|e| panic!("Embedded risk.toml is invalid: {e}"))
    }

    /// Parses and validates a TOML document.
    ///
    /// # Errors
    ///
    /// Returns [`RiskError::Config`] if the document doesn't parse or
    /// fails validation.
    pub fn from_toml_str(s: &str) -> Result<Self, RiskError> {
        let config: Self = toml::de::from_str(s).map_err(|e| config_error(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Reads and validates a TOML file.
    ///
    /// # Errors
    ///
    /// Returns [`RiskError::Config`] if the file can't be read or is
    /// invalid.
    pub fn from_path(path: &Path) -> Result<Self, RiskError> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| config_error(format!("Failed to read {}: {e}", path.display())))?;
        Self::from_toml_str(&contents)
    }

    /// Loads from `RISK_CONFIG` if set, otherwise the embedded defaults.
    ///
    /// # Errors
    ///
    /// Returns [`RiskError::Config`] if `RISK_CONFIG` points at an
    /// unreadable or invalid file.
    pub fn from_env() -> Result<Self, RiskError> {
        match std::env::var("RISK_CONFIG") {
            Ok(path) if !path.is_empty() => {
                log::info!("Loading risk configuration from {path}");
                Self::from_path(Path::new(&path))
            }
            _ => Ok(Self::embedded()),
        }
    }

    fn validate(&self) -> Result<(), RiskError> {
        if !self.radius_meters.is_finite() || self.radius_meters <= 0.0 {
            return Err(config_error("radius_meters must be positive"));
        }
        if !(0.0..=100.0).contains(&self.tip_percentage_threshold) {
            return Err(config_error("tip_percentage_threshold must be within 0..100"));
        }
        if self.max_tips == 0 {
            return Err(config_error("max_tips must be at least 1"));
        }

        self.thresholds.validate()?;

        let route = &self.route;
        if !(route.medium_weight > 0.0 && route.high_weight > route.medium_weight) {
            return Err(config_error(
                "route weights must satisfy high_weight > medium_weight > 0",
            ));
        }

        let grid = &self.grid;
        let unit = 0.0..=1.0;
        if !unit.contains(&grid.high_probability)
            || !unit.contains(&grid.medium_probability)
            || !unit.contains(&grid.default_min_risk)
        {
            return Err(config_error("grid probabilities must be within 0..1"));
        }
        if grid.medium_probability >= grid.high_probability {
            return Err(config_error(
                "grid.medium_probability must be below grid.high_probability",
            ));
        }

        Ok(())
    }
}

fn config_error(message: impl Into<String>) -> RiskError {
    RiskError::Config {
        message: message.into(),
    }
}
