//! Simulation configuration
//!
//! `SimulationConfig` carries every scalar the engine needs. It is passed
//! explicitly into distribution building, path simulation and aggregation;
//! nothing in the crate reads configuration from global state.
//!
//! ```ignore
//! use drawdown_core::config::SimulationConfig;
//!
//! let config = SimulationConfig {
//!     repeats: 500,
//!     cycles: 120,
//!     seed: 7,
//!     ..Default::default()
//! };
//! config.validate()?;
//! ```

use serde::{Deserialize, Serialize};

use crate::analysis::SweepCandidates;
use crate::error::ConfigError;

/// Fixed-point scale of raw change samples: 10000 = 100.00%
pub const PERCENTAGE_SCALE: f64 = 10_000.0;

/// Cycles per calendar year observed in the source charts (1239 points over 114 years)
pub const DEFAULT_STEPS_PER_YEAR: f64 = 1239.0 / 114.0;

fn default_cycles() -> usize {
    400
}

fn default_repeats() -> usize {
    1000
}

fn default_start_sum() -> f64 {
    4_000_000.0
}

fn default_steps_per_year() -> f64 {
    DEFAULT_STEPS_PER_YEAR
}

fn default_bins() -> usize {
    200
}

fn default_wd_bins() -> usize {
    5
}

fn default_cutoff_percent() -> f64 {
    95.0
}

fn default_essentials_percent() -> f64 {
    80.0
}

fn default_allowed_insufficient_rate() -> f64 {
    5.0
}

fn default_solvency_floor() -> f64 {
    1000.0
}

fn default_histogram_materiality() -> f64 {
    1000.0
}

fn default_seed() -> u64 {
    42
}

/// Complete scalar configuration for an experiment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// Default cycle count for models that do not set their own
    #[serde(default = "default_cycles")]
    pub cycles: usize,
    /// Default repeat count for models that do not set their own
    #[serde(default = "default_repeats")]
    pub repeats: usize,
    /// Default starting sum for models that do not set their own
    #[serde(default = "default_start_sum")]
    pub start_sum: f64,
    /// Simulated cycles per calendar year (may be fractional)
    #[serde(default = "default_steps_per_year")]
    pub steps_per_year: f64,
    /// Bin count for empirical return distributions
    #[serde(default = "default_bins")]
    pub bins: usize,
    /// Bucket count of the per-path withdrawal histogram
    #[serde(default = "default_wd_bins")]
    pub wd_bins: usize,
    /// Minimal overall success rate (percent) for a model to count as reliable
    #[serde(default = "default_cutoff_percent")]
    pub cutoff_percent: f64,
    /// Share (percent) of the normative withdrawal considered sufficient
    #[serde(default = "default_essentials_percent")]
    pub essentials_percent: f64,
    /// Tolerated share (percent) of cycles with insufficient withdrawal
    #[serde(default = "default_allowed_insufficient_rate")]
    pub allowed_insufficient_rate: f64,
    /// Ending balance a path must exceed to count as solvent
    #[serde(default = "default_solvency_floor")]
    pub solvency_floor: f64,
    /// Withdrawal spread below which the histogram collapses into the last bucket
    #[serde(default = "default_histogram_materiality")]
    pub histogram_materiality: f64,
    /// Root seed for every per-repeat generator
    #[serde(default = "default_seed")]
    pub seed: u64,
    /// Candidate values for each sweep factor
    pub sweep: SweepCandidates,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            cycles: default_cycles(),
            repeats: default_repeats(),
            start_sum: default_start_sum(),
            steps_per_year: default_steps_per_year(),
            bins: default_bins(),
            wd_bins: default_wd_bins(),
            cutoff_percent: default_cutoff_percent(),
            essentials_percent: default_essentials_percent(),
            allowed_insufficient_rate: default_allowed_insufficient_rate(),
            solvency_floor: default_solvency_floor(),
            histogram_materiality: default_histogram_materiality(),
            seed: default_seed(),
            sweep: SweepCandidates::default(),
        }
    }
}

impl SimulationConfig {
    /// Whole cycles per year, used for the trailing window and the yearly cadence
    #[must_use]
    pub fn whole_steps_per_year(&self) -> usize {
        self.steps_per_year.floor() as usize
    }

    /// Length of the trailing-balance window (three years of cycles)
    #[must_use]
    pub fn trailing_window(&self) -> usize {
        3 * self.whole_steps_per_year()
    }

    /// Check the configuration for values the engine cannot work with
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.bins == 0 {
            return Err(ConfigError("distribution bin count must be positive".into()));
        }
        if self.wd_bins == 0 {
            return Err(ConfigError("withdrawal histogram needs at least one bucket".into()));
        }
        if !self.steps_per_year.is_finite() || self.steps_per_year < 1.0 {
            return Err(ConfigError(format!(
                "steps_per_year must be at least 1, got {}",
                self.steps_per_year
            )));
        }
        if !self.start_sum.is_finite() || self.start_sum <= 0.0 {
            return Err(ConfigError(format!(
                "start_sum must be positive, got {}",
                self.start_sum
            )));
        }
        for (name, value) in [
            ("cutoff_percent", self.cutoff_percent),
            ("essentials_percent", self.essentials_percent),
            ("allowed_insufficient_rate", self.allowed_insufficient_rate),
        ] {
            if !(0.0..=100.0).contains(&value) {
                return Err(ConfigError(format!("{name} must be within 0..=100, got {value}")));
            }
        }
        if !self.solvency_floor.is_finite() || !self.histogram_materiality.is_finite() {
            return Err(ConfigError("thresholds must be finite".into()));
        }
        Ok(())
    }
}
