use std::fmt;

use crate::model::Asset;

/// Errors related to empirical distributions
#[derive(Debug, Clone, PartialEq)]
pub enum DistributionError {
    /// The input sample has no variability (or no samples, or no bins)
    Degenerate {
        name: String,
        min: i32,
        max: i32,
    },
    /// Sampling was attempted on a distribution that has no usable bins
    InvalidState { name: String },
    /// Parameters for synthetic series generation are unusable
    InvalidParameters {
        mean: f64,
        std_dev: f64,
        reason: &'static str,
    },
}

impl fmt::Display for DistributionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DistributionError::Degenerate { name, min, max } => {
                write!(f, "cannot build distribution {name}: no changes ({min}..{max})")
            }
            DistributionError::InvalidState { name } => {
                write!(f, "distribution {name} has no usable bins")
            }
            DistributionError::InvalidParameters {
                mean,
                std_dev,
                reason,
            } => write!(
                f,
                "invalid synthetic series parameters (mean={mean}, std_dev={std_dev}): {reason}"
            ),
        }
    }
}

impl std::error::Error for DistributionError {}

/// Errors raised when validating a [`Model`](crate::model::Model)
#[derive(Debug, Clone, PartialEq)]
pub enum ModelError {
    UnknownStrategy(i64),
    AllocationOutOfRange { equity: i64, bonds: i64 },
    AllocationExceedsTotal { equity: u32, bonds: u32 },
    NegativeRebalance(i64),
    WithdrawalOutOfRange(f64),
    WorldShareOutOfRange(f64),
    NonPositiveStartSum(f64),
    NoCycles,
    NoRepeats,
}

impl fmt::Display for ModelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModelError::UnknownStrategy(id) => write!(f, "unknown strategy {id} (expected 1..=3)"),
            ModelError::AllocationOutOfRange { equity, bonds } => {
                write!(f, "allocation out of range (equity={equity}%, bonds={bonds}%)")
            }
            ModelError::AllocationExceedsTotal { equity, bonds } => {
                write!(f, "equity {equity}% + bonds {bonds}% exceeds 100%")
            }
            ModelError::WithdrawalOutOfRange(rate) => {
                write!(f, "yearly withdrawal {rate}% is outside 0..=100")
            }
            ModelError::WorldShareOutOfRange(share) => {
                write!(f, "world share {share}% is outside 0..=100")
            }
            ModelError::NegativeRebalance(every) => {
                write!(f, "rebalance period {every} must not be negative")
            }
            ModelError::NonPositiveStartSum(sum) => write!(f, "start sum {sum} must be positive"),
            ModelError::NoCycles => write!(f, "model must simulate at least one cycle"),
            ModelError::NoRepeats => write!(f, "model must run at least one repeat"),
        }
    }
}

impl std::error::Error for ModelError {}

/// Errors raised by a single simulated path or by aggregating paths
#[derive(Debug, Clone, PartialEq)]
pub enum SimulationError {
    Distribution(DistributionError),
    /// A balance left the valid domain outside of the withdrawal clipping rule
    InvalidBalance { cycle: usize, asset: Asset, value: f64 },
    /// Every repeat of a model failed, nothing to aggregate
    NoRuns,
}

impl fmt::Display for SimulationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SimulationError::Distribution(e) => write!(f, "{e}"),
            SimulationError::InvalidBalance {
                cycle,
                asset,
                value,
            } => write!(f, "invalid {asset} balance {value} at cycle {cycle}"),
            SimulationError::NoRuns => write!(f, "no successful runs to aggregate"),
        }
    }
}

impl std::error::Error for SimulationError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SimulationError::Distribution(e) => Some(e),
            _ => None,
        }
    }
}

impl From<DistributionError> for SimulationError {
    fn from(err: DistributionError) -> Self {
        SimulationError::Distribution(err)
    }
}

/// Invalid scalar configuration
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigError(pub String);

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "configuration error: {}", self.0)
    }
}

impl std::error::Error for ConfigError {}

/// Errors that stop an experiment before any unit of work runs
#[derive(Debug, Clone, PartialEq)]
pub enum RunnerError {
    Config(ConfigError),
    /// A double portfolio needs a world group and at least one other country
    MissingGroup(&'static str),
    /// No country selection produced usable distributions
    NoUsableDistributions,
}

impl fmt::Display for RunnerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunnerError::Config(e) => write!(f, "{e}"),
            RunnerError::MissingGroup(group) => {
                write!(f, "double portfolio requires a weighted {group} group")
            }
            RunnerError::NoUsableDistributions => {
                write!(f, "no country selection produced usable distributions")
            }
        }
    }
}

impl std::error::Error for RunnerError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            RunnerError::Config(e) => Some(e),
            _ => None,
        }
    }
}

impl From<ConfigError> for RunnerError {
    fn from(err: ConfigError) -> Self {
        RunnerError::Config(err)
    }
}
