//! Withdrawal strategy simulation library
//!
//! This crate provides a Monte Carlo engine for judging how sustainable a
//! retirement withdrawal strategy is. It supports:
//! - Empirical return distributions built from historical per-asset changes
//! - Three withdrawal strategies (fixed, percent of current, trailing average)
//! - Single portfolios and double (local + world) portfolios
//! - Parameter sweeps over strategy, allocation, withdrawal rate and world share
//! - Population-weighted ranking of configurations across countries
//!
//! # Example
//!
//! ```ignore
//! use drawdown_core::{Experiment, ExperimentRunner, Model, SimulationConfig, WithdrawalStrategy};
//!
//! let config = SimulationConfig::default();
//! let model = Model::new(WithdrawalStrategy::Fixed, 60, 30, 4.0, 0, &config);
//!
//! let runner = ExperimentRunner::new(&config, Experiment::default())?;
//! let report = runner.run(&series, &[model])?;
//! for result in &report.results {
//!     println!("{:.3} {:.2}", result.overall_success_rate, result.productivity);
//! }
//! ```

#![warn(clippy::all)]

// ============================================================================
// Core modules
// ============================================================================

pub mod analysis;
pub mod distribution;
pub mod error;
pub mod runner;
pub mod simulation;

// ============================================================================
// Type definition modules
// ============================================================================

pub mod config;
pub mod model;

// ============================================================================
// Test modules
// ============================================================================

#[cfg(test)]
mod tests;

// ============================================================================
// Public re-exports for convenience
// ============================================================================

pub use analysis::{SweepFactor, SweepParameters, SweepPlan};
pub use config::SimulationConfig;
pub use distribution::{AssetChanges, AssetDistributions, EmpiricalDistribution};
pub use error::{ConfigError, DistributionError, ModelError, RunnerError, SimulationError};
pub use model::{
    Asset, Country, CountrySeries, Model, ModelRecord, ModelResult, SingleRunResult,
    WithdrawalStrategy,
};
pub use runner::{Experiment, ExperimentReport, ExperimentRunner, PortfolioMode, SkippedUnit};
pub use simulation::{PathOutcome, Portfolio, run_model};
