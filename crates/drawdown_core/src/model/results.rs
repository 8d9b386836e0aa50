//! Simulation results
//!
//! Per-path outcomes are reduced to a [`SingleRunResult`]; all repeats of one
//! model are reduced to a [`ModelResult`].

use serde::{Deserialize, Serialize};

use crate::config::SimulationConfig;
use crate::error::SimulationError;
use crate::simulation::PathOutcome;

use super::portfolio::Model;

/// Summary of one repeat of a model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SingleRunResult {
    pub country: Option<String>,
    /// Total balance at the end of the path
    pub trailing_amount: f64,
    /// Per-cycle realized withdrawal statistics
    pub withdrawal_average: f64,
    pub withdrawal_min: f64,
    pub withdrawal_max: f64,
    /// Percentage of cycles whose withdrawal fell below the essentials threshold
    pub insufficient_rate: f64,
    /// Share of cycles per withdrawal bucket, spanning [min, max]
    pub histogram: Vec<f64>,
}

impl SingleRunResult {
    #[must_use]
    pub fn from_outcome(model: &Model, outcome: &PathOutcome, config: &SimulationConfig) -> Self {
        Self::from_withdrawals(model, outcome.trailing_amount, &outcome.withdrawals, config)
    }

    /// Summarize a sequence of realized per-cycle withdrawals
    #[must_use]
    pub fn from_withdrawals(
        model: &Model,
        trailing_amount: f64,
        withdrawals: &[f64],
        config: &SimulationConfig,
    ) -> Self {
        let buckets = config.wd_bins.max(1);
        if withdrawals.is_empty() {
            return Self {
                country: model.country.clone(),
                trailing_amount,
                withdrawal_average: 0.0,
                withdrawal_min: 0.0,
                withdrawal_max: 0.0,
                insufficient_rate: 0.0,
                histogram: vec![0.0; buckets],
            };
        }

        let essentials = config.essentials_percent / 100.0
            * model.normative_step_withdrawal(config.steps_per_year);
        let insufficient = withdrawals.iter().filter(|&&w| w < essentials).count();
        let insufficient_rate = insufficient as f64 * 100.0 / withdrawals.len() as f64;

        let withdrawal_average = withdrawals.iter().sum::<f64>() / withdrawals.len() as f64;
        let withdrawal_min = withdrawals.iter().copied().fold(f64::INFINITY, f64::min);
        let withdrawal_max = withdrawals.iter().copied().fold(f64::NEG_INFINITY, f64::max);

        let histogram = withdrawal_histogram(
            withdrawals,
            withdrawal_min,
            withdrawal_max,
            buckets,
            config.histogram_materiality,
        );

        Self {
            country: model.country.clone(),
            trailing_amount,
            withdrawal_average,
            withdrawal_min,
            withdrawal_max,
            insufficient_rate,
            histogram,
        }
    }

    /// Ending balance exceeds the minimal-solvency floor
    #[must_use]
    pub fn is_solvent(&self, config: &SimulationConfig) -> bool {
        self.trailing_amount > config.solvency_floor
    }

    /// Insufficient-withdrawal rate stays within the allowed tolerance
    #[must_use]
    pub fn has_sufficient_withdrawals(&self, config: &SimulationConfig) -> bool {
        self.insufficient_rate <= config.allowed_insufficient_rate
    }

    /// Both conditions hold for this repeat
    #[must_use]
    pub fn succeeded(&self, config: &SimulationConfig) -> bool {
        self.is_solvent(config) && self.has_sufficient_withdrawals(config)
    }
}

/// Histogram of withdrawal amounts with `buckets` buckets over [min, max].
///
/// When the spread is immaterial all mass lands in the last bucket.
fn withdrawal_histogram(
    withdrawals: &[f64],
    min: f64,
    max: f64,
    buckets: usize,
    materiality: f64,
) -> Vec<f64> {
    let mut counts = vec![0.0; buckets];
    if max - min > materiality {
        let bucket_size = (max - min) / buckets as f64;
        for &w in withdrawals {
            let index = (((w - min) / bucket_size) as usize).min(buckets - 1);
            counts[index] += 1.0;
        }
    } else {
        counts[buckets - 1] = withdrawals.len() as f64;
    }

    let total = withdrawals.len() as f64;
    counts.iter_mut().for_each(|c| *c /= total);
    counts
}

/// Aggregate over every successful repeat of one model (or sweep row)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelResult {
    pub model: Model,
    /// Fraction of repeats ending above the solvency floor
    pub trail_success_rate: f64,
    /// Fraction of repeats within the allowed insufficient-withdrawal rate
    pub withdrawal_success_rate: f64,
    /// Fraction of repeats passing both conditions
    pub overall_success_rate: f64,
    pub trail_average: f64,
    pub trail_min: f64,
    pub trail_max: f64,
    /// Yearly withdrawal statistics (per-cycle values scaled by steps per year)
    pub withdrawal_average: f64,
    pub withdrawal_min: f64,
    pub withdrawal_max: f64,
    /// Average yearly withdrawal as a percentage of the starting sum
    pub productivity: f64,
    /// Withdrawal histogram averaged across repeats
    pub histogram: Vec<f64>,
    /// Repeats aborted by a path error and excluded from the statistics
    pub failed_repeats: usize,
    pub runs: Vec<SingleRunResult>,
}

impl ModelResult {
    pub fn from_runs(
        model: Model,
        runs: Vec<SingleRunResult>,
        failed_repeats: usize,
        config: &SimulationConfig,
    ) -> Result<Self, SimulationError> {
        if runs.is_empty() {
            return Err(SimulationError::NoRuns);
        }
        let count = runs.len() as f64;
        let fraction = |pass: &dyn Fn(&SingleRunResult) -> bool| {
            runs.iter().filter(|r| pass(r)).count() as f64 / count
        };

        let trail_success_rate = fraction(&|r| r.is_solvent(config));
        let withdrawal_success_rate = fraction(&|r| r.has_sufficient_withdrawals(config));
        let overall_success_rate = fraction(&|r| r.succeeded(config));

        let buckets = config.wd_bins.max(1);
        let mut histogram = vec![0.0; buckets];
        for run in &runs {
            for (acc, value) in histogram.iter_mut().zip(&run.histogram) {
                *acc += value;
            }
        }
        histogram.iter_mut().for_each(|h| *h /= count);

        let trail_average = runs.iter().map(|r| r.trailing_amount).sum::<f64>() / count;
        let trail_min = runs.iter().map(|r| r.trailing_amount).fold(f64::INFINITY, f64::min);
        let trail_max = runs
            .iter()
            .map(|r| r.trailing_amount)
            .fold(f64::NEG_INFINITY, f64::max);

        let steps = config.steps_per_year;
        let withdrawal_average =
            runs.iter().map(|r| r.withdrawal_average).sum::<f64>() / count * steps;
        let withdrawal_min = runs
            .iter()
            .map(|r| r.withdrawal_min)
            .fold(f64::INFINITY, f64::min)
            * steps;
        let withdrawal_max = runs
            .iter()
            .map(|r| r.withdrawal_max)
            .fold(f64::NEG_INFINITY, f64::max)
            * steps;

        let productivity = withdrawal_average / model.start_sum * 100.0;

        Ok(Self {
            model,
            trail_success_rate,
            withdrawal_success_rate,
            overall_success_rate,
            trail_average,
            trail_min,
            trail_max,
            withdrawal_average,
            withdrawal_min,
            withdrawal_max,
            productivity,
            histogram,
            failed_repeats,
            runs,
        })
    }

    /// Overall success rate reaches the cutoff (percent)
    #[must_use]
    pub fn is_acceptable(&self, cutoff_percent: f64) -> bool {
        self.overall_success_rate >= cutoff_percent / 100.0
    }
}
