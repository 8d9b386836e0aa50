//! Model definition: one withdrawal strategy applied to one target allocation

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::analysis::SweepParameters;
use crate::config::SimulationConfig;
use crate::error::ModelError;

use super::strategy::WithdrawalStrategy;

/// Asset classes held by every portfolio
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Asset {
    Equity,
    Bonds,
    Bills,
}

impl Asset {
    pub const ALL: [Asset; 3] = [Asset::Equity, Asset::Bonds, Asset::Bills];
}

impl fmt::Display for Asset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Asset::Equity => write!(f, "equity"),
            Asset::Bonds => write!(f, "bonds"),
            Asset::Bills => write!(f, "bills"),
        }
    }
}

/// A fully specified model, ready to simulate.
///
/// Models are treated as immutable values: sweeping produces new instances via
/// [`Model::apply`] and never touches the base model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Model {
    pub strategy: WithdrawalStrategy,
    /// Target equity share, percent
    pub equity: u32,
    /// Target bonds share, percent; bills take whatever is left
    pub bonds: u32,
    /// Yearly withdrawal, percent
    pub yearly_withdrawal: f64,
    /// Rebalance period; 0 disables rebalancing
    pub rebalance_every: u32,
    pub start_sum: f64,
    pub cycles: usize,
    pub repeats: usize,
    /// Share of the start sum (percent) held in the world part of a double portfolio.
    /// `None` lets the runner derive it from country weights.
    #[serde(default)]
    pub world_share: Option<f64>,
    #[serde(default)]
    pub country: Option<String>,
}

impl Model {
    /// Create a model taking start sum, cycles and repeats from the configuration
    #[must_use]
    pub fn new(
        strategy: WithdrawalStrategy,
        equity: u32,
        bonds: u32,
        yearly_withdrawal: f64,
        rebalance_every: u32,
        config: &SimulationConfig,
    ) -> Self {
        Self {
            strategy,
            equity,
            bonds,
            yearly_withdrawal,
            rebalance_every,
            start_sum: config.start_sum,
            cycles: config.cycles,
            repeats: config.repeats,
            world_share: None,
            country: None,
        }
    }

    /// Implied bills share, percent
    #[must_use]
    pub fn bills(&self) -> u32 {
        100u32.saturating_sub(self.equity.saturating_add(self.bonds))
    }

    /// Fraction of the reference amount withdrawn per cycle
    #[must_use]
    pub fn step_rate(&self, steps_per_year: f64) -> f64 {
        self.yearly_withdrawal / 100.0 / steps_per_year
    }

    /// Per-cycle withdrawal computed on the starting sum
    #[must_use]
    pub fn normative_step_withdrawal(&self, steps_per_year: f64) -> f64 {
        self.start_sum * self.step_rate(steps_per_year)
    }

    #[must_use]
    pub fn with_country(mut self, country: impl Into<String>) -> Self {
        self.country = Some(country.into());
        self
    }

    #[must_use]
    pub fn with_world_share(mut self, share: f64) -> Self {
        self.world_share = Some(share);
        self
    }

    /// Derive a new model from this one, overriding only the fields the row sets
    #[must_use]
    pub fn apply(&self, sweep: &SweepParameters) -> Model {
        let mut model = self.clone();
        if let Some(strategy) = sweep.strategy {
            model.strategy = strategy;
        }
        if let Some(equity) = sweep.equity {
            model.equity = equity;
        }
        if let Some(bonds) = sweep.bonds {
            model.bonds = bonds;
        }
        if let Some(rate) = sweep.withdrawal_rate {
            model.yearly_withdrawal = rate;
        }
        if let Some(share) = sweep.world_share {
            model.world_share = Some(share);
        }
        if let Some(country) = &sweep.country {
            model.country = Some(country.clone());
        }
        model
    }

    pub fn validate(&self) -> Result<(), ModelError> {
        if self.equity > 100 || self.bonds > 100 {
            return Err(ModelError::AllocationOutOfRange {
                equity: i64::from(self.equity),
                bonds: i64::from(self.bonds),
            });
        }
        if self.equity + self.bonds > 100 {
            return Err(ModelError::AllocationExceedsTotal {
                equity: self.equity,
                bonds: self.bonds,
            });
        }
        if !(0.0..=100.0).contains(&self.yearly_withdrawal) {
            return Err(ModelError::WithdrawalOutOfRange(self.yearly_withdrawal));
        }
        if let Some(share) = self.world_share
            && !(0.0..=100.0).contains(&share)
        {
            return Err(ModelError::WorldShareOutOfRange(share));
        }
        if !self.start_sum.is_finite() || self.start_sum <= 0.0 {
            return Err(ModelError::NonPositiveStartSum(self.start_sum));
        }
        if self.cycles == 0 {
            return Err(ModelError::NoCycles);
        }
        if self.repeats == 0 {
            return Err(ModelError::NoRepeats);
        }
        Ok(())
    }
}

/// A model as it appears in configuration files.
///
/// Integer fields are read signed so that out-of-range values surface as a
/// [`ModelError`] for this record instead of failing the whole file. Missing
/// run-size fields fall back to the [`SimulationConfig`] defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelRecord {
    pub strategy: i64,
    pub equity: i64,
    pub bonds: i64,
    pub yearly_withdrawal: f64,
    #[serde(default)]
    pub rebalance_every: i64,
    #[serde(default)]
    pub start_sum: Option<f64>,
    #[serde(default)]
    pub cycles: Option<usize>,
    #[serde(default)]
    pub repeats: Option<usize>,
    /// World share (percent) of a double portfolio; derived from weights when unset
    #[serde(default)]
    pub world_share: Option<f64>,
    #[serde(default)]
    pub country: Option<String>,
}

impl ModelRecord {
    /// Resolve the record into a model.
    ///
    /// Only checks what the typed [`Model`] cannot hold; call
    /// [`Model::validate`] on the result.
    pub fn into_model(self, config: &SimulationConfig) -> Result<Model, ModelError> {
        let strategy = u8::try_from(self.strategy)
            .map_err(|_| ModelError::UnknownStrategy(self.strategy))
            .and_then(WithdrawalStrategy::try_from)?;
        let (equity, bonds) = match (u32::try_from(self.equity), u32::try_from(self.bonds)) {
            (Ok(equity), Ok(bonds)) => (equity, bonds),
            _ => {
                return Err(ModelError::AllocationOutOfRange {
                    equity: self.equity,
                    bonds: self.bonds,
                });
            }
        };
        let rebalance_every = u32::try_from(self.rebalance_every)
            .map_err(|_| ModelError::NegativeRebalance(self.rebalance_every))?;

        let mut model = Model::new(
            strategy,
            equity,
            bonds,
            self.yearly_withdrawal,
            rebalance_every,
            config,
        );
        if let Some(start_sum) = self.start_sum {
            model.start_sum = start_sum;
        }
        if let Some(cycles) = self.cycles {
            model.cycles = cycles;
        }
        if let Some(repeats) = self.repeats {
            model.repeats = repeats;
        }
        model.world_share = self.world_share;
        model.country = self.country;
        Ok(model)
    }
}
