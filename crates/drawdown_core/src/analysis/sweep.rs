//! Sweep factorization
//!
//! A sweep names the factors to vary. Every factor multiplies the current row
//! set by its candidate values; rows with an impossible allocation are dropped.

use serde::{Deserialize, Serialize};

use crate::model::WithdrawalStrategy;

/// A model field varied by a sweep
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SweepFactor {
    Strategy,
    WithdrawalRate,
    WorldShare,
    Equity,
    Bonds,
    /// Placeholder that leaves the row set unchanged
    None,
}

/// Candidate values tried for each factor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SweepCandidates {
    pub strategies: Vec<WithdrawalStrategy>,
    /// Yearly withdrawal rates, percent
    pub withdrawal_rates: Vec<f64>,
    /// World shares of double portfolios, percent
    pub world_shares: Vec<f64>,
    pub equities: Vec<u32>,
    pub bonds: Vec<u32>,
}

impl Default for SweepCandidates {
    fn default() -> Self {
        Self {
            strategies: WithdrawalStrategy::ALL.to_vec(),
            withdrawal_rates: (0..20).map(|i| f64::from(i) * 0.5).collect(),
            world_shares: (0..=10).map(|i| f64::from(i) * 10.0).collect(),
            equities: (0..=10).map(|i| i * 10).collect(),
            bonds: (0..=10).map(|i| i * 10).collect(),
        }
    }
}

/// Sparse override of a base model; `None` fields inherit
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SweepParameters {
    #[serde(default)]
    pub strategy: Option<WithdrawalStrategy>,
    #[serde(default)]
    pub equity: Option<u32>,
    #[serde(default)]
    pub bonds: Option<u32>,
    #[serde(default)]
    pub withdrawal_rate: Option<f64>,
    #[serde(default)]
    pub world_share: Option<f64>,
    #[serde(default)]
    pub country: Option<String>,
}

impl SweepParameters {
    /// Equity plus bonds stays within 100%, unset fields counting as zero
    #[must_use]
    pub fn is_feasible(&self) -> bool {
        self.equity.unwrap_or(0).saturating_add(self.bonds.unwrap_or(0)) <= 100
    }
}

/// Factors to sweep and whether to run every row once per country
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SweepPlan {
    pub factors: Vec<SweepFactor>,
    #[serde(default)]
    pub by_country: bool,
}

impl SweepPlan {
    #[must_use]
    pub fn new(factors: Vec<SweepFactor>, by_country: bool) -> Self {
        Self { factors, by_country }
    }

    #[must_use]
    pub fn rows(&self, candidates: &SweepCandidates) -> Vec<SweepParameters> {
        factorize(&self.factors, candidates)
    }
}

/// Expand `factors` into the feasible cartesian product of their candidates
#[must_use]
pub fn factorize(factors: &[SweepFactor], candidates: &SweepCandidates) -> Vec<SweepParameters> {
    fn expand<T: Clone>(
        rows: Vec<SweepParameters>,
        values: &[T],
        set: impl Fn(&mut SweepParameters, T),
    ) -> Vec<SweepParameters> {
        rows.iter()
            .flat_map(|row| {
                values.iter().map(|value| {
                    let mut next = row.clone();
                    set(&mut next, value.clone());
                    next
                })
            })
            .collect()
    }

    let mut rows = vec![SweepParameters::default()];
    for factor in factors {
        rows = match factor {
            SweepFactor::Strategy => {
                expand(rows, &candidates.strategies, |r, v| r.strategy = Some(v))
            }
            SweepFactor::WithdrawalRate => expand(rows, &candidates.withdrawal_rates, |r, v| {
                r.withdrawal_rate = Some(v)
            }),
            SweepFactor::WorldShare => {
                expand(rows, &candidates.world_shares, |r, v| r.world_share = Some(v))
            }
            SweepFactor::Equity => expand(rows, &candidates.equities, |r, v| r.equity = Some(v)),
            SweepFactor::Bonds => expand(rows, &candidates.bonds, |r, v| r.bonds = Some(v)),
            SweepFactor::None => rows,
        };
    }

    let expanded = rows.len();
    rows.retain(SweepParameters::is_feasible);
    tracing::debug!(expanded, feasible = rows.len(), "factorized sweep");
    rows
}
