//! Empirical return distributions
//!
//! A distribution is built once from a sample of integer-encoded percentage
//! changes and then only read. Sampling takes the random source from the
//! caller, so any number of workers can sample the same distribution through
//! a shared reference, each with its own generator.

use rand::Rng;
use rand_distr::{Distribution, Normal};
use serde::{Deserialize, Serialize};

use crate::config::PERCENTAGE_SCALE;
use crate::error::DistributionError;
use crate::model::{Asset, CountrySeries};

/// One bin of a discretized distribution
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DistributionBin {
    /// Bin midpoint in raw (scaled) units
    pub midpoint: f64,
    /// Probability of this bin and every bin before it
    pub cumulative_probability: f64,
}

/// Discretized probability distribution supporting inverse-CDF sampling
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmpiricalDistribution {
    pub name: String,
    bins: Vec<DistributionBin>,
}

impl EmpiricalDistribution {
    /// Build a distribution from raw changes.
    ///
    /// Degenerate input (no samples, no bins, or zero span) is reported and
    /// yields a distribution without usable bins; check [`is_usable`](Self::is_usable).
    pub fn build(name: impl Into<String>, changes: &[i32], bin_count: usize) -> Self {
        let name = name.into();
        match Self::try_build(name.clone(), changes, bin_count) {
            Ok(distribution) => distribution,
            Err(err) => {
                tracing::warn!("{err}");
                Self {
                    name,
                    bins: Vec::new(),
                }
            }
        }
    }

    /// Build a distribution, failing on degenerate input
    pub fn try_build(
        name: impl Into<String>,
        changes: &[i32],
        bin_count: usize,
    ) -> Result<Self, DistributionError> {
        let name = name.into();
        let (min, max) = match (changes.iter().min(), changes.iter().max()) {
            (Some(&min), Some(&max)) => (min, max),
            _ => {
                return Err(DistributionError::Degenerate {
                    name,
                    min: 0,
                    max: 0,
                });
            }
        };
        if max == min || bin_count == 0 {
            return Err(DistributionError::Degenerate { name, min, max });
        }

        let span = i64::from(max) - i64::from(min);
        // Integer bin size one wider than span / bins keeps the maximum inside the last bin
        let bin_size = span / bin_count as i64 + 1;

        let mut counts = vec![0usize; bin_count];
        for &change in changes {
            let index = ((i64::from(change) - i64::from(min)) / bin_size) as usize;
            counts[index] += 1;
        }

        let total = changes.len() as f64;
        let mut accumulated = 0.0;
        let bins = counts
            .iter()
            .enumerate()
            .map(|(index, &count)| {
                accumulated += count as f64 / total;
                DistributionBin {
                    midpoint: (i64::from(min) + bin_size / 2 + bin_size * index as i64) as f64,
                    cumulative_probability: accumulated,
                }
            })
            .collect();

        tracing::debug!(
            distribution = %name,
            samples = changes.len(),
            accumulated,
            "built empirical distribution"
        );

        Ok(Self { name, bins })
    }

    /// Whether the distribution has bins to sample from
    #[must_use]
    pub fn is_usable(&self) -> bool {
        !self.bins.is_empty()
    }

    #[must_use]
    pub fn bins(&self) -> &[DistributionBin] {
        &self.bins
    }

    /// Probability mass of each bin, in bin order
    pub fn probabilities(&self) -> impl Iterator<Item = f64> + '_ {
        let mut previous = 0.0;
        self.bins.iter().map(move |bin| {
            let p = bin.cumulative_probability - previous;
            previous = bin.cumulative_probability;
            p
        })
    }

    /// Draw one fractional return (0.05 = +5%)
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> Result<f64, DistributionError> {
        let last = self.bins.last().ok_or_else(|| DistributionError::InvalidState {
            name: self.name.clone(),
        })?;
        let u: f64 = rng.random();
        let index = self
            .bins
            .partition_point(|bin| bin.cumulative_probability < u);
        let bin = self.bins.get(index).unwrap_or(last);
        Ok(bin.midpoint / PERCENTAGE_SCALE)
    }

    /// Expected fractional return of the discretized distribution
    #[must_use]
    pub fn mean(&self) -> Option<f64> {
        if self.bins.is_empty() {
            return None;
        }
        let weighted: f64 = self
            .bins
            .iter()
            .zip(self.probabilities())
            .map(|(bin, p)| bin.midpoint * p)
            .sum();
        Some(weighted / PERCENTAGE_SCALE)
    }
}

/// Raw change series for the three asset classes
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AssetChanges {
    #[serde(default)]
    pub equities: Vec<i32>,
    #[serde(default)]
    pub bonds: Vec<i32>,
    #[serde(default)]
    pub bills: Vec<i32>,
}

impl AssetChanges {
    #[must_use]
    pub fn get(&self, asset: Asset) -> &[i32] {
        match asset {
            Asset::Equity => &self.equities,
            Asset::Bonds => &self.bonds,
            Asset::Bills => &self.bills,
        }
    }

    /// Pool several countries' series, each change counted `weight` times
    #[must_use]
    pub fn pooled<'a>(series: impl IntoIterator<Item = &'a CountrySeries>) -> Self {
        let mut pooled = AssetChanges::default();
        for entry in series {
            let weight = entry.country.weight as usize;
            if weight == 0 {
                continue;
            }
            let extend = |target: &mut Vec<i32>, source: &[i32]| {
                for &change in source {
                    target.extend(std::iter::repeat_n(change, weight));
                }
            };
            extend(&mut pooled.equities, &entry.changes.equities);
            extend(&mut pooled.bonds, &entry.changes.bonds);
            extend(&mut pooled.bills, &entry.changes.bills);
        }
        pooled
    }
}

/// Distributions for the three asset classes of one country selection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssetDistributions {
    pub equities: EmpiricalDistribution,
    pub bonds: EmpiricalDistribution,
    pub bills: EmpiricalDistribution,
}

impl AssetDistributions {
    /// Build all three distributions; `label` names the selection in diagnostics
    #[must_use]
    pub fn build(label: &str, changes: &AssetChanges, bin_count: usize) -> Self {
        let build = |asset: Asset| {
            EmpiricalDistribution::build(format!("{label}/{asset}"), changes.get(asset), bin_count)
        };

        #[cfg(feature = "parallel")]
        let (equities, (bonds, bills)) = rayon::join(
            || build(Asset::Equity),
            || rayon::join(|| build(Asset::Bonds), || build(Asset::Bills)),
        );

        #[cfg(not(feature = "parallel"))]
        let (equities, bonds, bills) = (build(Asset::Equity), build(Asset::Bonds), build(Asset::Bills));

        Self {
            equities,
            bonds,
            bills,
        }
    }

    #[must_use]
    pub fn get(&self, asset: Asset) -> &EmpiricalDistribution {
        match asset {
            Asset::Equity => &self.equities,
            Asset::Bonds => &self.bonds,
            Asset::Bills => &self.bills,
        }
    }

    /// All three asset classes can be sampled
    #[must_use]
    pub fn is_usable(&self) -> bool {
        Asset::ALL.iter().all(|&asset| self.get(asset).is_usable())
    }
}

/// Normally distributed integer-encoded changes.
///
/// `mean_pct` and `std_dev_pct` are percentages per cycle (0.5 = +0.5%).
pub fn synthetic_changes<R: Rng + ?Sized>(
    mean_pct: f64,
    std_dev_pct: f64,
    count: usize,
    rng: &mut R,
) -> Result<Vec<i32>, DistributionError> {
    let scale = PERCENTAGE_SCALE / 100.0;
    let normal = Normal::new(mean_pct * scale, std_dev_pct * scale).map_err(|_| {
        DistributionError::InvalidParameters {
            mean: mean_pct,
            std_dev: std_dev_pct,
            reason: "standard deviation must be finite and non-negative",
        }
    })?;
    // Changes below -100% are not representable as market moves
    let floor = -PERCENTAGE_SCALE;
    Ok((0..count)
        .map(|_| normal.sample(rng).max(floor).round() as i32)
        .collect())
}
