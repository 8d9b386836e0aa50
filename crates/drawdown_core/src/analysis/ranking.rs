//! Post-hoc ranking of model results across countries

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use crate::model::{Country, Model, ModelResult, WithdrawalStrategy};

use super::sweep::SweepParameters;

/// Most productive reliable model of one country
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BestReliable {
    pub country: Option<String>,
    pub model: Model,
    pub productivity: f64,
    pub overall_success_rate: f64,
}

/// Highest-productivity result per country among those whose overall success
/// rate reaches `cutoff_percent`. Ties go to the later result. Sorted by country.
#[must_use]
pub fn best_reliable_per_country(results: &[ModelResult], cutoff_percent: f64) -> Vec<BestReliable> {
    let mut best: FxHashMap<Option<&str>, &ModelResult> = FxHashMap::default();
    for result in results.iter().filter(|r| r.is_acceptable(cutoff_percent)) {
        let key = result.model.country.as_deref();
        let replace = best
            .get(&key)
            .is_none_or(|current| current.productivity <= result.productivity);
        if replace {
            best.insert(key, result);
        }
    }

    let mut picks: Vec<BestReliable> = best
        .into_values()
        .map(|result| BestReliable {
            country: result.model.country.clone(),
            model: result.model.clone(),
            productivity: result.productivity,
            overall_success_rate: result.overall_success_rate,
        })
        .collect();
    picks.sort_by(|a, b| a.country.cmp(&b.country));
    picks
}

/// Population-weighted statistics of one sweep configuration over all countries
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SweepRanking {
    /// The configuration; `country` is always unset
    pub parameters: SweepParameters,
    pub weighted_productivity: f64,
    pub weighted_success_rate: f64,
    pub total_population: f64,
    /// Number of results folded into this entry
    pub results: usize,
}

impl SweepRanking {
    /// Ranking score: success dominates, productivity breaks ties
    #[must_use]
    pub fn score(&self) -> f64 {
        self.weighted_success_rate * 10_000.0 + self.weighted_productivity
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct SweepKey {
    strategy: WithdrawalStrategy,
    equity: u32,
    bonds: u32,
    withdrawal_bits: u64,
    world_share_bits: Option<u64>,
}

impl SweepKey {
    fn of(model: &Model) -> Self {
        Self {
            strategy: model.strategy,
            equity: model.equity,
            bonds: model.bonds,
            withdrawal_bits: model.yearly_withdrawal.to_bits(),
            world_share_bits: model.world_share.map(f64::to_bits),
        }
    }

    fn parameters(&self) -> SweepParameters {
        SweepParameters {
            strategy: Some(self.strategy),
            equity: Some(self.equity),
            bonds: Some(self.bonds),
            withdrawal_rate: Some(f64::from_bits(self.withdrawal_bits)),
            world_share: self.world_share_bits.map(f64::from_bits),
            country: None,
        }
    }
}

#[derive(Default)]
struct Accumulator {
    population: f64,
    productivity: f64,
    success: f64,
    plain_productivity: f64,
    plain_success: f64,
    results: usize,
}

/// Group results by configuration (ignoring country) and weight each group's
/// productivity and overall success rate by country population.
///
/// Results whose country is unknown carry zero population. A group with no
/// population at all falls back to plain averages. Best configuration first.
#[must_use]
pub fn cross_country_ranking(results: &[ModelResult], countries: &[Country]) -> Vec<SweepRanking> {
    let population: FxHashMap<&str, f64> = countries
        .iter()
        .map(|c| (c.name.as_str(), c.population))
        .collect();

    let mut groups: FxHashMap<SweepKey, Accumulator> = FxHashMap::default();
    for result in results {
        let weight = result
            .model
            .country
            .as_deref()
            .and_then(|name| population.get(name).copied())
            .unwrap_or(0.0);
        let entry = groups.entry(SweepKey::of(&result.model)).or_default();
        entry.population += weight;
        entry.productivity += result.productivity * weight;
        entry.success += result.overall_success_rate * weight;
        entry.plain_productivity += result.productivity;
        entry.plain_success += result.overall_success_rate;
        entry.results += 1;
    }

    let mut rankings: Vec<SweepRanking> = groups
        .into_iter()
        .map(|(key, acc)| {
            let (weighted_productivity, weighted_success_rate) = if acc.population > 0.0 {
                (acc.productivity / acc.population, acc.success / acc.population)
            } else {
                let n = acc.results as f64;
                (acc.plain_productivity / n, acc.plain_success / n)
            };
            SweepRanking {
                parameters: key.parameters(),
                weighted_productivity,
                weighted_success_rate,
                total_population: acc.population,
                results: acc.results,
            }
        })
        .collect();

    rankings.sort_by(|a, b| b.score().total_cmp(&a.score()));
    rankings
}
