//! Experiment orchestration
//!
//! An experiment combines a portfolio layout with an optional sweep. The runner
//! builds the distributions each layout needs, expands every model against the
//! sweep rows and simulates the resulting units in parallel. Units that cannot
//! run are skipped and listed in the report; they never stop the others.

#[cfg(feature = "parallel")]
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::analysis::{SweepParameters, SweepPlan};
use crate::config::SimulationConfig;
use crate::distribution::{AssetChanges, AssetDistributions};
use crate::error::RunnerError;
use crate::model::{CountrySeries, Model, ModelResult};
use crate::simulation::{Portfolio, run_model, unit_seed};

/// How the starting sum is invested
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum PortfolioMode {
    /// One allocation over the pooled (or per-country) distributions
    #[default]
    Single,
    /// A local part and a world part, simulated in lockstep
    Double,
}

/// What to run: portfolio layout plus an optional sweep
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Experiment {
    #[serde(default)]
    pub portfolio: PortfolioMode,
    #[serde(default)]
    pub sweep: Option<SweepPlan>,
}

/// A unit of work that produced no result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkippedUnit {
    /// Country selection the unit belonged to (`None` for pooled selections)
    pub country: Option<String>,
    /// Index of the base model, absent when a whole selection was skipped
    pub model: Option<usize>,
    /// Index of the sweep row, absent when a whole selection was skipped
    pub row: Option<usize>,
    pub reason: String,
}

/// Everything an experiment produced
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExperimentReport {
    pub results: Vec<ModelResult>,
    pub skipped: Vec<SkippedUnit>,
}

/// Distributions of one country selection
struct Selection {
    country: Option<String>,
    distributions: AssetDistributions,
}

struct Unit {
    selection: usize,
    model: usize,
    row: usize,
}

pub struct ExperimentRunner<'a> {
    config: &'a SimulationConfig,
    experiment: Experiment,
}

impl<'a> ExperimentRunner<'a> {
    pub fn new(config: &'a SimulationConfig, experiment: Experiment) -> Result<Self, RunnerError> {
        config.validate()?;
        Ok(Self { config, experiment })
    }

    #[must_use]
    pub fn experiment(&self) -> &Experiment {
        &self.experiment
    }

    /// Run every model (and sweep row) against the country series
    pub fn run(
        &self,
        series: &[CountrySeries],
        models: &[Model],
    ) -> Result<ExperimentReport, RunnerError> {
        let by_country = self
            .experiment
            .sweep
            .as_ref()
            .is_some_and(|plan| plan.by_country);
        let rows = match &self.experiment.sweep {
            Some(plan) => plan.rows(&self.config.sweep),
            None => vec![SweepParameters::default()],
        };

        let mut skipped = Vec::new();
        let (selections, world) = match self.experiment.portfolio {
            PortfolioMode::Single => (
                self.single_selections(series, by_country, &mut skipped),
                None,
            ),
            PortfolioMode::Double => {
                let (local, world, share) =
                    self.double_selections(series, by_country, &mut skipped)?;
                (local, Some((world, share)))
            }
        };
        if selections.is_empty() {
            return Err(RunnerError::NoUsableDistributions);
        }

        tracing::info!(
            portfolio = ?self.experiment.portfolio,
            selections = selections.len(),
            models = models.len(),
            rows = rows.len(),
            "running experiment"
        );

        let (model_count, row_count) = (models.len(), rows.len());
        let units: Vec<Unit> = (0..selections.len())
            .flat_map(|selection| {
                (0..model_count).flat_map(move |model| {
                    (0..row_count).map(move |row| Unit {
                        selection,
                        model,
                        row,
                    })
                })
            })
            .collect();

        let execute = |unit: &Unit| -> Result<ModelResult, SkippedUnit> {
            let selection = &selections[unit.selection];
            let portfolio = match &world {
                None => Portfolio::Single(&selection.distributions),
                Some((world, share)) => Portfolio::Double {
                    local: &selection.distributions,
                    world,
                    world_share: *share,
                },
            };
            let index = (unit.selection * model_count + unit.model) * row_count + unit.row;
            self.run_unit(
                &models[unit.model],
                &rows[unit.row],
                selection.country.as_deref(),
                portfolio,
                index as u64,
            )
            .map_err(|reason| SkippedUnit {
                country: selection.country.clone(),
                model: Some(unit.model),
                row: Some(unit.row),
                reason,
            })
        };

        #[cfg(feature = "parallel")]
        let outcomes: Vec<Result<ModelResult, SkippedUnit>> =
            units.par_iter().map(execute).collect();

        #[cfg(not(feature = "parallel"))]
        let outcomes: Vec<Result<ModelResult, SkippedUnit>> =
            units.iter().map(execute).collect();

        let mut results = Vec::with_capacity(outcomes.len());
        for outcome in outcomes {
            match outcome {
                Ok(result) => results.push(result),
                Err(unit) => {
                    tracing::warn!(
                        country = ?unit.country,
                        model = ?unit.model,
                        row = ?unit.row,
                        "skipped: {}",
                        unit.reason
                    );
                    skipped.push(unit);
                }
            }
        }

        tracing::info!(
            results = results.len(),
            skipped = skipped.len(),
            "experiment finished"
        );
        Ok(ExperimentReport { results, skipped })
    }

    fn run_unit(
        &self,
        base: &Model,
        row: &SweepParameters,
        country: Option<&str>,
        portfolio: Portfolio<'_>,
        index: u64,
    ) -> Result<ModelResult, String> {
        let mut model = base.apply(row);
        if let Some(country) = country {
            model = model.with_country(country);
        }
        model.validate().map_err(|e| e.to_string())?;

        let result = run_model(&model, portfolio, self.config, unit_seed(self.config.seed, index))
            .map_err(|e| e.to_string())?;
        tracing::debug!(
            country = ?result.model.country,
            strategy = %result.model.strategy,
            equity = result.model.equity,
            bonds = result.model.bonds,
            withdrawal = result.model.yearly_withdrawal,
            success = result.overall_success_rate,
            productivity = result.productivity,
            "model finished"
        );
        Ok(result)
    }

    fn single_selections(
        &self,
        series: &[CountrySeries],
        by_country: bool,
        skipped: &mut Vec<SkippedUnit>,
    ) -> Vec<Selection> {
        if by_country {
            series
                .iter()
                .filter_map(|s| {
                    self.selection(Some(s.country.name.clone()), &s.changes, skipped)
                })
                .collect()
        } else {
            let pooled = AssetChanges::pooled(series);
            self.selection(None, &pooled, skipped).into_iter().collect()
        }
    }

    /// Local selections, world distributions and the default world share (percent)
    fn double_selections(
        &self,
        series: &[CountrySeries],
        by_country: bool,
        skipped: &mut Vec<SkippedUnit>,
    ) -> Result<(Vec<Selection>, AssetDistributions, f64), RunnerError> {
        let (world_series, local_series): (Vec<&CountrySeries>, Vec<&CountrySeries>) =
            series.iter().partition(|s| s.country.world);

        let weight = |group: &[&CountrySeries]| -> f64 {
            group.iter().map(|s| f64::from(s.country.weight)).sum()
        };
        let world_weight = weight(&world_series);
        let local_weight = weight(&local_series);
        if world_weight <= 0.0 {
            return Err(RunnerError::MissingGroup("world"));
        }
        // Per-country runs give each local country full weight
        if local_series.is_empty() || (local_weight <= 0.0 && !by_country) {
            return Err(RunnerError::MissingGroup("local"));
        }
        let world_share = world_weight / (world_weight + local_weight) * 100.0;

        let world_changes = AssetChanges::pooled(world_series.iter().copied());
        let world = AssetDistributions::build("world", &world_changes, self.config.bins);
        if !world.is_usable() {
            return Err(RunnerError::NoUsableDistributions);
        }

        let locals = if by_country {
            local_series
                .iter()
                .filter_map(|s| {
                    self.selection(Some(s.country.name.clone()), &s.changes, skipped)
                })
                .collect()
        } else {
            let pooled = AssetChanges::pooled(local_series.iter().copied());
            self.selection(None, &pooled, skipped).into_iter().collect()
        };
        Ok((locals, world, world_share))
    }

    fn selection(
        &self,
        country: Option<String>,
        changes: &AssetChanges,
        skipped: &mut Vec<SkippedUnit>,
    ) -> Option<Selection> {
        let label = country.as_deref().unwrap_or("pooled");
        let distributions = AssetDistributions::build(label, changes, self.config.bins);
        if distributions.is_usable() {
            Some(Selection {
                country,
                distributions,
            })
        } else {
            tracing::warn!(selection = label, "degenerate distributions, selection skipped");
            skipped.push(SkippedUnit {
                country,
                model: None,
                row: None,
                reason: "degenerate return distributions".to_string(),
            });
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::SweepFactor;
    use crate::model::{Country, WithdrawalStrategy};

    fn config() -> SimulationConfig {
        SimulationConfig {
            cycles: 20,
            repeats: 30,
            steps_per_year: 10.0,
            bins: 20,
            ..Default::default()
        }
    }

    fn changes(offset: i32) -> AssetChanges {
        AssetChanges {
            equities: (0..50).map(|i| offset + 100 + i * 4).collect(),
            bonds: (0..50).map(|i| offset + 40 + i).collect(),
            bills: (0..50).map(|i| offset + 10 + i / 5).collect(),
        }
    }

    fn series() -> Vec<CountrySeries> {
        vec![
            CountrySeries::new(Country::new("Alpha", 50.0, 1), changes(0)),
            CountrySeries::new(Country::new("Beta", 20.0, 2), changes(30)),
            CountrySeries::new(Country::world("World", 1), changes(10)),
        ]
    }

    fn model(config: &SimulationConfig) -> Model {
        Model::new(WithdrawalStrategy::Fixed, 60, 30, 4.0, 0, config)
    }

    #[test]
    fn test_single_pooled() {
        let config = config();
        let runner = ExperimentRunner::new(&config, Experiment::default()).unwrap();
        let report = runner.run(&series(), &[model(&config)]).unwrap();

        assert_eq!(report.results.len(), 1);
        assert!(report.skipped.is_empty());
        assert_eq!(report.results[0].runs.len(), 30);
        assert!(report.results[0].model.country.is_none());
    }

    #[test]
    fn test_invalid_models_are_skipped() {
        let config = config();
        let mut bad = model(&config);
        bad.equity = 90;
        let runner = ExperimentRunner::new(&config, Experiment::default()).unwrap();

        let report = runner.run(&series(), &[bad, model(&config)]).unwrap();
        assert_eq!(report.results.len(), 1);
        assert_eq!(report.skipped.len(), 1);
        assert_eq!(report.skipped[0].model, Some(0));
    }

    #[test]
    fn test_sweep_by_country_tags_results() {
        let config = SimulationConfig {
            sweep: crate::analysis::SweepCandidates {
                strategies: vec![WithdrawalStrategy::Fixed, WithdrawalStrategy::TrailingAverage],
                ..Default::default()
            },
            ..config()
        };
        let experiment = Experiment {
            portfolio: PortfolioMode::Single,
            sweep: Some(SweepPlan::new(vec![SweepFactor::Strategy], true)),
        };
        let runner = ExperimentRunner::new(&config, experiment).unwrap();
        let report = runner.run(&series(), &[model(&config)]).unwrap();

        // Three countries, two strategies
        assert_eq!(report.results.len(), 6);
        let mut countries: Vec<_> = report
            .results
            .iter()
            .filter_map(|r| r.model.country.clone())
            .collect();
        countries.sort();
        countries.dedup();
        assert_eq!(countries, vec!["Alpha", "Beta", "World"]);
    }

    #[test]
    fn test_degenerate_country_is_skipped() {
        let config = config();
        let mut input = series();
        input.push(CountrySeries::new(
            Country::new("Flat", 1.0, 1),
            AssetChanges {
                equities: vec![100; 10],
                bonds: vec![50; 10],
                bills: vec![10; 10],
            },
        ));
        let experiment = Experiment {
            portfolio: PortfolioMode::Single,
            sweep: Some(SweepPlan::new(vec![], true)),
        };
        let runner = ExperimentRunner::new(&config, experiment).unwrap();
        let report = runner.run(&input, &[model(&config)]).unwrap();

        assert_eq!(report.results.len(), 3);
        assert_eq!(report.skipped.len(), 1);
        assert_eq!(report.skipped[0].country.as_deref(), Some("Flat"));
        assert_eq!(report.skipped[0].model, None);
    }

    #[test]
    fn test_double_requires_world_group() {
        let config = config();
        let experiment = Experiment {
            portfolio: PortfolioMode::Double,
            sweep: None,
        };
        let runner = ExperimentRunner::new(&config, experiment).unwrap();
        let no_world: Vec<_> = series().into_iter().filter(|s| !s.country.world).collect();

        assert!(matches!(
            runner.run(&no_world, &[model(&config)]),
            Err(RunnerError::MissingGroup("world"))
        ));
    }

    #[test]
    fn test_double_sweep_over_world_share() {
        let config = SimulationConfig {
            sweep: crate::analysis::SweepCandidates {
                world_shares: vec![0.0, 50.0, 100.0],
                ..Default::default()
            },
            ..config()
        };
        let experiment = Experiment {
            portfolio: PortfolioMode::Double,
            sweep: Some(SweepPlan::new(vec![SweepFactor::WorldShare], true)),
        };
        let runner = ExperimentRunner::new(&config, experiment).unwrap();
        let report = runner.run(&series(), &[model(&config)]).unwrap();

        // World is never a local selection: two countries, three shares
        assert_eq!(report.results.len(), 6);
        assert!(
            report
                .results
                .iter()
                .all(|r| r.model.country.as_deref() != Some("World"))
        );
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let config = SimulationConfig {
            bins: 0,
            ..config()
        };
        assert!(matches!(
            ExperimentRunner::new(&config, Experiment::default()),
            Err(RunnerError::Config(_))
        ));
    }

    #[test]
    fn test_results_do_not_depend_on_scheduling() {
        let config = config();
        let experiment = Experiment {
            portfolio: PortfolioMode::Double,
            sweep: None,
        };
        let runner = ExperimentRunner::new(&config, experiment).unwrap();
        let first = runner.run(&series(), &[model(&config)]).unwrap();
        let second = runner.run(&series(), &[model(&config)]).unwrap();
        assert_eq!(first, second);
    }
}
