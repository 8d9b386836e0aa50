//! Experiment files
//!
//! An experiment file is a YAML document holding everything one run needs:
//!
//! ```yaml
//! config:
//!   cycles: 400
//!   repeats: 1000
//! experiment:
//!   portfolio: Double
//!   sweep:
//!     factors: [Strategy, WithdrawalRate]
//!     by_country: true
//! countries:
//!   - country: { name: Chile, population: 18.0, weight: 1 }
//!     changes:
//!       equities: [120, -340, 515]
//!       bonds: [40, 12, -8]
//!       bills: [9, 11, 10]
//! models:
//!   - { strategy: 1, equity: 60, bonds: 30, yearly_withdrawal: 4.0 }
//! ```
//!
//! Change values are percentages at scale 10000 (`120` = +1.20%).

use std::path::Path;

use drawdown_core::distribution::{AssetChanges, synthetic_changes};
use drawdown_core::error::{DistributionError, RunnerError};
use drawdown_core::{
    Country, CountrySeries, Experiment, ExperimentReport, ExperimentRunner, Model, ModelRecord,
    SimulationConfig, SkippedUnit,
};
use rand::SeedableRng;
use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};

/// Error types for loading experiment files
#[derive(Debug)]
pub enum LoadError {
    Io(String),
    Parse(String),
}

impl std::fmt::Display for LoadError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LoadError::Io(msg) => write!(f, "IO error: {}", msg),
            LoadError::Parse(msg) => write!(f, "Parse error: {}", msg),
        }
    }
}

impl std::error::Error for LoadError {}

/// Everything needed to run one experiment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExperimentFile {
    #[serde(default)]
    pub config: SimulationConfig,
    #[serde(default)]
    pub experiment: Experiment,
    pub countries: Vec<CountrySeries>,
    pub models: Vec<ModelRecord>,
}

impl ExperimentFile {
    pub fn from_yaml(yaml: &str) -> Result<Self, serde_saphyr::Error> {
        serde_saphyr::from_str(yaml)
    }

    pub fn load(path: &Path) -> Result<Self, LoadError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| LoadError::Io(format!("{}: {e}", path.display())))?;
        let file = Self::from_yaml(&content)
            .map_err(|e| LoadError::Parse(format!("{}: {e}", path.display())))?;
        tracing::info!(
            path = %path.display(),
            countries = file.countries.len(),
            models = file.models.len(),
            "loaded experiment"
        );
        Ok(file)
    }

    /// Resolve model records against the configuration defaults.
    ///
    /// Each model keeps the index of its record. Records that cannot be
    /// resolved are logged and returned as skipped units.
    pub fn models(&self) -> (Vec<(usize, Model)>, Vec<SkippedUnit>) {
        let mut models = Vec::with_capacity(self.models.len());
        let mut skipped = Vec::new();
        for (index, record) in self.models.iter().cloned().enumerate() {
            match record.into_model(&self.config) {
                Ok(model) => models.push((index, model)),
                Err(err) => {
                    tracing::warn!(model = index, "skipped: {err}");
                    skipped.push(SkippedUnit {
                        country: None,
                        model: Some(index),
                        row: None,
                        reason: err.to_string(),
                    });
                }
            }
        }
        (models, skipped)
    }

    /// Run every resolvable model; skipped units refer to record indices
    pub fn run(&self) -> Result<ExperimentReport, RunnerError> {
        let (resolved, mut skipped) = self.models();
        let (indices, models): (Vec<usize>, Vec<Model>) = resolved.into_iter().unzip();

        let runner = ExperimentRunner::new(&self.config, self.experiment.clone())?;
        let mut report = runner.run(&self.countries, &models)?;

        for unit in &mut report.skipped {
            unit.model = unit.model.and_then(|i| indices.get(i).copied());
        }
        skipped.append(&mut report.skipped);
        skipped.sort_by_key(|unit| (unit.model, unit.row));
        report.skipped = skipped;
        Ok(report)
    }

    /// Synthetic experiment with three countries and a world series
    pub fn demo(seed: u64) -> Result<Self, DistributionError> {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut series = |country: Country, equity: (f64, f64)| -> Result<_, DistributionError> {
            let changes = AssetChanges {
                equities: synthetic_changes(equity.0, equity.1, 1_200, &mut rng)?,
                bonds: synthetic_changes(0.25, 1.2, 1_200, &mut rng)?,
                bills: synthetic_changes(0.08, 0.2, 1_200, &mut rng)?,
            };
            Ok(CountrySeries::new(country, changes))
        };

        let countries = vec![
            series(Country::new("Atlantis", 40.0, 1), (0.55, 4.5))?,
            series(Country::new("Borealis", 25.0, 1), (0.45, 3.5))?,
            series(Country::new("Cascadia", 10.0, 2), (0.70, 6.0))?,
            series(Country::world("World", 1), (0.50, 3.8))?,
        ];

        let record = |strategy, yearly_withdrawal| ModelRecord {
            strategy,
            equity: 60,
            bonds: 30,
            yearly_withdrawal,
            rebalance_every: 0,
            start_sum: None,
            cycles: None,
            repeats: None,
            world_share: None,
            country: None,
        };

        Ok(Self {
            config: SimulationConfig {
                repeats: 200,
                seed,
                ..Default::default()
            },
            experiment: Experiment::default(),
            countries,
            models: vec![record(1, 4.0), record(2, 4.0), record(3, 4.0)],
        })
    }
}
