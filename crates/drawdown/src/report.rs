//! Result summaries for stdout

use std::fmt;

use drawdown_core::analysis::{
    BestReliable, SweepRanking, best_reliable_per_country, cross_country_ranking,
};
use drawdown_core::{Country, ExperimentReport, ModelResult, SimulationConfig, SkippedUnit};
use serde::Serialize;

/// Report plus the rankings derived from it
#[derive(Debug, Clone, Serialize)]
pub struct Summary {
    pub results: Vec<ModelResult>,
    pub skipped: Vec<SkippedUnit>,
    pub best_reliable: Vec<BestReliable>,
    /// Present when results span several countries
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cross_country: Option<Vec<SweepRanking>>,
}

impl Summary {
    #[must_use]
    pub fn new(report: ExperimentReport, countries: &[Country], config: &SimulationConfig) -> Self {
        let best_reliable = best_reliable_per_country(&report.results, config.cutoff_percent);

        let mut tagged: Vec<&str> = report
            .results
            .iter()
            .filter_map(|r| r.model.country.as_deref())
            .collect();
        tagged.sort_unstable();
        tagged.dedup();
        let cross_country =
            (tagged.len() > 1).then(|| cross_country_ranking(&report.results, countries));

        Self {
            results: report.results,
            skipped: report.skipped,
            best_reliable,
            cross_country,
        }
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

/// Comma-separated tables: per-model results, best reliable per country,
/// the cross-country ranking when there is one, and skipped units
impl fmt::Display for Summary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Country,Strategy,Eq,Bo,WdRate,World,Success,TrailSuccess,WdSuccess,Prod,TrailAvg,Failed"
        )?;
        for r in &self.results {
            let m = &r.model;
            writeln!(
                f,
                "{},{},{},{},{:.2},{},{:.3},{:.3},{:.3},{:.2},{:.0},{}",
                m.country.as_deref().unwrap_or("-"),
                m.strategy,
                m.equity,
                m.bonds,
                m.yearly_withdrawal,
                m.world_share.map_or_else(|| "-".to_string(), |s| format!("{s:.1}")),
                r.overall_success_rate,
                r.trail_success_rate,
                r.withdrawal_success_rate,
                r.productivity,
                r.trail_average,
                r.failed_repeats,
            )?;
        }

        if !self.best_reliable.is_empty() {
            writeln!(f)?;
            writeln!(f, "Country,Strategy,Eq,Bo,WdRate,BestReliableProd")?;
            for best in &self.best_reliable {
                writeln!(
                    f,
                    "{},{},{},{},{:.2},{:.2}",
                    best.country.as_deref().unwrap_or("-"),
                    best.model.strategy,
                    best.model.equity,
                    best.model.bonds,
                    best.model.yearly_withdrawal,
                    best.productivity,
                )?;
            }
        }

        if let Some(ranking) = &self.cross_country {
            writeln!(f)?;
            writeln!(f, "WdRate,Strategy,World,Eq,Bo,Prod,Success")?;
            for entry in ranking {
                let p = &entry.parameters;
                writeln!(
                    f,
                    "{:.2},{},{},{},{},{:.2},{:.3}",
                    p.withdrawal_rate.unwrap_or_default(),
                    p.strategy.map_or_else(|| "-".to_string(), |s| s.to_string()),
                    p.world_share.map_or_else(|| "-".to_string(), |s| format!("{s:.1}")),
                    p.equity.unwrap_or_default(),
                    p.bonds.unwrap_or_default(),
                    entry.weighted_productivity,
                    entry.weighted_success_rate,
                )?;
            }
        }

        if !self.skipped.is_empty() {
            writeln!(f)?;
            writeln!(f, "Skipped,Reason")?;
            for unit in &self.skipped {
                writeln!(
                    f,
                    "{}/{}/{},{}",
                    unit.country.as_deref().unwrap_or("-"),
                    unit.model.map_or_else(|| "*".to_string(), |i| i.to_string()),
                    unit.row.map_or_else(|| "*".to_string(), |i| i.to_string()),
                    unit.reason,
                )?;
            }
        }

        Ok(())
    }
}
