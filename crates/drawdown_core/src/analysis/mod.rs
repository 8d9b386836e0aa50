//! Sweep expansion and post-hoc analysis.
//!
//! [`factorize`] turns a list of factors into sweep rows that
//! [`Model::apply`](crate::model::Model::apply) patches onto a base model. After
//! the runner has produced results, [`best_reliable_per_country`] and
//! [`cross_country_ranking`] reduce them:
//!
//! ```ignore
//! use drawdown_core::analysis::{cross_country_ranking, SweepFactor, SweepPlan};
//!
//! let plan = SweepPlan::new(vec![SweepFactor::Strategy, SweepFactor::WithdrawalRate], true);
//! let report = runner.run(&series, &models)?;
//! let ranking = cross_country_ranking(&report.results, &countries);
//! ```

mod ranking;
mod sweep;

pub use ranking::*;
pub use sweep::*;
