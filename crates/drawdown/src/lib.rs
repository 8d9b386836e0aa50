//! Command-line driver for the drawdown simulation engine
//!
//! Loads an experiment file (or builds a synthetic demo), runs it through
//! [`drawdown_core`] and renders the results as tables or JSON.

pub mod experiment;
pub mod logging;
pub mod report;

pub use experiment::{ExperimentFile, LoadError};
pub use logging::init_logging;
pub use report::Summary;
