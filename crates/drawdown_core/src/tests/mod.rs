//! Scenario tests for the drawdown engine
//!
//! Tests are organized by topic:
//! - `end_to_end` - Full experiments from change series to model results
//! - `strategies` - Behavior of the withdrawal strategies over long horizons
//! - `analysis` - Sweeps followed by per-country and cross-country ranking
