mod country;
mod portfolio;
mod results;
mod strategy;

pub use country::{Country, CountrySeries};
pub use portfolio::{Asset, Model, ModelRecord};
pub use results::{ModelResult, SingleRunResult};
pub use strategy::WithdrawalStrategy;
