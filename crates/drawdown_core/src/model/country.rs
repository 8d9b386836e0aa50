use serde::{Deserialize, Serialize};

use crate::distribution::AssetChanges;

/// A country (or index) whose historical changes feed the distributions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Country {
    pub name: String,
    /// Population, used to weight cross-country statistics
    #[serde(default)]
    pub population: f64,
    /// How many times each change counts when pooled; 0 excludes the country
    #[serde(default = "default_weight")]
    pub weight: u32,
    /// Marks the world series used by the second part of double portfolios
    #[serde(default)]
    pub world: bool,
}

fn default_weight() -> u32 {
    1
}

impl Country {
    #[must_use]
    pub fn new(name: impl Into<String>, population: f64, weight: u32) -> Self {
        Self {
            name: name.into(),
            population,
            weight,
            world: false,
        }
    }

    #[must_use]
    pub fn world(name: impl Into<String>, weight: u32) -> Self {
        Self {
            name: name.into(),
            population: 0.0,
            weight,
            world: true,
        }
    }
}

/// A country together with its extracted per-asset change series
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CountrySeries {
    pub country: Country,
    pub changes: AssetChanges,
}

impl CountrySeries {
    #[must_use]
    pub fn new(country: Country, changes: AssetChanges) -> Self {
        Self { country, changes }
    }
}
