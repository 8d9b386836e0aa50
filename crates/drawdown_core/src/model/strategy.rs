use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::ModelError;

/// How the per-cycle withdrawal is determined.
///
/// Serialized as the integer id used in model records (1, 2 or 3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum WithdrawalStrategy {
    /// Withdraw the amount computed once from the starting sum
    Fixed,
    /// Withdraw a fixed share of the current balance
    PercentOfCurrent,
    /// Withdraw a share of the three-year trailing average, recomputed yearly
    TrailingAverage,
}

impl WithdrawalStrategy {
    pub const ALL: [WithdrawalStrategy; 3] = [
        WithdrawalStrategy::Fixed,
        WithdrawalStrategy::PercentOfCurrent,
        WithdrawalStrategy::TrailingAverage,
    ];

    /// Numeric id used in model records and reports
    #[must_use]
    pub fn id(self) -> u8 {
        match self {
            WithdrawalStrategy::Fixed => 1,
            WithdrawalStrategy::PercentOfCurrent => 2,
            WithdrawalStrategy::TrailingAverage => 3,
        }
    }
}

impl TryFrom<u8> for WithdrawalStrategy {
    type Error = ModelError;

    fn try_from(id: u8) -> Result<Self, Self::Error> {
        match id {
            1 => Ok(WithdrawalStrategy::Fixed),
            2 => Ok(WithdrawalStrategy::PercentOfCurrent),
            3 => Ok(WithdrawalStrategy::TrailingAverage),
            other => Err(ModelError::UnknownStrategy(i64::from(other))),
        }
    }
}

impl From<WithdrawalStrategy> for u8 {
    fn from(strategy: WithdrawalStrategy) -> Self {
        strategy.id()
    }
}

impl fmt::Display for WithdrawalStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.id())
    }
}
