//! Plain shared types.

use serde::{Deserialize, Serialize};

/// Outcome of checking an observation against previously accepted buckets.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Violation {
    /// Observation is consistent with the learned buckets
    #[default]
    None,
    /// Implied volatility moved up
    UpVol,
    /// Implied volatility moved down
    DownVol,
    /// Observation would make price buckets overlap
    PriceOverlapped,
}

impl Violation {
    #[inline]
    pub fn is_violation(self) -> bool {
        self != Violation::None
    }
}

/// Side of the derivative contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OptionSide {
    Call,
    Put,
}

impl OptionSide {
    #[inline]
    pub fn is_call(self) -> bool {
        self == OptionSide::Call
    }
}

/// Direction of underlying moves observed since the last tight quote.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct TickDirection {
    pub(crate) up: bool,
    pub(crate) down: bool,
}
