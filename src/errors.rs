use thiserror::Error;

use crate::consts::MAX_UND_SPOT;

/// Errors surfaced by the pricer and its components.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PricerError {
    /// Underlying spot beyond the representable range
    #[error("underlying spot {spot} exceeds maximum {max}")]
    SpotOutOfRange { spot: i64, max: i64 },

    /// Interval bounds are inverted or empty
    #[error("invalid interval bounds [{begin}, {end})")]
    InvalidInterval { begin: i64, end: i64 },

    /// Derivative price outside the spread table
    #[error("price {price} is outside the spread table range")]
    PriceOutOfRange { price: i64 },

    /// Tick number outside the spread table
    #[error("tick {tick} is outside the spread table range")]
    TickOutOfRange { tick: i64 },

    /// Malformed spread table definition
    #[error("invalid spread table: {0}")]
    InvalidSpreadTable(String),

    /// Configuration failed validation
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Adjusted delta vanished, bucket size is undefined
    #[error("adjusted delta is zero at spot {spot}")]
    ZeroAdjustedDelta { spot: i64 },

    /// Re-seeding needs the last observed point of the interval
    #[error("interval has no last observed point")]
    MissingLastPoint,

    /// The underlying spot buffer cannot take more observations
    #[error("spot buffer is full (capacity {capacity})")]
    SpotBufferFull { capacity: usize },

    /// Internal interval index invariant broken
    #[error("interval index is inconsistent: {0}")]
    InconsistentIndex(String),
}

// Convenience constructors for common error patterns
impl PricerError {
    /// Spot above the 6dp representable maximum
    pub fn spot_out_of_range(spot: i64) -> Self {
        PricerError::SpotOutOfRange {
            spot,
            max: MAX_UND_SPOT,
        }
    }

    /// Inverted or empty interval bounds
    pub fn invalid_interval(begin: i64, end: i64) -> Self {
        PricerError::InvalidInterval { begin, end }
    }

    /// Broken index invariant with context
    pub fn inconsistent(msg: impl Into<String>) -> Self {
        PricerError::InconsistentIndex(msg.into())
    }
}
