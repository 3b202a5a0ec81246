#![deny(unreachable_pub)]

//! Bucket pricing and violation detection for listed derivatives.
//!
//! Issuers of warrants and CBBCs quote a derivative price per band of
//! underlying spots. [`BucketPricer`] observes underlying ticks, derivative
//! quotes and greeks for one pair, learns those bands, and flags
//! observations that are only explainable by an implied volatility move.

// Core modules
mod consts;
mod errors;
mod types;

// Market structure
mod greeks;
mod interval;
mod interval_set;
mod spread_table;

// Pricing engine
mod config;
mod extractor;
mod pricer;
mod validator;

// Re-exports
pub use config::PricerConfig;
pub use consts::{DEFAULT_DELTA_ALLOWANCE, DEFAULT_SPOT_BUFFER_CAPACITY, MAX_UND_SPOT};
pub use errors::PricerError;
pub use greeks::{Greeks, ObservedGreeks};
pub use interval::Interval;
pub use pricer::{BucketPricer, UndTickOutcome};
pub use spread_table::{SpreadBand, SpreadTable};
pub use types::{OptionSide, Violation};
pub use validator::BucketSizeInfo;
