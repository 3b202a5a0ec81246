//! Fixed-point conventions shared across the crate.
//!
//! - delta and gamma carry 5 implicit decimal places
//! - derivative prices carry 3 implicit decimal places
//! - the reference spot carries 3 implicit decimal places
//! - underlying spots carry 6 implicit decimal places
//! - conversion ratios carry 3 implicit decimal places
//! - allowances are expressed in thousandths

/// Largest representable underlying spot (6 decimal places).
pub const MAX_UND_SPOT: i64 = (1 << 32) - 1;

/// Default bucket size allowance, in thousandths.
pub const DEFAULT_DELTA_ALLOWANCE: i64 = 1200;

/// Default capacity of the underlying spot buffer.
pub const DEFAULT_SPOT_BUFFER_CAPACITY: usize = 1024;

/// Scale factor for delta and gamma (5 decimal places).
pub(crate) const GREEK_SCALE: i64 = 100_000;

/// Multiplier converting a 3dp reference spot to the 6dp spot convention.
pub(crate) const REF_SPOT_TO_SPOT: i64 = 1_000;

/// Slack applied to bucket distance bounds, in thousandths.
pub(crate) const BUCKET_DISTANCE_ALLOWANCE: i64 = 100;

/// Haircut applied when deducing a theoretical bid, in thousandths.
pub(crate) const THEO_PRICE_ALLOWANCE: i64 = 950;

/// Re-bucketing only runs for derivative prices in this band (3dp).
pub(crate) const MIN_REBUCKET_PRICE: i64 = 10;
pub(crate) const MAX_REBUCKET_PRICE: i64 = 250;

/// A bucket takes part in re-bucketing only when the reference spot is at
/// least this many times the bucket's distance from it.
pub(crate) const MIN_REF_SPOT_DISTANCE_RATIO: i64 = 100;
