//! Pricer configuration.

use serde::Deserialize;

use crate::consts::{DEFAULT_DELTA_ALLOWANCE, DEFAULT_SPOT_BUFFER_CAPACITY};
use crate::types::OptionSide;

/// Static parameters of one underlying/derivative pair.
#[derive(Debug, Clone, Deserialize)]
pub struct PricerConfig {
    /// Security id of the underlying
    pub und_sec_sid: u64,
    /// Security id of the derivative
    pub deriv_sec_sid: u64,
    /// Call or put
    pub side: OptionSide,
    /// Conversion ratio, 3 decimal places (e.g. 10_000 for 10:1)
    pub conversion_ratio: i64,
    /// Longest repricing lag granted to the issuer, in nanoseconds
    pub issuer_max_lag_ns: i64,
    /// Bucket size allowance in thousandths
    #[serde(default = "default_delta_allowance")]
    pub delta_allowance: i64,
    /// Capacity of the underlying spot buffer
    #[serde(default = "default_spot_buffer_capacity")]
    pub spot_buffer_capacity: usize,
}

fn default_delta_allowance() -> i64 {
    DEFAULT_DELTA_ALLOWANCE
}

fn default_spot_buffer_capacity() -> usize {
    DEFAULT_SPOT_BUFFER_CAPACITY
}

impl PricerConfig {
    /// Validate invariants the pricer relies on. Returns a descriptive
    /// error for the first violated one.
    pub fn validate(&self) -> Result<(), String> {
        if self.conversion_ratio <= 0 {
            return Err(format!(
                "conversion_ratio must be > 0, got {}",
                self.conversion_ratio
            ));
        }
        if self.issuer_max_lag_ns <= 0 {
            return Err(format!(
                "issuer_max_lag_ns must be > 0, got {}",
                self.issuer_max_lag_ns
            ));
        }
        if self.delta_allowance < 1000 {
            return Err(format!(
                "delta_allowance must be >= 1000 (thousandths of the bound), got {}",
                self.delta_allowance
            ));
        }
        if self.spot_buffer_capacity == 0 {
            return Err("spot_buffer_capacity must be > 0".to_string());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_valid_config() -> PricerConfig {
        PricerConfig {
            und_sec_sid: 1001,
            deriv_sec_sid: 2001,
            side: OptionSide::Call,
            conversion_ratio: 10_000,
            issuer_max_lag_ns: 100_000_000,
            delta_allowance: DEFAULT_DELTA_ALLOWANCE,
            spot_buffer_capacity: DEFAULT_SPOT_BUFFER_CAPACITY,
        }
    }

    #[test]
    fn test_config_validate_accepts_valid_config() {
        assert!(test_valid_config().validate().is_ok());
    }

    #[test]
    fn test_config_validate_rejects_zero_lag() {
        let mut cfg = test_valid_config();
        cfg.issuer_max_lag_ns = 0;
        let err = cfg.validate().unwrap_err();
        assert!(err.contains("issuer_max_lag_ns"), "unexpected error: {err}");
    }

    #[test]
    fn test_config_validate_rejects_small_allowance() {
        let mut cfg = test_valid_config();
        cfg.delta_allowance = 900;
        let err = cfg.validate().unwrap_err();
        assert!(err.contains("delta_allowance"), "unexpected error: {err}");
    }

    #[test]
    fn test_config_deserializes_with_defaults() {
        let cfg: PricerConfig = serde_json::from_str(
            r#"{
                "und_sec_sid": 1001,
                "deriv_sec_sid": 2001,
                "side": "call",
                "conversion_ratio": 10000,
                "issuer_max_lag_ns": 100000000
            }"#,
        )
        .unwrap();
        assert_eq!(cfg.delta_allowance, DEFAULT_DELTA_ALLOWANCE);
        assert_eq!(cfg.spot_buffer_capacity, DEFAULT_SPOT_BUFFER_CAPACITY);
    }
}
