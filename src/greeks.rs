//! Greeks as published by the pricing feed, in fixed point.

use crate::consts::REF_SPOT_TO_SPOT;

/// One greeks publication. Delta and gamma carry 5 decimal places, the
/// reference spot 3, vega and implied volatility whatever the feed uses.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Greeks {
    pub delta: i64,
    pub gamma: i64,
    pub ref_spot: i64,
    pub vega: i64,
    pub implied_vol: i64,
}

/// Latest greeks merged from the feed, with the merge timestamp.
#[derive(Debug, Clone, Copy, Default)]
pub struct ObservedGreeks {
    updated_ns: i64,
    delta: i64,
    gamma: i64,
    ref_spot: i64,
    vega: i64,
    implied_vol: i64,
}

impl ObservedGreeks {
    /// Merge a publication. Returns true when any field changed.
    pub(crate) fn merge(&mut self, ts_ns: i64, greeks: &Greeks) -> bool {
        let changed = self.delta != greeks.delta
            || self.gamma != greeks.gamma
            || self.ref_spot != greeks.ref_spot
            || self.vega != greeks.vega
            || self.implied_vol != greeks.implied_vol;
        self.updated_ns = ts_ns;
        self.delta = greeks.delta;
        self.gamma = greeks.gamma;
        self.ref_spot = greeks.ref_spot;
        self.vega = greeks.vega;
        self.implied_vol = greeks.implied_vol;
        changed
    }

    pub(crate) fn clear(&mut self) {
        *self = ObservedGreeks::default();
    }

    #[inline]
    pub fn delta(&self) -> i64 {
        self.delta
    }

    #[inline]
    pub fn gamma(&self) -> i64 {
        self.gamma
    }

    #[inline]
    pub fn ref_spot(&self) -> i64 {
        self.ref_spot
    }

    #[inline]
    pub fn updated_ns(&self) -> i64 {
        self.updated_ns
    }

    #[inline]
    pub fn has_delta(&self) -> bool {
        self.delta != 0
    }

    #[inline]
    pub fn has_ref_spot(&self) -> bool {
        self.ref_spot != 0
    }

    /// Both a delta and a reference spot have been observed.
    #[inline]
    pub fn is_ready(&self) -> bool {
        self.has_delta() && self.has_ref_spot()
    }

    /// Reference spot aligned to the 6dp underlying spot convention.
    #[inline]
    pub(crate) fn ref_spot6(&self) -> i64 {
        self.ref_spot * REF_SPOT_TO_SPOT
    }

    /// Delta adjusted by gamma for the distance between `spot6` and the
    /// reference spot. Truncating integer arithmetic throughout.
    pub(crate) fn adj_delta(&self, spot6: i64) -> i64 {
        self.delta + self.gamma * (spot6 - self.ref_spot6()) / 1_000_000
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn observed(delta: i64, gamma: i64, ref_spot: i64) -> ObservedGreeks {
        let mut g = ObservedGreeks::default();
        g.merge(
            0,
            &Greeks {
                delta,
                gamma,
                ref_spot,
                vega: 0,
                implied_vol: 0,
            },
        );
        g
    }

    #[test]
    fn test_adj_delta_below_ref_spot() {
        let g = observed(50_000, 10_000, 110_550);
        assert_eq!(g.adj_delta(110_500_000), 49_500);
        assert_eq!(g.adj_delta(110_550_000), 50_000);
    }

    #[test]
    fn test_adj_delta_truncates_toward_zero() {
        let g = observed(50_000, 500, 95_100);
        // 500 * -75_000 / 1_000_000 truncates to -37
        assert_eq!(g.adj_delta(95_025_000), 49_963);
        // 500 * -33_333 / 1_000_000 truncates to -16
        assert_eq!(g.adj_delta(95_066_667), 49_984);
    }

    #[test]
    fn test_merge_reports_changes() {
        let mut g = ObservedGreeks::default();
        let pub1 = Greeks {
            delta: 20_000,
            gamma: 10_000,
            ref_spot: 110_550,
            vega: 0,
            implied_vol: 0,
        };
        assert!(g.merge(1, &pub1));
        assert!(!g.merge(2, &pub1));
        assert_eq!(g.updated_ns(), 2);
        assert!(g.is_ready());
    }

    #[test]
    fn test_not_ready_without_both_fields() {
        let mut g = ObservedGreeks::default();
        assert!(!g.is_ready());
        g.merge(
            0,
            &Greeks {
                delta: 20_000,
                ..Greeks::default()
            },
        );
        assert!(g.has_delta());
        assert!(!g.is_ready());
    }
}
