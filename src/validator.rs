//! Side-parameterized quote and bucket checks.
//!
//! One validator covers both calls and puts. For a call the derivative
//! price rises with the underlying, for a put it falls; every check below
//! branches on the side to pick the reference edge and the violation
//! direction, but the arithmetic is shared.

use smallvec::SmallVec;

use crate::consts::{
    BUCKET_DISTANCE_ALLOWANCE, GREEK_SCALE, MAX_REBUCKET_PRICE, MIN_REBUCKET_PRICE,
    THEO_PRICE_ALLOWANCE,
};
use crate::errors::PricerError;
use crate::greeks::ObservedGreeks;
use crate::interval::Interval;
use crate::interval_set::IntervalSet;
use crate::spread_table::SpreadTable;
use crate::types::{OptionSide, TickDirection, Violation};

/// Intermediate values from a bucket size check.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BucketSizeInfo {
    pub adj_delta: i64,
    pub current_bucket_size: i64,
    pub max_bucket_size: i64,
    pub adj_max_bucket_size: i64,
}

/// Checks one derivative against the buckets learned for it.
#[derive(Debug, Clone)]
pub(crate) struct QuoteValidator {
    side: OptionSide,
    table: SpreadTable,
    conversion_ratio: i64,
    delta_allowance: i64,
    target_spread: Option<i64>,
}

impl QuoteValidator {
    pub(crate) fn new(
        side: OptionSide,
        table: SpreadTable,
        conversion_ratio: i64,
        delta_allowance: i64,
    ) -> Self {
        QuoteValidator {
            side,
            table,
            conversion_ratio,
            delta_allowance,
            target_spread: None,
        }
    }

    #[inline]
    pub(crate) fn target_spread(&self) -> Option<i64> {
        self.target_spread
    }

    pub(crate) fn set_target_spread(&mut self, spread: Option<i64>) {
        self.target_spread = spread;
    }

    /// Bucket size bounds for `[begin, end)` at `price`. `None` while
    /// greeks are not ready.
    pub(crate) fn bucket_size(
        &self,
        greeks: &ObservedGreeks,
        begin: i64,
        end: i64,
        price: i64,
    ) -> Result<Option<BucketSizeInfo>, PricerError> {
        if !greeks.is_ready() {
            return Ok(None);
        }
        // reference move is one tick away from the bucket price, toward
        // the side the underlying pushes it
        let (ref_move, edge) = match self.side {
            OptionSide::Call => {
                let next = price + self.table.tick_size_at(price)?;
                (next - price, begin)
            }
            OptionSide::Put => {
                let prev = self
                    .table
                    .tick_to_price(self.table.price_to_tick(price)? - 1)?;
                (price - prev, end)
            }
        };
        let adj_delta = greeks.adj_delta(edge);
        if adj_delta == 0 {
            return Err(PricerError::ZeroAdjustedDelta { spot: edge });
        }
        let max = (ref_move * GREEK_SCALE * self.conversion_ratio / adj_delta).abs();
        Ok(Some(BucketSizeInfo {
            adj_delta,
            current_bucket_size: end - begin,
            max_bucket_size: max,
            adj_max_bucket_size: max * self.delta_allowance / 1000,
        }))
    }

    /// Flag a bucket wider than the allowance permits. `extend_end` tells
    /// which edge grew, which decides the violation direction.
    pub(crate) fn validate_bucket_size(
        &self,
        greeks: &ObservedGreeks,
        begin: i64,
        end: i64,
        price: i64,
        extend_end: bool,
    ) -> Result<(Violation, Option<BucketSizeInfo>), PricerError> {
        let Some(info) = self.bucket_size(greeks, begin, end, price)? else {
            return Ok((Violation::None, None));
        };
        if info.current_bucket_size > info.adj_max_bucket_size {
            let v = match (self.side, extend_end) {
                (OptionSide::Call, true) => Violation::DownVol,
                (OptionSide::Call, false) => Violation::UpVol,
                (OptionSide::Put, true) => Violation::UpVol,
                (OptionSide::Put, false) => Violation::DownVol,
            };
            return Ok((v, Some(info)));
        }
        Ok((Violation::None, Some(info)))
    }

    /// A bucket strictly above another in spot must quote the side-consistent
    /// price (higher for calls, lower for puts).
    pub(crate) fn validate_price_consistency(
        &self,
        begin: i64,
        end: i64,
        price: i64,
        from: &Interval,
    ) -> Violation {
        let below = from.begin < begin && from.end_exclusive < end;
        let above = from.begin > begin && from.end_exclusive > end;
        match self.side {
            OptionSide::Call => {
                if below && from.price > price {
                    return Violation::DownVol;
                }
                if above && from.price < price {
                    return Violation::UpVol;
                }
            }
            OptionSide::Put => {
                if below && from.price < price {
                    return Violation::UpVol;
                }
                if above && from.price > price {
                    return Violation::DownVol;
                }
            }
        }
        Violation::None
    }

    /// Buckets `n` ticks apart must sit between `(n-1)` and `(n+1)` bucket
    /// sizes apart, with a small allowance. Missing sizes skip the check.
    pub(crate) fn validate_bucket_distance(
        &self,
        begin: i64,
        end: i64,
        price: i64,
        theo: Option<i64>,
        r: &Interval,
    ) -> Result<Violation, PricerError> {
        if r.price == price {
            return Ok(Violation::None);
        }
        if r.begin >= r.end_exclusive {
            return Err(PricerError::invalid_interval(r.begin, r.end_exclusive));
        }
        let (Some(theo), Some(ref_theo)) = (theo, r.theo_bucket_size) else {
            return Ok(Violation::None);
        };
        let n = (self.table.price_to_tick(price)? - self.table.price_to_tick(r.price)?).abs();
        let min_d = ((n - 1) * 1000 - BUCKET_DISTANCE_ALLOWANCE) * theo.min(ref_theo) / 1000;
        let max_d = ((n + 1) * 1000 + BUCKET_DISTANCE_ALLOWANCE) * theo.max(ref_theo) / 1000;
        let v = match (self.side, r.price < price) {
            (OptionSide::Call, true) => {
                if begin - r.end_exclusive < min_d {
                    Violation::UpVol
                } else if end - r.begin > max_d {
                    Violation::DownVol
                } else {
                    Violation::None
                }
            }
            (OptionSide::Call, false) => {
                if r.begin - end < min_d {
                    Violation::DownVol
                } else if r.end_exclusive - begin > max_d {
                    Violation::UpVol
                } else {
                    Violation::None
                }
            }
            (OptionSide::Put, true) => {
                if r.begin - end < min_d {
                    Violation::UpVol
                } else if r.end_exclusive - begin > max_d {
                    Violation::DownVol
                } else {
                    Violation::None
                }
            }
            (OptionSide::Put, false) => {
                if begin - r.end_exclusive < min_d {
                    Violation::DownVol
                } else if end - r.begin > max_d {
                    Violation::UpVol
                } else {
                    Violation::None
                }
            }
        };
        Ok(v)
    }

    /// Check a derivative quote move against the underlying direction
    /// observed since the last tight quote.
    pub(crate) fn validate_quote_direction(
        &self,
        dir: TickDirection,
        mm_bid: Option<i64>,
        mm_ask: Option<i64>,
        tight: bool,
        last_tight_bid: Option<i64>,
        last_tight_ask: Option<i64>,
    ) -> Violation {
        if tight {
            let (Some(bid), Some(last)) = (mm_bid, last_tight_bid) else {
                return Violation::None;
            };
            if bid == last {
                return Violation::None;
            }
            return match self.side {
                OptionSide::Call => {
                    if !dir.up && bid > last {
                        Violation::UpVol
                    } else if !dir.down && bid < last {
                        Violation::DownVol
                    } else {
                        Violation::None
                    }
                }
                OptionSide::Put => {
                    if !dir.up && bid < last {
                        Violation::DownVol
                    } else if !dir.down && bid > last {
                        Violation::UpVol
                    } else {
                        Violation::None
                    }
                }
            };
        }
        match self.side {
            OptionSide::Call => {
                if !dir.up {
                    if let (Some(bid), Some(last_ask)) = (mm_bid, last_tight_ask) {
                        if bid >= last_ask {
                            return Violation::UpVol;
                        }
                    }
                }
                if !dir.down {
                    if let (Some(ask), Some(last_bid)) = (mm_ask, last_tight_bid) {
                        if ask <= last_bid {
                            return Violation::DownVol;
                        }
                    }
                }
            }
            OptionSide::Put => {
                if !dir.up {
                    if let (Some(ask), Some(last_bid)) = (mm_ask, last_tight_bid) {
                        if ask <= last_bid {
                            return Violation::DownVol;
                        }
                    }
                }
                if !dir.down {
                    if let (Some(bid), Some(last_ask)) = (mm_bid, last_tight_ask) {
                        if bid >= last_ask {
                            return Violation::UpVol;
                        }
                    }
                }
            }
        }
        Violation::None
    }

    /// A market ask below the theoretical ask implied by the learned
    /// buckets is a down-vol move. The anchor is the candidate range's
    /// lower edge for calls and upper edge for puts.
    pub(crate) fn validate_ask(
        &self,
        greeks: &ObservedGreeks,
        range: Option<(i64, i64)>,
        ask: Option<i64>,
        observed: &IntervalSet,
    ) -> Violation {
        if self.target_spread.is_none() || !greeks.is_ready() {
            return Violation::None;
        }
        let (Some((begin_w, end_w)), Some(ask)) = (range, ask) else {
            return Violation::None;
        };
        match self.side {
            OptionSide::Call => {
                let anchor = begin_w;
                if let Some(iv) = observed.overlap_or_above(anchor) {
                    if iv.begin <= anchor {
                        return self.on_grid_ask_check(iv.price, ask);
                    }
                }
                for iv in observed.iter_end_to_desc(anchor) {
                    let adj = greeks.adj_delta(iv.begin);
                    let v =
                        self.extrapolated_ask_check(iv.price, anchor - iv.begin, adj, ask);
                    if v.is_violation() {
                        return v;
                    }
                }
            }
            OptionSide::Put => {
                let anchor = end_w;
                let mut first = true;
                for iv in observed.iter_end_from(anchor) {
                    if first && iv.begin <= anchor {
                        return self.on_grid_ask_check(iv.price, ask);
                    }
                    first = false;
                    if anchor < iv.end_exclusive {
                        let adj = greeks.adj_delta(iv.end_exclusive);
                        let v = self.extrapolated_ask_check(
                            iv.price,
                            anchor - iv.end_exclusive,
                            adj,
                            ask,
                        );
                        if v.is_violation() {
                            return v;
                        }
                    }
                }
            }
        }
        Violation::None
    }

    /// Theoretical ask for a bucket the anchor sits inside: the bucket
    /// price plus the target spread.
    fn on_grid_ask_check(&self, price: i64, ask: i64) -> Violation {
        let Some(target) = self.target_spread else {
            return Violation::None;
        };
        let theo_ask = self
            .table
            .price_to_tick(price)
            .and_then(|t| self.table.tick_to_price(t + target));
        match theo_ask {
            Ok(theo_ask) if ask < theo_ask => Violation::DownVol,
            _ => Violation::None,
        }
    }

    /// Theoretical ask deduced from a bucket the anchor sits outside,
    /// through a delta-implied bid snapped down to the tick grid.
    /// Off-table intermediate prices skip the check.
    fn extrapolated_ask_check(&self, price: i64, dist: i64, adj_delta: i64, ask: i64) -> Violation {
        let mut theo_bid = price
            + dist * adj_delta * THEO_PRICE_ALLOWANCE / (self.conversion_ratio * 100_000_000);
        let Ok(size) = self.table.tick_size_at(theo_bid) else {
            return Violation::None;
        };
        theo_bid -= theo_bid % size;
        self.on_grid_ask_check(theo_bid, ask)
    }

    /// Underlying move implied by a derivative move off a reference bucket.
    /// `None` means the gamma adjustment has no real solution.
    pub(crate) fn und_spot_change(
        &self,
        ref_begin: i64,
        ref_end: i64,
        ref_price: i64,
        price: i64,
        greeks: &ObservedGreeks,
    ) -> Option<i64> {
        let change_deriv = price - ref_price;
        let linear = change_deriv * self.conversion_ratio * GREEK_SCALE / greeks.delta();
        if greeks.gamma() == 0 {
            return Some(linear);
        }
        if change_deriv != 0 && linear.abs() * greeks.gamma() > 1_000_000 {
            let edge = match self.side {
                OptionSide::Call => ref_begin,
                OptionSide::Put => ref_end,
            };
            let adj = greeks.adj_delta(edge);
            let v = adj * adj + 2 * greeks.gamma() * self.conversion_ratio * change_deriv / 10;
            if v < 0 {
                return None;
            }
            let root = (v as f64).sqrt();
            let num = match self.side {
                OptionSide::Call => -(adj as f64) + root,
                OptionSide::Put => -(adj as f64) - root,
            };
            return Some((num * 1e6) as i64 / greeks.gamma());
        }
        Some(0)
    }

    /// Variant for the re-bucketing loop with the delta pre-evaluated at a
    /// hull edge and `partial = gamma * conversion_ratio` hoisted out.
    pub(crate) fn und_spot_change_from_delta(
        &self,
        delta: i64,
        change_deriv: i64,
        greeks: &ObservedGreeks,
        partial: i64,
    ) -> Option<i64> {
        let linear = change_deriv * self.conversion_ratio * GREEK_SCALE / greeks.delta();
        if greeks.gamma() == 0 {
            return Some(linear);
        }
        if change_deriv != 0 && linear.abs() * greeks.gamma() > 1_000_000 {
            let v = delta * delta + partial * change_deriv / 5000;
            if v < 0 {
                return None;
            }
            let root = (v as f64).sqrt();
            let num = match self.side {
                OptionSide::Call => -(delta as f64) + root,
                OptionSide::Put => -(delta as f64) - root,
            };
            return Some((num * 1e9) as i64 / greeks.gamma());
        }
        Some(0)
    }

    /// Derivative prices whose buckets re-bucketing recomputes, always in
    /// ascending spot order (ascending price for calls, descending for puts).
    pub(crate) fn adjacent_prices(&self, price: i64) -> SmallVec<[i64; 5]> {
        let lo = (price - 2).max(MIN_REBUCKET_PRICE);
        let hi = (price + 2).min(MAX_REBUCKET_PRICE);
        let mut out = SmallVec::new();
        match self.side {
            OptionSide::Call => {
                for p in lo..=hi {
                    out.push(p);
                }
            }
            OptionSide::Put => {
                for p in (lo..=hi).rev() {
                    out.push(p);
                }
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::greeks::Greeks;

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

    fn call_validator(conversion_ratio: i64, allowance: i64) -> QuoteValidator {
        QuoteValidator::new(
            OptionSide::Call,
            SpreadTable::hkex_warrant(),
            conversion_ratio,
            allowance,
        )
    }

    fn put_validator(conversion_ratio: i64, allowance: i64) -> QuoteValidator {
        QuoteValidator::new(
            OptionSide::Put,
            SpreadTable::hkex_warrant(),
            conversion_ratio,
            allowance,
        )
    }

    #[test]
    fn test_call_bucket_size_bounds() {
        let v = call_validator(10_000, 1200);
        let g = observed(50_000, 10_000, 110_550);
        let (violation, info) = v
            .validate_bucket_size(&g, 110_500_000, 110_650_000, 250, false)
            .unwrap();
        let info = info.unwrap();
        assert_eq!(info.adj_delta, 49_500);
        assert_eq!(info.current_bucket_size, 150_000);
        assert_eq!(info.max_bucket_size, 101_010);
        assert_eq!(info.adj_max_bucket_size, 121_212);
        assert_eq!(violation, Violation::UpVol);

        let (violation, info) = v
            .validate_bucket_size(&g, 110_500_000, 110_650_000, 2500, false)
            .unwrap();
        let info = info.unwrap();
        assert_eq!(info.max_bucket_size, 202_020);
        assert_eq!(info.adj_max_bucket_size, 242_424);
        assert_eq!(violation, Violation::None);
    }

    #[test]
    fn test_call_bucket_size_direction_depends_on_extended_edge() {
        let v = call_validator(10_000, 1200);
        let g = observed(50_000, 10_000, 110_550);
        let (violation, _) = v
            .validate_bucket_size(&g, 110_500_000, 110_650_000, 250, true)
            .unwrap();
        assert_eq!(violation, Violation::DownVol);
    }

    #[test]
    fn test_put_bucket_size_uses_upper_edge() {
        let v = put_validator(15_000, 1100);
        let g = observed(50_000, 500, 95_100);
        let info = v
            .bucket_size(&g, 95_066_667, 95_095_456, 100)
            .unwrap()
            .unwrap();
        assert_eq!(info.adj_delta, 49_998);
        assert_eq!(info.max_bucket_size, 30_001);
        assert_eq!(info.adj_max_bucket_size, 33_001);
    }

    #[test]
    fn test_bucket_size_skipped_without_greeks() {
        let v = call_validator(10_000, 1200);
        let g = ObservedGreeks::default();
        let (violation, info) = v
            .validate_bucket_size(&g, 1000, 2000, 99, false)
            .unwrap();
        assert_eq!(violation, Violation::None);
        assert!(info.is_none());
    }

    #[test]
    fn test_call_bucket_distance_too_close_above() {
        let v = call_validator(10_000, 1200);
        let r = Interval::new(11_095_000, 11_100_000, 2620).with_theo(Some(50_000));
        let violation = v
            .validate_bucket_distance(11_040_000, 11_090_000, 2500, Some(50_000), &r)
            .unwrap();
        assert_eq!(violation, Violation::DownVol);
    }

    #[test]
    fn test_call_bucket_distance_within_bounds() {
        let v = call_validator(10_000, 1200);
        let r = Interval::new(11_640_000, 11_660_000, 2620).with_theo(Some(50_000));
        let violation = v
            .validate_bucket_distance(11_040_000, 11_090_000, 2500, Some(50_000), &r)
            .unwrap();
        assert_eq!(violation, Violation::None);
    }

    #[test]
    fn test_put_bucket_distance_too_close_above() {
        let v = put_validator(10_000, 1200);
        let r = Interval::new(11_070_000_000, 11_075_000_000, 2620).with_theo(Some(500_000));
        let violation = v
            .validate_bucket_distance(
                11_050_000_000,
                11_065_000_000,
                2500,
                Some(500_000),
                &r,
            )
            .unwrap();
        assert_eq!(violation, Violation::DownVol);
    }

    #[test]
    fn test_bucket_distance_skips_same_price_and_missing_theo() {
        let v = call_validator(10_000, 1200);
        let r = Interval::new(11_095_000, 11_100_000, 2500).with_theo(Some(50_000));
        assert_eq!(
            v.validate_bucket_distance(11_040_000, 11_090_000, 2500, Some(50_000), &r)
                .unwrap(),
            Violation::None
        );
        let r = Interval::new(11_095_000, 11_100_000, 2620);
        assert_eq!(
            v.validate_bucket_distance(11_040_000, 11_090_000, 2500, Some(50_000), &r)
                .unwrap(),
            Violation::None
        );
    }

    #[test]
    fn test_price_consistency() {
        let call = call_validator(10_000, 1200);
        let above = Interval::new(1010, 1016, 99);
        assert_eq!(
            call.validate_price_consistency(1000, 1006, 100, &above),
            Violation::UpVol
        );
        let below = Interval::new(990, 996, 101);
        assert_eq!(
            call.validate_price_consistency(1000, 1006, 100, &below),
            Violation::DownVol
        );
        let put = put_validator(10_000, 1200);
        let above = Interval::new(1010, 1016, 101);
        assert_eq!(
            put.validate_price_consistency(1000, 1006, 100, &above),
            Violation::DownVol
        );
        let below = Interval::new(990, 996, 99);
        assert_eq!(
            put.validate_price_consistency(1000, 1006, 100, &below),
            Violation::UpVol
        );
        assert_eq!(
            call.validate_price_consistency(1000, 1006, 100, &Interval::new(1010, 1016, 101)),
            Violation::None
        );
    }

    #[test]
    fn test_quote_direction_tight_bid_move_without_spot_move() {
        let call = call_validator(10_000, 1200);
        let dir = TickDirection::default();
        assert_eq!(
            call.validate_quote_direction(dir, Some(102), Some(105), true, Some(99), Some(102)),
            Violation::UpVol
        );
        assert_eq!(
            call.validate_quote_direction(dir, Some(96), Some(99), true, Some(99), Some(102)),
            Violation::DownVol
        );
        let up = TickDirection { up: true, down: false };
        assert_eq!(
            call.validate_quote_direction(up, Some(102), Some(105), true, Some(99), Some(102)),
            Violation::None
        );
    }

    #[test]
    fn test_quote_direction_crossing_while_wide() {
        let call = call_validator(10_000, 1200);
        let dir = TickDirection::default();
        assert_eq!(
            call.validate_quote_direction(dir, Some(102), Some(110), false, Some(99), Some(102)),
            Violation::UpVol
        );
        assert_eq!(
            call.validate_quote_direction(dir, Some(90), Some(99), false, Some(99), Some(102)),
            Violation::DownVol
        );
        let put = put_validator(10_000, 1200);
        assert_eq!(
            put.validate_quote_direction(dir, Some(90), Some(99), false, Some(99), Some(102)),
            Violation::DownVol
        );
        assert_eq!(
            put.validate_quote_direction(dir, Some(102), Some(110), false, Some(99), Some(102)),
            Violation::UpVol
        );
    }

    #[test]
    fn test_ask_check_on_grid() {
        let mut v = call_validator(10_000, 1200);
        v.set_target_spread(Some(3));
        let g = observed(20_000, 10_000, 110_550);
        let mut set = IntervalSet::default();
        set.insert(Interval::new(1000, 1002, 99)).unwrap();
        // anchor inside the bucket: theoretical ask is 99 plus three ticks
        assert_eq!(
            v.validate_ask(&g, Some((1000, 1001)), Some(103), &set),
            Violation::None
        );
        assert_eq!(
            v.validate_ask(&g, Some((1000, 1001)), Some(101), &set),
            Violation::DownVol
        );
    }

    #[test]
    fn test_ask_check_extrapolates_from_bucket_below() {
        let mut v = call_validator(10_000, 1200);
        v.set_target_spread(Some(3));
        let g = observed(20_000, 10_000, 110_550);
        let mut set = IntervalSet::default();
        set.insert(Interval::new(1000, 1002, 99)).unwrap();
        // anchor above the bucket: the implied bid stays 99, ask must be
        // at least 102
        assert_eq!(
            v.validate_ask(&g, Some((1002, 1003)), Some(102), &set),
            Violation::None
        );
        assert_eq!(
            v.validate_ask(&g, Some((1002, 1003)), Some(101), &set),
            Violation::DownVol
        );
    }

    #[test]
    fn test_put_ask_check_extrapolates_from_bucket_above() {
        let mut v = put_validator(15_000, 1100);
        v.set_target_spread(Some(1));
        let g = observed(50_000, 500, 95_100);
        let mut set = IntervalSet::default();
        set.insert(Interval::new(95_066_667, 95_095_456, 100)).unwrap();
        // anchor below the bucket: implied bid 99, theoretical ask 100
        assert_eq!(
            v.validate_ask(&g, Some((95_049_950, 95_049_951)), Some(102), &set),
            Violation::None
        );
        assert_eq!(
            v.validate_ask(&g, Some((95_049_950, 95_049_951)), Some(99), &set),
            Violation::DownVol
        );
    }

    #[test]
    fn test_ask_check_skipped_without_inputs() {
        let mut v = call_validator(10_000, 1200);
        let g = observed(20_000, 10_000, 110_550);
        let set = IntervalSet::default();
        assert_eq!(
            v.validate_ask(&g, Some((1000, 1001)), Some(101), &set),
            Violation::None
        );
        v.set_target_spread(Some(3));
        assert_eq!(v.validate_ask(&g, None, Some(101), &set), Violation::None);
        assert_eq!(
            v.validate_ask(&g, Some((1000, 1001)), None, &set),
            Violation::None
        );
    }

    #[test]
    fn test_und_spot_change_linear_when_gamma_zero() {
        let v = call_validator(10_000, 1200);
        let g = observed(50_000, 0, 110_550);
        assert_eq!(v.und_spot_change(0, 0, 99, 100, &g), Some(20_000));
        assert_eq!(v.und_spot_change(0, 0, 100, 99, &g), Some(-20_000));
    }

    #[test]
    fn test_und_spot_change_gamma_adjusted() {
        let v = call_validator(10_000, 1200);
        let g = observed(12_903, 1319, 95_100);
        let partial = g.gamma() * 10_000;
        let change = v
            .und_spot_change_from_delta(12_903, -2, &g, partial)
            .unwrap();
        // quadratic adjustment lands near the linear estimate of -155003
        assert!((-155_050..=-154_950).contains(&change), "change {change}");
    }

    #[test]
    fn test_und_spot_change_small_move_is_zero() {
        let v = call_validator(10_000, 1200);
        // linear estimate times gamma stays under the materiality floor
        let g = observed(50_000_000, 1, 110_550);
        assert_eq!(v.und_spot_change(0, 0, 99, 100, &g), Some(0));
    }

    #[test]
    fn test_und_spot_change_invalid_discriminant() {
        let v = call_validator(10_000, 1200);
        let g = observed(100, 50_000, 110_550);
        let partial = g.gamma() * 10_000;
        assert_eq!(v.und_spot_change_from_delta(100, -500, &g, partial), None);
    }

    #[test]
    fn test_adjacent_prices_clamped_and_ordered() {
        let call = call_validator(10_000, 1200);
        assert_eq!(call.adjacent_prices(100).as_slice(), &[98, 99, 100, 101, 102]);
        assert_eq!(call.adjacent_prices(11).as_slice(), &[10, 11, 12, 13]);
        assert_eq!(call.adjacent_prices(250).as_slice(), &[248, 249, 250]);
        let put = put_validator(10_000, 1200);
        assert_eq!(put.adjacent_prices(100).as_slice(), &[102, 101, 100, 99, 98]);
    }
}
