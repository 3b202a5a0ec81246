//! Bucket pricer: learns which underlying spot levels an issuer quotes a
//! derivative price at, and flags quotes or spots that contradict what was
//! learned.
//!
//! All state transitions are driven by caller-supplied nanosecond
//! timestamps. The pricer performs no I/O and owns no threads.

use std::collections::HashMap;

use tracing::{debug, trace, warn};

use crate::config::PricerConfig;
use crate::consts::{MAX_REBUCKET_PRICE, MAX_UND_SPOT, MIN_REF_SPOT_DISTANCE_RATIO};
use crate::errors::PricerError;
use crate::extractor::{ExtractedInterval, SpotExtractor, SpotHistory, TimedSpot};
use crate::greeks::{Greeks, ObservedGreeks};
use crate::interval::Interval;
use crate::interval_set::IntervalSet;
use crate::spread_table::SpreadTable;
use crate::types::{OptionSide, TickDirection, Violation};
use crate::validator::QuoteValidator;

/// Derivative quote captured at the last tight spread.
#[derive(Debug, Clone, Copy)]
struct TightQuote {
    bid: Option<i64>,
    ask: Option<i64>,
    ts_ns: i64,
    und_spot: Option<i64>,
}

/// Result of observing one underlying tick.
#[derive(Debug, Clone, Copy, Default)]
pub struct UndTickOutcome {
    pub violation: Violation,
    /// Candidate interval that reached registration, if any
    pub interval: Option<Interval>,
}

/// Learns spot-to-price buckets for one underlying/derivative pair.
#[derive(Debug)]
pub struct BucketPricer {
    config: PricerConfig,
    table: SpreadTable,
    validator: QuoteValidator,
    greeks: ObservedGreeks,
    history: SpotHistory,
    extractor: SpotExtractor,
    observed: IntervalSet,
    by_price: HashMap<i64, (i64, i64)>,
    prev_candidate: Option<ExtractedInterval>,
    last_deriv_bid: Option<i64>,
    last_deriv_ask: Option<i64>,
    last_deriv_ns: Option<i64>,
    last_deriv_spread: Option<i64>,
    last_unverified_spread: Option<i64>,
    deriv_tight: bool,
    last_tight: Option<TightQuote>,
    last_und_spot: Option<i64>,
    min_spot_since_reset: Option<i64>,
    max_spot_since_reset: Option<i64>,
    should_register: bool,
    prev_referred_deriv_ns: Option<i64>,
    received_deriv_tick: bool,
}

impl BucketPricer {
    pub fn new(config: PricerConfig, table: SpreadTable) -> Result<Self, PricerError> {
        config.validate().map_err(PricerError::InvalidConfig)?;
        let validator = QuoteValidator::new(
            config.side,
            table.clone(),
            config.conversion_ratio,
            config.delta_allowance,
        );
        Ok(BucketPricer {
            history: SpotHistory::new(config.spot_buffer_capacity),
            extractor: SpotExtractor::new(config.issuer_max_lag_ns),
            validator,
            table,
            config,
            greeks: ObservedGreeks::default(),
            observed: IntervalSet::default(),
            by_price: HashMap::new(),
            prev_candidate: None,
            last_deriv_bid: None,
            last_deriv_ask: None,
            last_deriv_ns: None,
            last_deriv_spread: None,
            last_unverified_spread: None,
            deriv_tight: false,
            last_tight: None,
            last_und_spot: None,
            min_spot_since_reset: None,
            max_spot_since_reset: None,
            should_register: false,
            prev_referred_deriv_ns: None,
            received_deriv_tick: false,
        })
    }

    #[inline]
    pub fn side(&self) -> OptionSide {
        self.config.side
    }

    #[inline]
    pub fn und_sec_sid(&self) -> u64 {
        self.config.und_sec_sid
    }

    #[inline]
    pub fn deriv_sec_sid(&self) -> u64 {
        self.config.deriv_sec_sid
    }

    #[inline]
    pub fn target_spread(&self) -> Option<i64> {
        self.validator.target_spread()
    }

    #[inline]
    pub fn interval_count(&self) -> usize {
        self.observed.len()
    }

    /// Learned buckets in ascending spot order.
    pub fn intervals(&self) -> impl Iterator<Item = Interval> + '_ {
        self.observed.iter()
    }

    #[inline]
    pub fn spot_buffer_len(&self) -> usize {
        self.history.len()
    }

    #[inline]
    pub fn min_observed_spot(&self) -> Option<i64> {
        self.min_spot_since_reset
    }

    #[inline]
    pub fn max_observed_spot(&self) -> Option<i64> {
        self.max_spot_since_reset
    }

    /// Bid and ask of the last derivative tick, if any.
    #[inline]
    pub fn last_deriv_quote(&self) -> (Option<i64>, Option<i64>) {
        (self.last_deriv_bid, self.last_deriv_ask)
    }

    /// Merge a greeks publication. Returns true when any field changed.
    pub fn observe_greeks(&mut self, ts_ns: i64, greeks: &Greeks) -> bool {
        let changed = self.greeks.merge(ts_ns, greeks);
        if changed {
            debug!(
                deriv = self.config.deriv_sec_sid,
                delta = greeks.delta,
                gamma = greeks.gamma,
                ref_spot = greeks.ref_spot,
                "greeks updated"
            );
        }
        changed
    }

    /// Observe a market maker quote, deriving the spread from the tick grid
    /// and adopting it as the target spread.
    pub fn observe_deriv_quote(
        &mut self,
        ts_ns: i64,
        mm_bid: Option<i64>,
        mm_ask: Option<i64>,
    ) -> Result<Violation, PricerError> {
        let spread = match (mm_bid, mm_ask) {
            (Some(bid), Some(ask)) => Some(self.table.spread_in_ticks(bid, ask)?),
            _ => None,
        };
        self.validator.set_target_spread(spread);
        Ok(self.observe_deriv_tick(ts_ns, mm_bid, mm_ask, spread))
    }

    /// Observe a market maker quote with its spread already expressed in
    /// ticks. The quote is validated against the learned buckets first and
    /// only applied when consistent.
    pub fn observe_deriv_tick(
        &mut self,
        ts_ns: i64,
        mm_bid: Option<i64>,
        mm_ask: Option<i64>,
        spread: Option<i64>,
    ) -> Violation {
        let tight = spread.is_some() && spread == self.validator.target_spread();
        self.last_unverified_spread = spread;
        let violation = self.check_quote_direction(mm_bid, mm_ask, tight);
        if violation.is_violation() {
            warn!(
                deriv = self.config.deriv_sec_sid,
                ?violation,
                bid = ?mm_bid,
                ask = ?mm_ask,
                "derivative quote contradicts learned buckets"
            );
            return violation;
        }
        self.apply_deriv_tick(ts_ns, mm_bid, mm_ask, spread, tight);
        Violation::None
    }

    /// Observe an underlying spot tick, buffering it and, when due, running
    /// extraction and registration.
    pub fn observe_und_tick(
        &mut self,
        ts_ns: i64,
        spot: i64,
    ) -> Result<UndTickOutcome, PricerError> {
        if spot > MAX_UND_SPOT {
            return Err(PricerError::spot_out_of_range(spot));
        }
        self.last_und_spot = Some(spot);
        self.history.push(TimedSpot {
            ts_ns,
            spot,
            tight: self.deriv_tight,
        })?;
        self.min_spot_since_reset = Some(self.min_spot_since_reset.map_or(spot, |m| m.min(spot)));
        self.max_spot_since_reset = Some(self.max_spot_since_reset.map_or(spot, |m| m.max(spot)));

        let mut outcome = UndTickOutcome::default();
        if !self.should_process(ts_ns) {
            return Ok(outcome);
        }
        let candidate = self.extractor.extract(
            &mut self.history,
            ts_ns,
            self.last_deriv_bid,
            self.last_deriv_ns,
        );
        self.prev_referred_deriv_ns = self.last_deriv_ns;

        let mut violation = self.validator.validate_ask(
            &self.greeks,
            candidate.range,
            self.last_deriv_ask,
            &self.observed,
        );
        if self.should_register
            && !violation.is_violation()
            && candidate.has_valid_range()
            && self
                .prev_candidate
                .map_or(true, |prev| !prev.same_bucket(&candidate))
        {
            if let (Some((begin, end)), Some(price)) = (candidate.range, candidate.price) {
                let extend_end = candidate.last.is_some_and(|last| last > begin);
                let mut changed = false;
                let (v, theo) =
                    self.register_interval(ts_ns, begin, end, price, extend_end, true, &mut changed)?;
                violation = v;
                outcome.interval = Some(Interval::new(begin, end, price).with_theo(theo));
                if !violation.is_violation() && changed {
                    self.rebucket(price);
                }
            }
            self.prev_candidate = Some(candidate);
        }
        outcome.violation = violation;
        Ok(outcome)
    }

    /// Clear the learned buckets and re-arm from the last unverified spread.
    pub fn reset(&mut self, ts_ns: i64) {
        let spread = self.last_unverified_spread;
        self.reset_with_target_spread(ts_ns, spread);
    }

    /// Clear the learned buckets and re-arm with an explicit target spread.
    pub fn reset_with_target_spread(&mut self, ts_ns: i64, spread: Option<i64>) {
        debug!(
            deriv = self.config.deriv_sec_sid,
            ts_ns,
            target = ?spread,
            "reset learned buckets"
        );
        self.observed.clear();
        self.by_price.clear();
        self.prev_candidate = None;
        self.apply_target_spread(ts_ns, spread);
    }

    /// Clear the learned buckets and re-seed from the last observed point of
    /// `interval`. The theoretical size is computed when missing.
    pub fn reset_and_register(
        &mut self,
        ts_ns: i64,
        interval: Interval,
        last: Option<i64>,
    ) -> Result<(), PricerError> {
        let spread = self.last_unverified_spread;
        self.reset_with_target_spread(ts_ns, spread);
        let last = last.ok_or(PricerError::MissingLastPoint)?;
        let begin = last;
        let end = last + 1;
        let theo = match interval.theo_bucket_size {
            Some(theo) => Some(theo),
            None => self
                .validator
                .bucket_size(&self.greeks, begin, end, interval.price)?
                .map(|info| info.max_bucket_size),
        };
        self.observed
            .insert_unchecked(Interval::new(begin, end, interval.price).with_theo(theo))?;
        self.by_price.insert(interval.price, (begin, end));
        Ok(())
    }

    /// Wipe everything, greeks and spot buffer included.
    pub fn clear(&mut self) {
        self.greeks.clear();
        self.history.clear();
        self.extractor.reset();
        self.observed.clear();
        self.by_price.clear();
        self.prev_candidate = None;
        self.last_deriv_bid = None;
        self.last_deriv_ask = None;
        self.last_deriv_ns = None;
        self.last_deriv_spread = None;
        self.last_unverified_spread = None;
        self.deriv_tight = false;
        self.last_tight = None;
        self.last_und_spot = None;
        self.min_spot_since_reset = None;
        self.max_spot_since_reset = None;
        self.should_register = false;
        self.prev_referred_deriv_ns = None;
        self.received_deriv_tick = false;
        self.validator.set_target_spread(None);
    }

    /// Bucket registered for a derivative price. The theoretical size is not
    /// tracked by the by-price index.
    pub fn interval_by_deriv_price(&self, price: i64) -> Option<Interval> {
        self.by_price
            .get(&price)
            .map(|&(begin, end)| Interval::new(begin, end, price))
    }

    /// Bucket for a derivative price, extrapolated from the nearest learned
    /// bucket when the price itself was never registered.
    pub fn interval_by_deriv_price_extrapolated(&self, price: i64) -> Option<Interval> {
        if let Some(iv) = self.interval_by_deriv_price(price) {
            return Some(iv);
        }
        if !self.greeks.is_ready() {
            return None;
        }
        let mut nearest: Option<Interval> = None;
        for iv in self.observed.iter() {
            let dist = (iv.price - price).abs();
            let better = match &nearest {
                None => true,
                Some(best) => {
                    let best_dist = (best.price - price).abs();
                    dist < best_dist || (dist == best_dist && iv.price < best.price)
                }
            };
            if better {
                nearest = Some(iv);
            }
        }
        let base = nearest?;
        let change = self.validator.und_spot_change(
            base.begin,
            base.end_exclusive,
            base.price,
            price,
            &self.greeks,
        )?;
        Some(Interval::new(
            base.begin + change,
            base.end_exclusive + change,
            price,
        ))
    }

    /// Bucket containing an underlying spot.
    pub fn interval_by_und_spot(&self, spot: i64) -> Option<Interval> {
        self.observed.get(spot)
    }

    /// Bucket containing the spot, else the nearest bucket below.
    pub fn interval_by_und_spot_or_below(&self, spot: i64) -> Option<Interval> {
        self.observed.overlap_or_below(spot)
    }

    /// Bucket containing the spot, else the nearest bucket above.
    pub fn interval_by_und_spot_or_above(&self, spot: i64) -> Option<Interval> {
        self.observed.overlap_or_above(spot)
    }

    // ---- derivative tick internals ----

    fn check_quote_direction(
        &self,
        mm_bid: Option<i64>,
        mm_ask: Option<i64>,
        tight: bool,
    ) -> Violation {
        let Some(tq) = self.last_tight else {
            return Violation::None;
        };
        let mut dir = TickDirection::default();
        match tq.bid.and_then(|bid| self.interval_by_deriv_price_extrapolated(bid)) {
            Some(iv) => {
                if self.min_spot_since_reset.is_some_and(|m| m < iv.begin) {
                    dir.down = true;
                }
                if self.max_spot_since_reset.is_some_and(|m| m >= iv.end_exclusive) {
                    dir.up = true;
                }
            }
            None => {
                // no bucket to compare against: fall back to the spot level
                // at the tight quote, provided spots moved since
                let Some(changed_ns) = self.extractor.last_changed_ns() else {
                    return Violation::None;
                };
                if tq.ts_ns >= changed_ns {
                    return Violation::None;
                }
                let at = tq.und_spot.unwrap_or(i64::MIN);
                if self.min_spot_since_reset.is_some_and(|m| m < at) {
                    dir.down = true;
                }
                if self.max_spot_since_reset.is_some_and(|m| m > at) {
                    dir.up = true;
                }
                for ev in self.history.iter() {
                    if ev.spot < at {
                        dir.down = true;
                    } else if ev.spot > at {
                        dir.up = true;
                    }
                }
            }
        }
        self.validator
            .validate_quote_direction(dir, mm_bid, mm_ask, tight, tq.bid, tq.ask)
    }

    fn apply_deriv_tick(
        &mut self,
        ts_ns: i64,
        mm_bid: Option<i64>,
        mm_ask: Option<i64>,
        spread: Option<i64>,
        tight: bool,
    ) {
        let first = !self.received_deriv_tick;
        self.received_deriv_tick = true;
        if tight {
            let unchanged = mm_bid.is_some()
                && mm_ask.is_some()
                && mm_bid == self.last_deriv_bid
                && mm_ask == self.last_deriv_ask;
            if !first && !unchanged {
                self.clear_observed_spots();
                self.prev_candidate = None;
            }
            self.last_tight = Some(TightQuote {
                bid: mm_bid,
                ask: mm_ask,
                ts_ns,
                und_spot: self.last_und_spot,
            });
            self.should_register = true;
        } else {
            self.should_register = false;
        }
        self.deriv_tight = tight;
        self.last_deriv_bid = mm_bid;
        self.last_deriv_ask = mm_ask;
        self.last_deriv_spread = spread;
        self.last_deriv_ns = Some(ts_ns);
    }

    fn clear_observed_spots(&mut self) {
        trace!(
            deriv = self.config.deriv_sec_sid,
            buffered = self.history.len(),
            "flushing observed underlying spots"
        );
        self.extractor.drain(&mut self.history);
        self.last_tight = None;
        self.min_spot_since_reset = None;
        self.max_spot_since_reset = None;
    }

    fn apply_target_spread(&mut self, ts_ns: i64, spread: Option<i64>) {
        self.validator.set_target_spread(spread);
        self.clear_observed_spots();
        self.should_register = false;
        if spread.is_some() && spread == self.last_deriv_spread {
            // the standing quote is already at the target spread
            self.last_tight = Some(TightQuote {
                bid: self.last_deriv_bid,
                ask: self.last_deriv_ask,
                ts_ns: self.last_deriv_ns.unwrap_or(ts_ns),
                und_spot: self.last_und_spot,
            });
            self.should_register = true;
        }
    }

    // ---- underlying tick internals ----

    fn should_process(&self, ts_ns: i64) -> bool {
        self.prev_referred_deriv_ns != self.last_deriv_ns
            || self
                .extractor
                .earliest_effective_ns()
                .map_or(true, |t| ts_ns >= t)
            || ts_ns
                >= self.extractor.last_changed_ns().unwrap_or(0) + self.config.issuer_max_lag_ns
    }

    /// Size-check then register a candidate bucket. Returns the violation and
    /// the theoretical size that applied.
    fn register_interval(
        &mut self,
        ts_ns: i64,
        begin: i64,
        end: i64,
        price: i64,
        extend_end: bool,
        validate_distance: bool,
        changed: &mut bool,
    ) -> Result<(Violation, Option<i64>), PricerError> {
        let (violation, info) =
            self.validator
                .validate_bucket_size(&self.greeks, begin, end, price, extend_end)?;
        let theo = info.map(|i| i.max_bucket_size);
        let adj_theo = info.map(|i| i.adj_max_bucket_size);
        if violation.is_violation() {
            warn!(
                deriv = self.config.deriv_sec_sid,
                begin, end, price, ?violation, "bucket size check failed"
            );
            return Ok((violation, theo));
        }
        let violation = self.register_with_info(
            ts_ns,
            begin,
            end,
            price,
            theo,
            adj_theo,
            validate_distance,
            changed,
        )?;
        Ok((violation, theo))
    }

    #[allow(clippy::too_many_arguments)]
    fn register_with_info(
        &mut self,
        ts_ns: i64,
        begin: i64,
        end: i64,
        price: i64,
        theo: Option<i64>,
        adj_theo: Option<i64>,
        validate_distance: bool,
        changed: &mut bool,
    ) -> Result<Violation, PricerError> {
        let search = self.observed.search(begin, end);
        match search.overlapping.len() {
            0 => match self.by_price.get(&price).copied() {
                None => {
                    if let Some(below) = &search.below {
                        let v = self.validator.validate_price_consistency(begin, end, price, below);
                        if v.is_violation() {
                            return Ok(v);
                        }
                    }
                    if let Some(above) = &search.above {
                        let v = self.validator.validate_price_consistency(begin, end, price, above);
                        if v.is_violation() {
                            return Ok(v);
                        }
                    }
                    if validate_distance {
                        let v = self.check_distance_against_all(begin, end, price, theo)?;
                        if v.is_violation() {
                            return Ok(v);
                        }
                    }
                    self.observed
                        .insert_unchecked(Interval::new(begin, end, price).with_theo(theo))?;
                    self.by_price.insert(price, (begin, end));
                    *changed = true;
                    debug!(
                        deriv = self.config.deriv_sec_sid,
                        begin, end, price, "registered bucket"
                    );
                    Ok(Violation::None)
                }
                Some((old_begin, old_end)) => self.merge_with_validation(
                    ts_ns, old_begin, old_end, begin, end, price, theo, adj_theo, changed,
                ),
            },
            1 => {
                let overlap = search.overlapping[0];
                if price > overlap.price {
                    Ok(Violation::UpVol)
                } else if price < overlap.price {
                    Ok(Violation::DownVol)
                } else {
                    self.merge_same_price(
                        ts_ns,
                        overlap.begin,
                        overlap.end_exclusive,
                        begin,
                        end,
                        price,
                        theo,
                        adj_theo,
                        changed,
                    )
                }
            }
            _ => self.classify_overlapped(price, &search.overlapping),
        }
    }

    /// Merge a candidate into the bucket the by-price index holds for its
    /// price, when the two ranges do not overlap directly.
    #[allow(clippy::too_many_arguments)]
    fn merge_with_validation(
        &mut self,
        ts_ns: i64,
        old_begin: i64,
        old_end: i64,
        begin: i64,
        end: i64,
        price: i64,
        theo: Option<i64>,
        adj_theo: Option<i64>,
        changed: &mut bool,
    ) -> Result<Violation, PricerError> {
        if end <= old_end {
            if begin >= old_begin {
                // already covered
                return Ok(Violation::None);
            }
            // candidate stretches the begin downward
            let search = self.observed.search(begin, old_end);
            if search.overlapping.len() > 1 {
                return self.classify_overlapped(price, &search.overlapping);
            }
            let v = self.check_distance_against_all(begin, old_end, price, theo)?;
            if v.is_violation() {
                return Ok(v);
            }
            if adj_theo.is_some_and(|adj| old_end - begin > adj) {
                return Ok(self.widening_violation());
            }
            self.observed.set_begin(old_end, begin, theo);
            self.by_price.insert(price, (begin, old_end));
            *changed = true;
            return Ok(Violation::None);
        }
        if begin < old_begin {
            // candidate covers the old bucket entirely
            let search = self.observed.search(begin, end);
            if search.overlapping.len() > 1 {
                return self.classify_overlapped(price, &search.overlapping);
            }
            self.observed.remove_by_end(old_end);
            self.observed
                .insert_unchecked(Interval::new(begin, end, price).with_theo(theo))?;
            self.by_price.insert(price, (begin, end));
            *changed = true;
            return Ok(Violation::None);
        }
        // candidate stretches the end upward: re-run the full registration
        // for the union
        let search = self.observed.search(old_begin, end);
        if search.overlapping.len() > 1 {
            return self.classify_overlapped(price, &search.overlapping);
        }
        self.observed.remove_by_end(old_end);
        self.by_price.remove(&price);
        *changed = true;
        let (v, _) = self.register_interval(ts_ns, old_begin, end, price, true, true, changed)?;
        Ok(v)
    }

    /// Merge a candidate into the single bucket it overlaps, both quoting
    /// the same price.
    #[allow(clippy::too_many_arguments)]
    fn merge_same_price(
        &mut self,
        ts_ns: i64,
        old_begin: i64,
        old_end: i64,
        begin: i64,
        end: i64,
        price: i64,
        theo: Option<i64>,
        adj_theo: Option<i64>,
        changed: &mut bool,
    ) -> Result<Violation, PricerError> {
        if end <= old_end {
            if begin >= old_begin {
                return Ok(Violation::None);
            }
            if adj_theo.is_some_and(|adj| old_end - begin > adj) {
                return Ok(self.widening_violation());
            }
            let v = self.check_distance_against_all(begin, old_end, price, theo)?;
            if v.is_violation() {
                return Ok(v);
            }
            self.observed.set_begin(old_end, begin, theo);
            self.by_price.insert(price, (begin, old_end));
            *changed = true;
            return Ok(Violation::None);
        }
        self.observed.remove_by_end(old_end);
        self.by_price.remove(&price);
        if begin <= old_begin {
            let v = self.check_distance_against_all(begin, end, price, theo)?;
            if v.is_violation() {
                return Ok(v);
            }
            self.observed
                .insert_unchecked(Interval::new(begin, end, price).with_theo(theo))?;
            self.by_price.insert(price, (begin, end));
            *changed = true;
            return Ok(Violation::None);
        }
        let (v, _) = self.register_interval(ts_ns, old_begin, end, price, true, true, changed)?;
        Ok(v)
    }

    /// A bucket widened past its allowance without the derivative moving.
    fn widening_violation(&self) -> Violation {
        match self.config.side {
            OptionSide::Call => Violation::UpVol,
            OptionSide::Put => Violation::DownVol,
        }
    }

    fn classify_overlapped(
        &self,
        price: i64,
        overlapping: &[Interval],
    ) -> Result<Violation, PricerError> {
        let mut below_candidate = false;
        let mut above_candidate = false;
        for iv in [overlapping.first(), overlapping.last()].into_iter().flatten() {
            if price < iv.price {
                above_candidate = true;
            }
            if price > iv.price {
                below_candidate = true;
            }
        }
        match (below_candidate, above_candidate) {
            (true, true) => Ok(Violation::PriceOverlapped),
            (false, true) => Ok(Violation::DownVol),
            (true, false) => Ok(Violation::UpVol),
            (false, false) => Err(PricerError::inconsistent(
                "multiple overlapping buckets share the candidate price",
            )),
        }
    }

    fn check_distance_against_all(
        &self,
        begin: i64,
        end: i64,
        price: i64,
        theo: Option<i64>,
    ) -> Result<Violation, PricerError> {
        for iv in self.observed.iter() {
            let v = self
                .validator
                .validate_bucket_distance(begin, end, price, theo, &iv)?;
            if v.is_violation() {
                warn!(
                    deriv = self.config.deriv_sec_sid,
                    begin,
                    end,
                    price,
                    ref_begin = iv.begin,
                    ref_end = iv.end_exclusive,
                    ref_price = iv.price,
                    ?v,
                    "bucket distance check failed"
                );
                return Ok(v);
            }
        }
        Ok(Violation::None)
    }

    // ---- re-bucketing ----

    /// After a change at `price`, rebuild the buckets for its adjacent
    /// prices from the current hull. Aborts leave the index untouched.
    fn rebucket(&mut self, price: i64) {
        if let Some((set, map)) = self.compute_theo_intervals(price) {
            debug!(
                deriv = self.config.deriv_sec_sid,
                price,
                count = set.len(),
                "rebucketed observed intervals"
            );
            self.observed = set;
            self.by_price = map;
        }
    }

    fn compute_theo_intervals(
        &self,
        current_bid: i64,
    ) -> Option<(IntervalSet, HashMap<i64, (i64, i64)>)> {
        if current_bid - 2 > MAX_REBUCKET_PRICE {
            return None;
        }
        if !self.greeks.is_ready() {
            return None;
        }
        if self.observed.len() <= 1 {
            return None;
        }
        let adjacents = self.validator.adjacent_prices(current_bid);
        if adjacents.is_empty() {
            return None;
        }
        let partial = self.greeks.gamma() * self.config.conversion_ratio;
        let ref_spot6 = self.greeks.ref_spot6();

        // fold the observed buckets: the current price's buckets form the
        // hull, near adjacent buckets record their ranges, anything else is
        // carried over untouched
        let mut min_begin = i64::MAX;
        let mut max_end = i64::MIN;
        let mut current_ranges: [Option<(i64, i64)>; 5] = [None; 5];
        let mut extras: Vec<Interval> = Vec::new();
        let mut cursor = 0usize;
        let mut sufficient = false;
        for iv in self.observed.iter() {
            if iv.price == current_bid {
                min_begin = min_begin.min(iv.begin);
                max_end = max_end.max(iv.end_exclusive);
                continue;
            }
            let matched_at = (cursor..adjacents.len()).find(|&j| adjacents[j] == iv.price);
            let Some(j) = matched_at else {
                extras.push(iv);
                continue;
            };
            cursor = j + 1;
            let dist = (iv.begin - ref_spot6)
                .abs()
                .max((iv.end_exclusive - ref_spot6).abs());
            let near = dist == 0 || ref_spot6 / dist >= MIN_REF_SPOT_DISTANCE_RATIO;
            if !near {
                continue;
            }
            let change = current_bid - iv.price;
            let change_begin = self.validator.und_spot_change_from_delta(
                self.greeks.adj_delta(iv.begin),
                change,
                &self.greeks,
                partial,
            );
            let change_end = self.validator.und_spot_change_from_delta(
                self.greeks.adj_delta(iv.end_exclusive),
                change,
                &self.greeks,
                partial,
            );
            if let (Some(cb), Some(ce)) = (change_begin, change_end) {
                min_begin = min_begin.min(iv.begin + cb);
                max_end = max_end.max(iv.end_exclusive + ce);
            }
            current_ranges[j] = Some((iv.begin, iv.end_exclusive));
            sufficient = true;
        }
        if !sufficient || min_begin == i64::MAX || max_end == i64::MIN {
            return None;
        }

        let adj_delta_begin = self.greeks.adj_delta(min_begin);
        let adj_delta_end = self.greeks.adj_delta(max_end);
        let mut out = IntervalSet::default();
        let mut map = HashMap::new();
        let mut prev_end = i64::MIN;
        let mut hull_begin = i64::MAX;
        let mut hull_end = i64::MIN;
        for (j, &price) in adjacents.iter().enumerate() {
            let change = price - current_bid;
            let cb = self
                .validator
                .und_spot_change_from_delta(adj_delta_begin, change, &self.greeks, partial);
            let ce = self
                .validator
                .und_spot_change_from_delta(adj_delta_end, change, &self.greeks, partial);
            let (computed_begin, computed_end) = match (cb, ce) {
                (Some(cb), Some(ce)) => {
                    let mut b = min_begin + cb;
                    let mut e = max_end + ce;
                    if let Some((cur_b, cur_e)) = current_ranges[j] {
                        b = b.min(cur_b);
                        e = e.max(cur_e);
                    }
                    (b, e)
                }
                // no real solution: keep the observed range or give up
                _ => current_ranges[j]?,
            };
            if computed_begin < prev_end {
                return None;
            }
            prev_end = computed_end;
            hull_begin = hull_begin.min(computed_begin);
            hull_end = hull_end.max(computed_end);
            let theo = self
                .validator
                .bucket_size(&self.greeks, computed_begin, computed_end, price)
                .ok()
                .flatten()
                .map(|info| info.max_bucket_size);
            if computed_begin >= computed_end {
                return None;
            }
            out.insert_unchecked(Interval::new(computed_begin, computed_end, price).with_theo(theo))
                .ok()?;
            map.insert(price, (computed_begin, computed_end));
        }
        for iv in extras {
            if iv.end_exclusive <= hull_begin || iv.begin >= hull_end {
                out.insert_unchecked(iv).ok()?;
                map.insert(iv.price, (iv.begin, iv.end_exclusive));
            } else {
                return None;
            }
        }
        Some((out, map))
    }
}
