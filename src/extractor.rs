//! Hysteresis over buffered underlying spots.
//!
//! Issuers reprice with a lag. A spot observation only counts toward a
//! price bucket once it has stayed unchanged for at least that lag while
//! the derivative spread was tight, so extraction runs over a buffer of
//! timestamped spots and commits the previous spot level when the next
//! event proves it held long enough.

use std::collections::VecDeque;

use crate::errors::PricerError;

/// One buffered underlying spot observation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct TimedSpot {
    pub(crate) ts_ns: i64,
    pub(crate) spot: i64,
    pub(crate) tight: bool,
}

/// Bounded FIFO of spot observations.
#[derive(Debug, Clone)]
pub(crate) struct SpotHistory {
    buf: VecDeque<TimedSpot>,
    capacity: usize,
}

impl SpotHistory {
    pub(crate) fn new(capacity: usize) -> Self {
        SpotHistory {
            buf: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub(crate) fn push(&mut self, ev: TimedSpot) -> Result<(), PricerError> {
        if self.buf.len() >= self.capacity {
            return Err(PricerError::SpotBufferFull {
                capacity: self.capacity,
            });
        }
        self.buf.push_back(ev);
        Ok(())
    }

    #[inline]
    pub(crate) fn front(&self) -> Option<&TimedSpot> {
        self.buf.front()
    }

    #[inline]
    pub(crate) fn pop_front(&mut self) -> Option<TimedSpot> {
        self.buf.pop_front()
    }

    #[inline]
    pub(crate) fn len(&self) -> usize {
        self.buf.len()
    }

    #[inline]
    pub(crate) fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub(crate) fn clear(&mut self) {
        self.buf.clear();
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = &TimedSpot> {
        self.buf.iter()
    }
}

/// Candidate interval accumulated by one extraction pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct ExtractedInterval {
    /// Half-open spot range, None until a point is committed
    pub(crate) range: Option<(i64, i64)>,
    /// Derivative bid the range is attributed to
    pub(crate) price: Option<i64>,
    /// Most recently committed spot level
    pub(crate) last: Option<i64>,
}

impl ExtractedInterval {
    #[inline]
    pub(crate) fn has_valid_range(&self) -> bool {
        self.range.is_some()
    }

    /// Same bucket as another extraction, ignoring the committed point.
    pub(crate) fn same_bucket(&self, other: &ExtractedInterval) -> bool {
        self.range == other.range && self.price == other.price
    }
}

/// Stateful extractor over a [`SpotHistory`].
#[derive(Debug, Clone)]
pub(crate) struct SpotExtractor {
    expected_lag_ns: i64,
    last_spot: Option<i64>,
    last_tight: bool,
    last_changed_ns: Option<i64>,
    earliest_effective_ns: Option<i64>,
}

impl SpotExtractor {
    pub(crate) fn new(expected_lag_ns: i64) -> Self {
        SpotExtractor {
            expected_lag_ns,
            last_spot: None,
            last_tight: false,
            last_changed_ns: None,
            earliest_effective_ns: None,
        }
    }

    #[inline]
    pub(crate) fn last_spot(&self) -> Option<i64> {
        self.last_spot
    }

    #[inline]
    pub(crate) fn last_changed_ns(&self) -> Option<i64> {
        self.last_changed_ns
    }

    /// Time at which the youngest still-buffered event matures, set by the
    /// extraction pass that left it behind.
    #[inline]
    pub(crate) fn earliest_effective_ns(&self) -> Option<i64> {
        self.earliest_effective_ns
    }

    /// Run one extraction pass. Events older than `now - lag` are consumed;
    /// the first younger event has its side effects applied but stays
    /// buffered so a later pass can commit it once it matures.
    ///
    /// `price` attributes the candidate to a derivative bid; only events
    /// strictly after `price_ts_ns` count toward it.
    pub(crate) fn extract(
        &mut self,
        history: &mut SpotHistory,
        now_ns: i64,
        price: Option<i64>,
        price_ts_ns: Option<i64>,
    ) -> ExtractedInterval {
        let cutoff_ns = now_ns - self.expected_lag_ns;
        self.earliest_effective_ns = None;
        let mut out = ExtractedInterval {
            price,
            ..ExtractedInterval::default()
        };
        while let Some(&ev) = history.front() {
            self.accumulate(&mut out, &ev, price_ts_ns);
            self.absorb(&ev);
            if ev.ts_ns >= cutoff_ns {
                self.earliest_effective_ns = Some(ev.ts_ns + self.expected_lag_ns);
                break;
            }
            history.pop_front();
        }
        out
    }

    /// Commit the previous spot level if `ev` proves it held for the lag.
    fn accumulate(&self, out: &mut ExtractedInterval, ev: &TimedSpot, price_ts_ns: Option<i64>) {
        let (Some(changed_ns), Some(last)) = (self.last_changed_ns, self.last_spot) else {
            return;
        };
        if !self.last_tight {
            return;
        }
        if price_ts_ns.is_some_and(|t| ev.ts_ns <= t) {
            return;
        }
        if ev.ts_ns - changed_ns < self.expected_lag_ns {
            return;
        }
        match &mut out.range {
            None => out.range = Some((last, last + 1)),
            Some((begin, end)) => {
                if last < *begin {
                    *begin = last;
                }
                if last >= *end {
                    *end = last + 1;
                }
            }
        }
        out.last = Some(last);
    }

    /// Track the level, change time and tightness of the latest event.
    pub(crate) fn absorb(&mut self, ev: &TimedSpot) {
        if self.last_spot != Some(ev.spot) {
            self.last_changed_ns = Some(ev.ts_ns);
        }
        self.last_spot = Some(ev.spot);
        self.last_tight = ev.tight;
    }

    /// Flush the whole buffer through level tracking only.
    pub(crate) fn drain(&mut self, history: &mut SpotHistory) {
        while let Some(ev) = history.pop_front() {
            self.absorb(&ev);
        }
    }

    pub(crate) fn reset(&mut self) {
        self.last_spot = None;
        self.last_tight = false;
        self.last_changed_ns = None;
        self.earliest_effective_ns = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LAG: i64 = 100;

    fn ev(ts_ns: i64, spot: i64) -> TimedSpot {
        TimedSpot {
            ts_ns,
            spot,
            tight: true,
        }
    }

    #[test]
    fn test_push_fails_when_full() {
        let mut h = SpotHistory::new(2);
        h.push(ev(1, 10)).unwrap();
        h.push(ev(2, 11)).unwrap();
        assert!(matches!(
            h.push(ev(3, 12)),
            Err(PricerError::SpotBufferFull { capacity: 2 })
        ));
    }

    #[test]
    fn test_young_event_stays_buffered() {
        let mut h = SpotHistory::new(8);
        let mut x = SpotExtractor::new(LAG);
        h.push(ev(1000, 50)).unwrap();
        let out = x.extract(&mut h, 1000, Some(99), None);
        assert!(!out.has_valid_range());
        assert_eq!(h.len(), 1);
        assert_eq!(x.last_spot(), Some(50));
        assert_eq!(x.earliest_effective_ns(), Some(1100));
    }

    #[test]
    fn test_commits_level_held_for_lag() {
        let mut h = SpotHistory::new(8);
        let mut x = SpotExtractor::new(LAG);
        h.push(ev(1000, 50)).unwrap();
        x.extract(&mut h, 1000, Some(99), None);
        h.push(ev(1200, 51)).unwrap();
        let out = x.extract(&mut h, 1200, Some(99), None);
        // the 50 level held from 1000 to 1200, past the lag
        assert_eq!(out.range, Some((50, 51)));
        assert_eq!(out.last, Some(50));
        assert_eq!(out.price, Some(99));
        // the newest event stays for the next pass
        assert_eq!(h.len(), 1);
        assert_eq!(x.last_changed_ns(), Some(1200));
    }

    #[test]
    fn test_flickering_level_never_commits() {
        let mut h = SpotHistory::new(8);
        let mut x = SpotExtractor::new(LAG);
        h.push(ev(1000, 50)).unwrap();
        x.extract(&mut h, 1000, None, None);
        h.push(ev(1050, 51)).unwrap();
        h.push(ev(1090, 50)).unwrap();
        let out = x.extract(&mut h, 1300, None, None);
        assert!(!out.has_valid_range());
    }

    #[test]
    fn test_wide_level_extends_range() {
        let mut h = SpotHistory::new(8);
        let mut x = SpotExtractor::new(LAG);
        h.push(ev(1000, 50)).unwrap();
        h.push(ev(1200, 55)).unwrap();
        h.push(ev(1400, 54)).unwrap();
        let out = x.extract(&mut h, 1400, None, None);
        // 50 then 55 both held long enough within one pass
        assert_eq!(out.range, Some((50, 56)));
        assert_eq!(out.last, Some(55));
        assert_eq!(h.len(), 1);
    }

    #[test]
    fn test_non_tight_events_do_not_commit() {
        let mut h = SpotHistory::new(8);
        let mut x = SpotExtractor::new(LAG);
        h.push(TimedSpot {
            ts_ns: 1000,
            spot: 50,
            tight: false,
        })
        .unwrap();
        x.extract(&mut h, 1000, None, None);
        h.push(ev(1200, 51)).unwrap();
        let out = x.extract(&mut h, 1200, None, None);
        assert!(!out.has_valid_range());
    }

    #[test]
    fn test_events_before_deriv_tick_do_not_commit() {
        let mut h = SpotHistory::new(8);
        let mut x = SpotExtractor::new(LAG);
        h.push(ev(1000, 50)).unwrap();
        x.extract(&mut h, 1000, Some(99), None);
        h.push(ev(1200, 51)).unwrap();
        // derivative tick at 1500 postdates both events
        let out = x.extract(&mut h, 1200, Some(99), Some(1500));
        assert!(!out.has_valid_range());
    }

    #[test]
    fn test_drain_updates_level_only() {
        let mut h = SpotHistory::new(8);
        let mut x = SpotExtractor::new(LAG);
        h.push(ev(1000, 50)).unwrap();
        h.push(ev(1200, 51)).unwrap();
        x.drain(&mut h);
        assert!(h.is_empty());
        assert_eq!(x.last_spot(), Some(51));
        assert_eq!(x.last_changed_ns(), Some(1200));
    }
}
