//! Ordered index of non-overlapping spot intervals, keyed by exclusive end.

use std::collections::BTreeMap;
use std::ops::Bound::{Excluded, Unbounded};

use smallvec::SmallVec;

use crate::errors::PricerError;
use crate::interval::Interval;

#[derive(Debug, Clone, Copy)]
struct Slot {
    begin: i64,
    price: i64,
    theo: Option<i64>,
}

/// Neighborhood of a candidate range: the overlapping run plus the nearest
/// non-overlapping intervals on each side.
#[derive(Debug, Default)]
pub(crate) struct RangeSearch {
    pub(crate) below: Option<Interval>,
    pub(crate) above: Option<Interval>,
    pub(crate) overlapping: SmallVec<[Interval; 8]>,
}

/// Non-overlapping intervals ordered by exclusive end.
#[derive(Debug, Clone, Default)]
pub(crate) struct IntervalSet {
    map: BTreeMap<i64, Slot>,
}

impl IntervalSet {
    #[inline]
    fn to_interval(end: i64, slot: &Slot) -> Interval {
        Interval {
            begin: slot.begin,
            end_exclusive: end,
            price: slot.price,
            theo_bucket_size: slot.theo,
        }
    }

    #[inline]
    pub(crate) fn len(&self) -> usize {
        self.map.len()
    }

    #[inline]
    pub(crate) fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    pub(crate) fn clear(&mut self) {
        self.map.clear();
    }

    /// Insert when the range does not overlap any existing interval.
    /// Returns false when it does.
    pub(crate) fn insert(&mut self, iv: Interval) -> Result<bool, PricerError> {
        if iv.begin >= iv.end_exclusive {
            return Err(PricerError::invalid_interval(iv.begin, iv.end_exclusive));
        }
        if self.overlaps_any(iv.begin, iv.end_exclusive) {
            return Ok(false);
        }
        self.map.insert(
            iv.end_exclusive,
            Slot {
                begin: iv.begin,
                price: iv.price,
                theo: iv.theo_bucket_size,
            },
        );
        Ok(true)
    }

    /// Insert without checking for overlap. Bounds are still validated.
    pub(crate) fn insert_unchecked(&mut self, iv: Interval) -> Result<(), PricerError> {
        if iv.begin >= iv.end_exclusive {
            return Err(PricerError::invalid_interval(iv.begin, iv.end_exclusive));
        }
        self.map.insert(
            iv.end_exclusive,
            Slot {
                begin: iv.begin,
                price: iv.price,
                theo: iv.theo_bucket_size,
            },
        );
        Ok(())
    }

    pub(crate) fn overlaps_any(&self, begin: i64, end: i64) -> bool {
        self.map
            .range((Excluded(begin), Unbounded))
            .next()
            .is_some_and(|(_, s)| s.begin < end)
    }

    /// Interval containing `spot`, if any.
    pub(crate) fn get(&self, spot: i64) -> Option<Interval> {
        let (&end, slot) = self.map.range((Excluded(spot), Unbounded)).next()?;
        (slot.begin <= spot).then(|| Self::to_interval(end, slot))
    }

    /// Interval containing `spot`, else the nearest interval entirely below.
    pub(crate) fn overlap_or_below(&self, spot: i64) -> Option<Interval> {
        if let Some(iv) = self.get(spot) {
            return Some(iv);
        }
        self.map
            .range(..=spot)
            .next_back()
            .map(|(&end, slot)| Self::to_interval(end, slot))
    }

    /// Interval containing `spot`, else the nearest interval entirely above.
    pub(crate) fn overlap_or_above(&self, spot: i64) -> Option<Interval> {
        self.map
            .range((Excluded(spot), Unbounded))
            .next()
            .map(|(&end, slot)| Self::to_interval(end, slot))
    }

    /// Overlapping run for `[begin, end)` and the nearest non-overlapping
    /// neighbors on each side.
    pub(crate) fn search(&self, begin: i64, end: i64) -> RangeSearch {
        let mut out = RangeSearch {
            below: self
                .map
                .range(..=begin)
                .next_back()
                .map(|(&e, s)| Self::to_interval(e, s)),
            ..RangeSearch::default()
        };
        for (&e, s) in self.map.range((Excluded(begin), Unbounded)) {
            if s.begin < end {
                out.overlapping.push(Self::to_interval(e, s));
            } else {
                out.above = Some(Self::to_interval(e, s));
                break;
            }
        }
        out
    }

    pub(crate) fn remove_by_end(&mut self, end: i64) -> Option<Interval> {
        self.map
            .remove(&end)
            .map(|slot| Self::to_interval(end, &slot))
    }

    /// Move the begin of the interval ending at `end`, updating its
    /// theoretical size. Returns false when no such interval exists.
    pub(crate) fn set_begin(&mut self, end: i64, new_begin: i64, theo: Option<i64>) -> bool {
        match self.map.get_mut(&end) {
            Some(slot) => {
                slot.begin = new_begin;
                slot.theo = theo;
                true
            }
            None => false,
        }
    }

    pub(crate) fn first(&self) -> Option<Interval> {
        self.map
            .iter()
            .next()
            .map(|(&e, s)| Self::to_interval(e, s))
    }

    pub(crate) fn last(&self) -> Option<Interval> {
        self.map
            .iter()
            .next_back()
            .map(|(&e, s)| Self::to_interval(e, s))
    }

    /// Ascending by end.
    pub(crate) fn iter(&self) -> impl Iterator<Item = Interval> + '_ {
        self.map.iter().map(|(&e, s)| Self::to_interval(e, s))
    }

    /// Ascending over intervals with `end_exclusive >= end_min`.
    pub(crate) fn iter_end_from(&self, end_min: i64) -> impl Iterator<Item = Interval> + '_ {
        self.map
            .range(end_min..)
            .map(|(&e, s)| Self::to_interval(e, s))
    }

    /// Descending over intervals with `end_exclusive <= end_max`.
    pub(crate) fn iter_end_to_desc(&self, end_max: i64) -> impl Iterator<Item = Interval> + '_ {
        self.map
            .range(..=end_max)
            .rev()
            .map(|(&e, s)| Self::to_interval(e, s))
    }
}
