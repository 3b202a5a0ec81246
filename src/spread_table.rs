//! Tick grid for derivative prices.
//!
//! A spread table is an ordered list of contiguous price bands, each with a
//! fixed tick size. Tick numbering starts at 1 at the first band's lower
//! bound, so arithmetic on tick numbers is exact across band boundaries.

use serde::{Deserialize, Serialize};

use crate::errors::PricerError;

/// One price band of a spread table. `from` is inclusive, `to` exclusive
/// except for the last band where `to` is the top of the grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpreadBand {
    pub from: i64,
    pub to: i64,
    pub spread: i64,
}

/// Price-to-tick conversion table.
#[derive(Debug, Clone)]
pub struct SpreadTable {
    bands: Vec<SpreadBand>,
    start_ticks: Vec<i64>,
    max_tick: i64,
}

impl SpreadTable {
    /// Build a table from bands, validating contiguity and divisibility.
    pub fn new(bands: Vec<SpreadBand>) -> Result<Self, PricerError> {
        if bands.is_empty() {
            return Err(PricerError::InvalidSpreadTable("no bands".to_string()));
        }
        for (i, b) in bands.iter().enumerate() {
            if b.spread <= 0 {
                return Err(PricerError::InvalidSpreadTable(format!(
                    "band {i} has non-positive spread {}",
                    b.spread
                )));
            }
            if b.from >= b.to {
                return Err(PricerError::InvalidSpreadTable(format!(
                    "band {i} has empty range [{}, {})",
                    b.from, b.to
                )));
            }
            if (b.to - b.from) % b.spread != 0 {
                return Err(PricerError::InvalidSpreadTable(format!(
                    "band {i} range [{}, {}) is not a multiple of spread {}",
                    b.from, b.to, b.spread
                )));
            }
            if i > 0 && bands[i - 1].to != b.from {
                return Err(PricerError::InvalidSpreadTable(format!(
                    "band {i} starts at {} but the previous band ends at {}",
                    b.from,
                    bands[i - 1].to
                )));
            }
        }
        Ok(Self::from_valid_bands(bands))
    }

    fn from_valid_bands(bands: Vec<SpreadBand>) -> Self {
        let mut start_ticks = Vec::with_capacity(bands.len());
        let mut tick = 1;
        for b in &bands {
            start_ticks.push(tick);
            tick += (b.to - b.from) / b.spread;
        }
        SpreadTable {
            bands,
            start_ticks,
            max_tick: tick,
        }
    }

    /// HKEX warrant tick schedule, prices with 3 decimal places.
    pub fn hkex_warrant() -> Self {
        Self::from_valid_bands(vec![
            SpreadBand { from: 10, to: 250, spread: 1 },
            SpreadBand { from: 250, to: 500, spread: 5 },
            SpreadBand { from: 500, to: 10_000, spread: 10 },
            SpreadBand { from: 10_000, to: 20_000, spread: 20 },
            SpreadBand { from: 20_000, to: 100_000, spread: 50 },
            SpreadBand { from: 100_000, to: 200_000, spread: 100 },
            SpreadBand { from: 200_000, to: 500_000, spread: 200 },
            SpreadBand { from: 500_000, to: 1_000_000, spread: 500 },
            SpreadBand { from: 1_000_000, to: 2_000_000, spread: 1_000 },
            SpreadBand { from: 2_000_000, to: 5_000_000, spread: 2_000 },
            SpreadBand { from: 5_000_000, to: 9_995_000, spread: 5_000 },
        ])
    }

    #[inline]
    pub fn min_price(&self) -> i64 {
        self.bands[0].from
    }

    #[inline]
    pub fn max_price(&self) -> i64 {
        self.bands[self.bands.len() - 1].to
    }

    fn band_index(&self, price: i64) -> Result<usize, PricerError> {
        if price < self.min_price() || price > self.max_price() {
            return Err(PricerError::PriceOutOfRange { price });
        }
        // partition_point returns the count of bands starting at or below price
        let idx = self.bands.partition_point(|b| b.from <= price);
        Ok(idx.saturating_sub(1).min(self.bands.len() - 1))
    }

    /// Tick number of a price, flooring off-grid prices.
    pub fn price_to_tick(&self, price: i64) -> Result<i64, PricerError> {
        let idx = self.band_index(price)?;
        let b = self.bands[idx];
        Ok(self.start_ticks[idx] + (price - b.from) / b.spread)
    }

    /// Price at a tick number.
    pub fn tick_to_price(&self, tick: i64) -> Result<i64, PricerError> {
        if tick < 1 || tick > self.max_tick {
            return Err(PricerError::TickOutOfRange { tick });
        }
        let idx = self
            .start_ticks
            .partition_point(|&t| t <= tick)
            .saturating_sub(1);
        let b = self.bands[idx];
        Ok(b.from + (tick - self.start_ticks[idx]) * b.spread)
    }

    /// Tick size in force at a price.
    pub fn tick_size_at(&self, price: i64) -> Result<i64, PricerError> {
        Ok(self.bands[self.band_index(price)?].spread)
    }

    /// Quoted spread expressed in ticks.
    pub fn spread_in_ticks(&self, bid: i64, ask: i64) -> Result<i64, PricerError> {
        Ok(self.price_to_tick(ask)? - self.price_to_tick(bid)?)
    }
}
