//! Historical fill-rate tracking by book conditions.
//!
//! Orders resting in a narrow, deep book fill differently from orders
//! crossing a wide, thin one. This tracker buckets every attempt by
//! (spread, depth) at signal time and exposes the observed fill rate for
//! observability and optional pre-trade gating.

use lag_common::Direction;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Serialize;

use crate::strategy::Signal;

/// Attempts required in a bucket before its rate is trusted.
const MIN_SAMPLES: u64 = 10;

/// Spread classification at signal time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum SpreadBucket {
    /// Under 2 cents.
    Narrow,
    /// 2 to 5 cents.
    Medium,
    /// Over 5 cents.
    Wide,
}

impl SpreadBucket {
    pub fn classify(spread: Decimal) -> Self {
        if spread < dec!(0.02) {
            SpreadBucket::Narrow
        } else if spread <= dec!(0.05) {
            SpreadBucket::Medium
        } else {
            SpreadBucket::Wide
        }
    }
}

/// Available-liquidity classification at signal time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum DepthBucket {
    /// Under $20 resting.
    Thin,
    /// $20 to $100.
    Ok,
    /// Over $100.
    Deep,
}

impl DepthBucket {
    pub fn classify(depth: Decimal) -> Self {
        if depth < dec!(20) {
            DepthBucket::Thin
        } else if depth <= dec!(100) {
            DepthBucket::Ok
        } else {
            DepthBucket::Deep
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize)]
struct Bucket {
    total: u64,
    filled: u64,
}

/// 3x3 grid of fill counters.
#[derive(Debug, Clone, Default, Serialize)]
pub struct FillTracker {
    buckets: [[Bucket; 3]; 3],
}

impl FillTracker {
    pub fn new() -> Self {
        Self::default()
    }

    fn index(signal: &Signal) -> (usize, usize) {
        // The entry crosses toward the far touch; twice the distance from
        // the side mid approximates the quoted spread.
        let side_mid = match signal.direction {
            Direction::BuyYes => signal.contract_price,
            Direction::BuyNo => Decimal::ONE - signal.contract_price,
        };
        let spread = (signal.entry_price - side_mid).abs() * Decimal::TWO;
        let s = match SpreadBucket::classify(spread) {
            SpreadBucket::Narrow => 0,
            SpreadBucket::Medium => 1,
            SpreadBucket::Wide => 2,
        };
        let d = match DepthBucket::classify(signal.available_liquidity) {
            DepthBucket::Thin => 0,
            DepthBucket::Ok => 1,
            DepthBucket::Deep => 2,
        };
        (s, d)
    }

    /// Record an entry attempt. `filled` covers full and partial fills.
    pub fn record(&mut self, signal: &Signal, filled: bool) {
        let (s, d) = Self::index(signal);
        let bucket = &mut self.buckets[s][d];
        bucket.total += 1;
        if filled {
            bucket.filled += 1;
        }
    }

    /// Estimated fill probability for a prospective signal.
    ///
    /// Optimistic (1.0) until the bucket has enough history to judge.
    pub fn fill_probability(&self, signal: &Signal) -> f64 {
        let (s, d) = Self::index(signal);
        let bucket = &self.buckets[s][d];
        if bucket.total < MIN_SAMPLES {
            1.0
        } else {
            bucket.filled as f64 / bucket.total as f64
        }
    }

    /// Total attempts recorded across all buckets.
    pub fn total_attempts(&self) -> u64 {
        self.buckets
            .iter()
            .flatten()
            .map(|b| b.total)
            .sum()
    }
}
