//! Fill-confirmation types and execution counters.

use std::sync::atomic::{AtomicU64, Ordering};

use rust_decimal::Decimal;
use serde::Serialize;

/// Terminal outcome of a fill-confirmation poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FillStatus {
    /// Fully filled.
    Matched,
    /// Some quantity filled; the remainder was or will be cancelled.
    Partial,
    /// Cancelled with no detectable fills.
    Cancelled,
    /// Deadline expired with no detectable fills.
    Timeout,
}

/// Result of waiting for an order to fill.
#[derive(Debug, Clone)]
pub struct FillResult {
    pub status: FillStatus,
    /// Average fill price when the venue reported one.
    pub avg_price: Option<Decimal>,
    /// Confirmed quantity, clamped to `[0, requested]`.
    pub filled_qty: Decimal,
}

impl FillResult {
    pub fn matched(filled_qty: Decimal, avg_price: Option<Decimal>) -> Self {
        Self {
            status: FillStatus::Matched,
            avg_price,
            filled_qty,
        }
    }

    pub fn partial(filled_qty: Decimal, avg_price: Option<Decimal>) -> Self {
        Self {
            status: FillStatus::Partial,
            avg_price,
            filled_qty,
        }
    }

    pub fn cancelled() -> Self {
        Self {
            status: FillStatus::Cancelled,
            avg_price: None,
            filled_qty: Decimal::ZERO,
        }
    }

    pub fn timeout() -> Self {
        Self {
            status: FillStatus::Timeout,
            avg_price: None,
            filled_qty: Decimal::ZERO,
        }
    }

    /// Whether any quantity actually filled.
    pub fn any_fill(&self) -> bool {
        self.filled_qty > Decimal::ZERO
    }
}

/// Lock-free entry-outcome counters.
#[derive(Debug, Default)]
pub struct FillRateStats {
    pub attempted: AtomicU64,
    pub filled: AtomicU64,
    pub partial: AtomicU64,
    pub cancelled: AtomicU64,
    pub failed: AtomicU64,
}

/// Point-in-time copy of the counters.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct FillRateSnapshot {
    pub attempted: u64,
    pub filled: u64,
    pub partial: u64,
    pub cancelled: u64,
    pub failed: u64,
}

impl FillRateStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> FillRateSnapshot {
        FillRateSnapshot {
            attempted: self.attempted.load(Ordering::Relaxed),
            filled: self.filled.load(Ordering::Relaxed),
            partial: self.partial.load(Ordering::Relaxed),
            cancelled: self.cancelled.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
        }
    }
}

impl FillRateSnapshot {
    /// Share of attempts with at least a partial fill.
    pub fn fill_rate(&self) -> f64 {
        if self.attempted == 0 {
            return 0.0;
        }
        (self.filled + self.partial) as f64 / self.attempted as f64
    }
}
