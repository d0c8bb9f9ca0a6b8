//! Trade entity and lifecycle events.
//!
//! A `Trade` is born in `Executor::execute` on a confirmed non-zero fill,
//! monitored until an exit commits, and destroyed in the close bookkeeping.
//! Execution state lives here; the capital accounting for the same id lives
//! in the risk manager's ledger.

use chrono::{DateTime, Utc};
use lag_common::Direction;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::strategy::Signal;

/// Trade lifecycle status.
///
/// `Closing` flags an exit in flight so the concurrent monitor and safety
/// timers cannot both drive one; `Closed` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TradeStatus {
    Open,
    Closing,
    Closed,
}

impl std::fmt::Display for TradeStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TradeStatus::Open => write!(f, "OPEN"),
            TradeStatus::Closing => write!(f, "CLOSING"),
            TradeStatus::Closed => write!(f, "CLOSED"),
        }
    }
}

/// Why a position was (or is being) exited.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExitReason {
    MaxHoldTime,
    ProfitTarget,
    StopLoss,
    EdgeCollapsed,
    CertaintyExpiry,
    ForceExit,
    ForceExitUnconfirmed,
    Shutdown,
    RotationCancel,
}

impl ExitReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExitReason::MaxHoldTime => "MAX_HOLD_TIME",
            ExitReason::ProfitTarget => "PROFIT_TARGET",
            ExitReason::StopLoss => "STOP_LOSS",
            ExitReason::EdgeCollapsed => "EDGE_COLLAPSED",
            ExitReason::CertaintyExpiry => "CERTAINTY_EXPIRY",
            ExitReason::ForceExit => "FORCE_EXIT",
            ExitReason::ForceExitUnconfirmed => "FORCE_EXIT_UNCONFIRMED",
            ExitReason::Shutdown => "SHUTDOWN",
            ExitReason::RotationCancel => "ROTATION_CANCEL",
        }
    }

    /// Reason recorded when partial exits drained the position to zero.
    pub fn partial_exhausted(&self) -> String {
        format!("{}_PARTIAL_EXHAUSTED", self.as_str())
    }
}

impl std::fmt::Display for ExitReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Adverse-selection checkpoint: how the market moved against the position
/// shortly after entry.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct AdverseCheckpoint {
    /// Age of the trade when sampled (seconds).
    pub age_secs: u64,
    pub mid: Decimal,
    /// Mid move since entry.
    pub mid_move: Decimal,
    /// Unrealized P&L as a fraction of position size.
    pub pnl_pct: Decimal,
}

/// An open (or just-closed) position.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Trade {
    /// Exchange order id of the entry order.
    pub id: String,
    /// Immutable snapshot of the signal that opened this trade.
    pub signal: Signal,
    pub direction: Direction,
    pub status: TradeStatus,
    /// Confirmed entry fill price.
    pub entry_price: Decimal,
    /// Remaining tokens held; decremented by partial exits.
    pub token_qty: Decimal,
    /// Remaining committed capital; always `token_qty * entry_price`.
    pub size: Decimal,
    /// Capital at open; never mutated, used for %-of-original reporting.
    pub initial_size: Decimal,
    pub open_time: DateTime<Utc>,
    /// Last observed mid of the held token.
    pub current_mid: Decimal,
    pub unrealized_pnl: Decimal,
    /// P&L already banked through partial exits.
    pub realized_pnl: Decimal,
    /// Total P&L, set once at close.
    pub pnl: Option<Decimal>,
    pub exit_price: Option<Decimal>,
    pub exit_time: Option<DateTime<Utc>>,
    pub exit_reason: Option<String>,
    pub hold_time_ms: Option<i64>,
    /// True when the close was booked at mark without a confirmed fill.
    pub estimated_exit: bool,
    #[serde(default)]
    pub checkpoints: Vec<AdverseCheckpoint>,
}

impl Trade {
    /// Construct a freshly opened trade from a confirmed entry fill.
    pub fn open(id: String, signal: Signal, entry_price: Decimal, token_qty: Decimal) -> Self {
        let size = token_qty * entry_price;
        Self {
            id,
            direction: signal.direction,
            signal,
            status: TradeStatus::Open,
            entry_price,
            token_qty,
            size,
            initial_size: size,
            open_time: Utc::now(),
            current_mid: Decimal::ZERO,
            unrealized_pnl: Decimal::ZERO,
            realized_pnl: Decimal::ZERO,
            pnl: None,
            exit_price: None,
            exit_time: None,
            exit_reason: None,
            hold_time_ms: None,
            estimated_exit: false,
            checkpoints: Vec::new(),
        }
    }

    /// Mark used for estimated closes: last observed mid, falling back to
    /// the entry price when no mark has been seen yet.
    pub fn mark_or_entry(&self) -> Decimal {
        if self.current_mid > Decimal::ZERO {
            self.current_mid
        } else {
            self.entry_price
        }
    }
}

/// Serializable view of an open trade for crash recovery.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradeSnapshot {
    pub id: String,
    pub entry_price: Decimal,
    /// Absent in snapshots written by older builds; derived from
    /// `size / entry_price` on restore.
    #[serde(default)]
    pub token_qty: Option<Decimal>,
    pub size: Decimal,
    pub open_time: DateTime<Utc>,
    pub signal: Signal,
    pub order_status: String,
}

impl TradeSnapshot {
    pub fn of(trade: &Trade) -> Self {
        Self {
            id: trade.id.clone(),
            entry_price: trade.entry_price,
            token_qty: Some(trade.token_qty),
            size: trade.size,
            open_time: trade.open_time,
            signal: trade.signal.clone(),
            order_status: trade.status.to_string(),
        }
    }

    /// Token quantity, deriving it for old snapshots that lack the field.
    pub fn effective_token_qty(&self) -> Decimal {
        match self.token_qty {
            Some(qty) => qty,
            None if self.entry_price > Decimal::ZERO => self.size / self.entry_price,
            None => Decimal::ZERO,
        }
    }
}

/// Lifecycle events published by the executor.
#[derive(Debug, Clone)]
pub enum TradeEvent {
    Open(Box<Trade>),
    PartialClose {
        trade: Box<Trade>,
        filled_qty: Decimal,
        exit_price: Decimal,
        realized_pnl: Decimal,
    },
    Close(Box<Trade>),
    RotationCancel(Box<Trade>),
    ExpiredOnRestore {
        id: String,
        label: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use lag_common::WindowDuration;
    use rust_decimal_macros::dec;

    fn test_signal() -> Signal {
        Signal {
            token_id: "tok-yes".into(),
            direction: Direction::BuyYes,
            entry_price: dec!(0.55),
            size: dec!(5.50),
            edge: 0.08,
            model_prob: 0.63,
            contract_price: dec!(0.55),
            spot_price: dec!(100000),
            strike_price: dec!(99900),
            feed_lag_ms: 2_000,
            available_liquidity: dec!(100),
            hours_to_expiry: 0.05,
            label: format!("BTC/{}", WindowDuration::FiveMin),
            is_certainty: false,
            expires_at: None,
        }
    }

    #[test]
    fn test_trade_open_invariants() {
        let trade = Trade::open("ord-1".into(), test_signal(), dec!(0.57), dec!(10));
        assert_eq!(trade.status, TradeStatus::Open);
        assert_eq!(trade.size, dec!(5.70));
        assert_eq!(trade.initial_size, dec!(5.70));
        assert_eq!(trade.size, trade.token_qty * trade.entry_price);
        assert_eq!(trade.realized_pnl, Decimal::ZERO);
        assert!(trade.pnl.is_none());
        assert!(!trade.estimated_exit);
    }

    #[test]
    fn test_mark_or_entry_fallback() {
        let mut trade = Trade::open("ord-1".into(), test_signal(), dec!(0.55), dec!(10));
        assert_eq!(trade.mark_or_entry(), dec!(0.55));
        trade.current_mid = dec!(0.61);
        assert_eq!(trade.mark_or_entry(), dec!(0.61));
    }

    #[test]
    fn test_exit_reason_strings() {
        assert_eq!(ExitReason::MaxHoldTime.as_str(), "MAX_HOLD_TIME");
        assert_eq!(ExitReason::ForceExitUnconfirmed.as_str(), "FORCE_EXIT_UNCONFIRMED");
        assert_eq!(
            ExitReason::ProfitTarget.partial_exhausted(),
            "PROFIT_TARGET_PARTIAL_EXHAUSTED"
        );
    }

    #[test]
    fn test_snapshot_roundtrip() {
        let trade = Trade::open("ord-1".into(), test_signal(), dec!(0.55), dec!(10));
        let snap = TradeSnapshot::of(&trade);
        assert_eq!(snap.effective_token_qty(), dec!(10));

        let json = serde_json::to_string(&snap).unwrap();
        let parsed: TradeSnapshot = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.id, "ord-1");
        assert_eq!(parsed.effective_token_qty(), dec!(10));
    }

    #[test]
    fn test_snapshot_back_compat_derives_qty() {
        // Older builds did not write token_qty.
        let json = serde_json::json!({
            "id": "ord-2",
            "entry_price": "0.50",
            "size": "5.0",
            "open_time": "2026-07-01T00:00:00Z",
            "signal": test_signal(),
            "order_status": "OPEN",
        });
        let snap: TradeSnapshot = serde_json::from_value(json).unwrap();
        assert_eq!(snap.token_qty, None);
        assert_eq!(snap.effective_token_qty(), dec!(10));
    }
}
