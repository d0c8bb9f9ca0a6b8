//! Risk management: bankroll ledger, pre-trade gates, kill switches.
//!
//! The `RiskManager` is the single source of truth for capital. Every
//! position open, partial close, and final close moves money through its
//! methods; nothing else touches the bankroll.
//!
//! ## Risk rules
//!
//! 1. **Cooldown**: one entry per cooldown interval, reserved atomically
//!    inside the gate so two near-simultaneous signals cannot both pass.
//! 2. **Daily loss limit**: stop entering after losing the configured USD
//!    amount in a UTC day.
//! 3. **Drawdown kill**: a drawdown from the session peak beyond the limit
//!    kills the process's trading permanently (sticky).
//! 4. **Rejection storm**: 5 unhandled errors in 60s kills trading.
//! 5. **Liquidity**: the book must hold a multiple of the stake on our side.
//! 6. **Edge floor**: the edge must clear slippage + fees + a margin.
//!
//! Thread-safety: this struct is NOT thread-safe. Callers wrap it in a
//! mutex; the gate's read-then-reserve of the cooldown timestamp is a
//! critical section.

pub mod fill_tracker;

use std::collections::{HashMap, VecDeque};

use chrono::{DateTime, Utc};
use lag_common::Direction;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{error, info, warn};

use crate::strategy::Signal;

pub use fill_tracker::FillTracker;

/// Errors from risk accounting.
#[derive(Debug, Error)]
pub enum RiskError {
    #[error("insufficient bankroll: available={available}, required={required}")]
    InsufficientBankroll {
        available: Decimal,
        required: Decimal,
    },

    #[error("unknown position: {0}")]
    UnknownPosition(String),
}

/// Risk limits configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskConfig {
    /// Minimum gap between entries (ms).
    pub cooldown_ms: i64,
    /// Daily loss limit in USD (positive number).
    pub daily_loss_limit: Decimal,
    /// Max drawdown from session peak before the sticky kill (e.g. 0.25).
    pub max_drawdown_pct: Decimal,
    /// Max simultaneous open positions.
    pub max_open_positions: usize,
    /// Required edge margin beyond slippage + fees (probability units).
    pub min_margin_edge: f64,
    /// Slippage assumption in basis points (must match sizing).
    pub slippage_bps: u32,
    /// Fee assumption in basis points.
    pub fee_bps: u32,
    /// Liquidity multiple required for normal entries.
    pub liquidity_multiple: Decimal,
    /// Liquidity multiple for certainty entries (book is thinner late).
    pub certainty_liquidity_multiple: Decimal,
    /// Sliding window for the rejection-storm counter (seconds).
    pub rejection_window_secs: i64,
    /// Rejections within the window that trigger the kill.
    pub rejection_storm_count: usize,
}

impl Default for RiskConfig {
    fn default() -> Self {
        Self {
            cooldown_ms: 1_000,
            daily_loss_limit: Decimal::new(100, 0),
            max_drawdown_pct: Decimal::new(25, 2), // 0.25
            max_open_positions: 3,
            min_margin_edge: 0.01,
            slippage_bps: 50,
            fee_bps: 0,
            liquidity_multiple: Decimal::TWO,
            certainty_liquidity_multiple: Decimal::ONE,
            rejection_window_secs: 60,
            rejection_storm_count: 5,
        }
    }
}

/// One open position as the ledger sees it.
///
/// Execution state (status, marks, exit orders) lives on the executor's
/// `Trade`; the ledger only tracks committed capital.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenPosition {
    pub side: Direction,
    /// Remaining committed capital (decremented by partial closes).
    pub size: Decimal,
    pub entry_price: Decimal,
}

/// Outcome of the pre-trade gate.
#[derive(Debug, Clone)]
pub struct RiskDecision {
    pub allowed: bool,
    pub reasons: Vec<String>,
}

impl RiskDecision {
    fn allowed() -> Self {
        Self {
            allowed: true,
            reasons: Vec::new(),
        }
    }

    fn rejected(reasons: Vec<String>) -> Self {
        Self {
            allowed: false,
            reasons,
        }
    }
}

/// Serializable risk state for crash recovery.
///
/// The session peak is deliberately absent: restoring a prior peak would
/// trip the drawdown kill immediately after any losing session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskSnapshot {
    pub bankroll: Decimal,
    pub daily_pnl: Decimal,
    pub daily_pnl_reset_at: DateTime<Utc>,
    pub open_positions: Vec<(String, OpenPosition)>,
}

/// Process-wide risk state. Single writer; see module docs.
pub struct RiskManager {
    cfg: RiskConfig,
    bankroll: Decimal,
    peak_bankroll: Decimal,
    daily_pnl: Decimal,
    daily_pnl_reset_at: DateTime<Utc>,
    open_positions: HashMap<String, OpenPosition>,
    killed: Option<String>,
    last_trade_time_ms: i64,
    rejection_times_ms: VecDeque<i64>,
}

impl RiskManager {
    pub fn new(cfg: RiskConfig, bankroll: Decimal) -> Self {
        Self {
            cfg,
            bankroll,
            peak_bankroll: bankroll,
            daily_pnl: Decimal::ZERO,
            daily_pnl_reset_at: Utc::now(),
            open_positions: HashMap::new(),
            killed: None,
            last_trade_time_ms: 0,
            rejection_times_ms: VecDeque::new(),
        }
    }

    #[inline]
    pub fn bankroll(&self) -> Decimal {
        self.bankroll
    }

    #[inline]
    pub fn peak_bankroll(&self) -> Decimal {
        self.peak_bankroll
    }

    #[inline]
    pub fn daily_pnl(&self) -> Decimal {
        self.daily_pnl
    }

    #[inline]
    pub fn open_position_count(&self) -> usize {
        self.open_positions.len()
    }

    #[inline]
    pub fn killed(&self) -> Option<&str> {
        self.killed.as_deref()
    }

    pub fn open_position_ids(&self) -> Vec<String> {
        self.open_positions.keys().cloned().collect()
    }

    /// Kill trading for the rest of the process lifetime.
    pub fn kill(&mut self, reason: impl Into<String>) {
        let reason = reason.into();
        if self.killed.is_none() {
            error!(%reason, "risk kill switch set");
            self.killed = Some(reason);
        }
    }

    /// Pre-trade gate. See module docs for the rule set.
    ///
    /// On an allowed decision the cooldown timestamp is reserved before
    /// returning, so a second caller inside the cooldown window is rejected
    /// even if no order has been placed yet.
    pub fn can_trade(&mut self, signal: &Signal) -> RiskDecision {
        self.can_trade_at(signal, Utc::now())
    }

    /// Gate with an explicit clock, the testable core of `can_trade`.
    pub fn can_trade_at(&mut self, signal: &Signal, now: DateTime<Utc>) -> RiskDecision {
        self.roll_daily(now);
        let now_ms = now.timestamp_millis();

        if let Some(reason) = &self.killed {
            return RiskDecision::rejected(vec![format!("killed: {}", reason)]);
        }

        let mut reasons = Vec::new();

        if now_ms - self.last_trade_time_ms < self.cfg.cooldown_ms {
            reasons.push("cooldown".to_string());
        }

        if self.daily_pnl <= -self.cfg.daily_loss_limit {
            reasons.push(format!(
                "daily loss limit: {} <= -{}",
                self.daily_pnl, self.cfg.daily_loss_limit
            ));
        }

        if self.peak_bankroll > Decimal::ZERO {
            let drawdown = (self.peak_bankroll - self.bankroll) / self.peak_bankroll;
            if drawdown > self.cfg.max_drawdown_pct {
                reasons.push(format!("max drawdown: {:.4}", drawdown));
                self.kill(format!("drawdown {} exceeded limit", drawdown));
            }
        }

        if self.open_positions.len() >= self.cfg.max_open_positions {
            reasons.push(format!(
                "max open positions: {}",
                self.open_positions.len()
            ));
        }

        let multiple = if signal.is_certainty {
            self.cfg.certainty_liquidity_multiple
        } else {
            self.cfg.liquidity_multiple
        };
        if signal.available_liquidity < multiple * signal.size {
            reasons.push(format!(
                "insufficient liquidity: {} < {}x{}",
                signal.available_liquidity, multiple, signal.size
            ));
        }

        let cost_floor = (self.cfg.slippage_bps + self.cfg.fee_bps) as f64 / 1e4
            + self.cfg.min_margin_edge;
        if signal.edge <= cost_floor {
            reasons.push(format!(
                "edge {:.4} below cost floor {:.4}",
                signal.edge, cost_floor
            ));
        }

        if reasons.is_empty() {
            // Reserve the cooldown slot inside the gate (critical section).
            self.last_trade_time_ms = now_ms;
            RiskDecision::allowed()
        } else {
            RiskDecision::rejected(reasons)
        }
    }

    /// Commit capital for a newly opened position.
    pub fn open_position(
        &mut self,
        id: &str,
        side: Direction,
        size: Decimal,
        entry_price: Decimal,
    ) -> Result<(), RiskError> {
        if self.bankroll < size {
            return Err(RiskError::InsufficientBankroll {
                available: self.bankroll,
                required: size,
            });
        }
        self.bankroll -= size;
        self.open_positions.insert(
            id.to_string(),
            OpenPosition {
                side,
                size,
                entry_price,
            },
        );
        info!(id, %size, %entry_price, bankroll = %self.bankroll, "position opened");
        Ok(())
    }

    /// Release capital for a partial close.
    ///
    /// `realized_notional` is the entry-priced notional of the closed
    /// portion; `realized_pnl` the profit on that portion.
    pub fn apply_partial_close(
        &mut self,
        id: &str,
        realized_notional: Decimal,
        realized_pnl: Decimal,
    ) -> Result<(), RiskError> {
        self.roll_daily(Utc::now());
        let pos = self
            .open_positions
            .get_mut(id)
            .ok_or_else(|| RiskError::UnknownPosition(id.to_string()))?;
        pos.size -= realized_notional;
        if pos.size < Decimal::ZERO {
            warn!(id, size = %pos.size, "partial close overshot remaining size");
            pos.size = Decimal::ZERO;
        }
        self.bankroll += realized_notional + realized_pnl;
        self.daily_pnl += realized_pnl;
        self.peak_bankroll = self.peak_bankroll.max(self.bankroll);
        Ok(())
    }

    /// Release remaining capital and book the final-segment P&L.
    ///
    /// A no-op when the id is unknown, which keeps restore-skip paths safe
    /// to reconcile blindly.
    pub fn close_position(&mut self, id: &str, pnl: Decimal) {
        self.roll_daily(Utc::now());
        let Some(pos) = self.open_positions.remove(id) else {
            return;
        };
        self.bankroll += pos.size + pnl;
        self.daily_pnl += pnl;
        self.peak_bankroll = self.peak_bankroll.max(self.bankroll);
        info!(id, %pnl, bankroll = %self.bankroll, "position closed");
    }

    /// Record an unhandled error; kills trading on a storm.
    pub fn note_unhandled_rejection(&mut self) {
        self.note_unhandled_rejection_at(Utc::now().timestamp_millis());
    }

    /// Storm counter with an explicit clock.
    pub fn note_unhandled_rejection_at(&mut self, now_ms: i64) {
        let window_ms = self.cfg.rejection_window_secs * 1_000;
        self.rejection_times_ms.push_back(now_ms);
        while let Some(&front) = self.rejection_times_ms.front() {
            if now_ms - front > window_ms {
                self.rejection_times_ms.pop_front();
            } else {
                break;
            }
        }
        if self.rejection_times_ms.len() >= self.cfg.rejection_storm_count {
            self.kill("rejection storm");
        }
    }

    /// Snapshot for the state store. The peak is not included.
    pub fn snapshot(&self) -> RiskSnapshot {
        RiskSnapshot {
            bankroll: self.bankroll,
            daily_pnl: self.daily_pnl,
            daily_pnl_reset_at: self.daily_pnl_reset_at,
            open_positions: self
                .open_positions
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
        }
    }

    /// Restore persisted state. The peak resets to the restored bankroll.
    pub fn restore(&mut self, snapshot: RiskSnapshot) {
        self.bankroll = snapshot.bankroll;
        self.peak_bankroll = snapshot.bankroll;
        self.daily_pnl_reset_at = snapshot.daily_pnl_reset_at;
        self.daily_pnl = snapshot.daily_pnl;
        self.open_positions = snapshot.open_positions.into_iter().collect();
        self.roll_daily(Utc::now());
        info!(bankroll = %self.bankroll, positions = self.open_positions.len(), "risk state restored");
    }

    /// Reset daily P&L when a new UTC day has started.
    fn roll_daily(&mut self, now: DateTime<Utc>) {
        if now.date_naive() > self.daily_pnl_reset_at.date_naive() {
            info!(previous = %self.daily_pnl, "daily P&L rolled at UTC midnight");
            self.daily_pnl = Decimal::ZERO;
            self.daily_pnl_reset_at = now;
        }
    }
}
