//! Order lifecycle execution.
//!
//! The executor owns every live position: entry with fill confirmation,
//! the per-trade monitor that drives exits, the safety timeout that bounds
//! any trade's lifetime, and the close bookkeeping that reconciles the risk
//! ledger exactly once per trade.
//!
//! ## Exactly-one-close
//!
//! Two timers race on every trade: the periodic monitor and the safety
//! timeout. Three guards make exactly one close commit:
//! 1. `exit_position` refuses trades that are not `Open` (the `Closing`
//!    flag claims the exit),
//! 2. the safety path only falls through to an estimated close when no
//!    exit committed, and
//! 3. `finalize_close` is the single choke point, refusing trades already
//!    `Closed`.

pub mod fill;
pub mod trade;

use std::collections::VecDeque;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use dashmap::DashMap;
use lag_common::Side;
use parking_lot::Mutex;
use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::alert::Alerter;
use crate::clob::{AckStatus, BookClient, ClobError, OrderRequest, OrderState};
use crate::risk::{FillTracker, RiskError, RiskManager};
use crate::strategy::{RunningStats, Signal};

pub use fill::{FillRateSnapshot, FillRateStats, FillResult, FillStatus};
pub use trade::{
    AdverseCheckpoint, ExitReason, Trade, TradeEvent, TradeSnapshot, TradeStatus,
};

/// Residual below which a partially exited position counts as flat.
const EPSILON: Decimal = dec!(0.00000001);

/// Ages (seconds) at which adverse-selection checkpoints are sampled.
const CHECKPOINT_AGES_SECS: [u64; 3] = [5, 15, 30];

/// Closed trades kept for reporting.
const TRADE_HISTORY_CAP: usize = 500;

/// Execution latency samples kept.
const LATENCY_CAP: usize = 100;

/// Errors from the entry path.
#[derive(Debug, Error)]
pub enum ExecutorError {
    #[error(transparent)]
    Exchange(#[from] ClobError),

    #[error(transparent)]
    Risk(#[from] RiskError),
}

/// Execution tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionConfig {
    /// Simulate fills instead of talking to the venue.
    pub dry_run: bool,
    /// Take profit when unrealized P&L reaches this fraction of size.
    pub profit_target_pct: Decimal,
    /// Cut losses at this fraction of size.
    pub stop_loss_pct: Decimal,
    /// Exit when the mark converges within this band of the model price.
    pub edge_collapse_band: Decimal,
    /// Deadline for entry/exit fill confirmation (ms).
    pub fill_timeout_ms: u64,
    /// Fill poll interval (ms).
    pub fill_poll_ms: u64,
    /// Monitor tick interval (ms).
    pub monitor_interval_ms: u64,
    /// Maximum hold before a forced exit (ms).
    pub max_hold_ms: u64,
    /// Grace period after max hold before the safety path runs (ms).
    pub safety_buffer_ms: u64,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            dry_run: true,
            profit_target_pct: dec!(0.20),
            stop_loss_pct: dec!(0.10),
            edge_collapse_band: dec!(0.02),
            fill_timeout_ms: 5_000,
            fill_poll_ms: 250,
            monitor_interval_ms: 2_000,
            max_hold_ms: 300_000,
            safety_buffer_ms: 5_000,
        }
    }
}

impl ExecutionConfig {
    fn fill_timeout(&self) -> Duration {
        Duration::from_millis(self.fill_timeout_ms)
    }

    fn fill_poll(&self) -> Duration {
        Duration::from_millis(self.fill_poll_ms)
    }

    fn monitor_interval(&self) -> Duration {
        Duration::from_millis(self.monitor_interval_ms)
    }

    fn max_hold(&self) -> Duration {
        Duration::from_millis(self.max_hold_ms)
    }

    fn safety_deadline(&self) -> Duration {
        Duration::from_millis(self.max_hold_ms + self.safety_buffer_ms)
    }
}

/// Read-only status snapshot for dashboards and logs.
#[derive(Debug, Clone, Serialize)]
pub struct ExecutorStatus {
    pub open_orders: usize,
    pub open_trades: Vec<Trade>,
    pub fill_counts: FillRateSnapshot,
    pub fill_rate: f64,
    pub avg_execution_latency_ms: f64,
    pub pnl_trades: u64,
    pub pnl_total: f64,
    pub pnl_mean: f64,
    pub last20_win_rate: Option<f64>,
    pub recent_trades: Vec<Trade>,
}

/// Order lifecycle state machine. Shared as `Arc<Executor>`; spawned
/// monitor tasks hold clones.
pub struct Executor {
    cfg: ExecutionConfig,
    client: Arc<dyn BookClient>,
    risk: Arc<Mutex<RiskManager>>,
    alerter: Alerter,
    open_orders: DashMap<String, Arc<Mutex<Trade>>>,
    trade_history: Mutex<VecDeque<Trade>>,
    pnl_stats: Mutex<RunningStats>,
    fill_stats: FillRateStats,
    fill_tracker: Mutex<FillTracker>,
    latencies_ms: Mutex<VecDeque<u64>>,
    events: mpsc::UnboundedSender<TradeEvent>,
}

impl Executor {
    /// Create an executor and the receiving end of its event stream.
    pub fn new(
        cfg: ExecutionConfig,
        client: Arc<dyn BookClient>,
        risk: Arc<Mutex<RiskManager>>,
        alerter: Alerter,
    ) -> (Arc<Self>, mpsc::UnboundedReceiver<TradeEvent>) {
        let (events, rx) = mpsc::unbounded_channel();
        let executor = Arc::new(Self {
            cfg,
            client,
            risk,
            alerter,
            open_orders: DashMap::new(),
            trade_history: Mutex::new(VecDeque::with_capacity(TRADE_HISTORY_CAP)),
            pnl_stats: Mutex::new(RunningStats::new()),
            fill_stats: FillRateStats::new(),
            fill_tracker: Mutex::new(FillTracker::new()),
            latencies_ms: Mutex::new(VecDeque::with_capacity(LATENCY_CAP)),
            events,
        });
        (executor, rx)
    }

    #[inline]
    pub fn open_order_count(&self) -> usize {
        self.open_orders.len()
    }

    /// Whether a trade is still tracked as open.
    pub fn is_open(&self, id: &str) -> bool {
        self.open_orders.contains_key(id)
    }

    /// Whether any open trade belongs to the given market label.
    ///
    /// The engine uses this to reject stacking a second position onto a
    /// market that already has one.
    pub fn has_open_for_label(&self, label: &str) -> bool {
        self.open_orders
            .iter()
            .any(|entry| entry.value().lock().signal.label == label)
    }

    /// Handle to an open trade.
    pub fn open_trade(&self, id: &str) -> Option<Arc<Mutex<Trade>>> {
        self.open_orders.get(id).map(|e| e.value().clone())
    }

    // =========================================================================
    // Entry
    // =========================================================================

    /// Execute a signal: place the entry order, confirm the fill, commit
    /// the position, and arm its monitors.
    ///
    /// Returns `None` when nothing filled or the entry failed; risk state
    /// is untouched in either case.
    pub async fn execute(self: &Arc<Self>, signal: Signal) -> Option<Arc<Mutex<Trade>>> {
        self.fill_stats.attempted.fetch_add(1, Ordering::Relaxed);
        match self.try_execute(&signal).await {
            Ok(result) => result,
            Err(e) => {
                self.fill_stats.failed.fetch_add(1, Ordering::Relaxed);
                warn!(label = %signal.label, "entry failed: {}", e);
                None
            }
        }
    }

    async fn try_execute(
        self: &Arc<Self>,
        signal: &Signal,
    ) -> Result<Option<Arc<Mutex<Trade>>>, ExecutorError> {
        let requested_qty = signal.size / signal.entry_price;
        let request = OrderRequest::gtc(
            signal.token_id.clone(),
            Side::Buy,
            signal.entry_price,
            requested_qty,
        );

        let start = Instant::now();
        let placed = self.client.place_order(&request).await?;
        self.record_latency(start.elapsed());

        let fill = if self.cfg.dry_run || placed.status == AckStatus::Simulated {
            FillResult::matched(requested_qty, None)
        } else {
            self.wait_for_fill(&placed.id, requested_qty).await
        };

        let (entry_price, token_qty) = match fill.status {
            FillStatus::Matched => {
                self.fill_stats.filled.fetch_add(1, Ordering::Relaxed);
                (fill.avg_price.unwrap_or(signal.entry_price), fill.filled_qty)
            }
            FillStatus::Partial if fill.any_fill() => {
                // Keep the filled portion, drop the resting remainder.
                if let Err(e) = self.client.cancel_order(&placed.id).await {
                    debug!(order = %placed.id, "remainder cancel failed: {}", e);
                }
                self.fill_stats.partial.fetch_add(1, Ordering::Relaxed);
                (fill.avg_price.unwrap_or(signal.entry_price), fill.filled_qty)
            }
            _ => {
                if let Err(e) = self.client.cancel_order(&placed.id).await {
                    debug!(order = %placed.id, "cancel after no fill failed: {}", e);
                }
                self.fill_stats.cancelled.fetch_add(1, Ordering::Relaxed);
                self.fill_tracker.lock().record(signal, false);
                debug!(label = %signal.label, "entry unfilled, no position opened");
                return Ok(None);
            }
        };
        self.fill_tracker.lock().record(signal, true);

        let trade = Trade::open(placed.id.clone(), signal.clone(), entry_price, token_qty);
        let arc = Arc::new(Mutex::new(trade.clone()));
        self.open_orders.insert(placed.id.clone(), arc.clone());
        if let Err(e) = self.risk.lock().open_position(
            &placed.id,
            signal.direction,
            trade.size,
            entry_price,
        ) {
            self.open_orders.remove(&placed.id);
            return Err(e.into());
        }

        info!(
            id = %placed.id,
            label = %signal.label,
            direction = %signal.direction,
            entry = %entry_price,
            qty = %token_qty,
            size = %trade.size,
            "position opened"
        );
        let _ = self.events.send(TradeEvent::Open(Box::new(trade)));
        self.spawn_monitor(arc.clone(), Duration::ZERO);
        Ok(Some(arc))
    }

    // =========================================================================
    // Fill confirmation
    // =========================================================================

    /// Poll an order until it resolves or the fill deadline passes.
    ///
    /// Transient poll errors are swallowed; the deadline is authoritative.
    /// On expiry one final fetch decides between `Partial` (fills detected)
    /// and `Timeout`.
    pub async fn wait_for_fill(&self, order_id: &str, requested_qty: Decimal) -> FillResult {
        let deadline = Instant::now() + self.cfg.fill_timeout();
        loop {
            match self.client.get_order(order_id).await {
                Ok(order) => match order.state() {
                    OrderState::Matched => {
                        let parsed = order.filled_qty();
                        let qty = if parsed <= Decimal::ZERO {
                            requested_qty
                        } else {
                            parsed.min(requested_qty)
                        };
                        return FillResult::matched(qty, order.fill_price());
                    }
                    OrderState::Cancelled => {
                        let parsed = order.filled_qty();
                        if parsed > Decimal::ZERO {
                            return FillResult::partial(
                                parsed.min(requested_qty),
                                order.fill_price(),
                            );
                        }
                        return FillResult::cancelled();
                    }
                    OrderState::Open | OrderState::Unknown => {}
                },
                Err(e) => {
                    debug!(order = order_id, "fill poll error (transient): {}", e);
                }
            }
            if Instant::now() + self.cfg.fill_poll() >= deadline {
                break;
            }
            tokio::time::sleep(self.cfg.fill_poll()).await;
        }

        // Deadline expired; one last look for fills.
        if let Ok(order) = self.client.get_order(order_id).await {
            let parsed = order.filled_qty();
            if parsed > Decimal::ZERO {
                return FillResult::partial(parsed.min(requested_qty), order.fill_price());
            }
        }
        FillResult::timeout()
    }

    // =========================================================================
    // Monitoring
    // =========================================================================

    /// Arm the periodic monitor and the safety timeout for a trade.
    ///
    /// The monitor task is never aborted: an exit it has in flight must
    /// run to completion so its timeout path cancels the resting exchange
    /// order. The status guards make the two timers converge on one close,
    /// and the monitor loop ends on its own once the trade leaves the open
    /// set.
    ///
    /// `initial_age` is non-zero for restored positions so their deadlines
    /// count from the original open, not the restart.
    pub fn spawn_monitor(self: &Arc<Self>, trade: Arc<Mutex<Trade>>, initial_age: Duration) {
        let exec = self.clone();
        let monitored = trade.clone();
        tokio::spawn(async move {
            exec.monitor_loop(monitored, initial_age).await;
        });

        let exec = self.clone();
        tokio::spawn(async move {
            let wait = exec.cfg.safety_deadline().saturating_sub(initial_age);
            tokio::time::sleep(wait).await;
            exec.safety_close(trade).await;
        });
    }

    async fn monitor_loop(&self, trade: Arc<Mutex<Trade>>, initial_age: Duration) {
        let started = Instant::now();
        let mut ticker = tokio::time::interval_at(
            started + self.cfg.monitor_interval(),
            self.cfg.monitor_interval(),
        );
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            let age = initial_age + started.elapsed();

            let (id, token_id, status) = {
                let t = trade.lock();
                (t.id.clone(), t.signal.token_id.clone(), t.status)
            };
            if !self.open_orders.contains_key(&id) {
                return; // cancelled externally
            }
            match status {
                TradeStatus::Closed => return,
                TradeStatus::Closing => continue, // exit already in flight
                TradeStatus::Open => {}
            }

            let book = match self.client.fetch_orderbook(&token_id).await {
                Ok(Some(book)) if book.is_valid() => book,
                Ok(_) => continue,
                Err(e) => {
                    debug!(%id, "book fetch failed (transient): {}", e);
                    continue;
                }
            };

            let (mark, exit_reason) = {
                let mut t = trade.lock();
                if t.status != TradeStatus::Open {
                    continue;
                }
                t.current_mid = book.mid;
                t.unrealized_pnl = (book.mid - t.entry_price) * t.token_qty;
                let pnl_pct = if t.size > Decimal::ZERO {
                    t.unrealized_pnl / t.size
                } else {
                    Decimal::ZERO
                };
                Self::record_checkpoints(&mut t, age, pnl_pct);
                let reason = self.pick_exit_reason(&t, age, pnl_pct);
                (book.mid, reason)
            };

            if let Some(reason) = exit_reason {
                if self.exit_position(&trade, reason, mark).await {
                    return;
                }
                // Partial or failed exit: leave the monitor running so the
                // next tick retries.
            }
        }
    }

    fn record_checkpoints(trade: &mut Trade, age: Duration, pnl_pct: Decimal) {
        let age_secs = age.as_secs();
        for &checkpoint in &CHECKPOINT_AGES_SECS {
            if age_secs >= checkpoint
                && !trade.checkpoints.iter().any(|c| c.age_secs == checkpoint)
            {
                trade.checkpoints.push(AdverseCheckpoint {
                    age_secs: checkpoint,
                    mid: trade.current_mid,
                    mid_move: trade.current_mid - trade.entry_price,
                    pnl_pct,
                });
            }
        }
    }

    /// First matching exit condition wins.
    fn pick_exit_reason(&self, trade: &Trade, age: Duration, pnl_pct: Decimal) -> Option<ExitReason> {
        if age >= self.cfg.max_hold() {
            return Some(ExitReason::MaxHoldTime);
        }
        if pnl_pct >= self.cfg.profit_target_pct {
            return Some(ExitReason::ProfitTarget);
        }
        if pnl_pct <= -self.cfg.stop_loss_pct {
            return Some(ExitReason::StopLoss);
        }
        // The lag closed: the mark now sits on the model's fair value for
        // the held token, so the remaining edge is inside the noise band.
        let fair = match trade.direction {
            lag_common::Direction::BuyYes => trade.signal.model_prob,
            lag_common::Direction::BuyNo => 1.0 - trade.signal.model_prob,
        };
        if let Some(fair) = Decimal::from_f64(fair) {
            if (trade.current_mid - fair).abs() < self.cfg.edge_collapse_band {
                return Some(ExitReason::EdgeCollapsed);
            }
        }
        if trade.signal.is_certainty {
            if let Some(expires_at) = trade.signal.expires_at {
                if Utc::now() >= expires_at {
                    return Some(ExitReason::CertaintyExpiry);
                }
            }
        }
        None
    }

    /// Safety backstop: runs once per trade after `max_hold + buffer`.
    ///
    /// Upper-bounds the lifetime of any trade. When no exit can be
    /// confirmed, the risk state is closed unilaterally at mark and the
    /// operator is told the exchange may disagree.
    async fn safety_close(&self, trade: Arc<Mutex<Trade>>) {
        let (id, label, status) = {
            let t = trade.lock();
            (t.id.clone(), t.signal.label.clone(), t.status)
        };
        if status == TradeStatus::Closed || !self.open_orders.contains_key(&id) {
            return;
        }

        let mark = trade.lock().mark_or_entry();
        let committed = if status == TradeStatus::Open {
            self.exit_position(&trade, ExitReason::ForceExit, mark).await
        } else {
            // An earlier exit is in flight and evidently stuck. It keeps
            // running: its own timeout path cancels the resting order, and
            // the Closed guard below stops it from committing a second
            // close after this one.
            false
        };
        if committed {
            return;
        }

        let pnl = {
            let t = trade.lock();
            (mark - t.entry_price) * t.token_qty
        };
        self.alerter.send(format!(
            "force exit unconfirmed for {} ({}): exchange position may still be open, verify manually",
            id, label
        ));
        self.finalize_close(
            &trade,
            ExitReason::ForceExitUnconfirmed.as_str().to_string(),
            mark,
            pnl,
            true,
        );
    }

    // =========================================================================
    // Exit
    // =========================================================================

    /// Attempt to close a position at `mark` for `reason`.
    ///
    /// Returns true only when a close committed. A partial exit books its
    /// portion and reverts to `Open` for the monitor to retry; all failure
    /// paths revert to `Open` as well. Idempotent: a trade that is already
    /// closing or closed returns false untouched.
    pub async fn exit_position(
        &self,
        trade: &Arc<Mutex<Trade>>,
        reason: ExitReason,
        mark: Decimal,
    ) -> bool {
        let (id, token_id, token_qty, entry_price) = {
            let mut t = trade.lock();
            if t.status != TradeStatus::Open || !self.open_orders.contains_key(&t.id) {
                return false;
            }
            t.status = TradeStatus::Closing;
            (
                t.id.clone(),
                t.signal.token_id.clone(),
                t.token_qty,
                t.entry_price,
            )
        };

        if self.cfg.dry_run {
            let pnl = (mark - entry_price) * token_qty;
            return self.finalize_close(trade, reason.as_str().to_string(), mark, pnl, false);
        }

        let request = OrderRequest::gtc(token_id, Side::Sell, mark, token_qty);
        let placed = match self.client.place_order(&request).await {
            Ok(placed) => placed,
            Err(e) => {
                warn!(%id, "exit placement failed: {}", e);
                self.alerter
                    .send(format!("exit order placement failed for {} ({}): {}", id, reason, e));
                {
                    // Re-open only if nothing else (rotation, shutdown)
                    // finalized the trade while the exit was in flight.
                    let mut t = trade.lock();
                    if t.status == TradeStatus::Closing {
                        t.status = TradeStatus::Open;
                    }
                }
                return false;
            }
        };

        let fill = if placed.status == AckStatus::Simulated {
            FillResult::matched(token_qty, None)
        } else {
            self.wait_for_fill(&placed.id, token_qty).await
        };

        match fill.status {
            FillStatus::Partial if fill.any_fill() => {
                let filled = fill.filled_qty.min(token_qty);
                let exit_px = fill.avg_price.unwrap_or(mark);
                let realized_pnl = (exit_px - entry_price) * filled;
                let realized_notional = filled * entry_price;

                let (remaining_qty, remaining_size, trade_copy) = {
                    let mut t = trade.lock();
                    t.realized_pnl += realized_pnl;
                    t.token_qty -= filled;
                    t.size -= realized_notional;
                    (t.token_qty, t.size, t.clone())
                };
                // Sole channel through which partial exits touch risk state.
                if let Err(e) =
                    self.risk
                        .lock()
                        .apply_partial_close(&id, realized_notional, realized_pnl)
                {
                    warn!(%id, "partial close accounting failed: {}", e);
                }
                info!(
                    %id,
                    %filled,
                    exit = %exit_px,
                    %realized_pnl,
                    remaining = %remaining_qty,
                    "partial exit"
                );
                let _ = self.events.send(TradeEvent::PartialClose {
                    trade: Box::new(trade_copy),
                    filled_qty: filled,
                    exit_price: exit_px,
                    realized_pnl,
                });

                if remaining_qty <= EPSILON || remaining_size <= EPSILON {
                    return self.finalize_close(
                        trade,
                        reason.partial_exhausted(),
                        exit_px,
                        Decimal::ZERO,
                        false,
                    );
                }
                if let Err(e) = self.client.cancel_order(&placed.id).await {
                    debug!(order = %placed.id, "exit remainder cancel failed: {}", e);
                }
                {
                    // Re-open only if nothing else (rotation, shutdown)
                    // finalized the trade while the exit was in flight.
                    let mut t = trade.lock();
                    if t.status == TradeStatus::Closing {
                        t.status = TradeStatus::Open;
                    }
                }
                false
            }
            FillStatus::Matched => {
                let exit_px = fill.avg_price.unwrap_or(mark);
                let pnl = (exit_px - entry_price) * token_qty;
                self.finalize_close(trade, reason.as_str().to_string(), exit_px, pnl, false)
            }
            _ => {
                if let Err(e) = self.client.cancel_order(&placed.id).await {
                    debug!(order = %placed.id, "unfilled exit cancel failed: {}", e);
                }
                {
                    // Re-open only if nothing else (rotation, shutdown)
                    // finalized the trade while the exit was in flight.
                    let mut t = trade.lock();
                    if t.status == TradeStatus::Closing {
                        t.status = TradeStatus::Open;
                    }
                }
                false
            }
        }
    }

    // =========================================================================
    // Close bookkeeping
    // =========================================================================

    /// The single idempotent close commit.
    ///
    /// `pnl` is the final segment's P&L only; partial-exit P&L was already
    /// committed through `apply_partial_close` and is folded into the
    /// trade's total here, not re-sent to risk.
    pub fn finalize_close(
        &self,
        trade: &Arc<Mutex<Trade>>,
        reason: String,
        exit_price: Decimal,
        pnl: Decimal,
        estimated: bool,
    ) -> bool {
        let closed = {
            let mut t = trade.lock();
            if t.status == TradeStatus::Closed {
                return false;
            }
            let now = Utc::now();
            t.status = TradeStatus::Closed;
            t.pnl = Some(t.realized_pnl + pnl);
            t.exit_price = Some(exit_price);
            t.exit_time = Some(now);
            t.exit_reason = Some(reason);
            t.hold_time_ms = Some((now - t.open_time).num_milliseconds());
            t.estimated_exit = estimated;
            t.clone()
        };

        self.open_orders.remove(&closed.id);
        self.risk.lock().close_position(&closed.id, pnl);

        let total = closed.pnl.unwrap_or(Decimal::ZERO);
        if let Some(total_f) = total.to_f64() {
            self.pnl_stats.lock().push(total_f);
        }
        {
            let mut history = self.trade_history.lock();
            if history.len() >= TRADE_HISTORY_CAP {
                history.pop_front();
            }
            history.push_back(closed.clone());
        }

        info!(
            id = %closed.id,
            label = %closed.signal.label,
            reason = closed.exit_reason.as_deref().unwrap_or(""),
            exit = %exit_price,
            pnl = %total,
            estimated,
            "position closed"
        );
        let event = if closed.exit_reason.as_deref() == Some(ExitReason::RotationCancel.as_str()) {
            TradeEvent::RotationCancel(Box::new(closed))
        } else {
            TradeEvent::Close(Box::new(closed))
        };
        let _ = self.events.send(event);
        true
    }

    // =========================================================================
    // Emergency / rotation
    // =========================================================================

    /// Shutdown: cancel everything at the venue, then mark every open
    /// trade closed at its last observed mid (estimated).
    pub async fn cancel_all_orders(&self) {
        if let Err(e) = self.client.cancel_all().await {
            warn!("cancel-all failed (best effort): {}", e);
        }
        let trades: Vec<_> = self
            .open_orders
            .iter()
            .map(|entry| entry.value().clone())
            .collect();
        for trade in trades {
            let (mark, pnl) = {
                let t = trade.lock();
                let mark = t.mark_or_entry();
                (mark, (mark - t.entry_price) * t.token_qty)
            };
            self.finalize_close(
                &trade,
                ExitReason::Shutdown.as_str().to_string(),
                mark,
                pnl,
                true,
            );
        }
    }

    /// Rotation: cancel and mark-close only the expiring market's trades;
    /// other markets are untouched.
    pub async fn cancel_orders_for_label(&self, label: &str) {
        let trades: Vec<_> = self
            .open_orders
            .iter()
            .filter(|entry| entry.value().lock().signal.label == label)
            .map(|entry| entry.value().clone())
            .collect();
        for trade in trades {
            let (id, mark, pnl) = {
                let t = trade.lock();
                let mark = t.mark_or_entry();
                (t.id.clone(), mark, (mark - t.entry_price) * t.token_qty)
            };
            if let Err(e) = self.client.cancel_order(&id).await {
                debug!(%id, "rotation cancel failed (best effort): {}", e);
            }
            self.finalize_close(
                &trade,
                ExitReason::RotationCancel.as_str().to_string(),
                mark,
                pnl,
                true,
            );
        }
    }

    // =========================================================================
    // Crash recovery
    // =========================================================================

    /// Serializable view of every open trade.
    pub fn open_snapshot(&self) -> Vec<TradeSnapshot> {
        self.open_orders
            .iter()
            .map(|entry| TradeSnapshot::of(&entry.value().lock()))
            .collect()
    }

    /// Rebuild open trades from persisted snapshots and restart their
    /// monitors.
    ///
    /// Risk state is restored separately beforehand; this must not call
    /// `open_position` again. Snapshots past the hold deadline are dropped
    /// and their stale risk entries reconciled at zero P&L.
    pub fn restore_positions(self: &Arc<Self>, snapshots: Vec<TradeSnapshot>) {
        let now = Utc::now();
        let stale_cutoff_ms = (self.cfg.max_hold_ms + 60_000) as i64;
        for snap in snapshots {
            let age_ms = (now - snap.open_time).num_milliseconds();
            if age_ms > stale_cutoff_ms {
                warn!(id = %snap.id, label = %snap.signal.label, "dropping expired position on restore");
                self.risk.lock().close_position(&snap.id, Decimal::ZERO);
                let _ = self.events.send(TradeEvent::ExpiredOnRestore {
                    id: snap.id,
                    label: snap.signal.label.clone(),
                });
                continue;
            }

            let token_qty = snap.effective_token_qty();
            let mut trade = Trade::open(snap.id.clone(), snap.signal.clone(), snap.entry_price, token_qty);
            trade.open_time = snap.open_time;
            info!(id = %trade.id, label = %trade.signal.label, age_ms, "restored open position");
            let arc = Arc::new(Mutex::new(trade));
            self.open_orders.insert(snap.id.clone(), arc.clone());
            self.spawn_monitor(arc, Duration::from_millis(age_ms.max(0) as u64));
        }
    }

    // =========================================================================
    // Observability
    // =========================================================================

    /// Estimated fill probability for a prospective signal, from history.
    pub fn fill_probability(&self, signal: &Signal) -> f64 {
        self.fill_tracker.lock().fill_probability(signal)
    }

    /// Read-only status snapshot.
    pub fn status(&self) -> ExecutorStatus {
        let open_trades: Vec<Trade> = self
            .open_orders
            .iter()
            .map(|entry| entry.value().lock().clone())
            .collect();
        let history = self.trade_history.lock();
        let recent_trades: Vec<Trade> = history.iter().rev().take(20).cloned().collect();
        let last20_win_rate = if recent_trades.is_empty() {
            None
        } else {
            let wins = recent_trades
                .iter()
                .filter(|t| t.pnl.unwrap_or(Decimal::ZERO) > Decimal::ZERO)
                .count();
            Some(wins as f64 / recent_trades.len() as f64)
        };
        let latencies = self.latencies_ms.lock();
        let avg_execution_latency_ms = if latencies.is_empty() {
            0.0
        } else {
            latencies.iter().sum::<u64>() as f64 / latencies.len() as f64
        };
        let pnl = self.pnl_stats.lock();
        let fill_counts = self.fill_stats.snapshot();

        ExecutorStatus {
            open_orders: self.open_orders.len(),
            open_trades,
            fill_rate: fill_counts.fill_rate(),
            fill_counts,
            avg_execution_latency_ms,
            pnl_trades: pnl.n(),
            pnl_total: pnl.sum(),
            pnl_mean: pnl.mean(),
            last20_win_rate,
            recent_trades,
        }
    }

    fn record_latency(&self, elapsed: Duration) {
        let mut latencies = self.latencies_ms.lock();
        if latencies.len() >= LATENCY_CAP {
            latencies.pop_front();
        }
        latencies.push_back(elapsed.as_millis() as u64);
    }
}
