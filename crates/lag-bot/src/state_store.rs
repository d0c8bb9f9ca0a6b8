//! Crash-recovery persistence and the trade audit log.
//!
//! State is a single JSON document written atomically (temp file + rename)
//! so a crash mid-write leaves the previous state intact. Write failures
//! are non-fatal: trading continues, recovery just gets staler.
//!
//! The audit log is newline-delimited JSON, one record per lifecycle
//! event, append-only.

use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, SecondsFormat, Utc};
use parking_lot::Mutex;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::executor::{TradeEvent, TradeSnapshot};
use crate::risk::{OpenPosition, RiskManager, RiskSnapshot};

/// The persisted state document.
///
/// The session peak bankroll is deliberately absent; it is recomputed from
/// the restored bankroll on startup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersistedState {
    pub bankroll: Decimal,
    pub daily_pnl: Decimal,
    pub daily_pnl_reset_at: DateTime<Utc>,
    pub open_positions: Vec<(String, OpenPosition)>,
    pub open_snapshot: Vec<TradeSnapshot>,
    pub saved_at: DateTime<Utc>,
}

impl PersistedState {
    /// Capture current risk and executor state.
    pub fn capture(risk: &RiskManager, open_snapshot: Vec<TradeSnapshot>) -> Self {
        let snap = risk.snapshot();
        Self {
            bankroll: snap.bankroll,
            daily_pnl: snap.daily_pnl,
            daily_pnl_reset_at: snap.daily_pnl_reset_at,
            open_positions: snap.open_positions,
            open_snapshot,
            saved_at: Utc::now(),
        }
    }

    /// The risk-side view of this document.
    pub fn risk_snapshot(&self) -> RiskSnapshot {
        RiskSnapshot {
            bankroll: self.bankroll,
            daily_pnl: self.daily_pnl,
            daily_pnl_reset_at: self.daily_pnl_reset_at,
            open_positions: self.open_positions.clone(),
        }
    }
}

/// Atomic JSON state file.
#[derive(Debug, Clone)]
pub struct StateStore {
    path: PathBuf,
}

impl StateStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    #[inline]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Save, logging (not propagating) failures.
    pub fn save(&self, state: &PersistedState) {
        if let Err(e) = self.try_save(state) {
            warn!(path = %self.path.display(), "state save failed (non-fatal): {}", e);
        }
    }

    fn try_save(&self, state: &PersistedState) -> std::io::Result<()> {
        let json = serde_json::to_vec_pretty(state)?;
        let tmp = self.path.with_extension("json.tmp");
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        {
            let mut file = File::create(&tmp)?;
            file.write_all(&json)?;
            file.sync_all()?;
        }
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }

    /// Load the last saved state, if any parses.
    pub fn load(&self) -> Option<PersistedState> {
        let bytes = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
            Err(e) => {
                warn!(path = %self.path.display(), "state load failed: {}", e);
                return None;
            }
        };
        match serde_json::from_slice(&bytes) {
            Ok(state) => Some(state),
            Err(e) => {
                warn!(path = %self.path.display(), "state parse failed, starting fresh: {}", e);
                None
            }
        }
    }
}

/// One audit log record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditRecord {
    pub event: String,
    pub id: String,
    pub label: String,
    pub direction: String,
    pub entry_price: Decimal,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exit_price: Option<Decimal>,
    pub token_qty: Decimal,
    pub size: Decimal,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pnl: Option<Decimal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pnl_pct: Option<Decimal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    pub open_time: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exit_time: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub estimated_exit: Option<bool>,
    #[serde(rename = "_at")]
    pub at: String,
}

impl AuditRecord {
    /// Map a lifecycle event to its audit record.
    pub fn from_event(event: &TradeEvent) -> AuditRecord {
        let at = Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true);
        match event {
            TradeEvent::Open(trade) => AuditRecord {
                event: "open".into(),
                id: trade.id.clone(),
                label: trade.signal.label.clone(),
                direction: trade.direction.to_string(),
                entry_price: trade.entry_price,
                exit_price: None,
                token_qty: trade.token_qty,
                size: trade.size,
                pnl: None,
                pnl_pct: None,
                reason: None,
                open_time: trade.open_time,
                exit_time: None,
                estimated_exit: None,
                at,
            },
            TradeEvent::PartialClose {
                trade,
                filled_qty,
                exit_price,
                realized_pnl,
            } => AuditRecord {
                event: "partial_close".into(),
                id: trade.id.clone(),
                label: trade.signal.label.clone(),
                direction: trade.direction.to_string(),
                entry_price: trade.entry_price,
                exit_price: Some(*exit_price),
                token_qty: *filled_qty,
                size: trade.size,
                pnl: Some(*realized_pnl),
                pnl_pct: pct_of(*realized_pnl, trade.initial_size),
                reason: None,
                open_time: trade.open_time,
                exit_time: None,
                estimated_exit: None,
                at,
            },
            TradeEvent::Close(trade) | TradeEvent::RotationCancel(trade) => AuditRecord {
                event: "close".into(),
                id: trade.id.clone(),
                label: trade.signal.label.clone(),
                direction: trade.direction.to_string(),
                entry_price: trade.entry_price,
                exit_price: trade.exit_price,
                token_qty: trade.token_qty,
                size: trade.size,
                pnl: trade.pnl,
                pnl_pct: trade.pnl.and_then(|p| pct_of(p, trade.initial_size)),
                reason: trade.exit_reason.clone(),
                open_time: trade.open_time,
                exit_time: trade.exit_time,
                estimated_exit: Some(trade.estimated_exit),
                at,
            },
            TradeEvent::ExpiredOnRestore { id, label } => AuditRecord {
                event: "expired_on_restore".into(),
                id: id.clone(),
                label: label.clone(),
                direction: String::new(),
                entry_price: Decimal::ZERO,
                exit_price: None,
                token_qty: Decimal::ZERO,
                size: Decimal::ZERO,
                pnl: None,
                pnl_pct: None,
                reason: None,
                open_time: Utc::now(),
                exit_time: None,
                estimated_exit: None,
                at,
            },
        }
    }
}

fn pct_of(pnl: Decimal, base: Decimal) -> Option<Decimal> {
    if base > Decimal::ZERO {
        Some(pnl / base)
    } else {
        None
    }
}

/// Append-only NDJSON trade log.
#[derive(Debug)]
pub struct AuditLog {
    file: Mutex<File>,
    path: PathBuf,
}

impl AuditLog {
    pub fn open(path: impl Into<PathBuf>) -> std::io::Result<Self> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        info!(path = %path.display(), "audit log open");
        Ok(Self {
            file: Mutex::new(file),
            path,
        })
    }

    #[inline]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one record; failures logged and dropped.
    pub fn append(&self, record: &AuditRecord) {
        let line = match serde_json::to_string(record) {
            Ok(line) => line,
            Err(e) => {
                warn!("audit record serialization failed: {}", e);
                return;
            }
        };
        let mut file = self.file.lock();
        if let Err(e) = writeln!(file, "{}", line) {
            warn!(path = %self.path.display(), "audit append failed: {}", e);
        }
    }

    /// Append the audit record for a lifecycle event.
    pub fn record(&self, event: &TradeEvent) {
        self.append(&AuditRecord::from_event(event));
    }
}
