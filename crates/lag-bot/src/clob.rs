//! CLOB exchange client boundary.
//!
//! The concrete protocol client (REST + WebSocket, auth, rate-limit retry)
//! lives outside this crate; the engine sees only the `BookClient` trait.
//! Exchange responses are parsed defensively at this boundary: numeric
//! fields may arrive as strings, garbage collapses to `None`/zero, and the
//! core never sees a raw wire value.

use async_trait::async_trait;
use lag_common::Side;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Errors from exchange interactions.
#[derive(Debug, Error)]
pub enum ClobError {
    #[error("Order rejected: {0}")]
    Rejected(String),

    #[error("Connection failed: {0}")]
    Connection(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Order not found: {0}")]
    NotFound(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Order type. Entries and exits rest as GTC limit orders.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum OrderType {
    #[default]
    Gtc,
}

impl std::fmt::Display for OrderType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OrderType::Gtc => write!(f, "GTC"),
        }
    }
}

/// Request to place an order.
#[derive(Debug, Clone, Serialize)]
pub struct OrderRequest {
    pub token_id: String,
    pub side: Side,
    /// Limit price in (0, 1).
    pub price: Decimal,
    /// Size in tokens.
    pub size: Decimal,
    pub order_type: OrderType,
}

impl OrderRequest {
    /// Good-till-cancelled limit order.
    pub fn gtc(token_id: impl Into<String>, side: Side, price: Decimal, size: Decimal) -> Self {
        Self {
            token_id: token_id.into(),
            side,
            price,
            size,
            order_type: OrderType::Gtc,
        }
    }
}

/// Exchange acknowledgment status for a freshly placed order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AckStatus {
    /// Resting on the book.
    Open,
    /// Dry-run order: no exchange interaction, treated as filled.
    Simulated,
    /// Anything else the venue reports; polled like an open order.
    Unknown,
}

/// A placed order.
#[derive(Debug, Clone)]
pub struct PlacedOrder {
    pub id: String,
    pub status: AckStatus,
}

/// Normalized order state from a status poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderState {
    Matched,
    Cancelled,
    Open,
    Unknown,
}

/// Raw order as returned by the venue's order endpoint.
///
/// Every numeric field may arrive as a JSON number or a string; the
/// accessors below are total and never panic.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawOrder {
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub size: Option<Value>,
    #[serde(default, alias = "remaining", alias = "sizeRemaining")]
    pub remaining_size: Option<Value>,
    #[serde(default, alias = "makerAmount")]
    pub maker_amount: Option<Value>,
    #[serde(default, alias = "avgPrice", alias = "fillPrice")]
    pub avg_price: Option<Value>,
}

impl RawOrder {
    /// Case-insensitive status normalization.
    pub fn state(&self) -> OrderState {
        match self.status.to_uppercase().as_str() {
            "MATCHED" | "FILLED" => OrderState::Matched,
            "CANCELLED" | "CANCELED" => OrderState::Cancelled,
            "OPEN" | "LIVE" => OrderState::Open,
            _ => OrderState::Unknown,
        }
    }

    /// Filled quantity, best-effort.
    ///
    /// Prefers `size - remaining_size`, falls back to `maker_amount`, then
    /// zero. Callers clamp to the requested quantity; a negative result
    /// here (garbage remaining) is passed through for that clamp.
    pub fn filled_qty(&self) -> Decimal {
        if let (Some(size), Some(remaining)) = (
            self.size.as_ref().and_then(parse_decimal),
            self.remaining_size.as_ref().and_then(parse_decimal),
        ) {
            return size - remaining;
        }
        self.maker_amount
            .as_ref()
            .and_then(parse_decimal)
            .unwrap_or(Decimal::ZERO)
    }

    /// Average fill price, if the venue reported a usable one.
    pub fn fill_price(&self) -> Option<Decimal> {
        self.avg_price
            .as_ref()
            .and_then(parse_decimal)
            .filter(|p| *p > Decimal::ZERO)
    }

    /// True when any fill quantity is detectable.
    pub fn has_fills(&self) -> bool {
        self.filled_qty() > Decimal::ZERO
    }
}

/// Parse a JSON value that should be a number but may be a string.
///
/// Total: any non-numeric or non-finite input becomes `None`.
pub fn parse_decimal(value: &Value) -> Option<Decimal> {
    match value {
        Value::Number(n) => {
            let f = n.as_f64()?;
            if !f.is_finite() {
                return None;
            }
            Decimal::try_from(f).ok()
        }
        Value::String(s) => s.trim().parse::<Decimal>().ok(),
        _ => None,
    }
}

/// Top-of-book snapshot in YES space.
#[derive(Debug, Clone)]
pub struct Book {
    pub token_id: String,
    pub best_bid: Decimal,
    pub best_ask: Decimal,
    pub bid_depth: Decimal,
    pub ask_depth: Decimal,
    pub mid: Decimal,
    pub timestamp_ms: i64,
}

impl Book {
    /// Whether the book carries tradeable prices.
    ///
    /// An empty venue book comes back as bid 0 / ask 1; marks computed
    /// from it would be meaningless.
    pub fn is_valid(&self) -> bool {
        if self.best_bid <= Decimal::ZERO && self.best_ask >= Decimal::ONE {
            return false;
        }
        self.mid > Decimal::ZERO && self.mid < Decimal::ONE
    }
}

/// Exchange operations the executor depends on.
///
/// Cancellations are hints: implementations retry rate limits internally
/// and surface other errors, but callers swallow cancel failures.
#[async_trait]
pub trait BookClient: Send + Sync {
    /// Current book for a token; `None` when the market is gone.
    async fn fetch_orderbook(&self, token_id: &str) -> Result<Option<Book>, ClobError>;

    /// Submit an order.
    async fn place_order(&self, request: &OrderRequest) -> Result<PlacedOrder, ClobError>;

    /// Poll an order's status and fills.
    async fn get_order(&self, order_id: &str) -> Result<RawOrder, ClobError>;

    /// Cancel one order, best-effort.
    async fn cancel_order(&self, order_id: &str) -> Result<(), ClobError>;

    /// Cancel every resting order for this account, best-effort.
    async fn cancel_all(&self) -> Result<(), ClobError>;
}
