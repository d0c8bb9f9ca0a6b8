//! Market data events and the feed abstraction.
//!
//! The engine consumes a single ordered stream of `MarketEvent`s merged from
//! three collaborators it does not own:
//! - the spot feed (Binance-style trade/ticker stream, one per asset)
//! - the contract book feed (CLOB book updates, keyed by token id)
//! - the market discovery service (rotation events for each asset × window)
//!
//! Book updates for NO tokens are normalized to YES-equivalent prices by the
//! upstream client before they reach the engine; everything downstream works
//! in YES space.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use lag_common::{CryptoAsset, WindowDuration};
use rust_decimal::Decimal;
use thiserror::Error;
use tokio::sync::mpsc;

/// Errors that can occur while pulling market data.
#[derive(Debug, Error)]
pub enum DataSourceError {
    #[error("Connection failed: {0}")]
    Connection(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Stream ended")]
    StreamEnded,
}

/// A market event that can affect trading decisions.
#[derive(Debug, Clone)]
pub enum MarketEvent {
    /// Spot price update for an asset.
    Spot(SpotUpdate),

    /// Contract order book update (already YES-normalized).
    Book(BookUpdate),

    /// A new contract window is live for an (asset, window) pair.
    Rotation(MarketRotation),
}

impl MarketEvent {
    /// Event timestamp in epoch milliseconds.
    pub fn timestamp_ms(&self) -> i64 {
        match self {
            MarketEvent::Spot(e) => e.timestamp_ms,
            MarketEvent::Book(e) => e.timestamp_ms,
            MarketEvent::Rotation(e) => e.timestamp_ms,
        }
    }
}

/// Spot price update.
///
/// `realized_vol` is a daily volatility estimate when the feed provides one;
/// the strategy falls back to a tick-derived estimate otherwise. Feeds never
/// emit non-finite numbers.
#[derive(Debug, Clone)]
pub struct SpotUpdate {
    pub asset: CryptoAsset,
    /// Mid price in USD.
    pub mid: Decimal,
    /// Price change since the previous tick.
    pub delta: Decimal,
    /// Realized daily volatility (fraction of price), if the feed computes it.
    pub realized_vol: Option<f64>,
    pub timestamp_ms: i64,
}

/// Contract order book top-of-book update, in YES space.
#[derive(Debug, Clone)]
pub struct BookUpdate {
    pub token_id: String,
    pub best_bid: Decimal,
    pub best_ask: Decimal,
    /// USD notional resting at the best bid.
    pub bid_depth: Decimal,
    /// USD notional resting at the best ask.
    pub ask_depth: Decimal,
    pub mid: Decimal,
    pub timestamp_ms: i64,
}

/// Rotation event from market discovery: the next live contract window.
#[derive(Debug, Clone)]
pub struct MarketRotation {
    pub asset: CryptoAsset,
    pub window: WindowDuration,
    pub token_id_yes: String,
    pub token_id_no: String,
    /// When this contract resolves.
    pub end_date: DateTime<Utc>,
    /// Human-readable market identifier (e.g. "BTC/5m").
    pub label: String,
    pub timestamp_ms: i64,
}

/// Source of merged market events.
#[async_trait]
pub trait DataSource: Send {
    /// Receive the next market event.
    ///
    /// Returns `None` when the source is exhausted or shut down.
    async fn next_event(&mut self) -> Result<Option<MarketEvent>, DataSourceError>;
}

/// Channel-backed data source.
///
/// The protocol clients (spot WebSocket, CLOB feed, discovery poller) each
/// hold a sender; the engine drains the receiver. Latest-wins semantics make
/// backpressure unnecessary at this layer.
pub struct ChannelDataSource {
    rx: mpsc::Receiver<MarketEvent>,
}

impl ChannelDataSource {
    /// Create a source and its feeding side.
    pub fn new(capacity: usize) -> (mpsc::Sender<MarketEvent>, Self) {
        let (tx, rx) = mpsc::channel(capacity);
        (tx, Self { rx })
    }
}

#[async_trait]
impl DataSource for ChannelDataSource {
    async fn next_event(&mut self) -> Result<Option<MarketEvent>, DataSourceError> {
        Ok(self.rx.recv().await)
    }
}
