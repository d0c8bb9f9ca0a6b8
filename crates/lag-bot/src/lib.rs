//! Latency-arbitrage engine for short-dated prediction-market contracts.
//!
//! Spot prices move 3-7 seconds before short-dated binary contracts
//! ("will X be above strike Y at time T?") reprice on the CLOB venue. This
//! crate runs one strategy instance per (asset × contract-window) pair and
//! routes market data, signals, risk gating, execution, and position
//! bookkeeping through one coordinated pipeline.
//!
//! ## Architecture
//!
//! - `strategy`: per-market signal generation (N(d₂) model, vol/edge EMAs,
//!   window-open strike capture)
//! - `risk`: the single source of truth for bankroll, position accounting,
//!   cooldowns, and kill switches
//! - `executor`: order lifecycle state machine with fill confirmation,
//!   per-trade monitors, safety timeouts, and idempotent close bookkeeping
//! - `engine`: tokenId → strategy routing, rotation, and the signal gate
//! - `clob` / `data_source`: trait boundaries to the external protocol
//!   clients; numeric wire fields are parsed defensively here
//! - `state_store`: atomic crash-recovery state and the NDJSON trade log

pub mod alert;
pub mod clob;
pub mod config;
pub mod data_source;
pub mod engine;
pub mod executor;
pub mod risk;
pub mod sim;
pub mod state_store;
pub mod strategy;

pub use alert::Alerter;
pub use clob::{AckStatus, Book, BookClient, ClobError, OrderRequest, OrderState, PlacedOrder, RawOrder};
pub use config::BotConfig;
pub use data_source::{
    BookUpdate, ChannelDataSource, DataSource, DataSourceError, MarketEvent, MarketRotation,
    SpotUpdate,
};
pub use engine::{Engine, SubscriptionCommand};
pub use executor::{
    ExecutionConfig, Executor, ExecutorError, ExecutorStatus, ExitReason, FillResult, FillStatus,
    Trade, TradeEvent, TradeSnapshot, TradeStatus,
};
pub use risk::{FillTracker, OpenPosition, RiskConfig, RiskDecision, RiskManager, RiskSnapshot};
pub use sim::SimClient;
pub use state_store::{AuditLog, AuditRecord, PersistedState, StateStore};
pub use strategy::{
    calculate_edge, calculate_position_size, implied_probability, kelly_fraction, BankrollFn,
    Ema, MarketStrategy, RunningStats, Signal, SignalThresholds, SizingConfig, StrategyConfig,
};
