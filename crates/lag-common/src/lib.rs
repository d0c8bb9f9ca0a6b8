//! Shared types for the spot-lag trading engine.
//!
//! CRITICAL: All prices and quantities use `rust_decimal::Decimal`.
//! NEVER use f64 for financial math.

pub mod types;

pub use types::{CryptoAsset, Direction, Outcome, Side, WindowDuration};
