//! Trade signals emitted by per-market strategies.

use chrono::{DateTime, Utc};
use lag_common::{Direction, WindowDuration};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A trade signal: one evaluation's conclusion that a contract is mispriced.
///
/// Created by the strategy, gated by the risk manager, consumed by the
/// executor, and discarded. The executor snapshots it immutably onto the
/// trade it opens.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Signal {
    /// Token to buy (YES token for BuyYes, NO token for BuyNo).
    pub token_id: String,
    pub direction: Direction,
    /// Limit price for the entry order, in (0, 1).
    pub entry_price: Decimal,
    /// Stake in USD.
    pub size: Decimal,
    /// Absolute model-vs-market edge in probability units.
    pub edge: f64,
    /// Model probability that YES resolves true.
    pub model_prob: f64,
    /// Contract YES mid at evaluation time.
    pub contract_price: Decimal,
    pub spot_price: Decimal,
    pub strike_price: Decimal,
    /// Spot-vs-book feed lag at evaluation time (ms).
    pub feed_lag_ms: i64,
    /// USD notional resting on the side we would take.
    pub available_liquidity: Decimal,
    pub hours_to_expiry: f64,
    /// Market identifier (e.g. "BTC/5m"), used for per-market gating.
    pub label: String,
    /// True for end-of-window certainty signals.
    #[serde(default)]
    pub is_certainty: bool,
    /// Hard exit deadline for certainty positions.
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
}

/// Entry thresholds for signal generation.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SignalThresholds {
    /// Minimum smoothed and instantaneous edge for latency-arb entries.
    pub entry: f64,
    /// Minimum instantaneous edge for certainty entries near expiry.
    pub certainty: f64,
}

impl SignalThresholds {
    /// Window-dependent defaults.
    ///
    /// Shorter windows see noisier books and demand a larger edge before
    /// the smoothed signal is trusted.
    pub fn for_window(window: WindowDuration) -> Self {
        let entry = match window {
            WindowDuration::FiveMin => 0.05,
            WindowDuration::FifteenMin => 0.03,
            WindowDuration::OneHour => 0.02,
        };
        Self {
            entry,
            certainty: 0.15,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_thresholds_by_window() {
        assert_eq!(SignalThresholds::for_window(WindowDuration::FiveMin).entry, 0.05);
        assert_eq!(SignalThresholds::for_window(WindowDuration::FifteenMin).entry, 0.03);
        assert_eq!(SignalThresholds::for_window(WindowDuration::OneHour).entry, 0.02);
        assert_eq!(SignalThresholds::for_window(WindowDuration::FiveMin).certainty, 0.15);
    }

    #[test]
    fn test_signal_serde_roundtrip() {
        let signal = Signal {
            token_id: "tok-yes".into(),
            direction: Direction::BuyYes,
            entry_price: dec!(0.55),
            size: dec!(25),
            edge: 0.07,
            model_prob: 0.62,
            contract_price: dec!(0.55),
            spot_price: dec!(100250),
            strike_price: dec!(100000),
            feed_lag_ms: 2400,
            available_liquidity: dec!(180),
            hours_to_expiry: 0.06,
            label: "BTC/5m".into(),
            is_certainty: false,
            expires_at: None,
        };
        let json = serde_json::to_string(&signal).unwrap();
        let parsed: Signal = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.token_id, "tok-yes");
        assert_eq!(parsed.entry_price, dec!(0.55));
        assert!(!parsed.is_certainty);
    }
}
