//! Binary-option pricing for short-dated up/down contracts.
//!
//! The contract "will spot be above strike at expiry?" is priced as the
//! risk-neutral probability N(d₂) of a log-normal spot finishing above the
//! strike. This is a first-order model: no drift term, volatility taken
//! from the live per-market EMA.
//!
//! Model math runs in f64; prices cross the Decimal boundary at the callers.

use lag_common::Direction;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;

/// Floor on time-to-expiry, in days (30 seconds).
///
/// Below this, d₂ blows up and the model degenerates to a step function
/// anyway; clamping keeps the output finite through the final seconds.
const MIN_T_DAYS: f64 = 30.0 / 86_400.0;

/// Standard normal CDF, Abramowitz & Stegun rational approximation.
///
/// Max absolute error ~7.5e-8, far below anything the edge thresholds
/// can resolve.
fn normal_cdf(x: f64) -> f64 {
    let a1 = 0.254829592;
    let a2 = -0.284496736;
    let a3 = 1.421413741;
    let a4 = -1.453152027;
    let a5 = 1.061405429;
    let p = 0.3275911;

    let sign = if x < 0.0 { -1.0 } else { 1.0 };
    let z = x.abs() / 2.0_f64.sqrt();

    let t = 1.0 / (1.0 + p * z);
    let y = 1.0 - (((((a5 * t + a4) * t) + a3) * t + a2) * t + a1) * t * (-z * z).exp();

    0.5 * (1.0 + sign * y)
}

/// Model probability that spot finishes above the strike at expiry.
///
/// d₂ = (ln(S/K) − ½σ²T) / (σ√T) with T in days and σ the daily
/// volatility; returns N(d₂) in [0, 1].
///
/// Degenerate inputs (non-positive spot/strike, zero volatility) collapse
/// to the step function on sign(S − K).
pub fn implied_probability(
    spot: f64,
    strike: f64,
    sigma_daily: f64,
    hours_to_expiry: f64,
) -> f64 {
    if spot <= 0.0 || strike <= 0.0 {
        return 0.0;
    }
    let t = (hours_to_expiry / 24.0).max(MIN_T_DAYS);
    let sigma_t = sigma_daily * t.sqrt();
    if sigma_t <= 1e-12 {
        return if spot >= strike { 1.0 } else { 0.0 };
    }
    let d2 = ((spot / strike).ln() - 0.5 * sigma_daily * sigma_daily * t) / sigma_t;
    normal_cdf(d2)
}

/// Mispricing between model probability and the contract's YES mid.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Edge {
    /// Absolute edge in probability units.
    pub absolute: f64,
    /// Which side captures the edge.
    pub direction: Direction,
}

/// Compare model probability against the contract price (YES space).
///
/// Model above market means YES is cheap (buy YES); model below market
/// means NO is cheap (buy NO at `1 - contract_price`).
pub fn calculate_edge(model_prob: f64, contract_price: Decimal) -> Edge {
    let price = contract_price.to_f64().unwrap_or(0.5);
    if model_prob > price {
        Edge {
            absolute: model_prob - price,
            direction: Direction::BuyYes,
        }
    } else {
        Edge {
            absolute: price - model_prob,
            direction: Direction::BuyNo,
        }
    }
}
