//! Kelly-based position sizing.
//!
//! Bets are sized with half-Kelly, capped by a bankroll fraction and an
//! absolute USD ceiling, with slippage and fees (in basis points) deducted
//! from the gross stake. A bet whose net size is non-positive is not worth
//! placing and sizes to `None`.

use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Fraction of full Kelly actually wagered.
const KELLY_MULTIPLIER: f64 = 0.5;

/// Sizing limits and cost assumptions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SizingConfig {
    /// Maximum stake as a fraction of bankroll (e.g. 0.05 = 5%).
    pub max_bet_fraction: Decimal,
    /// Absolute stake ceiling in USD.
    pub max_position_usd: Decimal,
    /// Expected slippage in basis points.
    pub slippage_bps: u32,
    /// Taker fee in basis points.
    pub fee_bps: u32,
}

impl Default for SizingConfig {
    fn default() -> Self {
        Self {
            max_bet_fraction: Decimal::new(5, 2),  // 0.05 = 5%
            max_position_usd: Decimal::new(250, 0),
            slippage_bps: 50,
            fee_bps: 0,
        }
    }
}

/// Breakdown of a sized position.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PositionSize {
    /// Stake after cost deduction (what actually gets risked).
    pub net_size: Decimal,
    /// Half-Kelly stake before caps and costs.
    pub raw_size: Decimal,
    /// Full Kelly fraction.
    pub kelly: f64,
    /// Net odds b = (1 - price) / price.
    pub odds: f64,
    /// Slippage deduction in USD.
    pub slippage: Decimal,
    /// Fee deduction in USD.
    pub fee: Decimal,
}

/// Full Kelly fraction for a binary bet.
///
/// `f* = (p(b+1) - 1) / b` where `b` is the net odds; clamped to zero so a
/// negative-edge bet sizes to nothing rather than short.
pub fn kelly_fraction(prob: f64, odds: f64) -> f64 {
    if odds <= 0.0 || !prob.is_finite() {
        return 0.0;
    }
    ((prob * (odds + 1.0) - 1.0) / odds).max(0.0)
}

/// Size a bet on a binary contract priced at `price` with estimated win
/// probability `win_prob`.
///
/// Returns `None` when the Kelly stake, after caps and cost deduction,
/// is not positive.
pub fn calculate_position_size(
    bankroll: Decimal,
    win_prob: f64,
    price: Decimal,
    cfg: &SizingConfig,
) -> Option<PositionSize> {
    if bankroll <= Decimal::ZERO || price <= Decimal::ZERO || price >= Decimal::ONE {
        return None;
    }
    let price_f = price.to_f64()?;
    let odds = (1.0 - price_f) / price_f;
    let kelly = kelly_fraction(win_prob, odds);
    if kelly <= 0.0 {
        return None;
    }

    let half_kelly = Decimal::from_f64(kelly * KELLY_MULTIPLIER)?;
    let raw_size = bankroll * half_kelly;

    let capped = raw_size
        .min(bankroll * cfg.max_bet_fraction)
        .min(cfg.max_position_usd);

    let slippage = capped * Decimal::from(cfg.slippage_bps) / Decimal::from(10_000u32);
    let fee = capped * Decimal::from(cfg.fee_bps) / Decimal::from(10_000u32);
    let net_size = capped - slippage - fee;

    if net_size <= Decimal::ZERO {
        return None;
    }

    Some(PositionSize {
        net_size,
        raw_size,
        kelly,
        odds,
        slippage,
        fee,
    })
}
