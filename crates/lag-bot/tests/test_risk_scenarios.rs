//! Integration tests for the risk gates: cooldown reservation, the
//! drawdown kill, and daily-loss behavior through the public API.

mod common;

use chrono::{TimeZone, Utc};
use rust_decimal_macros::dec;

use common::signal;
use lag_common::Direction;
use lag_bot::risk::{RiskConfig, RiskManager};

fn at(ms: i64) -> chrono::DateTime<Utc> {
    Utc.timestamp_millis_opt(ms).unwrap()
}

// ============================================================================
// Cooldown race
// ============================================================================

#[test]
fn test_cooldown_race_second_caller_loses() {
    let mut risk = RiskManager::new(RiskConfig::default(), dec!(1000));

    // Two signals land within 1ms of each other.
    let first = risk.can_trade_at(&signal("BTC/5m"), at(50_000));
    let second = risk.can_trade_at(&signal("ETH/5m"), at(50_001));

    assert!(first.allowed);
    assert!(!second.allowed);
    assert!(second.reasons.iter().any(|r| r.contains("cooldown")));

    // The losing call must not have moved the reservation: a third call
    // exactly one cooldown after the first is allowed again.
    let third = risk.can_trade_at(&signal("SOL/5m"), at(51_000));
    assert!(third.allowed);
}

// ============================================================================
// Drawdown kill switch
// ============================================================================

#[test]
fn test_drawdown_kill_switch_is_permanent() {
    let mut risk = RiskManager::new(RiskConfig::default(), dec!(1000));

    // Lose 26% of the session peak.
    risk.open_position("t1", Direction::BuyYes, dec!(300), dec!(0.5))
        .unwrap();
    risk.close_position("t1", dec!(-260));
    assert_eq!(risk.bankroll(), dec!(740));

    let decision = risk.can_trade_at(&signal("BTC/5m"), at(10_000));
    assert!(!decision.allowed);
    assert!(risk.killed().is_some());

    // Killed is sticky: profits do not resurrect trading.
    risk.open_position("t2", Direction::BuyYes, dec!(100), dec!(0.5))
        .unwrap();
    risk.close_position("t2", dec!(500));
    let decision = risk.can_trade_at(&signal("BTC/5m"), at(999_000_000));
    assert!(!decision.allowed);
    assert!(decision.reasons[0].starts_with("killed:"));
}

// ============================================================================
// Daily loss limit
// ============================================================================

#[test]
fn test_daily_loss_blocks_without_killing() {
    let mut risk = RiskManager::new(
        RiskConfig {
            daily_loss_limit: dec!(50),
            // Keep drawdown out of the picture.
            max_drawdown_pct: dec!(0.99),
            ..RiskConfig::default()
        },
        dec!(1000),
    );

    risk.open_position("t1", Direction::BuyYes, dec!(100), dec!(0.5))
        .unwrap();
    risk.close_position("t1", dec!(-60));

    let decision = risk.can_trade_at(&signal("BTC/5m"), at(10_000));
    assert!(!decision.allowed);
    assert!(decision
        .reasons
        .iter()
        .any(|r| r.contains("daily loss limit")));
    // A limit stop is not a kill.
    assert!(risk.killed().is_none());
}

// ============================================================================
// Rejection storm
// ============================================================================

#[test]
fn test_rejection_storm_trips_kill() {
    let mut risk = RiskManager::new(RiskConfig::default(), dec!(1000));
    for i in 0..5 {
        risk.note_unhandled_rejection_at(10_000 + i * 1_000);
    }
    assert_eq!(risk.killed(), Some("rejection storm"));

    let decision = risk.can_trade_at(&signal("BTC/5m"), at(60_000));
    assert!(!decision.allowed);
}
