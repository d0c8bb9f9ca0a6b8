//! Configuration: defaults, environment overrides, validation.
//!
//! All knobs load from the environment (a `.env` file is honored), with a
//! few CLI overrides applied on top by `main`. Live mode refuses to start
//! on an invalid configuration; dry-run is lenient.

use std::collections::HashMap;
use std::env;
use std::path::PathBuf;
use std::str::FromStr;

use anyhow::{bail, Result};
use lag_common::{CryptoAsset, WindowDuration};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use tracing::warn;

use crate::executor::ExecutionConfig;
use crate::risk::RiskConfig;
use crate::strategy::{SignalThresholds, SizingConfig, StrategyConfig};

/// Top-level bot configuration.
#[derive(Debug, Clone)]
pub struct BotConfig {
    /// Simulated fills; no real orders. The default.
    pub dry_run: bool,
    pub assets: Vec<CryptoAsset>,
    pub windows: Vec<WindowDuration>,
    /// Starting bankroll (USD); superseded by restored state.
    pub bankroll: Decimal,
    pub log_level: String,
    pub state_path: PathBuf,
    pub trade_log_path: PathBuf,
    pub alert_webhook_url: Option<String>,
    /// Venue credentials, required in live mode.
    pub api_key: Option<String>,
    pub api_secret: Option<String>,
    /// Entry-threshold override; per-window defaults apply when unset.
    pub entry_threshold: Option<f64>,
    pub certainty_threshold: f64,
    pub certainty_max_fraction: Decimal,
    pub sizing: SizingConfig,
    pub risk: RiskConfig,
    pub execution: ExecutionConfig,
    /// Per-asset daily-vol seeds overriding the built-in priors.
    pub vol_seeds: HashMap<CryptoAsset, f64>,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            dry_run: true,
            assets: vec![CryptoAsset::Btc, CryptoAsset::Eth],
            windows: vec![WindowDuration::FiveMin],
            bankroll: dec!(1000),
            log_level: "info".to_string(),
            state_path: PathBuf::from("data/state.json"),
            trade_log_path: PathBuf::from("data/trades.ndjson"),
            alert_webhook_url: None,
            api_key: None,
            api_secret: None,
            entry_threshold: None,
            certainty_threshold: 0.15,
            certainty_max_fraction: dec!(0.02),
            sizing: SizingConfig::default(),
            risk: RiskConfig::default(),
            execution: ExecutionConfig::default(),
            vol_seeds: HashMap::new(),
        }
    }
}

impl BotConfig {
    /// Defaults overlaid with environment variables.
    pub fn from_env() -> Self {
        let mut cfg = Self::default();

        if let Some(v) = env_parse::<bool>("DRY_RUN") {
            cfg.dry_run = v;
        }
        if let Some(raw) = env_string("ASSETS") {
            cfg.assets = parse_list(&raw, "ASSETS");
        }
        if let Some(raw) = env_string("WINDOWS") {
            cfg.windows = parse_list(&raw, "WINDOWS");
        }
        if let Some(v) = env_parse("BANKROLL") {
            cfg.bankroll = v;
        }
        if let Some(v) = env_string("LOG_LEVEL") {
            cfg.log_level = v;
        }
        if let Some(v) = env_string("STATE_PATH") {
            cfg.state_path = PathBuf::from(v);
        }
        if let Some(v) = env_string("TRADE_LOG_PATH") {
            cfg.trade_log_path = PathBuf::from(v);
        }
        cfg.alert_webhook_url = env_string("ALERT_WEBHOOK_URL");
        cfg.api_key = env_string("CLOB_API_KEY");
        cfg.api_secret = env_string("CLOB_API_SECRET");

        if let Some(v) = env_parse("ENTRY_THRESHOLD") {
            cfg.entry_threshold = Some(v);
        }
        if let Some(v) = env_parse("CERTAINTY_THRESHOLD") {
            cfg.certainty_threshold = v;
        }
        if let Some(v) = env_parse("CERTAINTY_MAX_FRACTION") {
            cfg.certainty_max_fraction = v;
        }

        if let Some(v) = env_parse("MAX_BET_FRACTION") {
            cfg.sizing.max_bet_fraction = v;
        }
        if let Some(v) = env_parse("MAX_POSITION_USD") {
            cfg.sizing.max_position_usd = v;
        }
        if let Some(v) = env_parse("SLIPPAGE_BPS") {
            cfg.sizing.slippage_bps = v;
            cfg.risk.slippage_bps = v;
        }
        if let Some(v) = env_parse("FEE_BPS") {
            cfg.sizing.fee_bps = v;
            cfg.risk.fee_bps = v;
        }

        if let Some(v) = env_parse("MAX_OPEN_POSITIONS") {
            cfg.risk.max_open_positions = v;
        }
        if let Some(v) = env_parse("COOLDOWN_MS") {
            cfg.risk.cooldown_ms = v;
        }
        if let Some(v) = env_parse("DAILY_LOSS_LIMIT") {
            cfg.risk.daily_loss_limit = v;
        }
        if let Some(v) = env_parse("MAX_DRAWDOWN_PCT") {
            cfg.risk.max_drawdown_pct = v;
        }
        if let Some(v) = env_parse("MIN_MARGIN_EDGE") {
            cfg.risk.min_margin_edge = v;
        }

        if let Some(v) = env_parse("PROFIT_TARGET_PCT") {
            cfg.execution.profit_target_pct = v;
        }
        if let Some(v) = env_parse("STOP_LOSS_PCT") {
            cfg.execution.stop_loss_pct = v;
        }
        if let Some(v) = env_parse("MAX_HOLD_MS") {
            cfg.execution.max_hold_ms = v;
        }
        cfg.execution.dry_run = cfg.dry_run;

        for asset in [
            CryptoAsset::Btc,
            CryptoAsset::Eth,
            CryptoAsset::Sol,
            CryptoAsset::Xrp,
        ] {
            if let Some(v) = env_parse::<f64>(&format!("VOL_SEED_{}", asset)) {
                cfg.vol_seeds.insert(asset, v);
            }
        }

        cfg
    }

    /// The entry threshold in force for a window.
    pub fn entry_threshold_for(&self, window: WindowDuration) -> f64 {
        self.entry_threshold
            .unwrap_or_else(|| SignalThresholds::for_window(window).entry)
    }

    /// Strategy tuning for one (asset, window) pair.
    pub fn strategy_config(&self, asset: CryptoAsset, window: WindowDuration) -> StrategyConfig {
        let mut cfg = StrategyConfig::for_market(asset, window);
        cfg.thresholds.entry = self.entry_threshold_for(window);
        cfg.thresholds.certainty = self.certainty_threshold;
        cfg.certainty_max_fraction = self.certainty_max_fraction;
        cfg.sizing = self.sizing.clone();
        if let Some(&seed) = self.vol_seeds.get(&asset) {
            cfg.daily_vol_seed = seed;
        }
        cfg
    }

    /// Reject configurations that could lose money structurally.
    ///
    /// Applied in live mode only; dry-run accepts anything it can parse.
    pub fn validate(&self) -> Result<()> {
        if self.dry_run {
            return Ok(());
        }

        if self.api_key.is_none() || self.api_secret.is_none() {
            bail!("live mode requires CLOB_API_KEY and CLOB_API_SECRET");
        }
        if self.sizing.max_bet_fraction > dec!(0.10) {
            bail!(
                "max bet fraction {} exceeds the 10% live cap",
                self.sizing.max_bet_fraction
            );
        }
        let cost_floor = (self.sizing.slippage_bps + self.sizing.fee_bps) as f64 / 1e4;
        for window in &self.windows {
            let threshold = self.entry_threshold_for(*window);
            if threshold <= cost_floor {
                bail!(
                    "entry threshold {} for {} does not clear the slippage+fee floor {}",
                    threshold,
                    window,
                    cost_floor
                );
            }
        }
        for (name, pct) in [
            ("profit target", self.execution.profit_target_pct),
            ("stop loss", self.execution.stop_loss_pct),
        ] {
            if pct <= Decimal::ZERO || pct >= Decimal::ONE {
                bail!("{} pct {} must be inside (0, 1)", name, pct);
            }
        }
        Ok(())
    }
}

fn env_string(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn env_parse<T: FromStr>(key: &str) -> Option<T> {
    let raw = env_string(key)?;
    match raw.trim().parse::<T>() {
        Ok(v) => Some(v),
        Err(_) => {
            warn!(key, value = %raw, "ignoring unparseable environment override");
            None
        }
    }
}

fn parse_list<T: FromStr>(raw: &str, key: &str) -> Vec<T> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .filter_map(|s| match s.parse::<T>() {
            Ok(v) => Some(v),
            Err(_) => {
                warn!(key, value = s, "ignoring unparseable list entry");
                None
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn live_config() -> BotConfig {
        BotConfig {
            dry_run: false,
            api_key: Some("key".into()),
            api_secret: Some("secret".into()),
            ..BotConfig::default()
        }
    }

    #[test]
    fn test_defaults_are_dry_run() {
        let cfg = BotConfig::default();
        assert!(cfg.dry_run);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn test_live_requires_credentials() {
        let cfg = BotConfig {
            dry_run: false,
            ..BotConfig::default()
        };
        let err = cfg.validate().unwrap_err().to_string();
        assert!(err.contains("CLOB_API_KEY"));
    }

    #[test]
    fn test_live_caps_bet_fraction() {
        let mut cfg = live_config();
        cfg.sizing.max_bet_fraction = dec!(0.15);
        let err = cfg.validate().unwrap_err().to_string();
        assert!(err.contains("10%"));
    }

    #[test]
    fn test_live_entry_threshold_floor() {
        let mut cfg = live_config();
        cfg.sizing.slippage_bps = 400;
        cfg.sizing.fee_bps = 200; // floor 0.06 > 5% default threshold
        let err = cfg.validate().unwrap_err().to_string();
        assert!(err.contains("floor"));
    }

    #[test]
    fn test_live_pct_ranges() {
        let mut cfg = live_config();
        cfg.execution.stop_loss_pct = dec!(1.5);
        assert!(cfg.validate().is_err());

        let mut cfg = live_config();
        cfg.execution.profit_target_pct = Decimal::ZERO;
        assert!(cfg.validate().is_err());

        assert!(live_config().validate().is_ok());
    }

    #[test]
    fn test_threshold_override() {
        let mut cfg = BotConfig::default();
        assert_eq!(cfg.entry_threshold_for(WindowDuration::FiveMin), 0.05);
        cfg.entry_threshold = Some(0.04);
        assert_eq!(cfg.entry_threshold_for(WindowDuration::FifteenMin), 0.04);
    }

    #[test]
    fn test_strategy_config_carries_overrides() {
        let mut cfg = BotConfig::default();
        cfg.certainty_threshold = 0.2;
        cfg.vol_seeds.insert(CryptoAsset::Btc, 0.033);
        let strat = cfg.strategy_config(CryptoAsset::Btc, WindowDuration::FiveMin);
        assert_eq!(strat.thresholds.certainty, 0.2);
        assert_eq!(strat.daily_vol_seed, 0.033);
        // Unseeded assets keep the built-in prior.
        let eth = cfg.strategy_config(CryptoAsset::Eth, WindowDuration::FiveMin);
        assert_eq!(eth.daily_vol_seed, CryptoAsset::Eth.default_daily_vol());
    }

    #[test]
    fn test_parse_list_skips_garbage() {
        let assets: Vec<CryptoAsset> = parse_list("BTC, DOGE, eth", "ASSETS");
        assert_eq!(assets, vec![CryptoAsset::Btc, CryptoAsset::Eth]);
    }
}
