//! Market-domain types shared across the engine.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Supported cryptocurrency assets for short-dated up/down markets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum CryptoAsset {
    Btc,
    Eth,
    Sol,
    Xrp,
}

impl CryptoAsset {
    /// Returns the Binance trading pair symbol (e.g., "btcusdt").
    pub fn binance_symbol(&self) -> &'static str {
        match self {
            CryptoAsset::Btc => "btcusdt",
            CryptoAsset::Eth => "ethusdt",
            CryptoAsset::Sol => "solusdt",
            CryptoAsset::Xrp => "xrpusdt",
        }
    }

    /// Returns the display name.
    pub fn as_str(&self) -> &'static str {
        match self {
            CryptoAsset::Btc => "BTC",
            CryptoAsset::Eth => "ETH",
            CryptoAsset::Sol => "SOL",
            CryptoAsset::Xrp => "XRP",
        }
    }

    /// Seed estimate of daily volatility (fraction of price).
    ///
    /// Used to prime the per-market volatility EMA before enough live
    /// ticks have arrived. Rough calibrations from typical behavior.
    pub fn default_daily_vol(&self) -> f64 {
        match self {
            // BTC: ~1.5-2.5% daily
            CryptoAsset::Btc => 0.02,
            // ETH: ~2.5-3.5% daily
            CryptoAsset::Eth => 0.03,
            // SOL: ~4-6% daily
            CryptoAsset::Sol => 0.05,
            // XRP: ~4-7% daily
            CryptoAsset::Xrp => 0.05,
        }
    }
}

impl std::fmt::Display for CryptoAsset {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for CryptoAsset {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "BTC" => Ok(CryptoAsset::Btc),
            "ETH" => Ok(CryptoAsset::Eth),
            "SOL" => Ok(CryptoAsset::Sol),
            "XRP" => Ok(CryptoAsset::Xrp),
            _ => Err(format!("unknown asset: {}", s)),
        }
    }
}

/// Market window duration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum WindowDuration {
    /// 5-minute markets.
    #[default]
    FiveMin,
    /// 15-minute markets.
    FifteenMin,
    /// 1-hour markets.
    OneHour,
}

impl WindowDuration {
    /// Returns the duration in minutes.
    pub fn minutes(&self) -> u32 {
        match self {
            WindowDuration::FiveMin => 5,
            WindowDuration::FifteenMin => 15,
            WindowDuration::OneHour => 60,
        }
    }

    /// Returns the duration as chrono::Duration.
    pub fn as_duration(&self) -> chrono::Duration {
        chrono::Duration::minutes(self.minutes() as i64)
    }

    /// Returns the display name.
    pub fn as_str(&self) -> &'static str {
        match self {
            WindowDuration::FiveMin => "5m",
            WindowDuration::FifteenMin => "15m",
            WindowDuration::OneHour => "1h",
        }
    }
}

impl std::fmt::Display for WindowDuration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for WindowDuration {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "5min" | "5m" | "5" | "fivemin" => Ok(WindowDuration::FiveMin),
            "15min" | "15m" | "15" | "fifteenmin" => Ok(WindowDuration::FifteenMin),
            "1h" | "60m" | "60" | "onehour" | "1hour" => Ok(WindowDuration::OneHour),
            _ => Err(format!("unknown window duration: {}", s)),
        }
    }
}

/// Market outcome token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Outcome {
    Yes,
    No,
}

impl Outcome {
    /// The opposite outcome.
    pub fn opposite(&self) -> Self {
        match self {
            Outcome::Yes => Outcome::No,
            Outcome::No => Outcome::Yes,
        }
    }
}

impl std::fmt::Display for Outcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Outcome::Yes => write!(f, "YES"),
            Outcome::No => write!(f, "NO"),
        }
    }
}

/// Order side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Side {
    Buy,
    Sell,
}

impl std::fmt::Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Side::Buy => write!(f, "BUY"),
            Side::Sell => write!(f, "SELL"),
        }
    }
}

/// Trade direction on the YES book.
///
/// A NO position is expressed as buying the NO token at `1 - yes_price`;
/// the strategy works entirely in YES space and this enum records which
/// side of the contract the position is on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    BuyYes,
    BuyNo,
}

impl Direction {
    /// The outcome token this direction buys.
    pub fn outcome(&self) -> Outcome {
        match self {
            Direction::BuyYes => Outcome::Yes,
            Direction::BuyNo => Outcome::No,
        }
    }

    /// Convert a YES-book price to the entry price paid for this direction.
    pub fn entry_price(&self, yes_price: Decimal) -> Decimal {
        match self {
            Direction::BuyYes => yes_price,
            Direction::BuyNo => Decimal::ONE - yes_price,
        }
    }
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Direction::BuyYes => write!(f, "BUY_YES"),
            Direction::BuyNo => write!(f, "BUY_NO"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_asset_symbols() {
        assert_eq!(CryptoAsset::Btc.binance_symbol(), "btcusdt");
        assert_eq!(CryptoAsset::Eth.as_str(), "ETH");
        assert_eq!(format!("{}", CryptoAsset::Sol), "SOL");
    }

    #[test]
    fn test_asset_from_str() {
        assert_eq!("btc".parse::<CryptoAsset>().unwrap(), CryptoAsset::Btc);
        assert_eq!("XRP".parse::<CryptoAsset>().unwrap(), CryptoAsset::Xrp);
        assert!("DOGE".parse::<CryptoAsset>().is_err());
    }

    #[test]
    fn test_window_duration() {
        assert_eq!(WindowDuration::FiveMin.minutes(), 5);
        assert_eq!(
            WindowDuration::FifteenMin.as_duration(),
            chrono::Duration::minutes(15)
        );
        assert_eq!("5m".parse::<WindowDuration>().unwrap(), WindowDuration::FiveMin);
        assert_eq!("1h".parse::<WindowDuration>().unwrap(), WindowDuration::OneHour);
    }

    #[test]
    fn test_outcome_opposite() {
        assert_eq!(Outcome::Yes.opposite(), Outcome::No);
        assert_eq!(Outcome::No.opposite(), Outcome::Yes);
    }

    #[test]
    fn test_direction_entry_price() {
        assert_eq!(Direction::BuyYes.entry_price(dec!(0.60)), dec!(0.60));
        assert_eq!(Direction::BuyNo.entry_price(dec!(0.60)), dec!(0.40));
        assert_eq!(Direction::BuyYes.outcome(), Outcome::Yes);
    }

    #[test]
    fn test_serde_roundtrip() {
        let json = serde_json::to_string(&CryptoAsset::Btc).unwrap();
        assert_eq!(json, "\"BTC\"");
        let parsed: CryptoAsset = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, CryptoAsset::Btc);
    }
}
