//! Online statistics for the signal path.
//!
//! Model-layer math runs in f64; these accumulators feed the volatility
//! and edge EMAs and the per-market diagnostics, not the money ledger.

use serde::Serialize;

/// Welford online mean/variance accumulator.
///
/// Numerically stable for long-running streams; no sample storage.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunningStats {
    n: u64,
    mean: f64,
    m2: f64,
    sum: f64,
}

impl RunningStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a sample.
    pub fn push(&mut self, x: f64) {
        if !x.is_finite() {
            return;
        }
        self.n += 1;
        self.sum += x;
        let delta = x - self.mean;
        self.mean += delta / self.n as f64;
        self.m2 += delta * (x - self.mean);
    }

    #[inline]
    pub fn n(&self) -> u64 {
        self.n
    }

    #[inline]
    pub fn sum(&self) -> f64 {
        self.sum
    }

    #[inline]
    pub fn mean(&self) -> f64 {
        self.mean
    }

    /// Sample variance. Zero until two samples exist.
    pub fn variance(&self) -> f64 {
        if self.n < 2 {
            0.0
        } else {
            self.m2 / (self.n - 1) as f64
        }
    }

    pub fn stdev(&self) -> f64 {
        self.variance().sqrt()
    }

    /// Per-sample Sharpe ratio (mean / stdev).
    ///
    /// Defined only once variance exists and is non-zero.
    pub fn sharpe(&self) -> Option<f64> {
        if self.n < 2 {
            return None;
        }
        let sd = self.stdev();
        if sd > 0.0 {
            Some(self.mean / sd)
        } else {
            None
        }
    }
}

/// Exponential moving average parameterized by half-life in samples.
///
/// The first update returns the sample unchanged; subsequent updates decay
/// the previous value so that after `half_life` samples an impulse has half
/// its original weight.
#[derive(Debug, Clone, Serialize)]
pub struct Ema {
    alpha: f64,
    value: Option<f64>,
}

impl Ema {
    /// Create an EMA with the given half-life (in samples, > 0).
    pub fn new(half_life: f64) -> Self {
        let half_life = half_life.max(1e-9);
        Self {
            alpha: 1.0 - 0.5_f64.powf(1.0 / half_life),
            value: None,
        }
    }

    /// Feed a sample, returning the new smoothed value.
    pub fn update(&mut self, x: f64) -> f64 {
        if !x.is_finite() {
            return self.value.unwrap_or(0.0);
        }
        let next = match self.value {
            Some(prev) => prev + self.alpha * (x - prev),
            None => x,
        };
        self.value = Some(next);
        next
    }

    /// Current smoothed value, if any sample has been seen.
    #[inline]
    pub fn value(&self) -> Option<f64> {
        self.value
    }

    /// Seed the EMA with an initial value (used for volatility priors).
    pub fn seed(&mut self, x: f64) {
        if x.is_finite() {
            self.value = Some(x);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // =========================================================================
    // RunningStats Tests
    // =========================================================================

    #[test]
    fn test_running_stats_empty() {
        let s = RunningStats::new();
        assert_eq!(s.n(), 0);
        assert_eq!(s.mean(), 0.0);
        assert_eq!(s.variance(), 0.0);
        assert!(s.sharpe().is_none());
    }

    #[test]
    fn test_running_stats_single() {
        let mut s = RunningStats::new();
        s.push(5.0);
        assert_eq!(s.n(), 1);
        assert_eq!(s.mean(), 5.0);
        assert_eq!(s.sum(), 5.0);
        assert_eq!(s.variance(), 0.0);
        assert!(s.sharpe().is_none());
    }

    #[test]
    fn test_running_stats_known_values() {
        let mut s = RunningStats::new();
        for x in [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0] {
            s.push(x);
        }
        assert_eq!(s.n(), 8);
        assert!((s.mean() - 5.0).abs() < 1e-12);
        // Sample variance of this classic set is 32/7.
        assert!((s.variance() - 32.0 / 7.0).abs() < 1e-12);
    }

    #[test]
    fn test_running_stats_sharpe() {
        let mut s = RunningStats::new();
        s.push(1.0);
        s.push(3.0);
        let sharpe = s.sharpe().unwrap();
        // mean 2, stdev sqrt(2)
        assert!((sharpe - 2.0 / 2.0_f64.sqrt()).abs() < 1e-12);
    }

    #[test]
    fn test_running_stats_constant_series_no_sharpe() {
        let mut s = RunningStats::new();
        s.push(1.0);
        s.push(1.0);
        s.push(1.0);
        assert!(s.sharpe().is_none());
    }

    #[test]
    fn test_running_stats_ignores_non_finite() {
        let mut s = RunningStats::new();
        s.push(1.0);
        s.push(f64::NAN);
        s.push(f64::INFINITY);
        assert_eq!(s.n(), 1);
    }

    // =========================================================================
    // Ema Tests
    // =========================================================================

    #[test]
    fn test_ema_first_update_returns_sample() {
        let mut ema = Ema::new(10.0);
        assert!(ema.value().is_none());
        assert_eq!(ema.update(0.05), 0.05);
        assert_eq!(ema.value(), Some(0.05));
    }

    #[test]
    fn test_ema_decays_toward_new_value() {
        let mut ema = Ema::new(5.0);
        ema.update(0.0);
        let v1 = ema.update(1.0);
        assert!(v1 > 0.0 && v1 < 1.0);
        let v2 = ema.update(1.0);
        assert!(v2 > v1);
    }

    #[test]
    fn test_ema_half_life() {
        // After exactly `half_life` updates toward 0 from 1, the value
        // should be 0.5.
        let mut ema = Ema::new(4.0);
        ema.update(1.0);
        let mut v = 0.0;
        for _ in 0..4 {
            v = ema.update(0.0);
        }
        assert!((v - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_ema_seed() {
        let mut ema = Ema::new(10.0);
        ema.seed(0.02);
        assert_eq!(ema.value(), Some(0.02));
        let v = ema.update(0.02);
        assert!((v - 0.02).abs() < 1e-12);
    }

    #[test]
    fn test_ema_ignores_non_finite() {
        let mut ema = Ema::new(10.0);
        ema.update(0.5);
        let v = ema.update(f64::NAN);
        assert_eq!(v, 0.5);
        assert_eq!(ema.value(), Some(0.5));
    }
}
