//! RTT signal estimation
//!
//! Two estimators derive round-trip-time signals from acknowledgement
//! timestamps:
//!
//! - [`RunningRttStats`]: running mean and variance (Welford recurrence)
//! - [`DelaySignals`]: smoothed RTT, standing RTT over a half-SRTT interval,
//!   and the all-time minimum RTT, from which queuing delay is estimated

/// Running mean/variance of RTT samples
#[derive(Debug, Clone, Default)]
pub struct RunningRttStats {
    /// Arithmetic mean of all samples (ms)
    mean: f64,
    /// Sum of squared deviations from the mean (ms²)
    variance_accum: f64,
    /// Number of samples
    count: u64,
}

impl RunningRttStats {
    /// Create an empty estimator
    pub fn new() -> Self {
        Self::default()
    }

    /// Update with a new RTT sample
    pub fn update(&mut self, rtt_ms: u64) {
        let sample = rtt_ms as f64;

        self.count += 1;
        let delta = sample - self.mean;
        self.mean += delta / self.count as f64;
        self.variance_accum += (sample - self.mean) * delta;
    }

    /// Mean RTT in milliseconds
    pub fn mean(&self) -> f64 {
        self.mean
    }

    /// Accumulated sum of squared deviations
    pub fn variance_accum(&self) -> f64 {
        self.variance_accum
    }

    /// Population variance, zero before the first sample
    pub fn variance(&self) -> f64 {
        if self.count == 0 {
            return 0.0;
        }
        self.variance_accum / self.count as f64
    }

    /// Population standard deviation
    pub fn std_dev(&self) -> f64 {
        self.variance().sqrt()
    }

    /// Number of samples seen
    pub fn count(&self) -> u64 {
        self.count
    }
}

/// Delay signals for the delay-gradient policy
#[derive(Debug, Clone)]
pub struct DelaySignals {
    /// Exponentially smoothed RTT (ms)
    srtt: f64,
    /// Minimum RTT in the current interval (ms)
    rtt_standing: u64,
    /// Minimum RTT ever observed (ms)
    rtt_min: u64,
    /// Start of the current standing-RTT interval (sender clock, ms)
    interval_start: u64,
    /// Weight of a new sample in `srtt`
    gain: f64,
}

impl DelaySignals {
    /// Create an estimator seeded with initial guesses
    pub fn new(initial_srtt_ms: f64, initial_rtt_ms: u64, gain: f64) -> Self {
        DelaySignals {
            srtt: initial_srtt_ms,
            rtt_standing: initial_rtt_ms,
            rtt_min: initial_rtt_ms,
            interval_start: 0,
            gain,
        }
    }

    /// Fold in one RTT sample measured at `now_ms`.
    ///
    /// A new standing interval starts once half a smoothed RTT has passed
    /// since the previous one; within an interval the standing RTT only
    /// decreases.
    pub fn update(&mut self, now_ms: u64, rtt_ms: u64) {
        let since_interval = now_ms.saturating_sub(self.interval_start) as f64;
        if since_interval >= self.srtt / 2.0 {
            self.rtt_standing = rtt_ms;
            self.interval_start = now_ms;
        } else {
            self.rtt_standing = self.rtt_standing.min(rtt_ms);
        }

        self.rtt_min = self.rtt_min.min(rtt_ms);
        self.srtt = (1.0 - self.gain) * self.srtt + self.gain * rtt_ms as f64;
    }

    /// Queuing delay estimate, `rtt_standing - rtt_min`, clamped at zero
    pub fn queuing_delay(&self) -> u64 {
        self.rtt_standing.saturating_sub(self.rtt_min)
    }

    pub fn srtt(&self) -> f64 {
        self.srtt
    }

    pub fn rtt_standing(&self) -> u64 {
        self.rtt_standing
    }

    pub fn rtt_min(&self) -> u64 {
        self.rtt_min
    }

    pub fn interval_start(&self) -> u64 {
        self.interval_start
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_running_stats_empty() {
        let stats = RunningRttStats::new();
        assert_eq!(stats.count(), 0);
        assert_eq!(stats.mean(), 0.0);
        assert_eq!(stats.variance(), 0.0);
    }

    #[test]
    fn test_running_stats_matches_two_pass() {
        let samples = [100u64, 120, 80, 95, 150, 101];
        let mut stats = RunningRttStats::new();
        for &s in &samples {
            stats.update(s);
        }

        let n = samples.len() as f64;
        let mean = samples.iter().map(|&s| s as f64).sum::<f64>() / n;
        let sq: f64 = samples.iter().map(|&s| (s as f64 - mean).powi(2)).sum();

        assert!((stats.mean() - mean).abs() < 1e-9);
        assert!((stats.variance_accum() - sq).abs() < 1e-6);
        assert!((stats.variance() - sq / n).abs() < 1e-6);
    }

    #[test]
    fn test_constant_samples_have_zero_variance() {
        let mut stats = RunningRttStats::new();
        for _ in 0..50 {
            stats.update(42);
        }
        assert_eq!(stats.mean(), 42.0);
        assert_eq!(stats.std_dev(), 0.0);
    }

    #[test]
    fn test_standing_rtt_within_interval() {
        let mut signals = DelaySignals::new(130.0, 10_000, 0.2);

        // First sample opens an interval
        signals.update(100, 80);
        assert_eq!(signals.rtt_standing(), 80);
        assert_eq!(signals.interval_start(), 100);

        // Within half an srtt: standing can only drop
        signals.update(110, 90);
        assert_eq!(signals.rtt_standing(), 80);
        signals.update(115, 70);
        assert_eq!(signals.rtt_standing(), 70);
        assert_eq!(signals.rtt_min(), 70);
    }

    #[test]
    fn test_standing_rtt_interval_reset() {
        let mut signals = DelaySignals::new(100.0, 10_000, 0.2);
        signals.update(100, 50);
        let half_srtt = signals.srtt() / 2.0;

        // Past half an srtt a new interval begins, even with a larger sample
        let later = 100 + half_srtt.ceil() as u64;
        signals.update(later, 90);
        assert_eq!(signals.rtt_standing(), 90);
        assert_eq!(signals.interval_start(), later);
        assert_eq!(signals.rtt_min(), 50);
        assert_eq!(signals.queuing_delay(), 40);
    }

    #[test]
    fn test_srtt_smoothing() {
        let mut signals = DelaySignals::new(130.0, 10_000, 0.2);
        signals.update(0, 30);
        assert!((signals.srtt() - (0.8 * 130.0 + 0.2 * 30.0)).abs() < 1e-9);
    }

    #[test]
    fn test_standing_may_exceed_srtt() {
        // A delay spike right after an interval reset lifts the standing RTT
        // above the smoothed RTT; this is left as-is.
        let mut signals = DelaySignals::new(20.0, 10_000, 0.2);
        signals.update(0, 20);
        signals.update(50, 500);
        assert_eq!(signals.rtt_standing(), 500);
        assert!((signals.rtt_standing() as f64) > signals.srtt());
    }

    #[test]
    fn test_queuing_delay_never_negative() {
        // Seeded standing below the seeded minimum cannot produce a negative
        // queuing delay.
        let mut signals = DelaySignals::new(130.0, 10_000, 0.2);
        signals.rtt_standing = 5;
        assert_eq!(signals.queuing_delay(), 0);
    }
}
