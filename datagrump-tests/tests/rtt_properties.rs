//! Property-based tests for the RTT estimators

use datagrump_protocol::{DelaySignals, RunningRttStats};
use proptest::prelude::*;

fn two_pass(samples: &[u64]) -> (f64, f64) {
    let n = samples.len() as f64;
    let mean = samples.iter().map(|&s| s as f64).sum::<f64>() / n;
    let variance = samples
        .iter()
        .map(|&s| (s as f64 - mean).powi(2))
        .sum::<f64>()
        / n;
    (mean, variance)
}

proptest! {
    #[test]
    fn running_stats_match_two_pass(samples in prop::collection::vec(0u64..10_000, 1..500)) {
        let mut stats = RunningRttStats::new();
        for &s in &samples {
            stats.update(s);
        }

        let (mean, variance) = two_pass(&samples);
        let tolerance = 1e-6 * (1.0 + variance);
        prop_assert_eq!(stats.count(), samples.len() as u64);
        prop_assert!((stats.mean() - mean).abs() < 1e-6 * (1.0 + mean));
        prop_assert!((stats.variance() - variance).abs() < tolerance);
        prop_assert!(stats.variance_accum() >= -tolerance);
        prop_assert!((stats.std_dev() - variance.sqrt()).abs() < 1e-3);
    }

    #[test]
    fn delay_signals_track_minimum(
        samples in prop::collection::vec((0u64..200, 0u64..5_000), 1..300),
    ) {
        let mut signals = DelaySignals::new(130.0, 10_000, 0.2);
        let mut now = 0u64;
        let mut lowest = 10_000u64;

        for &(gap, rtt) in &samples {
            now += gap;
            signals.update(now, rtt);
            lowest = lowest.min(rtt);

            prop_assert_eq!(signals.rtt_min(), lowest);
            prop_assert!(signals.rtt_standing() >= signals.rtt_min());
            prop_assert_eq!(
                signals.queuing_delay(),
                signals.rtt_standing() - signals.rtt_min()
            );
            prop_assert!(signals.interval_start() <= now);
        }
    }

    #[test]
    fn srtt_stays_within_sample_range(
        samples in prop::collection::vec(1u64..5_000, 1..300),
    ) {
        let mut signals = DelaySignals::new(130.0, 10_000, 0.2);
        let lo = samples.iter().copied().min().unwrap_or(0).min(130) as f64;
        let hi = samples.iter().copied().max().unwrap_or(0).max(130) as f64;

        for (i, &rtt) in samples.iter().enumerate() {
            signals.update(i as u64 * 10, rtt);
            prop_assert!(signals.srtt() >= lo - 1e-9 && signals.srtt() <= hi + 1e-9);
        }
    }
}
