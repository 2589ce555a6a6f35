use log::warn;

use super::Decision;
use crate::encoder::EncodeResult;

pub const MIN_QUALITY: f64 = 0.1;
pub const MAX_QUALITY: f64 = 1.0;
pub const START_QUALITY: f64 = 0.5;
pub const MAX_ATTEMPTS: u32 = 15;

/// Accepted distance from the target, as a fraction of the target.
pub const TOLERANCE: f64 = 0.05;

pub fn within_tolerance(len: u64, target: u64) -> bool {
    (len as f64 - target as f64).abs() < target as f64 * TOLERANCE
}

/// Bisects a quality bracket toward the target size.
///
/// Results under the target are kept as a fallback, so running out of
/// attempts on the small side still returns the closest one that fits.
#[derive(Debug, Clone)]
pub struct BinarySearch {
    target: u64,
    min: f64,
    max: f64,
    quality: f64,
    attempts: u32,
    best: Option<EncodeResult>,
    // sizes seen at the current bounds, for spotting non-monotonic encoders
    min_len: Option<u64>,
    max_len: Option<u64>,
}

impl BinarySearch {
    pub fn new(target: u64) -> Self {
        Self {
            target,
            min: MIN_QUALITY,
            max: MAX_QUALITY,
            quality: START_QUALITY,
            attempts: 0,
            best: None,
            min_len: None,
            max_len: None,
        }
    }

    pub fn quality(&self) -> f64 {
        self.quality
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn bracket(&self) -> (f64, f64) {
        (self.min, self.max)
    }

    pub fn best(&self) -> Option<&EncodeResult> {
        self.best.as_ref()
    }

    pub fn record(&mut self, result: EncodeResult) -> Decision {
        self.attempts += 1;

        if self.attempts >= MAX_ATTEMPTS {
            return Decision::Finish(self.best.take().unwrap_or(result));
        }

        let len = result.byte_len();
        if within_tolerance(len, self.target) {
            return Decision::Finish(result);
        }

        self.check_monotonic(len);

        if len > self.target {
            self.max = self.quality;
            self.max_len = Some(len);
            self.quality = (self.min + self.quality) / 2.0;
        } else {
            self.keep_best(result);
            self.min = self.quality;
            self.min_len = Some(len);
            self.quality = (self.quality + self.max) / 2.0;
        }
        Decision::Retry
    }

    fn keep_best(&mut self, result: EncodeResult) {
        debug_assert!(result.byte_len() <= self.target);
        let closer = self
            .best
            .as_ref()
            .map_or(true, |best| result.byte_len() > best.byte_len());
        if closer {
            self.best = Some(result);
        }
    }

    fn check_monotonic(&self, len: u64) {
        let below_floor = self.min_len.is_some_and(|floor| len < floor);
        let above_ceiling = self.max_len.is_some_and(|ceiling| len > ceiling);
        if below_floor || above_ceiling {
            warn!(
                "encoded size {} at quality {:.3} breaks size ordering within [{:.3}, {:.3}]",
                len, self.quality, self.min, self.max
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::search::testing::{pixel, sized, SizeModel};
    use crate::search::{run, SearchOptions, Strategy};
    use proptest::prelude::*;

    fn drive<F: Fn(f64) -> u64>(target: u64, size: F) -> (BinarySearch, Vec<(f64, f64)>, EncodeResult) {
        let mut search = BinarySearch::new(target);
        let mut brackets = vec![search.bracket()];
        loop {
            let q = search.quality();
            match search.record(sized(q, size(q))) {
                Decision::Finish(result) => return (search, brackets, result),
                Decision::Retry => brackets.push(search.bracket()),
            }
        }
    }

    #[test]
    fn accepts_within_tolerance() {
        let mut search = BinarySearch::new(100_000);
        let decision = search.record(sized(0.5, 104_000));
        assert_eq!(decision, Decision::Finish(sized(0.5, 104_000)));
        assert_eq!(search.attempts(), 1);
    }

    #[test]
    fn tolerance_band_is_open() {
        assert!(within_tolerance(100_000, 100_000));
        assert!(within_tolerance(104_999, 100_000));
        assert!(!within_tolerance(105_000, 100_000));
        assert!(!within_tolerance(95_000, 100_000));
        assert!(within_tolerance(95_001, 100_000));
    }

    #[test]
    fn too_big_lowers_upper_bound() {
        let mut search = BinarySearch::new(100_000);
        assert_eq!(search.record(sized(0.5, 300_000)), Decision::Retry);
        assert_eq!(search.bracket(), (0.1, 0.5));
        assert!((search.quality() - 0.3).abs() < 1e-12);
        assert!(search.best().is_none());
    }

    #[test]
    fn too_small_raises_lower_bound_and_keeps_result() {
        let mut search = BinarySearch::new(100_000);
        assert_eq!(search.record(sized(0.5, 40_000)), Decision::Retry);
        assert_eq!(search.bracket(), (0.5, 1.0));
        assert!((search.quality() - 0.75).abs() < 1e-12);
        assert_eq!(search.best().map(|b| b.byte_len()), Some(40_000));
    }

    #[test]
    fn exhaustion_falls_back_to_best() {
        // Always small, never in the band: the ceiling ends the run.
        let (search, _, result) = drive(100_000, |q| (q * 50_000.0) as u64 + 1);
        assert_eq!(search.attempts(), MAX_ATTEMPTS);
        assert!(result.byte_len() <= 100_000);
        assert!(result.quality < 1.0);
    }

    #[test]
    fn exhaustion_without_best_returns_last() {
        let (search, _, result) = drive(10_240, |q| (q * 1_000_000.0) as u64 + 200_000);
        assert_eq!(search.attempts(), MAX_ATTEMPTS);
        assert!(result.byte_len() > 10_240);
        assert!(result.quality >= MIN_QUALITY);
    }

    #[test]
    fn best_prefers_larger_fitting_result() {
        let mut search = BinarySearch::new(100_000);
        search.record(sized(0.5, 60_000));
        search.record(sized(0.75, 50_000)); // non-monotonic, smaller
        assert_eq!(search.best().map(|b| b.byte_len()), Some(60_000));
    }

    #[test]
    fn converges_on_linear_model() {
        let encoder = SizeModel::new(|q| (400_000.0 * q + 20_000.0).round() as u64);
        let report = run(
            Strategy::BinarySearch,
            &encoder,
            &pixel(),
            150 * 1024,
            &SearchOptions::immediate(),
            &mut |_| {},
        )
        .unwrap();
        assert!(within_tolerance(report.result.byte_len(), 150 * 1024));
        assert!(report.attempts < MAX_ATTEMPTS);
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(64))]

        #[test]
        fn terminates_within_ceiling(
            target in 1u64..2_000_000,
            slope in 1_000u64..3_000_000,
            base in 0u64..300_000,
        ) {
            let (search, brackets, _) = drive(target, |q| (slope as f64 * q) as u64 + base);
            prop_assert!(search.attempts() <= MAX_ATTEMPTS);
            prop_assert!(brackets.len() as u32 <= MAX_ATTEMPTS);
        }

        #[test]
        fn bracket_halves_and_never_widens(
            target_kb in 10u64..=500,
            slope in 1_000u64..3_000_000,
            base in 0u64..300_000,
        ) {
            let (_, brackets, _) = drive(target_kb * 1024, |q| (slope as f64 * q) as u64 + base);
            for pair in brackets.windows(2) {
                let (lo0, hi0) = pair[0];
                let (lo1, hi1) = pair[1];
                prop_assert!(lo1 >= lo0 && hi1 <= hi0);
                prop_assert!((lo1 - lo0 == 0.0) ^ (hi1 - hi0 == 0.0));
            }
            // start quality is not the first midpoint, halving holds from the second step
            for pair in brackets.windows(2).skip(1) {
                let w0 = pair[0].1 - pair[0].0;
                let w1 = pair[1].1 - pair[1].0;
                prop_assert!((w1 - w0 / 2.0).abs() < 1e-9);
            }
        }

        #[test]
        fn best_never_over_target(
            target_kb in 10u64..=500,
            sizes in proptest::collection::vec(1u64..1_000_000, MAX_ATTEMPTS as usize),
        ) {
            let target = target_kb * 1024;
            let mut search = BinarySearch::new(target);
            for len in sizes {
                let q = search.quality();
                let decision = search.record(sized(q, len));
                if let Some(best) = search.best() {
                    prop_assert!(best.byte_len() <= target);
                }
                if let Decision::Finish(_) = decision {
                    break;
                }
            }
        }
    }
}
