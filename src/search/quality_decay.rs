use super::Decision;
use crate::encoder::EncodeResult;

pub const START_QUALITY: f64 = 0.9;
pub const QUALITY_STEP: f64 = 0.05;
pub const QUALITY_FLOOR: f64 = 0.1;
pub const MAX_ATTEMPTS: u32 = 20;

// Absorbs the rounding left by 0.9 - 0.05 * n so the 0.1 attempt counts as the floor.
const FLOOR_EPSILON: f64 = 1e-9;

/// Quality used by the given 1-based attempt: 0.9, 0.85, 0.80, ...
pub fn quality_for_attempt(attempt: u32) -> f64 {
    let steps = attempt.saturating_sub(1) as f64;
    (START_QUALITY - QUALITY_STEP * steps).clamp(0.0, 1.0)
}

/// Walks quality down in fixed steps and stops at the first attempt that
/// fits, at the attempt ceiling, or at the quality floor, returning that
/// attempt whether it fits or not.
#[derive(Debug, Clone)]
pub struct QualityDecay {
    target: u64,
    quality: f64,
    attempts: u32,
}

impl QualityDecay {
    pub fn new(target: u64) -> Self {
        Self {
            target,
            quality: START_QUALITY,
            attempts: 0,
        }
    }

    pub fn quality(&self) -> f64 {
        self.quality
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn record(&mut self, result: EncodeResult) -> Decision {
        self.attempts += 1;

        let fits = result.byte_len() <= self.target;
        let at_floor = self.quality <= QUALITY_FLOOR + FLOOR_EPSILON;
        if fits || self.attempts >= MAX_ATTEMPTS || at_floor {
            return Decision::Finish(result);
        }

        self.quality = quality_for_attempt(self.attempts + 1);
        Decision::Retry
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::search::testing::{pixel, sized, SizeModel};
    use crate::search::{run, SearchOptions, Strategy};
    use proptest::prelude::*;

    #[test]
    fn quality_sequence() {
        let mut search = QualityDecay::new(1);
        let mut seen = Vec::new();
        loop {
            let q = search.quality();
            seen.push(q);
            if let Decision::Finish(_) = search.record(sized(q, 10)) {
                break;
            }
        }

        let expected = [0.9, 0.85, 0.8, 0.75, 0.7, 0.65, 0.6, 0.55, 0.5];
        for (got, want) in seen.iter().zip(expected.iter()) {
            assert!((got - want).abs() < 1e-9, "{} != {}", got, want);
        }
        // 0.9 down to 0.1 inclusive
        assert_eq!(seen.len(), 17);
        assert!((seen[16] - QUALITY_FLOOR).abs() < 1e-9);
    }

    #[test]
    fn first_attempt_fits() {
        let mut search = QualityDecay::new(50_000);
        let decision = search.record(sized(0.9, 40_000));
        assert_eq!(decision, Decision::Finish(sized(0.9, 40_000)));
        assert_eq!(search.attempts(), 1);
    }

    #[test]
    fn exact_target_fits() {
        let mut search = QualityDecay::new(50_000);
        assert!(matches!(
            search.record(sized(0.9, 50_000)),
            Decision::Finish(_)
        ));
    }

    #[test]
    fn returns_floor_attempt_when_nothing_fits() {
        let encoder = SizeModel::new(|_| 999_999);
        let report = run(
            Strategy::QualityDecay,
            &encoder,
            &pixel(),
            10_240,
            &SearchOptions::immediate(),
            &mut |_| {},
        )
        .unwrap();

        assert_eq!(report.attempts, 17);
        assert!((report.result.quality - QUALITY_FLOOR).abs() < 1e-9);
        assert_eq!(report.result.byte_len(), 999_999);
    }

    #[test]
    fn attempt_ceiling_applies() {
        let mut search = QualityDecay::new(0);
        // Force the quality up so only the ceiling can stop the loop.
        let mut n = 0;
        loop {
            n += 1;
            search.quality = 1.0;
            if let Decision::Finish(_) = search.record(sized(1.0, 10)) {
                break;
            }
        }
        assert_eq!(n, MAX_ATTEMPTS);
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(64))]

        #[test]
        fn finds_fitting_step_when_one_exists(
            target_kb in 10u64..=500,
            slope in 10_000u64..3_000_000,
            base in 1_000u64..200_000,
        ) {
            let target = target_kb * 1024;
            let size = move |q: f64| (slope as f64 * q).round() as u64 + base;
            let encoder = SizeModel::new(size);

            let report = run(
                Strategy::QualityDecay,
                &encoder,
                &pixel(),
                target,
                &SearchOptions::immediate(),
                &mut |_| {},
            ).unwrap();

            prop_assert!(report.attempts <= MAX_ATTEMPTS);
            prop_assert_eq!(encoder.calls(), report.attempts);

            let reachable = (1..=17).any(|n| size(quality_for_attempt(n)) <= target);
            if reachable {
                prop_assert!(report.result.byte_len() <= target);
            }
        }
    }
}
