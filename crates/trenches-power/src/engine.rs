//! Calling power engine implementing the [`PowerCalculator`] trait.
//!
//! Pipeline for a non-empty history:
//! 1. project each call onto `as_of` and score it with the formula's
//!    performance and weight functions
//! 2. aggregate into base, correction and constancy
//! 3. `calling_power = base / correction * constancy`
//! 4. normalize

use chrono::{DateTime, Utc};
use trenches_core::traits::PowerCalculator;
use trenches_core::types::{Call, CallPerformance, CallingPowerData};

use crate::aggregate::average;
use crate::formula::{FormulaPreset, PowerFormula};
use crate::performance::to_performance;
use crate::sigmoid::Normalization;

/// Score a call history with the given formula as of an instant.
///
/// An empty history returns [`CallingPowerData::zeroed`] without invoking
/// any formula function.
pub fn compute_power(
    calls: &[Call],
    formula: &PowerFormula,
    as_of: DateTime<Utc>,
) -> CallingPowerData {
    if calls.is_empty() {
        return CallingPowerData::zeroed();
    }

    let performances: Vec<CallPerformance> = calls
        .iter()
        .map(|call| {
            let mut perf = to_performance(call, as_of);
            perf.performance = (formula.call_performance)(&perf);
            perf.temporal_weight = (formula.call_weight)(&perf);
            perf.final_perf = perf.performance * perf.temporal_weight;
            perf
        })
        .collect();

    let base_performance = (formula.base_performance)(&performances);
    let avg_performance = average(&performances);
    let correction = (formula.correction)(&performances);
    let constancy = (formula.constancy)(&performances);

    // All weights zero means a zero weighted base too: 0/0 scores 0.
    let calling_power = if correction == 0.0 {
        0.0
    } else {
        base_performance / correction * constancy
    };

    CallingPowerData {
        base_performance,
        avg_performance,
        correction,
        constancy,
        calling_power,
        normalized: formula.normalization.apply(calling_power),
        performances,
    }
}

/// The production power calculator.
#[derive(Debug, Clone, Copy, Default)]
pub struct CallingPowerEngine {
    formula: PowerFormula,
}

impl CallingPowerEngine {
    pub fn new(formula: PowerFormula) -> Self {
        Self { formula }
    }

    /// Engine for a registered preset with identity normalization.
    pub fn from_preset(preset: FormulaPreset) -> Self {
        Self::new(preset.formula())
    }

    pub fn with_normalization(self, normalization: Normalization) -> Self {
        Self::new(self.formula.with_normalization(normalization))
    }

    pub fn formula(&self) -> &PowerFormula {
        &self.formula
    }
}

impl PowerCalculator for CallingPowerEngine {
    fn compute_power(&self, calls: &[Call], as_of: DateTime<Utc>) -> CallingPowerData {
        compute_power(calls, &self.formula, as_of)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sigmoid::SigmoidNormalizer;
    use chrono::{TimeDelta, TimeZone};
    use proptest::prelude::*;
    use trenches_core::constants::SECONDS_PER_WEEK;
    use trenches_core::error::PowerError;
    use trenches_core::types::CallerId;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 12, 1, 0, 0, 0).unwrap()
    }

    /// A call `age` before `now()` going from 100 to `highest`.
    fn call(token: &str, highest: f64, age: TimeDelta) -> Call {
        Call::new(CallerId(1), token, 100.0, now() - age).with_highest(highest)
    }

    fn history() -> Vec<Call> {
        vec![
            call("A", 300.0, TimeDelta::days(1)),
            call("B", 100.0, TimeDelta::days(1) + TimeDelta::weeks(1)),
            call("C", 150.0, TimeDelta::hours(12)),
        ]
    }

    // --- empty history ---

    #[test]
    fn empty_history_zeroed_for_every_preset() {
        for preset in FormulaPreset::ALL {
            let data = CallingPowerEngine::from_preset(preset).compute_power(&[], now());
            assert_eq!(data, CallingPowerData::zeroed(), "{preset}");
        }
    }

    #[test]
    fn empty_history_zeroed_even_with_sigmoid() {
        let engine = CallingPowerEngine::default()
            .with_normalization(Normalization::Sigmoid(SigmoidNormalizer::default()));
        assert_eq!(engine.compute_power(&[], now()).normalized, 0.0);
    }

    // --- standard ---

    #[test]
    fn standard_weighted_average_of_gains() {
        let data = CallingPowerEngine::default().compute_power(&history(), now());
        // Weights: A = 1.0, B = 0.5, C = 0.9. Gains: 200, 0, 50.
        let perfs = &data.performances;
        assert_eq!(perfs[0].temporal_weight, 1.0);
        assert!((perfs[1].temporal_weight - 0.5).abs() < 1e-12);
        assert!((perfs[2].temporal_weight - 0.9).abs() < 1e-12);
        assert_eq!(perfs[0].performance, 200.0);
        assert_eq!(perfs[1].final_perf, 0.0);

        let base = 200.0 + 0.0 + 45.0;
        let weight = 1.0 + 0.5 + 0.9;
        assert!((data.base_performance - base).abs() < 1e-9);
        assert!((data.correction - weight).abs() < 1e-9);
        assert_eq!(data.constancy, 1.0);
        assert!((data.calling_power - base / weight).abs() < 1e-9);
        assert_eq!(data.normalized, data.calling_power);
        assert!((data.avg_performance - base / 3.0).abs() < 1e-9);
    }

    #[test]
    fn all_fresh_calls_score_zero_not_nan() {
        let calls = vec![
            call("A", 500.0, TimeDelta::zero()),
            call("B", 900.0, TimeDelta::zero()),
        ];
        let data = CallingPowerEngine::default().compute_power(&calls, now());
        assert_eq!(data.correction, 0.0);
        assert_eq!(data.calling_power, 0.0);
        assert_eq!(data.normalized, 0.0);
    }

    #[test]
    fn future_dated_call_has_zero_weight() {
        let calls = vec![call("A", 500.0, -TimeDelta::hours(5))];
        let data = CallingPowerEngine::default().compute_power(&calls, now());
        assert_eq!(data.performances[0].age_secs, 0.0);
        assert_eq!(data.performances[0].temporal_weight, 0.0);
    }

    // --- logarithmic ---

    #[test]
    fn logarithmic_dampens_volume() {
        let data = CallingPowerEngine::from_preset(FormulaPreset::Logarithmic)
            .compute_power(&history(), now());
        let base = 245.0;
        assert!((data.correction - (1.0 + 3f64.ln())).abs() < 1e-12);
        assert!((data.calling_power - base / (1.0 + 3f64.ln())).abs() < 1e-9);
    }

    // --- consistency ---

    #[test]
    fn consistency_ignores_recency() {
        let data = CallingPowerEngine::from_preset(FormulaPreset::Consistency)
            .compute_power(&history(), now());
        assert!(data.performances.iter().all(|p| p.temporal_weight == 1.0));
        // 2 of 3 calls gained; final perfs 200, 0, 50.
        assert!((data.base_performance - 2.0 / 3.0).abs() < 1e-12);
        assert_eq!(data.correction, 1.0);
        let mean: f64 = 250.0 / 3.0;
        let var = ((200.0 - mean).powi(2) + mean.powi(2) + (50.0 - mean).powi(2)) / 3.0;
        let constancy = mean / (var.sqrt() + 1.0);
        assert!((data.constancy - constancy).abs() < 1e-9);
        assert!((data.calling_power - 2.0 / 3.0 * constancy).abs() < 1e-9);
    }

    #[test]
    fn consistency_single_call_constancy_is_average() {
        let calls = vec![call("A", 180.0, TimeDelta::weeks(3))];
        let data = CallingPowerEngine::from_preset(FormulaPreset::Consistency)
            .compute_power(&calls, now());
        assert_eq!(data.constancy, data.avg_performance);
        assert_eq!(data.constancy, 80.0);
    }

    // --- normalization ---

    #[test]
    fn sigmoid_normalization_applied_last() {
        let engine = CallingPowerEngine::default()
            .with_normalization(Normalization::Sigmoid(SigmoidNormalizer::default()));
        let data = engine.compute_power(&history(), now());
        assert_eq!(
            data.normalized,
            SigmoidNormalizer::default().apply(data.calling_power)
        );
        assert_eq!(engine.normalized_power(&history(), now()), data.normalized);
    }

    // --- data quality ---

    #[test]
    fn zero_start_surfaces_as_error() {
        let calls = vec![
            call("A", 300.0, TimeDelta::days(2)),
            Call::new(CallerId(1), "ZERO", 0.0, now() - TimeDelta::days(2)).with_highest(10.0),
        ];
        let data = CallingPowerEngine::default().compute_power(&calls, now());
        assert_eq!(
            data.ensure_finite(),
            Err(PowerError::NonFinitePerformance {
                token_address: "ZERO".into(),
                start_fdv: 0.0
            })
        );
    }

    // --- dyn compatibility ---

    #[test]
    fn engine_as_trait_object() {
        let engine: Box<dyn PowerCalculator> = Box::new(CallingPowerEngine::default());
        assert!(engine.compute_power(&history(), now()).calling_power > 0.0);
    }

    // --- proptest ---

    proptest! {
        #[test]
        fn repeated_computation_bit_identical(
            gains in proptest::collection::vec(0.0f64..10_000.0, 1..12),
            ages in proptest::collection::vec(0i64..10_000_000, 12),
        ) {
            let calls: Vec<Call> = gains
                .iter()
                .zip(&ages)
                .map(|(g, a)| call("T", 100.0 + g, TimeDelta::seconds(*a)))
                .collect();
            for preset in FormulaPreset::ALL {
                let engine = CallingPowerEngine::from_preset(preset);
                let a = engine.compute_power(&calls, now());
                let b = engine.compute_power(&calls, now());
                prop_assert_eq!(a.normalized.to_bits(), b.normalized.to_bits());
                prop_assert_eq!(a, b);
            }
        }

        #[test]
        fn standard_power_between_min_and_max_gain(
            gains in proptest::collection::vec(0.0f64..10_000.0, 1..12),
            weeks in 0.0f64..50.0,
        ) {
            // Same age for every call: the weighted average is the plain average.
            let age = TimeDelta::seconds((86_400.0 + weeks * SECONDS_PER_WEEK) as i64);
            let calls: Vec<Call> = gains.iter().map(|g| call("T", 100.0 + g, age)).collect();
            let power = CallingPowerEngine::default().compute_power(&calls, now()).calling_power;
            let lo = gains.iter().cloned().fold(f64::INFINITY, f64::min);
            let hi = gains.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
            prop_assert!(power >= lo - 1e-6 && power <= hi + 1e-6);
        }
    }
}
