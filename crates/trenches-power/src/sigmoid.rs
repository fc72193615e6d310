//! Sigmoid normalization of raw calling power onto a bounded display scale.
//!
//! Raw power is unbounded: a single 100x call produces a score in the
//! thousands. The normalizer squashes it into `[0, max_score]` with a
//! logistic curve centred at `midpoint * reference_score`:
//!
//! ```text
//! normalized = round(max / (1 + exp(-k * (max(0, s) / ref - mid))))
//! ```

use serde::{Deserialize, Serialize};
use trenches_core::constants::{
    DEFAULT_MAX_SCORE, DEFAULT_REFERENCE_SCORE, SIGMOID_MIDPOINT, SIGMOID_STEEPNESS,
};
use trenches_core::error::PowerError;

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq)]
pub struct SigmoidNormalizer {
    /// Raw score mapped to relative score 1.0.
    pub reference_score: f64,
    /// Upper bound of the output.
    pub max_score: f64,
    pub steepness: f64,
    /// Relative score at which the output is `max_score / 2`.
    pub midpoint: f64,
}

impl SigmoidNormalizer {
    /// Normalizer with the default steepness and midpoint.
    pub fn new(reference_score: f64, max_score: f64) -> Result<Self, PowerError> {
        Self::with_shape(reference_score, max_score, SIGMOID_STEEPNESS, SIGMOID_MIDPOINT)
    }

    pub fn with_shape(
        reference_score: f64,
        max_score: f64,
        steepness: f64,
        midpoint: f64,
    ) -> Result<Self, PowerError> {
        if !(reference_score.is_finite() && reference_score > 0.0) {
            return Err(PowerError::InvalidNormalization(format!(
                "reference score must be positive, got {reference_score}"
            )));
        }
        if !(max_score.is_finite() && max_score > 0.0) {
            return Err(PowerError::InvalidNormalization(format!(
                "max score must be positive, got {max_score}"
            )));
        }
        if !steepness.is_finite() || !midpoint.is_finite() {
            return Err(PowerError::InvalidNormalization(
                "steepness and midpoint must be finite".into(),
            ));
        }
        Ok(Self {
            reference_score,
            max_score,
            steepness,
            midpoint,
        })
    }

    pub fn apply(&self, score: f64) -> f64 {
        let relative = score.max(0.0) / self.reference_score;
        let raw = self.max_score / (1.0 + (-self.steepness * (relative - self.midpoint)).exp());
        raw.round().clamp(0.0, self.max_score)
    }
}

impl Default for SigmoidNormalizer {
    fn default() -> Self {
        Self {
            reference_score: DEFAULT_REFERENCE_SCORE,
            max_score: DEFAULT_MAX_SCORE,
            steepness: SIGMOID_STEEPNESS,
            midpoint: SIGMOID_MIDPOINT,
        }
    }
}

/// Final mapping from raw calling power to the persisted value.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Default)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Normalization {
    #[default]
    Identity,
    Sigmoid(SigmoidNormalizer),
}

impl Normalization {
    pub fn apply(&self, score: f64) -> f64 {
        match self {
            Self::Identity => score,
            Self::Sigmoid(sigmoid) => sigmoid.apply(score),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn reference_score_lands_above_half() {
        let s = SigmoidNormalizer::new(100.0, 100.0).unwrap();
        // 100 / (1 + e^-2) = 88.08
        assert_eq!(s.apply(100.0), 88.0);
        assert!(s.apply(100.0) > 50.0);
    }

    #[test]
    fn zero_lands_below_half() {
        let s = SigmoidNormalizer::default();
        // 100 / (1 + e^2) = 11.92
        assert_eq!(s.apply(0.0), 12.0);
    }

    #[test]
    fn midpoint_is_half_of_max() {
        let s = SigmoidNormalizer::new(200.0, 10.0).unwrap();
        assert_eq!(s.apply(100.0), 5.0);
    }

    #[test]
    fn negative_scores_clamp_to_zero_input() {
        let s = SigmoidNormalizer::default();
        assert_eq!(s.apply(-500.0), s.apply(0.0));
    }

    #[test]
    fn huge_scores_saturate_at_max() {
        let s = SigmoidNormalizer::default();
        assert_eq!(s.apply(1e12), 100.0);
    }

    #[test]
    fn invalid_shapes_rejected() {
        assert!(SigmoidNormalizer::new(0.0, 100.0).is_err());
        assert!(SigmoidNormalizer::new(100.0, -1.0).is_err());
        assert!(SigmoidNormalizer::with_shape(100.0, 100.0, f64::NAN, 0.5).is_err());
    }

    #[test]
    fn identity_passes_through() {
        assert_eq!(Normalization::Identity.apply(-3.5), -3.5);
        assert_eq!(Normalization::default(), Normalization::Identity);
    }

    #[test]
    fn normalization_serde_tagged() {
        let json = serde_json::to_string(&Normalization::Identity).unwrap();
        assert_eq!(json, r#"{"kind":"identity"}"#);
        let back: Normalization = serde_json::from_str(
            r#"{"kind":"sigmoid","reference_score":50.0,"max_score":10.0,"steepness":4.0,"midpoint":0.5}"#,
        )
        .unwrap();
        assert_eq!(
            back,
            Normalization::Sigmoid(SigmoidNormalizer::new(50.0, 10.0).unwrap())
        );
    }

    proptest! {
        #[test]
        fn output_bounded_and_integral(score in -1e6f64..1e9) {
            let v = SigmoidNormalizer::default().apply(score);
            prop_assert!((0.0..=100.0).contains(&v));
            prop_assert_eq!(v, v.round());
        }

        #[test]
        fn monotone_non_decreasing(a in 0.0f64..1e4, delta in 0.0f64..1e4) {
            let s = SigmoidNormalizer::default();
            prop_assert!(s.apply(a + delta) >= s.apply(a));
        }
    }
}
