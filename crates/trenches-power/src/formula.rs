//! Power formula strategies and their named presets.
//!
//! A [`PowerFormula`] is a bundle of plain functions; presets only choose
//! which ones to combine. The scoring pipeline itself lives in
//! [`engine`](crate::engine).

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use trenches_core::types::CallPerformance;

use crate::aggregate::{
    constancy_factor, logarithmic_total_factor, no_factor, success_rate, total_performance,
    total_weight,
};
use crate::performance::call_performance_percentage;
use crate::sigmoid::Normalization;
use crate::temporal::{no_weight, temporal_weight_formula};

pub type CallScoreFn = fn(&CallPerformance) -> f64;
pub type AggregateFn = fn(&[CallPerformance]) -> f64;

/// One scoring variant.
#[derive(Clone, Copy, Debug)]
pub struct PowerFormula {
    pub name: &'static str,
    pub call_performance: CallScoreFn,
    pub call_weight: CallScoreFn,
    pub base_performance: AggregateFn,
    /// Divisor applied to the base score.
    pub correction: AggregateFn,
    /// Multiplier applied after the correction.
    pub constancy: AggregateFn,
    pub normalization: Normalization,
}

impl PowerFormula {
    /// Recency weighted gains divided by the total weight.
    pub fn standard() -> Self {
        Self {
            name: "standard",
            call_performance: call_performance_percentage,
            call_weight: temporal_weight_formula,
            base_performance: total_performance,
            correction: total_weight,
            constancy: no_factor,
            normalization: Normalization::Identity,
        }
    }

    /// Recency weighted gains dampened by `1 + ln(count)`.
    pub fn logarithmic() -> Self {
        Self {
            name: "logarithmic",
            call_performance: call_performance_percentage,
            call_weight: temporal_weight_formula,
            base_performance: total_performance,
            correction: logarithmic_total_factor,
            constancy: no_factor,
            normalization: Normalization::Identity,
        }
    }

    /// Unweighted success rate scaled by how steady the gains are.
    pub fn consistency() -> Self {
        Self {
            name: "consistency",
            call_performance: call_performance_percentage,
            call_weight: no_weight,
            base_performance: success_rate,
            correction: no_factor,
            constancy: constancy_factor,
            normalization: Normalization::Identity,
        }
    }

    pub fn with_normalization(mut self, normalization: Normalization) -> Self {
        self.normalization = normalization;
        self
    }
}

impl Default for PowerFormula {
    fn default() -> Self {
        FormulaPreset::ACTIVE.formula()
    }
}

/// Closed set of registered formulas.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum FormulaPreset {
    #[default]
    Standard,
    Logarithmic,
    Consistency,
}

impl FormulaPreset {
    /// The preset whose output is persisted as caller power.
    pub const ACTIVE: FormulaPreset = FormulaPreset::Standard;

    pub const ALL: [FormulaPreset; 3] = [
        FormulaPreset::Standard,
        FormulaPreset::Logarithmic,
        FormulaPreset::Consistency,
    ];

    pub fn formula(self) -> PowerFormula {
        match self {
            Self::Standard => PowerFormula::standard(),
            Self::Logarithmic => PowerFormula::logarithmic(),
            Self::Consistency => PowerFormula::consistency(),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Standard => "standard",
            Self::Logarithmic => "logarithmic",
            Self::Consistency => "consistency",
        }
    }
}

impl fmt::Display for FormulaPreset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FormulaPreset {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|preset| preset.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| {
                format!("unknown formula preset '{s}' (expected standard, logarithmic or consistency)")
            })
    }
}
