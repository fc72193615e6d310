//! Operator view of how a caller's power came about.

use chrono::{DateTime, TimeDelta, Utc};
use serde::Serialize;
use trenches_core::constants::EXPLAIN_HORIZONS_HOURS;
use trenches_core::traits::PowerCalculator;
use trenches_core::types::{Call, CallingPowerData};

/// Power the caller had some hours earlier.
#[derive(Serialize, Clone, Debug, PartialEq)]
pub struct PastPower {
    pub hours_ago: i64,
    pub as_of: DateTime<Utc>,
    /// Calls that already existed at that instant.
    pub calls: usize,
    pub power: f64,
}

#[derive(Serialize, Clone, Debug, PartialEq)]
pub struct PowerExplanation {
    pub as_of: DateTime<Utc>,
    pub current: CallingPowerData,
    pub history: Vec<PastPower>,
}

/// Score `calls` now and at each explain horizon, only counting calls
/// created by then.
pub fn explain_caller(
    calls: &[Call],
    calculator: &dyn PowerCalculator,
    as_of: DateTime<Utc>,
) -> PowerExplanation {
    let history = EXPLAIN_HORIZONS_HOURS
        .iter()
        .map(|&hours| {
            let then = as_of - TimeDelta::hours(hours);
            let known: Vec<Call> = calls
                .iter()
                .filter(|c| c.created_at <= then)
                .cloned()
                .collect();
            PastPower {
                hours_ago: hours,
                as_of: then,
                calls: known.len(),
                power: calculator.normalized_power(&known, then),
            }
        })
        .collect();

    PowerExplanation {
        as_of,
        current: calculator.compute_power(calls, as_of),
        history,
    }
}
