//! Time weighting of calls.
//!
//! A fresh call ramps up over its first [`CALL_RAMP_HOURS`] hours towards
//! `1 - RAMP_BASE`, has full weight at exactly 24h, then decays
//! hyperbolically with the number of weeks elapsed since:
//!
//! ```text
//! age < 24h   1 - 0.01^(age_hours / 24)
//! age >= 24h  1 / (1 + weeks_past_ramp)
//! ```

use trenches_core::constants::{CALL_RAMP_HOURS, RAMP_BASE, SECONDS_PER_HOUR, SECONDS_PER_WEEK};
use trenches_core::types::CallPerformance;

/// Temporal weight in `[0, 1]` for a call of the given age.
pub fn temporal_weight_at(age_secs: f64) -> f64 {
    let age_secs = age_secs.max(0.0);
    let ramp_secs = CALL_RAMP_HOURS * SECONDS_PER_HOUR;
    if age_secs < ramp_secs {
        let age_hours = age_secs / SECONDS_PER_HOUR;
        1.0 - RAMP_BASE.powf(age_hours / CALL_RAMP_HOURS)
    } else {
        let weeks = (age_secs - ramp_secs) / SECONDS_PER_WEEK;
        1.0 / (1.0 + weeks)
    }
}

pub fn temporal_weight_formula(perf: &CallPerformance) -> f64 {
    temporal_weight_at(perf.age_secs)
}

/// Every call weighs the same.
pub fn no_weight(_perf: &CallPerformance) -> f64 {
    1.0
}
