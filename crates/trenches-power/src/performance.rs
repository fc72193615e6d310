//! Call performance model: raw call to per-evaluation observation.

use chrono::{DateTime, Utc};
use trenches_core::types::{Call, CallPerformance};

/// Project a call onto an evaluation instant.
///
/// `age_secs` is clamped at zero for calls dated after `as_of`. The scoring
/// fields are left at zero for the formula to fill in.
pub fn to_performance(call: &Call, as_of: DateTime<Utc>) -> CallPerformance {
    let age_ms = (as_of - call.created_at).num_milliseconds().max(0);
    CallPerformance {
        token_address: call.token_address.clone(),
        start_fdv: call.start_fdv,
        highest_fdv: call.highest_fdv,
        created_at: call.created_at,
        age_secs: age_ms as f64 / 1_000.0,
        performance: 0.0,
        temporal_weight: 0.0,
        final_perf: 0.0,
    }
}

/// Percentage gain from start to highest valuation.
///
/// A zero start valuation yields a non-finite value; the engine leaves it in
/// place so that [`CallingPowerData::ensure_finite`] can report the call.
///
/// [`CallingPowerData::ensure_finite`]: trenches_core::types::CallingPowerData::ensure_finite
pub fn call_performance_percentage(perf: &CallPerformance) -> f64 {
    (perf.highest_fdv - perf.start_fdv) / perf.start_fdv * 100.0
}
