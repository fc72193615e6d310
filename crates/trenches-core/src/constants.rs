//! League constants. Valuations are FDV in USD, durations in seconds.

/// Number of callers a wallet picks when joining a tournament.
pub const PARTICIPATION_CALLERS: usize = 3;

/// Length of the ramp-up window for a fresh call, in hours.
///
/// Calls younger than this gain weight progressively; older calls decay.
pub const CALL_RAMP_HOURS: f64 = 24.0;

/// Base of the ramp-up curve: `1 - RAMP_BASE^(age_hours / CALL_RAMP_HOURS)`.
///
/// A 1h old call weighs about 0.17, a 12h old call 0.9.
pub const RAMP_BASE: f64 = 0.01;

pub const SECONDS_PER_HOUR: f64 = 3_600.0;
pub const SECONDS_PER_WEEK: f64 = 7.0 * 24.0 * SECONDS_PER_HOUR;

/// Default sigmoid steepness for normalized power.
pub const SIGMOID_STEEPNESS: f64 = 4.0;

/// Default relative score at which the sigmoid reaches half of its maximum.
pub const SIGMOID_MIDPOINT: f64 = 0.5;

/// Default score that maps to the sigmoid midpoint scale (relative score 1.0).
pub const DEFAULT_REFERENCE_SCORE: f64 = 100.0;

/// Default upper bound of normalized power.
pub const DEFAULT_MAX_SCORE: f64 = 100.0;

/// Horizons (hours before "now") reported by caller power explanations.
pub const EXPLAIN_HORIZONS_HOURS: [i64; 2] = [12, 24];
