//! Aggregates over a scored call list: base scores, corrections and
//! constancy factors.
//!
//! Every function is total. Empty lists yield 0 for base scores and the
//! neutral value for factors, so no caller ever divides by zero here.

use trenches_core::types::CallPerformance;

// --- base performance ---

/// Fraction of calls with a positive gain.
pub fn success_rate(perfs: &[CallPerformance]) -> f64 {
    if perfs.is_empty() {
        return 0.0;
    }
    let wins = perfs.iter().filter(|p| p.performance > 0.0).count();
    wins as f64 / perfs.len() as f64
}

/// Sum of weighted performance.
pub fn total_performance(perfs: &[CallPerformance]) -> f64 {
    perfs.iter().map(|p| p.final_perf).sum()
}

/// Mean weighted performance.
pub fn average(perfs: &[CallPerformance]) -> f64 {
    if perfs.is_empty() {
        return 0.0;
    }
    total_performance(perfs) / perfs.len() as f64
}

// --- corrections ---

pub fn no_factor(_perfs: &[CallPerformance]) -> f64 {
    1.0
}

/// Sum of temporal weights.
pub fn total_weight(perfs: &[CallPerformance]) -> f64 {
    perfs.iter().map(|p| p.temporal_weight).sum()
}

/// `1 + ln(count)`: dampens the advantage of sheer call volume.
pub fn logarithmic_total_factor(perfs: &[CallPerformance]) -> f64 {
    if perfs.is_empty() {
        return 1.0;
    }
    1.0 + (perfs.len() as f64).ln()
}

// --- constancy ---

/// Population standard deviation of weighted performance.
pub fn population_std_dev(perfs: &[CallPerformance]) -> f64 {
    if perfs.is_empty() {
        return 0.0;
    }
    let mean = average(perfs);
    let variance = perfs
        .iter()
        .map(|p| (p.final_perf - mean).powi(2))
        .sum::<f64>()
        / perfs.len() as f64;
    variance.sqrt()
}

/// `average / (std_dev + 1)`: rewards callers whose results are steady.
pub fn constancy_factor(perfs: &[CallPerformance]) -> f64 {
    average(perfs) / (population_std_dev(perfs) + 1.0)
}
