//! Market valuation updates feeding the call history.

use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use trenches_core::error::StoreError;
use trenches_core::traits::CallHistory;
use trenches_core::types::CallerId;

/// One sample of a token's valuation history.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq)]
pub struct FdvSample {
    pub timestamp: DateTime<Utc>,
    /// Highest valuation within the sample interval.
    pub highest: f64,
}

/// Highest valuation sampled strictly after `after`, or 0 if none.
pub fn highest_fdv_after(history: &[FdvSample], after: DateTime<Utc>) -> f64 {
    history
        .iter()
        .filter(|s| s.timestamp > after && s.highest.is_finite())
        .map(|s| s.highest)
        .fold(0.0, f64::max)
}

/// Raises recorded call peaks from fresh market data.
pub struct MarketUpdater {
    history: Arc<dyn CallHistory>,
}

impl MarketUpdater {
    pub fn new(history: Arc<dyn CallHistory>) -> Self {
        Self { history }
    }

    /// Apply a new valuation for one token. Returns the callers whose calls
    /// reached a new high and therefore need a power refresh.
    pub fn apply(&self, token: &str, fdv: f64) -> Result<Vec<CallerId>, StoreError> {
        if !(fdv.is_finite() && fdv > 0.0) {
            tracing::warn!(token, fdv, "market: ignoring invalid valuation");
            return Ok(Vec::new());
        }
        let raised = self.history.raise_highest_fdv(token, fdv)?;
        if !raised.is_empty() {
            tracing::debug!(token, fdv, callers = raised.len(), "market: new high");
        }
        Ok(raised)
    }

    /// Apply a batch of `(token, fdv)` updates. Returns the distinct
    /// affected callers.
    pub fn apply_all(&self, updates: &[(String, f64)]) -> Result<Vec<CallerId>, StoreError> {
        let mut affected = BTreeSet::new();
        for (token, fdv) in updates {
            affected.extend(self.apply(token, *fdv)?);
        }
        tracing::info!(
            updates = updates.len(),
            callers = affected.len(),
            "market: valuations applied"
        );
        Ok(affected.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeDelta, TimeZone};
    use trenches_core::memory::MemoryStore;
    use trenches_core::types::{Call, Caller};

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 11, 1, 0, 0, 0).unwrap()
    }

    fn sample(minutes: i64, highest: f64) -> FdvSample {
        FdvSample {
            timestamp: t0() + TimeDelta::minutes(minutes),
            highest,
        }
    }

    #[test]
    fn highest_after_is_strict() {
        let history = [sample(0, 900.0), sample(10, 400.0), sample(20, 700.0)];
        assert_eq!(highest_fdv_after(&history, t0()), 700.0);
        assert_eq!(highest_fdv_after(&history, t0() - TimeDelta::minutes(1)), 900.0);
        assert_eq!(highest_fdv_after(&history, t0() + TimeDelta::minutes(20)), 0.0);
        assert_eq!(highest_fdv_after(&[], t0()), 0.0);
    }

    fn store() -> Arc<MemoryStore> {
        let store = Arc::new(MemoryStore::new());
        store.insert_caller(Caller::new(CallerId(1), "a"));
        store.insert_caller(Caller::new(CallerId(2), "b"));
        store
            .insert_call(Call::new(CallerId(1), "BONK", 100.0, t0()))
            .unwrap();
        store
            .insert_call(Call::new(CallerId(2), "BONK", 300.0, t0()))
            .unwrap();
        store
            .insert_call(Call::new(CallerId(2), "WIF", 50.0, t0()))
            .unwrap();
        store
    }

    #[test]
    fn apply_returns_callers_with_new_highs() {
        let store = store();
        let updater = MarketUpdater::new(store.clone());
        assert_eq!(updater.apply("BONK", 200.0).unwrap(), vec![CallerId(1)]);
        assert!(updater.apply("BONK", 150.0).unwrap().is_empty());
        assert!(updater.apply("BONK", f64::NAN).unwrap().is_empty());
        assert!(updater.apply("BONK", -1.0).unwrap().is_empty());
    }

    #[test]
    fn apply_all_dedupes() {
        let store = store();
        let updater = MarketUpdater::new(store.clone());
        let affected = updater
            .apply_all(&[("BONK".into(), 1_000.0), ("WIF".into(), 60.0)])
            .unwrap();
        assert_eq!(affected, vec![CallerId(1), CallerId(2)]);
        let wif = store
            .calls_by_caller(CallerId(2))
            .unwrap()
            .into_iter()
            .find(|c| c.token_address == "WIF")
            .unwrap();
        assert_eq!(wif.highest_fdv, 60.0);
    }
}
