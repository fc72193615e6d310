//! Power refresh: recompute and persist caller power.
//!
//! Histories are read first, scored in parallel with rayon, then written
//! back one caller at a time. A failure on one caller is logged and
//! recorded in the [`RefreshReport`]; the rest of the batch proceeds.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use rayon::prelude::*;
use trenches_core::error::{StoreError, TrenchesError};
use trenches_core::traits::{CallHistory, CallerStore, PowerCalculator};
use trenches_core::types::{Call, CallerId};

use crate::ranking::{Ranked, RankingService};

/// A caller whose power could not be refreshed.
#[derive(Debug)]
pub struct RefreshFailure {
    pub caller: CallerId,
    pub error: TrenchesError,
}

/// Outcome of a refresh batch.
#[derive(Debug, Default)]
pub struct RefreshReport {
    /// Callers written, with the persisted power.
    pub updated: Vec<(CallerId, f64)>,
    pub failed: Vec<RefreshFailure>,
}

impl RefreshReport {
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }

    fn fail(&mut self, caller: CallerId, error: TrenchesError) {
        tracing::warn!(caller = %caller, error = %error, "refresh: caller skipped");
        self.failed.push(RefreshFailure { caller, error });
    }
}

pub struct PowerRefresher {
    history: Arc<dyn CallHistory>,
    callers: Arc<dyn CallerStore>,
    calculator: Arc<dyn PowerCalculator>,
}

impl PowerRefresher {
    pub fn new(
        history: Arc<dyn CallHistory>,
        callers: Arc<dyn CallerStore>,
        calculator: Arc<dyn PowerCalculator>,
    ) -> Self {
        Self {
            history,
            callers,
            calculator,
        }
    }

    /// Refresh every known caller.
    pub fn refresh_all(&self, as_of: DateTime<Utc>) -> Result<RefreshReport, StoreError> {
        let ids: Vec<CallerId> = self.callers.callers()?.into_iter().map(|c| c.id).collect();
        Ok(self.refresh_callers(&ids, as_of))
    }

    /// Refresh the callers having at least one call on any of the tokens.
    pub fn refresh_for_tokens(
        &self,
        tokens: &[String],
        as_of: DateTime<Utc>,
    ) -> Result<RefreshReport, StoreError> {
        let ids = self.history.callers_with_calls_on(tokens)?;
        tracing::debug!(
            tokens = tokens.len(),
            callers = ids.len(),
            "refresh: callers affected by token update"
        );
        Ok(self.refresh_callers(&ids, as_of))
    }

    /// Refresh the given callers.
    pub fn refresh_callers(&self, ids: &[CallerId], as_of: DateTime<Utc>) -> RefreshReport {
        let mut report = RefreshReport::default();

        let mut histories: Vec<(CallerId, Vec<Call>)> = Vec::with_capacity(ids.len());
        for &id in ids {
            match self.history.calls_by_caller(id) {
                Ok(calls) => histories.push((id, calls)),
                Err(e) => report.fail(id, e.into()),
            }
        }

        let calculator = &self.calculator;
        let scored: Vec<_> = histories
            .par_iter()
            .map(|(id, calls)| (*id, calculator.compute_power(calls, as_of)))
            .collect();

        for (id, data) in scored {
            if let Err(e) = data.ensure_finite() {
                report.fail(id, e.into());
                continue;
            }
            match self.callers.set_power(id, data.normalized) {
                Ok(()) => report.updated.push((id, data.normalized)),
                Err(e) => report.fail(id, e.into()),
            }
        }

        tracing::info!(
            updated = report.updated.len(),
            failed = report.failed.len(),
            "refresh: caller power updated"
        );
        report
    }

    /// Refresh every caller, then re-rank the leaderboard.
    pub fn refresh_and_rank(
        &self,
        ranking: &RankingService,
        as_of: DateTime<Utc>,
    ) -> Result<(RefreshReport, Vec<Ranked<CallerId>>), StoreError> {
        let report = self.refresh_all(as_of)?;
        let ranked = ranking.rank_callers()?;
        Ok((report, ranked))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeDelta, TimeZone};
    use trenches_core::error::PowerError;
    use trenches_core::memory::MemoryStore;
    use trenches_core::types::Caller;
    use trenches_power::{CallingPowerEngine, FormulaPreset};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 12, 1, 0, 0, 0).unwrap()
    }

    fn store() -> Arc<MemoryStore> {
        let store = Arc::new(MemoryStore::new());
        for (id, name) in [(1, "alpha"), (2, "beta"), (3, "gamma")] {
            store.insert_caller(Caller::new(CallerId(id), name));
        }
        let day_old = now() - TimeDelta::days(1);
        store
            .insert_call(Call::new(CallerId(1), "BONK", 100.0, day_old).with_highest(300.0))
            .unwrap();
        store
            .insert_call(Call::new(CallerId(2), "WIF", 100.0, day_old).with_highest(150.0))
            .unwrap();
        store
    }

    fn refresher(store: &Arc<MemoryStore>) -> PowerRefresher {
        PowerRefresher::new(
            store.clone(),
            store.clone(),
            Arc::new(CallingPowerEngine::from_preset(FormulaPreset::Standard)),
        )
    }

    fn power(store: &MemoryStore, id: u64) -> Option<f64> {
        store.caller(CallerId(id)).unwrap().unwrap().power
    }

    #[test]
    fn refresh_all_persists_normalized_power() {
        let store = store();
        let report = refresher(&store).refresh_all(now()).unwrap();
        assert!(report.is_clean());
        assert_eq!(report.updated.len(), 3);
        assert_eq!(power(&store, 1), Some(200.0));
        assert_eq!(power(&store, 2), Some(50.0));
        // No calls: zeroed.
        assert_eq!(power(&store, 3), Some(0.0));
    }

    #[test]
    fn refresh_for_tokens_only_touches_affected() {
        let store = store();
        let report = refresher(&store)
            .refresh_for_tokens(&["WIF".to_string()], now())
            .unwrap();
        assert_eq!(report.updated, vec![(CallerId(2), 50.0)]);
        assert_eq!(power(&store, 1), None);
    }

    #[test]
    fn bad_call_data_is_skipped_not_persisted() {
        let store = store();
        store
            .insert_call(
                Call::new(CallerId(3), "ZERO", 0.0, now() - TimeDelta::days(2)).with_highest(1.0),
            )
            .unwrap();
        let report = refresher(&store).refresh_all(now()).unwrap();
        assert_eq!(report.updated.len(), 2);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].caller, CallerId(3));
        assert!(matches!(
            report.failed[0].error,
            TrenchesError::Power(PowerError::NonFinitePerformance { .. })
        ));
        assert_eq!(power(&store, 3), None);
    }

    #[test]
    fn negative_start_fdv_is_skipped_not_persisted() {
        let store = store();
        store
            .insert_call(
                Call::new(CallerId(3), "NEG", -100.0, now() - TimeDelta::days(1)).with_highest(50.0),
            )
            .unwrap();
        let report = refresher(&store).refresh_all(now()).unwrap();
        assert_eq!(report.updated.len(), 2);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].caller, CallerId(3));
        assert!(matches!(
            &report.failed[0].error,
            TrenchesError::Power(PowerError::InvalidStartFdv { token_address, .. })
                if token_address == "NEG"
        ));
        assert_eq!(power(&store, 3), None);
    }

    #[test]
    fn unknown_caller_reported() {
        let store = store();
        let report = refresher(&store).refresh_callers(&[CallerId(1), CallerId(42)], now());
        assert_eq!(report.updated.len(), 1);
        assert!(matches!(
            report.failed[0].error,
            TrenchesError::Store(StoreError::CallerNotFound(CallerId(42)))
        ));
    }

    #[test]
    fn refresh_and_rank_orders_by_new_power() {
        let store = store();
        let ranking = RankingService::new(store.clone());
        let (report, ranked) = refresher(&store).refresh_and_rank(&ranking, now()).unwrap();
        assert!(report.is_clean());
        let order: Vec<_> = ranked.iter().map(|r| r.id).collect();
        assert_eq!(order, vec![CallerId(1), CallerId(2), CallerId(3)]);
        assert_eq!(store.caller(CallerId(1)).unwrap().unwrap().rank, Some(1));
    }
}
