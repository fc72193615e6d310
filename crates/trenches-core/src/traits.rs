//! Trait interfaces for the Trenches league.
//!
//! These traits define the contracts between crates:
//! - [`PowerCalculator`] for calling power scoring (trenches-power implements)
//! - [`CallHistory`] for call records per caller and per token
//! - [`CallerStore`] for callers with their power and rank
//! - [`TournamentStore`] for tournaments, participations and power snapshots
//!
//! The three store traits are implemented by [`MemoryStore`](crate::memory::MemoryStore)
//! and take `&self`: implementations provide their own interior locking.

use chrono::{DateTime, Utc};

use crate::error::StoreError;
use crate::types::{
    Call, Caller, CallerId, CallingPowerData, ParticipationId, ParticipationResult, Tournament,
    TournamentCallerPower, TournamentId, TournamentParticipation, TournamentStatus,
};

/// Pure computation of a caller's power from their call history.
///
/// Implementations must be deterministic: the same calls and the same
/// `as_of` instant produce bit-identical results.
pub trait PowerCalculator: Send + Sync {
    /// Score a call history as of the given instant.
    ///
    /// An empty history yields [`CallingPowerData::zeroed`].
    fn compute_power(&self, calls: &[Call], as_of: DateTime<Utc>) -> CallingPowerData;

    /// Only the persisted value of [`compute_power`](Self::compute_power).
    fn normalized_power(&self, calls: &[Call], as_of: DateTime<Utc>) -> f64 {
        self.compute_power(calls, as_of).normalized
    }
}

/// Read and update access to recorded calls.
pub trait CallHistory: Send + Sync {
    /// All calls made by a caller, in creation order.
    fn calls_by_caller(&self, caller: CallerId) -> Result<Vec<Call>, StoreError>;

    /// Distinct callers having at least one call on any of the tokens.
    fn callers_with_calls_on(&self, tokens: &[String]) -> Result<Vec<CallerId>, StoreError>;

    /// Raise `highest_fdv` of every call on `token` to `value` where it is
    /// currently lower. Returns the callers whose calls changed.
    fn raise_highest_fdv(&self, token: &str, value: f64) -> Result<Vec<CallerId>, StoreError>;
}

/// Callers and their league values.
pub trait CallerStore: Send + Sync {
    /// Every known caller.
    fn callers(&self) -> Result<Vec<Caller>, StoreError>;

    /// Look up one caller. Returns `None` if unknown.
    fn caller(&self, id: CallerId) -> Result<Option<Caller>, StoreError>;

    /// Persist a caller's normalized power.
    ///
    /// # Errors
    ///
    /// [`StoreError::CallerNotFound`] if the caller does not exist.
    fn set_power(&self, id: CallerId, power: f64) -> Result<(), StoreError>;

    /// Persist a caller's leaderboard rank.
    ///
    /// # Errors
    ///
    /// [`StoreError::CallerNotFound`] if the caller does not exist.
    fn set_rank(&self, id: CallerId, rank: u32) -> Result<(), StoreError>;
}

/// Tournaments, participations and frozen caller power.
pub trait TournamentStore: Send + Sync {
    fn tournament(&self, id: TournamentId) -> Result<Option<Tournament>, StoreError>;

    fn tournaments(&self) -> Result<Vec<Tournament>, StoreError>;

    /// Participations of a tournament, in join order.
    fn participations(
        &self,
        tournament: TournamentId,
    ) -> Result<Vec<TournamentParticipation>, StoreError>;

    /// Register a wallet's pick. A wallet joins a tournament at most once.
    ///
    /// # Errors
    ///
    /// [`StoreError::TournamentNotFound`] or [`StoreError::DuplicateParticipation`].
    fn insert_participation(
        &self,
        tournament: TournamentId,
        wallet_pubkey: &str,
        callers: Vec<CallerId>,
    ) -> Result<TournamentParticipation, StoreError>;

    /// Insert one snapshot row per `(caller, power)` pair, ignoring callers
    /// already frozen for this tournament. Returns every snapshot row of the
    /// tournament after the insert.
    ///
    /// # Errors
    ///
    /// [`StoreError::Frozen`] once the tournament is completed.
    fn freeze_caller_powers(
        &self,
        tournament: TournamentId,
        powers: &[(CallerId, f64)],
    ) -> Result<Vec<TournamentCallerPower>, StoreError>;

    fn caller_powers(
        &self,
        tournament: TournamentId,
    ) -> Result<Vec<TournamentCallerPower>, StoreError>;

    /// Store a participation's settled score and rank.
    ///
    /// # Errors
    ///
    /// [`StoreError::ParticipationNotFound`], or [`StoreError::Frozen`] once
    /// the tournament is completed.
    fn record_result(
        &self,
        participation: ParticipationId,
        result: ParticipationResult,
    ) -> Result<(), StoreError>;

    /// Compare-and-set the tournament status. Moving to
    /// [`TournamentStatus::Started`] stamps `started_at` with `at`.
    ///
    /// # Errors
    ///
    /// [`StoreError::StatusMismatch`] if the current status is not `expected`.
    fn transition(
        &self,
        tournament: TournamentId,
        expected: TournamentStatus,
        next: TournamentStatus,
        at: DateTime<Utc>,
    ) -> Result<Tournament, StoreError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::CallPerformance;
    use std::collections::HashMap;

    // Compile-time check: all traits must be object-safe.
    fn _assert_object_safe(
        _: &dyn PowerCalculator,
        _: &dyn CallHistory,
        _: &dyn CallerStore,
        _: &dyn TournamentStore,
    ) {
    }

    /// Scores a history as the plain sum of percentage gains.
    struct MockCalculator;

    impl PowerCalculator for MockCalculator {
        fn compute_power(&self, calls: &[Call], as_of: DateTime<Utc>) -> CallingPowerData {
            if calls.is_empty() {
                return CallingPowerData::zeroed();
            }
            let performances: Vec<CallPerformance> = calls
                .iter()
                .map(|c| {
                    let performance = (c.highest_fdv - c.start_fdv) / c.start_fdv * 100.0;
                    CallPerformance {
                        token_address: c.token_address.clone(),
                        start_fdv: c.start_fdv,
                        highest_fdv: c.highest_fdv,
                        created_at: c.created_at,
                        age_secs: (as_of - c.created_at).num_seconds().max(0) as f64,
                        performance,
                        temporal_weight: 1.0,
                        final_perf: performance,
                    }
                })
                .collect();
            let total: f64 = performances.iter().map(|p| p.final_perf).sum();
            CallingPowerData {
                base_performance: total,
                avg_performance: total / performances.len() as f64,
                correction: 1.0,
                constancy: 1.0,
                calling_power: total,
                normalized: total,
                performances,
            }
        }
    }

    struct MockCallers {
        callers: HashMap<CallerId, Caller>,
    }

    impl CallerStore for MockCallers {
        fn callers(&self) -> Result<Vec<Caller>, StoreError> {
            Ok(self.callers.values().cloned().collect())
        }

        fn caller(&self, id: CallerId) -> Result<Option<Caller>, StoreError> {
            Ok(self.callers.get(&id).cloned())
        }

        fn set_power(&self, id: CallerId, _power: f64) -> Result<(), StoreError> {
            if self.callers.contains_key(&id) {
                Ok(())
            } else {
                Err(StoreError::CallerNotFound(id))
            }
        }

        fn set_rank(&self, id: CallerId, _rank: u32) -> Result<(), StoreError> {
            self.set_power(id, 0.0)
        }
    }

    fn t0() -> DateTime<Utc> {
        use chrono::TimeZone;
        Utc.with_ymd_and_hms(2024, 11, 1, 0, 0, 0).unwrap()
    }

    #[test]
    fn calculator_default_normalized_power() {
        let calc = MockCalculator;
        let calls = vec![Call::new(CallerId(1), "tok", 100.0, t0()).with_highest(250.0)];
        assert_eq!(calc.normalized_power(&calls, t0()), 150.0);
    }

    #[test]
    fn calculator_empty_history_is_zeroed() {
        let calc = MockCalculator;
        assert_eq!(calc.compute_power(&[], t0()), CallingPowerData::zeroed());
    }

    #[test]
    fn calculator_as_trait_object() {
        let calc: Box<dyn PowerCalculator> = Box::new(MockCalculator);
        let calls = vec![Call::new(CallerId(1), "tok", 100.0, t0())];
        assert_eq!(calc.normalized_power(&calls, t0()), 0.0);
    }

    #[test]
    fn caller_store_as_trait_object() {
        let mut callers = HashMap::new();
        callers.insert(CallerId(1), Caller::new(CallerId(1), "alpha"));
        let store: Box<dyn CallerStore> = Box::new(MockCallers { callers });
        assert_eq!(store.callers().unwrap().len(), 1);
        assert!(store.set_power(CallerId(1), 3.0).is_ok());
        assert_eq!(
            store.set_rank(CallerId(9), 1),
            Err(StoreError::CallerNotFound(CallerId(9)))
        );
    }
}
