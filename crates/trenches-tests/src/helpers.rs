//! Shared test helpers for integration tests.

use std::sync::Arc;

use chrono::{DateTime, TimeDelta, TimeZone, Utc};
use trenches_core::memory::MemoryStore;
use trenches_core::types::{
    Call, Caller, CallerId, Tournament, TournamentId, TournamentMetadata,
};
use trenches_league::{
    MarketUpdater, PowerRefresher, RankingService, TournamentLifecycle,
};
use trenches_power::{CallingPowerEngine, FormulaPreset};

/// Fixed evaluation instant used across scenarios.
pub fn epoch() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 11, 4, 0, 0, 0).unwrap()
}

/// A call from `caller` on `token`, made `age` before `as_of`, that went
/// from `start` to `highest`.
pub fn call_aged(
    caller: u64,
    token: &str,
    start: f64,
    highest: f64,
    as_of: DateTime<Utc>,
    age: TimeDelta,
) -> Call {
    Call::new(CallerId(caller), token, start, as_of - age).with_highest(highest)
}

/// Weekly tournament: one day to join, seven days of scoring.
pub fn weekly(id: u64) -> Tournament {
    Tournament::new(
        TournamentId(id),
        format!("week-{id}"),
        TournamentMetadata {
            open_duration_secs: 86_400,
            end_duration_secs: 7 * 86_400,
            prize: 10.0,
            supply_burn_pct: 5.0,
        },
    )
}

/// Every league service wired over one shared in-memory store.
pub struct League {
    pub store: Arc<MemoryStore>,
    pub refresher: PowerRefresher,
    pub ranking: RankingService,
    pub lifecycle: TournamentLifecycle,
    pub market: MarketUpdater,
}

impl League {
    pub fn new(store: Arc<MemoryStore>) -> Self {
        let engine = Arc::new(CallingPowerEngine::from_preset(FormulaPreset::ACTIVE));
        Self {
            refresher: PowerRefresher::new(store.clone(), store.clone(), engine),
            ranking: RankingService::new(store.clone()),
            lifecycle: TournamentLifecycle::new(store.clone(), store.clone()),
            market: MarketUpdater::new(store.clone()),
            store,
        }
    }

    pub fn empty() -> Self {
        Self::new(Arc::new(MemoryStore::new()))
    }

    /// Register callers named after their ids.
    pub fn with_callers(self, ids: &[u64]) -> Self {
        for &id in ids {
            self.store
                .insert_caller(Caller::new(CallerId(id), format!("caller-{id}")));
        }
        self
    }

    pub fn add_call(&self, call: Call) {
        self.store.insert_call(call).unwrap();
    }
}
