//! In-memory league store with JSON snapshot persistence.
//!
//! [`MemoryStore`] implements [`CallHistory`], [`CallerStore`] and
//! [`TournamentStore`] over tables guarded by a single `parking_lot::RwLock`,
//! so every trait call observes a consistent view. It is used by tests and by
//! the operator CLI, which loads and saves a [`StoreSnapshot`] file around
//! each command.

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::Path;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::error::{StoreError, TrenchesError};
use crate::traits::{CallHistory, CallerStore, TournamentStore};
use crate::types::{
    Call, Caller, CallerId, ParticipationId, ParticipationResult, Tournament,
    TournamentCallerPower, TournamentId, TournamentParticipation, TournamentStatus,
};

/// Serializable image of a [`MemoryStore`].
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct StoreSnapshot {
    #[serde(default)]
    pub callers: Vec<Caller>,
    #[serde(default)]
    pub calls: Vec<Call>,
    #[serde(default)]
    pub tournaments: Vec<Tournament>,
    #[serde(default)]
    pub participations: Vec<TournamentParticipation>,
    #[serde(default)]
    pub caller_powers: Vec<TournamentCallerPower>,
}

#[derive(Default)]
struct Tables {
    callers: BTreeMap<CallerId, Caller>,
    calls: Vec<Call>,
    tournaments: BTreeMap<TournamentId, Tournament>,
    /// Join order.
    participations: Vec<TournamentParticipation>,
    /// Unique on `(tournament, caller)`.
    caller_powers: BTreeMap<(TournamentId, CallerId), f64>,
    next_participation: u64,
}

impl Tables {
    fn tournament_status(&self, id: TournamentId) -> Result<TournamentStatus, StoreError> {
        self.tournaments
            .get(&id)
            .map(|t| t.status)
            .ok_or(StoreError::TournamentNotFound(id))
    }

    fn ensure_not_completed(&self, id: TournamentId) -> Result<(), StoreError> {
        match self.tournament_status(id)? {
            TournamentStatus::Completed => Err(StoreError::Frozen(id)),
            _ => Ok(()),
        }
    }

    fn snapshot_rows(&self, id: TournamentId) -> Vec<TournamentCallerPower> {
        self.caller_powers
            .range((id, CallerId(0))..=(id, CallerId(u64::MAX)))
            .map(|(&(tournament_id, caller_id), &power)| TournamentCallerPower {
                caller_id,
                tournament_id,
                power,
            })
            .collect()
    }
}

/// In-memory implementation of the league store traits.
#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild a store from a snapshot.
    pub fn from_snapshot(snapshot: StoreSnapshot) -> Self {
        let next_participation = snapshot
            .participations
            .iter()
            .map(|p| p.id.0)
            .max()
            .map_or(1, |max| max + 1);
        let tables = Tables {
            callers: snapshot.callers.into_iter().map(|c| (c.id, c)).collect(),
            calls: snapshot.calls,
            tournaments: snapshot.tournaments.into_iter().map(|t| (t.id, t)).collect(),
            participations: snapshot.participations,
            caller_powers: snapshot
                .caller_powers
                .into_iter()
                .map(|row| ((row.tournament_id, row.caller_id), row.power))
                .collect(),
            next_participation,
        };
        Self {
            tables: RwLock::new(tables),
        }
    }

    /// Copy the current contents into a snapshot.
    pub fn to_snapshot(&self) -> StoreSnapshot {
        let tables = self.tables.read();
        StoreSnapshot {
            callers: tables.callers.values().cloned().collect(),
            calls: tables.calls.clone(),
            tournaments: tables.tournaments.values().cloned().collect(),
            participations: tables.participations.clone(),
            caller_powers: tables
                .caller_powers
                .iter()
                .map(|(&(tournament_id, caller_id), &power)| TournamentCallerPower {
                    caller_id,
                    tournament_id,
                    power,
                })
                .collect(),
        }
    }

    /// Load a snapshot file.
    pub fn load(path: &Path) -> Result<Self, TrenchesError> {
        let bytes = fs::read(path)
            .map_err(|e| TrenchesError::Snapshot(format!("read {}: {e}", path.display())))?;
        let snapshot: StoreSnapshot = serde_json::from_slice(&bytes)
            .map_err(|e| TrenchesError::Snapshot(format!("parse {}: {e}", path.display())))?;
        Ok(Self::from_snapshot(snapshot))
    }

    /// Load a snapshot file, or start empty if it does not exist yet.
    pub fn load_or_default(path: &Path) -> Result<Self, TrenchesError> {
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::new())
        }
    }

    /// Write the current contents to a snapshot file, creating parent
    /// directories as needed.
    pub fn save(&self, path: &Path) -> Result<(), TrenchesError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| {
                TrenchesError::Snapshot(format!("create {}: {e}", parent.display()))
            })?;
        }
        let json = serde_json::to_vec_pretty(&self.to_snapshot())
            .map_err(|e| TrenchesError::Snapshot(format!("encode: {e}")))?;
        fs::write(path, json)
            .map_err(|e| TrenchesError::Snapshot(format!("write {}: {e}", path.display())))
    }

    /// Insert or replace a caller.
    pub fn insert_caller(&self, caller: Caller) {
        self.tables.write().callers.insert(caller.id, caller);
    }

    /// Record a new call.
    ///
    /// # Errors
    ///
    /// [`StoreError::CallerNotFound`] if the caller is unknown.
    pub fn insert_call(&self, call: Call) -> Result<(), StoreError> {
        let mut tables = self.tables.write();
        if !tables.callers.contains_key(&call.caller_id) {
            return Err(StoreError::CallerNotFound(call.caller_id));
        }
        tables.calls.push(call);
        Ok(())
    }

    /// Insert or replace a tournament.
    pub fn insert_tournament(&self, tournament: Tournament) {
        self.tables
            .write()
            .tournaments
            .insert(tournament.id, tournament);
    }

    pub fn caller_count(&self) -> usize {
        self.tables.read().callers.len()
    }

    pub fn call_count(&self) -> usize {
        self.tables.read().calls.len()
    }
}

impl CallHistory for MemoryStore {
    fn calls_by_caller(&self, caller: CallerId) -> Result<Vec<Call>, StoreError> {
        let tables = self.tables.read();
        let mut calls: Vec<Call> = tables
            .calls
            .iter()
            .filter(|c| c.caller_id == caller)
            .cloned()
            .collect();
        calls.sort_by_key(|c| c.created_at);
        Ok(calls)
    }

    fn callers_with_calls_on(&self, tokens: &[String]) -> Result<Vec<CallerId>, StoreError> {
        let tables = self.tables.read();
        let ids: BTreeSet<CallerId> = tables
            .calls
            .iter()
            .filter(|c| tokens.iter().any(|t| *t == c.token_address))
            .map(|c| c.caller_id)
            .collect();
        Ok(ids.into_iter().collect())
    }

    fn raise_highest_fdv(&self, token: &str, value: f64) -> Result<Vec<CallerId>, StoreError> {
        let mut tables = self.tables.write();
        let mut raised = BTreeSet::new();
        for call in tables
            .calls
            .iter_mut()
            .filter(|c| c.token_address == token && c.highest_fdv < value)
        {
            call.highest_fdv = value;
            raised.insert(call.caller_id);
        }
        Ok(raised.into_iter().collect())
    }
}

impl CallerStore for MemoryStore {
    fn callers(&self) -> Result<Vec<Caller>, StoreError> {
        Ok(self.tables.read().callers.values().cloned().collect())
    }

    fn caller(&self, id: CallerId) -> Result<Option<Caller>, StoreError> {
        Ok(self.tables.read().callers.get(&id).cloned())
    }

    fn set_power(&self, id: CallerId, power: f64) -> Result<(), StoreError> {
        let mut tables = self.tables.write();
        let caller = tables
            .callers
            .get_mut(&id)
            .ok_or(StoreError::CallerNotFound(id))?;
        caller.power = Some(power);
        Ok(())
    }

    fn set_rank(&self, id: CallerId, rank: u32) -> Result<(), StoreError> {
        let mut tables = self.tables.write();
        let caller = tables
            .callers
            .get_mut(&id)
            .ok_or(StoreError::CallerNotFound(id))?;
        caller.rank = Some(rank);
        Ok(())
    }
}

impl TournamentStore for MemoryStore {
    fn tournament(&self, id: TournamentId) -> Result<Option<Tournament>, StoreError> {
        Ok(self.tables.read().tournaments.get(&id).cloned())
    }

    fn tournaments(&self) -> Result<Vec<Tournament>, StoreError> {
        Ok(self.tables.read().tournaments.values().cloned().collect())
    }

    fn participations(
        &self,
        tournament: TournamentId,
    ) -> Result<Vec<TournamentParticipation>, StoreError> {
        let tables = self.tables.read();
        tables.tournament_status(tournament)?;
        Ok(tables
            .participations
            .iter()
            .filter(|p| p.tournament_id == tournament)
            .cloned()
            .collect())
    }

    fn insert_participation(
        &self,
        tournament: TournamentId,
        wallet_pubkey: &str,
        callers: Vec<CallerId>,
    ) -> Result<TournamentParticipation, StoreError> {
        let mut tables = self.tables.write();
        tables.ensure_not_completed(tournament)?;
        if tables
            .participations
            .iter()
            .any(|p| p.tournament_id == tournament && p.wallet_pubkey == wallet_pubkey)
        {
            return Err(StoreError::DuplicateParticipation {
                tournament,
                wallet: wallet_pubkey.to_string(),
            });
        }
        let id = ParticipationId(tables.next_participation.max(1));
        tables.next_participation = id.0 + 1;
        let participation = TournamentParticipation::new(id, tournament, wallet_pubkey, callers);
        tables.participations.push(participation.clone());
        Ok(participation)
    }

    fn freeze_caller_powers(
        &self,
        tournament: TournamentId,
        powers: &[(CallerId, f64)],
    ) -> Result<Vec<TournamentCallerPower>, StoreError> {
        let mut tables = self.tables.write();
        tables.ensure_not_completed(tournament)?;
        for &(caller, power) in powers {
            tables
                .caller_powers
                .entry((tournament, caller))
                .or_insert(power);
        }
        Ok(tables.snapshot_rows(tournament))
    }

    fn caller_powers(
        &self,
        tournament: TournamentId,
    ) -> Result<Vec<TournamentCallerPower>, StoreError> {
        let tables = self.tables.read();
        tables.tournament_status(tournament)?;
        Ok(tables.snapshot_rows(tournament))
    }

    fn record_result(
        &self,
        participation: ParticipationId,
        result: ParticipationResult,
    ) -> Result<(), StoreError> {
        let mut tables = self.tables.write();
        let tournament = tables
            .participations
            .iter()
            .find(|p| p.id == participation)
            .map(|p| p.tournament_id)
            .ok_or(StoreError::ParticipationNotFound(participation))?;
        tables.ensure_not_completed(tournament)?;
        if let Some(p) = tables
            .participations
            .iter_mut()
            .find(|p| p.id == participation)
        {
            p.result = Some(result);
        }
        Ok(())
    }

    fn transition(
        &self,
        tournament: TournamentId,
        expected: TournamentStatus,
        next: TournamentStatus,
        at: DateTime<Utc>,
    ) -> Result<Tournament, StoreError> {
        let mut tables = self.tables.write();
        let entry = tables
            .tournaments
            .get_mut(&tournament)
            .ok_or(StoreError::TournamentNotFound(tournament))?;
        if entry.status != expected {
            return Err(StoreError::StatusMismatch {
                id: tournament,
                expected,
                actual: entry.status,
            });
        }
        entry.status = next;
        if next == TournamentStatus::Started {
            entry.started_at = Some(at);
        }
        Ok(entry.clone())
    }
}
