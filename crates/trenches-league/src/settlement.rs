//! Tournament settlement.
//!
//! Settling a `Started` tournament:
//! 1. snapshot every caller's current power (unscored callers count as 0)
//! 2. freeze the snapshot, keeping rows already frozen by an earlier attempt
//! 3. score each participation as the sum of its callers' frozen power
//! 4. rank participations by descending score and store the results
//! 5. compare-and-set the status from `Started` to `Completed`
//!
//! Step 5 is the last mutation: a failure before it leaves the tournament
//! `Started` and the whole run can be retried.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use trenches_core::error::{SettlementError, StoreError, TrenchesError};
use trenches_core::traits::{CallerStore, TournamentStore};
use trenches_core::types::{
    CallerId, ParticipationId, ParticipationResult, TournamentId, TournamentStatus,
};

use crate::ranking::assign_ranks;

/// Final position of one participation.
#[derive(Serialize, Clone, Debug, PartialEq)]
pub struct Standing {
    pub participation: ParticipationId,
    pub wallet_pubkey: String,
    pub score: f64,
    pub rank: u32,
}

#[derive(Serialize, Clone, Debug, PartialEq)]
pub struct SettlementReport {
    pub tournament: TournamentId,
    /// Snapshot rows of the tournament after the freeze.
    pub frozen_callers: usize,
    /// Standings, best first.
    pub standings: Vec<Standing>,
}

pub struct TournamentSettlement {
    tournaments: Arc<dyn TournamentStore>,
    callers: Arc<dyn CallerStore>,
    in_flight: Mutex<HashSet<TournamentId>>,
}

/// Releases the in-flight claim when dropped.
struct InFlight<'a> {
    set: &'a Mutex<HashSet<TournamentId>>,
    id: TournamentId,
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.set.lock().remove(&self.id);
    }
}

impl TournamentSettlement {
    pub fn new(tournaments: Arc<dyn TournamentStore>, callers: Arc<dyn CallerStore>) -> Self {
        Self {
            tournaments,
            callers,
            in_flight: Mutex::new(HashSet::new()),
        }
    }

    fn claim(&self, id: TournamentId) -> Result<InFlight<'_>, SettlementError> {
        if !self.in_flight.lock().insert(id) {
            return Err(SettlementError::InProgress(id));
        }
        Ok(InFlight {
            set: &self.in_flight,
            id,
        })
    }

    /// Settle a tournament now.
    pub fn process_results(&self, id: TournamentId) -> Result<SettlementReport, TrenchesError> {
        self.process_results_at(id, Utc::now())
    }

    /// Settle a tournament, stamping the completion with `now`.
    pub fn process_results_at(
        &self,
        id: TournamentId,
        now: DateTime<Utc>,
    ) -> Result<SettlementReport, TrenchesError> {
        let _claim = self.claim(id)?;

        let tournament = self
            .tournaments
            .tournament(id)?
            .ok_or(StoreError::TournamentNotFound(id))?;
        match tournament.status {
            TournamentStatus::Started => {}
            TournamentStatus::Completed => return Err(SettlementError::AlreadySettled(id).into()),
            status => return Err(SettlementError::NotStarted { id, status }.into()),
        }

        let powers: Vec<(CallerId, f64)> = self
            .callers
            .callers()?
            .into_iter()
            .map(|c| (c.id, c.power_or_zero()))
            .collect();
        let frozen: HashMap<CallerId, f64> = self
            .tournaments
            .freeze_caller_powers(id, &powers)?
            .into_iter()
            .map(|row| (row.caller_id, row.power))
            .collect();
        tracing::debug!(tournament = %id, callers = frozen.len(), "settlement: caller power frozen");

        let participations = self.tournaments.participations(id)?;
        let partial = participations.iter().filter(|p| !p.has_full_pick()).count();
        if partial > 0 {
            tracing::warn!(tournament = %id, partial, "settlement: scoring partial picks");
        }
        let wallets: HashMap<ParticipationId, String> = participations
            .iter()
            .map(|p| (p.id, p.wallet_pubkey.clone()))
            .collect();
        let scored: Vec<(ParticipationId, Option<f64>)> = participations
            .iter()
            .map(|p| {
                let score: f64 = p
                    .callers
                    .iter()
                    .map(|c| frozen.get(c).copied().unwrap_or(0.0))
                    .sum();
                (p.id, Some(score))
            })
            .collect();

        let mut standings = Vec::with_capacity(scored.len());
        for entry in assign_ranks(scored) {
            let score = entry.score.unwrap_or(0.0);
            self.tournaments.record_result(
                entry.id,
                ParticipationResult {
                    score,
                    rank: entry.rank,
                },
            )?;
            standings.push(Standing {
                participation: entry.id,
                wallet_pubkey: wallets.get(&entry.id).cloned().unwrap_or_default(),
                score,
                rank: entry.rank,
            });
        }
        tracing::debug!(tournament = %id, participations = standings.len(), "settlement: scores ranked");

        self.tournaments
            .transition(id, TournamentStatus::Started, TournamentStatus::Completed, now)
            .map_err(|e| match e {
                StoreError::StatusMismatch {
                    actual: TournamentStatus::Completed,
                    ..
                } => TrenchesError::from(SettlementError::AlreadySettled(id)),
                other => other.into(),
            })?;

        tracing::info!(
            tournament = %id,
            participations = standings.len(),
            frozen_callers = frozen.len(),
            "settlement: tournament completed"
        );
        Ok(SettlementReport {
            tournament: id,
            frozen_callers: frozen.len(),
            standings,
        })
    }
}
