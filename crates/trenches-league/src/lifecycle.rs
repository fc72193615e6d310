//! Tournament lifecycle: start, join and scheduled settlement.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use trenches_core::constants::PARTICIPATION_CALLERS;
use trenches_core::error::{LifecycleError, ParticipationError, StoreError, TrenchesError};
use trenches_core::traits::{CallerStore, TournamentStore};
use trenches_core::types::{
    CallerId, Tournament, TournamentId, TournamentParticipation, TournamentStatus,
};

use crate::settlement::{SettlementReport, TournamentSettlement};

pub struct TournamentLifecycle {
    tournaments: Arc<dyn TournamentStore>,
    callers: Arc<dyn CallerStore>,
    settlement: TournamentSettlement,
}

impl TournamentLifecycle {
    pub fn new(tournaments: Arc<dyn TournamentStore>, callers: Arc<dyn CallerStore>) -> Self {
        let settlement = TournamentSettlement::new(tournaments.clone(), callers.clone());
        Self {
            tournaments,
            callers,
            settlement,
        }
    }

    pub fn settlement(&self) -> &TournamentSettlement {
        &self.settlement
    }

    fn load(&self, id: TournamentId) -> Result<Tournament, TrenchesError> {
        Ok(self
            .tournaments
            .tournament(id)?
            .ok_or(StoreError::TournamentNotFound(id))?)
    }

    /// Open an upcoming tournament, starting its join and scoring windows.
    pub fn start(&self, id: TournamentId, now: DateTime<Utc>) -> Result<Tournament, TrenchesError> {
        let tournament = self.load(id)?;
        if !tournament.status.can_advance_to(TournamentStatus::Started) {
            return Err(LifecycleError::IllegalTransition {
                id,
                from: tournament.status,
                to: TournamentStatus::Started,
            }
            .into());
        }
        let started = self.tournaments.transition(
            id,
            TournamentStatus::Upcoming,
            TournamentStatus::Started,
            now,
        )?;
        tracing::info!(
            tournament = %id,
            join_deadline = ?started.join_deadline(),
            ends_at = ?started.ends_at(),
            "lifecycle: tournament started"
        );
        Ok(started)
    }

    /// Enter a wallet with its pick of callers.
    ///
    /// Upcoming tournaments accept entries at any time; started ones only
    /// until their join deadline.
    pub fn join(
        &self,
        id: TournamentId,
        wallet_pubkey: &str,
        callers: Vec<CallerId>,
        now: DateTime<Utc>,
    ) -> Result<TournamentParticipation, TrenchesError> {
        if callers.len() != PARTICIPATION_CALLERS {
            return Err(ParticipationError::WrongCallerCount {
                expected: PARTICIPATION_CALLERS,
                got: callers.len(),
            }
            .into());
        }
        let mut seen = HashSet::with_capacity(callers.len());
        for &caller in &callers {
            if !seen.insert(caller) {
                return Err(ParticipationError::DuplicateCaller(caller).into());
            }
            if self.callers.caller(caller)?.is_none() {
                return Err(ParticipationError::UnknownCaller(caller).into());
            }
        }

        let tournament = self.load(id)?;
        match tournament.status {
            TournamentStatus::Upcoming => {}
            TournamentStatus::Started => {
                let deadline = tournament
                    .join_deadline()
                    .ok_or(LifecycleError::NotScheduled(id))?;
                if now > deadline {
                    return Err(ParticipationError::WindowClosed(id).into());
                }
            }
            _ => return Err(ParticipationError::NotOpen(id).into()),
        }

        let participation = self
            .tournaments
            .insert_participation(id, wallet_pubkey, callers)?;
        tracing::info!(
            tournament = %id,
            participation = %participation.id,
            wallet = wallet_pubkey,
            "lifecycle: wallet joined"
        );
        Ok(participation)
    }

    /// Started tournaments whose scoring window has elapsed.
    pub fn due_for_settlement(&self, now: DateTime<Utc>) -> Result<Vec<Tournament>, StoreError> {
        Ok(self
            .tournaments
            .tournaments()?
            .into_iter()
            .filter(|t| t.is_due(now))
            .collect())
    }

    /// Settle every due tournament. A failed settlement is logged and the
    /// remaining tournaments are still processed.
    pub fn settle_due(
        &self,
        now: DateTime<Utc>,
    ) -> Result<Vec<(TournamentId, Result<SettlementReport, TrenchesError>)>, StoreError> {
        let due = self.due_for_settlement(now)?;
        let outcomes = due
            .into_iter()
            .map(|t| {
                let outcome = self.settlement.process_results_at(t.id, now);
                if let Err(e) = &outcome {
                    tracing::warn!(tournament = %t.id, error = %e, "lifecycle: settlement failed");
                }
                (t.id, outcome)
            })
            .collect();
        Ok(outcomes)
    }
}
