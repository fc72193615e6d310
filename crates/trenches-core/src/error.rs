//! Error types for the Trenches league.
use thiserror::Error;

use crate::types::{CallerId, ParticipationId, TournamentId, TournamentStatus};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum PowerError {
    #[error("non-finite performance for call on {token_address} (start fdv {start_fdv})")] NonFinitePerformance { token_address: String, start_fdv: f64 },
    #[error("start fdv {start_fdv} for call on {token_address} must be positive")] InvalidStartFdv { token_address: String, start_fdv: f64 },
    #[error("non-finite calling power: {0}")] NonFinitePower(f64),
    #[error("invalid normalization: {0}")] InvalidNormalization(String),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("caller not found: {0}")] CallerNotFound(CallerId),
    #[error("tournament not found: {0}")] TournamentNotFound(TournamentId),
    #[error("participation not found: {0}")] ParticipationNotFound(ParticipationId),
    #[error("tournament {id} is {actual}, expected {expected}")] StatusMismatch { id: TournamentId, expected: TournamentStatus, actual: TournamentStatus },
    #[error("wallet {wallet} already joined tournament {tournament}")] DuplicateParticipation { tournament: TournamentId, wallet: String },
    #[error("results of completed tournament {0} are frozen")] Frozen(TournamentId),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParticipationError {
    #[error("expected {expected} callers, got {got}")] WrongCallerCount { expected: usize, got: usize },
    #[error("caller picked twice: {0}")] DuplicateCaller(CallerId),
    #[error("unknown caller: {0}")] UnknownCaller(CallerId),
    #[error("tournament {0} is not open for joining")] NotOpen(TournamentId),
    #[error("join window of tournament {0} has closed")] WindowClosed(TournamentId),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SettlementError {
    #[error("tournament {0} already settled")] AlreadySettled(TournamentId),
    #[error("tournament {id} cannot be settled while {status}")] NotStarted { id: TournamentId, status: TournamentStatus },
    #[error("settlement of tournament {0} already in progress")] InProgress(TournamentId),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LifecycleError {
    #[error("illegal transition for tournament {id}: {from} -> {to}")] IllegalTransition { id: TournamentId, from: TournamentStatus, to: TournamentStatus },
    #[error("tournament {0} has no start instant")] NotScheduled(TournamentId),
}

#[derive(Error, Debug)]
pub enum TrenchesError {
    #[error(transparent)] Power(#[from] PowerError),
    #[error(transparent)] Store(#[from] StoreError),
    #[error(transparent)] Participation(#[from] ParticipationError),
    #[error(transparent)] Settlement(#[from] SettlementError),
    #[error(transparent)] Lifecycle(#[from] LifecycleError),
    #[error("snapshot: {0}")] Snapshot(String),
}
