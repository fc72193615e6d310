//! Core league types: calls, callers, tournaments and their scoring views.
//!
//! Valuations are fully diluted valuations (FDV) as `f64`. Instants are UTC.

use std::fmt;

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};

use crate::constants::PARTICIPATION_CALLERS;
use crate::error::PowerError;

macro_rules! id_type {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(
            Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord,
        )]
        #[serde(transparent)]
        pub struct $name(pub u64);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<u64> for $name {
            fn from(id: u64) -> Self {
                Self(id)
            }
        }
    };
}

id_type!(
    /// Identifier of a caller (a Telegram user or channel that posts calls).
    CallerId
);
id_type!(
    /// Identifier of a tournament.
    TournamentId
);
id_type!(
    /// Identifier of a wallet's participation in a tournament.
    ParticipationId
);

/// A caller flagging a token at a given valuation.
///
/// Created once when the caller first mentions the token. Only
/// `highest_fdv` moves afterwards, raised by market updates.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Call {
    pub caller_id: CallerId,
    pub token_address: String,
    /// Valuation when the call was made. Expected strictly positive.
    pub start_fdv: f64,
    /// Highest valuation observed since the call.
    pub highest_fdv: f64,
    pub created_at: DateTime<Utc>,
}

impl Call {
    pub fn new(
        caller_id: CallerId,
        token_address: impl Into<String>,
        start_fdv: f64,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            caller_id,
            token_address: token_address.into(),
            start_fdv,
            highest_fdv: start_fdv,
            created_at,
        }
    }

    /// Same call with a different highest valuation.
    pub fn with_highest(mut self, highest_fdv: f64) -> Self {
        self.highest_fdv = highest_fdv;
        self
    }
}

/// Per-evaluation view of a [`Call`].
///
/// `performance`, `temporal_weight` and `final_perf` are filled by the
/// power engine; the conversion from a call leaves them at zero.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct CallPerformance {
    pub token_address: String,
    pub start_fdv: f64,
    pub highest_fdv: f64,
    pub created_at: DateTime<Utc>,
    /// Seconds between the call and the evaluation instant, never negative.
    pub age_secs: f64,
    pub performance: f64,
    pub temporal_weight: f64,
    pub final_perf: f64,
}

/// Full breakdown of one scoring run.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Default)]
pub struct CallingPowerData {
    pub base_performance: f64,
    pub avg_performance: f64,
    pub correction: f64,
    pub constancy: f64,
    pub calling_power: f64,
    pub normalized: f64,
    pub performances: Vec<CallPerformance>,
}

impl CallingPowerData {
    /// The all-zero result returned for an empty call history.
    pub fn zeroed() -> Self {
        Self::default()
    }

    /// Reject results poisoned by bad call data.
    ///
    /// Reports the first offending call: a non-finite gain first, then a
    /// start FDV that is not strictly positive. Falls back to the final
    /// value if every call looks sane but the aggregate still is not finite.
    pub fn ensure_finite(&self) -> Result<(), PowerError> {
        for p in &self.performances {
            if !p.performance.is_finite() || !p.final_perf.is_finite() {
                return Err(PowerError::NonFinitePerformance {
                    token_address: p.token_address.clone(),
                    start_fdv: p.start_fdv,
                });
            }
            if !(p.start_fdv.is_finite() && p.start_fdv > 0.0) {
                return Err(PowerError::InvalidStartFdv {
                    token_address: p.token_address.clone(),
                    start_fdv: p.start_fdv,
                });
            }
        }
        if !self.normalized.is_finite() {
            return Err(PowerError::NonFinitePower(self.normalized));
        }
        Ok(())
    }
}

/// A caller with the league values attached to it.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Caller {
    pub id: CallerId,
    pub name: String,
    /// Last computed normalized power. `None` until first scored.
    #[serde(default)]
    pub power: Option<f64>,
    /// Leaderboard position, 1 is best. `None` until first ranked.
    #[serde(default)]
    pub rank: Option<u32>,
}

impl Caller {
    pub fn new(id: CallerId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            power: None,
            rank: None,
        }
    }

    pub fn with_power(mut self, power: f64) -> Self {
        self.power = Some(power);
        self
    }

    /// Power used by settlement: unscored callers count as zero.
    pub fn power_or_zero(&self) -> f64 {
        self.power.unwrap_or(0.0)
    }
}

/// Tournament lifecycle state.
///
/// The engine walks `Upcoming -> Started -> Completed`. `Hidden` and
/// `Cancelled` are administrative exits.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TournamentStatus {
    #[default]
    Upcoming,
    Started,
    Completed,
    Hidden,
    Cancelled,
}

impl TournamentStatus {
    /// Transitions the engine is allowed to perform.
    pub fn can_advance_to(&self, next: TournamentStatus) -> bool {
        matches!(
            (self, next),
            (Self::Upcoming, Self::Started) | (Self::Started, Self::Completed)
        )
    }
}

impl fmt::Display for TournamentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Upcoming => "UPCOMING",
            Self::Started => "STARTED",
            Self::Completed => "COMPLETED",
            Self::Hidden => "HIDDEN",
            Self::Cancelled => "CANCELLED",
        };
        f.write_str(label)
    }
}

/// Tournament windows and rewards.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Default)]
pub struct TournamentMetadata {
    /// Seconds after start during which wallets may join.
    pub open_duration_secs: u64,
    /// Seconds after start at which scoring ends and results are settled.
    pub end_duration_secs: u64,
    /// Prize pool in SOL.
    pub prize: f64,
    /// Percentage of the caller token supply burned on completion.
    pub supply_burn_pct: f64,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Tournament {
    pub id: TournamentId,
    pub name: String,
    #[serde(default)]
    pub status: TournamentStatus,
    #[serde(default)]
    pub started_at: Option<DateTime<Utc>>,
    pub metadata: TournamentMetadata,
}

impl Tournament {
    pub fn new(id: TournamentId, name: impl Into<String>, metadata: TournamentMetadata) -> Self {
        Self {
            id,
            name: name.into(),
            status: TournamentStatus::Upcoming,
            started_at: None,
            metadata,
        }
    }

    /// Last instant at which wallets may join. `None` before start.
    pub fn join_deadline(&self) -> Option<DateTime<Utc>> {
        offset(self.started_at?, self.metadata.open_duration_secs)
    }

    /// Instant at which the scoring window closes. `None` before start.
    pub fn ends_at(&self) -> Option<DateTime<Utc>> {
        offset(self.started_at?, self.metadata.end_duration_secs)
    }

    /// Whether a `Started` tournament's scoring window has elapsed.
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.status == TournamentStatus::Started
            && self.ends_at().is_some_and(|end| end <= now)
    }
}

fn offset(start: DateTime<Utc>, secs: u64) -> Option<DateTime<Utc>> {
    let secs = i64::try_from(secs).ok()?;
    start.checked_add_signed(TimeDelta::try_seconds(secs)?)
}

/// Settled score and position of one participation.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq)]
pub struct ParticipationResult {
    pub score: f64,
    pub rank: u32,
}

/// A wallet's entry in a tournament.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct TournamentParticipation {
    pub id: ParticipationId,
    pub tournament_id: TournamentId,
    pub wallet_pubkey: String,
    /// Callers picked at join time, [`PARTICIPATION_CALLERS`] of them.
    pub callers: Vec<CallerId>,
    #[serde(default)]
    pub result: Option<ParticipationResult>,
}

impl TournamentParticipation {
    pub fn new(
        id: ParticipationId,
        tournament_id: TournamentId,
        wallet_pubkey: impl Into<String>,
        callers: Vec<CallerId>,
    ) -> Self {
        Self {
            id,
            tournament_id,
            wallet_pubkey: wallet_pubkey.into(),
            callers,
            result: None,
        }
    }

    /// Whether the pick has the size required at join time.
    pub fn has_full_pick(&self) -> bool {
        self.callers.len() == PARTICIPATION_CALLERS
    }
}

/// Caller power frozen when a tournament settles.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq)]
pub struct TournamentCallerPower {
    pub caller_id: CallerId,
    pub tournament_id: TournamentId,
    pub power: f64,
}
