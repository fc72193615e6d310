//! # trenches-league: Leaderboards and tournaments on top of calling power.
//!
//! - **Ranking**: stable descending order of callers by persisted power.
//! - **Refresh**: recompute power for all or affected callers in parallel.
//! - **Settlement**: freeze caller power and rank tournament participations.
//! - **Lifecycle**: start tournaments, accept entries, settle when due.
//! - **Market**: raise call peaks from valuation updates.
//! - **Explain**: power breakdown with earlier horizons for operators.

pub mod config;
pub mod explain;
pub mod lifecycle;
pub mod market;
pub mod ranking;
pub mod refresh;
pub mod settlement;
pub mod telemetry;

pub use crate::config::{LeagueConfig, PowerConfig};
pub use lifecycle::TournamentLifecycle;
pub use market::MarketUpdater;
pub use ranking::{assign_ranks, Ranked, RankingService};
pub use refresh::{PowerRefresher, RefreshReport};
pub use settlement::{SettlementReport, TournamentSettlement};
