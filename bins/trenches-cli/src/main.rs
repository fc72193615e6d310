//! trenches-cli: Operator interface for the Trenches league.
//!
//! Every command loads the JSON store snapshot, runs against it and saves it
//! back when something changed.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use clap::{Args, Parser, Subcommand};
use trenches_core::memory::MemoryStore;
use trenches_core::traits::{CallHistory, CallerStore, TournamentStore};
use trenches_core::types::{
    Call, Caller, CallerId, Tournament, TournamentId, TournamentMetadata,
};
use trenches_league::explain::explain_caller;
use trenches_league::telemetry::{self, LogFormat};
use trenches_league::{
    LeagueConfig, MarketUpdater, PowerRefresher, RankingService, TournamentLifecycle,
};

/// Trenches league operator CLI.
#[derive(Parser)]
#[command(name = "trenches-cli")]
#[command(version, about = "Caller power, leaderboards and tournament settlement.")]
struct Cli {
    /// Optional TOML configuration file.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Store snapshot file (overrides configuration).
    #[arg(long, global = true)]
    data_file: Option<PathBuf>,

    /// Log level filter (overrides configuration).
    #[arg(long, global = true)]
    log_level: Option<String>,

    /// Log format: text or json (overrides configuration).
    #[arg(long, global = true)]
    log_format: Option<LogFormat>,

    /// Evaluation instant (RFC 3339). Defaults to now.
    #[arg(long, global = true)]
    as_of: Option<DateTime<Utc>>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Register a caller.
    AddCaller(AddCallerArgs),
    /// Record a call.
    AddCall(AddCallArgs),
    /// Create an upcoming tournament.
    AddTournament(AddTournamentArgs),
    /// Apply a token valuation and refresh the affected callers.
    Market(MarketArgs),
    /// Show how a caller's power is computed.
    Explain(ExplainArgs),
    /// Recompute caller power, then re-rank.
    Refresh(RefreshArgs),
    /// Re-rank callers from persisted power.
    Rank,
    /// Print the caller leaderboard.
    Leaderboard(LeaderboardArgs),
    /// Start an upcoming tournament.
    Start(StartArgs),
    /// Enter a wallet into a tournament.
    Join(JoinArgs),
    /// Settle one tournament, or every tournament that is due.
    Settle(SettleArgs),
    /// Print a tournament's standings.
    Standings(StartArgs),
}

#[derive(Args)]
struct AddCallerArgs {
    id: u64,
    name: String,
}

#[derive(Args)]
struct AddCallArgs {
    caller: u64,
    token: String,
    /// Valuation when the call was made.
    start_fdv: f64,
    /// Highest valuation seen so far (defaults to the start valuation).
    #[arg(long)]
    highest: Option<f64>,
    /// Call instant (RFC 3339). Defaults to the evaluation instant.
    #[arg(long)]
    at: Option<DateTime<Utc>>,
}

#[derive(Args)]
struct AddTournamentArgs {
    id: u64,
    name: String,
    /// Seconds after start during which wallets may join.
    #[arg(long, default_value_t = 86_400)]
    open_secs: u64,
    /// Seconds after start at which the tournament settles.
    #[arg(long, default_value_t = 7 * 86_400)]
    end_secs: u64,
    /// Prize pool in SOL.
    #[arg(long, default_value_t = 0.0)]
    prize: f64,
    /// Percentage of caller token supply burned on completion.
    #[arg(long, default_value_t = 0.0)]
    supply_burn: f64,
}

#[derive(Args)]
struct MarketArgs {
    token: String,
    fdv: f64,
}

#[derive(Args)]
struct ExplainArgs {
    caller: u64,
    /// Print the full breakdown as JSON.
    #[arg(long)]
    json: bool,
}

#[derive(Args)]
struct RefreshArgs {
    /// Only refresh callers with calls on these tokens.
    #[arg(long, num_args = 1..)]
    tokens: Vec<String>,
}

#[derive(Args)]
struct LeaderboardArgs {
    #[arg(short, long, default_value_t = 20)]
    limit: usize,
}

#[derive(Args)]
struct StartArgs {
    tournament: u64,
}

#[derive(Args)]
struct JoinArgs {
    tournament: u64,
    wallet: String,
    /// Picked caller ids.
    #[arg(required = true, num_args = 1..)]
    callers: Vec<u64>,
}

#[derive(Args)]
struct SettleArgs {
    /// Tournament to settle.
    #[arg(conflicts_with = "due", required_unless_present = "due")]
    tournament: Option<u64>,
    /// Settle every started tournament whose scoring window has elapsed.
    #[arg(long)]
    due: bool,
}

/// Services wired over the loaded store.
struct App {
    store: Arc<MemoryStore>,
    config: LeagueConfig,
    as_of: DateTime<Utc>,
}

impl App {
    fn refresher(&self) -> Result<PowerRefresher> {
        let engine = self
            .config
            .power
            .engine()
            .context("invalid power configuration")?;
        Ok(PowerRefresher::new(
            self.store.clone(),
            self.store.clone(),
            Arc::new(engine),
        ))
    }

    fn ranking(&self) -> RankingService {
        RankingService::new(self.store.clone())
    }

    fn lifecycle(&self) -> TournamentLifecycle {
        TournamentLifecycle::new(self.store.clone(), self.store.clone())
    }

    fn save(&self) -> Result<()> {
        self.store
            .save(&self.config.data_file)
            .with_context(|| format!("saving {}", self.config.data_file.display()))
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config =
        LeagueConfig::load(cli.config.as_deref()).context("loading configuration")?;
    if let Some(path) = cli.data_file {
        config.data_file = path;
    }
    if let Some(level) = cli.log_level {
        config.log_level = level;
    }
    if let Some(format) = cli.log_format {
        config.log_format = format;
    }
    telemetry::init(&config.log_level, config.log_format)
        .context("installing log subscriber")?;

    let store = MemoryStore::load_or_default(&config.data_file)
        .with_context(|| format!("loading {}", config.data_file.display()))?;
    tracing::debug!(
        data_file = %config.data_file.display(),
        callers = store.caller_count(),
        calls = store.call_count(),
        "cli: store loaded"
    );

    let app = App {
        store: Arc::new(store),
        config,
        as_of: cli.as_of.unwrap_or_else(Utc::now),
    };

    match cli.command {
        Commands::AddCaller(args) => add_caller(&app, args),
        Commands::AddCall(args) => add_call(&app, args),
        Commands::AddTournament(args) => add_tournament(&app, args),
        Commands::Market(args) => market(&app, args),
        Commands::Explain(args) => explain(&app, args),
        Commands::Refresh(args) => refresh(&app, args),
        Commands::Rank => rank(&app),
        Commands::Leaderboard(args) => leaderboard(&app, args),
        Commands::Start(args) => start(&app, args),
        Commands::Join(args) => join(&app, args),
        Commands::Settle(args) => settle(&app, args),
        Commands::Standings(args) => standings(&app, args),
    }
}

fn add_caller(app: &App, args: AddCallerArgs) -> Result<()> {
    let id = CallerId(args.id);
    if app.store.caller(id)?.is_some() {
        bail!("caller {id} already exists");
    }
    app.store.insert_caller(Caller::new(id, args.name));
    app.save()?;
    println!("Caller {id} added.");
    Ok(())
}

fn add_call(app: &App, args: AddCallArgs) -> Result<()> {
    let call = call_from_args(&args, app.as_of)?;
    app.store.insert_call(call)?;
    app.save()?;
    println!("Call on {} recorded for caller {}.", args.token, args.caller);
    Ok(())
}

/// Build the call as given. A highest FDV below the start is kept.
fn call_from_args(args: &AddCallArgs, as_of: DateTime<Utc>) -> Result<Call> {
    if !(args.start_fdv.is_finite() && args.start_fdv > 0.0) {
        bail!("start valuation must be positive, got {}", args.start_fdv);
    }
    let mut call = Call::new(
        CallerId(args.caller),
        &args.token,
        args.start_fdv,
        args.at.unwrap_or(as_of),
    );
    if let Some(highest) = args.highest {
        if !highest.is_finite() {
            bail!("highest valuation must be finite, got {highest}");
        }
        call = call.with_highest(highest);
    }
    Ok(call)
}

fn add_tournament(app: &App, args: AddTournamentArgs) -> Result<()> {
    let id = TournamentId(args.id);
    if app.store.tournament(id)?.is_some() {
        bail!("tournament {id} already exists");
    }
    if args.end_secs < args.open_secs {
        bail!("tournament must end after its join window closes");
    }
    app.store.insert_tournament(Tournament::new(
        id,
        args.name,
        TournamentMetadata {
            open_duration_secs: args.open_secs,
            end_duration_secs: args.end_secs,
            prize: args.prize,
            supply_burn_pct: args.supply_burn,
        },
    ));
    app.save()?;
    println!("Tournament {id} created.");
    Ok(())
}

fn market(app: &App, args: MarketArgs) -> Result<()> {
    let affected = MarketUpdater::new(app.store.clone()).apply(&args.token, args.fdv)?;
    if affected.is_empty() {
        println!("No call on {} reached a new high.", args.token);
        return Ok(());
    }
    let report = app.refresher()?.refresh_callers(&affected, app.as_of);
    app.ranking().rank_callers()?;
    app.save()?;
    println!(
        "{} caller(s) refreshed, {} failed.",
        report.updated.len(),
        report.failed.len()
    );
    Ok(())
}

fn explain(app: &App, args: ExplainArgs) -> Result<()> {
    let id = CallerId(args.caller);
    let caller = app
        .store
        .caller(id)?
        .with_context(|| format!("caller {id} not found"))?;
    let calls = app.store.calls_by_caller(id)?;
    let engine = app
        .config
        .power
        .engine()
        .context("invalid power configuration")?;
    let explanation = explain_caller(&calls, &engine, app.as_of);

    if args.json {
        println!("{}", serde_json::to_string_pretty(&explanation)?);
        return Ok(());
    }

    let current = &explanation.current;
    println!("\n=== {} ({}) ===", caller.name, id);
    println!("Formula:     {}", engine.formula().name);
    println!("Calls:       {}", current.performances.len());
    println!("Base:        {:.4}", current.base_performance);
    println!("Average:     {:.4}", current.avg_performance);
    println!("Correction:  {:.4}", current.correction);
    println!("Constancy:   {:.4}", current.constancy);
    println!("Power:       {:.4}", current.calling_power);
    println!("Normalized:  {:.4}", current.normalized);
    for past in &explanation.history {
        println!(
            "{:>2}h ago:     {:.4} ({} calls)",
            past.hours_ago, past.power, past.calls
        );
    }
    if !current.performances.is_empty() {
        println!();
        println!("Per-call breakdown:");
        for p in &current.performances {
            println!(
                "  {}: {:+.2}% x {:.4} = {:.4} (age {:.1}h)",
                p.token_address,
                p.performance,
                p.temporal_weight,
                p.final_perf,
                p.age_secs / 3_600.0
            );
        }
    }
    if let Err(e) = current.ensure_finite() {
        println!("\nWARNING: {e}");
    }
    Ok(())
}

fn refresh(app: &App, args: RefreshArgs) -> Result<()> {
    let refresher = app.refresher()?;
    let report = if args.tokens.is_empty() {
        refresher.refresh_all(app.as_of)?
    } else {
        refresher.refresh_for_tokens(&args.tokens, app.as_of)?
    };
    app.ranking().rank_callers()?;
    app.save()?;

    println!("Updated: {}", report.updated.len());
    for failure in &report.failed {
        println!("Failed:  caller {}: {}", failure.caller, failure.error);
    }
    Ok(())
}

fn rank(app: &App) -> Result<()> {
    let ranked = app.ranking().rank_callers()?;
    app.save()?;
    println!("{} caller(s) ranked.", ranked.len());
    Ok(())
}

fn leaderboard(app: &App, args: LeaderboardArgs) -> Result<()> {
    let mut callers = app.store.callers()?;
    callers.sort_by_key(|c| (c.rank.is_none(), c.rank, c.id));
    println!("{:>5}  {:>12}  name", "rank", "power");
    for caller in callers.iter().take(args.limit) {
        let rank = caller.rank.map_or_else(|| "-".to_string(), |r| r.to_string());
        let power = caller
            .power
            .map_or_else(|| "-".to_string(), |p| format!("{p:.2}"));
        println!("{rank:>5}  {power:>12}  {}", caller.name);
    }
    Ok(())
}

fn start(app: &App, args: StartArgs) -> Result<()> {
    let tournament = app.lifecycle().start(TournamentId(args.tournament), app.as_of)?;
    app.save()?;
    println!("Tournament {} started.", tournament.id);
    if let Some(deadline) = tournament.join_deadline() {
        println!("Joins close: {deadline}");
    }
    if let Some(end) = tournament.ends_at() {
        println!("Settles at:  {end}");
    }
    Ok(())
}

fn join(app: &App, args: JoinArgs) -> Result<()> {
    let callers = args.callers.into_iter().map(CallerId).collect();
    let participation = app.lifecycle().join(
        TournamentId(args.tournament),
        &args.wallet,
        callers,
        app.as_of,
    )?;
    app.save()?;
    println!(
        "Wallet {} joined tournament {} (participation {}).",
        participation.wallet_pubkey, participation.tournament_id, participation.id
    );
    Ok(())
}

fn settle(app: &App, args: SettleArgs) -> Result<()> {
    let lifecycle = app.lifecycle();
    if args.due {
        let outcomes = lifecycle.settle_due(app.as_of)?;
        app.save()?;
        if outcomes.is_empty() {
            println!("No tournament is due.");
        }
        for (id, outcome) in outcomes {
            match outcome {
                Ok(report) => println!(
                    "Tournament {id} settled: {} participation(s).",
                    report.standings.len()
                ),
                Err(e) => println!("Tournament {id} failed: {e}"),
            }
        }
        return Ok(());
    }

    let Some(id) = args.tournament else {
        bail!("a tournament id or --due is required");
    };
    let report = lifecycle
        .settlement()
        .process_results_at(TournamentId(id), app.as_of)?;
    app.save()?;
    println!(
        "Tournament {} settled: {} participation(s), {} caller(s) frozen.",
        report.tournament,
        report.standings.len(),
        report.frozen_callers
    );
    Ok(())
}

fn standings(app: &App, args: StartArgs) -> Result<()> {
    let id = TournamentId(args.tournament);
    let tournament = app
        .store
        .tournament(id)?
        .with_context(|| format!("tournament {id} not found"))?;
    let mut participations = app.store.participations(id)?;
    participations.sort_by_key(|p| (p.result.is_none(), p.result.map(|r| r.rank), p.id));

    println!("\n=== {} ({}) ===", tournament.name, tournament.status);
    println!("{:>5}  {:>12}  wallet", "rank", "score");
    for p in &participations {
        match p.result {
            Some(result) => println!("{:>5}  {:>12.2}  {}", result.rank, result.score, p.wallet_pubkey),
            None => println!("{:>5}  {:>12}  {}", "-", "-", p.wallet_pubkey),
        }
    }
    Ok(())
}
