// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Workout leaderboard CLI and API server.
//!
//! Exit codes: 0 on a successful computation (also with no participants),
//! 2 when every relay failed, 1 on configuration and other errors.

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use workout_leaderboard::{
    cache::{FileCache, MemoryCache, RecordCache},
    config::Config,
    models::{ExerciseType, Metric, ParticipantStanding, TimeWindow},
    services::{
        leaderboard::RankOptions,
        payout::{distribute_payouts, load_addresses},
        DryRunPayoutSender, HttpPayoutClient, PayoutSender, Pipeline, PipelineError, PipelineRun,
        RelayClient, RewardCalculator,
    },
    time_utils::{format_unix_rfc3339, now_unix},
    AppState,
};

const EXIT_CONFIG: u8 = 1;
const EXIT_COLLECTION_FAILED: u8 = 2;

#[derive(Parser)]
#[command(
    name = "workout-leaderboard",
    version,
    about = "Workout leaderboards and rewards from relay records"
)]
struct Cli {
    /// Relay URL to query (repeatable; overrides RELAYS)
    #[arg(long = "relay", global = true)]
    relays: Vec<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print a ranked leaderboard
    Leaderboard(LeaderboardArgs),
    /// Compute rewards and optionally pay them out
    Rewards(RewardsArgs),
    /// Serve the HTTP API
    Serve,
}

#[derive(Args)]
struct RunArgs {
    /// Window length in days, ending now
    #[arg(long, default_value_t = 7)]
    window: u32,

    /// Built-in reward schedule (legacy or tiered)
    #[arg(long)]
    schedule: Option<String>,

    /// JSON reward schedule (overrides --schedule)
    #[arg(long)]
    schedule_file: Option<PathBuf>,

    /// Only count one exercise type (run, walk, cycle)
    #[arg(long)]
    exercise: Option<ExerciseType>,

    /// Print JSON instead of a table
    #[arg(long)]
    json: bool,
}

#[derive(Args)]
struct LeaderboardArgs {
    #[command(flatten)]
    run: RunArgs,

    /// distance, xp, payout, workouts or streak
    #[arg(long, default_value = "distance")]
    metric: Metric,

    /// Show only the top N participants
    #[arg(long)]
    limit: Option<usize>,

    /// Exclude participants with fewer workouts
    #[arg(long, default_value_t = 0)]
    min_workouts: u32,
}

#[derive(Args)]
struct RewardsArgs {
    #[command(flatten)]
    run: RunArgs,

    /// Send the computed payouts
    #[arg(long, requires = "addresses")]
    pay: bool,

    /// JSON object mapping participant ids to payout addresses
    #[arg(long)]
    addresses: Option<PathBuf>,

    /// Log payouts instead of sending them
    #[arg(long, requires = "pay")]
    dry_run: bool,

    /// Memo attached to each payout
    #[arg(long, default_value = "Workout rewards")]
    memo: String,
}

#[tokio::main]
async fn main() -> ExitCode {
    init_logging();
    let cli = Cli::parse();

    let mut config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!(error = %e, "Failed to load configuration");
            eprintln!("error: {}", e);
            return ExitCode::from(EXIT_CONFIG);
        }
    };
    if !cli.relays.is_empty() {
        config.relays = cli.relays.clone();
    }

    let result = match cli.command {
        Command::Leaderboard(args) => leaderboard(&config, args).await,
        Command::Rewards(args) => rewards(&config, args).await,
        Command::Serve => serve(config).await,
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {:#}", e);
            match e.downcast_ref::<PipelineError>() {
                Some(PipelineError::Collection(_)) => ExitCode::from(EXIT_COLLECTION_FAILED),
                _ => ExitCode::from(EXIT_CONFIG),
            }
        }
    }
}

fn build_pipeline(config: &Config, calculator: RewardCalculator) -> anyhow::Result<Pipeline> {
    let fetcher = Arc::new(RelayClient::new().with_id_verification(config.verify_event_ids));
    let cache: Arc<dyn RecordCache> = match &config.cache_dir {
        Some(dir) => Arc::new(
            FileCache::new(dir)
                .with_context(|| format!("Failed to open cache directory {}", dir.display()))?,
        ),
        None => Arc::new(MemoryCache::new()),
    };

    Ok(Pipeline::new(fetcher, config.pipeline_settings(), calculator).with_cache(cache))
}

async fn run_pipeline(config: &Config, args: &RunArgs) -> anyhow::Result<PipelineRun> {
    let schedule =
        config.reward_schedule(args.schedule.as_deref(), args.schedule_file.as_deref())?;
    let calculator = RewardCalculator::new(schedule)?;
    let pipeline = build_pipeline(config, calculator)?;

    let window = TimeWindow::last_days(args.window, now_unix());
    tracing::info!(
        window_days = args.window,
        since = %format_unix_rfc3339(window.since),
        relays = config.relays.len(),
        "Computing standings"
    );

    Ok(pipeline.run(window, args.exercise).await?)
}

fn print_json<T: serde::Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

async fn leaderboard(config: &Config, args: LeaderboardArgs) -> anyhow::Result<()> {
    let run = run_pipeline(config, &args.run).await?;

    let options = RankOptions {
        limit: args.limit,
        min_workouts: args.min_workouts,
        offset: 0,
    };
    let entries = run.leaderboard(args.metric, &options);

    if args.run.json {
        return print_json(&serde_json::json!({
            "metric": args.metric,
            "entries": entries,
            "report": run.report,
        }));
    }

    println!(
        "{} leaderboard, last {} days ({} of {} relays answered)",
        args.metric,
        args.run.window,
        run.report.endpoints_succeeded(),
        run.report.endpoints.len()
    );
    if entries.is_empty() {
        println!("No workouts in this window.");
        return Ok(());
    }
    for entry in &entries {
        println!(
            "{:>4}  {:<66}  {}",
            entry.rank,
            entry.participant,
            format_metric(args.metric, entry.metric_value)
        );
    }
    Ok(())
}

fn format_metric(metric: Metric, value: f64) -> String {
    match metric {
        Metric::Distance => format!("{:.2} km", value),
        Metric::Xp => format!("{} XP", value),
        Metric::Payout => format!("{} sats", value),
        Metric::Workouts => format!("{} workouts", value),
        Metric::Streak => format!("{} days", value),
    }
}

async fn rewards(config: &Config, args: RewardsArgs) -> anyhow::Result<()> {
    let run = run_pipeline(config, &args.run).await?;

    let mut standings: Vec<&ParticipantStanding> = run
        .standings
        .iter()
        .filter(|s| s.reward.total_payout > 0)
        .collect();
    standings.sort_by(|a, b| {
        b.reward
            .total_payout
            .cmp(&a.reward.total_payout)
            .then_with(|| a.participant().cmp(b.participant()))
    });

    if args.run.json && !args.pay {
        return print_json(&serde_json::json!({
            "rewards": standings.iter().map(|s| &s.reward).collect::<Vec<_>>(),
            "total_payout_pool": run.total_payout_pool,
            "report": run.report,
        }));
    }

    if !args.run.json {
        for s in &standings {
            println!(
                "{:<66}  level {:>3}  {:>6} sats (workouts {}, streak {}, level bonus {})",
                s.participant(),
                s.score.level,
                s.reward.total_payout,
                s.reward.workout_payout,
                s.reward.streak_payout,
                s.reward.level_bonus
            );
        }
        println!(
            "{} participants, total payout pool {} sats",
            standings.len(),
            run.total_payout_pool
        );
    }

    if !args.pay {
        return Ok(());
    }

    let Some(path) = args.addresses.as_deref() else {
        anyhow::bail!("--pay requires --addresses");
    };
    let addresses = load_addresses(path)?;
    let sender: Box<dyn PayoutSender> = if args.dry_run {
        Box::new(DryRunPayoutSender)
    } else {
        let (url, key) = config.payout_credentials()?;
        Box::new(HttpPayoutClient::new(url, key))
    };

    let results = run.rewards();
    let summary = distribute_payouts(sender.as_ref(), &results, &addresses, &args.memo).await;

    if args.run.json {
        print_json(&summary)?;
    } else {
        println!(
            "Paid {} participants ({} sats), {} failed, {} without address",
            summary.paid.len(),
            summary.total_paid_sats,
            summary.failed.len(),
            summary.missing_address.len()
        );
        for failure in &summary.failed {
            println!(
                "  failed: {} ({} sats): {}",
                failure.participant, failure.amount_sats, failure.reason
            );
        }
    }

    if !summary.is_complete_success() {
        anyhow::bail!("{} payouts failed", summary.failed.len());
    }
    Ok(())
}

async fn serve(config: Config) -> anyhow::Result<()> {
    tracing::info!(
        port = config.port,
        relays = config.relays.len(),
        "Starting workout leaderboard API"
    );

    let schedule = config.reward_schedule(None, None)?;
    let calculator = RewardCalculator::new(schedule)?;
    let pipeline = build_pipeline(&config, calculator)?;

    let port = config.port;
    let state = Arc::new(AppState::new(config, pipeline));
    let app = workout_leaderboard::routes::create_router(state);

    let addr = format!("0.0.0.0:{}", port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    tracing::info!(address = %addr, "Server listening");

    axum::serve(listener, app).await?;
    Ok(())
}

/// Initialize structured JSON logging on stderr (stdout carries CLI output).
fn init_logging() {
    let format = tracing_subscriber::fmt::layer()
        .json()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_current_span(true)
        .flatten_event(true);

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::builder()
                .with_default_directive(tracing::level_filters::LevelFilter::INFO.into())
                .from_env_lossy()
                .add_directive(
                    "workout_leaderboard=debug"
                        .parse()
                        .unwrap_or_else(|_| tracing::level_filters::LevelFilter::INFO.into()),
                ),
        )
        .with(format)
        .init();
}
