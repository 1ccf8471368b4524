// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Read-only API over pipeline runs.

use crate::error::{AppError, Result};
use crate::models::{ExerciseType, Metric, RankedEntry, RewardResult, ScoreResult, TimeWindow};
use crate::services::leaderboard::{rank, ranked_count, RankOptions};
use crate::services::{PipelineRun, RewardCalculator, RewardSchedule};
use crate::time_utils::{format_unix_rfc3339, now_unix};
use crate::{AppState, CachedRun, RunKey, RUN_CACHE_TTL};
use axum::{
    extract::{Path, Query, State},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

/// Schedule label used when the request does not name one.
const CONFIGURED_SCHEDULE: &str = "configured";
const MAX_WINDOW_DAYS: u32 = 365;
const MAX_PER_PAGE: u32 = 100;

/// Public API routes.
pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/leaderboard", get(get_leaderboard))
        .route("/api/rewards", get(get_rewards))
        .route("/api/participants/{id}", get(get_participant))
}

fn default_window() -> u32 {
    7
}
fn default_page() -> u32 {
    1
}
fn default_per_page() -> u32 {
    50
}

// ─── Run lookup ──────────────────────────────────────────────

fn parse_run_key(window: u32, exercise: Option<&str>, schedule: Option<&str>) -> Result<RunKey> {
    if window == 0 || window > MAX_WINDOW_DAYS {
        return Err(AppError::BadRequest(format!(
            "'window' must be between 1 and {} days",
            MAX_WINDOW_DAYS
        )));
    }

    let exercise = exercise
        .map(|e| e.parse::<ExerciseType>())
        .transpose()
        .map_err(AppError::BadRequest)?;

    Ok(RunKey {
        window_days: window,
        exercise,
        schedule: schedule
            .map(str::to_lowercase)
            .unwrap_or_else(|| CONFIGURED_SCHEDULE.to_string()),
    })
}

/// Computed run for `key`, reusing a recent one when available.
async fn load_run(state: &AppState, key: RunKey) -> Result<Arc<PipelineRun>> {
    if let Some(cached) = state.runs.get(&key) {
        if cached.computed_at.elapsed() < RUN_CACHE_TTL {
            return Ok(cached.run.clone());
        }
    }

    let pipeline = if key.schedule == CONFIGURED_SCHEDULE {
        state.pipeline.clone()
    } else {
        let calculator = RewardSchedule::named(&key.schedule)
            .and_then(RewardCalculator::new)
            .map_err(|e| AppError::BadRequest(e.to_string()))?;
        state.pipeline.clone().with_rewards(calculator)
    };

    let window = TimeWindow::last_days(key.window_days, now_unix());
    let run = Arc::new(pipeline.run(window, key.exercise).await?);

    state.runs.insert(
        key,
        CachedRun {
            run: run.clone(),
            computed_at: Instant::now(),
        },
    );
    Ok(run)
}

/// Window bounds as reported in responses.
#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct WindowInfo {
    pub days: u32,
    pub since: String,
    pub until: String,
}

impl WindowInfo {
    fn new(days: u32, window: TimeWindow) -> Self {
        Self {
            days,
            since: format_unix_rfc3339(window.since),
            until: format_unix_rfc3339(window.until),
        }
    }
}

// ─── Leaderboard ─────────────────────────────────────────────

#[derive(Deserialize)]
struct LeaderboardQuery {
    #[serde(default = "default_window")]
    window: u32,
    #[serde(default)]
    metric: Metric,
    exercise: Option<String>,
    schedule: Option<String>,
    #[serde(default)]
    min_workouts: u32,
    /// Pagination: page number (1-indexed)
    #[serde(default = "default_page")]
    page: u32,
    /// Pagination: items per page
    #[serde(default = "default_per_page")]
    per_page: u32,
}

#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct LeaderboardResponse {
    pub metric: Metric,
    pub window: WindowInfo,
    pub entries: Vec<RankedEntry>,
    pub page: u32,
    pub per_page: u32,
    /// Participants that pass the `min_workouts` filter
    pub total: u32,
    /// Relays that answered, out of `endpoints_total`
    pub endpoints_succeeded: u32,
    pub endpoints_total: u32,
}

async fn get_leaderboard(
    State(state): State<Arc<AppState>>,
    Query(params): Query<LeaderboardQuery>,
) -> Result<Json<LeaderboardResponse>> {
    tracing::debug!(
        window = params.window,
        metric = %params.metric,
        exercise = ?params.exercise,
        page = params.page,
        "Fetching leaderboard"
    );

    if params.page < 1 {
        return Err(AppError::BadRequest(
            "Page must be greater than 0".to_string(),
        ));
    }
    let per_page = params.per_page.clamp(1, MAX_PER_PAGE);

    let key = parse_run_key(
        params.window,
        params.exercise.as_deref(),
        params.schedule.as_deref(),
    )?;
    let run = load_run(&state, key).await?;

    let options = RankOptions::page(params.page as usize, per_page as usize)
        .with_min_workouts(params.min_workouts);
    let entries = rank(&run.standings, params.metric, &options);
    let total = ranked_count(&run.standings, params.min_workouts);

    Ok(Json(LeaderboardResponse {
        metric: params.metric,
        window: WindowInfo::new(params.window, run.report.window),
        entries,
        page: params.page,
        per_page,
        total: total as u32,
        endpoints_succeeded: run.report.endpoints_succeeded() as u32,
        endpoints_total: run.report.endpoints.len() as u32,
    }))
}

// ─── Rewards ─────────────────────────────────────────────────

#[derive(Deserialize)]
struct RewardsQuery {
    #[serde(default = "default_window")]
    window: u32,
    exercise: Option<String>,
    schedule: Option<String>,
}

#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct RewardsResponse {
    pub schedule: String,
    pub window: WindowInfo,
    /// Highest payout first
    pub rewards: Vec<RewardResult>,
    #[cfg_attr(feature = "binding-generation", ts(type = "number"))]
    pub total_payout_pool: u64,
}

async fn get_rewards(
    State(state): State<Arc<AppState>>,
    Query(params): Query<RewardsQuery>,
) -> Result<Json<RewardsResponse>> {
    let key = parse_run_key(
        params.window,
        params.exercise.as_deref(),
        params.schedule.as_deref(),
    )?;
    let schedule = if key.schedule == CONFIGURED_SCHEDULE {
        state.pipeline.rewards().schedule().name().to_string()
    } else {
        key.schedule.clone()
    };
    let run = load_run(&state, key).await?;

    let mut rewards = run.rewards();
    rewards.sort_by(|a, b| {
        b.total_payout
            .cmp(&a.total_payout)
            .then_with(|| a.participant.cmp(&b.participant))
    });

    Ok(Json(RewardsResponse {
        schedule,
        window: WindowInfo::new(params.window, run.report.window),
        rewards,
        total_payout_pool: run.total_payout_pool,
    }))
}

// ─── Participant ─────────────────────────────────────────────

#[derive(Deserialize)]
struct ParticipantQuery {
    #[serde(default = "default_window")]
    window: u32,
    schedule: Option<String>,
}

#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct ParticipantResponse {
    pub participant: String,
    pub window: WindowInfo,
    pub total_distance_km: f64,
    pub workout_count: u32,
    /// UTC dates (YYYY-MM-DD) with at least one workout
    pub active_days: Vec<String>,
    /// Position on the distance leaderboard
    pub distance_rank: Option<u32>,
    pub score: ScoreResult,
    pub reward: RewardResult,
}

async fn get_participant(
    State(state): State<Arc<AppState>>,
    Path(participant): Path<String>,
    Query(params): Query<ParticipantQuery>,
) -> Result<Json<ParticipantResponse>> {
    let key = parse_run_key(params.window, None, params.schedule.as_deref())?;
    let run = load_run(&state, key).await?;

    let standing = run
        .standing(&participant)
        .ok_or_else(|| AppError::NotFound(format!("Participant {}", participant)))?;

    let distance_rank = rank(&run.standings, Metric::Distance, &RankOptions::default())
        .into_iter()
        .find(|e| e.participant == participant)
        .map(|e| e.rank);

    Ok(Json(ParticipantResponse {
        participant: participant.clone(),
        window: WindowInfo::new(params.window, run.report.window),
        total_distance_km: standing.aggregate.total_distance_km,
        workout_count: standing.aggregate.workout_count,
        active_days: standing
            .aggregate
            .active_days
            .iter()
            .map(|d| d.format("%Y-%m-%d").to_string())
            .collect(),
        distance_rank,
        score: standing.score.clone(),
        reward: standing.reward.clone(),
    }))
}
