// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Workout leaderboard: collect workout records from relays and turn them
//! into leaderboards, levels and rewards.
//!
//! This crate provides the collection pipeline, the scoring and reward
//! computations, and a small read-only HTTP API over them.

pub mod cache;
pub mod config;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod time_utils;

use config::Config;
use dashmap::DashMap;
use models::ExerciseType;
use services::{Pipeline, PipelineRun};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// How long a computed run is reused for identical API queries.
pub const RUN_CACHE_TTL: Duration = Duration::from_secs(60);

/// Identifies one computed run: window length, exercise filter, schedule.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RunKey {
    pub window_days: u32,
    pub exercise: Option<ExerciseType>,
    pub schedule: String,
}

/// Computed run with the time it was produced.
#[derive(Clone)]
pub struct CachedRun {
    pub run: Arc<PipelineRun>,
    pub computed_at: Instant,
}

/// Shared cache of computed runs for use in AppState.
pub type RunCache = Arc<DashMap<RunKey, CachedRun>>;

/// Shared application state.
pub struct AppState {
    pub config: Config,
    pub pipeline: Pipeline,
    pub runs: RunCache,
}

impl AppState {
    pub fn new(config: Config, pipeline: Pipeline) -> Self {
        Self {
            config,
            pipeline,
            runs: Arc::new(DashMap::new()),
        }
    }
}
