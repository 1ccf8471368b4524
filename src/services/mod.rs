// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Services module - collection, computation and payouts.

pub mod aggregator;
pub mod collector;
pub mod leaderboard;
pub mod normalizer;
pub mod payout;
pub mod pipeline;
pub mod relay;
pub mod rewards;
pub mod scoring;

pub use collector::{CollectError, CollectOutcome, CollectTimeouts, Collector};
pub use leaderboard::RankOptions;
pub use payout::{DryRunPayoutSender, HttpPayoutClient, PayoutSender};
pub use pipeline::{Pipeline, PipelineError, PipelineRun, PipelineSettings};
pub use relay::{EventFetcher, RelayClient, RelayError};
pub use rewards::{RewardCalculator, RewardSchedule, ScheduleError};
pub use scoring::ScoringEngine;
