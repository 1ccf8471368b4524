// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Data models for the pipeline.

pub mod aggregate;
pub mod filter;
pub mod record;
pub mod results;
pub mod workout;

pub use aggregate::ParticipantAggregate;
pub use filter::{RecordFilter, TimeWindow};
pub use record::RawRecord;
pub use results::{Metric, ParticipantStanding, RankedEntry, RewardResult, ScoreResult};
pub use workout::{ExerciseType, WorkoutRecord};
