// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Derived results: scores, rewards and leaderboard entries.
//!
//! All of these are recomputed from aggregates on every run.

use crate::models::ParticipantAggregate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

/// Experience points and level for a participant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct ScoreResult {
    pub participant: String,
    #[cfg_attr(feature = "binding-generation", ts(type = "number"))]
    pub total_xp: u64,
    pub level: u32,
    /// Workouts at or above the qualifying distance
    pub qualifying_workouts: u32,
    /// XP still needed for the next level (`None` at the level cap)
    #[cfg_attr(feature = "binding-generation", ts(type = "number | null"))]
    pub xp_to_next_level: Option<u64>,
}

/// Payout breakdown for a participant, in sats.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct RewardResult {
    pub participant: String,
    #[cfg_attr(feature = "binding-generation", ts(type = "number"))]
    pub workout_payout: u64,
    #[cfg_attr(feature = "binding-generation", ts(type = "number"))]
    pub streak_payout: u64,
    #[cfg_attr(feature = "binding-generation", ts(type = "number"))]
    pub level_bonus: u64,
    #[cfg_attr(feature = "binding-generation", ts(type = "number"))]
    pub total_payout: u64,
}

/// Metric a leaderboard is ordered by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
#[serde(rename_all = "lowercase")]
pub enum Metric {
    #[default]
    Distance,
    Xp,
    Payout,
    Workouts,
    Streak,
}

impl Metric {
    pub fn as_str(&self) -> &'static str {
        match self {
            Metric::Distance => "distance",
            Metric::Xp => "xp",
            Metric::Payout => "payout",
            Metric::Workouts => "workouts",
            Metric::Streak => "streak",
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Metric {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "distance" => Ok(Metric::Distance),
            "xp" => Ok(Metric::Xp),
            "payout" => Ok(Metric::Payout),
            "workouts" => Ok(Metric::Workouts),
            "streak" => Ok(Metric::Streak),
            other => Err(format!("unknown metric: {}", other)),
        }
    }
}

/// One row of a leaderboard.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct RankedEntry {
    /// 1-based position
    pub rank: u32,
    pub participant: String,
    pub metric_value: f64,
}

/// Everything derived for one participant in a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParticipantStanding {
    pub aggregate: ParticipantAggregate,
    pub score: ScoreResult,
    pub reward: RewardResult,
}

impl ParticipantStanding {
    pub fn participant(&self) -> &str {
        &self.aggregate.participant
    }

    /// Value of `metric` for this participant.
    pub fn metric_value(&self, metric: Metric) -> f64 {
        match metric {
            Metric::Distance => self.aggregate.total_distance_km,
            Metric::Xp => self.score.total_xp as f64,
            Metric::Payout => self.reward.total_payout as f64,
            Metric::Workouts => f64::from(self.aggregate.workout_count),
            Metric::Streak => f64::from(self.aggregate.streak_days()),
        }
    }
}
