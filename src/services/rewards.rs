// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Reward schedules and the reward calculator.
//!
//! A [`RewardSchedule`] is plain data (built in, or loaded from JSON) and is
//! validated once when a [`RewardCalculator`] is built. A misconfigured
//! schedule fails there, before any participant is processed.
//!
//! Two mutually exclusive modes exist:
//! - `tiered`: the payout tier for the participant's workout count in the
//!   window (or the sum of tiers up to it, with `tier_mode: cumulative`),
//!   plus level bonuses for every level the participant has reached
//! - `legacy`: a flat rate per workout plus a flat rate per active day

use crate::models::{ParticipantAggregate, RewardResult};
use crate::services::scoring::ScoringEngine;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// How streak tiers turn a workout count into a payout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TierMode {
    /// Pay the single tier matching the workout count.
    #[default]
    ForCount,
    /// Pay the sum of every tier from 1 up to the workout count.
    Cumulative,
}

/// Tiered schedule as configured.
///
/// Amounts are signed so that negative values in a config file are
/// reported as errors instead of failing to parse.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TieredSchedule {
    /// Workout count -> payout. Keys must run 1..=N without gaps.
    #[serde(deserialize_with = "numeric_keys")]
    pub streak_tier_payout: BTreeMap<u32, i64>,
    /// Level -> flat bonus, paid once the participant reaches that level
    #[serde(default, deserialize_with = "numeric_keys")]
    pub level_bonus: BTreeMap<u32, i64>,
    /// Level -> bonus per active day, paid once the participant reaches that level
    #[serde(default, deserialize_with = "numeric_keys")]
    pub level_day_bonus: BTreeMap<u32, i64>,
    #[serde(default)]
    pub tier_mode: TierMode,
}

/// Map with JSON object keys (`"1"`) parsed as counts or levels.
///
/// The tagged enum below buffers its input, after which serde no longer
/// converts string keys to integers on its own.
fn numeric_keys<'de, D>(deserializer: D) -> Result<BTreeMap<u32, i64>, D::Error>
where
    D: Deserializer<'de>,
{
    BTreeMap::<String, i64>::deserialize(deserializer)?
        .into_iter()
        .map(|(key, value)| {
            key.trim()
                .parse::<u32>()
                .map(|k| (k, value))
                .map_err(|_| serde::de::Error::custom(format!("invalid numeric key {:?}", key)))
        })
        .collect()
}

/// Reward schedule, selected by the `mode` field in JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum RewardSchedule {
    Tiered(TieredSchedule),
    Legacy {
        sats_per_workout: i64,
        sats_per_streak_day: i64,
    },
}

impl RewardSchedule {
    /// 20 sats per tier step up to 140 sats at 7 workouts, +50 at level 1,
    /// +5 per active day at level 2.
    pub fn tiered() -> Self {
        RewardSchedule::Tiered(TieredSchedule {
            streak_tier_payout: (1..=7).map(|count| (count, 20 * i64::from(count))).collect(),
            level_bonus: BTreeMap::from([(1, 50)]),
            level_day_bonus: BTreeMap::from([(2, 5)]),
            tier_mode: TierMode::ForCount,
        })
    }

    /// 50 sats per workout plus 50 sats per active day.
    pub fn legacy() -> Self {
        RewardSchedule::Legacy {
            sats_per_workout: 50,
            sats_per_streak_day: 50,
        }
    }

    /// Built-in schedule by name (`tiered` or `legacy`).
    pub fn named(name: &str) -> Result<Self, ScheduleError> {
        match name.to_ascii_lowercase().as_str() {
            "tiered" => Ok(Self::tiered()),
            "legacy" => Ok(Self::legacy()),
            _ => Err(ScheduleError::UnknownSchedule(name.to_string())),
        }
    }

    pub fn from_json(json: &str) -> Result<Self, ScheduleError> {
        serde_json::from_str(json).map_err(|e| ScheduleError::Load(e.to_string()))
    }

    pub fn from_file(path: &Path) -> Result<Self, ScheduleError> {
        let json = std::fs::read_to_string(path)
            .map_err(|e| ScheduleError::Load(format!("{}: {}", path.display(), e)))?;
        Self::from_json(&json)
    }

    /// Short name for logs and API responses.
    pub fn name(&self) -> &'static str {
        match self {
            RewardSchedule::Tiered(_) => "tiered",
            RewardSchedule::Legacy { .. } => "legacy",
        }
    }
}

/// Schedule misconfiguration, reported at calculator construction.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ScheduleError {
    #[error("Negative payout in {field} for key {key}: {value}")]
    NegativePayout {
        field: &'static str,
        key: u32,
        value: i64,
    },

    #[error("Streak tier table is empty")]
    EmptyTiers,

    #[error("Missing streak tier {0}")]
    MissingTier(u32),

    #[error("Unknown reward schedule: {0}")]
    UnknownSchedule(String),

    #[error("Failed to load reward schedule: {0}")]
    Load(String),
}

/// Validated form of a schedule.
#[derive(Debug, Clone, PartialEq)]
enum Plan {
    Tiered {
        /// `tiers[i]` pays for a workout count of `i + 1`
        tiers: Vec<u64>,
        level_bonus: Vec<(u32, u64)>,
        level_day_bonus: Vec<(u32, u64)>,
        tier_mode: TierMode,
    },
    Legacy {
        per_workout: u64,
        per_day: u64,
    },
}

/// Computes [`RewardResult`]s under a validated schedule.
#[derive(Debug, Clone)]
pub struct RewardCalculator {
    schedule: RewardSchedule,
    plan: Plan,
    scoring: ScoringEngine,
}

impl RewardCalculator {
    /// Validate `schedule` and build a calculator.
    pub fn new(schedule: RewardSchedule) -> Result<Self, ScheduleError> {
        let plan = validate(&schedule)?;
        Ok(Self {
            schedule,
            plan,
            scoring: ScoringEngine::default(),
        })
    }

    /// Use a non-default scoring engine for level lookups.
    pub fn with_scoring(mut self, scoring: ScoringEngine) -> Self {
        self.scoring = scoring;
        self
    }

    pub fn schedule(&self) -> &RewardSchedule {
        &self.schedule
    }

    /// Reward for one aggregate; the level comes from the scoring engine.
    pub fn reward(&self, aggregate: &ParticipantAggregate) -> RewardResult {
        let level = self.scoring.score(aggregate).level;
        self.reward_with_level(aggregate, level)
    }

    /// Reward for one aggregate at an already computed level.
    pub fn reward_with_level(&self, aggregate: &ParticipantAggregate, level: u32) -> RewardResult {
        let workouts = u64::from(aggregate.workout_count);
        let days = aggregate.streak_days() as u64;

        let (workout_payout, streak_payout, level_bonus) = match &self.plan {
            Plan::Tiered {
                tiers,
                level_bonus,
                level_day_bonus,
                tier_mode,
            } => {
                let streak = tier_payout(tiers, aggregate.workout_count, *tier_mode);
                let flat: u64 = level_bonus
                    .iter()
                    .filter(|(unlock, _)| *unlock <= level)
                    .map(|(_, amount)| *amount)
                    .sum();
                let per_day: u64 = level_day_bonus
                    .iter()
                    .filter(|(unlock, _)| *unlock <= level)
                    .map(|(_, amount)| amount.saturating_mul(days))
                    .sum();
                (0, streak, flat.saturating_add(per_day))
            }
            Plan::Legacy {
                per_workout,
                per_day,
            } => (
                workouts.saturating_mul(*per_workout),
                days.saturating_mul(*per_day),
                0,
            ),
        };

        RewardResult {
            participant: aggregate.participant.clone(),
            workout_payout,
            streak_payout,
            level_bonus,
            total_payout: workout_payout
                .saturating_add(streak_payout)
                .saturating_add(level_bonus),
        }
    }
}

/// Sum of all payouts.
pub fn total_payout_pool(results: &[RewardResult]) -> u64 {
    results
        .iter()
        .fold(0u64, |acc, r| acc.saturating_add(r.total_payout))
}

fn tier_payout(tiers: &[u64], count: u32, mode: TierMode) -> u64 {
    let Some(&top) = tiers.last() else {
        return 0;
    };
    let tier = |n: usize| tiers.get(n - 1).copied().unwrap_or(top);
    let count = count as usize;
    if count == 0 {
        return 0;
    }
    match mode {
        TierMode::ForCount => tier(count),
        TierMode::Cumulative => (1..=count).fold(0u64, |acc, n| acc.saturating_add(tier(n))),
    }
}

fn non_negative(field: &'static str, key: u32, value: i64) -> Result<u64, ScheduleError> {
    u64::try_from(value).map_err(|_| ScheduleError::NegativePayout { field, key, value })
}

fn validate_bonus(
    field: &'static str,
    bonus: &BTreeMap<u32, i64>,
) -> Result<Vec<(u32, u64)>, ScheduleError> {
    bonus
        .iter()
        .map(|(&level, &value)| Ok((level, non_negative(field, level, value)?)))
        .collect()
}

fn validate(schedule: &RewardSchedule) -> Result<Plan, ScheduleError> {
    match schedule {
        RewardSchedule::Tiered(tiered) => {
            if tiered.streak_tier_payout.is_empty() {
                return Err(ScheduleError::EmptyTiers);
            }
            let mut tiers = Vec::with_capacity(tiered.streak_tier_payout.len());
            for (expected, (&count, &value)) in (1u32..).zip(&tiered.streak_tier_payout) {
                if count != expected {
                    return Err(ScheduleError::MissingTier(expected));
                }
                tiers.push(non_negative("streak_tier_payout", count, value)?);
            }
            Ok(Plan::Tiered {
                tiers,
                level_bonus: validate_bonus("level_bonus", &tiered.level_bonus)?,
                level_day_bonus: validate_bonus("level_day_bonus", &tiered.level_day_bonus)?,
                tier_mode: tiered.tier_mode,
            })
        }
        RewardSchedule::Legacy {
            sats_per_workout,
            sats_per_streak_day,
        } => Ok(Plan::Legacy {
            per_workout: non_negative("sats_per_workout", 0, *sats_per_workout)?,
            per_day: non_negative("sats_per_streak_day", 0, *sats_per_streak_day)?,
        }),
    }
}
