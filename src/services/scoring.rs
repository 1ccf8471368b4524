// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Experience points and levels.
//!
//! Each qualifying workout earns a flat base amount plus a bonus for every
//! additional full distance unit beyond the qualifying distance. Levels use
//! a stepwise table: `100 * level` XP up to level 10, then a quadratic
//! term above it, capped at [`MAX_LEVEL`].

use crate::models::{ParticipantAggregate, ScoreResult};
use crate::services::normalizer::KM_PER_MILE;

/// Highest representable level.
pub const MAX_LEVEL: u32 = 100;

/// Last level of the linear segment.
const LINEAR_LEVELS: u32 = 10;
const XP_PER_LINEAR_LEVEL: u64 = 100;
const XP_PER_LEVEL_ABOVE_LINEAR: u64 = 150;
const XP_QUADRATIC_STEP: u64 = 25;

/// Tolerance for unit conversion round-off (e.g. 2 mi stored as km).
const DISTANCE_EPSILON: f64 = 1e-9;

/// Per-workout XP rules.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoringConfig {
    /// XP for any qualifying workout
    pub base_xp: u64,
    /// XP per full distance unit beyond the qualifying distance
    pub bonus_xp_per_unit: u64,
    /// Minimum distance (in units) for a workout to earn XP
    pub qualifying_distance: f64,
    /// Length of one distance unit in km
    pub unit_km: f64,
}

impl Default for ScoringConfig {
    /// 10 XP per workout of at least one mile, +5 XP per additional mile.
    fn default() -> Self {
        Self {
            base_xp: 10,
            bonus_xp_per_unit: 5,
            qualifying_distance: 1.0,
            unit_km: KM_PER_MILE,
        }
    }
}

/// Cumulative XP needed to reach `level`.
pub fn xp_required_for_level(level: u32) -> u64 {
    let level = u64::from(level);
    let linear = u64::from(LINEAR_LEVELS);
    if level <= linear {
        return level * XP_PER_LINEAR_LEVEL;
    }
    let above = level - linear;
    linear * XP_PER_LINEAR_LEVEL
        + above * XP_PER_LEVEL_ABOVE_LINEAR
        + above * (above - 1) * XP_QUADRATIC_STEP
}

/// Largest level whose cumulative requirement is covered by `total_xp`.
///
/// Walks the table step by step; levels below 1 map to 0.
pub fn level_for_xp(total_xp: u64) -> u32 {
    let mut level = 0;
    while level < MAX_LEVEL && xp_required_for_level(level + 1) <= total_xp {
        level += 1;
    }
    level
}

/// Computes [`ScoreResult`]s from aggregates.
#[derive(Debug, Clone, Copy, Default)]
pub struct ScoringEngine {
    config: ScoringConfig,
}

impl ScoringEngine {
    pub fn new(config: ScoringConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ScoringConfig {
        &self.config
    }

    /// XP for one workout; 0 below the qualifying distance.
    pub fn workout_xp(&self, distance_km: f64) -> u64 {
        let units = distance_km / self.config.unit_km + DISTANCE_EPSILON;
        if units < self.config.qualifying_distance {
            return 0;
        }
        let additional = (units - self.config.qualifying_distance).floor() as u64;
        self.config.base_xp + additional * self.config.bonus_xp_per_unit
    }

    /// Recompute the full score for an aggregate.
    pub fn score(&self, aggregate: &ParticipantAggregate) -> ScoreResult {
        let mut total_xp = 0u64;
        let mut qualifying_workouts = 0u32;

        for workout in &aggregate.records {
            let xp = self.workout_xp(workout.distance_km);
            if xp > 0 {
                qualifying_workouts += 1;
                total_xp += xp;
            }
        }

        let level = level_for_xp(total_xp);
        let xp_to_next_level =
            (level < MAX_LEVEL).then(|| xp_required_for_level(level + 1) - total_xp);

        ScoreResult {
            participant: aggregate.participant.clone(),
            total_xp,
            level,
            qualifying_workouts,
            xp_to_next_level,
        }
    }
}
