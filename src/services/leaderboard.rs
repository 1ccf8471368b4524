// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Leaderboard ranking.

use crate::models::{Metric, ParticipantStanding, RankedEntry};
use std::cmp::Ordering;

/// Optional restrictions on a ranking.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RankOptions {
    /// Keep only the first `limit` entries (after `offset`)
    pub limit: Option<usize>,
    /// Exclude participants with fewer workouts
    pub min_workouts: u32,
    /// Skip this many ranked entries (pagination)
    pub offset: usize,
}

impl RankOptions {
    pub fn top(limit: usize) -> Self {
        Self {
            limit: Some(limit),
            ..Self::default()
        }
    }

    /// 1-indexed page of `per_page` entries.
    pub fn page(page: usize, per_page: usize) -> Self {
        Self {
            limit: Some(per_page),
            offset: page.saturating_sub(1).saturating_mul(per_page),
            ..Self::default()
        }
    }

    pub fn with_min_workouts(mut self, min_workouts: u32) -> Self {
        self.min_workouts = min_workouts;
        self
    }
}

/// Rank participants by `metric`, highest first.
///
/// Equal values are ordered by ascending participant id. Ranks are 1-based
/// positions in the full ordering, so a page keeps the ranks it would have
/// in the unpaginated list.
pub fn rank(
    standings: &[ParticipantStanding],
    metric: Metric,
    options: &RankOptions,
) -> Vec<RankedEntry> {
    let mut rows: Vec<(f64, &str)> = standings
        .iter()
        .filter(|s| s.aggregate.workout_count >= options.min_workouts)
        .map(|s| (s.metric_value(metric), s.participant()))
        .collect();

    rows.sort_by(|a, b| compare(*a, *b));

    rows.into_iter()
        .enumerate()
        .skip(options.offset)
        .take(options.limit.unwrap_or(usize::MAX))
        .map(|(position, (metric_value, participant))| RankedEntry {
            rank: (position + 1) as u32,
            participant: participant.to_string(),
            metric_value,
        })
        .collect()
}

/// Number of participants that pass the `min_workouts` filter.
pub fn ranked_count(standings: &[ParticipantStanding], min_workouts: u32) -> usize {
    standings
        .iter()
        .filter(|s| s.aggregate.workout_count >= min_workouts)
        .count()
}

fn compare(a: (f64, &str), b: (f64, &str)) -> Ordering {
    b.0.total_cmp(&a.0).then_with(|| a.1.cmp(b.1))
}
