// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Participant aggregation.
//!
//! Groups workouts by participant and folds them into fresh aggregates.
//! The fold is order-independent: the same workouts in any order produce
//! identical aggregates, which matters because relay arrival order is not
//! deterministic.

use crate::models::{ExerciseType, ParticipantAggregate, TimeWindow, WorkoutRecord};
use std::collections::BTreeMap;

/// Aggregates keyed by participant identity.
pub type AggregateMap = BTreeMap<String, ParticipantAggregate>;

/// Fold every workout inside `window` into per-participant aggregates.
pub fn aggregate<'a, I>(records: I, window: TimeWindow) -> AggregateMap
where
    I: IntoIterator<Item = &'a WorkoutRecord>,
{
    aggregate_filtered(records, window, None)
}

/// Like [`aggregate`], optionally keeping only one exercise type.
///
/// Type-specific leaderboards pass `Some(type)`, which also excludes
/// workouts of unknown type.
pub fn aggregate_filtered<'a, I>(
    records: I,
    window: TimeWindow,
    exercise: Option<ExerciseType>,
) -> AggregateMap
where
    I: IntoIterator<Item = &'a WorkoutRecord>,
{
    let mut grouped: BTreeMap<&str, Vec<WorkoutRecord>> = BTreeMap::new();
    let mut outside_window = 0usize;

    for workout in records {
        if !window.contains(workout.timestamp_sec) {
            outside_window += 1;
            continue;
        }
        if exercise.is_some_and(|wanted| workout.exercise_type != wanted) {
            continue;
        }

        grouped
            .entry(workout.participant.as_str())
            .or_default()
            .push(workout.clone());
    }

    if outside_window > 0 {
        tracing::debug!(outside_window, "Skipped workouts outside aggregation window");
    }

    grouped
        .into_iter()
        .map(|(participant, workouts)| {
            (
                participant.to_string(),
                ParticipantAggregate::from_workouts(participant, workouts),
            )
        })
        .collect()
}
