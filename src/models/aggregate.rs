//! Per-participant aggregates.
//!
//! Built fresh for every aggregation run by folding normalized workouts;
//! never shared across runs.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::models::WorkoutRecord;
use crate::time_utils::utc_date;

/// Running totals for one participant within a window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParticipantAggregate {
    pub participant: String,
    /// Total distance across all workouts (km)
    pub total_distance_km: f64,
    pub workout_count: u32,
    /// Distinct UTC calendar days with at least one workout
    pub active_days: BTreeSet<NaiveDate>,
    /// Workouts ordered by (timestamp, source record id)
    pub records: Vec<WorkoutRecord>,
}

impl ParticipantAggregate {
    pub fn new(participant: impl Into<String>) -> Self {
        Self {
            participant: participant.into(),
            total_distance_km: 0.0,
            workout_count: 0,
            active_days: BTreeSet::new(),
            records: Vec::new(),
        }
    }

    /// Build an aggregate from a batch of workouts in one pass.
    ///
    /// Sorts into canonical order, drops repeated source records and sums
    /// the distance once. Produces the same aggregate as folding the
    /// workouts one by one with [`add_workout`](Self::add_workout).
    pub fn from_workouts(participant: impl Into<String>, mut workouts: Vec<WorkoutRecord>) -> Self {
        workouts.sort_by(|a, b| {
            a.timestamp_sec
                .cmp(&b.timestamp_sec)
                .then_with(|| a.source_record_id.cmp(&b.source_record_id))
        });
        workouts.dedup_by(|b, a| {
            a.timestamp_sec == b.timestamp_sec && a.source_record_id == b.source_record_id
        });

        let mut aggregate = Self::new(participant);
        aggregate.active_days = workouts
            .iter()
            .filter_map(|w| utc_date(w.timestamp_sec))
            .collect();
        aggregate.workout_count = workouts.len() as u32;
        aggregate.total_distance_km = workouts.iter().map(|w| w.distance_km).sum();
        aggregate.records = workouts;
        aggregate
    }

    /// Fold a single workout into the aggregate. For whole batches use
    /// [`from_workouts`](Self::from_workouts).
    ///
    /// Returns `true` if the workout was added.
    /// Returns `false` if a workout from the same source record was already
    /// folded (duplicate).
    ///
    /// The record list is kept in canonical order and the distance total is
    /// summed over that order, so the result does not depend on the order
    /// in which workouts arrive.
    pub fn add_workout(&mut self, workout: WorkoutRecord) -> bool {
        let key = (workout.timestamp_sec, workout.source_record_id.as_str());
        let position = match self
            .records
            .binary_search_by(|r| (r.timestamp_sec, r.source_record_id.as_str()).cmp(&key))
        {
            Ok(_) => return false,
            Err(pos) => pos,
        };

        if let Some(day) = utc_date(workout.timestamp_sec) {
            self.active_days.insert(day);
        }
        self.records.insert(position, workout);
        self.workout_count = self.records.len() as u32;
        self.total_distance_km = self.records.iter().map(|r| r.distance_km).sum();
        true
    }

    /// Fold every workout of `other` into `self`.
    pub fn merge(&mut self, other: ParticipantAggregate) {
        let mut records = std::mem::take(&mut self.records);
        records.extend(other.records);
        *self = Self::from_workouts(std::mem::take(&mut self.participant), records);
    }

    /// Number of distinct active days (the streak length for the window).
    pub fn streak_days(&self) -> u32 {
        self.active_days.len() as u32
    }
}
