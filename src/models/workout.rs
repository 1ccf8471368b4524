// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Normalized workout model.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

/// Exercise type derived from record tags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
#[serde(rename_all = "lowercase")]
pub enum ExerciseType {
    Run,
    Walk,
    Cycle,
    Unknown,
}

impl ExerciseType {
    /// Classify a free-form exercise label (tag value or hashtag).
    pub fn from_label(label: &str) -> Self {
        match label.trim().to_lowercase().as_str() {
            "run" | "running" | "jog" | "jogging" => ExerciseType::Run,
            "walk" | "walking" | "hike" | "hiking" => ExerciseType::Walk,
            "cycle" | "cycling" | "bike" | "biking" | "ride" => ExerciseType::Cycle,
            _ => ExerciseType::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ExerciseType::Run => "run",
            ExerciseType::Walk => "walk",
            ExerciseType::Cycle => "cycle",
            ExerciseType::Unknown => "unknown",
        }
    }
}

impl fmt::Display for ExerciseType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ExerciseType {
    type Err = String;

    /// Strict parse used for query parameters; `unknown` is not selectable.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match ExerciseType::from_label(s) {
            ExerciseType::Unknown => Err(format!("unsupported exercise type: {}", s)),
            t => Ok(t),
        }
    }
}

/// A workout extracted from a raw record.
///
/// Invariant: `distance_km` lies inside the plausibility bounds enforced by
/// the normalizer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkoutRecord {
    /// Author identity of the source record
    pub participant: String,
    /// Creation time (Unix seconds)
    pub timestamp_sec: i64,
    pub exercise_type: ExerciseType,
    /// Distance in kilometers
    pub distance_km: f64,
    pub source_record_id: String,
}
