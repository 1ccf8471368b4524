// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Record normalization.
//!
//! Turns a raw record into a [`WorkoutRecord`] with the distance in
//! kilometers. Distance sources are tried in a fixed order:
//! 1. `distance` tag (`["distance", "5", "km"]`, `["distance", "5 km"]`,
//!    or `["distance", "5"]` with a separate `["unit", "km"]` tag)
//! 2. a number followed by a unit word in the free-text content
//!
//! Records without an extractable distance, or with a distance outside the
//! plausibility bounds, are dropped. No distance is ever guessed.

use crate::models::{ExerciseType, RawRecord, WorkoutRecord};
use regex::Regex;
use std::sync::LazyLock;

/// Kilometers per mile.
pub const KM_PER_MILE: f64 = 1.609344;
/// Meters per kilometer.
pub const METERS_PER_KM: f64 = 1000.0;
/// Smallest plausible workout distance (km).
pub const MIN_DISTANCE_KM: f64 = 0.01;
/// Largest plausible workout distance (km).
pub const MAX_DISTANCE_KM: f64 = 500.0;

static CONTENT_DISTANCE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)(\d+(?:\.\d+)?)\s*(kilometers?|kilometres?|km|miles?|mi|meters?|metres?|m)\b",
    )
    .expect("content distance pattern is valid")
});

static TAG_VALUE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*([-+]?(?:\d+(?:\.\d*)?|\.\d+))\s*([A-Za-z]*)")
        .expect("tag distance pattern is valid")
});

/// Distance unit of a tag or content match.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DistanceUnit {
    Kilometers,
    Miles,
    Meters,
}

impl DistanceUnit {
    /// Parse a unit word. `None` for unrecognized units.
    pub fn parse(unit: &str) -> Option<Self> {
        match unit.trim().to_lowercase().as_str() {
            "km" | "kms" | "kilometer" | "kilometers" | "kilometre" | "kilometres" => {
                Some(DistanceUnit::Kilometers)
            }
            "mi" | "mile" | "miles" => Some(DistanceUnit::Miles),
            "m" | "meter" | "meters" | "metre" | "metres" => Some(DistanceUnit::Meters),
            _ => None,
        }
    }

    pub fn to_km(self, value: f64) -> f64 {
        match self {
            DistanceUnit::Kilometers => value,
            DistanceUnit::Miles => value * KM_PER_MILE,
            DistanceUnit::Meters => value / METERS_PER_KM,
        }
    }
}

/// Where a distance was found.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DistanceSource {
    Tag,
    Content,
}

/// Result of distance extraction, before bounds checking.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExtractedDistance {
    pub km: f64,
    pub source: DistanceSource,
}

/// Why a record was not turned into a workout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    NoDistance,
    OutOfBounds,
}

/// Normalize one record. `None` if the record must be excluded.
pub fn normalize(raw: &RawRecord) -> Option<WorkoutRecord> {
    classify(raw).ok()
}

/// Normalize one record, reporting why it was dropped.
pub fn classify(raw: &RawRecord) -> Result<WorkoutRecord, DropReason> {
    let distance = extract_distance(raw).ok_or(DropReason::NoDistance)?;

    if !distance.km.is_finite() || !(MIN_DISTANCE_KM..=MAX_DISTANCE_KM).contains(&distance.km) {
        tracing::debug!(
            id = %raw.id,
            distance_km = distance.km,
            "Rejecting implausible distance"
        );
        return Err(DropReason::OutOfBounds);
    }

    Ok(WorkoutRecord {
        participant: raw.author_id.clone(),
        timestamp_sec: raw.created_at,
        exercise_type: extract_exercise_type(raw),
        distance_km: distance.km,
        source_record_id: raw.id.clone(),
    })
}

/// Extract a distance in km: tag first, content as fallback.
pub fn extract_distance(raw: &RawRecord) -> Option<ExtractedDistance> {
    distance_from_tag(raw)
        .map(|km| ExtractedDistance {
            km,
            source: DistanceSource::Tag,
        })
        .or_else(|| {
            distance_from_content(&raw.content).map(|km| ExtractedDistance {
                km,
                source: DistanceSource::Content,
            })
        })
}

fn distance_from_tag(raw: &RawRecord) -> Option<f64> {
    let tag = raw.tag("distance")?;
    // "5", "5 km" or "5km": numeric prefix plus an optional attached unit
    let captures = TAG_VALUE.captures(tag.get(1)?)?;
    let number: f64 = captures.get(1)?.as_str().parse().ok()?;
    let inline_unit = captures
        .get(2)
        .map(|m| m.as_str())
        .filter(|unit| !unit.is_empty());

    let unit = tag
        .get(2)
        .map(String::as_str)
        .or(inline_unit)
        .or_else(|| raw.tag_value("unit"));

    Some(convert_with_default(raw, number, unit))
}

/// Convert using the unit table; unrecognized or missing units are km.
fn convert_with_default(raw: &RawRecord, value: f64, unit: Option<&str>) -> f64 {
    match unit {
        None => value,
        Some(unit) if unit.trim().is_empty() => value,
        Some(unit) => match DistanceUnit::parse(unit) {
            Some(parsed) => parsed.to_km(value),
            None => {
                tracing::warn!(id = %raw.id, unit, "Unrecognized distance unit, assuming km");
                value
            }
        },
    }
}

fn distance_from_content(content: &str) -> Option<f64> {
    let captures = CONTENT_DISTANCE.captures(content)?;
    let value: f64 = captures.get(1)?.as_str().parse().ok()?;
    let unit = DistanceUnit::parse(captures.get(2)?.as_str())?;
    Some(unit.to_km(value))
}

/// Exercise type from the `exercise` tag, then `t` hashtags; else unknown.
pub fn extract_exercise_type(raw: &RawRecord) -> ExerciseType {
    if let Some(label) = raw.tag_value("exercise") {
        let exercise = ExerciseType::from_label(label);
        if exercise != ExerciseType::Unknown {
            return exercise;
        }
    }

    raw.tag_values("t")
        .map(ExerciseType::from_label)
        .find(|t| *t != ExerciseType::Unknown)
        .unwrap_or(ExerciseType::Unknown)
}

/// Counts from a batch normalization.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct NormalizeReport {
    pub total: usize,
    pub accepted: usize,
    pub dropped_no_distance: usize,
    pub dropped_out_of_bounds: usize,
}

impl NormalizeReport {
    pub fn dropped(&self) -> usize {
        self.dropped_no_distance + self.dropped_out_of_bounds
    }
}

/// Normalize a batch, keeping the accepted workouts.
pub fn normalize_all(records: &[RawRecord]) -> (Vec<WorkoutRecord>, NormalizeReport) {
    let mut report = NormalizeReport {
        total: records.len(),
        ..Default::default()
    };
    let mut workouts = Vec::with_capacity(records.len());

    for raw in records {
        match classify(raw) {
            Ok(workout) => {
                report.accepted += 1;
                workouts.push(workout);
            }
            Err(DropReason::NoDistance) => report.dropped_no_distance += 1,
            Err(DropReason::OutOfBounds) => report.dropped_out_of_bounds += 1,
        }
    }

    if report.dropped() > 0 {
        tracing::info!(
            dropped = report.dropped(),
            total = report.total,
            no_distance = report.dropped_no_distance,
            out_of_bounds = report.dropped_out_of_bounds,
            "{} of {} records dropped during normalization",
            report.dropped(),
            report.total
        );
    }

    (workouts, report)
}
