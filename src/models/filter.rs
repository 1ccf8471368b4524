// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Subscription filter and aggregation window.

use crate::models::RawRecord;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

const SECONDS_PER_DAY: i64 = 24 * 60 * 60;

/// Half-open time range `[since, until)` in Unix seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeWindow {
    pub since: i64,
    pub until: i64,
}

impl TimeWindow {
    pub fn new(since: i64, until: i64) -> Self {
        Self { since, until }
    }

    /// Window covering the `days` days that end at `now`.
    pub fn last_days(days: u32, now: i64) -> Self {
        Self {
            since: now - i64::from(days) * SECONDS_PER_DAY,
            until: now,
        }
    }

    pub fn contains(&self, timestamp: i64) -> bool {
        timestamp >= self.since && timestamp < self.until
    }
}

/// Query sent to each relay.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecordFilter {
    pub kinds: Vec<u32>,
    pub authors: Option<Vec<String>>,
    /// Tag filters keyed by tag name (without the `#` prefix).
    pub tag_filters: BTreeMap<String, Vec<String>>,
    pub since: Option<i64>,
    /// Exclusive upper bound.
    pub until: Option<i64>,
    pub limit: Option<u32>,
}

impl RecordFilter {
    /// Filter for `kind` records inside `window`.
    pub fn for_window(kind: u32, window: TimeWindow) -> Self {
        Self {
            kinds: vec![kind],
            since: Some(window.since),
            until: Some(window.until),
            ..Default::default()
        }
    }

    pub fn with_limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn with_authors(mut self, authors: Vec<String>) -> Self {
        self.authors = Some(authors);
        self
    }

    /// JSON object as sent inside a `REQ` message:
    /// `{"kinds":[..],"authors":[..],"#t":[..],"since":..,"until":..,"limit":..}`.
    ///
    /// Relays treat `until` as inclusive, so the exclusive bound is sent
    /// as `until - 1`.
    pub fn to_wire(&self) -> serde_json::Value {
        let mut obj = serde_json::Map::new();
        obj.insert("kinds".to_string(), serde_json::json!(self.kinds));

        if let Some(authors) = &self.authors {
            obj.insert("authors".to_string(), serde_json::json!(authors));
        }
        for (name, values) in &self.tag_filters {
            obj.insert(format!("#{}", name), serde_json::json!(values));
        }
        if let Some(since) = self.since {
            obj.insert("since".to_string(), serde_json::json!(since));
        }
        if let Some(until) = self.until {
            obj.insert("until".to_string(), serde_json::json!(until - 1));
        }
        if let Some(limit) = self.limit {
            obj.insert("limit".to_string(), serde_json::json!(limit));
        }
        serde_json::Value::Object(obj)
    }

    /// Whether a record satisfies this filter.
    ///
    /// Relays are free to ignore parts of a filter, so results are checked
    /// again locally.
    pub fn matches(&self, record: &RawRecord) -> bool {
        if !self.kinds.is_empty() && !self.kinds.contains(&record.kind) {
            return false;
        }
        if let Some(authors) = &self.authors {
            if !authors.iter().any(|a| a == &record.author_id) {
                return false;
            }
        }
        if self.since.is_some_and(|since| record.created_at < since) {
            return false;
        }
        if self.until.is_some_and(|until| record.created_at >= until) {
            return false;
        }
        self.tag_filters.iter().all(|(name, values)| {
            record
                .tag_values(name)
                .any(|v| values.iter().any(|want| want == v))
        })
    }
}
