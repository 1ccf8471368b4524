// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! End-to-end run: cache → collect → normalize → aggregate → score/reward.
//!
//! Only collection touches the network. Everything after the collection
//! barrier is a pure function of the collected record set.

use crate::cache::{record_set_key, CachedRecordSet, RecordCache};
use crate::models::{
    ExerciseType, Metric, ParticipantStanding, RankedEntry, RawRecord, RecordFilter,
    RewardResult, TimeWindow,
};
use crate::services::aggregator::aggregate_filtered;
use crate::services::collector::{
    CollectError, CollectOutcome, CollectTimeouts, Collector, EndpointReport, EndpointStatus,
};
use crate::services::leaderboard::{rank, RankOptions};
use crate::services::normalizer::{normalize_all, NormalizeReport};
use crate::services::relay::EventFetcher;
use crate::services::rewards::{total_payout_pool, RewardCalculator};
use crate::services::scoring::ScoringEngine;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;

/// Overlap re-fetched before the newest cached record, to pick up records
/// that reached relays late.
pub const CACHE_OVERLAP_SECS: i64 = 10 * 60;

/// Fixed inputs of a pipeline, usually from [`Config`](crate::config::Config).
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub endpoints: Vec<String>,
    pub kind: u32,
    pub timeouts: CollectTimeouts,
    pub query_limit: Option<u32>,
    /// Keep only records from these clients (empty keeps everything)
    pub client_tags: Vec<String>,
    pub cache_ttl: Duration,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            endpoints: Vec::new(),
            kind: crate::models::record::WORKOUT_KIND,
            timeouts: CollectTimeouts::default(),
            query_limit: None,
            client_tags: Vec::new(),
            cache_ttl: Duration::from_secs(15 * 60),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("Invalid time window: since {since} is not before until {until}")]
    InvalidWindow { since: i64, until: i64 },

    /// Collection failed as a whole. Distinct from a successful run with
    /// no activity, which yields an empty [`PipelineRun`].
    #[error(transparent)]
    Collection(#[from] CollectError),
}

/// Diagnostics for one run.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub window: TimeWindow,
    #[serde(serialize_with = "serialize_endpoints")]
    pub endpoints: Vec<EndpointReport>,
    /// Records reused from the cache
    pub cached_records: usize,
    /// Unique records after merging cache and relays
    pub collected_records: usize,
    pub duplicates_discarded: usize,
    /// Records dropped by the client-tag filter
    pub foreign_client_records: usize,
    pub normalize: NormalizeReport,
}

impl RunReport {
    pub fn endpoints_succeeded(&self) -> usize {
        self.endpoints
            .iter()
            .filter(|r| matches!(r.status, EndpointStatus::Succeeded { .. }))
            .count()
    }
}

fn serialize_endpoints<S: serde::Serializer>(
    endpoints: &[EndpointReport],
    serializer: S,
) -> Result<S::Ok, S::Error> {
    use serde::ser::SerializeMap;
    let mut map = serializer.serialize_map(Some(endpoints.len()))?;
    for report in endpoints {
        map.serialize_entry(&report.endpoint, &report.status.to_string())?;
    }
    map.end()
}

/// Output of a successful run.
#[derive(Debug, Clone)]
pub struct PipelineRun {
    pub report: RunReport,
    /// One standing per participant, ordered by participant id
    pub standings: Vec<ParticipantStanding>,
    pub total_payout_pool: u64,
}

impl PipelineRun {
    pub fn rewards(&self) -> Vec<RewardResult> {
        self.standings.iter().map(|s| s.reward.clone()).collect()
    }

    pub fn standing(&self, participant: &str) -> Option<&ParticipantStanding> {
        self.standings
            .binary_search_by(|s| s.participant().cmp(participant))
            .ok()
            .map(|i| &self.standings[i])
    }

    pub fn leaderboard(&self, metric: Metric, options: &RankOptions) -> Vec<RankedEntry> {
        rank(&self.standings, metric, options)
    }
}

/// Derive standings from a collected record set.
///
/// Records outside `window` are ignored; with `exercise` set, only that
/// type is aggregated. The result does not depend on record order.
pub fn compute_standings(
    records: &[RawRecord],
    window: TimeWindow,
    exercise: Option<ExerciseType>,
    scoring: &ScoringEngine,
    rewards: &RewardCalculator,
) -> (Vec<ParticipantStanding>, NormalizeReport) {
    let (workouts, normalize) = normalize_all(records);
    let aggregates = aggregate_filtered(&workouts, window, exercise);

    let standings = aggregates
        .into_values()
        .map(|aggregate| {
            let score = scoring.score(&aggregate);
            let reward = rewards.reward_with_level(&aggregate, score.level);
            ParticipantStanding {
                aggregate,
                score,
                reward,
            }
        })
        .collect();

    (standings, normalize)
}

/// Collection plus computation with a fixed configuration.
#[derive(Clone)]
pub struct Pipeline {
    collector: Collector,
    settings: PipelineSettings,
    cache: Option<Arc<dyn RecordCache>>,
    scoring: ScoringEngine,
    rewards: RewardCalculator,
}

impl Pipeline {
    pub fn new(
        fetcher: Arc<dyn EventFetcher>,
        settings: PipelineSettings,
        rewards: RewardCalculator,
    ) -> Self {
        Self {
            collector: Collector::new(fetcher),
            settings,
            cache: None,
            scoring: ScoringEngine::default(),
            rewards,
        }
    }

    pub fn with_cache(mut self, cache: Arc<dyn RecordCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn with_scoring(mut self, scoring: ScoringEngine) -> Self {
        self.scoring = scoring;
        self
    }

    /// Same pipeline with a different reward calculator.
    pub fn with_rewards(mut self, rewards: RewardCalculator) -> Self {
        self.rewards = rewards;
        self
    }

    pub fn settings(&self) -> &PipelineSettings {
        &self.settings
    }

    pub fn rewards(&self) -> &RewardCalculator {
        &self.rewards
    }

    /// Collect, then compute standings for `window`.
    pub async fn run(
        &self,
        window: TimeWindow,
        exercise: Option<ExerciseType>,
    ) -> Result<PipelineRun, PipelineError> {
        if window.since >= window.until {
            return Err(PipelineError::InvalidWindow {
                since: window.since,
                until: window.until,
            });
        }

        let (outcome, cached_records) = self.collect(window).await?;

        let before = outcome.records.len();
        let records: Vec<RawRecord> = outcome
            .records
            .into_iter()
            .filter(|r| r.matches_client(&self.settings.client_tags))
            .collect();
        let foreign_client_records = before - records.len();

        self.store(window, &records);

        let (standings, normalize) =
            compute_standings(&records, window, exercise, &self.scoring, &self.rewards);
        let rewards: Vec<RewardResult> = standings.iter().map(|s| s.reward.clone()).collect();
        let pool = total_payout_pool(&rewards);

        tracing::info!(
            participants = standings.len(),
            records = records.len(),
            total_payout_pool = pool,
            schedule = self.rewards.schedule().name(),
            "Pipeline run complete"
        );

        Ok(PipelineRun {
            report: RunReport {
                window,
                endpoints: outcome.endpoints,
                cached_records,
                collected_records: records.len(),
                duplicates_discarded: outcome.duplicates_discarded,
                foreign_client_records,
                normalize,
            },
            standings,
            total_payout_pool: pool,
        })
    }

    /// Query relays, starting from the cached record set when it covers
    /// `window`. Returns the outcome and the number of cached records used.
    async fn collect(&self, window: TimeWindow) -> Result<(CollectOutcome, usize), CollectError> {
        let seed = self.load(window);
        let cached_records = seed.len();

        let since = match seed.iter().map(|r| r.created_at).max() {
            Some(newest) => (newest - CACHE_OVERLAP_SECS).max(window.since),
            None => window.since,
        };
        if since > window.since {
            tracing::debug!(since, cached_records, "Narrowing relay query using cache");
        }

        let mut filter =
            RecordFilter::for_window(self.settings.kind, TimeWindow::new(since, window.until));
        if let Some(limit) = self.settings.query_limit {
            filter = filter.with_limit(limit);
        }

        let outcome = self
            .collector
            .collect_with_seed(seed, &self.settings.endpoints, &filter, self.settings.timeouts)
            .await?;
        Ok((outcome, cached_records))
    }

    fn cache_key(&self) -> String {
        record_set_key(self.settings.kind, &self.settings.client_tags)
    }

    /// Cached records inside `window`, or nothing if the cache is absent,
    /// unreadable, or was collected for a later start.
    fn load(&self, window: TimeWindow) -> Vec<RawRecord> {
        let Some(cache) = &self.cache else {
            return Vec::new();
        };

        let set = match cache.get(&self.cache_key()) {
            Ok(Some(bytes)) => match CachedRecordSet::decode(&bytes) {
                Ok(set) => set,
                Err(e) => {
                    tracing::warn!(error = %e, "Ignoring unreadable record cache");
                    return Vec::new();
                }
            },
            Ok(None) => return Vec::new(),
            Err(e) => {
                tracing::warn!(error = %e, "Record cache read failed");
                return Vec::new();
            }
        };

        if set.covered_since > window.since {
            tracing::debug!(
                covered_since = set.covered_since,
                since = window.since,
                "Cached records do not cover window, fetching in full"
            );
            return Vec::new();
        }

        set.records
            .into_iter()
            .filter(|r| r.kind == self.settings.kind && window.contains(r.created_at))
            .collect()
    }

    fn store(&self, window: TimeWindow, records: &[RawRecord]) {
        let Some(cache) = &self.cache else {
            return;
        };

        let set = CachedRecordSet {
            covered_since: window.since,
            records: records
                .iter()
                .filter(|r| window.contains(r.created_at))
                .cloned()
                .collect(),
        };

        let result = set
            .encode()
            .and_then(|bytes| cache.put(&self.cache_key(), &bytes, self.settings.cache_ttl));
        if let Err(e) = result {
            tracing::warn!(error = %e, "Record cache write failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::rewards::RewardSchedule;

    fn raw(id: &str, author: &str, created_at: i64, km: &str) -> RawRecord {
        RawRecord {
            id: id.to_string(),
            author_id: author.to_string(),
            created_at,
            kind: 1301,
            tags: vec![
                vec!["distance".to_string(), km.to_string(), "km".to_string()],
                vec!["exercise".to_string(), "run".to_string()],
            ],
            content: String::new(),
        }
    }

    #[test]
    fn test_compute_standings() {
        let window = TimeWindow::new(1_000, 1_000_000);
        let records = vec![
            raw("a", "P1", 2_000, "5"),
            raw("b", "P2", 3_000, "3"),
            raw("c", "P1", 4_000, "not a number"),
            raw("d", "P1", 5_000_000, "5"),
        ];
        let rewards = RewardCalculator::new(RewardSchedule::tiered()).unwrap();

        let (standings, report) =
            compute_standings(&records, window, None, &ScoringEngine::default(), &rewards);

        assert_eq!(report.dropped_no_distance, 1);
        assert_eq!(standings.len(), 2);
        assert_eq!(standings[0].participant(), "P1");
        assert_eq!(standings[0].aggregate.total_distance_km, 5.0);
        assert_eq!(standings[0].reward.streak_payout, 20);
        // 5 km = 3.1 mi: base 10 + 2 full extra miles
        assert_eq!(standings[0].score.total_xp, 20);
    }

    #[test]
    fn test_run_lookup_by_participant() {
        let window = TimeWindow::new(1_000, 1_000_000);
        let records = vec![raw("a", "P2", 2_000, "5"), raw("b", "P1", 3_000, "3")];
        let rewards = RewardCalculator::new(RewardSchedule::legacy()).unwrap();
        let (standings, normalize) =
            compute_standings(&records, window, None, &ScoringEngine::default(), &rewards);

        let run = PipelineRun {
            report: RunReport {
                window,
                endpoints: Vec::new(),
                cached_records: 0,
                collected_records: 2,
                duplicates_discarded: 0,
                foreign_client_records: 0,
                normalize,
            },
            standings,
            total_payout_pool: 200,
        };

        assert_eq!(run.standing("P1").unwrap().aggregate.total_distance_km, 3.0);
        assert!(run.standing("P3").is_none());
        assert_eq!(run.rewards().len(), 2);
        let board = run.leaderboard(Metric::Distance, &RankOptions::default());
        assert_eq!(board[0].participant, "P2");
    }
}
