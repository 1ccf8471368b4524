// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Multi-relay collection.
//!
//! Fans one filter out to every endpoint concurrently, waits for all of
//! them or the global timeout (whichever first), then merges the per-endpoint
//! results by record id in a single pass. Endpoint tasks never share mutable
//! state; the merge runs only after the barrier.

use crate::models::{RawRecord, RecordFilter};
use crate::services::relay::{EventFetcher, RelayError};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;
use tokio::time::Instant;

/// Timeouts applied to one collection run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CollectTimeouts {
    /// Budget for each endpoint (connect + stored events)
    pub per_endpoint: Duration,
    /// Budget for the whole fan-out, independent of `per_endpoint`
    pub global: Duration,
}

impl Default for CollectTimeouts {
    fn default() -> Self {
        Self {
            per_endpoint: Duration::from_secs(10),
            global: Duration::from_secs(30),
        }
    }
}

/// Fans queries out to many relays and merges the answers.
#[derive(Clone)]
pub struct Collector {
    fetcher: Arc<dyn EventFetcher>,
}

impl Collector {
    pub fn new(fetcher: Arc<dyn EventFetcher>) -> Self {
        Self { fetcher }
    }

    /// Query every endpoint and return the deduplicated record set.
    pub async fn collect(
        &self,
        endpoints: &[String],
        filter: &RecordFilter,
        timeouts: CollectTimeouts,
    ) -> Result<CollectOutcome, CollectError> {
        self.collect_with_seed(Vec::new(), endpoints, filter, timeouts)
            .await
    }

    /// Like [`collect`](Self::collect), but starts from a previously
    /// collected record set (e.g. from a cache). Seed records win over
    /// fetched duplicates.
    pub async fn collect_with_seed(
        &self,
        seed: Vec<RawRecord>,
        endpoints: &[String],
        filter: &RecordFilter,
        timeouts: CollectTimeouts,
    ) -> Result<CollectOutcome, CollectError> {
        if endpoints.is_empty() {
            return Err(CollectError::NoEndpoints);
        }

        let started = Instant::now();
        let deadline = started + timeouts.global;
        let filter = Arc::new(filter.clone());

        let mut tasks = JoinSet::new();
        let mut task_index = HashMap::new();
        for (index, endpoint) in endpoints.iter().enumerate() {
            let fetcher = Arc::clone(&self.fetcher);
            let filter = Arc::clone(&filter);
            let endpoint = endpoint.clone();
            let per_endpoint = timeouts.per_endpoint;

            let handle = tasks.spawn(async move {
                fetcher.fetch(&endpoint, &filter, per_endpoint).await
            });
            task_index.insert(handle.id(), index);
        }

        tracing::debug!(endpoints = endpoints.len(), "Querying relays");

        // Per-endpoint results in arrival order (first seen wins at merge).
        let mut arrivals: Vec<(usize, Result<Vec<RawRecord>, RelayError>)> = Vec::new();
        let mut panicked: HashSet<usize> = HashSet::new();

        loop {
            match tokio::time::timeout_at(deadline, tasks.join_next_with_id()).await {
                Ok(Some(Ok((id, result)))) => {
                    if let Some(&index) = task_index.get(&id) {
                        arrivals.push((index, result));
                    }
                }
                Ok(Some(Err(join_error))) => {
                    tracing::error!(error = %join_error, "Relay task failed");
                    if let Some(&index) = task_index.get(&join_error.id()) {
                        panicked.insert(index);
                    }
                }
                Ok(None) => break,
                Err(_) => {
                    tracing::warn!(
                        outstanding = tasks.len(),
                        "Global timeout elapsed, abandoning outstanding relays"
                    );
                    // Detached tasks finish on their own per-endpoint timeout
                    // and close their connections in the background.
                    tasks.detach_all();
                    break;
                }
            }
        }

        let outcome = merge(endpoints, seed, arrivals, &panicked);

        tracing::info!(
            records = outcome.records.len(),
            succeeded = outcome.succeeded(),
            failed = outcome.endpoints.len() - outcome.succeeded(),
            duplicates = outcome.duplicates_discarded,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Relay collection finished"
        );

        if outcome.succeeded() == 0 {
            let failures = outcome
                .endpoints
                .iter()
                .map(|report| EndpointFailure {
                    endpoint: report.endpoint.clone(),
                    reason: report.status.to_string(),
                })
                .collect();
            return Err(CollectError::AllEndpointsFailed(failures));
        }

        Ok(outcome)
    }
}

/// Single-writer merge of the seed set and per-endpoint results.
fn merge(
    endpoints: &[String],
    seed: Vec<RawRecord>,
    arrivals: Vec<(usize, Result<Vec<RawRecord>, RelayError>)>,
    panicked: &HashSet<usize>,
) -> CollectOutcome {
    let mut statuses: Vec<EndpointStatus> = endpoints
        .iter()
        .enumerate()
        .map(|(index, _)| {
            if panicked.contains(&index) {
                EndpointStatus::Failed("relay task panicked".to_string())
            } else {
                EndpointStatus::Abandoned
            }
        })
        .collect();

    let mut seen = HashSet::new();
    let mut records = Vec::new();
    let mut duplicates_discarded = 0;

    for record in seed {
        if seen.insert(record.id.clone()) {
            records.push(record);
        }
    }

    for (index, result) in arrivals {
        match result {
            Ok(fetched) => {
                statuses[index] = EndpointStatus::Succeeded {
                    records: fetched.len(),
                };
                for record in fetched {
                    if seen.insert(record.id.clone()) {
                        records.push(record);
                    } else {
                        duplicates_discarded += 1;
                    }
                }
            }
            Err(e) => {
                tracing::warn!(endpoint = e.endpoint(), error = %e, "Relay fetch failed");
                statuses[index] = EndpointStatus::Failed(e.to_string());
            }
        }
    }

    records.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));

    CollectOutcome {
        records,
        endpoints: endpoints
            .iter()
            .cloned()
            .zip(statuses)
            .map(|(endpoint, status)| EndpointReport { endpoint, status })
            .collect(),
        duplicates_discarded,
    }
}

/// Merged result of a collection run.
#[derive(Debug, Clone)]
pub struct CollectOutcome {
    /// Unique records ordered by (created_at, id)
    pub records: Vec<RawRecord>,
    /// One report per endpoint, in the order the endpoints were given
    pub endpoints: Vec<EndpointReport>,
    /// Fetched records discarded because their id was already seen
    pub duplicates_discarded: usize,
}

impl CollectOutcome {
    /// Number of endpoints that answered.
    pub fn succeeded(&self) -> usize {
        self.endpoints
            .iter()
            .filter(|r| matches!(r.status, EndpointStatus::Succeeded { .. }))
            .count()
    }
}

/// What happened to one endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndpointReport {
    pub endpoint: String,
    pub status: EndpointStatus,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EndpointStatus {
    Succeeded { records: usize },
    Failed(String),
    /// Still running when the global timeout elapsed
    Abandoned,
}

impl fmt::Display for EndpointStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EndpointStatus::Succeeded { records } => write!(f, "ok ({} records)", records),
            EndpointStatus::Failed(reason) => write!(f, "failed: {}", reason),
            EndpointStatus::Abandoned => f.write_str("abandoned at global timeout"),
        }
    }
}

/// A failed endpoint, as listed in [`CollectError::AllEndpointsFailed`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndpointFailure {
    pub endpoint: String,
    pub reason: String,
}

/// Errors that fail a whole collection run.
#[derive(Debug, Clone, thiserror::Error)]
pub enum CollectError {
    #[error("No relay endpoints configured")]
    NoEndpoints,

    #[error("All {} relay endpoints failed: {}", .0.len(), format_failures(.0))]
    AllEndpointsFailed(Vec<EndpointFailure>),
}

fn format_failures(failures: &[EndpointFailure]) -> String {
    failures
        .iter()
        .map(|f| format!("{} ({})", f.endpoint, f.reason))
        .collect::<Vec<_>>()
        .join("; ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: &str) -> RawRecord {
        RawRecord {
            id: id.to_string(),
            author_id: "P1".to_string(),
            created_at: 100,
            kind: 1301,
            tags: vec![],
            content: String::new(),
        }
    }

    fn endpoints(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("wss://relay{}.test", i)).collect()
    }

    #[test]
    fn test_merge_first_seen_wins() {
        let mut first = record("a");
        first.content = "first".to_string();
        let mut second = record("a");
        second.content = "second".to_string();

        let outcome = merge(
            &endpoints(2),
            Vec::new(),
            vec![(1, Ok(vec![first])), (0, Ok(vec![second, record("b")]))],
            &HashSet::new(),
        );

        assert_eq!(outcome.records.len(), 2);
        assert_eq!(outcome.records[0].content, "first");
        assert_eq!(outcome.duplicates_discarded, 1);
    }

    #[test]
    fn test_merge_seed_wins() {
        let mut cached = record("a");
        cached.content = "cached".to_string();

        let outcome = merge(
            &endpoints(1),
            vec![cached],
            vec![(0, Ok(vec![record("a")]))],
            &HashSet::new(),
        );

        assert_eq!(outcome.records.len(), 1);
        assert_eq!(outcome.records[0].content, "cached");
    }

    #[test]
    fn test_merge_statuses() {
        let outcome = merge(
            &endpoints(3),
            Vec::new(),
            vec![(
                2,
                Err(RelayError::ConnectTimeout {
                    endpoint: "wss://relay2.test".to_string(),
                }),
            )],
            &HashSet::from([1]),
        );

        assert_eq!(outcome.endpoints[0].status, EndpointStatus::Abandoned);
        assert!(matches!(outcome.endpoints[1].status, EndpointStatus::Failed(_)));
        assert!(matches!(outcome.endpoints[2].status, EndpointStatus::Failed(_)));
        assert_eq!(outcome.succeeded(), 0);
    }

    #[test]
    fn test_all_failed_message_lists_endpoints() {
        let err = CollectError::AllEndpointsFailed(vec![
            EndpointFailure {
                endpoint: "wss://a".to_string(),
                reason: "failed: refused".to_string(),
            },
            EndpointFailure {
                endpoint: "wss://b".to_string(),
                reason: "abandoned at global timeout".to_string(),
            },
        ]);
        let msg = err.to_string();
        assert!(msg.contains("All 2 relay endpoints failed"));
        assert!(msg.contains("wss://a"));
        assert!(msg.contains("wss://b"));
    }
}
