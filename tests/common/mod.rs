// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

use futures_util::future::BoxFuture;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use workout_leaderboard::config::Config;
use workout_leaderboard::models::{RawRecord, RecordFilter};
use workout_leaderboard::routes::create_router;
use workout_leaderboard::services::{
    CollectTimeouts, EventFetcher, Pipeline, PipelineSettings, RelayError, RewardCalculator,
    RewardSchedule,
};
use workout_leaderboard::AppState;

/// Canned behavior of one mock endpoint.
#[derive(Clone)]
#[allow(dead_code)]
pub enum MockRelay {
    /// Answer with these records after `delay`
    Records {
        records: Vec<RawRecord>,
        delay: Duration,
    },
    /// Refuse the connection
    Refuse,
}

/// In-process [`EventFetcher`] with per-endpoint canned answers.
///
/// Records are filtered with the request's filter, as a relay would.
/// Unknown endpoints refuse the connection.
#[derive(Default)]
#[allow(dead_code)]
pub struct MockFetcher {
    relays: Mutex<HashMap<String, MockRelay>>,
    calls: AtomicUsize,
    filters: Mutex<Vec<RecordFilter>>,
}

#[allow(dead_code)]
impl MockFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_records(self, endpoint: &str, records: Vec<RawRecord>) -> Self {
        self.set(
            endpoint,
            MockRelay::Records {
                records,
                delay: Duration::ZERO,
            },
        );
        self
    }

    pub fn with_delayed(self, endpoint: &str, records: Vec<RawRecord>, delay: Duration) -> Self {
        self.set(endpoint, MockRelay::Records { records, delay });
        self
    }

    pub fn with_refusal(self, endpoint: &str) -> Self {
        self.set(endpoint, MockRelay::Refuse);
        self
    }

    /// Replace the behavior of `endpoint`.
    pub fn set(&self, endpoint: &str, relay: MockRelay) {
        self.relays
            .lock()
            .unwrap()
            .insert(endpoint.to_string(), relay);
    }

    /// Number of fetches issued so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Filters received so far, in call order.
    pub fn filters(&self) -> Vec<RecordFilter> {
        self.filters.lock().unwrap().clone()
    }
}

impl EventFetcher for MockFetcher {
    fn fetch<'a>(
        &'a self,
        endpoint: &'a str,
        filter: &'a RecordFilter,
        timeout: Duration,
    ) -> BoxFuture<'a, Result<Vec<RawRecord>, RelayError>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.filters.lock().unwrap().push(filter.clone());
        let relay = self.relays.lock().unwrap().get(endpoint).cloned();

        Box::pin(async move {
            match relay {
                Some(MockRelay::Records { records, delay }) => {
                    if delay > timeout {
                        tokio::time::sleep(timeout).await;
                        return Err(RelayError::ConnectTimeout {
                            endpoint: endpoint.to_string(),
                        });
                    }
                    tokio::time::sleep(delay).await;
                    Ok(records.into_iter().filter(|r| filter.matches(r)).collect())
                }
                Some(MockRelay::Refuse) | None => Err(RelayError::Connect {
                    endpoint: endpoint.to_string(),
                    reason: "connection refused".to_string(),
                }),
            }
        })
    }
}

/// Workout record with a km distance tag and an exercise tag.
#[allow(dead_code)]
pub fn workout(id: &str, author: &str, created_at: i64, km: f64) -> RawRecord {
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

/// Add a `client` tag to a record.
#[allow(dead_code)]
pub fn with_client(mut record: RawRecord, client: &str) -> RawRecord {
    record
        .tags
        .push(vec!["client".to_string(), client.to_string()]);
    record
}

/// Pipeline settings pointing at the given mock endpoints with short timeouts.
#[allow(dead_code)]
pub fn test_settings(endpoints: &[&str]) -> PipelineSettings {
    PipelineSettings {
        endpoints: endpoints.iter().map(|e| e.to_string()).collect(),
        timeouts: CollectTimeouts {
            per_endpoint: Duration::from_secs(2),
            global: Duration::from_secs(5),
        },
        ..Default::default()
    }
}

/// Pipeline over a mock fetcher with the tiered schedule.
#[allow(dead_code)]
pub fn test_pipeline(fetcher: Arc<MockFetcher>, endpoints: &[&str]) -> Pipeline {
    let calculator =
        RewardCalculator::new(RewardSchedule::tiered()).expect("tiered schedule is valid");
    Pipeline::new(fetcher, test_settings(endpoints), calculator)
}

/// Create a test app backed by a mock fetcher.
/// Returns the router and the shared state.
#[allow(dead_code)]
pub fn create_test_app(
    fetcher: Arc<MockFetcher>,
    endpoints: &[&str],
) -> (axum::Router, Arc<AppState>) {
    let config = Config {
        relays: endpoints.iter().map(|e| e.to_string()).collect(),
        ..Config::default()
    };
    let pipeline = test_pipeline(fetcher, endpoints);
    let state = Arc::new(AppState::new(config, pipeline));

    (create_router(state.clone()), state)
}
