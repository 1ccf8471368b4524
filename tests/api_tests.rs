// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! HTTP API tests over mock relays.

use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use serde_json::Value;
use std::sync::Arc;
use tower::ServiceExt;
use workout_leaderboard::time_utils::now_unix;

mod common;
use common::{create_test_app, workout, MockFetcher};

const A: &str = "wss://a.test";
const B: &str = "wss://b.test";

async fn get_json(app: axum::Router, uri: &str) -> (StatusCode, Value) {
    let response = app
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, serde_json::from_slice(&body).unwrap())
}

/// Three participants with recent workouts.
fn busy_relay() -> Arc<MockFetcher> {
    let now = now_unix();
    Arc::new(
        MockFetcher::new()
            .with_records(
                A,
                vec![
                    workout("a", "alice", now - 3_600, 5.0),
                    workout("b", "alice", now - 90_000, 5.0),
                    workout("c", "bob", now - 7_200, 12.0),
                ],
            )
            .with_records(
                B,
                vec![
                    workout("c", "bob", now - 7_200, 12.0),
                    workout("d", "carol", now - 600, 3.0),
                ],
            ),
    )
}

#[tokio::test]
async fn test_health() {
    let (app, _) = create_test_app(busy_relay(), &[A, B]);

    let (status, body) = get_json(app, "/health").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["relays"], 2);
}

#[tokio::test]
async fn test_leaderboard_by_distance() {
    let (app, _) = create_test_app(busy_relay(), &[A, B]);

    let (status, body) = get_json(app, "/api/leaderboard?window=7").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["metric"], "distance");
    assert_eq!(body["total"], 3);
    assert_eq!(body["endpoints_succeeded"], 2);
    assert_eq!(body["endpoints_total"], 2);

    let entries = body["entries"].as_array().unwrap();
    assert_eq!(entries.len(), 3);
    assert_eq!(entries[0]["participant"], "bob");
    assert_eq!(entries[0]["rank"], 1);
    assert_eq!(entries[1]["participant"], "alice");
    assert_eq!(entries[1]["metric_value"], 10.0);
    assert_eq!(entries[2]["participant"], "carol");
}

#[tokio::test]
async fn test_leaderboard_pagination_keeps_ranks() {
    let (app, _) = create_test_app(busy_relay(), &[A, B]);

    let (status, body) = get_json(app, "/api/leaderboard?page=2&per_page=2").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["page"], 2);
    assert_eq!(body["total"], 3);
    let entries = body["entries"].as_array().unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0]["rank"], 3);
    assert_eq!(entries[0]["participant"], "carol");
}

#[tokio::test]
async fn test_leaderboard_min_workouts() {
    let (app, _) = create_test_app(busy_relay(), &[A, B]);

    let (status, body) = get_json(app, "/api/leaderboard?metric=workouts&min_workouts=2").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 1);
    assert_eq!(body["entries"][0]["participant"], "alice");
    assert_eq!(body["entries"][0]["metric_value"], 2.0);
}

#[tokio::test]
async fn test_leaderboard_rejects_bad_parameters() {
    for uri in [
        "/api/leaderboard?page=0",
        "/api/leaderboard?window=0",
        "/api/leaderboard?window=400",
        "/api/leaderboard?exercise=swim",
        "/api/leaderboard?schedule=unknown",
    ] {
        let (app, _) = create_test_app(busy_relay(), &[A, B]);
        let (status, body) = get_json(app, uri).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{}", uri);
        assert_eq!(body["error"], "bad_request");
    }
}

#[tokio::test]
async fn test_rewards_sorted_by_payout() {
    let (app, _) = create_test_app(busy_relay(), &[A, B]);

    let (status, body) = get_json(app, "/api/rewards").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["schedule"], "tiered");

    let rewards = body["rewards"].as_array().unwrap();
    assert_eq!(rewards.len(), 3);
    assert_eq!(rewards[0]["participant"], "alice");

    let payouts: Vec<u64> = rewards
        .iter()
        .map(|r| r["total_payout"].as_u64().unwrap())
        .collect();
    assert!(payouts.windows(2).all(|w| w[0] >= w[1]));
    assert_eq!(body["total_payout_pool"], payouts.iter().sum::<u64>());
}

#[tokio::test]
async fn test_rewards_with_named_schedule() {
    let (app, _) = create_test_app(busy_relay(), &[A, B]);

    let (status, body) = get_json(app, "/api/rewards?schedule=legacy").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["schedule"], "legacy");
    // alice: 2 workouts on 2 days
    let alice = body["rewards"]
        .as_array()
        .unwrap()
        .iter()
        .find(|r| r["participant"] == "alice")
        .unwrap();
    assert_eq!(alice["workout_payout"], 100);
    assert_eq!(alice["total_payout"], 200);
}

#[tokio::test]
async fn test_participant_detail() {
    let (app, _) = create_test_app(busy_relay(), &[A, B]);

    let (status, body) = get_json(app, "/api/participants/alice").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["participant"], "alice");
    assert_eq!(body["workout_count"], 2);
    assert_eq!(body["total_distance_km"], 10.0);
    assert_eq!(body["distance_rank"], 2);
    assert!(body["score"]["total_xp"].as_u64().unwrap() > 0);
}

#[tokio::test]
async fn test_unknown_participant_is_not_found() {
    let (app, _) = create_test_app(busy_relay(), &[A, B]);

    let (status, body) = get_json(app, "/api/participants/nobody").await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "not_found");
}

#[tokio::test]
async fn test_all_relays_failed_is_bad_gateway() {
    let fetcher = Arc::new(MockFetcher::new().with_refusal(A).with_refusal(B));
    let (app, _) = create_test_app(fetcher, &[A, B]);

    let (status, body) = get_json(app, "/api/leaderboard").await;

    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["error"], "collection_failed");
}

#[tokio::test]
async fn test_no_activity_is_empty_leaderboard() {
    let fetcher = Arc::new(MockFetcher::new().with_records(A, Vec::new()));
    let (app, _) = create_test_app(fetcher, &[A]);

    let (status, body) = get_json(app, "/api/leaderboard").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 0);
    assert!(body["entries"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_runs_are_reused_between_requests() {
    let fetcher = busy_relay();
    let (app, _) = create_test_app(fetcher.clone(), &[A, B]);

    let (status, _) = get_json(app.clone(), "/api/leaderboard").await;
    assert_eq!(status, StatusCode::OK);
    let calls = fetcher.calls();

    let (status, _) = get_json(app.clone(), "/api/rewards").await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = get_json(app, "/api/participants/bob").await;
    assert_eq!(status, StatusCode::OK);

    assert_eq!(fetcher.calls(), calls);
}
