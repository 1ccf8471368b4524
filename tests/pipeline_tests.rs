// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! End-to-end pipeline runs over mock relays.

use std::sync::Arc;
use workout_leaderboard::cache::MemoryCache;
use workout_leaderboard::models::{ExerciseType, Metric, TimeWindow};
use workout_leaderboard::services::leaderboard::RankOptions;
use workout_leaderboard::services::pipeline::{compute_standings, CACHE_OVERLAP_SECS};
use workout_leaderboard::services::{
    Pipeline, PipelineError, RewardCalculator, RewardSchedule, ScoringEngine,
};

mod common;
use common::{test_pipeline, test_settings, with_client, workout, MockFetcher, MockRelay};

const A: &str = "wss://a.test";
const B: &str = "wss://b.test";

/// 2024-01-15T00:00:00Z
const START: i64 = 1_705_276_800;
const DAY: i64 = 86_400;

fn week() -> TimeWindow {
    TimeWindow::new(START, START + 7 * DAY)
}

#[tokio::test]
async fn test_duplicate_record_counted_once() {
    let record = workout("a", "P1", START + 3_600, 5.0);
    let fetcher = Arc::new(
        MockFetcher::new()
            .with_records(A, vec![record.clone()])
            .with_records(B, vec![record]),
    );
    let pipeline = test_pipeline(fetcher, &[A, B]);

    let run = pipeline.run(week(), None).await.unwrap();

    assert_eq!(run.standings.len(), 1);
    let standing = run.standing("P1").unwrap();
    assert_eq!(standing.aggregate.total_distance_km, 5.0);
    assert_eq!(standing.aggregate.workout_count, 1);
    assert_eq!(standing.aggregate.active_days.len(), 1);
    assert_eq!(run.report.duplicates_discarded, 1);
    assert_eq!(run.report.endpoints_succeeded(), 2);
}

#[tokio::test]
async fn test_total_failure_is_distinct_from_no_activity() {
    let failing = Arc::new(MockFetcher::new().with_refusal(A).with_refusal(B));
    let err = test_pipeline(failing, &[A, B])
        .run(week(), None)
        .await
        .unwrap_err();
    assert!(matches!(err, PipelineError::Collection(_)));

    let quiet = Arc::new(MockFetcher::new().with_records(A, Vec::new()).with_refusal(B));
    let run = test_pipeline(quiet, &[A, B]).run(week(), None).await.unwrap();
    assert!(run.standings.is_empty());
    assert_eq!(run.total_payout_pool, 0);
    assert_eq!(run.report.endpoints_succeeded(), 1);
}

#[tokio::test]
async fn test_invalid_window_rejected() {
    let fetcher = Arc::new(MockFetcher::new().with_records(A, Vec::new()));
    let pipeline = test_pipeline(fetcher.clone(), &[A]);

    let err = pipeline
        .run(TimeWindow::new(START, START), None)
        .await
        .unwrap_err();

    assert!(matches!(err, PipelineError::InvalidWindow { .. }));
    assert_eq!(fetcher.calls(), 0);
}

#[test]
fn test_standings_independent_of_record_order() {
    let records = vec![
        workout("a", "P1", START + 100, 5.0),
        workout("b", "P2", START + DAY, 3.0),
        workout("c", "P1", START + 2 * DAY, 2.5),
        workout("d", "P3", START + 3 * DAY, 10.0),
        workout("e", "P2", START + 3 * DAY + 60, 1.2),
    ];
    let mut shuffled = records.clone();
    shuffled.reverse();
    shuffled.swap(1, 3);

    let scoring = ScoringEngine::default();
    let rewards = RewardCalculator::new(RewardSchedule::tiered()).unwrap();

    let (first, _) = compute_standings(&records, week(), None, &scoring, &rewards);
    let (second, _) = compute_standings(&shuffled, week(), None, &scoring, &rewards);

    assert_eq!(first, second);
}

#[tokio::test]
async fn test_ties_broken_by_participant_id() {
    let fetcher = Arc::new(MockFetcher::new().with_records(
        A,
        vec![
            workout("a", "P2", START + 100, 5.0),
            workout("b", "P1", START + 200, 5.0),
            workout("c", "P3", START + 300, 8.0),
        ],
    ));
    let run = test_pipeline(fetcher, &[A]).run(week(), None).await.unwrap();

    let board = run.leaderboard(Metric::Distance, &RankOptions::default());
    let order: Vec<(u32, &str)> = board
        .iter()
        .map(|e| (e.rank, e.participant.as_str()))
        .collect();
    assert_eq!(order, vec![(1, "P3"), (2, "P1"), (3, "P2")]);
}

#[tokio::test]
async fn test_exercise_filter() {
    let mut walk = workout("w", "P2", START + 100, 4.0);
    walk.tags[1][1] = "walk".to_string();
    let fetcher = Arc::new(
        MockFetcher::new().with_records(A, vec![workout("r", "P1", START + 100, 5.0), walk]),
    );
    let pipeline = test_pipeline(fetcher, &[A]);

    let run = pipeline.run(week(), Some(ExerciseType::Run)).await.unwrap();
    assert_eq!(run.standings.len(), 1);
    assert_eq!(run.standings[0].participant(), "P1");

    let run = pipeline.run(week(), Some(ExerciseType::Walk)).await.unwrap();
    assert_eq!(run.standings.len(), 1);
    assert_eq!(run.standings[0].participant(), "P2");
}

#[tokio::test]
async fn test_client_tag_filter() {
    let fetcher = Arc::new(MockFetcher::new().with_records(
        A,
        vec![
            with_client(workout("a", "P1", START + 100, 5.0), "RUNSTR"),
            with_client(workout("b", "P2", START + 200, 5.0), "other-app"),
            workout("c", "P3", START + 300, 5.0),
        ],
    ));
    let settings = workout_leaderboard::services::PipelineSettings {
        client_tags: vec!["runstr".to_string()],
        ..test_settings(&[A])
    };
    let pipeline = Pipeline::new(
        fetcher,
        settings,
        RewardCalculator::new(RewardSchedule::tiered()).unwrap(),
    );

    let run = pipeline.run(week(), None).await.unwrap();

    assert_eq!(run.standings.len(), 1);
    assert_eq!(run.standings[0].participant(), "P1");
    assert_eq!(run.report.foreign_client_records, 2);
}

#[tokio::test]
async fn test_cache_narrows_follow_up_queries() {
    let first = workout("a", "P1", START + DAY, 5.0);
    let fetcher = Arc::new(MockFetcher::new().with_records(A, vec![first.clone()]));
    let pipeline = test_pipeline(fetcher.clone(), &[A]).with_cache(Arc::new(MemoryCache::new()));

    let run = pipeline.run(week(), None).await.unwrap();
    assert_eq!(run.report.cached_records, 0);
    assert_eq!(fetcher.filters()[0].since, Some(START));

    // A new record arrives; the relay now only serves recent history.
    let second = workout("b", "P1", START + 2 * DAY, 3.0);
    fetcher.set(
        A,
        MockRelay::Records {
            records: vec![first.clone(), second],
            delay: std::time::Duration::ZERO,
        },
    );

    let run = pipeline.run(week(), None).await.unwrap();
    assert_eq!(run.report.cached_records, 1);
    assert_eq!(
        fetcher.filters()[1].since,
        Some(first.created_at - CACHE_OVERLAP_SECS)
    );

    let standing = run.standing("P1").unwrap();
    assert_eq!(standing.aggregate.workout_count, 2);
    assert_eq!(standing.aggregate.total_distance_km, 8.0);
    // The overlap re-fetches the cached record; the cached copy wins.
    assert_eq!(run.report.duplicates_discarded, 1);
}

#[tokio::test]
async fn test_cache_not_used_for_wider_window() {
    let fetcher = Arc::new(
        MockFetcher::new().with_records(A, vec![workout("a", "P1", START + DAY, 5.0)]),
    );
    let pipeline = test_pipeline(fetcher.clone(), &[A]).with_cache(Arc::new(MemoryCache::new()));

    pipeline.run(week(), None).await.unwrap();

    let wider = TimeWindow::new(START - 7 * DAY, START + 7 * DAY);
    let run = pipeline.run(wider, None).await.unwrap();

    assert_eq!(run.report.cached_records, 0);
    assert_eq!(fetcher.filters()[1].since, Some(START - 7 * DAY));
}

#[tokio::test]
async fn test_payout_pool_matches_rewards() {
    let fetcher = Arc::new(MockFetcher::new().with_records(
        A,
        vec![
            workout("a", "P1", START + 100, 5.0),
            workout("b", "P1", START + DAY, 5.0),
            workout("c", "P2", START + 200, 2.0),
        ],
    ));
    let pipeline = test_pipeline(fetcher, &[A]);

    let run = pipeline.run(week(), None).await.unwrap();
    let sum: u64 = run.rewards().iter().map(|r| r.total_payout).sum();

    assert_eq!(run.total_payout_pool, sum);
    assert!(run.total_payout_pool > 0);
}
