//! Step-level tests for DiscoveryPipeline.
//!
//! Each test drives `step()` directly, so every assertion sees the state the
//! pipeline was left in by exactly the reports fed to it so far.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use photowalk_common::{PhotoReference, Position, Snapshot};
use photowalk_discovery::testing::{
    north_of, photo, photo1, photo2, untagged_photo, MockSearcher, StallingSearcher, PHOTO1_URL,
    PHOTO2_URL,
};
use photowalk_discovery::{DiscoveryPipeline, Phase, PipelineConfig, StepOutcome};

fn pipeline(searcher: Arc<MockSearcher>) -> DiscoveryPipeline {
    DiscoveryPipeline::new(searcher, PipelineConfig::default())
}

fn reference(url: &str) -> PhotoReference {
    url.parse().unwrap()
}

fn assert_no_duplicates(snapshot: &Snapshot) {
    let unique: HashSet<_> = snapshot.photos.iter().collect();
    assert_eq!(unique.len(), snapshot.photos.len(), "duplicate in {:?}", snapshot.urls());
}

// ---------------------------------------------------------------------------
// Reference scenarios
// ---------------------------------------------------------------------------

#[tokio::test]
async fn first_trigger_publishes_photo_url() {
    let searcher = Arc::new(MockSearcher::returning(vec![photo1()]));
    let mut pipeline = pipeline(searcher.clone());
    let mut snapshots = pipeline.subscribe();

    let outcome = pipeline.step(Position::new(10.0, 10.0)).await;

    assert_eq!(outcome, StepOutcome::Accepted(reference(PHOTO1_URL)));
    let snapshot = snapshots.next().await.unwrap();
    assert_eq!(snapshot.seq, 1);
    assert_eq!(snapshot.urls(), vec![PHOTO1_URL]);
    assert_eq!(searcher.call_count(), 1);
}

#[tokio::test]
async fn same_position_twice_searches_once() {
    let searcher = Arc::new(MockSearcher::returning(vec![photo1()]));
    let mut pipeline = pipeline(searcher.clone());
    let mut snapshots = pipeline.subscribe();
    let here = Position::new(10.0, 10.0);

    pipeline.step(here).await;
    let first = snapshots.next().await.unwrap();
    let outcome = pipeline.step(here).await;

    assert_eq!(outcome, StepOutcome::GateClosed);
    assert_eq!(searcher.call_count(), 1);
    assert!(snapshots.try_next().is_none(), "closed gate must not publish");
    assert_eq!(first.len(), 1);
    assert_eq!(pipeline.stats().gate_closed, 1);
}

#[tokio::test]
async fn small_move_never_reaches_the_searcher() {
    let searcher = Arc::new(MockSearcher::returning(vec![photo1()]));
    let mut pipeline = pipeline(searcher.clone());
    let start = Position::new(50.0, 8.0);

    pipeline.step(start).await;
    for metres in [10.0, 40.0, 90.0] {
        assert_eq!(pipeline.step(north_of(start, metres)).await, StepOutcome::GateClosed);
    }

    assert_eq!(searcher.calls(), vec![start]);
}

#[tokio::test]
async fn same_photo_from_a_new_place_republishes_unchanged_list() {
    let searcher = Arc::new(MockSearcher::returning(vec![photo1()]));
    let mut pipeline = pipeline(searcher.clone());
    let mut snapshots = pipeline.subscribe();
    let start = Position::new(10.0, 10.0);

    pipeline.step(start).await;
    let first = snapshots.next().await.unwrap();
    let outcome = pipeline.step(north_of(start, 1000.0)).await;
    let second = snapshots.next().await.unwrap();

    assert_eq!(outcome, StepOutcome::NothingNew);
    assert_eq!(first.urls(), vec![PHOTO1_URL]);
    assert_eq!(second.urls(), vec![PHOTO1_URL]);
    assert_eq!(second.seq, 2);
    assert_eq!(searcher.call_count(), 2);
}

#[tokio::test]
async fn nearest_photo_first_then_next_nearest() {
    // Search lists the farther photo first.
    let searcher = Arc::new(MockSearcher::returning(vec![photo1(), photo2()]));
    let mut pipeline = pipeline(searcher.clone());
    let mut snapshots = pipeline.subscribe();
    let start = Position::new(50.1, 8.1);

    pipeline.step(start).await;
    let first = snapshots.next().await.unwrap();
    pipeline.step(north_of(start, 150.0)).await;
    let second = snapshots.next().await.unwrap();

    assert_eq!(first.urls(), vec![PHOTO2_URL]);
    assert_eq!(second.urls(), vec![PHOTO1_URL, PHOTO2_URL]);
}

#[tokio::test]
async fn newer_photos_go_to_the_front() {
    let searcher = Arc::new(MockSearcher::new().then(vec![photo1()]).then(vec![photo2()]));
    let mut pipeline = pipeline(searcher.clone());
    let mut snapshots = pipeline.subscribe();
    let start = Position::new(10.0, 10.0);

    pipeline.step(start).await;
    let first = snapshots.next().await.unwrap();
    pipeline.step(north_of(start, 1000.0)).await;
    let second = snapshots.next().await.unwrap();

    assert_eq!(first.urls(), vec![PHOTO1_URL]);
    assert_eq!(second.urls(), vec![PHOTO2_URL, PHOTO1_URL]);
}

// ---------------------------------------------------------------------------
// Failures and degenerate results
// ---------------------------------------------------------------------------

#[tokio::test]
async fn failed_search_still_publishes_and_moves_the_trigger() {
    let searcher = Arc::new(
        MockSearcher::new()
            .then(vec![photo1()])
            .then_fail("rate limited")
            .then(vec![photo2()]),
    );
    let mut pipeline = pipeline(searcher.clone());
    let mut snapshots = pipeline.subscribe();
    let start = Position::new(50.0, 8.0);
    let second_stop = north_of(start, 200.0);

    pipeline.step(start).await;
    snapshots.next().await.unwrap();

    let outcome = pipeline.step(second_stop).await;
    let after_failure = snapshots.next().await.unwrap();

    assert_eq!(outcome, StepOutcome::SearchFailed);
    assert_eq!(after_failure.urls(), vec![PHOTO1_URL]);
    assert_eq!(pipeline.state().last_trigger, Some(second_stop));
    assert_eq!(pipeline.stats().search_failures, 1);

    // Later triggers keep working.
    pipeline.step(north_of(second_stop, 200.0)).await;
    let recovered = snapshots.next().await.unwrap();
    assert_eq!(recovered.urls(), vec![PHOTO2_URL, PHOTO1_URL]);
}

/// The trigger position moves on every gate-open report, even when nothing
/// new was found. Staying put afterwards keeps the gate closed.
#[tokio::test]
async fn gate_stays_cold_after_fruitless_search() {
    let searcher = Arc::new(MockSearcher::new().then(vec![photo1()]).then(Vec::new()));
    let mut pipeline = pipeline(searcher.clone());
    let start = Position::new(50.0, 8.0);
    let empty_spot = north_of(start, 150.0);

    pipeline.step(start).await;
    assert_eq!(pipeline.step(empty_spot).await, StepOutcome::NothingNew);
    assert_eq!(pipeline.state().last_trigger, Some(empty_spot));

    assert_eq!(pipeline.step(north_of(empty_spot, 50.0)).await, StepOutcome::GateClosed);
    assert_eq!(searcher.call_count(), 2);
}

#[tokio::test]
async fn exhausted_candidates_leave_list_unchanged() {
    let searcher = Arc::new(MockSearcher::returning(vec![photo1(), photo2()]));
    let mut pipeline = pipeline(searcher.clone());
    let mut snapshots = pipeline.subscribe();
    let start = Position::new(50.1, 8.1);

    pipeline.step(start).await;
    pipeline.step(north_of(start, 150.0)).await;
    snapshots.next().await.unwrap();
    let full = snapshots.next().await.unwrap();

    let outcome = pipeline.step(north_of(start, 300.0)).await;
    let after = snapshots.next().await.unwrap();

    assert_eq!(outcome, StepOutcome::NothingNew);
    assert_eq!(after.photos, full.photos);
    assert_eq!(pipeline.stats().exhausted, 1);
}

#[tokio::test]
async fn untagged_results_find_nothing() {
    let searcher = Arc::new(MockSearcher::returning(vec![
        untagged_photo("1", "2", "3"),
        untagged_photo("4", "5", "6"),
    ]));
    let mut pipeline = pipeline(searcher.clone());
    let mut snapshots = pipeline.subscribe();

    let outcome = pipeline.step(Position::new(10.0, 10.0)).await;

    assert_eq!(outcome, StepOutcome::NothingNew);
    assert!(snapshots.next().await.unwrap().is_empty());
}

#[tokio::test]
async fn invalid_position_is_ignored() {
    let searcher = Arc::new(MockSearcher::returning(vec![photo1()]));
    let mut pipeline = pipeline(searcher.clone());

    let outcome = pipeline.step(Position::new(f64::NAN, 10.0)).await;

    assert_eq!(outcome, StepOutcome::Rejected);
    assert_eq!(pipeline.state().phase(), Phase::Idle);
    assert_eq!(searcher.call_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn slow_search_times_out_as_failure() {
    let searcher = Arc::new(StallingSearcher::new());
    let config = PipelineConfig::builder()
        .search_timeout(Duration::from_millis(500))
        .build();
    let mut pipeline = DiscoveryPipeline::new(searcher.clone(), config);
    let mut snapshots = pipeline.subscribe();

    let outcome = pipeline.step(Position::new(10.0, 10.0)).await;

    assert_eq!(outcome, StepOutcome::SearchFailed);
    assert!(searcher.was_cancelled());
    assert!(snapshots.next().await.unwrap().is_empty());
}

// ---------------------------------------------------------------------------
// Publication
// ---------------------------------------------------------------------------

#[tokio::test]
async fn phase_moves_from_idle_to_active() {
    let mut pipeline = pipeline(Arc::new(MockSearcher::new()));
    assert_eq!(pipeline.state().phase(), Phase::Idle);

    pipeline.step(Position::new(1.0, 1.0)).await;

    assert_eq!(pipeline.state().phase(), Phase::Active);
}

#[tokio::test]
async fn publishing_without_subscribers_is_harmless() {
    let searcher = Arc::new(MockSearcher::returning(vec![photo1()]));
    let mut pipeline = pipeline(searcher);

    let outcome = pipeline.step(Position::new(10.0, 10.0)).await;

    assert_eq!(outcome, StepOutcome::Accepted(reference(PHOTO1_URL)));
    assert_eq!(pipeline.stats().published, 1);
}

#[tokio::test]
async fn late_subscriber_sees_no_history() {
    let searcher = Arc::new(MockSearcher::new().then(vec![photo1()]).then(vec![photo2()]));
    let mut pipeline = pipeline(searcher);
    let start = Position::new(10.0, 10.0);

    pipeline.step(start).await;
    let mut late = pipeline.subscribe();
    assert!(late.try_next().is_none());

    pipeline.step(north_of(start, 500.0)).await;
    let snapshot = late.next().await.unwrap();
    assert_eq!(snapshot.seq, 2);
    assert_eq!(snapshot.urls(), vec![PHOTO2_URL, PHOTO1_URL]);
}

#[tokio::test]
async fn every_subscriber_gets_every_snapshot() {
    let searcher = Arc::new(MockSearcher::returning(vec![photo1()]));
    let mut pipeline = pipeline(searcher);
    let mut a = pipeline.subscribe();
    let mut b = pipeline.subscribe();

    pipeline.step(Position::new(10.0, 10.0)).await;

    assert_eq!(a.next().await.unwrap().photos, b.next().await.unwrap().photos);
}

#[tokio::test]
async fn lagging_subscriber_skips_to_recent_snapshots() {
    let searcher = Arc::new(MockSearcher::returning(vec![photo1()]));
    let config = PipelineConfig::builder().snapshot_buffer(2).build();
    let mut pipeline = DiscoveryPipeline::new(searcher, config);
    let mut slow = pipeline.subscribe();
    let mut here = Position::new(10.0, 10.0);

    for _ in 0..5 {
        pipeline.step(here).await;
        here = north_of(here, 200.0);
    }

    let snapshot = slow.next().await.unwrap();
    assert!(snapshot.seq >= 4, "expected a recent snapshot, got seq {}", snapshot.seq);
}

#[tokio::test]
async fn snapshots_never_contain_duplicates() {
    // Overlapping result sets drawn from a small pool of photos.
    let pool: Vec<_> = (0..6)
        .map(|i| photo("7", &format!("{i}"), "s", 40.0 + i as f64 * 0.001, -3.0))
        .collect();
    let mut searcher = MockSearcher::new();
    let mut seed: u64 = 42;
    for _ in 0..30 {
        let mut batch = Vec::new();
        for candidate in &pool {
            seed = seed.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
            if seed >> 62 != 0 {
                batch.push(candidate.clone());
            }
        }
        searcher = searcher.then(batch);
    }
    let mut pipeline = pipeline(Arc::new(searcher));
    let mut snapshots = pipeline.subscribe();
    let mut here = Position::new(40.0, -3.0);

    for _ in 0..30 {
        pipeline.step(here).await;
        let snapshot = snapshots.next().await.unwrap();
        assert_no_duplicates(&snapshot);
        assert!(snapshot.len() <= pool.len());
        here = north_of(here, 120.0);
    }
    assert_eq!(pipeline.state().accumulated.len(), pipeline.stats().accepted as usize);
}
