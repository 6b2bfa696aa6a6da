use std::sync::Arc;
use std::time::Duration;

use gameinsights_core::{GovernorScope, RateGovernor, RateLimit, SourceId};
use tokio::sync::Mutex;
use tokio::task::JoinSet;
use tokio::time::Instant;

fn governor(calls: u32, period: Duration, max_wait: Duration) -> RateGovernor {
    RateGovernor::new(
        GovernorScope::Source(SourceId::SteamSpy),
        RateLimit::new(calls, period).expect("valid limit"),
        max_wait,
    )
}

/// Largest number of grants inside any window of `period`.
fn busiest_window(mut grants: Vec<Instant>, period: Duration) -> usize {
    grants.sort();
    let mut busiest = 0;
    for (start, first) in grants.iter().enumerate() {
        let inside = grants[start..]
            .iter()
            .take_while(|at| at.duration_since(*first) < period)
            .count();
        busiest = busiest.max(inside);
    }
    busiest
}

#[tokio::test(start_paused = true)]
async fn concurrent_callers_never_exceed_budget_per_window() {
    let period = Duration::from_secs(10);
    let governor = governor(3, period, Duration::from_secs(600));
    let grants = Arc::new(Mutex::new(Vec::new()));

    let mut callers = JoinSet::new();
    for _ in 0..20 {
        let governor = governor.clone();
        let grants = Arc::clone(&grants);
        callers.spawn(async move {
            let permit = governor.acquire().await.expect("bounded wait suffices");
            grants.lock().await.push(permit.granted_at);
        });
    }
    while let Some(joined) = callers.join_next().await {
        joined.expect("caller finishes");
    }

    let grants = grants.lock().await.clone();
    assert_eq!(grants.len(), 20);
    assert_eq!(busiest_window(grants, period), 3);
}

#[tokio::test(start_paused = true)]
async fn waits_beyond_max_wait_are_refused_not_queued() {
    let governor = governor(2, Duration::from_secs(60), Duration::from_secs(5));
    governor.acquire().await.expect("first");
    governor.acquire().await.expect("second");

    let started = Instant::now();
    let exceeded = governor.acquire().await.expect_err("window full for a minute");

    assert_eq!(started.elapsed(), Duration::ZERO);
    assert_eq!(exceeded.scope, GovernorScope::Source(SourceId::SteamSpy));
    assert_eq!(exceeded.retry_after, Duration::from_secs(60));
    assert_eq!(governor.in_window(), 2);
}

#[tokio::test(start_paused = true)]
async fn capacity_returns_once_the_window_slides() {
    let governor = governor(1, Duration::from_secs(30), Duration::ZERO);
    governor.acquire().await.expect("first");
    assert!(governor.acquire().await.is_err());

    tokio::time::advance(Duration::from_secs(30)).await;

    let permit = governor.acquire().await.expect("window slid");
    assert_eq!(permit.waited, Duration::ZERO);
}

#[tokio::test(start_paused = true)]
async fn clones_share_one_budget() {
    let governor = governor(2, Duration::from_secs(60), Duration::ZERO);
    let other = governor.clone();

    governor.acquire().await.expect("first");
    other.acquire().await.expect("second");

    assert!(governor.acquire().await.is_err());
    assert!(other.acquire().await.is_err());
}
