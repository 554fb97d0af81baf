// crates/resilience/tests/resilience_tests.rs
//! Integration tests for resilience patterns

use std::time::Duration;
use tokio::time::Instant;
use vaultsync_resilience::{with_timeout, ResilienceError, RetryPolicy};

#[tokio::test(start_paused = true)]
async fn test_retry_loop_with_deadline_per_attempt() {
    let policy = RetryPolicy::new(5).with_base(4);
    let deadline = Duration::from_millis(50);
    let start = Instant::now();
    let mut gaps = Vec::new();
    let mut last = start;
    let mut last_error = None;

    for attempt in 0..policy.max_attempts() {
        policy.wait(attempt).await;
        gaps.push(last.elapsed());

        // Every attempt hangs past the deadline
        let result = with_timeout(deadline, tokio::time::sleep(Duration::from_secs(1))).await;
        match result {
            Ok(()) => panic!("attempt {} should have timed out", attempt + 1),
            Err(e) => last_error = Some(e),
        }
        last = Instant::now();
    }

    assert!(matches!(last_error, Some(ResilienceError::Timeout(_))));
    assert_eq!(
        gaps,
        vec![
            Duration::ZERO,
            Duration::from_millis(4),
            Duration::from_millis(16),
            Duration::from_millis(64),
            Duration::from_millis(256),
        ]
    );

    let err = policy.exhausted(last_error.map(|e| e.to_string()).unwrap_or_default());
    assert!(err.to_string().contains("All 5 retry attempts exhausted"));
}

#[tokio::test(start_paused = true)]
async fn test_backoff_strictly_increases() {
    let policy = RetryPolicy::default();
    let delays: Vec<Duration> = (1..policy.max_attempts())
        .map(|attempt| policy.delay_for_attempt(attempt))
        .collect();

    assert!(delays.windows(2).all(|pair| pair[0] < pair[1]));
}
