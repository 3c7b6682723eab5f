//! Retry semantics under a paused clock: attempt counts, backoff totals and
//! short-circuiting on non-retryable errors.

use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;
use tokio::time::Instant;

use ai_lib_orchestrator::{retry_async, Error, RetryPolicy};

#[tokio::test(start_paused = true)]
async fn test_always_failing_operation_uses_every_attempt() {
    let calls = AtomicU32::new(0);
    let started = Instant::now();

    let result: Result<(), Error> = retry_async(
        || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(Error::transient("upstream 503")) }
        },
        4,
        Duration::from_secs(1),
        "flaky op",
    )
    .await;

    assert_eq!(calls.load(Ordering::SeqCst), 4);
    // backoff sleeps: 1s + 2s + 4s
    let elapsed = started.elapsed();
    assert!(elapsed >= Duration::from_secs(7), "elapsed {elapsed:?}");
    assert!(elapsed < Duration::from_millis(7100), "elapsed {elapsed:?}");

    let err = result.unwrap_err();
    assert!(matches!(err, Error::Transient { .. }));
    assert!(err.to_string().contains("upstream 503"));
}

#[tokio::test(start_paused = true)]
async fn test_three_attempts_with_one_second_base_take_about_three_seconds() {
    let started = Instant::now();
    let (result, stats) = RetryPolicy::new(3, Duration::from_secs(1))
        .run_with_stats("start", || async { Err::<(), _>(Error::connectivity("refused")) })
        .await;

    assert!(result.is_err());
    assert_eq!(stats.attempts, 3);
    assert_eq!(stats.total_backoff, Duration::from_secs(3));
    assert!(started.elapsed() >= Duration::from_secs(3));
    assert!(started.elapsed() < Duration::from_millis(3100));
}

#[tokio::test(start_paused = true)]
async fn test_success_on_kth_attempt_stops_retrying() {
    let calls = AtomicU32::new(0);
    let started = Instant::now();

    let (result, stats) = RetryPolicy::new(5, Duration::from_secs(1))
        .run_with_stats("eventually", || {
            let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
            async move {
                if n < 3 {
                    Err(Error::transient(format!("attempt {n} failed")))
                } else {
                    Ok(n)
                }
            }
        })
        .await;

    assert_eq!(result.unwrap(), 3);
    assert_eq!(stats.attempts, 3);
    assert_eq!(calls.load(Ordering::SeqCst), 3);
    // 1s + 2s before the third attempt
    assert!(started.elapsed() >= Duration::from_secs(3));
    assert!(started.elapsed() < Duration::from_millis(3100));
}

#[tokio::test(start_paused = true)]
async fn test_non_retryable_error_is_returned_immediately() {
    let calls = AtomicU32::new(0);
    let started = Instant::now();

    let result: Result<(), Error> = RetryPolicy::new(5, Duration::from_secs(1))
        .run("auth check", || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(Error::auth("token expired")) }
        })
        .await;

    assert!(matches!(result, Err(Error::Auth { .. })));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(started.elapsed(), Duration::ZERO);
}

#[tokio::test(start_paused = true)]
async fn test_timeouts_are_not_retried_when_disabled() {
    let calls = AtomicU32::new(0);
    let policy = RetryPolicy::new(3, Duration::from_secs(1)).with_retry_timeouts(false);

    let result: Result<(), Error> = policy
        .run("slow op", || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(Error::timeout("slow op", Duration::from_secs(5))) }
        })
        .await;

    assert!(result.unwrap_err().is_timeout());
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn test_max_delay_caps_each_sleep() {
    let policy = RetryPolicy::new(4, Duration::from_secs(2)).with_max_delay(Duration::from_secs(3));
    let (_, stats) = policy
        .run_with_stats("capped", || async { Err::<(), _>(Error::transient("x")) })
        .await;
    // 2s + min(4s, 3s) + min(8s, 3s)
    assert_eq!(stats.total_backoff, Duration::from_secs(8));
}

#[test]
fn test_zero_attempts_still_runs_once() {
    let calls = AtomicU32::new(0);
    let result: Result<(), Error> = tokio_test::block_on(RetryPolicy::new(0, Duration::ZERO).run(
        "once",
        || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(Error::transient("nope")) }
        },
    ));
    tokio_test::assert_err!(result);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}
