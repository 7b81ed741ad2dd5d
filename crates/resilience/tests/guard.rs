//! Behaviour of the combined breaker/retry/timeout guard.

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use resilience::{
    CircuitBreakerConfig, CircuitState, Guard, GuardConfig, GuardError, IsTransient, RetryPolicy,
};

#[derive(Debug, Clone, PartialEq)]
enum TestError {
    Down,
    Missing,
}

impl std::fmt::Display for TestError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TestError::Down => write!(f, "service down"),
            TestError::Missing => write!(f, "not found"),
        }
    }
}

impl IsTransient for TestError {
    fn is_transient(&self) -> bool {
        matches!(self, TestError::Down)
    }
}

fn guard(max_attempts: u32) -> Guard {
    Guard::new(
        "test",
        GuardConfig {
            breaker: CircuitBreakerConfig {
                window_size: 10,
                minimum_calls: 5,
                failure_rate_threshold: 0.5,
                open_duration: Duration::from_secs(30),
                half_open_max_calls: 1,
            },
            retry: RetryPolicy {
                max_attempts,
                initial_delay: Duration::from_millis(10),
                max_delay: Duration::from_millis(40),
                multiplier: 2.0,
            },
            call_timeout: Duration::from_millis(100),
        },
    )
}

#[tokio::test(start_paused = true)]
async fn test_retries_transient_errors_until_success() {
    let guard = guard(3);
    let calls = Arc::new(AtomicU32::new(0));

    let result = guard
        .call("flaky", || {
            let calls = Arc::clone(&calls);
            async move {
                if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                    Err(TestError::Down)
                } else {
                    Ok("ok")
                }
            }
        })
        .await;

    assert_eq!(result.unwrap(), "ok");
    assert_eq!(calls.load(Ordering::SeqCst), 3);
}

#[tokio::test(start_paused = true)]
async fn test_definitive_errors_are_not_retried() {
    let guard = guard(3);
    let calls = Arc::new(AtomicU32::new(0));

    let result: Result<(), _> = guard
        .call("lookup", || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(TestError::Missing) }
        })
        .await;

    assert!(matches!(result, Err(GuardError::Rejected(TestError::Missing))));
    assert!(!result.unwrap_err().is_degraded());
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(guard.breaker().failure_rate(), 0.0);
}

#[tokio::test(start_paused = true)]
async fn test_exhausted_retries_report_last_error() {
    let guard = guard(2);

    let result: Result<(), _> = guard.call("down", || async { Err(TestError::Down) }).await;

    match result {
        Err(GuardError::Exhausted {
            attempts,
            last_error,
        }) => {
            assert_eq!(attempts, 2);
            assert_eq!(last_error, TestError::Down);
        }
        other => panic!("unexpected result: {other:?}"),
    }
}

#[tokio::test(start_paused = true)]
async fn test_slow_attempts_time_out() {
    let guard = guard(2);

    let result: Result<(), GuardError<TestError>> = guard
        .call("slow", || async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(())
        })
        .await;

    assert!(matches!(result, Err(GuardError::Timeout { attempts: 2, .. })));
    assert!(result.unwrap_err().is_degraded());
}

#[tokio::test(start_paused = true)]
async fn test_repeated_failures_open_the_breaker() {
    let guard = guard(1);

    for _ in 0..5 {
        let _: Result<(), _> = guard.call("down", || async { Err(TestError::Down) }).await;
    }
    assert_eq!(guard.state(), CircuitState::Open);

    let calls = Arc::new(AtomicU32::new(0));
    let result: Result<(), GuardError<TestError>> = guard
        .call("down", || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Ok(()) }
        })
        .await;
    assert!(matches!(result, Err(GuardError::CircuitOpen)));
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[tokio::test(start_paused = true)]
async fn test_breaker_opening_mid_retry_stops_attempts() {
    let guard = guard(10);
    let calls = Arc::new(AtomicU32::new(0));

    let result: Result<(), _> = guard
        .call("down", || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(TestError::Down) }
        })
        .await;

    assert!(matches!(result, Err(GuardError::CircuitOpen)));
    // Five failures reach the minimum window and open the breaker.
    assert_eq!(calls.load(Ordering::SeqCst), 5);
}

#[tokio::test(start_paused = true)]
async fn test_forced_open_breaker_short_circuits() {
    let guard = guard(3);
    guard.breaker().force_open();

    let result: Result<(), GuardError<TestError>> = guard.call("any", || async { Ok(()) }).await;
    assert!(matches!(result, Err(GuardError::CircuitOpen)));

    guard.breaker().reset();
    let result: Result<(), GuardError<TestError>> = guard.call("any", || async { Ok(()) }).await;
    assert!(result.is_ok());
}
