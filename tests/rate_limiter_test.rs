//! Pacing behavior of the shared rate limiter under async callers.

use std::sync::Arc;
use std::time::{Duration, Instant};

use librecrawl::RateLimiter;

#[tokio::test]
async fn sequential_acquires_respect_the_interval() {
    let limiter = RateLimiter::new(2.0);

    let start = Instant::now();
    limiter.acquire().await;
    limiter.acquire().await;
    limiter.acquire().await;
    let elapsed = start.elapsed();

    // First is immediate; the next two are paced at 500ms each.
    assert!(
        elapsed >= Duration::from_millis(950),
        "three acquires at 2 rps took only {elapsed:?}"
    );
}

#[tokio::test]
async fn concurrent_acquires_serialize_globally() {
    let limiter = Arc::new(RateLimiter::new(20.0));

    let mut handles = Vec::new();
    for _ in 0..6 {
        let limiter = Arc::clone(&limiter);
        handles.push(tokio::spawn(async move {
            limiter.acquire().await;
            Instant::now()
        }));
    }

    let mut completions = Vec::new();
    for handle in handles {
        completions.push(handle.await.unwrap());
    }
    completions.sort();

    // Each completion after the first must trail its predecessor by close to
    // the 50ms interval; a small tolerance absorbs timer jitter.
    for pair in completions.windows(2) {
        let gap = pair[1].duration_since(pair[0]);
        assert!(
            gap >= Duration::from_millis(40),
            "concurrent acquires completed only {gap:?} apart"
        );
    }
}

#[tokio::test]
async fn concurrent_acquires_stack_the_deficit() {
    let limiter = Arc::new(RateLimiter::new(10.0));

    let start = Instant::now();
    let mut handles = Vec::new();
    for _ in 0..3 {
        let limiter = Arc::clone(&limiter);
        handles.push(tokio::spawn(async move {
            limiter.acquire().await;
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }

    // Slots are booked one interval apart, so three simultaneous arrivals
    // occupy 0ms, 100ms, and 200ms; the last cannot finish early.
    let elapsed = start.elapsed();
    assert!(
        elapsed >= Duration::from_millis(190),
        "three concurrent acquires at 10 rps finished in {elapsed:?}"
    );
}

#[tokio::test]
async fn rate_update_applies_to_subsequent_acquires() {
    let limiter = RateLimiter::new(1.0);
    limiter.acquire().await;

    limiter.update_rate(100.0);
    let start = Instant::now();
    limiter.acquire().await;
    assert!(
        start.elapsed() < Duration::from_millis(500),
        "rate update did not shorten the interval"
    );
}
