//! Global crawl rate limiter.
//!
//! Enforces a minimum inter-request interval of `1 / requests_per_second`
//! across all callers. One limiter is shared by every worker, so N concurrent
//! workers still produce requests spaced by the interval, preventing bursts.

use std::time::{Duration, Instant};

use parking_lot::Mutex;

/// Floor applied to configured rates. Keeps `min_interval` finite.
const MIN_RATE_RPS: f64 = 0.01;

#[derive(Debug)]
struct RateState {
    min_interval: Duration,
    last_request_time: Option<Instant>,
}

/// Shared request pacer. State persists for the life of the process; the
/// rate can be changed mid-run with [`RateLimiter::update_rate`].
#[derive(Debug)]
pub struct RateLimiter {
    state: Mutex<RateState>,
}

fn interval_for(requests_per_second: f64) -> Duration {
    let rate = requests_per_second.max(MIN_RATE_RPS);
    Duration::from_secs_f64(1.0 / rate)
}

impl RateLimiter {
    #[must_use]
    pub fn new(requests_per_second: f64) -> Self {
        Self {
            state: Mutex::new(RateState {
                min_interval: interval_for(requests_per_second),
                last_request_time: None,
            }),
        }
    }

    /// Acquire permission to make a request, suspending without blocking the
    /// runtime.
    ///
    /// Each caller books the slot one interval after the previous booking
    /// and advances `last_request_time` to that slot before releasing the
    /// lock. `last_request_time` therefore runs ahead of the clock when
    /// callers are queued up, and the deficit stacks: N concurrent arrivals
    /// get N consecutive slots, not the same one. The lock is never held
    /// across the sleep.
    pub async fn acquire(&self) {
        let wait = {
            let mut state = self.state.lock();
            let now = Instant::now();
            match state.last_request_time {
                Some(last) => {
                    let next_slot = last + state.min_interval;
                    if next_slot > now {
                        state.last_request_time = Some(next_slot);
                        Some(next_slot - now)
                    } else {
                        state.last_request_time = Some(now);
                        None
                    }
                }
                None => {
                    state.last_request_time = Some(now);
                    None
                }
            }
        };

        if let Some(wait) = wait {
            tokio::time::sleep(wait).await;
        }
    }

    /// Blocking variant for synchronous callers.
    ///
    /// Sleeps while holding the lock so the check, the sleep decision, and
    /// the timestamp update are atomic relative to other callers; two callers
    /// can never compute the same "now" and both proceed immediately.
    pub fn acquire_blocking(&self) {
        let mut state = self.state.lock();
        let now = Instant::now();
        match state.last_request_time {
            Some(last) => {
                let next_slot = last + state.min_interval;
                if next_slot > now {
                    std::thread::sleep(next_slot - now);
                    state.last_request_time = Some(Instant::now());
                } else {
                    state.last_request_time = Some(now);
                }
            }
            None => {
                state.last_request_time = Some(now);
            }
        }
    }

    /// Change the rate at runtime. Rates at or below zero are clamped to a
    /// 0.01 rps floor.
    pub fn update_rate(&self, requests_per_second: f64) {
        let mut state = self.state.lock();
        state.min_interval = interval_for(requests_per_second);
    }

    /// Current minimum inter-request interval.
    #[must_use]
    pub fn min_interval(&self) -> Duration {
        self.state.lock().min_interval
    }
}
