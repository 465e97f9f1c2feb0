//! services/limiter.rs
//! Per-client fixed-window rate limiting. The only shared mutable state in the
//! request path; scoring itself never touches it.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use crate::config::RateLimit;

// Stale windows are swept once the table grows past this many keys.
const SWEEP_THRESHOLD: usize = 4096;

#[derive(Debug, Clone, Copy)]
struct Window {
    started: Instant,
    count: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimited {
    pub limit: RateLimit,
    pub retry_after: Duration,
}

#[derive(Debug, Default)]
pub struct RateLimiter {
    // (scope, client, window length) -> current window
    windows: Mutex<HashMap<(String, String, Duration), Window>>,
}

impl RateLimiter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn check(&self, scope: &str, client: &str, limits: &[RateLimit]) -> Result<(), RateLimited> {
        self.check_at(scope, client, limits, Instant::now())
    }

    /// Admit only if every limit has capacity; admission counts against all of them.
    pub fn check_at(
        &self,
        scope: &str,
        client: &str,
        limits: &[RateLimit],
        now: Instant,
    ) -> Result<(), RateLimited> {
        let mut windows = self.windows.lock().unwrap_or_else(|e| e.into_inner());

        if windows.len() > SWEEP_THRESHOLD {
            windows.retain(|(_, _, len), w| now.saturating_duration_since(w.started) < *len);
        }

        for limit in limits {
            let key = (scope.to_string(), client.to_string(), limit.window);
            // A missing or expired window counts as empty.
            let (count, elapsed) = match windows.get(&key) {
                Some(w) => {
                    let elapsed = now.saturating_duration_since(w.started);
                    if elapsed < limit.window { (w.count, elapsed) } else { (0, Duration::ZERO) }
                }
                None => (0, Duration::ZERO),
            };
            if count >= limit.max {
                return Err(RateLimited {
                    limit: *limit,
                    retry_after: limit.window - elapsed,
                });
            }
        }

        for limit in limits {
            let key = (scope.to_string(), client.to_string(), limit.window);
            let w = windows.entry(key).or_insert(Window { started: now, count: 0 });
            if now.saturating_duration_since(w.started) >= limit.window {
                *w = Window { started: now, count: 0 };
            }
            w.count += 1;
        }
        Ok(())
    }

    pub fn tracked_keys(&self) -> usize {
        self.windows.lock().unwrap_or_else(|e| e.into_inner()).len()
    }
}
