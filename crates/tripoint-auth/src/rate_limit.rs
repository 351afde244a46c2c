//! Login rate limiting
//!
//! Attempt counters live in an injected `CounterStore` with TTL-windowed
//! eviction rather than process-global state, so limits hold across workers
//! and restarts.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::Mutex;
use std::time::{Duration, Instant};
use tracing::{instrument, warn};
use tripoint_core::traits::CounterStore;
use tripoint_core::{AppError, AppResult};

/// Rate limiter for admin login attempts
pub struct LoginRateLimiter {
    store: Arc<dyn CounterStore>,
    max_attempts: i64,
    window_secs: u64,
}

impl LoginRateLimiter {
    /// Create a limiter allowing `max_attempts` per `window_secs` per key
    pub fn new(store: Arc<dyn CounterStore>, max_attempts: i64, window_secs: u64) -> Self {
        Self {
            store,
            max_attempts,
            window_secs,
        }
    }

    /// Count an attempt for `key`; fails with `RateLimited` once the window
    /// budget is exhausted
    #[instrument(skip(self))]
    pub async fn check(&self, key: &str) -> AppResult<()> {
        let count = self.store.increment(key, self.window_secs).await?;

        if count > self.max_attempts {
            warn!("Rate limit exceeded for {} ({} attempts)", key, count);
            return Err(AppError::RateLimited);
        }

        Ok(())
    }
}

/// In-memory counter store
///
/// Single-process fallback for development and tests; production uses the
/// Redis-backed implementation from tripoint-cache.
#[derive(Default)]
pub struct MemoryCounterStore {
    counters: Mutex<HashMap<String, (i64, Instant)>>,
}

impl MemoryCounterStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CounterStore for MemoryCounterStore {
    async fn increment(&self, key: &str, window_secs: u64) -> AppResult<i64> {
        let mut counters = self
            .counters
            .lock()
            .map_err(|e| AppError::Internal(format!("Counter lock poisoned: {}", e)))?;

        let now = Instant::now();
        let window = Duration::from_secs(window_secs);

        let entry = counters.entry(key.to_string()).or_insert((0, now));
        if now.duration_since(entry.1) > window {
            *entry = (0, now);
        }
        entry.0 += 1;

        Ok(entry.0)
    }
}
