//! Sliding-window rate limiting for completion calls.
//!
//! One [`RateLimiter`] is shared (behind an `Arc`) by every call site in the
//! process. Quotas are tracked per resource key, so all callers using the
//! same key draw from the same budget. Callers over quota are delayed, never
//! dropped.
//!
//! # Example
//!
//! ```ignore
//! use lecturemate_summary::rate_limit::{RateLimiter, TokioClock};
//! use lecturemate_summary::RateLimitConfig;
//! use std::sync::Arc;
//!
//! let limiter = Arc::new(RateLimiter::new(RateLimitConfig::default(), Arc::new(TokioClock)));
//! limiter.acquire("gpt-3.5-turbo").await?;
//! // ... issue exactly one call
//! ```

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex as StdMutex};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::{debug, trace};

use crate::config::RateLimitConfig;
use crate::error::{Result, SummaryError};

/// Time source for the limiter.
#[async_trait]
pub trait Clock: Send + Sync {
    /// Current instant.
    fn now(&self) -> Instant;

    /// Suspend the caller until `deadline`.
    async fn sleep_until(&self, deadline: Instant);
}

/// Wall-clock time via tokio timers.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioClock;

#[async_trait]
impl Clock for TokioClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    async fn sleep_until(&self, deadline: Instant) {
        tokio::time::sleep_until(deadline.into()).await;
    }
}

/// Virtual clock that jumps forward instead of sleeping.
///
/// Every wait is recorded so tests can assert on when a caller was
/// blocked and for how long.
#[derive(Debug)]
pub struct ManualClock {
    origin: Instant,
    state: StdMutex<ManualState>,
}

#[derive(Debug, Default)]
struct ManualState {
    elapsed: Duration,
    waits: Vec<Duration>,
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl ManualClock {
    /// Start a clock at virtual time zero.
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
            state: StdMutex::new(ManualState::default()),
        }
    }

    /// Virtual time elapsed since creation.
    pub fn elapsed(&self) -> Duration {
        self.lock().elapsed
    }

    /// Move time forward.
    pub fn advance(&self, by: Duration) {
        self.lock().elapsed += by;
    }

    /// Durations of every `sleep_until` that actually had to wait.
    pub fn waits(&self) -> Vec<Duration> {
        self.lock().waits.clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, ManualState> {
        // A poisoned lock only means a test panicked mid-update.
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.origin + self.lock().elapsed
    }

    async fn sleep_until(&self, deadline: Instant) {
        let mut state = self.lock();
        let target = deadline.saturating_duration_since(self.origin);
        if target > state.elapsed {
            let wait = target - state.elapsed;
            state.waits.push(wait);
            state.elapsed = target;
        }
    }
}

/// Process-wide call quota, keyed by resource name.
pub struct RateLimiter {
    config: RateLimitConfig,
    clock: Arc<dyn Clock>,
    /// Issue times of calls still inside the window, per resource.
    windows: Mutex<HashMap<String, VecDeque<Instant>>>,
}

impl RateLimiter {
    /// Create a limiter with the given quota and clock.
    pub fn new(config: RateLimitConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            config,
            clock,
            windows: Mutex::new(HashMap::new()),
        }
    }

    /// Create a limiter on wall-clock time.
    pub fn with_tokio_clock(config: RateLimitConfig) -> Self {
        Self::new(config, Arc::new(TokioClock))
    }

    /// The configured quota.
    pub fn config(&self) -> &RateLimitConfig {
        &self.config
    }

    /// Wait until a call against `resource` is allowed, then claim it.
    ///
    /// Returns once exactly one call may proceed. With an acquire timeout
    /// configured, fails with [`SummaryError::RateLimitTimeout`] as soon as
    /// it is clear the slot would open too late.
    pub async fn acquire(&self, resource: &str) -> Result<()> {
        let started = self.clock.now();

        loop {
            let wake_at = {
                let mut windows = self.windows.lock().await;
                let now = self.clock.now();
                let issued = windows.entry(resource.to_string()).or_default();

                while let Some(&oldest) = issued.front() {
                    if now.saturating_duration_since(oldest) >= self.config.window {
                        issued.pop_front();
                    } else {
                        break;
                    }
                }

                if issued.len() < self.config.max_requests {
                    issued.push_back(now);
                    trace!(resource, in_window = issued.len(), "Rate limit slot acquired");
                    return Ok(());
                }

                match issued.front() {
                    Some(&oldest) => oldest + self.config.window,
                    // max_requests == 0 never frees a slot
                    None => {
                        return Err(SummaryError::InvalidConfig(
                            "rate limit allows zero requests".into(),
                        ))
                    }
                }
            };

            if let Some(timeout) = self.config.acquire_timeout {
                if wake_at.saturating_duration_since(started) > timeout {
                    return Err(SummaryError::RateLimitTimeout {
                        resource: resource.to_string(),
                        timeout,
                    });
                }
            }

            debug!(
                resource,
                wait_ms = wake_at.saturating_duration_since(self.clock.now()).as_millis() as u64,
                "Rate limit reached, waiting for window to roll"
            );
            self.clock.sleep_until(wake_at).await;
        }
    }
}
