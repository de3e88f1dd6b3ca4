//! Per-provider admission control.
//!
//! Each provider has a minimum spacing between requests and a cap on the
//! number of requests inside a trailing 60 second window. Callers that arrive
//! too early are suspended until their slot; callers that would exceed the
//! window cap are refused with [`TranslationError::RateLimitExceeded`].
//!
//! The slot is reserved while the lock is held and only then does the caller
//! sleep, so concurrent dispatches can never both take the last slot and are
//! spaced by `min_interval` from one another.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::error::{Result, TranslationError};
use crate::translation::ProviderId;

/// Length of the sliding request-count window.
pub const RATE_WINDOW: Duration = Duration::from_secs(60);

/// Limits applied to one provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimitConfig {
    /// Maximum admissions inside the trailing window.
    pub max_per_minute: u32,

    /// Minimum spacing between two admissions, in milliseconds.
    pub min_interval_ms: u64,
}

impl RateLimitConfig {
    pub fn new(max_per_minute: u32, min_interval_ms: u64) -> Self {
        Self {
            max_per_minute,
            min_interval_ms,
        }
    }

    /// Built-in limits for each provider family.
    pub fn default_for(provider: ProviderId) -> Self {
        match provider {
            ProviderId::Regional => Self::new(100, 100),
            ProviderId::Prompt => Self::new(60, 1000),
            ProviderId::Free => Self::new(30, 2000),
        }
    }

    pub fn min_interval(&self) -> Duration {
        Duration::from_millis(self.min_interval_ms)
    }
}

#[derive(Debug, Default)]
struct ProviderWindow {
    last_request: Option<Instant>,
    /// Admission instants, oldest first.
    timestamps: VecDeque<Instant>,
}

impl ProviderWindow {
    fn prune(&mut self, at: Instant, window: Duration) -> usize {
        let before = self.timestamps.len();
        while let Some(oldest) = self.timestamps.front() {
            if at.saturating_duration_since(*oldest) >= window {
                self.timestamps.pop_front();
            } else {
                break;
            }
        }
        before - self.timestamps.len()
    }
}

/// Admission control shared by every dispatch of the orchestrator.
pub struct RateLimiter {
    limits: HashMap<ProviderId, RateLimitConfig>,
    windows: Mutex<HashMap<ProviderId, ProviderWindow>>,
    window: Duration,
}

impl RateLimiter {
    /// Create a limiter with explicit per-provider limits.
    ///
    /// Providers missing from `limits` are admitted unconditionally.
    pub fn new(limits: HashMap<ProviderId, RateLimitConfig>) -> Self {
        Self {
            limits,
            windows: Mutex::new(HashMap::new()),
            window: RATE_WINDOW,
        }
    }

    /// Create a limiter using the built-in limits for all providers.
    pub fn with_defaults() -> Self {
        let limits = ProviderId::ALL
            .iter()
            .map(|id| (*id, RateLimitConfig::default_for(*id)))
            .collect();
        Self::new(limits)
    }

    pub fn limit_for(&self, provider: ProviderId) -> Option<RateLimitConfig> {
        self.limits.get(&provider).copied()
    }

    /// Wait for the provider's next slot, or fail if its window is full.
    pub async fn admit(&self, provider: ProviderId) -> Result<()> {
        let Some(limit) = self.limits.get(&provider).copied() else {
            return Ok(());
        };

        let slot = {
            let mut windows = self.windows.lock().await;
            let entry = windows.entry(provider).or_default();
            let now = Instant::now();

            let slot = match entry.last_request {
                Some(last) => (last + limit.min_interval()).max(now),
                None => now,
            };

            entry.prune(slot, self.window);
            if entry.timestamps.len() >= limit.max_per_minute as usize {
                warn!(
                    provider = %provider,
                    recent = entry.timestamps.len(),
                    max_per_minute = limit.max_per_minute,
                    "rate limit exceeded"
                );
                return Err(TranslationError::RateLimitExceeded(provider));
            }

            entry.last_request = Some(slot);
            entry.timestamps.push_back(slot);
            slot
        };

        let now = Instant::now();
        if slot > now {
            debug!(
                provider = %provider,
                wait_ms = (slot - now).as_millis() as u64,
                "waiting for minimum request interval"
            );
            tokio::time::sleep_until(slot).await;
        }

        Ok(())
    }

    /// Number of admissions currently inside the provider's window.
    pub async fn recent_requests(&self, provider: ProviderId) -> usize {
        let mut windows = self.windows.lock().await;
        match windows.get_mut(&provider) {
            Some(entry) => {
                entry.prune(Instant::now(), self.window);
                entry.timestamps.len()
            }
            None => 0,
        }
    }

    /// Drop expired window entries for every provider, idle ones included.
    ///
    /// Returns the number of timestamps removed.
    pub async fn sweep(&self) -> usize {
        let now = Instant::now();
        let window = self.window;
        let mut windows = self.windows.lock().await;

        let removed = windows
            .values_mut()
            .map(|entry| entry.prune(now, window))
            .sum();

        windows.retain(|_, entry| {
            !entry.timestamps.is_empty()
                || entry
                    .last_request
                    .is_some_and(|last| now.saturating_duration_since(last) < window)
        });

        removed
    }

    /// Run [`sweep`](Self::sweep) every `period` until the handle is aborted.
    pub fn spawn_sweeper(self: &Arc<Self>, period: Duration) -> JoinHandle<()> {
        let limiter = Arc::clone(self);
        tokio::spawn(async move {
            info!("Rate limiter sweeper started ({}s period)", period.as_secs());
            let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
            loop {
                ticker.tick().await;
                let removed = limiter.sweep().await;
                if removed > 0 {
                    debug!(removed, "swept expired rate limit entries");
                }
            }
        })
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::with_defaults()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_limits() {
        assert_eq!(
            RateLimitConfig::default_for(ProviderId::Regional),
            RateLimitConfig::new(100, 100)
        );
        assert_eq!(
            RateLimitConfig::default_for(ProviderId::Prompt),
            RateLimitConfig::new(60, 1000)
        );
        assert_eq!(
            RateLimitConfig::default_for(ProviderId::Free),
            RateLimitConfig::new(30, 2000)
        );
    }

    #[test]
    fn test_window_prune_keeps_recent() {
        let start = Instant::now();
        let mut window = ProviderWindow::default();
        window.timestamps.push_back(start);
        window.timestamps.push_back(start + Duration::from_secs(30));

        let removed = window.prune(start + Duration::from_secs(60), RATE_WINDOW);

        assert_eq!(removed, 1);
        assert_eq!(window.timestamps.len(), 1);
    }
}
