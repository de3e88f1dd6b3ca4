use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// How a request was settled, for counting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Settlement {
    Succeeded,
    Failed,
    TimedOut,
    Cancelled,
    Skipped,
}

/// Cumulative translation counters
#[derive(Debug)]
pub struct TranslationStats {
    started_at: DateTime<Utc>,
    submitted: AtomicU64,
    succeeded: AtomicU64,
    failed: AtomicU64,
    timed_out: AtomicU64,
    cancelled: AtomicU64,
    skipped: AtomicU64,
}

/// Point-in-time view of the translation counters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranslationStatsSnapshot {
    pub started_at: DateTime<Utc>,
    pub submitted: u64,
    pub succeeded: u64,
    pub failed: u64,
    pub timed_out: u64,
    pub cancelled: u64,
    pub skipped: u64,

    /// Requests waiting for a dispatch slot
    pub queued: usize,

    /// Requests currently talking to a provider
    pub in_flight: usize,
}

impl TranslationStatsSnapshot {
    pub fn settled(&self) -> u64 {
        self.succeeded + self.failed + self.timed_out + self.cancelled + self.skipped
    }

    /// Share of settled requests that failed or timed out.
    pub fn failure_rate(&self) -> f64 {
        let settled = self.settled();
        if settled == 0 {
            return 0.0;
        }
        (self.failed + self.timed_out) as f64 / settled as f64
    }
}

impl TranslationStats {
    pub fn new() -> Self {
        Self {
            started_at: Utc::now(),
            submitted: AtomicU64::new(0),
            succeeded: AtomicU64::new(0),
            failed: AtomicU64::new(0),
            timed_out: AtomicU64::new(0),
            cancelled: AtomicU64::new(0),
            skipped: AtomicU64::new(0),
        }
    }

    pub fn record_submitted(&self) {
        self.submitted.fetch_add(1, Ordering::SeqCst);
    }

    pub fn record(&self, settlement: Settlement) {
        let counter = match settlement {
            Settlement::Succeeded => &self.succeeded,
            Settlement::Failed => &self.failed,
            Settlement::TimedOut => &self.timed_out,
            Settlement::Cancelled => &self.cancelled,
            Settlement::Skipped => &self.skipped,
        };
        counter.fetch_add(1, Ordering::SeqCst);
    }

    pub fn snapshot(&self, queued: usize, in_flight: usize) -> TranslationStatsSnapshot {
        TranslationStatsSnapshot {
            started_at: self.started_at,
            submitted: self.submitted.load(Ordering::SeqCst),
            succeeded: self.succeeded.load(Ordering::SeqCst),
            failed: self.failed.load(Ordering::SeqCst),
            timed_out: self.timed_out.load(Ordering::SeqCst),
            cancelled: self.cancelled.load(Ordering::SeqCst),
            skipped: self.skipped.load(Ordering::SeqCst),
            queued,
            in_flight,
        }
    }
}

impl Default for TranslationStats {
    fn default() -> Self {
        Self::new()
    }
}

/// Log a summary, warning when too many requests fail.
pub fn log_summary(snapshot: &TranslationStatsSnapshot) {
    let runtime_minutes = Utc::now()
        .signed_duration_since(snapshot.started_at)
        .num_minutes();

    info!(
        runtime_minutes,
        submitted = snapshot.submitted,
        succeeded = snapshot.succeeded,
        failed = snapshot.failed,
        timed_out = snapshot.timed_out,
        cancelled = snapshot.cancelled,
        skipped = snapshot.skipped,
        in_flight = snapshot.in_flight,
        queued = snapshot.queued,
        "Translation statistics"
    );

    if snapshot.settled() > 5 && snapshot.failure_rate() > 0.3 {
        warn!(
            "Translation failure rate is {:.0}%: check network connectivity, API keys, \
             or switch translation provider",
            snapshot.failure_rate() * 100.0
        );
    }
}
