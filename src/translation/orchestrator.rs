use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::Utc;
use tokio::sync::{broadcast, oneshot, Notify};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::language::{detect_source_language, normalize_language};
use super::provider::{cancellable, ProviderId, TranslationProvider};
use super::stats::{log_summary, Settlement, TranslationStats, TranslationStatsSnapshot};
use super::types::{Priority, TranslationOutcome, TranslationRequest, TranslationResult};
use crate::error::{Result, SkipReason, TranslationError};
use crate::pipeline::PipelineContext;

const RESULT_CHANNEL_CAPACITY: usize = 256;

struct Queued {
    request: TranslationRequest,
    seq: u64,
    enqueued: Instant,
    reply: oneshot::Sender<TranslationResult>,
}

struct InFlight {
    started: Instant,
    cancel: CancellationToken,
    reply: oneshot::Sender<TranslationResult>,
    request: TranslationRequest,
}

#[derive(Default)]
struct QueueState {
    queue: Vec<Queued>,
    in_flight: HashMap<String, InFlight>,
    next_seq: u64,
}

impl QueueState {
    fn contains(&self, id: &str) -> bool {
        self.in_flight.contains_key(id) || self.queue.iter().any(|q| q.request.id == id)
    }

    /// Index of the entry to dispatch next: highest priority, then oldest.
    fn next_index(&self) -> Option<usize> {
        self.queue
            .iter()
            .enumerate()
            .min_by_key(|(_, q)| (q.request.priority, q.seq))
            .map(|(idx, _)| idx)
    }

    fn oldest_index(&self) -> Option<usize> {
        self.queue
            .iter()
            .enumerate()
            .min_by_key(|(_, q)| q.seq)
            .map(|(idx, _)| idx)
    }
}

struct Inner {
    ctx: Arc<PipelineContext>,
    state: Mutex<QueueState>,
    stats: TranslationStats,
    results: broadcast::Sender<TranslationResult>,
    /// Woken on every settlement
    settled: Notify,
}

/// Awaitable handle for one submitted request.
pub struct TranslationHandle {
    request_id: String,
    result: oneshot::Receiver<TranslationResult>,
}

impl TranslationHandle {
    pub fn request_id(&self) -> &str {
        &self.request_id
    }

    /// Wait for the request to settle.
    ///
    /// Every accepted request settles, so this only yields `Cancelled` when the
    /// orchestrator itself was dropped.
    pub async fn wait(self) -> Result<TranslationResult> {
        self.result.await.map_err(|_| TranslationError::Cancelled)
    }
}

/// Bounded translation queue with a cap on concurrent provider calls.
///
/// Each accepted request settles exactly once, as a result, a timeout, a
/// cancellation or a skip. Settled results go to the submitter's handle and
/// to every [`subscribe`](Self::subscribe)r.
#[derive(Clone)]
pub struct TranslationOrchestrator {
    inner: Arc<Inner>,
}

impl TranslationOrchestrator {
    pub fn new(ctx: Arc<PipelineContext>) -> Self {
        let (results, _) = broadcast::channel(RESULT_CHANNEL_CAPACITY);
        Self {
            inner: Arc::new(Inner {
                ctx,
                state: Mutex::new(QueueState::default()),
                stats: TranslationStats::new(),
                results,
                settled: Notify::new(),
            }),
        }
    }

    pub fn context(&self) -> &Arc<PipelineContext> {
        &self.inner.ctx
    }

    /// Queue a request. Returns immediately; the handle resolves on settlement.
    ///
    /// When the queue is full its oldest entry is settled as skipped to make
    /// room. Must be called from within a Tokio runtime.
    pub fn submit(&self, mut request: TranslationRequest) -> Result<TranslationHandle> {
        if request.text.trim().is_empty() {
            return Err(TranslationError::EmptyText);
        }

        let config = self.inner.ctx.config();
        request.priority = Priority::for_text(&request.text, config.short_text_chars);
        let request_id = request.id.clone();
        let (reply, result) = oneshot::channel();

        let evicted = {
            let mut state = self.inner.state();
            if state.contains(&request_id) {
                return Err(TranslationError::DuplicateRequest(request_id));
            }

            let evicted = if state.queue.len() >= config.queue_capacity.max(1) {
                state.oldest_index().map(|idx| state.queue.remove(idx))
            } else {
                None
            };

            let seq = state.next_seq;
            state.next_seq += 1;
            state.queue.push(Queued {
                request,
                seq,
                enqueued: Instant::now(),
                reply,
            });
            evicted
        };

        self.inner.stats.record_submitted();
        debug!(request_id = %request_id, "Translation request queued");

        if let Some(evicted) = evicted {
            warn!(
                request_id = %evicted.request.id,
                "Translation queue full, skipping oldest request"
            );
            let result = TranslationResult::failed_all(
                &evicted.request,
                TranslationError::Skipped(SkipReason::QueueOverflow),
            );
            self.inner.deliver(evicted.reply, result, Settlement::Skipped);
        }

        self.inner.pump();

        Ok(TranslationHandle { request_id, result })
    }

    /// Submit and wait for the settled result.
    pub async fn translate(&self, request: TranslationRequest) -> Result<TranslationResult> {
        self.submit(request)?.wait().await
    }

    /// Cancel a queued or in-flight request. Returns false when it was
    /// unknown or already settled.
    pub fn cancel(&self, request_id: &str) -> bool {
        let queued = {
            let mut state = self.inner.state();
            if let Some(entry) = state.in_flight.get(request_id) {
                entry.cancel.cancel();
                return true;
            }
            let position = state.queue.iter().position(|q| q.request.id == request_id);
            match position {
                Some(idx) => state.queue.remove(idx),
                None => return false,
            }
        };

        debug!(request_id, "Cancelled queued translation");
        let result = TranslationResult::failed_all(&queued.request, TranslationError::Cancelled);
        self.inner.deliver(queued.reply, result, Settlement::Cancelled);
        true
    }

    /// Cancel everything, queued and in flight.
    pub fn cancel_all(&self) -> usize {
        let ids: Vec<String> = {
            let state = self.inner.state();
            state
                .queue
                .iter()
                .map(|q| q.request.id.clone())
                .chain(state.in_flight.keys().cloned())
                .collect()
        };
        ids.iter().filter(|id| self.cancel(id)).count()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<TranslationResult> {
        self.inner.results.subscribe()
    }

    pub fn stats(&self) -> TranslationStatsSnapshot {
        self.inner.snapshot()
    }

    pub fn queue_len(&self) -> usize {
        self.inner.state().queue.len()
    }

    pub fn in_flight_len(&self) -> usize {
        self.inner.state().in_flight.len()
    }

    /// Wait until nothing is queued or in flight. Returns false if `limit`
    /// passed first.
    pub async fn wait_idle(&self, limit: Duration) -> bool {
        let idle = async {
            loop {
                let settled = self.inner.settled.notified();
                {
                    let state = self.inner.state();
                    if state.queue.is_empty() && state.in_flight.is_empty() {
                        return;
                    }
                }
                settled.await;
            }
        };
        tokio::time::timeout(limit, idle).await.is_ok()
    }

    /// Settle queued and in-flight entries older than the request timeout.
    pub fn sweep_stale(&self) -> usize {
        let timeout = self.inner.ctx.config().request_timeout();

        let (queued, in_flight) = {
            let mut state = self.inner.state();

            let mut queued = Vec::new();
            let mut idx = 0;
            while idx < state.queue.len() {
                if state.queue[idx].enqueued.elapsed() > timeout {
                    queued.push(state.queue.remove(idx));
                } else {
                    idx += 1;
                }
            }

            let stale_ids: Vec<String> = state
                .in_flight
                .iter()
                .filter(|(_, entry)| entry.started.elapsed() > timeout)
                .map(|(id, _)| id.clone())
                .collect();
            let in_flight: Vec<InFlight> = stale_ids
                .iter()
                .filter_map(|id| state.in_flight.remove(id))
                .collect();

            (queued, in_flight)
        };

        let swept = queued.len() + in_flight.len();

        for entry in queued {
            let result = TranslationResult::failed_all(&entry.request, TranslationError::Timeout);
            self.inner.deliver(entry.reply, result, Settlement::TimedOut);
        }
        for entry in in_flight {
            entry.cancel.cancel();
            let result = TranslationResult::failed_all(&entry.request, TranslationError::Timeout);
            self.inner.deliver(entry.reply, result, Settlement::TimedOut);
        }

        if swept > 0 {
            info!("Swept {} stale translation requests", swept);
            self.inner.pump();
        }
        swept
    }

    /// Periodically sweep stale entries until the orchestrator is dropped.
    pub fn spawn_maintenance(&self) -> JoinHandle<()> {
        let weak = Arc::downgrade(&self.inner);
        let period = self.inner.ctx.config().sweep_interval();

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
            loop {
                ticker.tick().await;
                let Some(inner) = weak.upgrade() else {
                    break;
                };
                TranslationOrchestrator { inner }.sweep_stale();
            }
        })
    }
}

impl Inner {
    fn state(&self) -> MutexGuard<'_, QueueState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn snapshot(&self) -> TranslationStatsSnapshot {
        let (queued, in_flight) = {
            let state = self.state();
            (state.queue.len(), state.in_flight.len())
        };
        self.stats.snapshot(queued, in_flight)
    }

    fn deliver(
        &self,
        reply: oneshot::Sender<TranslationResult>,
        result: TranslationResult,
        settlement: Settlement,
    ) {
        self.stats.record(settlement);
        debug!(
            request_id = %result.request_id,
            ?settlement,
            "Translation request settled"
        );

        // Receivers may have gone away; neither send is required to land.
        let _ = reply.send(result.clone());
        let _ = self.results.send(result);
        self.settled.notify_waiters();

        let every = self.ctx.config().stats_log_every;
        if every > 0 {
            let snapshot = self.snapshot();
            if snapshot.settled() % every == 0 {
                log_summary(&snapshot);
            }
        }
    }

    /// Move queued requests into free dispatch slots.
    fn pump(self: &Arc<Self>) {
        let config = self.ctx.config();
        let timeout = config.request_timeout();
        let max_in_flight = config.max_in_flight.max(1);

        let mut expired = Vec::new();
        let mut started = Vec::new();
        {
            let mut state = self.state();
            while state.in_flight.len() < max_in_flight {
                let Some(idx) = state.next_index() else {
                    break;
                };
                let Queued {
                    request,
                    enqueued,
                    reply,
                    ..
                } = state.queue.remove(idx);

                if enqueued.elapsed() > timeout {
                    expired.push((request, reply));
                    continue;
                }

                let cancel = CancellationToken::new();
                state.in_flight.insert(
                    request.id.clone(),
                    InFlight {
                        started: Instant::now(),
                        cancel: cancel.clone(),
                        reply,
                        request: request.clone(),
                    },
                );
                started.push((request, cancel));
            }
        }

        for (request, reply) in expired {
            let result = TranslationResult::failed_all(&request, TranslationError::Timeout);
            self.deliver(reply, result, Settlement::TimedOut);
        }

        for (request, cancel) in started {
            let inner = Arc::clone(self);
            tokio::spawn(async move { inner.run(request, cancel).await });
        }
    }

    async fn run(self: Arc<Self>, request: TranslationRequest, cancel: CancellationToken) {
        let timeout = self.ctx.config().request_timeout();

        let outcome = tokio::select! {
            _ = cancel.cancelled() => Err(TranslationError::Cancelled),
            res = tokio::time::timeout(timeout, self.translate_request(&request, &cancel)) => {
                match res {
                    Ok(res) => res,
                    Err(_) => {
                        cancel.cancel();
                        Err(TranslationError::Timeout)
                    }
                }
            }
        };

        let (result, settlement) = match outcome {
            Ok(result) if result.is_success() => (result, Settlement::Succeeded),
            Ok(result) => (result, Settlement::Failed),
            Err(TranslationError::Timeout) => (
                TranslationResult::failed_all(&request, TranslationError::Timeout),
                Settlement::TimedOut,
            ),
            Err(TranslationError::Cancelled) => (
                TranslationResult::failed_all(&request, TranslationError::Cancelled),
                Settlement::Cancelled,
            ),
            Err(err) => (TranslationResult::failed_all(&request, err), Settlement::Failed),
        };

        let entry = self.state().in_flight.remove(&request.id);
        match entry {
            Some(entry) => self.deliver(entry.reply, result, settlement),
            None => debug!(request_id = %request.id, "Request already settled, dropping late result"),
        }

        self.pump();
    }

    async fn translate_request(
        &self,
        request: &TranslationRequest,
        cancel: &CancellationToken,
    ) -> Result<TranslationResult> {
        let mut detected = detect_source_language(&request.text).to_string();
        if let Some(detector) = self.ctx.language_detector() {
            let remote = cancellable(cancel, async {
                Ok::<_, TranslationError>(detector.detect_language(&request.text).await)
            })
            .await?;
            if let Some(lang) = remote {
                detected = normalize_language(&lang);
            }
        }

        let primary = self.ctx.selected_provider();
        let mut translations = BTreeMap::new();

        for target in request.normalized_targets() {
            let outcome = if target == detected {
                TranslationOutcome::Translated {
                    text: request.text.clone(),
                }
            } else {
                self.translate_one(&primary, &request.text, &detected, &target, cancel)
                    .await?
            };
            translations.insert(target, outcome);
        }

        Ok(TranslationResult {
            request_id: request.id.clone(),
            original_text: request.text.clone(),
            detected_language: detected,
            provider: Some(primary.id()),
            translations,
            settled_at: Utc::now(),
        })
    }

    /// One target language: primary provider, then at most one free-tier
    /// fallback. Only terminal errors escape.
    async fn translate_one(
        &self,
        primary: &Arc<dyn TranslationProvider>,
        text: &str,
        from: &str,
        to: &str,
        cancel: &CancellationToken,
    ) -> Result<TranslationOutcome> {
        let err = match self.attempt(primary, text, from, to, cancel).await {
            Ok(text) => return Ok(TranslationOutcome::Translated { text }),
            Err(err) if err.is_terminal() => return Err(err),
            Err(err) => err,
        };

        if primary.id() == ProviderId::Free {
            return Ok(TranslationOutcome::failed(err, text));
        }

        warn!(
            provider = %primary.id(),
            error = %err,
            "Translation failed, falling back to free tier"
        );

        let free = self.ctx.free_tier();
        match self.attempt(&free, text, from, to, cancel).await {
            Ok(text) => Ok(TranslationOutcome::Translated { text }),
            Err(fallback) if fallback.is_terminal() => Err(fallback),
            Err(fallback) => {
                warn!(error = %fallback, "Free tier fallback failed");
                Ok(TranslationOutcome::failed(err, text))
            }
        }
    }

    async fn attempt(
        &self,
        provider: &Arc<dyn TranslationProvider>,
        text: &str,
        from: &str,
        to: &str,
        cancel: &CancellationToken,
    ) -> Result<String> {
        cancellable(cancel, self.ctx.rate_limiter().admit(provider.id())).await?;
        provider.translate(text, from, to, cancel).await
    }
}
