use std::time::Duration;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, sleep_until, Instant};
use tracing::{debug, error, info, warn};

use super::source::{RecognitionErrorKind, RecognitionSource, SourceSignal};
use super::state::{StatusUpdate, SupervisorOutput, SupervisorState};
use crate::error::RecognitionError;

const COMMAND_CHANNEL_CAPACITY: usize = 16;
const OUTPUT_CHANNEL_CAPACITY: usize = 256;

/// Recovery timing for a supervised source
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SupervisorConfig {
    /// Restart attempts before giving up
    pub max_retries: u32,

    /// Attempt n waits n times this long...
    pub backoff_step_ms: u64,

    /// ...but never longer than this
    pub backoff_cap_ms: u64,

    /// How often the watchdog looks for a silent source
    pub watchdog_interval_ms: u64,

    /// A listening source silent for longer than this is restarted
    pub stale_after_ms: u64,

    /// Restart a healthy source this often (0 = never)
    pub forced_restart_ms: u64,

    /// Minimum time between language switches
    pub switch_cooldown_ms: u64,

    /// Pause between stopping and restarting for a language switch
    pub switch_settle_ms: u64,

    /// Used when the engine rejects the configured language
    pub fallback_language: String,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            max_retries: 5,
            backoff_step_ms: 1000,
            backoff_cap_ms: 5000,
            watchdog_interval_ms: 10_000,
            stale_after_ms: 15_000,
            forced_restart_ms: 60_000,
            switch_cooldown_ms: 5000,
            switch_settle_ms: 500,
            fallback_language: "zh-TW".to_string(),
        }
    }
}

impl SupervisorConfig {
    /// Delay before restart attempt `attempt` (1-based).
    pub fn backoff(&self, attempt: u32) -> Duration {
        let delay = self.backoff_step_ms.saturating_mul(u64::from(attempt));
        Duration::from_millis(delay.min(self.backoff_cap_ms))
    }
}

enum Command {
    Start(oneshot::Sender<Result<(), RecognitionError>>),
    Stop(oneshot::Sender<Result<(), RecognitionError>>),
    SwitchLanguage(String, oneshot::Sender<Result<(), RecognitionError>>),
    Language(oneshot::Sender<String>),
}

/// Timed follow-up owned by the current transition.
enum Pending {
    Restart { at: Instant },
    Resume { at: Instant, language: String },
}

impl Pending {
    fn at(&self) -> Instant {
        match self {
            Pending::Restart { at } | Pending::Resume { at, .. } => *at,
        }
    }
}

/// Handle to the task that owns a recognition source.
///
/// Dropping the handle stops the source and ends the task.
pub struct RecognitionSupervisor {
    commands: mpsc::Sender<Command>,
    state: watch::Receiver<SupervisorState>,
    task: JoinHandle<()>,
}

impl RecognitionSupervisor {
    /// Spawn the supervisor task. Recognition events and status updates
    /// arrive, in order, on the returned receiver.
    pub fn spawn(
        source: Box<dyn RecognitionSource>,
        config: SupervisorConfig,
    ) -> (Self, mpsc::Receiver<SupervisorOutput>) {
        let (command_tx, command_rx) = mpsc::channel(COMMAND_CHANNEL_CAPACITY);
        let (output_tx, output_rx) = mpsc::channel(OUTPUT_CHANNEL_CAPACITY);
        let (state_tx, state_rx) = watch::channel(SupervisorState::Idle);

        let actor = Actor {
            source,
            config,
            state: SupervisorState::Idle,
            state_tx,
            output: output_tx,
            signals: None,
            retry_count: 0,
            last_activity: Instant::now(),
            stop_requested: false,
            pending: None,
            forced_restart_at: None,
            last_switch: None,
        };
        let task = tokio::spawn(actor.run(command_rx));

        (
            Self {
                commands: command_tx,
                state: state_rx,
                task,
            },
            output_rx,
        )
    }

    async fn request<T>(
        &self,
        command: impl FnOnce(oneshot::Sender<T>) -> Command,
    ) -> Result<T, RecognitionError> {
        let (tx, rx) = oneshot::channel();
        self.commands
            .send(command(tx))
            .await
            .map_err(|_| RecognitionError::SupervisorGone)?;
        rx.await.map_err(|_| RecognitionError::SupervisorGone)
    }

    /// Start the source from `Idle` or `Failed`.
    pub async fn start(&self) -> Result<(), RecognitionError> {
        self.request(Command::Start).await?
    }

    /// Stop the source. Stopping an idle supervisor is a no-op.
    pub async fn stop(&self) -> Result<(), RecognitionError> {
        self.request(Command::Stop).await?
    }

    /// Begin switching the recognition language. Only allowed while
    /// listening and outside the switch cooldown.
    pub async fn switch_language(&self, language: &str) -> Result<(), RecognitionError> {
        let language = language.to_string();
        self.request(|reply| Command::SwitchLanguage(language, reply))
            .await?
    }

    /// Current recognition locale of the source.
    pub async fn language(&self) -> Result<String, RecognitionError> {
        self.request(Command::Language).await
    }

    pub fn state(&self) -> SupervisorState {
        *self.state.borrow()
    }

    pub fn watch_state(&self) -> watch::Receiver<SupervisorState> {
        self.state.clone()
    }

    /// Stop the source and wait for the task to finish.
    pub async fn shutdown(self) {
        if let Err(e) = self.stop().await {
            debug!("Supervisor stop during shutdown: {}", e);
        }
        drop(self.commands);
        if let Err(e) = self.task.await {
            warn!("Supervisor task ended abnormally: {}", e);
        }
    }
}

struct Actor {
    source: Box<dyn RecognitionSource>,
    config: SupervisorConfig,
    state: SupervisorState,
    state_tx: watch::Sender<SupervisorState>,
    output: mpsc::Sender<SupervisorOutput>,
    signals: Option<mpsc::Receiver<SourceSignal>>,
    retry_count: u32,
    last_activity: Instant,
    stop_requested: bool,
    pending: Option<Pending>,
    forced_restart_at: Option<Instant>,
    last_switch: Option<Instant>,
}

async fn next_signal(signals: &mut Option<mpsc::Receiver<SourceSignal>>) -> Option<SourceSignal> {
    match signals {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}

async fn sleep_until_opt(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

impl Actor {
    async fn run(mut self, mut commands: mpsc::Receiver<Command>) {
        let period = Duration::from_millis(self.config.watchdog_interval_ms.max(1));
        let mut watchdog = interval_at(Instant::now() + period, period);

        info!("Recognition supervisor started for source {}", self.source.name());

        loop {
            let pending_at = self.pending.as_ref().map(Pending::at);
            let forced_at = self.forced_restart_at;

            tokio::select! {
                command = commands.recv() => match command {
                    Some(command) => self.handle_command(command).await,
                    None => break,
                },
                signal = next_signal(&mut self.signals) => match signal {
                    Some(signal) => self.handle_signal(signal).await,
                    None => {
                        self.signals = None;
                        self.handle_signal(SourceSignal::Ended).await;
                    }
                },
                _ = sleep_until_opt(pending_at) => self.run_pending().await,
                _ = sleep_until_opt(forced_at) => {
                    self.forced_restart_at = None;
                    if self.state == SupervisorState::Listening {
                        self.force_restart("Periodic recognition restart").await;
                    }
                }
                _ = watchdog.tick() => self.check_watchdog().await,
            }
        }

        if self.state.is_active() {
            self.stop_source().await;
        }
        info!("Recognition supervisor for {} exited", self.source.name());
    }

    async fn set_state(&mut self, state: SupervisorState, message: impl Into<String>) {
        let message = message.into();
        info!(state = %state, "{}", message);

        self.state = state;
        self.state_tx.send_replace(state);

        let update = StatusUpdate {
            state,
            message,
            at: Utc::now(),
        };
        // The consumer may be gone; the state watch still reflects the change.
        let _ = self.output.send(SupervisorOutput::Status(update)).await;
    }

    async fn handle_command(&mut self, command: Command) {
        match command {
            Command::Start(reply) => {
                let result = self.start().await;
                let _ = reply.send(result);
            }
            Command::Stop(reply) => {
                self.stop().await;
                let _ = reply.send(Ok(()));
            }
            Command::SwitchLanguage(language, reply) => {
                let result = self.switch_language(language).await;
                let _ = reply.send(result);
            }
            Command::Language(reply) => {
                let _ = reply.send(self.source.language().to_string());
            }
        }
    }

    async fn start(&mut self) -> Result<(), RecognitionError> {
        if !matches!(self.state, SupervisorState::Idle | SupervisorState::Failed) {
            return Err(RecognitionError::InvalidTransition {
                action: "start",
                state: self.state.to_string(),
            });
        }

        self.stop_requested = false;
        self.retry_count = 0;
        self.pending = None;
        let message = format!("Starting recognition ({})", self.source.language());
        self.set_state(SupervisorState::Starting, message).await;

        match self.source.start().await {
            Ok(signals) => {
                self.signals = Some(signals);
                self.last_activity = Instant::now();
                Ok(())
            }
            Err(e) => {
                self.fail(format!("Could not start recognition: {e}")).await;
                Err(e)
            }
        }
    }

    async fn stop(&mut self) {
        if self.state == SupervisorState::Idle {
            return;
        }

        self.stop_requested = true;
        self.pending = None;
        self.forced_restart_at = None;
        self.set_state(SupervisorState::Stopping, "Stopping recognition").await;
        self.stop_source().await;
        self.set_state(SupervisorState::Idle, "Recognition stopped").await;
    }

    async fn stop_source(&mut self) {
        self.signals = None;
        if let Err(e) = self.source.stop().await {
            debug!("Error stopping recognition source: {}", e);
        }
    }

    async fn switch_language(&mut self, language: String) -> Result<(), RecognitionError> {
        if self.state != SupervisorState::Listening {
            return Err(RecognitionError::InvalidTransition {
                action: "switch language",
                state: self.state.to_string(),
            });
        }

        let cooldown = Duration::from_millis(self.config.switch_cooldown_ms);
        if let Some(last) = self.last_switch {
            let elapsed = last.elapsed();
            if elapsed < cooldown {
                return Err(RecognitionError::Cooldown {
                    remaining_ms: (cooldown - elapsed).as_millis() as u64,
                });
            }
        }

        if self.source.language() == language {
            debug!("Recognition language already {}", language);
            return Ok(());
        }

        self.last_switch = Some(Instant::now());
        self.forced_restart_at = None;
        let message = format!(
            "Switching recognition language {} -> {}",
            self.source.language(),
            language
        );
        self.set_state(SupervisorState::Switching, message).await;
        self.stop_source().await;

        let settle = Duration::from_millis(self.config.switch_settle_ms);
        self.pending = Some(Pending::Resume {
            at: Instant::now() + settle,
            language,
        });
        Ok(())
    }

    async fn handle_signal(&mut self, signal: SourceSignal) {
        self.last_activity = Instant::now();

        match signal {
            SourceSignal::Started => {
                if matches!(
                    self.state,
                    SupervisorState::Starting | SupervisorState::Restarting | SupervisorState::Switching
                ) {
                    self.retry_count = 0;
                    if self.config.forced_restart_ms > 0 {
                        self.forced_restart_at = Some(
                            Instant::now() + Duration::from_millis(self.config.forced_restart_ms),
                        );
                    }
                    let message = format!("Listening ({})", self.source.language());
                    self.set_state(SupervisorState::Listening, message).await;
                }
            }
            SourceSignal::Result(event) => {
                let _ = self.output.send(SupervisorOutput::Event(event)).await;
            }
            SourceSignal::Error { kind, message } => self.handle_error(kind, message).await,
            SourceSignal::Ended => {
                if self.stop_requested || !self.state.is_active() || self.pending.is_some() {
                    debug!("Recognition ended while {}", self.state);
                    return;
                }
                info!("Recognition ended unexpectedly");
                self.signals = None;
                self.begin_restart("Recognition ended unexpectedly").await;
            }
        }
    }

    async fn handle_error(&mut self, kind: RecognitionErrorKind, message: String) {
        if kind.is_ignorable() {
            debug!(?kind, "Ignoring recognition error: {}", message);
            return;
        }

        if self.stop_requested || !self.state.is_active() {
            return;
        }

        if kind.is_fatal() {
            let err = RecognitionError::PermissionDenied(message);
            self.fail(format!("{err}. Allow microphone access and start again")).await;
            return;
        }

        warn!(?kind, "Recognition error: {}", message);
        if kind == RecognitionErrorKind::UnsupportedLanguage {
            let fallback = self.config.fallback_language.clone();
            warn!(
                "{}, falling back to {}",
                RecognitionError::UnsupportedLanguage(self.source.language().to_string()),
                fallback
            );
            self.source.set_language(&fallback);
        }

        // Drop this run's stream so its trailing Ended does not count twice.
        self.signals = None;
        self.begin_restart(format!("Recognition error: {message}")).await;
    }

    /// Schedule the next restart attempt, or fail once attempts run out.
    async fn begin_restart(&mut self, reason: impl Into<String>) {
        if self.stop_requested || self.pending.is_some() {
            return;
        }

        let attempt = self.retry_count + 1;
        if attempt > self.config.max_retries {
            let err = RecognitionError::RetriesExhausted {
                attempts: self.retry_count,
            };
            self.fail(format!("{err}. Start recognition again manually")).await;
            return;
        }

        self.retry_count = attempt;
        self.forced_restart_at = None;
        let delay = self.config.backoff(attempt);
        self.pending = Some(Pending::Restart {
            at: Instant::now() + delay,
        });

        let message = format!(
            "{}, restarting in {} ms (attempt {}/{})",
            reason.into(),
            delay.as_millis(),
            attempt,
            self.config.max_retries
        );
        self.set_state(SupervisorState::Restarting, message).await;
    }

    async fn force_restart(&mut self, reason: &str) {
        self.retry_count = 0;
        self.signals = None;
        self.begin_restart(reason).await;
    }

    async fn run_pending(&mut self) {
        let Some(pending) = self.pending.take() else {
            return;
        };

        match pending {
            Pending::Restart { .. } => {
                if self.state != SupervisorState::Restarting {
                    return;
                }
                self.stop_source().await;
                self.restart_source().await;
            }
            Pending::Resume { language, .. } => {
                if self.state != SupervisorState::Switching {
                    return;
                }
                self.source.set_language(&language);
                self.restart_source().await;
            }
        }
    }

    async fn restart_source(&mut self) {
        debug!("Starting recognition source {}", self.source.name());
        self.last_activity = Instant::now();

        match self.source.start().await {
            Ok(signals) => self.signals = Some(signals),
            Err(RecognitionError::PermissionDenied(message)) => {
                let err = RecognitionError::PermissionDenied(message);
                self.fail(format!("{err}. Allow microphone access and start again")).await;
            }
            Err(e) => {
                warn!("Recognition restart failed: {}", e);
                self.begin_restart(format!("Restart failed: {e}")).await;
            }
        }
    }

    async fn check_watchdog(&mut self) {
        let stale_after = Duration::from_millis(self.config.stale_after_ms);
        let idle = self.last_activity.elapsed();

        match self.state {
            SupervisorState::Listening if idle > stale_after => {
                warn!(
                    "No recognition activity for {}s, forcing restart",
                    idle.as_secs()
                );
                self.force_restart("Recognition went silent").await;
            }
            // A source that never reported started counts as a failed attempt.
            SupervisorState::Starting | SupervisorState::Restarting | SupervisorState::Switching
                if self.pending.is_none() && idle > stale_after =>
            {
                self.signals = None;
                self.state = SupervisorState::Restarting;
                self.begin_restart("Recognition did not come back").await;
            }
            _ => {}
        }
    }

    async fn fail(&mut self, message: String) {
        error!("{}", message);
        self.pending = None;
        self.forced_restart_at = None;
        self.stop_source().await;
        self.set_state(SupervisorState::Failed, message).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_is_capped() {
        let config = SupervisorConfig::default();
        assert_eq!(config.backoff(1), Duration::from_millis(1000));
        assert_eq!(config.backoff(3), Duration::from_millis(3000));
        assert_eq!(config.backoff(5), Duration::from_millis(5000));
        assert_eq!(config.backoff(9), Duration::from_millis(5000));
    }
}
