use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use tokio::sync::{watch, Mutex};
use tokio::time::{sleep, Duration, Instant};
use tracing::{debug, info, warn};

use crate::commands::classifier::exchange;
use crate::commands::codec::{CommandRequest, CommandResult, CommandState};
use crate::error::{ClassifiedError, TimeoutCause};
use crate::transport::{Transport, TransportFailure, EXECUTE_PATH, STATUS_PATH};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backoff {
    #[default]
    Fixed,
    /// Doubles after every check, capped at `max_interval_ms`.
    Exponential,
}

/// How status checks for a long-running command are paced and bounded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollPolicy {
    /// Minimum wait before every status check in milliseconds
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,

    /// Upper bound for exponential backoff in milliseconds
    #[serde(default = "default_max_interval_ms")]
    pub max_interval_ms: u64,

    #[serde(default)]
    pub backoff: Backoff,

    /// Consecutive failed checks tolerated before the failure is surfaced
    #[serde(default = "default_max_transient_failures")]
    pub max_transient_failures: u32,

    /// Wall-clock budget for the whole wait in milliseconds
    #[serde(default = "default_deadline_ms")]
    pub deadline_ms: u64,
}

fn default_interval_ms() -> u64 {
    1000
}
fn default_max_interval_ms() -> u64 {
    5000
}
fn default_max_transient_failures() -> u32 {
    3
}
fn default_deadline_ms() -> u64 {
    120_000
}

/// Whole milliseconds, rounded up so a budget never shrinks.
fn millis_ceil(duration: Duration) -> u64 {
    u64::try_from(duration.as_nanos().div_ceil(1_000_000)).unwrap_or(u64::MAX)
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            interval_ms: default_interval_ms(),
            max_interval_ms: default_max_interval_ms(),
            backoff: Backoff::Fixed,
            max_transient_failures: default_max_transient_failures(),
            deadline_ms: default_deadline_ms(),
        }
    }
}

impl PollPolicy {
    pub fn fixed(interval: Duration) -> Self {
        Self {
            interval_ms: millis_ceil(interval),
            backoff: Backoff::Fixed,
            ..Default::default()
        }
    }

    pub fn exponential(interval: Duration, max_interval: Duration) -> Self {
        Self {
            interval_ms: millis_ceil(interval),
            max_interval_ms: millis_ceil(max_interval),
            backoff: Backoff::Exponential,
            ..Default::default()
        }
    }

    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline_ms = millis_ceil(deadline);
        self
    }

    pub fn with_max_transient_failures(mut self, max: u32) -> Self {
        self.max_transient_failures = max;
        self
    }

    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    pub fn deadline(&self) -> Duration {
        Duration::from_millis(self.deadline_ms)
    }

    /// Wait before the check following `completed_checks` earlier ones.
    /// Never shorter than `interval`.
    pub fn delay_before(&self, completed_checks: u32) -> Duration {
        match self.backoff {
            Backoff::Fixed => self.interval(),
            Backoff::Exponential => {
                let cap = self.max_interval_ms.max(self.interval_ms);
                let factor = 1u64.checked_shl(completed_checks.min(32)).unwrap_or(u64::MAX);
                Duration::from_millis(self.interval_ms.saturating_mul(factor).min(cap))
            }
        }
    }
}

/// Bookkeeping for one wait on a long-running command. Lives inside the poll
/// task and is dropped with it.
#[derive(Debug)]
pub struct PollState {
    pub request: CommandRequest,
    pub last_result: CommandResult,
    pub attempts: u32,
    pub deadline: Instant,
    command_id: Option<String>,
    consecutive_failures: u32,
}

impl PollState {
    pub fn new(request: CommandRequest, last_result: CommandResult, deadline: Instant) -> Self {
        Self {
            command_id: last_result.id().map(str::to_owned),
            request,
            last_result,
            attempts: 0,
            deadline,
            consecutive_failures: 0,
        }
    }

    /// Id the camera assigned to the command. Once known it is kept, even
    /// when later answers leave it out.
    pub fn command_id(&self) -> Option<&str> {
        self.command_id.as_deref()
    }

    fn record(&mut self, result: CommandResult) {
        if self.command_id.is_none() {
            self.command_id = result.id().map(str::to_owned);
        }
        self.last_result = result;
    }

    fn deadline_passed(&self) -> bool {
        Instant::now() >= self.deadline
    }

    /// Status checks go to the status endpoint once the camera gave an id.
    /// Only a command that never had one is checked by sending the original
    /// envelope again.
    fn status_check(&self) -> Result<(&'static str, Vec<u8>), ClassifiedError> {
        match &self.command_id {
            Some(id) => serde_json::to_vec(&json!({ "id": id }))
                .map(|body| (STATUS_PATH, body))
                .map_err(|e| ClassifiedError::InvalidRequest(e.to_string())),
            None => self
                .request
                .encode()
                .map(|body| (EXECUTE_PATH, body))
                .map_err(|e| ClassifiedError::InvalidRequest(e.to_string())),
        }
    }
}

/// Observable progress of a poll.
#[derive(Debug, Clone)]
pub enum PollStatus {
    Running { attempts: u32, progress: Option<f64> },
    Finished(Result<CommandResult, ClassifiedError>),
}

impl PollStatus {
    pub fn is_finished(&self) -> bool {
        matches!(self, Self::Finished(_))
    }
}

/// Shared view of one running poll. Clones observe the same poll; cancelling
/// through any clone stops it for all of them. The poll also stops once every
/// handle is dropped.
#[derive(Debug, Clone)]
pub struct PollHandle {
    key: String,
    status: watch::Receiver<PollStatus>,
    cancel: Arc<watch::Sender<bool>>,
}

impl PollHandle {
    /// Identity of the poll: the camera's command id, or a per-submission key
    /// for commands that came back without one.
    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn status(&self) -> PollStatus {
        self.status.borrow().clone()
    }

    pub fn is_finished(&self) -> bool {
        self.status.borrow().is_finished()
    }

    /// Stop issuing status checks. A check already on the wire is left to
    /// finish; its answer is ignored.
    pub fn cancel(&self) {
        self.cancel.send_replace(true);
    }

    pub async fn wait(mut self) -> Result<CommandResult, ClassifiedError> {
        loop {
            let finished = match &*self.status.borrow_and_update() {
                PollStatus::Finished(outcome) => Some(outcome.clone()),
                PollStatus::Running { .. } => None,
            };
            if let Some(outcome) = finished {
                return outcome;
            }
            if self.status.changed().await.is_err() {
                let last = self.status.borrow().clone();
                return match last {
                    PollStatus::Finished(outcome) => outcome,
                    PollStatus::Running { .. } => Err(ClassifiedError::Cancelled),
                };
            }
        }
    }
}

/// Registry entry. Holds no strong reference to the cancel sender so the
/// poll notices when its last handle goes away.
struct ActivePoll {
    seq: u64,
    status: watch::Receiver<PollStatus>,
    cancel: Weak<watch::Sender<bool>>,
}

impl ActivePoll {
    fn join(&self, key: &str) -> Option<PollHandle> {
        if self.status.borrow().is_finished() {
            return None;
        }
        Some(PollHandle {
            key: key.to_string(),
            status: self.status.clone(),
            cancel: self.cancel.upgrade()?,
        })
    }
}

/// Drives long-running commands to a terminal state, one poll per command.
#[derive(Clone)]
pub struct CommandPoller {
    transport: Arc<dyn Transport>,
    policy: PollPolicy,
    active: Arc<Mutex<HashMap<String, ActivePoll>>>,
    next_seq: Arc<AtomicU64>,
}

impl CommandPoller {
    pub fn new(transport: Arc<dyn Transport>, policy: PollPolicy) -> Self {
        Self {
            transport,
            policy,
            active: Arc::new(Mutex::new(HashMap::new())),
            next_seq: Arc::new(AtomicU64::new(1)),
        }
    }

    pub fn policy(&self) -> &PollPolicy {
        &self.policy
    }

    /// Number of polls currently running.
    pub async fn active_polls(&self) -> usize {
        self.active.lock().await.len()
    }

    /// Start polling `initial` (an in-progress result of `request`). When the
    /// camera gave a command id that is already being polled, the running
    /// poll is joined instead. Commands without an id always get a poll of
    /// their own.
    pub async fn track(
        &self,
        request: CommandRequest,
        initial: CommandResult,
        deadline: Duration,
    ) -> PollHandle {
        let mut active = self.active.lock().await;
        let seq = self.next_seq.fetch_add(1, Ordering::Relaxed);

        let key = match initial.id() {
            Some(id) => {
                if let Some(handle) = active.get(id).and_then(|entry| entry.join(id)) {
                    debug!(command_key = %id, "joining running poll");
                    return handle;
                }
                id.to_string()
            }
            None => format!("{}#{seq}", request.name()),
        };

        let (status_tx, status_rx) = watch::channel(PollStatus::Running {
            attempts: 0,
            progress: initial.progress(),
        });
        let (cancel_tx, cancel_rx) = watch::channel(false);
        let cancel_tx = Arc::new(cancel_tx);
        active.insert(
            key.clone(),
            ActivePoll {
                seq,
                status: status_rx.clone(),
                cancel: Arc::downgrade(&cancel_tx),
            },
        );
        drop(active);

        info!(
            command = %request.name(),
            command_key = %key,
            deadline_ms = millis_ceil(deadline),
            "long-running command submitted, polling for completion"
        );

        let state = PollState::new(request, initial, Instant::now() + deadline);
        let poller = self.clone();
        let task_key = key.clone();
        tokio::spawn(async move {
            poller.run(task_key, seq, state, status_tx, cancel_rx).await;
        });

        PollHandle {
            key,
            status: status_rx,
            cancel: cancel_tx,
        }
    }

    async fn run(
        self,
        key: String,
        seq: u64,
        mut state: PollState,
        status_tx: watch::Sender<PollStatus>,
        mut cancel_rx: watch::Receiver<bool>,
    ) {
        let outcome = self.drive(&mut state, &status_tx, &mut cancel_rx).await;

        match &outcome {
            Ok(result) => info!(command_key = %key, attempts = state.attempts, command = %result.name(), "long-running command finished"),
            Err(ClassifiedError::Cancelled) if cancel_rx.has_changed().is_err() => {
                info!(command_key = %key, attempts = state.attempts, "every waiter dropped, polling stopped")
            }
            Err(ClassifiedError::Cancelled) => info!(command_key = %key, attempts = state.attempts, "polling cancelled"),
            Err(err) => warn!(command_key = %key, attempts = state.attempts, error = %err, "long-running command failed"),
        }

        // Publish while holding the registry so a new submit never sees a
        // finished entry that is about to be removed. A newer poll may already
        // own the key.
        let mut active = self.active.lock().await;
        if active.get(&key).is_some_and(|entry| entry.seq == seq) {
            active.remove(&key);
        }
        status_tx.send_replace(PollStatus::Finished(outcome));
    }

    async fn drive(
        &self,
        state: &mut PollState,
        status_tx: &watch::Sender<PollStatus>,
        cancel_rx: &mut watch::Receiver<bool>,
    ) -> Result<CommandResult, ClassifiedError> {
        loop {
            let delay = self.policy.delay_before(state.attempts);
            tokio::select! {
                biased;
                _ = cancelled(cancel_rx) => return Err(ClassifiedError::Cancelled),
                _ = sleep(delay) => {}
            }

            if is_cancelled(cancel_rx) {
                return Err(ClassifiedError::Cancelled);
            }
            if state.deadline_passed() {
                return Err(ClassifiedError::Timeout(TimeoutCause::Deadline {
                    attempts: state.attempts,
                }));
            }

            let (path, body) = state.status_check()?;
            state.attempts += 1;
            debug!(command = %state.request.name(), attempt = state.attempts, path = %path, "checking command status");

            // The check runs on its own task so cancelling stops waiting for it
            // without tearing down the request.
            let transport = self.transport.clone();
            let check = tokio::spawn(async move { exchange(transport.as_ref(), path, body).await });
            let checked = tokio::select! {
                biased;
                _ = cancelled(cancel_rx) => {
                    debug!(attempt = state.attempts, "cancelled with a status check in flight");
                    return Err(ClassifiedError::Cancelled);
                }
                joined = check => joined.unwrap_or_else(|e| Err(ClassifiedError::Transport(TransportFailure::other(e)))),
            };

            match checked {
                Ok(result) => {
                    state.consecutive_failures = 0;
                    match result.state() {
                        CommandState::InProgress { progress } => {
                            status_tx.send_replace(PollStatus::Running {
                                attempts: state.attempts,
                                progress: *progress,
                            });
                            state.record(result);
                        }
                        CommandState::Done { .. } => return Ok(result),
                        CommandState::Error(payload) => {
                            return Err(ClassifiedError::DeviceReported {
                                code: payload.code.clone(),
                                message: payload.message.clone(),
                            })
                        }
                    }
                }
                Err(err) if err.is_transient() => {
                    state.consecutive_failures += 1;
                    if state.consecutive_failures > self.policy.max_transient_failures {
                        return Err(err);
                    }
                    warn!(
                        attempt = state.attempts,
                        failures = state.consecutive_failures,
                        error = %err,
                        "status check failed, will retry"
                    );
                }
                Err(err) => return Err(err),
            }
        }
    }
}

/// Cancelled explicitly, or every handle that could cancel is gone.
fn is_cancelled(rx: &watch::Receiver<bool>) -> bool {
    *rx.borrow() || rx.has_changed().is_err()
}

async fn cancelled(rx: &mut watch::Receiver<bool>) {
    // Errors only once the sender is dropped, which means nobody is waiting.
    let _ = rx.wait_for(|cancel| *cancel).await;
}
