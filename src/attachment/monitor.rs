// src/attachment/monitor.rs
//! Bounded polling of an attachment's parse status.
//!
//! A session fetches the status immediately, then once per interval, until the
//! backend reports a terminal status, the overall timeout elapses, or the
//! caller cancels. Each session is one tokio task; the next fetch is only
//! scheduled once the previous one has settled, so a handle never has two
//! requests in flight.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::cell::Cell;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant};
use tokio_util::sync::CancellationToken;
use tracing::Instrument;
use uuid::Uuid;

use super::error::FetchError;
use super::status::{ParseStatus, StatusView};
use crate::app_log;
use crate::types::StatusReport;

pub const DEFAULT_INTERVAL_MS: u64 = 2_000;
pub const DEFAULT_TIMEOUT_MS: u64 = 90_000;

// Stand-in deadline for timeouts too large to add to an `Instant`.
const FAR_FUTURE: Duration = Duration::from_secs(86_400 * 365 * 30);

/// Something that can report the current parse status of an attachment.
pub trait StatusSource: Send + Sync + 'static {
    fn fetch_status(
        &self,
        attachment_id: &str,
    ) -> impl Future<Output = Result<StatusReport, FetchError>> + Send;
}

impl<F, Fut> StatusSource for F
where
    F: Fn(String) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<StatusReport, FetchError>> + Send,
{
    fn fetch_status(
        &self,
        attachment_id: &str,
    ) -> impl Future<Output = Result<StatusReport, FetchError>> + Send {
        self(attachment_id.to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollOptions {
    pub interval: Duration,
    pub timeout: Duration,
}

impl Default for PollOptions {
    fn default() -> Self {
        Self::from_millis(DEFAULT_INTERVAL_MS, DEFAULT_TIMEOUT_MS)
    }
}

impl PollOptions {
    pub fn from_millis(interval_ms: u64, timeout_ms: u64) -> Self {
        Self {
            interval: Duration::from_millis(interval_ms),
            timeout: Duration::from_millis(timeout_ms),
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Overall bound of the session. Timeouts beyond the clock's range are
    /// treated as "never".
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PollState {
    Polling,
    Terminal,
    TimedOut,
    Cancelled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeKind {
    Terminal,
    Timeout,
    Cancelled,
}

/// How a poll session ended, with the last status it observed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PollOutcome {
    pub kind: OutcomeKind,
    pub status: ParseStatus,
}

/// Snapshot of a running or finished poll session.
#[derive(Debug, Clone, Serialize)]
pub struct PollSession {
    pub session_id: Uuid,
    pub attachment_id: String,
    pub started_at: DateTime<Utc>,
    pub last_status: ParseStatus,
    pub state: PollState,
    pub elapsed: Duration,
    pub fetches: u32,
    pub failures: u32,
}

impl PollSession {
    fn new(attachment_id: String) -> Self {
        Self {
            session_id: Uuid::new_v4(),
            attachment_id,
            started_at: Utc::now(),
            last_status: ParseStatus::Waiting,
            state: PollState::Polling,
            elapsed: Duration::ZERO,
            fetches: 0,
            failures: 0,
        }
    }

    pub fn is_polling(&self) -> bool {
        self.state == PollState::Polling
    }

    pub fn view(&self) -> StatusView {
        if self.is_polling() {
            ParseStatus::Partial.view()
        } else {
            self.last_status.view()
        }
    }
}

type UpdateFn = Box<dyn Fn(&StatusView, &str) + Send + Sync>;
type SettleFn = Box<dyn Fn(&PollOutcome) + Send + Sync>;
type ErrorFn = Box<dyn Fn(&FetchError) + Send + Sync>;

/// Consumer hooks of a session. All are optional.
///
/// Hooks run on the session's task. A hook may cancel any session; cancelling
/// another session from inside a hook does not wait for that session's running
/// hook to return.
#[derive(Default)]
pub struct PollCallbacks {
    on_update: Option<UpdateFn>,
    on_settle: Option<SettleFn>,
    on_error: Option<ErrorFn>,
}

impl PollCallbacks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Called after every successful fetch with the view to render and the raw status.
    pub fn on_update(mut self, f: impl Fn(&StatusView, &str) + Send + Sync + 'static) -> Self {
        self.on_update = Some(Box::new(f));
        self
    }

    /// Called once when the session reaches a terminal status or times out.
    pub fn on_settle(mut self, f: impl Fn(&PollOutcome) + Send + Sync + 'static) -> Self {
        self.on_settle = Some(Box::new(f));
        self
    }

    /// Called after every failed fetch.
    pub fn on_error(mut self, f: impl Fn(&FetchError) + Send + Sync + 'static) -> Self {
        self.on_error = Some(Box::new(f));
        self
    }
}

thread_local! {
    // Set while a session callback runs on this thread.
    static EMITTING: Cell<bool> = const { Cell::new(false) };
}

/// Serializes callback delivery and fetch starts against cancellation: once
/// `cancel` returns, neither starts again.
struct Gate {
    attachment_id: String,
    session_id: Uuid,
    token: CancellationToken,
    cancelled: AtomicBool,
    lock: Mutex<()>,
    callbacks: PollCallbacks,
}

impl Gate {
    fn new(attachment_id: String, session_id: Uuid, callbacks: PollCallbacks) -> Self {
        Self {
            attachment_id,
            session_id,
            token: CancellationToken::new(),
            cancelled: AtomicBool::new(false),
            lock: Mutex::new(()),
            callbacks,
        }
    }

    fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    fn cancel(&self) {
        if !self.cancelled.swap(true, Ordering::SeqCst) {
            app_log!(
                debug,
                attachment_id = %self.attachment_id,
                session_id = %self.session_id,
                "Poll session cancelled"
            );
        }
        self.token.cancel();
        // Wait out a callback or fetch start running on another thread. Inside
        // a callback the wait is skipped: our own lock is already held, and
        // another session's hook may be waiting to cancel us.
        if !EMITTING.with(Cell::get) {
            drop(self.lock.lock().unwrap_or_else(PoisonError::into_inner));
        }
    }

    /// Runs `start` under the lock unless the session is already cancelled.
    fn unless_cancelled<T>(&self, start: impl FnOnce() -> T) -> Option<T> {
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        if self.is_cancelled() {
            return None;
        }
        Some(start())
    }

    fn emit(&self, deliver: impl FnOnce(&PollCallbacks)) {
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        if self.is_cancelled() {
            return;
        }
        let previous = EMITTING.with(|e| e.replace(true));
        let _reset = ResetEmitting(previous);
        deliver(&self.callbacks);
    }
}

struct ResetEmitting(bool);

impl Drop for ResetEmitting {
    fn drop(&mut self) {
        EMITTING.with(|e| e.set(self.0));
    }
}

/// Handle to a running poll session.
///
/// Dropping the handle detaches the session; it keeps running until it settles.
pub struct PollHandle {
    attachment_id: String,
    session_id: Uuid,
    gate: Arc<Gate>,
    session: watch::Receiver<PollSession>,
    task: JoinHandle<PollOutcome>,
}

impl PollHandle {
    pub fn attachment_id(&self) -> &str {
        &self.attachment_id
    }

    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    /// Stop the session. No fetch is issued and no callback fires afterwards;
    /// the result of an in-flight fetch is discarded.
    pub fn cancel(&self) {
        self.gate.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.gate.is_cancelled()
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Current snapshot of the session
    pub fn session(&self) -> PollSession {
        self.session.borrow().clone()
    }

    /// View to render right now
    pub fn view(&self) -> StatusView {
        self.session.borrow().view()
    }

    /// Detached canceller, usable after the handle has been moved into `wait`
    pub fn canceller(&self) -> PollCanceller {
        PollCanceller {
            gate: Arc::clone(&self.gate),
        }
    }

    /// Receiver that observes every session change
    pub fn subscribe(&self) -> watch::Receiver<PollSession> {
        self.session.clone()
    }

    /// Wait for the session to end. A cancelled session yields `Cancelled`
    /// with the last status it observed. A panic raised by a callback is
    /// resumed here.
    pub async fn wait(self) -> PollOutcome {
        match self.task.await {
            Ok(outcome) => outcome,
            Err(err) if err.is_panic() => {
                app_log!(
                    error,
                    attachment_id = %self.attachment_id,
                    session_id = %self.session_id,
                    "Poll session panicked"
                );
                std::panic::resume_unwind(err.into_panic())
            }
            Err(err) => {
                app_log!(
                    error,
                    attachment_id = %self.attachment_id,
                    "Poll session task failed: {}",
                    err
                );
                PollOutcome {
                    kind: OutcomeKind::Cancelled,
                    status: self.session.borrow().last_status,
                }
            }
        }
    }
}

/// Cancels the session it was taken from, like `PollHandle::cancel`.
#[derive(Clone)]
pub struct PollCanceller {
    gate: Arc<Gate>,
}

impl PollCanceller {
    pub fn cancel(&self) {
        self.gate.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.gate.is_cancelled()
    }
}

/// Start polling `attachment_id` through `source`. Must be called within a
/// tokio runtime.
pub fn start_polling<S>(
    attachment_id: impl Into<String>,
    source: S,
    options: PollOptions,
    callbacks: PollCallbacks,
) -> PollHandle
where
    S: StatusSource,
{
    let attachment_id = attachment_id.into();
    let session = PollSession::new(attachment_id.clone());
    let session_id = session.session_id;
    let (session_tx, session_rx) = watch::channel(session);
    let gate = Arc::new(Gate::new(attachment_id.clone(), session_id, callbacks));

    let span = tracing::info_span!(
        "poll_session",
        attachment_id = %attachment_id,
        session_id = %session_id
    );
    let task = tokio::spawn(
        run_session(
            attachment_id.clone(),
            source,
            options,
            Arc::clone(&gate),
            session_tx,
        )
        .instrument(span),
    );

    PollHandle {
        attachment_id,
        session_id,
        gate,
        session: session_rx,
        task,
    }
}

enum FetchWake {
    Cancelled,
    Deadline,
    Settled(Result<StatusReport, FetchError>),
}

enum PauseWake {
    Cancelled,
    Deadline,
    Tick,
}

async fn run_session<S: StatusSource>(
    attachment_id: String,
    source: S,
    options: PollOptions,
    gate: Arc<Gate>,
    session: watch::Sender<PollSession>,
) -> PollOutcome {
    let started = Instant::now();
    let deadline = started
        .checked_add(options.timeout)
        .unwrap_or_else(|| started + FAR_FUTURE);
    let mut last_status = ParseStatus::Waiting;

    app_log!(
        info,
        "Polling parse status every {:?} for up to {:?}",
        options.interval,
        options.timeout
    );

    let kind = loop {
        let Some(fetch) = gate.unless_cancelled(|| source.fetch_status(&attachment_id)) else {
            break OutcomeKind::Cancelled;
        };

        // A fetch that is ready at the deadline still counts. The deadline
        // only cuts off one that has not settled.
        let wake = tokio::select! {
            biased;
            _ = gate.token.cancelled() => FetchWake::Cancelled,
            result = fetch => FetchWake::Settled(result),
            _ = time::sleep_until(deadline) => FetchWake::Deadline,
        };

        let result = match wake {
            FetchWake::Settled(_) if gate.is_cancelled() => break OutcomeKind::Cancelled,
            FetchWake::Settled(result) => result,
            FetchWake::Cancelled => break OutcomeKind::Cancelled,
            FetchWake::Deadline => break OutcomeKind::Timeout,
        };

        match result {
            Ok(report) => {
                last_status = report.parse_status();
                let terminal = last_status.is_terminal();
                let raw = report.raw_status();
                app_log!(trace, "Fetched status {:?} -> {}", raw, last_status);

                session.send_modify(|s| {
                    s.last_status = last_status;
                    s.fetches += 1;
                    s.elapsed = started.elapsed();
                    if terminal {
                        s.state = PollState::Terminal;
                    }
                });

                let view = session.borrow().view();
                gate.emit(|cb| {
                    if let Some(on_update) = &cb.on_update {
                        on_update(&view, &raw);
                    }
                });

                if terminal {
                    break OutcomeKind::Terminal;
                }
            }
            Err(err) => {
                app_log!(warn, "Status fetch failed: {}", err);
                session.send_modify(|s| {
                    s.failures += 1;
                    s.elapsed = started.elapsed();
                });
                gate.emit(|cb| {
                    if let Some(on_error) = &cb.on_error {
                        on_error(&err);
                    }
                });
            }
        }

        let wake = tokio::select! {
            biased;
            _ = gate.token.cancelled() => PauseWake::Cancelled,
            _ = time::sleep_until(deadline) => PauseWake::Deadline,
            _ = time::sleep(options.interval) => PauseWake::Tick,
        };

        match wake {
            PauseWake::Cancelled => break OutcomeKind::Cancelled,
            PauseWake::Deadline => break OutcomeKind::Timeout,
            PauseWake::Tick => {}
        }
    };

    let outcome = PollOutcome {
        kind,
        status: last_status,
    };

    session.send_modify(|s| {
        s.elapsed = started.elapsed();
        s.state = match kind {
            OutcomeKind::Terminal => PollState::Terminal,
            OutcomeKind::Timeout => PollState::TimedOut,
            OutcomeKind::Cancelled => PollState::Cancelled,
        };
    });

    match kind {
        OutcomeKind::Cancelled => {
            app_log!(debug, "Poll session stopped by caller at {}", last_status);
        }
        OutcomeKind::Timeout => {
            app_log!(
                info,
                "Poll session timed out after {:?} with status {}",
                started.elapsed(),
                last_status
            );
        }
        OutcomeKind::Terminal => {
            app_log!(info, "Poll session settled with status {}", last_status);
        }
    }

    if kind != OutcomeKind::Cancelled {
        gate.emit(|cb| {
            if let Some(on_settle) = &cb.on_settle {
                on_settle(&outcome);
            }
        });
    }

    outcome
}
