//! Method invocation state machine.
//!
//! A call moves through pending → sent → completed → synchronized. The
//! shared [`CallCore`] holds the terminal slots (result/error) and the two
//! flags; [`CallHandle`] is the caller-facing view. Completion is
//! broadcast: any number of tasks can hold clones of one handle and await
//! it concurrently, and completion callbacks can be registered before or
//! after the terminal state is reached.
//!
//! # Flags
//!
//! - `completed`: the response (or a locally synthesized error) landed.
//!   Strictly monotonic: the first completion wins, later attempts are
//!   rejected and reported to the caller of [`CallCore::complete`].
//! - `updated`: the remote's side effects have propagated. May be
//!   recorded before completion (the wire can reorder the two frames) but
//!   only becomes observable through [`CallHandle::is_synchronized`] once
//!   the call is complete.
//!
//! `await_completion` resolves only when both flags are up.

// Rust guideline compliant 2026-02

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;

use crate::connection::LinkStatus;
use crate::error::CallError;

/// Process-wide correlation id counter. Monotonic, so an id is never
/// reused while an earlier call could still be pending.
static NEXT_CALL_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique correlation identifier for one method call.
///
/// Allocated at call creation, stable for the call's lifetime, echoed by
/// the remote side in `result` and `updated` frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CallId(u64);

impl CallId {
    /// Allocate the next process-unique identifier.
    pub(crate) fn next() -> Self {
        Self(NEXT_CALL_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// The raw numeric value, as it appears on the wire.
    #[must_use]
    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl From<u64> for CallId {
    fn from(raw: u64) -> Self {
        Self(raw)
    }
}

impl std::fmt::Display for CallId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Callback invoked once when a call reaches full terminal state.
type CompletionCallback = Box<dyn FnOnce(Result<serde_json::Value, CallError>) + Send>;

/// Mutable state behind the core's mutex.
#[derive(Default)]
struct CallState {
    completed: bool,
    updated: bool,
    result: Option<serde_json::Value>,
    error: Option<CallError>,
    callbacks: Vec<CompletionCallback>,
}

impl CallState {
    fn terminal(&self) -> bool {
        self.completed && self.updated
    }

    /// Snapshot of the terminal slots. Only meaningful once completed.
    fn outcome(&self) -> Result<serde_json::Value, CallError> {
        match &self.error {
            Some(err) => Err(err.clone()),
            // A response with no payload is a successful call that
            // returned nothing
            None => Ok(self.result.clone().unwrap_or(serde_json::Value::Null)),
        }
    }
}

/// Outcome of the connect-or-timeout wait.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum LinkReady {
    /// The link came up; the call should be sent.
    Connected,
    /// The transport gave up first; nothing must ever be sent.
    TimedOut,
    /// The call reached a terminal state while waiting (cancellation).
    AlreadyTerminal,
}

/// Shared state of one in-flight method call.
///
/// Held by the caller-facing [`CallHandle`]s, the dispatcher registry, and
/// the driver task. The registry's references are routing-only; the
/// handles own the call's lifetime.
pub(crate) struct CallCore {
    id: CallId,
    method: String,
    args: Vec<serde_json::Value>,
    state: Mutex<CallState>,
    notify: watch::Sender<u64>,
}

impl CallCore {
    /// Allocate an identifier and store name/args. Pending state, no side
    /// effects: nothing is registered and nothing is sent.
    pub(crate) fn new(method: &str, args: Vec<serde_json::Value>) -> Arc<Self> {
        let (notify, _) = watch::channel(0);
        Arc::new(Self {
            id: CallId::next(),
            method: method.to_string(),
            args,
            state: Mutex::new(CallState::default()),
            notify,
        })
    }

    pub(crate) fn id(&self) -> CallId {
        self.id
    }

    pub(crate) fn method(&self) -> &str {
        &self.method
    }

    pub(crate) fn args(&self) -> &[serde_json::Value] {
        &self.args
    }

    fn state(&self) -> MutexGuard<'_, CallState> {
        self.state.lock().expect("call state lock poisoned")
    }

    fn bump(&self) {
        self.notify.send_modify(|version| *version = version.wrapping_add(1));
    }

    /// Record the terminal outcome. Returns `false` (and changes nothing)
    /// if the call was already completed: completion is first-write-wins.
    ///
    /// `synchronized` short-circuits the side-effect flag for locally
    /// synthesized terminals (timeout, cancellation): nothing was sent, so
    /// there are no side effects to wait for.
    pub(crate) fn complete(
        &self,
        outcome: Result<serde_json::Value, CallError>,
        synchronized: bool,
    ) -> bool {
        let fired = {
            let mut state = self.state();
            if state.completed {
                return false;
            }
            state.completed = true;
            match outcome {
                Ok(value) => state.result = Some(value),
                Err(err) => state.error = Some(err),
            }
            if synchronized {
                state.updated = true;
            }
            if state.terminal() {
                std::mem::take(&mut state.callbacks)
            } else {
                Vec::new()
            }
        };
        self.bump();
        self.fire(fired);
        true
    }

    /// Record the side-effect propagation signal. Idempotent; tolerated
    /// before completion (see module docs).
    pub(crate) fn mark_synchronized(&self) {
        let fired = {
            let mut state = self.state();
            state.updated = true;
            if state.terminal() {
                std::mem::take(&mut state.callbacks)
            } else {
                Vec::new()
            }
        };
        self.bump();
        self.fire(fired);
    }

    fn fire(&self, callbacks: Vec<CompletionCallback>) {
        if callbacks.is_empty() {
            return;
        }
        let outcome = self.state().outcome();
        for callback in callbacks {
            callback(outcome.clone());
        }
    }

    /// Register a completion callback; fires immediately if the call is
    /// already fully terminal.
    pub(crate) fn add_callback(&self, callback: CompletionCallback) {
        let outcome = {
            let mut state = self.state();
            if !state.terminal() {
                state.callbacks.push(callback);
                return;
            }
            state.outcome()
        };
        callback(outcome);
    }

    pub(crate) fn is_complete(&self) -> bool {
        self.state().completed
    }

    pub(crate) fn is_synchronized(&self) -> bool {
        let state = self.state();
        state.completed && state.updated
    }

    pub(crate) fn result(&self) -> Option<serde_json::Value> {
        self.state().result.clone()
    }

    pub(crate) fn error(&self) -> Option<CallError> {
        self.state().error.clone()
    }

    /// First suspension: poll the link until it is ready or has given up,
    /// yielding between checks so other in-flight calls keep advancing.
    /// Timeout is checked before readiness so a link that reports both
    /// resolves deterministically to the timeout branch.
    pub(crate) async fn wait_link_ready(
        &self,
        status: &dyn LinkStatus,
        poll_interval: Duration,
    ) -> LinkReady {
        loop {
            if self.is_complete() {
                return LinkReady::AlreadyTerminal;
            }
            if status.timed_out() {
                return LinkReady::TimedOut;
            }
            if status.connected() {
                return LinkReady::Connected;
            }
            tokio::time::sleep(poll_interval).await;
        }
    }

    /// Second suspension: wait until the call is both completed and
    /// synchronized, then return the terminal outcome. Broadcast: any
    /// number of tasks may wait concurrently.
    pub(crate) async fn wait_terminal(&self) -> Result<serde_json::Value, CallError> {
        let mut rx = self.notify.subscribe();
        loop {
            {
                let state = self.state();
                if state.terminal() {
                    return state.outcome();
                }
            }
            // The sender lives in self, so this cannot fail while the
            // core is alive
            if rx.changed().await.is_err() {
                return Err(CallError::Cancelled);
            }
        }
    }
}

impl std::fmt::Debug for CallCore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state();
        f.debug_struct("CallCore")
            .field("id", &self.id)
            .field("method", &self.method)
            .field("completed", &state.completed)
            .field("updated", &state.updated)
            .finish_non_exhaustive()
    }
}

/// Caller-facing handle for one method call.
///
/// Cheap to clone; all clones observe the same call. Accessors are valid
/// at any time but only meaningful once [`is_complete`](Self::is_complete)
/// is true.
#[derive(Clone)]
pub struct CallHandle {
    core: Arc<CallCore>,
}

impl CallHandle {
    pub(crate) fn from_core(core: Arc<CallCore>) -> Self {
        Self { core }
    }

    /// Correlation identifier of this call.
    #[must_use]
    pub fn id(&self) -> CallId {
        self.core.id()
    }

    /// Method name of this call.
    #[must_use]
    pub fn method(&self) -> &str {
        self.core.method()
    }

    /// Whether the terminal outcome has landed.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.core.is_complete()
    }

    /// Whether the call is complete and its remote side effects have
    /// propagated. Never true before [`is_complete`](Self::is_complete).
    #[must_use]
    pub fn is_synchronized(&self) -> bool {
        self.core.is_synchronized()
    }

    /// The result payload, if the call completed successfully.
    #[must_use]
    pub fn result(&self) -> Option<serde_json::Value> {
        self.core.result()
    }

    /// The terminal error, if the call failed.
    #[must_use]
    pub fn error(&self) -> Option<CallError> {
        self.core.error()
    }

    /// Suspend until the call is completed and synchronized, then return
    /// the outcome. Safe to call from any number of tasks, repeatedly.
    pub async fn await_completion(&self) -> Result<serde_json::Value, CallError> {
        self.core.wait_terminal().await
    }

    /// Typed variant of [`await_completion`](Self::await_completion):
    /// coerces the opaque payload into `T`. A coercion failure is
    /// [`CallError::ResponseTypeMismatch`], distinct from protocol-level
    /// errors (the call itself succeeded).
    pub async fn await_result_as<T: DeserializeOwned>(&self) -> Result<T, CallError> {
        let value = self.await_completion().await?;
        serde_json::from_value(value).map_err(|err| CallError::ResponseTypeMismatch(err.to_string()))
    }

    /// Register a callback fired once, when the call reaches full terminal
    /// state (completed and synchronized). Fires immediately if already
    /// there. This is the fire-and-forget-but-observe mode: the caller
    /// never needs to await the handle.
    pub fn on_complete<F>(&self, callback: F)
    where
        F: FnOnce(Result<serde_json::Value, CallError>) + Send + 'static,
    {
        self.core.add_callback(Box::new(callback));
    }
}

impl std::fmt::Debug for CallHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CallHandle")
            .field("id", &self.id())
            .field("method", &self.method())
            .field("complete", &self.is_complete())
            .finish()
    }
}
