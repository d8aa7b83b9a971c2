//! Call dispatch and response correlation.
//!
//! The dispatcher owns the one shared mutable structure in the crate: the
//! correlation registry mapping [`CallId`]s to live calls. Around it sit
//! the entry point ([`Dispatcher::call`]) and the inbound delivery path
//! ([`Dispatcher::deliver`] / [`Dispatcher::mark_synchronized`]).
//!
//! # Architecture
//!
//! ```text
//!   caller ──► call(name, args) ──► registry insert ──► CallHandle
//!                                        │
//!                                        ▼
//!                              driver task (per call)
//!                    wait link ready → send once → wait terminal
//!                                        │
//!   wire layer ──► deliver(id, …) ───────┤ (routes by id)
//!             ──► mark_synchronized(id) ─┘
//! ```
//!
//! Each call advances independently; drivers only synchronize through the
//! registry mutex (held for map operations only, never across an await or
//! a user callback) and the transport's send primitive.
//!
//! # Registry lifecycle
//!
//! Delivery logically removes a call from the delivery path: the
//! completion flag makes any second delivery detectable and droppable.
//! The physical eviction happens exactly once, in the driver's detach
//! step after the call reaches full terminal state (or in
//! [`cancel`](Dispatcher::cancel) / [`shutdown`](Dispatcher::shutdown)).
//! Keeping the entry until then lets a trailing synchronization signal
//! still find its call, since the wire may reorder it after the response.

// Rust guideline compliant 2026-02

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use crate::call::{CallCore, CallHandle, CallId, LinkReady};
use crate::config::Config;
use crate::connection::{LinkStatus, Transport};
use crate::error::{CallError, RemoteError};
use crate::protocol::{self, ServerFrame};

/// Client-side RPC dispatcher for one persistent connection.
///
/// Collaborators are injected at construction, so multiple independent
/// dispatchers (and test doubles) coexist without process-wide state.
/// Cloning is cheap; clones share the registry.
#[derive(Clone)]
pub struct Dispatcher {
    inner: Arc<DispatcherInner>,
}

struct DispatcherInner {
    status: Arc<dyn LinkStatus>,
    transport: Arc<dyn Transport>,
    config: Config,
    calls: Mutex<HashMap<CallId, Arc<CallCore>>>,
    unknown_correlation: AtomicU64,
    double_delivery: AtomicU64,
}

impl Dispatcher {
    /// Create a dispatcher with default configuration.
    pub fn new(status: Arc<dyn LinkStatus>, transport: Arc<dyn Transport>) -> Self {
        Self::with_config(status, transport, Config::default())
    }

    /// Create a dispatcher with explicit configuration.
    pub fn with_config(
        status: Arc<dyn LinkStatus>,
        transport: Arc<dyn Transport>,
        config: Config,
    ) -> Self {
        Self {
            inner: Arc::new(DispatcherInner {
                status,
                transport,
                config,
                calls: Mutex::new(HashMap::new()),
                unknown_correlation: AtomicU64::new(0),
                double_delivery: AtomicU64::new(0),
            }),
        }
    }

    /// Issue a method call.
    ///
    /// Registers the call and spawns its driver task, then returns the
    /// handle immediately; the caller may await it now, later, or never.
    /// Never fails itself; failures surface on the handle.
    pub fn call(&self, method: &str, args: Vec<serde_json::Value>) -> CallHandle {
        let core = CallCore::new(method, args);
        self.inner.register(&core);

        log::debug!("[Dispatcher] call '{}' registered (id={})", method, core.id());

        let inner = Arc::clone(&self.inner);
        let driver_core = Arc::clone(&core);
        tokio::spawn(async move {
            inner.drive(driver_core).await;
        });

        CallHandle::from_core(core)
    }

    /// Route an inbound response to its call.
    ///
    /// Unknown identifiers and repeat deliveries are non-fatal anomalies:
    /// network reordering and duplicate delivery can legitimately produce
    /// both, and no caller is reachable for them. They are logged and
    /// counted, and the delivery is dropped.
    pub fn deliver(
        &self,
        id: CallId,
        error: Option<RemoteError>,
        result: Option<serde_json::Value>,
    ) {
        let Some(core) = self.inner.lookup(id) else {
            self.inner.unknown_correlation.fetch_add(1, Ordering::Relaxed);
            log::warn!("[Dispatcher] response for unknown call (id={id})");
            return;
        };

        let outcome = match error {
            Some(remote) => Err(CallError::Remote(remote)),
            None => Ok(result.unwrap_or(serde_json::Value::Null)),
        };

        if core.complete(outcome, false) {
            log::trace!("[Dispatcher] response delivered (id={id})");
        } else {
            self.inner.double_delivery.fetch_add(1, Ordering::Relaxed);
            log::warn!("[Dispatcher] duplicate response dropped (id={id})");
        }
    }

    /// Record that a call's remote side effects have propagated.
    ///
    /// No-op if the call is no longer tracked (already evicted).
    pub fn mark_synchronized(&self, id: CallId) {
        match self.inner.lookup(id) {
            Some(core) => core.mark_synchronized(),
            None => log::trace!("[Dispatcher] sync signal for untracked call (id={id})"),
        }
    }

    /// Decode an inbound wire frame and route it.
    ///
    /// Convenience entry for wire layers that hand frames over verbatim.
    /// Malformed frames are logged anomalies, never errors for a caller.
    pub fn handle_frame(&self, text: &str) {
        match protocol::decode_server_frame(text) {
            Ok(ServerFrame::Result { id, error, result }) => self.deliver(id, error, result),
            Ok(ServerFrame::Updated { methods }) => {
                for id in methods {
                    self.mark_synchronized(id);
                }
            }
            Err(err) => {
                log::warn!(
                    "[Dispatcher] undecodable frame dropped: {err:#} ({})",
                    protocol::preview(text)
                );
            }
        }
    }

    /// Cancel one in-flight call.
    ///
    /// Evicts it from the registry and completes it with
    /// [`CallError::Cancelled`], releasing every suspended waiter. Returns
    /// `false` if the call was unknown or already completed.
    pub fn cancel(&self, id: CallId) -> bool {
        let Some(core) = self.inner.evict(id) else {
            return false;
        };
        let cancelled = core.complete(Err(CallError::Cancelled), true);
        if cancelled {
            log::debug!("[Dispatcher] call cancelled (id={id})");
        }
        cancelled
    }

    /// Cancel every in-flight call.
    ///
    /// For the connection owner's teardown path: after the link dies for
    /// good, nothing may be left waiting forever.
    pub fn shutdown(&self) {
        let drained: Vec<Arc<CallCore>> = {
            let mut calls = self.inner.calls();
            calls.drain().map(|(_, core)| core).collect()
        };
        if !drained.is_empty() {
            log::info!("[Dispatcher] shutdown: cancelling {} in-flight calls", drained.len());
        }
        for core in drained {
            core.complete(Err(CallError::Cancelled), true);
        }
    }

    /// Number of calls currently tracked in the registry.
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.inner.calls().len()
    }

    /// Deliveries that arrived for identifiers not present in the
    /// registry.
    #[must_use]
    pub fn unknown_correlation_count(&self) -> u64 {
        self.inner.unknown_correlation.load(Ordering::Relaxed)
    }

    /// Deliveries that arrived for already-completed calls and were
    /// dropped.
    #[must_use]
    pub fn double_delivery_count(&self) -> u64 {
        self.inner.double_delivery.load(Ordering::Relaxed)
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("pending", &self.pending_count())
            .field("unknown_correlation", &self.unknown_correlation_count())
            .field("double_delivery", &self.double_delivery_count())
            .finish()
    }
}

impl DispatcherInner {
    fn calls(&self) -> std::sync::MutexGuard<'_, HashMap<CallId, Arc<CallCore>>> {
        self.calls.lock().expect("call registry lock poisoned")
    }

    fn register(&self, core: &Arc<CallCore>) {
        self.calls().insert(core.id(), Arc::clone(core));
    }

    fn lookup(&self, id: CallId) -> Option<Arc<CallCore>> {
        self.calls().get(&id).cloned()
    }

    fn evict(&self, id: CallId) -> Option<Arc<CallCore>> {
        self.calls().remove(&id)
    }

    /// Per-call driver: the invocation's execution protocol.
    ///
    /// 1. Wait for the link to be ready or to give up (yielding poll).
    /// 2. Timed out first → complete with `ConnectionTimeout`; nothing is
    ///    ever sent on this branch.
    /// 3. Otherwise hand the serialized frame to the transport exactly
    ///    once.
    /// 4. Wait until the call is completed and synchronized.
    /// 5. Detach: evict the registry entry so no further delivery can
    ///    reach the call.
    async fn drive(&self, core: Arc<CallCore>) {
        let ready = core
            .wait_link_ready(self.status.as_ref(), self.config.poll_interval())
            .await;

        match ready {
            LinkReady::Connected => {
                let frame = protocol::encode_method(core.id(), core.method(), core.args());
                log::trace!(
                    "[Dispatcher] sending '{}' (id={}): {}",
                    core.method(),
                    core.id(),
                    protocol::preview(&frame)
                );
                self.transport.send(frame).await;
            }
            LinkReady::TimedOut => {
                log::debug!(
                    "[Dispatcher] link timed out before '{}' was sent (id={})",
                    core.method(),
                    core.id()
                );
                core.complete(Err(CallError::ConnectionTimeout), true);
            }
            LinkReady::AlreadyTerminal => {
                // Cancelled while waiting for the link; eviction already
                // happened on the cancellation path
            }
        }

        let _ = core.wait_terminal().await;
        self.evict(core.id());
    }
}
