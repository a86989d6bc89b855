//! # Synchronized View
//!
//! Composes a [`ReconnectSupervisor`] with a [`StreamKind`]'s reconciler and
//! decides what the caller sees:
//!
//! | enabled | snapshot seen | data | connection status | phase |
//! |---|---|---|---|---|
//! | false | - | fallback | `{false, null, null}` | `Idle` |
//! | true | no | fallback | live | `Syncing` |
//! | true | yes | reconciled view | live | `Syncing` / `Synchronized` |
//!
//! Disabling tears the connection down before returning and resets the live
//! state, so the next enable starts from the fallback again.
//!
//! Incremental messages that arrive before the first snapshot of an enabled
//! period are folded into a working copy seeded from the fallback. They become
//! visible only once a snapshot lands, which replaces them anyway; nothing
//! guarantees that such early patches are meaningful.
//!
//! The view is owned by exactly one consumer. Events are pulled from the
//! channel with [`next_event`](SynchronizedView::next_event) and applied with
//! [`handle`](SynchronizedView::handle); nothing else mutates the view.

use std::marker::PhantomData;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{debug, info, trace};

use crate::config::StreamConfig;
use crate::reconcile::{Applied, ComplianceStream, FleetStream, StreamKind};
use crate::supervisor::{retry_message, AttemptOutcome, ReconnectSupervisor, SupervisorStats};
use crate::transport::{EngineEvent, EventKind, EventTransport};

/// Source of `last_update` timestamps.
pub trait Clock: Send + Sync {
    /// Current time.
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Externally visible connection state.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionStatus {
    /// Stream is established
    pub connected: bool,
    /// Time the last well-formed message was applied
    pub last_update: Option<DateTime<Utc>>,
    /// Human-readable failure, while waiting to retry
    pub error: Option<String>,
}

/// Where the view is in its lifecycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncPhase {
    /// Disabled; showing fallback
    #[default]
    Idle,
    /// Enabled, waiting for a snapshot on the current connection
    Syncing,
    /// A snapshot arrived on the current connection
    Synchronized,
}

/// What a consumer renders.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncOutput<V> {
    /// Fallback or reconciled data
    pub data: V,
    /// Connection state
    pub connection_status: ConnectionStatus,
    /// Lifecycle phase
    pub phase: SyncPhase,
}

/// One stream instance: connection, reconciler and observable state.
pub struct SynchronizedView<K: StreamKind, T> {
    supervisor: ReconnectSupervisor<T>,
    events: mpsc::UnboundedReceiver<EngineEvent>,
    fallback: K::View,
    working: K::View,
    snapshot_seen: bool,
    status: ConnectionStatus,
    phase: SyncPhase,
    enabled: bool,
    dropped_messages: u64,
    clock: Arc<dyn Clock>,
    _kind: PhantomData<K>,
}

/// Compliance checklist view.
pub type ComplianceSyncView<T> = SynchronizedView<ComplianceStream, T>;

/// Fleet node view.
pub type FleetSyncView<T> = SynchronizedView<FleetStream, T>;

impl<K: StreamKind, T: EventTransport> SynchronizedView<K, T> {
    /// Create a disabled view over `transport`.
    pub fn new(transport: T, config: StreamConfig, fallback: K::View) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            supervisor: ReconnectSupervisor::new(transport, config, tx),
            events: rx,
            working: fallback.clone(),
            fallback,
            snapshot_seen: false,
            status: ConnectionStatus::default(),
            phase: SyncPhase::Idle,
            enabled: false,
            dropped_messages: 0,
            clock: Arc::new(SystemClock),
            _kind: PhantomData,
        }
    }

    /// Use `clock` for `last_update` stamps.
    pub fn with_clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Arc::new(clock);
        self
    }

    /// Whether the stream is enabled.
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Messages skipped because they could not be decoded.
    pub fn dropped_messages(&self) -> u64 {
        self.dropped_messages
    }

    /// Supervisor counters.
    pub fn supervisor_stats(&self) -> SupervisorStats {
        self.supervisor.stats()
    }

    /// Apply an enable flag. Only edges have an effect.
    ///
    /// Outside a tokio runtime the HTTP transport cannot be driven and no
    /// retry can be armed; the failure is reported in the status instead.
    pub fn set_enabled(&mut self, enabled: bool) {
        if enabled == self.enabled {
            return;
        }
        self.enabled = enabled;
        if enabled {
            info!(stream = K::NAME, url = self.supervisor.url(), "Enabling live stream");
            self.phase = SyncPhase::Syncing;
            let outcome = self.supervisor.start();
            self.note_attempt(outcome);
        } else {
            info!(stream = K::NAME, "Disabling live stream");
            self.supervisor.stop();
            self.reset_live_state();
        }
    }

    /// Apply one event. Returns `true` when the output may have changed.
    pub fn handle(&mut self, event: EngineEvent) -> bool {
        let EngineEvent { session, kind } = event;
        match kind {
            EventKind::RetryDue => match self.supervisor.on_retry_due(session) {
                Some(outcome) => {
                    self.note_attempt(outcome);
                    true
                }
                None => false,
            },
            _ if !self.enabled || !self.supervisor.is_current(session) => {
                debug!(stream = K::NAME, %session, "Discarding event from superseded session");
                false
            }
            EventKind::Opened => {
                debug!(stream = K::NAME, %session, "Stream connected");
                self.status.connected = true;
                self.status.error = None;
                true
            }
            EventKind::Failed(reason) => {
                if !self.supervisor.on_failure(session, &reason) {
                    return false;
                }
                self.mark_failed(&reason);
                true
            }
            EventKind::Message(raw) => match K::decode(&raw) {
                Ok(message) => {
                    if !self.status.connected {
                        // Delivery on the current session proves the stream is up.
                        debug!(stream = K::NAME, %session, "Message before open, marking connected");
                        self.status.connected = true;
                        self.status.error = None;
                    }
                    if let Some(sent_at) = K::sent_at(&message) {
                        let lag_ms = (self.clock.now() - sent_at).num_milliseconds();
                        trace!(stream = K::NAME, %session, lag_ms, "Message timestamp");
                    }
                    let view = std::mem::take(&mut self.working);
                    let (view, applied) = K::reconcile(view, message);
                    self.working = view;
                    if applied == Applied::Snapshot {
                        self.snapshot_seen = true;
                        self.phase = SyncPhase::Synchronized;
                    }
                    self.touch();
                    true
                }
                Err(e) => {
                    self.dropped_messages += 1;
                    debug!(stream = K::NAME, %session, error = %e, "Dropping malformed message");
                    false
                }
            },
        }
    }

    /// Current output, per the enable/snapshot table.
    pub fn output(&self) -> SyncOutput<K::View> {
        if !self.enabled {
            return SyncOutput {
                data: self.fallback.clone(),
                connection_status: ConnectionStatus::default(),
                phase: SyncPhase::Idle,
            };
        }
        let data = if self.snapshot_seen {
            self.working.clone()
        } else {
            self.fallback.clone()
        };
        SyncOutput {
            data,
            connection_status: self.status.clone(),
            phase: self.phase,
        }
    }

    /// Current connection status.
    pub fn connection_status(&self) -> ConnectionStatus {
        if self.enabled {
            self.status.clone()
        } else {
            ConnectionStatus::default()
        }
    }

    /// Current phase.
    pub fn phase(&self) -> SyncPhase {
        self.phase
    }

    /// Wait for the next event.
    ///
    /// Never resolves to `None` while the view is alive: the supervisor keeps
    /// a sender.
    pub async fn next_event(&mut self) -> Option<EngineEvent> {
        self.events.recv().await
    }

    /// Wait for and apply one event.
    pub async fn process_next(&mut self) -> bool {
        match self.next_event().await {
            Some(event) => self.handle(event),
            None => false,
        }
    }

    /// Apply every event already queued. Returns how many changed the output.
    pub fn try_process_pending(&mut self) -> usize {
        let mut changed = 0;
        while let Ok(event) = self.events.try_recv() {
            if self.handle(event) {
                changed += 1;
            }
        }
        changed
    }

    fn note_attempt(&mut self, outcome: AttemptOutcome) {
        match outcome {
            AttemptOutcome::Connecting(session) => {
                debug!(stream = K::NAME, %session, "Connection attempt started");
                // Stale data stays visible but is no longer known current.
                self.phase = SyncPhase::Syncing;
            }
            AttemptOutcome::Failed { reason, .. } => self.mark_failed(&reason),
        }
    }

    fn mark_failed(&mut self, reason: &str) {
        self.status.connected = false;
        self.status.error = Some(if self.supervisor.retry_pending() {
            retry_message(self.supervisor.retry_delay())
        } else {
            format!("Connection failed: {reason}")
        });
        self.phase = SyncPhase::Syncing;
    }

    fn touch(&mut self) {
        if !self.status.connected {
            return;
        }
        let now = self.clock.now();
        self.status.last_update = Some(match self.status.last_update {
            Some(previous) if previous > now => previous,
            _ => now,
        });
    }

    fn reset_live_state(&mut self) {
        self.working = self.fallback.clone();
        self.snapshot_seen = false;
        self.status = ConnectionStatus::default();
        self.phase = SyncPhase::Idle;
    }
}

impl<K: StreamKind, T> std::fmt::Debug for SynchronizedView<K, T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SynchronizedView")
            .field("stream", &K::NAME)
            .field("enabled", &self.enabled)
            .field("phase", &self.phase)
            .field("status", &self.status)
            .field("snapshot_seen", &self.snapshot_seen)
            .finish()
    }
}
