//! # Reconnection Supervisor
//!
//! Wraps an [`EventTransport`] with a fixed-delay retry policy:
//!
//! ```text
//! start() ──► open(session N) ──► ... failed(N) ──► close, schedule retry(N)
//!                                                        │ after retry_delay
//!                                       open(session N+1) ◄┘
//! stop()  ──► cancel retry, close live connection, forget active session
//! ```
//!
//! There is no jitter, no growth and no attempt cap: retries continue until
//! [`stop`](ReconnectSupervisor::stop). Every attempt mints a fresh
//! [`SessionId`]; only events from the active session (and only the retry
//! timer armed for the latest failure) are honoured, so a quick
//! `stop()`/`start()` can never leave two connections delivering or a retry
//! firing after the stop.
//!
//! Retry timers are tokio tasks. Outside a tokio runtime no timer can be
//! armed: the failure is still recorded and
//! [`retry_pending`](ReconnectSupervisor::retry_pending) stays `false`.

use std::time::Duration;

use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::StreamConfig;
use crate::transport::{
    ConnectionHandle, EngineEvent, EventKind, EventSink, EventTransport, SessionId,
};

/// Result of one connection attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttemptOutcome {
    /// Connection constructed; events will follow on this session
    Connecting(SessionId),
    /// Connection could not be constructed; a retry has been scheduled
    Failed {
        /// Session that was minted for the attempt
        session: SessionId,
        /// Construction error
        reason: String,
    },
}

/// Counters for supervisor activity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SupervisorStats {
    /// Connection attempts made
    pub attempts: u64,
    /// Attempts that failed construction
    pub construction_failures: u64,
    /// Failures reported by live connections
    pub connection_failures: u64,
    /// Retries that were armed
    pub retries_scheduled: u64,
}

struct PendingRetry {
    after: SessionId,
    timer: JoinHandle<()>,
}

/// Human-readable status shown while waiting for the next attempt.
pub fn retry_message(delay: Duration) -> String {
    if delay.subsec_millis() == 0 && delay.as_secs() > 0 {
        format!("Connection lost. Retrying in {} seconds...", delay.as_secs())
    } else {
        format!("Connection lost. Retrying in {} ms...", delay.as_millis())
    }
}

/// Owns the live connection and the retry timer for one stream instance.
pub struct ReconnectSupervisor<T> {
    transport: T,
    config: StreamConfig,
    events: mpsc::UnboundedSender<EngineEvent>,
    next_session: u64,
    active: Option<SessionId>,
    live: Option<ConnectionHandle>,
    pending_retry: Option<PendingRetry>,
    running: bool,
    stats: SupervisorStats,
}

impl<T: EventTransport> ReconnectSupervisor<T> {
    /// Create a stopped supervisor delivering into `events`.
    pub fn new(transport: T, config: StreamConfig, events: mpsc::UnboundedSender<EngineEvent>) -> Self {
        Self {
            transport,
            config,
            events,
            next_session: 0,
            active: None,
            live: None,
            pending_retry: None,
            running: false,
            stats: SupervisorStats::default(),
        }
    }

    /// Whether `start` was called without a matching `stop`.
    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Session of the live connection, if any.
    pub fn active_session(&self) -> Option<SessionId> {
        self.active
    }

    /// Whether events from `session` should be applied.
    pub fn is_current(&self, session: SessionId) -> bool {
        self.active == Some(session)
    }

    /// Whether a retry timer is armed.
    pub fn retry_pending(&self) -> bool {
        self.pending_retry.is_some()
    }

    /// Configured retry delay.
    pub fn retry_delay(&self) -> Duration {
        self.config.retry_delay
    }

    /// Stream URL.
    pub fn url(&self) -> &str {
        &self.config.url
    }

    /// Activity counters.
    pub fn stats(&self) -> SupervisorStats {
        self.stats
    }

    /// Begin the attempt loop, replacing any previous run.
    pub fn start(&mut self) -> AttemptOutcome {
        self.halt();
        self.running = true;
        info!(url = %self.config.url, transport = self.transport.transport_type(), "Starting stream supervisor");
        self.connect()
    }

    /// Cancel the pending retry and close the live connection. Idempotent.
    pub fn stop(&mut self) {
        if !self.running && self.active.is_none() && self.pending_retry.is_none() {
            return;
        }
        self.running = false;
        self.halt();
        info!(url = %self.config.url, "Stopped stream supervisor");
    }

    /// Handle a failure reported by `session`.
    ///
    /// Returns `false` when the session is stale and the report was ignored.
    pub fn on_failure(&mut self, session: SessionId, reason: &str) -> bool {
        if !self.running || !self.is_current(session) {
            debug!(%session, reason, "Ignoring failure from superseded session");
            return false;
        }
        self.stats.connection_failures += 1;
        warn!(
            url = %self.config.url,
            %session,
            reason,
            retry_in_ms = self.config.retry_delay.as_millis() as u64,
            "Stream connection failed, will retry"
        );
        self.release_connection();
        self.schedule_retry(session);
        true
    }

    /// Handle a retry timer firing for the failure of `session`.
    ///
    /// Returns `None` when the timer was superseded or the supervisor stopped.
    pub fn on_retry_due(&mut self, session: SessionId) -> Option<AttemptOutcome> {
        if !self.running {
            return None;
        }
        match &self.pending_retry {
            Some(pending) if pending.after == session => {
                self.pending_retry = None;
                debug!(url = %self.config.url, after = %session, "Retry delay elapsed");
                Some(self.connect())
            }
            _ => {
                debug!(%session, "Ignoring superseded retry timer");
                None
            }
        }
    }

    fn connect(&mut self) -> AttemptOutcome {
        // At most one live connection per stream.
        self.release_connection();

        self.next_session += 1;
        let session = SessionId::new(self.next_session);
        self.active = Some(session);
        self.stats.attempts += 1;

        let sink = EventSink::new(session, self.events.clone());
        match self.transport.open(&self.config.url, sink) {
            Ok(handle) => {
                debug!(url = %self.config.url, %session, "Opened stream connection");
                self.live = Some(handle);
                AttemptOutcome::Connecting(session)
            }
            Err(e) => {
                self.stats.construction_failures += 1;
                warn!(url = %self.config.url, %session, error = %e, "Could not construct stream connection, will retry");
                self.active = None;
                self.schedule_retry(session);
                AttemptOutcome::Failed {
                    session,
                    reason: e.to_string(),
                }
            }
        }
    }

    fn schedule_retry(&mut self, after: SessionId) {
        self.cancel_retry();
        let runtime = match Handle::try_current() {
            Ok(runtime) => runtime,
            Err(_) => {
                warn!(url = %self.config.url, after = %after, "No async runtime, retry not scheduled");
                return;
            }
        };
        let delay = self.config.retry_delay;
        let events = self.events.clone();
        let timer = runtime.spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = events.send(EngineEvent::new(after, EventKind::RetryDue));
        });
        self.stats.retries_scheduled += 1;
        self.pending_retry = Some(PendingRetry { after, timer });
    }

    fn cancel_retry(&mut self) {
        if let Some(pending) = self.pending_retry.take() {
            pending.timer.abort();
        }
    }

    fn release_connection(&mut self) {
        self.active = None;
        if let Some(handle) = self.live.take() {
            handle.close();
        }
    }

    fn halt(&mut self) {
        self.cancel_retry();
        self.release_connection();
    }
}

impl<T> Drop for ReconnectSupervisor<T> {
    fn drop(&mut self) {
        if let Some(pending) = self.pending_retry.take() {
            pending.timer.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::MemoryEventTransport;

    fn supervisor(
        transport: &MemoryEventTransport,
    ) -> (
        ReconnectSupervisor<MemoryEventTransport>,
        mpsc::UnboundedReceiver<EngineEvent>,
    ) {
        let (tx, rx) = mpsc::unbounded_channel();
        let config = StreamConfig::new("mem://stream").with_retry_delay(Duration::from_secs(5));
        (ReconnectSupervisor::new(transport.clone(), config, tx), rx)
    }

    #[test]
    fn retry_message_is_human_readable() {
        assert_eq!(
            retry_message(Duration::from_secs(5)),
            "Connection lost. Retrying in 5 seconds..."
        );
        assert_eq!(
            retry_message(Duration::from_millis(250)),
            "Connection lost. Retrying in 250 ms..."
        );
    }

    #[tokio::test(start_paused = true)]
    async fn start_mints_increasing_sessions() {
        let transport = MemoryEventTransport::new();
        let (mut sup, _rx) = supervisor(&transport);

        let first = sup.start();
        let second = sup.start();
        let (AttemptOutcome::Connecting(a), AttemptOutcome::Connecting(b)) = (first, second) else {
            panic!("expected both attempts to construct");
        };
        assert!(b > a);
        assert!(!sup.is_current(a));
        assert!(sup.is_current(b));
        assert_eq!(transport.live_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn failure_schedules_exactly_one_retry() {
        let transport = MemoryEventTransport::new();
        let (mut sup, mut rx) = supervisor(&transport);

        let AttemptOutcome::Connecting(session) = sup.start() else {
            panic!("expected connection");
        };
        assert!(sup.on_failure(session, "dropped"));
        assert!(!sup.on_failure(session, "dropped again"));
        assert_eq!(transport.live_count(), 0);
        assert!(sup.retry_pending());

        tokio::time::sleep(Duration::from_secs(5)).await;
        let due = rx.recv().await.unwrap();
        assert_eq!(due, EngineEvent::new(session, EventKind::RetryDue));

        let outcome = sup.on_retry_due(due.session).unwrap();
        assert!(matches!(outcome, AttemptOutcome::Connecting(_)));
        assert_eq!(transport.attempts(), 2);
        assert!(sup.on_retry_due(due.session).is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn stop_cancels_pending_retry() {
        let transport = MemoryEventTransport::new();
        let (mut sup, mut rx) = supervisor(&transport);

        let AttemptOutcome::Connecting(session) = sup.start() else {
            panic!("expected connection");
        };
        sup.on_failure(session, "dropped");
        sup.stop();
        sup.stop();

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert!(rx.try_recv().is_err());
        assert!(sup.on_retry_due(session).is_none());
        assert_eq!(transport.attempts(), 1);
    }

    #[test]
    fn failure_outside_a_runtime_arms_no_timer() {
        let transport = MemoryEventTransport::new();
        let (mut sup, _rx) = supervisor(&transport);

        let AttemptOutcome::Connecting(session) = sup.start() else {
            panic!("expected connection");
        };
        assert!(sup.on_failure(session, "dropped"));
        assert!(!sup.retry_pending());
        assert_eq!(sup.stats().retries_scheduled, 0);
        sup.stop();
    }

    #[tokio::test(start_paused = true)]
    async fn construction_failure_is_retried() {
        let transport = MemoryEventTransport::new();
        transport.refuse_connections("no route");
        let (mut sup, mut rx) = supervisor(&transport);

        let outcome = sup.start();
        let AttemptOutcome::Failed { session, reason } = outcome else {
            panic!("expected construction failure");
        };
        assert!(reason.contains("no route"));
        assert!(sup.active_session().is_none());

        transport.accept_connections();
        tokio::time::sleep(Duration::from_secs(5)).await;
        let due = rx.recv().await.unwrap();
        assert_eq!(due.session, session);
        assert!(matches!(sup.on_retry_due(session), Some(AttemptOutcome::Connecting(_))));
        assert_eq!(sup.stats().construction_failures, 1);
        assert_eq!(sup.stats().attempts, 2);
    }
}
