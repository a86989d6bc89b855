//! In-memory transport for tests and loopback wiring.
//!
//! Every `open` is recorded. The caller drives each recorded connection
//! through a [`MemoryStream`], pushing opens, messages and failures exactly
//! as a server would.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use super::{ConnectionHandle, EventSink, EventTransport, SessionId};
use crate::error::TransportError;
use crate::sse::RawMessage;

#[derive(Debug, Default)]
struct MemoryState {
    attempts: Vec<String>,
    streams: Vec<MemoryStream>,
    refuse: Option<String>,
}

/// Scriptable transport that never touches the network.
#[derive(Debug, Clone, Default)]
pub struct MemoryEventTransport {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryEventTransport {
    /// Create a transport that accepts every open.
    pub fn new() -> Self {
        Self::default()
    }

    /// Make subsequent opens fail construction with `reason`.
    pub fn refuse_connections(&self, reason: impl Into<String>) {
        self.state.lock().refuse = Some(reason.into());
    }

    /// Let subsequent opens succeed again.
    pub fn accept_connections(&self) {
        self.state.lock().refuse = None;
    }

    /// Number of `open` calls so far, refused ones included.
    pub fn attempts(&self) -> usize {
        self.state.lock().attempts.len()
    }

    /// URLs passed to `open`, in order.
    pub fn attempted_urls(&self) -> Vec<String> {
        self.state.lock().attempts.clone()
    }

    /// Connections that were constructed, in order.
    pub fn streams(&self) -> Vec<MemoryStream> {
        self.state.lock().streams.clone()
    }

    /// Most recently constructed connection.
    pub fn latest(&self) -> Option<MemoryStream> {
        self.state.lock().streams.last().cloned()
    }

    /// Connections not yet closed.
    pub fn live_count(&self) -> usize {
        self.state
            .lock()
            .streams
            .iter()
            .filter(|stream| !stream.is_closed())
            .count()
    }
}

impl EventTransport for MemoryEventTransport {
    fn open(&self, url: &str, sink: EventSink) -> Result<ConnectionHandle, TransportError> {
        let mut state = self.state.lock();
        state.attempts.push(url.to_string());
        if let Some(reason) = &state.refuse {
            return Err(TransportError::Refused(reason.clone()));
        }

        let stream = MemoryStream {
            url: url.to_string(),
            sink: sink.clone(),
            closed: Arc::new(AtomicBool::new(false)),
        };
        let closed = Arc::clone(&stream.closed);
        state.streams.push(stream);
        Ok(ConnectionHandle::new(sink.session(), move || {
            closed.store(true, Ordering::SeqCst);
        }))
    }

    fn transport_type(&self) -> &'static str {
        "memory"
    }
}

/// Server side of one in-memory connection.
///
/// Sends are delivered even after the connection was closed, which models
/// events already in flight when the consumer tore the connection down.
#[derive(Debug, Clone)]
pub struct MemoryStream {
    url: String,
    sink: EventSink,
    closed: Arc<AtomicBool>,
}

impl MemoryStream {
    /// URL this connection was opened for.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Session the consumer assigned to this connection.
    pub fn session(&self) -> SessionId {
        self.sink.session()
    }

    /// Whether the consumer closed this connection.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Signal that the stream is established.
    pub fn open(&self) {
        self.sink.opened();
    }

    /// Send an unnamed event.
    pub fn send(&self, data: impl Into<String>) {
        self.sink.message(RawMessage::new(data));
    }

    /// Send a named event.
    pub fn send_named(&self, event: impl Into<String>, data: impl Into<String>) {
        self.sink.message(RawMessage::named(event, data));
    }

    /// Fail the connection.
    pub fn fail(&self, reason: impl Into<String>) {
        self.sink.failed(reason);
    }
}
