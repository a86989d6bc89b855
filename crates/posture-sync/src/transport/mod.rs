//! # Event Transport Adapter
//!
//! A transport owns one streaming connection per [`open`](EventTransport::open)
//! call and reports what happens on it through an [`EventSink`]:
//!
//! - `opened`: the stream is established
//! - `message`: one framed event, payload untouched
//! - `failed`: anything went wrong (refused, dropped, ended); no subtypes
//!
//! Every sink is stamped with the [`SessionId`] of the attempt it belongs to.
//! The consumer discards events whose session is no longer active, so once a
//! [`ConnectionHandle`] is closed nothing it produced is ever applied, even
//! events already queued.

use std::fmt;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::error::TransportError;
use crate::sse::RawMessage;

mod http;
mod memory;

pub use http::HttpEventTransport;
pub use memory::{MemoryEventTransport, MemoryStream};

/// Identifier of one connection attempt.
///
/// Minted from a monotonically increasing counter; a later attempt always
/// carries a larger id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionId(u64);

impl SessionId {
    /// Wrap a raw counter value.
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    /// Raw counter value.
    pub const fn value(self) -> u64 {
        self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "session-{}", self.0)
    }
}

/// What happened, as delivered to the consumer loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventKind {
    /// Stream established
    Opened,
    /// One framed event
    Message(RawMessage),
    /// Connection failed or ended
    Failed(String),
    /// Scheduled retry delay elapsed
    RetryDue,
}

/// Event tagged with the session that produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineEvent {
    /// Producing session
    pub session: SessionId,
    /// Payload
    pub kind: EventKind,
}

impl EngineEvent {
    /// Tag `kind` with `session`.
    pub fn new(session: SessionId, kind: EventKind) -> Self {
        Self { session, kind }
    }
}

/// Callback surface handed to a transport for one connection attempt.
#[derive(Debug, Clone)]
pub struct EventSink {
    session: SessionId,
    tx: mpsc::UnboundedSender<EngineEvent>,
}

impl EventSink {
    pub(crate) fn new(session: SessionId, tx: mpsc::UnboundedSender<EngineEvent>) -> Self {
        Self { session, tx }
    }

    /// Session this sink reports for.
    pub fn session(&self) -> SessionId {
        self.session
    }

    /// Report that the stream is established.
    pub fn opened(&self) -> bool {
        self.emit(EventKind::Opened)
    }

    /// Report one framed event.
    pub fn message(&self, message: RawMessage) -> bool {
        self.emit(EventKind::Message(message))
    }

    /// Report a failure. The transport should stop producing afterwards.
    pub fn failed(&self, reason: impl Into<String>) -> bool {
        self.emit(EventKind::Failed(reason.into()))
    }

    /// Returns `false` once the consumer is gone.
    fn emit(&self, kind: EventKind) -> bool {
        self.tx.send(EngineEvent::new(self.session, kind)).is_ok()
    }
}

/// Ownership of one live connection. Closing (or dropping) releases it.
pub struct ConnectionHandle {
    session: SessionId,
    closer: Option<Box<dyn FnOnce() + Send>>,
}

impl ConnectionHandle {
    /// Handle that runs `closer` on close.
    pub fn new(session: SessionId, closer: impl FnOnce() + Send + 'static) -> Self {
        Self {
            session,
            closer: Some(Box::new(closer)),
        }
    }

    /// Handle whose connection is driven by `task`; closing aborts it.
    pub fn from_task(session: SessionId, task: JoinHandle<()>) -> Self {
        Self::new(session, move || task.abort())
    }

    /// Session this connection belongs to.
    pub fn session(&self) -> SessionId {
        self.session
    }

    /// Release the connection.
    pub fn close(mut self) {
        self.release();
    }

    fn release(&mut self) {
        if let Some(closer) = self.closer.take() {
            closer();
        }
    }
}

impl Drop for ConnectionHandle {
    fn drop(&mut self) {
        self.release();
    }
}

impl fmt::Debug for ConnectionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionHandle")
            .field("session", &self.session)
            .field("open", &self.closer.is_some())
            .finish()
    }
}

/// Opens server-push event streams.
pub trait EventTransport: Send + Sync {
    /// Start a connection to `url`, reporting through `sink`.
    ///
    /// An `Err` means the connection object could not even be constructed;
    /// failures after construction are reported through the sink.
    fn open(&self, url: &str, sink: EventSink) -> Result<ConnectionHandle, TransportError>;

    /// Transport type identifier, for logs.
    fn transport_type(&self) -> &'static str;
}

impl<T: EventTransport + ?Sized> EventTransport for std::sync::Arc<T> {
    fn open(&self, url: &str, sink: EventSink) -> Result<ConnectionHandle, TransportError> {
        (**self).open(url, sink)
    }

    fn transport_type(&self) -> &'static str {
        (**self).transport_type()
    }
}
