//! # Posture Sync
//!
//! Keeps a client-side view of compliance and fleet state consistent with a
//! server that pushes updates over long-lived event streams.
//!
//! ## Layers
//!
//! - [`transport`]: one streaming connection per attempt; reports open,
//!   message and failure events tagged with a session id
//! - [`supervisor`]: fixed-delay retry loop around a transport; owns the
//!   session counter that makes superseded events inert
//! - [`reconcile`]: pure functions folding snapshot and incremental messages
//!   into a view
//! - [`view`]: enable flag, fallback data and connection status on top of the
//!   above
//! - [`driver`]: runs a view on its own task and publishes outputs as a signal
//!
//! ## Failure model
//!
//! Nothing here is fatal. Transport and construction failures become a retry
//! plus a status string; malformed messages are dropped without touching the
//! view or the status.
//!
//! ## Example
//!
//! ```rust,no_run
//! use posture_sync::{spawn_synchronized_view, ComplianceSyncView, HttpEventTransport, SyncConfig};
//! use posture_types::ComplianceView;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let config = SyncConfig::default();
//! let transport = HttpEventTransport::new(config.connect_timeout())?;
//! let view = ComplianceSyncView::new(transport, config.compliance_stream(), ComplianceView::default());
//! let handle = spawn_synchronized_view(view);
//! handle.set_enabled(true);
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]

pub mod config;
pub mod driver;
pub mod error;
pub mod reconcile;
pub mod sse;
pub mod supervisor;
pub mod transport;
pub mod view;

pub use config::{StreamConfig, SyncConfig, DEFAULT_RETRY_DELAY};
pub use driver::{spawn_synchronized_view, SyncHandle};
pub use error::{ConfigError, DecodeError, TransportError};
pub use reconcile::{Applied, ComplianceStream, FleetMessage, FleetStream, StreamKind};
pub use sse::{RawMessage, SseParser};
pub use supervisor::{retry_message, AttemptOutcome, ReconnectSupervisor, SupervisorStats};
pub use transport::{
    ConnectionHandle, EngineEvent, EventKind, EventSink, EventTransport, HttpEventTransport,
    MemoryEventTransport, MemoryStream, SessionId,
};
pub use view::{
    Clock, ComplianceSyncView, ConnectionStatus, FleetSyncView, SyncOutput, SyncPhase,
    SynchronizedView, SystemClock,
};
