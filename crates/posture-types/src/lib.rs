//! # Posture Types
//!
//! Data records exchanged between the posture server, the sync engine and
//! whatever renders the dashboard. These types are plain serde data:
//!
//! - [`compliance`]: the compliance checklist view and its stream messages
//! - [`fleet`]: the fleet-of-nodes view and its stream events
//! - [`manifest`] / [`selftest`]: collaborator records produced by the build
//!   pipeline and the self-test run
//! - [`fallback`]: static views derived from those records, shown whenever
//!   live synchronization is off or has not caught up yet
//!
//! Nothing in this crate performs network I/O.

#![forbid(unsafe_code)]

pub mod compliance;
pub mod fallback;
pub mod fleet;
pub mod manifest;
pub mod selftest;

mod timestamp;

pub use compliance::{
    CheckStatus, ComplianceItem, ComplianceMessage, ComplianceSection, ComplianceView,
    StatusCounts, StatusUpdate,
};
pub use fallback::{compliance_fallback, load_compliance_view, load_fleet_view, FallbackError};
pub use fleet::{FleetEvent, FleetEventKind, FleetNode, FleetNodesPayload, FleetSummary, FleetView};
pub use manifest::{BuildManifest, CryptoModule};
pub use selftest::{SelfTestCheck, SelfTestOutcome, SelfTestReport};
pub use timestamp::WireTimestamp;
