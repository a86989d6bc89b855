//! # State Reconciler
//!
//! Pure fold of stream messages into a view. Reconcilers take the current
//! view by value and return the next one; they never see the network, keep no
//! state between calls and are safe to share across stream instances.
//!
//! A [`StreamKind`] binds a payload shape to its reconciliation rule. Two
//! kinds exist:
//!
//! | Kind | View | Snapshot | Incremental |
//! |---|---|---|---|
//! | [`ComplianceStream`] | `ComplianceView` | `type: full` | `type: patch` |
//! | [`FleetStream`] | `FleetView` | `fleet_nodes` | `fleet_event`, `fleet_summary` |

use std::fmt::Debug;

use chrono::{DateTime, Utc};

use crate::error::DecodeError;
use crate::sse::RawMessage;

pub mod compliance;
pub mod fleet;

pub use compliance::{apply_patch, apply_snapshot, ComplianceStream};
pub use fleet::{apply_event, apply_node_list, apply_summary, FleetMessage, FleetStream};

/// How a message changed the view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Applied {
    /// The view was replaced wholesale
    Snapshot,
    /// Targeted updates were folded into the existing view
    Incremental,
}

/// Payload shape and reconciliation rule of one stream instance.
pub trait StreamKind: Send + 'static {
    /// Reconciled state
    type View: Clone + Debug + Default + PartialEq + Send + Sync + 'static;
    /// Decoded message
    type Message: Debug + Send;

    /// Instance name, for logs and errors.
    const NAME: &'static str;

    /// Decode a framed event. Errors mean the message is skipped.
    fn decode(raw: &RawMessage) -> Result<Self::Message, DecodeError>;

    /// Fold one message into the view.
    fn reconcile(view: Self::View, message: Self::Message) -> (Self::View, Applied);

    /// Server emit time carried by the message, if any.
    fn sent_at(_message: &Self::Message) -> Option<DateTime<Utc>> {
        None
    }
}

/// Parse `data` as JSON for `stream`, mapping failures to [`DecodeError`].
pub(crate) fn decode_json<T: serde::de::DeserializeOwned>(
    stream: &'static str,
    data: &str,
) -> Result<T, DecodeError> {
    serde_json::from_str(data).map_err(|source| DecodeError::Malformed { stream, source })
}
