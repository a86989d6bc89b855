//! Compliance checklist reconciliation.

use chrono::{DateTime, Utc};
use posture_types::{ComplianceMessage, ComplianceSection, ComplianceView, StatusUpdate};

use super::{decode_json, Applied, StreamKind};
use crate::error::DecodeError;
use crate::sse::{RawMessage, DEFAULT_EVENT};

/// Replace the view with the snapshot's sections.
///
/// Nothing from the previous view survives.
pub fn apply_snapshot(_view: ComplianceView, sections: Vec<ComplianceSection>) -> ComplianceView {
    ComplianceView::new(sections)
}

/// Apply status updates to items that already exist.
///
/// Updates whose `(section id, item id)` is not in the view are ignored;
/// items and sections no update mentions are left untouched.
pub fn apply_patch(mut view: ComplianceView, updates: &[StatusUpdate]) -> ComplianceView {
    for update in updates {
        let target = view
            .sections_mut()
            .iter_mut()
            .find(|section| section.id == update.section_id)
            .and_then(|section| {
                section
                    .items
                    .iter_mut()
                    .find(|item| item.id == update.item_id)
            });
        if let Some(item) = target {
            item.status = update.status;
        }
    }
    view
}

/// Compliance checklist stream.
#[derive(Debug, Clone, Copy, Default)]
pub struct ComplianceStream;

impl StreamKind for ComplianceStream {
    type View = ComplianceView;
    type Message = ComplianceMessage;

    const NAME: &'static str = "compliance";

    fn decode(raw: &RawMessage) -> Result<Self::Message, DecodeError> {
        if raw.event_name() != DEFAULT_EVENT {
            return Err(DecodeError::UnexpectedEvent {
                stream: Self::NAME,
                event: raw.event_name().to_string(),
            });
        }
        decode_json(Self::NAME, &raw.data)
    }

    fn reconcile(view: Self::View, message: Self::Message) -> (Self::View, Applied) {
        match message {
            ComplianceMessage::Full { sections, .. } => {
                (apply_snapshot(view, sections), Applied::Snapshot)
            }
            ComplianceMessage::Patch { updates, .. } => {
                (apply_patch(view, &updates), Applied::Incremental)
            }
        }
    }

    fn sent_at(message: &Self::Message) -> Option<DateTime<Utc>> {
        message.sent_at()
    }
}
