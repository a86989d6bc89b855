//! Fleet view reconciliation.

use posture_types::{FleetEvent, FleetEventKind, FleetNode, FleetNodesPayload, FleetSummary, FleetView};
use tracing::trace;

use super::{decode_json, Applied, StreamKind};
use crate::error::DecodeError;
use crate::sse::RawMessage;

/// Event name carrying the complete node list.
pub const NODES_EVENT: &str = "fleet_nodes";
/// Event name carrying the summary aggregate.
pub const SUMMARY_EVENT: &str = "fleet_summary";
/// Event name carrying a single-node change.
pub const NODE_EVENT: &str = "fleet_event";

/// Decoded fleet stream message.
#[derive(Debug, Clone, PartialEq)]
pub enum FleetMessage {
    /// Complete node list
    Nodes(Vec<FleetNode>),
    /// Summary aggregate
    Summary(FleetSummary),
    /// Single-node change
    Event(FleetEvent),
}

/// Replace the node set with `nodes`, keeping the summary.
pub fn apply_node_list(view: FleetView, nodes: Vec<FleetNode>) -> FleetView {
    let summary = view.summary().cloned();
    let next = FleetView::from_nodes(nodes);
    match summary {
        Some(summary) => next.with_summary(summary),
        None => next,
    }
}

/// Replace the summary, keeping the nodes.
pub fn apply_summary(mut view: FleetView, summary: FleetSummary) -> FleetView {
    view.set_summary(Some(summary));
    view
}

/// Fold a single-node change into the view.
///
/// - join inserts, or replaces in place when the id is already present
/// - update replaces an existing record and ignores unknown ids
/// - remove drops the id if present
pub fn apply_event(mut view: FleetView, event: FleetEvent) -> FleetView {
    match event.kind {
        FleetEventKind::NodeJoined => view.upsert_node(event.node),
        FleetEventKind::NodeUpdated => {
            let id = event.node.id.clone();
            if !view.replace_node(event.node) {
                trace!(node = %id, "Update for unknown node ignored");
            }
        }
        FleetEventKind::NodeRemoved => {
            view.remove_node(&event.node.id);
        }
    }
    view
}

/// Fleet node stream.
#[derive(Debug, Clone, Copy, Default)]
pub struct FleetStream;

impl StreamKind for FleetStream {
    type View = FleetView;
    type Message = FleetMessage;

    const NAME: &'static str = "fleet";

    fn decode(raw: &RawMessage) -> Result<Self::Message, DecodeError> {
        match raw.event_name() {
            NODES_EVENT => decode_json::<FleetNodesPayload>(Self::NAME, &raw.data)
                .map(|payload| FleetMessage::Nodes(payload.into_nodes())),
            SUMMARY_EVENT => decode_json(Self::NAME, &raw.data).map(FleetMessage::Summary),
            NODE_EVENT => decode_json(Self::NAME, &raw.data).map(FleetMessage::Event),
            other => Err(DecodeError::UnexpectedEvent {
                stream: Self::NAME,
                event: other.to_string(),
            }),
        }
    }

    fn reconcile(view: Self::View, message: Self::Message) -> (Self::View, Applied) {
        match message {
            FleetMessage::Nodes(nodes) => (apply_node_list(view, nodes), Applied::Snapshot),
            FleetMessage::Summary(summary) => (apply_summary(view, summary), Applied::Incremental),
            FleetMessage::Event(event) => (apply_event(view, event), Applied::Incremental),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::Value;

    fn fleet(ids: &[&str]) -> FleetView {
        FleetView::from_nodes(ids.iter().copied().map(FleetNode::new))
    }

    #[test]
    fn node_list_then_removal() {
        let view = apply_node_list(FleetView::default(), ["a", "b", "c"].map(FleetNode::new).to_vec());
        let view = apply_event(view, FleetEvent::new(FleetEventKind::NodeRemoved, FleetNode::new("b")));
        assert_eq!(view.node_ids(), vec!["a", "c"]);
    }

    #[test]
    fn join_on_existing_id_replaces_in_place() {
        let view = fleet(&["a", "b"]);
        let view = apply_event(
            view,
            FleetEvent::new(
                FleetEventKind::NodeJoined,
                FleetNode::new("a").with_attribute("version", "3.0"),
            ),
        );
        assert_eq!(view.node_ids(), vec!["a", "b"]);
        assert_eq!(view.node("a").unwrap().attribute("version"), Some(&Value::from("3.0")));
    }

    #[test]
    fn update_for_unknown_node_is_ignored() {
        let before = fleet(&["a"]);
        let after = apply_event(
            before.clone(),
            FleetEvent::new(FleetEventKind::NodeUpdated, FleetNode::new("ghost")),
        );
        assert_eq!(after, before);
    }

    #[test]
    fn events_after_removal_are_no_ops() {
        let removed = apply_event(
            fleet(&["a", "b", "c"]),
            FleetEvent::new(FleetEventKind::NodeRemoved, FleetNode::new("b")),
        );

        let updated = apply_event(
            removed.clone(),
            FleetEvent::new(
                FleetEventKind::NodeUpdated,
                FleetNode::new("b").with_attribute("version", "9.9"),
            ),
        );
        assert_eq!(updated, removed);

        let removed_again = apply_event(
            updated,
            FleetEvent::new(FleetEventKind::NodeRemoved, FleetNode::new("b")),
        );
        assert_eq!(removed_again, removed);
        assert_eq!(removed_again.node_ids(), vec!["a", "c"]);
    }

    #[test]
    fn join_after_removal_reinserts_once() {
        let removed = apply_event(
            fleet(&["a", "b", "c"]),
            FleetEvent::new(FleetEventKind::NodeRemoved, FleetNode::new("b")),
        );
        let rejoined = apply_event(
            removed,
            FleetEvent::new(FleetEventKind::NodeJoined, FleetNode::new("b")),
        );
        assert_eq!(rejoined.node_count(), 3);
        assert_eq!(rejoined.node_ids().iter().filter(|id| **id == "b").count(), 1);
        assert!(rejoined.contains("b"));
    }

    #[test]
    fn node_list_keeps_summary_and_summary_keeps_nodes() {
        let summary = FleetSummary {
            total: 2,
            ..FleetSummary::default()
        };
        let view = apply_summary(fleet(&["a", "b"]), summary.clone());
        assert_eq!(view.node_count(), 2);

        let view = apply_node_list(view, vec![FleetNode::new("z")]);
        assert_eq!(view.node_ids(), vec!["z"]);
        assert_eq!(view.summary(), Some(&summary));
    }

    #[test]
    fn decode_dispatches_on_event_name() {
        let nodes = RawMessage::named(NODES_EVENT, r#"{"nodes":[{"id":"a"}]}"#);
        assert_eq!(
            FleetStream::decode(&nodes).unwrap(),
            FleetMessage::Nodes(vec![FleetNode::new("a")])
        );

        let summary = RawMessage::named(SUMMARY_EVENT, r#"{"total":1}"#);
        assert!(matches!(FleetStream::decode(&summary), Ok(FleetMessage::Summary(_))));

        let event = RawMessage::named(NODE_EVENT, r#"{"type":"node_joined","node":{"id":"a"}}"#);
        assert!(matches!(FleetStream::decode(&event), Ok(FleetMessage::Event(_))));

        let unnamed = RawMessage::new(r#"[{"id":"a"}]"#);
        assert!(matches!(
            FleetStream::decode(&unnamed),
            Err(DecodeError::UnexpectedEvent { .. })
        ));

        let garbage = RawMessage::named(NODE_EVENT, "{not json");
        assert!(matches!(FleetStream::decode(&garbage), Err(DecodeError::Malformed { .. })));
    }

    fn arb_event() -> impl Strategy<Value = FleetEvent> {
        let kind = prop_oneof![
            Just(FleetEventKind::NodeJoined),
            Just(FleetEventKind::NodeUpdated),
            Just(FleetEventKind::NodeRemoved),
        ];
        (kind, 0u8..6, 0u32..100).prop_map(|(kind, id, version)| {
            FleetEvent::new(kind, FleetNode::new(format!("n{id}")).with_attribute("rev", version))
        })
    }

    proptest! {
        #[test]
        fn ids_stay_unique(events in prop::collection::vec(arb_event(), 0..40)) {
            let view = events.into_iter().fold(FleetView::default(), apply_event);
            let mut ids = view.node_ids();
            let count = ids.len();
            ids.sort_unstable();
            ids.dedup();
            prop_assert_eq!(ids.len(), count);
        }

        #[test]
        fn removal_never_leaves_the_id(ids in prop::collection::vec(0u8..6, 0..8), victim in 0u8..6) {
            let nodes: Vec<FleetNode> = ids.iter().map(|id| FleetNode::new(format!("n{id}"))).collect();
            let view = apply_node_list(FleetView::default(), nodes);
            let victim = format!("n{victim}");
            let before = view.node_count();
            let had = view.contains(&victim);

            let view = apply_event(view, FleetEvent::new(FleetEventKind::NodeRemoved, FleetNode::new(victim.clone())));
            prop_assert!(!view.contains(&victim));
            prop_assert_eq!(view.node_count(), before - usize::from(had));

            // Nothing but a join brings it back.
            let after = [FleetEventKind::NodeUpdated, FleetEventKind::NodeRemoved]
                .into_iter()
                .fold(view.clone(), |acc, kind| {
                    apply_event(acc, FleetEvent::new(kind, FleetNode::new(victim.clone())))
                });
            prop_assert_eq!(after, view);
        }
    }
}
