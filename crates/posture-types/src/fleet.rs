//! # Fleet View
//!
//! Set-like mapping from node id to the latest record for that node, plus an
//! optional summary aggregate that the server maintains separately.
//!
//! The fleet stream uses named event categories rather than a `type` tag on
//! a single message shape:
//!
//! - `fleet_nodes`: complete node list
//! - `fleet_summary`: summary aggregate
//! - `fleet_event`: `{"type":"node_joined"|"node_updated"|"node_removed","node":{...}}`

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One node in the fleet.
///
/// Only `id` is interpreted; every other attribute is carried verbatim.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FleetNode {
    /// Node identifier
    pub id: String,
    /// Remaining attributes (hostname, version, fips mode, ...)
    #[serde(flatten)]
    pub attributes: Map<String, Value>,
}

impl FleetNode {
    /// Create a node with no attributes.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            attributes: Map::new(),
        }
    }

    /// Attach an attribute.
    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    /// Read an attribute.
    pub fn attribute(&self, key: &str) -> Option<&Value> {
        self.attributes.get(key)
    }
}

/// Fleet-wide aggregate.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FleetSummary {
    /// Nodes known to the server
    #[serde(default)]
    pub total: u64,
    /// Nodes currently reachable
    #[serde(default)]
    pub online: u64,
    /// Nodes reporting a passing compliance verdict
    #[serde(default)]
    pub compliant: u64,
    /// Anything else the server reports
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Change kind carried by a `fleet_event`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FleetEventKind {
    /// Node appeared
    NodeJoined,
    /// Node record changed
    NodeUpdated,
    /// Node left
    NodeRemoved,
}

/// Single-node change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FleetEvent {
    /// What happened
    #[serde(rename = "type")]
    pub kind: FleetEventKind,
    /// Full record for joins/updates; at least the id for removals
    pub node: FleetNode,
}

impl FleetEvent {
    /// Create an event.
    pub fn new(kind: FleetEventKind, node: FleetNode) -> Self {
        Self { kind, node }
    }
}

/// Body of a `fleet_nodes` event.
///
/// Servers send either the bare list or an object wrapping it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FleetNodesPayload {
    /// `[{...}, ...]`
    List(Vec<FleetNode>),
    /// `{"nodes": [{...}, ...]}`
    Wrapped {
        /// Node list
        nodes: Vec<FleetNode>,
    },
}

impl FleetNodesPayload {
    /// Node list regardless of envelope.
    pub fn into_nodes(self) -> Vec<FleetNode> {
        match self {
            Self::List(nodes) | Self::Wrapped { nodes } => nodes,
        }
    }
}

/// Nodes keyed by id, plus the summary aggregate.
///
/// Iteration follows arrival order so removals keep the remaining nodes in
/// place. Equality includes that order, so a reordering snapshot counts as a
/// change.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FleetView {
    #[serde(default)]
    nodes: IndexMap<String, FleetNode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    summary: Option<FleetSummary>,
}

impl PartialEq for FleetView {
    fn eq(&self, other: &Self) -> bool {
        self.summary == other.summary && self.nodes.iter().eq(other.nodes.iter())
    }
}

impl FleetView {
    /// Build a view from a node list. Later duplicates replace earlier ones.
    pub fn from_nodes(nodes: impl IntoIterator<Item = FleetNode>) -> Self {
        Self {
            nodes: nodes.into_iter().map(|node| (node.id.clone(), node)).collect(),
            summary: None,
        }
    }

    /// Attach a summary.
    pub fn with_summary(mut self, summary: FleetSummary) -> Self {
        self.summary = Some(summary);
        self
    }

    /// Look up a node by id.
    pub fn node(&self, id: &str) -> Option<&FleetNode> {
        self.nodes.get(id)
    }

    /// Check whether a node is present.
    pub fn contains(&self, id: &str) -> bool {
        self.nodes.contains_key(id)
    }

    /// Nodes in arrival order.
    pub fn nodes(&self) -> impl Iterator<Item = &FleetNode> {
        self.nodes.values()
    }

    /// Node ids in arrival order.
    pub fn node_ids(&self) -> Vec<&str> {
        self.nodes.keys().map(String::as_str).collect()
    }

    /// Number of nodes.
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Summary aggregate, if the server sent one.
    pub fn summary(&self) -> Option<&FleetSummary> {
        self.summary.as_ref()
    }

    /// Replace the summary.
    pub fn set_summary(&mut self, summary: Option<FleetSummary>) {
        self.summary = summary;
    }

    /// Replace the record for an existing node in place.
    ///
    /// Returns `false` without inserting when the id is unknown.
    pub fn replace_node(&mut self, node: FleetNode) -> bool {
        match self.nodes.get_mut(&node.id) {
            Some(existing) => {
                *existing = node;
                true
            }
            None => false,
        }
    }

    /// Insert a node at the end, or replace it in place when already present.
    pub fn upsert_node(&mut self, node: FleetNode) {
        self.nodes.insert(node.id.clone(), node);
    }

    /// Remove a node, keeping the order of the rest.
    pub fn remove_node(&mut self, id: &str) -> Option<FleetNode> {
        self.nodes.shift_remove(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn node_keeps_unknown_attributes() {
        let raw = r#"{"id":"edge-1","hostname":"edge-1.lan","fipsMode":true}"#;
        let node: FleetNode = serde_json::from_str(raw).unwrap();
        assert_eq!(node.id, "edge-1");
        assert_eq!(node.attribute("hostname"), Some(&Value::from("edge-1.lan")));
        assert_eq!(node.attribute("fipsMode"), Some(&Value::from(true)));
    }

    #[test]
    fn node_list_accepts_both_envelopes() {
        let bare: FleetNodesPayload = serde_json::from_str(r#"[{"id":"a"},{"id":"b"}]"#).unwrap();
        assert_eq!(bare.into_nodes().len(), 2);

        let wrapped: FleetNodesPayload =
            serde_json::from_str(r#"{"nodes":[{"id":"a"}],"timestamp":1}"#).unwrap();
        assert_eq!(wrapped.into_nodes().len(), 1);
    }

    #[test]
    fn event_kind_uses_snake_case_tags() {
        let raw = r#"{"type":"node_removed","node":{"id":"a"}}"#;
        let event: FleetEvent = serde_json::from_str(raw).unwrap();
        assert_eq!(event.kind, FleetEventKind::NodeRemoved);
        assert!(serde_json::from_str::<FleetEvent>(r#"{"type":"node_moved","node":{"id":"a"}}"#).is_err());
        assert!(serde_json::from_str::<FleetEvent>(r#"{"type":"node_joined"}"#).is_err());
    }

    #[test]
    fn remove_preserves_remaining_order() {
        let mut view = FleetView::from_nodes(["a", "b", "c"].map(FleetNode::new));
        view.remove_node("b");
        assert_eq!(view.node_ids(), vec!["a", "c"]);
    }

    #[test]
    fn replace_never_inserts() {
        let mut view = FleetView::from_nodes([FleetNode::new("a")]);
        assert!(!view.replace_node(FleetNode::new("z")));
        assert!(view.replace_node(FleetNode::new("a").with_attribute("version", "2.1")));
        assert_eq!(view.node_count(), 1);
        assert_eq!(view.node("a").unwrap().attribute("version"), Some(&Value::from("2.1")));
    }

    #[test]
    fn summary_keeps_extra_fields() {
        let raw = r#"{"total":4,"online":3,"compliant":2,"region":"eu"}"#;
        let summary: FleetSummary = serde_json::from_str(raw).unwrap();
        assert_eq!(summary.total, 4);
        assert_eq!(summary.extra.get("region"), Some(&Value::from("eu")));
    }

    #[test]
    fn equality_includes_arrival_order() {
        let forward = FleetView::from_nodes(["a", "b"].map(FleetNode::new));
        let reversed = FleetView::from_nodes(["b", "a"].map(FleetNode::new));
        assert_ne!(forward, reversed);
        assert_eq!(forward, FleetView::from_nodes(["a", "b"].map(FleetNode::new)));
    }

    mod properties {
        use super::*;
        use proptest::prelude::*;

        #[derive(Debug, Clone)]
        enum Op {
            Upsert(u8),
            Replace(u8),
            Remove(u8),
        }

        fn arb_op() -> impl Strategy<Value = Op> {
            prop_oneof![
                (0u8..6).prop_map(Op::Upsert),
                (0u8..6).prop_map(Op::Replace),
                (0u8..6).prop_map(Op::Remove),
            ]
        }

        proptest! {
            #[test]
            fn ids_stay_unique_and_removals_stick(ops in prop::collection::vec(arb_op(), 0..40)) {
                let mut view = FleetView::default();
                for op in ops {
                    match op {
                        Op::Upsert(id) => view.upsert_node(FleetNode::new(format!("n{id}"))),
                        Op::Replace(id) => {
                            let id = format!("n{id}");
                            let existed = view.contains(&id);
                            prop_assert_eq!(view.replace_node(FleetNode::new(id.clone())), existed);
                            prop_assert_eq!(view.contains(&id), existed);
                        }
                        Op::Remove(id) => {
                            let id = format!("n{id}");
                            view.remove_node(&id);
                            prop_assert!(!view.contains(&id));
                        }
                    }
                    let mut ids = view.node_ids();
                    let count = ids.len();
                    ids.sort_unstable();
                    ids.dedup();
                    prop_assert_eq!(ids.len(), count);
                    prop_assert_eq!(count, view.node_count());
                }
            }

            #[test]
            fn upsert_is_idempotent(ids in prop::collection::vec(0u8..6, 0..12), extra in 0u8..6) {
                let view = FleetView::from_nodes(ids.iter().map(|id| FleetNode::new(format!("n{id}"))));
                let mut once = view.clone();
                once.upsert_node(FleetNode::new(format!("n{extra}")));
                let mut twice = once.clone();
                twice.upsert_node(FleetNode::new(format!("n{extra}")));
                prop_assert_eq!(once, twice);
            }
        }
    }
}
