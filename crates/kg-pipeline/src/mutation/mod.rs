//! Structural mutation engine
//!
//! Applies a batch of inspector suggestions to a graph in listed order.
//! Each suggestion sees the graph as earlier ones left it. A failing
//! suggestion appends to the record's `errors` and the batch moves on;
//! partial effects (a node added without its edge) stay committed.

pub mod record;
pub mod suggestion;

pub use record::{ChangeRecord, EdgeChange, RemovedNodeEntry};
pub use suggestion::{slugify, Connection, NodeProposal, Suggestion, SuggestionKind};

use crate::error::SuggestionError;
use crate::observer::{tracing_observer, SharedObserver};
use indexmap::IndexSet;
use kg_graph::{EdgeAttrs, KnowledgeGraph, NodeType, IS_COMPONENT_OF, RELATED_TO};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Engine policy knobs
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MutationPolicy {
    /// Refuse DELETE_NODE on nodes that still have children
    pub reject_orphaning_deletes: bool,
}

/// Applies suggestion batches
#[derive(Debug, Clone)]
pub struct MutationEngine {
    policy: MutationPolicy,
    observer: SharedObserver,
}

impl Default for MutationEngine {
    fn default() -> Self {
        Self::new(MutationPolicy::default())
    }
}

impl MutationEngine {
    /// Engine reporting through `tracing`
    #[must_use]
    pub fn new(policy: MutationPolicy) -> Self {
        Self {
            policy,
            observer: tracing_observer(),
        }
    }

    /// With observer
    #[must_use]
    pub fn with_observer(mut self, observer: SharedObserver) -> Self {
        self.observer = observer;
        self
    }

    /// Active policy
    #[inline]
    #[must_use]
    pub fn policy(&self) -> MutationPolicy {
        self.policy
    }

    /// Apply raw JSON suggestions
    pub fn apply_suggestions(&self, graph: &mut KnowledgeGraph, suggestions: &[Value]) -> ChangeRecord {
        let mut record = ChangeRecord::new();
        for raw in suggestions {
            match Suggestion::from_value(raw) {
                Ok(suggestion) => self.apply_into(graph, &suggestion, &mut record),
                Err(error) => {
                    self.observer.suggestion_applied(None, Err(&error));
                    record.errors.push(error.to_string());
                }
            }
        }
        record
    }

    /// Apply already-decoded suggestions
    pub fn apply_all<'a>(
        &self,
        graph: &mut KnowledgeGraph,
        suggestions: impl IntoIterator<Item = &'a Suggestion>,
    ) -> ChangeRecord {
        let mut record = ChangeRecord::new();
        for suggestion in suggestions {
            self.apply_into(graph, suggestion, &mut record);
        }
        record
    }

    fn apply_into(&self, graph: &mut KnowledgeGraph, suggestion: &Suggestion, record: &mut ChangeRecord) {
        let outcome = self.apply_one(graph, suggestion, record);
        self.observer
            .suggestion_applied(Some(suggestion.kind()), outcome.as_ref().map(|_| ()));
        if let Err(error) = outcome {
            record.errors.push(error.to_string());
        }
    }

    /// Apply one suggestion, recording effects into `record`
    ///
    /// Sub-failures that do not abort the suggestion (a bad sub-node, a
    /// missing merge member) are pushed to `record.errors` directly.
    ///
    /// # Errors
    /// The suggestion-level failure, if any
    pub fn apply_one(
        &self,
        graph: &mut KnowledgeGraph,
        suggestion: &Suggestion,
        record: &mut ChangeRecord,
    ) -> Result<(), SuggestionError> {
        match suggestion {
            Suggestion::AddNode { node, connect_to } => {
                add_node(graph, node, connect_to.as_ref(), record)
            }
            Suggestion::DeepenNode {
                target_node_id,
                sub_components,
            } => deepen_node(graph, target_node_id, sub_components, record),
            Suggestion::DeleteNode { node_id, reason } => {
                self.delete_node(graph, node_id, reason.as_deref(), record)
            }
            Suggestion::MergeNodes {
                nodes_to_merge,
                new_node,
            } => merge_nodes(graph, nodes_to_merge, new_node, record),
            Suggestion::RefactorAndPromote {
                node_to_delete,
                new_parent_node,
            } => refactor_and_promote(graph, node_to_delete, new_parent_node, record),
        }
    }

    fn delete_node(
        &self,
        graph: &mut KnowledgeGraph,
        node_id: &str,
        reason: Option<&str>,
        record: &mut ChangeRecord,
    ) -> Result<(), SuggestionError> {
        if !graph.contains_node(node_id) {
            record
                .skipped
                .push(format!("DELETE_NODE {node_id}: node already absent"));
            return Ok(());
        }

        if self.policy.reject_orphaning_deletes {
            let children = graph.out_neighbors(node_id).len();
            if children > 0 {
                return Err(SuggestionError::WouldOrphan {
                    node_id: node_id.to_string(),
                    children,
                });
            }
        }

        if let Some(removed) = graph.delete_node(node_id) {
            tracing::info!(node = node_id, edges = removed.edges.len(), "deleted node and its edges");
            record.push_removal(graph, removed, reason.unwrap_or("No reason provided"));
        }
        Ok(())
    }
}

fn add_node(
    graph: &mut KnowledgeGraph,
    node: &NodeProposal,
    connect_to: Option<&Connection>,
    record: &mut ChangeRecord,
) -> Result<(), SuggestionError> {
    let Some(title) = node.title.as_deref() else {
        record.skipped.push("ADD_NODE without title".to_string());
        return Ok(());
    };
    let node_id = node.node_id.clone().unwrap_or_else(|| slugify(title));
    if node_id.is_empty() {
        return Err(SuggestionError::missing("ADD_NODE", "details.suggested_node.node_id"));
    }

    graph.add_node(node_id.clone(), node.to_node(None));
    tracing::info!(node = %node_id, title, "added node");
    record.added_nodes.push(NodeProposal {
        node_id: Some(node_id.clone()),
        ..node.clone()
    });

    let Some(connection) = connect_to else {
        return Ok(());
    };
    let (Some(source), Some(target)) = (connection.source_id.as_deref(), connection.target_id.as_deref())
    else {
        record
            .skipped
            .push(format!("ADD_NODE {node_id}: connect_to without both endpoints"));
        return Ok(());
    };

    if !graph.contains_node(source) || !graph.contains_node(target) {
        return Err(SuggestionError::MissingEndpoint {
            source_id: source.to_string(),
            target_id: target.to_string(),
        });
    }

    let relationship = connection.relationship.as_deref().unwrap_or(RELATED_TO);
    if graph.add_edge(source, target, EdgeAttrs::relation(relationship)) {
        record.push_added_edge(graph, source, target, relationship);
    }
    Ok(())
}

fn deepen_node(
    graph: &mut KnowledgeGraph,
    parent_id: &str,
    sub_components: &[NodeProposal],
    record: &mut ChangeRecord,
) -> Result<(), SuggestionError> {
    if !graph.contains_node(parent_id) {
        return Err(SuggestionError::MissingParent(parent_id.to_string()));
    }

    for sub in sub_components {
        let (Some(sub_id), Some(_)) = (sub.node_id.as_deref(), sub.title.as_deref()) else {
            record
                .errors
                .push(SuggestionError::IncompleteSubNode(parent_id.to_string()).to_string());
            continue;
        };
        if sub_id == parent_id {
            record.errors.push(
                SuggestionError::Malformed {
                    kind: "DEEPEN_NODE",
                    reason: format!("sub-node '{sub_id}' is its own parent"),
                }
                .to_string(),
            );
            continue;
        }

        graph.add_node(sub_id, sub.to_node(Some(NodeType::SubComponent)));
        record.added_nodes.push(sub.clone().with_type(NodeType::SubComponent.as_str()));
        if graph.add_edge(parent_id, sub_id, EdgeAttrs::relation(IS_COMPONENT_OF)) {
            record.push_added_edge(graph, parent_id, sub_id, IS_COMPONENT_OF);
        }
        tracing::info!(parent = parent_id, node = sub_id, "added sub-component");
    }
    Ok(())
}

fn merge_nodes(
    graph: &mut KnowledgeGraph,
    nodes_to_merge: &[String],
    new_node: &NodeProposal,
    record: &mut ChangeRecord,
) -> Result<(), SuggestionError> {
    let new_id = new_node
        .node_id
        .as_deref()
        .ok_or_else(|| SuggestionError::missing("MERGE_NODES", "details.new_node"))?;

    graph.add_node(new_id, new_node.to_node(None));
    record.added_nodes.push(new_node.clone());
    tracing::info!(node = new_id, "MERGE: created merged node");

    let mut members: IndexSet<&str> = IndexSet::new();
    for id in nodes_to_merge {
        if graph.contains_node(id) {
            members.insert(id.as_str());
        } else {
            record
                .errors
                .push(SuggestionError::MissingMergeMember(id.clone()).to_string());
        }
    }

    let redirect = |id: &str| -> String {
        if members.contains(id) {
            new_id.to_string()
        } else {
            id.to_string()
        }
    };

    let mut rewired: IndexSet<(String, String, String)> = IndexSet::new();
    for edge in graph.get_edges() {
        if !members.contains(edge.source.as_str()) && !members.contains(edge.target.as_str()) {
            continue;
        }
        let source = redirect(&edge.source);
        let target = redirect(&edge.target);
        if source == target {
            continue;
        }
        rewired.insert((source, target, edge.attrs.relationship_or_default().to_string()));
    }

    for (source, target, relationship) in &rewired {
        if !graph.contains_node(source) || !graph.contains_node(target) {
            continue;
        }
        if graph.add_edge(source.as_str(), target.as_str(), EdgeAttrs::relation(relationship.as_str())) {
            record.push_added_edge(graph, source, target, relationship);
            tracing::info!(%source, %target, %relationship, "MERGE: re-wired edge");
        }
    }

    let reason = format!("Merged into new node {new_id}");
    for old_id in members.into_iter().filter(|id| *id != new_id) {
        if let Some(removed) = graph.delete_node(old_id) {
            record.push_removal(graph, removed, reason.clone());
        }
    }
    Ok(())
}

fn refactor_and_promote(
    graph: &mut KnowledgeGraph,
    node_to_delete: &str,
    new_parent: &str,
    record: &mut ChangeRecord,
) -> Result<(), SuggestionError> {
    if node_to_delete == new_parent {
        return Err(SuggestionError::RefactorOntoSelf(node_to_delete.to_string()));
    }
    if !graph.contains_node(node_to_delete) || !graph.contains_node(new_parent) {
        return Err(SuggestionError::MissingRefactorNodes {
            node_to_delete: node_to_delete.to_string(),
            new_parent: new_parent.to_string(),
        });
    }

    let children = graph.out_neighbors(node_to_delete);
    tracing::info!(node = node_to_delete, children = children.len(), "REFACTOR: promoting children");

    // every child is re-parented before the old parent disappears
    for child in &children {
        if child == new_parent {
            record.skipped.push(format!(
                "REFACTOR_AND_PROMOTE {node_to_delete}: new parent {new_parent} was a child, not re-linked to itself"
            ));
            continue;
        }
        if graph.add_edge(new_parent, child.as_str(), EdgeAttrs::relation(IS_COMPONENT_OF)) {
            record.push_added_edge(graph, new_parent, child, IS_COMPONENT_OF);
        }
    }

    if let Some(removed) = graph.delete_node(node_to_delete) {
        record.push_removal(
            graph,
            removed,
            format!("Refactored and promoted children to {new_parent}"),
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observer::NoopObserver;
    use kg_graph::KnowledgeNode;
    use serde_json::json;
    use std::sync::Arc;

    fn engine() -> MutationEngine {
        MutationEngine::default().with_observer(Arc::new(NoopObserver))
    }

    #[test]
    fn add_to_empty_graph() {
        let mut g = KnowledgeGraph::new();
        let record = engine().apply_suggestions(
            &mut g,
            &[json!({
                "suggestion_type": "ADD_NODE",
                "details": {"suggested_node": {"node_id": "x", "title": "X", "type": "core"}}
            })],
        );

        assert!(record.errors.is_empty());
        let nodes = g.get_nodes();
        assert_eq!(nodes.len(), 1);
        assert_eq!(nodes[0].id, "x");
        assert_eq!(nodes[0].node.title.as_deref(), Some("X"));
        assert_eq!(nodes[0].node.node_type, Some(NodeType::Core));
    }

    #[test]
    fn add_without_title_is_skipped_silently() {
        let mut g = KnowledgeGraph::new();
        let record = engine().apply_suggestions(
            &mut g,
            &[json!({"suggestion_type": "ADD_NODE", "details": {"suggested_node": {"node_id": "x"}}})],
        );
        assert!(record.errors.is_empty());
        assert_eq!(record.skipped.len(), 1);
        assert_eq!(g.node_count(), 0);
    }

    #[test]
    fn add_without_id_uses_title_slug() {
        let mut g = KnowledgeGraph::new();
        let record = engine().apply_suggestions(
            &mut g,
            &[json!({"suggestion_type": "ADD_NODE", "details": {"suggested_node": {"title": "Lifetime Elision"}}})],
        );
        assert!(g.contains_node("lifetime-elision"));
        assert_eq!(record.added_nodes[0].node_id.as_deref(), Some("lifetime-elision"));
    }

    #[test]
    fn orphaning_policy_rejects_delete_with_children() {
        let mut g = KnowledgeGraph::new();
        g.add_node("p", KnowledgeNode::titled("P"));
        g.add_node("c", KnowledgeNode::titled("C"));
        g.add_edge("p", "c", EdgeAttrs::relation(IS_COMPONENT_OF));

        let strict = MutationEngine::new(MutationPolicy {
            reject_orphaning_deletes: true,
        })
        .with_observer(Arc::new(NoopObserver));
        let record = strict.apply_suggestions(
            &mut g,
            &[json!({"suggestion_type": "DELETE_NODE", "details": {"node_id": "p"}})],
        );

        assert_eq!(record.errors.len(), 1);
        assert!(g.contains_node("p"));
    }

    #[test]
    fn refactor_onto_own_child_skips_self_loop() {
        let mut g = KnowledgeGraph::new();
        for id in ["p", "q", "c"] {
            g.add_node(id, KnowledgeNode::titled(id));
        }
        g.add_edge("p", "q", EdgeAttrs::relation(IS_COMPONENT_OF));
        g.add_edge("p", "c", EdgeAttrs::relation(IS_COMPONENT_OF));

        let record = engine().apply_suggestions(
            &mut g,
            &[json!({
                "suggestion_type": "REFACTOR_AND_PROMOTE",
                "details": {"node_to_delete": "p", "new_parent_node": "q"}
            })],
        );

        assert!(record.errors.is_empty());
        assert!(!g.contains_node("p"));
        let edges = g.get_edges();
        assert_eq!(edges.len(), 1);
        assert_eq!((edges[0].source.as_str(), edges[0].target.as_str()), ("q", "c"));
    }
}
