//! Change record produced by one suggestion batch

use crate::mutation::suggestion::NodeProposal;
use kg_graph::{EdgeRecord, KnowledgeGraph, RemovedNode};
use serde::{Deserialize, Serialize};

/// Edge added or removed, with endpoint titles for readability
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EdgeChange {
    /// Source id
    pub source_id: String,
    /// Source title (id when untitled)
    pub source_title: String,
    /// Target id
    pub target_id: String,
    /// Target title (id when untitled)
    pub target_title: String,
    /// Relationship label
    pub relationship: String,
}

/// Node removed by a suggestion
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemovedNodeEntry {
    /// Node id
    pub id: String,
    /// Title at removal time
    pub title: String,
    /// Why it went away
    pub reason: String,
}

/// Summary of one applied batch
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeRecord {
    /// Nodes inserted (resolved ids)
    #[serde(default)]
    pub added_nodes: Vec<NodeProposal>,
    /// Nodes deleted
    #[serde(default)]
    pub removed_nodes: Vec<RemovedNodeEntry>,
    /// Edges inserted
    #[serde(default)]
    pub added_edges: Vec<EdgeChange>,
    /// Edges dropped by cascade deletes
    #[serde(default)]
    pub removed_edges: Vec<EdgeChange>,
    /// Per-suggestion failures
    #[serde(default)]
    pub errors: Vec<String>,
    /// Suggestions ignored without error
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub skipped: Vec<String>,
}

impl ChangeRecord {
    /// Empty record
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the batch changed the graph at all
    #[must_use]
    pub fn is_noop(&self) -> bool {
        self.added_nodes.is_empty()
            && self.removed_nodes.is_empty()
            && self.added_edges.is_empty()
            && self.removed_edges.is_empty()
    }

    pub(crate) fn push_added_edge(
        &mut self,
        graph: &KnowledgeGraph,
        source: &str,
        target: &str,
        relationship: &str,
    ) {
        self.added_edges.push(EdgeChange {
            source_id: source.to_string(),
            source_title: title_of(graph, source),
            target_id: target.to_string(),
            target_title: title_of(graph, target),
            relationship: relationship.to_string(),
        });
    }

    /// Record a cascade delete; call after the deletion so surviving endpoints resolve
    pub(crate) fn push_removal(
        &mut self,
        graph: &KnowledgeGraph,
        removed: RemovedNode,
        reason: impl Into<String>,
    ) {
        let removed_title = removed.node.title_or(&removed.id).to_string();
        let title = |id: &str| {
            if id == removed.id {
                removed_title.clone()
            } else {
                title_of(graph, id)
            }
        };

        for EdgeRecord {
            source,
            target,
            attrs,
        } in &removed.edges
        {
            self.removed_edges.push(EdgeChange {
                source_id: source.clone(),
                source_title: title(source),
                target_id: target.clone(),
                target_title: title(target),
                relationship: attrs.relationship_or_default().to_string(),
            });
        }

        self.removed_nodes.push(RemovedNodeEntry {
            id: removed.id.clone(),
            title: removed_title.clone(),
            reason: reason.into(),
        });
    }
}

fn title_of(graph: &KnowledgeGraph, id: &str) -> String {
    graph
        .node(id)
        .and_then(|n| n.title.clone())
        .unwrap_or_else(|| id.to_string())
}
