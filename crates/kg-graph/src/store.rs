//! Graph store
//!
//! Directed graph of [`KnowledgeNode`]s keyed by string id. Node order is
//! insertion order and survives deletions; edges are unique per
//! `(source, target, relationship)`.
//!
//! The store has a single owner and takes `&mut self` for every mutation.
//! Concurrent writers must serialize their changes before calling in.

use crate::edge::{EdgeAttrs, EdgeRecord};
use crate::error::GraphError;
use crate::node::{Attributes, KnowledgeNode, NodeRecord};
use indexmap::{IndexMap, IndexSet};
use petgraph::stable_graph::{EdgeIndex, NodeIndex, StableDiGraph};
use petgraph::visit::EdgeRef;
use petgraph::Direction;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone)]
pub(crate) struct NodeSlot {
    pub(crate) id: String,
    pub(crate) node: KnowledgeNode,
}

/// Flat serialized form: `{nodes: [...], edges: [...], metadata: {...}}`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GraphSnapshot {
    /// Nodes in store order
    #[serde(default)]
    pub nodes: Vec<NodeRecord>,
    /// Edges
    #[serde(default)]
    pub edges: Vec<EdgeRecord>,
    /// Graph-level metadata
    #[serde(default)]
    pub metadata: Attributes,
}

/// Node removed by [`KnowledgeGraph::delete_node`], with the edges that went with it
#[derive(Debug, Clone, PartialEq)]
pub struct RemovedNode {
    /// Node id
    pub id: String,
    /// Attributes at deletion time
    pub node: KnowledgeNode,
    /// Incident edges (incoming and outgoing) removed by the cascade
    pub edges: Vec<EdgeRecord>,
}

/// In-memory knowledge graph
#[derive(Debug, Clone, Default)]
pub struct KnowledgeGraph {
    pub(crate) inner: StableDiGraph<NodeSlot, EdgeAttrs>,
    pub(crate) index: IndexMap<String, NodeIndex>,
    metadata: Attributes,
}

impl KnowledgeGraph {
    /// Empty graph
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a node, or merge attributes into the existing one
    ///
    /// Reserved keys in the extension map are dropped (see
    /// [`KnowledgeNode::normalize`]). Returns `true` when the id was new.
    pub fn add_node(&mut self, id: impl Into<String>, mut node: KnowledgeNode) -> bool {
        let id = id.into();
        for key in node.normalize() {
            tracing::warn!(node = %id, %key, "dropped reserved node attribute");
        }
        if let Some(&ix) = self.index.get(&id) {
            self.inner[ix].node.merge(node);
            return false;
        }
        let ix = self.inner.add_node(NodeSlot {
            id: id.clone(),
            node,
        });
        self.index.insert(id, ix);
        true
    }

    /// Insert an edge
    ///
    /// Endpoints are not validated: a missing endpoint is created as an
    /// empty node. An edge with the same endpoints and relationship (unset
    /// reads as `related_to`) is merged instead of duplicated. Endpoint keys
    /// in the attributes are dropped. Returns `true` when a new edge was added.
    pub fn add_edge(
        &mut self,
        source: impl Into<String>,
        target: impl Into<String>,
        mut attrs: EdgeAttrs,
    ) -> bool {
        let (source, target) = (source.into(), target.into());
        for key in attrs.normalize() {
            tracing::warn!(%source, %target, %key, "dropped reserved edge attribute");
        }
        let from = self.ensure_node(source);
        let to = self.ensure_node(target);

        let existing = self
            .inner
            .edges_directed(from, Direction::Outgoing)
            .find(|e| {
                e.target() == to
                    && e.weight().relationship_or_default() == attrs.relationship_or_default()
            })
            .map(|e| e.id());

        match existing {
            Some(edge) => {
                self.inner[edge].merge(attrs);
                false
            }
            None => {
                self.inner.add_edge(from, to, attrs);
                true
            }
        }
    }

    /// Remove a node and every incident edge
    ///
    /// No-op returning `None` if the id is absent.
    pub fn delete_node(&mut self, id: &str) -> Option<RemovedNode> {
        let ix = self.index.shift_remove(id)?;

        let mut incident: Vec<EdgeIndex> = self
            .inner
            .edges_directed(ix, Direction::Outgoing)
            .chain(self.inner.edges_directed(ix, Direction::Incoming))
            .map(|e| e.id())
            .collect();
        incident.sort_unstable();
        incident.dedup();

        let edges = incident
            .into_iter()
            .filter_map(|e| self.edge_record(e))
            .collect();

        let slot = self.inner.remove_node(ix)?;
        tracing::trace!(node = %slot.id, "node deleted with incident edges");
        Some(RemovedNode {
            id: slot.id,
            node: slot.node,
            edges,
        })
    }

    /// Copy of a node's attributes; empty if absent
    #[must_use]
    pub fn get_node(&self, id: &str) -> KnowledgeNode {
        self.node(id).cloned().unwrap_or_default()
    }

    /// Borrow a node
    #[must_use]
    pub fn node(&self, id: &str) -> Option<&KnowledgeNode> {
        self.index.get(id).map(|&ix| &self.inner[ix].node)
    }

    /// Mutably borrow a node
    pub fn node_mut(&mut self, id: &str) -> Option<&mut KnowledgeNode> {
        let ix = *self.index.get(id)?;
        Some(&mut self.inner[ix].node)
    }

    /// Whether the id is present
    #[inline]
    #[must_use]
    pub fn contains_node(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    /// Node ids in insertion order
    pub fn node_ids(&self) -> impl Iterator<Item = &str> + '_ {
        self.index.keys().map(String::as_str)
    }

    /// All nodes in insertion order
    #[must_use]
    pub fn get_nodes(&self) -> Vec<NodeRecord> {
        self.index
            .values()
            .map(|&ix| {
                let slot = &self.inner[ix];
                // node_mut can bypass add_node
                let mut node = slot.node.clone();
                node.normalize();
                NodeRecord {
                    id: slot.id.clone(),
                    node,
                }
            })
            .collect()
    }

    /// All edges
    #[must_use]
    pub fn get_edges(&self) -> Vec<EdgeRecord> {
        self.inner
            .edge_indices()
            .filter_map(|e| self.edge_record(e))
            .collect()
    }

    /// Number of nodes
    #[inline]
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.index.len()
    }

    /// Number of edges
    #[inline]
    #[must_use]
    pub fn edge_count(&self) -> usize {
        self.inner.edge_count()
    }

    /// Direct successors of `id`, deduplicated
    #[must_use]
    pub fn out_neighbors(&self, id: &str) -> Vec<String> {
        self.neighbors_directed(id, Direction::Outgoing)
    }

    /// Direct predecessors of `id`, deduplicated
    #[must_use]
    pub fn in_neighbors(&self, id: &str) -> Vec<String> {
        self.neighbors_directed(id, Direction::Incoming)
    }

    /// Successors then predecessors of `id`, deduplicated
    #[must_use]
    pub fn neighbors(&self, id: &str) -> Vec<String> {
        let mut seen: IndexSet<String> = self.out_neighbors(id).into_iter().collect();
        seen.extend(self.in_neighbors(id));
        seen.into_iter().collect()
    }

    /// Edges leaving or entering `id`
    #[must_use]
    pub fn incident_edges(&self, id: &str) -> Vec<EdgeRecord> {
        self.get_edges()
            .into_iter()
            .filter(|e| e.touches(id))
            .collect()
    }

    /// Graph-level metadata
    #[inline]
    #[must_use]
    pub fn metadata(&self) -> &Attributes {
        &self.metadata
    }

    /// Mutable graph-level metadata
    #[inline]
    pub fn metadata_mut(&mut self) -> &mut Attributes {
        &mut self.metadata
    }

    /// Flat snapshot of the whole graph
    #[must_use]
    pub fn to_snapshot(&self) -> GraphSnapshot {
        GraphSnapshot {
            nodes: self.get_nodes(),
            edges: self.get_edges(),
            metadata: self.metadata.clone(),
        }
    }

    /// Rebuild a graph from a snapshot
    #[must_use]
    pub fn from_snapshot(snapshot: GraphSnapshot) -> Self {
        let mut graph = Self::new();
        graph.metadata = snapshot.metadata;
        for record in snapshot.nodes {
            graph.add_node(record.id, record.node);
        }
        for edge in snapshot.edges {
            graph.add_edge(edge.source, edge.target, edge.attrs);
        }
        graph
    }

    /// Snapshot as JSON text
    ///
    /// # Errors
    /// Returns error if serialization fails
    pub fn to_json(&self) -> Result<String, GraphError> {
        Ok(serde_json::to_string(&self.to_snapshot())?)
    }

    /// Rebuild from JSON text
    ///
    /// # Errors
    /// Returns error on malformed JSON or records
    pub fn from_json(json: &str) -> Result<Self, GraphError> {
        let snapshot: GraphSnapshot = serde_json::from_str(json)
            .map_err(|e| GraphError::MalformedSnapshot(e.to_string()))?;
        Ok(Self::from_snapshot(snapshot))
    }

    fn ensure_node(&mut self, id: String) -> NodeIndex {
        if let Some(&ix) = self.index.get(&id) {
            return ix;
        }
        let ix = self.inner.add_node(NodeSlot {
            id: id.clone(),
            node: KnowledgeNode::default(),
        });
        self.index.insert(id, ix);
        ix
    }

    fn edge_record(&self, edge: EdgeIndex) -> Option<EdgeRecord> {
        let (from, to) = self.inner.edge_endpoints(edge)?;
        let attrs = self.inner.edge_weight(edge)?;
        Some(EdgeRecord::new(
            self.inner[from].id.clone(),
            self.inner[to].id.clone(),
            attrs.clone(),
        ))
    }

    fn neighbors_directed(&self, id: &str, direction: Direction) -> Vec<String> {
        let Some(&ix) = self.index.get(id) else {
            return Vec::new();
        };
        let mut edges: Vec<(EdgeIndex, NodeIndex)> = self
            .inner
            .edges_directed(ix, direction)
            .map(|e| {
                let other = match direction {
                    Direction::Outgoing => e.target(),
                    Direction::Incoming => e.source(),
                };
                (e.id(), other)
            })
            .collect();
        edges.sort_unstable_by_key(|(e, _)| *e);

        let mut seen = Vec::with_capacity(edges.len());
        for (_, other) in edges {
            let other_id = &self.inner[other].id;
            if !seen.contains(other_id) {
                seen.push(other_id.clone());
            }
        }
        seen
    }
}
