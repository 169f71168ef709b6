//! KG Graph - knowledge graph store
//!
//! In-memory directed graph of typed concept nodes and labeled edges:
//! - Upsert-style node insertion (attributes merge, ids stay unique)
//! - Edge insertion without endpoint validation
//! - Cascade delete of a node with all incident edges
//! - Flat `{nodes, edges, metadata}` snapshots for checkpoints
//! - Root/leaf detection and betweenness centrality
//!
//! # Example
//!
//! ```rust
//! use kg_graph::{EdgeAttrs, KnowledgeGraph, KnowledgeNode, NodeType, IS_COMPONENT_OF};
//!
//! let mut graph = KnowledgeGraph::new();
//! graph.add_node("rust", KnowledgeNode::titled("Rust").with_type(NodeType::Core));
//! graph.add_node("borrowck", KnowledgeNode::titled("Borrow checker"));
//! graph.add_edge("rust", "borrowck", EdgeAttrs::relation(IS_COMPONENT_OF));
//!
//! graph.delete_node("borrowck");
//! assert!(graph.get_edges().is_empty());
//! ```

#![warn(unreachable_pub)]

pub mod analytics;
pub mod edge;
pub mod error;
pub mod node;
pub mod store;

pub use edge::{
    EdgeAttrs, EdgeRecord, DEPENDS_ON, IS_COMPONENT_OF, IS_PREREQUISITE_FOR, RELATED_TO,
    SOURCE_KEY, TARGET_KEY,
};
pub use error::GraphError;
pub use node::{Attributes, KnowledgeNode, NodeRecord, NodeStatus, NodeType, ID_KEY};
pub use store::{GraphSnapshot, KnowledgeGraph, RemovedNode};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
