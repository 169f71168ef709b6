//! Structural suggestions
//!
//! Suggestions arrive as loosely-typed JSON (`{suggestion_type, details,
//! reason}`) and are decoded one at a time, so a malformed entry fails only
//! itself.

use crate::error::SuggestionError;
use kg_graph::{KnowledgeNode, NodeStatus, NodeType};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Suggestion discriminator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SuggestionKind {
    /// Insert one node, optionally wired to the graph
    AddNode,
    /// Remove a node with its edges
    DeleteNode,
    /// Hang sub-components under an existing node
    DeepenNode,
    /// Collapse several nodes into one
    MergeNodes,
    /// Re-parent a node's children, then remove it
    RefactorAndPromote,
}

impl SuggestionKind {
    /// Wire name
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::AddNode => "ADD_NODE",
            Self::DeleteNode => "DELETE_NODE",
            Self::DeepenNode => "DEEPEN_NODE",
            Self::MergeNodes => "MERGE_NODES",
            Self::RefactorAndPromote => "REFACTOR_AND_PROMOTE",
        }
    }

    fn parse(name: &str) -> Option<Self> {
        match name {
            "ADD_NODE" => Some(Self::AddNode),
            "DELETE_NODE" => Some(Self::DeleteNode),
            "DEEPEN_NODE" => Some(Self::DeepenNode),
            "MERGE_NODES" => Some(Self::MergeNodes),
            "REFACTOR_AND_PROMOTE" => Some(Self::RefactorAndPromote),
            _ => None,
        }
    }
}

impl fmt::Display for SuggestionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Proposed node payload
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeProposal {
    /// Requested id
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node_id: Option<String>,
    /// Title
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Node type name
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub node_type: Option<String>,
    /// Description
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl NodeProposal {
    /// Proposal with id and title
    #[must_use]
    pub fn new(node_id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            node_id: Some(node_id.into()),
            title: Some(title.into()),
            ..Self::default()
        }
    }

    /// With type
    #[must_use]
    pub fn with_type(mut self, node_type: impl Into<String>) -> Self {
        self.node_type = Some(node_type.into());
        self
    }

    /// With description
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Node attributes for insertion: status `created`, optional forced type
    #[must_use]
    pub fn to_node(&self, forced_type: Option<NodeType>) -> KnowledgeNode {
        KnowledgeNode {
            title: self.title.clone(),
            node_type: forced_type.or_else(|| self.node_type.clone().map(NodeType::from)),
            description: Some(self.description.clone().unwrap_or_default()),
            status: Some(NodeStatus::Created),
            fields: kg_graph::Attributes::new(),
        }
    }

    fn normalized(mut self) -> Self {
        self.node_id = non_empty(self.node_id);
        self.title = non_empty(self.title);
        self
    }
}

/// Edge request attached to ADD_NODE
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Connection {
    /// Edge source
    #[serde(default)]
    pub source_id: Option<String>,
    /// Edge target
    #[serde(default)]
    pub target_id: Option<String>,
    /// Relationship label
    #[serde(default)]
    pub relationship: Option<String>,
}

/// Decoded suggestion
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Suggestion {
    /// ADD_NODE
    AddNode {
        /// Node payload; a missing title makes the whole suggestion a no-op
        node: NodeProposal,
        /// Optional edge to add alongside
        connect_to: Option<Connection>,
    },
    /// DEEPEN_NODE
    DeepenNode {
        /// Existing parent
        target_node_id: String,
        /// Children to create
        sub_components: Vec<NodeProposal>,
    },
    /// DELETE_NODE
    DeleteNode {
        /// Node to remove
        node_id: String,
        /// Why, for the change record
        reason: Option<String>,
    },
    /// MERGE_NODES
    MergeNodes {
        /// Nodes collapsed into `new_node`
        nodes_to_merge: Vec<String>,
        /// Replacement node (id and title guaranteed)
        new_node: NodeProposal,
    },
    /// REFACTOR_AND_PROMOTE
    RefactorAndPromote {
        /// Node to remove
        node_to_delete: String,
        /// Adopts every child of `node_to_delete`
        new_parent_node: String,
    },
}

#[derive(Deserialize)]
struct AddNodeDetails {
    #[serde(default)]
    suggested_node: Option<NodeProposal>,
    #[serde(default)]
    connect_to: Option<Connection>,
}

#[derive(Deserialize)]
struct DeepenDetails {
    #[serde(default)]
    target_node_id: Option<String>,
    #[serde(default)]
    suggested_sub_components: Vec<NodeProposal>,
}

#[derive(Deserialize)]
struct DeleteDetails {
    #[serde(default)]
    node_id: Option<String>,
    #[serde(default)]
    reason: Option<String>,
}

#[derive(Deserialize)]
struct MergeDetails {
    #[serde(default)]
    nodes_to_merge: Vec<String>,
    #[serde(default)]
    new_node: Option<NodeProposal>,
}

#[derive(Deserialize)]
struct RefactorDetails {
    #[serde(default)]
    node_to_delete: Option<String>,
    #[serde(default)]
    new_parent_node: Option<String>,
}

impl Suggestion {
    /// Decode one raw suggestion
    ///
    /// # Errors
    /// [`SuggestionError`] when the value is not an object, the type is
    /// unknown, or a required field is missing or ill-typed
    pub fn from_value(value: &Value) -> Result<Self, SuggestionError> {
        let object = value.as_object().ok_or(SuggestionError::NotAnObject)?;
        let type_name = object
            .get("suggestion_type")
            .and_then(Value::as_str)
            .unwrap_or_default();
        let kind = SuggestionKind::parse(type_name)
            .ok_or_else(|| SuggestionError::UnknownType(type_name.to_string()))?;

        let details = object
            .get("details")
            .filter(|d| !d.is_null())
            .cloned()
            .unwrap_or_else(|| Value::Object(serde_json::Map::new()));
        let reason = object
            .get("reason")
            .and_then(Value::as_str)
            .map(str::to_string);

        match kind {
            SuggestionKind::AddNode => {
                let d: AddNodeDetails = decode(kind, details)?;
                let node = d
                    .suggested_node
                    .ok_or_else(|| SuggestionError::missing(kind.as_str(), "details.suggested_node"))?;
                Ok(Self::AddNode {
                    node: node.normalized(),
                    connect_to: d.connect_to,
                })
            }
            SuggestionKind::DeepenNode => {
                let d: DeepenDetails = decode(kind, details)?;
                let target_node_id = non_empty(d.target_node_id)
                    .ok_or_else(|| SuggestionError::missing(kind.as_str(), "details.target_node_id"))?;
                Ok(Self::DeepenNode {
                    target_node_id,
                    sub_components: d
                        .suggested_sub_components
                        .into_iter()
                        .map(NodeProposal::normalized)
                        .collect(),
                })
            }
            SuggestionKind::DeleteNode => {
                let d: DeleteDetails = decode(kind, details)?;
                let node_id = non_empty(d.node_id)
                    .ok_or_else(|| SuggestionError::missing(kind.as_str(), "details.node_id"))?;
                Ok(Self::DeleteNode {
                    node_id,
                    reason: reason.or(d.reason),
                })
            }
            SuggestionKind::MergeNodes => {
                let d: MergeDetails = decode(kind, details)?;
                if d.nodes_to_merge.is_empty() {
                    return Err(SuggestionError::missing(kind.as_str(), "details.nodes_to_merge"));
                }
                let new_node = d
                    .new_node
                    .map(NodeProposal::normalized)
                    .filter(|n| n.node_id.is_some() && n.title.is_some())
                    .ok_or_else(|| SuggestionError::missing(kind.as_str(), "details.new_node"))?;
                Ok(Self::MergeNodes {
                    nodes_to_merge: d.nodes_to_merge,
                    new_node,
                })
            }
            SuggestionKind::RefactorAndPromote => {
                let d: RefactorDetails = decode(kind, details)?;
                let node_to_delete = non_empty(d.node_to_delete)
                    .ok_or_else(|| SuggestionError::missing(kind.as_str(), "details.node_to_delete"))?;
                let new_parent_node = non_empty(d.new_parent_node)
                    .ok_or_else(|| SuggestionError::missing(kind.as_str(), "details.new_parent_node"))?;
                Ok(Self::RefactorAndPromote {
                    node_to_delete,
                    new_parent_node,
                })
            }
        }
    }

    /// Discriminator
    #[must_use]
    pub fn kind(&self) -> SuggestionKind {
        match self {
            Self::AddNode { .. } => SuggestionKind::AddNode,
            Self::DeepenNode { .. } => SuggestionKind::DeepenNode,
            Self::DeleteNode { .. } => SuggestionKind::DeleteNode,
            Self::MergeNodes { .. } => SuggestionKind::MergeNodes,
            Self::RefactorAndPromote { .. } => SuggestionKind::RefactorAndPromote,
        }
    }
}

fn decode<T: DeserializeOwned>(kind: SuggestionKind, details: Value) -> Result<T, SuggestionError> {
    serde_json::from_value(details).map_err(|e| SuggestionError::Malformed {
        kind: kind.as_str(),
        reason: e.to_string(),
    })
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|s| !s.trim().is_empty())
}

/// Derive a node id from a title: lowercase, runs of non-alphanumerics become `-`
#[must_use]
pub fn slugify(title: &str) -> String {
    let mut slug = String::with_capacity(title.len());
    for ch in title.chars() {
        if ch.is_alphanumeric() {
            slug.extend(ch.to_lowercase());
        } else if !slug.is_empty() && !slug.ends_with('-') {
            slug.push('-');
        }
    }
    while slug.ends_with('-') {
        slug.pop();
    }
    slug
}
