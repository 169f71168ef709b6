//! Typed node records
//!
//! A node carries a fixed core schema (`title`, `type`, `description`,
//! `status`) plus an ordered extension map for content that later stages
//! attach (`definition`, `key_points`, `draft_text`, ...).

use crate::error::GraphError;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

/// Open-ended attribute map (insertion ordered)
pub type Attributes = serde_json::Map<String, Value>;

/// Key reserved for the node identifier in snapshots
pub const ID_KEY: &str = "id";

const CORE_KEYS: [&str; 4] = ["title", "type", "description", "status"];

/// Kind of concept a node represents
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum NodeType {
    /// The topic itself
    Core,
    /// Knowledge required before the core
    Prerequisite,
    /// Part of the core
    Component,
    /// Part of a component (produced by deepening)
    SubComponent,
    /// Ad-hoc type, e.g. one invented for a merged node
    Other(String),
}

impl NodeType {
    /// Wire name
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Core => "core",
            Self::Prerequisite => "prerequisite",
            Self::Component => "component",
            Self::SubComponent => "sub_component",
            Self::Other(s) => s,
        }
    }
}

impl From<String> for NodeType {
    fn from(value: String) -> Self {
        match value.as_str() {
            "core" => Self::Core,
            "prerequisite" => Self::Prerequisite,
            "component" => Self::Component,
            "sub_component" => Self::SubComponent,
            _ => Self::Other(value),
        }
    }
}

impl From<&str> for NodeType {
    fn from(value: &str) -> Self {
        Self::from(value.to_string())
    }
}

impl From<NodeType> for String {
    fn from(value: NodeType) -> Self {
        match value {
            NodeType::Other(s) => s,
            other => other.as_str().to_string(),
        }
    }
}

impl fmt::Display for NodeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Processing status of a node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeStatus {
    /// Inserted, no content yet
    Created,
    /// Research content attached
    Researched,
    /// Draft written
    Written,
    /// Final text edited
    Edited,
}

impl NodeStatus {
    /// Wire name
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Researched => "researched",
            Self::Written => "written",
            Self::Edited => "edited",
        }
    }
}

impl FromStr for NodeStatus {
    type Err = GraphError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "created" => Ok(Self::Created),
            "researched" => Ok(Self::Researched),
            "written" => Ok(Self::Written),
            "edited" => Ok(Self::Edited),
            _ => Err(GraphError::invalid_attribute("status", "a node status")),
        }
    }
}

impl fmt::Display for NodeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Node attributes
///
/// Every core field is optional so that a record doubles as a patch:
/// [`KnowledgeNode::merge`] overwrites only the fields that are present.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct KnowledgeNode {
    /// Human-readable title
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    /// Concept kind
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub node_type: Option<NodeType>,

    /// Short description from planning
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Last completed stage
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<NodeStatus>,

    /// Stage content (`definition`, `key_points`, `draft_text`, ...)
    #[serde(flatten)]
    pub fields: Attributes,
}

impl KnowledgeNode {
    /// Empty node
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Node with a title
    #[inline]
    #[must_use]
    pub fn titled(title: impl Into<String>) -> Self {
        Self {
            title: Some(title.into()),
            ..Self::default()
        }
    }

    /// With type
    #[inline]
    #[must_use]
    pub fn with_type(mut self, node_type: impl Into<NodeType>) -> Self {
        self.node_type = Some(node_type.into());
        self
    }

    /// With description
    #[inline]
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// With status
    #[inline]
    #[must_use]
    pub fn with_status(mut self, status: NodeStatus) -> Self {
        self.status = Some(status);
        self
    }

    /// With an arbitrary attribute, routed to the core schema when the key names a core field
    ///
    /// # Errors
    /// Returns error on reserved keys or ill-typed core values
    pub fn with_attribute(mut self, key: &str, value: Value) -> Result<Self, GraphError> {
        self.set_attribute(key, value)?;
        Ok(self)
    }

    /// Title, or the given fallback when unset
    #[inline]
    #[must_use]
    pub fn title_or<'a>(&'a self, fallback: &'a str) -> &'a str {
        self.title.as_deref().unwrap_or(fallback)
    }

    /// Extension field by key
    #[inline]
    #[must_use]
    pub fn field(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    /// Extension field as a string slice
    #[must_use]
    pub fn field_str(&self, key: &str) -> Option<&str> {
        self.fields.get(key).and_then(Value::as_str)
    }

    /// True when no attribute at all is set
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.node_type.is_none()
            && self.description.is_none()
            && self.status.is_none()
            && self.fields.is_empty()
    }

    /// Shallow merge: fields present in `other` overwrite ours
    pub fn merge(&mut self, other: KnowledgeNode) {
        if other.title.is_some() {
            self.title = other.title;
        }
        if other.node_type.is_some() {
            self.node_type = other.node_type;
        }
        if other.description.is_some() {
            self.description = other.description;
        }
        if other.status.is_some() {
            self.status = other.status;
        }
        for (key, value) in other.fields {
            self.fields.insert(key, value);
        }
    }

    /// Drop `id` from the extension map and move core-named keys into
    /// the core schema
    ///
    /// Values that do not fit the core schema are discarded. Returns the
    /// discarded keys.
    pub fn normalize(&mut self) -> Vec<String> {
        let mut dropped = Vec::new();
        if self.fields.shift_remove(ID_KEY).is_some() {
            dropped.push(ID_KEY.to_string());
        }
        for key in CORE_KEYS {
            if let Some(value) = self.fields.shift_remove(key) {
                if self.set_attribute(key, value).is_err() {
                    dropped.push(key.to_string());
                }
            }
        }
        dropped
    }

    /// Set one attribute by key
    ///
    /// `title`, `description`, `type` and `status` land in the core schema
    /// (`null` clears them); everything else goes to the extension map.
    ///
    /// # Errors
    /// [`GraphError::ReservedKey`] for `id`, [`GraphError::InvalidAttribute`]
    /// when a core field gets a non-string value or an unknown status.
    pub fn set_attribute(&mut self, key: &str, value: Value) -> Result<(), GraphError> {
        match key {
            ID_KEY => Err(GraphError::ReservedKey(key.to_string())),
            "title" => {
                self.title = string_or_null(key, value)?;
                Ok(())
            }
            "description" => {
                self.description = string_or_null(key, value)?;
                Ok(())
            }
            "type" => {
                self.node_type = string_or_null(key, value)?.map(NodeType::from);
                Ok(())
            }
            "status" => {
                self.status = string_or_null(key, value)?
                    .map(|s| s.parse::<NodeStatus>())
                    .transpose()?;
                Ok(())
            }
            _ => {
                self.fields.insert(key.to_string(), value);
                Ok(())
            }
        }
    }

    /// Set every attribute of a map, stopping at the first invalid one
    ///
    /// # Errors
    /// See [`KnowledgeNode::set_attribute`]
    pub fn apply_attributes(&mut self, attrs: Attributes) -> Result<(), GraphError> {
        for (key, value) in attrs {
            self.set_attribute(&key, value)?;
        }
        Ok(())
    }
}

fn string_or_null(key: &str, value: Value) -> Result<Option<String>, GraphError> {
    match value {
        Value::Null => Ok(None),
        Value::String(s) => Ok(Some(s)),
        _ => Err(GraphError::invalid_attribute(key, "a string")),
    }
}

/// Node as it appears in a snapshot: `{"id": ..., ...attrs}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeRecord {
    /// Node identifier
    pub id: String,
    /// Attributes
    #[serde(flatten)]
    pub node: KnowledgeNode,
}
