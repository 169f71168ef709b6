//! Labeled edge records

use crate::node::Attributes;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Snapshot key holding the source id
pub const SOURCE_KEY: &str = "source";
/// Snapshot key holding the target id
pub const TARGET_KEY: &str = "target";

/// `source` is a prerequisite of `target`
pub const IS_PREREQUISITE_FOR: &str = "is_prerequisite_for";
/// `target` is a component of `source` (parent → child)
pub const IS_COMPONENT_OF: &str = "is_component_of";
/// `source` depends on `target`
pub const DEPENDS_ON: &str = "depends_on";
/// Loose association; default label when none is given
pub const RELATED_TO: &str = "related_to";

/// Edge attributes
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EdgeAttrs {
    /// Relationship label (free text)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relationship: Option<String>,

    /// Any other attributes
    #[serde(flatten)]
    pub fields: Attributes,
}

impl EdgeAttrs {
    /// Edge labeled with a relationship
    #[inline]
    #[must_use]
    pub fn relation(relationship: impl Into<String>) -> Self {
        Self {
            relationship: Some(relationship.into()),
            fields: Attributes::new(),
        }
    }

    /// Relationship label, `related_to` when unset
    #[inline]
    #[must_use]
    pub fn relationship_or_default(&self) -> &str {
        self.relationship.as_deref().unwrap_or(RELATED_TO)
    }

    /// Drop endpoint keys from the extension map and lift a stray
    /// `relationship` into the label
    ///
    /// Returns the keys that were discarded.
    pub fn normalize(&mut self) -> Vec<String> {
        let mut dropped = Vec::new();
        for key in [SOURCE_KEY, TARGET_KEY] {
            if self.fields.shift_remove(key).is_some() {
                dropped.push(key.to_string());
            }
        }
        if let Some(value) = self.fields.shift_remove("relationship") {
            match value {
                Value::String(label) if self.relationship.is_none() => {
                    self.relationship = Some(label);
                }
                _ => dropped.push("relationship".to_string()),
            }
        }
        dropped
    }

    /// Shallow merge of attributes
    pub fn merge(&mut self, other: EdgeAttrs) {
        if other.relationship.is_some() {
            self.relationship = other.relationship;
        }
        for (key, value) in other.fields {
            self.fields.insert(key, value);
        }
    }
}

/// Edge as it appears in a snapshot: `{"source": ..., "target": ..., ...attrs}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EdgeRecord {
    /// Source node id
    pub source: String,
    /// Target node id
    pub target: String,
    /// Attributes
    #[serde(flatten)]
    pub attrs: EdgeAttrs,
}

impl EdgeRecord {
    /// New edge record
    #[must_use]
    pub fn new(source: impl Into<String>, target: impl Into<String>, attrs: EdgeAttrs) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
            attrs,
        }
    }

    /// True when either endpoint is `id`
    #[inline]
    #[must_use]
    pub fn touches(&self, id: &str) -> bool {
        self.source == id || self.target == id
    }
}
