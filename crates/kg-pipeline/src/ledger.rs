//! Processing ledger
//!
//! Per-stage sets of node ids that completed that stage at least once.
//! Append-only; the ledger, not the node's `status`, gates batch selection.

use indexmap::IndexSet;
use kg_graph::NodeStatus;
use serde::{Deserialize, Serialize};

/// Completed-stage sets, serialized as `{"researched": [...], "written": [...], "edited": [...]}`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessingLedger {
    /// Nodes that finished research
    #[serde(default)]
    pub researched: IndexSet<String>,
    /// Nodes that finished writing
    #[serde(default)]
    pub written: IndexSet<String>,
    /// Nodes that finished editing
    #[serde(default)]
    pub edited: IndexSet<String>,
}

impl ProcessingLedger {
    /// Empty ledger
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record completion; returns `false` if already recorded or the status has no set
    pub fn mark(&mut self, status: NodeStatus, node_id: &str) -> bool {
        match self.set_mut(status) {
            Some(set) if !set.contains(node_id) => set.insert(node_id.to_string()),
            _ => false,
        }
    }

    /// Whether `node_id` completed the stage that yields `status`
    #[must_use]
    pub fn contains(&self, status: NodeStatus, node_id: &str) -> bool {
        self.set(status).is_some_and(|set| set.contains(node_id))
    }

    /// Set backing a status (`created` has none)
    #[must_use]
    pub fn set(&self, status: NodeStatus) -> Option<&IndexSet<String>> {
        match status {
            NodeStatus::Created => None,
            NodeStatus::Researched => Some(&self.researched),
            NodeStatus::Written => Some(&self.written),
            NodeStatus::Edited => Some(&self.edited),
        }
    }

    fn set_mut(&mut self, status: NodeStatus) -> Option<&mut IndexSet<String>> {
        match status {
            NodeStatus::Created => None,
            NodeStatus::Researched => Some(&mut self.researched),
            NodeStatus::Written => Some(&mut self.written),
            NodeStatus::Edited => Some(&mut self.edited),
        }
    }

    /// Forget everything (full pipeline restart)
    pub fn clear(&mut self) {
        self.researched.clear();
        self.written.clear();
        self.edited.clear();
    }
}
