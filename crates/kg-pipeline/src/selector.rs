//! Batch selector
//!
//! Picks the nodes a batch stage should process this round. Output order
//! follows graph insertion order so runs are reproducible.

use crate::ledger::ProcessingLedger;
use crate::stage::Stage;
use kg_graph::{KnowledgeGraph, NodeStatus};

/// Status a node reaches when a batch stage finishes it
#[must_use]
pub fn completion_status(stage: Stage) -> Option<NodeStatus> {
    match stage {
        Stage::Researching => Some(NodeStatus::Researched),
        Stage::Writing => Some(NodeStatus::Written),
        Stage::Editing => Some(NodeStatus::Edited),
        _ => None,
    }
}

/// Eligible node ids for `stage`, optionally capped at `limit`
///
/// - `researching`: status unset or `created`
/// - `writing`: researched but not written
/// - `editing`: written but not edited
/// - anything else: empty
#[must_use]
pub fn select_batch(
    graph: &KnowledgeGraph,
    ledger: &ProcessingLedger,
    stage: Stage,
    limit: Option<usize>,
) -> Vec<String> {
    let candidates = graph.node_ids().filter(|id| match stage {
        Stage::Researching => graph
            .node(id)
            .map_or(false, |n| matches!(n.status, None | Some(NodeStatus::Created))),
        Stage::Writing => ledger.researched.contains(*id) && !ledger.written.contains(*id),
        Stage::Editing => ledger.written.contains(*id) && !ledger.edited.contains(*id),
        _ => false,
    });

    candidates
        .take(limit.unwrap_or(usize::MAX))
        .map(str::to_string)
        .collect()
}
