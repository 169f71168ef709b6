//! Pipeline observer
//!
//! Components report progress through an injected [`PipelineObserver`]
//! instead of logging ambiently. [`TracingObserver`] forwards everything to
//! `tracing`; [`NoopObserver`] drops it.

use crate::error::{AgentError, SuggestionError};
use crate::mutation::{ChangeRecord, SuggestionKind};
use crate::stage::{AgentKind, Stage};
use kg_graph::NodeStatus;
use std::fmt::Debug;
use std::path::Path;
use std::sync::Arc;

/// Progress sink; every hook defaults to a no-op
pub trait PipelineObserver: Debug + Send + Sync {
    /// Current stage moved
    fn stage_changed(&self, _from: Stage, _to: Stage) {}

    /// Agent about to run
    fn agent_started(&self, _agent: AgentKind, _stage: Stage) {}

    /// Agent returned successfully
    fn agent_finished(&self, _agent: AgentKind, _stage: Stage) {}

    /// Agent returned an error
    fn agent_failed(&self, _agent: AgentKind, _error: &AgentError) {}

    /// Batch chosen for a round
    fn batch_selected(&self, _stage: Stage, _node_ids: &[String]) {}

    /// Node content merged and ledger updated
    fn node_updated(&self, _node_id: &str, _status: NodeStatus) {}

    /// One suggestion processed; `kind` is `None` when it could not be decoded
    fn suggestion_applied(
        &self,
        _kind: Option<SuggestionKind>,
        _outcome: Result<(), &SuggestionError>,
    ) {
    }

    /// Inspection round appended to the report log
    fn inspection_recorded(&self, _round: u32, _changes: &ChangeRecord) {}

    /// Driver stopped because the inspection cap was hit
    fn round_limit_reached(&self, _inspection_iter: u32, _max_rounds: u32) {}

    /// Checkpoint written
    fn checkpoint_saved(&self, _path: &Path) {}
}

/// Shared observer handle
pub type SharedObserver = Arc<dyn PipelineObserver>;

/// Discards every event
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopObserver;

impl PipelineObserver for NoopObserver {}

/// Emits every event through `tracing`
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingObserver;

impl PipelineObserver for TracingObserver {
    fn stage_changed(&self, from: Stage, to: Stage) {
        tracing::info!(%from, %to, "stage changed");
    }

    fn agent_started(&self, agent: AgentKind, stage: Stage) {
        tracing::info!(%agent, %stage, "running agent");
    }

    fn agent_finished(&self, agent: AgentKind, stage: Stage) {
        tracing::debug!(%agent, %stage, "agent finished");
    }

    fn agent_failed(&self, agent: AgentKind, error: &AgentError) {
        tracing::error!(%agent, %error, "agent failed");
    }

    fn batch_selected(&self, stage: Stage, node_ids: &[String]) {
        tracing::info!(%stage, count = node_ids.len(), "batch selected");
    }

    fn node_updated(&self, node_id: &str, status: NodeStatus) {
        tracing::debug!(node = node_id, %status, "node updated");
    }

    fn suggestion_applied(&self, kind: Option<SuggestionKind>, outcome: Result<(), &SuggestionError>) {
        let kind = kind.map_or("UNKNOWN", SuggestionKind::as_str);
        match outcome {
            Ok(()) => tracing::info!(kind, "suggestion applied"),
            Err(error) => tracing::warn!(kind, %error, "suggestion failed"),
        }
    }

    fn inspection_recorded(&self, round: u32, changes: &ChangeRecord) {
        tracing::info!(
            round,
            added_nodes = changes.added_nodes.len(),
            removed_nodes = changes.removed_nodes.len(),
            errors = changes.errors.len(),
            "inspection recorded"
        );
    }

    fn round_limit_reached(&self, inspection_iter: u32, max_rounds: u32) {
        tracing::warn!(inspection_iter, max_rounds, "inspection round limit reached, stopping");
    }

    fn checkpoint_saved(&self, path: &Path) {
        tracing::debug!(path = %path.display(), "checkpoint saved");
    }
}

/// Default observer handle
#[must_use]
pub fn tracing_observer() -> SharedObserver {
    Arc::new(TracingObserver)
}
