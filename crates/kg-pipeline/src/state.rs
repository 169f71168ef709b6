//! Pipeline state
//!
//! The aggregate threaded through every stage: topic, graph, current stage,
//! processing ledger and the inspection log. A run owns exactly one state
//! and lends it to agents by `&mut`.
//!
//! Checkpoints are flat JSON:
//! `{topic, current_stage, processed_nodes, inspection_report, inspection_iter, graph}`.

use crate::error::PipelineError;
use crate::ledger::ProcessingLedger;
use crate::mutation::{slugify, ChangeRecord, MutationEngine};
use crate::selector::select_batch;
use crate::stage::{is_loop_back, validate_transition, Stage};
use kg_graph::{
    Attributes, EdgeAttrs, GraphError, GraphSnapshot, KnowledgeGraph, KnowledgeNode, NodeStatus,
    ID_KEY,
};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::path::{Path, PathBuf};

/// One inspection round's report
///
/// The inspector's free-form output is kept verbatim in `body`;
/// `changes_applied` is filled in once its suggestions have been applied.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InspectionReport {
    /// Inspector output (`structural_suggestions`, summaries, errors)
    #[serde(flatten)]
    pub body: Attributes,
    /// Engine change record for this round
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub changes_applied: Option<ChangeRecord>,
}

impl InspectionReport {
    /// Report carrying the given suggestions
    #[must_use]
    pub fn with_suggestions(suggestions: Vec<Value>) -> Self {
        let mut body = Attributes::new();
        body.insert("structural_suggestions".to_string(), Value::Array(suggestions));
        Self {
            body,
            changes_applied: None,
        }
    }

    /// Report recording an inspector failure
    #[must_use]
    pub fn failed(message: impl Into<String>) -> Self {
        let mut body = Attributes::new();
        body.insert("error".to_string(), Value::String(message.into()));
        Self {
            body,
            changes_applied: None,
        }
    }

    /// Parse a report from JSON text
    ///
    /// # Errors
    /// [`PipelineError::Json`] when the text is not an object
    pub fn from_json(text: &str) -> Result<Self, PipelineError> {
        Ok(serde_json::from_str(text)?)
    }

    /// Suggestions to apply; empty when absent or not a list
    #[must_use]
    pub fn structural_suggestions(&self) -> &[Value] {
        self.body
            .get("structural_suggestions")
            .and_then(Value::as_array)
            .map_or(&[][..], Vec::as_slice)
    }

    /// Error text, for failed rounds
    #[must_use]
    pub fn error(&self) -> Option<&str> {
        self.body.get("error").and_then(Value::as_str)
    }
}

/// Aggregate pipeline state
#[derive(Debug, Clone)]
pub struct PipelineState {
    /// Subject of the knowledge graph
    pub topic: String,
    /// The graph
    pub graph: KnowledgeGraph,
    /// Completed-stage sets
    pub processed_nodes: ProcessingLedger,
    /// One entry per inspection round, oldest first
    pub inspection_report: Vec<InspectionReport>,
    /// Times the pipeline looped `inspecting → researching`
    pub inspection_iter: u32,
    current_stage: Stage,
}

impl PipelineState {
    /// Fresh state in `planning`
    #[must_use]
    pub fn new(topic: impl Into<String>) -> Self {
        Self {
            topic: topic.into(),
            graph: KnowledgeGraph::new(),
            processed_nodes: ProcessingLedger::new(),
            inspection_report: Vec::new(),
            inspection_iter: 0,
            current_stage: Stage::Planning,
        }
    }

    /// Resume at `stage` without validation (fixtures, restored runs)
    #[must_use]
    pub fn resume_at(mut self, stage: Stage) -> Self {
        self.current_stage = stage;
        self
    }

    /// Current stage
    #[inline]
    #[must_use]
    pub fn current_stage(&self) -> Stage {
        self.current_stage
    }

    /// Move to `to`, counting `inspecting → researching` loop-backs
    ///
    /// # Errors
    /// [`PipelineError::Stage`] when the move is not in the transition table
    pub fn advance_to(&mut self, to: Stage) -> Result<(), PipelineError> {
        let from = self.current_stage;
        validate_transition(from, to)?;
        if is_loop_back(from, to) {
            self.inspection_iter += 1;
        }
        self.current_stage = to;
        Ok(())
    }

    /// Start over with an empty graph tagged with the topic
    pub fn initialize_graph(&mut self) {
        self.graph = KnowledgeGraph::new();
        self.graph
            .metadata_mut()
            .insert("topic".to_string(), Value::String(self.topic.clone()));
    }

    /// Insert or merge a node
    pub fn add_node(&mut self, id: impl Into<String>, node: KnowledgeNode) -> bool {
        self.graph.add_node(id, node)
    }

    /// Insert an edge (endpoints are created if absent)
    pub fn add_edge(
        &mut self,
        source: impl Into<String>,
        target: impl Into<String>,
        relationship: impl Into<String>,
    ) -> bool {
        self.graph
            .add_edge(source, target, EdgeAttrs::relation(relationship))
    }

    /// Merge stage output into a node, set its status and mark the ledger
    ///
    /// All-or-nothing: a rejected attribute leaves node and ledger untouched.
    ///
    /// # Errors
    /// [`PipelineError::Graph`] when `content` sets `id` or an ill-typed core field
    pub fn update_node_content(
        &mut self,
        node_id: &str,
        content: Attributes,
        status: NodeStatus,
    ) -> Result<(), PipelineError> {
        if content.contains_key(ID_KEY) {
            return Err(GraphError::ReservedKey(ID_KEY.to_string()).into());
        }

        let mut node = self.graph.get_node(node_id);
        node.apply_attributes(content)?;
        node.status = Some(status);

        match self.graph.node_mut(node_id) {
            Some(slot) => *slot = node,
            None => {
                self.graph.add_node(node_id, node);
            }
        }
        self.processed_nodes.mark(status, node_id);
        Ok(())
    }

    /// Eligible ids for `stage`
    #[must_use]
    pub fn next_nodes_to_process(&self, stage: Stage, limit: Option<usize>) -> Vec<String> {
        select_batch(&self.graph, &self.processed_nodes, stage, limit)
    }

    /// Every node edited (never true for an empty graph)
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.graph.node_count() > 0
            && self
                .graph
                .node_ids()
                .all(|id| self.processed_nodes.edited.contains(id))
    }

    /// Apply a report's suggestions, embed the change record and log the report
    pub fn record_inspection(
        &mut self,
        mut report: InspectionReport,
        engine: &MutationEngine,
    ) -> ChangeRecord {
        let changes = engine.apply_suggestions(&mut self.graph, report.structural_suggestions());
        report.changes_applied = Some(changes.clone());
        self.inspection_report.push(report);
        changes
    }

    /// Nodes added by the most recent inspection round
    #[must_use]
    pub fn last_inspection_added(&self) -> usize {
        self.inspection_report
            .last()
            .and_then(|r| r.changes_applied.as_ref())
            .map_or(0, |c| c.added_nodes.len())
    }

    /// API-shaped view of the run
    #[must_use]
    pub fn summary(&self) -> RunSummary {
        RunSummary {
            topic: self.topic.clone(),
            current_stage: self.current_stage,
            steps: 0,
            inspection_iter: self.inspection_iter,
            graph: self.graph.to_snapshot(),
            inspection_report: self.inspection_report.clone(),
            halted: None,
        }
    }

    /// `<dir>/<topic-slug>_<stage>.json`
    #[must_use]
    pub fn checkpoint_path(&self, dir: &Path) -> PathBuf {
        let slug = slugify(&self.topic);
        let stem = if slug.is_empty() { "pipeline" } else { slug.as_str() };
        dir.join(format!("{stem}_{}.json", self.current_stage))
    }

    /// Checkpoint as JSON text
    ///
    /// # Errors
    /// [`PipelineError::Json`] if serialization fails
    pub fn to_json(&self) -> Result<String, PipelineError> {
        let checkpoint = Checkpoint {
            topic: self.topic.clone(),
            current_stage: self.current_stage.as_str().to_string(),
            processed_nodes: self.processed_nodes.clone(),
            inspection_report: self.inspection_report.clone(),
            inspection_iter: self.inspection_iter,
            graph: self.graph.to_snapshot(),
        };
        Ok(serde_json::to_string_pretty(&checkpoint)?)
    }

    /// Restore from checkpoint JSON
    ///
    /// Unknown stage names restore as `completed`.
    ///
    /// # Errors
    /// [`PipelineError::Json`] on malformed JSON
    pub fn from_json(text: &str) -> Result<Self, PipelineError> {
        let checkpoint: Checkpoint = serde_json::from_str(text)?;
        let current_stage = Stage::parse_lenient(&checkpoint.current_stage);

        Ok(Self {
            topic: checkpoint.topic,
            graph: KnowledgeGraph::from_snapshot(checkpoint.graph),
            processed_nodes: checkpoint.processed_nodes,
            inspection_report: checkpoint.inspection_report,
            inspection_iter: checkpoint.inspection_iter,
            current_stage,
        })
    }

    /// Write a checkpoint file
    ///
    /// # Errors
    /// I/O or serialization failure
    pub fn save_state(&self, path: impl AsRef<Path>) -> Result<(), PipelineError> {
        let path = path.as_ref();
        let json = self.to_json()?;
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| PipelineError::io(parent, e))?;
        }
        std::fs::write(path, json).map_err(|e| PipelineError::io(path, e))
    }

    /// Read a checkpoint file
    ///
    /// # Errors
    /// I/O or JSON failure
    pub fn load_state(path: impl AsRef<Path>) -> Result<Self, PipelineError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| PipelineError::io(path, e))?;
        Self::from_json(&text)
    }
}

/// Outcome of a driver run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    /// Topic
    pub topic: String,
    /// Stage the run stopped in
    pub current_stage: Stage,
    /// Driver iterations taken
    pub steps: usize,
    /// Inspection loop-backs taken
    pub inspection_iter: u32,
    /// Final graph
    pub graph: GraphSnapshot,
    /// Inspection log
    pub inspection_report: Vec<InspectionReport>,
    /// Why the run stopped early, if it did
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub halted: Option<String>,
}

#[derive(Serialize, Deserialize)]
struct Checkpoint {
    #[serde(default)]
    topic: String,
    #[serde(default = "planning_stage_name")]
    current_stage: String,
    #[serde(default)]
    processed_nodes: ProcessingLedger,
    #[serde(default, deserialize_with = "report_log")]
    inspection_report: Vec<InspectionReport>,
    #[serde(default)]
    inspection_iter: u32,
    #[serde(default)]
    graph: GraphSnapshot,
}

fn planning_stage_name() -> String {
    Stage::Planning.as_str().to_string()
}

/// Accepts `null`, a single report object, or a list of reports
fn report_log<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<InspectionReport>, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Log {
        Many(Vec<InspectionReport>),
        One(InspectionReport),
    }

    Ok(match Option::<Log>::deserialize(deserializer)? {
        None => Vec::new(),
        Some(Log::Many(reports)) => reports,
        Some(Log::One(report)) => vec![report],
    })
}
