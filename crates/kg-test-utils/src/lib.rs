//! Testing utilities for the knowledge-graph workspace
//!
//! Shared fixtures, scripted stage collaborators and a recording observer.

#![allow(missing_docs)]

use kg_graph::{
    Attributes, EdgeAttrs, EdgeRecord, GraphSnapshot, KnowledgeGraph, KnowledgeNode, NodeRecord, NodeStatus,
    NodeType, IS_COMPONENT_OF, IS_PREREQUISITE_FOR, RELATED_TO,
};
use kg_pipeline::{
    AgentError, AgentKind, ChangeRecord, InspectionReport, NodeContext, NodeProcessor,
    PipelineObserver, Skeleton, SkeletonPlanner, Stage, SuggestionError, SuggestionKind,
    SuggestionSource,
};
use serde_json::{json, Value};
use std::collections::VecDeque;
use std::path::Path;
use std::sync::Mutex;

// ---------------------------------------------------------------------------
// Graph fixtures
// ---------------------------------------------------------------------------

/// `rust` core with a prerequisite and two components
pub fn sample_graph() -> KnowledgeGraph {
    let mut graph = KnowledgeGraph::new();
    graph.add_node("rust", KnowledgeNode::titled("Rust").with_type(NodeType::Core));
    graph.add_node(
        "memory",
        KnowledgeNode::titled("Memory management").with_type(NodeType::Prerequisite),
    );
    graph.add_node(
        "ownership",
        KnowledgeNode::titled("Ownership").with_type(NodeType::Component),
    );
    graph.add_node(
        "borrowing",
        KnowledgeNode::titled("Borrowing").with_type(NodeType::Component),
    );
    graph.add_edge("memory", "rust", EdgeAttrs::relation(IS_PREREQUISITE_FOR));
    graph.add_edge("rust", "ownership", EdgeAttrs::relation(IS_COMPONENT_OF));
    graph.add_edge("rust", "borrowing", EdgeAttrs::relation(IS_COMPONENT_OF));
    graph.add_edge("ownership", "borrowing", EdgeAttrs::relation(RELATED_TO));
    graph
}

/// `x → a`, `b → y`: merging `{a, b}` must yield `x → m → y`
pub fn merge_fixture() -> KnowledgeGraph {
    let mut graph = KnowledgeGraph::new();
    for id in ["x", "a", "b", "y"] {
        graph.add_node(id, KnowledgeNode::titled(id.to_uppercase()));
    }
    graph.add_edge("x", "a", EdgeAttrs::relation(RELATED_TO));
    graph.add_edge("b", "y", EdgeAttrs::relation(IS_COMPONENT_OF));
    graph
}

/// Parent `p` with children `c1`, `c2`, plus an unrelated `q`
pub fn refactor_fixture() -> KnowledgeGraph {
    let mut graph = KnowledgeGraph::new();
    for id in ["p", "c1", "c2", "q"] {
        graph.add_node(id, KnowledgeNode::titled(id.to_uppercase()));
    }
    graph.add_edge("p", "c1", EdgeAttrs::relation(IS_COMPONENT_OF));
    graph.add_edge("p", "c2", EdgeAttrs::relation(IS_COMPONENT_OF));
    graph
}

/// Skeleton for the sample topic, statuses unset
pub fn sample_skeleton() -> Skeleton {
    let snapshot = sample_graph().to_snapshot();
    Skeleton {
        nodes: snapshot.nodes,
        edges: snapshot.edges,
    }
}

/// `(source, target, relationship)` triples, sorted
pub fn edge_triples(graph: &KnowledgeGraph) -> Vec<(String, String, String)> {
    let mut triples: Vec<_> = graph
        .get_edges()
        .into_iter()
        .map(|EdgeRecord { source, target, attrs }| {
            let rel = attrs.relationship_or_default().to_string();
            (source, target, rel)
        })
        .collect();
    triples.sort();
    triples
}

/// Triple helper for assertions
pub fn triple(source: &str, target: &str, relationship: &str) -> (String, String, String) {
    (source.to_string(), target.to_string(), relationship.to_string())
}

// ---------------------------------------------------------------------------
// Suggestion builders
// ---------------------------------------------------------------------------

pub fn add_node(id: &str, title: &str, node_type: &str) -> Value {
    json!({
        "suggestion_type": "ADD_NODE",
        "details": {"suggested_node": {"node_id": id, "title": title, "type": node_type}}
    })
}

pub fn add_connected_node(id: &str, title: &str, source: &str, target: &str, relationship: &str) -> Value {
    json!({
        "suggestion_type": "ADD_NODE",
        "details": {
            "suggested_node": {"node_id": id, "title": title, "type": "component"},
            "connect_to": {"source_id": source, "target_id": target, "relationship": relationship}
        }
    })
}

pub fn deepen_node(parent: &str, children: &[(&str, &str)]) -> Value {
    let subs: Vec<Value> = children
        .iter()
        .map(|(id, title)| json!({"node_id": id, "title": title}))
        .collect();
    json!({
        "suggestion_type": "DEEPEN_NODE",
        "details": {"target_node_id": parent, "suggested_sub_components": subs}
    })
}

pub fn delete_node(id: &str, reason: &str) -> Value {
    json!({
        "suggestion_type": "DELETE_NODE",
        "reason": reason,
        "details": {"node_id": id}
    })
}

pub fn merge_nodes(members: &[&str], new_id: &str, new_title: &str) -> Value {
    json!({
        "suggestion_type": "MERGE_NODES",
        "details": {
            "nodes_to_merge": members,
            "new_node": {"node_id": new_id, "title": new_title, "type": "component"}
        }
    })
}

pub fn refactor_and_promote(node_to_delete: &str, new_parent: &str) -> Value {
    json!({
        "suggestion_type": "REFACTOR_AND_PROMOTE",
        "details": {"node_to_delete": node_to_delete, "new_parent_node": new_parent}
    })
}

// ---------------------------------------------------------------------------
// Scripted collaborators
// ---------------------------------------------------------------------------

/// Returns a fixed skeleton, or fails when `None`
#[derive(Debug, Clone, Default)]
pub struct ScriptedPlanner {
    pub skeleton: Option<Skeleton>,
}

impl ScriptedPlanner {
    pub fn new(skeleton: Skeleton) -> Self {
        Self {
            skeleton: Some(skeleton),
        }
    }

    pub fn failing() -> Self {
        Self { skeleton: None }
    }
}

#[async_trait::async_trait]
impl SkeletonPlanner for ScriptedPlanner {
    async fn plan(&self, _topic: &str) -> Result<Skeleton, AgentError> {
        self.skeleton
            .clone()
            .ok_or_else(|| AgentError::Upstream("planner unavailable".to_string()))
    }
}

/// Writes `{field: "<field> for <id>"}` for every node
#[derive(Debug, Clone)]
pub struct EchoProcessor {
    pub field: &'static str,
    pub fail_on: Vec<String>,
}

impl EchoProcessor {
    pub fn new(field: &'static str) -> Self {
        Self {
            field,
            fail_on: Vec::new(),
        }
    }

    pub fn failing_on(mut self, id: &str) -> Self {
        self.fail_on.push(id.to_string());
        self
    }
}

#[async_trait::async_trait]
impl NodeProcessor for EchoProcessor {
    async fn process(&self, _topic: &str, node: &NodeContext) -> Result<Attributes, AgentError> {
        if self.fail_on.contains(&node.id) {
            return Err(AgentError::MalformedResponse(format!("no content for {}", node.id)));
        }
        let mut content = Attributes::new();
        content.insert(
            self.field.to_string(),
            Value::String(format!("{} for {}", self.field, node.id)),
        );
        Ok(content)
    }

    fn fallback(&self, _node: &NodeContext, _error: &AgentError) -> Attributes {
        let mut content = Attributes::new();
        content.insert(self.field.to_string(), Value::String(String::new()));
        content
    }
}

/// Plays back one suggestion batch per round; empty batches once exhausted
#[derive(Debug, Default)]
pub struct ScriptedInspector {
    rounds: Mutex<VecDeque<Result<Vec<Value>, String>>>,
}

impl ScriptedInspector {
    pub fn new(rounds: Vec<Vec<Value>>) -> Self {
        Self {
            rounds: Mutex::new(rounds.into_iter().map(Ok).collect()),
        }
    }

    /// Queue a failing round
    pub fn then_fail(self, message: &str) -> Self {
        self.rounds.lock().unwrap().push_back(Err(message.to_string()));
        self
    }

    /// Adds one fresh node every round, forever
    pub fn always_growing() -> AlwaysGrowing {
        AlwaysGrowing::default()
    }
}

#[async_trait::async_trait]
impl SuggestionSource for ScriptedInspector {
    async fn inspect(
        &self,
        _topic: &str,
        _graph: &GraphSnapshot,
    ) -> Result<InspectionReport, AgentError> {
        let next = self.rounds.lock().unwrap().pop_front();
        match next {
            Some(Ok(suggestions)) => Ok(InspectionReport::with_suggestions(suggestions)),
            Some(Err(message)) => Err(AgentError::Upstream(message)),
            None => Ok(InspectionReport::with_suggestions(Vec::new())),
        }
    }
}

/// Inspector that never settles
#[derive(Debug, Default)]
pub struct AlwaysGrowing {
    round: Mutex<usize>,
}

#[async_trait::async_trait]
impl SuggestionSource for AlwaysGrowing {
    async fn inspect(
        &self,
        _topic: &str,
        graph: &GraphSnapshot,
    ) -> Result<InspectionReport, AgentError> {
        let round = {
            let mut guard = self.round.lock().unwrap();
            *guard += 1;
            *guard
        };
        let parent = graph.nodes.first().map_or("rust", |n| n.id.as_str());
        let id = format!("extra-{round}");
        Ok(InspectionReport::with_suggestions(vec![add_connected_node(
            &id,
            &format!("Extra {round}"),
            parent,
            &id,
            IS_COMPONENT_OF,
        )]))
    }
}

// ---------------------------------------------------------------------------
// Observer
// ---------------------------------------------------------------------------

/// Observer event, flattened for assertions
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    StageChanged(Stage, Stage),
    AgentStarted(AgentKind, Stage),
    AgentFailed(AgentKind),
    BatchSelected(Stage, Vec<String>),
    NodeUpdated(String, NodeStatus),
    SuggestionApplied(Option<SuggestionKind>, bool),
    InspectionRecorded(u32, usize),
    RoundLimitReached(u32),
    CheckpointSaved(String),
}

/// Records every event in order
#[derive(Debug, Default)]
pub struct RecordingObserver {
    events: Mutex<Vec<Event>>,
}

impl RecordingObserver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<Event> {
        self.events.lock().unwrap().clone()
    }

    /// Stages entered, in order
    pub fn stages(&self) -> Vec<Stage> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                Event::StageChanged(_, to) => Some(to),
                _ => None,
            })
            .collect()
    }

    fn push(&self, event: Event) {
        self.events.lock().unwrap().push(event);
    }
}

impl PipelineObserver for RecordingObserver {
    fn stage_changed(&self, from: Stage, to: Stage) {
        self.push(Event::StageChanged(from, to));
    }

    fn agent_started(&self, agent: AgentKind, stage: Stage) {
        self.push(Event::AgentStarted(agent, stage));
    }

    fn agent_failed(&self, agent: AgentKind, _error: &AgentError) {
        self.push(Event::AgentFailed(agent));
    }

    fn batch_selected(&self, stage: Stage, node_ids: &[String]) {
        self.push(Event::BatchSelected(stage, node_ids.to_vec()));
    }

    fn node_updated(&self, node_id: &str, status: NodeStatus) {
        self.push(Event::NodeUpdated(node_id.to_string(), status));
    }

    fn suggestion_applied(&self, kind: Option<SuggestionKind>, outcome: Result<(), &SuggestionError>) {
        self.push(Event::SuggestionApplied(kind, outcome.is_ok()));
    }

    fn inspection_recorded(&self, round: u32, changes: &ChangeRecord) {
        self.push(Event::InspectionRecorded(round, changes.added_nodes.len()));
    }

    fn round_limit_reached(&self, inspection_iter: u32, _max_rounds: u32) {
        self.push(Event::RoundLimitReached(inspection_iter));
    }

    fn checkpoint_saved(&self, path: &Path) {
        self.push(Event::CheckpointSaved(path.display().to_string()));
    }
}

/// Node record helper
pub fn record(id: &str, node: KnowledgeNode) -> NodeRecord {
    NodeRecord {
        id: id.to_string(),
        node,
    }
}
