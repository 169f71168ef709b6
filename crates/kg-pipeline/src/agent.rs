//! Stage agents
//!
//! The content-producing collaborators (planner, per-node processors,
//! inspector) sit behind small async traits. The adapters here turn them
//! into [`StageAgent`]s that own the bookkeeping:
//! - [`ArchitectAgent`] installs the skeleton
//! - [`NodeStageAgent`] runs one research/write/edit round
//! - [`InspectorAgent`] applies one round of structural suggestions
//!
//! Per-node calls may run concurrently; their results are applied to the
//! state one at a time, in batch order.

use crate::config::PipelineConfig;
use crate::error::AgentError;
use crate::mutation::{slugify, MutationEngine};
use crate::observer::{tracing_observer, SharedObserver};
use crate::selector::completion_status;
use crate::stage::{AgentKind, Stage};
use crate::state::{InspectionReport, PipelineState};
use futures::stream::{self, StreamExt};
use kg_graph::{
    Attributes, EdgeRecord, GraphSnapshot, KnowledgeGraph, KnowledgeNode, NodeRecord, NodeStatus,
    NodeType,
};
use serde::{Deserialize, Serialize};

/// One pipeline stage's worker
#[async_trait::async_trait]
pub trait StageAgent: Send + Sync {
    /// Which agent this is
    fn kind(&self) -> AgentKind;

    /// Run one round against the state
    async fn run(&self, state: &mut PipelineState) -> Result<(), AgentError>;
}

/// Initial graph proposed for a topic
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Skeleton {
    /// Nodes
    #[serde(default)]
    pub nodes: Vec<NodeRecord>,
    /// Edges
    #[serde(default)]
    pub edges: Vec<EdgeRecord>,
}

/// Proposes the initial skeleton
#[async_trait::async_trait]
pub trait SkeletonPlanner: Send + Sync {
    /// Plan a skeleton for `topic`
    async fn plan(&self, topic: &str) -> Result<Skeleton, AgentError>;
}

/// What a per-node processor sees
#[derive(Debug, Clone, PartialEq)]
pub struct NodeContext {
    /// Node id
    pub id: String,
    /// Node attributes at selection time
    pub node: KnowledgeNode,
    /// Adjacent nodes (successors, then predecessors)
    pub neighbors: Vec<NodeRecord>,
}

impl NodeContext {
    /// Snapshot `id` and its neighborhood
    #[must_use]
    pub fn gather(graph: &KnowledgeGraph, id: &str) -> Self {
        let neighbors = graph
            .neighbors(id)
            .into_iter()
            .map(|n| NodeRecord {
                node: graph.get_node(&n),
                id: n,
            })
            .collect();
        Self {
            id: id.to_string(),
            node: graph.get_node(id),
            neighbors,
        }
    }
}

/// Produces content for one node (research, draft or edit)
#[async_trait::async_trait]
pub trait NodeProcessor: Send + Sync {
    /// Content to merge into the node
    async fn process(&self, topic: &str, node: &NodeContext) -> Result<Attributes, AgentError>;

    /// Content used when [`Self::process`] fails, so the stage still drains
    fn fallback(&self, _node: &NodeContext, _error: &AgentError) -> Attributes {
        Attributes::new()
    }
}

/// Reviews the whole graph and proposes structural changes
#[async_trait::async_trait]
pub trait SuggestionSource: Send + Sync {
    /// Inspection report carrying `structural_suggestions`
    async fn inspect(
        &self,
        topic: &str,
        graph: &GraphSnapshot,
    ) -> Result<InspectionReport, AgentError>;
}

/// Skeleton-building agent
pub struct ArchitectAgent<P> {
    planner: P,
}

impl<P: SkeletonPlanner> ArchitectAgent<P> {
    /// Wrap a planner
    pub fn new(planner: P) -> Self {
        Self { planner }
    }

    fn fallback_skeleton(topic: &str) -> Skeleton {
        let slug = slugify(topic);
        let id = if slug.is_empty() { "core".to_string() } else { slug };
        Skeleton {
            nodes: vec![NodeRecord {
                id,
                node: KnowledgeNode::titled(topic)
                    .with_type(NodeType::Core)
                    .with_description(format!("Core concept: {topic}")),
            }],
            edges: Vec::new(),
        }
    }
}

#[async_trait::async_trait]
impl<P: SkeletonPlanner> StageAgent for ArchitectAgent<P> {
    fn kind(&self) -> AgentKind {
        AgentKind::Architect
    }

    async fn run(&self, state: &mut PipelineState) -> Result<(), AgentError> {
        let skeleton = match self.planner.plan(&state.topic).await {
            Ok(skeleton) if !skeleton.nodes.is_empty() => skeleton,
            Ok(_) => {
                tracing::warn!(topic = %state.topic, "planner returned no nodes, using fallback skeleton");
                Self::fallback_skeleton(&state.topic)
            }
            Err(error) => {
                tracing::warn!(topic = %state.topic, %error, "planning failed, using fallback skeleton");
                Self::fallback_skeleton(&state.topic)
            }
        };

        state.initialize_graph();
        for NodeRecord { id, mut node } in skeleton.nodes {
            node.status = Some(NodeStatus::Created);
            state.add_node(id, node);
        }
        for edge in skeleton.edges {
            state.graph.add_edge(edge.source, edge.target, edge.attrs);
        }

        tracing::info!(
            nodes = state.graph.node_count(),
            edges = state.graph.edge_count(),
            "skeleton installed"
        );
        Ok(())
    }
}

/// Research, write or edit agent
pub struct NodeStageAgent<P> {
    kind: AgentKind,
    stage: Stage,
    status: NodeStatus,
    processor: P,
    concurrency: usize,
    batch_limit: Option<usize>,
    observer: SharedObserver,
}

impl<P: NodeProcessor> NodeStageAgent<P> {
    fn build(kind: AgentKind, stage: Stage, status: NodeStatus, processor: P) -> Self {
        Self {
            kind,
            stage,
            status,
            processor,
            concurrency: 1,
            batch_limit: None,
            observer: tracing_observer(),
        }
    }

    /// Researcher: `researching`, marks `researched`
    pub fn researcher(processor: P) -> Self {
        Self::build(AgentKind::Researcher, Stage::Researching, NodeStatus::Researched, processor)
    }

    /// Writer: `writing`, marks `written`
    pub fn writer(processor: P) -> Self {
        Self::build(AgentKind::Writer, Stage::Writing, NodeStatus::Written, processor)
    }

    /// Editor: `editing`, marks `edited`
    pub fn editor(processor: P) -> Self {
        Self::build(AgentKind::Editor, Stage::Editing, NodeStatus::Edited, processor)
    }

    /// Concurrency and batch limit from config
    #[must_use]
    pub fn configured(mut self, config: &PipelineConfig) -> Self {
        self.concurrency = config.concurrency.max(1);
        self.batch_limit = config.batch_limit;
        self
    }

    /// With observer
    #[must_use]
    pub fn with_observer(mut self, observer: SharedObserver) -> Self {
        self.observer = observer;
        self
    }

    /// Stage this agent works in
    #[must_use]
    pub fn stage(&self) -> Stage {
        self.stage
    }
}

#[async_trait::async_trait]
impl<P: NodeProcessor> StageAgent for NodeStageAgent<P> {
    fn kind(&self) -> AgentKind {
        self.kind
    }

    async fn run(&self, state: &mut PipelineState) -> Result<(), AgentError> {
        debug_assert_eq!(completion_status(self.stage), Some(self.status));

        let batch = state.next_nodes_to_process(self.stage, self.batch_limit);
        self.observer.batch_selected(self.stage, &batch);
        if batch.is_empty() {
            return Ok(());
        }

        let contexts: Vec<NodeContext> = batch
            .iter()
            .map(|id| NodeContext::gather(&state.graph, id))
            .collect();
        let topic = state.topic.clone();
        let processor = &self.processor;

        // calls overlap; results come back in batch order
        let results: Vec<(NodeContext, Result<Attributes, AgentError>)> = stream::iter(contexts)
            .map(|ctx| {
                let topic = topic.as_str();
                async move {
                    let result = processor.process(topic, &ctx).await;
                    (ctx, result)
                }
            })
            .buffered(self.concurrency.max(1))
            .collect()
            .await;

        for (ctx, result) in results {
            let content = match result {
                Ok(content) => content,
                Err(error) => {
                    tracing::warn!(agent = %self.kind, node = %ctx.id, %error, "node processing failed, using fallback");
                    self.processor.fallback(&ctx, &error)
                }
            };
            self.apply_content(state, &ctx, content)?;
            self.observer.node_updated(&ctx.id, self.status);
        }
        Ok(())
    }
}

impl<P: NodeProcessor> NodeStageAgent<P> {
    /// Store content for one node; ill-typed content degrades to the
    /// fallback, then to an empty update, so the node is still marked
    fn apply_content(
        &self,
        state: &mut PipelineState,
        ctx: &NodeContext,
        content: Attributes,
    ) -> Result<(), AgentError> {
        let Err(rejected) = state.update_node_content(&ctx.id, content, self.status) else {
            return Ok(());
        };
        tracing::warn!(agent = %self.kind, node = %ctx.id, error = %rejected, "node content rejected, using fallback");
        let error = AgentError::MalformedResponse(rejected.to_string());
        if state
            .update_node_content(&ctx.id, self.processor.fallback(ctx, &error), self.status)
            .is_ok()
        {
            return Ok(());
        }
        state.update_node_content(&ctx.id, Attributes::new(), self.status)?;
        Ok(())
    }
}

/// Structural review agent
pub struct InspectorAgent<S> {
    source: S,
    engine: MutationEngine,
    observer: SharedObserver,
}

impl<S: SuggestionSource> InspectorAgent<S> {
    /// Wrap a suggestion source
    pub fn new(source: S, engine: MutationEngine) -> Self {
        Self {
            source,
            engine,
            observer: tracing_observer(),
        }
    }

    /// With observer
    #[must_use]
    pub fn with_observer(mut self, observer: SharedObserver) -> Self {
        self.observer = observer;
        self
    }
}

#[async_trait::async_trait]
impl<S: SuggestionSource> StageAgent for InspectorAgent<S> {
    fn kind(&self) -> AgentKind {
        AgentKind::Inspector
    }

    async fn run(&self, state: &mut PipelineState) -> Result<(), AgentError> {
        let snapshot = state.graph.to_snapshot();
        match self.source.inspect(&state.topic, &snapshot).await {
            Ok(report) => {
                let changes = state.record_inspection(report, &self.engine);
                let round = u32::try_from(state.inspection_report.len()).unwrap_or(u32::MAX);
                self.observer.inspection_recorded(round, &changes);
                Ok(())
            }
            Err(error) => {
                state
                    .inspection_report
                    .push(InspectionReport::failed(error.to_string()));
                Err(error)
            }
        }
    }
}

/// One agent per [`AgentKind`]
pub struct AgentSet {
    architect: Box<dyn StageAgent>,
    researcher: Box<dyn StageAgent>,
    writer: Box<dyn StageAgent>,
    editor: Box<dyn StageAgent>,
    inspector: Box<dyn StageAgent>,
}

impl AgentSet {
    /// Assemble from prebuilt agents
    pub fn new(
        architect: Box<dyn StageAgent>,
        researcher: Box<dyn StageAgent>,
        writer: Box<dyn StageAgent>,
        editor: Box<dyn StageAgent>,
        inspector: Box<dyn StageAgent>,
    ) -> Self {
        Self {
            architect,
            researcher,
            writer,
            editor,
            inspector,
        }
    }

    /// Standard adapters around the given collaborators
    pub fn standard<A, R, W, E, I>(
        config: &PipelineConfig,
        observer: &SharedObserver,
        planner: A,
        researcher: R,
        writer: W,
        editor: E,
        inspector: I,
    ) -> Self
    where
        A: SkeletonPlanner + 'static,
        R: NodeProcessor + 'static,
        W: NodeProcessor + 'static,
        E: NodeProcessor + 'static,
        I: SuggestionSource + 'static,
    {
        let engine = MutationEngine::new(config.mutation).with_observer(observer.clone());
        Self::new(
            Box::new(ArchitectAgent::new(planner)),
            Box::new(
                NodeStageAgent::researcher(researcher)
                    .configured(config)
                    .with_observer(observer.clone()),
            ),
            Box::new(
                NodeStageAgent::writer(writer)
                    .configured(config)
                    .with_observer(observer.clone()),
            ),
            Box::new(
                NodeStageAgent::editor(editor)
                    .configured(config)
                    .with_observer(observer.clone()),
            ),
            Box::new(InspectorAgent::new(inspector, engine).with_observer(observer.clone())),
        )
    }

    /// Agent for `kind`
    #[must_use]
    pub fn get(&self, kind: AgentKind) -> &dyn StageAgent {
        match kind {
            AgentKind::Architect => self.architect.as_ref(),
            AgentKind::Researcher => self.researcher.as_ref(),
            AgentKind::Writer => self.writer.as_ref(),
            AgentKind::Editor => self.editor.as_ref(),
            AgentKind::Inspector => self.inspector.as_ref(),
        }
    }
}
