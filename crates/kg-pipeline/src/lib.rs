//! KG Pipeline - staged knowledge-graph generation
//!
//! Drives a topic from an empty graph to an edited, inspected knowledge graph:
//! - Closed stage enum with a deterministic transition table
//! - Processing ledger gating which nodes each batch stage picks up
//! - Structural mutation engine applying inspector suggestions per item
//! - JSON checkpoints compatible with older, looser layouts
//! - Async agent seams with bounded per-node concurrency
//!
//! # Example
//!
//! ```rust
//! use kg_pipeline::{MutationEngine, PipelineState, Stage, next_step};
//! use serde_json::json;
//!
//! let mut state = PipelineState::new("Rust ownership");
//! let changes = MutationEngine::default().apply_suggestions(
//!     &mut state.graph,
//!     &[json!({
//!         "suggestion_type": "ADD_NODE",
//!         "details": {"suggested_node": {"node_id": "ownership", "title": "Ownership", "type": "core"}}
//!     })],
//! );
//! assert!(changes.errors.is_empty());
//! assert_eq!(next_step(Stage::EditorFinished).stage, Stage::Inspecting);
//! ```

#![warn(unreachable_pub)]

pub mod agent;
pub mod config;
pub mod driver;
pub mod error;
pub mod ledger;
pub mod logging;
pub mod mutation;
pub mod observer;
pub mod selector;
pub mod stage;
pub mod state;

pub use agent::{
    AgentSet, ArchitectAgent, InspectorAgent, NodeContext, NodeProcessor, NodeStageAgent,
    Skeleton, SkeletonPlanner, StageAgent, SuggestionSource,
};
pub use config::PipelineConfig;
pub use driver::Pipeline;
pub use error::{AgentError, PipelineError, SuggestionError};
pub use ledger::ProcessingLedger;
pub use mutation::{
    ChangeRecord, Connection, EdgeChange, MutationEngine, MutationPolicy, NodeProposal,
    RemovedNodeEntry, Suggestion, SuggestionKind,
};
pub use observer::{NoopObserver, PipelineObserver, SharedObserver, TracingObserver};
pub use selector::{completion_status, select_batch};
pub use stage::{
    next_step, next_step_for, stage_after_round, AgentKind, IllegalTransition, RoundOutcome,
    Stage, Step,
};
pub use state::{InspectionReport, PipelineState, RunSummary};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
