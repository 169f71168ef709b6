//! Error types for the pipeline
//!
//! Provides error handling for:
//! - Checkpoint persistence (I/O, JSON)
//! - Configuration loading and validation
//! - Illegal stage transitions
//! - Stage agent failures
//! - Per-suggestion failures inside a mutation batch

use crate::stage::{AgentKind, IllegalTransition};
use kg_graph::GraphError;
use std::path::PathBuf;

/// Main pipeline error type
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// Graph store rejected an update
    #[error("graph error: {0}")]
    Graph(#[from] GraphError),

    /// Checkpoint file could not be read or written
    #[error("checkpoint i/o failed for {path}: {source}")]
    Io {
        /// File involved
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// JSON encode/decode failure
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration file could not be parsed
    #[error("config parse error: {0}")]
    ConfigParse(#[from] toml::de::Error),

    /// Configuration values are inconsistent
    #[error("configuration error: {0}")]
    Config(String),

    /// Stage move outside the transition table
    #[error(transparent)]
    Stage(#[from] IllegalTransition),

    /// A stage agent failed
    #[error("{agent} agent failed: {source}")]
    Agent {
        /// Which agent
        agent: AgentKind,
        /// Underlying failure
        #[source]
        source: AgentError,
    },
}

impl PipelineError {
    /// Wrap an I/O error with the path involved
    #[inline]
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Check if error is retryable
    ///
    /// The core never retries; this is a hint for the driver's caller.
    #[inline]
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Io { .. } | Self::Agent { source: AgentError::Upstream(_), .. }
        )
    }
}

/// Stage agent failures
#[derive(Debug, thiserror::Error)]
pub enum AgentError {
    /// Collaborator (model, search tool) call failed
    #[error("upstream call failed: {0}")]
    Upstream(String),

    /// Collaborator answered with something unusable
    #[error("malformed response: {0}")]
    MalformedResponse(String),

    /// Agent touched the graph in a way the store rejected
    #[error(transparent)]
    Pipeline(#[from] Box<PipelineError>),
}

impl From<PipelineError> for AgentError {
    fn from(value: PipelineError) -> Self {
        Self::Pipeline(Box::new(value))
    }
}

/// Failure of a single structural suggestion
///
/// The `Display` text is what the change record stores in `errors`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SuggestionError {
    /// Suggestion is not a JSON object
    #[error("suggestion is not an object")]
    NotAnObject,

    /// `suggestion_type` missing or not recognized
    #[error("unknown suggestion type: {0}")]
    UnknownType(String),

    /// Required field missing or of the wrong shape
    #[error("{kind} suggestion is missing {field}")]
    MissingField {
        /// Suggestion type
        kind: &'static str,
        /// Field path
        field: &'static str,
    },

    /// Payload could not be decoded
    #[error("{kind} suggestion is malformed: {reason}")]
    Malformed {
        /// Suggestion type
        kind: &'static str,
        /// Decoder message
        reason: String,
    },

    /// Edge endpoint does not exist
    #[error("Cannot add edge: missing nodes {source_id} or {target_id}")]
    MissingEndpoint {
        /// Edge source
        source_id: String,
        /// Edge target
        target_id: String,
    },

    /// DEEPEN_NODE parent does not exist
    #[error("Cannot deepen node: Parent node with ID '{0}' not found.")]
    MissingParent(String),

    /// Sub-node without id or title
    #[error("Skipping sub-node for {0} due to missing title or node_id.")]
    IncompleteSubNode(String),

    /// Merge member does not exist
    #[error("MERGE: node '{0}' to merge does not exist")]
    MissingMergeMember(String),

    /// REFACTOR_AND_PROMOTE endpoints missing
    #[error("REFACTOR: One or both nodes do not exist: {node_to_delete}, {new_parent}")]
    MissingRefactorNodes {
        /// Node to delete
        node_to_delete: String,
        /// New parent
        new_parent: String,
    },

    /// REFACTOR_AND_PROMOTE with identical endpoints
    #[error("REFACTOR: node '{0}' cannot be its own new parent")]
    RefactorOntoSelf(String),

    /// DELETE_NODE rejected by the orphaning policy
    #[error("DELETE: node '{node_id}' still has {children} child edge(s); use REFACTOR_AND_PROMOTE")]
    WouldOrphan {
        /// Node id
        node_id: String,
        /// Live out-edges
        children: usize,
    },

    /// Graph store rejected an attribute
    #[error("graph rejected update: {0}")]
    Graph(String),
}

impl SuggestionError {
    /// Missing field helper
    #[inline]
    #[must_use]
    pub fn missing(kind: &'static str, field: &'static str) -> Self {
        Self::MissingField { kind, field }
    }

    /// Whether this is a reference error (as opposed to a malformed payload)
    #[must_use]
    pub fn is_reference_error(&self) -> bool {
        matches!(
            self,
            Self::MissingEndpoint { .. }
                | Self::MissingParent(_)
                | Self::MissingMergeMember(_)
                | Self::MissingRefactorNodes { .. }
        )
    }
}

impl From<GraphError> for SuggestionError {
    fn from(value: GraphError) -> Self {
        Self::Graph(value.to_string())
    }
}
