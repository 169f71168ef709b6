//! Stage scheduler
//!
//! Closed set of pipeline stages plus the deterministic transition table:
//! `planning → architect_finished → researching → research_finished →
//! writing → write_finished → editing → editor_finished → inspecting →
//! inspection_finished → completed`.
//!
//! The four work stages self-loop until their batch drains. The one
//! backward edge is `inspecting → researching`, taken when an inspection
//! round added nodes.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Pipeline stage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// Nothing built yet
    Planning,
    /// Skeleton in place
    ArchitectFinished,
    /// Research rounds in progress
    Researching,
    /// Every node researched
    ResearchFinished,
    /// Writing rounds in progress
    Writing,
    /// Every researched node written
    WriteFinished,
    /// Editing rounds in progress
    Editing,
    /// Every written node edited
    EditorFinished,
    /// Global structural review in progress
    Inspecting,
    /// Review added nothing
    InspectionFinished,
    /// Terminal
    Completed,
}

impl Stage {
    /// Every stage in pipeline order
    pub const ALL: [Stage; 11] = [
        Stage::Planning,
        Stage::ArchitectFinished,
        Stage::Researching,
        Stage::ResearchFinished,
        Stage::Writing,
        Stage::WriteFinished,
        Stage::Editing,
        Stage::EditorFinished,
        Stage::Inspecting,
        Stage::InspectionFinished,
        Stage::Completed,
    ];

    /// Wire name
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Planning => "planning",
            Self::ArchitectFinished => "architect_finished",
            Self::Researching => "researching",
            Self::ResearchFinished => "research_finished",
            Self::Writing => "writing",
            Self::WriteFinished => "write_finished",
            Self::Editing => "editing",
            Self::EditorFinished => "editor_finished",
            Self::Inspecting => "inspecting",
            Self::InspectionFinished => "inspection_finished",
            Self::Completed => "completed",
        }
    }

    /// Parse a stage name, failing safe to [`Stage::Completed`]
    #[must_use]
    pub fn parse_lenient(name: &str) -> Stage {
        name.parse().unwrap_or_else(|_: UnknownStage| {
            tracing::warn!(stage = name, "unrecognized stage, treating as completed");
            Stage::Completed
        })
    }

    /// Terminal stage
    #[inline]
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed)
    }

    /// Stages driven by batch selection
    #[inline]
    #[must_use]
    pub fn is_batch_stage(self) -> bool {
        matches!(self, Self::Researching | Self::Writing | Self::Editing)
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Stage name outside the closed set
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown stage: {0}")]
pub struct UnknownStage(pub String);

impl FromStr for Stage {
    type Err = UnknownStage;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Stage::ALL
            .into_iter()
            .find(|stage| stage.as_str() == s)
            .ok_or_else(|| UnknownStage(s.to_string()))
    }
}

/// Stage agent roles
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentKind {
    /// Builds the initial skeleton
    Architect,
    /// Attaches research content
    Researcher,
    /// Drafts text
    Writer,
    /// Polishes drafts
    Editor,
    /// Proposes structural edits
    Inspector,
}

impl AgentKind {
    /// Every agent
    pub const ALL: [AgentKind; 5] = [
        AgentKind::Architect,
        AgentKind::Researcher,
        AgentKind::Writer,
        AgentKind::Editor,
        AgentKind::Inspector,
    ];

    /// Wire name
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Architect => "architect",
            Self::Researcher => "researcher",
            Self::Writer => "writer",
            Self::Editor => "editor",
            Self::Inspector => "inspector",
        }
    }
}

impl fmt::Display for AgentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Scheduler decision: which agent to run, in which stage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Step {
    /// Agent to invoke; `None` means the run is done
    pub agent: Option<AgentKind>,
    /// Stage the state should be in while that agent runs
    pub stage: Stage,
}

impl Step {
    fn run(agent: AgentKind, stage: Stage) -> Self {
        Self {
            agent: Some(agent),
            stage,
        }
    }

    fn done() -> Self {
        Self {
            agent: None,
            stage: Stage::Completed,
        }
    }

    /// Whether the pipeline is finished
    #[inline]
    #[must_use]
    pub fn is_done(&self) -> bool {
        self.agent.is_none()
    }
}

/// What an agent round produced, as far as stage progression cares
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoundOutcome {
    /// Architect installed a skeleton
    Planned,
    /// Batch round finished; this many nodes are still eligible
    Remaining(usize),
    /// Inspection round finished with this many nodes added
    Inspected {
        /// Nodes added by the applied suggestions
        added_nodes: usize,
    },
}

/// Next agent and stage for the current stage
#[must_use]
pub fn next_step(current: Stage) -> Step {
    match current {
        Stage::Planning => Step::run(AgentKind::Architect, Stage::Planning),
        Stage::ArchitectFinished | Stage::Researching => {
            Step::run(AgentKind::Researcher, Stage::Researching)
        }
        Stage::ResearchFinished | Stage::Writing => Step::run(AgentKind::Writer, Stage::Writing),
        Stage::WriteFinished | Stage::Editing => Step::run(AgentKind::Editor, Stage::Editing),
        Stage::EditorFinished | Stage::Inspecting => {
            Step::run(AgentKind::Inspector, Stage::Inspecting)
        }
        Stage::InspectionFinished | Stage::Completed => Step::done(),
    }
}

/// [`next_step`] on a raw stage name; unknown names route to completion
#[must_use]
pub fn next_step_for(name: &str) -> Step {
    next_step(Stage::parse_lenient(name))
}

/// Stage after an agent round completes in `current`
///
/// Outcomes that do not fit the stage leave it unchanged.
#[must_use]
pub fn stage_after_round(current: Stage, outcome: RoundOutcome) -> Stage {
    match (current, outcome) {
        (Stage::Planning, RoundOutcome::Planned) => Stage::ArchitectFinished,
        (Stage::Researching, RoundOutcome::Remaining(0)) => Stage::ResearchFinished,
        (Stage::Writing, RoundOutcome::Remaining(0)) => Stage::WriteFinished,
        (Stage::Editing, RoundOutcome::Remaining(0)) => Stage::EditorFinished,
        (Stage::Inspecting, RoundOutcome::Inspected { added_nodes: 0 }) => {
            Stage::InspectionFinished
        }
        (Stage::Inspecting, RoundOutcome::Inspected { .. }) => Stage::Researching,
        (stage, _) => stage,
    }
}

/// The single backward edge
#[inline]
#[must_use]
pub fn is_loop_back(from: Stage, to: Stage) -> bool {
    from == Stage::Inspecting && to == Stage::Researching
}

/// Stages reachable from `from` in one move (self-loops included)
#[must_use]
pub fn allowed_transitions(from: Stage) -> Vec<Stage> {
    match from {
        Stage::Planning => vec![Stage::ArchitectFinished, Stage::Researching],
        Stage::ArchitectFinished => vec![Stage::Researching],
        Stage::Researching => vec![Stage::Researching, Stage::ResearchFinished],
        Stage::ResearchFinished => vec![Stage::Writing],
        Stage::Writing => vec![Stage::Writing, Stage::WriteFinished],
        Stage::WriteFinished => vec![Stage::Editing],
        Stage::Editing => vec![Stage::Editing, Stage::EditorFinished],
        Stage::EditorFinished => vec![Stage::Inspecting],
        Stage::Inspecting => vec![Stage::Inspecting, Stage::Researching, Stage::InspectionFinished],
        Stage::InspectionFinished => vec![Stage::Completed],
        Stage::Completed => vec![],
    }
}

/// Illegal stage move
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("illegal stage transition: {from} -> {to}")]
pub struct IllegalTransition {
    /// Origin
    pub from: Stage,
    /// Requested destination
    pub to: Stage,
}

/// Validate a stage move against the transition table
///
/// # Errors
/// [`IllegalTransition`] when `to` is not reachable from `from`
pub fn validate_transition(from: Stage, to: Stage) -> Result<(), IllegalTransition> {
    if from == to || allowed_transitions(from).contains(&to) {
        Ok(())
    } else {
        Err(IllegalTransition { from, to })
    }
}
