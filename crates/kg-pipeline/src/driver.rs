//! Pipeline driver
//!
//! Threads one [`PipelineState`] through the scheduler loop:
//! ask [`next_step`], run the agent, compute the post-round stage, optionally
//! checkpoint. The driver owns the round and step caps; the scheduler only
//! exposes `inspection_iter`.

use crate::agent::AgentSet;
use crate::config::PipelineConfig;
use crate::error::PipelineError;
use crate::observer::{tracing_observer, SharedObserver};
use crate::stage::{next_step, stage_after_round, AgentKind, RoundOutcome, Stage};
use crate::state::{PipelineState, RunSummary};

/// Drives a state to completion with a fixed agent set
pub struct Pipeline {
    config: PipelineConfig,
    agents: AgentSet,
    observer: SharedObserver,
}

impl Pipeline {
    /// Driver reporting through `tracing`
    pub fn new(config: PipelineConfig, agents: AgentSet) -> Self {
        Self {
            config,
            agents,
            observer: tracing_observer(),
        }
    }

    /// With observer
    #[must_use]
    pub fn with_observer(mut self, observer: SharedObserver) -> Self {
        self.observer = observer;
        self
    }

    /// Active configuration
    #[inline]
    #[must_use]
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Generate a graph for `topic` from scratch
    pub async fn run_topic(&self, topic: impl Into<String>) -> (PipelineState, RunSummary) {
        let mut state = PipelineState::new(topic);
        let summary = self.run(&mut state).await;
        (state, summary)
    }

    /// Run until `completed`, a cap, or an agent failure
    ///
    /// Never fails: the reason for an early stop is in
    /// [`RunSummary::halted`], and `state` keeps everything done so far.
    pub async fn run(&self, state: &mut PipelineState) -> RunSummary {
        let mut steps = 0usize;
        let halted = loop {
            let stage = state.current_stage();
            if stage == Stage::Completed {
                break None;
            }
            if state.inspection_iter > self.config.max_inspection_rounds {
                self.observer
                    .round_limit_reached(state.inspection_iter, self.config.max_inspection_rounds);
                break Some(format!(
                    "inspection round limit reached ({} > {})",
                    state.inspection_iter, self.config.max_inspection_rounds
                ));
            }
            if steps >= self.config.max_steps {
                tracing::warn!(steps, "step limit reached, stopping");
                break Some(format!("step limit reached ({steps})"));
            }

            let progressed = match self.step(state).await {
                Ok(progressed) => progressed,
                Err(error) => break Some(error.to_string()),
            };
            self.checkpoint(state);
            if !progressed {
                break None;
            }
            steps += 1;
        };

        tracing::info!(
            stage = %state.current_stage(),
            steps,
            nodes = state.graph.node_count(),
            halted = halted.is_some(),
            "pipeline run finished"
        );
        RunSummary {
            steps,
            halted,
            ..state.summary()
        }
    }

    /// One scheduler iteration; `Ok(false)` once there is nothing left to run
    ///
    /// # Errors
    /// [`PipelineError::Agent`] when the agent fails, [`PipelineError::Stage`]
    /// on an illegal move
    pub async fn step(&self, state: &mut PipelineState) -> Result<bool, PipelineError> {
        let step = next_step(state.current_stage());
        let Some(agent) = step.agent else {
            self.transition(state, Stage::Completed)?;
            return Ok(false);
        };
        self.transition(state, step.stage)?;

        self.observer.agent_started(agent, step.stage);
        if let Err(source) = self.agents.get(agent).run(state).await {
            self.observer.agent_failed(agent, &source);
            return Err(PipelineError::Agent { agent, source });
        }
        self.observer.agent_finished(agent, step.stage);

        let outcome = match agent {
            AgentKind::Architect => RoundOutcome::Planned,
            AgentKind::Inspector => RoundOutcome::Inspected {
                added_nodes: state.last_inspection_added(),
            },
            AgentKind::Researcher | AgentKind::Writer | AgentKind::Editor => {
                RoundOutcome::Remaining(state.next_nodes_to_process(step.stage, None).len())
            }
        };
        self.transition(state, stage_after_round(step.stage, outcome))?;
        Ok(true)
    }

    fn transition(&self, state: &mut PipelineState, to: Stage) -> Result<(), PipelineError> {
        let from = state.current_stage();
        if from == to {
            return Ok(());
        }
        state.advance_to(to)?;
        self.observer.stage_changed(from, to);
        Ok(())
    }

    fn checkpoint(&self, state: &PipelineState) {
        let Some(dir) = &self.config.checkpoint_dir else {
            return;
        };
        let path = state.checkpoint_path(dir);
        match state.save_state(&path) {
            Ok(()) => self.observer.checkpoint_saved(&path),
            Err(error) => tracing::warn!(path = %path.display(), %error, "checkpoint failed"),
        }
    }
}
