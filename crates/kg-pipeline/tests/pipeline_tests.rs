//! Functional tests for the pipeline driver and checkpoints.
//!
//! A full run threads one state through every stage with scripted
//! collaborators:
//! - Each stage self-loops until its batch drains.
//! - An inspection round that adds nodes sends the run back to research.
//! - Caps and agent failures stop the run with a reason, never a panic.
//! - Checkpoints round-trip, including older loose layouts.

use kg_graph::{NodeStatus, NodeType, IS_COMPONENT_OF};
use kg_pipeline::{
    AgentKind, AgentSet, Pipeline, PipelineConfig, PipelineState, SharedObserver, Stage,
};
use kg_test_utils::{
    add_connected_node, edge_triples, sample_skeleton, EchoProcessor, Event, RecordingObserver,
    ScriptedInspector, ScriptedPlanner,
};
use pretty_assertions::assert_eq;
use std::sync::Arc;

fn pipeline(
    config: PipelineConfig,
    planner: ScriptedPlanner,
    inspector: ScriptedInspector,
) -> (Pipeline, Arc<RecordingObserver>) {
    let recorder = Arc::new(RecordingObserver::new());
    let observer: SharedObserver = recorder.clone();
    let agents = AgentSet::standard(
        &config,
        &observer,
        planner,
        EchoProcessor::new("definition").failing_on("memory"),
        EchoProcessor::new("draft_text"),
        EchoProcessor::new("final_text"),
        inspector,
    );
    (Pipeline::new(config, agents).with_observer(observer), recorder)
}

fn growing_once() -> ScriptedInspector {
    ScriptedInspector::new(vec![vec![add_connected_node(
        "lifetimes",
        "Lifetimes",
        "rust",
        "lifetimes",
        IS_COMPONENT_OF,
    )]])
}

/// Tenet: a full run visits every stage, loops back once, and completes.
#[tokio::test]
async fn full_run_completes_after_one_loop_back() {
    let (pipeline, recorder) = pipeline(
        PipelineConfig::default(),
        ScriptedPlanner::new(sample_skeleton()),
        growing_once(),
    );
    let (state, summary) = pipeline.run_topic("Rust").await;

    assert_eq!(summary.halted, None);
    assert_eq!(summary.current_stage, Stage::Completed);
    assert_eq!(summary.inspection_iter, 1);
    assert_eq!(summary.steps, 9);
    assert_eq!(summary.inspection_report.len(), 2);
    assert_eq!(summary.graph.nodes.len(), 5);

    assert_eq!(
        recorder.stages(),
        vec![
            Stage::ArchitectFinished,
            Stage::Researching,
            Stage::ResearchFinished,
            Stage::Writing,
            Stage::WriteFinished,
            Stage::Editing,
            Stage::EditorFinished,
            Stage::Inspecting,
            Stage::Researching,
            Stage::ResearchFinished,
            Stage::Writing,
            Stage::WriteFinished,
            Stage::Editing,
            Stage::EditorFinished,
            Stage::Inspecting,
            Stage::InspectionFinished,
            Stage::Completed,
        ]
    );

    assert!(state.is_complete());
    let lifetimes = state.graph.get_node("lifetimes");
    assert_eq!(lifetimes.status, Some(NodeStatus::Edited));
    assert_eq!(lifetimes.field_str("final_text"), Some("final_text for lifetimes"));
    // failed research still drains the node with fallback content
    assert_eq!(state.graph.get_node("memory").field_str("definition"), Some(""));
}

/// Tenet: the driver, not the scheduler, enforces the inspection cap.
#[tokio::test]
async fn endless_inspection_hits_round_limit() {
    let config = PipelineConfig::default().with_max_inspection_rounds(1);
    let recorder = Arc::new(RecordingObserver::new());
    let observer: SharedObserver = recorder.clone();
    let agents = AgentSet::standard(
        &config,
        &observer,
        ScriptedPlanner::new(sample_skeleton()),
        EchoProcessor::new("definition"),
        EchoProcessor::new("draft_text"),
        EchoProcessor::new("final_text"),
        ScriptedInspector::always_growing(),
    );
    let pipeline = Pipeline::new(config, agents).with_observer(observer);

    let (state, summary) = pipeline.run_topic("Rust").await;

    assert_eq!(state.inspection_iter, 2);
    assert_eq!(state.current_stage(), Stage::Researching);
    assert!(summary
        .halted
        .as_deref()
        .is_some_and(|reason| reason.starts_with("inspection round limit reached")));
    assert!(recorder.events().contains(&Event::RoundLimitReached(2)));
}

#[tokio::test]
async fn step_cap_stops_the_run() {
    let (pipeline, _) = pipeline(
        PipelineConfig::default().with_max_steps(3),
        ScriptedPlanner::new(sample_skeleton()),
        growing_once(),
    );
    let (state, summary) = pipeline.run_topic("Rust").await;

    assert_eq!(summary.steps, 3);
    assert_eq!(summary.halted.as_deref(), Some("step limit reached (3)"));
    assert_eq!(state.current_stage(), Stage::WriteFinished);
}

/// Tenet: an agent failure halts the run with the reason, keeping prior work.
#[tokio::test]
async fn inspector_failure_halts_with_reason() {
    let (pipeline, recorder) = pipeline(
        PipelineConfig::default(),
        ScriptedPlanner::new(sample_skeleton()),
        ScriptedInspector::new(Vec::new()).then_fail("model timed out"),
    );
    let (state, summary) = pipeline.run_topic("Rust").await;

    assert_eq!(
        summary.halted.as_deref(),
        Some("inspector agent failed: upstream call failed: model timed out")
    );
    assert_eq!(state.current_stage(), Stage::Inspecting);
    assert_eq!(
        state.inspection_report.last().and_then(|r| r.error()),
        Some("upstream call failed: model timed out")
    );
    assert!(state.is_complete());
    assert!(recorder
        .events()
        .contains(&Event::AgentFailed(AgentKind::Inspector)));
}

#[tokio::test]
async fn failed_planning_falls_back_to_core_node() {
    let (pipeline, _) = pipeline(
        PipelineConfig::default(),
        ScriptedPlanner::failing(),
        ScriptedInspector::default(),
    );
    let (state, summary) = pipeline.run_topic("Type Inference").await;

    assert_eq!(summary.halted, None);
    let nodes = state.graph.get_nodes();
    assert_eq!(nodes.len(), 1);
    assert_eq!(nodes[0].id, "type-inference");
    assert_eq!(nodes[0].node.node_type, Some(NodeType::Core));
    assert!(state.is_complete());
}

#[tokio::test]
async fn checkpoints_are_written_every_step() {
    let dir = tempfile::tempdir().unwrap();
    let (pipeline, recorder) = pipeline(
        PipelineConfig::default().with_checkpoint_dir(dir.path()),
        ScriptedPlanner::new(sample_skeleton()),
        ScriptedInspector::default(),
    );
    let (state, summary) = pipeline.run_topic("Rust").await;

    let saved = recorder
        .events()
        .into_iter()
        .filter(|e| matches!(e, Event::CheckpointSaved(_)))
        .count();
    assert_eq!(saved, summary.steps + 1);

    let last = PipelineState::load_state(dir.path().join("rust_completed.json")).unwrap();
    assert_eq!(last.current_stage(), Stage::Completed);
    assert_eq!(last.processed_nodes, state.processed_nodes);
    assert_eq!(edge_triples(&last.graph), edge_triples(&state.graph));
}

/// Tenet: save/load round-trips the whole state.
#[tokio::test]
async fn checkpoint_round_trip() {
    let (pipeline, _) = pipeline(
        PipelineConfig::default(),
        ScriptedPlanner::new(sample_skeleton()),
        growing_once(),
    );
    let (state, _) = pipeline.run_topic("Rust").await;

    let file = tempfile::NamedTempFile::new().unwrap();
    state.save_state(file.path()).unwrap();
    let restored = PipelineState::load_state(file.path()).unwrap();

    assert_eq!(restored.topic, state.topic);
    assert_eq!(restored.current_stage(), state.current_stage());
    assert_eq!(restored.inspection_iter, state.inspection_iter);
    assert_eq!(restored.processed_nodes, state.processed_nodes);
    assert_eq!(restored.inspection_report, state.inspection_report);
    assert_eq!(restored.graph.get_nodes(), state.graph.get_nodes());
    assert_eq!(edge_triples(&restored.graph), edge_triples(&state.graph));
}

#[test]
fn legacy_checkpoint_layout_loads() {
    let text = r#"{
        "topic": "Rust",
        "current_stage": "writing",
        "processed_nodes": {"researched": ["rust"], "written": [], "edited": []},
        "inspection_report": {"summary": "looks fine", "structural_suggestions": []},
        "graph": {
            "nodes": [{"id": "rust", "title": "Rust", "type": "core", "status": "researched",
                       "definition": "A systems language"}],
            "edges": []
        }
    }"#;
    let state = PipelineState::from_json(text).unwrap();

    assert_eq!(state.current_stage(), Stage::Writing);
    assert_eq!(state.next_nodes_to_process(Stage::Writing, None), vec!["rust"]);
    assert_eq!(state.inspection_report.len(), 1);
    assert_eq!(
        state.graph.get_node("rust").field_str("definition"),
        Some("A systems language")
    );
}

#[tokio::test]
async fn resumed_state_continues_from_its_stage() {
    let mut state = PipelineState::from_json(
        r#"{"topic": "Rust", "current_stage": "editor_finished",
            "graph": {"nodes": [{"id": "rust", "title": "Rust", "status": "edited"}]},
            "processed_nodes": {"researched": ["rust"], "written": ["rust"], "edited": ["rust"]}}"#,
    )
    .unwrap();
    let (pipeline, recorder) = pipeline(
        PipelineConfig::default(),
        ScriptedPlanner::failing(),
        ScriptedInspector::default(),
    );

    let summary = pipeline.run(&mut state).await;

    assert_eq!(summary.steps, 1);
    assert_eq!(summary.current_stage, Stage::Completed);
    assert_eq!(
        recorder.stages(),
        vec![Stage::Inspecting, Stage::InspectionFinished, Stage::Completed]
    );
}
