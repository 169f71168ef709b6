//! Functional tests for the stage scheduler and batch selector.
//!
//! The scheduler and selector are pure: they must answer for every
//! reachable stage/ledger combination without panicking, and repeated
//! calls with no intervening change must agree.

use kg_graph::{KnowledgeGraph, KnowledgeNode, NodeStatus};
use kg_pipeline::stage::{allowed_transitions, validate_transition};
use kg_pipeline::{
    next_step, next_step_for, select_batch, stage_after_round, AgentKind, ProcessingLedger,
    RoundOutcome, Stage,
};
use pretty_assertions::assert_eq;
use proptest::prelude::*;

/// Tenet: `editor_finished` hands over to the inspector.
#[test]
fn editor_finished_runs_inspector_next() {
    let step = next_step_for("editor_finished");
    assert_eq!(step.agent, Some(AgentKind::Inspector));
    assert_eq!(step.stage, Stage::Inspecting);
}

#[test]
fn every_agent_is_scheduled_from_its_entry_stage() {
    let expected = [
        (Stage::Planning, AgentKind::Architect),
        (Stage::ArchitectFinished, AgentKind::Researcher),
        (Stage::ResearchFinished, AgentKind::Writer),
        (Stage::WriteFinished, AgentKind::Editor),
        (Stage::EditorFinished, AgentKind::Inspector),
    ];
    for (stage, agent) in expected {
        assert_eq!(next_step(stage).agent, Some(agent), "{stage}");
    }
    assert!(next_step(Stage::InspectionFinished).is_done());
    assert!(next_step(Stage::Completed).is_done());
}

#[test]
fn completed_has_no_exits() {
    assert!(allowed_transitions(Stage::Completed).is_empty());
    assert!(validate_transition(Stage::Completed, Stage::Planning).is_err());
}

#[test]
fn ledger_serializes_as_lists() {
    let mut ledger = ProcessingLedger::new();
    ledger.mark(NodeStatus::Researched, "a");
    ledger.mark(NodeStatus::Researched, "b");

    let value = serde_json::to_value(&ledger).unwrap();
    assert_eq!(value["researched"], serde_json::json!(["a", "b"]));

    let back: ProcessingLedger = serde_json::from_str(r#"{"written": ["a"]}"#).unwrap();
    assert!(back.researched.is_empty());
    assert!(back.written.contains("a"));
}

fn stage_strategy() -> impl Strategy<Value = Stage> {
    proptest::sample::select(Stage::ALL.to_vec())
}

fn outcome_strategy() -> impl Strategy<Value = RoundOutcome> {
    prop_oneof![
        Just(RoundOutcome::Planned),
        (0..4usize).prop_map(RoundOutcome::Remaining),
        (0..4usize).prop_map(|added_nodes| RoundOutcome::Inspected { added_nodes }),
    ]
}

fn status_strategy() -> impl Strategy<Value = Option<NodeStatus>> {
    proptest::option::of(proptest::sample::select(vec![
        NodeStatus::Created,
        NodeStatus::Researched,
        NodeStatus::Written,
        NodeStatus::Edited,
    ]))
}

fn fixture_strategy() -> impl Strategy<Value = (KnowledgeGraph, ProcessingLedger)> {
    proptest::collection::vec((status_strategy(), any::<bool>(), any::<bool>(), any::<bool>()), 0..15)
        .prop_map(|rows| {
            let mut graph = KnowledgeGraph::new();
            let mut ledger = ProcessingLedger::new();
            for (i, (status, researched, written, edited)) in rows.into_iter().enumerate() {
                let id = format!("n{i}");
                let mut node = KnowledgeNode::titled(id.clone());
                node.status = status;
                graph.add_node(id.clone(), node);
                if researched {
                    ledger.mark(NodeStatus::Researched, &id);
                }
                if written {
                    ledger.mark(NodeStatus::Written, &id);
                }
                if edited {
                    ledger.mark(NodeStatus::Edited, &id);
                }
            }
            (graph, ledger)
        })
}

proptest! {
    /// Arbitrary stage names never panic; unknown ones terminate.
    #[test]
    fn any_stage_name_is_handled(name in "[a-z_]{0,24}") {
        let step = next_step_for(&name);
        if name.parse::<Stage>().is_err() {
            prop_assert!(step.is_done());
            prop_assert_eq!(step.stage, Stage::Completed);
        }
    }

    /// Post-round stages are always legal moves.
    #[test]
    fn round_outcomes_stay_on_the_table(stage in stage_strategy(), outcome in outcome_strategy()) {
        let next = stage_after_round(stage, outcome);
        prop_assert!(validate_transition(stage, next).is_ok(), "{} -> {}", stage, next);
    }

    /// Selection is a stable function of graph order and ledger.
    #[test]
    fn selector_is_idempotent((graph, ledger) in fixture_strategy(), stage in stage_strategy(), limit in proptest::option::of(0..10usize)) {
        let first = select_batch(&graph, &ledger, stage, limit);
        let second = select_batch(&graph, &ledger, stage, limit);
        prop_assert_eq!(&first, &second);

        let order: Vec<&str> = graph.node_ids().collect();
        let positions: Vec<usize> = first
            .iter()
            .map(|id| order.iter().position(|o| *o == id.as_str()).unwrap())
            .collect();
        prop_assert!(positions.windows(2).all(|w| w[0] < w[1]));
        if let Some(limit) = limit {
            prop_assert!(first.len() <= limit);
        }
    }

    /// Writing picks researched-but-unwritten nodes only.
    #[test]
    fn writing_respects_ledger((graph, ledger) in fixture_strategy()) {
        for id in select_batch(&graph, &ledger, Stage::Writing, None) {
            prop_assert!(ledger.researched.contains(&id));
            prop_assert!(!ledger.written.contains(&id));
        }
    }
}
