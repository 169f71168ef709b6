//! Functional tests for the structural mutation engine.
//!
//! These tests exercise suggestion batches end to end:
//! - Merge and refactor rewire edges without dangling references.
//! - A failing suggestion is recorded and never aborts the batch.
//! - Later suggestions observe the graph left by earlier ones.

use kg_graph::{KnowledgeGraph, KnowledgeNode, NodeType, IS_COMPONENT_OF, RELATED_TO};
use kg_pipeline::{MutationEngine, MutationPolicy, NoopObserver, SuggestionKind};
use kg_test_utils::{
    add_connected_node, add_node, deepen_node, delete_node, edge_triples, merge_fixture,
    merge_nodes, refactor_and_promote, refactor_fixture, sample_graph, triple, Event,
    RecordingObserver,
};
use pretty_assertions::assert_eq;
use proptest::prelude::*;
use serde_json::{json, Value};
use std::sync::Arc;

fn engine() -> MutationEngine {
    MutationEngine::default().with_observer(Arc::new(NoopObserver))
}

/// Tenet: merging {A, B} with X→A and B→Y yields X→M and M→Y only.
#[test]
fn merge_redirects_incident_edges() {
    let mut g = merge_fixture();
    let record = engine().apply_suggestions(&mut g, &[merge_nodes(&["a", "b"], "m", "M")]);

    assert!(record.errors.is_empty(), "{:?}", record.errors);
    assert!(!g.contains_node("a"));
    assert!(!g.contains_node("b"));
    assert_eq!(
        edge_triples(&g),
        vec![triple("m", "y", IS_COMPONENT_OF), triple("x", "m", RELATED_TO)]
    );

    let reasons: Vec<&str> = record.removed_nodes.iter().map(|r| r.reason.as_str()).collect();
    assert_eq!(reasons, vec!["Merged into new node m", "Merged into new node m"]);
    assert_eq!(record.removed_edges.len(), 2);
}

/// Tenet: an edge between two merged members never becomes a self-loop.
#[test]
fn merge_drops_self_loops() {
    let mut g = KnowledgeGraph::new();
    g.add_node("a", KnowledgeNode::titled("A"));
    g.add_node("b", KnowledgeNode::titled("B"));
    g.add_edge("b", "a", kg_graph::EdgeAttrs::relation(RELATED_TO));
    g.add_edge("a", "b", kg_graph::EdgeAttrs::relation(IS_COMPONENT_OF));

    let record = engine().apply_suggestions(&mut g, &[merge_nodes(&["a", "b"], "m", "M")]);

    assert!(record.errors.is_empty());
    assert!(g.get_edges().is_empty());
    assert_eq!(g.node_count(), 1);
}

/// Tenet: when the merged node reuses a member id, that node survives.
#[test]
fn merge_into_existing_member_keeps_it() {
    let mut g = merge_fixture();
    let record = engine().apply_suggestions(&mut g, &[merge_nodes(&["a", "b"], "a", "A and B")]);

    assert!(g.contains_node("a"));
    assert!(!g.contains_node("b"));
    assert_eq!(g.get_node("a").title.as_deref(), Some("A and B"));
    assert_eq!(
        edge_triples(&g),
        vec![triple("a", "y", IS_COMPONENT_OF), triple("x", "a", RELATED_TO)]
    );
    assert_eq!(record.removed_nodes.len(), 1);
}

/// Tenet: an unlabeled edge counts as `related_to` when redirected edges are deduplicated.
#[test]
fn merge_does_not_duplicate_unlabeled_edges() {
    let mut g = KnowledgeGraph::new();
    g.add_node("a", KnowledgeNode::titled("A"));
    g.add_node("b", KnowledgeNode::titled("B"));
    g.add_node("x", KnowledgeNode::titled("X"));
    g.add_edge("x", "a", kg_graph::EdgeAttrs::default());

    let record = engine().apply_suggestions(&mut g, &[merge_nodes(&["a", "b"], "a", "A and B")]);

    assert!(record.errors.is_empty());
    assert_eq!(edge_triples(&g), vec![triple("x", "a", RELATED_TO)]);
    assert!(record.added_edges.is_empty());
}

#[test]
fn merge_reports_missing_members_and_continues() {
    let mut g = merge_fixture();
    let record = engine().apply_suggestions(&mut g, &[merge_nodes(&["a", "ghost"], "m", "M")]);

    assert_eq!(record.errors, vec!["MERGE: node 'ghost' to merge does not exist".to_string()]);
    assert!(!g.contains_node("a"));
    assert!(g.contains_node("m"));
    assert_eq!(edge_triples(&g), vec![
        triple("b", "y", IS_COMPONENT_OF),
        triple("x", "m", RELATED_TO),
    ]);
}

/// Tenet: REFACTOR_AND_PROMOTE re-parents every child before deleting.
#[test]
fn refactor_promotes_children_then_deletes() {
    let mut g = refactor_fixture();
    let record = engine().apply_suggestions(&mut g, &[refactor_and_promote("p", "q")]);

    assert!(record.errors.is_empty());
    assert!(!g.contains_node("p"));
    assert_eq!(
        edge_triples(&g),
        vec![triple("q", "c1", IS_COMPONENT_OF), triple("q", "c2", IS_COMPONENT_OF)]
    );
    assert!(g.get_edges().iter().all(|e| !e.touches("p")));
    assert_eq!(record.added_edges.len(), 2);
    assert_eq!(
        record.removed_nodes[0].reason,
        "Refactored and promoted children to q"
    );
}

#[test]
fn refactor_with_missing_node_changes_nothing() {
    let mut g = refactor_fixture();
    let before = edge_triples(&g);
    let record = engine().apply_suggestions(&mut g, &[refactor_and_promote("p", "nowhere")]);

    assert_eq!(
        record.errors,
        vec!["REFACTOR: One or both nodes do not exist: p, nowhere".to_string()]
    );
    assert_eq!(edge_triples(&g), before);
    assert!(record.is_noop());
}

#[test]
fn refactor_onto_itself_is_rejected() {
    let mut g = refactor_fixture();
    let record = engine().apply_suggestions(&mut g, &[refactor_and_promote("p", "p")]);
    assert_eq!(record.errors.len(), 1);
    assert!(g.contains_node("p"));
}

/// Tenet: a failed edge does not undo the node insertion.
#[test]
fn add_node_with_missing_endpoint_keeps_node() {
    let mut g = KnowledgeGraph::new();
    g.add_node("a", KnowledgeNode::titled("A"));

    let record = engine().apply_suggestions(
        &mut g,
        &[add_connected_node("a-prime", "A'", "a", "b", RELATED_TO)],
    );

    assert!(g.contains_node("a-prime"));
    assert!(!g.contains_node("b"));
    assert_eq!(g.edge_count(), 0);
    assert_eq!(record.errors, vec!["Cannot add edge: missing nodes a or b".to_string()]);
    assert_eq!(record.added_nodes.len(), 1);
}

#[test]
fn add_node_connection_defaults_to_related_to() {
    let mut g = sample_graph();
    let raw = json!({
        "suggestion_type": "ADD_NODE",
        "details": {
            "suggested_node": {"node_id": "traits", "title": "Traits"},
            "connect_to": {"source_id": "rust", "target_id": "traits"}
        }
    });
    let record = engine().apply_suggestions(&mut g, &[raw]);

    assert!(record.errors.is_empty());
    assert_eq!(record.added_edges[0].relationship, RELATED_TO);
    assert_eq!(record.added_edges[0].source_title, "Rust");
}

/// Tenet: one bad suggestion never aborts the rest of the batch.
#[test]
fn bad_suggestions_are_isolated() {
    let mut g = KnowledgeGraph::new();
    let batch = vec![
        json!(42),
        json!({"suggestion_type": "RENAME_NODE", "details": {}}),
        json!({"suggestion_type": "DELETE_NODE", "details": {"node_id": 7}}),
        add_node("x", "X", "core"),
    ];
    let record = engine().apply_suggestions(&mut g, &batch);

    assert_eq!(record.errors.len(), 3);
    assert_eq!(g.get_node("x").node_type, Some(NodeType::Core));
}

#[test]
fn later_suggestions_see_earlier_effects() {
    let mut g = KnowledgeGraph::new();
    let record = engine().apply_suggestions(
        &mut g,
        &[
            add_node("x", "X", "core"),
            deepen_node("x", &[("x1", "X one"), ("x2", "X two")]),
            delete_node("x2", "redundant"),
        ],
    );

    assert!(record.errors.is_empty());
    assert_eq!(g.node_ids().collect::<Vec<_>>(), vec!["x", "x1"]);
    assert_eq!(g.get_node("x1").node_type, Some(NodeType::SubComponent));
    assert_eq!(edge_triples(&g), vec![triple("x", "x1", IS_COMPONENT_OF)]);
    assert_eq!(record.removed_nodes[0].reason, "redundant");
}

#[test]
fn deepen_skips_only_incomplete_sub_nodes() {
    let mut g = sample_graph();
    let raw = json!({
        "suggestion_type": "DEEPEN_NODE",
        "details": {
            "target_node_id": "ownership",
            "suggested_sub_components": [
                {"node_id": "moves", "title": "Moves"},
                {"title": "No id"}
            ]
        }
    });
    let record = engine().apply_suggestions(&mut g, &[raw, deepen_node("ghost", &[("g1", "G")])]);

    assert!(g.contains_node("moves"));
    assert_eq!(
        record.errors,
        vec![
            "Skipping sub-node for ownership due to missing title or node_id.".to_string(),
            "Cannot deepen node: Parent node with ID 'ghost' not found.".to_string(),
        ]
    );
}

#[test]
fn delete_of_absent_node_is_skipped_not_error() {
    let mut g = sample_graph();
    let record = engine().apply_suggestions(&mut g, &[delete_node("ghost", "gone")]);
    assert!(record.errors.is_empty());
    assert_eq!(record.skipped.len(), 1);
}

#[test]
fn permissive_delete_orphans_children_by_default() {
    let mut g = sample_graph();
    let record = engine().apply_suggestions(&mut g, &[delete_node("rust", "too broad")]);

    assert!(record.errors.is_empty());
    assert!(!g.contains_node("rust"));
    assert!(g.contains_node("ownership"));
    assert_eq!(record.removed_edges.len(), 3);
}

#[test]
fn strict_policy_blocks_orphaning_delete() {
    let mut g = sample_graph();
    let strict = MutationEngine::new(MutationPolicy {
        reject_orphaning_deletes: true,
    })
    .with_observer(Arc::new(NoopObserver));
    let record = strict.apply_suggestions(&mut g, &[delete_node("rust", "too broad")]);

    assert_eq!(record.errors.len(), 1);
    assert!(g.contains_node("rust"));
}

#[test]
fn change_record_omits_empty_skipped() {
    let mut g = KnowledgeGraph::new();
    let record = engine().apply_suggestions(&mut g, &[add_node("x", "X", "core")]);
    let value = serde_json::to_value(&record).unwrap();

    assert!(value.get("skipped").is_none());
    assert_eq!(value["added_nodes"][0]["node_id"], "x");
}

#[test]
fn observer_sees_each_suggestion() {
    let observer = Arc::new(RecordingObserver::new());
    let engine = MutationEngine::default().with_observer(observer.clone());
    let mut g = KnowledgeGraph::new();
    engine.apply_suggestions(&mut g, &[json!("nope"), add_node("x", "X", "core")]);

    assert_eq!(
        observer.events(),
        vec![
            Event::SuggestionApplied(None, false),
            Event::SuggestionApplied(Some(SuggestionKind::AddNode), true),
        ]
    );
}

fn suggestion_strategy() -> impl Strategy<Value = Value> {
    let id = || (0..6u8).prop_map(|i| format!("n{i}"));
    prop_oneof![
        id().prop_map(|i| add_node(&i, &i.to_uppercase(), "component")),
        (id(), id(), id()).prop_map(|(i, s, t)| add_connected_node(&i, "N", &s, &t, RELATED_TO)),
        (id(), id()).prop_map(|(p, c)| deepen_node(&p, &[(c.as_str(), "Sub")])),
        id().prop_map(|i| delete_node(&i, "prop")),
        (id(), id(), id()).prop_map(|(a, b, m)| merge_nodes(&[a.as_str(), b.as_str()], &m, "M")),
        (id(), id()).prop_map(|(d, p)| refactor_and_promote(&d, &p)),
    ]
}

proptest! {
    /// Any batch leaves unique ids and no edge pointing at a missing node.
    #[test]
    fn batches_never_leave_dangling_edges(batch in proptest::collection::vec(suggestion_strategy(), 0..25)) {
        let mut g = KnowledgeGraph::new();
        engine().apply_suggestions(&mut g, &batch);

        let ids: Vec<String> = g.get_nodes().into_iter().map(|n| n.id).collect();
        let mut unique = ids.clone();
        unique.sort();
        unique.dedup();
        prop_assert_eq!(unique.len(), ids.len());

        for edge in g.get_edges() {
            prop_assert!(g.contains_node(&edge.source));
            prop_assert!(g.contains_node(&edge.target));
        }
    }
}
