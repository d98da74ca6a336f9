//! Edge Reconciler Tests
//!
//! Claiming unassigned edges, sibling creation per signal, reset of idle
//! edges, unmatched records and ordering independence.

use flowgraph_core::graph::NEUTRAL_COLOR;
use flowgraph_core::{Diagnostic, EdgeReconciler, FlowRecord, GraphEdge, SignalType};

fn edges(pairs: &[(&str, &str)]) -> Vec<GraphEdge> {
    pairs
        .iter()
        .map(|(s, t)| GraphEdge::new(*s, *t, 0))
        .collect()
}

fn record(source: &str, targets: &[&str], signal: SignalType, rate: f64) -> FlowRecord {
    FlowRecord::new(source, signal, rate).to_targets(targets.iter().copied())
}

// =============================================================================
// Empty targets
// =============================================================================

#[test]
fn empty_targets_color_edge_then_idle_batch_clears_it() {
    let mut reconciler = EdgeReconciler::new(edges(&[("A", "B")]));

    let update = reconciler.apply(&[record("A", &[], SignalType::PrometheusMetric, 5.0)]);
    assert_eq!(update.sequence, 1);
    let edge = reconciler.edge("A|B|0").unwrap();
    assert_eq!(edge.assigned_signal, Some(SignalType::PrometheusMetric));
    assert_eq!(edge.current_label.as_deref(), Some("5"));
    assert_eq!(edge.color(), SignalType::PrometheusMetric.color());

    let update = reconciler.apply(&[]);
    assert_eq!(update.sequence, 2);
    let edge = reconciler.edge("A|B|0").unwrap();
    assert_eq!(edge.current_label, None);
    assert_eq!(edge.color(), NEUTRAL_COLOR);
    assert_eq!(edge.assigned_signal, Some(SignalType::PrometheusMetric));
}

#[test]
fn empty_targets_bind_only_unassigned_edges_of_the_source() {
    let mut reconciler = EdgeReconciler::new(edges(&[("A", "B"), ("A", "C"), ("A", "D"), ("X", "B")]));
    reconciler.apply(&[record("A", &["D"], SignalType::OtelTrace, 1.0)]);

    reconciler.apply(&[
        record("A", &["D"], SignalType::OtelTrace, 1.0),
        record("A", &[], SignalType::LokiLog, 3.0),
    ]);

    let b = reconciler.edge("A|B|0").unwrap();
    let c = reconciler.edge("A|C|0").unwrap();
    let d = reconciler.edge("A|D|0").unwrap();
    assert_eq!(b.assigned_signal, Some(SignalType::LokiLog));
    assert_eq!(c.assigned_signal, Some(SignalType::LokiLog));
    assert_eq!(d.assigned_signal, Some(SignalType::OtelTrace));
    assert_eq!(d.current_label.as_deref(), Some("1"));
    assert!(reconciler.edge("X|B|0").unwrap().is_unassigned());
    // No siblings from an unspecified-target record
    assert_eq!(reconciler.edges().len(), 4);
}

#[test]
fn resumed_traffic_lights_the_same_edge_again() {
    let mut reconciler = EdgeReconciler::new(edges(&[("A", "B")]));
    let batch = [record("A", &[], SignalType::OtelLog, 2.0)];

    reconciler.apply(&batch);
    reconciler.apply(&[]);
    reconciler.apply(&batch);

    let edge = reconciler.edge("A|B|0").unwrap();
    assert_eq!(edge.current_label.as_deref(), Some("2"));
    assert_eq!(edge.color(), SignalType::OtelLog.color());
    assert_eq!(reconciler.edges().len(), 1);
}

#[test]
fn empty_targets_repaint_edges_already_bound_to_the_same_signal() {
    let mut reconciler = EdgeReconciler::new(edges(&[("A", "B"), ("A", "C"), ("A", "D")]));
    reconciler.apply(&[
        record("A", &["B"], SignalType::OtelLog, 1.0),
        record("A", &["C"], SignalType::LokiLog, 1.0),
    ]);
    reconciler.apply(&[]);

    reconciler.apply(&[record("A", &[], SignalType::OtelLog, 7.0)]);

    // Bound to the record's signal: relabeled, binding unchanged
    let b = reconciler.edge("A|B|0").unwrap();
    assert_eq!(b.assigned_signal, Some(SignalType::OtelLog));
    assert_eq!(b.current_label.as_deref(), Some("7"));
    assert_eq!(b.color(), SignalType::OtelLog.color());

    // Bound to another signal: left alone
    let c = reconciler.edge("A|C|0").unwrap();
    assert_eq!(c.assigned_signal, Some(SignalType::LokiLog));
    assert_eq!(c.current_label, None);
    assert_eq!(c.color(), NEUTRAL_COLOR);

    // Unassigned: claimed
    let d = reconciler.edge("A|D|0").unwrap();
    assert_eq!(d.assigned_signal, Some(SignalType::OtelLog));
    assert_eq!(d.current_label.as_deref(), Some("7"));

    assert_eq!(reconciler.edges().len(), 3);
}

// =============================================================================
// Explicit targets
// =============================================================================

#[test]
fn second_signal_on_bound_pair_creates_sibling() {
    let mut reconciler = EdgeReconciler::new(edges(&[("A", "B")]));
    reconciler.apply(&[record("A", &["B"], SignalType::PrometheusMetric, 4.0)]);

    let update = reconciler.apply(&[record("A", &["B"], SignalType::LokiLog, 2.0)]);

    assert_eq!(update.created, vec!["A|B|1".to_string()]);
    let sibling = reconciler.edge("A|B|1").unwrap();
    assert_eq!(sibling.index, 1);
    assert_eq!(sibling.assigned_signal, Some(SignalType::LokiLog));
    assert_eq!(sibling.current_label.as_deref(), Some("2"));
    assert_eq!(sibling.offset_slot(), 1);

    // The metric edge saw no traffic in this batch
    let original = reconciler.edge("A|B|0").unwrap();
    assert_eq!(original.assigned_signal, Some(SignalType::PrometheusMetric));
    assert_eq!(original.current_label, None);
}

#[test]
fn sibling_indices_stay_dense_per_pair() {
    let mut reconciler = EdgeReconciler::new(edges(&[("A", "B"), ("A", "C")]));
    reconciler.apply(&[
        record("A", &["B"], SignalType::Target, 1.0),
        record("A", &["B"], SignalType::OtelMetric, 1.0),
        record("A", &["B"], SignalType::OtelTrace, 1.0),
        record("A", &["C"], SignalType::OtelTrace, 1.0),
    ]);

    let mut indices: Vec<u32> = reconciler
        .edges()
        .iter()
        .filter(|e| e.connects("A", "B"))
        .map(|e| e.index)
        .collect();
    indices.sort();
    assert_eq!(indices, vec![0, 1, 2]);
    assert_eq!(
        reconciler.edge("A|B|0").unwrap().assigned_signal,
        Some(SignalType::Target)
    );
    assert_eq!(
        reconciler.edge("A|C|0").unwrap().assigned_signal,
        Some(SignalType::OtelTrace)
    );
}

#[test]
fn unmatched_pair_is_dropped_with_diagnostic() {
    let mut reconciler = EdgeReconciler::new(edges(&[("A", "B")]));

    let update = reconciler.apply(&[record("A", &["Z"], SignalType::LokiLog, 7.0)]);

    assert_eq!(reconciler.edges().len(), 1);
    assert!(reconciler.edge("A|B|0").unwrap().is_unassigned());
    assert!(update.created.is_empty());
    assert_eq!(
        update.diagnostics,
        vec![Diagnostic::UnmatchedRecord {
            source: "A".to_string(),
            target: "Z".to_string(),
            signal: SignalType::LokiLog,
        }]
    );
}

#[test]
fn reapplying_a_batch_changes_nothing() {
    let mut reconciler = EdgeReconciler::new(edges(&[("A", "B"), ("B", "C")]));
    let batch = [
        record("A", &["B"], SignalType::PrometheusMetric, 1.5),
        record("A", &["B"], SignalType::LokiLog, 0.25),
        record("B", &[], SignalType::OtelLog, 3.0),
    ];

    let first = reconciler.apply(&batch);
    let second = reconciler.apply(&batch);

    assert_eq!(first.edges, second.edges);
    assert_eq!(first.created, vec!["A|B|1".to_string()]);
    assert!(second.created.is_empty());
}

#[test]
fn zero_rate_record_binds_but_shows_nothing() {
    let mut reconciler = EdgeReconciler::new(edges(&[("A", "B")]));
    reconciler.apply(&[record("A", &["B"], SignalType::OtelMetric, 0.0)]);

    let edge = reconciler.edge("A|B|0").unwrap();
    assert_eq!(edge.assigned_signal, Some(SignalType::OtelMetric));
    assert_eq!(edge.current_label, None);
    assert_eq!(edge.color(), NEUTRAL_COLOR);
}

// =============================================================================
// Ordering and reset
// =============================================================================

#[test]
fn claim_order_does_not_depend_on_record_order() {
    let forward = [
        record("A", &["B"], SignalType::PyroscopeProfile, 1.0),
        record("A", &["B"], SignalType::LokiLog, 2.0),
    ];
    let reversed = [forward[1].clone(), forward[0].clone()];

    let mut left = EdgeReconciler::new(edges(&[("A", "B")]));
    let mut right = EdgeReconciler::new(edges(&[("A", "B")]));
    let left_update = left.apply(&forward);
    let right_update = right.apply(&reversed);

    assert_eq!(left_update.edges, right_update.edges);
    assert_eq!(
        left.edge("A|B|0").unwrap().assigned_signal,
        Some(SignalType::LokiLog)
    );
}

#[test]
fn next_session_reconciler_starts_from_static_edges() {
    let static_edges = edges(&[("A", "B")]);
    let mut first = EdgeReconciler::new(static_edges.clone());
    first.apply(&[record("A", &["B"], SignalType::Target, 1.0)]);
    first.apply(&[record("A", &["B"], SignalType::LokiLog, 1.0)]);
    assert_eq!(first.edges().len(), 2);

    let mut next = EdgeReconciler::new(static_edges.clone());
    assert_eq!(next.sequence(), 0);
    assert_eq!(next.edges(), static_edges.as_slice());

    let update = next.apply(&[record("A", &["B"], SignalType::LokiLog, 1.0)]);
    assert_eq!(update.sequence, 1);
    assert!(update.created.is_empty());
    assert_eq!(next.edge("A|B|0").unwrap().assigned_signal, Some(SignalType::LokiLog));
}

#[test]
fn update_serializes_for_renderers() {
    let mut reconciler = EdgeReconciler::new(edges(&[("A", "B")]));
    let update = reconciler.apply(&[record("A", &["Q"], SignalType::Target, 1.0)]);

    let json = serde_json::to_value(&update).unwrap();
    assert_eq!(json["sequence"], 1);
    assert_eq!(json["diagnostics"][0]["kind"], "unmatched_record");
    assert_eq!(json["diagnostics"][0]["signal"], "target");
    assert!(chrono::DateTime::parse_from_rfc3339(json["timestamp"].as_str().unwrap()).is_ok());
}
