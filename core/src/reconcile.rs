// Edge reconciler
//
// Folds each batch of flow records into the overlay state of the graph's
// edges: claims unassigned edges, adds sibling edges for additional signal
// types on a known pair, and clears edges that saw no traffic in the window.

use crate::graph::GraphEdge;
use crate::signal::SignalType;
use crate::stream::FlowRecord;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::{debug, warn};

/// Consistency anomaly found while applying a batch. Never fatal.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Diagnostic {
    /// The record names a target the topology has no edge to
    UnmatchedRecord {
        source: String,
        target: String,
        signal: SignalType,
    },
}

/// Result of applying one batch to an edge list
#[derive(Clone, Debug, Default, PartialEq)]
pub struct BatchOutcome {
    /// Ids of sibling edges created by this batch
    pub created: Vec<String>,
    pub diagnostics: Vec<Diagnostic>,
}

/// Emitted once per applied batch for whoever renders the graph
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EdgeUpdate {
    /// 1 for the first batch of a session, then increasing by one
    pub sequence: u64,
    /// Timestamp (ISO 8601)
    pub timestamp: String,
    pub edges: Vec<GraphEdge>,
    pub created: Vec<String>,
    pub diagnostics: Vec<Diagnostic>,
}

/// Apply one batch to `edges` in place, including the reset step.
///
/// Records are processed in signal order (stable), so the edge a signal claims
/// does not depend on the order records arrived in.
pub fn apply_batch(edges: &mut Vec<GraphEdge>, batch: &[FlowRecord]) -> BatchOutcome {
    let mut outcome = BatchOutcome::default();

    let mut records: Vec<&FlowRecord> = batch.iter().collect();
    records.sort_by_key(|r| r.signal_type);

    for record in records {
        if record.target_component_ids.is_empty() {
            paint_outgoing(edges, record);
        } else {
            for target in &record.target_component_ids {
                paint_pair(edges, record, target, &mut outcome);
            }
        }
    }

    reset_idle(edges, batch);
    outcome
}

/// Target unknown: every neutral outgoing edge of the source carries this signal
fn paint_outgoing(edges: &mut [GraphEdge], record: &FlowRecord) {
    let signal = record.signal_type;
    for edge in edges.iter_mut().filter(|e| {
        e.source == record.component_id
            && (e.assigned_signal.is_none() || e.assigned_signal == Some(signal))
    }) {
        edge.paint(signal, record.rate);
    }
}

fn paint_pair(edges: &mut Vec<GraphEdge>, record: &FlowRecord, target: &str, outcome: &mut BatchOutcome) {
    let source = record.component_id.as_str();
    let signal = record.signal_type;

    if let Some(edge) = edges
        .iter_mut()
        .find(|e| e.connects(source, target) && e.assigned_signal == Some(signal))
    {
        edge.paint(signal, record.rate);
        return;
    }

    if let Some(edge) = edges
        .iter_mut()
        .find(|e| e.connects(source, target) && e.is_unassigned())
    {
        edge.paint(signal, record.rate);
        return;
    }

    let siblings = edges.iter().filter(|e| e.connects(source, target)).count();
    if siblings == 0 {
        warn!(
            target: "reconcile",
            source = %source,
            target_id = %target,
            signal = %signal,
            "Flow record targets a pair with no declared edge; dropping"
        );
        outcome.diagnostics.push(Diagnostic::UnmatchedRecord {
            source: source.to_string(),
            target: target.to_string(),
            signal,
        });
        return;
    }

    let mut edge = GraphEdge::new(source, target, siblings as u32);
    edge.paint(signal, record.rate);
    debug!(target: "reconcile", edge = %edge.id, signal = %signal, "Created sibling edge");
    outcome.created.push(edge.id.clone());
    edges.push(edge);
}

/// Clear the display of every edge whose (source, signal) saw no positive rate
fn reset_idle(edges: &mut [GraphEdge], batch: &[FlowRecord]) {
    let active: HashSet<(&str, SignalType)> = batch
        .iter()
        .filter(|r| r.rate > 0.0)
        .map(|r| (r.component_id.as_str(), r.signal_type))
        .collect();

    for edge in edges.iter_mut() {
        let keep = match edge.assigned_signal {
            Some(signal) => active.contains(&(edge.source.as_str(), signal)),
            None => false,
        };
        if !keep {
            edge.clear_display();
        }
    }
}

/// Owns the edge state of one overlay session
#[derive(Clone, Debug)]
pub struct EdgeReconciler {
    edges: Vec<GraphEdge>,
    sequence: u64,
}

impl EdgeReconciler {
    pub fn new(edges: Vec<GraphEdge>) -> Self {
        Self { edges, sequence: 0 }
    }

    pub fn edges(&self) -> &[GraphEdge] {
        &self.edges
    }

    pub fn edge(&self, id: &str) -> Option<&GraphEdge> {
        self.edges.iter().find(|e| e.id == id)
    }

    /// Number of batches applied since creation
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    pub fn apply(&mut self, batch: &[FlowRecord]) -> EdgeUpdate {
        let outcome = apply_batch(&mut self.edges, batch);
        self.sequence += 1;

        debug!(
            target: "reconcile",
            sequence = self.sequence,
            records = batch.len(),
            created = outcome.created.len(),
            anomalies = outcome.diagnostics.len(),
            "Applied batch"
        );

        EdgeUpdate {
            sequence: self.sequence,
            timestamp: chrono::Utc::now().to_rfc3339(),
            edges: self.edges.clone(),
            created: outcome.created,
            diagnostics: outcome.diagnostics,
        }
    }
}
