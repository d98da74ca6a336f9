// Pipeline dependency graph
//
// Nodes and edges of the laid-out component graph, plus the live overlay
// state carried on each edge.

mod builder;
mod layout;

pub use builder::{node_size, GraphBuilder};
pub use layout::{LayeredLayout, Layout, LayoutEdge, LayoutError, LayoutNode, Position, Positions};

use crate::signal::SignalType;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Stroke color of an edge that shows no live data
pub const NEUTRAL_COLOR: &str = "#9e9e9e";

#[derive(Error, Debug)]
pub enum GraphError {
    #[error(transparent)]
    Layout(#[from] LayoutError),

    #[error("layout returned no position for node {0}")]
    MissingPosition(String),
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GraphNode {
    pub id: String,
    pub display_label: String,
    pub width: f64,
    pub height: f64,
    pub position: Position,
}

/// Visual state of an edge
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "signal", rename_all = "snake_case")]
pub enum EdgeStyle {
    Neutral,
    Signal(SignalType),
}

impl EdgeStyle {
    pub fn color(self) -> &'static str {
        match self {
            EdgeStyle::Neutral => NEUTRAL_COLOR,
            EdgeStyle::Signal(signal) => signal.color(),
        }
    }
}

/// A directed edge between two components.
///
/// Several edges may connect the same ordered pair, one per signal type; they
/// are told apart by `index`, which is dense from 0 for each pair.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GraphEdge {
    pub id: String,
    pub source: String,
    pub target: String,
    pub index: u32,
    /// `None` until a flow record binds the edge to a signal. Once bound the
    /// binding is kept for the rest of the session.
    pub assigned_signal: Option<SignalType>,
    pub rate: Option<f64>,
    pub current_label: Option<String>,
    pub style: EdgeStyle,
}

impl GraphEdge {
    pub fn edge_id(source: &str, target: &str, index: u32) -> String {
        format!("{}|{}|{}", source, target, index)
    }

    /// Unassigned, neutral edge
    pub fn new(source: impl Into<String>, target: impl Into<String>, index: u32) -> Self {
        let source = source.into();
        let target = target.into();
        Self {
            id: Self::edge_id(&source, &target, index),
            source,
            target,
            index,
            assigned_signal: None,
            rate: None,
            current_label: None,
            style: EdgeStyle::Neutral,
        }
    }

    pub fn is_unassigned(&self) -> bool {
        self.assigned_signal.is_none()
    }

    pub fn connects(&self, source: &str, target: &str) -> bool {
        self.source == source && self.target == target
    }

    /// Bind (if needed) and show `rate` in the signal's color
    pub(crate) fn paint(&mut self, signal: SignalType, rate: f64) {
        self.assigned_signal = Some(signal);
        self.rate = Some(rate);
        self.current_label = Some(format_rate(rate));
        self.style = EdgeStyle::Signal(signal);
    }

    /// Back to a neutral stroke with no label; the binding stays
    pub(crate) fn clear_display(&mut self) {
        self.rate = None;
        self.current_label = None;
        self.style = EdgeStyle::Neutral;
    }

    pub fn color(&self) -> &'static str {
        self.style.color()
    }

    /// Rendering slot relative to the direct path: 0, +1, -1, +2, -2, ...
    pub fn offset_slot(&self) -> i32 {
        let step = self.index.div_ceil(2) as i32;
        if self.index % 2 == 1 {
            step
        } else {
            -step
        }
    }
}

/// Format a rate for an edge label: at most two decimals, no trailing zeros
pub fn format_rate(rate: f64) -> String {
    let text = format!("{:.2}", rate);
    let text = text.trim_end_matches('0').trim_end_matches('.');
    if text == "-0" {
        "0".to_string()
    } else {
        text.to_string()
    }
}

/// Laid-out graph for one topology snapshot
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct FlowGraph {
    pub nodes: Vec<GraphNode>,
    pub edges: Vec<GraphEdge>,
}

impl FlowGraph {
    pub fn node(&self, id: &str) -> Option<&GraphNode> {
        self.nodes.iter().find(|n| n.id == id)
    }

    pub fn edge(&self, id: &str) -> Option<&GraphEdge> {
        self.edges.iter().find(|e| e.id == id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rate_labels_trim_trailing_zeros() {
        assert_eq!(format_rate(5.0), "5");
        assert_eq!(format_rate(2.5), "2.5");
        assert_eq!(format_rate(1.0 / 3.0), "0.33");
        assert_eq!(format_rate(0.0), "0");
        assert_eq!(format_rate(1200.004), "1200");
    }

    #[test]
    fn offset_slots_alternate_around_direct_path() {
        let slots: Vec<i32> = (0..5)
            .map(|i| GraphEdge::new("a", "b", i).offset_slot())
            .collect();
        assert_eq!(slots, vec![0, 1, -1, 2, -2]);
    }

    #[test]
    fn clearing_display_keeps_binding() {
        let mut edge = GraphEdge::new("a", "b", 0);
        edge.paint(SignalType::LokiLog, 3.0);
        assert_eq!(edge.color(), SignalType::LokiLog.color());

        edge.clear_display();
        assert_eq!(edge.assigned_signal, Some(SignalType::LokiLog));
        assert_eq!(edge.current_label, None);
        assert_eq!(edge.color(), NEUTRAL_COLOR);
    }
}
