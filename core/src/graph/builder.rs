// Graph builder
//
// Turns a flat component listing into nodes plus one static edge per declared
// dependency, then asks the layout engine for positions.

use super::layout::{Layout, LayoutEdge, LayoutNode};
use super::{FlowGraph, GraphEdge, GraphError, GraphNode};
use crate::topology::ComponentDescriptor;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::debug;

const CHAR_WIDTH: f64 = 8.0;
const LINE_HEIGHT: f64 = 18.0;
const PADDING_X: f64 = 16.0;
const PADDING_Y: f64 = 12.0;
const MIN_NODE_WIDTH: f64 = 120.0;

/// Node size for a (possibly multi-line) label
pub fn node_size(display_label: &str) -> (f64, f64) {
    let lines: Vec<&str> = display_label.lines().collect();
    let longest = lines.iter().map(|l| l.chars().count()).max().unwrap_or(0);
    let line_count = lines.len().max(1);
    let width = (longest as f64 * CHAR_WIDTH + 2.0 * PADDING_X).max(MIN_NODE_WIDTH);
    let height = line_count as f64 * LINE_HEIGHT + 2.0 * PADDING_Y;
    (width, height)
}

fn display_label(component: &ComponentDescriptor) -> String {
    match component.label.as_deref() {
        Some(label) if !label.is_empty() => format!("{}\n{}", component.display_name, label),
        _ => component.display_name.clone(),
    }
}

pub struct GraphBuilder {
    layout: Arc<dyn Layout>,
}

impl GraphBuilder {
    pub fn new(layout: Arc<dyn Layout>) -> Self {
        Self { layout }
    }

    /// Build the static graph for one topology snapshot.
    ///
    /// Every edge starts unassigned at index 0. The layout is called exactly
    /// once; if it fails no graph is returned.
    pub fn build(&self, components: &[ComponentDescriptor]) -> Result<FlowGraph, GraphError> {
        let mut seen_nodes = HashSet::new();
        let mut layout_nodes = Vec::with_capacity(components.len());
        let mut labels = Vec::with_capacity(components.len());

        for component in components {
            if !seen_nodes.insert(component.id.as_str()) {
                debug!(target: "graph", id = %component.id, "Duplicate component id; keeping first");
                continue;
            }
            let label = display_label(component);
            let (width, height) = node_size(&label);
            layout_nodes.push(LayoutNode {
                id: component.id.clone(),
                width,
                height,
            });
            labels.push(label);
        }

        let mut seen_pairs = HashSet::new();
        let mut edges = Vec::new();
        for component in components {
            for target in &component.static_dependency_ids {
                if !seen_pairs.insert((component.id.as_str(), target.as_str())) {
                    continue;
                }
                if !seen_nodes.contains(target.as_str()) {
                    debug!(
                        target: "graph",
                        source = %component.id,
                        dependency = %target,
                        "Dependency on unknown component"
                    );
                }
                edges.push(GraphEdge::new(component.id.as_str(), target.as_str(), 0));
            }
        }

        let layout_edges: Vec<LayoutEdge> = edges
            .iter()
            .map(|e| LayoutEdge {
                source: e.source.clone(),
                target: e.target.clone(),
            })
            .collect();

        let positions = self.layout.layout(&layout_nodes, &layout_edges)?;

        let mut nodes = Vec::with_capacity(layout_nodes.len());
        for (layout_node, display_label) in layout_nodes.into_iter().zip(labels) {
            let position = *positions
                .get(&layout_node.id)
                .ok_or_else(|| GraphError::MissingPosition(layout_node.id.clone()))?;
            nodes.push(GraphNode {
                id: layout_node.id,
                display_label,
                width: layout_node.width,
                height: layout_node.height,
                position,
            });
        }

        debug!(
            target: "graph",
            nodes = nodes.len(),
            edges = edges.len(),
            "Built graph"
        );

        Ok(FlowGraph { nodes, edges })
    }
}
