// Graph layout
//
// The layout engine is a stateless function of its full input. `LayeredLayout`
// is the built-in implementation; anything else plugs in through `Layout`.

use petgraph::algo::toposort;
use petgraph::graphmap::DiGraphMap;
use petgraph::visit::{depth_first_search, DfsEvent};
use petgraph::Direction;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
#[error("layout failed: {0}")]
pub struct LayoutError(pub String);

/// Center of a node
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

pub type Positions = HashMap<String, Position>;

#[derive(Clone, Debug, PartialEq)]
pub struct LayoutNode {
    pub id: String,
    pub width: f64,
    pub height: f64,
}

#[derive(Clone, Debug, PartialEq)]
pub struct LayoutEdge {
    pub source: String,
    pub target: String,
}

pub trait Layout: Send + Sync {
    /// Compute a position for every node
    fn layout(&self, nodes: &[LayoutNode], edges: &[LayoutEdge]) -> Result<Positions, LayoutError>;
}

/// Top-to-bottom layered layout.
///
/// Ranks are longest-path distances from the roots after dropping edges that
/// close a cycle (found by DFS in input order). Nodes keep input order within a
/// rank, so identical input always yields identical positions.
#[derive(Clone, Debug)]
pub struct LayeredLayout {
    pub node_sep: f64,
    pub rank_sep: f64,
}

impl Default for LayeredLayout {
    fn default() -> Self {
        Self {
            node_sep: 50.0,
            rank_sep: 50.0,
        }
    }
}

impl LayeredLayout {
    fn ranks(nodes: &[LayoutNode], edges: &[LayoutEdge]) -> Result<Vec<usize>, LayoutError> {
        let index: HashMap<&str, usize> = nodes
            .iter()
            .enumerate()
            .map(|(i, n)| (n.id.as_str(), i))
            .collect();

        // Nodes are graph-map keys by input position, so iteration follows input order
        let mut graph: DiGraphMap<usize, ()> = DiGraphMap::with_capacity(nodes.len(), edges.len());
        for i in 0..nodes.len() {
            graph.add_node(i);
        }
        for edge in edges {
            if let (Some(&s), Some(&t)) = (
                index.get(edge.source.as_str()),
                index.get(edge.target.as_str()),
            ) {
                if s != t {
                    graph.add_edge(s, t, ());
                }
            }
        }

        let mut back_edges = Vec::new();
        depth_first_search(&graph, 0..nodes.len(), |event| {
            if let DfsEvent::BackEdge(u, v) = event {
                back_edges.push((u, v));
            }
        });
        for (u, v) in back_edges {
            graph.remove_edge(u, v);
        }

        let order = toposort(&graph, None)
            .map_err(|cycle| LayoutError(format!("cycle left at node {}", nodes[cycle.node_id()].id)))?;

        let mut rank = vec![0usize; nodes.len()];
        for node in order {
            for next in graph.neighbors_directed(node, Direction::Outgoing) {
                rank[next] = rank[next].max(rank[node] + 1);
            }
        }
        Ok(rank)
    }
}

impl Layout for LayeredLayout {
    fn layout(&self, nodes: &[LayoutNode], edges: &[LayoutEdge]) -> Result<Positions, LayoutError> {
        if let Some(bad) = nodes
            .iter()
            .find(|n| !(n.width.is_finite() && n.height.is_finite()) || n.width < 0.0 || n.height < 0.0)
        {
            return Err(LayoutError(format!("invalid size for node {}", bad.id)));
        }

        let ranks = Self::ranks(nodes, edges)?;
        let rank_count = ranks.iter().copied().max().map_or(0, |r| r + 1);

        let mut rank_height = vec![0.0f64; rank_count];
        for (node, &r) in nodes.iter().zip(&ranks) {
            rank_height[r] = rank_height[r].max(node.height);
        }
        let mut rank_top = Vec::with_capacity(rank_count);
        let mut y = 0.0;
        for h in &rank_height {
            rank_top.push(y);
            y += h + self.rank_sep;
        }

        let mut cursor = vec![0.0f64; rank_count];
        let mut positions = Positions::with_capacity(nodes.len());
        for (node, &r) in nodes.iter().zip(&ranks) {
            let x = cursor[r] + node.width / 2.0;
            cursor[r] += node.width + self.node_sep;
            positions.insert(
                node.id.clone(),
                Position {
                    x,
                    y: rank_top[r] + rank_height[r] / 2.0,
                },
            );
        }
        Ok(positions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(id: &str) -> LayoutNode {
        LayoutNode {
            id: id.to_string(),
            width: 100.0,
            height: 40.0,
        }
    }

    fn edge(s: &str, t: &str) -> LayoutEdge {
        LayoutEdge {
            source: s.to_string(),
            target: t.to_string(),
        }
    }

    #[test]
    fn chain_is_ranked_top_to_bottom() {
        let nodes = vec![node("a"), node("b"), node("c")];
        let pos = LayeredLayout::default()
            .layout(&nodes, &[edge("a", "b"), edge("b", "c")])
            .unwrap();
        assert!(pos["a"].y < pos["b"].y);
        assert!(pos["b"].y < pos["c"].y);
        assert_eq!(pos["a"].x, pos["c"].x);
    }

    #[test]
    fn cycles_terminate() {
        let nodes = vec![node("a"), node("b")];
        let pos = LayeredLayout::default()
            .layout(&nodes, &[edge("a", "b"), edge("b", "a"), edge("a", "a")])
            .unwrap();
        assert_eq!(pos.len(), 2);
        assert!(pos["a"].y < pos["b"].y);
    }

    #[test]
    fn siblings_share_a_rank() {
        let nodes = vec![node("src"), node("x"), node("y")];
        let pos = LayeredLayout::default()
            .layout(&nodes, &[edge("src", "x"), edge("src", "y")])
            .unwrap();
        assert_eq!(pos["x"].y, pos["y"].y);
        assert!(pos["x"].x < pos["y"].x);
    }

    #[test]
    fn cycle_inside_a_diamond_keeps_longest_path_ranks() {
        // a -> b -> d, a -> c -> d, plus d -> a closing a cycle
        let nodes = vec![node("a"), node("b"), node("c"), node("d"), node("e")];
        let edges = vec![
            edge("a", "b"),
            edge("a", "c"),
            edge("b", "d"),
            edge("c", "d"),
            edge("d", "a"),
            edge("c", "e"),
            edge("e", "d"),
        ];
        let ranks = LayeredLayout::ranks(&nodes, &edges).unwrap();
        assert_eq!(ranks, vec![0, 1, 1, 3, 2]);
    }

    #[test]
    fn edges_to_unknown_nodes_are_ignored() {
        let nodes = vec![node("a"), node("b")];
        let ranks = LayeredLayout::ranks(&nodes, &[edge("a", "ghost"), edge("ghost", "b")]).unwrap();
        assert_eq!(ranks, vec![0, 0]);
    }

    #[test]
    fn rejects_non_finite_sizes() {
        let mut bad = node("a");
        bad.width = f64::NAN;
        assert!(LayeredLayout::default().layout(&[bad], &[]).is_err());
    }
}
