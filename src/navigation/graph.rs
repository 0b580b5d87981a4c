//! Waypoint graph for multi-floor routing
//!
//! Nodes live in a flat arena indexed by position; an id map resolves the
//! string ids used by callers and by serialized graph definitions.

use crate::core::{Position, TransitionType, FLOOR_MISMATCH_PENALTY};
use crate::validation::GraphError;
use log::debug;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Directed edge to another waypoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NavConnection {
    pub target_node_id: String,
    pub distance: f32,
    pub is_floor_transition: bool,
    pub transition_type: Option<TransitionType>,
}

/// Walkable waypoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NavNode {
    pub id: String,
    pub position: Position,
    /// Closed or restricted waypoints are only usable as route endpoints
    pub traversable: bool,
    pub connections: Vec<NavConnection>,
}

impl NavNode {
    pub fn new(id: impl Into<String>, position: Position) -> Self {
        Self {
            id: id.into(),
            position,
            traversable: true,
            connections: Vec::new(),
        }
    }

    pub fn blocked(mut self) -> Self {
        self.traversable = false;
        self
    }
}

fn default_true() -> bool {
    true
}

/// Serialized node entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeDefinition {
    pub id: String,
    #[serde(flatten)]
    pub position: Position,
    #[serde(default = "default_true")]
    pub traversable: bool,
}

/// Serialized edge entry
///
/// A missing distance defaults to the planar distance between the endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EdgeDefinition {
    pub from: String,
    pub to: String,
    #[serde(default)]
    pub distance: Option<f32>,
    #[serde(default)]
    pub transition_type: Option<TransitionType>,
    #[serde(default = "default_true")]
    pub bidirectional: bool,
}

/// Building graph as stored on disk
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GraphDefinition {
    pub nodes: Vec<NodeDefinition>,
    #[serde(default)]
    pub edges: Vec<EdgeDefinition>,
}

/// Arena of waypoints with an id index
#[derive(Debug, Clone, Default)]
pub struct NavigationGraph {
    nodes: Vec<NavNode>,
    index: HashMap<String, usize>,
}

impl NavigationGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build and validate a graph from its serialized form
    pub fn from_definition(definition: GraphDefinition) -> Result<Self, GraphError> {
        if definition.nodes.is_empty() {
            return Err(GraphError::Empty);
        }

        let mut graph = Self::new();
        for node in definition.nodes {
            let mut nav_node = NavNode::new(node.id, node.position);
            nav_node.traversable = node.traversable;
            graph.add_node(nav_node)?;
        }
        for edge in &definition.edges {
            let distance = match edge.distance {
                Some(d) => d,
                None => {
                    let from = graph.position_of(&edge.from)?;
                    let to = graph.position_of(&edge.to)?;
                    from.planar_distance(&to) as f32
                }
            };
            graph.add_edge(&edge.from, &edge.to, distance, edge.transition_type, edge.bidirectional)?;
        }

        debug!(
            "[NavGraph] loaded {} nodes, {} edges",
            graph.len(),
            graph.edge_count()
        );
        Ok(graph)
    }

    /// Insert a node, returning its arena index
    pub fn add_node(&mut self, node: NavNode) -> Result<usize, GraphError> {
        if !node.position.is_finite() {
            return Err(GraphError::InvalidPosition(node.id));
        }
        if self.index.contains_key(&node.id) {
            return Err(GraphError::DuplicateNode(node.id));
        }
        let idx = self.nodes.len();
        self.index.insert(node.id.clone(), idx);
        self.nodes.push(node);
        Ok(idx)
    }

    /// Connect two existing nodes.
    ///
    /// The edge is a floor transition when the endpoints sit on different
    /// floors or a transition type is given.
    pub fn add_edge(
        &mut self,
        from: &str,
        to: &str,
        distance: f32,
        transition_type: Option<TransitionType>,
        bidirectional: bool,
    ) -> Result<(), GraphError> {
        if !distance.is_finite() || distance < 0.0 {
            return Err(GraphError::InvalidDistance {
                from: from.to_string(),
                to: to.to_string(),
                distance,
            });
        }
        let from_idx = self.require(from)?;
        let to_idx = self.require(to)?;
        let is_floor_transition = transition_type.is_some()
            || self.nodes[from_idx].position.floor != self.nodes[to_idx].position.floor;

        self.nodes[from_idx].connections.push(NavConnection {
            target_node_id: to.to_string(),
            distance,
            is_floor_transition,
            transition_type,
        });
        if bidirectional {
            self.nodes[to_idx].connections.push(NavConnection {
                target_node_id: from.to_string(),
                distance,
                is_floor_transition,
                transition_type,
            });
        }
        Ok(())
    }

    fn require(&self, id: &str) -> Result<usize, GraphError> {
        self.index_of(id)
            .ok_or_else(|| GraphError::UnknownNode(id.to_string()))
    }

    fn position_of(&self, id: &str) -> Result<Position, GraphError> {
        self.require(id).map(|idx| self.nodes[idx].position)
    }

    pub fn index_of(&self, id: &str) -> Option<usize> {
        self.index.get(id).copied()
    }

    pub fn node(&self, id: &str) -> Option<&NavNode> {
        self.index_of(id).map(|idx| &self.nodes[idx])
    }

    pub fn node_at(&self, idx: usize) -> Option<&NavNode> {
        self.nodes.get(idx)
    }

    pub fn nodes(&self) -> &[NavNode] {
        &self.nodes
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn edge_count(&self) -> usize {
        self.nodes.iter().map(|n| n.connections.len()).sum()
    }

    /// Nearest node by planar distance plus a fixed penalty per floor of
    /// mismatch. Ties keep the first node inserted.
    pub fn find_closest_node(&self, position: &Position) -> Option<&NavNode> {
        let score = |node: &NavNode| {
            let floors = node.position.floor.abs_diff(position.floor) as f64;
            node.position.planar_distance(position) + floors * FLOOR_MISMATCH_PENALTY
        };
        self.nodes
            .iter()
            .fold(None, |best: Option<(&NavNode, f64)>, node| {
                let s = score(node);
                match best {
                    Some((_, best_score)) if best_score <= s => best,
                    _ => Some((node, s)),
                }
            })
            .map(|(node, _)| node)
    }

    /// Nearest node on the position's own floor
    pub fn find_closest_node_on_floor(&self, position: &Position) -> Option<&NavNode> {
        self.nodes
            .iter()
            .filter(|n| n.position.floor == position.floor)
            .fold(None, |best: Option<(&NavNode, f64)>, node| {
                let d = node.position.planar_distance(position);
                match best {
                    Some((_, best_d)) if best_d <= d => best,
                    _ => Some((node, d)),
                }
            })
            .map(|(node, _)| node)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_floor_graph() -> NavigationGraph {
        let mut graph = NavigationGraph::new();
        graph.add_node(NavNode::new("A", Position::new(0.0, 0.0, 0))).unwrap();
        graph.add_node(NavNode::new("B", Position::new(10.0, 0.0, 0))).unwrap();
        graph.add_node(NavNode::new("C", Position::new(10.0, 0.0, 1))).unwrap();
        graph.add_edge("A", "B", 10.0, None, true).unwrap();
        graph
            .add_edge("B", "C", 0.0, Some(TransitionType::Elevator), true)
            .unwrap();
        graph
    }

    #[test]
    fn test_closest_node_on_exact_position() {
        let graph = two_floor_graph();
        for node in graph.nodes() {
            let found = graph.find_closest_node(&node.position).unwrap();
            assert_eq!(found.id, node.id);
        }
    }

    #[test]
    fn test_floor_mismatch_outweighs_planar_distance() {
        let graph = two_floor_graph();
        // 1 m from C on floor 0 is still closer to B than C
        let found = graph.find_closest_node(&Position::new(10.0, 1.0, 0)).unwrap();
        assert_eq!(found.id, "B");

        let upstairs = graph.find_closest_node_on_floor(&Position::new(0.0, 0.0, 1)).unwrap();
        assert_eq!(upstairs.id, "C");
        assert!(graph.find_closest_node_on_floor(&Position::new(0.0, 0.0, 5)).is_none());
    }

    #[test]
    fn test_edges_flag_floor_transitions() {
        let graph = two_floor_graph();
        let b = graph.node("B").unwrap();

        assert_eq!(b.connections.len(), 2);
        assert!(!b.connections[0].is_floor_transition);
        assert!(b.connections[1].is_floor_transition);
        assert_eq!(b.connections[1].transition_type, Some(TransitionType::Elevator));
        assert_eq!(graph.edge_count(), 4);
    }

    #[test]
    fn test_rejects_malformed_input() {
        let mut graph = two_floor_graph();
        assert_eq!(
            graph.add_node(NavNode::new("A", Position::new(1.0, 1.0, 0))),
            Err(GraphError::DuplicateNode("A".into()))
        );
        assert_eq!(
            graph.add_node(NavNode::new("N", Position::new(f64::NAN, 1.0, 0))),
            Err(GraphError::InvalidPosition("N".into()))
        );
        assert_eq!(
            graph.add_edge("A", "Z", 1.0, None, true),
            Err(GraphError::UnknownNode("Z".into()))
        );
        assert!(matches!(
            graph.add_edge("A", "B", -1.0, None, true),
            Err(GraphError::InvalidDistance { .. })
        ));
    }

    #[test]
    fn test_from_definition() {
        let json = r#"{
            "nodes": [
                {"id": "lobby", "x": 0.0, "y": 0.0, "floor": 0},
                {"id": "hall", "x": 3.0, "y": 4.0, "floor": 0, "traversable": false}
            ],
            "edges": [
                {"from": "lobby", "to": "hall", "bidirectional": false}
            ]
        }"#;
        let definition: GraphDefinition = serde_json::from_str(json).unwrap();
        let graph = NavigationGraph::from_definition(definition).unwrap();

        assert_eq!(graph.len(), 2);
        assert!(!graph.node("hall").unwrap().traversable);
        let lobby = graph.node("lobby").unwrap();
        assert_eq!(lobby.connections[0].distance, 5.0);
        assert!(graph.node("hall").unwrap().connections.is_empty());
    }

    #[test]
    fn test_empty_definition_fails() {
        assert_eq!(
            NavigationGraph::from_definition(GraphDefinition::default()).unwrap_err(),
            GraphError::Empty
        );
    }

    #[test]
    fn test_closest_node_across_extreme_floors() {
        let mut graph = NavigationGraph::new();
        graph.add_node(NavNode::new("basement", Position::new(0.0, 0.0, i32::MIN))).unwrap();
        graph.add_node(NavNode::new("roof", Position::new(50.0, 0.0, i32::MAX))).unwrap();

        let closest = graph.find_closest_node(&Position::new(0.0, 0.0, i32::MAX)).unwrap();
        assert_eq!(closest.id, "roof");
    }
}
