//! A* search over the waypoint graph

use super::graph::{NavConnection, NavNode, NavigationGraph};
use crate::core::{Position, TransitionType, FLOOR_CHANGE_TIME_S, WALKING_SPEED_MPS};
use crate::utils::RoutingConfig;
use crate::validation::GraphError;
use log::{debug, trace};
use serde::Serialize;
use std::cmp::Ordering;
use std::collections::BinaryHeap;

/// Open-set entry
#[derive(Clone, Copy, Debug)]
struct AStarNode {
    index: usize,
    g_cost: f64,
    f_cost: f64,
}

impl Eq for AStarNode {}

impl PartialEq for AStarNode {
    fn eq(&self, other: &Self) -> bool {
        self.index == other.index
    }
}

impl Ord for AStarNode {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reverse ordering for min-heap behavior
        other.f_cost.total_cmp(&self.f_cost)
    }
}

impl PartialOrd for AStarNode {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// One stop along a route
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Waypoint {
    pub id: String,
    pub position: Position,
}

impl From<&NavNode> for Waypoint {
    fn from(node: &NavNode) -> Self {
        Self {
            id: node.id.clone(),
            position: node.position,
        }
    }
}

/// Walking figures for a route
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RouteMetrics {
    /// Planar length summed over every leg
    pub distance_m: f64,
    /// Floors crossed, counting a multi-floor ride once per floor
    pub floor_changes: u32,
    pub estimated_time_s: f64,
}

/// Ordered waypoints from start to destination; empty when unreachable
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct PathResult {
    pub nodes: Vec<Waypoint>,
    /// Accumulated search cost, including transition factors
    pub cost: f64,
}

impl PathResult {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn ids(&self) -> Vec<&str> {
        self.nodes.iter().map(|w| w.id.as_str()).collect()
    }

    pub fn start(&self) -> Option<&Waypoint> {
        self.nodes.first()
    }

    pub fn destination(&self) -> Option<&Waypoint> {
        self.nodes.last()
    }

    pub fn metrics(&self) -> RouteMetrics {
        let mut distance_m = 0.0;
        let mut floor_changes = 0;
        for leg in self.nodes.windows(2) {
            distance_m += leg[0].position.planar_distance(&leg[1].position);
            floor_changes += leg[1].position.floor.abs_diff(leg[0].position.floor);
        }
        RouteMetrics {
            distance_m,
            floor_changes,
            estimated_time_s: distance_m / WALKING_SPEED_MPS
                + floor_changes as f64 * FLOOR_CHANGE_TIME_S,
        }
    }
}

/// A* engine bound to one graph and one set of routing preferences.
///
/// Edge cost is `distance * factor`. Same-floor edges use factor 1; floor
/// transitions multiply a base factor (raised when accessible routes are
/// preferred) by the connector's type factor, discounted for the preferred
/// connector type.
///
/// The heuristic is planar distance scaled by the cheapest transition factor
/// plus a per-floor term bounded by what the graph's transitions actually
/// cost, so it never overestimates as long as edge distances are at least
/// the straight-line distance between their endpoints.
#[derive(Debug, Clone)]
pub struct PathfindingEngine {
    graph: NavigationGraph,
    config: RoutingConfig,
    /// Multiplier on planar distance in the heuristic
    planar_scale: f64,
    /// Heuristic cost per floor of separation
    floor_penalty: f64,
}

impl PathfindingEngine {
    /// Take ownership of a graph; an empty graph is rejected
    pub fn new(graph: NavigationGraph, config: RoutingConfig) -> Result<Self, GraphError> {
        if graph.is_empty() {
            return Err(GraphError::Empty);
        }
        let mut engine = Self {
            graph,
            config,
            planar_scale: 1.0,
            floor_penalty: 0.0,
        };
        engine.derive_heuristic_bounds();
        Ok(engine)
    }

    pub fn graph(&self) -> &NavigationGraph {
        &self.graph
    }

    pub fn config(&self) -> &RoutingConfig {
        &self.config
    }

    pub fn heuristic_floor_penalty(&self) -> f64 {
        self.floor_penalty
    }

    /// Change accessibility and connector preferences.
    ///
    /// Costs change with them, so callers holding cached paths must drop them.
    pub fn set_preferences(
        &mut self,
        prefer_accessible_routes: bool,
        preferred_transition_type: Option<TransitionType>,
    ) {
        self.config.prefer_accessible_routes = prefer_accessible_routes;
        self.config.preferred_transition_type = preferred_transition_type;
        self.derive_heuristic_bounds();
    }

    fn transition_factor(&self, transition_type: Option<TransitionType>) -> f64 {
        let base = if self.config.prefer_accessible_routes {
            self.config.accessible_base_factor
        } else {
            1.0
        };
        let type_factor = match transition_type {
            Some(TransitionType::Stairs) => self.config.stairs_factor,
            Some(TransitionType::Escalator) => self.config.escalator_factor,
            Some(TransitionType::Elevator) => self.config.elevator_factor,
            None => 1.0,
        };
        let discount = match (transition_type, self.config.preferred_transition_type) {
            (Some(t), Some(preferred)) if t == preferred => self.config.preferred_discount,
            _ => 1.0,
        };
        base * type_factor * discount
    }

    /// Cost of traversing one connection
    pub fn edge_cost(&self, connection: &NavConnection) -> f64 {
        let factor = if connection.is_floor_transition {
            self.transition_factor(connection.transition_type)
        } else {
            1.0
        };
        connection.distance as f64 * factor
    }

    fn derive_heuristic_bounds(&mut self) {
        let transitions: Vec<(&NavNode, &NavConnection)> = self
            .graph
            .nodes()
            .iter()
            .flat_map(|n| n.connections.iter().map(move |c| (n, c)))
            .filter(|(_, c)| c.is_floor_transition)
            .collect();

        let scale = transitions
            .iter()
            .map(|(_, c)| self.transition_factor(c.transition_type))
            .fold(1.0_f64, f64::min)
            .max(0.0);

        let mut bound = self.config.floor_heuristic_penalty.max(0.0);
        for (node, conn) in &transitions {
            let Some(target) = self.graph.node(&conn.target_node_id) else {
                continue;
            };
            let floors = target.position.floor.abs_diff(node.position.floor);
            if floors == 0 {
                continue;
            }
            let planar = node.position.planar_distance(&target.position);
            let per_floor = (self.edge_cost(conn) - scale * planar) / floors as f64;
            bound = bound.min(per_floor.max(0.0));
        }

        self.planar_scale = scale;
        self.floor_penalty = bound;
        trace!(
            "[AStar] heuristic scale {:.3}, floor penalty {:.3}",
            self.planar_scale,
            self.floor_penalty
        );
    }

    fn heuristic(&self, from: &Position, to: &Position) -> f64 {
        let floors = from.floor.abs_diff(to.floor) as f64;
        self.planar_scale * from.planar_distance(to) + self.floor_penalty * floors
    }

    /// Lowest-cost route between two node ids; empty when either id is
    /// unknown or the destination cannot be reached.
    pub fn find_path(&self, start_id: &str, end_id: &str) -> PathResult {
        trace!("[AStar] find_path: {} -> {}", start_id, end_id);

        let (Some(start), Some(goal)) = (self.graph.index_of(start_id), self.graph.index_of(end_id))
        else {
            debug!("[AStar] FAILED: unknown endpoint {} -> {}", start_id, end_id);
            return PathResult::empty();
        };

        let nodes = self.graph.nodes();
        let goal_position = nodes[goal].position;

        let mut open_set = BinaryHeap::new();
        let mut closed = vec![false; nodes.len()];
        let mut came_from: Vec<Option<usize>> = vec![None; nodes.len()];
        let mut g_scores = vec![f64::INFINITY; nodes.len()];

        g_scores[start] = 0.0;
        open_set.push(AStarNode {
            index: start,
            g_cost: 0.0,
            f_cost: self.heuristic(&nodes[start].position, &goal_position),
        });

        let mut nodes_expanded = 0usize;

        while let Some(current) = open_set.pop() {
            if current.index == goal {
                trace!("[AStar] reached {} after expanding {} nodes", end_id, nodes_expanded);
                return self.reconstruct_path(&came_from, goal, current.g_cost);
            }
            if closed[current.index] {
                continue;
            }
            closed[current.index] = true;
            nodes_expanded += 1;

            for conn in &nodes[current.index].connections {
                let Some(neighbor) = self.graph.index_of(&conn.target_node_id) else {
                    continue;
                };
                if closed[neighbor] {
                    continue;
                }
                if !nodes[neighbor].traversable && neighbor != goal {
                    continue;
                }

                let tentative_g = g_scores[current.index] + self.edge_cost(conn);
                if tentative_g < g_scores[neighbor] {
                    came_from[neighbor] = Some(current.index);
                    g_scores[neighbor] = tentative_g;
                    open_set.push(AStarNode {
                        index: neighbor,
                        g_cost: tentative_g,
                        f_cost: tentative_g
                            + self.heuristic(&nodes[neighbor].position, &goal_position),
                    });
                }
            }
        }

        debug!(
            "[AStar] FAILED: no path {} -> {} after expanding {} nodes",
            start_id, end_id, nodes_expanded
        );
        PathResult::empty()
    }

    /// Route from the node closest to `position` to `end_id`
    pub fn find_path_from(&self, position: &Position, end_id: &str) -> PathResult {
        match self.graph.find_closest_node(position) {
            Some(start) => self.find_path(&start.id, end_id),
            None => PathResult::empty(),
        }
    }

    fn reconstruct_path(&self, came_from: &[Option<usize>], goal: usize, cost: f64) -> PathResult {
        let nodes = self.graph.nodes();
        let mut path = vec![Waypoint::from(&nodes[goal])];
        let mut current = goal;
        while let Some(prev) = came_from[current] {
            path.push(Waypoint::from(&nodes[prev]));
            current = prev;
        }
        path.reverse();
        PathResult { nodes: path, cost }
    }
}
