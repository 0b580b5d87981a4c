//! Live route following with deviation and floor-change rerouting

use super::astar::{PathResult, PathfindingEngine};
use super::cache::PathCache;
use crate::core::Position;
use crate::utils::RoutingConfig;
use log::debug;
use serde::Serialize;

/// Why a new route was planned
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RerouteReason {
    /// First route toward a new destination
    Initial,
    /// Position drifted beyond the deviation threshold
    Deviation,
    /// Position is on a floor the rest of the route never visits
    FloorChange,
}

/// Result of one tracking step
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RouteUpdate {
    NoDestination,
    OnRoute {
        /// Index of the waypoint the current leg starts from
        progress: usize,
        remaining_m: f64,
    },
    Rerouted {
        reason: RerouteReason,
        path: PathResult,
    },
    Unreachable,
}

/// Point-to-segment distance in the plane
fn distance_to_segment(p: &Position, a: &Position, b: &Position) -> f64 {
    let (dx, dy) = (b.x - a.x, b.y - a.y);
    let len_sq = dx * dx + dy * dy;
    if len_sq <= f64::EPSILON {
        return p.planar_distance(a);
    }
    let t = (((p.x - a.x) * dx + (p.y - a.y) * dy) / len_sq).clamp(0.0, 1.0);
    let (cx, cy) = (a.x + t * dx, a.y + t * dy);
    ((p.x - cx).powi(2) + (p.y - cy).powi(2)).sqrt()
}

/// Closest part of the route from `progress` on, as (leg index, distance).
///
/// Legs count when both ends are on the position's floor; single waypoints
/// on that floor count as points so transition landings are covered.
fn nearest_leg(path: &PathResult, progress: usize, position: &Position) -> Option<(usize, f64)> {
    let nodes = &path.nodes;
    let points = (progress..nodes.len())
        .filter(|&i| nodes[i].position.floor == position.floor)
        .map(|i| (i, position.planar_distance(&nodes[i].position)));
    let legs = (progress..nodes.len().saturating_sub(1))
        .filter(|&i| {
            nodes[i].position.floor == position.floor && nodes[i + 1].position.floor == position.floor
        })
        .map(|i| (i, distance_to_segment(position, &nodes[i].position, &nodes[i + 1].position)));

    points.chain(legs).min_by(|a, b| a.1.total_cmp(&b.1))
}

/// Follows the user along a route toward one destination
#[derive(Debug, Clone)]
pub struct RouteTracker {
    destination: Option<String>,
    active: Option<PathResult>,
    progress: usize,
    deviation_threshold_m: f64,
    cache: PathCache,
}

impl RouteTracker {
    pub fn new(config: &RoutingConfig) -> Self {
        Self {
            destination: None,
            active: None,
            progress: 0,
            deviation_threshold_m: config.deviation_threshold_m,
            cache: PathCache::new(config.cache_capacity),
        }
    }

    pub fn set_destination(&mut self, node_id: impl Into<String>) {
        self.destination = Some(node_id.into());
        self.active = None;
        self.progress = 0;
    }

    pub fn clear_destination(&mut self) {
        self.destination = None;
        self.active = None;
        self.progress = 0;
    }

    pub fn destination(&self) -> Option<&str> {
        self.destination.as_deref()
    }

    pub fn active_path(&self) -> Option<&PathResult> {
        self.active.as_ref()
    }

    pub fn progress(&self) -> usize {
        self.progress
    }

    pub fn cache(&self) -> &PathCache {
        &self.cache
    }

    pub fn deviation_threshold(&self) -> f64 {
        self.deviation_threshold_m
    }

    pub fn set_deviation_threshold(&mut self, threshold_m: f64) {
        self.deviation_threshold_m = threshold_m;
    }

    /// Forget cached and active routes, e.g. after routing preferences change
    pub fn invalidate(&mut self) {
        self.cache.clear();
        self.active = None;
        self.progress = 0;
    }

    /// Check the position against the active route, planning a new one when
    /// there is none, the user strayed past the threshold, or the user is on
    /// a floor the remaining route never reaches.
    pub fn update(&mut self, engine: &PathfindingEngine, position: &Position) -> RouteUpdate {
        let Some(destination) = self.destination.clone() else {
            return RouteUpdate::NoDestination;
        };
        let graph = engine.graph();

        let Some(active) = &self.active else {
            return match graph.find_closest_node(position) {
                Some(start) => {
                    let start_id = start.id.clone();
                    self.plan(engine, &start_id, &destination, RerouteReason::Initial)
                }
                None => RouteUpdate::Unreachable,
            };
        };

        let on_route_floor = active.nodes[self.progress..]
            .iter()
            .any(|w| w.position.floor == position.floor);
        if !on_route_floor {
            let start = graph
                .find_closest_node_on_floor(position)
                .or_else(|| graph.find_closest_node(position));
            let Some(start_id) = start.map(|n| n.id.clone()) else {
                return RouteUpdate::Unreachable;
            };
            debug!(
                "[RouteTracker] floor {} is off route, resuming from {}",
                position.floor, start_id
            );
            return self.plan(engine, &start_id, &destination, RerouteReason::FloorChange);
        }

        match nearest_leg(active, self.progress, position) {
            Some((leg, deviation)) if deviation <= self.deviation_threshold_m => {
                let progress = leg.max(self.progress);
                let remaining_m = remaining_distance(active, progress, position);
                self.progress = progress;
                RouteUpdate::OnRoute {
                    progress,
                    remaining_m,
                }
            }
            nearest => {
                debug!(
                    "[RouteTracker] deviated {:.1} m (threshold {:.1} m), rerouting",
                    nearest.map_or(f64::INFINITY, |(_, d)| d),
                    self.deviation_threshold_m
                );
                let Some(start_id) = graph.find_closest_node(position).map(|n| n.id.clone()) else {
                    return RouteUpdate::Unreachable;
                };
                self.plan(engine, &start_id, &destination, RerouteReason::Deviation)
            }
        }
    }

    fn plan(
        &mut self,
        engine: &PathfindingEngine,
        start_id: &str,
        destination: &str,
        reason: RerouteReason,
    ) -> RouteUpdate {
        // leaving the route means the stored one no longer fits
        let cached = match reason {
            RerouteReason::Initial => self.cache.get(start_id, destination),
            RerouteReason::Deviation | RerouteReason::FloorChange => {
                self.cache.remove(start_id, destination);
                None
            }
        };
        let path = match cached {
            Some(path) => path,
            None => {
                let path = engine.find_path(start_id, destination);
                if !path.is_empty() {
                    self.cache.insert(start_id, destination, path.clone());
                }
                path
            }
        };

        self.progress = 0;
        if path.is_empty() {
            debug!("[RouteTracker] {} unreachable from {}", destination, start_id);
            self.active = None;
            return RouteUpdate::Unreachable;
        }
        self.active = Some(path.clone());
        RouteUpdate::Rerouted { reason, path }
    }
}

/// Distance to the end of the current leg plus every later leg
fn remaining_distance(path: &PathResult, progress: usize, position: &Position) -> f64 {
    let nodes = &path.nodes;
    let next = (progress + 1).min(nodes.len() - 1);
    let to_next = position
        .distance_to(&nodes[next].position)
        .unwrap_or_else(|| position.planar_distance(&nodes[next].position));
    let rest: f64 = nodes[next..]
        .windows(2)
        .map(|leg| leg[0].position.planar_distance(&leg[1].position))
        .sum();
    to_next + rest
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::TransitionType;
    use crate::navigation::graph::{NavNode, NavigationGraph};
    use approx::assert_relative_eq;

    fn corridor_engine() -> PathfindingEngine {
        let mut graph = NavigationGraph::new();
        graph.add_node(NavNode::new("A", Position::new(0.0, 0.0, 0))).unwrap();
        graph.add_node(NavNode::new("B", Position::new(20.0, 0.0, 0))).unwrap();
        graph.add_node(NavNode::new("E", Position::new(10.0, 16.0, 0))).unwrap();
        graph.add_edge("A", "B", 20.0, None, true).unwrap();
        graph.add_edge("E", "B", 19.0, None, true).unwrap();
        PathfindingEngine::new(graph, RoutingConfig::default()).unwrap()
    }

    fn tower_engine() -> PathfindingEngine {
        let mut graph = NavigationGraph::new();
        graph.add_node(NavNode::new("A", Position::new(0.0, 0.0, 0))).unwrap();
        graph.add_node(NavNode::new("B", Position::new(10.0, 0.0, 0))).unwrap();
        graph.add_node(NavNode::new("C", Position::new(10.0, 0.0, 1))).unwrap();
        graph.add_node(NavNode::new("D", Position::new(20.0, 0.0, 1))).unwrap();
        graph.add_node(NavNode::new("F", Position::new(10.0, 0.0, 2))).unwrap();
        graph.add_edge("A", "B", 10.0, None, true).unwrap();
        graph
            .add_edge("B", "C", 0.0, Some(TransitionType::Elevator), true)
            .unwrap();
        graph.add_edge("C", "D", 10.0, None, true).unwrap();
        graph
            .add_edge("C", "F", 4.0, Some(TransitionType::Stairs), true)
            .unwrap();
        PathfindingEngine::new(graph, RoutingConfig::default()).unwrap()
    }

    #[test]
    fn test_segment_distance() {
        let a = Position::new(0.0, 0.0, 0);
        let b = Position::new(10.0, 0.0, 0);
        assert_relative_eq!(distance_to_segment(&Position::new(5.0, 3.0, 0), &a, &b), 3.0);
        assert_relative_eq!(distance_to_segment(&Position::new(-3.0, 4.0, 0), &a, &b), 5.0);
        assert_relative_eq!(distance_to_segment(&Position::new(1.0, 1.0, 0), &a, &a), 2f64.sqrt());
    }

    #[test]
    fn test_no_destination() {
        let engine = corridor_engine();
        let mut tracker = RouteTracker::new(&RoutingConfig::default());
        assert_eq!(
            tracker.update(&engine, &Position::new(0.0, 0.0, 0)),
            RouteUpdate::NoDestination
        );
    }

    #[test]
    fn test_deviation_beyond_threshold_reroutes() {
        let engine = corridor_engine();
        let mut tracker = RouteTracker::new(&RoutingConfig::default());
        tracker.set_destination("B");

        match tracker.update(&engine, &Position::new(0.0, 0.0, 0)) {
            RouteUpdate::Rerouted { reason, path } => {
                assert_eq!(reason, RerouteReason::Initial);
                assert_eq!(path.ids(), vec!["A", "B"]);
            }
            other => panic!("unexpected {:?}", other),
        }

        // 8 m off the corridor is within the 10 m threshold
        match tracker.update(&engine, &Position::new(10.0, 8.0, 0)) {
            RouteUpdate::OnRoute { progress, remaining_m } => {
                assert_eq!(progress, 0);
                assert_relative_eq!(remaining_m, (100.0f64 + 64.0).sqrt());
            }
            other => panic!("unexpected {:?}", other),
        }

        match tracker.update(&engine, &Position::new(10.0, 15.0, 0)) {
            RouteUpdate::Rerouted { reason, path } => {
                assert_eq!(reason, RerouteReason::Deviation);
                assert_eq!(path.ids(), vec!["E", "B"]);
            }
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(tracker.active_path().unwrap().ids(), vec!["E", "B"]);
    }

    #[test]
    fn test_floor_change_resumes_from_new_floor() {
        let engine = tower_engine();
        let mut tracker = RouteTracker::new(&RoutingConfig::default());
        tracker.set_destination("D");

        tracker.update(&engine, &Position::new(0.0, 0.0, 0));
        assert_eq!(tracker.active_path().unwrap().ids(), vec!["A", "B", "C", "D"]);

        // upstairs, walking toward D
        match tracker.update(&engine, &Position::new(15.0, 0.0, 1)) {
            RouteUpdate::OnRoute { progress, remaining_m } => {
                assert_eq!(progress, 2);
                assert_relative_eq!(remaining_m, 5.0);
            }
            other => panic!("unexpected {:?}", other),
        }

        // overshot to floor 2, which the rest of the route never visits
        match tracker.update(&engine, &Position::new(11.0, 1.0, 2)) {
            RouteUpdate::Rerouted { reason, path } => {
                assert_eq!(reason, RerouteReason::FloorChange);
                assert_eq!(path.ids(), vec!["F", "C", "D"]);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_repeated_deviation_recomputes() {
        let engine = corridor_engine();
        let mut tracker = RouteTracker::new(&RoutingConfig::default());
        tracker.set_destination("B");
        tracker.update(&engine, &Position::new(0.0, 0.0, 0));

        // E stays the closest node while the user lingers off the route
        for _ in 0..3 {
            match tracker.update(&engine, &Position::new(0.0, 15.0, 0)) {
                RouteUpdate::Rerouted { reason, path } => {
                    assert_eq!(reason, RerouteReason::Deviation);
                    assert_eq!(path.ids(), vec!["E", "B"]);
                }
                other => panic!("unexpected {:?}", other),
            }
        }

        let (hits, misses, _) = tracker.cache().get_statistics();
        assert_eq!((hits, misses), (0, 1));
        assert_eq!(tracker.cache().len(), 2);
    }

    #[test]
    fn test_unreachable_destination() {
        let mut graph = NavigationGraph::new();
        graph.add_node(NavNode::new("A", Position::new(0.0, 0.0, 0))).unwrap();
        graph.add_node(NavNode::new("island", Position::new(9.0, 9.0, 0))).unwrap();
        let engine = PathfindingEngine::new(graph, RoutingConfig::default()).unwrap();

        let mut tracker = RouteTracker::new(&RoutingConfig::default());
        tracker.set_destination("island");
        assert_eq!(
            tracker.update(&engine, &Position::new(0.0, 0.0, 0)),
            RouteUpdate::Unreachable
        );
        assert!(tracker.active_path().is_none());
    }

    #[test]
    fn test_reroutes_reuse_cached_paths() {
        let engine = corridor_engine();
        let mut tracker = RouteTracker::new(&RoutingConfig::default());
        tracker.set_destination("B");

        tracker.update(&engine, &Position::new(0.0, 0.0, 0));
        tracker.set_destination("B");
        tracker.update(&engine, &Position::new(0.0, 0.0, 0));

        let (hits, misses, _) = tracker.cache().get_statistics();
        assert_eq!((hits, misses), (1, 1));

        tracker.invalidate();
        assert!(tracker.cache().is_empty());
        assert!(tracker.active_path().is_none());
    }
}
