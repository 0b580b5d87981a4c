//! Multi-floor routing: waypoint graph, A* search, path cache and rerouting

pub mod astar;
pub mod cache;
pub mod graph;
pub mod tracker;

pub use astar::{PathResult, PathfindingEngine, RouteMetrics, Waypoint};
pub use cache::PathCache;
pub use graph::{EdgeDefinition, GraphDefinition, NavConnection, NavNode, NavigationGraph, NodeDefinition};
pub use tracker::{RerouteReason, RouteTracker, RouteUpdate};
