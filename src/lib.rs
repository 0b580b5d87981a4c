//! Indoor Navigation Core
//!
//! Fuses noisy radio readings into a smoothed indoor position and routes
//! between positions across floors with A* over a waypoint graph.

pub mod core;
pub mod algorithms;
pub mod processing;
pub mod navigation;
pub mod validation;
pub mod utils;
pub mod api;

// Re-export commonly used types
pub use self::core::{AnchorRegistry, EstimatorKind, Position, PositionEstimate, SignalReading, TransitionType};
pub use algorithms::{FingerprintDatabase, FingerprintSample, SignalModel};
pub use processing::{PositionKalmanFilter, RssiFilter, SensorFusion};
pub use navigation::{
    GraphDefinition, NavConnection, NavNode, NavigationGraph, PathCache, PathResult, PathfindingEngine,
    RerouteReason, RouteMetrics, RouteTracker, RouteUpdate,
};
pub use validation::{ConfigError, GraphError, NavError};
pub use utils::{ConfigurationManager, EngineConfig};
pub use api::{CycleOutput, NavigationSession, Scenario};
