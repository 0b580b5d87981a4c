//! Positioning and routing session
//!
//! One session serves one user: it owns the RSSI filter, the fusion state,
//! the route tracker and the routing engine. Cycles are driven by the caller.

use crate::algorithms::FingerprintDatabase;
use crate::core::{AnchorRegistry, EstimatorKind, PositionEstimate, SignalReading, TransitionType};
use crate::navigation::{NavigationGraph, PathResult, PathfindingEngine, RouteTracker, RouteUpdate};
use crate::processing::{RssiFilter, SensorFusion};
use crate::utils::{ConfigurationManager, EngineConfig};
use crate::validation::{validate_readings, ConfigError, GraphError, Result};
use log::{debug, info};
use serde::Serialize;
use std::path::Path;

/// Output of one cycle
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CycleOutput {
    pub estimate: Option<PositionEstimate>,
    /// Present when a destination is set and a position was produced
    pub route: Option<RouteUpdate>,
}

/// Running counters for a session
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct SessionState {
    /// Cycles run
    pub cycles: u64,
    /// Cycles that produced a position
    pub positions_emitted: u64,
    /// Cycles where no estimator could run
    pub empty_cycles: u64,
    /// Routes planned, including the first one
    pub reroutes: u64,
    /// Timestamp of the last emitted position
    pub last_position_time: Option<i64>,
}

pub struct NavigationSession {
    config: ConfigurationManager,
    anchors: AnchorRegistry,
    fingerprints: Option<FingerprintDatabase>,
    rssi_filter: RssiFilter,
    fusion: SensorFusion,
    engine: PathfindingEngine,
    tracker: RouteTracker,
    last_estimate: Option<PositionEstimate>,
    state: SessionState,
}

impl NavigationSession {
    /// Build a session, failing on invalid configuration or an empty graph
    pub fn new(
        config: EngineConfig,
        anchors: AnchorRegistry,
        fingerprints: Option<FingerprintDatabase>,
        graph: NavigationGraph,
    ) -> Result<Self> {
        let config = ConfigurationManager::with_config(config)?;
        let settings = config.config();

        let fusion = SensorFusion::new(settings)?;
        let rssi_filter = RssiFilter::new(settings.positioning.rssi_alpha, settings.kalman.max_gap_ms);
        let engine = PathfindingEngine::new(graph, settings.routing.clone())?;
        let tracker = RouteTracker::new(&settings.routing);

        info!(
            "[Session] {} anchors, {} fingerprints, {} graph nodes, estimator {}",
            anchors.len(),
            fingerprints.as_ref().map_or(0, |db| db.len()),
            engine.graph().len(),
            fusion.method()
        );

        Ok(Self {
            config,
            anchors,
            fingerprints,
            rssi_filter,
            fusion,
            engine,
            tracker,
            last_estimate: None,
            state: SessionState::default(),
        })
    }

    pub fn config(&self) -> &EngineConfig {
        self.config.config()
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn last_estimate(&self) -> Option<&PositionEstimate> {
        self.last_estimate.as_ref()
    }

    pub fn fusion(&self) -> &SensorFusion {
        &self.fusion
    }

    pub fn engine(&self) -> &PathfindingEngine {
        &self.engine
    }

    pub fn tracker(&self) -> &RouteTracker {
        &self.tracker
    }

    /// One positioning step and, with a destination set, one route update
    pub fn cycle(&mut self, readings: &[SignalReading], timestamp_ms: i64) -> CycleOutput {
        self.state.cycles += 1;

        let smoothed;
        let readings = if self.config.config().positioning.rssi_smoothing {
            smoothed = self.rssi_filter.apply(readings, timestamp_ms);
            self.rssi_filter.prune(timestamp_ms);
            smoothed.as_slice()
        } else {
            readings
        };

        let validated = validate_readings(readings, &self.anchors, self.fusion.signal_model());
        let estimate = self
            .fusion
            .estimate(&validated, self.fingerprints.as_ref(), timestamp_ms);

        let Some(estimate) = estimate else {
            self.state.empty_cycles += 1;
            debug!(
                "[Session] no position at {} ms ({} readings, {} anchors)",
                timestamp_ms,
                validated.readings.len(),
                validated.anchor_count()
            );
            return CycleOutput {
                estimate: None,
                route: None,
            };
        };

        self.state.positions_emitted += 1;
        self.state.last_position_time = Some(timestamp_ms);
        self.last_estimate = Some(estimate);

        let route = self.tracker.destination().is_some().then(|| {
            let update = self.tracker.update(&self.engine, &estimate.position());
            if matches!(update, RouteUpdate::Rerouted { .. }) {
                self.state.reroutes += 1;
            }
            update
        });

        CycleOutput {
            estimate: Some(estimate),
            route,
        }
    }

    /// Route toward a graph node from the next cycle on
    pub fn set_destination(&mut self, node_id: &str) -> std::result::Result<(), GraphError> {
        if self.engine.graph().node(node_id).is_none() {
            return Err(GraphError::UnknownNode(node_id.to_string()));
        }
        debug!("[Session] destination {}", node_id);
        self.tracker.set_destination(node_id);
        Ok(())
    }

    pub fn clear_destination(&mut self) {
        self.tracker.clear_destination();
    }

    /// Switch estimator; tracking restarts when it changes
    pub fn set_estimator(&mut self, method: EstimatorKind) {
        self.config.set_estimator(method);
        self.fusion.set_method(method);
    }

    /// Returns the previous exponent; ranges change from the next cycle on
    pub fn set_path_loss_exponent(&mut self, exponent: f64) -> std::result::Result<f64, ConfigError> {
        self.fusion.set_path_loss_exponent(exponent)?;
        self.config.set_path_loss_exponent(exponent)
    }

    /// Returns the previous smoothing factor
    pub fn set_smoothing_factor(&mut self, factor: f64) -> std::result::Result<f64, ConfigError> {
        let old = self.config.set_smoothing_factor(factor)?;
        self.fusion.set_smoothing_factor(factor);
        Ok(old)
    }

    /// Change routing preferences, dropping routes computed under the old ones
    pub fn set_route_preferences(
        &mut self,
        prefer_accessible_routes: bool,
        preferred_transition_type: Option<TransitionType>,
    ) {
        self.config
            .set_route_preferences(prefer_accessible_routes, preferred_transition_type);
        self.engine
            .set_preferences(prefer_accessible_routes, preferred_transition_type);
        self.tracker.invalidate();
    }

    /// Returns the previous threshold
    pub fn set_deviation_threshold(&mut self, threshold_m: f64) -> std::result::Result<f64, ConfigError> {
        let old = self.config.set_deviation_threshold(threshold_m)?;
        self.tracker.set_deviation_threshold(threshold_m);
        Ok(old)
    }

    /// Persist the configuration, including runtime changes
    pub fn save_config<P: AsRef<Path>>(&mut self, path: P) -> std::result::Result<(), ConfigError> {
        self.config.save_to_file(path)
    }

    /// One-off route between two nodes, bypassing the tracker
    pub fn find_path(&self, start_id: &str, end_id: &str) -> PathResult {
        self.engine.find_path(start_id, end_id)
    }

    /// Forget all temporal state; configuration and destination are kept
    pub fn reset(&mut self) {
        self.fusion.reset();
        self.rssi_filter.clear();
        self.tracker.invalidate();
        self.last_estimate = None;
    }
}
