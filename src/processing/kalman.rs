use crate::core::{EstimatorKind, PositionEstimate, MIN_ACCURACY_M};
use crate::utils::KalmanConfig;
use log::debug;
use nalgebra::Matrix2;

/// One-axis constant-velocity track
///
/// The covariance is over `[position, velocity]`; only the position entry
/// drives the gain, velocity is re-derived from the corrected position.
#[derive(Debug, Clone, PartialEq)]
pub struct KalmanState {
    pub position: f64,
    pub velocity: f64,
    pub error_covariance: Matrix2<f64>,
    pub initialized: bool,
}

impl Default for KalmanState {
    fn default() -> Self {
        Self {
            position: 0.0,
            velocity: 0.0,
            error_covariance: Matrix2::identity(),
            initialized: false,
        }
    }
}

impl KalmanState {
    /// Start a track at `measurement` with zero velocity
    pub fn initialize(&mut self, measurement: f64, measurement_variance: f64, velocity_variance: f64) {
        self.position = measurement;
        self.velocity = 0.0;
        self.error_covariance = Matrix2::new(measurement_variance, 0.0, 0.0, velocity_variance);
        self.initialized = true;
    }

    /// Position after `dt` seconds under constant velocity
    pub fn predicted(&self, dt: f64) -> f64 {
        self.position + self.velocity * dt
    }

    /// Fold in one measurement; `dt` must already be clamped
    pub fn update(&mut self, measurement: f64, measurement_variance: f64, dt: f64, process_noise: f64) -> f64 {
        let f = Matrix2::new(1.0, dt, 0.0, 1.0);
        let predicted_position = self.predicted(dt);
        let predicted_covariance = f * self.error_covariance * f.transpose();

        let p = predicted_covariance[(0, 0)];
        let gain = p / (p + measurement_variance);

        let previous = self.position;
        self.position = predicted_position + gain * (measurement - predicted_position);
        self.velocity = (self.position - previous) / dt;
        self.error_covariance =
            predicted_covariance * (1.0 - gain) + Matrix2::identity() * process_noise;

        self.position
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// Two independent axis filters sharing a clock
#[derive(Debug, Clone)]
pub struct PositionKalmanFilter {
    pub x: KalmanState,
    pub y: KalmanState,
    floor: Option<i32>,
    last_timestamp_ms: Option<i64>,
    config: KalmanConfig,
}

impl Default for PositionKalmanFilter {
    fn default() -> Self {
        Self::new(KalmanConfig::default())
    }
}

impl PositionKalmanFilter {
    pub fn new(config: KalmanConfig) -> Self {
        Self {
            x: KalmanState::default(),
            y: KalmanState::default(),
            floor: None,
            last_timestamp_ms: None,
            config,
        }
    }

    pub fn is_tracking(&self) -> bool {
        self.x.initialized && self.y.initialized
    }

    /// Drop both tracks; the next update starts fresh
    pub fn reset(&mut self) {
        self.x.reset();
        self.y.reset();
        self.floor = None;
        self.last_timestamp_ms = None;
    }

    fn elapsed_s(&self, timestamp_ms: i64) -> f64 {
        let elapsed_ms = self
            .last_timestamp_ms
            .map_or(0, |last| timestamp_ms.saturating_sub(last));
        (elapsed_ms as f64 / 1000.0).max(self.config.min_dt_s)
    }

    fn is_stale(&self, timestamp_ms: i64) -> bool {
        self.last_timestamp_ms
            .is_some_and(|last| timestamp_ms.saturating_sub(last) > self.config.max_gap_ms)
    }

    /// Smooth `estimate` and return the filtered result.
    ///
    /// A gap longer than the staleness threshold or a floor change restarts
    /// the track at the measurement.
    pub fn update(&mut self, estimate: &PositionEstimate) -> PositionEstimate {
        let variance = estimate.accuracy_m.max(MIN_ACCURACY_M).powi(2);
        let ts = estimate.timestamp_ms;

        if self.is_tracking() && self.is_stale(ts) {
            debug!("[Kalman] input gap exceeds {} ms, restarting track", self.config.max_gap_ms);
            self.reset();
        }
        if self.is_tracking() && self.floor != Some(estimate.floor) {
            debug!("[Kalman] floor changed to {}, restarting track", estimate.floor);
            self.reset();
        }

        if !self.is_tracking() {
            let v = self.config.initial_velocity_variance;
            self.x.initialize(estimate.x, variance, v);
            self.y.initialize(estimate.y, variance, v);
        } else {
            let dt = self.elapsed_s(ts);
            let q = self.config.process_noise;
            self.x.update(estimate.x, variance, dt, q);
            self.y.update(estimate.y, variance, dt, q);
        }
        self.floor = Some(estimate.floor);
        self.last_timestamp_ms = Some(self.last_timestamp_ms.map_or(ts, |last| last.max(ts)));

        PositionEstimate {
            x: self.x.position,
            y: self.y.position,
            floor: estimate.floor,
            accuracy_m: self.position_uncertainty(),
            algorithm: EstimatorKind::Kalman,
            timestamp_ms: ts,
        }
    }

    /// Constant-velocity extrapolation to `timestamp_ms`, `None` until tracking
    pub fn predict(&self, timestamp_ms: i64) -> Option<PositionEstimate> {
        if !self.is_tracking() || self.is_stale(timestamp_ms) {
            return None;
        }
        let dt = self.elapsed_s(timestamp_ms);
        Some(PositionEstimate {
            x: self.x.predicted(dt),
            y: self.y.predicted(dt),
            floor: self.floor?,
            accuracy_m: self.position_uncertainty(),
            algorithm: EstimatorKind::Kalman,
            timestamp_ms,
        })
    }

    /// Velocity estimate (m/s) per axis
    pub fn velocity(&self) -> (f64, f64) {
        (self.x.velocity, self.y.velocity)
    }

    /// RMS of the two position standard deviations, at least 0.5 m
    pub fn position_uncertainty(&self) -> f64 {
        let p = (self.x.error_covariance[(0, 0)] + self.y.error_covariance[(0, 0)]) / 2.0;
        p.max(0.0).sqrt().max(MIN_ACCURACY_M)
    }
}
