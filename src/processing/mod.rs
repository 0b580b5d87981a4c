//! Temporal processing: RSSI smoothing, Kalman tracking and estimator fusion

pub mod fusion;
pub mod kalman;
pub mod noise;

pub use fusion::{nearest_floor_measurements, run_estimator, SensorFusion};
pub use kalman::{KalmanState, PositionKalmanFilter};
pub use noise::RssiFilter;
