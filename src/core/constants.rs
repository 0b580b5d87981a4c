//! Physical limits and tuning defaults

/// Weakest RSSI accepted from a scanner (dBm)
pub const MIN_RSSI_DBM: i32 = -100;
/// Strongest RSSI accepted from a scanner (dBm)
pub const MAX_RSSI_DBM: i32 = 0;
/// Lower clamp for the path-loss exponent
pub const MIN_PATH_LOSS_EXPONENT: f64 = 0.1;
/// Free-space path-loss exponent
pub const DEFAULT_PATH_LOSS_EXPONENT: f64 = 2.0;

/// Tightest accuracy any estimator reports (meters)
pub const MIN_ACCURACY_M: f64 = 0.5;
/// Smallest time step fed to the Kalman filter (seconds)
pub const MIN_KALMAN_DT_S: f64 = 0.1;

/// Penalty added per floor of mismatch in closest-node lookups (meters)
pub const FLOOR_MISMATCH_PENALTY: f64 = 100.0;
/// Average indoor walking speed (m/s)
pub const WALKING_SPEED_MPS: f64 = 1.4;
/// Time budget for one floor change (seconds)
pub const FLOOR_CHANGE_TIME_S: f64 = 15.0;
