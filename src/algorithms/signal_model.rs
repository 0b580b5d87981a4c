//! Log-distance path-loss model for converting RSSI to range

use crate::core::{
    SignalReading, DEFAULT_PATH_LOSS_EXPONENT, MAX_RSSI_DBM, MIN_PATH_LOSS_EXPONENT, MIN_RSSI_DBM,
};
use crate::validation::ConfigError;

/// Clamp a raw RSSI into the plausible sensor range
pub fn clamp_rssi(rssi: i32) -> i32 {
    rssi.clamp(MIN_RSSI_DBM, MAX_RSSI_DBM)
}

/// Estimated distance in meters: `10^((reference_power - rssi) / (10 * n))`
///
/// RSSI is clamped to [-100, 0] dBm and `n` to at least 0.1, so the result is
/// always finite and non-negative. A NaN exponent is treated as the minimum.
pub fn distance(rssi: i32, reference_power: i32, path_loss_exponent: f64) -> f64 {
    let n = if path_loss_exponent.is_nan() {
        MIN_PATH_LOSS_EXPONENT
    } else {
        path_loss_exponent.max(MIN_PATH_LOSS_EXPONENT)
    };
    let rssi = clamp_rssi(rssi);
    let reference_power = clamp_rssi(reference_power);

    let exponent = (reference_power - rssi) as f64 / (10.0 * n);
    let meters = 10f64.powf(exponent);
    if meters.is_finite() {
        meters
    } else {
        f64::MAX
    }
}

/// Path-loss model with a validated exponent
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SignalModel {
    path_loss_exponent: f64,
}

impl Default for SignalModel {
    fn default() -> Self {
        Self {
            path_loss_exponent: DEFAULT_PATH_LOSS_EXPONENT,
        }
    }
}

impl SignalModel {
    /// Rejects NaN, infinite and non-positive exponents
    pub fn new(path_loss_exponent: f64) -> Result<Self, ConfigError> {
        if !path_loss_exponent.is_finite() || path_loss_exponent <= 0.0 {
            return Err(ConfigError::invalid(
                "path_loss_exponent",
                path_loss_exponent,
                "path-loss exponent must be a positive finite number",
            ));
        }
        Ok(Self {
            path_loss_exponent: path_loss_exponent.max(MIN_PATH_LOSS_EXPONENT),
        })
    }

    pub fn path_loss_exponent(&self) -> f64 {
        self.path_loss_exponent
    }

    pub fn distance(&self, rssi: i32, reference_power: i32) -> f64 {
        distance(rssi, reference_power, self.path_loss_exponent)
    }

    pub fn reading_distance(&self, reading: &SignalReading) -> f64 {
        self.distance(reading.rssi, reading.reference_power_at_1m)
    }
}
