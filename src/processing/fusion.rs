//! Sensor fusion across the position estimators

use crate::algorithms::{trilaterate, weighted_centroid, FingerprintDatabase, SignalModel};
use crate::core::{AnchorMeasurement, EstimatorKind, PositionEstimate, SignalReading, MIN_ACCURACY_M};
use crate::processing::kalman::PositionKalmanFilter;
use crate::utils::{EngineConfig, PositioningConfig};
use crate::validation::{ConfigError, ValidatedReadings};
use log::{debug, trace};

/// Share of the blend held by trilateration and the Kalman prediction when
/// centroid or fingerprint estimates are also present
const PRIMARY_SHARE: f64 = 0.95;

/// Run a single estimator over prepared inputs.
///
/// `Kalman` and `Fusion` need session state and are handled by
/// [`SensorFusion`]; here they return `None`.
pub fn run_estimator(
    kind: EstimatorKind,
    measurements: &[AnchorMeasurement],
    readings: &[SignalReading],
    fingerprints: Option<&FingerprintDatabase>,
    fingerprint_k: usize,
    timestamp_ms: i64,
) -> Option<PositionEstimate> {
    match kind {
        EstimatorKind::Trilateration => trilaterate(measurements, timestamp_ms),
        EstimatorKind::WeightedCentroid => weighted_centroid(measurements, timestamp_ms),
        EstimatorKind::Fingerprint => {
            fingerprints?.match_readings(readings, fingerprint_k, timestamp_ms)
        }
        EstimatorKind::Kalman | EstimatorKind::Fusion => None,
    }
}

/// Measurements on the nearest anchor's floor, keeping their order
pub fn nearest_floor_measurements(measurements: &[AnchorMeasurement]) -> Vec<AnchorMeasurement> {
    let Some(floor) = measurements
        .iter()
        .min_by(|a, b| a.distance_m.total_cmp(&b.distance_m))
        .map(|m| m.position.floor)
    else {
        return Vec::new();
    };
    measurements
        .iter()
        .filter(|m| m.position.floor == floor)
        .cloned()
        .collect()
}

/// Trilateration when three anchors are available, centroid otherwise
fn best_geometric(measurements: &[AnchorMeasurement], timestamp_ms: i64) -> Option<PositionEstimate> {
    if measurements.len() >= 3 {
        trilaterate(measurements, timestamp_ms)
    } else {
        weighted_centroid(measurements, timestamp_ms)
    }
}

/// Inverse-accuracy weight
fn confidence(estimate: &PositionEstimate) -> f64 {
    1.0 / estimate.accuracy_m.max(MIN_ACCURACY_M)
}

/// Estimates competing in one fusion cycle.
///
/// Primary estimates are trilateration and the Kalman prediction. Each class
/// is weighted by inverse accuracy within itself; across classes the primary
/// one holds [`PRIMARY_SHARE`] of the blend.
#[derive(Debug, Default)]
struct Candidates {
    primary: Vec<PositionEstimate>,
    secondary: Vec<PositionEstimate>,
}

impl Candidates {
    fn is_empty(&self) -> bool {
        self.primary.is_empty() && self.secondary.is_empty()
    }

    /// Floor of the most confident measured estimate, trilateration first.
    ///
    /// The Kalman prediction is added after this and only counts when it is
    /// on the chosen floor.
    fn floor(&self, measured_primary: usize) -> Option<i32> {
        let most_confident = |estimates: &[PositionEstimate]| {
            estimates
                .iter()
                .max_by(|a, b| confidence(a).total_cmp(&confidence(b)))
                .map(|e| e.floor)
        };
        most_confident(&self.primary[..measured_primary]).or_else(|| most_confident(&self.secondary))
    }

    fn blend(&self, floor: i32, timestamp_ms: i64) -> Option<PositionEstimate> {
        let class = |estimates: &[PositionEstimate]| -> Vec<(PositionEstimate, f64)> {
            let on_floor: Vec<&PositionEstimate> = estimates.iter().filter(|e| e.floor == floor).collect();
            let total: f64 = on_floor.iter().map(|e| confidence(e)).sum();
            if total <= 0.0 || !total.is_finite() {
                return Vec::new();
            }
            on_floor.into_iter().map(|e| (*e, confidence(e) / total)).collect()
        };
        let primary = class(&self.primary);
        let secondary = class(&self.secondary);

        let (primary_share, secondary_share) = match (primary.is_empty(), secondary.is_empty()) {
            (true, true) => return None,
            (false, false) => (PRIMARY_SHARE, 1.0 - PRIMARY_SHARE),
            _ => (1.0, 1.0),
        };

        let (mut x, mut y, mut accuracy) = (0.0, 0.0, 0.0);
        let weighted = primary
            .iter()
            .map(|(e, share)| (e, share * primary_share))
            .chain(secondary.iter().map(|(e, share)| (e, share * secondary_share)));
        for (estimate, share) in weighted {
            x += estimate.x * share;
            y += estimate.y * share;
            accuracy += estimate.accuracy_m * share;
        }

        Some(PositionEstimate {
            x,
            y,
            floor,
            accuracy_m: accuracy.max(MIN_ACCURACY_M),
            algorithm: EstimatorKind::Fusion,
            timestamp_ms,
        })
    }
}

/// Positioning session state: the selected method, the per-axis Kalman
/// filters and the last emitted position.
///
/// Owned by one worker; every call takes `&mut self`.
#[derive(Debug, Clone)]
pub struct SensorFusion {
    model: SignalModel,
    config: PositioningConfig,
    max_gap_ms: i64,
    kalman: PositionKalmanFilter,
    method: EstimatorKind,
    last_output: Option<PositionEstimate>,
}

impl SensorFusion {
    /// Build from a configuration, rejecting an invalid path-loss exponent
    pub fn new(config: &EngineConfig) -> Result<Self, ConfigError> {
        let model = SignalModel::new(config.positioning.path_loss_exponent)?;
        Ok(Self {
            model,
            config: config.positioning.clone(),
            max_gap_ms: config.kalman.max_gap_ms,
            kalman: PositionKalmanFilter::new(config.kalman.clone()),
            method: config.positioning.estimator,
            last_output: None,
        })
    }

    pub fn signal_model(&self) -> &SignalModel {
        &self.model
    }

    pub fn method(&self) -> EstimatorKind {
        self.method
    }

    pub fn kalman(&self) -> &PositionKalmanFilter {
        &self.kalman
    }

    /// Replace the path-loss exponent used for distance conversion
    pub fn set_path_loss_exponent(&mut self, exponent: f64) -> Result<(), ConfigError> {
        self.model = SignalModel::new(exponent)?;
        self.config.path_loss_exponent = exponent;
        Ok(())
    }

    /// Takes effect on the next smoothed output
    pub fn set_smoothing_factor(&mut self, factor: f64) {
        self.config.smoothing_factor = factor;
    }

    pub fn smoothing_factor(&self) -> f64 {
        self.config.smoothing_factor
    }

    /// Switch estimator; a change restarts temporal smoothing
    pub fn set_method(&mut self, method: EstimatorKind) {
        if method != self.method {
            debug!("[Fusion] estimator {} -> {}, resetting filters", self.method, method);
            self.method = method;
            self.reset();
        }
    }

    pub fn reset(&mut self) {
        self.kalman.reset();
        self.last_output = None;
    }

    /// One estimation cycle with the selected method
    pub fn estimate(
        &mut self,
        validated: &ValidatedReadings,
        fingerprints: Option<&FingerprintDatabase>,
        timestamp_ms: i64,
    ) -> Option<PositionEstimate> {
        let measurements = nearest_floor_measurements(&validated.measurements);

        let result = match self.method {
            EstimatorKind::Fusion => self.fuse(&measurements, &validated.readings, fingerprints, timestamp_ms),
            EstimatorKind::Kalman => {
                let raw = best_geometric(&measurements, timestamp_ms)?;
                Some(self.smooth(raw, EstimatorKind::Kalman))
            }
            kind => run_estimator(
                kind,
                &measurements,
                &validated.readings,
                fingerprints,
                self.config.fingerprint_k,
                timestamp_ms,
            ),
        };

        if let Some(estimate) = &result {
            trace!(
                "[Fusion] {} -> ({:.2}, {:.2}) floor {} ±{:.2} m",
                estimate.algorithm,
                estimate.x,
                estimate.y,
                estimate.floor,
                estimate.accuracy_m
            );
        }
        result
    }

    fn fuse(
        &mut self,
        measurements: &[AnchorMeasurement],
        readings: &[SignalReading],
        fingerprints: Option<&FingerprintDatabase>,
        timestamp_ms: i64,
    ) -> Option<PositionEstimate> {
        let mut candidates = Candidates::default();

        if measurements.len() >= 3 {
            // a degenerate solve comes back as a centroid, which is added below anyway
            if let Some(e) = trilaterate(measurements, timestamp_ms)
                .filter(|e| e.algorithm == EstimatorKind::Trilateration)
            {
                candidates.primary.push(e);
            }
        }
        candidates
            .secondary
            .extend(weighted_centroid(measurements, timestamp_ms));
        candidates.secondary.extend(
            fingerprints.and_then(|db| db.match_readings(readings, self.config.fingerprint_k, timestamp_ms)),
        );
        if candidates.is_empty() {
            return None;
        }

        let measured_primary = candidates.primary.len();
        let floor = candidates.floor(measured_primary)?;
        candidates.primary.extend(self.kalman.predict(timestamp_ms));

        let fused = candidates.blend(floor, timestamp_ms)?;
        Some(self.smooth(fused, EstimatorKind::Fusion))
    }

    /// Kalman-smooth, then blend against the previous output
    fn smooth(&mut self, raw: PositionEstimate, algorithm: EstimatorKind) -> PositionEstimate {
        let filtered = self.kalman.update(&raw);
        let alpha = self.config.smoothing_factor;

        let (x, y) = match self.last_output {
            Some(prev)
                if alpha < 1.0
                    && prev.floor == filtered.floor
                    && filtered.timestamp_ms.saturating_sub(prev.timestamp_ms) <= self.max_gap_ms =>
            {
                (
                    prev.x + alpha * (filtered.x - prev.x),
                    prev.y + alpha * (filtered.y - prev.y),
                )
            }
            _ => (filtered.x, filtered.y),
        };

        let output = PositionEstimate {
            x,
            y,
            algorithm,
            ..filtered
        };
        self.last_output = Some(output);
        output
    }
}
