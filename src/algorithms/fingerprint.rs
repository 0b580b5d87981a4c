//! Fingerprint matching against a surveyed RSSI database

use crate::core::{EstimatorKind, Position, PositionEstimate, SignalReading, MIN_ACCURACY_M};
use crate::algorithms::signal_model::clamp_rssi;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Meters of reported accuracy per dB of mean RSSI deviation
const METERS_PER_DB: f64 = 0.5;

/// One surveyed grid point
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FingerprintSample {
    pub position: Position,
    /// Expected RSSI per source id
    pub rssi: HashMap<String, i32>,
}

impl FingerprintSample {
    pub fn new(position: Position) -> Self {
        Self {
            position,
            rssi: HashMap::new(),
        }
    }

    pub fn with_source(mut self, source_id: impl Into<String>, rssi: i32) -> Self {
        self.rssi.insert(source_id.into(), rssi);
        self
    }

    /// Mean absolute deviation over the sources both sides share
    pub fn mean_deviation(&self, readings: &[SignalReading]) -> Option<f64> {
        let mut total = 0.0;
        let mut shared = 0usize;
        for reading in readings {
            if let Some(&expected) = self.rssi.get(&reading.source_id) {
                total += (clamp_rssi(reading.rssi) - clamp_rssi(expected)).abs() as f64;
                shared += 1;
            }
        }
        (shared > 0).then(|| total / shared as f64)
    }
}

/// Surveyed signal map for one building
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FingerprintDatabase {
    samples: Vec<FingerprintSample>,
}

impl FingerprintDatabase {
    pub fn new(samples: Vec<FingerprintSample>) -> Self {
        Self { samples }
    }

    pub fn push(&mut self, sample: FingerprintSample) {
        self.samples.push(sample);
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn samples(&self) -> &[FingerprintSample] {
        &self.samples
    }

    /// Match the reading set against the database.
    ///
    /// With `k == 1` the sample with the smallest mean absolute deviation wins,
    /// ties going to the first one in survey order. Larger `k` averages the
    /// best `k` samples on the winner's floor, weighted by `1 / (1 + dev)`.
    /// Samples sharing no source with the readings are ignored.
    pub fn match_readings(
        &self,
        readings: &[SignalReading],
        k: usize,
        timestamp_ms: i64,
    ) -> Option<PositionEstimate> {
        let mut scored: Vec<(f64, &FingerprintSample)> = self
            .samples
            .iter()
            .filter_map(|s| s.mean_deviation(readings).map(|dev| (dev, s)))
            .collect();
        // stable, so equal deviations keep survey order
        scored.sort_by(|a, b| a.0.total_cmp(&b.0));

        let &(best_dev, best) = scored.first()?;
        let floor = best.position.floor;

        let neighbours: Vec<(f64, f64, &FingerprintSample)> = scored
            .iter()
            .filter(|(_, s)| s.position.floor == floor)
            .take(k.max(1))
            .map(|&(d, s)| (d, 1.0 / (1.0 + d), s))
            .collect();
        let total: f64 = neighbours.iter().map(|(_, w, _)| w).sum();
        if total <= 0.0 {
            return None;
        }

        let (mut x, mut y, mut dev) = (0.0, 0.0, 0.0);
        for (d, w, sample) in &neighbours {
            let share = w / total;
            x += sample.position.x * share;
            y += sample.position.y * share;
            dev += d * share;
        }
        let deviation = if k <= 1 { best_dev } else { dev };

        Some(PositionEstimate {
            x,
            y,
            floor,
            accuracy_m: (deviation * METERS_PER_DB).max(MIN_ACCURACY_M),
            algorithm: EstimatorKind::Fingerprint,
            timestamp_ms,
        })
    }
}
