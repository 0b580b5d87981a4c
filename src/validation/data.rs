//! Reading sanitation ahead of estimation

use crate::algorithms::{clamp_rssi, SignalModel};
use crate::core::{AnchorMeasurement, AnchorRegistry, SignalReading};
use log::trace;
use std::collections::HashMap;

/// Readings kept after validation, plus what was discarded
#[derive(Debug, Clone, Default)]
pub struct ValidatedReadings {
    /// Clamped, de-duplicated readings with a known anchor
    pub readings: Vec<SignalReading>,
    /// Anchors with estimated ranges, nearest first
    pub measurements: Vec<AnchorMeasurement>,
    /// Source ids missing from the anchor registry
    pub unknown_sources: Vec<String>,
}

impl ValidatedReadings {
    pub fn anchor_count(&self) -> usize {
        self.measurements.len()
    }
}

/// Clamp RSSI, drop unregistered sources, keep the strongest duplicate per
/// source, and convert to range measurements ordered nearest first.
///
/// Unknown sources still count for fingerprinting, so `readings` keeps them
/// while `measurements` does not.
pub fn validate_readings(
    readings: &[SignalReading],
    anchors: &AnchorRegistry,
    model: &SignalModel,
) -> ValidatedReadings {
    let mut strongest: HashMap<&str, SignalReading> = HashMap::new();
    for reading in readings {
        let clamped = SignalReading {
            rssi: clamp_rssi(reading.rssi),
            ..reading.clone()
        };
        let stronger = strongest
            .get(reading.source_id.as_str())
            .map_or(true, |existing| existing.rssi < clamped.rssi);
        if stronger {
            strongest.insert(reading.source_id.as_str(), clamped);
        }
    }

    let mut kept: Vec<SignalReading> = strongest.into_values().collect();
    kept.sort_by(|a, b| a.source_id.cmp(&b.source_id));

    let mut unknown_sources = Vec::new();
    let mut measurements = Vec::new();
    for reading in &kept {
        match anchors.get(&reading.source_id) {
            Some(position) if position.is_finite() => {
                measurements.push(AnchorMeasurement::new(
                    reading.source_id.clone(),
                    *position,
                    model.reading_distance(reading),
                ));
            }
            _ => unknown_sources.push(reading.source_id.clone()),
        }
    }
    measurements.sort_by(|a, b| a.distance_m.total_cmp(&b.distance_m));

    if !unknown_sources.is_empty() {
        trace!("[Readings] no anchor for {:?}", unknown_sources);
    }

    ValidatedReadings {
        readings: kept,
        measurements,
        unknown_sources,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Position;

    fn registry() -> AnchorRegistry {
        let mut anchors = AnchorRegistry::new();
        anchors.insert("a", Position::new(0.0, 0.0, 0));
        anchors.insert("b", Position::new(10.0, 0.0, 0));
        anchors.insert("c", Position::new(5.0, 8.0, 0));
        anchors
    }

    #[test]
    fn test_orders_nearest_first() {
        let readings = vec![
            SignalReading::new("a", -80, -59),
            SignalReading::new("b", -60, -59),
            SignalReading::new("c", -70, -59),
        ];
        let validated = validate_readings(&readings, &registry(), &SignalModel::default());
        let order: Vec<&str> = validated.measurements.iter().map(|m| m.source_id.as_str()).collect();

        assert_eq!(order, vec!["b", "c", "a"]);
    }

    #[test]
    fn test_duplicates_keep_strongest() {
        let readings = vec![SignalReading::new("a", -80, -59), SignalReading::new("a", -65, -59)];
        let validated = validate_readings(&readings, &registry(), &SignalModel::default());

        assert_eq!(validated.readings.len(), 1);
        assert_eq!(validated.readings[0].rssi, -65);
    }

    #[test]
    fn test_unknown_sources_kept_for_fingerprinting_only() {
        let readings = vec![SignalReading::new("ap-9", -70, -40), SignalReading::new("a", -130, -59)];
        let validated = validate_readings(&readings, &registry(), &SignalModel::default());

        assert_eq!(validated.unknown_sources, vec!["ap-9".to_string()]);
        assert_eq!(validated.anchor_count(), 1);
        assert_eq!(validated.readings.len(), 2);
        // clamped to the sensor floor
        assert!(validated.readings.iter().any(|r| r.source_id == "a" && r.rssi == -100));
    }
}
