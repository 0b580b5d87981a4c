//! Core data types for positioning and navigation

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Planar position on a building floor
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
    pub floor: i32,
}

impl Position {
    pub fn new(x: f64, y: f64, floor: i32) -> Self {
        Self { x, y, floor }
    }

    /// Planar distance, `None` when the positions are on different floors
    pub fn distance_to(&self, other: &Position) -> Option<f64> {
        if self.floor != other.floor {
            return None;
        }
        Some(self.planar_distance(other))
    }

    /// Planar distance ignoring floors
    pub fn planar_distance(&self, other: &Position) -> f64 {
        (self.x - other.x).hypot(self.y - other.y)
    }

    pub fn same_floor(&self, other: &Position) -> bool {
        self.floor == other.floor
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

/// One received-signal sample from a beacon or access point
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalReading {
    pub source_id: String,
    pub rssi: i32,
    /// Calibrated RSSI at one meter (dBm)
    pub reference_power_at_1m: i32,
}

impl SignalReading {
    pub fn new(source_id: impl Into<String>, rssi: i32, reference_power_at_1m: i32) -> Self {
        Self {
            source_id: source_id.into(),
            rssi,
            reference_power_at_1m,
        }
    }
}

/// Known anchor locations keyed by source id
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AnchorRegistry {
    anchors: HashMap<String, Position>,
}

impl AnchorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, source_id: impl Into<String>, position: Position) -> Option<Position> {
        self.anchors.insert(source_id.into(), position)
    }

    pub fn get(&self, source_id: &str) -> Option<&Position> {
        self.anchors.get(source_id)
    }

    pub fn len(&self) -> usize {
        self.anchors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.anchors.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Position)> {
        self.anchors.iter()
    }
}

impl FromIterator<(String, Position)> for AnchorRegistry {
    fn from_iter<I: IntoIterator<Item = (String, Position)>>(iter: I) -> Self {
        Self {
            anchors: iter.into_iter().collect(),
        }
    }
}

/// An anchor paired with its estimated range, the input to every estimator
#[derive(Debug, Clone, PartialEq)]
pub struct AnchorMeasurement {
    pub source_id: String,
    pub position: Position,
    pub distance_m: f64,
    /// Relative confidence in this range; 1.0 when nothing better is known
    pub weight_hint: f64,
}

impl AnchorMeasurement {
    pub fn new(source_id: impl Into<String>, position: Position, distance_m: f64) -> Self {
        Self {
            source_id: source_id.into(),
            position,
            distance_m,
            weight_hint: 1.0,
        }
    }

    pub fn with_weight_hint(mut self, weight_hint: f64) -> Self {
        self.weight_hint = weight_hint;
        self
    }
}

/// Position estimation method
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EstimatorKind {
    Trilateration,
    WeightedCentroid,
    Fingerprint,
    Kalman,
    Fusion,
}

impl EstimatorKind {
    pub fn name(&self) -> &'static str {
        match self {
            EstimatorKind::Trilateration => "trilateration",
            EstimatorKind::WeightedCentroid => "weighted-centroid",
            EstimatorKind::Fingerprint => "fingerprint",
            EstimatorKind::Kalman => "kalman",
            EstimatorKind::Fusion => "fusion",
        }
    }
}

impl fmt::Display for EstimatorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Output of an estimator or of the fusion combiner
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PositionEstimate {
    pub x: f64,
    pub y: f64,
    pub floor: i32,
    pub accuracy_m: f64,
    pub algorithm: EstimatorKind,
    pub timestamp_ms: i64,
}

impl PositionEstimate {
    pub fn position(&self) -> Position {
        Position::new(self.x, self.y, self.floor)
    }
}

/// Kind of vertical connector between floors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransitionType {
    Stairs,
    Escalator,
    Elevator,
}

impl fmt::Display for TransitionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransitionType::Stairs => f.write_str("stairs"),
            TransitionType::Escalator => f.write_str("escalator"),
            TransitionType::Elevator => f.write_str("elevator"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_distance_gated_by_floor() {
        let a = Position::new(0.0, 0.0, 0);
        let b = Position::new(3.0, 4.0, 0);
        let c = Position::new(3.0, 4.0, 1);

        assert_eq!(a.distance_to(&b), Some(5.0));
        assert_eq!(a.distance_to(&c), None);
        assert_eq!(a.planar_distance(&c), 5.0);
    }

    #[test]
    fn test_registry_deserializes_as_map() {
        let json = r#"{"b1": {"x": 1.0, "y": 2.0, "floor": 0}}"#;
        let registry: AnchorRegistry = serde_json::from_str(json).unwrap();

        assert_eq!(registry.len(), 1);
        assert_eq!(registry.get("b1"), Some(&Position::new(1.0, 2.0, 0)));
        assert!(registry.get("b2").is_none());
    }
}
