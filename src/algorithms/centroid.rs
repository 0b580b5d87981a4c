//! Weighted centroid estimator

use crate::core::{AnchorMeasurement, EstimatorKind, PositionEstimate, MIN_ACCURACY_M};

/// Ranges below this are treated as this when weighting
const MIN_WEIGHT_DISTANCE_M: f64 = 0.1;

/// Average of anchor positions weighted by `weight_hint / distance²`.
///
/// Works with a single anchor. Returns `None` for empty input or when every
/// weight is zero or non-finite. The floor is that of the nearest anchor and
/// the accuracy is the weighted mean range.
pub fn weighted_centroid(
    measurements: &[AnchorMeasurement],
    timestamp_ms: i64,
) -> Option<PositionEstimate> {
    let weighted: Vec<(&AnchorMeasurement, f64)> = measurements
        .iter()
        .filter(|m| m.position.is_finite())
        .map(|m| {
            let d = m.distance_m.max(MIN_WEIGHT_DISTANCE_M);
            (m, m.weight_hint / (d * d))
        })
        .filter(|(_, w)| w.is_finite() && *w > 0.0)
        .collect();

    let total_weight: f64 = weighted.iter().map(|(_, w)| w).sum();
    if total_weight <= 0.0 || !total_weight.is_finite() {
        return None;
    }

    // normalize first so a lone anchor comes back bit-exact
    let (mut x, mut y, mut range) = (0.0, 0.0, 0.0);
    for (m, w) in &weighted {
        let share = w / total_weight;
        x += m.position.x * share;
        y += m.position.y * share;
        range += m.distance_m * share;
    }

    let floor = nearest_floor(measurements)?;
    Some(PositionEstimate {
        x,
        y,
        floor,
        accuracy_m: range.max(MIN_ACCURACY_M),
        algorithm: EstimatorKind::WeightedCentroid,
        timestamp_ms,
    })
}

/// Floor of the anchor with the shortest range
pub(crate) fn nearest_floor(measurements: &[AnchorMeasurement]) -> Option<i32> {
    measurements
        .iter()
        .min_by(|a, b| a.distance_m.total_cmp(&b.distance_m))
        .map(|m| m.position.floor)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Position;
    use approx::assert_relative_eq;

    #[test]
    fn test_single_anchor_returns_anchor_position() {
        let anchors = vec![AnchorMeasurement::new("a", Position::new(3.5, -2.0, 2), 4.0)];
        let estimate = weighted_centroid(&anchors, 10).unwrap();

        assert_eq!(estimate.x, 3.5);
        assert_eq!(estimate.y, -2.0);
        assert_eq!(estimate.floor, 2);
        assert_eq!(estimate.timestamp_ms, 10);
        assert_eq!(estimate.algorithm, EstimatorKind::WeightedCentroid);
    }

    #[test]
    fn test_closer_anchor_pulls_harder() {
        let anchors = vec![
            AnchorMeasurement::new("a", Position::new(0.0, 0.0, 0), 1.0),
            AnchorMeasurement::new("b", Position::new(10.0, 0.0, 0), 3.0),
        ];
        let estimate = weighted_centroid(&anchors, 0).unwrap();

        // weights 1 and 1/9
        assert_relative_eq!(estimate.x, 10.0 * (1.0 / 9.0) / (1.0 + 1.0 / 9.0), epsilon = 1e-12);
        assert!(estimate.x < 5.0);
    }

    #[test]
    fn test_empty_and_zero_weight_input() {
        assert!(weighted_centroid(&[], 0).is_none());

        let anchors = vec![
            AnchorMeasurement::new("a", Position::new(0.0, 0.0, 0), 2.0).with_weight_hint(0.0),
        ];
        assert!(weighted_centroid(&anchors, 0).is_none());
    }
}
