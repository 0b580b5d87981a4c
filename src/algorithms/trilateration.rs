//! Closed-form 2D trilateration with centroid fallback

use super::centroid::{nearest_floor, weighted_centroid};
use crate::core::{AnchorMeasurement, EstimatorKind, PositionEstimate, MIN_ACCURACY_M};
use log::debug;
use nalgebra::{Matrix2, Vector2};

/// Determinants below this are treated as parallel equations
const DETERMINANT_EPSILON: f64 = 1e-9;

/// Trilaterate from the first three measurements.
///
/// Subtracting circle equations pairwise (1-2 and 2-3) yields a 2x2 linear
/// system. When the system is singular or the solution is non-finite the
/// estimate falls back to the weighted centroid of all measurements, tagged
/// as a centroid result. Fewer than three measurements return `None`.
pub fn trilaterate(
    measurements: &[AnchorMeasurement],
    timestamp_ms: i64,
) -> Option<PositionEstimate> {
    if measurements.len() < 3 {
        return None;
    }

    let (p1, r1) = (measurements[0].position, measurements[0].distance_m);
    let (p2, r2) = (measurements[1].position, measurements[1].distance_m);
    let (p3, r3) = (measurements[2].position, measurements[2].distance_m);

    let a = Matrix2::new(
        2.0 * (p2.x - p1.x),
        2.0 * (p2.y - p1.y),
        2.0 * (p3.x - p2.x),
        2.0 * (p3.y - p2.y),
    );
    let b = Vector2::new(
        r1 * r1 - r2 * r2 - p1.x * p1.x + p2.x * p2.x - p1.y * p1.y + p2.y * p2.y,
        r2 * r2 - r3 * r3 - p2.x * p2.x + p3.x * p3.x - p2.y * p2.y + p3.y * p3.y,
    );

    let det = a.determinant();
    let solution = if det.abs() < DETERMINANT_EPSILON {
        None
    } else {
        a.try_inverse().map(|inv| inv * b)
    };

    match solution {
        Some(p) if p.x.is_finite() && p.y.is_finite() => {
            let mean_range =
                measurements.iter().map(|m| m.distance_m).sum::<f64>() / measurements.len() as f64;
            Some(PositionEstimate {
                x: p.x,
                y: p.y,
                floor: nearest_floor(measurements)?,
                accuracy_m: mean_range.max(MIN_ACCURACY_M),
                algorithm: EstimatorKind::Trilateration,
                timestamp_ms,
            })
        }
        _ => {
            debug!(
                "[Trilateration] degenerate geometry (det={:.3e}), using weighted centroid",
                det
            );
            weighted_centroid(measurements, timestamp_ms)
        }
    }
}
