// Planar geometry helpers shared by odometry and navigation

use std::f64::consts::{PI, TAU};

/// Wrap an angle into (-PI, PI]
pub fn normalize_angle(theta: f64) -> f64 {
    if !theta.is_finite() {
        return theta;
    }
    let wrapped = theta.rem_euclid(TAU); // [0, 2PI)
    if wrapped > PI {
        wrapped - TAU
    } else {
        wrapped
    }
}

/// Euclidean distance between two points
pub fn distance(x1: f64, y1: f64, x2: f64, y2: f64) -> f64 {
    (x2 - x1).hypot(y2 - y1)
}

/// Bearing from (x1, y1) to (x2, y2), or `None` when the points coincide
pub fn bearing(x1: f64, y1: f64, x2: f64, y2: f64) -> Option<f64> {
    let dx = x2 - x1;
    let dy = y2 - y1;
    if dx == 0.0 && dy == 0.0 {
        None
    } else {
        Some(dy.atan2(dx))
    }
}

/// Signed shortest rotation from `from` to `to`
pub fn angle_error(to: f64, from: f64) -> f64 {
    normalize_angle(to - from)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_normalize_keeps_half_open_interval() {
        assert_relative_eq!(normalize_angle(PI), PI);
        assert_relative_eq!(normalize_angle(-PI), PI);
        assert_relative_eq!(normalize_angle(PI + 0.5), -PI + 0.5, epsilon = 1e-12);
        assert_relative_eq!(normalize_angle(0.5), 0.5);
        assert_relative_eq!(normalize_angle(-0.5), -0.5, epsilon = 1e-12);
        assert_relative_eq!(normalize_angle(TAU + 0.25), 0.25, epsilon = 1e-12);
    }

    #[test]
    fn test_angle_error_takes_short_way_round() {
        // 170deg -> -170deg is +20deg, not -340deg
        let err = angle_error((-170.0f64).to_radians(), 170.0f64.to_radians());
        assert_relative_eq!(err, 20.0f64.to_radians(), epsilon = 1e-12);
    }

    #[test]
    fn test_bearing_undefined_for_same_point() {
        assert!(bearing(1.0, 2.0, 1.0, 2.0).is_none());
        assert_relative_eq!(bearing(0.0, 0.0, 0.0, 3.0).unwrap(), PI / 2.0);
        assert_relative_eq!(distance(0.0, 0.0, 3.0, 4.0), 5.0);
    }
}
