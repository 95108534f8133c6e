//! Great-circle distance on a spherical Earth.

/// Mean Earth radius in kilometres.
pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// Haversine distance in kilometres between two lat/lon points given in degrees.
///
/// Coordinates are not range-checked. Out-of-range values still yield a number,
/// and NaN inputs yield NaN, but the function never panics. The haversine term
/// is clamped to `[0, 1]` before the square root, so rounding overshoot near
/// antipodal points or undershoot for out-of-range latitudes cannot leave the
/// domain of `sqrt` or `asin`.
pub fn haversine_km(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let lat1_rad = lat1.to_radians();
    let lat2_rad = lat2.to_radians();
    let delta_lat = (lat2 - lat1).to_radians();
    let delta_lon = (lon2 - lon1).to_radians();

    let a = (delta_lat / 2.0).sin().powi(2)
        + lat1_rad.cos() * lat2_rad.cos() * (delta_lon / 2.0).sin().powi(2);
    // f64::clamp propagates NaN
    let c = 2.0 * a.clamp(0.0, 1.0).sqrt().asin();

    EARTH_RADIUS_KM * c
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::f64::consts::PI;

    #[test]
    fn identical_points_are_zero() {
        for &(lat, lon) in &[(0.0, 0.0), (20.5, 120.0), (-89.9, -179.9), (45.0, 180.0)] {
            assert_eq!(haversine_km(lat, lon, lat, lon), 0.0);
        }
    }

    #[test]
    fn one_degree_along_equator() {
        let d = haversine_km(0.0, 0.0, 0.0, 1.0);
        assert_relative_eq!(d, EARTH_RADIUS_KM * PI / 180.0, epsilon = 1e-9);
    }

    #[test]
    fn antipodal_points_are_half_circumference() {
        let d = haversine_km(0.0, 0.0, 0.0, 180.0);
        assert!(d.is_finite());
        assert_relative_eq!(d, EARTH_RADIUS_KM * PI, epsilon = 1e-6);

        let pole_to_pole = haversine_km(90.0, 0.0, -90.0, 0.0);
        assert_relative_eq!(pole_to_pole, EARTH_RADIUS_KM * PI, epsilon = 1e-6);
    }

    #[test]
    fn symmetric() {
        let pairs = [
            (20.5, 120.0, 22.1, 118.3),
            (-33.9, 151.2, 51.5, -0.1),
            (0.0, -179.5, 0.0, 179.5),
        ];
        for &(a, b, c, d) in &pairs {
            assert_eq!(haversine_km(a, b, c, d), haversine_km(c, d, a, b));
        }
    }

    #[test]
    fn out_of_range_latitudes_stay_finite() {
        let max = EARTH_RADIUS_KM * PI + 1e-6;
        for lat1 in (-540..=540).step_by(15) {
            for lat2 in (-540..=540).step_by(15) {
                for dlon in (0..=360).step_by(45) {
                    let (lat1, lat2, dlon) = (lat1 as f64 + 0.1, lat2 as f64, dlon as f64);
                    let d = haversine_km(lat1, 10.0, lat2, 10.0 + dlon);
                    assert!(
                        d.is_finite() && (0.0..=max).contains(&d),
                        "({lat1}, {lat2}, {dlon}) -> {d}"
                    );
                }
            }
        }
    }

    #[test]
    fn out_of_range_and_nan_do_not_panic() {
        let d = haversine_km(200.0, 400.0, -300.0, -720.0);
        assert!(d.is_nan() || (0.0..=EARTH_RADIUS_KM * PI + 1e-6).contains(&d));

        assert!(haversine_km(f64::NAN, 0.0, 0.0, 0.0).is_nan());
        let inf = haversine_km(f64::INFINITY, 0.0, 0.0, 0.0);
        assert!(inf.is_nan() || inf.is_finite());
    }
}
