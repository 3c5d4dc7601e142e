//! Great-circle helpers

/// Mean Earth radius in meters
pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Haversine distance in meters
pub fn haversine_m(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let (phi1, phi2) = (lat1.to_radians(), lat2.to_radians());
    let dphi = (lat2 - lat1).to_radians();
    let dlambda = (lon2 - lon1).to_radians();

    let a = (dphi / 2.0).sin().powi(2) + phi1.cos() * phi2.cos() * (dlambda / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());
    EARTH_RADIUS_M * c
}

/// Initial great-circle bearing in degrees [0, 360), 0 = north, 90 = east
///
/// None when both positions coincide.
pub fn bearing_deg(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> Option<f64> {
    if lat1 == lat2 && lon1 == lon2 {
        return None;
    }
    let (phi1, phi2) = (lat1.to_radians(), lat2.to_radians());
    let dlambda = (lon2 - lon1).to_radians();

    let y = dlambda.sin() * phi2.cos();
    let x = phi1.cos() * phi2.sin() - phi1.sin() * phi2.cos() * dlambda.cos();
    Some(y.atan2(x).to_degrees().rem_euclid(360.0))
}

/// Longitude difference folded into [-180, 180]
pub fn longitude_delta(from: f64, to: f64) -> f64 {
    let delta = to - from;
    if delta > 180.0 {
        delta - 360.0
    } else if delta < -180.0 {
        delta + 360.0
    } else {
        delta
    }
}

/// Longitude wrapped into [-180, 180)
pub fn normalize_longitude(lon: f64) -> f64 {
    (lon + 180.0).rem_euclid(360.0) - 180.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn haversine_known_distance() {
        // 0.001 degrees of latitude is about 111 m
        let d = haversine_m(45.0, 9.0, 45.001, 9.0);
        assert!((d - 111.19).abs() < 0.1, "got {d}");
        assert_eq!(haversine_m(45.0, 9.0, 45.0, 9.0), 0.0);
    }

    #[test]
    fn bearing_cardinal_directions() {
        let north = bearing_deg(45.0, 9.0, 45.1, 9.0).unwrap();
        let east = bearing_deg(0.0, 9.0, 0.0, 9.1).unwrap();
        let south = bearing_deg(45.1, 9.0, 45.0, 9.0).unwrap();
        let west = bearing_deg(0.0, 9.1, 0.0, 9.0).unwrap();
        assert!(north.abs() < 1e-9);
        assert!((east - 90.0).abs() < 1e-9);
        assert!((south - 180.0).abs() < 1e-9);
        assert!((west - 270.0).abs() < 1e-9);
        assert_eq!(bearing_deg(1.0, 2.0, 1.0, 2.0), None);
    }

    #[test]
    fn longitude_wrapping() {
        assert_eq!(longitude_delta(179.5, -179.5), 1.0);
        assert_eq!(longitude_delta(-179.5, 179.5), -1.0);
        assert_eq!(normalize_longitude(180.5), -179.5);
        assert_eq!(normalize_longitude(9.0), 9.0);
    }
}
