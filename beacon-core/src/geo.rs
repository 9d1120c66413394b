//! Great-circle distance helpers for proximity targeting.

use crate::types::Coordinates;

/// Mean Earth radius in metres.
pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Haversine distance between two coordinate pairs, in metres.
pub fn haversine_m(a: Coordinates, b: Coordinates) -> f64 {
    let lat_a = a.latitude.to_radians();
    let lat_b = b.latitude.to_radians();
    let d_lat = (b.latitude - a.latitude).to_radians();
    let d_lon = (b.longitude - a.longitude).to_radians();

    let h = (d_lat / 2.0).sin().powi(2) + lat_a.cos() * lat_b.cos() * (d_lon / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_M * h.sqrt().asin()
}

/// Keep items within `max_distance_m` of `center` and order them
/// closest-first. No further tie-break is applied.
pub fn within<T>(
    center: Coordinates,
    max_distance_m: f64,
    items: impl IntoIterator<Item = (Coordinates, T)>,
) -> Vec<T> {
    let mut hits: Vec<(f64, T)> = items
        .into_iter()
        .map(|(pos, item)| (haversine_m(center, pos), item))
        .filter(|(d, _)| *d <= max_distance_m)
        .collect();
    hits.sort_by(|a, b| a.0.total_cmp(&b.0));
    hits.into_iter().map(|(_, item)| item).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn coords(longitude: f64, latitude: f64) -> Coordinates {
        Coordinates {
            longitude,
            latitude,
        }
    }

    #[test]
    fn test_haversine_zero_for_same_point() {
        let p = coords(77.2090, 28.6139);
        assert_eq!(haversine_m(p, p), 0.0);
    }

    #[test]
    fn test_haversine_known_distance() {
        // Delhi to Mumbai is roughly 1150 km.
        let delhi = coords(77.2090, 28.6139);
        let mumbai = coords(72.8777, 19.0760);
        let d = haversine_m(delhi, mumbai);
        assert!(d > 1_100_000.0 && d < 1_200_000.0, "got {d}");
    }

    #[test]
    fn test_haversine_symmetric() {
        let a = coords(2.3522, 48.8566);
        let b = coords(-0.1278, 51.5074);
        assert!((haversine_m(a, b) - haversine_m(b, a)).abs() < 1e-6);
    }

    #[test]
    fn test_within_filters_and_sorts() {
        let center = coords(0.0, 0.0);
        let near = coords(0.01, 0.0); // ~1.1 km
        let nearer = coords(0.001, 0.0); // ~110 m
        let far = coords(1.0, 0.0); // ~111 km

        let hits = within(
            center,
            10_000.0,
            vec![(near, "near"), (far, "far"), (nearer, "nearer")],
        );
        assert_eq!(hits, vec!["nearer", "near"]);
    }

    #[test]
    fn test_within_empty_when_all_far() {
        let center = coords(0.0, 0.0);
        let hits = within(center, 100.0, vec![(coords(1.0, 1.0), "far")]);
        assert!(hits.is_empty());
    }
}
