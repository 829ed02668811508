//! Offline geocoding for grounding location phrases.
//!
//! A fixed city table keeps rule compilation independent of external
//! geocoding APIs; unknown places simply fail to ground and the compiler
//! asks the user instead of guessing.

/// Major cities the compiler can resolve without a network call.
const CITY_COORDINATES: &[(&str, f64, f64)] = &[
    ("new york, ny", 40.7128, -74.0060),
    ("los angeles, ca", 34.0522, -118.2437),
    ("chicago, il", 41.8781, -87.6298),
    ("houston, tx", 29.7604, -95.3698),
    ("phoenix, az", 33.4484, -112.0740),
    ("philadelphia, pa", 39.9526, -75.1652),
    ("san antonio, tx", 29.4241, -98.4936),
    ("san diego, ca", 32.7157, -117.1611),
    ("dallas, tx", 32.7767, -96.7970),
    ("austin, tx", 30.2672, -97.7431),
    ("san francisco, ca", 37.7749, -122.4194),
    ("seattle, wa", 47.6062, -122.3321),
    ("denver, co", 39.7392, -104.9903),
    ("boston, ma", 42.3601, -71.0589),
    ("nashville, tn", 36.1627, -86.7816),
    ("portland, or", 45.5152, -122.6784),
    ("las vegas, nv", 36.1699, -115.1398),
    ("miami, fl", 25.7617, -80.1918),
    ("atlanta, ga", 33.7490, -84.3880),
    ("minneapolis, mn", 44.9778, -93.2650),
    ("new orleans, la", 29.9511, -90.0715),
    ("london, uk", 51.5074, -0.1278),
    ("paris, france", 48.8566, 2.3522),
    ("tokyo, japan", 35.6762, 139.6503),
    ("toronto, canada", 43.6511, -79.3470),
    ("mexico city, mexico", 19.4326, -99.1332),
];

/// Resolves a free-form place string to coordinates. Exact match first,
/// then substring containment either way.
pub fn geocode_offline(place: &str) -> Option<(f64, f64)> {
    let normalized = place.trim().to_lowercase();
    if normalized.is_empty() {
        return None;
    }

    for (city, lat, lon) in CITY_COORDINATES {
        if *city == normalized {
            return Some((*lat, *lon));
        }
    }

    CITY_COORDINATES
        .iter()
        .find(|(city, _, _)| city.contains(&normalized) || normalized.contains(city))
        .map(|(_, lat, lon)| (*lat, *lon))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_match_resolves() {
        let (lat, lon) = geocode_offline("Boston, MA").unwrap();
        assert!((lat - 42.3601).abs() < 1e-4);
        assert!((lon + 71.0589).abs() < 1e-4);
    }

    #[test]
    fn partial_match_resolves() {
        assert!(geocode_offline("las vegas").is_some());
        assert!(geocode_offline("downtown chicago, il").is_some());
    }

    #[test]
    fn unknown_places_stay_unresolved() {
        assert_eq!(geocode_offline("Middle of Nowhere, ZZ"), None);
        assert_eq!(geocode_offline(""), None);
    }
}
