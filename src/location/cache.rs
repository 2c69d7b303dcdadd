//! In-memory resolution cache shared by the geocoding and timezone resolvers.
//!
//! Two independent key spaces: place text (exact, case-sensitive) and
//! coordinate keys. Entries live for the lifetime of the cache object;
//! there is no expiry and no eviction.

use super::types::{CoordinateKey, GeoResult, LocationSource, TimezoneResult};
use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

#[derive(Clone)]
struct PlaceEntry {
    lat: f64,
    lon: f64,
    display_name: String,
}

#[derive(Clone)]
struct ZoneEntry {
    tz: String,
    offset: String,
    degraded: bool,
}

/// The resolution cache.
///
/// Concurrent readers and writers are fine; two threads resolving the same
/// uncached key may both hit the network, and the later write wins.
#[derive(Default)]
pub struct ResolutionCache {
    places: RwLock<HashMap<String, PlaceEntry>>,
    zones: RwLock<HashMap<CoordinateKey, ZoneEntry>>,
}

impl ResolutionCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up a place by its exact query text.
    pub fn get_place(&self, query: &str) -> Option<GeoResult> {
        let places = self.places.read().unwrap_or_else(PoisonError::into_inner);
        let entry = places.get(query)?;
        Some(GeoResult {
            latitude: entry.lat,
            longitude: entry.lon,
            display_name: entry.display_name.clone(),
            timezone_id: None,
            source: LocationSource::Cache,
        })
    }

    /// Store a geocoding result under the original query text.
    pub fn put_place(&self, query: &str, result: &GeoResult) {
        let entry = PlaceEntry {
            lat: result.latitude,
            lon: result.longitude,
            display_name: result.display_name.clone(),
        };
        self.places
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(query.to_string(), entry);
    }

    pub fn get_zone(&self, key: &CoordinateKey) -> Option<TimezoneResult> {
        let zones = self.zones.read().unwrap_or_else(PoisonError::into_inner);
        let entry = zones.get(key)?;
        Some(TimezoneResult {
            timezone_id: entry.tz.clone(),
            offset: entry.offset.clone(),
            source: LocationSource::Cache,
            degraded: entry.degraded,
        })
    }

    pub fn put_zone(&self, key: CoordinateKey, result: &TimezoneResult) {
        let entry = ZoneEntry {
            tz: result.timezone_id.clone(),
            offset: result.offset.clone(),
            degraded: result.degraded,
        };
        self.zones
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key, entry);
    }

    /// Number of cached places (for testing).
    pub fn place_count(&self) -> usize {
        self.places.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Number of cached coordinate zones (for testing).
    pub fn zone_count(&self) -> usize {
        self.zones.read().unwrap_or_else(PoisonError::into_inner).len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    fn chennai() -> GeoResult {
        GeoResult {
            latitude: 13.0827,
            longitude: 80.2707,
            display_name: "Chennai, Tamil Nadu, India".into(),
            timezone_id: Some("Asia/Kolkata".into()),
            source: LocationSource::Nominatim,
        }
    }

    #[test]
    fn test_place_put_get() {
        let cache = ResolutionCache::new();
        cache.put_place("Chennai, India", &chennai());

        let hit = cache.get_place("Chennai, India").unwrap();
        assert_eq!(hit.source, LocationSource::Cache);
        assert_eq!(hit.display_name, "Chennai, Tamil Nadu, India");
        assert!((hit.latitude - 13.0827).abs() < 1e-9);
        // The advisory zone id is not part of the cached triple
        assert!(hit.timezone_id.is_none());
    }

    #[test]
    fn test_place_keys_are_exact() {
        let cache = ResolutionCache::new();
        cache.put_place("Chennai, India", &chennai());

        assert!(cache.get_place("chennai, india").is_none());
        assert!(cache.get_place("Chennai, India ").is_none());
        assert!(cache.get_place("Chennai").is_none());
    }

    #[test]
    fn test_last_writer_wins() {
        let cache = ResolutionCache::new();
        cache.put_place("Madras", &chennai());
        let mut other = chennai();
        other.display_name = "Madras (renamed)".into();
        cache.put_place("Madras", &other);

        assert_eq!(cache.get_place("Madras").unwrap().display_name, "Madras (renamed)");
        assert_eq!(cache.place_count(), 1);
    }

    #[test]
    fn test_zone_put_get() {
        let cache = ResolutionCache::new();
        let tz = TimezoneResult {
            timezone_id: "Asia/Kolkata".into(),
            offset: "+05:30".into(),
            source: LocationSource::TimeApi,
            degraded: false,
        };
        cache.put_zone(CoordinateKey::new(28.6139, 77.2090), &tz);

        let hit = cache.get_zone(&CoordinateKey::new(28.6139, 77.209)).unwrap();
        assert_eq!(hit.offset, "+05:30");
        assert_eq!(hit.source, LocationSource::Cache);
        assert!(cache.get_zone(&CoordinateKey::new(28.6, 77.2)).is_none());
    }

    #[test]
    fn test_zone_keeps_degraded_flag() {
        let cache = ResolutionCache::new();
        let guess = TimezoneResult {
            timezone_id: "Pacific/Nowhere".into(),
            offset: "+00:00".into(),
            source: LocationSource::ReverseGeocode,
            degraded: true,
        };
        cache.put_zone(CoordinateKey::new(-10.0, -150.0), &guess);

        let hit = cache.get_zone(&CoordinateKey::new(-10.0, -150.0)).unwrap();
        assert!(hit.degraded);
        assert_eq!(hit.offset, "+00:00");
    }

    #[test]
    fn test_key_spaces_are_independent() {
        let cache = ResolutionCache::new();
        cache.put_place("28.613900,77.209000", &chennai());
        assert!(cache.get_zone(&CoordinateKey::new(28.6139, 77.2090)).is_none());
        assert_eq!(cache.zone_count(), 0);
    }

    #[test]
    fn test_concurrent_writers() {
        let cache = Arc::new(ResolutionCache::new());
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let cache = Arc::clone(&cache);
                thread::spawn(move || {
                    for j in 0..50 {
                        let mut r = chennai();
                        r.display_name = format!("{}-{}", i, j);
                        cache.put_place(&format!("place-{}", j), &r);
                        let _ = cache.get_place(&format!("place-{}", j));
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(cache.place_count(), 50);
    }
}
