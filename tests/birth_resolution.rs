use hora_chronos::birth::{BirthInput, BirthResolver};
use hora_chronos::facts::{chart_document, extract_facts};
use hora_chronos::location::{
    GeoResult, GeocodeProvider, GeocodingResolver, IndiaBoundingBox, LocationError, LocationSource,
    ResolutionCache, TimezoneProvider, TimezoneResolver, TimezoneResult,
};
use hora_chronos::period::PeriodSelector;
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

struct OfflineGeocoder;

impl GeocodeProvider for OfflineGeocoder {
    fn name(&self) -> &'static str {
        "offline"
    }

    fn geocode(&self, _query: &str) -> Result<GeoResult, LocationError> {
        Err(LocationError::ProviderUnavailable {
            provider: "offline",
            reason: "connection refused".into(),
        })
    }
}

struct ChennaiGeocoder {
    tz: Option<&'static str>,
}

impl GeocodeProvider for ChennaiGeocoder {
    fn name(&self) -> &'static str {
        "chennai"
    }

    fn geocode(&self, _query: &str) -> Result<GeoResult, LocationError> {
        Ok(GeoResult {
            latitude: 13.0827,
            longitude: 80.2707,
            display_name: "Chennai, Tamil Nadu, India".into(),
            timezone_id: self.tz.map(str::to_string),
            source: LocationSource::OpenMeteo,
        })
    }
}

struct DownZone {
    calls: Arc<AtomicUsize>,
}

impl TimezoneProvider for DownZone {
    fn name(&self) -> &'static str {
        "down"
    }

    fn timezone(&self, _lat: f64, _lon: f64) -> Result<TimezoneResult, LocationError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(LocationError::ProviderUnavailable {
            provider: "down",
            reason: "timed out".into(),
        })
    }
}

fn resolver(tz: Option<&'static str>, calls: Arc<AtomicUsize>) -> BirthResolver {
    let cache = Arc::new(ResolutionCache::new());
    BirthResolver::new(
        GeocodingResolver::new(cache.clone())
            .with_authoritative(OfflineGeocoder)
            .with_fallback(ChennaiGeocoder { tz }),
        TimezoneResolver::new(cache)
            .with_provider(DownZone { calls: calls.clone() })
            .with_provider(DownZone { calls })
            .with_provider(IndiaBoundingBox),
    )
}

#[test]
fn chennai_resolves_with_every_network_zone_provider_down() {
    let calls = Arc::new(AtomicUsize::new(0));
    let births = resolver(None, calls.clone());

    let birth = births
        .resolve(&BirthInput::new("1990-04-12", "06:45").at_place("Chennai, India"))
        .unwrap();

    assert_eq!(birth.offset, "+05:30");
    assert!((12.5..=13.5).contains(&birth.latitude));
    assert!((79.8..=80.8).contains(&birth.longitude));
    assert_eq!(birth.timezone_id.as_deref(), Some("Asia/Kolkata"));
    assert_eq!(calls.load(Ordering::SeqCst), 2);

    // second lookup is served from the shared cache
    births
        .resolve(&BirthInput::new("1991-01-01", "00:00").at_place("Chennai, India"))
        .unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert_eq!(births.geocoder().cache().place_count(), 1);
    assert_eq!(births.timezones().cache().zone_count(), 1);
}

#[test]
fn advisory_zone_skips_timezone_resolver() {
    let calls = Arc::new(AtomicUsize::new(0));
    let births = resolver(Some("Asia/Kolkata"), calls.clone());

    let birth = births
        .resolve(&BirthInput::new("1990-04-12", "06:45").at_place("Chennai, India"))
        .unwrap();

    assert_eq!(birth.offset, "+05:30");
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[test]
fn resolved_birth_feeds_fact_extraction() {
    let births = resolver(None, Arc::new(AtomicUsize::new(0)));
    let birth = births
        .resolve(&BirthInput::new("1990-04-12", "06:45").at_place("Chennai, India"))
        .unwrap();

    let kundli = json!({"data": {"vimshottari_dasha": {"dasha_periods": [
        {"name": "Rahu", "start": "1970-01-01T00:00:00+05:30", "end": "1988-01-01T00:00:00+05:30"},
        {"name": "Jupiter", "start": "1988-01-01T00:00:00+05:30", "end": "2004-01-01T00:00:00+05:30",
         "antardasha": [
            {"name": "Jupiter", "start": "1988-01-01T00:00:00+05:30", "end": "1990-03-01T00:00:00+05:30"},
            {"name": "Saturn", "start": "1990-03-01T00:00:00+05:30", "end": "1992-09-01T00:00:00+05:30"}
         ]}
    ]}}});
    let doc = chart_document(&birth, kundli, json!({"data": {"divisional_positions": []}}));

    // a reference before birth: the pre-birth Rahu period must not win
    let facts = extract_facts(&doc, PeriodSelector::utc().normalize("1980-01-01").unwrap());
    assert_eq!(facts.mahadasha.unwrap().name, "Jupiter");
    // Jupiter/Jupiter ended before birth, leaving Saturn as the earliest eligible
    assert_eq!(facts.antardasha.unwrap().name, "Saturn");
    assert_eq!(facts.place.as_deref(), Some("Chennai, India"));
}
