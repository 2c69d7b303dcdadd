//! Location providers: LocationIQ, Nominatim, Open-Meteo, timeapi.io,
//! and the offline bounding-box fallback.
//!
//! Each provider maps its own JSON shape into `GeoResult` /
//! `TimezoneResult` here, so the resolvers never branch on provider
//! identity. The `parse_*` adapters are pure and tested against recorded
//! response shapes.

use super::offset::{current_offset_for_zone, format_offset, parse_offset};
use super::types::{GeoResult, LocationError, LocationSource, TimezoneResult};
use serde_json::Value;
use tracing::{debug, warn};

const LOCATIONIQ_SEARCH_URL: &str = "https://us1.locationiq.com/v1/search";
const LOCATIONIQ_TIMEZONE_URL: &str = "https://us1.locationiq.com/v1/timezone.php";
const NOMINATIM_SEARCH_URL: &str = "https://nominatim.openstreetmap.org/search";
const OPEN_METEO_SEARCH_URL: &str = "https://geocoding-api.open-meteo.com/v1/search";
const OPEN_METEO_TIMEZONE_URL: &str = "https://api.open-meteo.com/v1/timezone";
const TIMEAPI_COORDINATE_URL: &str = "https://timeapi.io/api/TimeZone/coordinate";

pub const INDIA_ZONE: &str = "Asia/Kolkata";
pub const INDIA_OFFSET: &str = "+05:30";

/// A source of coordinates for free-text place names.
pub trait GeocodeProvider: Send + Sync {
    fn name(&self) -> &'static str;
    fn geocode(&self, query: &str) -> Result<GeoResult, LocationError>;
}

/// A source of zone id + offset for a coordinate pair.
pub trait TimezoneProvider: Send + Sync {
    fn name(&self) -> &'static str;
    fn timezone(&self, lat: f64, lon: f64) -> Result<TimezoneResult, LocationError>;
}

// ─── HTTP plumbing ──────────────────────────────────────────────

fn fetch_json(provider: &'static str, request: ureq::Request) -> Result<Value, LocationError> {
    debug!(provider, url = request.url(), "provider request");
    let response = request.call().map_err(|e| match e {
        ureq::Error::Status(code, _) => LocationError::ProviderUnavailable {
            provider,
            reason: format!("HTTP {}", code),
        },
        ureq::Error::Transport(t) => LocationError::ProviderUnavailable {
            provider,
            reason: t.to_string(),
        },
    })?;

    response
        .into_json::<Value>()
        .map_err(|e| LocationError::InvalidResponse {
            provider,
            reason: e.to_string(),
        })
}

fn invalid(provider: &'static str, reason: &str) -> LocationError {
    LocationError::InvalidResponse {
        provider,
        reason: reason.to_string(),
    }
}

/// Numbers arrive as JSON numbers from some providers and as strings from others.
fn lenient_f64(v: &Value) -> Option<f64> {
    let parsed = match v {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    parsed.filter(|f| f.is_finite())
}

fn non_empty_str(v: Option<&Value>) -> Option<&str> {
    v.and_then(Value::as_str).map(str::trim).filter(|s| !s.is_empty())
}

// ─── Geocoding adapters ─────────────────────────────────────────

/// Map an OSM-style search array (`[{lat, lon, display_name}]`) to the
/// first candidate. Shared by Nominatim and LocationIQ.
pub fn parse_osm_search(
    provider: &'static str,
    source: LocationSource,
    query: &str,
    data: &Value,
) -> Result<GeoResult, LocationError> {
    let items = data
        .as_array()
        .ok_or_else(|| invalid(provider, "expected an array of candidates"))?;
    let item = items.first().ok_or(LocationError::NoMatch(provider))?;

    let latitude = item
        .get("lat")
        .and_then(lenient_f64)
        .ok_or_else(|| invalid(provider, "candidate has no usable lat"))?;
    let longitude = item
        .get("lon")
        .and_then(lenient_f64)
        .ok_or_else(|| invalid(provider, "candidate has no usable lon"))?;
    let display_name = non_empty_str(item.get("display_name")).unwrap_or(query);

    Ok(GeoResult {
        latitude,
        longitude,
        display_name: display_name.to_string(),
        timezone_id: None,
        source,
    })
}

/// Map an Open-Meteo search object (`{results: [{latitude, longitude, name, timezone}]}`).
pub fn parse_open_meteo_search(query: &str, data: &Value) -> Result<GeoResult, LocationError> {
    const PROVIDER: &str = "Open-Meteo geocoding";
    let item = data
        .get("results")
        .and_then(Value::as_array)
        .and_then(|r| r.first())
        .ok_or(LocationError::NoMatch(PROVIDER))?;

    let latitude = item
        .get("latitude")
        .and_then(lenient_f64)
        .ok_or_else(|| invalid(PROVIDER, "result has no usable latitude"))?;
    let longitude = item
        .get("longitude")
        .and_then(lenient_f64)
        .ok_or_else(|| invalid(PROVIDER, "result has no usable longitude"))?;

    Ok(GeoResult {
        latitude,
        longitude,
        display_name: non_empty_str(item.get("name")).unwrap_or(query).to_string(),
        timezone_id: non_empty_str(item.get("timezone")).map(str::to_string),
        source: LocationSource::OpenMeteo,
    })
}

// ─── Timezone adapters ──────────────────────────────────────────

/// Offset given either as a `±HH:MM` string or as raw seconds.
fn offset_from_value(v: &Value) -> Option<String> {
    match v {
        Value::String(s) => {
            let fixed = parse_offset(s)?;
            Some(format_offset(fixed.local_minus_utc() as i64))
        }
        Value::Number(n) => n.as_f64().map(|secs| format_offset(secs as i64)),
        _ => None,
    }
}

fn seconds_from_value(v: &Value) -> Option<i64> {
    v.as_f64().map(|secs| secs as i64)
}

/// Map a LocationIQ timezone response. The zone name may be a plain field
/// (`timezone`, `zone_name`, `timeZone`) or nested (`{timezone: {name, offset_sec}}`);
/// the offset may be `utc_offset`/`offset` or `gmt_offset`/`raw_offset` seconds.
pub fn parse_locationiq_timezone(data: &Value) -> Result<TimezoneResult, LocationError> {
    const PROVIDER: &str = "LocationIQ timezone";

    let zone_field = ["timezone", "zone_name", "timeZone"]
        .iter()
        .filter_map(|k| data.get(*k))
        .find(|v| !v.is_null() && v.as_str() != Some(""));

    let (tz, nested_secs) = match zone_field {
        Some(Value::String(s)) => (Some(s.trim().to_string()), None),
        Some(Value::Object(obj)) => (
            non_empty_str(obj.get("name"))
                .or_else(|| non_empty_str(obj.get("zone_name")))
                .map(str::to_string),
            obj.get("offset_sec").and_then(seconds_from_value),
        ),
        _ => (None, None),
    };

    let offset = ["utc_offset", "offset"]
        .iter()
        .filter_map(|k| data.get(*k))
        .find_map(offset_from_value)
        .or_else(|| {
            ["gmt_offset", "raw_offset"]
                .iter()
                .filter_map(|k| data.get(*k))
                .find_map(seconds_from_value)
                .map(format_offset)
        })
        .or_else(|| nested_secs.map(format_offset));

    match (tz, offset) {
        (Some(timezone_id), Some(offset)) => Ok(TimezoneResult {
            timezone_id,
            offset,
            source: LocationSource::LocationIq,
            degraded: false,
        }),
        (None, _) => Err(invalid(PROVIDER, "no zone name")),
        (_, None) => Err(invalid(PROVIDER, "no offset")),
    }
}

/// Map a timeapi.io coordinate response, preferring the standard offset.
pub fn parse_timeapi(data: &Value) -> Result<TimezoneResult, LocationError> {
    const PROVIDER: &str = "timeapi.io";
    let tz = non_empty_str(data.get("timeZone")).ok_or_else(|| invalid(PROVIDER, "no timeZone"))?;

    let secs = ["standardUtcOffset", "currentUtcOffset"]
        .iter()
        .find_map(|k| data.get(*k).and_then(|o| o.get("seconds")).and_then(seconds_from_value))
        .ok_or_else(|| invalid(PROVIDER, "no UTC offset"))?;

    Ok(TimezoneResult {
        timezone_id: tz.to_string(),
        offset: format_offset(secs),
        source: LocationSource::TimeApi,
        degraded: false,
    })
}

/// Map an Open-Meteo timezone response (`{timezone, utc_offset_seconds}`).
pub fn parse_open_meteo_timezone(data: &Value) -> Result<TimezoneResult, LocationError> {
    const PROVIDER: &str = "Open-Meteo timezone";
    let tz = non_empty_str(data.get("timezone")).ok_or_else(|| invalid(PROVIDER, "no timezone"))?;
    let secs = data
        .get("utc_offset_seconds")
        .and_then(seconds_from_value)
        .ok_or_else(|| invalid(PROVIDER, "no utc_offset_seconds"))?;

    Ok(TimezoneResult {
        timezone_id: tz.to_string(),
        offset: format_offset(secs),
        source: LocationSource::OpenMeteo,
        degraded: false,
    })
}

/// Turn an advisory zone id into a result, offset taken at the present instant.
///
/// Ids unknown to the tz database fall back to `+05:30` for `Asia/Kolkata`
/// and to `+00:00` otherwise. The latter is a guess and is marked degraded.
pub fn zone_from_advisory_id(tzid: &str) -> TimezoneResult {
    let (offset, degraded) = match current_offset_for_zone(tzid) {
        Some(off) => (off, false),
        None if tzid == INDIA_ZONE => (INDIA_OFFSET.to_string(), false),
        None => {
            warn!(tz = tzid, "zone unknown to tz database, assuming +00:00");
            ("+00:00".to_string(), true)
        }
    };
    TimezoneResult {
        timezone_id: tzid.to_string(),
        offset,
        source: LocationSource::ReverseGeocode,
        degraded,
    }
}

/// The Indian subcontinent footprint used by the last-resort heuristic.
pub fn in_india_footprint(lat: f64, lon: f64) -> bool {
    (6.0..=37.5).contains(&lat) && (68.0..=98.0).contains(&lon)
}

// ─── Geocoding providers ────────────────────────────────────────

/// LocationIQ forward search. Requires an API key.
pub struct LocationIqSearch {
    agent: ureq::Agent,
    key: String,
}

impl LocationIqSearch {
    pub fn new(agent: ureq::Agent, key: impl Into<String>) -> Self {
        Self { agent, key: key.into() }
    }
}

impl GeocodeProvider for LocationIqSearch {
    fn name(&self) -> &'static str {
        "LocationIQ"
    }

    fn geocode(&self, query: &str) -> Result<GeoResult, LocationError> {
        let request = self
            .agent
            .get(LOCATIONIQ_SEARCH_URL)
            .query("key", &self.key)
            .query("q", query)
            .query("format", "json")
            .query("limit", "1");
        let data = fetch_json(self.name(), request)?;
        parse_osm_search(self.name(), LocationSource::LocationIq, query, &data)
    }
}

/// OpenStreetMap Nominatim text search. Its usage policy requires an
/// identifying `User-Agent`.
pub struct NominatimSearch {
    agent: ureq::Agent,
    user_agent: String,
}

impl NominatimSearch {
    pub fn new(agent: ureq::Agent, user_agent: impl Into<String>) -> Self {
        Self {
            agent,
            user_agent: user_agent.into(),
        }
    }
}

impl GeocodeProvider for NominatimSearch {
    fn name(&self) -> &'static str {
        "Nominatim"
    }

    fn geocode(&self, query: &str) -> Result<GeoResult, LocationError> {
        let request = self
            .agent
            .get(NOMINATIM_SEARCH_URL)
            .set("User-Agent", &self.user_agent)
            .query("q", query)
            .query("format", "json")
            .query("addressdetails", "1")
            .query("limit", "1");
        let data = fetch_json(self.name(), request)?;
        parse_osm_search(self.name(), LocationSource::Nominatim, query, &data)
    }
}

/// Open-Meteo geocoding. Also carries an advisory zone id.
pub struct OpenMeteoSearch {
    agent: ureq::Agent,
}

impl OpenMeteoSearch {
    pub fn new(agent: ureq::Agent) -> Self {
        Self { agent }
    }
}

impl GeocodeProvider for OpenMeteoSearch {
    fn name(&self) -> &'static str {
        "Open-Meteo geocoding"
    }

    fn geocode(&self, query: &str) -> Result<GeoResult, LocationError> {
        let request = self
            .agent
            .get(OPEN_METEO_SEARCH_URL)
            .query("name", query)
            .query("count", "1");
        let data = fetch_json(self.name(), request)?;
        parse_open_meteo_search(query, &data)
    }
}

// ─── Timezone providers ─────────────────────────────────────────

/// LocationIQ timezone lookup. Requires an API key.
pub struct LocationIqTimezone {
    agent: ureq::Agent,
    key: String,
}

impl LocationIqTimezone {
    pub fn new(agent: ureq::Agent, key: impl Into<String>) -> Self {
        Self { agent, key: key.into() }
    }
}

impl TimezoneProvider for LocationIqTimezone {
    fn name(&self) -> &'static str {
        "LocationIQ timezone"
    }

    fn timezone(&self, lat: f64, lon: f64) -> Result<TimezoneResult, LocationError> {
        let request = self
            .agent
            .get(LOCATIONIQ_TIMEZONE_URL)
            .query("key", &self.key)
            .query("lat", &lat.to_string())
            .query("lon", &lon.to_string())
            .query("format", "json");
        let data = fetch_json(self.name(), request)?;
        parse_locationiq_timezone(&data)
    }
}

pub struct TimeApiTimezone {
    agent: ureq::Agent,
}

impl TimeApiTimezone {
    pub fn new(agent: ureq::Agent) -> Self {
        Self { agent }
    }
}

impl TimezoneProvider for TimeApiTimezone {
    fn name(&self) -> &'static str {
        "timeapi.io"
    }

    fn timezone(&self, lat: f64, lon: f64) -> Result<TimezoneResult, LocationError> {
        let request = self
            .agent
            .get(TIMEAPI_COORDINATE_URL)
            .query("latitude", &lat.to_string())
            .query("longitude", &lon.to_string());
        let data = fetch_json(self.name(), request)?;
        parse_timeapi(&data)
    }
}

pub struct OpenMeteoTimezone {
    agent: ureq::Agent,
}

impl OpenMeteoTimezone {
    pub fn new(agent: ureq::Agent) -> Self {
        Self { agent }
    }
}

impl TimezoneProvider for OpenMeteoTimezone {
    fn name(&self) -> &'static str {
        "Open-Meteo timezone"
    }

    fn timezone(&self, lat: f64, lon: f64) -> Result<TimezoneResult, LocationError> {
        let request = self
            .agent
            .get(OPEN_METEO_TIMEZONE_URL)
            .query("latitude", &lat.to_string())
            .query("longitude", &lon.to_string());
        let data = fetch_json(self.name(), request)?;
        parse_open_meteo_timezone(&data)
    }
}

/// Asks Open-Meteo geocoding about `"lat,lon"` and uses the advisory zone
/// id of the first hit.
pub struct ReverseGeocodeTimezone {
    agent: ureq::Agent,
}

impl ReverseGeocodeTimezone {
    pub fn new(agent: ureq::Agent) -> Self {
        Self { agent }
    }
}

impl TimezoneProvider for ReverseGeocodeTimezone {
    fn name(&self) -> &'static str {
        "Open-Meteo reverse geocode"
    }

    fn timezone(&self, lat: f64, lon: f64) -> Result<TimezoneResult, LocationError> {
        let query = format!("{},{}", lat, lon);
        let request = self
            .agent
            .get(OPEN_METEO_SEARCH_URL)
            .query("name", &query)
            .query("count", "1");
        let data = fetch_json(self.name(), request)?;
        let tzid = data
            .get("results")
            .and_then(Value::as_array)
            .and_then(|r| r.first())
            .and_then(|item| non_empty_str(item.get("timezone")))
            .ok_or(LocationError::NoMatch(self.name()))?;
        Ok(zone_from_advisory_id(tzid))
    }
}

/// Offline heuristic: anything inside the Indian subcontinent footprint is IST.
pub struct IndiaBoundingBox;

impl TimezoneProvider for IndiaBoundingBox {
    fn name(&self) -> &'static str {
        "India bounding box"
    }

    fn timezone(&self, lat: f64, lon: f64) -> Result<TimezoneResult, LocationError> {
        if !in_india_footprint(lat, lon) {
            return Err(LocationError::NoMatch(self.name()));
        }
        Ok(TimezoneResult {
            timezone_id: INDIA_ZONE.to_string(),
            offset: INDIA_OFFSET.to_string(),
            source: LocationSource::BoundingBox,
            degraded: false,
        })
    }
}
