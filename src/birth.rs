//! Birth-record resolution: fills in coordinates and UTC offset before any
//! chart is computed.
//!
//! Flow: explicit values → geocode the place text → offset from the
//! geocoder's advisory zone at the birth wall-clock time → timezone
//! resolver. A record that still lacks coordinates or an offset is
//! rejected.

use crate::config::Settings;
use crate::location::{
    format_offset, offset_for_zone_at, parse_offset, GeocodingResolver, ResolutionCache, TimezoneResolver,
};
use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

fn default_ayanamsa() -> i32 {
    1
}

fn default_language() -> String {
    "en".to_string()
}

/// A birth record as supplied by a caller; any location field may be missing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BirthInput {
    /// `YYYY-MM-DD`
    pub date: String,
    /// `HH:MM` or `HH:MM:SS`, local wall-clock time
    pub time: String,
    /// Offset such as `+05:30`; derived from the location when absent.
    #[serde(default)]
    pub timezone: Option<String>,
    #[serde(default)]
    pub latitude: Option<f64>,
    #[serde(default)]
    pub longitude: Option<f64>,
    /// Free-text place name, e.g. "Chennai, India".
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default = "default_ayanamsa")]
    pub ayanamsa: i32,
    #[serde(default = "default_language")]
    pub la: String,
}

impl BirthInput {
    pub fn new(date: impl Into<String>, time: impl Into<String>) -> Self {
        Self {
            date: date.into(),
            time: time.into(),
            timezone: None,
            latitude: None,
            longitude: None,
            location: None,
            ayanamsa: default_ayanamsa(),
            la: default_language(),
        }
    }

    pub fn at_place(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }

    pub fn at_coordinates(mut self, lat: f64, lon: f64) -> Self {
        self.latitude = Some(lat);
        self.longitude = Some(lon);
        self
    }

    pub fn with_offset(mut self, offset: impl Into<String>) -> Self {
        self.timezone = Some(offset.into());
        self
    }
}

/// A birth record with coordinates and offset both present.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedBirth {
    pub date: String,
    /// Always `HH:MM:SS`.
    pub time: String,
    pub offset: String,
    pub latitude: f64,
    pub longitude: f64,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub timezone_id: Option<String>,
    /// The offset came from the `+00:00` last-resort path.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub offset_degraded: bool,
    pub ayanamsa: i32,
    pub la: String,
}

/// Parameters handed to the external chart compute provider.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartRequest {
    pub coordinates: String,
    pub datetime: String,
    pub ayanamsa: i32,
    pub la: String,
}

impl ResolvedBirth {
    /// `YYYY-MM-DDTHH:MM:SS±HH:MM`
    pub fn iso_datetime(&self) -> String {
        format!("{}T{}{}", self.date, self.time, self.offset)
    }

    /// `lat,lon`
    pub fn coordinates(&self) -> String {
        format!("{},{}", self.latitude, self.longitude)
    }

    /// The birth moment as an absolute instant.
    pub fn birth_instant(&self) -> Option<DateTime<FixedOffset>> {
        let offset = parse_offset(&self.offset)?;
        let local = NaiveDateTime::parse_from_str(&format!("{}T{}", self.date, self.time), "%Y-%m-%dT%H:%M:%S").ok()?;
        offset.from_local_datetime(&local).single()
    }

    pub fn chart_request(&self) -> ChartRequest {
        ChartRequest {
            coordinates: self.coordinates(),
            datetime: self.iso_datetime(),
            ayanamsa: self.ayanamsa,
            la: self.la.clone(),
        }
    }

    /// The `meta.birth` block of a chart document.
    pub fn meta(&self) -> Value {
        json!({
            "date": self.date,
            "time": self.time,
            "timezone": self.offset,
            "latitude": self.latitude,
            "longitude": self.longitude,
            "location": self.location,
        })
    }
}

/// A resolved birth with its UTC instant and the compute-provider request.
#[derive(Debug, Clone, Serialize)]
pub struct BirthReport {
    #[serde(flatten)]
    pub birth: ResolvedBirth,
    pub utc: Option<DateTime<Utc>>,
    pub chart_request: ChartRequest,
}

impl From<ResolvedBirth> for BirthReport {
    fn from(birth: ResolvedBirth) -> Self {
        Self {
            utc: birth.birth_instant().map(|t| t.with_timezone(&Utc)),
            chart_request: birth.chart_request(),
            birth,
        }
    }
}

#[derive(Debug, Error)]
pub enum BirthError {
    #[error("invalid birth input: {0}")]
    InvalidBirthInput(String),

    #[error("could not geocode '{0}'")]
    NotFound(String),

    #[error("incomplete birth data: {0} unresolved; confirm the location explicitly")]
    IncompleteBirthData(&'static str),
}

fn parse_date(raw: &str) -> Result<NaiveDate, BirthError> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|_| BirthError::InvalidBirthInput(format!("date '{}' is not YYYY-MM-DD", raw)))
}

fn parse_time(raw: &str) -> Result<NaiveTime, BirthError> {
    let t = raw.trim();
    NaiveTime::parse_from_str(t, "%H:%M:%S")
        .or_else(|_| NaiveTime::parse_from_str(t, "%H:%M"))
        .map_err(|_| BirthError::InvalidBirthInput(format!("time '{}' is not HH:MM[:SS]", raw)))
}

fn normalize_offset(raw: &str) -> Result<String, BirthError> {
    parse_offset(raw)
        .map(|o| format_offset(o.local_minus_utc() as i64))
        .ok_or_else(|| BirthError::InvalidBirthInput(format!("offset '{}' is not ±HH:MM", raw)))
}

fn non_blank(s: &Option<String>) -> Option<&str> {
    s.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

/// Fills in missing coordinates and offset for birth records.
pub struct BirthResolver {
    geocoder: GeocodingResolver,
    timezones: TimezoneResolver,
}

impl BirthResolver {
    pub fn new(geocoder: GeocodingResolver, timezones: TimezoneResolver) -> Self {
        Self { geocoder, timezones }
    }

    /// Standard provider chains over one fresh shared cache.
    pub fn from_settings(settings: &Settings) -> Self {
        let cache = Arc::new(ResolutionCache::new());
        Self::new(
            GeocodingResolver::from_settings(settings, cache.clone()),
            TimezoneResolver::from_settings(settings, cache),
        )
    }

    pub fn geocoder(&self) -> &GeocodingResolver {
        &self.geocoder
    }

    pub fn timezones(&self) -> &TimezoneResolver {
        &self.timezones
    }

    pub fn resolve(&self, input: &BirthInput) -> Result<ResolvedBirth, BirthError> {
        let date = parse_date(&input.date)?;
        let time = parse_time(&input.time)?;
        let local = date.and_time(time);

        let mut offset = non_blank(&input.timezone).map(normalize_offset).transpose()?;
        let mut offset_degraded = false;
        let mut timezone_id = None;
        let mut display_name = None;

        let mut coords = match (input.latitude, input.longitude) {
            (Some(lat), Some(lon)) => {
                if !(-90.0..=90.0).contains(&lat) || !(-180.0..=180.0).contains(&lon) {
                    return Err(BirthError::InvalidBirthInput(
                        "coordinates out of range (lat -90..90, lon -180..180)".into(),
                    ));
                }
                Some((lat, lon))
            }
            _ => None,
        };

        if coords.is_none() {
            if let Some(place) = non_blank(&input.location) {
                let found = self
                    .geocoder
                    .resolve(place)
                    .map_err(|_| BirthError::NotFound(place.to_string()))?;
                coords = Some((found.latitude, found.longitude));
                display_name = Some(found.display_name);

                if offset.is_none() {
                    if let Some(tzid) = found.timezone_id {
                        match offset_for_zone_at(&tzid, local) {
                            Some(off) => {
                                debug!(tz = %tzid, offset = %off, "offset from advisory zone");
                                offset = Some(off);
                                timezone_id = Some(tzid);
                            }
                            None => debug!(tz = %tzid, "advisory zone unusable at birth time"),
                        }
                    }
                }
            }
        }

        if offset.is_none() {
            if let Some((lat, lon)) = coords {
                match self.timezones.resolve(lat, lon) {
                    Ok(tz) => {
                        if tz.degraded {
                            warn!(tz = %tz.timezone_id, "birth offset is a last-resort guess");
                        }
                        offset_degraded = tz.degraded;
                        offset = Some(tz.offset);
                        timezone_id = Some(tz.timezone_id);
                    }
                    Err(e) => warn!(error = %e, "timezone resolution failed"),
                }
            }
        }

        let (latitude, longitude) = coords.ok_or(BirthError::IncompleteBirthData("coordinates"))?;
        let offset = offset.ok_or(BirthError::IncompleteBirthData("offset"))?;

        info!(
            date = %date,
            lat = latitude,
            lon = longitude,
            offset = %offset,
            "birth resolved"
        );

        Ok(ResolvedBirth {
            date: date.format("%Y-%m-%d").to_string(),
            time: time.format("%H:%M:%S").to_string(),
            offset,
            latitude,
            longitude,
            location: non_blank(&input.location).map(str::to_string),
            display_name,
            timezone_id,
            offset_degraded,
            ayanamsa: input.ayanamsa,
            la: input.la.clone(),
        })
    }
}
