//! Core types for the location subsystem.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Which link of a fallback chain produced a result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LocationSource {
    Cache,
    LocationIq,
    Nominatim,
    OpenMeteo,
    TimeApi,
    ReverseGeocode,
    BoundingBox,
}

impl fmt::Display for LocationSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Cache => write!(f, "Cache"),
            Self::LocationIq => write!(f, "LocationIQ"),
            Self::Nominatim => write!(f, "Nominatim"),
            Self::OpenMeteo => write!(f, "Open-Meteo"),
            Self::TimeApi => write!(f, "timeapi.io"),
            Self::ReverseGeocode => write!(f, "Reverse geocode"),
            Self::BoundingBox => write!(f, "Bounding box"),
        }
    }
}

/// Coordinates for a free-text place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeoResult {
    pub latitude: f64,
    pub longitude: f64,
    pub display_name: String,
    /// Advisory IANA zone id, only supplied by some providers.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timezone_id: Option<String>,
    pub source: LocationSource,
}

/// Zone and `±HH:MM` offset for a coordinate pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimezoneResult {
    pub timezone_id: String,
    pub offset: String,
    pub source: LocationSource,
    /// Set when the offset is a last-resort guess rather than a lookup.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub degraded: bool,
}

/// Canonical cache key for a coordinate pair at 6-decimal precision.
///
/// Coordinates that round to the same string share a cache entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CoordinateKey(String);

impl CoordinateKey {
    pub fn new(lat: f64, lon: f64) -> Self {
        Self(format!("{:.6},{:.6}", lat, lon))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CoordinateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Location resolution errors.
///
/// The first three variants are per-provider and only advance a fallback
/// chain; `NotFound` is what a caller sees once every link has failed.
#[derive(Debug, Error)]
pub enum LocationError {
    #[error("{provider} unavailable: {reason}")]
    ProviderUnavailable { provider: &'static str, reason: String },

    #[error("{provider} returned an unusable response: {reason}")]
    InvalidResponse { provider: &'static str, reason: String },

    #[error("{0} returned no results")]
    NoMatch(&'static str),

    #[error("cannot resolve '{0}'")]
    NotFound(String),
}
