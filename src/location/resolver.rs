//! Location resolvers: orchestrate the provider fallback chains.
//!
//! Geocoding:  authoritative providers → cache → fallback providers → NotFound
//! Timezone:   cache → providers in order (network first, bounding box last) → NotFound
//!
//! Every success is written through to the shared cache. A failing
//! provider is never retried; the chain simply moves on.

use super::cache::ResolutionCache;
use super::providers::{
    GeocodeProvider, IndiaBoundingBox, LocationIqSearch, LocationIqTimezone, NominatimSearch,
    OpenMeteoSearch, OpenMeteoTimezone, ReverseGeocodeTimezone, TimeApiTimezone, TimezoneProvider,
};
use super::types::{CoordinateKey, GeoResult, LocationError, TimezoneResult};
use crate::config::{Settings, ENV_USER_AGENT};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Free-text place name → coordinates.
pub struct GeocodingResolver {
    cache: Arc<ResolutionCache>,
    /// Consulted before the cache; a fresh lookup is always attempted.
    authoritative: Vec<Box<dyn GeocodeProvider>>,
    /// Consulted only after a cache miss.
    fallback: Vec<Box<dyn GeocodeProvider>>,
}

impl GeocodingResolver {
    pub fn new(cache: Arc<ResolutionCache>) -> Self {
        Self {
            cache,
            authoritative: Vec::new(),
            fallback: Vec::new(),
        }
    }

    /// The standard chain: LocationIQ (when keyed), cache, Nominatim, Open-Meteo.
    pub fn from_settings(settings: &Settings, cache: Arc<ResolutionCache>) -> Self {
        let agent = settings.http_agent();
        if settings.uses_default_user_agent() {
            warn!("no contact in the Nominatim user agent; set {}", ENV_USER_AGENT);
        }
        let mut resolver = Self::new(cache);
        if let Some(key) = &settings.locationiq_key {
            resolver = resolver.with_authoritative(LocationIqSearch::new(agent.clone(), key.clone()));
        }
        resolver
            .with_fallback(NominatimSearch::new(agent.clone(), settings.user_agent.clone()))
            .with_fallback(OpenMeteoSearch::new(agent))
    }

    pub fn with_authoritative(mut self, provider: impl GeocodeProvider + 'static) -> Self {
        self.authoritative.push(Box::new(provider));
        self
    }

    pub fn with_fallback(mut self, provider: impl GeocodeProvider + 'static) -> Self {
        self.fallback.push(Box::new(provider));
        self
    }

    pub fn cache(&self) -> &Arc<ResolutionCache> {
        &self.cache
    }

    /// Resolve a place name through the full chain.
    pub fn resolve(&self, query: &str) -> Result<GeoResult, LocationError> {
        if query.trim().is_empty() {
            return Err(LocationError::NotFound(query.to_string()));
        }

        if let Some(found) = self.try_chain(&self.authoritative, query) {
            return Ok(found);
        }

        if let Some(hit) = self.cache.get_place(query) {
            debug!(query, "geocode cache hit");
            return Ok(hit);
        }

        if let Some(found) = self.try_chain(&self.fallback, query) {
            return Ok(found);
        }

        warn!(query, "every geocoding provider failed");
        Err(LocationError::NotFound(query.to_string()))
    }

    fn try_chain(&self, chain: &[Box<dyn GeocodeProvider>], query: &str) -> Option<GeoResult> {
        for provider in chain {
            match provider.geocode(query) {
                Ok(found) => {
                    info!(
                        query,
                        provider = provider.name(),
                        lat = found.latitude,
                        lon = found.longitude,
                        "geocoded"
                    );
                    self.cache.put_place(query, &found);
                    return Some(found);
                }
                Err(e) => debug!(query, provider = provider.name(), error = %e, "geocoder failed"),
            }
        }
        None
    }
}

/// Coordinates → zone id + `±HH:MM` offset.
pub struct TimezoneResolver {
    cache: Arc<ResolutionCache>,
    chain: Vec<Box<dyn TimezoneProvider>>,
}

impl TimezoneResolver {
    pub fn new(cache: Arc<ResolutionCache>) -> Self {
        Self {
            cache,
            chain: Vec::new(),
        }
    }

    /// The standard chain: LocationIQ (when keyed), timeapi.io, Open-Meteo,
    /// reverse geocode, then the India bounding box.
    pub fn from_settings(settings: &Settings, cache: Arc<ResolutionCache>) -> Self {
        let agent = settings.http_agent();
        let mut resolver = Self::new(cache);
        if let Some(key) = &settings.locationiq_key {
            resolver = resolver.with_provider(LocationIqTimezone::new(agent.clone(), key.clone()));
        }
        resolver
            .with_provider(TimeApiTimezone::new(agent.clone()))
            .with_provider(OpenMeteoTimezone::new(agent.clone()))
            .with_provider(ReverseGeocodeTimezone::new(agent))
            .with_provider(IndiaBoundingBox)
    }

    pub fn with_provider(mut self, provider: impl TimezoneProvider + 'static) -> Self {
        self.chain.push(Box::new(provider));
        self
    }

    pub fn cache(&self) -> &Arc<ResolutionCache> {
        &self.cache
    }

    /// Resolve a coordinate pair. The cache is checked before any provider.
    pub fn resolve(&self, lat: f64, lon: f64) -> Result<TimezoneResult, LocationError> {
        let key = CoordinateKey::new(lat, lon);
        if !lat.is_finite() || !lon.is_finite() {
            return Err(LocationError::NotFound(key.to_string()));
        }

        if let Some(hit) = self.cache.get_zone(&key) {
            debug!(key = %key, "timezone cache hit");
            return Ok(hit);
        }

        for provider in &self.chain {
            match provider.timezone(lat, lon) {
                Ok(found) => {
                    info!(
                        key = %key,
                        provider = provider.name(),
                        tz = %found.timezone_id,
                        offset = %found.offset,
                        degraded = found.degraded,
                        "timezone resolved"
                    );
                    self.cache.put_zone(key, &found);
                    return Ok(found);
                }
                Err(e) => debug!(key = %key, provider = provider.name(), error = %e, "timezone provider failed"),
            }
        }

        warn!(key = %key, "every timezone provider failed");
        Err(LocationError::NotFound(key.to_string()))
    }
}
