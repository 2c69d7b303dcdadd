//! Location subsystem: place names → coordinates, coordinates → UTC offset.
//!
//! Both resolvers walk an ordered chain of unreliable providers and share
//! one injectable in-memory cache.

pub mod cache;
pub mod offset;
pub mod providers;
pub mod resolver;
pub mod types;

pub use cache::ResolutionCache;
pub use offset::{current_offset_for_zone, format_offset, offset_for_zone_at, parse_offset};
pub use providers::{GeocodeProvider, IndiaBoundingBox, TimezoneProvider};
pub use resolver::{GeocodingResolver, TimezoneResolver};
pub use types::{CoordinateKey, GeoResult, LocationError, LocationSource, TimezoneResult};
