//! Birth-event resolution and planetary-period selection.
//!
//! A free-text birth place becomes coordinates, coordinates become a UTC
//! offset, and a computed chart document yields the facts a report needs,
//! including the currently active major and sub period.

pub mod birth;
pub mod config;
pub mod facts;
pub mod location;
pub mod period;
pub mod server;
