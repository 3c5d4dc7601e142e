//! # Geo Client
//!
//! External mapping / geocoding collaborator.
//!
//! Responsibilities:
//! - Reverse geocode a coordinate to a place name (Nominatim)
//! - Fetch the sparse slippy-map tiles covering a track corridor
//! - Rate-limit outgoing requests and retry transient failures with backoff
//! - Provide a deterministic mock for tests and offline runs

pub mod config;
pub mod error;
pub mod mock;
pub mod osm;
pub mod throttle;

pub use config::{GeoClientConfig, RetryPolicy};
pub use contracts::GeoService;
pub use error::{GeoClientError, Result};
pub use mock::{MockGeoConfig, MockGeoService};
pub use osm::OsmGeoService;
pub use throttle::{retry_with_backoff, RateLimiter};
