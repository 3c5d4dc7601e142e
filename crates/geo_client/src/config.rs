//! Geo client settings

use std::time::Duration;

use contracts::GeoConfig;

/// Settings of the HTTP geo service
#[derive(Debug, Clone, PartialEq)]
pub struct GeoClientConfig {
    /// Nominatim base URL, without the `/reverse` path
    pub nominatim_url: String,
    /// Tile URL template with `{z}`, `{x}` and `{y}`
    pub tile_url: String,
    pub user_agent: String,
    pub timeout: Duration,
    /// Minimum spacing between two outgoing requests
    pub min_interval: Duration,
    pub retry: RetryPolicy,
}

impl Default for GeoClientConfig {
    fn default() -> Self {
        Self::from_blueprint(&GeoConfig::default())
    }
}

impl GeoClientConfig {
    pub fn from_blueprint(geo: &GeoConfig) -> Self {
        Self {
            nominatim_url: geo.nominatim_url.trim_end_matches('/').to_string(),
            tile_url: geo.tile_url.clone(),
            user_agent: geo.user_agent.clone(),
            timeout: Duration::from_secs(geo.timeout_s),
            min_interval: Duration::from_millis(geo.min_interval_ms),
            retry: RetryPolicy {
                max_retries: geo.max_retries,
                base_delay: Duration::from_millis(geo.backoff_ms),
                max_delay: Duration::from_millis(geo.max_backoff_ms),
            },
        }
    }

    /// Concrete tile URL
    pub fn tile_url_for(&self, zoom: u8, x: u32, y: u32) -> String {
        self.tile_url
            .replace("{z}", &zoom.to_string())
            .replace("{x}", &x.to_string())
            .replace("{y}", &y.to_string())
    }
}

/// Bounded retries with exponential backoff
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl RetryPolicy {
    /// Delay before retry number `attempt` (0-based)
    pub fn delay(&self, attempt: u32) -> Duration {
        let factor = 1u32.checked_shl(attempt).unwrap_or(u32::MAX);
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }
}
