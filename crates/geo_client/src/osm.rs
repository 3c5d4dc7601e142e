//! OpenStreetMap geo service: Nominatim reverse geocoding and slippy-map tiles

use std::collections::BTreeMap;

use bytes::Bytes;
use contracts::{Basemap, BasemapRequest, ContractError, GeoService, ImageData, TileCoord};
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, instrument, warn};

use crate::config::GeoClientConfig;
use crate::error::{GeoClientError, Result};
use crate::throttle::{retry_with_backoff, RateLimiter};

/// Nominatim `zoom=10` answers at city level
const NOMINATIM_ZOOM: &str = "10";

#[derive(Debug, Deserialize)]
struct ReverseResponse {
    #[serde(default)]
    address: Option<Address>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct Address {
    city: Option<String>,
    town: Option<String>,
    village: Option<String>,
    hamlet: Option<String>,
    municipality: Option<String>,
}

impl Address {
    /// First non-empty of city, town, village, hamlet, municipality
    fn place_name(self) -> Option<String> {
        [
            self.city,
            self.town,
            self.village,
            self.hamlet,
            self.municipality,
        ]
        .into_iter()
        .flatten()
        .map(|name| name.trim().to_string())
        .find(|name| !name.is_empty())
    }
}

/// HTTP geo service backed by Nominatim and a tile server
#[derive(Debug)]
pub struct OsmGeoService {
    config: GeoClientConfig,
    client: Client,
    limiter: RateLimiter,
}

impl OsmGeoService {
    pub fn new(config: GeoClientConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| GeoClientError::Config {
                message: e.to_string(),
            })?;
        let limiter = RateLimiter::new(config.min_interval);
        Ok(Self {
            config,
            client,
            limiter,
        })
    }

    pub fn config(&self) -> &GeoClientConfig {
        &self.config
    }

    async fn get(&self, url: &str, query: &[(&str, &str)]) -> Result<Bytes> {
        self.limiter.acquire().await;
        let response = self
            .client
            .get(url)
            .query(query)
            .send()
            .await
            .map_err(|e| GeoClientError::transport(url, &e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(GeoClientError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }
        response
            .bytes()
            .await
            .map_err(|e| GeoClientError::transport(url, &e))
    }

    /// Reverse geocode without the contract error mapping
    pub async fn lookup_place(&self, lat: f64, lon: f64) -> Result<Option<String>> {
        if lat == 0.0 && lon == 0.0 {
            return Ok(None);
        }
        let url = format!("{}/reverse", self.config.nominatim_url);
        let (lat_s, lon_s) = (format!("{lat:.6}"), format!("{lon:.6}"));
        let query = [
            ("format", "jsonv2"),
            ("lat", lat_s.as_str()),
            ("lon", lon_s.as_str()),
            ("zoom", NOMINATIM_ZOOM),
            ("addressdetails", "1"),
        ];

        let body = retry_with_backoff(&self.config.retry, "reverse_geocode", || {
            self.get(&url, &query)
        })
        .await;
        metrics::counter!(
            "dashtrack_geo_requests_total",
            "kind" => "reverse_geocode",
            "status" => if body.is_ok() { "ok" } else { "error" }
        )
        .increment(1);

        let response: ReverseResponse = serde_json::from_slice(&body?)
            .map_err(|e| GeoClientError::decode(&url, e.to_string()))?;
        if let Some(error) = response.error {
            debug!(lat, lon, error = %error, "nominatim has no place");
            return Ok(None);
        }
        Ok(response.address.and_then(Address::place_name))
    }

    /// Fetch and decode one tile
    pub async fn fetch_tile(&self, zoom: u8, tile: TileCoord) -> Result<ImageData> {
        let url = self.config.tile_url_for(zoom, tile.x, tile.y);
        let body = retry_with_backoff(&self.config.retry, "fetch_tile", || self.get(&url, &[])).await;
        metrics::counter!(
            "dashtrack_geo_requests_total",
            "kind" => "tile",
            "status" => if body.is_ok() { "ok" } else { "error" }
        )
        .increment(1);

        let decoded = image::load_from_memory(&body?)
            .map_err(|e| GeoClientError::decode(&url, e.to_string()))?
            .to_rgba8();
        let (width, height) = decoded.dimensions();
        Ok(ImageData::rgba8(width, height, decoded.into_raw()))
    }
}

impl GeoService for OsmGeoService {
    fn name(&self) -> &str {
        "osm"
    }

    #[instrument(name = "osm_reverse_geocode", skip(self))]
    async fn reverse_geocode(
        &self,
        lat: f64,
        lon: f64,
    ) -> std::result::Result<Option<String>, ContractError> {
        self.lookup_place(lat, lon)
            .await
            .map_err(|e| ContractError::geocode_unavailable(e.to_string()))
    }

    #[instrument(
        name = "osm_fetch_basemap",
        skip(self, request),
        fields(zoom = request.zoom, corridor = request.corridor.len())
    )]
    async fn fetch_basemap(
        &self,
        request: &BasemapRequest,
    ) -> std::result::Result<Basemap, ContractError> {
        let projection = request
            .projection()
            .ok_or_else(|| ContractError::basemap_unavailable("empty track corridor"))?;

        let wanted = request.tiles();
        let mut tiles = BTreeMap::new();
        let mut last_error = None;
        for coord in &wanted {
            match self.fetch_tile(request.zoom, *coord).await {
                Ok(image) => {
                    tiles.insert(*coord, image);
                }
                Err(err) => {
                    warn!(x = coord.x, y = coord.y, error = %err, "tile unavailable");
                    last_error = Some(err);
                }
            }
        }

        if tiles.is_empty() {
            let reason = last_error.map_or_else(|| "no tiles".to_string(), |e| e.to_string());
            return Err(ContractError::basemap_unavailable(reason));
        }
        let missing_tiles = wanted.len() - tiles.len();
        debug!(fetched = tiles.len(), missing_tiles, "basemap fetched");
        Ok(Basemap {
            projection,
            tiles,
            missing_tiles,
        })
    }
}
