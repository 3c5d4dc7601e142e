//! Geo service selection: the HTTP OpenStreetMap client, or the deterministic
//! offline service when the network must not be touched.

use contracts::{Basemap, BasemapRequest, ContractError, GeoConfig, GeoService};
use geo_client::{GeoClientConfig, MockGeoConfig, MockGeoService, OsmGeoService};
use tracing::info;

use crate::error::{self, CliError};

/// Runtime choice of geo collaborator
pub enum GeoBackend {
    Osm(OsmGeoService),
    /// Synthetic tiles, no place names
    Offline(MockGeoService),
}

impl GeoBackend {
    pub fn from_config(geo: &GeoConfig) -> error::Result<Self> {
        if geo.offline {
            info!("Using offline geo service, no place names or real map tiles");
            return Ok(Self::Offline(MockGeoService::with_config(MockGeoConfig {
                place_name: None,
                ..Default::default()
            })));
        }

        let client = OsmGeoService::new(GeoClientConfig::from_blueprint(geo))
            .map_err(|e| CliError::geo_service(e.to_string()))?;
        info!(
            nominatim = %geo.nominatim_url,
            tiles = %geo.tile_url,
            "Using OpenStreetMap geo service"
        );
        Ok(Self::Osm(client))
    }
}

impl GeoService for GeoBackend {
    fn name(&self) -> &str {
        match self {
            Self::Osm(service) => service.name(),
            Self::Offline(service) => service.name(),
        }
    }

    async fn reverse_geocode(&self, lat: f64, lon: f64) -> Result<Option<String>, ContractError> {
        match self {
            Self::Osm(service) => service.reverse_geocode(lat, lon).await,
            Self::Offline(service) => service.reverse_geocode(lat, lon).await,
        }
    }

    async fn fetch_basemap(&self, request: &BasemapRequest) -> Result<Basemap, ContractError> {
        match self {
            Self::Osm(service) => service.fetch_basemap(request).await,
            Self::Offline(service) => service.fetch_basemap(request).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_offline_backend_has_no_names() {
        let geo = GeoConfig {
            offline: true,
            ..Default::default()
        };
        let backend = GeoBackend::from_config(&geo).unwrap();
        assert_eq!(backend.name(), "mock");
        assert_eq!(backend.reverse_geocode(45.46, 9.19).await.unwrap(), None);

        let request = BasemapRequest::for_window(vec![(45.4642, 9.19)], 15, 480, 640);
        let basemap = backend.fetch_basemap(&request).await.unwrap();
        assert_eq!(basemap.tiles.len(), 15);
    }

    #[test]
    fn test_online_backend() {
        let backend = GeoBackend::from_config(&GeoConfig::default()).unwrap();
        assert!(matches!(backend, GeoBackend::Osm(_)));
    }
}
