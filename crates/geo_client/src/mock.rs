//! Mock 地理服务
//!
//! 用于测试的确定性实现：固定地名、合成瓦片、可注入失败、调用计数。

use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use contracts::{
    Basemap, BasemapRequest, ContractError, GeoService, ImageData, TileCoord, TILE_SIZE,
};
use tracing::instrument;

/// Mock 服务配置
#[derive(Debug, Clone)]
pub struct MockGeoConfig {
    /// 所有坐标返回的地名
    pub place_name: Option<String>,
    /// 地名查询总是失败
    pub fail_geocode: bool,
    /// 底图获取总是失败
    pub fail_basemap: bool,
    /// 不返回的瓦片
    pub missing_tiles: BTreeSet<TileCoord>,
    /// 每次地名查询的人为延迟
    pub geocode_delay: Duration,
}

impl Default for MockGeoConfig {
    fn default() -> Self {
        Self {
            place_name: Some("Milano".to_string()),
            fail_geocode: false,
            fail_basemap: false,
            missing_tiles: BTreeSet::new(),
            geocode_delay: Duration::ZERO,
        }
    }
}

/// Mock 地理服务
#[derive(Debug, Default)]
pub struct MockGeoService {
    config: MockGeoConfig,
    geocode_calls: AtomicUsize,
    basemap_calls: AtomicUsize,
}

impl MockGeoService {
    pub fn new() -> Self {
        Self::with_config(MockGeoConfig::default())
    }

    pub fn with_config(config: MockGeoConfig) -> Self {
        Self {
            config,
            geocode_calls: AtomicUsize::new(0),
            basemap_calls: AtomicUsize::new(0),
        }
    }

    /// 地名固定为 `name`
    pub fn with_place_name(name: impl Into<String>) -> Self {
        Self::with_config(MockGeoConfig {
            place_name: Some(name.into()),
            ..Default::default()
        })
    }

    /// 两类调用都失败
    pub fn unavailable() -> Self {
        Self::with_config(MockGeoConfig {
            fail_geocode: true,
            fail_basemap: true,
            ..Default::default()
        })
    }

    pub fn geocode_calls(&self) -> usize {
        self.geocode_calls.load(Ordering::SeqCst)
    }

    pub fn basemap_calls(&self) -> usize {
        self.basemap_calls.load(Ordering::SeqCst)
    }

    /// 合成瓦片：按坐标奇偶交替的两种底色
    pub fn synthetic_tile(coord: TileCoord) -> ImageData {
        let shade = if (coord.x + coord.y) % 2 == 0 {
            [236, 232, 220, 255]
        } else {
            [214, 226, 206, 255]
        };
        let pixels = (TILE_SIZE * TILE_SIZE) as usize;
        let data: Vec<u8> = shade.iter().copied().cycle().take(pixels * 4).collect();
        ImageData::rgba8(TILE_SIZE, TILE_SIZE, data)
    }
}

impl GeoService for MockGeoService {
    fn name(&self) -> &str {
        "mock"
    }

    #[instrument(name = "mock_reverse_geocode", skip(self))]
    async fn reverse_geocode(&self, lat: f64, lon: f64) -> Result<Option<String>, ContractError> {
        self.geocode_calls.fetch_add(1, Ordering::SeqCst);
        if !self.config.geocode_delay.is_zero() {
            tokio::time::sleep(self.config.geocode_delay).await;
        }
        if self.config.fail_geocode {
            return Err(ContractError::geocode_unavailable("mock failure"));
        }
        if lat == 0.0 && lon == 0.0 {
            return Ok(None);
        }
        Ok(self.config.place_name.clone())
    }

    #[instrument(name = "mock_fetch_basemap", skip(self, request), fields(zoom = request.zoom))]
    async fn fetch_basemap(&self, request: &BasemapRequest) -> Result<Basemap, ContractError> {
        self.basemap_calls.fetch_add(1, Ordering::SeqCst);
        if self.config.fail_basemap {
            return Err(ContractError::basemap_unavailable("mock failure"));
        }
        let projection = request
            .projection()
            .ok_or_else(|| ContractError::basemap_unavailable("empty track corridor"))?;

        let wanted = request.tiles();
        let tiles: BTreeMap<_, _> = wanted
            .iter()
            .filter(|coord| !self.config.missing_tiles.contains(*coord))
            .map(|&coord| (coord, Self::synthetic_tile(coord)))
            .collect();
        if tiles.is_empty() {
            return Err(ContractError::basemap_unavailable("all tiles missing"));
        }
        Ok(Basemap {
            projection,
            missing_tiles: wanted.len() - tiles.len(),
            tiles,
        })
    }
}
