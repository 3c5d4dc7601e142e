//! 逆地理编码缓存
//!
//! 以量化坐标格为键，整个运行期内共享：
//! - 命中直接返回
//! - 未命中时每个格子只发出一次外部查询，并发请求在 `OnceCell` 上合并
//! - 查询失败记为无地名，本次运行内不再重试

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::Utc;
use contracts::{CellKey, GeoService, GeocodeCacheEntry};
use parking_lot::Mutex;
use tokio::sync::OnceCell;
use tracing::{debug, warn};

/// 缓存统计
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub lookups: u64,
    /// 实际发出的外部查询
    pub misses: u64,
    pub failures: u64,
}

impl CacheStats {
    pub fn hits(&self) -> u64 {
        self.lookups - self.misses
    }
}

#[derive(Debug)]
pub struct GeocodeCache {
    cell_deg: f64,
    cells: Mutex<HashMap<CellKey, Arc<OnceCell<GeocodeCacheEntry>>>>,
    lookups: AtomicU64,
    misses: AtomicU64,
    failures: AtomicU64,
}

impl GeocodeCache {
    pub fn new(cell_deg: f64) -> Self {
        Self {
            cell_deg,
            cells: Mutex::new(HashMap::new()),
            lookups: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            failures: AtomicU64::new(0),
        }
    }

    pub fn cell_deg(&self) -> f64 {
        self.cell_deg
    }

    pub fn key(&self, lat: f64, lon: f64) -> CellKey {
        CellKey::quantize(lat, lon, self.cell_deg)
    }

    /// 地名查询，必要时调用外部服务
    pub async fn place_name<G: GeoService + Sync>(&self, geo: &G, lat: f64, lon: f64) -> Option<String> {
        self.lookups.fetch_add(1, Ordering::Relaxed);
        let key = self.key(lat, lon);
        let cell = Arc::clone(self.cells.lock().entry(key).or_default());

        let entry = cell
            .get_or_init(|| async {
                self.misses.fetch_add(1, Ordering::Relaxed);
                metrics::counter!("dashtrack_geocode_cache_total", "result" => "miss").increment(1);
                let (center_lat, center_lon) = key.center(self.cell_deg);
                let place_name = match geo.reverse_geocode(center_lat, center_lon).await {
                    Ok(name) => name,
                    Err(err) => {
                        self.failures.fetch_add(1, Ordering::Relaxed);
                        warn!(
                            lat = center_lat,
                            lon = center_lon,
                            service = geo.name(),
                            error = %err,
                            "reverse geocode unavailable, cell left blank"
                        );
                        None
                    }
                };
                debug!(?key, place = ?place_name, "geocode cell resolved");
                GeocodeCacheEntry {
                    cell: key,
                    place_name,
                    fetched_at: Utc::now(),
                }
            })
            .await;
        entry.place_name.clone()
    }

    /// 已缓存的条目，不触发查询
    pub fn peek(&self, lat: f64, lon: f64) -> Option<GeocodeCacheEntry> {
        let key = self.key(lat, lon);
        self.cells
            .lock()
            .get(&key)
            .and_then(|cell| cell.get().cloned())
    }

    /// 已解析的格子数
    pub fn len(&self) -> usize {
        self.cells
            .lock()
            .values()
            .filter(|cell| cell.initialized())
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            lookups: self.lookups.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            failures: self.failures.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo_client::{MockGeoConfig, MockGeoService};
    use std::time::Duration;

    #[tokio::test]
    async fn same_cell_hits_cache() {
        let geo = MockGeoService::with_place_name("Milano");
        let cache = GeocodeCache::new(0.01);

        assert_eq!(cache.place_name(&geo, 45.4642, 9.1950).await.as_deref(), Some("Milano"));
        assert_eq!(cache.place_name(&geo, 45.4688, 9.1999).await.as_deref(), Some("Milano"));
        assert_eq!(geo.geocode_calls(), 1);

        let stats = cache.stats();
        assert_eq!((stats.lookups, stats.misses, stats.hits()), (2, 1, 1));
        assert_eq!(cache.len(), 1);
        assert!(cache.peek(45.4642, 9.1950).is_some());
        assert!(cache.peek(46.0, 9.0).is_none());
    }

    #[tokio::test]
    async fn concurrent_misses_coalesce() {
        let geo = MockGeoService::with_config(MockGeoConfig {
            geocode_delay: Duration::from_millis(20),
            ..Default::default()
        });
        let cache = GeocodeCache::new(0.01);

        let (a, b, c) = tokio::join!(
            cache.place_name(&geo, 45.4642, 9.1950),
            cache.place_name(&geo, 45.4650, 9.1960),
            cache.place_name(&geo, 45.4660, 9.1970),
        );
        assert_eq!(a, b);
        assert_eq!(b, c);
        assert_eq!(geo.geocode_calls(), 1);
    }

    #[tokio::test]
    async fn failures_cached_as_blank() {
        let geo = MockGeoService::unavailable();
        let cache = GeocodeCache::new(0.01);

        assert_eq!(cache.place_name(&geo, 45.0, 9.0).await, None);
        assert_eq!(cache.place_name(&geo, 45.0, 9.0).await, None);
        assert_eq!(geo.geocode_calls(), 1);
        assert_eq!(cache.stats().failures, 1);
    }

    #[tokio::test]
    async fn distinct_cells_query_separately() {
        let geo = MockGeoService::new();
        let cache = GeocodeCache::new(0.01);
        cache.place_name(&geo, 45.00, 9.00).await;
        cache.place_name(&geo, 45.02, 9.00).await;
        assert_eq!(geo.geocode_calls(), 2);
        assert_eq!(cache.len(), 2);
    }
}
