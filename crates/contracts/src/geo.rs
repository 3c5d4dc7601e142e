//! Geo contracts: slippy-map projection, basemap, geocode cache keys and the
//! external mapping/geocoding capability.

use std::collections::{BTreeMap, BTreeSet};
use std::f64::consts::PI;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{ContractError, ImageData};

/// Slippy-map tile edge in pixels
pub const TILE_SIZE: u32 = 256;

/// Highest zoom level served by standard tile servers
pub const MAX_ZOOM: u8 = 19;

/// Slippy-map tile address at a fixed zoom
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TileCoord {
    pub x: u32,
    pub y: u32,
}

/// Fractional Web Mercator tile coordinates of a position
pub fn mercator_tile(lat: f64, lon: f64, zoom: u8) -> (f64, f64) {
    let n = f64::from(1u32 << zoom);
    let lat_rad = lat.clamp(-85.051_128, 85.051_128).to_radians();
    let x = (lon + 180.0) / 360.0 * n;
    let y = (1.0 - lat_rad.tan().asinh() / PI) / 2.0 * n;
    (x, y)
}

/// Tile containing a position
pub fn tile_for(lat: f64, lon: f64, zoom: u8) -> TileCoord {
    let max = (1u32 << zoom) - 1;
    let (x, y) = mercator_tile(lat, lon, zoom);
    TileCoord {
        x: (x.floor().max(0.0) as u32).min(max),
        y: (y.floor().max(0.0) as u32).min(max),
    }
}

/// Fixed geographic-to-pixel transform over a rectangular tile grid
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TileProjection {
    pub zoom: u8,
    pub tile_size: u32,
    /// Top-left tile of the grid
    pub origin: TileCoord,
    pub columns: u32,
    pub rows: u32,
}

impl TileProjection {
    /// Pixel position relative to the grid's top-left corner
    pub fn project(&self, lat: f64, lon: f64) -> (f64, f64) {
        let (tx, ty) = mercator_tile(lat, lon, self.zoom);
        let size = f64::from(self.tile_size);
        (
            (tx - f64::from(self.origin.x)) * size,
            (ty - f64::from(self.origin.y)) * size,
        )
    }

    pub fn width_px(&self) -> u32 {
        self.columns * self.tile_size
    }

    pub fn height_px(&self) -> u32 {
        self.rows * self.tile_size
    }

    pub fn contains_pixel(&self, x: f64, y: f64) -> bool {
        x >= 0.0 && y >= 0.0 && x < f64::from(self.width_px()) && y < f64::from(self.height_px())
    }

    /// Tile covering grid pixel (x, y)
    pub fn tile_at_pixel(&self, x: i64, y: i64) -> Option<TileCoord> {
        if x < 0 || y < 0 {
            return None;
        }
        let size = i64::from(self.tile_size);
        let (col, row) = (x / size, y / size);
        if col >= i64::from(self.columns) || row >= i64::from(self.rows) {
            return None;
        }
        Some(TileCoord {
            x: self.origin.x + col as u32,
            y: self.origin.y + row as u32,
        })
    }
}

/// What the map generator asks the geo collaborator for
#[derive(Debug, Clone, PartialEq)]
pub struct BasemapRequest {
    pub zoom: u8,
    /// Track positions (lat, lon) the basemap must cover
    pub corridor: Vec<(f64, f64)>,
    /// Extra tiles on each side of every corridor tile
    pub margin_x: u32,
    pub margin_y: u32,
}

impl BasemapRequest {
    /// Corridor wide enough to crop a `window_w` x `window_h` view centred on any point
    pub fn for_window(corridor: Vec<(f64, f64)>, zoom: u8, window_w: u32, window_h: u32) -> Self {
        Self {
            zoom,
            corridor,
            margin_x: window_w.div_ceil(2 * TILE_SIZE),
            margin_y: window_h.div_ceil(2 * TILE_SIZE),
        }
    }

    /// Every tile needed, deduplicated and ordered
    pub fn tiles(&self) -> BTreeSet<TileCoord> {
        let max = i64::from((1u32 << self.zoom) - 1);
        let mut centers = BTreeSet::new();
        for &(lat, lon) in &self.corridor {
            centers.insert(tile_for(lat, lon, self.zoom));
        }

        let (mx, my) = (i64::from(self.margin_x), i64::from(self.margin_y));
        let mut tiles = BTreeSet::new();
        for center in centers {
            for dx in -mx..=mx {
                for dy in -my..=my {
                    let x = i64::from(center.x) + dx;
                    let y = i64::from(center.y) + dy;
                    if (0..=max).contains(&x) && (0..=max).contains(&y) {
                        tiles.insert(TileCoord {
                            x: x as u32,
                            y: y as u32,
                        });
                    }
                }
            }
        }
        tiles
    }

    /// Smallest grid enclosing all requested tiles
    pub fn projection(&self) -> Option<TileProjection> {
        let tiles = self.tiles();
        let min_x = tiles.iter().map(|t| t.x).min()?;
        let max_x = tiles.iter().map(|t| t.x).max()?;
        let min_y = tiles.iter().map(|t| t.y).min()?;
        let max_y = tiles.iter().map(|t| t.y).max()?;
        Some(TileProjection {
            zoom: self.zoom,
            tile_size: TILE_SIZE,
            origin: TileCoord { x: min_x, y: min_y },
            columns: max_x - min_x + 1,
            rows: max_y - min_y + 1,
        })
    }
}

/// Sparse tiled basemap: only corridor tiles are held, the rest renders as fill
#[derive(Debug, Clone)]
pub struct Basemap {
    pub projection: TileProjection,
    pub tiles: BTreeMap<TileCoord, ImageData>,
    /// Tiles requested but not delivered
    pub missing_tiles: usize,
}

impl Basemap {
    pub fn tile(&self, coord: &TileCoord) -> Option<&ImageData> {
        self.tiles.get(coord)
    }
}

/// Quantized coordinate cell used as a geocode cache key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CellKey {
    pub lat_index: i64,
    pub lon_index: i64,
}

impl CellKey {
    pub fn quantize(lat: f64, lon: f64, cell_deg: f64) -> Self {
        Self {
            lat_index: (lat / cell_deg).floor() as i64,
            lon_index: (lon / cell_deg).floor() as i64,
        }
    }

    /// Cell centre, the coordinate actually sent to the geocoder
    pub fn center(&self, cell_deg: f64) -> (f64, f64) {
        (
            (self.lat_index as f64 + 0.5) * cell_deg,
            (self.lon_index as f64 + 0.5) * cell_deg,
        )
    }
}

/// Cached reverse-geocode answer for one cell
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeocodeCacheEntry {
    pub cell: CellKey,
    /// None when the service had no name or stayed unavailable
    pub place_name: Option<String>,
    pub fetched_at: DateTime<Utc>,
}

/// External mapping / geocoding capability
#[trait_variant::make(GeoService: Send)]
pub trait LocalGeoService {
    /// Service name (used for logging)
    fn name(&self) -> &str;

    /// Human place name for a coordinate, `None` when the service knows none
    ///
    /// # Errors
    /// `GeocodeUnavailable` after the implementation gave up retrying
    async fn reverse_geocode(&self, lat: f64, lon: f64) -> Result<Option<String>, ContractError>;

    /// Fetch the tiles of a basemap request
    ///
    /// # Errors
    /// `BasemapUnavailable` when no usable basemap can be produced
    async fn fetch_basemap(&self, request: &BasemapRequest) -> Result<Basemap, ContractError>;
}
