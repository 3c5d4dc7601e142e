//! Moving-map frames
//!
//! Each frame crops a window of the sparse basemap centred on the current
//! position and draws a marker plus a fading trail. Frames without coverage
//! repeat the last rendered marker; before the first covered position, and
//! for positions off the basemap, an `N/A` placeholder is emitted so the
//! frame count always matches the clock.

use std::sync::Arc;

use contracts::{Basemap, BasemapRequest, ImageData, MapConfig, PositionFix, Track};
use image::Rgba;
use ringbuf::{traits::*, HeapRb};

use crate::canvas::{Canvas, Color, BLACK, WHITE};
use crate::font;

/// Fill for pixels without a delivered tile
pub const BASEMAP_FILL: Color = Rgba([128, 128, 128, 255]);
/// Placeholder background, 18% grey
pub const PLACEHOLDER_FILL: Color = Rgba([45, 45, 45, 255]);
const MARKER: Color = Rgba([0, 0, 255, 255]);

/// Per-run map window settings
#[derive(Debug, Clone, PartialEq)]
pub struct MapLayout {
    pub width: u32,
    pub height: u32,
    pub zoom: u8,
    pub trail_length: usize,
    pub marker_radius: u32,
    pub attribution: String,
}

impl MapLayout {
    pub fn from_config(map: &MapConfig) -> Self {
        Self {
            width: map.width,
            height: map.height,
            zoom: map.zoom,
            trail_length: map.trail_length,
            marker_radius: map.marker_radius,
            attribution: map.attribution.clone(),
        }
    }

    /// Tiles the basemap must cover for this track
    pub fn basemap_request(&self, track: &Track) -> BasemapRequest {
        let corridor = track
            .samples()
            .iter()
            .filter(|s| !s.is_null_fix())
            .map(|s| (s.latitude, s.longitude))
            .collect();
        BasemapRequest::for_window(corridor, self.zoom, self.width, self.height)
    }
}

/// Marker position in basemap grid pixels
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Marker {
    pub x: f64,
    pub y: f64,
    /// Degrees clockwise from north, None when stationary
    pub bearing: Option<f64>,
}

/// Stateless window renderer over one basemap
#[derive(Debug, Clone)]
pub struct MapRenderer {
    layout: MapLayout,
    basemap: Arc<Basemap>,
}

impl MapRenderer {
    pub fn new(layout: MapLayout, basemap: Arc<Basemap>) -> Self {
        Self { layout, basemap }
    }

    pub fn layout(&self) -> &MapLayout {
        &self.layout
    }

    /// Marker for a fix, None when it falls off the basemap
    pub fn locate(&self, fix: &PositionFix) -> Option<Marker> {
        let projection = &self.basemap.projection;
        let (x, y) = projection.project(fix.sample.latitude, fix.sample.longitude);
        projection.contains_pixel(x, y).then_some(Marker {
            x,
            y,
            bearing: fix.bearing,
        })
    }

    /// Window centred on `marker`, trail points oldest first
    pub fn render(&self, marker: &Marker, trail: &[(f64, f64)]) -> ImageData {
        let (width, height) = (self.layout.width, self.layout.height);
        let left = marker.x.round() as i64 - i64::from(width / 2);
        let top = marker.y.round() as i64 - i64::from(height / 2);

        let mut canvas = Canvas::new(width, height, BASEMAP_FILL);
        self.paint_tiles(&mut canvas, left, top);

        let (ox, oy) = (left as f64, top as f64);
        let count = trail.len();
        for (index, pair) in trail.windows(2).enumerate() {
            let ((x0, y0), (x1, y1)) = (pair[0], pair[1]);
            if x0 == x1 && y0 == y1 {
                continue;
            }
            // older segments fade out
            let alpha = 40 + (180 * (index + 1) / count.max(1)) as u8;
            canvas.draw_line(x0 - ox, y0 - oy, x1 - ox, y1 - oy, 4.0, Rgba([30, 90, 220, alpha]));
        }

        let (cx, cy) = (marker.x - ox, marker.y - oy);
        let radius = f64::from(self.layout.marker_radius);
        match marker.bearing {
            Some(bearing) => {
                // screen angle: 0 = +x, clockwise; north is up
                let angle = (bearing - 90.0).to_radians();
                let point = |offset: f64| {
                    (
                        cx + radius * (angle + offset).cos(),
                        cy + radius * (angle + offset).sin(),
                    )
                };
                canvas.fill_triangle([point(0.0), point(2.5), point(-2.5)], MARKER);
            }
            None => canvas.fill_circle(cx, cy, radius, MARKER),
        }

        self.draw_attribution(&mut canvas);
        canvas.into_image_data()
    }

    /// `N/A` frame for positions without a usable marker
    pub fn placeholder(&self) -> ImageData {
        placeholder(self.layout.width, self.layout.height)
    }

    fn paint_tiles(&self, canvas: &mut Canvas, left: i64, top: i64) {
        let projection = &self.basemap.projection;
        let size = i64::from(projection.tile_size);
        for y in 0..canvas.height() {
            let gy = top + i64::from(y);
            for x in 0..canvas.width() {
                let gx = left + i64::from(x);
                let Some(coord) = projection.tile_at_pixel(gx, gy) else {
                    continue;
                };
                let Some(tile) = self.basemap.tile(&coord) else {
                    continue;
                };
                let (tx, ty) = (gx.rem_euclid(size) as u32, gy.rem_euclid(size) as u32);
                if let Some(color) = tile_pixel(tile, tx, ty) {
                    canvas.put(i64::from(x), i64::from(y), color);
                }
            }
        }
    }

    fn draw_attribution(&self, canvas: &mut Canvas) {
        let text = &self.layout.attribution;
        if text.is_empty() {
            return;
        }
        let scale = 2;
        let x = i64::from(canvas.width()) - i64::from(font::text_width(text, scale)) - 10;
        let y = i64::from(canvas.height()) - i64::from(font::text_height(scale)) - 10;
        canvas.draw_text(x, y, text, scale, BLACK);
    }
}

/// RGBA pixel of a decoded tile, None outside its bounds
fn tile_pixel(tile: &ImageData, x: u32, y: u32) -> Option<Color> {
    if x >= tile.width || y >= tile.height {
        return None;
    }
    let bpp = tile.format.bytes_per_pixel();
    let offset = (y as usize * tile.width as usize + x as usize) * bpp;
    let p = tile.data.get(offset..offset + bpp)?;
    Some(match p {
        [r, g, b] => Rgba([*r, *g, *b, 255]),
        [r, g, b, a] => Rgba([*r, *g, *b, *a]),
        _ => return None,
    })
}

/// Grey `N/A` panel
pub fn placeholder(width: u32, height: u32) -> ImageData {
    let mut canvas = Canvas::new(width, height, PLACEHOLDER_FILL);
    let scale = ((40.0 / f64::from(font::GLYPH_HEIGHT)).round() as u32).max(1);
    let y = (i64::from(height) - i64::from(font::text_height(scale))) / 2;
    canvas.draw_text_centered(f64::from(width) / 2.0, y, "N/A", scale, WHITE);
    canvas.into_image_data()
}

/// Frame-by-frame state of the map artifact
pub struct MapTrackState {
    renderer: MapRenderer,
    trail: HeapRb<(f64, f64)>,
    held: Option<ImageData>,
}

impl MapTrackState {
    pub fn new(renderer: MapRenderer) -> Self {
        let capacity = renderer.layout.trail_length.max(1);
        Self {
            renderer,
            trail: HeapRb::new(capacity),
            held: None,
        }
    }

    /// Next frame for a resolved position, or for no coverage when `fix` is None
    pub fn next_frame(&mut self, fix: Option<&PositionFix>) -> ImageData {
        let Some(fix) = fix else {
            return match &self.held {
                Some(image) => image.clone(),
                None => self.renderer.placeholder(),
            };
        };
        let Some(marker) = self.renderer.locate(fix) else {
            return self.renderer.placeholder();
        };

        if self.renderer.layout.trail_length > 0 {
            self.trail.push_overwrite((marker.x, marker.y));
        }
        let points: Vec<(f64, f64)> = self.trail.iter().copied().collect();
        let image = self.renderer.render(&marker, &points);
        self.held = Some(image.clone());
        image
    }

    pub fn trail_len(&self) -> usize {
        self.trail.occupied_len()
    }
}
