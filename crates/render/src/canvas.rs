//! RGBA raster canvas with the few primitives the overlays need
//!
//! All drawing is integer-deterministic: no anti-aliasing, source-over
//! blending with 8-bit alpha.

use contracts::ImageData;
use image::{Rgba, RgbaImage};

use crate::font;

pub type Color = Rgba<u8>;

pub const TRANSPARENT: Color = Rgba([0, 0, 0, 0]);
pub const WHITE: Color = Rgba([255, 255, 255, 255]);
pub const BLACK: Color = Rgba([0, 0, 0, 255]);

#[derive(Debug, Clone)]
pub struct Canvas {
    image: RgbaImage,
}

impl Canvas {
    pub fn new(width: u32, height: u32, fill: Color) -> Self {
        Self {
            image: RgbaImage::from_pixel(width, height, fill),
        }
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn pixel(&self, x: u32, y: u32) -> Option<Color> {
        (x < self.width() && y < self.height()).then(|| *self.image.get_pixel(x, y))
    }

    pub fn image(&self) -> &RgbaImage {
        &self.image
    }

    pub fn into_image_data(self) -> ImageData {
        let (width, height) = self.image.dimensions();
        ImageData::rgba8(width, height, self.image.into_raw())
    }

    /// Source-over blend of one pixel, ignoring out-of-bounds writes
    pub fn blend(&mut self, x: i64, y: i64, color: Color) {
        if x < 0 || y < 0 || x >= i64::from(self.width()) || y >= i64::from(self.height()) {
            return;
        }
        let dst = self.image.get_pixel_mut(x as u32, y as u32);
        *dst = blend_over(*dst, color);
    }

    /// Overwrite one pixel
    pub fn put(&mut self, x: i64, y: i64, color: Color) {
        if x < 0 || y < 0 || x >= i64::from(self.width()) || y >= i64::from(self.height()) {
            return;
        }
        self.image.put_pixel(x as u32, y as u32, color);
    }

    pub fn fill_rect(&mut self, x: i64, y: i64, w: u32, h: u32, color: Color) {
        for yy in y..y + i64::from(h) {
            for xx in x..x + i64::from(w) {
                self.blend(xx, yy, color);
            }
        }
    }

    /// Filled disk; a pixel belongs to it when its centre lies within `radius`
    pub fn fill_circle(&mut self, cx: f64, cy: f64, radius: f64, color: Color) {
        let (x0, x1) = ((cx - radius).floor() as i64, (cx + radius).ceil() as i64);
        let (y0, y1) = ((cy - radius).floor() as i64, (cy + radius).ceil() as i64);
        let r2 = radius * radius;
        for y in y0..=y1 {
            for x in x0..=x1 {
                let (dx, dy) = (x as f64 + 0.5 - cx, y as f64 + 0.5 - cy);
                if dx * dx + dy * dy <= r2 {
                    self.blend(x, y, color);
                }
            }
        }
    }

    /// Ring segment between `radius - width` and `radius`.
    ///
    /// Angles are in degrees, clockwise from the positive x axis (screen
    /// coordinates, y down).
    pub fn stroke_arc(
        &mut self,
        cx: f64,
        cy: f64,
        radius: f64,
        width: f64,
        start_deg: f64,
        sweep_deg: f64,
        color: Color,
    ) {
        if sweep_deg <= 0.0 || width <= 0.0 {
            return;
        }
        let inner2 = (radius - width).max(0.0).powi(2);
        let outer2 = radius * radius;
        let (x0, x1) = ((cx - radius).floor() as i64, (cx + radius).ceil() as i64);
        let (y0, y1) = ((cy - radius).floor() as i64, (cy + radius).ceil() as i64);
        for y in y0..=y1 {
            for x in x0..=x1 {
                let (dx, dy) = (x as f64 + 0.5 - cx, y as f64 + 0.5 - cy);
                let d2 = dx * dx + dy * dy;
                if d2 < inner2 || d2 > outer2 {
                    continue;
                }
                let angle = dy.atan2(dx).to_degrees();
                if (angle - start_deg).rem_euclid(360.0) <= sweep_deg {
                    self.blend(x, y, color);
                }
            }
        }
    }

    /// Thick line as a capsule of half-width `width / 2`
    pub fn draw_line(&mut self, x0: f64, y0: f64, x1: f64, y1: f64, width: f64, color: Color) {
        let half = (width / 2.0).max(0.5);
        let (min_x, max_x) = (x0.min(x1) - half, x0.max(x1) + half);
        let (min_y, max_y) = (y0.min(y1) - half, y0.max(y1) + half);
        let (vx, vy) = (x1 - x0, y1 - y0);
        let len2 = vx * vx + vy * vy;

        for y in min_y.floor() as i64..=max_y.ceil() as i64 {
            for x in min_x.floor() as i64..=max_x.ceil() as i64 {
                let (px, py) = (x as f64 + 0.5, y as f64 + 0.5);
                let t = if len2 == 0.0 {
                    0.0
                } else {
                    (((px - x0) * vx + (py - y0) * vy) / len2).clamp(0.0, 1.0)
                };
                let (qx, qy) = (x0 + t * vx - px, y0 + t * vy - py);
                if qx * qx + qy * qy <= half * half {
                    self.blend(x, y, color);
                }
            }
        }
    }

    /// Filled triangle, pixel centres tested with edge functions
    pub fn fill_triangle(&mut self, points: [(f64, f64); 3], color: Color) {
        let [(ax, ay), (bx, by), (cx, cy)] = points;
        let area = (bx - ax) * (cy - ay) - (by - ay) * (cx - ax);
        if area == 0.0 {
            return;
        }
        let min_x = ax.min(bx).min(cx).floor() as i64;
        let max_x = ax.max(bx).max(cx).ceil() as i64;
        let min_y = ay.min(by).min(cy).floor() as i64;
        let max_y = ay.max(by).max(cy).ceil() as i64;

        for y in min_y..=max_y {
            for x in min_x..=max_x {
                let (px, py) = (x as f64 + 0.5, y as f64 + 0.5);
                let w0 = (bx - ax) * (py - ay) - (by - ay) * (px - ax);
                let w1 = (cx - bx) * (py - by) - (cy - by) * (px - bx);
                let w2 = (ax - cx) * (py - cy) - (ay - cy) * (px - cx);
                let inside = if area > 0.0 {
                    w0 >= 0.0 && w1 >= 0.0 && w2 >= 0.0
                } else {
                    w0 <= 0.0 && w1 <= 0.0 && w2 <= 0.0
                };
                if inside {
                    self.blend(x, y, color);
                }
            }
        }
    }

    /// Bitmap text with its top-left corner at (x, y)
    pub fn draw_text(&mut self, x: i64, y: i64, text: &str, scale: u32, color: Color) {
        let scale = scale.max(1);
        let step = i64::from(font::GLYPH_ADVANCE * scale);
        for (index, c) in text.chars().enumerate() {
            let bitmap = font::glyph(c);
            let gx = x + index as i64 * step;
            for col in 0..font::GLYPH_WIDTH {
                for row in 0..font::GLYPH_HEIGHT {
                    if font::is_set(&bitmap, col, row) {
                        self.fill_rect(
                            gx + i64::from(col * scale),
                            y + i64::from(row * scale),
                            scale,
                            scale,
                            color,
                        );
                    }
                }
            }
        }
    }

    /// Text horizontally centred on `cx`
    pub fn draw_text_centered(&mut self, cx: f64, y: i64, text: &str, scale: u32, color: Color) {
        let width = f64::from(font::text_width(text, scale.max(1)));
        self.draw_text((cx - width / 2.0).round() as i64, y, text, scale, color);
    }
}

/// Source-over compositing in straight (non-premultiplied) alpha
pub fn blend_over(dst: Color, src: Color) -> Color {
    let sa = u32::from(src[3]);
    if sa == 255 {
        return src;
    }
    if sa == 0 {
        return dst;
    }
    let da = u32::from(dst[3]);
    // out_a = sa + da * (1 - sa), scaled by 255
    let out_a = sa * 255 + da * (255 - sa);
    if out_a == 0 {
        return TRANSPARENT;
    }
    let mut out = [0u8; 4];
    for channel in 0..3 {
        let s = u32::from(src[channel]) * sa * 255;
        let d = u32::from(dst[channel]) * da * (255 - sa);
        out[channel] = ((s + d + out_a / 2) / out_a) as u8;
    }
    out[3] = ((out_a + 127) / 255) as u8;
    Rgba(out)
}
