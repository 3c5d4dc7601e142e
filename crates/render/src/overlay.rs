//! Overlay panel rendering
//!
//! Pure, deterministic rasterization of one frame's telemetry: the same
//! position, place name and clock always give byte-identical pixels.

use chrono::NaiveDateTime;
use contracts::{ImageData, OverlayConfig, OverlayVariant, ResolvedPosition, SpeedUnit};
use image::Rgba;

use crate::canvas::{Canvas, Color, TRANSPARENT, WHITE};
use crate::clock::DisplayClock;
use crate::font;

const DISK: Color = Rgba([30, 30, 30, 255]);
const SPEED_ARC: Color = Rgba([0, 200, 255, 180]);
const PANEL: Color = Rgba([0, 0, 0, 160]);
const NO_SIGNAL: Color = Rgba([255, 170, 0, 255]);

/// Arc start, degrees clockwise from the positive x axis
const ARC_START_DEG: f64 = 175.0;
const ARC_SWEEP_DEG: f64 = 190.0;
/// Speed at full sweep, in display units
const ARC_MAX_SPEED: f64 = 160.0;

/// Per-run panel layout
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OverlayLayout {
    pub variant: OverlayVariant,
    pub width: u32,
    pub height: u32,
    pub speed_unit: SpeedUnit,
}

impl OverlayLayout {
    pub fn from_config(overlay: &OverlayConfig) -> Self {
        Self {
            variant: overlay.variant,
            width: overlay.width,
            height: overlay.height,
            speed_unit: overlay.speed_unit,
        }
    }
}

/// Tachometer geometry derived once from the panel size
#[derive(Debug, Clone, Copy)]
struct Dial {
    cx: f64,
    cy: f64,
    radius: f64,
    arc_width: f64,
    small: u32,
    big: u32,
}

impl Dial {
    fn new(width: u32, height: u32) -> Self {
        let (w, h) = (f64::from(width), f64::from(height));
        Self {
            cx: f64::from(width / 2),
            cy: h * 0.9,
            radius: w.min(h * 1.8) * 0.45,
            arc_width: w * 0.04,
            small: text_scale(w / 40.0),
            big: text_scale(w / 14.0),
        }
    }

    fn angle_for(fraction: f64) -> f64 {
        (ARC_START_DEG + ARC_SWEEP_DEG * fraction).to_radians()
    }

    fn speed_text_y(&self) -> f64 {
        self.cy - self.radius * 0.4
    }
}

/// Integer glyph scale for a target text height in pixels
fn text_scale(px: f64) -> u32 {
    (px / f64::from(font::GLYPH_HEIGHT)).round().max(1.0) as u32
}

/// Renders overlay panels for one run
#[derive(Debug, Clone)]
pub struct OverlayRenderer {
    layout: OverlayLayout,
    clock: DisplayClock,
    dial: Dial,
    /// Disk with ticks and labels, shared by every tachometer frame
    background: Canvas,
    /// Tick layer pixels, drawn over the speed arc
    ticks: Vec<(u32, u32, Color)>,
}

impl OverlayRenderer {
    pub fn new(layout: OverlayLayout, clock: DisplayClock) -> Self {
        let dial = Dial::new(layout.width, layout.height);
        let mut background = Canvas::new(layout.width, layout.height, TRANSPARENT);
        background.fill_circle(dial.cx, dial.cy, dial.radius, DISK);

        let mut tick_layer = Canvas::new(layout.width, layout.height, TRANSPARENT);
        draw_ticks(&mut tick_layer, &dial, f64::from(layout.width));
        let ticks = collect_opaque(&tick_layer);
        for &(x, y, color) in &ticks {
            background.blend(i64::from(x), i64::from(y), color);
        }

        Self {
            layout,
            clock,
            dial,
            background,
            ticks,
        }
    }

    pub fn layout(&self) -> &OverlayLayout {
        &self.layout
    }

    /// Render the panel for one frame.
    ///
    /// `at` is the frame's query instant, shown on the no-signal panel.
    pub fn render(
        &self,
        position: &ResolvedPosition,
        at: NaiveDateTime,
        place: Option<&str>,
    ) -> ImageData {
        let canvas = match (position.fix(), self.layout.variant) {
            (Some(fix), OverlayVariant::Tachometer) => {
                let readout = Readout::new(fix, self.layout.speed_unit, place, &self.clock);
                self.tachometer(&readout)
            }
            (Some(fix), OverlayVariant::Compact) => {
                let readout = Readout::new(fix, self.layout.speed_unit, place, &self.clock);
                self.compact(&readout)
            }
            (None, OverlayVariant::Tachometer) => self.tachometer_no_signal(at),
            (None, OverlayVariant::Compact) => self.compact_no_signal(at),
        };
        canvas.into_image_data()
    }

    fn tachometer(&self, readout: &Readout) -> Canvas {
        let dial = &self.dial;
        let mut canvas = self.background.clone();

        let fraction = (readout.speed.max(0.0) / ARC_MAX_SPEED).min(1.0);
        if fraction > 0.0 {
            canvas.stroke_arc(
                dial.cx,
                dial.cy,
                dial.radius,
                dial.arc_width,
                ARC_START_DEG,
                ARC_SWEEP_DEG * fraction,
                SPEED_ARC,
            );
            // ticks stay on top of the arc
            for &(x, y, color) in &self.ticks {
                canvas.blend(i64::from(x), i64::from(y), color);
            }
        }

        let big_h = f64::from(font::text_height(dial.big));
        let speed_y = dial.speed_text_y();
        canvas.draw_text_centered(dial.cx, (speed_y - big_h / 2.0).round() as i64, &readout.speed_text, dial.big, WHITE);

        let small_h = i64::from(font::text_height(dial.small));
        let mut y = (speed_y + big_h + 10.0).round() as i64;
        for line in readout.info_lines() {
            canvas.draw_text_centered(dial.cx, y, line, dial.small, WHITE);
            y += small_h + 4;
        }

        let bottom = i64::from(self.layout.height) - small_h - 10;
        canvas.draw_text_centered(dial.cx, bottom, &readout.time, dial.small, WHITE);
        canvas
    }

    fn tachometer_no_signal(&self, at: NaiveDateTime) -> Canvas {
        let dial = &self.dial;
        let mut canvas = self.background.clone();
        let big_h = f64::from(font::text_height(dial.big));
        let y = (dial.speed_text_y() - big_h / 2.0).round() as i64;
        canvas.draw_text_centered(dial.cx, y, "NO SIGNAL", dial.big, NO_SIGNAL);

        let small_h = i64::from(font::text_height(dial.small));
        let bottom = i64::from(self.layout.height) - small_h - 10;
        canvas.draw_text_centered(dial.cx, bottom, &self.clock.format(at), dial.small, WHITE);
        canvas
    }

    fn compact(&self, readout: &Readout) -> Canvas {
        let mut lines = vec![readout.speed_text.as_str()];
        lines.extend(readout.info_lines());
        lines.push(&readout.time);
        self.text_panel(&lines, WHITE)
    }

    fn compact_no_signal(&self, at: NaiveDateTime) -> Canvas {
        let time = self.clock.format(at);
        self.text_panel(&["NO SIGNAL", time.as_str()], NO_SIGNAL)
    }

    /// Left-aligned text on a translucent panel; the first line is large
    fn text_panel(&self, lines: &[&str], headline: Color) -> Canvas {
        let (width, height) = (self.layout.width, self.layout.height);
        let mut canvas = Canvas::new(width, height, TRANSPARENT);
        canvas.fill_rect(0, 0, width, height, PANEL);

        let w = f64::from(width);
        let margin = (w * 0.04).round() as i64;
        let big = text_scale(w / 16.0);
        let small = text_scale(w / 32.0);

        let mut y = margin;
        for (index, line) in lines.iter().enumerate() {
            let (scale, color) = if index == 0 { (big, headline) } else { (small, WHITE) };
            canvas.draw_text(margin, y, line, scale, color);
            y += i64::from(font::text_height(scale)) + i64::from(scale) * 2;
        }
        canvas
    }
}

/// Text content of one covered frame
#[derive(Debug, Clone, PartialEq)]
struct Readout {
    speed: f64,
    speed_text: String,
    latitude: String,
    longitude: String,
    direction: String,
    place: String,
    time: String,
}

impl Readout {
    fn new(
        fix: &contracts::PositionFix,
        unit: SpeedUnit,
        place: Option<&str>,
        clock: &DisplayClock,
    ) -> Self {
        let sample = &fix.sample;
        let speed = sample.speed_in(unit).max(0.0);
        Self {
            speed,
            speed_text: format!("{:.0} {}", speed, unit.symbol()),
            latitude: hemisphere(sample.latitude, 'N', 'S'),
            longitude: hemisphere(sample.longitude, 'E', 'W'),
            direction: match fix.bearing {
                Some(bearing) => format!("Dir: {}°", bearing.floor() as i64 % 360),
                None => "Dir: --".to_string(),
            },
            place: place.unwrap_or_default().to_string(),
            // the sample's own time, not the frame instant
            time: clock.format(sample.timestamp),
        }
    }

    fn info_lines(&self) -> Vec<&str> {
        let mut lines = vec![
            self.latitude.as_str(),
            self.longitude.as_str(),
            self.direction.as_str(),
        ];
        if !self.place.is_empty() {
            lines.push(&self.place);
        }
        lines
    }
}

fn hemisphere(value: f64, positive: char, negative: char) -> String {
    let letter = if value < 0.0 { negative } else { positive };
    format!("{letter}: {:.5}", value.abs())
}

fn draw_ticks(canvas: &mut Canvas, dial: &Dial, width: f64) {
    for k in (0..=ARC_MAX_SPEED as u32).step_by(2) {
        let angle = Dial::angle_for(f64::from(k) / ARC_MAX_SPEED);
        let (cos, sin) = (angle.cos(), angle.sin());
        let major = k % 10 == 0;
        let (length, line_width) = if major { (width * 0.04, 3.0) } else { (width * 0.025, 2.0) };

        let inner = dial.radius - length;
        canvas.draw_line(
            dial.cx + inner * cos,
            dial.cy + inner * sin,
            dial.cx + dial.radius * cos,
            dial.cy + dial.radius * sin,
            line_width,
            WHITE,
        );

        if major {
            let label = k.to_string();
            let label_r = dial.radius - width * 0.07;
            let (tx, ty) = (dial.cx + label_r * cos, dial.cy + label_r * sin);
            let th = f64::from(font::text_height(dial.small));
            canvas.draw_text_centered(tx, (ty - th / 2.0).round() as i64, &label, dial.small, WHITE);
        }
    }
}

fn collect_opaque(canvas: &Canvas) -> Vec<(u32, u32, Color)> {
    canvas
        .image()
        .enumerate_pixels()
        .filter(|(_, _, pixel)| pixel[3] > 0)
        .map(|(x, y, pixel)| (x, y, *pixel))
        .collect()
}
