//! GPX 1.1 export of a stitched track
//!
//! One `<trk>` per source segment. Device timestamps are local wall-clock
//! time and are converted to UTC with the device timezone.

use std::fs;
use std::path::Path;

use chrono::{NaiveDateTime, TimeZone, Utc};
use chrono_tz::Tz;
use contracts::{TelemetrySample, Track};
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;
use tracing::{debug, instrument};

use crate::error::{DispatcherError, Result};

pub const GPX_CREATOR: &str = "dashtrack";
const GPX_NS: &str = "http://www.topografix.com/GPX/1/1";
const XSI_NS: &str = "http://www.w3.org/2001/XMLSchema-instance";
const SCHEMA_LOCATION: &str =
    "http://www.topografix.com/GPX/1/1 http://www.topografix.com/GPX/1/1/gpx.xsd";

struct GpxWriter {
    inner: Writer<Vec<u8>>,
}

impl GpxWriter {
    fn new() -> Self {
        Self {
            inner: Writer::new_with_indent(Vec::new(), b' ', 4),
        }
    }

    fn event(&mut self, event: Event<'_>) -> std::io::Result<()> {
        self.inner.write_event(event).map_err(std::io::Error::other)
    }

    fn start(&mut self, element: BytesStart<'_>) -> std::io::Result<()> {
        self.event(Event::Start(element))
    }

    fn end(&mut self, name: &str) -> std::io::Result<()> {
        self.event(Event::End(BytesEnd::new(name)))
    }

    fn text_element(&mut self, name: &str, text: &str) -> std::io::Result<()> {
        self.start(BytesStart::new(name))?;
        self.event(Event::Text(BytesText::new(text)))?;
        self.end(name)
    }

    fn into_string(self) -> std::io::Result<String> {
        String::from_utf8(self.inner.into_inner()).map_err(std::io::Error::other)
    }
}

fn to_utc(at: NaiveDateTime, device_tz: Tz) -> String {
    let utc = device_tz
        .from_local_datetime(&at)
        .earliest()
        .map(|local| local.with_timezone(&Utc))
        .unwrap_or_else(|| Utc.from_utc_datetime(&at));
    utc.format("%Y-%m-%dT%H:%M:%SZ").to_string()
}

fn write_point(w: &mut GpxWriter, sample: &TelemetrySample, device_tz: Tz) -> std::io::Result<()> {
    let mut trkpt = BytesStart::new("trkpt");
    trkpt.push_attribute(("lat", sample.latitude.to_string().as_str()));
    trkpt.push_attribute(("lon", sample.longitude.to_string().as_str()));
    w.start(trkpt)?;

    w.text_element("time", &to_utc(sample.timestamp, device_tz))?;
    w.text_element("geoidheight", &sample.altitude.to_string())?;
    w.text_element("sat", &sample.satellites.to_string())?;
    w.text_element("hdop", &sample.hdop.to_string())?;

    w.start(BytesStart::new("extensions"))?;
    w.text_element(
        "speed",
        &format!("{} {}", sample.speed, sample.speed_unit.symbol()),
    )?;
    let mut accel = BytesStart::new("accelerometer");
    accel.push_attribute(("x", sample.accel.x.to_string().as_str()));
    accel.push_attribute(("y", sample.accel.y.to_string().as_str()));
    accel.push_attribute(("z", sample.accel.z.to_string().as_str()));
    w.event(Event::Empty(accel))?;
    w.end("extensions")?;

    w.end("trkpt")
}

/// GPX document for `track`; `segment_files[i]` names segment `i`
pub fn render_gpx(track: &Track, segment_files: &[String], device_tz: Tz) -> std::io::Result<String> {
    let mut w = GpxWriter::new();
    w.event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;

    let mut gpx = BytesStart::new("gpx");
    gpx.push_attribute(("version", "1.1"));
    gpx.push_attribute(("creator", GPX_CREATOR));
    gpx.push_attribute(("xmlns", GPX_NS));
    gpx.push_attribute(("xmlns:xsi", XSI_NS));
    gpx.push_attribute(("xsi:schemaLocation", SCHEMA_LOCATION));
    w.start(gpx)?;

    w.start(BytesStart::new("metadata"))?;
    w.text_element("name", track.session_id())?;
    w.end("metadata")?;

    for (number, (segment, samples)) in track.segments().enumerate() {
        let src = segment_files
            .get(segment as usize)
            .cloned()
            .unwrap_or_else(|| format!("segment-{segment}"));

        w.start(BytesStart::new("trk"))?;
        w.text_element("src", &src)?;
        w.text_element("number", &number.to_string())?;
        w.start(BytesStart::new("trkseg"))?;
        for sample in samples {
            write_point(&mut w, sample, device_tz)?;
        }
        w.end("trkseg")?;
        w.end("trk")?;
    }

    w.end("gpx")?;
    let mut text = w.into_string()?;
    text.push('\n');
    Ok(text)
}

/// Write `track.gpx` to `path`
#[instrument(name = "write_gpx", skip(track, segment_files), fields(session = %track.session_id(), samples = track.len()))]
pub fn write_gpx(path: &Path, track: &Track, segment_files: &[String], device_tz: Tz) -> Result<()> {
    let text = render_gpx(track, segment_files, device_tz)
        .map_err(|e| DispatcherError::artifact(path, e))?;
    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir)?;
    }
    fs::write(path, text).map_err(|e| DispatcherError::artifact(path, e))?;
    debug!(path = %path.display(), "gpx written");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, TimeDelta};
    use contracts::{SpeedUnit, Vector3};
    use tempfile::tempdir;

    fn sample(secs: i64, segment: u32) -> TelemetrySample {
        TelemetrySample {
            timestamp: NaiveDate::from_ymd_opt(2025, 9, 17)
                .unwrap()
                .and_hms_opt(10, 0, 0)
                .unwrap()
                + TimeDelta::seconds(secs),
            latitude: 45.46421,
            longitude: -9.19001,
            speed: 42.5,
            speed_unit: SpeedUnit::KilometersPerHour,
            hdop: 0.9,
            altitude: 122.3,
            satellites: 9,
            accel: Vector3 {
                x: 0.01,
                y: -0.02,
                z: 0.98,
            },
            segment,
        }
    }

    fn track() -> Track {
        let samples = vec![sample(0, 0), sample(1, 0), sample(2, 1)];
        Track::new("trip_front", samples, TimeDelta::seconds(5)).unwrap()
    }

    #[test]
    fn one_trk_per_segment() {
        let files = vec!["0001_F.ts".to_string(), "0002_F.ts".to_string()];
        let gpx = render_gpx(&track(), &files, chrono_tz::Europe::Rome).unwrap();

        assert!(gpx.starts_with("<?xml version=\"1.0\" encoding=\"UTF-8\"?>"));
        assert!(gpx.contains(r#"creator="dashtrack""#));
        assert_eq!(gpx.matches("<trk>").count(), 2);
        assert_eq!(gpx.matches("<trkpt ").count(), 3);
        assert!(gpx.contains("<src>0002_F.ts</src>"));
        assert!(gpx.contains("<number>1</number>"));
        // 10:00 CEST is 08:00 UTC
        assert!(gpx.contains("<time>2025-09-17T08:00:00Z</time>"));
        assert!(gpx.contains(r#"lat="45.46421" lon="-9.19001""#));
        assert!(gpx.contains("<speed>42.5 km/h</speed>"));
        assert!(gpx.contains(r#"<accelerometer x="0.01" y="-0.02" z="0.98"/>"#));
        assert!(gpx.contains("<geoidheight>122.3</geoidheight>"));
    }

    #[test]
    fn unknown_segment_gets_generated_name() {
        let gpx = render_gpx(&track(), &[], chrono_tz::UTC).unwrap();
        assert!(gpx.contains("<src>segment-1</src>"));
        assert!(gpx.contains("<time>2025-09-17T10:00:00Z</time>"));
    }

    #[test]
    fn writes_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("trip_front/track.gpx");
        write_gpx(&path, &track(), &[], chrono_tz::UTC).unwrap();
        assert!(std::fs::read_to_string(path).unwrap().contains("<gpx "));
    }
}
