//! PngSequenceSink - writes frames as numbered PNG files
//!
//! Layout: `<base_path>/<session_id>/<kind>/<frame_index:06>.png`

use contracts::{ContractError, FrameKind, FrameSink, ImageData, ImageFormat, RenderedFrame};
use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, error, instrument};

/// Frame file name inside a kind directory
pub fn frame_file_name(frame_index: u64) -> String {
    format!("{frame_index:06}.png")
}

/// Sequence pattern relative to the session directory, printf style
pub fn frame_pattern(kind: FrameKind) -> String {
    format!("{}/%06d.png", kind.as_str())
}

/// Configuration for PngSequenceSink
#[derive(Debug, Clone)]
pub struct PngSinkConfig {
    /// Base output directory
    pub base_path: PathBuf,
}

impl PngSinkConfig {
    /// Create config from params map, `base_path` defaults to `default_base`
    pub fn from_params(params: &HashMap<String, String>, default_base: &Path) -> Self {
        let base_path = params
            .get("base_path")
            .map(PathBuf::from)
            .unwrap_or_else(|| default_base.to_path_buf());

        Self { base_path }
    }
}

/// Sink that writes every frame to disk
pub struct PngSequenceSink {
    name: String,
    config: PngSinkConfig,
    created_dirs: HashSet<PathBuf>,
    written: u64,
}

impl PngSequenceSink {
    pub fn new(name: impl Into<String>, config: PngSinkConfig) -> std::io::Result<Self> {
        fs::create_dir_all(&config.base_path)?;

        Ok(Self {
            name: name.into(),
            config,
            created_dirs: HashSet::new(),
            written: 0,
        })
    }

    /// Create from params map (for factory)
    pub fn from_params(
        name: impl Into<String>,
        params: &HashMap<String, String>,
        default_base: &Path,
    ) -> std::io::Result<Self> {
        let config = PngSinkConfig::from_params(params, default_base);
        Self::new(name, config)
    }

    /// Path a frame is written to
    pub fn frame_path(&self, frame: &RenderedFrame) -> PathBuf {
        self.config
            .base_path
            .join(&frame.session_id)
            .join(frame.kind.as_str())
            .join(frame_file_name(frame.frame_index))
    }

    fn write_frame_to_disk(&mut self, frame: &RenderedFrame) -> std::io::Result<()> {
        let path = self.frame_path(frame);
        if let Some(dir) = path.parent() {
            if !self.created_dirs.contains(dir) {
                fs::create_dir_all(dir)?;
                self.created_dirs.insert(dir.to_path_buf());
            }
        }
        save_image(&path, &frame.image)
    }

    fn persist_frame(&mut self, frame: &RenderedFrame) -> Result<(), ContractError> {
        self.write_frame_to_disk(frame).map_err(|e| {
            error!(
                sink = %self.name,
                frame_index = frame.frame_index,
                error = %e,
                "Write failed"
            );
            ContractError::sink_write(&self.name, e.to_string())
        })?;
        self.written += 1;
        Ok(())
    }
}

fn save_image(path: &Path, image: &ImageData) -> std::io::Result<()> {
    if image.data.len() != image.expected_len() {
        return Err(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            format!(
                "{}x{} image carries {} bytes, expected {}",
                image.width,
                image.height,
                image.data.len(),
                image.expected_len()
            ),
        ));
    }
    let color = match image.format {
        ImageFormat::Rgb8 => image::ColorType::Rgb8,
        ImageFormat::Rgba8 => image::ColorType::Rgba8,
    };
    image::save_buffer(path, &image.data, image.width, image.height, color)
        .map_err(std::io::Error::other)
}

impl FrameSink for PngSequenceSink {
    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(
        name = "png_sink_write",
        skip(self, frame),
        fields(sink = %self.name, session = %frame.session_id, frame_index = frame.frame_index)
    )]
    async fn write(&mut self, frame: &RenderedFrame) -> Result<(), ContractError> {
        self.persist_frame(frame)
    }

    #[instrument(name = "png_sink_flush", skip(self))]
    async fn flush(&mut self) -> Result<(), ContractError> {
        Ok(())
    }

    #[instrument(name = "png_sink_close", skip(self))]
    async fn close(&mut self) -> Result<(), ContractError> {
        debug!(sink = %self.name, frames = self.written, "PngSequenceSink closed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_frame;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_png_sink_write() {
        let dir = tempdir().unwrap();
        let config = PngSinkConfig {
            base_path: dir.path().to_path_buf(),
        };

        let mut sink = PngSequenceSink::new("frames", config).unwrap();
        let mut frame = test_frame(7);
        sink.write(&frame).await.unwrap();
        frame.kind = FrameKind::Map;
        sink.write(&frame).await.unwrap();
        sink.flush().await.unwrap();

        let overlay = dir.path().join("trip_front/overlay/000007.png");
        assert!(overlay.exists());
        assert!(dir.path().join("trip_front/map/000007.png").exists());

        let decoded = image::open(&overlay).unwrap().to_rgba8();
        assert_eq!(decoded.dimensions(), (4, 2));
        assert_eq!(decoded.get_pixel(0, 0).0, [10, 20, 30, 255]);
    }

    #[tokio::test]
    async fn test_short_buffer_is_write_error() {
        let dir = tempdir().unwrap();
        let mut sink = PngSequenceSink::from_params("frames", &HashMap::new(), dir.path()).unwrap();
        let mut frame = test_frame(0);
        frame.image = ImageData::rgba8(4, 2, vec![0u8; 5]);

        let err = sink.write(&frame).await.unwrap_err();
        assert!(matches!(err, ContractError::SinkWrite { .. }));
    }

    #[test]
    fn test_patterns() {
        assert_eq!(frame_file_name(42), "000042.png");
        assert_eq!(frame_pattern(FrameKind::Overlay), "overlay/%06d.png");
    }
}
