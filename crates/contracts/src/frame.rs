//! RenderedFrame - renderer output handed to sinks

use bytes::Bytes;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// 图像数据
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageData {
    /// 图像宽度
    pub width: u32,

    /// 图像高度
    pub height: u32,

    /// 像素格式
    pub format: ImageFormat,

    /// 原始像素数据 (行优先)
    pub data: Bytes,
}

impl ImageData {
    pub fn rgba8(width: u32, height: u32, data: impl Into<Bytes>) -> Self {
        Self {
            width,
            height,
            format: ImageFormat::Rgba8,
            data: data.into(),
        }
    }

    /// Expected byte length for the declared geometry
    pub fn expected_len(&self) -> usize {
        self.width as usize * self.height as usize * self.format.bytes_per_pixel()
    }
}

/// 图像格式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImageFormat {
    Rgb8,
    Rgba8,
}

impl ImageFormat {
    pub fn bytes_per_pixel(&self) -> usize {
        match self {
            Self::Rgb8 => 3,
            Self::Rgba8 => 4,
        }
    }
}

/// Which artifact a frame belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FrameKind {
    Overlay,
    Map,
}

impl FrameKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Overlay => "overlay",
            Self::Map => "map",
        }
    }
}

/// One rendered raster frame, immutable once produced
#[derive(Debug, Clone)]
pub struct RenderedFrame {
    pub session_id: String,
    pub kind: FrameKind,
    pub frame_index: u64,
    /// Query instant the frame was rendered for
    pub timestamp: NaiveDateTime,
    pub image: ImageData,
}
