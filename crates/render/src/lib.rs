//! # Render
//!
//! 帧渲染：叠加层仪表盘与移动地图。
//!
//! - `overlay`: 速度表 / 紧凑文字面板，无信号时渲染 NO SIGNAL 变体
//! - `map_track`: 稀疏瓦片底图上的位置标记与尾迹，无覆盖时保持上一帧
//! - `geocode_cache`: 按坐标网格缓存地名，并发未命中合并为一次查询
//! - `generator`: 按 `FrameClock` 逐帧生成并通过有界通道发送
//!
//! 所有渲染都是确定性的：相同输入产生逐字节相同的像素。

pub mod canvas;
pub mod clock;
mod error;
pub mod font;
mod generator;
mod geocode_cache;
pub mod map_track;
pub mod overlay;

pub use clock::DisplayClock;
pub use error::{RenderError, Result};
pub use generator::{MapTrackGenerator, OverlayGenerator};
pub use geocode_cache::{CacheStats, GeocodeCache};
pub use map_track::{MapLayout, MapRenderer, MapTrackState};
pub use overlay::{OverlayLayout, OverlayRenderer};
