//! # Sync Engine
//!
//! 轨迹拼接与帧时间同步。
//!
//! 负责：
//! - 按片段顺序拼接采样，丢弃重复与时间回退的采样
//! - 记录超过阈值的时间缺口
//! - 将输出帧时刻解析为精确、插值或无覆盖的位置
//! - 规划每个片段贡献的输出帧范围
//!
//! ## 使用示例
//!
//! ```ignore
//! use std::sync::Arc;
//! use sync_engine::{StitcherConfig, Synchronizer, Timeline, TrackStitcher};
//!
//! let stitcher = TrackStitcher::new(StitcherConfig::from_blueprint(&blueprint));
//! let stitched = stitcher.stitch("trip_front", per_segment_samples)?;
//!
//! let timeline = Timeline::plan(&stitched.track, &segments, 30.0, 0.0);
//! let sync = Synchronizer::new(Arc::new(stitched.track));
//! for (query, position) in sync.timeline(&timeline.clock) {
//!     // render frame `query.frame_index`
//! }
//! ```

pub mod geodesy;
mod stitcher;
mod synchronizer;
mod timeline;

pub use stitcher::{StitchReport, StitchedTrack, StitcherConfig, TrackStitcher};
pub use synchronizer::Synchronizer;
pub use timeline::{SegmentTiming, Timeline};
