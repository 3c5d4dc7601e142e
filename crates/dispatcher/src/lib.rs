//! # Dispatcher
//!
//! 帧分发与产物写出。
//!
//! 负责：
//! - 消费 `RenderedFrame`，Fan-out 到多个 sinks
//! - 每个 sink 独立队列与工作任务，满队列时等待而不丢帧
//! - 写出会话产物：时间清单、GPX、合成计划以及运行报告

pub mod artifacts;
pub mod dispatcher;
pub mod error;
pub mod handle;
pub mod metrics;
pub mod sinks;

pub use contracts::{FrameSink, RenderedFrame};
pub use dispatcher::{create_dispatcher, DispatchSummary, Dispatcher};
pub use error::DispatcherError;
pub use handle::SinkHandle;
pub use metrics::{MetricsSnapshot, SinkMetrics};
pub use sinks::{frame_pattern, LogSink, MemorySink, PngSequenceSink};

#[cfg(test)]
pub(crate) fn test_frame(index: u64) -> RenderedFrame {
    use chrono::NaiveDate;
    use contracts::{FrameKind, ImageData};

    let pixel = [10u8, 20, 30, 255];
    RenderedFrame {
        session_id: "trip_front".into(),
        kind: FrameKind::Overlay,
        frame_index: index,
        timestamp: NaiveDate::from_ymd_opt(2025, 9, 17)
            .and_then(|d| d.and_hms_opt(10, 0, 0))
            .unwrap_or_default(),
        image: ImageData::rgba8(4, 2, pixel.repeat(8)),
    }
}
