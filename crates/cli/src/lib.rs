//! # Dashtrack CLI
//!
//! 会话编排：发现 → 提取/解析/拼接 → 帧时间规划 → 叠加层与地图渲染 → 分发 →
//! 清单、GPX、合成计划与运行报告。
//!
//! 二进制入口 `dashtrack` 只负责参数解析与日志初始化，编排逻辑在 `pipeline` 中，
//! 便于集成测试直接驱动。

pub mod error;
pub mod pipeline;

pub use error::CliError;
pub use pipeline::{GeoBackend, Pipeline, PipelineConfig, PipelineStats};
