//! ConversionBlueprint - Config Loader 输出
//!
//! 描述一次转换运行的完整配置：输入选择、遥测解析、拼接、同步、渲染、地图、
//! 外部地理服务、输出与 sink 路由。所有字段都有默认值，空配置文件即合法配置。

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::{CameraRole, SpeedUnit};

/// 配置版本
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ConfigVersion {
    #[default]
    V1,
}

/// 完整的转换配置蓝图
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct ConversionBlueprint {
    /// 配置版本
    pub version: ConfigVersion,

    /// 输入选择
    #[validate(nested)]
    pub input: InputConfig,

    /// 遥测解析
    pub telemetry: TelemetryConfig,

    /// 分段拼接
    #[validate(nested)]
    pub stitch: StitchConfig,

    /// 帧时间同步
    pub sync: SyncConfig,

    /// 仪表盘叠加层
    #[validate(nested)]
    pub overlay: OverlayConfig,

    /// 地图轨迹
    #[validate(nested)]
    pub map: MapConfig,

    /// 外部地理服务
    #[validate(nested)]
    pub geo: GeoConfig,

    /// 输出
    #[validate(nested)]
    pub output: OutputConfig,

    /// 运行时
    #[validate(nested)]
    pub runtime: RuntimeConfig,

    /// 输出路由
    #[validate(nested)]
    pub sinks: Vec<SinkConfig>,
}

/// 输入配置
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct InputConfig {
    /// 携带遥测流的摄像头角色
    #[validate(length(min = 1, message = "at least one camera role must carry telemetry"))]
    pub telemetry_roles: Vec<CameraRole>,

    /// 遥测流选择方式
    pub stream: StreamSelector,
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            telemetry_roles: vec![CameraRole::Front],
            stream: StreamSelector::default(),
        }
    }
}

/// 遥测基本流的定位方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StreamSelector {
    /// PMT 中第 N 个基本流 (从 0 开始)
    Ordinal(usize),
    /// 显式 PID
    Pid(u16),
}

impl Default for StreamSelector {
    fn default() -> Self {
        Self::Ordinal(2)
    }
}

impl fmt::Display for StreamSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ordinal(index) => write!(f, "ordinal {index}"),
            Self::Pid(pid) => write!(f, "pid 0x{pid:04x}"),
        }
    }
}

/// 遥测解析配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TelemetryConfig {
    /// 将 (0, 0) 坐标视为无定位记录
    pub reject_null_fix: bool,

    /// 速度来源
    pub speed_source: SpeedSource,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            reject_null_fix: true,
            speed_source: SpeedSource::Device,
        }
    }
}

/// 速度来源
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpeedSource {
    /// 记录中设备上报的速度
    #[default]
    Device,
    /// 由相邻采样的大圆距离计算
    Computed,
}

/// 拼接配置
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct StitchConfig {
    /// 超过该间隔 (秒) 记为缺口
    #[validate(range(exclusive_min = 0.0, message = "gap threshold must be > 0"))]
    pub gap_threshold_s: f64,
}

impl Default for StitchConfig {
    fn default() -> Self {
        Self {
            gap_threshold_s: 30.0,
        }
    }
}

/// 同步配置
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// 遥测相对视频的偏移 (秒)，加到每个查询时刻上
    pub offset_s: f64,
}

/// 叠加层配置
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct OverlayConfig {
    pub enabled: bool,

    /// 面板样式
    pub variant: OverlayVariant,

    #[validate(range(min = 16, max = 8192))]
    pub width: u32,

    #[validate(range(min = 16, max = 8192))]
    pub height: u32,

    /// 显示时区 (IANA 名称)
    pub timezone: String,

    /// 设备时钟所在时区，缺省与显示时区相同
    pub device_timezone: Option<String>,

    /// 显示速度单位
    pub speed_unit: SpeedUnit,

    /// 是否查询地名
    pub geocode: bool,

    /// 地名缓存网格 (度)
    #[validate(range(exclusive_min = 0.0, max = 1.0, message = "cell size must be in (0, 1]"))]
    pub geocode_cell_deg: f64,
}

impl Default for OverlayConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            variant: OverlayVariant::Tachometer,
            width: 800,
            height: 400,
            timezone: "Europe/Rome".to_string(),
            device_timezone: None,
            speed_unit: SpeedUnit::KilometersPerHour,
            geocode: true,
            geocode_cell_deg: 0.01,
        }
    }
}

impl OverlayConfig {
    /// 设备时钟时区名称
    pub fn device_timezone(&self) -> &str {
        self.device_timezone.as_deref().unwrap_or(&self.timezone)
    }
}

/// 叠加层样式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverlayVariant {
    /// 圆弧速度表
    #[default]
    Tachometer,
    /// 纯文字面板
    Compact,
}

/// 地图轨迹配置
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct MapConfig {
    pub enabled: bool,

    #[validate(range(min = 16, max = 8192))]
    pub width: u32,

    #[validate(range(min = 16, max = 8192))]
    pub height: u32,

    /// 瓦片缩放级别
    #[validate(range(max = crate::geo::MAX_ZOOM))]
    pub zoom: u8,

    /// 轨迹尾迹长度 (帧)
    #[validate(range(max = 600))]
    pub trail_length: usize,

    /// 标记半径 (像素)
    #[validate(range(min = 2, max = 200))]
    pub marker_radius: u32,

    /// 版权标注
    pub attribution: String,
}

impl Default for MapConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            width: 480,
            height: 640,
            zoom: 15,
            trail_length: 30,
            marker_radius: 10,
            attribution: "© OpenStreetMap".to_string(),
        }
    }
}

/// 外部地理服务配置
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct GeoConfig {
    /// Nominatim 基础地址
    pub nominatim_url: String,

    /// 瓦片地址模板，含 `{z}` `{x}` `{y}`
    pub tile_url: String,

    pub user_agent: String,

    /// 单次请求超时 (秒)
    #[validate(range(min = 1, max = 600))]
    pub timeout_s: u64,

    /// 两次请求之间的最小间隔 (毫秒)
    pub min_interval_ms: u64,

    /// 瞬时失败的最大重试次数
    #[validate(range(max = 10))]
    pub max_retries: u32,

    /// 退避基数 (毫秒)
    pub backoff_ms: u64,

    /// 退避上限 (毫秒)
    pub max_backoff_ms: u64,

    /// 使用确定性离线服务，不访问网络
    pub offline: bool,
}

impl Default for GeoConfig {
    fn default() -> Self {
        Self {
            nominatim_url: "https://nominatim.openstreetmap.org".to_string(),
            tile_url: "https://a.tile.openstreetmap.org/{z}/{x}/{y}.png".to_string(),
            user_agent: "dashtrack/0.1".to_string(),
            timeout_s: 30,
            min_interval_ms: 200,
            max_retries: 3,
            backoff_ms: 500,
            max_backoff_ms: 8000,
            offline: false,
        }
    }
}

/// 输出配置
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct OutputConfig {
    /// 输出根目录
    pub dir: String,

    /// 输出帧率
    #[validate(range(exclusive_min = 0.0, max = 240.0, message = "frame rate must be > 0"))]
    pub frame_rate: f64,

    /// 导出 GPX
    pub gpx: bool,

    /// 写出合成计划 composite.json
    pub composite_plan: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: "output".to_string(),
            frame_rate: 30.0,
            gpx: true,
            composite_plan: true,
        }
    }
}

/// 运行时配置
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct RuntimeConfig {
    /// 并行处理的会话数
    #[validate(range(min = 1, max = 256))]
    pub workers: usize,

    /// 渲染帧通道容量
    #[validate(range(min = 1))]
    pub frame_channel_capacity: usize,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            workers: 2,
            frame_channel_capacity: 64,
        }
    }
}

/// Sink 输出配置
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct SinkConfig {
    /// Sink 名称
    pub name: String,

    /// Sink 类型
    pub sink_type: SinkType,

    /// 队列容量
    #[serde(default = "default_queue_capacity")]
    #[validate(range(min = 1))]
    pub queue_capacity: usize,

    /// 类型特定参数
    #[serde(default)]
    pub params: HashMap<String, String>,
}

fn default_queue_capacity() -> usize {
    64
}

impl SinkConfig {
    /// 默认的 PNG 帧序列输出
    pub fn png(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            sink_type: SinkType::Png,
            queue_capacity: default_queue_capacity(),
            params: HashMap::new(),
        }
    }
}

/// Sink 类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SinkType {
    /// PNG 帧序列
    Png,
    /// 日志输出
    Log,
}

impl ConversionBlueprint {
    /// 配置的 sink，未配置时为单个 PNG 输出
    pub fn effective_sinks(&self) -> Vec<SinkConfig> {
        if self.sinks.is_empty() {
            vec![SinkConfig::png("frames")]
        } else {
            self.sinks.clone()
        }
    }

    /// 是否需要渲染任何图像
    pub fn renders_anything(&self) -> bool {
        self.overlay.enabled || self.map.enabled
    }
}
