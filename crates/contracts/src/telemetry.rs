//! Telemetry 数据模型
//!
//! 从行车记录仪 TS 分段中提取的遥测记录结构。

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use bytes::Bytes;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// 摄像头角色 (由文件名后缀 `_F` / `_R` 决定)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CameraRole {
    Front,
    Rear,
}

impl CameraRole {
    /// 从文件名主干推断角色
    pub fn from_file_stem(stem: &str) -> Option<Self> {
        let upper = stem.to_ascii_uppercase();
        if upper.ends_with("_F") {
            Some(Self::Front)
        } else if upper.ends_with("_R") {
            Some(Self::Rear)
        } else {
            None
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Front => "front",
            Self::Rear => "rear",
        }
    }
}

impl fmt::Display for CameraRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 一个分段文件的引用
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SegmentRef {
    /// 文件路径
    pub path: PathBuf,

    /// 文件名 (用于日志与 GPX `<src>`)
    pub file_name: String,

    /// 摄像头角色
    pub role: CameraRole,

    /// 会话内序号 (自然排序后从 0 开始)
    pub sequence: u32,
}

/// 从一个分段中提取的遥测流原始字节
///
/// 创建后不可变，由 Extractor 产生、Parser 消费。
#[derive(Debug, Clone)]
pub struct RawTelemetryChunk {
    /// 分段序号
    pub sequence: u32,

    /// 来源文件名
    pub source_file: String,

    /// 按容器顺序拼接的 PES 负载
    pub bytes: Bytes,
}

/// 速度单位
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum SpeedUnit {
    #[default]
    #[serde(rename = "km/h")]
    KilometersPerHour,
    #[serde(rename = "mph")]
    MilesPerHour,
    #[serde(rename = "m/s")]
    MetersPerSecond,
    #[serde(rename = "kn")]
    Knots,
}

impl SpeedUnit {
    /// 显示符号
    pub fn symbol(&self) -> &'static str {
        match self {
            Self::KilometersPerHour => "km/h",
            Self::MilesPerHour => "mph",
            Self::MetersPerSecond => "m/s",
            Self::Knots => "kn",
        }
    }

    /// 1 m/s 对应的本单位数值
    fn per_meter_per_second(&self) -> f64 {
        match self {
            Self::KilometersPerHour => 3.6,
            Self::MilesPerHour => 2.23694,
            Self::MetersPerSecond => 1.0,
            Self::Knots => 1.943_844,
        }
    }

    pub fn to_meters_per_second(&self, value: f64) -> f64 {
        value / self.per_meter_per_second()
    }

    pub fn from_meters_per_second(&self, value: f64) -> f64 {
        value * self.per_meter_per_second()
    }

    /// 转换到另一单位
    pub fn convert(&self, value: f64, to: SpeedUnit) -> f64 {
        if *self == to {
            return value;
        }
        to.from_meters_per_second(self.to_meters_per_second(value))
    }
}

impl fmt::Display for SpeedUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

impl FromStr for SpeedUnit {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "km/h" | "kmh" | "kmph" | "kph" => Ok(Self::KilometersPerHour),
            "mph" => Ok(Self::MilesPerHour),
            "m/s" | "mps" => Ok(Self::MetersPerSecond),
            "kn" | "kt" | "knots" => Ok(Self::Knots),
            other => Err(format!("unknown speed unit '{other}'")),
        }
    }
}

/// 3D 向量
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Vector3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

/// 单条遥测样本
///
/// 时间戳、纬度、经度必须完整有效；任一字段不合法则整条记录被丢弃。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelemetrySample {
    /// 设备本地时间 (无时区)
    pub timestamp: NaiveDateTime,

    /// 纬度 (度, 北为正)
    pub latitude: f64,

    /// 经度 (度, 东为正)
    pub longitude: f64,

    /// 速度
    pub speed: f64,

    /// 速度单位
    pub speed_unit: SpeedUnit,

    /// 水平精度因子
    pub hdop: f64,

    /// 高度 (米)
    pub altitude: f64,

    /// 卫星数
    pub satellites: u32,

    /// 加速度计
    pub accel: Vector3,

    /// 来源分段序号
    pub segment: u32,
}

impl TelemetrySample {
    /// 以指定单位返回速度
    pub fn speed_in(&self, unit: SpeedUnit) -> f64 {
        self.speed_unit.convert(self.speed, unit)
    }

    /// 是否为 (0, 0) 空定位
    pub fn is_null_fix(&self) -> bool {
        self.latitude == 0.0 && self.longitude == 0.0
    }
}

/// 记录被丢弃的原因
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MalformedReason {
    /// 字段数量不足
    Truncated,
    /// 非 ASCII 内容
    Encoding,
    Timestamp,
    Latitude,
    Longitude,
    Speed,
    SpeedUnit,
    Hdop,
    Altitude,
    Satellites,
    Accelerometer,
    /// (0, 0) 空定位
    NoFix,
}

impl MalformedReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Truncated => "truncated",
            Self::Encoding => "encoding",
            Self::Timestamp => "timestamp",
            Self::Latitude => "latitude",
            Self::Longitude => "longitude",
            Self::Speed => "speed",
            Self::SpeedUnit => "speed_unit",
            Self::Hdop => "hdop",
            Self::Altitude => "altitude",
            Self::Satellites => "satellites",
            Self::Accelerometer => "accelerometer",
            Self::NoFix => "no_fix",
        }
    }
}

impl fmt::Display for MalformedReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
