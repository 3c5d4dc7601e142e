//! Viidure 遥测记录解析
//!
//! 记录格式 (ASCII，空白分隔)：
//!
//! ```text
//! Viidure 2025/09/17 10:15:00 N:45.46420 E:9.19000 42.5 km/h 0.9 120.0 9 x:0.01 y:-0.02 z:0.98
//! ```
//!
//! 记录边界只由下一个标记或 NUL 决定。解析失败的记录被跳过并按原因计数，
//! 扫描从下一个标记继续。

use std::collections::BTreeMap;

use chrono::NaiveDateTime;
use contracts::{MalformedReason, RawTelemetryChunk, SpeedUnit, TelemetrySample, Vector3};
use tracing::{debug, instrument};

/// 记录起始标记
pub const RECORD_MARKER: &[u8] = b"Viidure";

/// 必需字段数
const REQUIRED_FIELDS: usize = 12;

const TIMESTAMP_FORMAT: &str = "%Y/%m/%d %H:%M:%S";

/// 解析统计
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParseStats {
    /// 成功解析的记录数
    pub parsed: u64,

    /// 按原因统计的跳过记录数
    pub skipped: BTreeMap<MalformedReason, u64>,
}

impl ParseStats {
    pub fn skipped_total(&self) -> u64 {
        self.skipped.values().sum()
    }

    pub fn merge(&mut self, other: &ParseStats) {
        self.parsed += other.parsed;
        for (reason, count) in &other.skipped {
            *self.skipped.entry(*reason).or_insert(0) += count;
        }
    }

    fn skip(&mut self, reason: MalformedReason) {
        *self.skipped.entry(reason).or_insert(0) += 1;
    }
}

/// 单遍、惰性的记录扫描器
///
/// 每次 `next` 从当前位置查找下一个标记，失败的记录只计数不中断。
pub struct RecordScanner<'a> {
    data: &'a [u8],
    pos: usize,
    segment: u32,
    reject_null_fix: bool,
    stats: ParseStats,
}

impl<'a> RecordScanner<'a> {
    pub fn new(data: &'a [u8], segment: u32, reject_null_fix: bool) -> Self {
        Self {
            data,
            pos: 0,
            segment,
            reject_null_fix,
            stats: ParseStats::default(),
        }
    }

    pub fn from_chunk(chunk: &'a RawTelemetryChunk, reject_null_fix: bool) -> Self {
        Self::new(&chunk.bytes, chunk.sequence, reject_null_fix)
    }

    /// 到目前为止的统计
    pub fn stats(&self) -> &ParseStats {
        &self.stats
    }

    pub fn into_stats(self) -> ParseStats {
        self.stats
    }
}

impl Iterator for RecordScanner<'_> {
    type Item = TelemetrySample;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let start = self.pos + find_marker(&self.data[self.pos..])?;
            let body_start = start + RECORD_MARKER.len();
            let rest = &self.data[body_start..];

            let next_marker = find_marker(rest).unwrap_or(rest.len());
            let next_nul = rest.iter().position(|&b| b == 0).unwrap_or(rest.len());
            let body_end = body_start + next_marker.min(next_nul);
            self.pos = body_end;

            match parse_record(
                &self.data[body_start..body_end],
                self.segment,
                self.reject_null_fix,
            ) {
                Ok(sample) => {
                    self.stats.parsed += 1;
                    return Some(sample);
                }
                Err(reason) => self.stats.skip(reason),
            }
        }
    }
}

fn find_marker(data: &[u8]) -> Option<usize> {
    data.windows(RECORD_MARKER.len())
        .position(|window| window == RECORD_MARKER)
}

/// 解析整个分段块
#[instrument(
    name = "parse_chunk",
    skip(chunk),
    fields(segment = %chunk.source_file, bytes = chunk.bytes.len())
)]
pub fn parse_chunk(
    chunk: &RawTelemetryChunk,
    reject_null_fix: bool,
) -> (Vec<TelemetrySample>, ParseStats) {
    let mut scanner = RecordScanner::from_chunk(chunk, reject_null_fix);
    let samples: Vec<_> = scanner.by_ref().collect();
    let stats = scanner.into_stats();

    metrics::counter!("dashtrack_records_total", "status" => "parsed").increment(stats.parsed);
    for (reason, count) in &stats.skipped {
        metrics::counter!("dashtrack_records_skipped_total", "reason" => reason.as_str())
            .increment(*count);
    }
    debug!(
        parsed = stats.parsed,
        skipped = stats.skipped_total(),
        "telemetry chunk parsed"
    );
    (samples, stats)
}

/// 解析标记之后的记录正文
///
/// 多余的尾部字段被忽略。
pub fn parse_record(
    body: &[u8],
    segment: u32,
    reject_null_fix: bool,
) -> Result<TelemetrySample, MalformedReason> {
    let mut tokens = [""; REQUIRED_FIELDS];
    let mut count = 0;
    for raw in body
        .split(|b| b.is_ascii_whitespace())
        .filter(|t| !t.is_empty())
        .take(REQUIRED_FIELDS)
    {
        if !raw.is_ascii() {
            return Err(MalformedReason::Encoding);
        }
        tokens[count] = std::str::from_utf8(raw).map_err(|_| MalformedReason::Encoding)?;
        count += 1;
    }
    if count < REQUIRED_FIELDS {
        return Err(MalformedReason::Truncated);
    }

    let timestamp = NaiveDateTime::parse_from_str(
        &format!("{} {}", tokens[0], tokens[1]),
        TIMESTAMP_FORMAT,
    )
    .map_err(|_| MalformedReason::Timestamp)?;

    let latitude = parse_coordinate(tokens[2], 'N', 'S', 90.0).ok_or(MalformedReason::Latitude)?;
    let longitude =
        parse_coordinate(tokens[3], 'E', 'W', 180.0).ok_or(MalformedReason::Longitude)?;

    let speed = parse_decimal(tokens[4])
        .filter(|v| *v >= 0.0)
        .ok_or(MalformedReason::Speed)?;
    let speed_unit = tokens[5]
        .parse::<SpeedUnit>()
        .map_err(|_| MalformedReason::SpeedUnit)?;
    let hdop = parse_decimal(tokens[6])
        .filter(|v| *v >= 0.0)
        .ok_or(MalformedReason::Hdop)?;
    let altitude = parse_decimal(tokens[7]).ok_or(MalformedReason::Altitude)?;
    let satellites = tokens[8]
        .parse::<u32>()
        .map_err(|_| MalformedReason::Satellites)?;

    let accel = Vector3 {
        x: parse_prefixed(tokens[9], "x:").ok_or(MalformedReason::Accelerometer)?,
        y: parse_prefixed(tokens[10], "y:").ok_or(MalformedReason::Accelerometer)?,
        z: parse_prefixed(tokens[11], "z:").ok_or(MalformedReason::Accelerometer)?,
    };

    if reject_null_fix && latitude == 0.0 && longitude == 0.0 {
        return Err(MalformedReason::NoFix);
    }

    Ok(TelemetrySample {
        timestamp,
        latitude,
        longitude,
        speed,
        speed_unit,
        hdop,
        altitude,
        satellites,
        accel,
        segment,
    })
}

/// 定点小数，`.` 为小数点，不接受 inf/nan 与指数
fn parse_decimal(token: &str) -> Option<f64> {
    let digits = token.strip_prefix(['-', '+']).unwrap_or(token);
    let valid = !digits.is_empty()
        && digits.bytes().all(|b| b.is_ascii_digit() || b == b'.')
        && digits.bytes().filter(|&b| b == b'.').count() <= 1
        && digits.bytes().any(|b| b.is_ascii_digit());
    if !valid {
        return None;
    }
    token.parse::<f64>().ok()
}

/// `N:45.1` / `S:45.1` 形式的坐标，南/西取负
fn parse_coordinate(token: &str, positive: char, negative: char, limit: f64) -> Option<f64> {
    let mut chars = token.chars();
    let letter = chars.next()?.to_ascii_uppercase();
    let value = chars.as_str().strip_prefix(':')?;
    let magnitude = parse_decimal(value)?;
    let signed = if letter == positive {
        magnitude
    } else if letter == negative {
        -magnitude
    } else {
        return None;
    };
    (signed.abs() <= limit).then_some(signed)
}

fn parse_prefixed(token: &str, prefix: &str) -> Option<f64> {
    let value = token
        .get(..prefix.len())
        .filter(|p| p.eq_ignore_ascii_case(prefix))
        .map(|_| &token[prefix.len()..])?;
    parse_decimal(value)
}
