//! 转换指标收集模块
//!
//! 以 `dashtrack_*` 前缀发出计数器/仪表/直方图，并在内存中聚合每次运行的统计。

use std::collections::BTreeMap;

use contracts::{SessionOutcome, SessionStatus};
use metrics::{counter, gauge, histogram};

/// 记录会话结果
///
/// 每个会话结束时调用一次。
///
/// # Example
///
/// ```ignore
/// use observability::metrics::record_session_outcome;
///
/// let outcome = process_session(&session).await;
/// record_session_outcome(&outcome, started.elapsed().as_secs_f64());
/// ```
pub fn record_session_outcome(outcome: &SessionOutcome, elapsed_s: f64) {
    counter!(
        "dashtrack_sessions_total",
        "status" => outcome.status.as_str()
    )
    .increment(1);

    histogram!("dashtrack_session_duration_seconds").record(elapsed_s);

    if outcome.is_failed() {
        return;
    }

    // 轨迹规模
    histogram!("dashtrack_track_samples").record(outcome.samples as f64);
    gauge!(
        "dashtrack_track_gaps",
        "session" => outcome.session_id.clone()
    )
    .set(outcome.gaps as f64);

    if outcome.skipped_records > 0 {
        counter!("dashtrack_session_skipped_records_total").increment(outcome.skipped_records);
    }
}

/// 记录 sink 最终写出情况
pub fn record_sink_totals(sink_name: &str, written: u64, failed: u64, dropped: u64) {
    let sink = sink_name.to_string();
    counter!("dashtrack_sink_writes_total", "sink" => sink.clone()).increment(written);
    if failed > 0 {
        counter!("dashtrack_sink_failures_total", "sink" => sink.clone()).increment(failed);
    }
    if dropped > 0 {
        counter!("dashtrack_sink_dropped_total", "sink" => sink).increment(dropped);
    }
}

/// 记录地名缓存命中情况
pub fn record_geocode_cache(hits: u64, misses: u64) {
    gauge!("dashtrack_geocode_cache_hits").set(hits as f64);
    gauge!("dashtrack_geocode_cache_misses").set(misses as f64);
}

/// 记录并发中的会话数
pub fn record_sessions_in_flight(count: usize) {
    gauge!("dashtrack_sessions_in_flight").set(count as f64);
}

/// 运行指标聚合器
///
/// 在内存中聚合指标，便于统计和输出摘要。
#[derive(Debug, Clone, Default)]
pub struct ConversionMetricsAggregator {
    /// 会话总数
    pub total_sessions: u64,

    /// 按状态计数
    pub status_counts: BTreeMap<&'static str, u64>,

    /// 跳过的畸形记录
    pub skipped_records: u64,

    /// 写出的叠加层帧
    pub overlay_frames: u64,

    /// 写出的地图帧
    pub map_frames: u64,

    /// 每会话采样数
    pub sample_stats: RunningStats,

    /// 每会话缺口数
    pub gap_stats: RunningStats,

    /// 会话耗时 (秒)
    pub duration_stats: RunningStats,

    /// 降级/失败原因计数
    pub reasons: BTreeMap<String, u64>,
}

impl ConversionMetricsAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// 更新聚合统计
    pub fn update(&mut self, outcome: &SessionOutcome, elapsed_s: f64) {
        self.total_sessions += 1;
        *self.status_counts.entry(outcome.status.as_str()).or_insert(0) += 1;
        self.duration_stats.push(elapsed_s);

        match &outcome.status {
            SessionStatus::Success => {}
            SessionStatus::Degraded { reasons } => {
                for reason in reasons {
                    *self.reasons.entry(reason.clone()).or_insert(0) += 1;
                }
            }
            SessionStatus::Failed { reason } => {
                *self.reasons.entry(reason.clone()).or_insert(0) += 1;
                return;
            }
        }

        self.skipped_records += outcome.skipped_records;
        self.overlay_frames += outcome.overlay_frames;
        self.map_frames += outcome.map_frames;
        self.sample_stats.push(outcome.samples as f64);
        self.gap_stats.push(outcome.gaps as f64);
    }

    fn count(&self, status: &str) -> u64 {
        self.status_counts.get(status).copied().unwrap_or(0)
    }

    /// 生成摘要报告
    pub fn summary(&self) -> ConversionSummary {
        let failed = self.count("failed");
        ConversionSummary {
            total_sessions: self.total_sessions,
            success: self.count("success"),
            degraded: self.count("degraded"),
            failed,
            failure_rate: if self.total_sessions > 0 {
                failed as f64 / self.total_sessions as f64 * 100.0
            } else {
                0.0
            },
            skipped_records: self.skipped_records,
            overlay_frames: self.overlay_frames,
            map_frames: self.map_frames,
            samples: self.sample_stats.summary(),
            gaps: self.gap_stats.summary(),
            duration_s: self.duration_stats.summary(),
            reasons: self.reasons.clone(),
        }
    }
}

/// 运行摘要
#[derive(Debug, Clone, Default)]
pub struct ConversionSummary {
    pub total_sessions: u64,
    pub success: u64,
    pub degraded: u64,
    pub failed: u64,
    pub failure_rate: f64,
    pub skipped_records: u64,
    pub overlay_frames: u64,
    pub map_frames: u64,
    pub samples: StatsSummary,
    pub gaps: StatsSummary,
    pub duration_s: StatsSummary,
    pub reasons: BTreeMap<String, u64>,
}

impl std::fmt::Display for ConversionSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "=== Conversion Summary ===")?;
        writeln!(
            f,
            "Sessions: {} (success {}, degraded {}, failed {}, {:.2}% failed)",
            self.total_sessions, self.success, self.degraded, self.failed, self.failure_rate
        )?;
        writeln!(f, "Skipped records: {}", self.skipped_records)?;
        writeln!(
            f,
            "Frames: overlay {}, map {}",
            self.overlay_frames, self.map_frames
        )?;
        writeln!(f, "Samples per session: {}", self.samples)?;
        writeln!(f, "Gaps per session: {}", self.gaps)?;
        writeln!(f, "Session time (s): {}", self.duration_s)?;

        if !self.reasons.is_empty() {
            writeln!(f, "Reasons:")?;
            for (reason, count) in &self.reasons {
                writeln!(f, "  {}: {}", reason, count)?;
            }
        }

        Ok(())
    }
}

/// 一组观测值的分布
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct StatsSummary {
    pub count: u64,
    pub min: f64,
    pub mean: f64,
    pub max: f64,
    pub std_dev: f64,
}

impl std::fmt::Display for StatsSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.count == 0 {
            return f.write_str("-");
        }
        write!(
            f,
            "{:.1} / {:.1} / {:.1} (min / mean / max, sd {:.2}, n={})",
            self.min, self.mean, self.max, self.std_dev, self.count
        )
    }
}

/// 增量均值与方差，不保留样本
#[derive(Debug, Clone, Default)]
pub struct RunningStats {
    count: u64,
    mean: f64,
    /// 与均值之差的平方和
    sq_dev: f64,
    range: Option<(f64, f64)>,
}

impl RunningStats {
    pub fn push(&mut self, value: f64) {
        self.count += 1;
        self.range = Some(match self.range {
            None => (value, value),
            Some((lo, hi)) => (lo.min(value), hi.max(value)),
        });
        let before = value - self.mean;
        self.mean += before / self.count as f64;
        self.sq_dev += before * (value - self.mean);
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn mean(&self) -> f64 {
        self.mean
    }

    /// 样本方差，少于两个值时为 0
    pub fn variance(&self) -> f64 {
        match self.count {
            0 | 1 => 0.0,
            n => self.sq_dev / (n - 1) as f64,
        }
    }

    pub fn summary(&self) -> StatsSummary {
        let (min, max) = self.range.unwrap_or_default();
        StatsSummary {
            count: self.count,
            min,
            mean: self.mean,
            max,
            std_dev: self.variance().sqrt(),
        }
    }
}
