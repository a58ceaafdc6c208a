//! 統計情報管理モジュール
//!
//! FPSと各処理段階のレイテンシを収集し、定期的にログへ出力します。

use std::collections::{HashMap, VecDeque};
use std::time::{Duration, Instant};

/// 統計情報の種別
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StatKind {
    /// セグメンテーション時間
    Segment,
    /// 特徴抽出時間
    Feature,
    /// 分類（推論）時間
    Predict,
    /// エンドツーエンドのレイテンシ（キャプチャ→送出判定）
    EndToEnd,
}

impl StatKind {
    fn as_str(&self) -> &'static str {
        match self {
            Self::Segment => "segment",
            Self::Feature => "feature",
            Self::Predict => "predict",
            Self::EndToEnd => "end_to_end",
        }
    }
}

/// パーセンタイル統計値
#[derive(Debug, Clone)]
pub struct PercentileStats {
    pub p50: Duration,
    pub p95: Duration,
    pub count: usize,
}

/// 統計情報コレクター
#[derive(Debug)]
pub struct StatsCollector {
    /// FPS計測用のフレームタイムスタンプ（最大1秒分保持）
    frame_times: VecDeque<Instant>,
    /// 各処理段階の所要時間（最大1000サンプル保持）
    durations: HashMap<StatKind, VecDeque<Duration>>,
    /// 最後の統計出力時刻
    last_report: Instant,
    /// 統計出力間隔
    report_interval: Duration,
}

impl StatsCollector {
    /// FPS計算の時間範囲（1秒間のフレーム数を計測）
    const FPS_WINDOW_SECS: u64 = 1;
    /// 段階別レイテンシの最大保持サンプル数
    const MAX_SAMPLES: usize = 1000;

    /// 新しいStatsCollectorを作成
    pub fn new(report_interval: Duration) -> Self {
        Self {
            frame_times: VecDeque::new(),
            durations: HashMap::new(),
            last_report: Instant::now(),
            report_interval,
        }
    }

    /// フレーム処理完了を記録（FPS計測用）
    pub fn record_frame(&mut self) {
        let now = Instant::now();
        self.frame_times.push_back(now);

        let window = Duration::from_secs(Self::FPS_WINDOW_SECS);
        while let Some(&front) = self.frame_times.front() {
            if now.duration_since(front) > window {
                self.frame_times.pop_front();
            } else {
                break;
            }
        }
    }

    /// 現在のFPSを取得
    pub fn current_fps(&self) -> usize {
        self.frame_times.len()
    }

    /// 処理段階の所要時間を記録
    pub fn record_duration(&mut self, kind: StatKind, duration: Duration) {
        let samples = self.durations.entry(kind).or_default();
        samples.push_back(duration);
        while samples.len() > Self::MAX_SAMPLES {
            samples.pop_front();
        }
    }

    /// 指定段階のパーセンタイル統計を計算
    pub fn percentiles(&self, kind: StatKind) -> Option<PercentileStats> {
        let samples = self.durations.get(&kind)?;
        if samples.is_empty() {
            return None;
        }

        let mut sorted: Vec<Duration> = samples.iter().copied().collect();
        sorted.sort();

        let idx = |p: f64| -> usize {
            ((sorted.len() as f64 * p).ceil() as usize)
                .saturating_sub(1)
                .min(sorted.len() - 1)
        };

        Some(PercentileStats {
            p50: sorted[idx(0.50)],
            p95: sorted[idx(0.95)],
            count: sorted.len(),
        })
    }

    /// 統計出力のタイミングか判定
    pub fn should_report(&self) -> bool {
        self.last_report.elapsed() >= self.report_interval
    }

    /// 統計をログ出力し、サンプルをリセットする
    pub fn report_and_reset(&mut self) {
        tracing::info!(fps = self.current_fps(), "pipeline stats");
        for kind in [
            StatKind::Segment,
            StatKind::Feature,
            StatKind::Predict,
            StatKind::EndToEnd,
        ] {
            if let Some(stats) = self.percentiles(kind) {
                tracing::info!(
                    stage = kind.as_str(),
                    p50_us = stats.p50.as_micros() as u64,
                    p95_us = stats.p95.as_micros() as u64,
                    samples = stats.count,
                    "stage latency"
                );
            }
        }

        self.durations.clear();
        self.last_report = Instant::now();
    }
}
