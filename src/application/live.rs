//! ライブ分類ループ
//!
//! キャプチャ → セグメンテーション → 特徴抽出 → 分類 → デバウンス →
//! 入力送出を1フレームずつ繰り返す単一スレッドの協調ループ。
//!
//! カメラハンドルと入力送出チャネルはこのループが排他的に所有する。
//! キャプチャ失敗は致命的エラーとしてループを終了させ、カメラは
//! アダプタのDropで全ての終了経路において解放される。

use crate::application::debounce::{DebounceOutcome, Debouncer};
use crate::application::stats::{StatKind, StatsCollector};
use crate::domain::{
    ActionBinding, CapturePort, DispatchPort, Frame, InputAction, LiveConfig, PipelineError,
    PipelineResult, Prediction, Roi,
};
use crate::infrastructure::model_store::TrainedModel;
use crate::infrastructure::vision::{HandSegmenter, HogExtractor};
use std::collections::HashMap;
use std::time::Instant;

/// ラベルに束縛された解決済みアクション
#[derive(Debug, Clone, Copy)]
struct ResolvedBinding {
    action: InputAction,
    continuous: bool,
}

/// ライブ分類ランナー
///
/// 外部コラボレータ（カメラ・入力送出）はPort経由で注入される。
pub struct LiveRunner<C: CapturePort, D: DispatchPort> {
    capture: C,
    dispatch: D,
    segmenter: HandSegmenter,
    extractor: HogExtractor,
    model: TrainedModel,
    debouncer: Debouncer,
    bindings: HashMap<String, ResolvedBinding>,
    config: LiveConfig,
    roi: Option<Roi>,
    stats: StatsCollector,
}

impl<C: CapturePort, D: DispatchPort> LiveRunner<C, D> {
    /// ランナーを構築する
    ///
    /// モデルのメタデータと実行中の特徴抽出パラメータを照合し、
    /// 不一致なら致命的エラーを返す（フレーム処理は一切行われない）。
    pub fn new(
        capture: C,
        dispatch: D,
        segmenter: HandSegmenter,
        extractor: HogExtractor,
        model: TrainedModel,
        config: LiveConfig,
        action_bindings: &[ActionBinding],
        roi: Option<Roi>,
    ) -> PipelineResult<Self> {
        // 設定互換性の自己チェック（起動時、キャプチャ開始前）
        model.ensure_compatible(extractor.params())?;

        let mut bindings = HashMap::new();
        for binding in action_bindings {
            if !model.metadata.labels.iter().any(|l| l == &binding.label) {
                tracing::warn!(
                    label = %binding.label,
                    "action bound to a label the model was not trained on"
                );
            }
            bindings.insert(
                binding.label.clone(),
                ResolvedBinding {
                    action: InputAction::from_config(&binding.action)?,
                    continuous: binding.continuous,
                },
            );
        }

        let stats = StatsCollector::new(config.stats_interval());
        Ok(Self {
            capture,
            dispatch,
            segmenter,
            extractor,
            model,
            debouncer: Debouncer::new(config.confirmation_threshold, config.idle_reset_threshold),
            bindings,
            config,
            roi,
            stats,
        })
    }

    /// ライブループを実行する（ブロッキング）
    ///
    /// # Returns
    /// キャプチャ失敗（カメラ切断等）で`Err`を返して終了する。
    /// カメラハンドルはアダプタのDropで解放される。
    pub fn run(&mut self) -> PipelineResult<()> {
        let info = self.capture.device_info();
        tracing::info!(
            device = %info.name,
            width = info.width,
            height = info.height,
            fps = info.frame_rate,
            "live classification started"
        );

        loop {
            let frame = match self.capture.capture_frame() {
                Ok(frame) => frame,
                Err(e) => {
                    // カメラ喪失は致命的: ループを終了し呼び出し側へ伝える
                    tracing::error!(error = %e, "capture failed, stopping live loop");
                    return Err(e);
                }
            };

            self.process_frame(frame)?;

            if self.stats.should_report() {
                self.stats.report_and_reset();
            }
        }
    }

    /// 1フレームを処理する: 分類 → デバウンス → 送出
    pub fn process_frame(&mut self, frame: Frame) -> PipelineResult<()> {
        let started = Instant::now();
        let prediction = self.classify(&frame)?;

        match self.debouncer.step(&prediction.label) {
            DebounceOutcome::Dispatch(label) => {
                self.dispatch_for(&label, false);
            }
            DebounceOutcome::Hold(label) => {
                // 連続アクション（カーソル移動など）のみ毎フレーム再発火
                self.dispatch_for(&label, true);
            }
            DebounceOutcome::None => {}
        }

        self.stats.record_duration(StatKind::EndToEnd, started.elapsed());
        self.stats.record_frame();
        Ok(())
    }

    /// フレームからジェスチャーラベルを予測する
    ///
    /// マスクが小さすぎる、または信頼度が閾値未満の場合は
    /// 「ジェスチャーなし」へソフトに退避する。
    pub fn classify(&mut self, frame: &Frame) -> PipelineResult<Prediction> {
        let frame = if self.config.mirror {
            frame.flip_horizontal()
        } else {
            frame.clone()
        };

        let frame = match &self.roi {
            Some(roi) => {
                if !roi.fits_within(frame.width, frame.height) {
                    return Err(PipelineError::Configuration(format!(
                        "ROI {}x{} at ({}, {}) does not fit frame {}x{}",
                        roi.width, roi.height, roi.x, roi.y, frame.width, frame.height
                    )));
                }
                frame.crop(roi)
            }
            None => frame,
        };

        let segment_started = Instant::now();
        let mask = self.segmenter.segment(&frame)?;
        self.stats
            .record_duration(StatKind::Segment, segment_started.elapsed());

        // 手が写っていない（マスクが小さすぎる）→ ジェスチャーなし
        if (mask.coverage() as u32) < self.config.min_coverage {
            return Ok(Prediction::no_gesture());
        }

        let feature_started = Instant::now();
        let features = self.extractor.extract(&frame, &mask)?;
        self.stats
            .record_duration(StatKind::Feature, feature_started.elapsed());

        let predict_started = Instant::now();
        let prediction = self.model.predict(&features)?;
        self.stats
            .record_duration(StatKind::Predict, predict_started.elapsed());

        // 信頼度閾値が設定されていれば適用する（未設定ならtop-1をそのまま採用）
        if let (Some(threshold), Some(confidence)) =
            (self.config.min_confidence, prediction.confidence)
        {
            if confidence < threshold {
                return Ok(Prediction::no_gesture());
            }
        }

        Ok(prediction)
    }

    /// ラベルに対応するアクションを送出する
    ///
    /// 送出失敗は警告ログに留め、ループは継続する（一過性の失敗を許容）。
    fn dispatch_for(&mut self, label: &str, hold: bool) {
        let Some(binding) = self.bindings.get(label).copied() else {
            if !hold {
                tracing::debug!(label, "gesture confirmed but no action bound");
            }
            return;
        };
        if hold && !binding.continuous {
            return;
        }

        if let Err(e) = binding.action.dispatch(&mut self.dispatch) {
            tracing::warn!(label, error = %e, "action dispatch failed");
        } else {
            tracing::debug!(label, hold, "action dispatched");
        }
    }

    /// 送出アダプタへの参照を取得（テスト・検査用）
    #[allow(dead_code)]
    pub fn dispatcher(&self) -> &D {
        &self.dispatch
    }
}
