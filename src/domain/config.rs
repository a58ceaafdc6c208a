//! 設定管理
//!
//! TOML設定ファイルの読み込みとDomain型への変換。

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::domain::{FeatureParams, PipelineError, PipelineResult, Roi, NO_GESTURE};

/// アプリケーション設定のルート構造
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct AppConfig {
    /// セグメンテーション設定
    pub segmenter: SegmenterConfig,
    /// 特徴抽出設定
    pub features: FeatureParamsConfig,
    /// データセット構築設定
    pub dataset: DatasetConfig,
    /// モデル学習設定
    pub trainer: TrainerConfig,
    /// ライブ分類設定
    pub live: LiveConfig,
    /// ジェスチャーラベル→入力アクションの対応表
    #[serde(default)]
    pub actions: Vec<ActionBinding>,
}

/// セグメンテーション設定
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SegmenterConfig {
    /// k-meansの最大反復回数
    ///
    /// 反復上限に達した場合は最後の割り当てをそのまま使用する
    /// （graceful degradation、エラーにはしない）
    pub kmeans_max_iterations: u32,

    /// k-meansの収束判定閾値（セントロイド移動距離）
    pub kmeans_tolerance: f32,

    /// 肌色とみなすクロマ帯域
    pub skin_band: ChromaBandConfig,

    /// 処理対象のROI（省略時はフレーム全体）
    ///
    /// 位置は画面中心に自動配置される
    #[serde(default)]
    pub roi: Option<RoiConfig>,
}

impl SegmenterConfig {
    /// デフォルトの最大反復回数（原典実装と同じ）
    pub const DEFAULT_MAX_ITERATIONS: u32 = 100;
    /// デフォルトの収束閾値
    pub const DEFAULT_TOLERANCE: f32 = 0.85;
}

impl Default for SegmenterConfig {
    fn default() -> Self {
        Self {
            kmeans_max_iterations: Self::DEFAULT_MAX_ITERATIONS,
            kmeans_tolerance: Self::DEFAULT_TOLERANCE,
            skin_band: ChromaBandConfig::default(),
            roi: None,
        }
    }
}

/// YCbCr色空間のクロマ帯域（Cb/Crとも [0-255]）
///
/// 輝度Yを分離したクロマ成分は照明変化に比較的不変なため、
/// 肌色クラスタの判定に使用する。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct ChromaBandConfig {
    /// Cb（青色差）の最小値
    pub cb_min: u8,
    /// Cb（青色差）の最大値
    pub cb_max: u8,
    /// Cr（赤色差）の最小値
    pub cr_min: u8,
    /// Cr（赤色差）の最大値
    pub cr_max: u8,
}

impl ChromaBandConfig {
    /// 帯域の中心座標 (Cb, Cr) を取得
    pub fn center(&self) -> (f32, f32) {
        (
            (self.cb_min as f32 + self.cb_max as f32) / 2.0,
            (self.cr_min as f32 + self.cr_max as f32) / 2.0,
        )
    }

    /// 指定クロマ座標が帯域内か判定
    pub fn contains(&self, cb: f32, cr: f32) -> bool {
        cb >= self.cb_min as f32
            && cb <= self.cb_max as f32
            && cr >= self.cr_min as f32
            && cr <= self.cr_max as f32
    }
}

impl Default for ChromaBandConfig {
    fn default() -> Self {
        // 一般的な肌色帯域（Cb: 77-127, Cr: 133-173）
        Self {
            cb_min: 77,
            cb_max: 127,
            cr_min: 133,
            cr_max: 173,
        }
    }
}

/// ROI設定（サイズのみ、位置は画面中心に自動配置）
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct RoiConfig {
    /// ROI幅（ピクセル）
    pub width: u32,
    /// ROI高さ（ピクセル）
    pub height: u32,
}

impl RoiConfig {
    /// フレーム中心にROIを配置
    ///
    /// # Returns
    /// - `Ok(Roi)`: フレーム中心に配置されたROI
    /// - `Err(PipelineError)`: ROIサイズがフレームサイズを超える場合
    pub fn to_roi_centered(&self, frame_width: u32, frame_height: u32) -> PipelineResult<Roi> {
        if self.width == 0 || self.height == 0 {
            return Err(PipelineError::Configuration(
                "ROI width and height must be greater than 0".to_string(),
            ));
        }
        if self.width > frame_width {
            return Err(PipelineError::Configuration(format!(
                "ROI width {} exceeds frame width {}",
                self.width, frame_width
            )));
        }
        if self.height > frame_height {
            return Err(PipelineError::Configuration(format!(
                "ROI height {} exceeds frame height {}",
                self.height, frame_height
            )));
        }

        let x = (frame_width - self.width) / 2;
        let y = (frame_height - self.height) / 2;
        Ok(Roi::new(x, y, self.width, self.height))
    }
}

/// 特徴抽出パラメータ設定
///
/// データセット構築時とライブ分類時で同一でなければならない。
/// モデルファイルに保存され、起動時に照合される。
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct FeatureParamsConfig {
    /// リサイズ先の幅（ピクセル）
    pub resize_width: u32,
    /// リサイズ先の高さ（ピクセル）
    pub resize_height: u32,
    /// セルの一辺（ピクセル）
    pub cell_size: u32,
    /// ブロックの一辺（セル数）
    pub block_size: u32,
    /// 勾配方向のビン数
    pub orientation_bins: u32,
}

impl Default for FeatureParamsConfig {
    fn default() -> Self {
        let p = FeatureParams::default();
        Self {
            resize_width: p.resize_width,
            resize_height: p.resize_height,
            cell_size: p.cell_size,
            block_size: p.block_size,
            orientation_bins: p.orientation_bins,
        }
    }
}

impl From<FeatureParamsConfig> for FeatureParams {
    fn from(config: FeatureParamsConfig) -> Self {
        FeatureParams {
            resize_width: config.resize_width,
            resize_height: config.resize_height,
            cell_size: config.cell_size,
            block_size: config.block_size,
            orientation_bins: config.orientation_bins,
        }
    }
}

/// データセット構築設定
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct DatasetConfig {
    /// 画像処理ワーカースレッド数（0 = 論理コア数）
    pub workers: u32,
}

impl Default for DatasetConfig {
    fn default() -> Self {
        Self { workers: 0 }
    }
}

/// モデル学習設定
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct TrainerConfig {
    /// 学習パーティションの比率（残りが評価用）
    pub split_ratio: f32,

    /// シャッフル・ブートストラップ用の乱数シード
    ///
    /// 同一シード・同一データセットなら同一のモデル選択と
    /// 再現可能な精度を保証する
    pub seed: u64,

    /// k-NNの近傍数
    pub knn_k: u32,

    /// 決定木の最大深さ
    pub tree_max_depth: u32,

    /// 決定木のノード分割に必要な最小サンプル数
    pub tree_min_samples_split: u32,

    /// ランダムフォレストの木の本数
    pub forest_trees: u32,
}

impl TrainerConfig {
    /// デフォルトの学習データ比率（80/20分割）
    pub const DEFAULT_SPLIT_RATIO: f32 = 0.8;
    /// デフォルトの乱数シード
    pub const DEFAULT_SEED: u64 = 42;
}

impl Default for TrainerConfig {
    fn default() -> Self {
        Self {
            split_ratio: Self::DEFAULT_SPLIT_RATIO,
            seed: Self::DEFAULT_SEED,
            knn_k: 5,
            tree_max_depth: 12,
            tree_min_samples_split: 4,
            forest_trees: 25,
        }
    }
}

/// ライブ分類設定
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct LiveConfig {
    /// カメラデバイスのインデックス
    pub camera_index: u32,

    /// 水平反転（ミラーモード）を有効にするか
    ///
    /// Webカメラに向かって操作する場合は直感的になるため推奨
    pub mirror: bool,

    /// 手として認識する最小マスク画素数
    ///
    /// これ未満は「ジェスチャーなし」として扱う
    pub min_coverage: u32,

    /// アクション発火に必要な同一ラベルの連続フレーム数
    pub confirmation_threshold: u32,

    /// IDLE復帰に必要な「ジェスチャーなし」連続フレーム数
    pub idle_reset_threshold: u32,

    /// 予測を採用する最小信頼度（省略時はtop-1ラベルをそのまま採用）
    #[serde(default)]
    pub min_confidence: Option<f32>,

    /// 統計情報の出力間隔（秒）
    pub stats_interval_sec: u64,
}

impl LiveConfig {
    /// デフォルトの最小マスク画素数（原典の面積閾値と同じ）
    pub const DEFAULT_MIN_COVERAGE: u32 = 2000;

    /// 統計出力間隔をDurationとして取得
    pub fn stats_interval(&self) -> Duration {
        Duration::from_secs(self.stats_interval_sec)
    }
}

impl Default for LiveConfig {
    fn default() -> Self {
        Self {
            camera_index: 0,
            mirror: true,
            min_coverage: Self::DEFAULT_MIN_COVERAGE,
            confirmation_threshold: 3,
            idle_reset_threshold: 4,
            min_confidence: None,
            stats_interval_sec: 10,
        }
    }
}

/// マウスボタンの指定
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum MouseButtonConfig {
    Left,
    Right,
    Middle,
}

/// 入力アクションの種別
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ActionKind {
    /// マウスカーソルの相対移動
    MouseMove { dx: i32, dy: i32 },
    /// マウスボタンのクリック
    Click { button: MouseButtonConfig },
    /// キー押下
    ///
    /// `key`は "space" / "enter" / "escape" / "tab" / "up" / "down" /
    /// "left" / "right" の名前、または1文字
    KeyPress { key: String },
}

/// ジェスチャーラベルと入力アクションの対応
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ActionBinding {
    /// ジェスチャーラベル（コーパスのサブディレクトリ名と一致させる）
    pub label: String,

    /// 発火するアクション
    pub action: ActionKind,

    /// 連続アクションか
    ///
    /// trueの場合、ACTIVE状態の間は毎フレーム再発火する（カーソル移動など）。
    /// falseの場合はエッジトリガ（ACTIVE遷移時に一度だけ発火）。
    #[serde(default)]
    pub continuous: bool,
}

impl AppConfig {
    /// TOMLファイルから設定を読み込む
    pub fn from_file<P: AsRef<Path>>(path: P) -> PipelineResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            PipelineError::Configuration(format!("Failed to read config file: {}", e))
        })?;

        toml::from_str(&content)
            .map_err(|e| PipelineError::Configuration(format!("Failed to parse config file: {}", e)))
    }

    /// デフォルト設定をTOMLファイルに書き出す
    pub fn write_default<P: AsRef<Path>>(path: P) -> PipelineResult<()> {
        let config = Self::default();
        let content = toml::to_string_pretty(&config).map_err(|e| {
            PipelineError::Configuration(format!("Failed to serialize config: {}", e))
        })?;

        std::fs::write(path, content)
            .map_err(|e| PipelineError::Configuration(format!("Failed to write config file: {}", e)))
    }

    /// 設定の妥当性を検証
    pub fn validate(&self) -> PipelineResult<()> {
        // セグメンテーションの検証
        if self.segmenter.kmeans_max_iterations == 0 {
            return Err(PipelineError::Configuration(
                "kmeans_max_iterations must be greater than 0".to_string(),
            ));
        }
        let band = &self.segmenter.skin_band;
        if band.cb_min > band.cb_max || band.cr_min > band.cr_max {
            return Err(PipelineError::Configuration(
                "Invalid skin band (min must be <= max)".to_string(),
            ));
        }

        // 特徴抽出パラメータの検証
        let f = &self.features;
        if f.cell_size == 0 || f.block_size == 0 || f.orientation_bins < 2 {
            return Err(PipelineError::Configuration(
                "Invalid feature params (cell/block must be > 0, bins >= 2)".to_string(),
            ));
        }
        if f.resize_width % f.cell_size != 0 || f.resize_height % f.cell_size != 0 {
            return Err(PipelineError::Configuration(
                "Resize target must be a multiple of cell_size".to_string(),
            ));
        }
        if f.resize_width / f.cell_size < f.block_size || f.resize_height / f.cell_size < f.block_size {
            return Err(PipelineError::Configuration(
                "Resize target too small for the configured block_size".to_string(),
            ));
        }

        // 学習設定の検証
        if !(self.trainer.split_ratio > 0.0 && self.trainer.split_ratio < 1.0) {
            return Err(PipelineError::Configuration(
                "split_ratio must be between 0 and 1 (exclusive)".to_string(),
            ));
        }
        if self.trainer.knn_k == 0 || self.trainer.forest_trees == 0 || self.trainer.tree_max_depth == 0 {
            return Err(PipelineError::Configuration(
                "knn_k, forest_trees and tree_max_depth must be greater than 0".to_string(),
            ));
        }

        // ライブ設定の検証
        if self.live.confirmation_threshold == 0 || self.live.idle_reset_threshold == 0 {
            return Err(PipelineError::Configuration(
                "confirmation_threshold and idle_reset_threshold must be greater than 0".to_string(),
            ));
        }
        if let Some(c) = self.live.min_confidence {
            if !(0.0..=1.0).contains(&c) {
                return Err(PipelineError::Configuration(
                    "min_confidence must be within [0, 1]".to_string(),
                ));
            }
        }

        // アクション対応表の検証
        let mut seen = std::collections::HashSet::new();
        for binding in &self.actions {
            if binding.label == NO_GESTURE {
                return Err(PipelineError::Configuration(format!(
                    "Label '{}' is reserved and cannot be bound to an action",
                    NO_GESTURE
                )));
            }
            if !seen.insert(binding.label.as_str()) {
                return Err(PipelineError::Configuration(format!(
                    "Duplicate action binding for label '{}'",
                    binding.label
                )));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.trainer.split_ratio, 0.8);
        assert_eq!(config.live.confirmation_threshold, 3);
    }

    #[test]
    fn test_default_descriptor_len() {
        let config = AppConfig::default();
        let params: FeatureParams = config.features.into();
        assert_eq!(params.descriptor_len(), 1764);
    }

    #[test]
    fn test_chroma_band_center_contains() {
        let band = ChromaBandConfig::default();
        let (cb, cr) = band.center();
        assert!(band.contains(cb, cr));
        assert!(!band.contains(0.0, 0.0));
    }

    #[test]
    fn test_roi_centered_normal() {
        // 正常系: 640x480フレームの中心に200x200のROI
        let roi_config = RoiConfig { width: 200, height: 200 };
        let roi = roi_config.to_roi_centered(640, 480).unwrap();
        assert_eq!(roi.x, 220);
        assert_eq!(roi.y, 140);
        assert_eq!(roi.width, 200);
        assert_eq!(roi.height, 200);
    }

    #[test]
    fn test_roi_centered_exceeds() {
        // 異常系: ROIがフレームより大きい
        let roi_config = RoiConfig { width: 800, height: 200 };
        let result = roi_config.to_roi_centered(640, 480);
        assert!(matches!(result.unwrap_err(), PipelineError::Configuration(_)));
    }

    #[test]
    fn test_validate_rejects_bad_split_ratio() {
        let mut config = AppConfig::default();
        config.trainer.split_ratio = 1.0;
        assert!(config.validate().is_err());
        config.trainer.split_ratio = 0.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_bad_cell_size() {
        let mut config = AppConfig::default();
        config.features.resize_width = 60; // 8で割り切れない
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_reserved_label() {
        let mut config = AppConfig::default();
        config.actions.push(ActionBinding {
            label: NO_GESTURE.to_string(),
            action: ActionKind::Click { button: MouseButtonConfig::Left },
            continuous: false,
        });
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_duplicate_binding() {
        let mut config = AppConfig::default();
        for _ in 0..2 {
            config.actions.push(ActionBinding {
                label: "fist".to_string(),
                action: ActionKind::Click { button: MouseButtonConfig::Left },
                continuous: false,
            });
        }
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_action_kind_parsing() {
        let toml = r#"
            label = "point_left"
            action = { type = "mouse-move", dx = -15, dy = 0 }
            continuous = true
        "#;
        let binding: ActionBinding = toml::from_str(toml).unwrap();
        assert_eq!(binding.action, ActionKind::MouseMove { dx: -15, dy: 0 });
        assert!(binding.continuous);
    }

    #[test]
    fn test_config_roundtrip() {
        let mut config = AppConfig::default();
        config.actions.push(ActionBinding {
            label: "fist".to_string(),
            action: ActionKind::KeyPress { key: "space".to_string() },
            continuous: false,
        });

        let serialized = toml::to_string_pretty(&config).unwrap();
        let parsed: AppConfig = toml::from_str(&serialized).unwrap();
        assert_eq!(parsed.actions.len(), 1);
        assert_eq!(parsed.actions[0].action, ActionKind::KeyPress { key: "space".to_string() });
    }
}
