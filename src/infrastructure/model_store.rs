//! 学習済みモデルの永続化
//!
//! 最良ファミリの学習済み状態とメタデータ（特徴抽出パラメータ・
//! ラベル集合・精度レポート）をJSONで保存・復元する。
//! LiveClassifierは起動時にメタデータと実行中設定を照合し、
//! 不一致なら1フレームもキャプチャする前に致命的エラーで停止する。

use crate::domain::{
    FeatureParams, GestureClassifier, PipelineError, PipelineResult, Prediction,
};
use crate::infrastructure::classifiers;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

/// ファミリごとの評価結果
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FamilyScore {
    /// ファミリ名
    pub family: String,
    /// 評価パーティションでの正解率
    pub accuracy: f32,
}

/// モデルファイルのメタデータ
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelMetadata {
    /// 採用されたファミリ名
    pub family: String,
    /// データセット構築時の特徴抽出パラメータ
    pub feature_params: FeatureParams,
    /// 学習に使用したラベル集合（ソート済み）
    pub labels: Vec<String>,
    /// 採用ファミリの評価正解率
    pub accuracy: f32,
    /// 全ファミリの比較レポート（報告用）
    pub report: Vec<FamilyScore>,
    /// 分割・学習に使用した乱数シード
    pub seed: u64,
}

/// モデルファイルのシリアライズ表現
#[derive(Debug, Serialize, Deserialize)]
struct ModelFile {
    metadata: ModelMetadata,
    payload: serde_json::Value,
}

/// 学習済みモデルとメタデータの束
pub struct TrainedModel {
    pub metadata: ModelMetadata,
    pub classifier: Box<dyn GestureClassifier>,
}

impl std::fmt::Debug for TrainedModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TrainedModel")
            .field("metadata", &self.metadata)
            .field("classifier", &self.classifier.name())
            .finish()
    }
}

impl TrainedModel {
    /// モデルをJSONファイルへ保存する
    pub fn save<P: AsRef<Path>>(&self, path: P) -> PipelineResult<()> {
        let file = File::create(path.as_ref()).map_err(|e| {
            PipelineError::Training(format!(
                "failed to create model file {:?}: {}",
                path.as_ref(),
                e
            ))
        })?;
        let model_file = ModelFile {
            metadata: self.metadata.clone(),
            payload: self.classifier.snapshot()?,
        };
        serde_json::to_writer(BufWriter::new(file), &model_file)?;
        Ok(())
    }

    /// JSONファイルからモデルを読み込む
    ///
    /// モデルが読めない場合は致命的（モデルなしでライブ分類は動かせない）。
    pub fn load<P: AsRef<Path>>(path: P) -> PipelineResult<Self> {
        let file = File::open(path.as_ref()).map_err(|e| {
            PipelineError::Training(format!(
                "failed to open model file {:?}: {}",
                path.as_ref(),
                e
            ))
        })?;
        let model_file: ModelFile = serde_json::from_reader(BufReader::new(file))?;
        let classifier = classifiers::restore(&model_file.metadata.family, model_file.payload)?;

        Ok(Self {
            metadata: model_file.metadata,
            classifier,
        })
    }

    /// 実行中の特徴抽出パラメータとの互換性を検証する
    ///
    /// # Returns
    /// - `Ok(())`: 完全一致
    /// - `Err(ConfigMismatch)`: 不一致。呼び出し側は起動を中止すること。
    pub fn ensure_compatible(&self, params: &FeatureParams) -> PipelineResult<()> {
        if self.metadata.feature_params != *params {
            return Err(PipelineError::ConfigMismatch {
                expected: self.metadata.feature_params.descriptor_len(),
                actual: params.descriptor_len(),
            });
        }
        Ok(())
    }

    /// 特徴ベクトルからラベルを予測する
    pub fn predict(&self, features: &[f32]) -> PipelineResult<Prediction> {
        self.classifier.predict(features)
    }
}
