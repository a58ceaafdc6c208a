//! エラー型定義
//!
//! Domain層の統一エラー型。thiserrorを使用して型安全なエラー処理を提供します。
//!
//! # 設計方針
//! - unwrap()の使用を禁止し、明示的なエラーハンドリングを強制
//! - Result型でエラー伝播を明示化
//! - 回復可能性は呼び出し側で判断する（データセット構築中の画像読み込み失敗は
//!   スキップ、モデル読み込み失敗は致命的、など）

use thiserror::Error;

/// パイプライン統一エラー型
#[derive(Error, Debug)]
pub enum PipelineError {
    /// キャプチャ（カメラ）関連のエラー。ライブ段階では致命的。
    #[error("Capture error: {0}")]
    Capture(String),

    /// 画像の読み込み・変換エラー
    #[error("Image error: {0}")]
    Image(String),

    /// セグメンテーション関連のエラー
    #[error("Segmentation error: {0}")]
    Segmentation(String),

    /// 特徴抽出関連のエラー
    #[error("Feature extraction error: {0}")]
    Feature(String),

    /// データセット構築・読み込み関連のエラー
    #[error("Dataset error: {0}")]
    Dataset(String),

    /// モデル学習関連のエラー
    #[error("Training error: {0}")]
    Training(String),

    /// 入力送出（マウス・キーボード）関連のエラー
    #[error("Dispatch error: {0}")]
    Dispatch(String),

    /// 設定関連のエラー
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// 特徴抽出パラメータの不一致
    ///
    /// 保存済みモデルのメタデータと実行中の抽出器設定が異なる。
    /// サイレントに無意味な予測を出すことを防ぐため、起動時に致命的エラーとする。
    #[error("Feature parameter mismatch: model expects {expected} dimensions, extractor produces {actual}")]
    ConfigMismatch { expected: usize, actual: usize },

    /// ファイルI/Oエラー
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSONシリアライズ・デシリアライズエラー
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// パイプライン統一Result型
pub type PipelineResult<T> = Result<T, PipelineError>;
