//! Application Layer
//!
//! パイプラインの各段階（データセット構築・学習・ライブ分類）の
//! ユースケースを実装します。
//!
//! ## モジュール構成
//! - `dataset_builder`: コーパス走査と(特徴, ラベル)対の生成
//! - `trainer`: 分類器ファミリの学習・評価・選択
//! - `debounce`: ノイズ抑制のための状態機械（IDLE/CANDIDATE/ACTIVE）
//! - `live`: ライブ分類ループ（キャプチャ→分類→送出）
//! - `stats`: 統計情報管理（FPS、段階別レイテンシ）

pub mod dataset_builder;
pub mod debounce;
pub mod live;
pub mod stats;
pub mod trainer;
