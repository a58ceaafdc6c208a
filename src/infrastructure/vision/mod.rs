//! 画像処理アルゴリズム
//!
//! セグメンテーション（YCbCrクラスタリング）と特徴抽出（HOG）。
//! いずれも純粋な計算で、外部デバイスには依存しない。

pub mod hog;
pub mod kmeans;
pub mod segmenter;

pub use hog::HogExtractor;
pub use segmenter::HandSegmenter;
