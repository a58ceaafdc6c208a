//! コア型定義
//!
//! Domain層の中心となるデータ構造。
//! パイプラインの全段階（セグメンテーション→特徴抽出→分類→入力送出）で共有される。

use serde::{Deserialize, Serialize};
use std::time::Instant;

/// 「ジェスチャーなし」を表す予約ラベル
///
/// マスクが空、または信頼度が閾値未満の場合に使用される。
/// コーパスのサブディレクトリ名として使用してはならない。
pub const NO_GESTURE: &str = "no_gesture";

/// ピクセル座標で指定されるROI（Region of Interest）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Roi {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl Roi {
    /// 新しいROIを作成
    pub fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self { x, y, width, height }
    }

    /// ROIの面積を取得
    #[allow(dead_code)]
    pub fn area(&self) -> u32 {
        self.width * self.height
    }

    /// ROIがフレームサイズに収まるか判定
    pub fn fits_within(&self, width: u32, height: u32) -> bool {
        self.x + self.width <= width && self.y + self.height <= height
    }
}

/// キャプチャされたフレームデータ
///
/// RGB24形式（ピクセルあたり3バイト、連続メモリ）。
#[derive(Debug, Clone)]
pub struct Frame {
    /// フレーム取得時刻
    pub timestamp: Instant,
    /// フレーム画像データ（RGB形式、連続メモリ）
    pub data: Vec<u8>,
    /// 画像の幅
    pub width: u32,
    /// 画像の高さ
    pub height: u32,
}

impl Frame {
    /// 新しいフレームを作成
    pub fn new(data: Vec<u8>, width: u32, height: u32) -> Self {
        Self {
            timestamp: Instant::now(),
            data,
            width,
            height,
        }
    }

    /// 指定座標のRGB値を取得
    ///
    /// 座標は範囲内であること（呼び出し側が保証する）。
    pub fn pixel(&self, x: u32, y: u32) -> [u8; 3] {
        let idx = ((y * self.width + x) * 3) as usize;
        [self.data[idx], self.data[idx + 1], self.data[idx + 2]]
    }

    /// ROI領域を切り出した新しいフレームを返す
    pub fn crop(&self, roi: &Roi) -> Frame {
        let mut data = Vec::with_capacity((roi.width * roi.height * 3) as usize);
        for y in roi.y..roi.y + roi.height {
            let start = ((y * self.width + roi.x) * 3) as usize;
            let end = start + (roi.width * 3) as usize;
            data.extend_from_slice(&self.data[start..end]);
        }
        Frame {
            timestamp: self.timestamp,
            data,
            width: roi.width,
            height: roi.height,
        }
    }

    /// 水平方向に反転した新しいフレームを返す（ミラーモード用）
    pub fn flip_horizontal(&self) -> Frame {
        let mut data = vec![0u8; self.data.len()];
        for y in 0..self.height {
            for x in 0..self.width {
                let src = ((y * self.width + x) * 3) as usize;
                let dst = ((y * self.width + (self.width - 1 - x)) * 3) as usize;
                data[dst..dst + 3].copy_from_slice(&self.data[src..src + 3]);
            }
        }
        Frame {
            timestamp: self.timestamp,
            data,
            width: self.width,
            height: self.height,
        }
    }
}

/// 手/背景の二値マスク
///
/// 元フレームと同一の空間サイズを持ち、各要素は0（背景）または1（手）。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mask {
    pub width: u32,
    pub height: u32,
    pub data: Vec<u8>,
}

impl Mask {
    /// 全画素が背景のマスクを作成
    pub fn empty(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            data: vec![0u8; (width * height) as usize],
        }
    }

    /// 手と判定された画素数を取得
    pub fn coverage(&self) -> usize {
        self.data.iter().filter(|&&v| v == 1).count()
    }

    /// 指定座標のマスク値を取得
    pub fn at(&self, x: u32, y: u32) -> u8 {
        self.data[(y * self.width + x) as usize]
    }
}

/// 特徴抽出パラメータ
///
/// DatasetBuilderとLiveClassifierで完全に一致していなければならない。
/// 不一致のまま推論すると予測が無意味になるため、モデルファイルに
/// メタデータとして保存され、起動時に照合される。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureParams {
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

impl FeatureParams {
    /// 特徴ベクトルの長さを導出
    ///
    /// 標準設定 {64x64, cell=8, block=2, bins=9} では
    /// 7 * 7 * 2 * 2 * 9 = 1764 となる。
    pub fn descriptor_len(&self) -> usize {
        let cells_x = self.resize_width / self.cell_size;
        let cells_y = self.resize_height / self.cell_size;
        let blocks_x = cells_x.saturating_sub(self.block_size - 1);
        let blocks_y = cells_y.saturating_sub(self.block_size - 1);
        (blocks_x * blocks_y * self.block_size * self.block_size * self.orientation_bins) as usize
    }
}

impl Default for FeatureParams {
    fn default() -> Self {
        Self {
            resize_width: 64,
            resize_height: 64,
            cell_size: 8,
            block_size: 2,
            orientation_bins: 9,
        }
    }
}

/// 固定長特徴ベクトル
pub type FeatureVector = Vec<f32>;

/// ラベル付きサンプル
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabeledSample {
    /// ジェスチャーラベル（コーパスのサブディレクトリ名）
    pub label: String,
    /// 特徴ベクトル
    pub features: FeatureVector,
}

/// 学習データセット
///
/// DatasetBuilderが生成し、ModelTrainerが一度だけ消費する。
/// 全サンプルの特徴ベクトル長は`params.descriptor_len()`に一致する。
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Dataset {
    /// データセット構築時の特徴抽出パラメータ
    pub params: Option<FeatureParams>,
    /// サンプル列
    pub samples: Vec<LabeledSample>,
}

impl Dataset {
    /// 出現するラベルの集合をソート済みで取得
    pub fn labels(&self) -> Vec<String> {
        let mut labels: Vec<String> = self.samples.iter().map(|s| s.label.clone()).collect();
        labels.sort();
        labels.dedup();
        labels
    }

    /// サンプル数を取得
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// データセットが空かどうか
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

/// 分類結果
#[derive(Debug, Clone, PartialEq)]
pub struct Prediction {
    /// 予測ラベル
    pub label: String,
    /// 信頼度（0.0〜1.0、提供できないモデルはNone）
    pub confidence: Option<f32>,
}

impl Prediction {
    /// 「ジェスチャーなし」の結果を作成
    pub fn no_gesture() -> Self {
        Self {
            label: NO_GESTURE.to_string(),
            confidence: None,
        }
    }

    /// ジェスチャーなしの結果か判定
    pub fn is_no_gesture(&self) -> bool {
        self.label == NO_GESTURE
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_roi_area() {
        let roi = Roi::new(0, 0, 100, 200);
        assert_eq!(roi.area(), 20000);
    }

    #[test]
    fn test_roi_fits_within() {
        let roi = Roi::new(10, 10, 50, 50);
        assert!(roi.fits_within(60, 60));
        assert!(!roi.fits_within(59, 60));
    }

    #[test]
    fn test_frame_pixel() {
        let mut data = vec![0u8; 2 * 2 * 3];
        // (1, 0) を赤にする
        data[3] = 255;
        let frame = Frame::new(data, 2, 2);
        assert_eq!(frame.pixel(1, 0), [255, 0, 0]);
        assert_eq!(frame.pixel(0, 1), [0, 0, 0]);
    }

    #[test]
    fn test_frame_crop() {
        // 4x4フレームの右下2x2を切り出す
        let mut data = vec![0u8; 4 * 4 * 3];
        let idx = ((3 * 4 + 3) * 3) as usize;
        data[idx] = 7;
        let frame = Frame::new(data, 4, 4);

        let cropped = frame.crop(&Roi::new(2, 2, 2, 2));
        assert_eq!(cropped.width, 2);
        assert_eq!(cropped.height, 2);
        assert_eq!(cropped.pixel(1, 1), [7, 0, 0]);
    }

    #[test]
    fn test_frame_flip_horizontal() {
        let mut data = vec![0u8; 2 * 3];
        data[0] = 9; // (0,0) が R=9
        let frame = Frame::new(data, 2, 1);

        let flipped = frame.flip_horizontal();
        assert_eq!(flipped.pixel(0, 0), [0, 0, 0]);
        assert_eq!(flipped.pixel(1, 0), [9, 0, 0]);
    }

    #[test]
    fn test_mask_coverage() {
        let mut mask = Mask::empty(4, 4);
        assert_eq!(mask.coverage(), 0);
        mask.data[0] = 1;
        mask.data[5] = 1;
        assert_eq!(mask.coverage(), 2);
        assert_eq!(mask.at(1, 1), 1);
        assert_eq!(mask.at(2, 1), 0);
    }

    #[test]
    fn test_feature_params_descriptor_len() {
        // 標準設定は1764次元
        let params = FeatureParams::default();
        assert_eq!(params.descriptor_len(), 1764);
    }

    #[test]
    fn test_feature_params_descriptor_len_small() {
        // 16x16, cell=8, block=2, bins=9 → 1 * 1 * 4 * 9 = 36
        let params = FeatureParams {
            resize_width: 16,
            resize_height: 16,
            cell_size: 8,
            block_size: 2,
            orientation_bins: 9,
        };
        assert_eq!(params.descriptor_len(), 36);
    }

    #[test]
    fn test_dataset_labels_sorted_dedup() {
        let dataset = Dataset {
            params: Some(FeatureParams::default()),
            samples: vec![
                LabeledSample { label: "open".into(), features: vec![0.0] },
                LabeledSample { label: "fist".into(), features: vec![0.0] },
                LabeledSample { label: "open".into(), features: vec![0.0] },
            ],
        };
        assert_eq!(dataset.labels(), vec!["fist".to_string(), "open".to_string()]);
    }

    #[test]
    fn test_prediction_no_gesture() {
        let pred = Prediction::no_gesture();
        assert!(pred.is_no_gesture());
        assert_eq!(pred.label, NO_GESTURE);
    }
}
