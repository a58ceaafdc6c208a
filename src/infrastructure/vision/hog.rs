//! 勾配方向ヒストグラム記述子（HOG）
//!
//! マスク適用済みのグレースケール領域を固定サイズへリサイズし、
//! セルごとの勾配方向ヒストグラムを重なり合うブロックで集約、
//! ブロック単位でL2正規化した固定長ベクトルを出力する。
//!
//! 出力長は`FeatureParams::descriptor_len()`で決まり、同一パラメータ・
//! 同一入力に対して常にビット同一の結果を返す（隠れた乱数状態なし）。

use crate::domain::{FeatureParams, Frame, Mask, PipelineError, PipelineResult};
use image::{imageops, GrayImage};

/// ブロック正規化の分母に加える微小値
const NORM_EPSILON: f32 = 1e-5;

/// HOG特徴抽出器
pub struct HogExtractor {
    params: FeatureParams,
}

impl HogExtractor {
    /// 指定パラメータで抽出器を作成
    pub fn new(params: FeatureParams) -> Self {
        Self { params }
    }

    /// 抽出パラメータを取得
    pub fn params(&self) -> &FeatureParams {
        &self.params
    }

    /// フレームとマスクから記述子を抽出する
    ///
    /// マスクが空（手なし）でも固定長のゼロベクトルを返す。
    /// 下流は「ジェスチャーなし」として扱える。
    pub fn extract(&self, frame: &Frame, mask: &Mask) -> PipelineResult<Vec<f32>> {
        if frame.width != mask.width || frame.height != mask.height {
            return Err(PipelineError::Feature(format!(
                "mask dimensions {}x{} do not match frame {}x{}",
                mask.width, mask.height, frame.width, frame.height
            )));
        }

        let gray = self.masked_grayscale(frame, mask)?;
        Ok(self.extract_from_gray(&gray))
    }

    /// マスク適用済みグレースケール画像から記述子を抽出する
    pub fn extract_from_gray(&self, gray: &GrayImage) -> Vec<f32> {
        let resized = if gray.width() == self.params.resize_width
            && gray.height() == self.params.resize_height
        {
            gray.clone()
        } else {
            imageops::resize(
                gray,
                self.params.resize_width,
                self.params.resize_height,
                imageops::FilterType::Triangle,
            )
        };

        self.descriptor(&resized)
    }

    /// マスクで背景を落としたグレースケール画像を作る
    fn masked_grayscale(&self, frame: &Frame, mask: &Mask) -> PipelineResult<GrayImage> {
        let mut data = Vec::with_capacity((frame.width * frame.height) as usize);
        for y in 0..frame.height {
            for x in 0..frame.width {
                if mask.at(x, y) == 1 {
                    let [r, g, b] = frame.pixel(x, y);
                    let luma =
                        0.299 * r as f32 + 0.587 * g as f32 + 0.114 * b as f32;
                    data.push(luma.round().clamp(0.0, 255.0) as u8);
                } else {
                    data.push(0);
                }
            }
        }

        GrayImage::from_raw(frame.width, frame.height, data).ok_or_else(|| {
            PipelineError::Feature("failed to build grayscale buffer".to_string())
        })
    }

    /// リサイズ済みグレースケール画像からHOG記述子を計算する
    fn descriptor(&self, gray: &GrayImage) -> Vec<f32> {
        let width = gray.width() as i32;
        let height = gray.height() as i32;
        let bins = self.params.orientation_bins as usize;
        let cell = self.params.cell_size as usize;
        let block = self.params.block_size as usize;
        let cells_x = (width as usize) / cell;
        let cells_y = (height as usize) / cell;
        let bin_width = 180.0 / bins as f32;

        let at = |x: i32, y: i32| -> f32 {
            let cx = x.clamp(0, width - 1) as u32;
            let cy = y.clamp(0, height - 1) as u32;
            gray.get_pixel(cx, cy).0[0] as f32
        };

        // セルヒストグラム（方向は符号なし 0..180 度、隣接ビンへ線形配分）
        // セルに満たない端数領域は無視する
        let mut histograms = vec![vec![0.0f32; bins]; cells_x * cells_y];
        let max_x = (cells_x * cell) as i32;
        let max_y = (cells_y * cell) as i32;
        for y in 0..max_y {
            for x in 0..max_x {
                let gx = at(x + 1, y) - at(x - 1, y);
                let gy = at(x, y + 1) - at(x, y - 1);
                let magnitude = (gx * gx + gy * gy).sqrt();
                if magnitude == 0.0 {
                    continue;
                }
                let mut orientation = gy.atan2(gx).to_degrees();
                if orientation < 0.0 {
                    orientation += 180.0;
                }
                if orientation >= 180.0 {
                    orientation -= 180.0;
                }

                let pos = orientation / bin_width - 0.5;
                let lower = pos.floor();
                let frac = pos - lower;
                let bin_lo = (((lower as i32) % bins as i32) + bins as i32) as usize % bins;
                let bin_hi = (bin_lo + 1) % bins;

                let cell_idx = (y as usize / cell) * cells_x + (x as usize / cell);
                histograms[cell_idx][bin_lo] += magnitude * (1.0 - frac);
                histograms[cell_idx][bin_hi] += magnitude * frac;
            }
        }

        // 重なり合うブロック（ストライド1セル）ごとにL2正規化して連結
        let blocks_x = cells_x.saturating_sub(block - 1);
        let blocks_y = cells_y.saturating_sub(block - 1);
        let mut descriptor = Vec::with_capacity(self.params.descriptor_len());
        for by in 0..blocks_y {
            for bx in 0..blocks_x {
                let start = descriptor.len();
                for cy in by..by + block {
                    for cx in bx..bx + block {
                        descriptor.extend_from_slice(&histograms[cy * cells_x + cx]);
                    }
                }

                let norm = descriptor[start..]
                    .iter()
                    .map(|v| v * v)
                    .sum::<f32>()
                    .sqrt()
                    .max(NORM_EPSILON);
                for v in &mut descriptor[start..] {
                    *v /= norm;
                }
            }
        }

        descriptor
    }
}
