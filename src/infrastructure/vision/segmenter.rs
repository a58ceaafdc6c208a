//! 手領域セグメンテーション
//!
//! フレームをYCbCr色空間（BT.601）へ変換し、クロマ成分(Cb, Cr)を
//! 2次元点集合としてk=2でクラスタリングする。肌色帯域に入る
//! セントロイドを持つクラスタを「手」と判定し、二値マスクを生成する。
//!
//! # 手クラスタ選択規則
//! - 帯域内のセントロイドが1つだけ → そのクラスタが手
//! - 両方が帯域内 → 帯域中心にユークリッド距離で近い方が手
//! - どちらも帯域外 → 手なし（空マスク）

use crate::domain::{ChromaBandConfig, Frame, Mask, PipelineResult, SegmenterConfig};
use crate::infrastructure::vision::kmeans::{cluster, ClusteringConfig};

/// RGB値をYCbCr（BT.601）のクロマ成分へ変換
///
/// 輝度Yは返さない（クラスタリングに使用しないため）。
fn rgb_to_chroma(r: u8, g: u8, b: u8) -> [f32; 2] {
    let r = r as f32;
    let g = g as f32;
    let b = b as f32;
    let cb = 128.0 - 0.168_736 * r - 0.331_264 * g + 0.5 * b;
    let cr = 128.0 + 0.5 * r - 0.418_688 * g - 0.081_312 * b;
    [cb, cr]
}

/// 2クラスタのセントロイドから手クラスタを選択する
///
/// # Returns
/// 手と判定されたクラスタのインデックス。どのセントロイドも
/// 肌色帯域に入らない場合は`None`（手なし）。
fn select_hand_cluster(centroids: &[[f32; 2]], band: &ChromaBandConfig) -> Option<usize> {
    let in_band: Vec<usize> = centroids
        .iter()
        .enumerate()
        .filter(|(_, c)| band.contains(c[0], c[1]))
        .map(|(i, _)| i)
        .collect();

    match in_band.len() {
        0 => None,
        1 => Some(in_band[0]),
        _ => {
            // 両方帯域内: 帯域中心に近い方
            let (cb0, cr0) = band.center();
            in_band.into_iter().min_by(|&a, &b| {
                let da = (centroids[a][0] - cb0).powi(2) + (centroids[a][1] - cr0).powi(2);
                let db = (centroids[b][0] - cb0).powi(2) + (centroids[b][1] - cr0).powi(2);
                da.partial_cmp(&db).unwrap_or(std::cmp::Ordering::Equal)
            })
        }
    }
}

/// 手領域セグメンタ
pub struct HandSegmenter {
    band: ChromaBandConfig,
    clustering: ClusteringConfig,
}

impl HandSegmenter {
    /// 設定からセグメンタを作成
    pub fn new(config: &SegmenterConfig) -> Self {
        Self {
            band: config.skin_band,
            clustering: ClusteringConfig {
                k: 2,
                max_iterations: config.kmeans_max_iterations,
                tolerance: config.kmeans_tolerance,
            },
        }
    }

    /// フレームから二値マスクを生成する
    ///
    /// 返されるマスクは入力フレームと同一の空間サイズを持ち、
    /// 各画素は0（背景）または1（手）。
    pub fn segment(&self, frame: &Frame) -> PipelineResult<Mask> {
        let pixel_count = (frame.width * frame.height) as usize;
        if pixel_count < self.clustering.k {
            // クラスタリング不能な極小フレームは手なし扱い
            return Ok(Mask::empty(frame.width, frame.height));
        }

        // クロマ平面へ射影した点集合を作る
        let mut points = Vec::with_capacity(pixel_count);
        for y in 0..frame.height {
            for x in 0..frame.width {
                let [r, g, b] = frame.pixel(x, y);
                points.push(rgb_to_chroma(r, g, b));
            }
        }

        let result = cluster(&points, &self.clustering)?;
        if !result.converged {
            tracing::debug!(
                iterations = result.iterations,
                "k-means hit iteration cap, using last assignment"
            );
        }

        let mut mask = Mask::empty(frame.width, frame.height);
        if let Some(hand) = select_hand_cluster(&result.centroids, &self.band) {
            for (i, &a) in result.assignments.iter().enumerate() {
                if a == hand {
                    mask.data[i] = 1;
                }
            }
        }

        Ok(mask)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::config::SegmenterConfig;

    /// 左半分が肌色、右半分が緑のテストフレームを作る
    fn half_skin_frame(width: u32, height: u32) -> Frame {
        let mut data = Vec::with_capacity((width * height * 3) as usize);
        for _y in 0..height {
            for x in 0..width {
                if x < width / 2 {
                    // 肌色（Cb≈105, Cr≈152あたりに落ちる）
                    data.extend_from_slice(&[210, 160, 130]);
                } else {
                    data.extend_from_slice(&[20, 180, 40]);
                }
            }
        }
        Frame::new(data, width, height)
    }

    #[test]
    fn test_rgb_to_chroma_neutral_gray() {
        // 無彩色はCb=Cr=128
        let [cb, cr] = rgb_to_chroma(128, 128, 128);
        assert!((cb - 128.0).abs() < 0.5);
        assert!((cr - 128.0).abs() < 0.5);
    }

    #[test]
    fn test_skin_tone_falls_in_default_band() {
        let band = ChromaBandConfig::default();
        let [cb, cr] = rgb_to_chroma(210, 160, 130);
        assert!(band.contains(cb, cr), "cb={}, cr={}", cb, cr);
    }

    #[test]
    fn test_mask_dimensions_match_frame() {
        let segmenter = HandSegmenter::new(&SegmenterConfig::default());
        let frame = half_skin_frame(16, 8);
        let mask = segmenter.segment(&frame).unwrap();
        assert_eq!(mask.width, 16);
        assert_eq!(mask.height, 8);
        assert_eq!(mask.data.len(), 16 * 8);
    }

    #[test]
    fn test_mask_is_binary() {
        let segmenter = HandSegmenter::new(&SegmenterConfig::default());
        let frame = half_skin_frame(16, 16);
        let mask = segmenter.segment(&frame).unwrap();
        assert!(mask.data.iter().all(|&v| v == 0 || v == 1));
    }

    #[test]
    fn test_skin_half_is_detected_as_hand() {
        let segmenter = HandSegmenter::new(&SegmenterConfig::default());
        let frame = half_skin_frame(16, 16);
        let mask = segmenter.segment(&frame).unwrap();

        // 左半分（肌色）がマスク1、右半分が0
        assert_eq!(mask.at(0, 0), 1);
        assert_eq!(mask.at(7, 8), 1);
        assert_eq!(mask.at(8, 8), 0);
        assert_eq!(mask.at(15, 15), 0);
        assert_eq!(mask.coverage(), 16 * 8);
    }

    #[test]
    fn test_no_skin_yields_empty_mask() {
        // 青と緑のみのフレームでは手なし
        let segmenter = HandSegmenter::new(&SegmenterConfig::default());
        let mut data = Vec::new();
        for i in 0..64 {
            if i % 2 == 0 {
                data.extend_from_slice(&[0, 0, 255]);
            } else {
                data.extend_from_slice(&[0, 255, 0]);
            }
        }
        let frame = Frame::new(data, 8, 8);
        let mask = segmenter.segment(&frame).unwrap();
        assert_eq!(mask.coverage(), 0);
    }

    #[test]
    fn test_tiny_frame_returns_empty_mask() {
        let segmenter = HandSegmenter::new(&SegmenterConfig::default());
        let frame = Frame::new(vec![210, 160, 130], 1, 1);
        let mask = segmenter.segment(&frame).unwrap();
        assert_eq!(mask.width, 1);
        assert_eq!(mask.height, 1);
        assert_eq!(mask.coverage(), 0);
    }

    #[test]
    fn test_select_hand_cluster_one_in_band() {
        let band = ChromaBandConfig::default();
        let centroids = vec![[100.0, 150.0], [30.0, 30.0]];
        assert_eq!(select_hand_cluster(&centroids, &band), Some(0));
    }

    #[test]
    fn test_select_hand_cluster_both_in_band_prefers_center() {
        let band = ChromaBandConfig::default();
        let (cb0, cr0) = band.center();
        let centroids = vec![[cb0 + 20.0, cr0 + 15.0], [cb0 + 1.0, cr0 - 1.0]];
        assert_eq!(select_hand_cluster(&centroids, &band), Some(1));
    }

    #[test]
    fn test_select_hand_cluster_none_in_band() {
        let band = ChromaBandConfig::default();
        let centroids = vec![[10.0, 10.0], [240.0, 240.0]];
        assert_eq!(select_hand_cluster(&centroids, &band), None);
    }
}
