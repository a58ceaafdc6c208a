//! 反復セントロイド割り当てによるクラスタリング（k-means）
//!
//! 2次元点集合をk個のクラスタに分割する汎用プリミティブ。
//! 色空間変換から独立しており、合成点集合で単体テストできる。
//!
//! 決定性を保つため、初期セントロイドは乱数ではなく最遠点法で選ぶ。

use crate::domain::{PipelineError, PipelineResult};

/// クラスタリング設定
#[derive(Debug, Clone, Copy)]
pub struct ClusteringConfig {
    /// クラスタ数
    pub k: usize,
    /// 最大反復回数
    pub max_iterations: u32,
    /// 収束判定閾値（セントロイドの最大移動距離）
    pub tolerance: f32,
}

/// クラスタリング結果
#[derive(Debug, Clone)]
pub struct Clustering {
    /// 各クラスタのセントロイド
    pub centroids: Vec<[f32; 2]>,
    /// 各点の所属クラスタ（インデックスは入力点と対応）
    pub assignments: Vec<usize>,
    /// 実行した反復回数
    pub iterations: u32,
    /// 反復上限前に収束したか
    ///
    /// falseの場合でも最後の割り当てが返される（graceful degradation）
    pub converged: bool,
}

/// 2点間のユークリッド距離の2乗
fn distance_sq(a: &[f32; 2], b: &[f32; 2]) -> f32 {
    let dx = a[0] - b[0];
    let dy = a[1] - b[1];
    dx * dx + dy * dy
}

/// 最遠点法による決定的な初期セントロイド選択
///
/// 最初のセントロイドは全点の重心から最も遠い点。
/// 以降は既選択セントロイドへの最小距離が最大になる点を貪欲に追加する。
fn seed_centroids(points: &[[f32; 2]], k: usize) -> Vec<[f32; 2]> {
    let n = points.len() as f32;
    let mean = points.iter().fold([0.0f32; 2], |acc, p| {
        [acc[0] + p[0] / n, acc[1] + p[1] / n]
    });

    let mut centroids: Vec<[f32; 2]> = Vec::with_capacity(k);

    let first = points
        .iter()
        .max_by(|a, b| {
            distance_sq(a, &mean)
                .partial_cmp(&distance_sq(b, &mean))
                .unwrap_or(std::cmp::Ordering::Equal)
        })
        .copied()
        .unwrap_or(mean);
    centroids.push(first);

    while centroids.len() < k {
        let next = points
            .iter()
            .max_by(|a, b| {
                let da = centroids
                    .iter()
                    .map(|c| distance_sq(a, c))
                    .fold(f32::INFINITY, f32::min);
                let db = centroids
                    .iter()
                    .map(|c| distance_sq(b, c))
                    .fold(f32::INFINITY, f32::min);
                da.partial_cmp(&db).unwrap_or(std::cmp::Ordering::Equal)
            })
            .copied()
            .unwrap_or(mean);
        centroids.push(next);
    }

    centroids
}

/// 点集合をk個のクラスタに分割する
///
/// # Arguments
/// - `points`: 入力点集合
/// - `config`: クラスタ数・反復上限・収束閾値
///
/// # Returns
/// - `Ok(Clustering)`: 割り当てとセントロイド。反復上限に達した場合も
///   最後の割り当てを返す（エラーにはしない）。
/// - `Err(PipelineError)`: 点数がクラスタ数未満の場合
pub fn cluster(points: &[[f32; 2]], config: &ClusteringConfig) -> PipelineResult<Clustering> {
    if config.k == 0 {
        return Err(PipelineError::Segmentation(
            "cluster count k must be greater than 0".to_string(),
        ));
    }
    if points.len() < config.k {
        return Err(PipelineError::Segmentation(format!(
            "not enough points for clustering: {} < k={}",
            points.len(),
            config.k
        )));
    }

    let mut centroids = seed_centroids(points, config.k);
    let mut assignments = vec![0usize; points.len()];
    let mut converged = false;
    let mut iterations = 0;

    while iterations < config.max_iterations {
        iterations += 1;

        // 割り当てステップ: 各点を最近傍セントロイドへ
        let mut changed = false;
        for (i, point) in points.iter().enumerate() {
            let mut best = 0usize;
            let mut best_dist = f32::INFINITY;
            for (c, centroid) in centroids.iter().enumerate() {
                let d = distance_sq(point, centroid);
                if d < best_dist {
                    best_dist = d;
                    best = c;
                }
            }
            if assignments[i] != best {
                assignments[i] = best;
                changed = true;
            }
        }

        // 更新ステップ: セントロイドをクラスタ平均へ
        let mut sums = vec![[0.0f32; 2]; config.k];
        let mut counts = vec![0usize; config.k];
        for (point, &a) in points.iter().zip(assignments.iter()) {
            sums[a][0] += point[0];
            sums[a][1] += point[1];
            counts[a] += 1;
        }

        let mut max_shift_sq = 0.0f32;
        for c in 0..config.k {
            if counts[c] == 0 {
                // 空クラスタは前回のセントロイドを維持する
                continue;
            }
            let new_centroid = [
                sums[c][0] / counts[c] as f32,
                sums[c][1] / counts[c] as f32,
            ];
            max_shift_sq = max_shift_sq.max(distance_sq(&centroids[c], &new_centroid));
            centroids[c] = new_centroid;
        }

        if !changed || max_shift_sq.sqrt() <= config.tolerance {
            converged = true;
            break;
        }
    }

    Ok(Clustering {
        centroids,
        assignments,
        iterations,
        converged,
    })
}
