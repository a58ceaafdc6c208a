//! k近傍法分類器
//!
//! 学習サンプルをそのまま保持し、予測時にユークリッド距離で
//! k個の最近傍を探して多数決する。信頼度は得票率。

use crate::domain::{
    GestureClassifier, LabeledSample, PipelineError, PipelineResult, Prediction,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// k近傍法分類器
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KnnClassifier {
    k: usize,
    samples: Vec<LabeledSample>,
}

impl KnnClassifier {
    /// ファミリ名（モデルファイルに保存される識別子）
    pub const NAME: &'static str = "knn";

    /// 近傍数kを指定して作成
    pub fn new(k: usize) -> Self {
        Self {
            k: k.max(1),
            samples: Vec::new(),
        }
    }
}

/// 2ベクトル間のユークリッド距離の2乗
fn distance_sq(a: &[f32], b: &[f32]) -> f32 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| (x - y) * (x - y))
        .sum()
}

impl GestureClassifier for KnnClassifier {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn fit(&mut self, samples: &[LabeledSample]) -> PipelineResult<()> {
        if samples.is_empty() {
            return Err(PipelineError::Training(
                "cannot fit k-NN on an empty sample set".to_string(),
            ));
        }
        self.samples = samples.to_vec();
        Ok(())
    }

    fn predict(&self, features: &[f32]) -> PipelineResult<Prediction> {
        if self.samples.is_empty() {
            return Err(PipelineError::Training(
                "k-NN classifier has not been fitted".to_string(),
            ));
        }
        let expected = self.samples[0].features.len();
        if features.len() != expected {
            return Err(PipelineError::Feature(format!(
                "invalid feature size: expected {}, got {}",
                expected,
                features.len()
            )));
        }

        // 距離昇順でk個の近傍を取る
        let mut distances: Vec<(f32, usize)> = self
            .samples
            .iter()
            .enumerate()
            .map(|(i, s)| (distance_sq(features, &s.features), i))
            .collect();
        distances.sort_by(|a, b| {
            a.0.partial_cmp(&b.0)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.1.cmp(&b.1))
        });

        let k = self.k.min(distances.len());
        let mut votes: HashMap<&str, (usize, f32)> = HashMap::new();
        for &(dist, idx) in distances.iter().take(k) {
            let entry = votes.entry(self.samples[idx].label.as_str()).or_insert((0, 0.0));
            entry.0 += 1;
            entry.1 += dist;
        }

        // 多数決。同票の場合は累積距離が小さい方、さらに同値ならラベル名順
        // （決定性のため）
        let (label, (count, _)) = votes
            .into_iter()
            .max_by(|&(la, (ca, da)), &(lb, (cb, db))| {
                ca.cmp(&cb)
                    .then(db.partial_cmp(&da).unwrap_or(std::cmp::Ordering::Equal))
                    .then(lb.cmp(la))
            })
            .ok_or_else(|| PipelineError::Training("no neighbours found".to_string()))?;

        Ok(Prediction {
            label: label.to_string(),
            confidence: Some(count as f32 / k as f32),
        })
    }

    fn snapshot(&self) -> PipelineResult<serde_json::Value> {
        serde_json::to_value(self).map_err(PipelineError::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(label: &str, features: Vec<f32>) -> LabeledSample {
        LabeledSample {
            label: label.to_string(),
            features,
        }
    }

    fn training_set() -> Vec<LabeledSample> {
        vec![
            sample("fist", vec![0.0, 0.0]),
            sample("fist", vec![0.1, 0.1]),
            sample("fist", vec![0.0, 0.2]),
            sample("open", vec![10.0, 10.0]),
            sample("open", vec![10.1, 9.9]),
            sample("open", vec![9.9, 10.2]),
        ]
    }

    #[test]
    fn test_predict_nearest_cluster() {
        let mut knn = KnnClassifier::new(3);
        knn.fit(&training_set()).unwrap();

        let pred = knn.predict(&[0.05, 0.05]).unwrap();
        assert_eq!(pred.label, "fist");
        assert_eq!(pred.confidence, Some(1.0));

        let pred = knn.predict(&[10.0, 10.0]).unwrap();
        assert_eq!(pred.label, "open");
    }

    #[test]
    fn test_confidence_is_vote_fraction() {
        // k=3でfist 2票 / open 1票になる位置
        let mut knn = KnnClassifier::new(3);
        knn.fit(&[
            sample("fist", vec![0.0]),
            sample("fist", vec![1.0]),
            sample("open", vec![2.0]),
            sample("open", vec![50.0]),
        ])
        .unwrap();

        let pred = knn.predict(&[1.0]).unwrap();
        assert_eq!(pred.label, "fist");
        let confidence = pred.confidence.unwrap();
        assert!((confidence - 2.0 / 3.0).abs() < 1e-6);
    }

    #[test]
    fn test_unfitted_predict_fails() {
        let knn = KnnClassifier::new(3);
        assert!(knn.predict(&[0.0]).is_err());
    }

    #[test]
    fn test_fit_rejects_empty() {
        let mut knn = KnnClassifier::new(3);
        assert!(knn.fit(&[]).is_err());
    }

    #[test]
    fn test_rejects_wrong_feature_size() {
        let mut knn = KnnClassifier::new(1);
        knn.fit(&training_set()).unwrap();
        assert!(knn.predict(&[0.0, 0.0, 0.0]).is_err());
    }

    #[test]
    fn test_snapshot_roundtrip() {
        let mut knn = KnnClassifier::new(3);
        knn.fit(&training_set()).unwrap();

        let payload = knn.snapshot().unwrap();
        let restored: KnnClassifier = serde_json::from_value(payload).unwrap();

        let a = knn.predict(&[0.0, 0.0]).unwrap();
        let b = restored.predict(&[0.0, 0.0]).unwrap();
        assert_eq!(a, b);
    }
}
