//! ランダムフォレスト分類器
//!
//! ブートストラップ標本と特徴部分集合で学習した決定木の集団による
//! 多数決。乱数はシード付きStdRngのみを使用するため、同一シード・
//! 同一データなら学習結果は再現可能。

use crate::domain::{
    GestureClassifier, LabeledSample, PipelineError, PipelineResult, Prediction,
};
use crate::infrastructure::classifiers::decision_tree::{grow, predict_node, Node};
use rand::{rngs::StdRng, Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// ランダムフォレスト分類器
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RandomForestClassifier {
    tree_count: u32,
    max_depth: u32,
    min_samples_split: u32,
    seed: u64,
    feature_len: usize,
    trees: Vec<Node>,
}

impl RandomForestClassifier {
    /// ファミリ名（モデルファイルに保存される識別子）
    pub const NAME: &'static str = "random_forest";

    /// ハイパーパラメータを指定して作成
    pub fn new(tree_count: u32, max_depth: u32, min_samples_split: u32, seed: u64) -> Self {
        Self {
            tree_count: tree_count.max(1),
            max_depth,
            min_samples_split: min_samples_split.max(2),
            seed,
            feature_len: 0,
            trees: Vec::new(),
        }
    }

    /// 特徴部分集合のサイズ（sqrt(d)、最低1）
    fn feature_subset_size(feature_len: usize) -> usize {
        ((feature_len as f32).sqrt().round() as usize).max(1)
    }
}

impl GestureClassifier for RandomForestClassifier {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn fit(&mut self, samples: &[LabeledSample]) -> PipelineResult<()> {
        if samples.is_empty() {
            return Err(PipelineError::Training(
                "cannot fit random forest on an empty sample set".to_string(),
            ));
        }

        self.feature_len = samples[0].features.len();
        let subset_size = Self::feature_subset_size(self.feature_len).min(self.feature_len);
        let mut rng = StdRng::seed_from_u64(self.seed);

        self.trees.clear();
        for _ in 0..self.tree_count {
            // ブートストラップ標本（復元抽出でn個）
            let bootstrap: Vec<&LabeledSample> = (0..samples.len())
                .map(|_| &samples[rng.gen_range(0..samples.len())])
                .collect();

            // 特徴部分集合（非復元抽出、添字ソートで決定的な走査順）
            let mut pool =
                rand::seq::index::sample(&mut rng, self.feature_len, subset_size).into_vec();
            pool.sort_unstable();

            self.trees.push(grow(
                &bootstrap,
                &pool,
                0,
                self.max_depth,
                self.min_samples_split as usize,
            ));
        }
        Ok(())
    }

    fn predict(&self, features: &[f32]) -> PipelineResult<Prediction> {
        if self.trees.is_empty() {
            return Err(PipelineError::Training(
                "random forest has not been fitted".to_string(),
            ));
        }
        if features.len() != self.feature_len {
            return Err(PipelineError::Feature(format!(
                "invalid feature size: expected {}, got {}",
                self.feature_len,
                features.len()
            )));
        }

        // 木ごとの投票を集計（同票はラベル名順で決定的に解決）
        let mut votes: HashMap<&str, usize> = HashMap::new();
        for tree in &self.trees {
            let (label, _) = predict_node(tree, features);
            *votes.entry(label).or_insert(0) += 1;
        }

        let (label, count) = votes
            .into_iter()
            .max_by(|&(la, ca), &(lb, cb)| ca.cmp(&cb).then(lb.cmp(la)))
            .ok_or_else(|| PipelineError::Training("empty forest vote".to_string()))?;

        Ok(Prediction {
            label: label.to_string(),
            confidence: Some(count as f32 / self.trees.len() as f32),
        })
    }

    fn snapshot(&self) -> PipelineResult<serde_json::Value> {
        serde_json::to_value(self).map_err(PipelineError::from)
    }
}
