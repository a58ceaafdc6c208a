//! 決定木分類器（CART）
//!
//! Gini不純度を最小化する軸平行分割を貪欲に選ぶ二分木。
//! 特徴を添字順に走査し、改善は狭義の大小比較で採用するため、
//! 同一データに対する学習結果は決定的。

use crate::domain::{
    GestureClassifier, LabeledSample, PipelineError, PipelineResult, Prediction,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// 木のノード
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) enum Node {
    /// 葉: 多数派ラベルとその占有率
    Leaf { label: String, confidence: f32 },
    /// 内部ノード: `features[feature] <= threshold` なら左へ
    Split {
        feature: usize,
        threshold: f32,
        left: Box<Node>,
        right: Box<Node>,
    },
}

/// ラベル出現数からGini不純度を計算
fn gini(counts: &HashMap<&str, usize>, total: usize) -> f32 {
    if total == 0 {
        return 0.0;
    }
    let total = total as f32;
    1.0 - counts
        .values()
        .map(|&c| {
            let p = c as f32 / total;
            p * p
        })
        .sum::<f32>()
}

/// 多数派ラベルの葉を作る（同数の場合はラベル名順で決定的に選ぶ）
fn make_leaf(samples: &[&LabeledSample]) -> Node {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for s in samples {
        *counts.entry(s.label.as_str()).or_insert(0) += 1;
    }
    let (label, count) = counts
        .into_iter()
        .max_by(|&(la, ca), &(lb, cb)| ca.cmp(&cb).then(lb.cmp(la)))
        .unwrap_or(("", 0));

    Node::Leaf {
        label: label.to_string(),
        confidence: if samples.is_empty() {
            0.0
        } else {
            count as f32 / samples.len() as f32
        },
    }
}

/// 最良の分割を探す
///
/// # Returns
/// `(feature, threshold, 加重Gini)`。有効な分割がなければ`None`。
fn best_split(
    samples: &[&LabeledSample],
    feature_pool: &[usize],
) -> Option<(usize, f32, f32)> {
    let n = samples.len();
    let mut best: Option<(usize, f32, f32)> = None;

    for &feature in feature_pool {
        // 当該特徴の値で昇順ソート
        let mut order: Vec<usize> = (0..n).collect();
        order.sort_by(|&a, &b| {
            samples[a].features[feature]
                .partial_cmp(&samples[b].features[feature])
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        let mut left_counts: HashMap<&str, usize> = HashMap::new();
        let mut right_counts: HashMap<&str, usize> = HashMap::new();
        for s in samples {
            *right_counts.entry(s.label.as_str()).or_insert(0) += 1;
        }

        // 境界を左から右へ掃引し、区別可能な値の間だけ分割候補とする
        for (i, &idx) in order.iter().enumerate().take(n - 1) {
            let label = samples[idx].label.as_str();
            *left_counts.entry(label).or_insert(0) += 1;
            if let Some(c) = right_counts.get_mut(label) {
                *c -= 1;
            }

            let value = samples[idx].features[feature];
            let next = samples[order[i + 1]].features[feature];
            if next <= value {
                continue;
            }

            let left_n = i + 1;
            let right_n = n - left_n;
            let weighted = (left_n as f32 * gini(&left_counts, left_n)
                + right_n as f32 * gini(&right_counts, right_n))
                / n as f32;

            let threshold = (value + next) / 2.0;
            let improves = match best {
                None => true,
                Some((_, _, best_gini)) => weighted < best_gini,
            };
            if improves {
                best = Some((feature, threshold, weighted));
            }
        }
    }

    best
}

/// 再帰的に木を成長させる
pub(crate) fn grow(
    samples: &[&LabeledSample],
    feature_pool: &[usize],
    depth: u32,
    max_depth: u32,
    min_samples_split: usize,
) -> Node {
    // 停止条件: 深さ上限・サンプル不足・純粋ノード
    let first_label = samples.first().map(|s| s.label.as_str());
    let pure = samples
        .iter()
        .all(|s| Some(s.label.as_str()) == first_label);
    if pure || depth >= max_depth || samples.len() < min_samples_split {
        return make_leaf(samples);
    }

    let parent_counts: HashMap<&str, usize> = samples.iter().fold(HashMap::new(), |mut m, s| {
        *m.entry(s.label.as_str()).or_insert(0) += 1;
        m
    });
    let parent_gini = gini(&parent_counts, samples.len());

    match best_split(samples, feature_pool) {
        Some((feature, threshold, weighted)) if weighted < parent_gini => {
            let (left, right): (Vec<&LabeledSample>, Vec<&LabeledSample>) = samples
                .iter()
                .copied()
                .partition(|s| s.features[feature] <= threshold);

            Node::Split {
                feature,
                threshold,
                left: Box::new(grow(&left, feature_pool, depth + 1, max_depth, min_samples_split)),
                right: Box::new(grow(
                    &right,
                    feature_pool,
                    depth + 1,
                    max_depth,
                    min_samples_split,
                )),
            }
        }
        _ => make_leaf(samples),
    }
}

/// 木を辿ってラベルと葉の占有率を返す
pub(crate) fn predict_node<'a>(node: &'a Node, features: &[f32]) -> (&'a str, f32) {
    match node {
        Node::Leaf { label, confidence } => (label, *confidence),
        Node::Split {
            feature,
            threshold,
            left,
            right,
        } => {
            if features[*feature] <= *threshold {
                predict_node(left, features)
            } else {
                predict_node(right, features)
            }
        }
    }
}

/// 決定木分類器
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionTreeClassifier {
    max_depth: u32,
    min_samples_split: u32,
    feature_len: usize,
    root: Option<Node>,
}

impl DecisionTreeClassifier {
    /// ファミリ名（モデルファイルに保存される識別子）
    pub const NAME: &'static str = "decision_tree";

    /// ハイパーパラメータを指定して作成
    pub fn new(max_depth: u32, min_samples_split: u32) -> Self {
        Self {
            max_depth,
            min_samples_split: min_samples_split.max(2),
            feature_len: 0,
            root: None,
        }
    }
}

impl GestureClassifier for DecisionTreeClassifier {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn fit(&mut self, samples: &[LabeledSample]) -> PipelineResult<()> {
        if samples.is_empty() {
            return Err(PipelineError::Training(
                "cannot fit decision tree on an empty sample set".to_string(),
            ));
        }

        self.feature_len = samples[0].features.len();
        let refs: Vec<&LabeledSample> = samples.iter().collect();
        let feature_pool: Vec<usize> = (0..self.feature_len).collect();
        self.root = Some(grow(
            &refs,
            &feature_pool,
            0,
            self.max_depth,
            self.min_samples_split as usize,
        ));
        Ok(())
    }

    fn predict(&self, features: &[f32]) -> PipelineResult<Prediction> {
        let root = self.root.as_ref().ok_or_else(|| {
            PipelineError::Training("decision tree has not been fitted".to_string())
        })?;
        if features.len() != self.feature_len {
            return Err(PipelineError::Feature(format!(
                "invalid feature size: expected {}, got {}",
                self.feature_len,
                features.len()
            )));
        }

        let (label, confidence) = predict_node(root, features);
        Ok(Prediction {
            label: label.to_string(),
            confidence: Some(confidence),
        })
    }

    fn snapshot(&self) -> PipelineResult<serde_json::Value> {
        serde_json::to_value(self).map_err(PipelineError::from)
    }
}
