//! 分類器ファミリ
//!
//! 各ファミリは`GestureClassifier` trait（{fit, predict, name}）を実装する。
//! ModelTrainerはこのリストに対して総称的に反復するため、ファミリの
//! 追加・削除は選択ロジックに影響しない。

pub mod decision_tree;
pub mod knn;
pub mod random_forest;

pub use decision_tree::DecisionTreeClassifier;
pub use knn::KnnClassifier;
pub use random_forest::RandomForestClassifier;

use crate::domain::{GestureClassifier, PipelineError, PipelineResult, TrainerConfig};

/// 全ファミリを優先順（単純・高速な順）で生成する
///
/// 同率精度のタイブレークはこの並び順で決まる:
/// 決定木 < ランダムフォレスト < k-NN。
pub fn default_families(config: &TrainerConfig) -> Vec<Box<dyn GestureClassifier>> {
    vec![
        Box::new(DecisionTreeClassifier::new(
            config.tree_max_depth,
            config.tree_min_samples_split,
        )),
        Box::new(RandomForestClassifier::new(
            config.forest_trees,
            config.tree_max_depth,
            config.tree_min_samples_split,
            config.seed,
        )),
        Box::new(KnnClassifier::new(config.knn_k as usize)),
    ]
}

/// 保存されたペイロードからファミリ名で分類器を復元する
pub fn restore(
    family: &str,
    payload: serde_json::Value,
) -> PipelineResult<Box<dyn GestureClassifier>> {
    match family {
        DecisionTreeClassifier::NAME => {
            let classifier: DecisionTreeClassifier = serde_json::from_value(payload)?;
            Ok(Box::new(classifier))
        }
        RandomForestClassifier::NAME => {
            let classifier: RandomForestClassifier = serde_json::from_value(payload)?;
            Ok(Box::new(classifier))
        }
        KnnClassifier::NAME => {
            let classifier: KnnClassifier = serde_json::from_value(payload)?;
            Ok(Box::new(classifier))
        }
        other => Err(PipelineError::Training(format!(
            "unknown classifier family '{}'",
            other
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::LabeledSample;

    #[test]
    fn test_default_families_preference_order() {
        let families = default_families(&TrainerConfig::default());
        let names: Vec<&str> = families.iter().map(|f| f.name()).collect();
        assert_eq!(names, vec!["decision_tree", "random_forest", "knn"]);
    }

    #[test]
    fn test_restore_rejects_unknown_family() {
        let result = restore("perceptron", serde_json::json!({}));
        assert!(result.is_err());
    }

    #[test]
    fn test_restore_each_family() {
        let samples = vec![
            LabeledSample { label: "a".into(), features: vec![0.0] },
            LabeledSample { label: "b".into(), features: vec![1.0] },
        ];

        for mut family in default_families(&TrainerConfig::default()) {
            family.fit(&samples).unwrap();
            let name = family.name();
            let payload = family.snapshot().unwrap();
            let restored = restore(name, payload).unwrap();
            assert_eq!(restored.name(), name);
            assert_eq!(
                restored.predict(&[0.0]).unwrap().label,
                family.predict(&[0.0]).unwrap().label
            );
        }
    }
}
