//! モデル学習・選択
//!
//! データセットを再現可能なシードで学習/評価パーティションに分割し、
//! 全分類器ファミリを同一特徴で独立に学習、評価パーティションでの
//! 正解率で最良ファミリを選択する。
//!
//! 同率の場合は単純・高速なファミリを優先する
//! （決定木 < ランダムフォレスト < k-NN、`default_families`の並び順）。

use crate::domain::{
    Dataset, GestureClassifier, LabeledSample, PipelineError, PipelineResult, TrainerConfig,
};
use crate::infrastructure::classifiers::default_families;
use crate::infrastructure::model_store::{FamilyScore, ModelMetadata, TrainedModel};
use rand::{rngs::StdRng, seq::SliceRandom, SeedableRng};

/// データセットから最良モデルを学習・選択する
///
/// # Returns
/// - `Ok(TrainedModel)`: 最良ファミリの学習済みモデルとメタデータ。
///   メタデータには全ファミリの比較レポートが含まれる。
/// - `Err(PipelineError)`: 空データセット・ラベル不足・分割不能の場合
pub fn train(dataset: &Dataset, config: &TrainerConfig) -> PipelineResult<TrainedModel> {
    if dataset.is_empty() {
        return Err(PipelineError::Dataset(
            "cannot train on an empty dataset".to_string(),
        ));
    }
    let params = dataset.params.ok_or_else(|| {
        PipelineError::Dataset("dataset is missing feature extraction parameters".to_string())
    })?;
    let labels = dataset.labels();
    if labels.len() < 2 {
        return Err(PipelineError::Training(format!(
            "need at least 2 distinct labels, got {}",
            labels.len()
        )));
    }

    let (train_set, heldout) = split(&dataset.samples, config.split_ratio, config.seed)?;
    tracing::info!(
        train = train_set.len(),
        heldout = heldout.len(),
        seed = config.seed,
        "dataset split"
    );

    // 全ファミリを優先順に学習・評価し、狭義により高精度な場合のみ
    // 最良を置き換える（同率は先勝ち = 単純なファミリ優先）
    let mut best: Option<(Box<dyn GestureClassifier>, f32)> = None;
    let mut report: Vec<FamilyScore> = Vec::new();

    for mut family in default_families(config) {
        let name = family.name();
        family.fit(&train_set)?;
        let accuracy = evaluate(family.as_ref(), &heldout)?;
        tracing::info!(family = name, accuracy, "family evaluated");
        report.push(FamilyScore {
            family: name.to_string(),
            accuracy,
        });

        let replace = match &best {
            None => true,
            Some((_, best_accuracy)) => accuracy > *best_accuracy,
        };
        if replace {
            best = Some((family, accuracy));
        }
    }

    let (classifier, accuracy) = best.ok_or_else(|| {
        PipelineError::Training("no classifier family available".to_string())
    })?;

    // 比較レポート（報告用）
    tracing::info!("held-out accuracy comparison:");
    for score in &report {
        let marker = if score.family == classifier.name() { " <- selected" } else { "" };
        tracing::info!("  {:<15} {:.3}{}", score.family, score.accuracy, marker);
    }

    Ok(TrainedModel {
        metadata: ModelMetadata {
            family: classifier.name().to_string(),
            feature_params: params,
            labels,
            accuracy,
            report,
            seed: config.seed,
        },
        classifier,
    })
}

/// シード付きシャッフルで学習/評価パーティションに分割する
fn split(
    samples: &[LabeledSample],
    ratio: f32,
    seed: u64,
) -> PipelineResult<(Vec<LabeledSample>, Vec<LabeledSample>)> {
    if samples.len() < 2 {
        return Err(PipelineError::Training(format!(
            "need at least 2 samples to split, got {}",
            samples.len()
        )));
    }

    let mut indices: Vec<usize> = (0..samples.len()).collect();
    let mut rng = StdRng::seed_from_u64(seed);
    indices.shuffle(&mut rng);

    // 両パーティションが空にならないようにクランプする
    let cut = ((samples.len() as f32 * ratio).round() as usize)
        .clamp(1, samples.len() - 1);

    let train = indices[..cut].iter().map(|&i| samples[i].clone()).collect();
    let heldout = indices[cut..].iter().map(|&i| samples[i].clone()).collect();
    Ok((train, heldout))
}

/// 評価パーティションでの正解率（完全一致の割合）を計算する
fn evaluate(
    classifier: &dyn GestureClassifier,
    heldout: &[LabeledSample],
) -> PipelineResult<f32> {
    let mut correct = 0usize;
    for sample in heldout {
        let prediction = classifier.predict(&sample.features)?;
        if prediction.label == sample.label {
            correct += 1;
        }
    }
    Ok(correct as f32 / heldout.len() as f32)
}
