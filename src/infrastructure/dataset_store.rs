//! データセットの永続化
//!
//! (特徴ベクトル, ラベル)対と特徴抽出パラメータをJSONで保存・復元する。
//! serde_jsonのf32表現は往復で数値が完全に一致する。

use crate::domain::{Dataset, PipelineError, PipelineResult};
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

/// データセットをJSONファイルへ保存する
pub fn save<P: AsRef<Path>>(dataset: &Dataset, path: P) -> PipelineResult<()> {
    let file = File::create(path.as_ref()).map_err(|e| {
        PipelineError::Dataset(format!(
            "failed to create dataset file {:?}: {}",
            path.as_ref(),
            e
        ))
    })?;
    let writer = BufWriter::new(file);
    serde_json::to_writer(writer, dataset)?;
    Ok(())
}

/// JSONファイルからデータセットを読み込む
///
/// 読み込み後に全サンプルの特徴ベクトル長が`params.descriptor_len()`と
/// 一致することを検証する（不一致は破損扱いで致命的エラー）。
pub fn load<P: AsRef<Path>>(path: P) -> PipelineResult<Dataset> {
    let file = File::open(path.as_ref()).map_err(|e| {
        PipelineError::Dataset(format!(
            "failed to open dataset file {:?}: {}",
            path.as_ref(),
            e
        ))
    })?;
    let reader = BufReader::new(file);
    let dataset: Dataset = serde_json::from_reader(reader)?;

    if let Some(params) = &dataset.params {
        let expected = params.descriptor_len();
        for (i, sample) in dataset.samples.iter().enumerate() {
            if sample.features.len() != expected {
                return Err(PipelineError::Dataset(format!(
                    "sample {} has {} features, expected {}",
                    i,
                    sample.features.len(),
                    expected
                )));
            }
        }
    }

    Ok(dataset)
}
