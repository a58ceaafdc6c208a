//! データセット構築
//!
//! ラベル付き画像コーパス（ラベルごとのサブディレクトリ）を走査し、
//! 各画像にセグメンテーションと特徴抽出を適用して(特徴, ラベル)対を
//! 生成する。読めない・壊れた画像はスキップしてログに残す（構築全体を
//! 中断しない）。
//!
//! ワーカースレッドへの分配にはcrossbeamのboundedチャネルを使用する。
//! ラベル付与はサンプル単位で順序に依存しないため並列化は安全だが、
//! 出力順は入力パス順に正規化して再現可能にしている。

use crate::domain::{Dataset, Frame, LabeledSample, PipelineError, PipelineResult};
use crate::infrastructure::vision::{HandSegmenter, HogExtractor};
use crossbeam_channel::bounded;
use std::path::{Path, PathBuf};

/// 1画像分のジョブ
#[derive(Debug, Clone)]
struct ImageJob {
    index: usize,
    label: String,
    path: PathBuf,
}

/// データセットビルダー
pub struct DatasetBuilder<'a> {
    segmenter: &'a HandSegmenter,
    extractor: &'a HogExtractor,
    workers: usize,
}

impl<'a> DatasetBuilder<'a> {
    /// セグメンタと抽出器を指定して作成
    ///
    /// # Arguments
    /// - `workers`: ワーカースレッド数（0 = 論理コア数）
    pub fn new(segmenter: &'a HandSegmenter, extractor: &'a HogExtractor, workers: usize) -> Self {
        let workers = if workers == 0 {
            std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1)
        } else {
            workers
        };
        Self {
            segmenter,
            extractor,
            workers,
        }
    }

    /// コーパスからデータセットを構築する
    ///
    /// # Arguments
    /// - `corpus_root`: ラベルごとのサブディレクトリを含むルート
    ///
    /// # Returns
    /// - `Ok(Dataset)`: 構築されたデータセット。空コーパスの場合は
    ///   空のデータセット（警告ログのみ、エラーにしない）。
    /// - `Err(PipelineError)`: コーパスルート自体が読めない場合
    pub fn build(&self, corpus_root: &Path) -> PipelineResult<Dataset> {
        let jobs = collect_jobs(corpus_root)?;
        if jobs.is_empty() {
            tracing::warn!(corpus = ?corpus_root, "corpus contains no images, dataset is empty");
            return Ok(Dataset {
                params: Some(*self.extractor.params()),
                samples: Vec::new(),
            });
        }

        tracing::info!(
            images = jobs.len(),
            workers = self.workers,
            "building dataset"
        );

        let (job_tx, job_rx) = bounded::<ImageJob>(self.workers * 2);
        let (result_tx, result_rx) = bounded::<(usize, Option<LabeledSample>)>(self.workers * 2);

        let mut indexed: Vec<(usize, LabeledSample)> = Vec::with_capacity(jobs.len());
        let total = jobs.len();

        std::thread::scope(|scope| {
            // ワーカースレッド
            for _ in 0..self.workers {
                let job_rx = job_rx.clone();
                let result_tx = result_tx.clone();
                scope.spawn(move || {
                    while let Ok(job) = job_rx.recv() {
                        let sample = match self.process_image(&job.path, &job.label) {
                            Ok(sample) => Some(sample),
                            Err(e) => {
                                // 壊れた画像はスキップ（構築全体は中断しない）
                                tracing::warn!(path = ?job.path, error = %e, "skipping unreadable image");
                                None
                            }
                        };
                        if result_tx.send((job.index, sample)).is_err() {
                            break;
                        }
                    }
                });
            }
            drop(result_tx);

            // ジョブ投入スレッド
            scope.spawn(move || {
                for job in jobs {
                    if job_tx.send(job).is_err() {
                        break;
                    }
                }
            });

            // 収集（メインスレッド）
            for _ in 0..total {
                match result_rx.recv() {
                    Ok((index, Some(sample))) => indexed.push((index, sample)),
                    Ok((_, None)) => {}
                    Err(_) => break,
                }
            }
        });

        // 入力パス順に正規化（並列実行でも再現可能な順序にする）
        indexed.sort_by_key(|(index, _)| *index);
        let samples: Vec<LabeledSample> = indexed.into_iter().map(|(_, s)| s).collect();

        let skipped = total - samples.len();
        if skipped > 0 {
            tracing::warn!(skipped, "some images were skipped");
        }
        tracing::info!(samples = samples.len(), "dataset built");

        Ok(Dataset {
            params: Some(*self.extractor.params()),
            samples,
        })
    }

    /// 1枚の画像を読み込み、セグメンテーションと特徴抽出を適用する
    fn process_image(&self, path: &Path, label: &str) -> PipelineResult<LabeledSample> {
        let frame = load_frame(path)?;
        let mask = self.segmenter.segment(&frame)?;
        let features = self.extractor.extract(&frame, &mask)?;

        Ok(LabeledSample {
            label: label.to_string(),
            features,
        })
    }
}

/// 画像ファイルをRGBフレームとして読み込む
fn load_frame(path: &Path) -> PipelineResult<Frame> {
    let image = image::open(path)
        .map_err(|e| PipelineError::Image(format!("failed to load {:?}: {}", path, e)))?
        .to_rgb8();

    let width = image.width();
    let height = image.height();
    Ok(Frame::new(image.into_raw(), width, height))
}

/// コーパスを走査して(ラベル, 画像パス)のジョブ一覧を作る
///
/// サブディレクトリ名がラベルになる。隠しファイルとサブディレクトリ
/// 直下以外は無視する。結果はパス順にソート済み。
fn collect_jobs(corpus_root: &Path) -> PipelineResult<Vec<ImageJob>> {
    let entries = std::fs::read_dir(corpus_root).map_err(|e| {
        PipelineError::Dataset(format!("failed to read corpus root {:?}: {}", corpus_root, e))
    })?;

    let mut label_dirs: Vec<(String, PathBuf)> = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| {
            PipelineError::Dataset(format!("failed to read corpus entry: {}", e))
        })?;
        let path = entry.path();
        if !path.is_dir() {
            continue;
        }
        let Some(label) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        if label.starts_with('.') {
            continue;
        }
        label_dirs.push((label.to_string(), path));
    }
    label_dirs.sort();

    let mut jobs = Vec::new();
    for (label, dir) in label_dirs {
        let mut paths: Vec<PathBuf> = std::fs::read_dir(&dir)
            .map_err(|e| {
                PipelineError::Dataset(format!("failed to read label dir {:?}: {}", dir, e))
            })?
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| p.is_file())
            .filter(|p| {
                p.file_name()
                    .and_then(|n| n.to_str())
                    .map(|n| !n.starts_with('.'))
                    .unwrap_or(false)
            })
            .collect();
        paths.sort();

        for path in paths {
            jobs.push(ImageJob {
                index: jobs.len(),
                label: label.clone(),
                path,
            });
        }
    }

    Ok(jobs)
}

/// セグメンテーション結果を画像として書き出す（検査・キャリブレーション用）
///
/// コーパスと同じラベル構造で、マスク適用済みグレースケールPNGを
/// `output_root`配下に保存する。
pub fn export_segmented(
    segmenter: &HandSegmenter,
    corpus_root: &Path,
    output_root: &Path,
) -> PipelineResult<usize> {
    let jobs = collect_jobs(corpus_root)?;
    if jobs.is_empty() {
        tracing::warn!(corpus = ?corpus_root, "corpus contains no images, nothing to export");
        return Ok(0);
    }

    let mut exported = 0usize;
    for job in &jobs {
        let frame = match load_frame(&job.path) {
            Ok(frame) => frame,
            Err(e) => {
                tracing::warn!(path = ?job.path, error = %e, "skipping unreadable image");
                continue;
            }
        };
        let mask = segmenter.segment(&frame)?;

        // マスク適用済みグレースケール
        let mut gray = image::GrayImage::new(frame.width, frame.height);
        for y in 0..frame.height {
            for x in 0..frame.width {
                if mask.at(x, y) == 1 {
                    let [r, g, b] = frame.pixel(x, y);
                    let luma = 0.299 * r as f32 + 0.587 * g as f32 + 0.114 * b as f32;
                    gray.put_pixel(x, y, image::Luma([luma.round().clamp(0.0, 255.0) as u8]));
                }
            }
        }

        let out_dir = output_root.join(&job.label);
        std::fs::create_dir_all(&out_dir)?;
        let file_stem = job
            .path
            .file_stem()
            .and_then(|n| n.to_str())
            .unwrap_or("image");
        let out_path = out_dir.join(format!("{}.png", file_stem));
        gray.save(&out_path)
            .map_err(|e| PipelineError::Image(format!("failed to save {:?}: {}", out_path, e)))?;
        exported += 1;
    }

    tracing::info!(exported, output = ?output_root, "segmented images written");
    Ok(exported)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{FeatureParams, SegmenterConfig};
    use tempfile::tempdir;

    fn small_extractor() -> HogExtractor {
        HogExtractor::new(FeatureParams {
            resize_width: 16,
            resize_height: 16,
            cell_size: 8,
            block_size: 2,
            orientation_bins: 9,
        })
    }

    /// 左半分が肌色のテスト画像を保存する
    fn write_test_image(path: &Path) {
        let image = image::RgbImage::from_fn(16, 16, |x, _y| {
            if x < 8 {
                image::Rgb([210, 160, 130])
            } else {
                image::Rgb([20, 180, 40])
            }
        });
        image.save(path).unwrap();
    }

    #[test]
    fn test_build_from_labeled_corpus() {
        let dir = tempdir().unwrap();
        let corpus = dir.path();
        for label in ["fist", "open"] {
            let label_dir = corpus.join(label);
            std::fs::create_dir(&label_dir).unwrap();
            for i in 0..3 {
                write_test_image(&label_dir.join(format!("img_{}.png", i)));
            }
        }

        let segmenter = HandSegmenter::new(&SegmenterConfig::default());
        let extractor = small_extractor();
        let builder = DatasetBuilder::new(&segmenter, &extractor, 2);

        let dataset = builder.build(corpus).unwrap();
        assert_eq!(dataset.len(), 6);
        assert_eq!(dataset.labels(), vec!["fist".to_string(), "open".to_string()]);
        assert!(dataset
            .samples
            .iter()
            .all(|s| s.features.len() == extractor.params().descriptor_len()));

        // パス順の正規化: 先頭3サンプルはfist
        assert!(dataset.samples[..3].iter().all(|s| s.label == "fist"));
    }

    #[test]
    fn test_corrupt_image_is_skipped() {
        let dir = tempdir().unwrap();
        let corpus = dir.path();
        let label_dir = corpus.join("fist");
        std::fs::create_dir(&label_dir).unwrap();
        write_test_image(&label_dir.join("good.png"));
        std::fs::write(label_dir.join("broken.png"), b"not an image").unwrap();

        let segmenter = HandSegmenter::new(&SegmenterConfig::default());
        let extractor = small_extractor();
        let builder = DatasetBuilder::new(&segmenter, &extractor, 1);

        // 壊れた画像はスキップされ、構築は成功する
        let dataset = builder.build(corpus).unwrap();
        assert_eq!(dataset.len(), 1);
    }

    #[test]
    fn test_empty_corpus_yields_empty_dataset() {
        let dir = tempdir().unwrap();
        let segmenter = HandSegmenter::new(&SegmenterConfig::default());
        let extractor = small_extractor();
        let builder = DatasetBuilder::new(&segmenter, &extractor, 1);

        let dataset = builder.build(dir.path()).unwrap();
        assert!(dataset.is_empty());
        assert_eq!(dataset.params, Some(*extractor.params()));
    }

    #[test]
    fn test_missing_corpus_root_fails() {
        let dir = tempdir().unwrap();
        let segmenter = HandSegmenter::new(&SegmenterConfig::default());
        let extractor = small_extractor();
        let builder = DatasetBuilder::new(&segmenter, &extractor, 1);

        let result = builder.build(&dir.path().join("does_not_exist"));
        assert!(matches!(result.unwrap_err(), PipelineError::Dataset(_)));
    }

    #[test]
    fn test_parallel_build_is_reproducible() {
        let dir = tempdir().unwrap();
        let corpus = dir.path();
        let label_dir = corpus.join("open");
        std::fs::create_dir(&label_dir).unwrap();
        for i in 0..8 {
            write_test_image(&label_dir.join(format!("img_{}.png", i)));
        }

        let segmenter = HandSegmenter::new(&SegmenterConfig::default());
        let extractor = small_extractor();

        let serial = DatasetBuilder::new(&segmenter, &extractor, 1)
            .build(corpus)
            .unwrap();
        let parallel = DatasetBuilder::new(&segmenter, &extractor, 4)
            .build(corpus)
            .unwrap();

        assert_eq!(serial.samples, parallel.samples);
    }

    #[test]
    fn test_export_segmented_writes_masked_images() {
        let dir = tempdir().unwrap();
        let corpus = dir.path().join("corpus");
        let output = dir.path().join("segmented");
        let label_dir = corpus.join("fist");
        std::fs::create_dir_all(&label_dir).unwrap();
        write_test_image(&label_dir.join("img_0.png"));

        let segmenter = HandSegmenter::new(&SegmenterConfig::default());
        let exported = export_segmented(&segmenter, &corpus, &output).unwrap();
        assert_eq!(exported, 1);
        assert!(output.join("fist").join("img_0.png").exists());
    }
}
