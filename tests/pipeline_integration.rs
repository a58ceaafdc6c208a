//! オフラインパイプラインの統合テスト
//!
//! 合成コーパス → データセット構築 → 学習 → モデル保存/復元 →
//! ライブ分類（モックアダプタ）までの一連の流れを検証する。

use std::path::Path;

use JazzHands::application::dataset_builder::DatasetBuilder;
use JazzHands::application::live::LiveRunner;
use JazzHands::application::trainer;
use JazzHands::domain::config::{
    ActionBinding, ActionKind, MouseButtonConfig, SegmenterConfig, TrainerConfig,
};
use JazzHands::domain::ports::{InputAction, MouseButton};
use JazzHands::domain::{FeatureParams, Frame, LiveConfig, PipelineError};
use JazzHands::infrastructure::dataset_store;
use JazzHands::infrastructure::mock_camera::MockCaptureAdapter;
use JazzHands::infrastructure::mock_input::MockDispatchAdapter;
use JazzHands::infrastructure::model_store::TrainedModel;
use JazzHands::infrastructure::vision::{HandSegmenter, HogExtractor};

const IMAGE_SIZE: u32 = 32;
const SKIN: [u8; 3] = [210, 160, 130];
const BACKGROUND: [u8; 3] = [20, 180, 40];

/// テスト用の特徴抽出パラメータ（32x32 → 324次元）
fn test_params() -> FeatureParams {
    FeatureParams {
        resize_width: 32,
        resize_height: 32,
        cell_size: 8,
        block_size: 2,
        orientation_bins: 9,
    }
}

fn test_live_config() -> LiveConfig {
    LiveConfig {
        camera_index: 0,
        mirror: false,
        min_coverage: 30,
        confirmation_threshold: 2,
        idle_reset_threshold: 3,
        min_confidence: None,
        stats_interval_sec: 3600,
    }
}

/// 「グー」: 中央の肌色ブロブ
fn fist_image(variant: u32) -> image::RgbImage {
    let offset = variant % 3;
    image::RgbImage::from_fn(IMAGE_SIZE, IMAGE_SIZE, |x, y| {
        let cx = 16 + offset;
        let in_blob = x.abs_diff(cx) < 7 && y.abs_diff(16) < 7;
        image::Rgb(if in_blob { SKIN } else { BACKGROUND })
    })
}

/// 「パー」: 肌色の縦ストライプ（指を模す）
fn open_image(variant: u32) -> image::RgbImage {
    let offset = variant % 2;
    image::RgbImage::from_fn(IMAGE_SIZE, IMAGE_SIZE, |x, y| {
        let stripe = ((x + offset) / 3) % 2 == 0;
        let in_hand = y > 6 && y < 28 && stripe;
        image::Rgb(if in_hand { SKIN } else { BACKGROUND })
    })
}

/// RgbImageをFrameへ変換
fn to_frame(image: &image::RgbImage) -> Frame {
    Frame::new(image.clone().into_raw(), image.width(), image.height())
}

/// 合成コーパスをディスクへ書き出す
fn write_corpus(root: &Path, per_label: u32) {
    for label in ["fist", "open"] {
        let dir = root.join(label);
        std::fs::create_dir_all(&dir).unwrap();
        for i in 0..per_label {
            let image = match label {
                "fist" => fist_image(i),
                _ => open_image(i),
            };
            image.save(dir.join(format!("img_{:02}.png", i))).unwrap();
        }
    }
}

#[test]
fn test_full_offline_pipeline() {
    let dir = tempfile::tempdir().unwrap();
    let corpus = dir.path().join("corpus");
    write_corpus(&corpus, 12);

    // データセット構築
    let segmenter = HandSegmenter::new(&SegmenterConfig::default());
    let extractor = HogExtractor::new(test_params());
    let builder = DatasetBuilder::new(&segmenter, &extractor, 2);
    let dataset = builder.build(&corpus).unwrap();

    assert_eq!(dataset.len(), 24);
    assert_eq!(dataset.labels(), vec!["fist".to_string(), "open".to_string()]);

    // シリアライズ往復で完全一致
    let dataset_path = dir.path().join("dataset.json");
    dataset_store::save(&dataset, &dataset_path).unwrap();
    let reloaded = dataset_store::load(&dataset_path).unwrap();
    assert_eq!(reloaded.samples, dataset.samples);
    assert_eq!(reloaded.params, dataset.params);

    // 学習と選択
    let model = trainer::train(&reloaded, &TrainerConfig::default()).unwrap();
    assert_eq!(model.metadata.report.len(), 3);
    assert!(model.metadata.accuracy > 0.5, "accuracy was {}", model.metadata.accuracy);

    // モデル保存 → 復元 → 予測一致
    let model_path = dir.path().join("model.json");
    model.save(&model_path).unwrap();
    let restored = TrainedModel::load(&model_path).unwrap();
    assert_eq!(restored.metadata.family, model.metadata.family);

    let probe = dataset.samples[0].clone();
    assert_eq!(
        restored.predict(&probe.features).unwrap().label,
        model.predict(&probe.features).unwrap().label
    );
}

#[test]
fn test_train_is_reproducible_across_runs() {
    let dir = tempfile::tempdir().unwrap();
    let corpus = dir.path().join("corpus");
    write_corpus(&corpus, 10);

    let segmenter = HandSegmenter::new(&SegmenterConfig::default());
    let extractor = HogExtractor::new(test_params());
    let builder = DatasetBuilder::new(&segmenter, &extractor, 1);
    let dataset = builder.build(&corpus).unwrap();

    let config = TrainerConfig::default();
    let a = trainer::train(&dataset, &config).unwrap();
    let b = trainer::train(&dataset, &config).unwrap();

    assert_eq!(a.metadata.family, b.metadata.family);
    for (sa, sb) in a.metadata.report.iter().zip(b.metadata.report.iter()) {
        assert_eq!(sa.family, sb.family);
        assert!((sa.accuracy - sb.accuracy).abs() < 1e-6);
    }
}

#[test]
fn test_live_loop_dispatches_confirmed_gesture() {
    let dir = tempfile::tempdir().unwrap();
    let corpus = dir.path().join("corpus");
    write_corpus(&corpus, 12);

    let segmenter = HandSegmenter::new(&SegmenterConfig::default());
    let extractor = HogExtractor::new(test_params());
    let dataset = DatasetBuilder::new(&segmenter, &extractor, 1)
        .build(&corpus)
        .unwrap();
    let model = trainer::train(&dataset, &TrainerConfig::default()).unwrap();

    // グー3フレーム → 確認閾値2でACTIVE遷移、一度だけクリック送出
    let frames = vec![
        to_frame(&fist_image(0)),
        to_frame(&fist_image(0)),
        to_frame(&fist_image(0)),
    ];
    let bindings = vec![ActionBinding {
        label: "fist".to_string(),
        action: ActionKind::Click { button: MouseButtonConfig::Left },
        continuous: false,
    }];

    let mut runner = LiveRunner::new(
        MockCaptureAdapter::new(frames, IMAGE_SIZE, IMAGE_SIZE),
        MockDispatchAdapter::new(),
        HandSegmenter::new(&SegmenterConfig::default()),
        HogExtractor::new(test_params()),
        model,
        test_live_config(),
        &bindings,
        None,
    )
    .unwrap();

    // フレームが尽きた時点でキャプチャ失敗 → ループ終了（致命的エラー）
    let result = runner.run();
    assert!(matches!(result.unwrap_err(), PipelineError::Capture(_)));

    assert_eq!(
        runner.dispatcher().dispatched(),
        &[InputAction::Click(MouseButton::Left)]
    );
}

#[test]
fn test_live_startup_rejects_mismatched_model() {
    let dir = tempfile::tempdir().unwrap();
    let corpus = dir.path().join("corpus");
    write_corpus(&corpus, 8);

    let segmenter = HandSegmenter::new(&SegmenterConfig::default());
    let extractor = HogExtractor::new(test_params());
    let dataset = DatasetBuilder::new(&segmenter, &extractor, 1)
        .build(&corpus)
        .unwrap();
    let model = trainer::train(&dataset, &TrainerConfig::default()).unwrap();

    // 実行側の抽出器は64x64（1764次元）、モデルは32x32（324次元）
    let capture = MockCaptureAdapter::new(vec![to_frame(&fist_image(0))], IMAGE_SIZE, IMAGE_SIZE);
    let result = LiveRunner::new(
        capture,
        MockDispatchAdapter::new(),
        HandSegmenter::new(&SegmenterConfig::default()),
        HogExtractor::new(FeatureParams::default()),
        model,
        test_live_config(),
        &[],
        None,
    );

    match result {
        Err(PipelineError::ConfigMismatch { expected, actual }) => {
            assert_eq!(expected, 324);
            assert_eq!(actual, 1764);
        }
        _ => panic!("expected fatal ConfigMismatch at startup"),
    }
}

#[test]
fn test_empty_corpus_builds_empty_dataset_and_train_fails_cleanly() {
    let dir = tempfile::tempdir().unwrap();
    let corpus = dir.path().join("empty_corpus");
    std::fs::create_dir_all(&corpus).unwrap();

    let segmenter = HandSegmenter::new(&SegmenterConfig::default());
    let extractor = HogExtractor::new(test_params());

    // 空コーパス → 空データセット（クラッシュしない）
    let dataset = DatasetBuilder::new(&segmenter, &extractor, 1)
        .build(&corpus)
        .unwrap();
    assert!(dataset.is_empty());

    // 空データセットでの学習は明確なエラー
    let result = trainer::train(&dataset, &TrainerConfig::default());
    assert!(matches!(result.unwrap_err(), PipelineError::Dataset(_)));
}
