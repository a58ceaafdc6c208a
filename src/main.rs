mod application;
mod domain;
mod infrastructure;
mod logging;

use crate::application::dataset_builder::{export_segmented, DatasetBuilder};
use crate::application::live::LiveRunner;
use crate::application::trainer;
use crate::domain::config::AppConfig;
use crate::domain::ports::CapturePort; // traitメソッド使用のため
use crate::domain::{FeatureParams, PipelineResult, Roi};
use crate::infrastructure::camera::WebcamCaptureAdapter;
use crate::infrastructure::input::EnigoDispatchAdapter;
use crate::infrastructure::model_store::TrainedModel;
use crate::infrastructure::vision::{HandSegmenter, HogExtractor};
use crate::infrastructure::dataset_store;
use crate::logging::init_logging;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// JazzHands - ジェスチャー入力コントローラ
///
/// Webカメラの手ジェスチャーをマウス・キーボード入力へ変換する。
#[derive(Parser, Debug)]
#[command(name = "jazzhands")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// サブコマンド
    #[command(subcommand)]
    command: Commands,

    /// 設定ファイルのパス
    #[arg(short, long, global = true, default_value = "config.toml")]
    config: PathBuf,

    /// ログレベル（RUST_LOG環境変数が優先される）
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    /// ログのファイル出力先ディレクトリ（省略時は標準出力）
    #[arg(long, global = true)]
    log_dir: Option<PathBuf>,
}

/// パイプライン各段階のサブコマンド
#[derive(Subcommand, Debug)]
enum Commands {
    /// デフォルト設定ファイルを書き出す
    InitConfig,

    /// コーパスのセグメンテーション結果を画像として書き出す（検査用）
    Segment {
        /// ラベルごとのサブディレクトリを含むコーパスルート
        #[arg(short = 'i', long)]
        corpus: PathBuf,

        /// 出力ディレクトリ
        #[arg(short, long, default_value = "segmented")]
        output: PathBuf,
    },

    /// ラベル付きコーパスから特徴データセットを構築する
    Dataset {
        /// ラベルごとのサブディレクトリを含むコーパスルート
        #[arg(short = 'i', long)]
        corpus: PathBuf,

        /// 出力データセットファイル
        #[arg(short, long, default_value = "dataset.json")]
        output: PathBuf,
    },

    /// データセットから分類器を学習し、最良モデルを保存する
    Train {
        /// 入力データセットファイル
        #[arg(short = 'i', long, default_value = "dataset.json")]
        dataset: PathBuf,

        /// 出力モデルファイル
        #[arg(short, long, default_value = "model.json")]
        output: PathBuf,
    },

    /// ライブ分類を実行し、ジェスチャーを入力イベントへ変換する
    Run {
        /// 学習済みモデルファイル
        #[arg(short, long, default_value = "model.json")]
        model: PathBuf,
    },
}

fn main() {
    let cli = Cli::parse();

    // ログシステムの初期化
    // 注意: _guardはmain終了まで保持する必要がある（Dropでログスレッドが終了）
    let _guard = init_logging(&cli.log_level, false, cli.log_dir.clone());

    tracing::info!("JazzHands starting...");

    match run(cli) {
        Ok(_) => {
            tracing::info!("JazzHands terminated gracefully.");
        }
        Err(e) => {
            tracing::error!("Fatal error: {:?}", e);
            std::process::exit(1);
        }
    }
}

/// アプリケーションのメイン処理
fn run(cli: Cli) -> anyhow::Result<()> {
    if matches!(cli.command, Commands::InitConfig) {
        AppConfig::write_default(&cli.config)?;
        tracing::info!(path = ?cli.config, "default configuration written");
        return Ok(());
    }

    // 設定ファイルの読み込み（存在しない場合はデフォルト設定を使用）
    let config = match AppConfig::from_file(&cli.config) {
        Ok(config) => {
            tracing::info!(path = ?cli.config, "loaded configuration");
            config
        }
        Err(e) => {
            tracing::warn!("Failed to load {:?}: {}, using defaults", cli.config, e);
            AppConfig::default()
        }
    };

    // 設定の検証
    config.validate()?;
    tracing::info!("Configuration validated successfully");

    match cli.command {
        Commands::InitConfig => unreachable!("handled above"),
        Commands::Segment { corpus, output } => run_segment(&config, &corpus, &output)?,
        Commands::Dataset { corpus, output } => run_dataset(&config, &corpus, &output)?,
        Commands::Train { dataset, output } => run_train(&config, &dataset, &output)?,
        Commands::Run { model } => run_live(&config, &model)?,
    }

    Ok(())
}

/// segment段階: セグメンテーション結果画像の書き出し
fn run_segment(
    config: &AppConfig,
    corpus: &PathBuf,
    output: &PathBuf,
) -> PipelineResult<()> {
    let segmenter = HandSegmenter::new(&config.segmenter);
    let exported = export_segmented(&segmenter, corpus, output)?;
    tracing::info!(exported, "segment stage finished");
    Ok(())
}

/// dataset段階: 特徴データセットの構築と保存
fn run_dataset(config: &AppConfig, corpus: &PathBuf, output: &PathBuf) -> PipelineResult<()> {
    let segmenter = HandSegmenter::new(&config.segmenter);
    let extractor = HogExtractor::new(config.features.clone().into());
    let builder = DatasetBuilder::new(&segmenter, &extractor, config.dataset.workers as usize);

    let dataset = builder.build(corpus)?;
    dataset_store::save(&dataset, output)?;
    tracing::info!(
        samples = dataset.len(),
        labels = dataset.labels().len(),
        path = ?output,
        "dataset stage finished"
    );
    Ok(())
}

/// train段階: 分類器の学習・選択・保存
fn run_train(config: &AppConfig, dataset_path: &PathBuf, output: &PathBuf) -> PipelineResult<()> {
    let dataset = dataset_store::load(dataset_path)?;
    tracing::info!(samples = dataset.len(), path = ?dataset_path, "dataset loaded");

    let model = trainer::train(&dataset, &config.trainer)?;
    model.save(output)?;
    tracing::info!(
        family = %model.metadata.family,
        accuracy = model.metadata.accuracy,
        path = ?output,
        "train stage finished"
    );
    Ok(())
}

/// run段階: ライブ分類ループ
fn run_live(config: &AppConfig, model_path: &PathBuf) -> PipelineResult<()> {
    // モデル読み込みと設定互換性チェックはカメラを開く前に行う
    // （不一致なら1フレームもキャプチャせずに停止する）
    let model = TrainedModel::load(model_path)?;
    let params: FeatureParams = config.features.clone().into();
    let extractor = HogExtractor::new(params);
    model.ensure_compatible(extractor.params())?;

    tracing::info!(
        family = %model.metadata.family,
        accuracy = model.metadata.accuracy,
        labels = ?model.metadata.labels,
        "model loaded"
    );

    let segmenter = HandSegmenter::new(&config.segmenter);
    let capture = WebcamCaptureAdapter::new(config.live.camera_index)?;
    let dispatch = EnigoDispatchAdapter::new()?;

    // ROIはデバイス解像度を基準に中心配置で解決する
    let roi: Option<Roi> = match &config.segmenter.roi {
        Some(roi_config) => {
            let info = capture.device_info();
            Some(roi_config.to_roi_centered(info.width, info.height)?)
        }
        None => None,
    };

    let mut runner = LiveRunner::new(
        capture,
        dispatch,
        segmenter,
        extractor,
        model,
        config.live.clone(),
        &config.actions,
        roi,
    )?;

    // キャプチャ失敗（カメラ切断等）でErrを返して終了する。
    // カメラはアダプタのDropで解放される。
    runner.run()
}
