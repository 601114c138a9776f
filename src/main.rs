use anyhow::Context;
use clap::Parser;
use photo_batch::cli::{Cli, Commands};
use photo_batch::config::Config;
use photo_batch::metrics::RequestMetrics;
use photo_batch::notify::{notify, ConfiguredNotifier};
use photo_batch::payload::VisionPayloadBuilder;
use photo_batch::pipeline::{Pipeline, PipelineOptions, RunReport};
use photo_batch::service::OpenAiBatchService;
use photo_batch::storage::{LocalStore, ObjectStore, S3Store};
use photo_batch::store::ResultStore;
use photo_batch::{error, logging};
use std::path::PathBuf;
use tokio::sync::watch;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    logging::init_tracing(cli.verbose);
    let mut config = Config::load().context("設定ファイルの読み込みに失敗")?;

    match cli.command {
        Commands::Run {
            local,
            bucket,
            prefix,
            batch_size,
            poll_interval,
            poll_timeout,
        } => {
            if let Some(bucket) = bucket {
                config.bucket = bucket;
            }
            if let Some(prefix) = prefix {
                config.source_prefix = prefix;
            }
            if let Some(size) = batch_size {
                config.batch_size = size;
            }
            if let Some(secs) = poll_interval {
                config.poll_interval_secs = secs;
            }
            if poll_timeout.is_some() {
                config.poll_timeout_secs = poll_timeout;
            }
            config.validate()?;

            let code = run_pipeline(&config, local).await?;
            std::process::exit(code);
        }

        Commands::Status { local, bucket } => {
            if let Some(bucket) = bucket {
                config.bucket = bucket;
            }
            match local {
                Some(root) => print_status(&LocalStore::new(root), &config).await?,
                None => print_status(&S3Store::from_env(&config.bucket).await, &config).await?,
            }
        }

        Commands::Config { set_api_key, show } => {
            if let Some(key) = set_api_key {
                config.set_api_key(key)?;
                println!("✔ APIキーを設定しました");
            }

            if show {
                println!("設定 ({}):", Config::config_path()?.display());
                println!("  バケット: {}", config.bucket);
                println!("  画像プレフィックス: {}", config.source_prefix);
                println!("  結果テーブル: {}", config.results_key);
                println!("  作業ディレクトリ: {}", config.work_dir.display());
                println!("  バッチサイズ: {}", config.batch_size);
                println!("  状態確認の間隔: {}秒", config.poll_interval_secs);
                match config.poll_timeout_secs {
                    Some(secs) => println!("  待ち時間上限: {}秒", secs),
                    None => println!("  待ち時間上限: なし"),
                }
                println!("  モデル: {}", config.model);
                println!("  最大画像サイズ: {}px", config.max_image_size);
                println!(
                    "  APIキー: {}",
                    if config.get_api_key().is_ok() { "設定済み" } else { "未設定" }
                );
                println!(
                    "  Telegram通知: {}",
                    if config.telegram_credentials().is_some() { "有効" } else { "無効" }
                );
            }
        }
    }

    Ok(())
}

/// パイプラインを実行して終了コードを返す
async fn run_pipeline(config: &Config, local: Option<PathBuf>) -> anyhow::Result<i32> {
    let api_key = config.get_api_key()?;
    let service = OpenAiBatchService::new(api_key, &config.api_base_url, &config.completion_window);
    let notifier = ConfiguredNotifier::from_config(config);
    let builder = VisionPayloadBuilder::from_config(config);
    let options = PipelineOptions::from_config(config);
    let cancel = cancel_on_ctrl_c();

    let result = match local {
        Some(root) => {
            info!(root = %root.display(), "ローカルディレクトリをバケットとして使用");
            let store = LocalStore::new(root);
            Pipeline::new(&store, &service, &notifier, &builder, options)
                .run(cancel)
                .await
        }
        None => {
            let store = S3Store::from_env(&config.bucket).await;
            Pipeline::new(&store, &service, &notifier, &builder, options)
                .run(cancel)
                .await
        }
    };

    match result {
        Ok(report) => {
            print_report(&report);
            Ok(report.exit_code())
        }
        Err(e) => {
            let message = match &e {
                error::BatchError::Cancelled => "⛔ 実行を中断しました。保存済みのバッチは次回スキップされます".to_string(),
                other => format!("❌ エラーが発生しました: {}", other),
            };
            notify(&notifier, &message).await;
            Err(e.into())
        }
    }
}

/// Ctrl-C で true になる中断シグナル
fn cancel_on_ctrl_c() -> watch::Receiver<bool> {
    let (tx, rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Ctrl-C を受信、現在のジョブ待ちを中断します");
            let _ = tx.send(true);
        }
    });
    rx
}

fn print_report(report: &RunReport) {
    println!("\n=== 実行結果 ===");
    println!("  画像: {}枚（処理済み {}枚、対象 {}枚）", report.total_images, report.skipped, report.pending);
    println!(
        "  バッチ: {}（完了 {}、失敗 {}）",
        report.chunks, report.completed_chunks, report.failed_chunks
    );
    println!("  追加行数: {}", report.rows_added);
    if report.dropped_images > 0 {
        println!("  リクエスト作成失敗: {}枚", report.dropped_images);
    }
    if report.incomplete_rows + report.decode_failures > 0 {
        println!(
            "  未完了 {}件 / デコード失敗 {}件（次回再投入）",
            report.incomplete_rows, report.decode_failures
        );
    }
    println!("  ストレージ呼び出し: {}", report.requests);
}

async fn print_status<S: ObjectStore>(store: &S, config: &Config) -> anyhow::Result<()> {
    let metrics = RequestMetrics::new();
    let (result_store, table) = ResultStore::load(store, &config.results_key, &metrics)
        .await
        .with_context(|| format!("結果テーブル {} の読み込みに失敗", config.results_key))?;
    let summary = table.summary();

    println!("結果テーブル: {}", result_store.key());
    println!("  バージョン: {}", result_store.version().unwrap_or("(未作成)"));
    println!("  行数: {}", summary.rows);
    println!("  列数: {}", summary.columns);
    for (folder, rows) in &summary.folders {
        println!("  {}: {}行", folder, rows);
    }
    Ok(())
}
