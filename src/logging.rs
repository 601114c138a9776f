use tracing_subscriber::EnvFilter;

/// `PHOTO_BATCH_LOG`、`RUST_LOG` の順にフィルタを読み、無ければ既定レベルで初期化
///
/// ログのフィールド:
/// - チャンク単位のイベントには `chunk`（1始まり）
/// - ジョブ単位のイベントには `job_id`
/// - 画像単位のイベントには `custom_id`
pub fn init_tracing(verbose: bool) {
    let filter = env_filter(if verbose { "debug" } else { "info" });
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

pub fn env_filter(default_level: &str) -> EnvFilter {
    EnvFilter::try_from_env("PHOTO_BATCH_LOG")
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new(default_level))
}
