use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "photo-batch")]
#[command(about = "S3画像のバッチAI解析・結果CSV蓄積ツール", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// 詳細ログを出力
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// 未処理の画像をバッチ解析して結果テーブルに追記
    Run {
        /// S3の代わりにローカルディレクトリをバケットとして使う
        #[arg(long)]
        local: Option<PathBuf>,

        /// バケット名（設定ファイルより優先）
        #[arg(long)]
        bucket: Option<String>,

        /// 画像フォルダのルートプレフィックス
        #[arg(short, long)]
        prefix: Option<String>,

        /// 1ジョブあたりの画像数
        #[arg(short, long)]
        batch_size: Option<usize>,

        /// 状態確認の間隔（秒）
        #[arg(long)]
        poll_interval: Option<u64>,

        /// 1ジョブの待ち時間上限（秒）
        #[arg(long)]
        poll_timeout: Option<u64>,
    },

    /// 結果テーブルの概要を表示
    Status {
        /// S3の代わりにローカルディレクトリをバケットとして使う
        #[arg(long)]
        local: Option<PathBuf>,

        /// バケット名（設定ファイルより優先）
        #[arg(long)]
        bucket: Option<String>,
    },

    /// 設定
    Config {
        /// APIキーを設定
        #[arg(long)]
        set_api_key: Option<String>,

        /// 現在の設定を表示
        #[arg(long)]
        show: bool,
    },
}
