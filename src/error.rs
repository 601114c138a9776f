use thiserror::Error;

#[derive(Error, Debug)]
pub enum BatchError {
    #[error("設定エラー: {0}")]
    Config(String),

    #[error("APIキーが設定されていません。環境変数 OPENAI_API_KEY か `photo-batch config --set-api-key YOUR_KEY` で設定してください")]
    MissingApiKey,

    #[error("ストレージエラー: {0}")]
    Storage(String),

    #[error("オブジェクトが見つかりません: {0}")]
    ObjectNotFound(String),

    #[error("結果テーブルが他の実行で更新されています: {0}")]
    Conflict(String),

    #[error("Batch API呼び出しエラー: {0}")]
    ServiceCall(String),

    #[error("Batch APIレスポンスのパースに失敗: {0}")]
    ServiceParse(String),

    #[error("画像読み込みエラー: {0}")]
    ImageLoad(String),

    #[error("JSON解析エラー: {0}")]
    JsonParse(#[from] serde_json::Error),

    #[error("IOエラー: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSVエラー: {0}")]
    Csv(#[from] csv::Error),

    #[error(transparent)]
    Common(#[from] photo_batch_common::Error),

    #[error("ジョブ {job_id} が {waited_secs} 秒以内に終了しませんでした")]
    PollTimeout { job_id: String, waited_secs: u64 },

    #[error("実行が中断されました")]
    Cancelled,
}

pub type Result<T> = std::result::Result<T, BatchError>;
