use crate::error::{BatchError, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Batch APIの1ジョブあたりの最大画像数（これより大きくはできない）
pub const MAX_BATCH_SIZE: usize = 200;

pub const DEFAULT_BATCH_SIZE: usize = MAX_BATCH_SIZE;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub bucket: String,
    pub source_prefix: String,
    pub results_key: String,
    pub work_dir: PathBuf,
    pub batch_size: usize,
    pub poll_interval_secs: u64,
    /// 1ジョブの待ち時間上限（未設定なら無制限）
    pub poll_timeout_secs: Option<u64>,
    pub model: String,
    pub max_tokens: u32,
    pub max_image_size: u32,
    pub api_base_url: String,
    pub completion_window: String,
    pub api_key: Option<String>,
    pub telegram_bot_token: Option<String>,
    pub telegram_chat_id: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bucket: "my-igpop-photo-bucket-2025".into(),
            source_prefix: "ig_pics/".into(),
            results_key: "results/image_analysis_results.csv".into(),
            work_dir: PathBuf::from("/tmp/s3_images"),
            batch_size: DEFAULT_BATCH_SIZE,
            poll_interval_secs: 60,
            poll_timeout_secs: None,
            model: "gpt-4o-mini".into(),
            max_tokens: 800,
            max_image_size: 1568,
            api_base_url: "https://api.openai.com".into(),
            completion_window: "24h".into(),
            api_key: None,
            telegram_bot_token: None,
            telegram_chat_id: None,
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path()?;

        if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            let config: Config = serde_json::from_str(&content)?;
            Ok(config)
        } else {
            Ok(Self::default())
        }
    }

    pub fn save(&self) -> Result<()> {
        let config_path = Self::config_path()?;

        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(&config_path, content)?;
        Ok(())
    }

    pub fn config_path() -> Result<PathBuf> {
        let home = dirs::home_dir()
            .ok_or_else(|| BatchError::Config("ホームディレクトリが見つかりません".into()))?;
        Ok(home.join(".config").join("photo-batch").join("config.json"))
    }

    pub fn validate(&self) -> Result<()> {
        if self.batch_size == 0 || self.batch_size > MAX_BATCH_SIZE {
            return Err(BatchError::Config(format!(
                "batch_size は1以上{}以下にしてください（指定値: {}）",
                MAX_BATCH_SIZE, self.batch_size
            )));
        }
        if self.poll_interval_secs == 0 {
            return Err(BatchError::Config("poll_interval_secs は1以上にしてください".into()));
        }
        if self.results_key.trim().is_empty() {
            return Err(BatchError::Config("results_key が空です".into()));
        }
        Ok(())
    }

    pub fn get_api_key(&self) -> Result<String> {
        // 環境変数を優先
        if let Ok(key) = std::env::var("OPENAI_API_KEY") {
            if !key.trim().is_empty() {
                return Ok(key);
            }
        }

        self.api_key.clone().ok_or(BatchError::MissingApiKey)
    }

    pub fn set_api_key(&mut self, key: String) -> Result<()> {
        self.api_key = Some(key);
        self.save()
    }

    /// Telegramの (bot token, chat id)。どちらかが無ければ None
    pub fn telegram_credentials(&self) -> Option<(String, String)> {
        let token = env_or("TELEGRAM_BOT_TOKEN", &self.telegram_bot_token)?;
        let chat_id = env_or("TELEGRAM_CHAT_ID", &self.telegram_chat_id)?;
        Some((token, chat_id))
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn poll_timeout(&self) -> Option<Duration> {
        self.poll_timeout_secs.map(Duration::from_secs)
    }
}

fn env_or(key: &str, fallback: &Option<String>) -> Option<String> {
    std::env::var(key)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .or_else(|| fallback.clone())
}
