//! 進捗通知
//!
//! 通知は失敗してもパイプラインを止めない。送信失敗はログに残すだけ。

use crate::config::Config;
use crate::error::{BatchError, Result};
use tracing::{info, warn};

const TELEGRAM_API_URL: &str = "https://api.telegram.org";

#[allow(async_fn_in_trait)]
pub trait Notifier {
    async fn send(&self, message: &str) -> Result<()>;
}

/// Telegram Bot API で送る
#[derive(Debug, Clone)]
pub struct TelegramNotifier {
    client: reqwest::Client,
    bot_token: String,
    chat_id: String,
}

impl TelegramNotifier {
    pub fn new(bot_token: String, chat_id: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            bot_token,
            chat_id,
        }
    }
}

impl Notifier for TelegramNotifier {
    async fn send(&self, message: &str) -> Result<()> {
        let url = format!("{}/bot{}/sendMessage", TELEGRAM_API_URL, self.bot_token);
        let response = self
            .client
            .post(url)
            .form(&[("chat_id", self.chat_id.as_str()), ("text", message)])
            .send()
            .await
            .map_err(|e| BatchError::ServiceCall(format!("Telegram: {}", e)))?;

        if !response.status().is_success() {
            return Err(BatchError::ServiceCall(format!(
                "Telegram: status {}",
                response.status()
            )));
        }
        Ok(())
    }
}

/// ログに出すだけ（Telegram未設定時）
#[derive(Debug, Clone, Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    async fn send(&self, _message: &str) -> Result<()> {
        Ok(())
    }
}

/// 設定から選ばれた通知先
#[derive(Debug, Clone)]
pub enum ConfiguredNotifier {
    Telegram(TelegramNotifier),
    Log(LogNotifier),
}

impl ConfiguredNotifier {
    pub fn from_config(config: &Config) -> Self {
        match config.telegram_credentials() {
            Some((token, chat_id)) => Self::Telegram(TelegramNotifier::new(token, chat_id)),
            None => {
                warn!("TELEGRAM_BOT_TOKEN または TELEGRAM_CHAT_ID が未設定のため、通知はログのみ");
                Self::Log(LogNotifier)
            }
        }
    }
}

impl Notifier for ConfiguredNotifier {
    async fn send(&self, message: &str) -> Result<()> {
        match self {
            Self::Telegram(n) => n.send(message).await,
            Self::Log(n) => n.send(message).await,
        }
    }
}

/// ログに残してから通知する。送信失敗は警告のみ
pub async fn notify<N: Notifier>(notifier: &N, message: &str) {
    info!(target: "notify", "{}", message);
    if let Err(e) = notifier.send(message).await {
        warn!(error = %e, "通知の送信に失敗");
    }
}
