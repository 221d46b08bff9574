//! Telegram Bot API notifier.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

use crate::error::{AppError, Result};
use crate::services::notify::Notifier;
use crate::utils::http::truncate_body;

pub const TOKEN_ENV: &str = "TELEGRAM_BOT_TOKEN";
pub const CHAT_ID_ENV: &str = "TELEGRAM_CHAT_ID";

const SERVICE: &str = "Telegram";

#[derive(Debug, Deserialize)]
struct ApiResponse {
    #[serde(default)]
    ok: bool,
    #[serde(default)]
    description: Option<String>,
}

#[derive(Debug, Clone)]
pub struct TelegramNotifier {
    client: reqwest::Client,
    api_base: String,
    token: Option<String>,
    chat_id: Option<String>,
}

impl TelegramNotifier {
    pub fn new(
        client: reqwest::Client,
        api_base: &str,
        token: Option<String>,
        chat_id: Option<String>,
    ) -> Self {
        Self {
            client,
            api_base: api_base.trim_end_matches('/').to_string(),
            token: token.filter(|t| !t.trim().is_empty()),
            chat_id: chat_id.filter(|c| !c.trim().is_empty()),
        }
    }

    pub fn from_env(client: reqwest::Client, api_base: &str) -> Self {
        Self::new(
            client,
            api_base,
            std::env::var(TOKEN_ENV).ok(),
            std::env::var(CHAT_ID_ENV).ok(),
        )
    }
}

#[async_trait]
impl Notifier for TelegramNotifier {
    fn name(&self) -> &'static str {
        "telegram"
    }

    fn is_configured(&self) -> bool {
        self.token.is_some() && self.chat_id.is_some()
    }

    async fn send(&self, text: &str) -> Result<()> {
        let (Some(token), Some(chat_id)) = (&self.token, &self.chat_id) else {
            return Err(AppError::config(format!(
                "{TOKEN_ENV} or {CHAT_ID_ENV} is not set"
            )));
        };

        let url = format!("{}/bot{}/sendMessage", self.api_base, token);
        let payload = json!({
            "chat_id": chat_id,
            "text": text,
            "disable_web_page_preview": true,
        });
        // The token is part of the URL; keep it out of error text.
        let response = self
            .client
            .post(&url)
            .json(&payload)
            .send()
            .await
            .map_err(|e| AppError::Http(e.without_url()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| AppError::Http(e.without_url()))?;
        if status != reqwest::StatusCode::OK {
            return Err(AppError::remote(SERVICE, status.as_u16(), truncate_body(&body)));
        }

        let parsed: ApiResponse = serde_json::from_str(&body)?;
        if !parsed.ok {
            return Err(AppError::remote(
                SERVICE,
                status.as_u16(),
                parsed.description.unwrap_or_else(|| truncate_body(&body)),
            ));
        }
        Ok(())
    }
}
