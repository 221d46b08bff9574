//! ServerChan (WeChat push) notifier.

use async_trait::async_trait;

use crate::error::{AppError, Result};
use crate::services::notify::Notifier;
use crate::utils::http::truncate_body;

pub const SENDKEY_ENV: &str = "WECHAT_SENDKEY";

#[derive(Debug, Clone)]
pub struct ServerChanNotifier {
    client: reqwest::Client,
    api_base: String,
    send_key: Option<String>,
    title: String,
}

impl ServerChanNotifier {
    pub fn new(
        client: reqwest::Client,
        api_base: &str,
        send_key: Option<String>,
        title: &str,
    ) -> Self {
        Self {
            client,
            api_base: api_base.trim_end_matches('/').to_string(),
            send_key: send_key.filter(|k| !k.trim().is_empty()),
            title: title.to_string(),
        }
    }

    pub fn from_env(client: reqwest::Client, api_base: &str, title: &str) -> Self {
        Self::new(client, api_base, std::env::var(SENDKEY_ENV).ok(), title)
    }
}

#[async_trait]
impl Notifier for ServerChanNotifier {
    fn name(&self) -> &'static str {
        "serverchan"
    }

    fn is_configured(&self) -> bool {
        self.send_key.is_some()
    }

    async fn send(&self, text: &str) -> Result<()> {
        let Some(key) = &self.send_key else {
            return Err(AppError::config(format!("{SENDKEY_ENV} is not set")));
        };

        let url = format!("{}/{}.send", self.api_base, key);
        let form = [("title", self.title.as_str()), ("desp", text)];
        // The key is part of the URL; keep it out of error text.
        let response = self
            .client
            .post(&url)
            .form(&form)
            .send()
            .await
            .map_err(|e| AppError::Http(e.without_url()))?;

        let status = response.status();
        if status != reqwest::StatusCode::OK {
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::remote("ServerChan", status.as_u16(), truncate_body(&body)));
        }
        Ok(())
    }
}
