//! Chat notification sinks.
//!
//! Delivery is fire-and-forget: a notifier without credentials is skipped,
//! and a failed delivery is logged and reported as `false`.

pub mod serverchan;
pub mod telegram;

use async_trait::async_trait;

use crate::error::Result;
use crate::models::NotifyConfig;

pub use serverchan::ServerChanNotifier;
pub use telegram::TelegramNotifier;

/// Delivers a summary text to one chat service.
#[async_trait]
pub trait Notifier: Send + Sync {
    fn name(&self) -> &'static str;

    /// Whether the credentials needed for delivery are present.
    fn is_configured(&self) -> bool;

    async fn send(&self, text: &str) -> Result<()>;

    /// Deliver `text`; never fails, returns whether it arrived.
    async fn notify(&self, text: &str) -> bool {
        if !self.is_configured() {
            log::warn!("[{}] credentials are not configured; skipping", self.name());
            return false;
        }
        match self.send(text).await {
            Ok(()) => {
                log::info!("[{}] message sent", self.name());
                true
            }
            Err(e) => {
                log::error!("[{}] send failed: {}", self.name(), e);
                false
            }
        }
    }
}

/// Sends to every inner notifier; succeeds if any of them did.
pub struct FanoutNotifier {
    notifiers: Vec<Box<dyn Notifier>>,
}

impl FanoutNotifier {
    pub fn new(notifiers: Vec<Box<dyn Notifier>>) -> Self {
        Self { notifiers }
    }

    /// Telegram and ServerChan, with credentials from the environment.
    pub fn from_env(client: &reqwest::Client, config: &NotifyConfig) -> Self {
        Self::new(vec![
            Box::new(TelegramNotifier::from_env(client.clone(), &config.telegram_api)),
            Box::new(ServerChanNotifier::from_env(
                client.clone(),
                &config.serverchan_api,
                &config.title,
            )),
        ])
    }
}

#[async_trait]
impl Notifier for FanoutNotifier {
    fn name(&self) -> &'static str {
        "fanout"
    }

    fn is_configured(&self) -> bool {
        self.notifiers.iter().any(|n| n.is_configured())
    }

    async fn send(&self, text: &str) -> Result<()> {
        let mut last_error = None;
        let mut delivered = false;
        for notifier in self.notifiers.iter().filter(|n| n.is_configured()) {
            match notifier.send(text).await {
                Ok(()) => delivered = true,
                Err(e) => last_error = Some(e),
            }
        }
        match (delivered, last_error) {
            (false, Some(e)) => Err(e),
            _ => Ok(()),
        }
    }

    async fn notify(&self, text: &str) -> bool {
        let mut delivered = false;
        for notifier in &self.notifiers {
            delivered |= notifier.notify(text).await;
        }
        delivered
    }
}
