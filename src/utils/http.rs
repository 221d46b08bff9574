// src/utils/http.rs

//! HTTP client utilities.

use std::time::Duration;

use crate::error::{AppError, Result};
use crate::models::HttpConfig;

/// Create the HTTP client shared by every component of one run.
pub fn create_client(config: &HttpConfig) -> Result<reqwest::Client> {
    let client = reqwest::Client::builder()
        .user_agent(&config.user_agent)
        .timeout(Duration::from_secs(config.timeout_secs))
        .build()?;
    Ok(client)
}

/// Fetch a page and return its body, failing on non-success status.
pub async fn fetch_text(client: &reqwest::Client, url: &str) -> Result<String> {
    let response = client.get(url).send().await?;
    let status = response.status();
    let body = response.text().await?;
    if !status.is_success() {
        return Err(AppError::remote(url, status.as_u16(), truncate_body(&body)));
    }
    Ok(body)
}

/// Shorten a response body for error messages.
pub fn truncate_body(body: &str) -> String {
    const LIMIT: usize = 300;
    match body.char_indices().nth(LIMIT) {
        Some((idx, _)) => format!("{}…", &body[..idx]),
        None => body.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_body() {
        assert_eq!(truncate_body("short"), "short");
        let long = "あ".repeat(400);
        let cut = truncate_body(&long);
        assert_eq!(cut.chars().count(), 301);
    }

    #[test]
    fn test_create_client() {
        assert!(create_client(&HttpConfig::default()).is_ok());
    }
}
