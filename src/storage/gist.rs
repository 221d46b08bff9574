//! GitHub gist storage.
//!
//! Gists are located by their description among the token owner's gists,
//! so the first run creates them and later runs update them in place.
//! The state gist is private; the report gist is public and its page URL
//! is what the summary links to.

use std::collections::HashMap;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

use crate::error::{AppError, Result};
use crate::models::PersistedState;
use crate::storage::{ReportPublisher, StateStore};
use crate::utils::http::truncate_body;

/// Environment variable holding the gist token.
pub const TOKEN_ENV: &str = "GIST_TOKEN";

const SERVICE: &str = "GitHub gist API";

/// A gist as returned by the listing endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct Gist {
    pub id: String,

    #[serde(default)]
    pub description: Option<String>,

    #[serde(default)]
    pub html_url: Option<String>,

    #[serde(default)]
    pub files: HashMap<String, GistFile>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct GistFile {
    #[serde(default)]
    pub raw_url: Option<String>,

    /// Only present when the API did not truncate the file
    #[serde(default)]
    pub content: Option<String>,
}

/// Minimal client for the gist endpoints the watcher uses.
#[derive(Debug, Clone)]
pub struct GistClient {
    client: reqwest::Client,
    api_base: String,
    token: Option<String>,
}

impl GistClient {
    pub fn new(client: reqwest::Client, api_base: &str, token: Option<String>) -> Self {
        Self {
            client,
            api_base: api_base.trim_end_matches('/').to_string(),
            token: token.filter(|t| !t.trim().is_empty()),
        }
    }

    /// Read the token from [`TOKEN_ENV`].
    pub fn from_env(client: reqwest::Client, api_base: &str) -> Self {
        Self::new(client, api_base, std::env::var(TOKEN_ENV).ok())
    }

    fn token(&self) -> Result<&str> {
        self.token
            .as_deref()
            .ok_or_else(|| AppError::config(format!("{TOKEN_ENV} is not set")))
    }

    fn request(&self, method: reqwest::Method, path: &str) -> Result<reqwest::RequestBuilder> {
        let token = self.token()?;
        Ok(self
            .client
            .request(method, format!("{}{}", self.api_base, path))
            .header("Authorization", format!("token {token}"))
            .header("Accept", "application/vnd.github+json"))
    }

    /// First gist of the token owner whose description matches exactly.
    pub async fn find_by_description(&self, description: &str) -> Result<Option<Gist>> {
        let response = self
            .request(reqwest::Method::GET, "/gists?per_page=100")?
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::remote(SERVICE, status.as_u16(), truncate_body(&body)));
        }
        let gists: Vec<Gist> = response.json().await?;
        Ok(gists
            .into_iter()
            .find(|g| g.description.as_deref() == Some(description)))
    }

    /// Full content of a gist file from its raw URL.
    pub async fn fetch_raw(&self, raw_url: &str) -> Result<String> {
        let response = self.client.get(raw_url).send().await?;
        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(AppError::remote(raw_url, status.as_u16(), truncate_body(&body)));
        }
        Ok(body)
    }

    /// Update the gist with this description, or create it. Returns its page URL.
    pub async fn upsert(
        &self,
        description: &str,
        file_name: &str,
        content: &str,
        public: bool,
    ) -> Result<String> {
        let files = json!({ file_name: { "content": content } });
        let existing = self.find_by_description(description).await?;

        let request = match &existing {
            Some(gist) => self
                .request(reqwest::Method::PATCH, &format!("/gists/{}", gist.id))?
                .json(&json!({ "description": description, "files": files })),
            None => self.request(reqwest::Method::POST, "/gists")?.json(&json!({
                "description": description,
                "public": public,
                "files": files,
            })),
        };

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::remote(SERVICE, status.as_u16(), truncate_body(&body)));
        }
        let saved: Gist = response.json().await?;
        log::debug!(
            "{} gist {} ({})",
            if existing.is_some() { "Updated" } else { "Created" },
            saved.id,
            description
        );
        Ok(saved
            .html_url
            .unwrap_or_else(|| format!("https://gist.github.com/{}", saved.id)))
    }
}

/// Run state kept in a private gist.
#[derive(Debug, Clone)]
pub struct GistStateStore {
    gist: GistClient,
    description: String,
    file_name: String,
}

impl GistStateStore {
    pub fn new(gist: GistClient, description: &str, file_name: &str) -> Self {
        Self {
            gist,
            description: description.to_string(),
            file_name: file_name.to_string(),
        }
    }
}

#[async_trait]
impl StateStore for GistStateStore {
    fn location(&self) -> String {
        format!("gist '{}'", self.description)
    }

    async fn fetch_state(&self) -> Result<Option<PersistedState>> {
        let Some(gist) = self.gist.find_by_description(&self.description).await? else {
            return Ok(None);
        };
        let Some(file) = gist.files.get(&self.file_name) else {
            return Ok(None);
        };

        // Inline content may be truncated by the listing endpoint.
        let inline_err = match file.content.as_deref() {
            Some(content) => match serde_json::from_str::<PersistedState>(content) {
                Ok(state) => return Ok(Some(state)),
                Err(e) => Some(e),
            },
            None => None,
        };
        let Some(raw_url) = &file.raw_url else {
            return match inline_err {
                Some(e) => Err(e.into()),
                None => Ok(None),
            };
        };
        if let Some(e) = inline_err {
            log::warn!("Inline {} undecodable ({}); fetching raw_url", self.file_name, e);
        }
        let content = self.gist.fetch_raw(raw_url).await?;
        Ok(Some(serde_json::from_str(&content)?))
    }

    async fn store_state(&self, state: &PersistedState) -> Result<()> {
        let content = serde_json::to_string(state)?;
        self.gist
            .upsert(&self.description, &self.file_name, &content, false)
            .await?;
        Ok(())
    }
}

/// HTML report kept in a public gist.
#[derive(Debug, Clone)]
pub struct GistReportPublisher {
    gist: GistClient,
    description: String,
    file_name: String,
}

impl GistReportPublisher {
    pub fn new(gist: GistClient, description: &str, file_name: &str) -> Self {
        Self {
            gist,
            description: description.to_string(),
            file_name: file_name.to_string(),
        }
    }
}

#[async_trait]
impl ReportPublisher for GistReportPublisher {
    async fn publish_report(&self, html: &str) -> Result<String> {
        self.gist
            .upsert(&self.description, &self.file_name, html, true)
            .await
    }
}
