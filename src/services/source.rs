//! Item sources.

use std::path::PathBuf;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;

use crate::error::Result;
use crate::models::RawItem;

/// Produces the raw items observed in one run.
#[async_trait]
pub trait ItemSource: Send + Sync {
    /// Short description for logs.
    fn describe(&self) -> String;

    async fn fetch_items(&self) -> Result<Vec<RawItem>>;
}

/// Items written by an out-of-process extractor.
///
/// Accepts either a bare JSON array or an object with an `items` array.
/// Records that do not decode are logged and skipped.
#[derive(Debug, Clone)]
pub struct JsonFileSource {
    path: PathBuf,
}

impl JsonFileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ItemsFile {
    List(Vec<Value>),
    Wrapped { items: Vec<Value> },
}

/// Decode item records one at a time, dropping the ones that fail.
pub fn decode_items(json: &str) -> Result<Vec<RawItem>> {
    let records = match serde_json::from_str::<ItemsFile>(json)? {
        ItemsFile::List(records) | ItemsFile::Wrapped { items: records } => records,
    };

    let mut items = Vec::with_capacity(records.len());
    for (idx, record) in records.into_iter().enumerate() {
        match serde_json::from_value::<RawItem>(record) {
            Ok(item) => items.push(item),
            Err(e) => log::warn!("Skipping item #{}: {}", idx + 1, e),
        }
    }
    Ok(items)
}

#[async_trait]
impl ItemSource for JsonFileSource {
    fn describe(&self) -> String {
        format!("items file {}", self.path.display())
    }

    async fn fetch_items(&self) -> Result<Vec<RawItem>> {
        let content = tokio::fs::read_to_string(&self.path).await?;
        decode_items(&content)
    }
}
