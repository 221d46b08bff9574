// src/error.rs

//! Unified error handling for the watcher.

use std::fmt;

use thiserror::Error;

/// Result type alias for watcher operations.
pub type Result<T> = std::result::Result<T, AppError>;

/// Unified application error type.
#[derive(Error, Debug)]
pub enum AppError {
    /// I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP request failed
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML parsing failed
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    /// URL parsing failed
    #[error("URL parse error: {0}")]
    Url(#[from] url::ParseError),

    /// CSS selector parsing failed
    #[error("Invalid selector '{selector}': {message}")]
    Selector { selector: String, message: String },

    /// Configuration error (including missing credentials)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Data validation error
    #[error("Validation error: {0}")]
    Validation(String),

    /// A remote service answered with an unexpected status or body
    #[error("{service} returned {status}: {body}")]
    Remote {
        service: String,
        status: u16,
        body: String,
    },

    /// Extraction error
    #[error("Extraction error for {context}: {message}")]
    Extract { context: String, message: String },
}

impl AppError {
    /// Create a selector parsing error.
    pub fn selector(selector: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::Selector {
            selector: selector.into(),
            message: message.to_string(),
        }
    }

    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Create a remote-service error.
    pub fn remote(service: impl Into<String>, status: u16, body: impl Into<String>) -> Self {
        Self::Remote {
            service: service.into(),
            status,
            body: body.into(),
        }
    }

    /// Create an extraction error with context.
    pub fn extract(context: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::Extract {
            context: context.into(),
            message: message.to_string(),
        }
    }
}
