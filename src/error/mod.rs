use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum MailError {
    #[error("Failed to read template {}: {source}", path.display())]
    TemplateRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to compile template {}: {source}", path.display())]
    TemplateCompile {
        path: PathBuf,
        #[source]
        source: handlebars::TemplateError,
    },

    #[error("Failed to render template {}: {source}", path.display())]
    TemplateRender {
        path: PathBuf,
        #[source]
        source: handlebars::RenderError,
    },

    #[error("Transport error: {0}")]
    Transport(#[source] anyhow::Error),

    #[error("Postmark API error (status {status}): {body}")]
    Api {
        status: u16,
        body: serde_json::Value,
    },

    #[error("Postmark API batch size limit of {limit} has been reached")]
    BatchLimitExceeded { limit: usize },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),
}

impl MailError {
    /// HTTP status carried by an API error.
    pub fn status(&self) -> Option<u16> {
        match self {
            MailError::Api { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Whether the same request could plausibly succeed later.
    ///
    /// Informational only: nothing in this crate retries.
    pub fn is_retryable(&self) -> bool {
        match self {
            MailError::Transport(_) => true,
            MailError::Api { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, MailError>;
