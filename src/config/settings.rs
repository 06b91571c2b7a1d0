use std::env;
use std::path::PathBuf;

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub postmark: PostmarkConfig,
    #[serde(default)]
    pub templates: TemplateConfig,
    #[serde(default)]
    pub outbox: OutboxConfig,
    #[serde(default)]
    pub log: LogConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PostmarkConfig {
    /// Server token sent in `X-Postmark-Server-Token`
    #[serde(default = "default_api_key")]
    pub api_key: String,
    /// Environment tag (informational)
    #[serde(default = "default_env")]
    pub env: String,
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Request timeout in milliseconds; unset waits indefinitely
    #[serde(default)]
    pub request_timeout_ms: Option<u64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TemplateConfig {
    /// Root for `<directory>/<name>/index.{html,txt}` lookups
    #[serde(default = "default_template_directory")]
    pub directory: PathBuf,
    /// Fail rendering on missing variables instead of emitting nothing
    #[serde(default)]
    pub strict_mode: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct OutboxConfig {
    /// Put a failed batch back into the outbox instead of discarding it
    #[serde(default)]
    pub requeue_on_failure: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LogConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub json: bool,
}

fn default_api_key() -> String {
    "POSTMARK_API_TEST".to_string()
}

fn default_env() -> String {
    "PRODUCTION".to_string()
}

fn default_base_url() -> String {
    "https://api.postmarkapp.com".to_string()
}

fn default_template_directory() -> PathBuf {
    PathBuf::from("./templates")
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        // Load .env file if exists
        let _ = dotenvy::dotenv();

        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let builder = Config::builder()
            .set_default("postmark.api_key", default_api_key())?
            .set_default("postmark.env", default_env())?
            .set_default("postmark.base_url", default_base_url())?
            .set_default("templates.directory", "./templates")?
            .set_default("templates.strict_mode", false)?
            .set_default("outbox.requeue_on_failure", false)?
            .set_default("log.level", default_log_level())?
            .set_default("log.json", false)?
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{}", run_mode)).required(false))
            // TREBUCHET__POSTMARK__API_KEY, TREBUCHET__TEMPLATES__DIRECTORY, etc.
            .add_source(
                Environment::with_prefix("TREBUCHET")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            );

        builder.build()?.try_deserialize()
    }

    /// Defaults everywhere except the server token.
    pub fn with_api_key(api_key: impl Into<String>) -> Self {
        Self {
            postmark: PostmarkConfig {
                api_key: api_key.into(),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    pub fn single_endpoint(&self) -> String {
        format!("{}/email", self.postmark.base_url.trim_end_matches('/'))
    }

    pub fn batch_endpoint(&self) -> String {
        format!("{}/email/batch", self.postmark.base_url.trim_end_matches('/'))
    }
}

impl Default for PostmarkConfig {
    fn default() -> Self {
        Self {
            api_key: default_api_key(),
            env: default_env(),
            base_url: default_base_url(),
            request_timeout_ms: None,
        }
    }
}

impl Default for TemplateConfig {
    fn default() -> Self {
        Self {
            directory: default_template_directory(),
            strict_mode: false,
        }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}
