mod settings;

pub use settings::{LogConfig, OutboxConfig, PostmarkConfig, Settings, TemplateConfig};
