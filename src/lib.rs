// Shared infrastructure
pub mod config;
pub mod error;
pub mod metrics;
pub mod telemetry;

// Rendering and delivery
pub mod dispatch;
pub mod message;
pub mod outbox;
pub mod template;

// Client facade
pub mod mailer;

pub use config::Settings;
pub use dispatch::{DispatchResult, Dispatcher, SendReceipt};
pub use error::{MailError, Result};
pub use mailer::{MailRequest, Mailer};
pub use message::Message;
pub use outbox::{Outbox, OutboxPolicy, MAX_BATCH_SIZE};
pub use template::{Renderer, TemplateCache, TemplateSource};
