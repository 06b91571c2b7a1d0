use std::sync::Arc;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::Settings;
use crate::error::{MailError, Result};
use crate::message::Message;
use crate::metrics::DispatchMetrics;

use super::transport::{OutboundRequest, Transport};

/// What to send: one message, or a list for the batch endpoint
#[derive(Debug, Clone, Copy)]
pub enum Envelope<'a> {
    Single(&'a Message),
    Batch(&'a [Message]),
}

impl Envelope<'_> {
    /// Endpoint label used in logs and metrics
    pub fn endpoint(&self) -> &'static str {
        match self {
            Envelope::Single(_) => "single",
            Envelope::Batch(_) => "batch",
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Envelope::Single(_) => 1,
            Envelope::Batch(messages) => messages.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Successful API response, body untouched
#[derive(Debug, Clone, PartialEq)]
pub enum DispatchResult {
    Single(Value),
    Batch(Value),
}

impl DispatchResult {
    pub fn body(&self) -> &Value {
        match self {
            DispatchResult::Single(body) | DispatchResult::Batch(body) => body,
        }
    }

    pub fn into_body(self) -> Value {
        match self {
            DispatchResult::Single(body) | DispatchResult::Batch(body) => body,
        }
    }

    /// Per-message response objects
    pub fn entries(&self) -> &[Value] {
        match self {
            DispatchResult::Single(body) => std::slice::from_ref(body),
            DispatchResult::Batch(Value::Array(entries)) => entries,
            DispatchResult::Batch(_) => &[],
        }
    }

    pub fn receipts(&self) -> Result<Vec<SendReceipt>> {
        self.entries()
            .iter()
            .map(|entry| SendReceipt::deserialize(entry).map_err(MailError::from))
            .collect()
    }
}

/// Per-message result reported by the API
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct SendReceipt {
    #[serde(default)]
    pub error_code: i64,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(rename = "MessageID", default)]
    pub message_id: Option<String>,
    #[serde(default)]
    pub to: Option<String>,
    #[serde(default)]
    pub submitted_at: Option<String>,
}

impl SendReceipt {
    pub fn is_success(&self) -> bool {
        self.error_code == 0
    }
}

/// Sends messages to the single or batch endpoint and classifies the outcome
pub struct Dispatcher {
    transport: Arc<dyn Transport>,
    server_token: String,
    single_url: String,
    batch_url: String,
}

impl Dispatcher {
    pub fn new(transport: Arc<dyn Transport>, settings: &Settings) -> Self {
        Self {
            transport,
            server_token: settings.postmark.api_key.clone(),
            single_url: settings.single_endpoint(),
            batch_url: settings.batch_endpoint(),
        }
    }

    /// Issue one request for `envelope`.
    ///
    /// A batch only succeeds when the status is 200 and every entry reports
    /// `ErrorCode` 0; otherwise the whole call is an API error carrying the
    /// full body, including entries that were accepted.
    #[tracing::instrument(
        name = "dispatcher.send",
        skip(self, envelope),
        fields(endpoint = envelope.endpoint(), messages = envelope.len())
    )]
    pub async fn send(&self, envelope: Envelope<'_>) -> Result<DispatchResult> {
        let endpoint = envelope.endpoint();
        let (url, body) = match envelope {
            Envelope::Single(message) => (&self.single_url, serde_json::to_string(message)?),
            Envelope::Batch(messages) => (&self.batch_url, serde_json::to_string(messages)?),
        };

        let request = OutboundRequest {
            url: url.clone(),
            server_token: self.server_token.clone(),
            body,
        };

        let started = Instant::now();
        let response = self.transport.post(&request).await.map_err(|e| {
            DispatchMetrics::record_transport_error(endpoint);
            MailError::Transport(e)
        })?;
        DispatchMetrics::record_latency(endpoint, started.elapsed().as_secs_f64());

        let status = response.status;
        let body = parse_body(&response.body);

        let accepted = status == 200
            && match envelope {
                Envelope::Single(_) => true,
                Envelope::Batch(_) => batch_accepted(&body),
            };

        if !accepted {
            DispatchMetrics::record_api_error(endpoint);
            tracing::debug!(
                endpoint = endpoint,
                status = status,
                "API rejected request"
            );
            return Err(MailError::Api { status, body });
        }

        DispatchMetrics::record_success(endpoint, envelope.len() as u64);
        tracing::info!(
            endpoint = endpoint,
            messages = envelope.len(),
            "Messages dispatched"
        );

        Ok(match envelope {
            Envelope::Single(_) => DispatchResult::Single(body),
            Envelope::Batch(_) => DispatchResult::Batch(body),
        })
    }

    pub async fn send_single(&self, message: &Message) -> Result<DispatchResult> {
        self.send(Envelope::Single(message)).await
    }

    pub async fn send_batch(&self, messages: &[Message]) -> Result<DispatchResult> {
        self.send(Envelope::Batch(messages)).await
    }
}

/// JSON when possible, otherwise the raw text
fn parse_body(raw: &str) -> Value {
    if raw.trim().is_empty() {
        return Value::Null;
    }
    serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
}

/// Every entry must carry `ErrorCode` 0. Object bodies are checked per value;
/// a non-empty text body has no valid entries.
fn batch_accepted(body: &Value) -> bool {
    let entry_ok = |entry: &Value| entry.get("ErrorCode").and_then(Value::as_f64) == Some(0.0);

    match body {
        Value::Array(entries) => entries.iter().all(entry_ok),
        Value::Object(map) => map.values().all(entry_ok),
        Value::String(text) => text.is_empty(),
        _ => true,
    }
}
