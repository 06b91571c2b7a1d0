//! Outgoing email messages.
//!
//! A [`Message`] is the provider parameter map (`From`, `To`, `Subject`, ...)
//! serialized as-is into the request body, plus the `htmlbody` and `textbody`
//! fields injected after rendering.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Field carrying the rendered HTML body
pub const HTML_BODY_FIELD: &str = "htmlbody";

/// Field carrying the rendered text body
pub const TEXT_BODY_FIELD: &str = "textbody";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Message(Map<String, Value>);

impl Message {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set an arbitrary provider parameter
    pub fn param(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    pub fn sender(self, from: impl Into<String>) -> Self {
        self.param("From", from.into())
    }

    pub fn to(self, to: impl Into<String>) -> Self {
        self.param("To", to.into())
    }

    pub fn cc(self, cc: impl Into<String>) -> Self {
        self.param("Cc", cc.into())
    }

    pub fn reply_to(self, reply_to: impl Into<String>) -> Self {
        self.param("ReplyTo", reply_to.into())
    }

    pub fn subject(self, subject: impl Into<String>) -> Self {
        self.param("Subject", subject.into())
    }

    pub fn tag(self, tag: impl Into<String>) -> Self {
        self.param("Tag", tag.into())
    }

    /// Inject rendered bodies, replacing any earlier ones
    pub fn with_bodies(mut self, html: String, text: String) -> Self {
        self.0.insert(HTML_BODY_FIELD.to_string(), Value::String(html));
        self.0.insert(TEXT_BODY_FIELD.to_string(), Value::String(text));
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.0.insert(key.into(), value.into())
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn html_body(&self) -> Option<&str> {
        self.get(HTML_BODY_FIELD).and_then(Value::as_str)
    }

    pub fn text_body(&self) -> Option<&str> {
        self.get(TEXT_BODY_FIELD).and_then(Value::as_str)
    }

    pub fn params(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn into_params(self) -> Map<String, Value> {
        self.0
    }
}

impl From<Map<String, Value>> for Message {
    fn from(params: Map<String, Value>) -> Self {
        Self(params)
    }
}
