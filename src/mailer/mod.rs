//! Client facade tying rendering, the outbox and dispatch together.
//!
//! ```ignore
//! let mailer = Mailer::new(Settings::new()?)?;
//!
//! let request = MailRequest::named(
//!     Message::new().sender("noreply@example.com").to("ada@example.com").subject("Hi"),
//!     "welcome",
//! )
//! .with_data(json!({"name": "Ada"}));
//!
//! mailer.load(request).await?;
//! let result = mailer.fire().await?;
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use serde_json::Value;

use crate::config::Settings;
use crate::dispatch::{DispatchResult, Dispatcher, ReqwestTransport, Transport};
use crate::error::{MailError, Result};
use crate::message::Message;
use crate::metrics::OutboxMetrics;
use crate::outbox::{Outbox, OutboxPolicy};
use crate::template::{Renderer, TemplateSource};

/// Provider parameters plus the template and data for their bodies
#[derive(Debug, Clone)]
pub struct MailRequest {
    pub params: Message,
    pub source: TemplateSource,
    pub data: Value,
}

impl MailRequest {
    pub fn new(params: Message, source: TemplateSource) -> Self {
        Self {
            params,
            source,
            data: Value::Object(Default::default()),
        }
    }

    /// Bodies from `<template directory>/<name>/index.{html,txt}`
    pub fn named(params: Message, template_name: impl Into<String>) -> Self {
        Self::new(params, TemplateSource::named(template_name))
    }

    pub fn files(params: Message, html: impl Into<PathBuf>, text: impl Into<PathBuf>) -> Self {
        Self::new(params, TemplateSource::files(html, text))
    }

    pub fn with_data(mut self, data: Value) -> Self {
        self.data = data;
        self
    }
}

pub struct Mailer {
    settings: Settings,
    renderer: Renderer,
    outbox: Outbox,
    dispatcher: Dispatcher,
    policy: OutboxPolicy,
}

impl Mailer {
    /// Mailer talking HTTP through reqwest
    pub fn new(settings: Settings) -> Result<Self> {
        let transport = ReqwestTransport::from_config(&settings.postmark).map_err(MailError::Transport)?;
        Ok(Self::with_transport(settings, Arc::new(transport)))
    }

    pub fn with_transport(settings: Settings, transport: Arc<dyn Transport>) -> Self {
        let renderer = Renderer::from_config(&settings.templates);
        Self::with_parts(settings, renderer, transport)
    }

    pub fn with_parts(settings: Settings, renderer: Renderer, transport: Arc<dyn Transport>) -> Self {
        let dispatcher = Dispatcher::new(transport, &settings);
        let policy = OutboxPolicy::from_config(&settings.outbox);

        tracing::debug!(
            base_url = %settings.postmark.base_url,
            env = %settings.postmark.env,
            template_directory = %settings.templates.directory.display(),
            policy = ?policy,
            "Mailer created"
        );

        Self {
            settings,
            renderer,
            outbox: Outbox::new(),
            dispatcher,
            policy,
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn renderer(&self) -> &Renderer {
        &self.renderer
    }

    pub fn outbox(&self) -> &Outbox {
        &self.outbox
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    pub fn policy(&self) -> OutboxPolicy {
        self.policy
    }

    /// Render and send one message on the single endpoint.
    #[tracing::instrument(name = "mailer.deliver", skip(self, request), fields(source = ?request.source))]
    pub async fn deliver(&self, request: MailRequest) -> Result<DispatchResult> {
        let message = self.prepare(request).await?;
        self.dispatcher.send_single(&message).await
    }

    /// Render a message and add it to the outbox. Returns the new outbox length.
    ///
    /// Render failures surface before the outbox is touched.
    #[tracing::instrument(name = "mailer.load", skip(self, request), fields(source = ?request.source))]
    pub async fn load(&self, request: MailRequest) -> Result<usize> {
        let message = self.prepare(request).await?;
        self.outbox.enqueue(message).await
    }

    /// Flush the outbox and send its contents as one batch.
    ///
    /// The batch request goes out even when the outbox was empty. On failure
    /// the flushed messages are discarded or requeued according to the policy.
    #[tracing::instrument(name = "mailer.fire", skip(self))]
    pub async fn fire(&self) -> Result<DispatchResult> {
        let batch = self.outbox.flush().await;

        match self.dispatcher.send_batch(&batch).await {
            Ok(result) => Ok(result),
            Err(e) => {
                match self.policy {
                    OutboxPolicy::Discard => {
                        OutboxMetrics::record_dropped(batch.len() as u64);
                        tracing::warn!(
                            messages = batch.len(),
                            error = %e,
                            "Batch dispatch failed, messages discarded"
                        );
                    }
                    OutboxPolicy::Requeue => {
                        let count = batch.len();
                        let restored = self.outbox.requeue(batch).await;
                        tracing::warn!(
                            messages = count,
                            restored = restored,
                            error = %e,
                            "Batch dispatch failed, messages requeued"
                        );
                    }
                }
                Err(e)
            }
        }
    }

    async fn prepare(&self, request: MailRequest) -> Result<Message> {
        let MailRequest {
            params,
            source,
            data,
        } = request;

        let bodies = self.renderer.render(&source, &data).await?;
        Ok(params.with_bodies(bodies.html, bodies.text))
    }
}
