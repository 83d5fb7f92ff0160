//! Outbound email notification.
//!
//! Every stored record is summarized and handed to a transactional email
//! provider through a background queue — the request path only enqueues
//! and never waits. Delivery failures are logged and discarded; this
//! feature must never fail a client-facing request.

use std::env;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::mpsc;

use crate::message::types::{AbandonedMessage, Message};

/// Default provider endpoint (Resend-compatible JSON API).
const DEFAULT_EMAIL_API_URL: &str = "https://api.resend.com/emails";

/// Request timeout for the provider call.
const SEND_TIMEOUT_SECS: u64 = 10;

/// Email provider configuration loaded from environment variables.
/// The feature is silently disabled unless key, from, and to are all set.
#[derive(Debug, Clone)]
pub struct NotifyConfig {
    pub api_key: Option<String>,
    pub api_url: String,
    pub from: Option<String>,
    pub to: Option<String>,
}

impl NotifyConfig {
    pub fn from_env() -> Self {
        Self {
            api_key: env::var("EMAIL_API_KEY").ok(),
            api_url: env::var("EMAIL_API_URL")
                .unwrap_or_else(|_| DEFAULT_EMAIL_API_URL.to_string()),
            from: env::var("EMAIL_FROM").ok(),
            to: env::var("EMAIL_TO").ok(),
        }
    }

    /// Check if the provider is fully configured.
    pub fn enabled(&self) -> bool {
        self.api_key.is_some() && self.from.is_some() && self.to.is_some()
    }
}

/// A rendered notification ready for the provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundEmail {
    pub subject: String,
    pub text: String,
    pub html: String,
}

/// Email delivery failure.
#[derive(Debug, Error)]
pub enum SinkError {
    #[error("email provider request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("email provider returned status {status}")]
    Provider { status: u16 },
}

/// Destination for rendered notifications. The production implementation
/// talks to the provider's HTTP API; tests record what was attempted.
#[async_trait]
pub trait EmailSink: Send + Sync {
    async fn send(&self, email: OutboundEmail) -> Result<(), SinkError>;
}

/// Sink backed by a Resend-style transactional email HTTP API.
pub struct HttpEmailSink {
    client: reqwest::Client,
    api_url: String,
    api_key: String,
    from: String,
    to: String,
}

impl HttpEmailSink {
    /// Build a sink from config. Returns None unless fully configured.
    pub fn from_config(config: &NotifyConfig) -> Option<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(SEND_TIMEOUT_SECS))
            .build()
            .unwrap_or_default();
        Some(Self {
            client,
            api_url: config.api_url.clone(),
            api_key: config.api_key.clone()?,
            from: config.from.clone()?,
            to: config.to.clone()?,
        })
    }
}

#[async_trait]
impl EmailSink for HttpEmailSink {
    async fn send(&self, email: OutboundEmail) -> Result<(), SinkError> {
        let response = self
            .client
            .post(&self.api_url)
            .bearer_auth(&self.api_key)
            .json(&serde_json::json!({
                "from": self.from,
                "to": [self.to],
                "subject": email.subject,
                "text": email.text,
                "html": email.html,
            }))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(SinkError::Provider {
                status: status.as_u16(),
            });
        }
        Ok(())
    }
}

/// Handle for enqueueing notifications; cheap to clone into the axum state.
///
/// A worker task drains the queue and pushes each email through the sink.
/// Enqueueing never blocks and never fails the caller — when notifications
/// are disabled the channel is simply closed and sends are dropped.
#[derive(Clone)]
pub struct Notifier {
    tx: mpsc::UnboundedSender<OutboundEmail>,
}

impl Notifier {
    /// Spawn the delivery worker and return the enqueue handle.
    pub fn spawn(sink: Arc<dyn EmailSink>) -> Self {
        let (tx, mut rx) = mpsc::unbounded_channel::<OutboundEmail>();
        tokio::spawn(async move {
            while let Some(email) = rx.recv().await {
                if let Err(e) = sink.send(email).await {
                    tracing::warn!(error = %e, "Email notification failed");
                }
            }
        });
        Self { tx }
    }

    /// A notifier that drops everything (provider not configured).
    pub fn disabled() -> Self {
        let (tx, _) = mpsc::unbounded_channel();
        Self { tx }
    }

    /// Enqueue a summary of a stored message. Fire-and-forget.
    pub fn notify_message(&self, message: &Message) {
        let _ = self.tx.send(render_message_email(message));
    }

    /// Enqueue a summary of an abandoned draft. Fire-and-forget.
    pub fn notify_abandoned(&self, draft: &AbandonedMessage) {
        let _ = self.tx.send(render_abandoned_email(draft));
    }
}

// ── Rendering ─────────────────────────────────────────────────────────────

fn render_message_email(message: &Message) -> OutboundEmail {
    let mut lines = vec![
        format!("Message: {}", message.message),
        format!("Time: {}", message.timestamp),
        format!("IP: {}", message.ip),
        format!("Location: {}", message.location),
    ];
    lines.extend(enrichment_lines(
        &message.user_agent.browser,
        &message.user_agent.browser_version,
        &message.user_agent.os,
        &message.user_agent.device_type,
        &message.source,
        &message.referrer,
        &message.language,
        message.phone.as_deref(),
        message.coordinates.map(|c| (c.latitude, c.longitude)),
    ));
    if message.time_on_page.is_some()
        || message.click_patterns.is_some()
        || message.text_history.is_some()
    {
        lines.push("Telemetry: attached".to_string());
    }
    OutboundEmail {
        subject: "New anonymous message".to_string(),
        text: lines.join("\n"),
        html: to_html("New anonymous message", &lines),
    }
}

fn render_abandoned_email(draft: &AbandonedMessage) -> OutboundEmail {
    let mut lines = vec![
        format!("Partial message: {}", draft.partial_message),
        format!("Reason: {:?}", draft.reason),
        format!("Time: {}", draft.timestamp),
        format!("IP: {}", draft.ip),
        format!("Location: {}", draft.location),
    ];
    lines.extend(enrichment_lines(
        &draft.user_agent.browser,
        &draft.user_agent.browser_version,
        &draft.user_agent.os,
        &draft.user_agent.device_type,
        &draft.source,
        &draft.referrer,
        &draft.language,
        draft.phone.as_deref(),
        draft.coordinates.map(|c| (c.latitude, c.longitude)),
    ));
    OutboundEmail {
        subject: "Abandoned draft captured".to_string(),
        text: lines.join("\n"),
        html: to_html("Abandoned draft captured", &lines),
    }
}

#[allow(clippy::too_many_arguments)]
fn enrichment_lines(
    browser: &str,
    browser_version: &str,
    os: &str,
    device_type: &str,
    source: &str,
    referrer: &str,
    language: &str,
    phone: Option<&str>,
    coordinates: Option<(f64, f64)>,
) -> Vec<String> {
    let mut lines = vec![
        format!("Device: {} {} on {} ({})", browser, browser_version, os, device_type),
        format!("Source: {}", source),
        format!("Referrer: {}", if referrer.is_empty() { "(none)" } else { referrer }),
        format!("Language: {}", language),
    ];
    if let Some((latitude, longitude)) = coordinates {
        lines.push(format!("Coordinates: {}, {}", latitude, longitude));
    }
    if let Some(phone) = phone {
        lines.push(format!("Phone: {}", phone));
    }
    lines
}

fn to_html(title: &str, lines: &[String]) -> String {
    let items: String = lines
        .iter()
        .map(|line| format!("<li>{}</li>", escape_html(line)))
        .collect();
    format!("<h2>{}</h2><ul>{}</ul>", escape_html(title), items)
}

fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

// ── Test Support ──────────────────────────────────────────────────────────

/// Sink that forwards every attempted email to a test channel, so tests
/// can assert "notification attempted" without network access.
#[cfg(test)]
pub struct RecordingSink {
    pub tx: mpsc::UnboundedSender<OutboundEmail>,
}

#[cfg(test)]
#[async_trait]
impl EmailSink for RecordingSink {
    async fn send(&self, email: OutboundEmail) -> Result<(), SinkError> {
        let _ = self.tx.send(email);
        Ok(())
    }
}
