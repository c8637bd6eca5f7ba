//! ---
//! ops_section: "02-disaster-recovery"
//! ops_subsection: "module"
//! ops_type: "source"
//! ops_scope: "code"
//! ops_description: "Operator notification sinks."
//! ops_version: "v0.0.0-prealpha"
//! ops_owner: "tbd"
//! ---
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use r_ops_logging::{ops_info, ops_warn, LogContext};
use serde::Serialize;

use crate::model::Severity;
use crate::providers::{CollaboratorError, CollaboratorResult, NotificationSink};

/// Writes every alert to the log stream.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotificationSink;

#[async_trait]
impl NotificationSink for LogNotificationSink {
    async fn publish(
        &self,
        topic: &str,
        subject: &str,
        severity: Severity,
        body: &str,
    ) -> CollaboratorResult<()> {
        let ctx = LogContext::new().with_resource(topic);
        match severity {
            Severity::Info => ops_info!(context = ctx, "{}\n{}", subject, body),
            Severity::Warning | Severity::Critical => {
                ops_warn!(context = ctx, "{}\n{}", subject, body)
            }
        }
        Ok(())
    }
}

/// One alert captured by [`MemoryNotificationSink`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentNotification {
    pub topic: String,
    pub subject: String,
    pub severity: Severity,
    pub body: String,
}

/// Records alerts in memory for drills and assertions.
#[derive(Debug, Default)]
pub struct MemoryNotificationSink {
    sent: Mutex<Vec<SentNotification>>,
}

impl MemoryNotificationSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn notifications(&self) -> Vec<SentNotification> {
        self.sent.lock().clone()
    }

    pub fn count(&self, severity: Severity) -> usize {
        self.sent
            .lock()
            .iter()
            .filter(|note| note.severity == severity)
            .count()
    }
}

#[async_trait]
impl NotificationSink for MemoryNotificationSink {
    async fn publish(
        &self,
        topic: &str,
        subject: &str,
        severity: Severity,
        body: &str,
    ) -> CollaboratorResult<()> {
        self.sent.lock().push(SentNotification {
            topic: topic.to_owned(),
            subject: subject.to_owned(),
            severity,
            body: body.to_owned(),
        });
        Ok(())
    }
}

#[derive(Serialize)]
struct WebhookMessage<'a> {
    topic: &'a str,
    subject: &'a str,
    severity: Severity,
    message: &'a str,
}

/// Posts alerts as JSON to an HTTP endpoint (chat relay, paging bridge, ...).
#[derive(Debug, Clone)]
pub struct WebhookNotificationSink {
    client: reqwest::Client,
    url: String,
    timeout: Duration,
}

impl WebhookNotificationSink {
    pub fn new(url: impl Into<String>, timeout: Duration) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            url: url.into(),
            timeout,
        })
    }
}

#[async_trait]
impl NotificationSink for WebhookNotificationSink {
    async fn publish(
        &self,
        topic: &str,
        subject: &str,
        severity: Severity,
        body: &str,
    ) -> CollaboratorResult<()> {
        let message = WebhookMessage {
            topic,
            subject,
            severity,
            message: body,
        };
        let response = self
            .client
            .post(&self.url)
            .json(&message)
            .send()
            .await
            .map_err(|err| {
                if err.is_timeout() {
                    CollaboratorError::Timeout(self.timeout)
                } else {
                    CollaboratorError::Transport(err.to_string())
                }
            })?;
        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(CollaboratorError::Rejected(format!(
                "webhook answered HTTP {}",
                status.as_u16()
            )))
        }
    }
}
