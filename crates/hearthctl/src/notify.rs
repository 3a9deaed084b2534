//! Outgoing push notifications.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::info;

use crate::config::NotifyConfig;

const PUSHOVER_URL: &str = "https://api.pushover.net/1/messages.json";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Priority {
    Normal = 0,
    High = 1,
}

#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("notification request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("notification rejected: {0}")]
    Rejected(String),
}

/// Pushover replies `{"status": 1}` on success and lists `errors` otherwise
#[derive(Deserialize)]
struct PushoverResponse {
    status: i32,
    #[serde(default)]
    errors: Vec<String>,
}

/// Sink for the one summary each transition produces
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send_summary(
        &self,
        title: &str,
        lines: &[String],
        priority: Priority,
    ) -> Result<(), NotifyError>;
}

/// Pushover message API
pub struct PushoverNotifier {
    client: reqwest::Client,
    url: String,
    token: String,
    user: String,
}

impl PushoverNotifier {
    pub fn new(token: String, user: String) -> Result<Self, NotifyError> {
        Self::with_url(PUSHOVER_URL.to_string(), token, user)
    }

    pub fn with_url(url: String, token: String, user: String) -> Result<Self, NotifyError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()?;
        Ok(Self {
            client,
            url,
            token,
            user,
        })
    }
}

#[async_trait]
impl Notifier for PushoverNotifier {
    async fn send_summary(
        &self,
        title: &str,
        lines: &[String],
        priority: Priority,
    ) -> Result<(), NotifyError> {
        let message = lines.join("\n");
        let priority = (priority as i32).to_string();
        let response = self
            .client
            .post(&self.url)
            .form(&[
                ("token", self.token.as_str()),
                ("user", self.user.as_str()),
                ("title", title),
                ("message", message.as_str()),
                ("priority", priority.as_str()),
            ])
            .send()
            .await?;
        let status = response.status();
        let body = response.text().await?;
        check_pushover_response(status, &body)?;
        info!("Sent notification: {}", title);
        Ok(())
    }
}

/// Pushover reports rejections (bad token, unknown user) as a 4xx with a JSON
/// body, so the body is read before the HTTP status.
fn check_pushover_response(status: reqwest::StatusCode, body: &str) -> Result<(), NotifyError> {
    match serde_json::from_str::<PushoverResponse>(body) {
        Ok(response) if response.status == 1 && status.is_success() => Ok(()),
        Ok(response) if !response.errors.is_empty() => {
            Err(NotifyError::Rejected(response.errors.join(", ")))
        }
        _ => Err(NotifyError::Rejected(format!("HTTP {}", status))),
    }
}

/// Used when no push service is configured
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn send_summary(
        &self,
        title: &str,
        lines: &[String],
        priority: Priority,
    ) -> Result<(), NotifyError> {
        info!(?priority, "{}\n{}", title, lines.join("\n"));
        Ok(())
    }
}

pub fn from_config(config: &NotifyConfig) -> Result<Box<dyn Notifier>, NotifyError> {
    match (&config.token, &config.user) {
        (Some(token), Some(user)) => Ok(Box::new(PushoverNotifier::new(
            token.clone(),
            user.clone(),
        )?)),
        _ => Ok(Box::new(LogNotifier)),
    }
}
