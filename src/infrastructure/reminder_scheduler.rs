//! Due-date reminder scheduling through QStash delayed messages.
//!
//! QStash calls back `POST /api/reminders/checkout` at the requested instant.
//! When no token or callback URL is configured, [`DisabledReminderScheduler`]
//! is used instead and every call is a logged no-op.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::json;

use crate::domain::{DomainError, ReminderHandle, ReminderScheduler};
use crate::infrastructure::config::ReminderConfig;

/// Header carrying the callback secret on forwarded reminder requests
pub const REMINDER_TOKEN_HEADER: &str = "x-reminder-token";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PublishResponse {
    message_id: String,
}

pub struct QStashReminderScheduler {
    client: reqwest::Client,
    base_url: String,
    token: String,
    callback_url: String,
    callback_secret: Option<String>,
}

impl QStashReminderScheduler {
    pub fn new(
        base_url: impl Into<String>,
        token: impl Into<String>,
        callback_url: impl Into<String>,
        callback_secret: Option<String>,
    ) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: token.into(),
            callback_url: callback_url.into(),
            callback_secret,
        }
    }
}

#[async_trait]
impl ReminderScheduler for QStashReminderScheduler {
    fn is_available(&self) -> bool {
        true
    }

    async fn schedule(
        &self,
        checkout_id: i32,
        fire_at: DateTime<Utc>,
    ) -> Result<Option<ReminderHandle>, DomainError> {
        if fire_at <= Utc::now() {
            tracing::debug!(
                "Reminder time {} for checkout {} already passed, not scheduling",
                fire_at,
                checkout_id
            );
            return Ok(None);
        }

        let url = format!("{}/v2/publish/{}", self.base_url, self.callback_url);
        let mut request = self
            .client
            .post(&url)
            .bearer_auth(&self.token)
            .header("Upstash-Not-Before", fire_at.timestamp().to_string())
            .json(&json!({ "checkoutId": checkout_id }));

        if let Some(secret) = &self.callback_secret {
            request = request.header("Upstash-Forward-X-Reminder-Token", secret);
        }

        let res = request.send().await?;
        if !res.status().is_success() {
            return Err(DomainError::External(format!(
                "QStash publish failed with status {}",
                res.status()
            )));
        }

        let body: PublishResponse = res.json().await?;
        tracing::info!(
            "⏰ Scheduled reminder {} for checkout {} at {}",
            body.message_id,
            checkout_id,
            fire_at
        );
        Ok(Some(body.message_id))
    }

    async fn cancel(&self, handle: &str) -> Result<bool, DomainError> {
        let url = format!("{}/v2/messages/{}", self.base_url, handle);
        let res = self.client.delete(&url).bearer_auth(&self.token).send().await?;

        match res.status() {
            s if s.is_success() => {
                tracing::info!("Cancelled reminder {}", handle);
                Ok(true)
            }
            StatusCode::NOT_FOUND => {
                tracing::debug!("Reminder {} was already delivered or cancelled", handle);
                Ok(false)
            }
            s => Err(DomainError::External(format!(
                "QStash cancel failed with status {}",
                s
            ))),
        }
    }
}

/// Used when reminder delivery is not configured
pub struct DisabledReminderScheduler;

#[async_trait]
impl ReminderScheduler for DisabledReminderScheduler {
    fn is_available(&self) -> bool {
        false
    }

    async fn schedule(
        &self,
        checkout_id: i32,
        _fire_at: DateTime<Utc>,
    ) -> Result<Option<ReminderHandle>, DomainError> {
        tracing::warn!(
            "Reminder scheduler not configured, skipping reminder for checkout {}",
            checkout_id
        );
        Ok(None)
    }

    async fn cancel(&self, handle: &str) -> Result<bool, DomainError> {
        tracing::warn!("Reminder scheduler not configured, cannot cancel {}", handle);
        Ok(false)
    }
}

/// Pick the scheduler implementation from configuration
pub fn from_config(config: &ReminderConfig) -> std::sync::Arc<dyn ReminderScheduler> {
    match (&config.qstash_token, &config.callback_url) {
        (Some(token), Some(callback)) => std::sync::Arc::new(QStashReminderScheduler::new(
            config.qstash_url.clone(),
            token.clone(),
            callback.clone(),
            config.callback_secret.clone(),
        )),
        _ => {
            tracing::warn!("QSTASH_TOKEN or REMINDER_CALLBACK_URL not set, reminders disabled");
            std::sync::Arc::new(DisabledReminderScheduler)
        }
    }
}
