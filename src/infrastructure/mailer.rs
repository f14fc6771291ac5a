//! Transactional email over an HTTP JSON API (Resend-compatible).

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;

use crate::domain::{DomainError, Notifier, OverdueReminder};
use crate::infrastructure::config::MailConfig;

pub struct HttpMailer {
    client: reqwest::Client,
    api_url: String,
    api_key: String,
    from: String,
}

impl HttpMailer {
    pub fn new(api_url: impl Into<String>, api_key: impl Into<String>, from: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_url: api_url.into(),
            api_key: api_key.into(),
            from: from.into(),
        }
    }
}

#[async_trait]
impl Notifier for HttpMailer {
    fn is_available(&self) -> bool {
        true
    }

    async fn send_overdue_reminder(&self, reminder: &OverdueReminder) -> Result<(), DomainError> {
        let res = self
            .client
            .post(&self.api_url)
            .bearer_auth(&self.api_key)
            .json(&json!({
                "from": self.from,
                "to": [reminder.to],
                "subject": reminder.subject(),
                "text": reminder.text_body(),
            }))
            .send()
            .await?;

        if !res.status().is_success() {
            return Err(DomainError::External(format!(
                "Mail API responded with status {}",
                res.status()
            )));
        }

        tracing::info!("📧 Sent reminder for \"{}\" to {}", reminder.book_title, reminder.to);
        Ok(())
    }
}

/// Used when no mail API key is configured
pub struct DisabledMailer;

#[async_trait]
impl Notifier for DisabledMailer {
    fn is_available(&self) -> bool {
        false
    }

    async fn send_overdue_reminder(&self, reminder: &OverdueReminder) -> Result<(), DomainError> {
        tracing::warn!(
            "Mail not configured, dropping reminder for \"{}\" to {}",
            reminder.book_title,
            reminder.to
        );
        Ok(())
    }
}

/// Pick the mailer implementation from configuration
pub fn from_config(config: &MailConfig) -> Arc<dyn Notifier> {
    match (&config.api_key, &config.from) {
        (Some(key), Some(from)) => Arc::new(HttpMailer::new(
            config.api_url.clone(),
            key.clone(),
            from.clone(),
        )),
        _ => {
            tracing::warn!("MAIL_API_KEY or MAIL_FROM not set, email disabled");
            Arc::new(DisabledMailer)
        }
    }
}
