use std::env;

use chrono::{FixedOffset, Offset, Utc};

#[derive(Clone, Debug)]
pub struct Config {
    pub database_url: String,
    pub port: u16,
    pub cors_allowed_origins: Vec<String>,
    pub seed_defaults: bool,
    /// Bootstrap staff account created at startup when both are set
    pub admin_email: Option<String>,
    pub admin_password: Option<String>,
    pub reminders: ReminderConfig,
    pub mail: MailConfig,
}

/// Delayed-message service used for due-date reminders
#[derive(Clone, Debug)]
pub struct ReminderConfig {
    pub qstash_url: String,
    pub qstash_token: Option<String>,
    /// Public URL of `POST /api/reminders/checkout`
    pub callback_url: Option<String>,
    /// Shared secret expected on reminder callbacks
    pub callback_secret: Option<String>,
    pub utc_offset_minutes: i32,
}

impl ReminderConfig {
    pub fn is_configured(&self) -> bool {
        self.qstash_token.is_some() && self.callback_url.is_some()
    }

    /// Zone whose wall clock decides the 09:00 reminder time
    pub fn timezone(&self) -> FixedOffset {
        FixedOffset::east_opt(self.utc_offset_minutes * 60).unwrap_or_else(|| {
            tracing::warn!(
                "Invalid REMINDER_UTC_OFFSET_MINUTES {}, using UTC",
                self.utc_offset_minutes
            );
            Utc.fix()
        })
    }
}

/// Transactional email API
#[derive(Clone, Debug)]
pub struct MailConfig {
    pub api_url: String,
    pub api_key: Option<String>,
    pub from: Option<String>,
}

impl MailConfig {
    pub fn is_configured(&self) -> bool {
        self.api_key.is_some() && self.from.is_some()
    }
}

fn non_empty(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}

impl Config {
    pub fn from_env() -> Self {
        Self {
            database_url: env::var("DATABASE_URL")
                .unwrap_or_else(|_| "sqlite://shelfdesk.db?mode=rwc".to_string()),
            port: env::var("PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(8000),
            cors_allowed_origins: env::var("CORS_ALLOWED_ORIGINS")
                .ok()
                .map(|s| s.split(',').map(|s| s.trim().to_string()).collect())
                .unwrap_or_else(Vec::new),
            seed_defaults: env::var("SEED_DEFAULTS")
                .map(|v| v != "false" && v != "0")
                .unwrap_or(true),
            admin_email: non_empty("ADMIN_EMAIL"),
            admin_password: non_empty("ADMIN_PASSWORD"),
            reminders: ReminderConfig {
                qstash_url: env::var("QSTASH_URL")
                    .unwrap_or_else(|_| "https://qstash.upstash.io".to_string()),
                qstash_token: non_empty("QSTASH_TOKEN"),
                callback_url: non_empty("REMINDER_CALLBACK_URL"),
                callback_secret: non_empty("REMINDER_CALLBACK_SECRET"),
                utc_offset_minutes: env::var("REMINDER_UTC_OFFSET_MINUTES")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(0),
            },
            mail: MailConfig {
                api_url: env::var("MAIL_API_URL")
                    .unwrap_or_else(|_| "https://api.resend.com/emails".to_string()),
                api_key: non_empty("MAIL_API_KEY"),
                from: non_empty("MAIL_FROM"),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    const KEYS: [&str; 6] = [
        "PORT",
        "QSTASH_TOKEN",
        "REMINDER_CALLBACK_URL",
        "REMINDER_UTC_OFFSET_MINUTES",
        "MAIL_API_KEY",
        "MAIL_FROM",
    ];

    fn clear() {
        for key in KEYS {
            unsafe { env::remove_var(key) };
        }
    }

    #[test]
    #[serial]
    fn optional_services_default_to_disabled() {
        clear();
        let config = Config::from_env();
        assert_eq!(config.port, 8000);
        assert!(!config.reminders.is_configured());
        assert!(!config.mail.is_configured());
        assert_eq!(config.reminders.timezone().local_minus_utc(), 0);
    }

    #[test]
    #[serial]
    fn reads_reminder_and_mail_settings() {
        clear();
        unsafe {
            env::set_var("PORT", "9100");
            env::set_var("QSTASH_TOKEN", "token");
            env::set_var("REMINDER_CALLBACK_URL", "https://library.example/api/reminders/checkout");
            env::set_var("REMINDER_UTC_OFFSET_MINUTES", "-300");
            env::set_var("MAIL_API_KEY", "key");
            env::set_var("MAIL_FROM", "library@example.com");
        }

        let config = Config::from_env();
        assert_eq!(config.port, 9100);
        assert!(config.reminders.is_configured());
        assert_eq!(config.reminders.timezone().local_minus_utc(), -300 * 60);
        assert!(config.mail.is_configured());
        clear();
    }
}
