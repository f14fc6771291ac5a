//! Optional outbound subsystems: due-date reminder scheduling and email.
//!
//! Both come in a real and a disabled flavour chosen at startup, so callers
//! never branch on whether the subsystem is configured.

use async_trait::async_trait;
use chrono::{DateTime, Days, NaiveTime, TimeZone, Utc};
use serde::Serialize;

use super::DomainError;

/// Local hour at which due-date reminders fire
pub const REMINDER_HOUR: u32 = 9;

/// Opaque id of a scheduled reminder, as returned by the scheduler
pub type ReminderHandle = String;

/// Schedules a callback for a checkout at a future instant
#[async_trait]
pub trait ReminderScheduler: Send + Sync {
    /// Whether reminders will actually be delivered
    fn is_available(&self) -> bool;

    /// Returns the handle of the scheduled message, or `None` when nothing was
    /// scheduled (subsystem disabled or `fire_at` already passed).
    async fn schedule(
        &self,
        checkout_id: i32,
        fire_at: DateTime<Utc>,
    ) -> Result<Option<ReminderHandle>, DomainError>;

    /// Returns whether a scheduled message was cancelled
    async fn cancel(&self, handle: &str) -> Result<bool, DomainError>;
}

/// Content of an overdue / due-soon reminder email
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OverdueReminder {
    pub to: String,
    pub recipient_name: Option<String>,
    pub book_title: String,
    pub book_author: String,
    pub due_date: DateTime<Utc>,
    pub overdue_days: i32,
    pub late_fee: f64,
}

impl OverdueReminder {
    pub fn subject(&self) -> String {
        if self.overdue_days > 0 {
            format!("Overdue: \"{}\"", self.book_title)
        } else {
            format!("Reminder: \"{}\" is due tomorrow", self.book_title)
        }
    }

    pub fn text_body(&self) -> String {
        let greeting = match &self.recipient_name {
            Some(name) => format!("Hi {},", name),
            None => "Hi,".to_string(),
        };
        let due = self.due_date.format("%B %-d, %Y");
        let status = if self.overdue_days > 0 {
            format!(
                "was due on {} and is now {} day{} overdue. Late fees so far: ${:.2}.",
                due,
                self.overdue_days,
                if self.overdue_days == 1 { "" } else { "s" },
                self.late_fee
            )
        } else {
            format!("is due on {}.", due)
        };

        format!(
            "{}\n\n\"{}\" by {} {}\n\nPlease return it to the library at your earliest convenience.\n",
            greeting, self.book_title, self.book_author, status
        )
    }
}

/// Transactional email delivery
#[async_trait]
pub trait Notifier: Send + Sync {
    fn is_available(&self) -> bool;

    async fn send_overdue_reminder(&self, reminder: &OverdueReminder) -> Result<(), DomainError>;
}

/// Instant at which the reminder for `due_date` fires: the day before, at
/// [`REMINDER_HOUR`] in `tz`. `None` if that local time does not exist.
pub fn reminder_fire_time<Tz: TimeZone>(due_date: DateTime<Utc>, tz: &Tz) -> Option<DateTime<Utc>> {
    let local_due = due_date.with_timezone(tz);
    let day = local_due.date_naive().checked_sub_days(Days::new(1))?;
    let at = day.and_time(NaiveTime::from_hms_opt(REMINDER_HOUR, 0, 0)?);

    tz.from_local_datetime(&at)
        .earliest()
        .map(|dt| dt.with_timezone(&Utc))
}
