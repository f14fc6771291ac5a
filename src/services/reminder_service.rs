//! Delivery of fired due-date reminders

use serde::Serialize;

use crate::domain::{DomainError, Notifier, OverdueReminder};
use crate::services::checkout_service::CheckoutService;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ReminderOutcome {
    Sent,
    /// The book came back before the reminder fired
    Skipped,
    /// No mail transport is configured; nothing was sent
    Disabled,
    /// The notifier failed; the failure has been logged
    Failed,
}

/// Reconcile the checkout's overdue state, then email its borrower.
///
/// Only a missing checkout is an error. Notification problems are logged and
/// reported as [`ReminderOutcome::Failed`].
pub async fn handle_checkout_reminder(
    checkouts: &CheckoutService,
    notifier: &dyn Notifier,
    checkout_id: i32,
) -> Result<ReminderOutcome, DomainError> {
    let details = checkouts.get_checkout(checkout_id).await?;

    if !details.checkout.is_active() {
        tracing::debug!("Checkout {} already returned, skipping reminder", checkout_id);
        return Ok(ReminderOutcome::Skipped);
    }

    if !notifier.is_available() {
        tracing::warn!(
            "Mail not configured, reminder for checkout {} not sent",
            checkout_id
        );
        return Ok(ReminderOutcome::Disabled);
    }

    let reminder = OverdueReminder {
        to: details.user.email.clone(),
        recipient_name: details.user.name.clone(),
        book_title: details.book.title.clone(),
        book_author: details.book.author.clone(),
        due_date: details.checkout.due_date,
        overdue_days: details.checkout.overdue_days,
        late_fee: details.checkout.late_fee_amount.unwrap_or(0.0),
    };

    match notifier.send_overdue_reminder(&reminder).await {
        Ok(()) => Ok(ReminderOutcome::Sent),
        Err(e) => {
            tracing::warn!("Reminder email for checkout {} failed: {}", checkout_id, e);
            Ok(ReminderOutcome::Failed)
        }
    }
}
