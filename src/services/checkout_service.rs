//! Checkout Service - lending lifecycle, due dates and late fees
//!
//! A checkout goes `ACTIVE -> RETURNED` exactly once. While active its
//! overdue fields are derived from the due date by [`calculate_late_fees`]
//! and reconciled by [`CheckoutService::check_overdue_status`]; at return
//! they are frozen. Reminder side effects are handed to the
//! [`ReminderQueue`] after the storage transaction has committed.

use std::sync::Arc;

use chrono::{DateTime, Days, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{
    BookRepository, CheckoutFilter, CheckoutRepository, CheckoutWithDetails, DomainError,
    NewCheckout, OverdueStatus, UserRepository,
};
use crate::infrastructure::tasks::{ReminderJob, ReminderQueue};
use crate::models::book::BookStatus;
use crate::models::checkout;

pub const DEFAULT_MAX_DURATION_DAYS: i32 = 14;
pub const DEFAULT_LATE_FEE_PER_DAY: f64 = 0.5;

const MILLIS_PER_DAY: i64 = 86_400_000;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateCheckoutInput {
    pub book_id: i32,
    pub user_id: i32,
    pub max_duration_days: Option<i32>,
    pub late_fee_per_day: Option<f64>,
}

/// Successful eligibility check
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutEligibility {
    pub current_checkouts: u64,
    pub max_checkouts: u64,
}

/// `checkout_date` plus `max_duration_days` calendar days, same time of day
pub fn calculate_due_date(
    checkout_date: DateTime<Utc>,
    max_duration_days: u32,
) -> Option<DateTime<Utc>> {
    checkout_date.checked_add_days(Days::new(u64::from(max_duration_days)))
}

/// Overdue state of a loan due at `due_date`, as seen at `as_of`.
///
/// Whole days are floored; a loan is overdue from the first full day past
/// its due date. The fee is rounded to cents.
pub fn calculate_late_fees(
    due_date: DateTime<Utc>,
    late_fee_per_day: f64,
    as_of: DateTime<Utc>,
) -> OverdueStatus {
    let days = (as_of - due_date)
        .num_milliseconds()
        .div_euclid(MILLIS_PER_DAY);

    if days <= 0 {
        return OverdueStatus::default();
    }

    let overdue_days = i32::try_from(days).unwrap_or(i32::MAX);
    OverdueStatus {
        is_overdue: true,
        overdue_days,
        late_fee_amount: round_cents(f64::from(overdue_days) * late_fee_per_day),
    }
}

fn round_cents(amount: f64) -> f64 {
    (amount * 100.0).round() / 100.0
}

/// The status to write for an active checkout, or `None` when the stored
/// flag and day count already match.
fn reconcile(checkout: &checkout::Model, as_of: DateTime<Utc>) -> Option<OverdueStatus> {
    if !checkout.is_active() {
        return None;
    }

    let status = calculate_late_fees(checkout.due_date, checkout.late_fee_per_day, as_of);
    let changed =
        status.is_overdue != checkout.is_overdue || status.overdue_days != checkout.overdue_days;

    changed.then_some(status)
}

#[derive(Clone)]
pub struct CheckoutService {
    users: Arc<dyn UserRepository>,
    books: Arc<dyn BookRepository>,
    checkouts: Arc<dyn CheckoutRepository>,
    reminders: ReminderQueue,
}

impl CheckoutService {
    pub fn new(
        users: Arc<dyn UserRepository>,
        books: Arc<dyn BookRepository>,
        checkouts: Arc<dyn CheckoutRepository>,
        reminders: ReminderQueue,
    ) -> Self {
        Self {
            users,
            books,
            checkouts,
            reminders,
        }
    }

    /// Check whether `user_id` may borrow `book_id` right now.
    ///
    /// Rules are applied in order and the first failing one is returned.
    pub async fn validate_checkout(
        &self,
        user_id: i32,
        book_id: i32,
    ) -> Result<CheckoutEligibility, DomainError> {
        let user = self
            .users
            .find_by_id(user_id)
            .await?
            .ok_or(DomainError::UserNotFound)?;

        if !user.is_staff && user.email_verified.is_none() {
            return Err(DomainError::EmailNotVerified);
        }

        let current = self.checkouts.count_active_for_user(user_id).await?;
        let max = u64::try_from(user.max_checkout_limit).unwrap_or(0);
        if current >= max {
            return Err(DomainError::CheckoutLimitExceeded { current, max });
        }

        let book = self
            .books
            .find_by_id(book_id)
            .await?
            .ok_or(DomainError::BookNotFound)?;

        let active_for_book = self.checkouts.count_active_for_book(book_id).await?;
        if active_for_book > 0 || book.status == BookStatus::CheckedOut {
            return Err(DomainError::BookAlreadyCheckedOut);
        }

        if self
            .checkouts
            .has_active_for_user_and_book(user_id, book_id)
            .await?
        {
            return Err(DomainError::DuplicateCheckout);
        }

        Ok(CheckoutEligibility {
            current_checkouts: current,
            max_checkouts: max,
        })
    }

    pub async fn create_checkout(
        &self,
        input: CreateCheckoutInput,
    ) -> Result<CheckoutWithDetails, DomainError> {
        self.create_checkout_at(input, Utc::now()).await
    }

    pub async fn create_checkout_at(
        &self,
        input: CreateCheckoutInput,
        now: DateTime<Utc>,
    ) -> Result<CheckoutWithDetails, DomainError> {
        let max_duration_days = input.max_duration_days.unwrap_or(DEFAULT_MAX_DURATION_DAYS);
        let late_fee_per_day = input.late_fee_per_day.unwrap_or(DEFAULT_LATE_FEE_PER_DAY);

        let days = u32::try_from(max_duration_days).map_err(|_| {
            DomainError::Validation("maxDurationDays must not be negative".to_string())
        })?;
        if !late_fee_per_day.is_finite() || late_fee_per_day < 0.0 {
            return Err(DomainError::Validation(
                "lateFeePerDay must be a non-negative amount".to_string(),
            ));
        }

        self.validate_checkout(input.user_id, input.book_id).await?;

        let due_date = calculate_due_date(now, days)
            .ok_or_else(|| DomainError::Validation("Due date is out of range".to_string()))?;

        let saved = self
            .checkouts
            .create_and_check_out_book(NewCheckout {
                book_id: input.book_id,
                user_id: input.user_id,
                checkout_date: now,
                due_date,
                max_duration_days,
                late_fee_per_day,
            })
            .await?;

        tracing::info!(
            "📚 Checkout {} created: book {} to user {}, due {}",
            saved.id,
            saved.book_id,
            saved.user_id,
            saved.due_date
        );

        self.reminders.enqueue(ReminderJob::Schedule {
            checkout_id: saved.id,
            due_date: saved.due_date,
        });

        self.checkouts
            .find_with_details(saved.id)
            .await?
            .ok_or(DomainError::CheckoutNotFound)
    }

    pub async fn return_checkout(&self, checkout_id: i32) -> Result<CheckoutWithDetails, DomainError> {
        self.return_checkout_at(checkout_id, Utc::now()).await
    }

    pub async fn return_checkout_at(
        &self,
        checkout_id: i32,
        now: DateTime<Utc>,
    ) -> Result<CheckoutWithDetails, DomainError> {
        let existing = self
            .checkouts
            .find_by_id(checkout_id)
            .await?
            .ok_or(DomainError::CheckoutNotFound)?;

        if !existing.is_active() {
            return Err(DomainError::CheckoutAlreadyReturned);
        }

        let status = calculate_late_fees(existing.due_date, existing.late_fee_per_day, now);
        let returned = self
            .checkouts
            .complete_return(checkout_id, now, status)
            .await?;

        tracing::info!(
            "📗 Checkout {} returned, overdue days {}, fee {:?}",
            returned.id,
            returned.overdue_days,
            returned.late_fee_amount
        );

        if let Some(handle) = existing.reminder_message_id {
            self.reminders.enqueue(ReminderJob::Cancel {
                checkout_id,
                handle,
            });
        }

        self.checkouts
            .find_with_details(checkout_id)
            .await?
            .ok_or(DomainError::CheckoutNotFound)
    }

    /// Bring one checkout's stored overdue fields up to date.
    /// Returned checkouts are handed back untouched.
    pub async fn check_overdue_status(
        &self,
        checkout_id: i32,
    ) -> Result<Option<checkout::Model>, DomainError> {
        self.check_overdue_status_at(checkout_id, Utc::now()).await
    }

    pub async fn check_overdue_status_at(
        &self,
        checkout_id: i32,
        now: DateTime<Utc>,
    ) -> Result<Option<checkout::Model>, DomainError> {
        let Some(checkout) = self.checkouts.find_by_id(checkout_id).await? else {
            return Ok(None);
        };

        match reconcile(&checkout, now) {
            Some(status) => Ok(Some(
                self.checkouts
                    .update_overdue_status(checkout_id, status)
                    .await?,
            )),
            None => Ok(Some(checkout)),
        }
    }

    /// Reconcile every active checkout; returns how many rows changed
    pub async fn update_all_overdue_statuses(&self) -> Result<u64, DomainError> {
        self.update_all_overdue_statuses_at(Utc::now()).await
    }

    pub async fn update_all_overdue_statuses_at(&self, now: DateTime<Utc>) -> Result<u64, DomainError> {
        let mut updated = 0;

        for checkout in self.checkouts.find_active().await? {
            if let Some(status) = reconcile(&checkout, now) {
                self.checkouts
                    .update_overdue_status(checkout.id, status)
                    .await?;
                updated += 1;
            }
        }

        tracing::info!("Overdue sweep updated {} checkout(s)", updated);
        Ok(updated)
    }

    pub async fn list_checkouts(
        &self,
        filter: CheckoutFilter,
    ) -> Result<Vec<CheckoutWithDetails>, DomainError> {
        self.checkouts.find_all(filter).await
    }

    /// Detail view, reconciled before it is read
    pub async fn get_checkout(&self, checkout_id: i32) -> Result<CheckoutWithDetails, DomainError> {
        self.check_overdue_status(checkout_id)
            .await?
            .ok_or(DomainError::CheckoutNotFound)?;

        self.checkouts
            .find_with_details(checkout_id)
            .await?
            .ok_or(DomainError::CheckoutNotFound)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn at(day: u32, hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, day, hour, 0, 0).unwrap()
    }

    fn active(due: DateTime<Utc>) -> checkout::Model {
        checkout::Model {
            id: 1,
            book_id: 1,
            user_id: 1,
            checkout_date: due - Duration::days(14),
            due_date: due,
            max_duration_days: 14,
            late_fee_per_day: 0.5,
            returned_date: None,
            is_overdue: false,
            overdue_days: 0,
            late_fee_amount: None,
            reminder_message_id: None,
            created_at: String::new(),
            updated_at: String::new(),
        }
    }

    #[test]
    fn due_date_keeps_time_of_day() {
        let start = Utc.with_ymd_and_hms(2024, 2, 20, 15, 42, 7).unwrap();
        let due = calculate_due_date(start, 14).unwrap();
        assert_eq!(due, Utc.with_ymd_and_hms(2024, 3, 5, 15, 42, 7).unwrap());
        assert_eq!(calculate_due_date(start, 0), Some(start));
    }

    #[test]
    fn not_overdue_on_or_before_due_date() {
        let due = at(15, 12);
        assert_eq!(calculate_late_fees(due, 0.5, at(10, 0)), OverdueStatus::default());
        assert_eq!(calculate_late_fees(due, 0.5, due), OverdueStatus::default());
        // 23 hours late is still zero whole days
        assert_eq!(
            calculate_late_fees(due, 0.5, at(16, 11)),
            OverdueStatus::default()
        );
    }

    #[test]
    fn fee_uses_floored_days_and_cents() {
        let due = at(1, 0);
        let status = calculate_late_fees(due, 0.5, at(3, 23));
        assert!(status.is_overdue);
        assert_eq!(status.overdue_days, 2);
        assert_eq!(status.late_fee_amount, 1.0);

        let status = calculate_late_fees(due, 0.333, at(4, 0));
        assert_eq!(status.overdue_days, 3);
        assert_eq!(status.late_fee_amount, 1.0);

        let status = calculate_late_fees(due, 0.0, at(11, 0));
        assert_eq!(status.overdue_days, 10);
        assert_eq!(status.late_fee_amount, 0.0);
    }

    #[test]
    fn reconcile_writes_only_on_change() {
        let due = at(10, 0);
        let mut checkout = active(due);

        assert_eq!(reconcile(&checkout, at(5, 0)), None);

        let status = reconcile(&checkout, at(12, 0)).unwrap();
        assert_eq!(status.overdue_days, 2);

        checkout.is_overdue = true;
        checkout.overdue_days = 2;
        assert_eq!(reconcile(&checkout, at(12, 6)), None);

        checkout.returned_date = Some(at(12, 0));
        assert_eq!(reconcile(&checkout, at(20, 0)), None);
    }
}
