//! Repository trait definitions
//!
//! These traits define the contract for data access.
//! Implementations live in the infrastructure layer.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;

use super::DomainError;
use crate::models::book::{self, Book};
use crate::models::{checkout, permission, role, user, UserSummary};

/// Input for creating a user
#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub name: Option<String>,
    pub password_hash: String,
    pub is_staff: bool,
    /// Falls back to the staff or member default when `None`
    pub max_checkout_limit: Option<i32>,
}

/// Repository trait for User entity
#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn find_by_id(&self, id: i32) -> Result<Option<user::Model>, DomainError>;

    async fn find_by_email(&self, email: &str) -> Result<Option<user::Model>, DomainError>;

    async fn create(&self, input: NewUser) -> Result<user::Model, DomainError>;

    async fn mark_email_verified(
        &self,
        id: i32,
        at: DateTime<Utc>,
    ) -> Result<user::Model, DomainError>;
}

/// Repository trait for Book entity
#[async_trait]
pub trait BookRepository: Send + Sync {
    /// Raw row, including the last status written by the checkout engine
    async fn find_by_id(&self, id: i32) -> Result<Option<book::Model>, DomainError>;

    /// Single book with its status derived from active checkouts
    async fn find_with_status(&self, id: i32) -> Result<Option<Book>, DomainError>;

    /// All books with their status derived from active checkouts
    async fn find_all(&self) -> Result<Vec<Book>, DomainError>;

    async fn create(&self, book: Book) -> Result<Book, DomainError>;
}

/// Insert payload for a new active checkout
#[derive(Debug, Clone)]
pub struct NewCheckout {
    pub book_id: i32,
    pub user_id: i32,
    pub checkout_date: DateTime<Utc>,
    pub due_date: DateTime<Utc>,
    pub max_duration_days: i32,
    pub late_fee_per_day: f64,
}

/// Derived overdue state of a checkout at a given instant
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OverdueStatus {
    pub is_overdue: bool,
    pub overdue_days: i32,
    pub late_fee_amount: f64,
}

impl OverdueStatus {
    /// Fee as stored: only present while overdue
    pub fn stored_fee(&self) -> Option<f64> {
        self.is_overdue.then_some(self.late_fee_amount)
    }
}

/// Filter criteria for checkout listings
#[derive(Debug, Default, Clone)]
pub struct CheckoutFilter {
    pub user_id: Option<i32>,
    pub active_only: bool,
    pub overdue_only: bool,
}

/// Checkout joined with its book and a borrower summary
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutWithDetails {
    #[serde(flatten)]
    pub checkout: checkout::Model,
    pub book: Book,
    pub user: UserSummary,
}

/// Repository trait for Checkout entity
#[async_trait]
pub trait CheckoutRepository: Send + Sync {
    async fn find_by_id(&self, id: i32) -> Result<Option<checkout::Model>, DomainError>;

    async fn find_with_details(&self, id: i32) -> Result<Option<CheckoutWithDetails>, DomainError>;

    async fn find_all(&self, filter: CheckoutFilter) -> Result<Vec<CheckoutWithDetails>, DomainError>;

    /// All checkouts whose `returned_date` is null
    async fn find_active(&self) -> Result<Vec<checkout::Model>, DomainError>;

    async fn count_active_for_user(&self, user_id: i32) -> Result<u64, DomainError>;

    async fn count_active_for_book(&self, book_id: i32) -> Result<u64, DomainError>;

    async fn has_active_for_user_and_book(
        &self,
        user_id: i32,
        book_id: i32,
    ) -> Result<bool, DomainError>;

    /// Insert the checkout and mark its book `CHECKED_OUT` in one transaction.
    /// Fails with `BookAlreadyCheckedOut` if the book was taken concurrently.
    async fn create_and_check_out_book(
        &self,
        input: NewCheckout,
    ) -> Result<checkout::Model, DomainError>;

    /// Set `returned_date`, freeze the overdue fields and mark the book
    /// `AVAILABLE` in one transaction. Fails with `CheckoutAlreadyReturned`
    /// if the row was returned concurrently.
    async fn complete_return(
        &self,
        id: i32,
        returned_at: DateTime<Utc>,
        status: OverdueStatus,
    ) -> Result<checkout::Model, DomainError>;

    /// Persist a recomputed overdue state on an active checkout
    async fn update_overdue_status(
        &self,
        id: i32,
        status: OverdueStatus,
    ) -> Result<checkout::Model, DomainError>;

    /// Store the scheduler handle on an active checkout. Returns `false`
    /// and writes nothing once the checkout has been returned.
    async fn set_reminder_message_id(
        &self,
        id: i32,
        message_id: Option<String>,
    ) -> Result<bool, DomainError>;
}

/// Role with its permission actions
#[derive(Debug, Clone, Serialize)]
pub struct RoleWithPermissions {
    #[serde(flatten)]
    pub role: role::Model,
    pub permissions: Vec<String>,
}

/// Repository trait for Role and Permission entities and their joins
#[async_trait]
pub trait RoleRepository: Send + Sync {
    async fn find_all(&self) -> Result<Vec<RoleWithPermissions>, DomainError>;

    async fn find_by_name(&self, name: &str) -> Result<Option<role::Model>, DomainError>;

    /// Create a role granting the given (existing) permission actions
    async fn create_role(
        &self,
        name: String,
        description: Option<String>,
        actions: Vec<String>,
    ) -> Result<RoleWithPermissions, DomainError>;

    async fn assign_role(&self, user_id: i32, role_id: i32) -> Result<(), DomainError>;

    /// Names of the roles held by a user
    async fn role_names_for_user(&self, user_id: i32) -> Result<Vec<String>, DomainError>;

    /// Permission actions reachable through each of the user's roles,
    /// one entry per grant (duplicates possible)
    async fn permission_grants_for_user(&self, user_id: i32) -> Result<Vec<String>, DomainError>;

    /// Assign `role_name` if the user holds no role at all.
    /// Returns whether an assignment was made.
    async fn ensure_default_role(&self, user_id: i32, role_name: &str) -> Result<bool, DomainError>;

    async fn create_permission(
        &self,
        action: String,
        description: Option<String>,
    ) -> Result<permission::Model, DomainError>;

    /// Delete a permission; refused with `Conflict` while any role references it
    async fn delete_permission(&self, action: &str) -> Result<(), DomainError>;
}
