//! Domain layer - Pure business abstractions
//!
//! This layer contains NO framework dependencies (no SeaORM queries, no Axum).
//! Only trait definitions, the authorization model and domain error types.

pub mod errors;
pub mod rbac;
pub mod reminders;
pub mod repositories;

pub use errors::DomainError;
pub use rbac::{AuthContext, AuthPolicy, MethodPolicies, Session, SessionUser};
pub use reminders::{Notifier, OverdueReminder, ReminderHandle, ReminderScheduler};
pub use repositories::*;
