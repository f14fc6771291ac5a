//! Services Layer
//!
//! Business logic on top of the repository traits. Handlers in `api` stay
//! thin and only translate between HTTP and these calls.

pub mod checkout_service;
pub mod rbac_service;
pub mod reminder_service;
pub mod user_service;

pub use checkout_service::{
    calculate_due_date, calculate_late_fees, CheckoutEligibility, CheckoutService,
    CreateCheckoutInput,
};
pub use rbac_service::build_session_user;
pub use reminder_service::{handle_checkout_reminder, ReminderOutcome};
