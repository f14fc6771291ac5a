//! Domain error types
//!
//! These errors are framework-agnostic and represent business-level failures.
//! The HTTP layer maps them onto responses through `status_code()` and `code()`.

use serde_json::{Value, json};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DomainError {
    /// No authenticated identity where one is required
    #[error("Authentication required")]
    Unauthorized,

    /// An identity is present but its session payload is unusable
    #[error("Invalid session")]
    InvalidSession,

    #[error("Invalid email or password")]
    InvalidCredentials,

    #[error("Missing required permissions ({}): {}", mode_label(.require_all), .required.join(", "))]
    MissingPermissions {
        required: Vec<String>,
        require_all: bool,
    },

    #[error("Missing required roles ({}): {}", mode_label(.require_all), .required.join(", "))]
    MissingRoles {
        required: Vec<String>,
        require_all: bool,
    },

    #[error("User not found")]
    UserNotFound,

    #[error("Book not found")]
    BookNotFound,

    #[error("Checkout not found")]
    CheckoutNotFound,

    #[error("This book is already checked out")]
    BookAlreadyCheckedOut,

    #[error("You already have this book checked out")]
    DuplicateCheckout,

    #[error("You have {current} active checkouts out of {max} allowed")]
    CheckoutLimitExceeded { current: u64, max: u64 },

    #[error("This checkout has already been returned")]
    CheckoutAlreadyReturned,

    #[error("Please verify your email address before checking out books")]
    EmailNotVerified,

    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    Conflict(String),

    #[error("{0} not found")]
    NotFound(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("External service error: {0}")]
    External(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

fn mode_label(require_all: &bool) -> &'static str {
    if *require_all { "all of" } else { "any of" }
}

impl DomainError {
    /// Stable machine-readable code
    pub fn code(&self) -> &'static str {
        match self {
            DomainError::Unauthorized => "UNAUTHORIZED",
            DomainError::InvalidSession => "INVALID_SESSION",
            DomainError::InvalidCredentials => "INVALID_CREDENTIALS",
            DomainError::MissingPermissions { .. } => "MISSING_PERMISSIONS",
            DomainError::MissingRoles { .. } => "MISSING_ROLES",
            DomainError::UserNotFound => "USER_NOT_FOUND",
            DomainError::BookNotFound => "BOOK_NOT_FOUND",
            DomainError::CheckoutNotFound => "CHECKOUT_NOT_FOUND",
            DomainError::BookAlreadyCheckedOut => "BOOK_ALREADY_CHECKED_OUT",
            DomainError::DuplicateCheckout => "DUPLICATE_CHECKOUT",
            DomainError::CheckoutLimitExceeded { .. } => "CHECKOUT_LIMIT_EXCEEDED",
            DomainError::CheckoutAlreadyReturned => "CHECKOUT_ALREADY_RETURNED",
            DomainError::EmailNotVerified => "EMAIL_NOT_VERIFIED",
            DomainError::Validation(_) => "VALIDATION_ERROR",
            DomainError::Conflict(_) => "CONFLICT",
            DomainError::NotFound(_) => "NOT_FOUND",
            DomainError::Database(_) => "DATABASE_ERROR",
            DomainError::External(_) => "EXTERNAL_SERVICE_ERROR",
            DomainError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// HTTP status family this error belongs to
    pub fn status_code(&self) -> u16 {
        match self {
            DomainError::Unauthorized
            | DomainError::InvalidSession
            | DomainError::InvalidCredentials => 401,
            DomainError::MissingPermissions { .. } | DomainError::MissingRoles { .. } => 403,
            DomainError::UserNotFound
            | DomainError::BookNotFound
            | DomainError::CheckoutNotFound
            | DomainError::NotFound(_) => 404,
            DomainError::BookAlreadyCheckedOut
            | DomainError::DuplicateCheckout
            | DomainError::CheckoutLimitExceeded { .. }
            | DomainError::CheckoutAlreadyReturned
            | DomainError::EmailNotVerified
            | DomainError::Validation(_) => 400,
            DomainError::Conflict(_) => 409,
            DomainError::External(_) => 503,
            DomainError::Database(_) | DomainError::Internal(_) => 500,
        }
    }

    /// Optional structured payload for client-side messaging
    pub fn details(&self) -> Option<Value> {
        match self {
            DomainError::MissingPermissions {
                required,
                require_all,
            }
            | DomainError::MissingRoles {
                required,
                require_all,
            } => Some(json!({
                "required": required,
                "mode": if *require_all { "all" } else { "any" },
            })),
            DomainError::CheckoutLimitExceeded { current, max } => Some(json!({
                "currentCheckouts": current,
                "maxCheckouts": max,
            })),
            _ => None,
        }
    }

    /// Whether the failure is the caller's to fix (4xx) rather than ours
    pub fn is_client_error(&self) -> bool {
        self.status_code() < 500
    }
}

// Conversion from SeaORM errors (used in infrastructure layer)
impl From<sea_orm::DbErr> for DomainError {
    fn from(e: sea_orm::DbErr) -> Self {
        DomainError::Database(e.to_string())
    }
}

impl From<reqwest::Error> for DomainError {
    fn from(e: reqwest::Error) -> Self {
        DomainError::External(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn limit_message_carries_counts() {
        let err = DomainError::CheckoutLimitExceeded { current: 2, max: 2 };
        assert_eq!(err.to_string(), "You have 2 active checkouts out of 2 allowed");
        assert_eq!(err.status_code(), 400);
        let details = err.details().unwrap();
        assert_eq!(details["currentCheckouts"], 2);
        assert_eq!(details["maxCheckouts"], 2);
    }

    #[test]
    fn rbac_failures_describe_mode() {
        let err = DomainError::MissingPermissions {
            required: vec!["book:create".into(), "book:update".into()],
            require_all: true,
        };
        assert_eq!(err.code(), "MISSING_PERMISSIONS");
        assert_eq!(err.status_code(), 403);
        assert!(err.to_string().contains("all of"));
        assert_eq!(err.details().unwrap()["mode"], "all");
    }

    #[test]
    fn storage_errors_are_server_side() {
        let err: DomainError = sea_orm::DbErr::Custom("boom".into()).into();
        assert_eq!(err.status_code(), 500);
        assert!(!err.is_client_error());
        assert!(DomainError::DuplicateCheckout.is_client_error());
    }
}
