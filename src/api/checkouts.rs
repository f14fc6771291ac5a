use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Extension, Json,
};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::api::error::ApiResult;
use crate::domain::{AuthContext, CheckoutFilter, CheckoutWithDetails, DomainError, SessionUser};
use crate::infrastructure::AppState;
use crate::services::CreateCheckoutInput;

const READ_ALL: &str = "checkout:read";
const MANAGE: &str = "checkout:manage";

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutQuery {
    #[serde(default)]
    pub active: bool,
    #[serde(default)]
    pub overdue: bool,
    pub user_id: Option<i32>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutRequest {
    pub book_id: i32,
    /// Borrow on behalf of another member; requires `checkout:manage`
    pub user_id: Option<i32>,
    pub max_duration_days: Option<i32>,
    pub late_fee_per_day: Option<f64>,
}

/// Member the request acts for: the caller, or someone else for managers
fn borrower(user: &SessionUser, requested: Option<i32>) -> Result<i32, DomainError> {
    match requested {
        Some(id) if id != user.id => {
            if user.has_permission(MANAGE) {
                Ok(id)
            } else {
                Err(DomainError::MissingPermissions {
                    required: vec![MANAGE.to_string()],
                    require_all: false,
                })
            }
        }
        _ => Ok(user.id),
    }
}

/// Another member's checkout is reported as missing unless the caller may see it
fn ensure_visible(
    user: &SessionUser,
    owner_id: i32,
    permissions: &[&str],
) -> Result<(), DomainError> {
    if owner_id == user.id || permissions.iter().any(|p| user.has_permission(p)) {
        Ok(())
    } else {
        Err(DomainError::CheckoutNotFound)
    }
}

pub async fn list_checkouts(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Query(query): Query<CheckoutQuery>,
) -> ApiResult<Json<Value>> {
    let user = auth.require_user()?;

    let user_id = if user.has_permission(READ_ALL) {
        query.user_id
    } else {
        Some(user.id)
    };

    let checkouts = state
        .checkouts
        .list_checkouts(CheckoutFilter {
            user_id,
            active_only: query.active,
            overdue_only: query.overdue,
        })
        .await?;

    Ok(Json(json!({
        "total": checkouts.len(),
        "checkouts": checkouts,
    })))
}

pub async fn create_checkout(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(payload): Json<CheckoutRequest>,
) -> ApiResult<(StatusCode, Json<CheckoutWithDetails>)> {
    let user = auth.require_user()?;
    let user_id = borrower(user, payload.user_id)?;

    let checkout = state
        .checkouts
        .create_checkout(CreateCheckoutInput {
            book_id: payload.book_id,
            user_id,
            max_duration_days: payload.max_duration_days,
            late_fee_per_day: payload.late_fee_per_day,
        })
        .await?;

    Ok((StatusCode::CREATED, Json(checkout)))
}

/// Dry run of the eligibility rules. Rule failures are reported in the body,
/// not as an error status.
pub async fn validate_checkout(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(payload): Json<CheckoutRequest>,
) -> ApiResult<Json<Value>> {
    let user = auth.require_user()?;
    let user_id = borrower(user, payload.user_id)?;

    match state.checkouts.validate_checkout(user_id, payload.book_id).await {
        Ok(eligibility) => Ok(Json(json!({
            "valid": true,
            "currentCheckouts": eligibility.current_checkouts,
            "maxCheckouts": eligibility.max_checkouts,
        }))),
        Err(e) if e.is_client_error() => {
            let mut body = json!({
                "valid": false,
                "reason": e.to_string(),
                "code": e.code(),
            });
            if let DomainError::CheckoutLimitExceeded { current, max } = e {
                body["currentCheckouts"] = json!(current);
                body["maxCheckouts"] = json!(max);
            }
            Ok(Json(body))
        }
        Err(e) => Err(e.into()),
    }
}

pub async fn get_checkout(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<i32>,
) -> ApiResult<Json<CheckoutWithDetails>> {
    let user = auth.require_user()?;

    let checkout = state.checkouts.get_checkout(id).await?;
    ensure_visible(user, checkout.checkout.user_id, &[READ_ALL, MANAGE])?;

    Ok(Json(checkout))
}

pub async fn return_checkout(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<i32>,
) -> ApiResult<Json<CheckoutWithDetails>> {
    let user = auth.require_user()?;

    let existing = state
        .checkout_repo
        .find_by_id(id)
        .await?
        .ok_or(DomainError::CheckoutNotFound)?;
    ensure_visible(user, existing.user_id, &[MANAGE])?;

    let returned = state.checkouts.return_checkout(id).await?;
    Ok(Json(returned))
}

pub async fn overdue_sweep(State(state): State<AppState>) -> ApiResult<Json<Value>> {
    let updated = state.checkouts.update_all_overdue_statuses().await?;
    Ok(Json(json!({ "updated": updated })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    fn member(id: i32, permissions: &[&str]) -> SessionUser {
        SessionUser {
            id,
            email: format!("user{}@example.com", id),
            name: None,
            roles: BTreeSet::new(),
            permissions: permissions.iter().map(|p| p.to_string()).collect(),
            is_staff: false,
            email_verified: None,
        }
    }

    #[test]
    fn members_borrow_for_themselves_only() {
        let user = member(1, &["checkout:create"]);
        assert_eq!(borrower(&user, None).unwrap(), 1);
        assert_eq!(borrower(&user, Some(1)).unwrap(), 1);
        assert!(matches!(
            borrower(&user, Some(2)),
            Err(DomainError::MissingPermissions { .. })
        ));

        let manager = member(9, &[MANAGE]);
        assert_eq!(borrower(&manager, Some(2)).unwrap(), 2);
    }

    #[test]
    fn foreign_checkouts_are_hidden() {
        let user = member(1, &[]);
        assert!(ensure_visible(&user, 1, &[READ_ALL]).is_ok());
        assert!(matches!(
            ensure_visible(&user, 2, &[READ_ALL]),
            Err(DomainError::CheckoutNotFound)
        ));
        assert!(ensure_visible(&member(3, &[READ_ALL]), 2, &[READ_ALL]).is_ok());
    }
}
