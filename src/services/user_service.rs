//! User Service - registration, sign-in and account verification

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::domain::{DomainError, NewUser, RoleRepository, SessionUser, UserRepository};
use crate::infrastructure::auth::{create_jwt, hash_password, verify_password};
use crate::models::{role, user};
use crate::services::rbac_service::build_session_user;

const MIN_PASSWORD_LEN: usize = 8;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    pub name: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct AuthResponse {
    pub token: String,
    pub user: SessionUser,
}

/// Create a member account. New accounts always start with the `Customer`
/// role and an unverified email.
pub async fn register(
    users: &dyn UserRepository,
    roles: &dyn RoleRepository,
    req: RegisterRequest,
) -> Result<AuthResponse, DomainError> {
    let email = req.email.trim().to_lowercase();
    if !email.contains('@') {
        return Err(DomainError::Validation("A valid email is required".to_string()));
    }
    if req.password.len() < MIN_PASSWORD_LEN {
        return Err(DomainError::Validation(format!(
            "Password must be at least {} characters",
            MIN_PASSWORD_LEN
        )));
    }

    let password_hash = hash_password(&req.password).map_err(DomainError::Internal)?;

    let created = users
        .create(NewUser {
            email,
            name: req.name.filter(|n| !n.trim().is_empty()),
            password_hash,
            is_staff: false,
            max_checkout_limit: None,
        })
        .await?;

    roles.ensure_default_role(created.id, role::CUSTOMER).await?;
    tracing::info!("Registered user {} ({})", created.id, created.email);

    issue_token(users, roles, created.id).await
}

pub async fn login(
    users: &dyn UserRepository,
    roles: &dyn RoleRepository,
    req: LoginRequest,
) -> Result<AuthResponse, DomainError> {
    let email = req.email.trim().to_lowercase();
    let Some(found) = users.find_by_email(&email).await? else {
        tracing::debug!("Login attempt for unknown email {}", email);
        return Err(DomainError::InvalidCredentials);
    };

    let valid = verify_password(&req.password, &found.password_hash).map_err(DomainError::Internal)?;
    if !valid {
        tracing::debug!("Wrong password for user {}", found.id);
        return Err(DomainError::InvalidCredentials);
    }

    roles.ensure_default_role(found.id, role::CUSTOMER).await?;

    issue_token(users, roles, found.id).await
}

async fn issue_token(
    users: &dyn UserRepository,
    roles: &dyn RoleRepository,
    user_id: i32,
) -> Result<AuthResponse, DomainError> {
    let session_user = build_session_user(users, roles, user_id).await?;
    let token = create_jwt(&session_user).map_err(DomainError::Internal)?;

    Ok(AuthResponse {
        token,
        user: session_user,
    })
}

/// Mark a member's email as verified. Verifying twice keeps the first timestamp.
pub async fn verify_email(users: &dyn UserRepository, user_id: i32) -> Result<user::Model, DomainError> {
    users.mark_email_verified(user_id, Utc::now()).await
}
