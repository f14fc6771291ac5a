//! Session enrichment
//!
//! Flattens a user's role joins into the payload carried by the session, so
//! request-time authorization is a pure set lookup.

use crate::domain::rbac::effective_permissions;
use crate::domain::{DomainError, RoleRepository, SessionUser, UserRepository};

/// Load `user_id` with its role names and effective permission set
pub async fn build_session_user(
    users: &dyn UserRepository,
    roles: &dyn RoleRepository,
    user_id: i32,
) -> Result<SessionUser, DomainError> {
    let user = users
        .find_by_id(user_id)
        .await?
        .ok_or(DomainError::UserNotFound)?;

    let role_names = roles.role_names_for_user(user_id).await?;
    let grants = roles.permission_grants_for_user(user_id).await?;

    Ok(SessionUser {
        id: user.id,
        email: user.email,
        name: user.name,
        roles: role_names.into_iter().collect(),
        permissions: effective_permissions(grants),
        is_staff: user.is_staff,
        email_verified: user.email_verified,
    })
}
