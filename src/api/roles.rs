use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::api::error::ApiResult;
use crate::domain::{DomainError, RoleWithPermissions};
use crate::infrastructure::AppState;

#[derive(Debug, Deserialize)]
pub struct CreateRoleRequest {
    pub name: String,
    pub description: Option<String>,
    #[serde(default)]
    pub permissions: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignRoleRequest {
    pub user_id: i32,
}

pub async fn list_roles(State(state): State<AppState>) -> ApiResult<Json<Value>> {
    let roles = state.role_repo.find_all().await?;
    Ok(Json(json!({ "roles": roles })))
}

pub async fn create_role(
    State(state): State<AppState>,
    Json(payload): Json<CreateRoleRequest>,
) -> ApiResult<(StatusCode, Json<RoleWithPermissions>)> {
    let role = state
        .role_repo
        .create_role(payload.name, payload.description, payload.permissions)
        .await?;

    tracing::info!("Role '{}' created with {} permission(s)", role.role.name, role.permissions.len());
    Ok((StatusCode::CREATED, Json(role)))
}

pub async fn assign_role(
    State(state): State<AppState>,
    Path(role_id): Path<i32>,
    Json(payload): Json<AssignRoleRequest>,
) -> ApiResult<StatusCode> {
    state
        .user_repo
        .find_by_id(payload.user_id)
        .await?
        .ok_or(DomainError::UserNotFound)?;

    state.role_repo.assign_role(payload.user_id, role_id).await?;
    tracing::info!("Role {} assigned to user {}", role_id, payload.user_id);

    Ok(StatusCode::NO_CONTENT)
}
