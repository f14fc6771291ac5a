use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;

use crate::api::error::ApiResult;
use crate::infrastructure::AppState;
use crate::models::permission;

#[derive(Debug, Deserialize)]
pub struct CreatePermissionRequest {
    pub action: String,
    pub description: Option<String>,
}

pub async fn create_permission(
    State(state): State<AppState>,
    Json(payload): Json<CreatePermissionRequest>,
) -> ApiResult<(StatusCode, Json<permission::Model>)> {
    let created = state
        .role_repo
        .create_permission(payload.action, payload.description)
        .await?;
    Ok((StatusCode::CREATED, Json(created)))
}

pub async fn delete_permission(
    State(state): State<AppState>,
    Path(action): Path<String>,
) -> ApiResult<StatusCode> {
    state.role_repo.delete_permission(&action).await?;
    tracing::info!("Permission '{}' deleted", action);
    Ok(StatusCode::NO_CONTENT)
}
