use axum::{
    extract::{Path, State},
    Json,
};

use crate::api::error::ApiResult;
use crate::infrastructure::AppState;
use crate::models::user;
use crate::services::user_service;

pub async fn verify_email(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> ApiResult<Json<user::Model>> {
    let user = user_service::verify_email(state.user_repo.as_ref(), id).await?;
    tracing::info!("Email verified for user {}", user.id);
    Ok(Json(user))
}
