use axum::{extract::State, http::StatusCode, Extension, Json};

use crate::api::error::ApiResult;
use crate::domain::{AuthContext, SessionUser};
use crate::infrastructure::AppState;
use crate::services::build_session_user;
use crate::services::user_service::{self, AuthResponse, LoginRequest, RegisterRequest};

pub async fn register(
    State(state): State<AppState>,
    Json(payload): Json<RegisterRequest>,
) -> ApiResult<(StatusCode, Json<AuthResponse>)> {
    let res =
        user_service::register(state.user_repo.as_ref(), state.role_repo.as_ref(), payload).await?;
    Ok((StatusCode::CREATED, Json(res)))
}

pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> ApiResult<Json<AuthResponse>> {
    tracing::info!("Login attempt for {}", payload.email);
    let res = user_service::login(state.user_repo.as_ref(), state.role_repo.as_ref(), payload).await?;
    Ok(Json(res))
}

/// Current user, re-read from storage so role changes show up before the
/// token is renewed
pub async fn get_me(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> ApiResult<Json<SessionUser>> {
    let user = auth.require_user()?;
    let fresh =
        build_session_user(state.user_repo.as_ref(), state.role_repo.as_ref(), user.id).await?;
    Ok(Json(fresh))
}
