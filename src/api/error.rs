//! Mapping of domain errors onto HTTP responses

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use crate::domain::DomainError;

/// Handler error. Renders as `{"error": {"code", "message", "details"}}`.
#[derive(Debug)]
pub struct ApiError(pub DomainError);

impl From<DomainError> for ApiError {
    fn from(e: DomainError) -> Self {
        ApiError(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.0.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        let message = if self.0.is_client_error() {
            self.0.to_string()
        } else {
            tracing::error!("{} ({}): {}", status, self.0.code(), self.0);
            match &self.0 {
                DomainError::External(_) => "A required service is temporarily unavailable",
                _ => "An unexpected error occurred",
            }
            .to_string()
        };

        let body = json!({
            "error": {
                "code": self.0.code(),
                "message": message,
                "details": self.0.details(),
            }
        });

        (status, Json(body)).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;
    use serde_json::Value;

    async fn body_of(err: DomainError) -> (StatusCode, Value) {
        let res = ApiError(err).into_response();
        let status = res.status();
        let bytes = to_bytes(res.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn client_errors_pass_message_through() {
        let (status, body) = body_of(DomainError::CheckoutLimitExceeded { current: 3, max: 3 }).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], "CHECKOUT_LIMIT_EXCEEDED");
        assert_eq!(
            body["error"]["message"],
            "You have 3 active checkouts out of 3 allowed"
        );
        assert_eq!(body["error"]["details"]["maxCheckouts"], 3);
    }

    #[tokio::test]
    async fn server_errors_are_generic() {
        let (status, body) = body_of(DomainError::Database("no such table: users".into())).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"]["message"], "An unexpected error occurred");
        assert!(!body.to_string().contains("no such table"));
    }
}
