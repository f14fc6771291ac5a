//! Callback fired by the reminder scheduler.
//!
//! Authenticated by the shared secret forwarded in `X-Reminder-Token`, not by
//! a user session.

use axum::{extract::State, http::HeaderMap, Json};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::api::error::ApiResult;
use crate::domain::DomainError;
use crate::infrastructure::reminder_scheduler::REMINDER_TOKEN_HEADER;
use crate::infrastructure::AppState;
use crate::services::handle_checkout_reminder;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReminderCallback {
    pub checkout_id: i32,
}

fn verify_token(headers: &HeaderMap, expected: Option<&str>) -> Result<(), DomainError> {
    let Some(expected) = expected else {
        tracing::warn!("REMINDER_CALLBACK_SECRET not set, rejecting reminder callback");
        return Err(DomainError::Unauthorized);
    };

    let presented = headers
        .get(REMINDER_TOKEN_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or(DomainError::Unauthorized)?;

    if presented.len() == expected.len()
        && presented
            .bytes()
            .zip(expected.bytes())
            .fold(0u8, |acc, (a, b)| acc | (a ^ b))
            == 0
    {
        Ok(())
    } else {
        Err(DomainError::InvalidSession)
    }
}

pub async fn checkout_reminder(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<ReminderCallback>,
) -> ApiResult<Json<Value>> {
    verify_token(&headers, state.reminder_secret.as_deref())?;

    let outcome =
        handle_checkout_reminder(&state.checkouts, state.notifier.as_ref(), payload.checkout_id)
            .await?;

    tracing::info!("Reminder for checkout {}: {:?}", payload.checkout_id, outcome);
    Ok(Json(json!({ "status": outcome })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn token_must_match() {
        let mut headers = HeaderMap::new();
        assert!(matches!(
            verify_token(&headers, Some("s3cret")),
            Err(DomainError::Unauthorized)
        ));

        headers.insert(REMINDER_TOKEN_HEADER, HeaderValue::from_static("wrong!"));
        assert!(matches!(
            verify_token(&headers, Some("s3cret")),
            Err(DomainError::InvalidSession)
        ));

        headers.insert(REMINDER_TOKEN_HEADER, HeaderValue::from_static("s3cret"));
        assert!(verify_token(&headers, Some("s3cret")).is_ok());
        assert!(verify_token(&headers, None).is_err());
    }
}
