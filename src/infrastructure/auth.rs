use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use axum::http::{header, HeaderMap};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::env;

use crate::domain::{Session, SessionUser};

/// Session token payload. The enriched user travels inside the token so
/// authorization never has to re-read role joins per request.
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String, // user id
    pub exp: usize,
    #[serde(default)]
    pub user: Option<SessionUser>,
}

pub fn hash_password(password: &str) -> Result<String, String> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();
    let password_hash = argon2
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| e.to_string())?
        .to_string();
    Ok(password_hash)
}

pub fn verify_password(password: &str, password_hash: &str) -> Result<bool, String> {
    let parsed_hash = PasswordHash::new(password_hash).map_err(|e| e.to_string())?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok())
}

const DEV_JWT_SECRET: &str = "secret";

/// Signing secret from `JWT_SECRET`. Only debug builds fall back to a fixed
/// development value; `main` calls this once at startup.
pub fn jwt_secret() -> Result<String, String> {
    resolve_jwt_secret(env::var("JWT_SECRET").ok(), cfg!(debug_assertions))
}

fn resolve_jwt_secret(configured: Option<String>, dev_fallback: bool) -> Result<String, String> {
    match configured.filter(|s| !s.trim().is_empty()) {
        Some(secret) => Ok(secret),
        None if dev_fallback => Ok(DEV_JWT_SECRET.to_string()),
        None => Err("JWT_SECRET environment variable must be set in production".to_string()),
    }
}

pub fn create_jwt(user: &SessionUser) -> Result<String, String> {
    let secret = jwt_secret()?;
    let expiration = Utc::now()
        .checked_add_signed(Duration::hours(24))
        .ok_or_else(|| "token expiry out of range".to_string())?
        .timestamp();

    let claims = Claims {
        sub: user.id.to_string(),
        exp: expiration as usize,
        user: Some(user.clone()),
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| e.to_string())
}

pub fn decode_jwt(token: &str) -> Result<Claims, String> {
    let secret = jwt_secret()?;
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map(|data| data.claims)
    .map_err(|e| e.to_string())
}

/// Resolve the request identity from its `Authorization` header.
///
/// `None` means anonymous. A header that is present but malformed, expired or
/// missing its user payload yields a session without a usable user.
pub fn session_from_headers(headers: &HeaderMap) -> Option<Session> {
    let value = headers.get(header::AUTHORIZATION)?;

    let Some(token) = value
        .to_str()
        .ok()
        .and_then(|v| v.strip_prefix("Bearer "))
    else {
        tracing::debug!("Invalid Authorization header format");
        return Some(Session::unusable());
    };

    match decode_jwt(token) {
        Ok(Claims {
            sub,
            user: Some(user),
            ..
        }) if user.id.to_string() == sub => Some(Session::new(user)),
        Ok(_) => {
            tracing::debug!("Session token carries no usable user payload");
            Some(Session::unusable())
        }
        Err(e) => {
            tracing::debug!("Rejected session token: {}", e);
            Some(Session::unusable())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    fn session_user() -> SessionUser {
        SessionUser {
            id: 7,
            email: "staff@example.com".into(),
            name: Some("Staff".into()),
            roles: BTreeSet::from(["Admin".to_string()]),
            permissions: BTreeSet::from(["checkout:manage".to_string()]),
            is_staff: true,
            email_verified: None,
        }
    }

    #[test]
    fn password_round_trip() {
        let hash = hash_password("correct horse").unwrap();
        assert!(verify_password("correct horse", &hash).unwrap());
        assert!(!verify_password("battery staple", &hash).unwrap());
    }

    #[test]
    fn token_carries_enriched_user() {
        let token = create_jwt(&session_user()).unwrap();
        let mut headers = HeaderMap::new();
        headers.insert(
            header::AUTHORIZATION,
            format!("Bearer {}", token).parse().unwrap(),
        );

        let session = session_from_headers(&headers).unwrap();
        assert_eq!(session.user, Some(session_user()));
    }

    #[test]
    fn missing_header_is_anonymous_and_garbage_is_unusable() {
        assert!(session_from_headers(&HeaderMap::new()).is_none());

        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, "Bearer not-a-jwt".parse().unwrap());
        let session = session_from_headers(&headers).unwrap();
        assert!(session.user.is_none());

        headers.insert(header::AUTHORIZATION, "Basic abc".parse().unwrap());
        assert!(session_from_headers(&headers).unwrap().user.is_none());
    }

    #[test]
    fn jwt_secret_fallback_only_in_debug() {
        assert_eq!(resolve_jwt_secret(Some("s3cret".into()), false).unwrap(), "s3cret");
        assert_eq!(resolve_jwt_secret(None, true).unwrap(), DEV_JWT_SECRET);
        assert!(resolve_jwt_secret(None, false).is_err());
        assert!(resolve_jwt_secret(Some("  ".into()), false).is_err());
    }
}
