use axum::{extract::State, Json};
use serde_json::{json, Value};

use crate::infrastructure::AppState;

pub async fn health_check(State(state): State<AppState>) -> Json<Value> {
    let database = match state.db().ping().await {
        Ok(()) => "ok",
        Err(e) => {
            tracing::warn!("Database ping failed: {}", e);
            "unavailable"
        }
    };

    Json(json!({
        "status": "ok",
        "service": "shelfdesk",
        "version": env!("CARGO_PKG_VERSION"),
        "database": database,
        "notifications": state.notifier.is_available(),
    }))
}
