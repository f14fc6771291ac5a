//! Per-route authorization
//!
//! Each guarded route carries its own [`MethodPolicies`]. The middleware
//! resolves the session from the `Authorization` header, evaluates the policy
//! for the request method and hands the resulting [`AuthContext`] to the
//! handler as a request extension.

use std::sync::Arc;

use axum::{
    extract::{Request, State},
    middleware::{self, Next},
    response::Response,
    routing::MethodRouter,
};

use crate::api::error::ApiError;
use crate::domain::MethodPolicies;
use crate::infrastructure::auth::session_from_headers;
use crate::infrastructure::AppState;

pub async fn require_policies(
    State(policies): State<Arc<MethodPolicies>>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let session = session_from_headers(req.headers());
    let ctx = policies.authorize(req.method().as_str(), session.as_ref())?;

    req.extensions_mut().insert(ctx);
    Ok(next.run(req).await)
}

/// Attach `policies` to every method of `routes`
pub fn guarded(routes: MethodRouter<AppState>, policies: MethodPolicies) -> MethodRouter<AppState> {
    routes.route_layer(middleware::from_fn_with_state(
        Arc::new(policies),
        require_policies,
    ))
}
