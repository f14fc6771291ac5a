pub mod auth;
pub mod books;
pub mod checkouts;
pub mod error;
pub mod health;
pub mod middleware;
pub mod permissions;
pub mod reminders;
pub mod roles;
pub mod users;

use axum::{
    routing::{delete, get, post, put},
    Router,
};

use crate::domain::{AuthPolicy, MethodPolicies};
use crate::infrastructure::AppState;
use middleware::guarded;

fn needs(actions: &[&str]) -> AuthPolicy {
    AuthPolicy::authenticated().permissions(actions.iter().copied())
}

pub fn api_router(state: AppState) -> Router {
    Router::new()
        // Health check
        .route("/health", get(health::health_check))
        // Auth
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login))
        .route(
            "/auth/me",
            guarded(
                get(auth::get_me),
                MethodPolicies::new().get(AuthPolicy::authenticated()),
            ),
        )
        // Books: reads are public
        .route(
            "/books",
            guarded(
                get(books::list_books).post(books::create_book),
                MethodPolicies::new().post(needs(&["book:create"])),
            ),
        )
        .route(
            "/books/:id",
            guarded(get(books::get_book), MethodPolicies::new()),
        )
        // Checkouts
        .route(
            "/checkouts",
            guarded(
                get(checkouts::list_checkouts).post(checkouts::create_checkout),
                MethodPolicies::new()
                    .get(AuthPolicy::authenticated())
                    .post(needs(&["checkout:create"])),
            ),
        )
        .route(
            "/checkouts/validate",
            guarded(
                post(checkouts::validate_checkout),
                MethodPolicies::new().post(needs(&["checkout:create"])),
            ),
        )
        .route(
            "/checkouts/overdue-sweep",
            guarded(
                post(checkouts::overdue_sweep),
                MethodPolicies::new().post(needs(&["checkout:manage"])),
            ),
        )
        .route(
            "/checkouts/:id",
            guarded(
                get(checkouts::get_checkout),
                MethodPolicies::new().get(AuthPolicy::authenticated()),
            ),
        )
        .route(
            "/checkouts/:id/return",
            guarded(
                put(checkouts::return_checkout),
                MethodPolicies::new().put(needs(&["checkout:return", "checkout:manage"])),
            ),
        )
        // Roles and permissions
        .route(
            "/roles",
            guarded(
                get(roles::list_roles).post(roles::create_role),
                MethodPolicies::new()
                    .get(needs(&["role:read"]))
                    .post(needs(&["role:read", "role:manage"]).require_all_permissions()),
            ),
        )
        .route(
            "/roles/:id/users",
            guarded(
                post(roles::assign_role),
                MethodPolicies::new()
                    .post(needs(&["role:read", "role:manage"]).require_all_permissions()),
            ),
        )
        .route(
            "/permissions",
            guarded(
                post(permissions::create_permission),
                MethodPolicies::new().post(needs(&["permission:manage"])),
            ),
        )
        .route(
            "/permissions/:action",
            guarded(
                delete(permissions::delete_permission),
                MethodPolicies::new().delete(needs(&["permission:manage"])),
            ),
        )
        // Users
        .route(
            "/users/:id/verify-email",
            guarded(
                post(users::verify_email),
                MethodPolicies::new().post(needs(&["user:manage"])),
            ),
        )
        // Scheduler callback, authenticated by shared secret
        .route("/reminders/checkout", post(reminders::checkout_reminder))
        .with_state(state)
}
