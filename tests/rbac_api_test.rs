mod common;

use axum::{
    body::{to_bytes, Body},
    http::{header, Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use shelfdesk::api;
use shelfdesk::infrastructure::AppState;
use shelfdesk::models::role;
use tower::util::ServiceExt; // for `oneshot`

use common::*;

fn app(state: AppState) -> Router {
    Router::new().nest("/api", api::api_router(state))
}

fn request(method: &str, uri: &str, token: Option<&str>, body: Option<Value>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(serde_json::to_vec(&body).unwrap()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

async fn send(app: &Router, req: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(req).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, body)
}

#[tokio::test]
async fn test_book_reads_are_public_writes_are_gated() {
    let state = setup_test_state().await;
    let customer = create_customer(&state, "customer@example.com").await;
    let editor = create_test_user(&state, "editor@example.com", role::EDITOR, true, false, None).await;
    let customer_token = token_for(&state, customer.id).await;
    let editor_token = token_for(&state, editor.id).await;
    let app = app(state);

    let (status, body) = send(&app, request("GET", "/api/books", None, None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 0);

    let new_book = json!({ "title": "Dune", "author": "Frank Herbert" });

    let (status, body) = send(&app, request("POST", "/api/books", None, Some(new_book.clone()))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"]["code"], "UNAUTHORIZED");

    let (status, body) = send(
        &app,
        request("POST", "/api/books", Some(&customer_token), Some(new_book.clone())),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"]["code"], "MISSING_PERMISSIONS");
    assert_eq!(body["error"]["details"]["required"], json!(["book:create"]));
    assert_eq!(body["error"]["details"]["mode"], "any");

    let (status, body) = send(
        &app,
        request("POST", "/api/books", Some(&editor_token), Some(new_book)),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["book"]["status"], "AVAILABLE");

    let id = body["book"]["id"].as_i64().unwrap();
    let (status, body) = send(&app, request("GET", &format!("/api/books/{}", id), None, None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["title"], "Dune");
}

#[tokio::test]
async fn test_garbled_token_is_invalid_session() {
    let state = setup_test_state().await;
    let app = app(state);

    let (status, body) = send(&app, request("GET", "/api/auth/me", Some("not-a-jwt"), None)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"]["code"], "INVALID_SESSION");

    let (status, body) = send(&app, request("GET", "/api/auth/me", None, None)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"]["code"], "UNAUTHORIZED");
}

#[tokio::test]
async fn test_register_assigns_customer_role() {
    let state = setup_test_state().await;
    let app = app(state);

    let (status, body) = send(
        &app,
        request(
            "POST",
            "/api/auth/register",
            None,
            Some(json!({ "email": "New.Member@Example.com", "password": "longenough", "name": "New" })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["user"]["email"], "new.member@example.com");
    assert_eq!(body["user"]["roles"], json!([role::CUSTOMER]));
    assert_eq!(body["user"]["isStaff"], false);
    assert!(body["user"]["emailVerified"].is_null());
    let permissions = body["user"]["permissions"].as_array().unwrap();
    assert!(permissions.contains(&json!("checkout:create")));

    let (status, body) = send(
        &app,
        request(
            "POST",
            "/api/auth/login",
            None,
            Some(json!({ "email": "new.member@example.com", "password": "wrong-password" })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"]["code"], "INVALID_CREDENTIALS");

    let (status, body) = send(
        &app,
        request(
            "POST",
            "/api/auth/login",
            None,
            Some(json!({ "email": "new.member@example.com", "password": "longenough" })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let token = body["token"].as_str().unwrap().to_string();

    let (status, body) = send(&app, request("GET", "/api/auth/me", Some(&token), None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["email"], "new.member@example.com");
}

#[tokio::test]
async fn test_checkout_flow_over_http() {
    let state = setup_test_state().await;
    let reader = create_customer(&state, "reader@example.com").await;
    let other = create_customer(&state, "other@example.com").await;
    let book = create_test_book(&state, "Neuromancer").await;
    let reader_token = token_for(&state, reader.id).await;
    let other_token = token_for(&state, other.id).await;
    let app = app(state);

    let (status, body) = send(
        &app,
        request("POST", "/api/checkouts/validate", Some(&reader_token), Some(json!({ "bookId": book }))),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["valid"], true);
    assert_eq!(body["maxCheckouts"], 5);

    let (status, body) = send(
        &app,
        request("POST", "/api/checkouts", Some(&reader_token), Some(json!({ "bookId": book }))),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["maxDurationDays"], 14);
    assert_eq!(body["book"]["status"], "CHECKED_OUT");
    let checkout_id = body["id"].as_i64().unwrap();

    // Someone else can no longer take it
    let (status, body) = send(
        &app,
        request("POST", "/api/checkouts/validate", Some(&other_token), Some(json!({ "bookId": book }))),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["valid"], false);
    assert_eq!(body["code"], "BOOK_ALREADY_CHECKED_OUT");

    let (status, body) = send(
        &app,
        request("POST", "/api/checkouts", Some(&other_token), Some(json!({ "bookId": book }))),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["message"], "This book is already checked out");

    // Borrowing on someone's behalf needs checkout:manage
    let (status, _) = send(
        &app,
        request(
            "POST",
            "/api/checkouts",
            Some(&other_token),
            Some(json!({ "bookId": book, "userId": reader.id })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    // Members only see their own checkouts
    let (_, body) = send(&app, request("GET", "/api/checkouts", Some(&other_token), None)).await;
    assert_eq!(body["total"], 0);
    let (status, _) = send(
        &app,
        request("GET", &format!("/api/checkouts/{}", checkout_id), Some(&other_token), None),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = send(
        &app,
        request("PUT", &format!("/api/checkouts/{}/return", checkout_id), Some(&other_token), None),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = send(
        &app,
        request("PUT", &format!("/api/checkouts/{}/return", checkout_id), Some(&reader_token), None),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["returnedDate"].is_string());
    assert_eq!(body["book"]["status"], "AVAILABLE");

    let (status, body) = send(
        &app,
        request("PUT", &format!("/api/checkouts/{}/return", checkout_id), Some(&reader_token), None),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "CHECKOUT_ALREADY_RETURNED");
}

#[tokio::test]
async fn test_return_accepts_any_of_return_or_manage() {
    let state = setup_test_state().await;
    let reader = create_customer(&state, "reader@example.com").await;
    let finance =
        create_test_user(&state, "finance@example.com", role::FINANCE_MANAGER, true, true, None).await;
    let editor = create_test_user(&state, "editor@example.com", role::EDITOR, true, false, None).await;
    let book = create_test_book(&state, "Borrowed").await;

    let checkout = state
        .checkouts
        .create_checkout(shelfdesk::services::CreateCheckoutInput {
            book_id: book,
            user_id: reader.id,
            max_duration_days: None,
            late_fee_per_day: None,
        })
        .await
        .unwrap();

    let finance_token = token_for(&state, finance.id).await;
    let editor_token = token_for(&state, editor.id).await;
    let app = app(state);
    let uri = format!("/api/checkouts/{}/return", checkout.checkout.id);

    let (status, body) = send(&app, request("PUT", &uri, Some(&editor_token), None)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"]["details"]["mode"], "any");

    let (status, _) = send(&app, request("PUT", &uri, Some(&finance_token), None)).await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = send(
        &app,
        request("POST", "/api/checkouts/overdue-sweep", Some(&finance_token), None),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["updated"], 0);
}

#[tokio::test]
async fn test_role_creation_requires_all_permissions() {
    let state = setup_test_state().await;
    let finance =
        create_test_user(&state, "finance@example.com", role::FINANCE_MANAGER, true, true, None).await;
    let admin = create_test_user(&state, "admin@example.com", role::ADMIN, true, true, None).await;

    // Holds role:read only
    let reader_role = state
        .role_repo
        .create_role("Auditor".into(), None, vec!["role:read".into()])
        .await
        .unwrap();
    state.role_repo.assign_role(finance.id, reader_role.role.id).await.unwrap();

    let finance_token = token_for(&state, finance.id).await;
    let admin_token = token_for(&state, admin.id).await;
    let app = app(state);

    let (status, body) = send(&app, request("GET", "/api/roles", Some(&finance_token), None)).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["roles"].as_array().unwrap().len() >= 5);

    let new_role = json!({ "name": "Volunteer", "permissions": ["book:read", "checkout:return"] });
    let (status, body) = send(
        &app,
        request("POST", "/api/roles", Some(&finance_token), Some(new_role.clone())),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"]["details"]["mode"], "all");

    let (status, body) = send(
        &app,
        request("POST", "/api/roles", Some(&admin_token), Some(new_role)),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["name"], "Volunteer");
    assert_eq!(body["permissions"].as_array().unwrap().len(), 2);

    let (status, body) = send(
        &app,
        request(
            "POST",
            "/api/roles",
            Some(&admin_token),
            Some(json!({ "name": "Broken", "permissions": ["book:fly"] })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn test_referenced_permission_cannot_be_deleted() {
    let state = setup_test_state().await;
    let admin = create_test_user(&state, "admin@example.com", role::ADMIN, true, true, None).await;
    let admin_token = token_for(&state, admin.id).await;
    let app = app(state);

    let (status, body) = send(
        &app,
        request("DELETE", "/api/permissions/book:read", Some(&admin_token), None),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert!(body["error"]["message"].as_str().unwrap().contains("Customer"));

    let (status, _) = send(
        &app,
        request(
            "POST",
            "/api/permissions",
            Some(&admin_token),
            Some(json!({ "action": "report:export" })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, _) = send(
        &app,
        request("DELETE", "/api/permissions/report:export", Some(&admin_token), None),
    )
    .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = send(
        &app,
        request("DELETE", "/api/permissions/report:export", Some(&admin_token), None),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_staff_verifies_member_email() {
    let state = setup_test_state().await;
    let admin = create_test_user(&state, "admin@example.com", role::ADMIN, true, true, None).await;
    let member = create_test_user(&state, "member@example.com", role::CUSTOMER, false, false, None).await;
    let book = create_test_book(&state, "Gated").await;
    let admin_token = token_for(&state, admin.id).await;
    let member_token = token_for(&state, member.id).await;
    let app = app(state);

    let (_, body) = send(
        &app,
        request("POST", "/api/checkouts/validate", Some(&member_token), Some(json!({ "bookId": book }))),
    )
    .await;
    assert_eq!(body["valid"], false);
    assert_eq!(body["code"], "EMAIL_NOT_VERIFIED");

    let uri = format!("/api/users/{}/verify-email", member.id);
    let (status, _) = send(&app, request("POST", &uri, Some(&member_token), None)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = send(&app, request("POST", &uri, Some(&admin_token), None)).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["email_verified"].is_string());
    assert!(body.get("password_hash").is_none());

    let (_, body) = send(
        &app,
        request("POST", "/api/checkouts/validate", Some(&member_token), Some(json!({ "bookId": book }))),
    )
    .await;
    assert_eq!(body["valid"], true);
}
