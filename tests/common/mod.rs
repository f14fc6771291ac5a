#![allow(dead_code)]

use sea_orm::DatabaseConnection;
use shelfdesk::auth;
use shelfdesk::db;
use shelfdesk::domain::{NewUser, RoleRepository, UserRepository};
use shelfdesk::infrastructure::AppState;
use shelfdesk::models::{role, user, Book};
use shelfdesk::seed;
use shelfdesk::services::build_session_user;

pub async fn setup_test_db() -> DatabaseConnection {
    let db = db::init_db("sqlite::memory:")
        .await
        .expect("Failed to init DB");
    seed::seed_defaults(&db).await.expect("Failed to seed roles");
    db
}

pub async fn setup_test_state() -> AppState {
    AppState::offline(setup_test_db().await)
}

/// Member holding `role_name`, with a verified email unless `verified` is false
pub async fn create_test_user(
    state: &AppState,
    email: &str,
    role_name: &str,
    verified: bool,
    is_staff: bool,
    max_checkout_limit: Option<i32>,
) -> user::Model {
    let created = state
        .user_repo
        .create(NewUser {
            email: email.to_string(),
            name: Some("Test User".to_string()),
            password_hash: auth::hash_password("password123").expect("hash"),
            is_staff,
            max_checkout_limit,
        })
        .await
        .expect("Failed to create user");

    state
        .role_repo
        .ensure_default_role(created.id, role_name)
        .await
        .expect("Failed to assign role");

    if verified {
        state
            .user_repo
            .mark_email_verified(created.id, chrono::Utc::now())
            .await
            .expect("Failed to verify email")
    } else {
        created
    }
}

pub async fn create_customer(state: &AppState, email: &str) -> user::Model {
    create_test_user(state, email, role::CUSTOMER, true, false, None).await
}

pub async fn create_test_book(state: &AppState, title: &str) -> i32 {
    state
        .book_repo
        .create(Book {
            title: title.to_string(),
            author: "Test Author".to_string(),
            ..Default::default()
        })
        .await
        .expect("Failed to create book")
        .id
        .expect("book id")
}

pub async fn token_for(state: &AppState, user_id: i32) -> String {
    let session_user = build_session_user(
        state.user_repo.as_ref() as &dyn UserRepository,
        state.role_repo.as_ref() as &dyn RoleRepository,
        user_id,
    )
    .await
    .expect("Failed to build session");
    auth::create_jwt(&session_user).expect("Failed to create token")
}
