use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde_json::{json, Value};

use crate::api::error::ApiResult;
use crate::domain::DomainError;
use crate::infrastructure::AppState;
use crate::models::Book;

pub async fn list_books(State(state): State<AppState>) -> ApiResult<Json<Value>> {
    let books = state.book_repo.find_all().await?;

    Ok(Json(json!({
        "total": books.len(),
        "books": books,
    })))
}

pub async fn get_book(State(state): State<AppState>, Path(id): Path<i32>) -> ApiResult<Json<Book>> {
    let book = state
        .book_repo
        .find_with_status(id)
        .await?
        .ok_or(DomainError::BookNotFound)?;
    Ok(Json(book))
}

pub async fn create_book(
    State(state): State<AppState>,
    Json(book): Json<Book>,
) -> ApiResult<(StatusCode, Json<Value>)> {
    let created = state.book_repo.create(book).await?;
    tracing::info!("Book created: {:?} \"{}\"", created.id, created.title);

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "message": "Book created successfully",
            "book": created
        })),
    ))
}
