//! SeaORM implementation of BookRepository

use std::collections::HashSet;

use async_trait::async_trait;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, QuerySelect, Set,
};

use crate::domain::{BookRepository, DomainError};
use crate::models::book::{self, ActiveModel, Book, BookStatus, Entity as BookEntity};
use crate::models::checkout::{self, Entity as CheckoutEntity};

/// SeaORM-based implementation of BookRepository
pub struct SeaOrmBookRepository {
    db: DatabaseConnection,
}

impl SeaOrmBookRepository {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

#[async_trait]
impl BookRepository for SeaOrmBookRepository {
    async fn find_by_id(&self, id: i32) -> Result<Option<book::Model>, DomainError> {
        Ok(BookEntity::find_by_id(id).one(&self.db).await?)
    }

    async fn find_with_status(&self, id: i32) -> Result<Option<Book>, DomainError> {
        let Some(model) = BookEntity::find_by_id(id).one(&self.db).await? else {
            return Ok(None);
        };

        let active = CheckoutEntity::find()
            .filter(checkout::Column::BookId.eq(id))
            .filter(checkout::Column::ReturnedDate.is_null())
            .count(&self.db)
            .await?;

        Ok(Some(Book::with_status(model, active > 0)))
    }

    async fn find_all(&self) -> Result<Vec<Book>, DomainError> {
        let books = BookEntity::find()
            .order_by_asc(book::Column::Title)
            .all(&self.db)
            .await?;

        let checked_out: HashSet<i32> = CheckoutEntity::find()
            .select_only()
            .column(checkout::Column::BookId)
            .filter(checkout::Column::ReturnedDate.is_null())
            .into_tuple::<i32>()
            .all(&self.db)
            .await?
            .into_iter()
            .collect();

        Ok(books
            .into_iter()
            .map(|model| {
                let active = checked_out.contains(&model.id);
                Book::with_status(model, active)
            })
            .collect())
    }

    async fn create(&self, book: Book) -> Result<Book, DomainError> {
        if book.title.trim().is_empty() || book.author.trim().is_empty() {
            return Err(DomainError::Validation(
                "Title and author are required".to_string(),
            ));
        }

        let now = chrono::Utc::now().to_rfc3339();
        let new_book = ActiveModel {
            title: Set(book.title),
            author: Set(book.author),
            isbn: Set(book.isbn),
            description: Set(book.description),
            summary: Set(book.summary),
            publisher: Set(book.publisher),
            publication_year: Set(book.publication_year),
            genre: Set(book.genre),
            tags: Set(book
                .tags
                .map(|t| serde_json::to_string(&t).unwrap_or_default())),
            page_count: Set(book.page_count),
            language: Set(book.language),
            cover_image_url: Set(book.cover_image_url),
            status: Set(BookStatus::Available),
            created_at: Set(now.clone()),
            updated_at: Set(now),
            ..Default::default()
        };

        let model = new_book.insert(&self.db).await?;
        Ok(Book::with_status(model, false))
    }
}
