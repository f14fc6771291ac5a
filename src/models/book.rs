use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(None)")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BookStatus {
    #[sea_orm(string_value = "AVAILABLE")]
    Available,
    #[sea_orm(string_value = "CHECKED_OUT")]
    CheckedOut,
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "books")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub title: String,
    pub author: String,
    pub isbn: Option<String>,
    pub description: Option<String>,
    pub summary: Option<String>,
    pub publisher: Option<String>,
    pub publication_year: Option<i32>,
    pub genre: Option<String>,
    pub tags: Option<String>, // JSON array
    pub page_count: Option<i32>,
    pub language: Option<String>,
    pub cover_image_url: Option<String>,
    /// Last status written by the checkout engine. Reads derive the real
    /// status from the active checkout rows instead.
    pub status: BookStatus,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::checkout::Entity")]
    Checkouts,
}

impl Related<super::checkout::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Checkouts.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

// DTO for API responses
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Book {
    pub id: Option<i32>,
    pub title: String,
    pub author: String,
    pub isbn: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    pub publisher: Option<String>,
    pub publication_year: Option<i32>,
    pub genre: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
    pub page_count: Option<i32>,
    pub language: Option<String>,
    pub cover_image_url: Option<String>,
    #[serde(default)]
    pub status: Option<BookStatus>,
}

impl Book {
    /// Build the DTO with a status derived from live checkout data
    pub fn with_status(model: Model, has_active_checkout: bool) -> Self {
        let mut book = Book::from(model);
        book.status = Some(if has_active_checkout {
            BookStatus::CheckedOut
        } else {
            BookStatus::Available
        });
        book
    }
}

impl From<Model> for Book {
    fn from(model: Model) -> Self {
        let tags: Option<Vec<String>> = model
            .tags
            .map(|s| serde_json::from_str(&s).unwrap_or_default());

        Self {
            id: Some(model.id),
            title: model.title,
            author: model.author,
            isbn: model.isbn,
            description: model.description,
            summary: model.summary,
            publisher: model.publisher,
            publication_year: model.publication_year,
            genre: model.genre,
            tags,
            page_count: model.page_count,
            language: model.language,
            cover_image_url: model.cover_image_url,
            status: Some(model.status),
        }
    }
}
