//! SeaORM implementation of UserRepository

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_orm::{ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set};

use crate::domain::{DomainError, NewUser, UserRepository};
use crate::models::user::{
    self, ActiveModel, Column, Entity as UserEntity, DEFAULT_CHECKOUT_LIMIT, STAFF_CHECKOUT_LIMIT,
};

/// SeaORM-based implementation of UserRepository
pub struct SeaOrmUserRepository {
    db: DatabaseConnection,
}

impl SeaOrmUserRepository {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

#[async_trait]
impl UserRepository for SeaOrmUserRepository {
    async fn find_by_id(&self, id: i32) -> Result<Option<user::Model>, DomainError> {
        Ok(UserEntity::find_by_id(id).one(&self.db).await?)
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<user::Model>, DomainError> {
        Ok(UserEntity::find()
            .filter(Column::Email.eq(email.trim().to_lowercase()))
            .one(&self.db)
            .await?)
    }

    async fn create(&self, input: NewUser) -> Result<user::Model, DomainError> {
        let limit = input.max_checkout_limit.unwrap_or(if input.is_staff {
            STAFF_CHECKOUT_LIMIT
        } else {
            DEFAULT_CHECKOUT_LIMIT
        });
        if limit <= 0 {
            return Err(DomainError::Validation(
                "Checkout limit must be a positive number".to_string(),
            ));
        }

        let email = input.email.trim().to_lowercase();
        if self.find_by_email(&email).await?.is_some() {
            return Err(DomainError::Conflict(
                "A user with this email already exists".to_string(),
            ));
        }

        let now = Utc::now().to_rfc3339();
        let new_user = ActiveModel {
            email: Set(email),
            name: Set(input.name),
            password_hash: Set(input.password_hash),
            is_staff: Set(input.is_staff),
            max_checkout_limit: Set(limit),
            email_verified: Set(None),
            created_at: Set(now.clone()),
            updated_at: Set(now),
            ..Default::default()
        };

        Ok(new_user.insert(&self.db).await?)
    }

    async fn mark_email_verified(
        &self,
        id: i32,
        at: DateTime<Utc>,
    ) -> Result<user::Model, DomainError> {
        let existing = UserEntity::find_by_id(id)
            .one(&self.db)
            .await?
            .ok_or(DomainError::UserNotFound)?;

        if existing.email_verified.is_some() {
            return Ok(existing);
        }

        let mut active: ActiveModel = existing.into();
        active.email_verified = Set(Some(at));
        active.updated_at = Set(Utc::now().to_rfc3339());

        Ok(active.update(&self.db).await?)
    }
}
