//! SeaORM implementation of CheckoutRepository
//!
//! The two lifecycle writes (check out, return) touch both `checkouts` and
//! `books` and always run inside a single transaction.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, DatabaseConnection, DbErr, EntityTrait,
    PaginatorTrait, QueryFilter, QueryOrder, Set, SqlErr, TransactionTrait,
};

use crate::domain::{
    CheckoutFilter, CheckoutRepository, CheckoutWithDetails, DomainError, NewCheckout,
    OverdueStatus,
};
use crate::models::book::{self, Book, BookStatus, Entity as BookEntity};
use crate::models::checkout::{self, ActiveModel, Column, Entity as CheckoutEntity};
use crate::models::user::{self, Entity as UserEntity};
use crate::models::UserSummary;

/// SeaORM-based implementation of CheckoutRepository
pub struct SeaOrmCheckoutRepository {
    db: DatabaseConnection,
}

impl SeaOrmCheckoutRepository {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Join books and borrowers onto a page of checkouts
    async fn attach_details(
        &self,
        rows: Vec<(checkout::Model, Option<book::Model>)>,
    ) -> Result<Vec<CheckoutWithDetails>, DomainError> {
        let user_ids: Vec<i32> = rows.iter().map(|(c, _)| c.user_id).collect();

        let mut users: HashMap<i32, user::Model> = HashMap::new();
        if !user_ids.is_empty() {
            for u in UserEntity::find()
                .filter(user::Column::Id.is_in(user_ids))
                .all(&self.db)
                .await?
            {
                users.insert(u.id, u);
            }
        }

        let mut result = Vec::with_capacity(rows.len());
        for (checkout, book) in rows {
            let (Some(book), Some(user)) = (book, users.get(&checkout.user_id)) else {
                tracing::warn!(
                    "Checkout {} references a missing book or user, skipping",
                    checkout.id
                );
                continue;
            };
            let active = checkout.is_active();
            result.push(CheckoutWithDetails {
                book: Book::with_status(book, active),
                user: UserSummary::from(user),
                checkout,
            });
        }

        Ok(result)
    }
}

fn is_unique_violation(err: &DbErr) -> bool {
    matches!(err.sql_err(), Some(SqlErr::UniqueConstraintViolation(_)))
}

#[async_trait]
impl CheckoutRepository for SeaOrmCheckoutRepository {
    async fn find_by_id(&self, id: i32) -> Result<Option<checkout::Model>, DomainError> {
        Ok(CheckoutEntity::find_by_id(id).one(&self.db).await?)
    }

    async fn find_with_details(&self, id: i32) -> Result<Option<CheckoutWithDetails>, DomainError> {
        let rows: Vec<_> = CheckoutEntity::find_by_id(id)
            .find_also_related(BookEntity)
            .one(&self.db)
            .await?
            .into_iter()
            .collect();

        Ok(self.attach_details(rows).await?.into_iter().next())
    }

    async fn find_all(&self, filter: CheckoutFilter) -> Result<Vec<CheckoutWithDetails>, DomainError> {
        let mut condition = Condition::all();

        if let Some(user_id) = filter.user_id {
            condition = condition.add(Column::UserId.eq(user_id));
        }

        if filter.active_only || filter.overdue_only {
            condition = condition.add(Column::ReturnedDate.is_null());
        }

        if filter.overdue_only {
            condition = condition.add(Column::IsOverdue.eq(true));
        }

        let rows = CheckoutEntity::find()
            .filter(condition)
            .order_by_desc(Column::CheckoutDate)
            .find_also_related(BookEntity)
            .all(&self.db)
            .await?;

        self.attach_details(rows).await
    }

    async fn find_active(&self) -> Result<Vec<checkout::Model>, DomainError> {
        Ok(CheckoutEntity::find()
            .filter(Column::ReturnedDate.is_null())
            .order_by_asc(Column::DueDate)
            .all(&self.db)
            .await?)
    }

    async fn count_active_for_user(&self, user_id: i32) -> Result<u64, DomainError> {
        Ok(CheckoutEntity::find()
            .filter(Column::UserId.eq(user_id))
            .filter(Column::ReturnedDate.is_null())
            .count(&self.db)
            .await?)
    }

    async fn count_active_for_book(&self, book_id: i32) -> Result<u64, DomainError> {
        Ok(CheckoutEntity::find()
            .filter(Column::BookId.eq(book_id))
            .filter(Column::ReturnedDate.is_null())
            .count(&self.db)
            .await?)
    }

    async fn has_active_for_user_and_book(
        &self,
        user_id: i32,
        book_id: i32,
    ) -> Result<bool, DomainError> {
        let count = CheckoutEntity::find()
            .filter(Column::UserId.eq(user_id))
            .filter(Column::BookId.eq(book_id))
            .filter(Column::ReturnedDate.is_null())
            .count(&self.db)
            .await?;
        Ok(count > 0)
    }

    async fn create_and_check_out_book(
        &self,
        input: NewCheckout,
    ) -> Result<checkout::Model, DomainError> {
        let now = Utc::now().to_rfc3339();
        let txn = self.db.begin().await?;

        // 1. Flip the book only if it is still available
        let flipped = BookEntity::update_many()
            .col_expr(book::Column::Status, Expr::value(BookStatus::CheckedOut))
            .col_expr(book::Column::UpdatedAt, Expr::value(now.clone()))
            .filter(book::Column::Id.eq(input.book_id))
            .filter(book::Column::Status.eq(BookStatus::Available))
            .exec(&txn)
            .await?;

        if flipped.rows_affected == 0 {
            txn.rollback().await?;
            return Err(DomainError::BookAlreadyCheckedOut);
        }

        // 2. Insert the checkout row
        let new_checkout = ActiveModel {
            book_id: Set(input.book_id),
            user_id: Set(input.user_id),
            checkout_date: Set(input.checkout_date),
            due_date: Set(input.due_date),
            max_duration_days: Set(input.max_duration_days),
            late_fee_per_day: Set(input.late_fee_per_day),
            returned_date: Set(None),
            is_overdue: Set(false),
            overdue_days: Set(0),
            late_fee_amount: Set(None),
            reminder_message_id: Set(None),
            created_at: Set(now.clone()),
            updated_at: Set(now),
            ..Default::default()
        };

        let saved = match new_checkout.insert(&txn).await {
            Ok(saved) => saved,
            Err(e) if is_unique_violation(&e) => {
                txn.rollback().await?;
                return Err(DomainError::BookAlreadyCheckedOut);
            }
            Err(e) => return Err(e.into()),
        };

        txn.commit().await?;
        Ok(saved)
    }

    async fn complete_return(
        &self,
        id: i32,
        returned_at: DateTime<Utc>,
        status: OverdueStatus,
    ) -> Result<checkout::Model, DomainError> {
        let now = Utc::now().to_rfc3339();
        let txn = self.db.begin().await?;

        // 1. Close the checkout, guarded so a row is only ever returned once
        let closed = CheckoutEntity::update_many()
            .col_expr(Column::ReturnedDate, Expr::value(Some(returned_at)))
            .col_expr(Column::IsOverdue, Expr::value(status.is_overdue))
            .col_expr(Column::OverdueDays, Expr::value(status.overdue_days))
            .col_expr(Column::LateFeeAmount, Expr::value(status.stored_fee()))
            .col_expr(Column::UpdatedAt, Expr::value(now.clone()))
            .filter(Column::Id.eq(id))
            .filter(Column::ReturnedDate.is_null())
            .exec(&txn)
            .await?;

        let checkout = CheckoutEntity::find_by_id(id)
            .one(&txn)
            .await?
            .ok_or(DomainError::CheckoutNotFound)?;

        if closed.rows_affected == 0 {
            txn.rollback().await?;
            return Err(DomainError::CheckoutAlreadyReturned);
        }

        // 2. Put the book back on the shelf
        BookEntity::update_many()
            .col_expr(book::Column::Status, Expr::value(BookStatus::Available))
            .col_expr(book::Column::UpdatedAt, Expr::value(now))
            .filter(book::Column::Id.eq(checkout.book_id))
            .exec(&txn)
            .await?;

        txn.commit().await?;
        Ok(checkout)
    }

    async fn update_overdue_status(
        &self,
        id: i32,
        status: OverdueStatus,
    ) -> Result<checkout::Model, DomainError> {
        CheckoutEntity::update_many()
            .col_expr(Column::IsOverdue, Expr::value(status.is_overdue))
            .col_expr(Column::OverdueDays, Expr::value(status.overdue_days))
            .col_expr(Column::LateFeeAmount, Expr::value(status.stored_fee()))
            .col_expr(Column::UpdatedAt, Expr::value(Utc::now().to_rfc3339()))
            .filter(Column::Id.eq(id))
            .filter(Column::ReturnedDate.is_null())
            .exec(&self.db)
            .await?;

        CheckoutEntity::find_by_id(id)
            .one(&self.db)
            .await?
            .ok_or(DomainError::CheckoutNotFound)
    }

    async fn set_reminder_message_id(
        &self,
        id: i32,
        message_id: Option<String>,
    ) -> Result<bool, DomainError> {
        let saved = CheckoutEntity::update_many()
            .col_expr(Column::ReminderMessageId, Expr::value(message_id))
            .col_expr(Column::UpdatedAt, Expr::value(Utc::now().to_rfc3339()))
            .filter(Column::Id.eq(id))
            .filter(Column::ReturnedDate.is_null())
            .exec(&self.db)
            .await?;

        if saved.rows_affected > 0 {
            return Ok(true);
        }

        CheckoutEntity::find_by_id(id)
            .one(&self.db)
            .await?
            .ok_or(DomainError::CheckoutNotFound)?;
        Ok(false)
    }
}
