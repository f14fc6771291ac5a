use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "checkouts")]
#[serde(rename_all = "camelCase")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub book_id: i32,
    pub user_id: i32,
    pub checkout_date: DateTimeUtc,
    pub due_date: DateTimeUtc,
    pub max_duration_days: i32,
    pub late_fee_per_day: f64,
    /// `None` while the checkout is active
    pub returned_date: Option<DateTimeUtc>,
    pub is_overdue: bool,
    pub overdue_days: i32,
    pub late_fee_amount: Option<f64>,
    /// Opaque handle of the scheduled due-date reminder
    pub reminder_message_id: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl Model {
    pub fn is_active(&self) -> bool {
        self.returned_date.is_none()
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::book::Entity",
        from = "Column::BookId",
        to = "super::book::Column::Id",
        on_update = "NoAction",
        on_delete = "Restrict"
    )]
    Book,
    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::UserId",
        to = "super::user::Column::Id",
        on_update = "NoAction",
        on_delete = "Restrict"
    )]
    User,
}

impl Related<super::book::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Book.def()
    }
}

impl Related<super::user::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::User.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
