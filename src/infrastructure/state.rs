//! Application state containing repositories, the checkout engine and adapters

use sea_orm::DatabaseConnection;
use std::sync::Arc;

use crate::domain::{BookRepository, CheckoutRepository, Notifier, RoleRepository, UserRepository};
use crate::infrastructure::mailer::DisabledMailer;
use crate::infrastructure::tasks::ReminderQueue;
use crate::infrastructure::{
    SeaOrmBookRepository, SeaOrmCheckoutRepository, SeaOrmRoleRepository, SeaOrmUserRepository,
};
use crate::services::CheckoutService;

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    db: DatabaseConnection,
    pub user_repo: Arc<dyn UserRepository>,
    pub book_repo: Arc<dyn BookRepository>,
    pub checkout_repo: Arc<dyn CheckoutRepository>,
    pub role_repo: Arc<dyn RoleRepository>,
    /// Checkout engine
    pub checkouts: CheckoutService,
    pub notifier: Arc<dyn Notifier>,
    /// Shared secret expected on reminder callbacks
    pub reminder_secret: Option<String>,
}

impl AppState {
    /// Create a new AppState with all repositories initialized
    pub fn new(
        db: DatabaseConnection,
        reminders: ReminderQueue,
        notifier: Arc<dyn Notifier>,
        reminder_secret: Option<String>,
    ) -> Self {
        let user_repo: Arc<dyn UserRepository> = Arc::new(SeaOrmUserRepository::new(db.clone()));
        let book_repo: Arc<dyn BookRepository> = Arc::new(SeaOrmBookRepository::new(db.clone()));
        let checkout_repo: Arc<dyn CheckoutRepository> =
            Arc::new(SeaOrmCheckoutRepository::new(db.clone()));
        let role_repo: Arc<dyn RoleRepository> = Arc::new(SeaOrmRoleRepository::new(db.clone()));

        let checkouts = CheckoutService::new(
            user_repo.clone(),
            book_repo.clone(),
            checkout_repo.clone(),
            reminders,
        );

        Self {
            db,
            user_repo,
            book_repo,
            checkout_repo,
            role_repo,
            checkouts,
            notifier,
            reminder_secret,
        }
    }

    /// State with every outbound side effect disabled
    pub fn offline(db: DatabaseConnection) -> Self {
        Self::new(db, ReminderQueue::disabled(), Arc::new(DisabledMailer), None)
    }

    pub fn db(&self) -> &DatabaseConnection {
        &self.db
    }
}
