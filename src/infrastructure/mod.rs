//! Infrastructure layer - Framework implementations
//!
//! This layer contains:
//! - Database connection and migrations (db)
//! - Configuration loading (config)
//! - Authentication (auth)
//! - Repository implementations (repositories)
//! - Outbound adapters for reminders and email (reminder_scheduler, mailer)
//! - The reminder background worker (tasks)
//! - HTTP server setup (server) and application state (state)

pub mod auth;
pub mod config;
pub mod db;
pub mod mailer;
pub mod reminder_scheduler;
pub mod repositories;
pub mod seed;
pub mod server;
pub mod state;
pub mod tasks;

pub use repositories::*;
pub use state::AppState;
