use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use shelfdesk::infrastructure::tasks::{self, RetryPolicy};
use shelfdesk::infrastructure::{mailer, reminder_scheduler, AppState, SeaOrmCheckoutRepository};
use shelfdesk::{auth, config, db, seed, server};
use std::sync::Arc;

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "shelfdesk=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    // Load configuration
    dotenvy::dotenv().ok();
    let config = config::Config::from_env();

    if let Err(e) = auth::jwt_secret() {
        tracing::error!("{}", e);
        std::process::exit(1);
    }

    // Initialize database
    let db = db::init_db(&config.database_url)
        .await
        .expect("Failed to initialize database");

    if config.seed_defaults {
        if let Err(e) = seed::seed_defaults(&db).await {
            tracing::error!("Failed to seed roles and permissions: {}", e);
        }
    }

    if let (Some(email), Some(password)) = (&config.admin_email, &config.admin_password) {
        if let Err(e) = seed::seed_admin(&db, email, password).await {
            tracing::error!("Failed to create bootstrap admin: {}", e);
        }
    }

    // Outbound adapters, real or disabled depending on configuration
    let scheduler = reminder_scheduler::from_config(&config.reminders);
    let notifier = mailer::from_config(&config.mail);

    let (reminders, worker) = tasks::start(
        scheduler,
        Arc::new(SeaOrmCheckoutRepository::new(db.clone())),
        config.reminders.timezone(),
        RetryPolicy::default(),
    );

    let state = AppState::new(
        db,
        reminders,
        notifier,
        config.reminders.callback_secret.clone(),
    );
    let app = server::build_router(state, &config.cors_allowed_origins);

    if let Err(e) = server::serve(app, config.port, shutdown_signal()).await {
        tracing::error!("{}", e);
    }

    worker.shutdown().await;
}
