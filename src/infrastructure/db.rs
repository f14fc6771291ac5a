use sea_orm::{ConnectionTrait, Database, DatabaseConnection, DbErr, Statement};

pub async fn init_db(database_url: &str) -> Result<DatabaseConnection, DbErr> {
    let db = Database::connect(database_url).await?;

    // Run migrations manually (simple SQL)
    run_migrations(&db).await?;

    Ok(db)
}

const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS users (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        email TEXT NOT NULL UNIQUE,
        name TEXT,
        password_hash TEXT NOT NULL,
        is_staff BOOLEAN NOT NULL DEFAULT 0,
        max_checkout_limit INTEGER NOT NULL DEFAULT 5 CHECK (max_checkout_limit > 0),
        email_verified TEXT,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS books (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        title TEXT NOT NULL,
        author TEXT NOT NULL,
        isbn TEXT,
        description TEXT,
        summary TEXT,
        publisher TEXT,
        publication_year INTEGER,
        genre TEXT,
        tags TEXT,
        page_count INTEGER,
        language TEXT,
        cover_image_url TEXT,
        status TEXT NOT NULL DEFAULT 'AVAILABLE',
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS checkouts (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        book_id INTEGER NOT NULL,
        user_id INTEGER NOT NULL,
        checkout_date TEXT NOT NULL,
        due_date TEXT NOT NULL,
        max_duration_days INTEGER NOT NULL DEFAULT 14,
        late_fee_per_day REAL NOT NULL DEFAULT 0.5,
        returned_date TEXT,
        is_overdue BOOLEAN NOT NULL DEFAULT 0,
        overdue_days INTEGER NOT NULL DEFAULT 0,
        late_fee_amount REAL,
        reminder_message_id TEXT,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL,
        FOREIGN KEY (book_id) REFERENCES books(id) ON DELETE RESTRICT,
        FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE RESTRICT
    )
    "#,
    // At most one active checkout per book, enforced by storage
    r#"
    CREATE UNIQUE INDEX IF NOT EXISTS idx_checkouts_active_book
        ON checkouts(book_id) WHERE returned_date IS NULL
    "#,
    r#"
    CREATE INDEX IF NOT EXISTS idx_checkouts_user_active
        ON checkouts(user_id, returned_date)
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS roles (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL UNIQUE,
        description TEXT,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS permissions (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        action TEXT NOT NULL UNIQUE,
        description TEXT,
        created_at TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS role_permissions (
        role_id INTEGER NOT NULL,
        permission_id INTEGER NOT NULL,
        PRIMARY KEY (role_id, permission_id),
        FOREIGN KEY (role_id) REFERENCES roles(id) ON DELETE CASCADE,
        FOREIGN KEY (permission_id) REFERENCES permissions(id) ON DELETE RESTRICT
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS user_roles (
        user_id INTEGER NOT NULL,
        role_id INTEGER NOT NULL,
        PRIMARY KEY (user_id, role_id),
        FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE,
        FOREIGN KEY (role_id) REFERENCES roles(id) ON DELETE CASCADE
    )
    "#,
];

async fn run_migrations(db: &DatabaseConnection) -> Result<(), DbErr> {
    for sql in SCHEMA {
        db.execute(Statement::from_string(
            db.get_database_backend(),
            sql.to_string(),
        ))
        .await?;
    }

    tracing::debug!("Applied {} schema statements", SCHEMA.len());
    Ok(())
}
