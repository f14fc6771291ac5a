//! Default roles and permissions.
//!
//! Seeding is idempotent: existing rows are left untouched, missing ones are
//! inserted, so it is safe to run on every startup.

use sea_orm::sea_query::OnConflict;
use sea_orm::*;

use crate::infrastructure::auth::hash_password;
use crate::models::{permission, role, role_permission, user, user_role};

pub const PERMISSIONS: &[(&str, &str)] = &[
    ("book:read", "Browse the catalog"),
    ("book:create", "Add books to the catalog"),
    ("book:update", "Edit catalog entries"),
    ("book:delete", "Remove catalog entries"),
    ("checkout:create", "Check out books"),
    ("checkout:read", "View every member's checkouts"),
    ("checkout:return", "Return checked out books"),
    ("checkout:manage", "Manage checkouts, overdue sweeps and fees"),
    ("user:read", "View members"),
    ("user:manage", "Edit members and verify accounts"),
    ("role:read", "View roles"),
    ("role:manage", "Create and assign roles"),
    ("permission:manage", "Create and delete permissions"),
];

/// Role name, description and granted actions (`*` = every permission)
pub const ROLES: &[(&str, &str, &[&str])] = &[
    (role::ADMIN, "Full access", &["*"]),
    (
        role::FINANCE_MANAGER,
        "Oversees checkouts and late fees",
        &[
            "book:read",
            "checkout:read",
            "checkout:return",
            "checkout:manage",
            "user:read",
        ],
    ),
    (
        role::EDITOR,
        "Maintains the catalog",
        &["book:read", "book:create", "book:update", "book:delete"],
    ),
    (
        role::CUSTOMER,
        "Library member",
        &["book:read", "checkout:create", "checkout:return"],
    ),
];

pub async fn seed_defaults(db: &DatabaseConnection) -> Result<(), DbErr> {
    let now = chrono::Utc::now().to_rfc3339();

    // 1. Permissions
    for (action, description) in PERMISSIONS {
        let model = permission::ActiveModel {
            action: Set(action.to_string()),
            description: Set(Some(description.to_string())),
            created_at: Set(now.clone()),
            ..Default::default()
        };
        permission::Entity::insert(model)
            .on_conflict(
                OnConflict::column(permission::Column::Action)
                    .do_nothing()
                    .to_owned(),
            )
            .exec_without_returning(db)
            .await?;
    }

    let all_permissions = permission::Entity::find().all(db).await?;

    // 2. Roles and their grants
    for (name, description, actions) in ROLES {
        let model = role::ActiveModel {
            name: Set(name.to_string()),
            description: Set(Some(description.to_string())),
            created_at: Set(now.clone()),
            updated_at: Set(now.clone()),
            ..Default::default()
        };
        role::Entity::insert(model)
            .on_conflict(OnConflict::column(role::Column::Name).do_nothing().to_owned())
            .exec_without_returning(db)
            .await?;

        let Some(role) = role::Entity::find()
            .filter(role::Column::Name.eq(*name))
            .one(db)
            .await?
        else {
            continue;
        };

        for p in all_permissions
            .iter()
            .filter(|p| actions.contains(&"*") || actions.contains(&p.action.as_str()))
        {
            role_permission::Entity::insert(role_permission::ActiveModel {
                role_id: Set(role.id),
                permission_id: Set(p.id),
            })
            .on_conflict(
                OnConflict::columns([
                    role_permission::Column::RoleId,
                    role_permission::Column::PermissionId,
                ])
                .do_nothing()
                .to_owned(),
            )
            .exec_without_returning(db)
            .await?;
        }
    }

    tracing::info!(
        "Seeded {} permissions and {} roles",
        PERMISSIONS.len(),
        ROLES.len()
    );
    Ok(())
}

/// Create a verified staff account holding the `Admin` role, unless the
/// email is already registered.
pub async fn seed_admin(db: &DatabaseConnection, email: &str, password: &str) -> Result<(), DbErr> {
    let email = email.trim().to_lowercase();
    if user::Entity::find()
        .filter(user::Column::Email.eq(&email))
        .one(db)
        .await?
        .is_some()
    {
        return Ok(());
    }

    let password_hash = hash_password(password).map_err(DbErr::Custom)?;
    let now = chrono::Utc::now();

    let admin = user::ActiveModel {
        email: Set(email.clone()),
        name: Set(Some("Administrator".to_owned())),
        password_hash: Set(password_hash),
        is_staff: Set(true),
        max_checkout_limit: Set(user::STAFF_CHECKOUT_LIMIT),
        email_verified: Set(Some(now)),
        created_at: Set(now.to_rfc3339()),
        updated_at: Set(now.to_rfc3339()),
        ..Default::default()
    }
    .insert(db)
    .await?;

    if let Some(admin_role) = role::Entity::find()
        .filter(role::Column::Name.eq(role::ADMIN))
        .one(db)
        .await?
    {
        user_role::ActiveModel {
            user_id: Set(admin.id),
            role_id: Set(admin_role.id),
        }
        .insert(db)
        .await?;
    }

    tracing::info!("Created bootstrap admin {}", email);
    Ok(())
}
