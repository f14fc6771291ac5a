//! SeaORM implementation of RoleRepository

use std::collections::HashMap;

use async_trait::async_trait;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, ModelTrait, PaginatorTrait,
    QueryFilter, QueryOrder, Set, TransactionTrait,
};

use crate::domain::{DomainError, RoleRepository, RoleWithPermissions};
use crate::models::permission::{self, Entity as PermissionEntity};
use crate::models::role::{self, Entity as RoleEntity};
use crate::models::role_permission::{self, Entity as RolePermissionEntity};
use crate::models::user_role::{self, Entity as UserRoleEntity};

/// SeaORM-based implementation of RoleRepository
pub struct SeaOrmRoleRepository {
    db: DatabaseConnection,
}

impl SeaOrmRoleRepository {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    async fn role_ids_for_user(&self, user_id: i32) -> Result<Vec<i32>, DomainError> {
        Ok(UserRoleEntity::find()
            .filter(user_role::Column::UserId.eq(user_id))
            .all(&self.db)
            .await?
            .into_iter()
            .map(|ur| ur.role_id)
            .collect())
    }
}

#[async_trait]
impl RoleRepository for SeaOrmRoleRepository {
    async fn find_all(&self) -> Result<Vec<RoleWithPermissions>, DomainError> {
        let roles = RoleEntity::find()
            .order_by_asc(role::Column::Name)
            .find_with_related(PermissionEntity)
            .all(&self.db)
            .await?;

        Ok(roles
            .into_iter()
            .map(|(role, permissions)| RoleWithPermissions {
                role,
                permissions: permissions.into_iter().map(|p| p.action).collect(),
            })
            .collect())
    }

    async fn find_by_name(&self, name: &str) -> Result<Option<role::Model>, DomainError> {
        Ok(RoleEntity::find()
            .filter(role::Column::Name.eq(name))
            .one(&self.db)
            .await?)
    }

    async fn create_role(
        &self,
        name: String,
        description: Option<String>,
        actions: Vec<String>,
    ) -> Result<RoleWithPermissions, DomainError> {
        let name = name.trim().to_string();
        if name.is_empty() {
            return Err(DomainError::Validation("Role name is required".to_string()));
        }
        if self.find_by_name(&name).await?.is_some() {
            return Err(DomainError::Conflict(format!("Role '{}' already exists", name)));
        }

        let mut actions = actions;
        actions.sort();
        actions.dedup();

        let permissions = if actions.is_empty() {
            Vec::new()
        } else {
            PermissionEntity::find()
                .filter(permission::Column::Action.is_in(actions.clone()))
                .all(&self.db)
                .await?
        };

        if permissions.len() != actions.len() {
            let known: Vec<&str> = permissions.iter().map(|p| p.action.as_str()).collect();
            let unknown: Vec<&str> = actions
                .iter()
                .map(String::as_str)
                .filter(|a| !known.contains(a))
                .collect();
            return Err(DomainError::Validation(format!(
                "Unknown permissions: {}",
                unknown.join(", ")
            )));
        }

        let now = chrono::Utc::now().to_rfc3339();
        let txn = self.db.begin().await?;

        let role = role::ActiveModel {
            name: Set(name),
            description: Set(description),
            created_at: Set(now.clone()),
            updated_at: Set(now),
            ..Default::default()
        }
        .insert(&txn)
        .await?;

        for p in &permissions {
            role_permission::ActiveModel {
                role_id: Set(role.id),
                permission_id: Set(p.id),
            }
            .insert(&txn)
            .await?;
        }

        txn.commit().await?;

        Ok(RoleWithPermissions {
            role,
            permissions: permissions.into_iter().map(|p| p.action).collect(),
        })
    }

    async fn assign_role(&self, user_id: i32, role_id: i32) -> Result<(), DomainError> {
        RoleEntity::find_by_id(role_id)
            .one(&self.db)
            .await?
            .ok_or_else(|| DomainError::NotFound("Role".to_string()))?;

        let existing = UserRoleEntity::find_by_id((user_id, role_id))
            .one(&self.db)
            .await?;
        if existing.is_some() {
            return Ok(());
        }

        user_role::ActiveModel {
            user_id: Set(user_id),
            role_id: Set(role_id),
        }
        .insert(&self.db)
        .await?;

        Ok(())
    }

    async fn role_names_for_user(&self, user_id: i32) -> Result<Vec<String>, DomainError> {
        let role_ids = self.role_ids_for_user(user_id).await?;
        if role_ids.is_empty() {
            return Ok(Vec::new());
        }

        Ok(RoleEntity::find()
            .filter(role::Column::Id.is_in(role_ids))
            .order_by_asc(role::Column::Name)
            .all(&self.db)
            .await?
            .into_iter()
            .map(|r| r.name)
            .collect())
    }

    async fn permission_grants_for_user(&self, user_id: i32) -> Result<Vec<String>, DomainError> {
        let role_ids = self.role_ids_for_user(user_id).await?;
        if role_ids.is_empty() {
            return Ok(Vec::new());
        }

        let grants = RolePermissionEntity::find()
            .filter(role_permission::Column::RoleId.is_in(role_ids))
            .all(&self.db)
            .await?;

        let permission_ids: Vec<i32> = grants.iter().map(|g| g.permission_id).collect();
        let actions: HashMap<i32, String> = PermissionEntity::find()
            .filter(permission::Column::Id.is_in(permission_ids))
            .all(&self.db)
            .await?
            .into_iter()
            .map(|p| (p.id, p.action))
            .collect();

        Ok(grants
            .iter()
            .filter_map(|g| actions.get(&g.permission_id).cloned())
            .collect())
    }

    async fn ensure_default_role(&self, user_id: i32, role_name: &str) -> Result<bool, DomainError> {
        let held = UserRoleEntity::find()
            .filter(user_role::Column::UserId.eq(user_id))
            .count(&self.db)
            .await?;
        if held > 0 {
            return Ok(false);
        }

        let role = self
            .find_by_name(role_name)
            .await?
            .ok_or_else(|| DomainError::Internal(format!("Default role '{}' is missing", role_name)))?;

        self.assign_role(user_id, role.id).await?;
        tracing::info!("Assigned default role '{}' to user {}", role_name, user_id);
        Ok(true)
    }

    async fn create_permission(
        &self,
        action: String,
        description: Option<String>,
    ) -> Result<permission::Model, DomainError> {
        if !permission::is_valid_action(&action) {
            return Err(DomainError::Validation(format!(
                "Permission '{}' must look like resource:verb",
                action
            )));
        }

        let existing = PermissionEntity::find()
            .filter(permission::Column::Action.eq(&action))
            .one(&self.db)
            .await?;
        if existing.is_some() {
            return Err(DomainError::Conflict(format!(
                "Permission '{}' already exists",
                action
            )));
        }

        Ok(permission::ActiveModel {
            action: Set(action),
            description: Set(description),
            created_at: Set(chrono::Utc::now().to_rfc3339()),
            ..Default::default()
        }
        .insert(&self.db)
        .await?)
    }

    async fn delete_permission(&self, action: &str) -> Result<(), DomainError> {
        let permission = PermissionEntity::find()
            .filter(permission::Column::Action.eq(action))
            .one(&self.db)
            .await?
            .ok_or_else(|| DomainError::NotFound("Permission".to_string()))?;

        let referencing = permission
            .find_related(RoleEntity)
            .all(&self.db)
            .await?;

        if !referencing.is_empty() {
            let names: Vec<String> = referencing.into_iter().map(|r| r.name).collect();
            return Err(DomainError::Conflict(format!(
                "Permission '{}' is still used by roles: {}",
                action,
                names.join(", ")
            )));
        }

        permission.delete(&self.db).await?;
        Ok(())
    }
}
