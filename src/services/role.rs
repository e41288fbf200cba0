use std::sync::Arc;

use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, ModelTrait, QueryFilter, QueryOrder, Set,
};
use tracing::info;
use uuid::Uuid;

use crate::auth::ADMIN_ROLE;
use crate::entities::{prelude::*, role, user, user_role};
use crate::error::{AppError, AppResult};
use crate::services::user::role_names;

#[derive(Clone)]
pub struct RoleService {
    db: Arc<DatabaseConnection>,
}

impl RoleService {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    pub async fn list_roles(&self) -> AppResult<Vec<role::Model>> {
        Ok(Role::find().order_by_asc(role::Column::Name).all(self.db.as_ref()).await?)
    }

    pub async fn get_role(&self, role_id: Uuid) -> AppResult<role::Model> {
        Role::find_by_id(role_id)
            .one(self.db.as_ref())
            .await?
            .ok_or_else(|| AppError::NotFound("Role not found".to_string()))
    }

    async fn ensure_name_free(&self, name: &str, except: Option<Uuid>) -> AppResult<()> {
        let existing = Role::find()
            .filter(role::Column::Name.eq(name))
            .one(self.db.as_ref())
            .await?;
        match existing {
            Some(role) if Some(role.id) != except => Err(AppError::Conflict(format!(
                "Role '{}' already exists",
                name
            ))),
            _ => Ok(()),
        }
    }

    pub async fn create_role(&self, name: &str, description: Option<String>) -> AppResult<role::Model> {
        let name = name.trim();
        if name.is_empty() {
            return Err(AppError::BadRequest("Role name is required".to_string()));
        }
        self.ensure_name_free(name, None).await?;

        let now = Utc::now();
        let role = role::ActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set(name.to_string()),
            description: Set(description),
            is_active: Set(true),
            created_at: Set(now.into()),
            updated_at: Set(now.into()),
        }
        .insert(self.db.as_ref())
        .await?;

        info!("Created role {}", role.name);
        Ok(role)
    }

    pub async fn update_role(
        &self,
        role_id: Uuid,
        name: Option<String>,
        description: Option<String>,
        is_active: Option<bool>,
    ) -> AppResult<role::Model> {
        let existing = self.get_role(role_id).await?;
        let is_admin_role = existing.name.eq_ignore_ascii_case(ADMIN_ROLE);
        let mut active: role::ActiveModel = existing.into();

        if let Some(name) = name.map(|n| n.trim().to_string()) {
            if name.is_empty() {
                return Err(AppError::BadRequest("Role name is required".to_string()));
            }
            if is_admin_role && !name.eq_ignore_ascii_case(ADMIN_ROLE) {
                return Err(AppError::BadRequest("The Admin role cannot be renamed".to_string()));
            }
            self.ensure_name_free(&name, Some(role_id)).await?;
            active.name = Set(name);
        }
        if let Some(description) = description {
            active.description = Set(Some(description));
        }
        if let Some(is_active) = is_active {
            active.is_active = Set(is_active);
        }
        active.updated_at = Set(Utc::now().into());

        Ok(active.update(self.db.as_ref()).await?)
    }

    pub async fn delete_role(&self, role_id: Uuid) -> AppResult<()> {
        let role = self.get_role(role_id).await?;
        if role.name.eq_ignore_ascii_case(ADMIN_ROLE) {
            return Err(AppError::BadRequest("The Admin role cannot be deleted".to_string()));
        }
        info!("Deleting role {}", role.name);
        role.delete(self.db.as_ref()).await?;
        Ok(())
    }

    pub async fn list_users(&self) -> AppResult<Vec<user::Model>> {
        Ok(User::find().order_by_asc(user::Column::Email).all(self.db.as_ref()).await?)
    }

    pub async fn user_roles(&self, user_id: Uuid) -> AppResult<Vec<String>> {
        if User::find_by_id(user_id).one(self.db.as_ref()).await?.is_none() {
            return Err(AppError::NotFound("User not found".to_string()));
        }
        role_names(self.db.as_ref(), user_id).await
    }

    pub async fn assign_role(&self, user_id: Uuid, role_id: Uuid) -> AppResult<()> {
        if User::find_by_id(user_id).one(self.db.as_ref()).await?.is_none() {
            return Err(AppError::NotFound("User not found".to_string()));
        }
        self.get_role(role_id).await?;

        let existing = UserRole::find()
            .filter(user_role::Column::UserId.eq(user_id))
            .filter(user_role::Column::RoleId.eq(role_id))
            .one(self.db.as_ref())
            .await?;
        if existing.is_some() {
            return Err(AppError::Conflict("User already has this role".to_string()));
        }

        user_role::ActiveModel {
            id: Set(Uuid::new_v4()),
            user_id: Set(user_id),
            role_id: Set(role_id),
            created_at: Set(Utc::now().into()),
        }
        .insert(self.db.as_ref())
        .await?;
        Ok(())
    }

    pub async fn remove_role(&self, user_id: Uuid, role_id: Uuid) -> AppResult<()> {
        let result = UserRole::delete_many()
            .filter(user_role::Column::UserId.eq(user_id))
            .filter(user_role::Column::RoleId.eq(role_id))
            .exec(self.db.as_ref())
            .await?;
        if result.rows_affected == 0 {
            return Err(AppError::NotFound("User does not have this role".to_string()));
        }
        Ok(())
    }
}
