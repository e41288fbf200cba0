//! Stored procedure registry: lookups, access policy and registration.

use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DbErr, EntityTrait, QueryFilter, QueryOrder, Set,
};
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, info};
use uuid::Uuid;

use crate::auth::AuthenticatedUser;
use crate::entities::{prelude::*, stored_procedure_registry};
use crate::error::{AppError, AppResult};
use crate::grid::types::AvailableProcedure;

pub const DEFAULT_PAGE_SIZE: i32 = 50;
pub const MAX_PAGE_SIZE: i32 = 1_000;

/// Decides whether `user` may call the procedure described by `entry`.
///
/// A missing or inactive entry is never reachable. `requires_auth = false`
/// admits anonymous callers; otherwise an empty role list admits any
/// authenticated caller and a non-empty one needs a matching role name.
pub fn check_access<'a>(
    procedure_name: &str,
    entry: Option<&'a stored_procedure_registry::Model>,
    user: Option<&AuthenticatedUser>,
) -> AppResult<&'a stored_procedure_registry::Model> {
    let entry = entry
        .filter(|entry| entry.is_active)
        .ok_or_else(|| AppError::Forbidden(format!("Procedure '{}' is not available", procedure_name)))?;

    if !entry.requires_auth {
        return Ok(entry);
    }
    let user = user.ok_or(AppError::Unauthenticated)?;

    let allowed = entry.allowed_role_names();
    if allowed.is_empty() || allowed.iter().any(|role| user.has_role(role)) {
        Ok(entry)
    } else {
        Err(AppError::Forbidden(format!(
            "Access denied to procedure '{}'",
            procedure_name
        )))
    }
}

pub async fn find_entry<C: ConnectionTrait>(
    db: &C,
    procedure_name: &str,
) -> Result<Option<stored_procedure_registry::Model>, DbErr> {
    StoredProcedureRegistry::find()
        .filter(stored_procedure_registry::Column::ProcedureName.eq(procedure_name))
        .one(db)
        .await
}

/// Loads the registry row and applies [`check_access`].
pub async fn authorize<C: ConnectionTrait>(
    db: &C,
    procedure_name: &str,
    user: Option<&AuthenticatedUser>,
) -> AppResult<stored_procedure_registry::Model> {
    let entry = find_entry(db, procedure_name).await?;
    let entry = check_access(procedure_name, entry.as_ref(), user)
        .inspect_err(|e| debug!("Rejected call to {}: {}", procedure_name, e))?;
    Ok(entry.clone())
}

pub async fn available_procedures<C: ConnectionTrait>(
    db: &C,
    user: Option<&AuthenticatedUser>,
) -> AppResult<Vec<AvailableProcedure>> {
    let entries = StoredProcedureRegistry::find()
        .filter(stored_procedure_registry::Column::IsActive.eq(true))
        .order_by_asc(stored_procedure_registry::Column::Category)
        .order_by_asc(stored_procedure_registry::Column::DisplayName)
        .all(db)
        .await?;

    Ok(entries
        .iter()
        .filter(|entry| check_access(&entry.procedure_name, Some(entry), user).is_ok())
        .map(|entry| AvailableProcedure {
            procedure_name: entry.procedure_name.clone(),
            display_name: entry.display_name.clone(),
            category: entry.category.clone(),
            description: entry.description.clone(),
            default_page_size: entry.default_page_size,
            max_page_size: entry.max_page_size,
        })
        .collect())
}

/// Registry fields supplied when scaffolding a grid.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Registration {
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub database_name: Option<String>,
    #[serde(default)]
    pub allowed_roles: Vec<String>,
    #[serde(default = "default_true")]
    pub requires_auth: bool,
    #[serde(default)]
    pub default_page_size: Option<i32>,
    #[serde(default)]
    pub max_page_size: Option<i32>,
    #[serde(default)]
    pub cache_duration_seconds: i32,
}

fn default_true() -> bool {
    true
}

impl Default for Registration {
    fn default() -> Self {
        Self {
            display_name: None,
            category: None,
            description: None,
            database_name: None,
            allowed_roles: Vec::new(),
            requires_auth: true,
            default_page_size: None,
            max_page_size: None,
            cache_duration_seconds: 0,
        }
    }
}

/// Inserts or refreshes the registry row for `procedure_name`, reactivating it.
pub async fn upsert_registry_entry<C: ConnectionTrait>(
    db: &C,
    procedure_name: &str,
    fallback_display_name: &str,
    registration: &Registration,
) -> Result<stored_procedure_registry::Model, DbErr> {
    let now = Utc::now();
    let display_name = registration
        .display_name
        .clone()
        .unwrap_or_else(|| fallback_display_name.to_string());
    let allowed_roles = Value::from(registration.allowed_roles.clone());
    let default_page_size = registration.default_page_size.unwrap_or(DEFAULT_PAGE_SIZE).max(1);
    let max_page_size = registration
        .max_page_size
        .unwrap_or(MAX_PAGE_SIZE)
        .max(default_page_size);

    let entry = match find_entry(db, procedure_name).await? {
        Some(existing) => {
            let mut active: stored_procedure_registry::ActiveModel = existing.into();
            active.display_name = Set(display_name);
            active.category = Set(registration.category.clone());
            active.description = Set(registration.description.clone());
            active.database_name = Set(registration.database_name.clone());
            active.is_active = Set(true);
            active.requires_auth = Set(registration.requires_auth);
            active.allowed_roles = Set(allowed_roles);
            active.default_page_size = Set(default_page_size);
            active.max_page_size = Set(max_page_size);
            active.cache_duration_seconds = Set(registration.cache_duration_seconds);
            active.updated_at = Set(now.into());
            active.update(db).await?
        }
        None => {
            stored_procedure_registry::ActiveModel {
                id: Set(Uuid::new_v4()),
                procedure_name: Set(procedure_name.to_string()),
                display_name: Set(display_name),
                category: Set(registration.category.clone()),
                description: Set(registration.description.clone()),
                database_name: Set(registration.database_name.clone()),
                is_active: Set(true),
                requires_auth: Set(registration.requires_auth),
                allowed_roles: Set(allowed_roles),
                default_page_size: Set(default_page_size),
                max_page_size: Set(max_page_size),
                cache_duration_seconds: Set(registration.cache_duration_seconds),
                created_at: Set(now.into()),
                updated_at: Set(now.into()),
            }
            .insert(db)
            .await?
        }
    };

    info!("Registered grid procedure {}", entry.procedure_name);
    Ok(entry)
}
