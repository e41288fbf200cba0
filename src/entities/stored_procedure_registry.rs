//! `SeaORM` Entity, Stored Procedure Registry
//!
//! One row per grid-backing procedure. A procedure without an active row here
//! cannot be reached through the API.

use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq)]
#[sea_orm(table_name = "stored_procedure_registry")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    #[sea_orm(unique)]
    pub procedure_name: String,
    pub display_name: String,
    pub category: Option<String>,
    pub description: Option<String>,
    /// Routing key into the configured grid databases; `None` means primary.
    pub database_name: Option<String>,
    pub is_active: bool,
    pub requires_auth: bool,
    /// JSON array of role names.
    #[sea_orm(column_type = "JsonBinary")]
    pub allowed_roles: Json,
    pub default_page_size: i32,
    pub max_page_size: i32,
    pub cache_duration_seconds: i32,
    pub created_at: DateTimeWithTimeZone,
    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    pub fn allowed_role_names(&self) -> Vec<String> {
        self.allowed_roles
            .as_array()
            .map(|roles| {
                roles
                    .iter()
                    .filter_map(|role| role.as_str().map(str::to_string))
                    .collect()
            })
            .unwrap_or_default()
    }
}
