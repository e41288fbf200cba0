//! `SeaORM` Entity, per-column grid behaviour

use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq)]
#[sea_orm(table_name = "column_metadata")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub procedure_name: String,
    pub column_name: String,
    pub display_name: Option<String>,
    pub cell_editor: Option<String>,
    pub is_editable: Option<bool>,
    pub is_hidden: Option<bool>,
    pub sort_order: i32,
    /// `static` or `dynamic`
    pub dropdown_source: Option<String>,
    #[sea_orm(column_type = "JsonBinary", nullable)]
    pub static_options: Option<Json>,
    pub master_table: Option<String>,
    pub value_column: Option<String>,
    pub label_column: Option<String>,
    /// Grid column whose value feeds a cascading dropdown.
    pub depends_on: Option<String>,
    /// Master-table column filtered by the `depends_on` value.
    pub depends_on_column: Option<String>,
    pub link_target_procedure: Option<String>,
    /// Object of parent column -> target filter field.
    #[sea_orm(column_type = "JsonBinary", nullable)]
    pub link_filter_mapping: Option<Json>,
    pub breadcrumb_template: Option<String>,
    pub max_drill_depth: Option<i32>,
    pub stateless_drill: bool,
    pub created_at: DateTimeWithTimeZone,
    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
