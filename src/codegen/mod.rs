//! Grid procedure code generation.
//!
//! Introspects a table and emits the four `sp_Grid_*` PL/pgSQL functions a
//! grid needs. Generation is pure; [`Scaffolder`] runs the statements.

pub mod fetch;
pub mod mutation;
pub mod scaffold;
pub mod schema;
pub mod sql;

use sea_orm::DbErr;
use serde::Serialize;
use thiserror::Error;

use crate::grid::naming;

pub use fetch::generate_grid_fetch;
pub use mutation::{
    generate_crud_procedures, generate_delete_procedure, generate_insert_procedure,
    generate_update_procedure,
};
pub use scaffold::{ScaffoldReport, ScaffoldStep, Scaffolder};
pub use schema::{introspect_table, ColumnInfo, GridDefinition, ResolvedGrid, TableSchema};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, strum::Display, strum::AsRefStr)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ProcedureKind {
    Fetch,
    Insert,
    Update,
    Delete,
}

#[derive(Debug, Clone)]
pub struct GeneratedProcedure {
    pub kind: ProcedureKind,
    pub name: String,
    pub sql: String,
}

#[derive(Debug, Error)]
pub enum GenerateError {
    #[error("Table '{0}' not found")]
    TableNotFound(String),

    #[error("Column '{column}' does not exist on table '{table}'")]
    UnknownColumn { table: String, column: String },

    #[error("Table '{0}' has no primary key; supply primaryKeys explicitly")]
    NoPrimaryKey(String),

    #[error("Column name '{0}' is reserved for the synthetic row id")]
    ReservedColumn(String),

    #[error("Table '{table}' has no columns for a {kind} procedure")]
    NothingToWrite { table: String, kind: ProcedureKind },

    #[error("Database error: {0}")]
    Database(#[from] DbErr),
}

impl ProcedureKind {
    /// Scaffolding order.
    pub const ALL: [ProcedureKind; 4] = [
        ProcedureKind::Fetch,
        ProcedureKind::Insert,
        ProcedureKind::Update,
        ProcedureKind::Delete,
    ];

    pub fn procedure_name(&self, entity: &str) -> String {
        match self {
            ProcedureKind::Fetch => naming::fetch_name(entity),
            ProcedureKind::Insert => naming::insert_name(entity),
            ProcedureKind::Update => naming::update_name(entity),
            ProcedureKind::Delete => naming::delete_name(entity),
        }
    }
}

pub fn generate(grid: &ResolvedGrid, kind: ProcedureKind) -> Result<GeneratedProcedure, GenerateError> {
    let sql = match kind {
        ProcedureKind::Fetch => generate_grid_fetch(grid),
        ProcedureKind::Insert => generate_insert_procedure(grid)?,
        ProcedureKind::Update => generate_update_procedure(grid)?,
        ProcedureKind::Delete => generate_delete_procedure(grid),
    };
    Ok(GeneratedProcedure {
        kind,
        name: kind.procedure_name(&grid.entity),
        sql,
    })
}
