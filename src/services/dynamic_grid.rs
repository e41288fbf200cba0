//! Dispatch of grid requests to `sp_Grid_*` procedures.
//!
//! Every call resolves the procedure through the registry first; the
//! procedure name is interpolated into SQL only after it has matched the
//! naming pattern, everything else travels as bind parameters.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, DbBackend, EntityTrait,
    QueryFilter, QueryOrder, Set, Statement,
};
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::auth::AuthenticatedUser;
use crate::codegen::sql::{humanize, quote_ident};
use crate::codegen::{GridDefinition, ScaffoldReport, Scaffolder};
use crate::entities::{column_metadata, grid_column_state, prelude::*, stored_procedure_registry};
use crate::error::{AppError, AppResult};
use crate::grid::columns::{display_value, merge_column_definitions, DropdownConfig, DropdownSource, LinkConfig};
use crate::grid::drilldown::{build_child_filter, render_breadcrumb, row_value, BreadcrumbLevel};
use crate::grid::naming;
use crate::grid::strategy::StrategyThresholds;
use crate::grid::types::{
    AvailableProcedure, DeleteRowRequest, DrillDownRequest, DrillDownResponse, DropdownOption,
    DropdownRequest, GridRequest, GridResponse, InsertRowRequest, MutationResult, NavigateRequest,
    ProcedureEnvelope, SaveColumnStateRequest, UpdateRowRequest,
};
use crate::services::registry::{self, Registration};

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScaffoldRequest {
    #[serde(flatten)]
    pub definition: GridDefinition,
    #[serde(flatten)]
    pub registration: Registration,
    #[serde(default)]
    pub dry_run: bool,
}

#[derive(Clone)]
pub struct DynamicGridService {
    db: Arc<DatabaseConnection>,
    grid_databases: Arc<HashMap<String, DatabaseConnection>>,
    thresholds: StrategyThresholds,
}

impl DynamicGridService {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self {
            db,
            grid_databases: Arc::new(HashMap::new()),
            thresholds: StrategyThresholds::default(),
        }
    }

    pub fn with_grid_databases(mut self, databases: HashMap<String, DatabaseConnection>) -> Self {
        self.grid_databases = Arc::new(databases);
        self
    }

    pub fn with_thresholds(mut self, thresholds: StrategyThresholds) -> Self {
        self.thresholds = thresholds;
        self
    }

    /// Unknown names fall back to the primary connection.
    fn connection_named(&self, database_name: Option<&str>) -> &DatabaseConnection {
        match database_name.map(str::trim).filter(|name| !name.is_empty()) {
            None => self.db.as_ref(),
            Some(name) => self.grid_databases.get(name).unwrap_or_else(|| {
                warn!("Unknown grid database '{}', using the primary database", name);
                self.db.as_ref()
            }),
        }
    }

    fn connection_for(&self, entry: &stored_procedure_registry::Model) -> &DatabaseConnection {
        self.connection_named(entry.database_name.as_deref())
    }

    pub async fn execute_grid_procedure(
        &self,
        request: GridRequest,
        user: Option<&AuthenticatedUser>,
    ) -> AppResult<GridResponse> {
        ensure_valid_name(&request.procedure_name)?;
        let entry = registry::authorize(self.db.as_ref(), &request.procedure_name, user).await?;

        let page_size = clamp_page_size(request.page_size, &entry);
        let page_number = request.page_number.unwrap_or(1).max(1);
        let (start_row, end_row) = row_window(request.start_row, request.end_row, entry.max_page_size);
        let sort_direction = request.sort_direction.as_deref().map(|direction| {
            if direction.eq_ignore_ascii_case("desc") {
                "DESC".to_string()
            } else {
                "ASC".to_string()
            }
        });
        let search_term = request
            .search_term
            .map(|term| term.trim().to_string())
            .filter(|term| !term.is_empty());

        let sql = format!(
            "SELECT {}($1::INTEGER, $2::INTEGER, $3::INTEGER, $4::INTEGER, $5::TEXT, $6::TEXT, $7::JSONB, $8::TEXT) AS result",
            request.procedure_name
        );
        let values: Vec<sea_orm::Value> = vec![
            Some(page_number).into(),
            Some(page_size).into(),
            start_row.into(),
            end_row.into(),
            request.sort_column.into(),
            sort_direction.into(),
            sea_orm::Value::Json(request.filter_model.map(Box::new)),
            search_term.into(),
        ];

        debug!("Executing {} page {} size {}", request.procedure_name, page_number, page_size);
        let raw = call_json(self.connection_for(&entry), sql, values).await?;
        let envelope: ProcedureEnvelope = serde_json::from_value(raw)?;

        let metadata = ColumnMetadata::find()
            .filter(column_metadata::Column::ProcedureName.eq(&request.procedure_name))
            .order_by_asc(column_metadata::Column::SortOrder)
            .all(self.db.as_ref())
            .await?;
        let columns = merge_column_definitions(&envelope.columns, &metadata);

        let column_state = match user {
            Some(user) => self.get_column_state(user, &request.procedure_name).await?,
            None => None,
        };

        let page_size = envelope.page_size.unwrap_or(page_size);
        let total_pages = envelope.total_pages.unwrap_or_else(|| {
            if page_size > 0 {
                ((envelope.total_count + i64::from(page_size) - 1) / i64::from(page_size)) as i32
            } else {
                0
            }
        });

        Ok(GridResponse {
            procedure_name: entry.procedure_name.clone(),
            display_name: entry.display_name.clone(),
            success: envelope.success.unwrap_or(envelope.error_code.is_none()),
            loading_strategy: self.thresholds.choose(envelope.total_count),
            rows: envelope.rows,
            columns,
            total_count: envelope.total_count,
            page_number: envelope.page_number.unwrap_or(page_number),
            page_size,
            total_pages,
            column_state,
            error_code: envelope.error_code,
            message: envelope.message,
            cache_seconds: entry.cache_duration_seconds.max(0),
        })
    }

    pub async fn update_row(
        &self,
        request: UpdateRowRequest,
        user: Option<&AuthenticatedUser>,
    ) -> AppResult<MutationResult> {
        ensure_valid_name(&request.procedure_name)?;
        let entry = registry::authorize(self.db.as_ref(), &request.procedure_name, user).await?;
        if !request.changes.is_object() {
            return Err(AppError::BadRequest("Changes must be a JSON object".to_string()));
        }

        let name = naming::derive_update_name(&request.procedure_name)
            .ok_or_else(|| AppError::BadRequest("Invalid procedure name".to_string()))?;
        let db = self.connection_for(&entry);
        if !procedure_exists(db, &name).await? {
            return Err(AppError::NotFound(format!("Update procedure '{}' not found", name)));
        }

        let sql = format!("SELECT {}($1::TEXT, $2::JSONB, $3::TEXT) AS result", name);
        let values: Vec<sea_orm::Value> = vec![
            request.row_id.into(),
            sea_orm::Value::Json(Some(Box::new(request.changes))),
            user_id(user).into(),
        ];
        self.mutate(db, name, sql, values).await
    }

    pub async fn insert_row(
        &self,
        request: InsertRowRequest,
        user: Option<&AuthenticatedUser>,
    ) -> AppResult<MutationResult> {
        ensure_valid_name(&request.procedure_name)?;
        let entry = registry::authorize(self.db.as_ref(), &request.procedure_name, user).await?;
        if !request.field_values.is_object() {
            return Err(AppError::BadRequest("Field values must be a JSON object".to_string()));
        }

        let name = naming::derive_insert_name(&request.procedure_name)
            .ok_or_else(|| AppError::BadRequest("Invalid procedure name".to_string()))?;
        let db = self.connection_for(&entry);
        if !procedure_exists(db, &name).await? {
            return Err(AppError::NotFound(format!("Insert procedure '{}' not found", name)));
        }

        let sql = format!("SELECT {}($1::JSONB, $2::TEXT) AS result", name);
        let values: Vec<sea_orm::Value> = vec![
            sea_orm::Value::Json(Some(Box::new(request.field_values))),
            user_id(user).into(),
        ];
        self.mutate(db, name, sql, values).await
    }

    pub async fn delete_row(
        &self,
        request: DeleteRowRequest,
        user: Option<&AuthenticatedUser>,
    ) -> AppResult<MutationResult> {
        ensure_valid_name(&request.procedure_name)?;
        let entry = registry::authorize(self.db.as_ref(), &request.procedure_name, user).await?;
        let db = self.connection_for(&entry);

        let mut chosen = None;
        for candidate in naming::delete_candidates(&request.procedure_name) {
            if procedure_exists(db, &candidate).await? {
                chosen = Some(candidate);
                break;
            }
            debug!("Delete candidate {} does not exist", candidate);
        }
        let name = chosen.ok_or_else(|| {
            AppError::NotFound(format!("No delete procedure found for '{}'", request.procedure_name))
        })?;

        let sql = format!("SELECT {}($1::TEXT, $2::TEXT) AS result", name);
        let values: Vec<sea_orm::Value> = vec![request.row_id.into(), user_id(user).into()];
        self.mutate(db, name, sql, values).await
    }

    async fn mutate(
        &self,
        db: &DatabaseConnection,
        name: String,
        sql: String,
        values: Vec<sea_orm::Value>,
    ) -> AppResult<MutationResult> {
        let raw = call_json(db, sql, values).await?;
        let mut result: MutationResult = serde_json::from_value(raw)?;
        if result.success {
            info!("{} succeeded", name);
        } else {
            warn!(
                "{} failed: {} ({})",
                name,
                result.message,
                result.error_code.as_deref().unwrap_or("no code")
            );
        }
        result.procedure_name = Some(name);
        Ok(result)
    }

    pub async fn available_procedures(
        &self,
        user: Option<&AuthenticatedUser>,
    ) -> AppResult<Vec<AvailableProcedure>> {
        registry::available_procedures(self.db.as_ref(), user).await
    }

    pub async fn get_column_state(
        &self,
        user: &AuthenticatedUser,
        procedure_name: &str,
    ) -> AppResult<Option<Value>> {
        ensure_valid_name(procedure_name)?;
        let state = GridColumnState::find()
            .filter(grid_column_state::Column::UserId.eq(user.id))
            .filter(grid_column_state::Column::ProcedureName.eq(procedure_name))
            .one(self.db.as_ref())
            .await?;
        Ok(state.map(|state| state.column_state))
    }

    pub async fn save_column_state(
        &self,
        user: &AuthenticatedUser,
        request: SaveColumnStateRequest,
    ) -> AppResult<()> {
        ensure_valid_name(&request.procedure_name)?;
        let now = Utc::now();
        let existing = GridColumnState::find()
            .filter(grid_column_state::Column::UserId.eq(user.id))
            .filter(grid_column_state::Column::ProcedureName.eq(&request.procedure_name))
            .one(self.db.as_ref())
            .await?;

        match existing {
            Some(state) => {
                let mut active: grid_column_state::ActiveModel = state.into();
                active.column_state = Set(request.column_state);
                active.updated_at = Set(now.into());
                active.update(self.db.as_ref()).await?;
            }
            None => {
                grid_column_state::ActiveModel {
                    id: Set(Uuid::new_v4()),
                    user_id: Set(user.id),
                    procedure_name: Set(request.procedure_name),
                    column_state: Set(request.column_state),
                    created_at: Set(now.into()),
                    updated_at: Set(now.into()),
                }
                .insert(self.db.as_ref())
                .await?;
            }
        }
        Ok(())
    }

    async fn column_metadata(
        &self,
        procedure_name: &str,
        column_name: &str,
    ) -> AppResult<column_metadata::Model> {
        ColumnMetadata::find()
            .filter(column_metadata::Column::ProcedureName.eq(procedure_name))
            .all(self.db.as_ref())
            .await?
            .into_iter()
            .find(|meta| meta.column_name.eq_ignore_ascii_case(column_name))
            .ok_or_else(|| {
                AppError::NotFound(format!(
                    "No metadata for column '{}' of '{}'",
                    column_name, procedure_name
                ))
            })
    }

    pub async fn dropdown_options(
        &self,
        request: DropdownRequest,
        user: Option<&AuthenticatedUser>,
    ) -> AppResult<Vec<DropdownOption>> {
        ensure_valid_name(&request.procedure_name)?;
        let entry = registry::authorize(self.db.as_ref(), &request.procedure_name, user).await?;
        let meta = self.column_metadata(&request.procedure_name, &request.column_name).await?;
        let config = DropdownConfig::from_metadata(&meta).ok_or_else(|| {
            AppError::BadRequest(format!("Column '{}' has no dropdown", request.column_name))
        })?;

        if config.source == DropdownSource::Static {
            return Ok(config.options.unwrap_or_default());
        }

        let query = dynamic_dropdown_query(&meta)?;
        let mut values: Vec<sea_orm::Value> = Vec::new();
        if query.cascading {
            match request.parent_value.as_ref().filter(|value| !value.is_null()) {
                Some(parent) => values.push(display_value(parent).into()),
                // Cascading lists stay empty until the parent has a value.
                None => return Ok(Vec::new()),
            }
        }

        let raw = call_json(self.connection_for(&entry), query.sql, values).await?;
        Ok(serde_json::from_value(raw)?)
    }

    pub async fn drill_down(
        &self,
        request: DrillDownRequest,
        user: Option<&AuthenticatedUser>,
    ) -> AppResult<DrillDownResponse> {
        ensure_valid_name(&request.procedure_name)?;
        registry::authorize(self.db.as_ref(), &request.procedure_name, user).await?;

        let meta = self.column_metadata(&request.procedure_name, &request.column_name).await?;
        let link = LinkConfig::from_metadata(&meta).ok_or_else(|| {
            AppError::BadRequest(format!("Column '{}' has no drill-down link", request.column_name))
        })?;
        ensure_valid_name(&link.target_procedure)?;

        let filter_model = build_child_filter(&link.filter_mapping, &request.row);
        let label = match &link.breadcrumb_template {
            Some(template) => render_breadcrumb(template, &request.row),
            None => row_value(&request.row, &request.column_name)
                .map(display_value)
                .filter(|label| !label.is_empty())
                .unwrap_or_else(|| link.target_procedure.clone()),
        };

        let mut trail = request.trail.unwrap_or_default();
        trail.drill(
            &link,
            BreadcrumbLevel {
                procedure_name: link.target_procedure.clone(),
                label,
                filter_model: filter_model.clone(),
            },
        )?;

        let grid = self
            .execute_grid_procedure(
                GridRequest {
                    procedure_name: link.target_procedure.clone(),
                    page_size: request.page_size,
                    filter_model: Some(filter_model),
                    ..Default::default()
                },
                user,
            )
            .await?;

        Ok(DrillDownResponse { grid, trail })
    }

    pub async fn navigate(
        &self,
        request: NavigateRequest,
        user: Option<&AuthenticatedUser>,
    ) -> AppResult<DrillDownResponse> {
        let mut trail = request.trail;
        trail.apply(&request.action)?;

        let grid_request = match trail.current() {
            Some(level) => GridRequest {
                procedure_name: level.procedure_name.clone(),
                page_size: request.page_size,
                filter_model: Some(level.filter_model.clone()).filter(|filter| !filter.is_null()),
                ..Default::default()
            },
            None => GridRequest {
                procedure_name: request.root_procedure,
                page_size: request.page_size,
                ..Default::default()
            },
        };

        let grid = self.execute_grid_procedure(grid_request, user).await?;
        Ok(DrillDownResponse { grid, trail })
    }

    /// Generates the table's procedures on its routed database and registers
    /// the fetch procedure when it was created.
    pub async fn scaffold(&self, request: ScaffoldRequest) -> AppResult<ScaffoldReport> {
        let db = self.connection_named(request.registration.database_name.as_deref());
        let mut report = Scaffolder::new(db)
            .scaffold(&request.definition, request.dry_run)
            .await?;

        if !request.dry_run && report.fetch_created() {
            let fallback = humanize(&report.table_name);
            match registry::upsert_registry_entry(self.db.as_ref(), &report.fetch_procedure, &fallback, &request.registration)
                .await
            {
                Ok(_) => report.registered = true,
                Err(e) => warn!("Failed to register {}: {}", report.fetch_procedure, e),
            }
        }

        info!("Scaffolded {}.{}\n{}", report.schema_name, report.table_name, report.summary());
        Ok(report)
    }
}

fn ensure_valid_name(procedure_name: &str) -> AppResult<()> {
    if naming::is_valid_procedure_name(procedure_name) {
        Ok(())
    } else {
        Err(AppError::BadRequest(format!("Invalid procedure name '{}'", procedure_name)))
    }
}

/// Infinite-scroll window: both bounds or neither, at most `max_page_size` rows wide.
pub fn row_window(start_row: Option<i32>, end_row: Option<i32>, max_page_size: i32) -> (Option<i32>, Option<i32>) {
    match (start_row, end_row) {
        (Some(start), Some(end)) => {
            let start = start.max(0);
            let span = end.saturating_sub(start).clamp(1, max_page_size.max(1));
            (Some(start), Some(start.saturating_add(span)))
        }
        _ => (None, None),
    }
}

fn user_id(user: Option<&AuthenticatedUser>) -> Option<String> {
    user.map(|user| user.id.to_string())
}

/// Requested page size, defaulted and clamped to the registry limits.
pub fn clamp_page_size(requested: Option<i32>, entry: &stored_procedure_registry::Model) -> i32 {
    let max = entry.max_page_size.max(1);
    requested
        .filter(|size| *size > 0)
        .unwrap_or(entry.default_page_size)
        .clamp(1, max)
}

async fn call_json(db: &DatabaseConnection, sql: String, values: Vec<sea_orm::Value>) -> AppResult<Value> {
    let statement = Statement::from_sql_and_values(DbBackend::Postgres, sql, values);
    let row = db
        .query_one(statement)
        .await?
        .ok_or_else(|| AppError::Internal("Procedure returned no rows".to_string()))?;
    row.try_get::<Option<Value>>("", "result")?
        .ok_or_else(|| AppError::Internal("Procedure returned NULL".to_string()))
}

/// `pg_proc` stores unquoted names folded to lowercase.
async fn procedure_exists(db: &DatabaseConnection, name: &str) -> AppResult<bool> {
    let statement = Statement::from_sql_and_values(
        DbBackend::Postgres,
        "SELECT EXISTS(SELECT 1 FROM pg_proc WHERE lower(proname) = lower($1)) AS present",
        [name.into()],
    );
    let present = match db.query_one(statement).await? {
        Some(row) => row.try_get::<bool>("", "present")?,
        None => false,
    };
    Ok(present)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DropdownQuery {
    pub sql: String,
    /// `$1` carries the parent value.
    pub cascading: bool,
}

fn checked_ident(name: &str) -> AppResult<String> {
    if naming::is_valid_identifier(name) {
        Ok(quote_ident(name))
    } else {
        Err(AppError::BadRequest(format!("Invalid identifier '{}'", name)))
    }
}

/// `SELECT DISTINCT value, label FROM master [WHERE depends_on_column = $1]`,
/// aggregated into one JSON array ordered by label. `master_table` may be
/// schema-qualified.
pub fn dynamic_dropdown_query(meta: &column_metadata::Model) -> AppResult<DropdownQuery> {
    let missing = |field: &str| {
        AppError::BadRequest(format!("Dynamic dropdown on '{}' needs {}", meta.column_name, field))
    };
    let master = meta.master_table.as_deref().ok_or_else(|| missing("masterTable"))?;
    let value_column = meta.value_column.as_deref().ok_or_else(|| missing("valueColumn"))?;
    let label_column = meta.label_column.as_deref().unwrap_or(value_column);

    let table = master
        .split('.')
        .map(checked_ident)
        .collect::<AppResult<Vec<_>>>()?
        .join(".");
    let value = checked_ident(value_column)?;
    let label = checked_ident(label_column)?;

    let (filter, cascading) = match meta.depends_on_column.as_deref() {
        Some(column) => (format!(" WHERE {}::TEXT = $1", checked_ident(column)?), true),
        None => (String::new(), false),
    };

    let sql = format!(
        "SELECT COALESCE(jsonb_agg(jsonb_build_object('value', d.value, 'label', d.label) ORDER BY d.label), '[]'::JSONB) AS result \
         FROM (SELECT DISTINCT {value} AS value, {label}::TEXT AS label FROM {table}{filter}) d",
    );
    Ok(DropdownQuery { sql, cascading })
}
