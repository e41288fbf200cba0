use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::grid::columns::ColumnDefinition;
use crate::grid::drilldown::DrillTrail;
use crate::grid::strategy::LoadingStrategy;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GridRequest {
    pub procedure_name: String,
    pub page_number: Option<i32>,
    pub page_size: Option<i32>,
    pub start_row: Option<i32>,
    pub end_row: Option<i32>,
    pub sort_column: Option<String>,
    pub sort_direction: Option<String>,
    /// AG-Grid filter model: `{ field: { filterType, type, filter, filterTo } }`.
    pub filter_model: Option<Value>,
    pub search_term: Option<String>,
}

/// Envelope returned by a fetch procedure.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcedureEnvelope {
    #[serde(default)]
    pub success: Option<bool>,
    #[serde(default)]
    pub rows: Vec<Value>,
    #[serde(default)]
    pub columns: Vec<Value>,
    #[serde(default)]
    pub total_count: i64,
    pub page_number: Option<i32>,
    pub page_size: Option<i32>,
    pub total_pages: Option<i32>,
    pub error_code: Option<String>,
    pub message: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GridResponse {
    pub procedure_name: String,
    pub display_name: String,
    pub success: bool,
    pub rows: Vec<Value>,
    pub columns: Vec<ColumnDefinition>,
    pub total_count: i64,
    pub page_number: i32,
    pub page_size: i32,
    pub total_pages: i32,
    pub loading_strategy: LoadingStrategy,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub column_state: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Seconds the client may cache this page; drives `Cache-Control`.
    #[serde(skip)]
    pub cache_seconds: i32,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateRowRequest {
    pub procedure_name: String,
    pub row_id: String,
    pub changes: Value,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InsertRowRequest {
    pub procedure_name: String,
    pub field_values: Value,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteRowRequest {
    pub procedure_name: String,
    pub row_id: String,
}

/// `{success, message, errorCode?}` from a mutation procedure.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MutationResult {
    pub success: bool,
    #[serde(default)]
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rows_affected: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub procedure_name: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AvailableProcedure {
    pub procedure_name: String,
    pub display_name: String,
    pub category: Option<String>,
    pub description: Option<String>,
    pub default_page_size: i32,
    pub max_page_size: i32,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnStateQuery {
    pub procedure_name: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveColumnStateRequest {
    pub procedure_name: String,
    pub column_state: Value,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DropdownRequest {
    pub procedure_name: String,
    pub column_name: String,
    /// Value of the `depends_on` column for cascading dropdowns.
    pub parent_value: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DropdownOption {
    pub value: Value,
    pub label: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DrillDownRequest {
    pub procedure_name: String,
    pub column_name: String,
    /// The clicked parent row, as returned by the fetch procedure.
    pub row: Value,
    #[serde(default)]
    pub trail: Option<DrillTrail>,
    pub page_size: Option<i32>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum NavigateAction {
    Breadcrumb { index: usize },
    Back,
    Root,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NavigateRequest {
    /// Grid shown when the trail is empty.
    pub root_procedure: String,
    pub trail: DrillTrail,
    pub action: NavigateAction,
    pub page_size: Option<i32>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DrillDownResponse {
    pub grid: GridResponse,
    pub trail: DrillTrail,
}
