use axum::{
    extract::{Query, State},
    http::{header::CACHE_CONTROL, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Extension, Json, Router,
};
use serde_json::json;

use crate::api::AppState;
use crate::auth::{require_admin, require_auth, AuthenticatedUser};
use crate::error::AppResult;
use crate::grid::types::{
    ColumnStateQuery, DeleteRowRequest, DrillDownRequest, DropdownRequest, GridRequest,
    InsertRowRequest, MutationResult, NavigateRequest, SaveColumnStateRequest, UpdateRowRequest,
};
use crate::services::ScaffoldRequest;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/execute", post(execute))
        .route("/update-row", post(update_row))
        .route("/insert-row", post(insert_row))
        .route("/delete-row", post(delete_row))
        .route("/available-procedures", get(available_procedures))
        .route("/column-state", get(get_column_state).post(save_column_state))
        .route("/dropdown-options", post(dropdown_options))
        .route("/drill-down", post(drill_down))
        .route("/navigate", post(navigate))
        .route("/scaffold", post(scaffold))
}

async fn execute(
    State(state): State<AppState>,
    Extension(user): Extension<Option<AuthenticatedUser>>,
    Json(request): Json<GridRequest>,
) -> AppResult<Response> {
    let grid = state
        .grid_service
        .execute_grid_procedure(request, user.as_ref())
        .await?;

    let cache_seconds = grid.cache_seconds;
    let mut response = Json(grid).into_response();
    if cache_seconds > 0 {
        if let Ok(value) = HeaderValue::from_str(&format!("private, max-age={}", cache_seconds)) {
            response.headers_mut().insert(CACHE_CONTROL, value);
        }
    }
    Ok(response)
}

/// Procedure-level failures keep their error code in the body.
fn mutation_response(result: MutationResult) -> Response {
    let status = if result.success {
        StatusCode::OK
    } else {
        StatusCode::BAD_REQUEST
    };
    (status, Json(result)).into_response()
}

async fn update_row(
    State(state): State<AppState>,
    Extension(user): Extension<Option<AuthenticatedUser>>,
    Json(request): Json<UpdateRowRequest>,
) -> AppResult<Response> {
    let result = state.grid_service.update_row(request, user.as_ref()).await?;
    Ok(mutation_response(result))
}

async fn insert_row(
    State(state): State<AppState>,
    Extension(user): Extension<Option<AuthenticatedUser>>,
    Json(request): Json<InsertRowRequest>,
) -> AppResult<Response> {
    let result = state.grid_service.insert_row(request, user.as_ref()).await?;
    Ok(mutation_response(result))
}

async fn delete_row(
    State(state): State<AppState>,
    Extension(user): Extension<Option<AuthenticatedUser>>,
    Json(request): Json<DeleteRowRequest>,
) -> AppResult<Response> {
    let result = state.grid_service.delete_row(request, user.as_ref()).await?;
    Ok(mutation_response(result))
}

async fn available_procedures(
    State(state): State<AppState>,
    Extension(user): Extension<Option<AuthenticatedUser>>,
) -> AppResult<impl IntoResponse> {
    let procedures = state.grid_service.available_procedures(user.as_ref()).await?;
    Ok(Json(json!({ "success": true, "procedures": procedures })))
}

async fn get_column_state(
    State(state): State<AppState>,
    Extension(user): Extension<Option<AuthenticatedUser>>,
    Query(query): Query<ColumnStateQuery>,
) -> AppResult<impl IntoResponse> {
    let user = require_auth(&user)?;
    let column_state = state
        .grid_service
        .get_column_state(user, &query.procedure_name)
        .await?;
    Ok(Json(json!({ "success": true, "columnState": column_state })))
}

async fn save_column_state(
    State(state): State<AppState>,
    Extension(user): Extension<Option<AuthenticatedUser>>,
    Json(request): Json<SaveColumnStateRequest>,
) -> AppResult<impl IntoResponse> {
    let user = require_auth(&user)?;
    state.grid_service.save_column_state(user, request).await?;
    Ok(Json(json!({ "success": true, "message": "Column state saved" })))
}

async fn dropdown_options(
    State(state): State<AppState>,
    Extension(user): Extension<Option<AuthenticatedUser>>,
    Json(request): Json<DropdownRequest>,
) -> AppResult<impl IntoResponse> {
    let options = state.grid_service.dropdown_options(request, user.as_ref()).await?;
    Ok(Json(json!({ "success": true, "options": options })))
}

async fn drill_down(
    State(state): State<AppState>,
    Extension(user): Extension<Option<AuthenticatedUser>>,
    Json(request): Json<DrillDownRequest>,
) -> AppResult<impl IntoResponse> {
    let response = state.grid_service.drill_down(request, user.as_ref()).await?;
    Ok(Json(response))
}

async fn navigate(
    State(state): State<AppState>,
    Extension(user): Extension<Option<AuthenticatedUser>>,
    Json(request): Json<NavigateRequest>,
) -> AppResult<impl IntoResponse> {
    let response = state.grid_service.navigate(request, user.as_ref()).await?;
    Ok(Json(response))
}

async fn scaffold(
    State(state): State<AppState>,
    Extension(user): Extension<Option<AuthenticatedUser>>,
    Json(request): Json<ScaffoldRequest>,
) -> AppResult<impl IntoResponse> {
    require_admin(&user)?;
    let report = state.grid_service.scaffold(request).await?;
    Ok(Json(report))
}
