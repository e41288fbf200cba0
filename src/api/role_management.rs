//! Admin-only role and user-role management.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{delete, get},
    Extension, Json, Router,
};
use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;

use crate::api::auth::UserInfo;
use crate::api::AppState;
use crate::auth::{require_admin, AuthenticatedUser};
use crate::entities::role;
use crate::error::AppResult;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/roles", get(list_roles).post(create_role))
        .route("/roles/{id}", get(get_role).put(update_role).delete(delete_role))
        .route("/users", get(list_users))
        .route("/users/{user_id}/roles", get(user_roles).post(assign_role))
        .route("/users/{user_id}/roles/{role_id}", delete(remove_role))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoleInfo {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<FixedOffset>,
    pub updated_at: DateTime<FixedOffset>,
}

impl From<role::Model> for RoleInfo {
    fn from(role: role::Model) -> Self {
        Self {
            id: role.id,
            name: role.name,
            description: role.description,
            is_active: role.is_active,
            created_at: role.created_at,
            updated_at: role.updated_at,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct CreateRoleRequest {
    pub name: String,
    pub description: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateRoleRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignRoleRequest {
    pub role_id: Uuid,
}

async fn list_roles(
    State(state): State<AppState>,
    Extension(user): Extension<Option<AuthenticatedUser>>,
) -> AppResult<impl IntoResponse> {
    require_admin(&user)?;
    let roles: Vec<RoleInfo> = state
        .role_service
        .list_roles()
        .await?
        .into_iter()
        .map(RoleInfo::from)
        .collect();
    Ok(Json(roles))
}

async fn get_role(
    State(state): State<AppState>,
    Extension(user): Extension<Option<AuthenticatedUser>>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<RoleInfo>> {
    require_admin(&user)?;
    Ok(Json(state.role_service.get_role(id).await?.into()))
}

async fn create_role(
    State(state): State<AppState>,
    Extension(user): Extension<Option<AuthenticatedUser>>,
    Json(request): Json<CreateRoleRequest>,
) -> AppResult<impl IntoResponse> {
    require_admin(&user)?;
    let role = state
        .role_service
        .create_role(&request.name, request.description)
        .await?;
    Ok((StatusCode::CREATED, Json(RoleInfo::from(role))))
}

async fn update_role(
    State(state): State<AppState>,
    Extension(user): Extension<Option<AuthenticatedUser>>,
    Path(id): Path<Uuid>,
    Json(request): Json<UpdateRoleRequest>,
) -> AppResult<Json<RoleInfo>> {
    require_admin(&user)?;
    let role = state
        .role_service
        .update_role(id, request.name, request.description, request.is_active)
        .await?;
    Ok(Json(role.into()))
}

async fn delete_role(
    State(state): State<AppState>,
    Extension(user): Extension<Option<AuthenticatedUser>>,
    Path(id): Path<Uuid>,
) -> AppResult<impl IntoResponse> {
    require_admin(&user)?;
    state.role_service.delete_role(id).await?;
    Ok(Json(json!({ "success": true, "message": "Role deleted" })))
}

async fn list_users(
    State(state): State<AppState>,
    Extension(user): Extension<Option<AuthenticatedUser>>,
) -> AppResult<impl IntoResponse> {
    require_admin(&user)?;
    let users: Vec<UserInfo> = state
        .role_service
        .list_users()
        .await?
        .into_iter()
        .map(UserInfo::from)
        .collect();
    Ok(Json(users))
}

async fn user_roles(
    State(state): State<AppState>,
    Extension(user): Extension<Option<AuthenticatedUser>>,
    Path(user_id): Path<Uuid>,
) -> AppResult<impl IntoResponse> {
    require_admin(&user)?;
    let roles = state.role_service.user_roles(user_id).await?;
    Ok(Json(json!({ "success": true, "roles": roles })))
}

async fn assign_role(
    State(state): State<AppState>,
    Extension(user): Extension<Option<AuthenticatedUser>>,
    Path(user_id): Path<Uuid>,
    Json(request): Json<AssignRoleRequest>,
) -> AppResult<impl IntoResponse> {
    require_admin(&user)?;
    state.role_service.assign_role(user_id, request.role_id).await?;
    Ok(Json(json!({ "success": true, "message": "Role assigned" })))
}

async fn remove_role(
    State(state): State<AppState>,
    Extension(user): Extension<Option<AuthenticatedUser>>,
    Path((user_id, role_id)): Path<(Uuid, Uuid)>,
) -> AppResult<impl IntoResponse> {
    require_admin(&user)?;
    state.role_service.remove_role(user_id, role_id).await?;
    Ok(Json(json!({ "success": true, "message": "Role removed" })))
}
