use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Extension, Json, Router,
};
use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;

use crate::api::AppState;
use crate::auth::{require_auth, AuthenticatedUser};
use crate::entities::user;
use crate::error::AppResult;
use crate::services::AuthSession;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/refresh", post(refresh))
        .route("/test", get(test))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshRequest {
    pub refresh_token: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserInfo {
    pub id: Uuid,
    pub email: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<FixedOffset>,
}

impl From<user::Model> for UserInfo {
    fn from(user: user::Model) -> Self {
        Self {
            id: user.id,
            email: user.email,
            first_name: user.first_name,
            last_name: user.last_name,
            is_active: user.is_active,
            created_at: user.created_at,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthResponse {
    pub success: bool,
    pub access_token: String,
    pub refresh_token: String,
    pub roles: Vec<String>,
    pub user: UserInfo,
}

impl From<AuthSession> for AuthResponse {
    fn from(session: AuthSession) -> Self {
        Self {
            success: true,
            access_token: session.access_token,
            refresh_token: session.refresh_token,
            roles: session.roles,
            user: session.user.into(),
        }
    }
}

async fn register(
    State(state): State<AppState>,
    Json(request): Json<RegisterRequest>,
) -> AppResult<impl IntoResponse> {
    let user = state
        .user_service
        .register_user(&request.email, &request.password, request.first_name, request.last_name)
        .await?;
    Ok((
        StatusCode::CREATED,
        Json(json!({ "success": true, "user": UserInfo::from(user) })),
    ))
}

async fn login(
    State(state): State<AppState>,
    Json(request): Json<LoginRequest>,
) -> AppResult<Json<AuthResponse>> {
    let session = state
        .user_service
        .authenticate_user(&request.email, &request.password)
        .await?;
    Ok(Json(session.into()))
}

async fn refresh(
    State(state): State<AppState>,
    Json(request): Json<RefreshRequest>,
) -> AppResult<Json<AuthResponse>> {
    let session = state.user_service.refresh_token(&request.refresh_token).await?;
    Ok(Json(session.into()))
}

async fn test(Extension(user): Extension<Option<AuthenticatedUser>>) -> AppResult<impl IntoResponse> {
    let user = require_auth(&user)?;
    Ok(Json(json!({
        "success": true,
        "message": "Authenticated",
        "user": { "id": user.id, "email": user.email, "roles": user.roles },
    })))
}
