//! REST surface. Handlers stay thin and delegate to the services.

pub mod auth;
pub mod dynamic_grid;
pub mod menu;
pub mod role_management;

use axum::{
    http::{
        header::{AUTHORIZATION, CONTENT_TYPE},
        HeaderName, HeaderValue, Method,
    },
    middleware,
    response::IntoResponse,
    routing::get,
    Router,
};
use tower_http::cors::CorsLayer;
use tracing::warn;

use crate::auth::{optional_auth_middleware, JwtService};
use crate::services::{DynamicGridService, MenuService, RoleService, UserService};

#[derive(Clone)]
pub struct AppState {
    pub jwt_service: JwtService,
    pub user_service: UserService,
    pub role_service: RoleService,
    pub grid_service: DynamicGridService,
    pub menu_service: MenuService,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .nest("/api/DynamicGrid", dynamic_grid::routes())
        .nest("/api/Auth", auth::routes())
        .nest("/api/RoleManagement", role_management::routes())
        .route("/api/Menu", get(menu::menu))
        .layer(middleware::from_fn_with_state(
            state.jwt_service.clone(),
            optional_auth_middleware,
        ))
        .with_state(state)
}

/// `*` allows any origin; otherwise a comma-separated origin list.
pub fn cors_layer(cors_origins: &str) -> CorsLayer {
    if cors_origins.trim() == "*" {
        warn!("CORS set to accept ANY origin (*) - only use in development!");
        return CorsLayer::permissive();
    }

    let origins: Vec<HeaderValue> = cors_origins
        .split(',')
        .filter_map(|origin| origin.trim().parse().ok())
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS, Method::PUT, Method::DELETE])
        .allow_headers([
            CONTENT_TYPE,
            AUTHORIZATION,
            HeaderName::from_static("x-requested-with"),
        ])
        .allow_credentials(true)
}

async fn health() -> impl IntoResponse {
    "OK"
}
