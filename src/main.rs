use std::collections::HashMap;
use std::sync::Arc;

use anyhow::Context;
use dotenvy::dotenv;
use sea_orm::Database;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use gridportal::api::{self, AppState};
use gridportal::auth::JwtService;
use gridportal::config::AppConfig;
use gridportal::grid::StrategyThresholds;
use gridportal::services::{DynamicGridService, MenuService, RoleService, UserService};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "gridportal=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = AppConfig::from_env().context("DATABASE_URL must be set")?;
    info!("Starting gridportal in {} environment", config.environment);

    info!("Connecting to database...");
    let db = Arc::new(Database::connect(&config.database_url).await?);
    info!("Database connected successfully");

    let mut grid_databases = HashMap::new();
    for (name, url) in &config.grid_databases {
        match Database::connect(url).await {
            Ok(conn) => {
                info!("Grid database '{}' connected", name);
                grid_databases.insert(name.clone(), conn);
            }
            Err(e) => warn!("Grid database '{}' unavailable, calls fall back to primary: {}", name, e),
        }
    }

    let jwt_service = JwtService::new(
        &config.jwt_secret,
        config.jwt_expiration_hours,
        config.refresh_token_days,
    );
    let grid_service = DynamicGridService::new(db.clone())
        .with_grid_databases(grid_databases)
        .with_thresholds(StrategyThresholds {
            client_side_max_rows: config.client_side_max_rows,
            server_paged_max_rows: config.server_paged_max_rows,
        });

    let state = AppState {
        jwt_service: jwt_service.clone(),
        user_service: UserService::new(db.clone(), jwt_service),
        role_service: RoleService::new(db),
        grid_service,
        menu_service: MenuService::from_file(&config.menu_config_path),
    };

    let app = api::router(state)
        .layer(api::cors_layer(&config.cors_origins))
        .layer(TraceLayer::new_for_http());

    let addr = format!("{}:{}", config.host, config.port);
    let listener = TcpListener::bind(&addr).await?;

    info!("Server starting on http://{}", addr);
    info!("Health check available at http://{}/health", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
