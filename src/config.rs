use std::env;

use tracing::warn;

/// Runtime configuration, read once from the environment at startup.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    /// Extra databases grid procedures may be routed to, keyed by registry `database_name`.
    pub grid_databases: Vec<(String, String)>,
    pub jwt_secret: String,
    pub jwt_expiration_hours: i64,
    pub refresh_token_days: i64,
    pub host: String,
    pub port: String,
    pub cors_origins: String,
    pub environment: String,
    pub menu_config_path: String,
    pub client_side_max_rows: i64,
    pub server_paged_max_rows: i64,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, env::VarError> {
        let database_url = env::var("DATABASE_URL")?;
        let grid_databases = env::var("GRID_DATABASES")
            .map(|raw| parse_database_list(&raw))
            .unwrap_or_default();
        let jwt_secret = env::var("JWT_SECRET").unwrap_or_else(|_| {
            warn!("JWT_SECRET not set, using default (not secure for production)");
            "default-secret-change-in-production".to_string()
        });

        Ok(Self {
            database_url,
            grid_databases,
            jwt_secret,
            jwt_expiration_hours: parse_or("JWT_EXPIRATION_HOURS", 24),
            refresh_token_days: parse_or("REFRESH_TOKEN_DAYS", 30),
            host: env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string()),
            port: env::var("PORT").unwrap_or_else(|_| "8080".to_string()),
            cors_origins: env::var("CORS_ALLOWED_ORIGINS")
                .unwrap_or_else(|_| "http://localhost:4200".to_string()),
            environment: env::var("ENVIRONMENT").unwrap_or_else(|_| "development".to_string()),
            menu_config_path: env::var("MENU_CONFIG_PATH")
                .unwrap_or_else(|_| "config/menu-config.json".to_string()),
            client_side_max_rows: parse_or("CLIENT_SIDE_MAX_ROWS", 1_000),
            server_paged_max_rows: parse_or("SERVER_PAGED_MAX_ROWS", 100_000),
        })
    }
}

fn parse_or(key: &str, default: i64) -> i64 {
    env::var(key)
        .ok()
        .and_then(|value| value.parse::<i64>().ok())
        .unwrap_or(default)
}

/// Parses `name=url,name2=url2`. Malformed entries are skipped.
pub fn parse_database_list(raw: &str) -> Vec<(String, String)> {
    raw.split(',')
        .filter_map(|entry| {
            let (name, url) = entry.trim().split_once('=')?;
            let (name, url) = (name.trim(), url.trim());
            if name.is_empty() || url.is_empty() {
                warn!("Ignoring malformed GRID_DATABASES entry: {}", entry);
                return None;
            }
            Some((name.to_string(), url.to_string()))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_named_database_urls() {
        let parsed = parse_database_list(
            "scada=postgres://u:p@host/scada, hr = postgres://u:p@host/hr?sslmode=disable,broken",
        );
        assert_eq!(
            parsed,
            vec![
                ("scada".to_string(), "postgres://u:p@host/scada".to_string()),
                ("hr".to_string(), "postgres://u:p@host/hr?sslmode=disable".to_string()),
            ]
        );
    }
}
