// Application state shared across all modules

use reqwest::Client;
use sqlx::SqlitePool;

use crate::common::config::AppConfig;
use crate::services::{CatalogService, OAuthService};

/// Application state containing database pool, services, and configuration
#[derive(Clone)]
pub struct AppState {
    pub db: SqlitePool,
    pub config: AppConfig,
    pub oauth_service: OAuthService,
    pub catalog_service: CatalogService,
}

impl AppState {
    pub fn new(db: SqlitePool, http: Client, config: AppConfig) -> Self {
        let oauth_service =
            OAuthService::new(http.clone(), config.github.clone(), config.google.clone());
        let catalog_service = CatalogService::new(http, config.jamendo_api_key.clone());

        Self {
            db,
            config,
            oauth_service,
            catalog_service,
        }
    }
}

/// Shared fixture: one-connection in-memory database with the schema applied
#[cfg(test)]
pub(crate) async fn test_state() -> std::sync::Arc<tokio::sync::RwLock<AppState>> {
    use sqlx::sqlite::SqlitePoolOptions;

    let db = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .expect("in-memory sqlite");
    crate::common::migrations::run_migrations(&db)
        .await
        .expect("migrations");

    let state = AppState::new(db, Client::new(), AppConfig::for_tests());
    std::sync::Arc::new(tokio::sync::RwLock::new(state))
}
