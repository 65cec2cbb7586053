// src/common/config.rs
//! Application configuration loaded from the environment

use std::env;

/// Client id/secret pair for one OAuth provider
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OAuthCredentials {
    pub client_id: String,
    pub client_secret: String,
}

impl OAuthCredentials {
    fn from_env(id_key: &str, secret_key: &str) -> Option<Self> {
        let client_id = env::var(id_key).ok().filter(|v| !v.trim().is_empty())?;
        let client_secret = env::var(secret_key).ok().filter(|v| !v.trim().is_empty())?;
        Some(Self {
            client_id,
            client_secret,
        })
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub port: u16,
    /// Public base URL of the application; every sign-in redirect lands here
    pub base_url: String,
    pub auth_secret: String,
    pub session_max_age_secs: i64,
    pub github: Option<OAuthCredentials>,
    pub google: Option<OAuthCredentials>,
    pub jamendo_api_key: Option<String>,
    pub cors_origins: Vec<String>,
}

const DEFAULT_SESSION_MAX_AGE_SECS: i64 = 30 * 24 * 60 * 60;

fn first_var(keys: &[&str]) -> Option<String> {
    keys.iter()
        .find_map(|key| env::var(key).ok().filter(|v| !v.trim().is_empty()))
}

impl AppConfig {
    pub fn from_env() -> Self {
        let database_url =
            env::var("DATABASE_URL").unwrap_or_else(|_| "sqlite://groove.db".to_string());

        let port = env::var("PORT")
            .ok()
            .and_then(|p| p.parse::<u16>().ok())
            .unwrap_or(8080);

        let base_url = first_var(&["AUTH_URL", "NEXTAUTH_URL"])
            .unwrap_or_else(|| format!("http://localhost:{}", port))
            .trim_end_matches('/')
            .to_string();

        let auth_secret = first_var(&["AUTH_SECRET", "NEXTAUTH_SECRET"])
            .unwrap_or_else(|| "replace_with_strong_secret".to_string());

        let session_max_age_secs = env::var("SESSION_MAX_AGE_SECS")
            .ok()
            .and_then(|v| v.parse::<i64>().ok())
            .filter(|v| *v > 0)
            .unwrap_or(DEFAULT_SESSION_MAX_AGE_SECS);

        let cors_origins = env::var("CORS_ORIGINS")
            .unwrap_or_else(|_| "http://localhost:3000,http://localhost:8080".to_string())
            .split(',')
            .map(|origin| origin.trim().to_string())
            .filter(|origin| !origin.is_empty())
            .collect();

        Self {
            database_url,
            port,
            base_url,
            auth_secret,
            session_max_age_secs,
            github: OAuthCredentials::from_env("GITHUB_CLIENT_ID", "GITHUB_CLIENT_SECRET"),
            google: OAuthCredentials::from_env("GOOGLE_CLIENT_ID", "GOOGLE_CLIENT_SECRET"),
            jamendo_api_key: first_var(&["JAMENDO_API_KEY", "NEXT_PUBLIC_JAMENDO_API_KEY"]),
            cors_origins,
        }
    }

    /// Session cookies get the `Secure` flag when served over https
    pub fn secure_cookies(&self) -> bool {
        self.base_url.starts_with("https://")
    }

    /// Configuration used by tests: in-memory database, no providers
    pub fn for_tests() -> Self {
        Self {
            database_url: "sqlite::memory:".to_string(),
            port: 0,
            base_url: "http://localhost:8080".to_string(),
            auth_secret: "test_secret_key".to_string(),
            session_max_age_secs: DEFAULT_SESSION_MAX_AGE_SECS,
            github: None,
            google: None,
            jamendo_api_key: None,
            cors_origins: Vec::new(),
        }
    }
}
