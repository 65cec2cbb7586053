//! Authentication extractors for Axum

use async_trait::async_trait;
use axum::{
    extract::{Extension, FromRequestParts},
    http::{header::AUTHORIZATION, request::Parts, HeaderMap},
};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, error, warn};

use super::models::{Claims, SESSION_COOKIE};
use super::services::UsersService;
use super::session::decode_session_token;
use crate::common::helpers::read_cookie;
use crate::common::{safe_email_log, ApiError, AppState};

/// Session token from `Authorization: Bearer` or, failing that, the session cookie
pub fn session_token_from_headers(headers: &HeaderMap) -> Option<String> {
    let bearer = headers
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|s| s.strip_prefix("Bearer ").or_else(|| s.strip_prefix("bearer ")))
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty());

    bearer.or_else(|| read_cookie(headers, SESSION_COOKIE).filter(|s| !s.is_empty()))
}

/// Authenticated user extractor
///
/// Validates the session token and confirms the user still exists.
#[derive(Debug, Clone)]
pub struct AuthedUser {
    pub id: String,
    pub email: String,
    pub name: Option<String>,
    pub image: Option<String>,
    pub claims: Claims,
}

#[async_trait]
impl<S> FromRequestParts<S> for AuthedUser
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Extension(state_lock): Extension<Arc<RwLock<AppState>>> =
            Extension::from_request_parts(parts, state)
                .await
                .map_err(|_| ApiError::InternalServer("missing app state".to_string()))?;

        let app_state = state_lock.read().await.clone();

        let token = match session_token_from_headers(&parts.headers) {
            Some(t) => t,
            None => {
                debug!("Authentication failed: no session token");
                return Err(ApiError::Unauthorized("missing auth".into()));
            }
        };

        let claims = decode_session_token(&token, &app_state.config.auth_secret)?;
        let user_id = claims.id.clone().unwrap_or_else(|| claims.sub.clone());

        let user = UsersService::new(app_state.db.clone())
            .find_by_id(&user_id)
            .await
            .map_err(|e| {
                error!(
                    error = %e,
                    user_id = %user_id,
                    "Database error during user lookup in authentication"
                );
                ApiError::DatabaseError(e)
            })?;

        match user {
            Some(u) => {
                debug!(
                    user_id = %u.id,
                    email = %safe_email_log(&u.email),
                    "User authentication successful via extractor"
                );
                Ok(AuthedUser {
                    id: u.id,
                    email: u.email,
                    name: u.name,
                    image: u.image,
                    claims,
                })
            }
            None => {
                warn!(user_id = %user_id, "Authentication failed: user not found in database");
                Err(ApiError::Unauthorized("user not found".into()))
            }
        }
    }
}
