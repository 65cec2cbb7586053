//! Page handlers and the catalog proxy

use axum::{
    extract::{Extension, Json, Query},
    response::{Html, IntoResponse, Redirect, Response},
};
use serde::Deserialize;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, error, info};

use super::templates;
use crate::auth::AuthedUser;
use crate::common::{ApiError, AppState};

fn html_page(page: &str, rendered: askama::Result<String>) -> Response {
    match rendered {
        Ok(html) => Html(html).into_response(),
        Err(e) => {
            error!(error = %e, page = %page, "Failed to render page");
            ApiError::InternalServer("Failed to render page".to_string()).into_response()
        }
    }
}

#[derive(Debug, Deserialize, Default)]
pub struct SigninQuery {
    pub error: Option<String>,
}

/// GET /signin
pub async fn signin_page(
    Extension(state_lock): Extension<Arc<RwLock<AppState>>>,
    user: Option<AuthedUser>,
    Query(query): Query<SigninQuery>,
) -> Response {
    if let Some(user) = user {
        debug!(user_id = %user.id, "Signed-in user visiting /signin");
        return Redirect::to("/").into_response();
    }

    let state = state_lock.read().await;
    let providers = state.oauth_service.configured_providers();
    html_page("signin", templates::render_signin(query.error.as_deref(), &providers))
}

/// GET /signup
pub async fn signup_page(user: Option<AuthedUser>) -> Response {
    if user.is_some() {
        return Redirect::to("/").into_response();
    }
    html_page("signup", templates::render_signup())
}

/// GET / - Track grid and player; signed-in users only
pub async fn home_page(
    Extension(state_lock): Extension<Arc<RwLock<AppState>>>,
    user: Option<AuthedUser>,
) -> Response {
    let Some(user) = user else {
        return Redirect::to("/signin").into_response();
    };

    let catalog = state_lock.read().await.catalog_service.clone();
    let tracks = catalog.fetch_tracks_or_empty().await;
    info!(user_id = %user.id, tracks = tracks.len(), "Rendering home page");

    html_page(
        "home",
        templates::render_home(user.name.as_deref(), user.image.as_deref(), &tracks),
    )
}

/// GET /api/tracks
/// Catalog proxy; the API key stays on the server
///
/// # Response
/// ```json
/// { "results": [ { "id": "...", "name": "...", "artist_name": "...", "album_image": "...", "audio": "..." } ] }
/// ```
pub async fn tracks_handler(
    Extension(state_lock): Extension<Arc<RwLock<AppState>>>,
    user: AuthedUser,
) -> Json<serde_json::Value> {
    let catalog = state_lock.read().await.catalog_service.clone();
    let tracks = catalog.fetch_tracks_or_empty().await;
    debug!(user_id = %user.id, count = tracks.len(), "Serving tracks");

    Json(serde_json::json!({ "results": tracks }))
}
