//! Groove: credential and OAuth sign-in, JWT sessions, a Jamendo catalog
//! proxy and the playback controller shared by the web page and the
//! terminal player.

use std::sync::Arc;

use axum::{extract::Extension, middleware, Router};
use tokio::sync::RwLock;

pub mod auth;
pub mod common;
pub mod logging_middleware;
pub mod pages;
pub mod player;
pub mod rate_limit_middleware;
pub mod services;

use common::AppState;
use services::RateLimitService;

/// Application routes with state, body logging and rate limiting applied.
/// CORS and request tracing are layered on by the binary.
pub fn app(shared: Arc<RwLock<AppState>>, rate_limit_service: Arc<RateLimitService>) -> Router {
    Router::new()
        // ====================================================================
        // AUTHENTICATION ROUTES
        // ====================================================================
        .merge(auth::auth_routes())
        // ====================================================================
        // PAGES AND CATALOG
        // ====================================================================
        .merge(pages::pages_routes())
        // ====================================================================
        // MIDDLEWARE AND LAYERS
        // ====================================================================
        .layer(middleware::from_fn(logging_middleware::log_request_response))
        .layer(middleware::from_fn(
            rate_limit_middleware::rate_limit_middleware,
        ))
        .layer(Extension(rate_limit_service))
        .layer(Extension(shared))
}
