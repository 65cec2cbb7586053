//! Authentication routes

use axum::{
    routing::{get, post},
    Router,
};

use super::handlers;

/// Creates and returns the authentication router
///
/// # Routes
/// - `POST /api/signup` - Create a credentials account
/// - `GET /api/auth/providers` - List sign-in methods
/// - `GET /api/auth/signin/:provider` - Start an OAuth flow
/// - `POST /api/auth/callback/credentials` - Email + password sign-in
/// - `GET /api/auth/callback/:provider` - OAuth redirect target
/// - `GET /api/auth/session` - Current session
/// - `POST /api/auth/signout` - End the session
pub fn auth_routes() -> Router {
    Router::new()
        .route("/api/signup", post(handlers::signup_handler))
        .route("/api/auth/providers", get(handlers::providers_handler))
        .route(
            "/api/auth/signin/:provider",
            get(handlers::oauth_signin_handler),
        )
        .route(
            "/api/auth/callback/credentials",
            post(handlers::credentials_callback_handler),
        )
        .route(
            "/api/auth/callback/:provider",
            get(handlers::oauth_callback_handler),
        )
        .route("/api/auth/session", get(handlers::session_handler))
        .route("/api/auth/signout", post(handlers::signout_handler))
}
