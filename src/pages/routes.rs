use axum::{routing::get, Router};

use super::handlers;

/// Page routes plus the catalog proxy
pub fn pages_routes() -> Router {
    Router::new()
        .route("/", get(handlers::home_page))
        .route("/signin", get(handlers::signin_page))
        .route("/signup", get(handlers::signup_page))
        .route("/api/tracks", get(handlers::tracks_handler))
}
