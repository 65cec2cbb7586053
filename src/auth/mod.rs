//! # Auth Module
//!
//! This module handles all authentication-related functionality including:
//! - Credential signup and sign-in (bcrypt password hashes)
//! - GitHub and Google OAuth sign-in with account auto-linking by email
//! - JWT session tokens and the session endpoint
//! - AuthedUser extractor for protected routes

pub mod extractors;
pub mod handlers;
pub mod models;
pub mod routes;
pub mod services;
pub mod session;
pub mod validators;

#[cfg(test)]
mod tests;

pub use extractors::AuthedUser;
pub use models::{AuthUser, Session, User};
pub use routes::auth_routes;
