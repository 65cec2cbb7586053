// src/services/mod.rs
//
// Shared services used by the auth, page and player modules

pub mod catalog;
pub mod oauth;
pub mod rate_limit;

// Re-export commonly used types for convenience
pub use catalog::{CatalogError, CatalogService, Track};
pub use oauth::{OAuthError, OAuthProfile, OAuthService, Provider};
pub use rate_limit::{RateLimitConfig, RateLimitService};
