//! Authentication data models

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Cookie carrying the signed session token
pub const SESSION_COOKIE: &str = "groove.session-token";

/// Cookie carrying the OAuth `state` between sign-in and callback
pub const OAUTH_STATE_COOKIE: &str = "groove.oauth-state";

/// Lifetime of the OAuth state cookie
pub const OAUTH_STATE_MAX_AGE_SECS: i64 = 10 * 60;

/// Provider name used for email + password sign-in
pub const CREDENTIALS_PROVIDER: &str = "credentials";

/// JWT claims structure
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Claims {
    pub sub: String,
    /// Copied from the signed-in user by the jwt callback
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub picture: Option<String>,
    pub iat: usize,
    pub exp: usize,
    pub jti: String,
}

/// User database model
#[derive(FromRow, Serialize, Deserialize, Debug, Clone)]
pub struct User {
    pub id: String,
    pub email: String,
    pub name: Option<String>,
    pub image: Option<String>,
    #[serde(skip_serializing, default)]
    pub password_hash: Option<String>,
    pub created_at: Option<String>,
}

/// Linked OAuth identity
#[derive(FromRow, Serialize, Deserialize, Debug, Clone)]
pub struct Account {
    pub id: String,
    pub user_id: String,
    pub provider: String,
    pub provider_account_id: String,
    pub provider_type: String,
    pub created_at: Option<String>,
}

/// Minimal user record produced by a successful sign-in
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct AuthUser {
    pub id: String,
    pub name: Option<String>,
    pub email: String,
    pub image: Option<String>,
}

impl From<User> for AuthUser {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            name: user.name,
            email: user.email,
            image: user.image,
        }
    }
}

/// User as exposed through the session endpoint
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
pub struct SessionUser {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub name: Option<String>,
    pub email: Option<String>,
    pub image: Option<String>,
}

/// Session object; serializes to `{}` when nobody is signed in
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
pub struct Session {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<SessionUser>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires: Option<String>,
}

/// POST /api/signup body
#[derive(Deserialize, Debug, Clone)]
pub struct SignupRequest {
    pub email: String,
    pub password: String,
}

/// POST /api/auth/callback/credentials body
#[derive(Deserialize, Debug, Clone)]
pub struct CredentialsRequest {
    pub email: String,
    pub password: String,
    /// Requested destination; ignored by the redirect callback
    #[serde(default, rename = "callbackUrl")]
    pub callback_url: Option<String>,
}

/// Query parameters delivered to the OAuth callback
#[derive(Deserialize, Debug, Default)]
pub struct OAuthCallbackParams {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
}

/// Entry in GET /api/auth/providers
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct ProviderInfo {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub provider_type: String,
    #[serde(rename = "signinUrl")]
    pub signin_url: String,
    #[serde(rename = "callbackUrl")]
    pub callback_url: String,
}
