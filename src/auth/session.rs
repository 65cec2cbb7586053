//! JWT session strategy: token issuance and the jwt / session / redirect callbacks

use chrono::{TimeZone, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use tracing::{error, warn};
use uuid::Uuid;

use super::models::{AuthUser, Claims, Session, SessionUser};
use crate::common::ApiError;

/// jwt callback: on sign-in copy the user id into the token, otherwise pass it through
pub fn jwt_callback(mut token: Claims, user: Option<&AuthUser>) -> Claims {
    if let Some(user) = user {
        token.id = Some(user.id.clone());
    }
    token
}

/// session callback: expose the token's id on the session user
pub fn session_callback(mut session: Session, token: &Claims) -> Session {
    if let (Some(user), Some(id)) = (session.user.as_mut(), token.id.as_ref()) {
        user.id = Some(id.clone());
    }
    session
}

/// redirect callback: every sign-in lands on the base URL, whatever was requested
pub fn redirect_callback(_requested: Option<&str>, base_url: &str) -> String {
    base_url.to_string()
}

/// Builds and signs a session token for a freshly signed-in user
pub fn issue_session_token(
    user: &AuthUser,
    secret: &str,
    max_age_secs: i64,
) -> Result<(String, Claims), ApiError> {
    let now = Utc::now().timestamp();
    let base = Claims {
        sub: user.id.clone(),
        id: None,
        name: user.name.clone(),
        email: Some(user.email.clone()),
        picture: user.image.clone(),
        iat: now as usize,
        exp: (now + max_age_secs) as usize,
        jti: Uuid::new_v4().to_string(),
    };
    let claims = jwt_callback(base, Some(user));

    let token = encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| {
        error!(error = %e, user_id = %user.id, "JWT encoding error during authentication");
        ApiError::InternalServer("jwt error".to_string())
    })?;

    Ok((token, claims))
}

/// Validate a session token and return its claims
pub fn decode_session_token(token: &str, secret: &str) -> Result<Claims, ApiError> {
    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::new(Algorithm::HS256),
    )
    .map_err(|e| {
        warn!(error = %e, "JWT validation failed");
        ApiError::Unauthorized("Invalid token".to_string())
    })?;

    Ok(token_data.claims)
}

/// Builds the session object exposed to the front end from a decoded token
pub fn session_from_claims(claims: &Claims) -> Session {
    let expires = Utc
        .timestamp_opt(claims.exp as i64, 0)
        .single()
        .map(|dt| dt.to_rfc3339());

    let session = Session {
        user: Some(SessionUser {
            id: None,
            name: claims.name.clone(),
            email: claims.email.clone(),
            image: claims.picture.clone(),
        }),
        expires,
    };

    session_callback(session, claims)
}
