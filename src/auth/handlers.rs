//! Authentication handlers

use axum::{
    extract::{rejection::JsonRejection, Extension, Json, Path, Query},
    http::{header::SET_COOKIE, HeaderMap, StatusCode},
    response::{AppendHeaders, IntoResponse, Redirect, Response},
};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, error, info, warn};

use super::extractors::session_token_from_headers;
use super::models::{
    CredentialsRequest, OAuthCallbackParams, ProviderInfo, Session, SignupRequest,
    CREDENTIALS_PROVIDER, OAUTH_STATE_COOKIE, OAUTH_STATE_MAX_AGE_SECS, SESSION_COOKIE,
};
use super::services::{AuthError, UsersService};
use super::session::{
    decode_session_token, issue_session_token, redirect_callback, session_from_claims,
};
use crate::common::helpers::{build_cookie, expire_cookie, read_cookie};
use crate::common::{generate_raw_id, safe_email_log, safe_token_log, ApiError, AppState};
use crate::services::{OAuthError, Provider};

fn callback_url(base_url: &str, provider: &str) -> String {
    format!("{}/api/auth/callback/{}", base_url, provider)
}

/// POST /api/signup
/// Creates a credentials account
///
/// # Request Body
/// ```json
/// { "email": "user@example.com", "password": "secret1" }
/// ```
///
/// # Responses
/// - 201 `{ "message": "User created successfully" }`
/// - 400 `{ "error": "Invalid input" }`
/// - 409 `{ "error": "User already exists" }`
/// - 500 `{ "error": "Server error" }`
pub async fn signup_handler(
    Extension(state_lock): Extension<Arc<RwLock<AppState>>>,
    payload: Result<Json<SignupRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(request) = payload.map_err(|e| {
        debug!(error = %e, "Signup body rejected");
        ApiError::BadRequest("Invalid input".to_string())
    })?;

    let state = state_lock.read().await.clone();

    let user = UsersService::new(state.db.clone())
        .create_credentials_user(request)
        .await
        .map_err(|e| match e {
            ApiError::BadRequest(_) | ApiError::Conflict(_) => e,
            other => {
                error!(error = %other, "Signup Error");
                ApiError::InternalServer("Server error".to_string())
            }
        })?;

    info!(user_id = %user.id, "Signup completed");

    Ok((
        StatusCode::CREATED,
        Json(serde_json::json!({ "message": "User created successfully" })),
    )
        .into_response())
}

/// POST /api/auth/callback/credentials
/// Signs in with email + password and starts a session
///
/// # Response
/// ```json
/// { "token": "<jwt>", "user": { ... }, "url": "<base url>" }
/// ```
pub async fn credentials_callback_handler(
    Extension(state_lock): Extension<Arc<RwLock<AppState>>>,
    payload: Result<Json<CredentialsRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(request) = payload.map_err(|_| ApiError::from(AuthError::InvalidInput))?;
    info!(email = %safe_email_log(&request.email), "🔐 Received credentials sign-in request");

    let state = state_lock.read().await.clone();

    let user = UsersService::new(state.db.clone())
        .authorize_credentials(&request)
        .await?;

    let (token, _claims) = issue_session_token(
        &user,
        &state.config.auth_secret,
        state.config.session_max_age_secs,
    )?;

    info!(
        user_id = %user.id,
        provider = CREDENTIALS_PROVIDER,
        token = %safe_token_log(&token),
        "User authentication successful"
    );

    let cookie = build_cookie(
        SESSION_COOKIE,
        &token,
        state.config.session_max_age_secs,
        state.config.secure_cookies(),
    );
    let url = redirect_callback(request.callback_url.as_deref(), &state.config.base_url);

    let body = serde_json::json!({
        "token": token,
        "user": user,
        "url": url,
    });

    Ok((AppendHeaders([(SET_COOKIE, cookie)]), Json(body)).into_response())
}

/// GET /api/auth/providers
/// Lists the sign-in methods that are available
pub async fn providers_handler(
    Extension(state_lock): Extension<Arc<RwLock<AppState>>>,
) -> Json<Vec<ProviderInfo>> {
    let state = state_lock.read().await;
    let base_url = &state.config.base_url;

    let mut providers = vec![ProviderInfo {
        id: CREDENTIALS_PROVIDER.to_string(),
        name: "Credentials".to_string(),
        provider_type: "credentials".to_string(),
        signin_url: format!("{}/signin", base_url),
        callback_url: callback_url(base_url, CREDENTIALS_PROVIDER),
    }];

    providers.extend(
        state
            .oauth_service
            .configured_providers()
            .into_iter()
            .map(|p| ProviderInfo {
                id: p.as_str().to_string(),
                name: p.display_name().to_string(),
                provider_type: "oauth".to_string(),
                signin_url: format!("{}/api/auth/signin/{}", base_url, p),
                callback_url: callback_url(base_url, p.as_str()),
            }),
    );

    Json(providers)
}

/// GET /api/auth/signin/:provider - Start an OAuth flow
/// Redirects the browser to the provider's consent page
pub async fn oauth_signin_handler(
    Extension(state_lock): Extension<Arc<RwLock<AppState>>>,
    Path(provider): Path<String>,
) -> Result<Response, ApiError> {
    let state = state_lock.read().await.clone();

    let provider: Provider = provider
        .parse()
        .map_err(|_| ApiError::NotFound("Unknown or unconfigured provider".to_string()))?;

    let oauth_state = generate_raw_id(32);
    let redirect_uri = callback_url(&state.config.base_url, provider.as_str());

    let auth_url = state
        .oauth_service
        .authorization_url(provider, &redirect_uri, &oauth_state)
        .map_err(|e| match e {
            OAuthError::NotConfigured(_) => {
                ApiError::NotFound("Unknown or unconfigured provider".to_string())
            }
            other => {
                error!(error = %other, provider = %provider, "Failed to generate OAuth URL");
                ApiError::InternalServer(format!("Failed to generate OAuth URL: {}", other))
            }
        })?;

    info!(provider = %provider, "Starting OAuth flow");

    let cookie = build_cookie(
        OAUTH_STATE_COOKIE,
        &oauth_state,
        OAUTH_STATE_MAX_AGE_SECS,
        state.config.secure_cookies(),
    );
    Ok((AppendHeaders([(SET_COOKIE, cookie)]), Redirect::to(&auth_url)).into_response())
}

fn signin_error_redirect(code: &str) -> Response {
    (
        AppendHeaders([(SET_COOKIE, expire_cookie(OAUTH_STATE_COOKIE))]),
        Redirect::to(&format!("/signin?error={}", urlencoding::encode(code))),
    )
        .into_response()
}

/// GET /api/auth/callback/:provider - Handle the provider's redirect back
///
/// Exchanges the code, runs account linking, starts a session and sends the
/// browser to the base URL. Failures land on `/signin?error=...`.
pub async fn oauth_callback_handler(
    Extension(state_lock): Extension<Arc<RwLock<AppState>>>,
    Path(provider): Path<String>,
    Query(params): Query<OAuthCallbackParams>,
    headers: HeaderMap,
) -> Response {
    let state = state_lock.read().await.clone();

    let provider: Provider = match provider.parse() {
        Ok(p) => p,
        Err(e) => {
            warn!(error = %e, "OAuth callback for unknown provider");
            return signin_error_redirect("OAuthCallback");
        }
    };

    if let Some(error) = params.error.as_deref() {
        warn!(provider = %provider, oauth_error = %error, "OAuth provider returned error");
        return signin_error_redirect("AccessDenied");
    }

    let expected_state = read_cookie(&headers, OAUTH_STATE_COOKIE);
    let state_matches = matches!(
        (expected_state.as_deref(), params.state.as_deref()),
        (Some(expected), Some(received)) if !expected.is_empty() && expected == received
    );
    if !state_matches {
        warn!(provider = %provider, "OAuth state mismatch");
        return signin_error_redirect("OAuthCallback");
    }

    let Some(code) = params.code.as_deref().filter(|c| !c.is_empty()) else {
        warn!(provider = %provider, "No authorization code in OAuth callback");
        return signin_error_redirect("OAuthCallback");
    };

    let redirect_uri = callback_url(&state.config.base_url, provider.as_str());

    let profile = match state
        .oauth_service
        .exchange_code(provider, code, &redirect_uri)
        .await
    {
        Ok(access_token) => state.oauth_service.fetch_profile(provider, &access_token).await,
        Err(e) => Err(e),
    };

    let profile = match profile {
        Ok(profile) => profile,
        Err(e) => {
            error!(error = %e, provider = %provider, "OAuth code exchange failed");
            return signin_error_redirect("OAuthCallback");
        }
    };

    let user = match UsersService::new(state.db.clone())
        .link_oauth_account(&profile)
        .await
    {
        Ok(user) => user,
        Err(AuthError::AccountNotLinked) => return signin_error_redirect("OAuthAccountNotLinked"),
        Err(AuthError::MissingEmail) => {
            warn!(provider = %provider, "OAuth profile has no email");
            return signin_error_redirect("OAuthCallback");
        }
        Err(e) => {
            error!(error = %e, provider = %provider, "Account linking failed");
            return signin_error_redirect("OAuthCallback");
        }
    };

    let token = match issue_session_token(
        &user,
        &state.config.auth_secret,
        state.config.session_max_age_secs,
    ) {
        Ok((token, _)) => token,
        Err(_) => return signin_error_redirect("OAuthCallback"),
    };

    info!(
        user_id = %user.id,
        email = %safe_email_log(&user.email),
        provider = %provider,
        "User authentication successful via OAuth"
    );

    let session_cookie = build_cookie(
        SESSION_COOKIE,
        &token,
        state.config.session_max_age_secs,
        state.config.secure_cookies(),
    );
    let destination = redirect_callback(None, &state.config.base_url);

    (
        AppendHeaders([
            (SET_COOKIE, session_cookie),
            (SET_COOKIE, expire_cookie(OAUTH_STATE_COOKIE)),
        ]),
        Redirect::to(&destination),
    )
        .into_response()
}

/// GET /api/auth/session
/// Returns the current session, or `{}` when nobody is signed in
pub async fn session_handler(
    Extension(state_lock): Extension<Arc<RwLock<AppState>>>,
    headers: HeaderMap,
) -> Json<Session> {
    let state = state_lock.read().await;

    let session = session_token_from_headers(&headers)
        .and_then(|token| decode_session_token(&token, &state.config.auth_secret).ok())
        .map(|claims| session_from_claims(&claims))
        .unwrap_or_default();

    Json(session)
}

/// POST /api/auth/signout
/// Clears the session cookie
pub async fn signout_handler(Extension(state_lock): Extension<Arc<RwLock<AppState>>>) -> Response {
    let state = state_lock.read().await;
    info!("User sign-out");

    (
        AppendHeaders([(SET_COOKIE, expire_cookie(SESSION_COOKIE))]),
        Json(serde_json::json!({ "url": state.config.base_url })),
    )
        .into_response()
}
