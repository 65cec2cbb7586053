//! Tests for auth module
//!
//! These tests verify core authentication functionality including:
//! - Signup status codes and stored password hashes
//! - Credential sign-in failures and session issuance
//! - OAuth account linking by email
//! - jwt / session / redirect callbacks

#[cfg(test)]
mod tests {
    use super::super::*;
    use axum::{
        body::to_bytes,
        extract::{Extension, Json},
        http::{header::COOKIE, header::SET_COOKIE, HeaderMap, HeaderValue, StatusCode},
        response::IntoResponse,
    };
    use crate::common::migrations::run_migrations;
    use crate::common::state::test_state;
    use crate::common::{generate_account_id, generate_user_id};
    use std::collections::VecDeque;
    use crate::services::{OAuthProfile, Provider};
    use models::{Claims, CredentialsRequest, SignupRequest, SESSION_COOKIE};
    use services::{AuthError, UsersService};
    use session::{decode_session_token, jwt_callback, redirect_callback, session_callback};

    fn signup(email: &str, password: &str) -> SignupRequest {
        SignupRequest {
            email: email.to_string(),
            password: password.to_string(),
        }
    }

    fn credentials(email: &str, password: &str) -> CredentialsRequest {
        CredentialsRequest {
            email: email.to_string(),
            password: password.to_string(),
            callback_url: None,
        }
    }

    fn github_profile(id: &str, email: &str) -> OAuthProfile {
        OAuthProfile {
            provider: Provider::GitHub,
            provider_account_id: id.to_string(),
            email: Some(email.to_string()),
            name: Some("Octo Cat".to_string()),
            image: Some("https://avatars.example/octo.png".to_string()),
        }
    }

    /// Hands out the given ids first, then fresh ones
    fn ids(fixed: &[&str], fresh: fn() -> String) -> impl FnMut() -> String + Send {
        let mut queue: VecDeque<String> = fixed.iter().map(|s| s.to_string()).collect();
        move || queue.pop_front().unwrap_or_else(fresh)
    }

    /// File-backed pool so transactions really run on separate connections
    async fn file_pool() -> (sqlx::SqlitePool, std::path::PathBuf) {
        use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};

        let path = std::env::temp_dir().join(format!("groove-test-{}.db", uuid::Uuid::new_v4()));
        let options = SqliteConnectOptions::new()
            .filename(&path)
            .create_if_missing(true)
            .busy_timeout(std::time::Duration::from_secs(10));
        let db = SqlitePoolOptions::new()
            .max_connections(8)
            .connect_with(options)
            .await
            .unwrap();
        run_migrations(&db).await.unwrap();
        (db, path)
    }

    async fn count(db: &sqlx::SqlitePool, sql: &str) -> i64 {
        let (n,): (i64,) = sqlx::query_as(sql).fetch_one(db).await.unwrap();
        n
    }

    async fn body_json(response: axum::response::Response) -> serde_json::Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_signup_creates_user_with_bcrypt_hash() {
        let state = test_state().await;

        let response =
            handlers::signup_handler(Extension(state.clone()), Ok(Json(signup("a@b.co", "secret1"))))
                .await
                .into_response();
        assert_eq!(response.status(), StatusCode::CREATED);
        assert_eq!(
            body_json(response).await["message"],
            "User created successfully"
        );

        let db = state.read().await.db.clone();
        let user = UsersService::new(db).find_by_email("a@b.co").await.unwrap().unwrap();
        let hash = user.password_hash.unwrap();
        assert_ne!(hash, "secret1");
        assert!(bcrypt::verify("secret1", &hash).unwrap());
    }

    #[tokio::test]
    async fn test_signup_duplicate_email_is_conflict() {
        let state = test_state().await;

        let first =
            handlers::signup_handler(Extension(state.clone()), Ok(Json(signup("a@b.co", "secret1"))))
                .await
                .into_response();
        assert_eq!(first.status(), StatusCode::CREATED);

        let second =
            handlers::signup_handler(Extension(state.clone()), Ok(Json(signup("a@b.co", "another"))))
                .await
                .into_response();
        assert_eq!(second.status(), StatusCode::CONFLICT);
        assert_eq!(body_json(second).await["error"], "User already exists");

        let db = state.read().await.db.clone();
        assert_eq!(count(&db, "SELECT COUNT(*) FROM users").await, 1);
    }

    #[tokio::test]
    async fn test_signup_rejects_invalid_input() {
        let state = test_state().await;

        for (email, password) in [("a@b.co", "12345"), ("not-an-email", "secret1"), ("", "")] {
            let response =
                handlers::signup_handler(Extension(state.clone()), Ok(Json(signup(email, password))))
                    .await
                    .into_response();
            assert_eq!(response.status(), StatusCode::BAD_REQUEST);
            assert_eq!(body_json(response).await["error"], "Invalid input");
        }

        let db = state.read().await.db.clone();
        assert_eq!(count(&db, "SELECT COUNT(*) FROM users").await, 0);
    }

    #[tokio::test]
    async fn test_password_of_exactly_six_chars_is_accepted() {
        let state = test_state().await;
        let response =
            handlers::signup_handler(Extension(state.clone()), Ok(Json(signup("six@b.co", "123456"))))
                .await
                .into_response();
        assert_eq!(response.status(), StatusCode::CREATED);
    }

    #[tokio::test]
    async fn test_credentials_failures() {
        let state = test_state().await;
        let db = state.read().await.db.clone();
        let users = UsersService::new(db);

        users
            .create_credentials_user(signup("a@b.co", "secret1"))
            .await
            .unwrap();
        users
            .link_oauth_account(&github_profile("42", "oauth-only@b.co"))
            .await
            .unwrap();

        assert!(matches!(
            users.authorize_credentials(&credentials("a@b.co", "wrong-pass")).await,
            Err(AuthError::IncorrectPassword)
        ));
        assert!(matches!(
            users.authorize_credentials(&credentials("nobody@b.co", "secret1")).await,
            Err(AuthError::UserNotFound)
        ));
        assert!(matches!(
            users.authorize_credentials(&credentials("oauth-only@b.co", "secret1")).await,
            Err(AuthError::UserNotFound)
        ));
        assert!(matches!(
            users.authorize_credentials(&credentials("a@b.co", "123")).await,
            Err(AuthError::InvalidInput)
        ));
    }

    #[tokio::test]
    async fn test_credentials_sign_in_issues_token_with_user_id() {
        let state = test_state().await;
        let db = state.read().await.db.clone();
        let user = UsersService::new(db)
            .create_credentials_user(signup("a@b.co", "secret1"))
            .await
            .unwrap();

        let mut request = credentials("a@b.co", "secret1");
        request.callback_url = Some("https://evil.example/steal".to_string());

        let response = handlers::credentials_callback_handler(Extension(state.clone()), Ok(Json(request)))
            .await
            .into_response();
        assert_eq!(response.status(), StatusCode::OK);

        let cookie = response
            .headers()
            .get(SET_COOKIE)
            .and_then(|v| v.to_str().ok())
            .unwrap()
            .to_string();
        assert!(cookie.starts_with(&format!("{}=", SESSION_COOKIE)));
        assert!(cookie.contains("HttpOnly"));

        let body = body_json(response).await;
        assert_eq!(body["url"], "http://localhost:8080");
        assert_eq!(body["user"]["email"], "a@b.co");

        let claims = decode_session_token(body["token"].as_str().unwrap(), "test_secret_key").unwrap();
        assert_eq!(claims.id.as_deref(), Some(user.id.as_str()));
    }

    #[tokio::test]
    async fn test_credentials_wrong_password_is_unauthorized() {
        let state = test_state().await;
        let db = state.read().await.db.clone();
        UsersService::new(db)
            .create_credentials_user(signup("a@b.co", "secret1"))
            .await
            .unwrap();

        let response = handlers::credentials_callback_handler(
            Extension(state.clone()),
            Ok(Json(credentials("a@b.co", "nope-nope"))),
        )
        .await
        .into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(body_json(response).await["error"], "Incorrect password");
    }

    #[tokio::test]
    async fn test_oauth_first_sign_in_creates_user_and_account() {
        let state = test_state().await;
        let db = state.read().await.db.clone();
        let users = UsersService::new(db.clone());

        let user = users
            .link_oauth_account(&github_profile("1001", "octo@b.co"))
            .await
            .unwrap();
        assert_eq!(user.email, "octo@b.co");
        assert_eq!(user.name.as_deref(), Some("Octo Cat"));

        let stored = users.find_by_id(&user.id).await.unwrap().unwrap();
        assert!(stored.password_hash.is_none());

        let accounts = users.accounts_for_user(&user.id).await.unwrap();
        assert_eq!(accounts.len(), 1);
        assert_eq!(accounts[0].provider, "github");
        assert_eq!(accounts[0].provider_account_id, "1001");
    }

    #[tokio::test]
    async fn test_oauth_repeated_sign_in_is_idempotent() {
        let state = test_state().await;
        let db = state.read().await.db.clone();
        let users = UsersService::new(db.clone());

        let first = users
            .link_oauth_account(&github_profile("1001", "octo@b.co"))
            .await
            .unwrap();
        let second = users
            .link_oauth_account(&github_profile("1001", "octo@b.co"))
            .await
            .unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(count(&db, "SELECT COUNT(*) FROM users").await, 1);
        assert_eq!(count(&db, "SELECT COUNT(*) FROM accounts").await, 1);
    }

    #[tokio::test]
    async fn test_oauth_links_to_existing_credentials_user() {
        let state = test_state().await;
        let db = state.read().await.db.clone();
        let users = UsersService::new(db.clone());

        let created = users
            .create_credentials_user(signup("a@b.co", "secret1"))
            .await
            .unwrap();

        let google = OAuthProfile {
            provider: Provider::Google,
            provider_account_id: "g-77".to_string(),
            email: Some("a@b.co".to_string()),
            name: None,
            image: None,
        };
        let linked = users.link_oauth_account(&google).await.unwrap();
        let also_linked = users
            .link_oauth_account(&github_profile("1001", "a@b.co"))
            .await
            .unwrap();

        assert_eq!(linked.id, created.id);
        assert_eq!(also_linked.id, created.id);
        assert_eq!(users.accounts_for_user(&created.id).await.unwrap().len(), 2);

        // credentials keep working after linking
        assert!(users
            .authorize_credentials(&credentials("a@b.co", "secret1"))
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn test_oauth_second_identity_for_same_provider_is_rejected() {
        let state = test_state().await;
        let db = state.read().await.db.clone();
        let users = UsersService::new(db.clone());

        users
            .link_oauth_account(&github_profile("1001", "octo@b.co"))
            .await
            .unwrap();

        assert!(matches!(
            users.link_oauth_account(&github_profile("2002", "octo@b.co")).await,
            Err(AuthError::AccountNotLinked)
        ));
        assert_eq!(count(&db, "SELECT COUNT(*) FROM accounts").await, 1);
    }

    #[tokio::test]
    async fn test_oauth_profile_without_email_is_rejected() {
        let state = test_state().await;
        let db = state.read().await.db.clone();
        let mut profile = github_profile("1001", "");
        profile.email = None;

        assert!(matches!(
            UsersService::new(db).link_oauth_account(&profile).await,
            Err(AuthError::MissingEmail)
        ));
    }

    #[test]
    fn test_redirect_callback_ignores_requested_url() {
        assert_eq!(
            redirect_callback(Some("https://evil.example"), "http://localhost:8080"),
            "http://localhost:8080"
        );
        assert_eq!(redirect_callback(None, "https://groove.app"), "https://groove.app");
    }

    #[test]
    fn test_jwt_and_session_callbacks() {
        let token = Claims {
            sub: "U_1".to_string(),
            id: None,
            name: None,
            email: Some("a@b.co".to_string()),
            picture: None,
            iat: 0,
            exp: 9999999999,
            jti: "j".to_string(),
        };

        // no user: token passes through unchanged
        assert_eq!(jwt_callback(token.clone(), None), token);

        let user = AuthUser {
            id: "U_1".to_string(),
            name: None,
            email: "a@b.co".to_string(),
            image: None,
        };
        let token = jwt_callback(token, Some(&user));
        assert_eq!(token.id.as_deref(), Some("U_1"));

        let session = session_callback(
            Session {
                user: Some(models::SessionUser::default()),
                expires: None,
            },
            &token,
        );
        assert_eq!(session.user.unwrap().id.as_deref(), Some("U_1"));

        // nobody signed in: nothing to decorate
        assert_eq!(session_callback(Session::default(), &token), Session::default());
    }

    #[tokio::test]
    async fn test_session_endpoint() {
        let state = test_state().await;

        let empty = handlers::session_handler(Extension(state.clone()), HeaderMap::new()).await;
        assert_eq!(serde_json::to_value(&empty.0).unwrap(), serde_json::json!({}));

        let user = AuthUser {
            id: "U_1".to_string(),
            name: Some("Ada".to_string()),
            email: "ada@b.co".to_string(),
            image: None,
        };
        let (token, _) = session::issue_session_token(&user, "test_secret_key", 3600).unwrap();

        let mut headers = HeaderMap::new();
        headers.insert(
            COOKIE,
            HeaderValue::from_str(&format!("{}={}", SESSION_COOKIE, token)).unwrap(),
        );
        let session = handlers::session_handler(Extension(state.clone()), headers).await.0;
        let session_user = session.user.unwrap();
        assert_eq!(session_user.id.as_deref(), Some("U_1"));
        assert_eq!(session_user.name.as_deref(), Some("Ada"));
        assert!(session.expires.is_some());
    }

    #[tokio::test]
    async fn test_session_rejects_token_signed_with_other_secret() {
        let state = test_state().await;
        let user = AuthUser {
            id: "U_1".to_string(),
            name: None,
            email: "a@b.co".to_string(),
            image: None,
        };
        let (token, _) = session::issue_session_token(&user, "wrong_secret_key", 3600).unwrap();

        let mut headers = HeaderMap::new();
        headers.insert(
            axum::http::header::AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {}", token)).unwrap(),
        );
        let session = handlers::session_handler(Extension(state), headers).await.0;
        assert_eq!(session, Session::default());
    }

    #[tokio::test]
    async fn test_signout_expires_cookie() {
        let state = test_state().await;
        let response = handlers::signout_handler(Extension(state)).await;

        let cookie = response
            .headers()
            .get(SET_COOKIE)
            .and_then(|v| v.to_str().ok())
            .unwrap()
            .to_string();
        assert!(cookie.starts_with(&format!("{}=;", SESSION_COOKIE)));
        assert!(cookie.contains("Max-Age=0"));
    }

    #[tokio::test]
    async fn test_providers_lists_credentials_only_when_oauth_unconfigured() {
        let state = test_state().await;
        let providers = handlers::providers_handler(Extension(state)).await.0;
        assert_eq!(providers.len(), 1);
        assert_eq!(providers[0].id, "credentials");
    }

    #[tokio::test]
    async fn test_oauth_signin_unknown_provider_is_not_found() {
        let state = test_state().await;
        let result = handlers::oauth_signin_handler(
            Extension(state.clone()),
            axum::extract::Path("myspace".to_string()),
        )
        .await;
        assert!(matches!(result, Err(ref e) if e.status() == StatusCode::NOT_FOUND));

        // known but unconfigured
        let result =
            handlers::oauth_signin_handler(Extension(state), axum::extract::Path("github".to_string()))
                .await;
        assert!(matches!(result, Err(ref e) if e.status() == StatusCode::NOT_FOUND));
    }

    #[tokio::test]
    async fn test_oauth_callback_state_mismatch_redirects_to_signin() {
        let state = test_state().await;
        let params = models::OAuthCallbackParams {
            code: Some("abc".to_string()),
            state: Some("forged".to_string()),
            error: None,
        };
        let response = handlers::oauth_callback_handler(
            Extension(state),
            axum::extract::Path("github".to_string()),
            axum::extract::Query(params),
            HeaderMap::new(),
        )
        .await;

        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(
            response.headers().get(axum::http::header::LOCATION).unwrap(),
            "/signin?error=OAuthCallback"
        );
    }

    #[tokio::test]
    async fn test_signup_id_collision_is_retried_not_conflict() {
        let state = test_state().await;
        let db = state.read().await.db.clone();
        let users = UsersService::new(db.clone());

        users
            .create_credentials_user_with(
                signup("first@b.co", "secret1"),
                ids(&["U_TAKEN"], generate_user_id),
            )
            .await
            .unwrap();

        let second = users
            .create_credentials_user_with(
                signup("second@b.co", "secret1"),
                ids(&["U_TAKEN", "U_FRESH"], generate_user_id),
            )
            .await;
        assert!(matches!(second, Ok(ref user) if user.id == "U_FRESH"));
        assert_eq!(count(&db, "SELECT COUNT(*) FROM users").await, 2);

        // a real duplicate email is still a conflict
        let duplicate = users
            .create_credentials_user_with(
                signup("second@b.co", "secret1"),
                ids(&[], generate_user_id),
            )
            .await;
        assert!(matches!(duplicate, Err(ref e) if e.status() == StatusCode::CONFLICT));
    }

    #[tokio::test]
    async fn test_oauth_id_collisions_are_retried() {
        let state = test_state().await;
        let db = state.read().await.db.clone();
        let users = UsersService::new(db.clone());

        users
            .link_oauth_account_with(
                &github_profile("1001", "octo@b.co"),
                ids(&["U_TAKEN"], generate_user_id),
                ids(&["A_TAKEN"], generate_account_id),
            )
            .await
            .unwrap();

        let other = users
            .link_oauth_account_with(
                &github_profile("2002", "other@b.co"),
                ids(&["U_TAKEN", "U_FRESH"], generate_user_id),
                ids(&["A_TAKEN", "A_FRESH"], generate_account_id),
            )
            .await
            .unwrap();

        assert_eq!(other.id, "U_FRESH");
        let accounts = users.accounts_for_user("U_FRESH").await.unwrap();
        assert_eq!(accounts.len(), 1);
        assert_eq!(accounts[0].id, "A_FRESH");
        assert_eq!(accounts[0].provider_account_id, "2002");
    }

    #[tokio::test]
    async fn test_reused_identity_with_new_email_leaves_no_orphan_user() {
        let state = test_state().await;
        let db = state.read().await.db.clone();
        let users = UsersService::new(db.clone());

        let original = users
            .link_oauth_account(&github_profile("1001", "octo@b.co"))
            .await
            .unwrap();

        // same GitHub identity, email changed at the provider
        for round in 0..5 {
            let email = format!("renamed{}@b.co", round);
            let signed_in = users
                .link_oauth_account(&github_profile("1001", &email))
                .await
                .unwrap();
            assert_eq!(signed_in.id, original.id);
            assert!(users.find_by_email(&email).await.unwrap().is_none());
        }

        assert_eq!(count(&db, "SELECT COUNT(*) FROM users").await, 1);
        assert_eq!(count(&db, "SELECT COUNT(*) FROM accounts").await, 1);

        // the email stays free for a credentials signup
        assert!(users
            .create_credentials_user(signup("renamed0@b.co", "secret1"))
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn test_concurrent_first_sign_ins_converge_on_one_user() {
        let (db, path) = file_pool().await;
        let users = UsersService::new(db.clone());

        for round in 0..10 {
            let email = format!("race{}@b.co", round);
            let github = github_profile(&format!("gh-{}", round), &email);
            let google = OAuthProfile {
                provider: Provider::Google,
                provider_account_id: format!("g-{}", round),
                email: Some(email.clone()),
                name: None,
                image: None,
            };

            let (a, b) = tokio::join!(
                users.link_oauth_account(&github),
                users.link_oauth_account(&google)
            );
            let (a, b) = (a.unwrap(), b.unwrap());
            assert_eq!(a.id, b.id);
            assert_eq!(users.accounts_for_user(&a.id).await.unwrap().len(), 2);
        }

        assert_eq!(count(&db, "SELECT COUNT(*) FROM users").await, 10);
        assert_eq!(count(&db, "SELECT COUNT(*) FROM accounts").await, 20);

        db.close().await;
        for suffix in ["", "-wal", "-shm", "-journal"] {
            let _ = std::fs::remove_file(format!("{}{}", path.display(), suffix));
        }
    }
}
