//! Tests for page handlers

#[cfg(test)]
mod tests {
    use super::super::handlers::*;
    use crate::auth::models::Claims;
    use crate::auth::AuthedUser;
    use crate::common::state::test_state;
    use axum::{
        body::to_bytes,
        extract::{Extension, Query},
        http::{header::LOCATION, StatusCode},
    };

    fn authed(name: Option<&str>) -> AuthedUser {
        AuthedUser {
            id: "U_1".to_string(),
            email: "ada@b.co".to_string(),
            name: name.map(str::to_string),
            image: None,
            claims: Claims {
                sub: "U_1".to_string(),
                id: Some("U_1".to_string()),
                name: name.map(str::to_string),
                email: Some("ada@b.co".to_string()),
                picture: None,
                iat: 0,
                exp: 9999999999,
                jti: "j".to_string(),
            },
        }
    }

    async fn body_text(response: axum::response::Response) -> String {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn test_home_redirects_anonymous_to_signin() {
        let state = test_state().await;
        let response = home_page(Extension(state), None).await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(response.headers().get(LOCATION).unwrap(), "/signin");
    }

    #[tokio::test]
    async fn test_home_renders_for_signed_in_user() {
        // no catalog key configured: empty grid, page still renders
        let state = test_state().await;
        let response = home_page(Extension(state), Some(authed(Some("Ada")))).await;
        assert_eq!(response.status(), StatusCode::OK);

        let html = body_text(response).await;
        assert!(html.contains(r#"<div class="avatar">A</div>"#));
        assert!(html.contains("No tracks available"));
    }

    #[tokio::test]
    async fn test_auth_pages_redirect_signed_in_users_home() {
        let state = test_state().await;

        let response = signin_page(
            Extension(state),
            Some(authed(None)),
            Query(SigninQuery::default()),
        )
        .await;
        assert_eq!(response.headers().get(LOCATION).unwrap(), "/");

        let response = signup_page(Some(authed(None))).await;
        assert_eq!(response.headers().get(LOCATION).unwrap(), "/");
    }

    #[tokio::test]
    async fn test_signin_page_renders_form() {
        let state = test_state().await;
        let response = signin_page(
            Extension(state),
            None,
            Query(SigninQuery {
                error: Some("AccessDenied".to_string()),
            }),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);

        let html = body_text(response).await;
        assert!(html.contains(r#"id="signin-form""#));
        assert!(html.contains("Access was denied"));
    }

    #[tokio::test]
    async fn test_tracks_endpoint_returns_empty_results_when_catalog_unavailable() {
        let state = test_state().await;
        let body = tracks_handler(Extension(state), authed(None)).await.0;
        assert_eq!(body, serde_json::json!({ "results": [] }));
    }
}
