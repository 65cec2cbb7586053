// rate_limit_middleware.rs
use crate::services::rate_limit::{RateLimitResult, RateLimitService, RateScope};
use axum::{
    extract::{ConnectInfo, Extension, Request},
    http::{header::RETRY_AFTER, HeaderMap, HeaderValue, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{debug, warn};

#[derive(Serialize)]
struct RateLimitErrorResponse {
    error: String,
    code: String,
    retry_after: u32,
}

/// Extract the client IP address from the request.
///
/// Forwarded headers are only honoured when `trust_proxy_headers` is set;
/// otherwise any client could pick its own key, or claim a whitelisted one.
fn extract_ip_address(
    headers: &HeaderMap,
    connect_info: Option<&ConnectInfo<SocketAddr>>,
    trust_proxy_headers: bool,
) -> Option<String> {
    let peer = connect_info.map(|info| info.0.ip().to_string());
    if !trust_proxy_headers {
        return peer;
    }

    // Take the first IP in the chain
    if let Some(forwarded) = headers.get("x-forwarded-for") {
        if let Ok(forwarded_str) = forwarded.to_str() {
            if let Some(first_ip) = forwarded_str.split(',').next() {
                let first_ip = first_ip.trim();
                if !first_ip.is_empty() {
                    return Some(first_ip.to_string());
                }
            }
        }
    }

    if let Some(real_ip) = headers.get("x-real-ip") {
        if let Ok(ip_str) = real_ip.to_str() {
            let ip_str = ip_str.trim();
            if !ip_str.is_empty() {
                return Some(ip_str.to_string());
            }
        }
    }

    peer
}

fn too_many_requests(retry_after: u32) -> Response {
    let error_response = RateLimitErrorResponse {
        error: "Rate limit exceeded. Please try again later.".to_string(),
        code: "RATE_LIMIT_EXCEEDED".to_string(),
        retry_after,
    };

    let mut response = (StatusCode::TOO_MANY_REQUESTS, Json(error_response)).into_response();
    if let Ok(retry_header) = HeaderValue::from_str(&retry_after.to_string()) {
        response.headers_mut().insert(RETRY_AFTER, retry_header);
    }
    response
}

/// Rate limiting middleware
///
/// Credential submissions draw from the tighter auth budget; everything else
/// from the general per-IP budget.
pub async fn rate_limit_middleware(
    Extension(rate_limit_service): Extension<Arc<RateLimitService>>,
    connect_info: Option<ConnectInfo<SocketAddr>>,
    request: Request,
    next: Next,
) -> Response {
    let ip_address = extract_ip_address(
        request.headers(),
        connect_info.as_ref(),
        rate_limit_service.config().trust_proxy_headers,
    )
    .unwrap_or_else(|| "unknown".to_string());
    let path = request.uri().path().to_string();
    let scope = RateScope::for_request(request.method(), &path);

    match rate_limit_service.check_rate_limit(&ip_address, scope).await {
        RateLimitResult::Allowed => {
            debug!(ip = %ip_address, path = %path, scope = ?scope, "Request allowed by rate limiter");
            next.run(request).await
        }
        RateLimitResult::Limited { retry_after } => {
            warn!(
                ip = %ip_address,
                path = %path,
                scope = ?scope,
                retry_after = retry_after,
                "Request blocked by rate limiter"
            );
            rate_limit_service.log_violation(&ip_address, &path);
            too_many_requests(retry_after)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::rate_limit::RateLimitConfig;
    use axum::http::HeaderMap;

    fn peer(addr: &str) -> ConnectInfo<SocketAddr> {
        ConnectInfo(addr.parse().unwrap())
    }

    fn spoofed_headers() -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", "127.0.0.1".parse().unwrap());
        headers.insert("x-real-ip", "127.0.0.1".parse().unwrap());
        headers
    }

    #[test]
    fn test_extract_ip_from_x_forwarded_for_when_trusted() {
        let mut headers = HeaderMap::new();
        headers.insert(
            "x-forwarded-for",
            "203.0.113.1, 198.51.100.1".parse().unwrap(),
        );

        let ip = extract_ip_address(&headers, Some(&peer("10.0.0.2:443")), true);
        assert_eq!(ip, Some("203.0.113.1".to_string()));
    }

    #[test]
    fn test_extract_ip_from_x_real_ip_when_trusted() {
        let mut headers = HeaderMap::new();
        headers.insert("x-real-ip", "203.0.113.1".parse().unwrap());

        let ip = extract_ip_address(&headers, None, true);
        assert_eq!(ip, Some("203.0.113.1".to_string()));
    }

    #[test]
    fn test_forwarded_headers_ignored_by_default() {
        let ip = extract_ip_address(&spoofed_headers(), Some(&peer("203.0.113.9:5555")), false);
        assert_eq!(ip, Some("203.0.113.9".to_string()));

        assert_eq!(extract_ip_address(&spoofed_headers(), None, false), None);
    }

    #[test]
    fn test_extract_ip_from_connection() {
        let ip = extract_ip_address(&HeaderMap::new(), Some(&peer("198.51.100.9:5555")), true);
        assert_eq!(ip, Some("198.51.100.9".to_string()));
    }

    #[tokio::test]
    async fn test_remote_client_claiming_loopback_is_still_limited() {
        let service = RateLimitService::new(RateLimitConfig {
            auth_limit: 2,
            ..RateLimitConfig::default()
        });
        let ip = extract_ip_address(
            &spoofed_headers(),
            Some(&peer("203.0.113.9:5555")),
            service.config().trust_proxy_headers,
        )
        .unwrap();

        let mut allowed = 0;
        for _ in 0..50 {
            if service.check_rate_limit(&ip, RateScope::Auth).await == RateLimitResult::Allowed {
                allowed += 1;
            }
        }
        assert_eq!(allowed, 2);
    }

    #[test]
    fn test_limited_response_carries_retry_after() {
        let response = too_many_requests(17);
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(response.headers().get(RETRY_AFTER).unwrap(), "17");
    }
}
