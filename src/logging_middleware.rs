// src/logging_middleware.rs
//! Middleware for logging request and response bodies in debug mode

use axum::body::to_bytes;
use axum::{body::Body, extract::Request, http::StatusCode, middleware::Next, response::Response};
use serde_json::Value;
use tracing::{debug, enabled, Level};

/// Field names whose values never reach the logs
const REDACTED_FIELDS: &[&str] = &["password", "token", "access_token", "client_secret"];

/// Replaces sensitive values anywhere in a JSON document
pub fn redact_json(value: &mut Value) {
    match value {
        Value::Object(map) => {
            for (key, v) in map.iter_mut() {
                if REDACTED_FIELDS.contains(&key.to_ascii_lowercase().as_str()) {
                    *v = Value::String("[REDACTED]".to_string());
                } else {
                    redact_json(v);
                }
            }
        }
        Value::Array(items) => items.iter_mut().for_each(redact_json),
        _ => {}
    }
}

fn loggable_body(bytes: &[u8]) -> Option<String> {
    if bytes.is_empty() {
        return None;
    }
    let body_str = std::str::from_utf8(bytes).ok()?;
    match serde_json::from_str::<Value>(body_str) {
        Ok(mut json) => {
            redact_json(&mut json);
            Some(serde_json::to_string_pretty(&json).unwrap_or_else(|_| "<json>".to_string()))
        }
        // Non-JSON bodies (pages) are summarized, not dumped
        Err(_) => Some(format!("<{} bytes>", bytes.len())),
    }
}

/// Middleware to log request and response bodies in debug mode
pub async fn log_request_response(request: Request, next: Next) -> Result<Response, StatusCode> {
    if !enabled!(Level::DEBUG) {
        return Ok(next.run(request).await);
    }

    let (parts, body) = request.into_parts();

    let bytes = to_bytes(body, usize::MAX)
        .await
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;

    if let Some(request_body) = loggable_body(&bytes) {
        debug!(
            method = %parts.method,
            uri = %parts.uri,
            request_body = %request_body,
            "📥 Request"
        );
    }

    let request = Request::from_parts(parts, Body::from(bytes));
    let response = next.run(request).await;

    let (parts, body) = response.into_parts();

    let bytes = to_bytes(body, usize::MAX)
        .await
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;

    if let Some(response_body) = loggable_body(&bytes) {
        debug!(
            status = %parts.status,
            response_body = %response_body,
            "📤 Response"
        );
    }

    Ok(Response::from_parts(parts, Body::from(bytes)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_redacts_password_fields() {
        let mut body = json!({
            "email": "a@b.co",
            "password": "secret1",
            "nested": [{ "Password": "x" }],
        });
        redact_json(&mut body);
        assert_eq!(body["email"], "a@b.co");
        assert_eq!(body["password"], "[REDACTED]");
        assert_eq!(body["nested"][0]["Password"], "[REDACTED]");
    }

    #[test]
    fn test_redacts_tokens_in_responses() {
        let rendered = loggable_body(br#"{"token":"eyJhbGciOi","url":"/"}"#).unwrap();
        assert!(!rendered.contains("eyJhbGciOi"));
        assert!(rendered.contains("[REDACTED]"));
    }

    #[test]
    fn test_html_is_summarized() {
        assert_eq!(loggable_body(b"<html></html>").unwrap(), "<13 bytes>");
        assert!(loggable_body(b"").is_none());
    }
}
