//! Audit logging middleware.
//!
//! Every `/api` call is recorded in the `audit_logs` table: who made it,
//! what was sent, what came back and how long it took. The row is written on
//! a spawned task after a short delay so the response is never held up by
//! the insert, and a failed insert only produces a warning.

use axum::{
    body::{to_bytes, Body},
    extract::{Request, State},
    http::{header, HeaderMap, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use chrono::Utc;
use sea_orm::{ActiveModelTrait, Set};
use serde_json::Value;
use std::{sync::Arc, time::Duration, time::Instant};
use tracing::{debug, warn};

use crate::{auth::AuthUser, db::DbPool, entities::audit_log, tracing::log_slow_request};

/// Upper bound on bodies buffered for auditing.
const MAX_BUFFERED_BODY: usize = 16 * 1024 * 1024;
const TRUNCATION_MARKER: &str = "... [truncated]";
const REDACTED: &str = "[REDACTED]";
const SLOW_REQUEST_THRESHOLD: Duration = Duration::from_secs(2);

/// Shared state for the audit middleware.
#[derive(Clone)]
pub struct AuditLogger {
    db: Arc<DbPool>,
    flush_delay: Duration,
    body_limit: usize,
}

impl AuditLogger {
    pub fn new(db: Arc<DbPool>, flush_delay: Duration, body_limit: usize) -> Self {
        Self {
            db,
            flush_delay,
            body_limit,
        }
    }

    fn spawn_write(&self, entry: audit_log::ActiveModel) {
        let db = self.db.clone();
        let delay = self.flush_delay;
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if let Err(e) = entry.insert(db.as_ref()).await {
                warn!(error = %e, "failed to persist audit log");
            }
        });
    }
}

pub async fn audit_middleware(
    State(logger): State<AuditLogger>,
    req: Request,
    next: Next,
) -> Response {
    let path = req.uri().path().to_string();
    if !path.starts_with("/api") {
        return next.run(req).await;
    }

    let start = Instant::now();
    let method = req.method().to_string();
    let client_ip = client_ip(req.headers());
    let user_agent = req
        .headers()
        .get(header::USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .map(String::from);

    let (req, request_body) = if is_multipart(req.headers()) {
        (req, None)
    } else {
        let (parts, body) = req.into_parts();
        let bytes = match to_bytes(body, MAX_BUFFERED_BODY).await {
            Ok(bytes) => bytes,
            Err(_) => {
                return (
                    StatusCode::PAYLOAD_TOO_LARGE,
                    Json(serde_json::json!({ "error": "request body too large" })),
                )
                    .into_response();
            }
        };
        let captured = (!bytes.is_empty())
            .then(|| truncate(&redact_body(&bytes), logger.body_limit));
        (Request::from_parts(parts, Body::from(bytes)), captured)
    };

    let response = next.run(req).await;
    let status = response.status();
    let user = response.extensions().get::<AuthUser>().cloned();

    let (response, response_body, error_message) = if path.contains("/invoice") {
        (response, None, None)
    } else {
        let (parts, body) = response.into_parts();
        match to_bytes(body, MAX_BUFFERED_BODY).await {
            Ok(bytes) => {
                let text = String::from_utf8_lossy(&bytes).into_owned();
                let error_message = if status.is_client_error() || status.is_server_error() {
                    error_from_body(&text)
                } else {
                    None
                };
                let captured = (!text.is_empty()).then(|| truncate(&text, logger.body_limit));
                (
                    Response::from_parts(parts, Body::from(bytes)),
                    captured,
                    error_message,
                )
            }
            Err(e) => {
                warn!(error = %e, "could not buffer response body for audit");
                (
                    Response::from_parts(parts, Body::empty()),
                    None,
                    Some(e.to_string()),
                )
            }
        }
    };

    let elapsed = start.elapsed();
    log_slow_request(&method, &path, elapsed, SLOW_REQUEST_THRESHOLD);

    let entry = audit_log::ActiveModel {
        user_id: Set(user.as_ref().map(|u| u.user_id)),
        employee_id: Set(user.as_ref().and_then(|u| u.employee_id())),
        role: Set(user.as_ref().map(|u| u.role.to_string())),
        action: Set(format!("{} {}", method, path)),
        endpoint: Set(path.clone()),
        method: Set(method),
        status_code: Set(i32::from(status.as_u16())),
        ip_address: Set(client_ip),
        user_agent: Set(user_agent),
        request_body: Set(request_body),
        response_body: Set(response_body),
        duration_ms: Set(elapsed.as_millis() as i64),
        error_message: Set(error_message),
        created_at: Set(Utc::now()),
        ..Default::default()
    };
    debug!(endpoint = %path, status = status.as_u16(), "queueing audit log");
    logger.spawn_write(entry);

    response
}

fn is_multipart(headers: &HeaderMap) -> bool {
    headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|ct| ct.starts_with("multipart/"))
        .unwrap_or(false)
}

/// First `x-forwarded-for` hop, then `x-real-ip`.
fn client_ip(headers: &HeaderMap) -> Option<String> {
    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.split(',').next())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .or_else(|| {
            headers
                .get("x-real-ip")
                .and_then(|v| v.to_str().ok())
                .map(String::from)
        })
}

/// JSON bodies get password fields masked; anything else is kept as text.
fn redact_body(bytes: &[u8]) -> String {
    match serde_json::from_slice::<Value>(bytes) {
        Ok(mut value) => {
            redact_passwords(&mut value);
            value.to_string()
        }
        Err(_) => String::from_utf8_lossy(bytes).into_owned(),
    }
}

fn redact_passwords(value: &mut Value) {
    match value {
        Value::Object(map) => {
            for (key, v) in map.iter_mut() {
                if key.to_ascii_lowercase().contains("password") {
                    *v = Value::String(REDACTED.into());
                } else {
                    redact_passwords(v);
                }
            }
        }
        Value::Array(items) => items.iter_mut().for_each(redact_passwords),
        _ => {}
    }
}

fn truncate(text: &str, limit: usize) -> String {
    if text.chars().count() <= limit {
        return text.to_string();
    }
    let mut out: String = text.chars().take(limit).collect();
    out.push_str(TRUNCATION_MARKER);
    out
}

fn error_from_body(text: &str) -> Option<String> {
    serde_json::from_str::<Value>(text)
        .ok()?
        .get("error")?
        .as_str()
        .map(String::from)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn passwords_are_redacted_at_any_depth() {
        let body = br#"{"email":"a@b.c","password":"hunter2","nested":{"new_password":"x"}}"#;
        let redacted = redact_body(body);
        assert!(!redacted.contains("hunter2"));
        assert!(redacted.contains(r#""password":"[REDACTED]""#));
        assert!(redacted.contains(r#""new_password":"[REDACTED]""#));
        assert!(redacted.contains("a@b.c"));
    }

    #[test]
    fn non_json_bodies_pass_through() {
        assert_eq!(redact_body(b"plain text"), "plain text");
    }

    #[test]
    fn long_bodies_are_truncated_with_marker() {
        let text = "x".repeat(20);
        assert_eq!(truncate(&text, 30), text);
        let cut = truncate(&text, 5);
        assert_eq!(cut, format!("xxxxx{}", TRUNCATION_MARKER));
    }

    #[test]
    fn forwarded_for_wins_over_real_ip() {
        let mut headers = HeaderMap::new();
        headers.insert("x-real-ip", HeaderValue::from_static("10.0.0.2"));
        assert_eq!(client_ip(&headers).as_deref(), Some("10.0.0.2"));
        headers.insert(
            "x-forwarded-for",
            HeaderValue::from_static("203.0.113.9, 10.0.0.1"),
        );
        assert_eq!(client_ip(&headers).as_deref(), Some("203.0.113.9"));
    }

    #[test]
    fn error_message_comes_from_error_field() {
        assert_eq!(
            error_from_body(r#"{"error":"order not found"}"#).as_deref(),
            Some("order not found")
        );
        assert_eq!(error_from_body("not json"), None);
    }

    #[test]
    fn multipart_detection() {
        let mut headers = HeaderMap::new();
        assert!(!is_multipart(&headers));
        headers.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("multipart/form-data; boundary=x"),
        );
        assert!(is_multipart(&headers));
    }
}
