//! services/api/src/web/session.rs
//!
//! The `pdf_session` cookie that ties a browser to its persisted caller context.

use axum::http::{header, HeaderMap, HeaderValue};
use uuid::Uuid;

pub const SESSION_COOKIE: &str = "pdf_session";

/// Reads the caller-context id from the request cookies, ignoring malformed values.
pub fn caller_id(headers: &HeaderMap) -> Option<Uuid> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .find_map(|c| c.trim().strip_prefix("pdf_session="))
        .and_then(|v| Uuid::parse_str(v).ok())
}

pub fn session_cookie(id: Uuid) -> HeaderValue {
    // A hyphenated UUID is always a valid header value.
    HeaderValue::from_str(&format!(
        "{}={}; Path=/; HttpOnly; SameSite=Lax",
        SESSION_COOKIE, id
    ))
    .unwrap_or_else(|_| HeaderValue::from_static("pdf_session=; Path=/"))
}
