//! Request handling and transformation.
//!
//! # Responsibilities
//! - Generate a unique request ID (UUID v4)
//! - Strip the API prefix to get the path fragment used for routing
//! - Parse cookies, query and body into the form handlers receive
//!
//! # Design Decisions
//! - Request ID added as early as possible for tracing
//! - Body parsing is driven by Content-Type; unknown types arrive raw
//! - A JSON body that fails to parse is rejected with 400

use std::collections::BTreeMap;
use axum::body::{Body, Bytes};
use axum::http::{header, HeaderMap, HeaderValue, Request, StatusCode};
use axum::response::{IntoResponse, Response};
use percent_encoding::percent_decode_str;
use tower_http::request_id::{MakeRequestId, RequestId};
use uuid::Uuid;
use crate::dispatch::{HandlerRequest, RequestBody};
use crate::routing::ResolvedFunction;

/// Header carrying the request ID.
pub const X_REQUEST_ID: &str = "x-request-id";

/// Generates UUID v4 request IDs.
#[derive(Debug, Clone, Copy, Default)]
pub struct UuidRequestId;

impl MakeRequestId for UuidRequestId {
    fn make_request_id<B>(&mut self, _request: &Request<B>) -> Option<RequestId> {
        HeaderValue::from_str(&Uuid::new_v4().to_string())
            .ok()
            .map(RequestId::new)
    }
}

/// Path fragment below `prefix`, percent-decoded.
///
/// Returns `None` when the path is outside the prefix.
pub fn path_fragment(prefix: &str, path: &str) -> Option<String> {
    let prefix = prefix.trim_end_matches('/');
    let rest = path.strip_prefix(prefix)?;

    let raw = if rest.is_empty() {
        ""
    } else {
        rest.strip_prefix('/')?
    };

    percent_decode_str(raw).decode_utf8().ok().map(|s| s.into_owned())
}

/// Request could not be turned into a handler request.
#[derive(Debug)]
pub enum BodyRejection {
    TooLarge,
    InvalidJson(String),
    InvalidForm(String),
}

impl IntoResponse for BodyRejection {
    fn into_response(self) -> Response {
        match self {
            BodyRejection::TooLarge => (StatusCode::PAYLOAD_TOO_LARGE, "Request body too large").into_response(),
            BodyRejection::InvalidJson(e) => (StatusCode::BAD_REQUEST, format!("Invalid JSON body: {}", e)).into_response(),
            BodyRejection::InvalidForm(e) => (StatusCode::BAD_REQUEST, format!("Invalid form body: {}", e)).into_response(),
        }
    }
}

/// Buffer and parse `request` for the resolved function.
pub async fn into_handler_request(
    request: Request<Body>,
    resolved: &ResolvedFunction,
    max_body_size: usize,
) -> Result<HandlerRequest, BodyRejection> {
    let (parts, body) = request.into_parts();
    let bytes = axum::body::to_bytes(body, max_body_size)
        .await
        .map_err(|_| BodyRejection::TooLarge)?;

    let body = parse_body(content_type(&parts.headers).as_deref(), bytes)?;

    let query = parts
        .uri
        .query()
        .and_then(|q| serde_urlencoded::from_str::<Vec<(String, String)>>(q).ok())
        .map(|pairs| pairs.into_iter().collect())
        .unwrap_or_default();

    let request_id = parts
        .headers
        .get(X_REQUEST_ID)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    Ok(HandlerRequest {
        method: parts.method.to_string(),
        route: resolved.function.route.clone(),
        path: parts.uri.path().to_string(),
        params: resolved.params.clone(),
        query,
        headers: header_map(&parts.headers),
        cookies: parse_cookies(&parts.headers),
        body,
        request_id,
    })
}

fn content_type(headers: &HeaderMap) -> Option<String> {
    headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(';').next())
        .map(|v| v.trim().to_ascii_lowercase())
}

/// Parse a body according to its media type.
pub fn parse_body(content_type: Option<&str>, bytes: Bytes) -> Result<RequestBody, BodyRejection> {
    if bytes.is_empty() {
        return Ok(RequestBody::Empty);
    }

    match content_type {
        Some("application/x-www-form-urlencoded") => serde_urlencoded::from_bytes::<Vec<(String, String)>>(&bytes)
            .map(|pairs| RequestBody::Form(pairs.into_iter().collect()))
            .map_err(|e| BodyRejection::InvalidForm(e.to_string())),
        Some(ct) if ct == "application/json" || ct.ends_with("+json") => serde_json::from_slice(&bytes)
            .map(RequestBody::Json)
            .map_err(|e| BodyRejection::InvalidJson(e.to_string())),
        Some(ct) if ct.starts_with("text/") => Ok(RequestBody::Text(String::from_utf8_lossy(&bytes).into_owned())),
        _ => Ok(RequestBody::Raw(bytes.to_vec())),
    }
}

/// Parse every `Cookie` header into a name → value map.
pub fn parse_cookies(headers: &HeaderMap) -> BTreeMap<String, String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(cookie::Cookie::split_parse_encoded)
        .filter_map(Result::ok)
        .map(|c| (c.name().to_string(), c.value().to_string()))
        .collect()
}

fn header_map(headers: &HeaderMap) -> BTreeMap<String, String> {
    let mut map: BTreeMap<String, String> = BTreeMap::new();
    for (name, value) in headers {
        let Ok(value) = value.to_str() else { continue };
        map.entry(name.as_str().to_string())
            .and_modify(|existing| {
                existing.push_str(", ");
                existing.push_str(value);
            })
            .or_insert_with(|| value.to_string());
    }
    map
}
