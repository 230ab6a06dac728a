//! Response handling and transformation.
//!
//! # Responsibilities
//! - Turn a function's `HandlerResponse` into an HTTP response
//!
//! # Design Decisions
//! - Invalid status codes from a function become 500
//! - Headers that are not valid HTTP are dropped with a warning

use axum::body::Body;
use axum::http::{HeaderName, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use crate::dispatch::HandlerResponse;

impl IntoResponse for HandlerResponse {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let mut response = Response::new(Body::from(self.body));
        *response.status_mut() = status;

        let headers = response.headers_mut();
        for (name, value) in self.headers {
            match (HeaderName::try_from(name.as_str()), HeaderValue::try_from(value.as_str())) {
                (Ok(name), Ok(value)) => {
                    headers.append(name, value);
                }
                _ => tracing::warn!(header = %name, "Dropping invalid response header from function"),
            }
        }

        response
    }
}
