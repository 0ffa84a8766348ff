//! Shared handler plumbing: response envelopes, body parsing, health.

use axum::body::Bytes;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use euprava_workflow::PortalError;
use serde::Serialize;

use super::error::{json_error, ApiError};

/// Success body: `{"data": ...}`.
#[derive(Debug, Serialize)]
pub(crate) struct Data<T> {
    pub(crate) data: T,
}

/// Success body with a human-readable message: `{"message": ..., "data": ...}`.
#[derive(Debug, Serialize)]
pub(crate) struct MessageData<T> {
    pub(crate) message: &'static str,
    pub(crate) data: T,
}

pub(crate) fn ok<T: Serialize>(data: T) -> Response {
    (StatusCode::OK, Json(Data { data })).into_response()
}

pub(crate) fn created<T: Serialize>(data: T) -> Response {
    (StatusCode::CREATED, Json(Data { data })).into_response()
}

pub(crate) fn message(status: StatusCode, message: &'static str) -> Response {
    (status, Json(serde_json::json!({ "message": message }))).into_response()
}

/// Decode a JSON request body. An empty body reads as `null`, which the
/// input decoders treat as "no fields given".
pub(crate) fn parse_body(body: &Bytes) -> Result<serde_json::Value, ApiError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(serde_json::Value::Null);
    }
    serde_json::from_slice(body).map_err(|e| {
        ApiError(PortalError::invalid_field(
            "body",
            format!("the request body is not valid JSON: {e}"),
        ))
    })
}

/// Fallback handler for unmatched routes.
pub(crate) async fn handle_not_found() -> Response {
    json_error(StatusCode::NOT_FOUND, "not found")
}

/// Fallback for a known path hit with an unrouted method.
pub(crate) async fn handle_method_not_allowed() -> Response {
    json_error(StatusCode::METHOD_NOT_ALLOWED, "method not allowed")
}

/// GET /health
pub(crate) async fn handle_health() -> impl IntoResponse {
    let response = serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    });
    (StatusCode::OK, Json(response))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_body_is_null() {
        assert_eq!(parse_body(&Bytes::from_static(b"")).unwrap(), serde_json::Value::Null);
        assert_eq!(
            parse_body(&Bytes::from_static(b"  \n")).unwrap(),
            serde_json::Value::Null
        );
    }

    #[test]
    fn malformed_body_is_validation_error() {
        let err = parse_body(&Bytes::from_static(b"{not json")).unwrap_err();
        assert!(matches!(err.0, PortalError::ValidationFailed { .. }));
    }
}
