//! Extractors whose rejections use the JSON error body instead of axum's
//! plain-text defaults.

use std::collections::HashMap;

use axum::body::Bytes;
use axum::extract::rejection::BytesRejection;
use axum::extract::{FromRequest, FromRequestParts, Path, Query, Request};
use axum::http::request::Parts;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::de::DeserializeOwned;

use super::error::{json_error, ApiError};
use super::handlers::parse_body;

/// The `{id}` path segment. A malformed id is a 422 on field `id`.
pub(crate) struct Id<T>(pub(crate) T);

impl<S, T> FromRequestParts<S> for Id<T>
where
    T: DeserializeOwned + Send,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Path(id) = Path::<T>::from_request_parts(parts, state).await?;
        Ok(Id(id))
    }
}

/// Raw query-string parameters; the typed query decoders validate them.
pub(crate) struct Params(pub(crate) HashMap<String, String>);

impl<S> FromRequestParts<S> for Params
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Query(params) = Query::from_request_parts(parts, state).await?;
        Ok(Params(params))
    }
}

/// The request body as JSON. An empty body reads as `null`.
pub(crate) struct JsonBody(pub(crate) serde_json::Value);

impl<S> FromRequest<S> for JsonBody
where
    S: Send + Sync,
{
    type Rejection = Response;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let bytes = Bytes::from_request(req, state)
            .await
            .map_err(body_rejection)?;
        parse_body(&bytes)
            .map(JsonBody)
            .map_err(IntoResponse::into_response)
    }
}

/// Over-limit bodies keep axum's 413; anything else unreadable keeps its status.
fn body_rejection(rejection: BytesRejection) -> Response {
    let status = rejection.status();
    if status == StatusCode::PAYLOAD_TOO_LARGE {
        tracing::debug!("request body over the configured limit");
        json_error(status, "the request body is too large")
    } else {
        json_error(status, "the request body could not be read")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::extract::DefaultBodyLimit;
    use axum::http::Request as HttpRequest;
    use axum::routing::{get, post};
    use axum::Router;
    use tower::ServiceExt;

    async fn call(app: Router, request: Request) -> (StatusCode, serde_json::Value) {
        let response = app.oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn malformed_id_is_a_json_field_error() {
        let app = Router::new().route(
            "/things/{id}",
            get(|Id(id): Id<i64>| async move { id.to_string() }),
        );
        let request = HttpRequest::get("/things/abc").body(Body::empty()).unwrap();
        let (status, body) = call(app, request).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert!(body["errors"]["id"][0].is_string(), "{body}");
    }

    #[tokio::test]
    async fn oversized_body_is_a_json_413() {
        let app = Router::new()
            .route(
                "/things",
                post(|JsonBody(_): JsonBody| async { "accepted" }),
            )
            .layer(DefaultBodyLimit::max(16));
        let request = HttpRequest::post("/things")
            .body(Body::from(format!("{{\"name\": \"{}\"}}", "x".repeat(64))))
            .unwrap();
        let (status, body) = call(app, request).await;
        assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
        assert_eq!(body["message"], "the request body is too large");
    }
}
