//! HTTP middleware: rate limiting and bearer-token identity.

use std::sync::Arc;

use axum::extract::{ConnectInfo, State};
use axum::http::{Request, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::Json;

use super::error::ApiError;
use super::state::{AppState, Caller};

/// Routes reachable without a session token.
const PUBLIC_PATHS: &[&str] = &["/health", "/auth/register", "/auth/login"];

/// Rate limiting middleware. Checks per-IP request rate before routing.
pub(crate) async fn rate_limit_middleware(
    State(state): State<Arc<AppState>>,
    ConnectInfo(addr): ConnectInfo<std::net::SocketAddr>,
    request: Request<axum::body::Body>,
    next: Next,
) -> Response {
    match state.rate_limiter.check(addr.ip()).await {
        Ok(()) => next.run(request).await,
        Err(retry_after) => {
            tracing::warn!(ip = %addr.ip(), "rate limit exceeded");
            let body = serde_json::json!({
                "message": "too many requests",
                "retry_after": retry_after,
            });
            (StatusCode::TOO_MANY_REQUESTS, Json(body)).into_response()
        }
    }
}

/// Resolve `Authorization: Bearer <token>` to a [`Caller`] extension.
///
/// Every route except [`PUBLIC_PATHS`] requires a live session.
pub(crate) async fn auth_middleware(
    State(state): State<Arc<AppState>>,
    mut request: Request<axum::body::Body>,
    next: Next,
) -> Response {
    if PUBLIC_PATHS.contains(&request.uri().path()) {
        return next.run(request).await;
    }

    let token = request
        .headers()
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(|t| t.trim().to_string());

    let Some(token) = token.filter(|t| !t.is_empty()) else {
        return super::error::json_error(StatusCode::UNAUTHORIZED, "unauthenticated");
    };

    match state.identity.authenticate(&token).await {
        Ok(actor) => {
            request.extensions_mut().insert(Caller { actor, token });
            next.run(request).await
        }
        Err(e) => ApiError(e).into_response(),
    }
}
