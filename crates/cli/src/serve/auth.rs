//! `/auth` routes.

use std::sync::Arc;

use axum::extract::{Extension, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use euprava_workflow::input::{LoginInput, RegisterInput};

use super::error::ApiResult;
use super::extract::JsonBody;
use super::handlers::{message, ok, MessageData};
use super::state::{AppState, Caller};

/// POST /auth/register
pub(crate) async fn handle_register(
    State(state): State<Arc<AppState>>,
    JsonBody(body): JsonBody,
) -> ApiResult<Response> {
    let input = RegisterInput::from_json(&body)?;
    let session = state.identity.register(input).await?;
    Ok((
        StatusCode::CREATED,
        Json(MessageData {
            message: "registration successful",
            data: session,
        }),
    )
        .into_response())
}

/// POST /auth/login
pub(crate) async fn handle_login(
    State(state): State<Arc<AppState>>,
    JsonBody(body): JsonBody,
) -> ApiResult<Response> {
    let input = LoginInput::from_json(&body)?;
    let session = state.identity.login(input).await?;
    Ok((
        StatusCode::OK,
        Json(MessageData {
            message: "login successful",
            data: session,
        }),
    )
        .into_response())
}

/// GET /auth/me
pub(crate) async fn handle_me(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<Caller>,
) -> ApiResult<Response> {
    Ok(ok(state.identity.current_user(&caller.token).await?))
}

/// POST /auth/logout
pub(crate) async fn handle_logout(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<Caller>,
) -> ApiResult<Response> {
    state.identity.logout(&caller.token).await?;
    Ok(message(StatusCode::OK, "logged out"))
}
