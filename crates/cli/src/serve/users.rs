//! `/users` routes (administrators only).

use std::sync::Arc;

use axum::extract::{Extension, State};
use axum::http::StatusCode;
use axum::response::Response;
use euprava_storage::UserId;
use euprava_workflow::input::role_from_json;

use super::error::ApiResult;
use super::extract::{Id, JsonBody};
use super::handlers::{message, ok};
use super::state::{AppState, Caller};

/// GET /users
pub(crate) async fn handle_list_users(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<Caller>,
) -> ApiResult<Response> {
    Ok(ok(state.users.list(&caller.actor).await?))
}

/// GET /users/{id}
pub(crate) async fn handle_get_user(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<Caller>,
    Id(id): Id<UserId>,
) -> ApiResult<Response> {
    Ok(ok(state.users.get(&caller.actor, id).await?))
}

/// PATCH /users/{id}/role
pub(crate) async fn handle_change_role(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<Caller>,
    Id(id): Id<UserId>,
    JsonBody(body): JsonBody,
) -> ApiResult<Response> {
    let role = role_from_json(&body)?;
    Ok(ok(state.users.change_role(&caller.actor, id, role).await?))
}

/// DELETE /users/{id}
pub(crate) async fn handle_delete_user(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<Caller>,
    Id(id): Id<UserId>,
) -> ApiResult<Response> {
    state.users.delete(&caller.actor, id).await?;
    Ok(message(StatusCode::OK, "user deleted"))
}
