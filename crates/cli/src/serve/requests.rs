//! `/service-requests` routes.

use std::sync::Arc;

use axum::extract::{Extension, State};
use axum::http::StatusCode;
use axum::response::Response;
use euprava_storage::RequestId;
use euprava_workflow::input::{CreateInput, DecideInput, EditInput, ListQuery, PaymentInput};

use super::error::ApiResult;
use super::extract::{Id, JsonBody, Params};
use super::handlers::{created, message, ok};
use super::state::{AppState, Caller};

/// GET /service-requests?status=&service_id=
pub(crate) async fn handle_list(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<Caller>,
    Params(params): Params,
) -> ApiResult<Response> {
    let query = ListQuery::from_params(&params)?;
    let records = state.workflow.list(&caller.actor, query).await?;
    Ok(ok(records))
}

/// POST /service-requests
pub(crate) async fn handle_create(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<Caller>,
    JsonBody(body): JsonBody,
) -> ApiResult<Response> {
    let input = CreateInput::from_json(&body)?;
    let record = state.workflow.create(&caller.actor, input).await?;
    Ok(created(record))
}

/// GET /service-requests/{id}
pub(crate) async fn handle_get(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<Caller>,
    Id(id): Id<RequestId>,
) -> ApiResult<Response> {
    Ok(ok(state.workflow.get(&caller.actor, id).await?))
}

/// PUT /service-requests/{id}
pub(crate) async fn handle_edit(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<Caller>,
    Id(id): Id<RequestId>,
    JsonBody(body): JsonBody,
) -> ApiResult<Response> {
    let input = EditInput::from_json(&body)?;
    Ok(ok(state.workflow.edit(&caller.actor, id, input).await?))
}

/// PATCH /service-requests/{id}/submit
pub(crate) async fn handle_submit(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<Caller>,
    Id(id): Id<RequestId>,
) -> ApiResult<Response> {
    Ok(ok(state.workflow.submit(&caller.actor, id).await?))
}

/// PATCH /service-requests/{id}/assign
pub(crate) async fn handle_assign(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<Caller>,
    Id(id): Id<RequestId>,
) -> ApiResult<Response> {
    Ok(ok(state.workflow.assign(&caller.actor, id).await?))
}

/// PATCH /service-requests/{id}/status
pub(crate) async fn handle_decide(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<Caller>,
    Id(id): Id<RequestId>,
    JsonBody(body): JsonBody,
) -> ApiResult<Response> {
    let input = DecideInput::from_json(&body)?;
    Ok(ok(state.workflow.decide(&caller.actor, id, input).await?))
}

/// PATCH /service-requests/{id}/payment
pub(crate) async fn handle_payment(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<Caller>,
    Id(id): Id<RequestId>,
    JsonBody(body): JsonBody,
) -> ApiResult<Response> {
    let input = PaymentInput::from_json(&body)?;
    Ok(ok(state
        .workflow
        .update_payment(&caller.actor, id, input)
        .await?))
}

/// DELETE /service-requests/{id}
pub(crate) async fn handle_delete(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<Caller>,
    Id(id): Id<RequestId>,
) -> ApiResult<Response> {
    state.workflow.delete(&caller.actor, id).await?;
    Ok(message(StatusCode::OK, "service request deleted"))
}
