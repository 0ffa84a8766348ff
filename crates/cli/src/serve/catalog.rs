//! `/services`, `/institutions` and `/types` routes.

use std::sync::Arc;

use axum::extract::{Extension, State};
use axum::http::StatusCode;
use axum::response::Response;
use euprava_storage::ServiceId;
use euprava_workflow::input::{InstitutionInput, ServiceInput, ServiceQuery, TypeInput};

use super::error::ApiResult;
use super::extract::{Id, JsonBody, Params};
use super::handlers::{created, message, ok};
use super::state::{AppState, Caller};

/// GET /services?institution_id=&type_id=
pub(crate) async fn handle_list_services(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<Caller>,
    Params(params): Params,
) -> ApiResult<Response> {
    let query = ServiceQuery::from_params(&params)?;
    Ok(ok(state.catalog.list_services(&caller.actor, query).await?))
}

/// GET /services/{id}
pub(crate) async fn handle_get_service(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<Caller>,
    Id(id): Id<ServiceId>,
) -> ApiResult<Response> {
    Ok(ok(state.catalog.get_service(&caller.actor, id).await?))
}

/// POST /services
pub(crate) async fn handle_create_service(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<Caller>,
    JsonBody(body): JsonBody,
) -> ApiResult<Response> {
    let input = ServiceInput::from_json(&body)?;
    Ok(created(
        state.catalog.create_service(&caller.actor, input).await?,
    ))
}

/// PUT /services/{id}
pub(crate) async fn handle_update_service(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<Caller>,
    Id(id): Id<ServiceId>,
    JsonBody(body): JsonBody,
) -> ApiResult<Response> {
    let input = ServiceInput::from_json(&body)?;
    Ok(ok(state
        .catalog
        .update_service(&caller.actor, id, input)
        .await?))
}

/// DELETE /services/{id}
pub(crate) async fn handle_delete_service(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<Caller>,
    Id(id): Id<ServiceId>,
) -> ApiResult<Response> {
    state.catalog.delete_service(&caller.actor, id).await?;
    Ok(message(StatusCode::OK, "service deleted"))
}

/// GET /institutions
pub(crate) async fn handle_list_institutions(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<Caller>,
) -> ApiResult<Response> {
    Ok(ok(state.catalog.list_institutions(&caller.actor).await?))
}

/// GET /institutions/{id}
pub(crate) async fn handle_get_institution(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<Caller>,
    Id(id): Id<i64>,
) -> ApiResult<Response> {
    Ok(ok(state.catalog.get_institution(&caller.actor, id).await?))
}

/// POST /institutions
pub(crate) async fn handle_create_institution(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<Caller>,
    JsonBody(body): JsonBody,
) -> ApiResult<Response> {
    let input = InstitutionInput::from_json(&body)?;
    Ok(created(
        state.catalog.create_institution(&caller.actor, input).await?,
    ))
}

/// PUT /institutions/{id}
pub(crate) async fn handle_update_institution(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<Caller>,
    Id(id): Id<i64>,
    JsonBody(body): JsonBody,
) -> ApiResult<Response> {
    let input = InstitutionInput::from_json(&body)?;
    Ok(ok(state
        .catalog
        .update_institution(&caller.actor, id, input)
        .await?))
}

/// DELETE /institutions/{id}
pub(crate) async fn handle_delete_institution(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<Caller>,
    Id(id): Id<i64>,
) -> ApiResult<Response> {
    state.catalog.delete_institution(&caller.actor, id).await?;
    Ok(message(StatusCode::OK, "institution deleted"))
}

/// GET /types
pub(crate) async fn handle_list_types(State(state): State<Arc<AppState>>) -> ApiResult<Response> {
    Ok(ok(state.catalog.list_types().await?))
}

/// GET /types/{id}
pub(crate) async fn handle_get_type(
    State(state): State<Arc<AppState>>,
    Id(id): Id<i64>,
) -> ApiResult<Response> {
    Ok(ok(state.catalog.get_type(id).await?))
}

/// POST /types
pub(crate) async fn handle_create_type(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<Caller>,
    JsonBody(body): JsonBody,
) -> ApiResult<Response> {
    let input = TypeInput::from_json(&body)?;
    Ok(created(state.catalog.create_type(&caller.actor, input).await?))
}

/// PUT /types/{id}
pub(crate) async fn handle_update_type(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<Caller>,
    Id(id): Id<i64>,
    JsonBody(body): JsonBody,
) -> ApiResult<Response> {
    let input = TypeInput::from_json(&body)?;
    Ok(ok(state.catalog.update_type(&caller.actor, id, input).await?))
}

/// DELETE /types/{id}
pub(crate) async fn handle_delete_type(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<Caller>,
    Id(id): Id<i64>,
) -> ApiResult<Response> {
    state.catalog.delete_type(&caller.actor, id).await?;
    Ok(message(StatusCode::OK, "type deleted"))
}
