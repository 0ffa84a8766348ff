//! Mapping of portal errors onto HTTP responses.

use axum::extract::rejection::{PathRejection, QueryRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use euprava_workflow::{FieldErrors, PortalError};
use serde::Serialize;

/// Error body: `{"message": ..., "errors": {field: [..]}}`.
#[derive(Debug, Serialize)]
pub(crate) struct ErrorBody {
    pub(crate) message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) errors: Option<FieldErrors>,
}

/// Handler error; wraps [`PortalError`] so it can be returned with `?`.
#[derive(Debug)]
pub(crate) struct ApiError(pub(crate) PortalError);

impl From<PortalError> for ApiError {
    fn from(e: PortalError) -> Self {
        ApiError(e)
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        tracing::debug!(reason = %rejection.body_text(), "rejected path parameter");
        ApiError(PortalError::invalid_field("id", "the id must be an integer"))
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError(PortalError::invalid_field(
            "query",
            format!("the query string is malformed: {}", rejection.body_text()),
        ))
    }
}

pub(crate) type ApiResult<T> = Result<T, ApiError>;

pub(crate) fn status_of(e: &PortalError) -> StatusCode {
    match e {
        PortalError::ValidationFailed { .. } => StatusCode::UNPROCESSABLE_ENTITY,
        PortalError::Unauthenticated(_) => StatusCode::UNAUTHORIZED,
        PortalError::Forbidden(_) => StatusCode::FORBIDDEN,
        PortalError::NotFound(_) => StatusCode::NOT_FOUND,
        PortalError::PreconditionFailed(_) => StatusCode::CONFLICT,
        PortalError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = status_of(&self.0);
        let body = match self.0 {
            PortalError::ValidationFailed { message, errors } => ErrorBody {
                message,
                errors: Some(errors),
            },
            PortalError::Storage(e) => {
                tracing::error!(error = %e, "storage backend failure");
                ErrorBody {
                    message: "server error".to_string(),
                    errors: None,
                }
            }
            other => ErrorBody {
                message: other.to_string(),
                errors: None,
            },
        };
        (status, Json(body)).into_response()
    }
}

/// A bare `{"message": ...}` response, for errors raised outside the workflow.
pub(crate) fn json_error(status: StatusCode, message: &str) -> Response {
    (
        status,
        Json(ErrorBody {
            message: message.to_string(),
            errors: None,
        }),
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use euprava_storage::StorageError;

    #[test]
    fn taxonomy_maps_to_status_codes() {
        assert_eq!(
            status_of(&PortalError::invalid_field("x", "bad")),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            status_of(&PortalError::Unauthenticated("no".into())),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            status_of(&PortalError::Forbidden("no".into())),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            status_of(&StorageError::RequestNotFound { request_id: 1 }.into()),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            status_of(&StorageError::ConditionFailed { request_id: 1 }.into()),
            StatusCode::CONFLICT
        );
        assert_eq!(
            status_of(&StorageError::Backend("down".into()).into()),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn validation_body_carries_field_errors() {
        let body = ErrorBody {
            message: "the given data was invalid".to_string(),
            errors: Some({
                let mut e = FieldErrors::new();
                e.add("service_id", "the service_id field is required");
                e
            }),
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(
            json["errors"]["service_id"][0],
            "the service_id field is required"
        );
        let bare = serde_json::to_value(ErrorBody {
            message: "x".to_string(),
            errors: None,
        })
        .unwrap();
        assert!(bare.get("errors").is_none());
    }
}
