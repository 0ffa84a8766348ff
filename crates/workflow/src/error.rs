use std::collections::BTreeMap;

use euprava_storage::StorageError;
use serde::Serialize;

/// Per-field validation messages, keyed by the snake_case field name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct FieldErrors(BTreeMap<String, Vec<String>>);

impl FieldErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, field: &str, message: impl Into<String>) {
        self.0
            .entry(field.to_string())
            .or_default()
            .push(message.into());
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, field: &str) -> Option<&[String]> {
        self.0.get(field).map(Vec::as_slice)
    }

    /// `Ok(())` when no field failed, otherwise `ValidationFailed`.
    pub fn into_result(self) -> Result<(), PortalError> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(PortalError::ValidationFailed {
                message: "the given data was invalid".to_string(),
                errors: self,
            })
        }
    }
}

/// Errors surfaced by the workflow, catalog and identity operations.
///
/// Every variant is deterministic given the stored state: retrying without
/// changing that state reproduces the same error.
#[derive(Debug, thiserror::Error)]
pub enum PortalError {
    /// Malformed or missing input.
    #[error("{message}")]
    ValidationFailed { message: String, errors: FieldErrors },

    /// Missing or unknown session token, or bad credentials.
    #[error("{0}")]
    Unauthenticated(String),

    /// Role, ownership or assignment mismatch.
    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    NotFound(String),

    /// Valid request, wrong current state.
    #[error("{0}")]
    PreconditionFailed(String),

    #[error(transparent)]
    Storage(StorageError),
}

impl PortalError {
    /// A validation failure on a single field.
    pub fn invalid_field(field: &str, message: impl Into<String>) -> Self {
        let mut errors = FieldErrors::new();
        errors.add(field, message);
        PortalError::ValidationFailed {
            message: "the given data was invalid".to_string(),
            errors,
        }
    }
}

impl From<StorageError> for PortalError {
    fn from(e: StorageError) -> Self {
        match e {
            StorageError::ConditionFailed { request_id } => PortalError::PreconditionFailed(
                format!("service request {request_id} changed state concurrently"),
            ),
            StorageError::RequestNotFound { request_id } => {
                PortalError::NotFound(format!("service request {request_id} not found"))
            }
            StorageError::ServiceNotFound { service_id } => {
                PortalError::NotFound(format!("service {service_id} not found"))
            }
            StorageError::InstitutionNotFound { institution_id } => {
                PortalError::NotFound(format!("institution {institution_id} not found"))
            }
            StorageError::TypeNotFound { type_id } => {
                PortalError::NotFound(format!("type {type_id} not found"))
            }
            StorageError::UserNotFound { user_id } => {
                PortalError::NotFound(format!("user {user_id} not found"))
            }
            StorageError::Duplicate { field, .. } => {
                PortalError::invalid_field(field, format!("the {field} has already been taken"))
            }
            e @ StorageError::StillReferenced { .. } => {
                PortalError::PreconditionFailed(e.to_string())
            }
            e @ StorageError::Backend(_) => PortalError::Storage(e),
        }
    }
}
