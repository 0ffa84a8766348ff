use crate::record::{RequestId, ServiceId, UserId};

/// All errors that can be returned by a PortalStorage implementation.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// Conditional write rejected: the stored request no longer matches the
    /// guard the caller observed (status, owner, assignee or payment status).
    #[error("condition failed on service request {request_id}")]
    ConditionFailed { request_id: RequestId },

    /// No service request with the given id.
    #[error("service request not found: {request_id}")]
    RequestNotFound { request_id: RequestId },

    /// No catalog service with the given id.
    #[error("service not found: {service_id}")]
    ServiceNotFound { service_id: ServiceId },

    /// No institution with the given id.
    #[error("institution not found: {institution_id}")]
    InstitutionNotFound { institution_id: i64 },

    /// No service type with the given id.
    #[error("type not found: {type_id}")]
    TypeNotFound { type_id: i64 },

    /// No user with the given id.
    #[error("user not found: {user_id}")]
    UserNotFound { user_id: UserId },

    /// A unique column already holds this value (`users.email`,
    /// `users.jmbg`, `services.name`, `types.name`).
    #[error("duplicate {field}: {value}")]
    Duplicate { field: &'static str, value: String },

    /// Removing the row would orphan live work (a user still reviewing a request).
    #[error("{entity} {id} cannot be removed: {reason}")]
    StillReferenced {
        entity: &'static str,
        id: i64,
        reason: &'static str,
    },

    /// A backend-specific storage error (DB connection, serialization, etc.).
    #[error("storage backend error: {0}")]
    Backend(String),
}
