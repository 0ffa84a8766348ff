use async_trait::async_trait;

use crate::error::StorageError;
use crate::record::{
    InstitutionChange, InstitutionRecord, NewInstitution, NewRequest, NewService, NewType, NewUser,
    RequestChange, RequestFilter, RequestGuard, RequestId, RequestRecord, Role, ServiceChange,
    ServiceFilter, ServiceId, ServiceRecord, TypeChange, TypeRecord, UserId, UserRecord,
};

/// The storage trait for portal backends.
///
/// A `PortalStorage` implementation persists service requests, the catalog
/// (institutions, types, services), users and session tokens.
///
/// ## Conditional writes
///
/// `update_request` and `delete_request` take a [`RequestGuard`] and behave
/// like `UPDATE ... WHERE id = :id AND <guard>`: the guard is evaluated and
/// the write applied atomically with respect to other writers. If the record
/// exists but the guard does not hold, nothing is written and the method
/// returns `Err(StorageError::ConditionFailed { .. })`. This is the only
/// concurrency control the workflow relies on; callers never hold a lock
/// between reading a record and writing it.
///
/// ## Thread Safety
///
/// Implementations must be `Send + Sync + 'static` to be used in axum
/// application state and across async task boundaries.
#[async_trait]
pub trait PortalStorage: Send + Sync + 'static {
    // ── Service requests ─────────────────────────────────────────────────────

    /// Insert a new request in `DRAFT`, unassigned, with no payment date.
    /// Returns the stored record with its assigned id and timestamps.
    async fn insert_request(&self, request: NewRequest) -> Result<RequestRecord, StorageError>;

    /// Returns `Err(StorageError::RequestNotFound)` if the request does not exist.
    async fn get_request(&self, id: RequestId) -> Result<RequestRecord, StorageError>;

    /// List requests matching the filter, newest first.
    async fn list_requests(
        &self,
        filter: &RequestFilter,
    ) -> Result<Vec<RequestRecord>, StorageError>;

    /// Apply `change` iff `guard` holds for the stored record (conditional write).
    ///
    /// Returns the record as written, with `updated_at` refreshed.
    async fn update_request(
        &self,
        id: RequestId,
        guard: &RequestGuard,
        change: RequestChange,
    ) -> Result<RequestRecord, StorageError>;

    /// Remove the request iff `guard` holds (conditional delete).
    async fn delete_request(&self, id: RequestId, guard: &RequestGuard)
        -> Result<(), StorageError>;

    // ── Catalog ──────────────────────────────────────────────────────────────

    async fn insert_institution(
        &self,
        institution: NewInstitution,
    ) -> Result<InstitutionRecord, StorageError>;

    async fn get_institution(&self, id: i64) -> Result<InstitutionRecord, StorageError>;

    /// All institutions ordered by name.
    async fn list_institutions(&self) -> Result<Vec<InstitutionRecord>, StorageError>;

    async fn update_institution(
        &self,
        id: i64,
        change: InstitutionChange,
    ) -> Result<InstitutionRecord, StorageError>;

    /// Remove an institution with its services and every request filed
    /// against them, as one atomic step. Returns how many requests went.
    async fn delete_institution(&self, id: i64) -> Result<usize, StorageError>;

    /// Returns `Err(StorageError::Duplicate)` if the name is taken.
    async fn insert_type(&self, service_type: NewType) -> Result<TypeRecord, StorageError>;

    async fn get_type(&self, id: i64) -> Result<TypeRecord, StorageError>;

    /// All types ordered by name.
    async fn list_types(&self) -> Result<Vec<TypeRecord>, StorageError>;

    /// Returns `Err(StorageError::Duplicate)` if the new name is taken.
    async fn update_type(&self, id: i64, change: TypeChange) -> Result<TypeRecord, StorageError>;

    /// Same cascade as [`PortalStorage::delete_institution`].
    async fn delete_type(&self, id: i64) -> Result<usize, StorageError>;

    /// Returns `Err(StorageError::Duplicate)` if the name is taken.
    async fn insert_service(&self, service: NewService) -> Result<ServiceRecord, StorageError>;

    async fn get_service(&self, id: ServiceId) -> Result<ServiceRecord, StorageError>;

    /// Services matching the filter, ordered by name.
    async fn list_services(
        &self,
        filter: &ServiceFilter,
    ) -> Result<Vec<ServiceRecord>, StorageError>;

    async fn update_service(
        &self,
        id: ServiceId,
        change: ServiceChange,
    ) -> Result<ServiceRecord, StorageError>;

    /// Remove a service and its requests. Returns how many requests went.
    async fn delete_service(&self, id: ServiceId) -> Result<usize, StorageError>;

    // ── Users and sessions ───────────────────────────────────────────────────

    /// Returns `Err(StorageError::Duplicate)` if the email or jmbg is taken.
    async fn insert_user(&self, user: NewUser) -> Result<UserRecord, StorageError>;

    async fn get_user(&self, id: UserId) -> Result<UserRecord, StorageError>;

    /// Case-insensitive lookup by email.
    async fn find_user_by_email(&self, email: &str) -> Result<Option<UserRecord>, StorageError>;

    /// All users ordered by name.
    async fn list_users(&self) -> Result<Vec<UserRecord>, StorageError>;

    async fn update_user_role(&self, id: UserId, role: Role) -> Result<UserRecord, StorageError>;

    /// Remove a user with their sessions and the requests they own. Requests
    /// they already decided keep their outcome with `assignee_id` cleared.
    ///
    /// Returns `Err(StorageError::StillReferenced)`, removing nothing, while
    /// the user is the assignee of an `IN_REVIEW` request. Otherwise returns
    /// how many owned requests went.
    async fn delete_user(&self, id: UserId) -> Result<usize, StorageError>;

    /// Store a session token digest for a user. Tokens themselves are never stored.
    async fn insert_session(&self, token_digest: &str, user_id: UserId)
        -> Result<(), StorageError>;

    /// Resolve a token digest to its user id, if the session exists.
    async fn find_session(&self, token_digest: &str) -> Result<Option<UserId>, StorageError>;

    /// Revoke a session. Revoking an unknown digest is not an error.
    async fn delete_session(&self, token_digest: &str) -> Result<(), StorageError>;
}
