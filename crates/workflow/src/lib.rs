//! Service-request lifecycle for the eUprava portal.
//!
//! [`Workflow`] drives requests through `DRAFT -> SUBMITTED -> IN_REVIEW ->
//! APPROVED | REJECTED`, with authorization taken from the declarative
//! [`policy::RULES`] table and visibility from [`visibility::scope_for`].
//! [`Identity`], [`Catalog`] and [`Users`] cover the surrounding account and
//! reference-data operations. All of them share one [`PortalStorage`]
//! backend.
//!
//! [`PortalStorage`]: euprava_storage::PortalStorage

pub mod catalog;
pub mod engine;
pub mod error;
pub mod identity;
pub mod input;
pub mod lifecycle;
pub mod payment;
pub mod policy;
pub mod users;
pub mod visibility;

pub use catalog::Catalog;
pub use engine::Workflow;
pub use error::{FieldErrors, PortalError};
pub use identity::{Actor, Identity, Session};
pub use users::Users;
