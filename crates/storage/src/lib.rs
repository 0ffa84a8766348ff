pub mod conformance;
mod error;
mod memory;
mod record;
mod traits;

pub use error::StorageError;
pub use memory::MemoryStorage;
pub use record::{
    timestamp_now, AssigneeGuard, FormData, InstitutionChange, InstitutionRecord, NewInstitution,
    NewRequest, NewService, NewType, NewUser, PaymentStatus, RequestChange, RequestFilter,
    RequestGuard, RequestId, RequestRecord, RequestScope, RequestStatus, Role, ServiceChange,
    ServiceFilter, ServiceId, ServiceRecord, ServiceStatus, TypeChange, TypeRecord, UserId,
    UserRecord,
};
pub use traits::PortalStorage;
