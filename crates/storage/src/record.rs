use std::collections::BTreeMap;
use std::fmt;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

use crate::error::StorageError;

pub type RequestId = i64;
pub type ServiceId = i64;
pub type UserId = i64;

/// Owner-supplied form fields. The workflow never interprets the values.
pub type FormData = BTreeMap<String, serde_json::Value>;

/// Current UTC time as an RFC 3339 string, the timestamp format of every record.
pub fn timestamp_now() -> Result<String, StorageError> {
    format_timestamp(OffsetDateTime::now_utc())
}

/// RFC 3339 only covers years 0000 through 9999; anything else is an error
/// rather than an empty timestamp.
fn format_timestamp(at: OffsetDateTime) -> Result<String, StorageError> {
    at.format(&Rfc3339)
        .map_err(|e| StorageError::Backend(format!("cannot format timestamp {at}: {e}")))
}

macro_rules! string_enum {
    ($(#[$meta:meta])* $name:ident { $($variant:ident => $text:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum $name {
            $(#[serde(rename = $text)] $variant),+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn as_str(self) -> &'static str {
                match self {
                    $($name::$variant => $text),+
                }
            }

            /// Parse the wire spelling. Matching is exact (upper case).
            pub fn parse(s: &str) -> Option<Self> {
                match s {
                    $($text => Some($name::$variant),)+
                    _ => None,
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

string_enum! {
    /// Lifecycle status of a service request.
    RequestStatus {
        Draft => "DRAFT",
        Submitted => "SUBMITTED",
        InReview => "IN_REVIEW",
        Approved => "APPROVED",
        Rejected => "REJECTED",
    }
}

string_enum! {
    /// Payment state of a service request.
    PaymentStatus {
        NotRequired => "NOT_REQUIRED",
        NotPaid => "NOT_PAID",
        Pending => "PENDING",
        Paid => "PAID",
    }
}

string_enum! {
    Role {
        Citizen => "CITIZEN",
        Officer => "OFFICER",
        Admin => "ADMIN",
    }
}

string_enum! {
    /// Whether a catalog service accepts new requests.
    ServiceStatus {
        Active => "ACTIVE",
        Inactive => "INACTIVE",
    }
}

// ── Service requests ─────────────────────────────────────────────────────────

/// A service request as stored in the backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestRecord {
    pub id: RequestId,
    pub owner_id: UserId,
    pub service_id: ServiceId,
    pub assignee_id: Option<UserId>,
    pub status: RequestStatus,
    pub citizen_note: Option<String>,
    pub officer_note: Option<String>,
    pub attachment: Option<String>,
    pub form_data: FormData,
    pub payment_status: PaymentStatus,
    /// RFC 3339. Present iff `payment_status` is `PAID`.
    pub payment_date: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

/// Fields of a request at creation. The backend assigns `id` and timestamps
/// and always starts the record in `DRAFT`, unassigned, unpaid.
#[derive(Debug, Clone, PartialEq)]
pub struct NewRequest {
    pub owner_id: UserId,
    pub service_id: ServiceId,
    pub citizen_note: Option<String>,
    pub attachment: Option<String>,
    pub form_data: FormData,
    pub payment_status: PaymentStatus,
}

/// A set of field changes applied by one conditional write.
///
/// `None` leaves a field untouched. `assignee_id` can only be set, never
/// cleared: there is no way to express "unassign" in a change.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RequestChange {
    pub status: Option<RequestStatus>,
    pub assignee_id: Option<UserId>,
    pub citizen_note: Option<Option<String>>,
    pub officer_note: Option<Option<String>>,
    pub attachment: Option<Option<String>>,
    pub form_data: Option<FormData>,
    /// New payment status together with its payment date, written as a pair.
    pub payment: Option<(PaymentStatus, Option<String>)>,
}

impl RequestChange {
    /// Apply to a record in place and bump `updated_at`.
    pub fn apply_to(self, record: &mut RequestRecord, now: String) {
        if let Some(status) = self.status {
            record.status = status;
        }
        if let Some(assignee) = self.assignee_id {
            record.assignee_id = Some(assignee);
        }
        if let Some(note) = self.citizen_note {
            record.citizen_note = note;
        }
        if let Some(note) = self.officer_note {
            record.officer_note = note;
        }
        if let Some(attachment) = self.attachment {
            record.attachment = attachment;
        }
        if let Some(form_data) = self.form_data {
            record.form_data = form_data;
        }
        if let Some((payment_status, payment_date)) = self.payment {
            record.payment_status = payment_status;
            record.payment_date = payment_date;
        }
        record.updated_at = now;
    }
}

/// Expected assignee in a [`RequestGuard`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum AssigneeGuard {
    #[default]
    Any,
    Unassigned,
    Is(UserId),
}

/// The WHERE clause of a conditional write: every `Some` field must equal the
/// stored value for the write to apply.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RequestGuard {
    pub status: Option<RequestStatus>,
    pub owner_id: Option<UserId>,
    pub assignee: AssigneeGuard,
    pub payment_status: Option<PaymentStatus>,
}

impl RequestGuard {
    pub fn any() -> Self {
        Self::default()
    }

    pub fn status(mut self, status: RequestStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn owner(mut self, owner_id: UserId) -> Self {
        self.owner_id = Some(owner_id);
        self
    }

    pub fn assignee(mut self, assignee: AssigneeGuard) -> Self {
        self.assignee = assignee;
        self
    }

    pub fn payment_status(mut self, payment_status: PaymentStatus) -> Self {
        self.payment_status = Some(payment_status);
        self
    }

    pub fn matches(&self, record: &RequestRecord) -> bool {
        if self.status.is_some_and(|s| s != record.status) {
            return false;
        }
        if self.owner_id.is_some_and(|o| o != record.owner_id) {
            return false;
        }
        if self.payment_status.is_some_and(|p| p != record.payment_status) {
            return false;
        }
        match self.assignee {
            AssigneeGuard::Any => true,
            AssigneeGuard::Unassigned => record.assignee_id.is_none(),
            AssigneeGuard::Is(id) => record.assignee_id == Some(id),
        }
    }
}

/// Which requests a caller may see. Backends translate this into a query
/// predicate; [`RequestScope::admits`] is the same predicate in memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestScope {
    All,
    OwnedBy(UserId),
    /// `assignee_id = officer OR (status = SUBMITTED AND assignee_id IS NULL)`
    OfficerQueue(UserId),
}

impl RequestScope {
    pub fn admits(&self, record: &RequestRecord) -> bool {
        match *self {
            RequestScope::All => true,
            RequestScope::OwnedBy(owner) => record.owner_id == owner,
            RequestScope::OfficerQueue(officer) => {
                record.assignee_id == Some(officer)
                    || (record.status == RequestStatus::Submitted && record.assignee_id.is_none())
            }
        }
    }
}

/// Query for `list_requests`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestFilter {
    pub scope: RequestScope,
    pub status: Option<RequestStatus>,
    pub service_id: Option<ServiceId>,
}

impl RequestFilter {
    pub fn scoped(scope: RequestScope) -> Self {
        Self {
            scope,
            status: None,
            service_id: None,
        }
    }

    pub fn matches(&self, record: &RequestRecord) -> bool {
        self.scope.admits(record)
            && self.status.is_none_or(|s| s == record.status)
            && self.service_id.is_none_or(|id| id == record.service_id)
    }
}

// ── Catalog ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstitutionRecord {
    pub id: i64,
    pub name: String,
    pub city: String,
    pub address: String,
    pub email: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewInstitution {
    pub name: String,
    pub city: String,
    pub address: String,
    #[serde(default)]
    pub email: Option<String>,
}

/// Partial institution update; `None` leaves a field untouched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InstitutionChange {
    pub name: Option<String>,
    pub city: Option<String>,
    pub address: Option<String>,
    pub email: Option<Option<String>>,
}

impl InstitutionChange {
    pub fn apply_to(self, record: &mut InstitutionRecord) {
        if let Some(v) = self.name {
            record.name = v;
        }
        if let Some(v) = self.city {
            record.city = v;
        }
        if let Some(v) = self.address {
            record.address = v;
        }
        if let Some(v) = self.email {
            record.email = v;
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TypeRecord {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewType {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TypeChange {
    pub name: Option<String>,
    pub description: Option<Option<String>>,
}

impl TypeChange {
    pub fn apply_to(self, record: &mut TypeRecord) {
        if let Some(v) = self.name {
            record.name = v;
        }
        if let Some(v) = self.description {
            record.description = v;
        }
    }
}

/// A catalog service. `fee` serializes as a decimal string.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceRecord {
    pub id: ServiceId,
    pub institution_id: i64,
    pub type_id: i64,
    pub name: String,
    pub description: Option<String>,
    pub fee: Decimal,
    pub requires_attachment: bool,
    pub status: ServiceStatus,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewService {
    pub institution_id: i64,
    pub type_id: i64,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub fee: Decimal,
    #[serde(default)]
    pub requires_attachment: bool,
    pub status: ServiceStatus,
}

/// Partial service update; `None` leaves a field untouched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ServiceChange {
    pub institution_id: Option<i64>,
    pub type_id: Option<i64>,
    pub name: Option<String>,
    pub description: Option<Option<String>>,
    pub fee: Option<Decimal>,
    pub requires_attachment: Option<bool>,
    pub status: Option<ServiceStatus>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ServiceFilter {
    pub active_only: bool,
    pub institution_id: Option<i64>,
    pub type_id: Option<i64>,
}

impl ServiceFilter {
    pub fn matches(&self, service: &ServiceRecord) -> bool {
        (!self.active_only || service.status == ServiceStatus::Active)
            && self.institution_id.is_none_or(|id| id == service.institution_id)
            && self.type_id.is_none_or(|id| id == service.type_id)
    }
}

// ── Users and sessions ───────────────────────────────────────────────────────

/// A portal user. The password hash never leaves the backend in API output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserRecord {
    pub id: UserId,
    pub name: String,
    pub email: String,
    /// `YYYY-MM-DD`.
    pub date_of_birth: String,
    pub jmbg: String,
    pub role: Role,
    #[serde(skip_serializing, default)]
    pub password_hash: String,
    pub created_at: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub date_of_birth: String,
    pub jmbg: String,
    pub role: Role,
    pub password_hash: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(status: RequestStatus, assignee_id: Option<UserId>) -> RequestRecord {
        RequestRecord {
            id: 1,
            owner_id: 10,
            service_id: 5,
            assignee_id,
            status,
            citizen_note: None,
            officer_note: None,
            attachment: None,
            form_data: FormData::new(),
            payment_status: PaymentStatus::NotPaid,
            payment_date: None,
            created_at: "2025-01-01T00:00:00Z".to_string(),
            updated_at: "2025-01-01T00:00:00Z".to_string(),
        }
    }

    #[test]
    fn enum_wire_spelling_round_trips() {
        for status in RequestStatus::ALL {
            assert_eq!(RequestStatus::parse(status.as_str()), Some(*status));
        }
        assert_eq!(
            serde_json::to_value(PaymentStatus::NotRequired).unwrap(),
            serde_json::json!("NOT_REQUIRED")
        );
        assert_eq!(RequestStatus::parse("draft"), None);
    }

    #[test]
    fn officer_queue_admits_inbox_and_own_work() {
        let scope = RequestScope::OfficerQueue(7);
        assert!(scope.admits(&record(RequestStatus::Submitted, None)));
        assert!(scope.admits(&record(RequestStatus::InReview, Some(7))));
        assert!(scope.admits(&record(RequestStatus::Approved, Some(7))));
        assert!(!scope.admits(&record(RequestStatus::InReview, Some(8))));
        assert!(!scope.admits(&record(RequestStatus::Draft, None)));
    }

    #[test]
    fn guard_checks_every_expected_field() {
        let rec = record(RequestStatus::Submitted, None);
        assert!(RequestGuard::any().matches(&rec));
        assert!(RequestGuard::any()
            .status(RequestStatus::Submitted)
            .assignee(AssigneeGuard::Unassigned)
            .matches(&rec));
        assert!(!RequestGuard::any()
            .status(RequestStatus::Draft)
            .matches(&rec));
        assert!(!RequestGuard::any().owner(11).matches(&rec));
        assert!(!RequestGuard::any()
            .assignee(AssigneeGuard::Is(7))
            .matches(&rec));
        assert!(!RequestGuard::any()
            .payment_status(PaymentStatus::Paid)
            .matches(&rec));
    }

    #[test]
    fn change_never_clears_assignee() {
        let mut rec = record(RequestStatus::InReview, Some(7));
        RequestChange {
            status: Some(RequestStatus::Approved),
            ..Default::default()
        }
        .apply_to(&mut rec, "2025-01-02T00:00:00Z".to_string());
        assert_eq!(rec.assignee_id, Some(7));
        assert_eq!(rec.status, RequestStatus::Approved);
        assert_eq!(rec.updated_at, "2025-01-02T00:00:00Z");
    }

    #[test]
    fn timestamps_are_rfc3339_or_an_error() {
        let now = timestamp_now().unwrap();
        assert!(OffsetDateTime::parse(&now, &Rfc3339).is_ok());

        let before_year_zero = time::Date::from_calendar_date(-1, time::Month::January, 1)
            .unwrap()
            .midnight()
            .assume_utc();
        assert!(matches!(
            format_timestamp(before_year_zero),
            Err(StorageError::Backend(_))
        ));
    }

    #[test]
    fn catalog_changes_leave_absent_fields_alone() {
        let mut inst = InstitutionRecord {
            id: 1,
            name: "MUP".to_string(),
            city: "Beograd".to_string(),
            address: "Kneza Miloša 103".to_string(),
            email: Some("mup@gov.rs".to_string()),
        };
        InstitutionChange {
            city: Some("Niš".to_string()),
            email: Some(None),
            ..Default::default()
        }
        .apply_to(&mut inst);
        assert_eq!(inst.name, "MUP");
        assert_eq!(inst.city, "Niš");
        assert_eq!(inst.email, None);

        let mut ty = TypeRecord {
            id: 2,
            name: "Permits".to_string(),
            description: Some("Building".to_string()),
        };
        TypeChange {
            name: Some("Licences".to_string()),
            description: None,
        }
        .apply_to(&mut ty);
        assert_eq!(ty.name, "Licences");
        assert_eq!(ty.description.as_deref(), Some("Building"));
    }
}
