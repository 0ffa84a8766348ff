use euprava_storage::{RequestRecord, RequestScope, Role};

use crate::error::PortalError;
use crate::identity::Actor;

/// The set of requests an actor may list and view.
///
/// Listing and single-record reads share this one predicate, so a request
/// is returned by `GET /service-requests/{id}` iff it would appear in the
/// caller's unfiltered list.
pub fn scope_for(actor: &Actor) -> RequestScope {
    match actor.role {
        Role::Citizen => RequestScope::OwnedBy(actor.id),
        Role::Officer => RequestScope::OfficerQueue(actor.id),
        Role::Admin => RequestScope::All,
    }
}

pub fn ensure_visible(actor: &Actor, record: &RequestRecord) -> Result<(), PortalError> {
    if scope_for(actor).admits(record) {
        Ok(())
    } else {
        Err(PortalError::Forbidden(format!(
            "not allowed to view service request {}",
            record.id
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use euprava_storage::{FormData, PaymentStatus, RequestStatus};

    fn record(owner_id: i64, status: RequestStatus, assignee_id: Option<i64>) -> RequestRecord {
        RequestRecord {
            id: 3,
            owner_id,
            service_id: 2,
            assignee_id,
            status,
            citizen_note: None,
            officer_note: None,
            attachment: None,
            form_data: FormData::new(),
            payment_status: PaymentStatus::NotRequired,
            payment_date: None,
            created_at: String::new(),
            updated_at: String::new(),
        }
    }

    #[test]
    fn citizens_see_only_their_own() {
        let own = Actor::new(10, Role::Citizen);
        assert!(ensure_visible(&own, &record(10, RequestStatus::Draft, None)).is_ok());
        assert!(matches!(
            ensure_visible(&own, &record(11, RequestStatus::Submitted, None)),
            Err(PortalError::Forbidden(_))
        ));
    }

    #[test]
    fn officers_never_see_drafts_or_colleagues_work() {
        let officer = Actor::new(7, Role::Officer);
        assert!(ensure_visible(&officer, &record(10, RequestStatus::Draft, None)).is_err());
        assert!(ensure_visible(&officer, &record(10, RequestStatus::Submitted, None)).is_ok());
        assert!(ensure_visible(&officer, &record(10, RequestStatus::InReview, Some(8))).is_err());
        assert!(ensure_visible(&officer, &record(10, RequestStatus::Rejected, Some(7))).is_ok());
    }

    #[test]
    fn admins_see_everything() {
        let admin = Actor::new(1, Role::Admin);
        assert_eq!(scope_for(&admin), RequestScope::All);
        assert!(ensure_visible(&admin, &record(10, RequestStatus::Draft, None)).is_ok());
    }
}
