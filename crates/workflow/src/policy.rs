//! Who may perform which transition on a service request.
//!
//! Authorization is data, not code: [`RULES`] lists every (transition, role)
//! pair that is permitted, together with the relationship the caller must
//! have to the request and the status the request must be in. Anything not
//! listed is forbidden.

use euprava_storage::{AssigneeGuard, RequestGuard, RequestRecord, RequestStatus, Role};

use crate::error::PortalError;
use crate::identity::Actor;
use crate::lifecycle;

/// A mutating operation on a service request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Create,
    Edit,
    Submit,
    Assign,
    Decide,
    UpdatePayment,
    Delete,
}

impl Transition {
    pub fn as_str(self) -> &'static str {
        match self {
            Transition::Create => "create",
            Transition::Edit => "edit",
            Transition::Submit => "submit",
            Transition::Assign => "assign",
            Transition::Decide => "decide",
            Transition::UpdatePayment => "update payment",
            Transition::Delete => "delete",
        }
    }
}

/// Relationship between the caller and the request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    Any,
    /// Caller owns the request.
    Owner,
    /// Caller is the assigned officer.
    Assignee,
    /// The request has no assignee yet.
    Unassigned,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rule {
    pub transition: Transition,
    pub role: Role,
    pub access: Access,
    /// Required current status; `None` allows any status.
    pub status: Option<RequestStatus>,
}

const fn rule(
    transition: Transition,
    role: Role,
    access: Access,
    status: Option<RequestStatus>,
) -> Rule {
    Rule {
        transition,
        role,
        access,
        status,
    }
}

use Access::{Any, Assignee, Owner, Unassigned};
use RequestStatus::{Draft, InReview, Submitted};
use Role::{Admin, Citizen, Officer};

pub const RULES: &[Rule] = &[
    rule(Transition::Create, Citizen, Any, None),
    rule(Transition::Edit, Citizen, Owner, Some(Draft)),
    rule(Transition::Edit, Admin, Any, None),
    rule(Transition::Submit, Citizen, Owner, Some(Draft)),
    rule(Transition::Assign, Officer, Unassigned, Some(Submitted)),
    rule(Transition::Assign, Admin, Unassigned, Some(Submitted)),
    rule(Transition::Decide, Officer, Assignee, Some(InReview)),
    rule(Transition::Decide, Admin, Any, Some(InReview)),
    rule(Transition::UpdatePayment, Officer, Any, None),
    rule(Transition::UpdatePayment, Admin, Any, None),
    rule(Transition::Delete, Citizen, Owner, Some(Draft)),
    rule(Transition::Delete, Admin, Any, None),
];

/// The rule for a (transition, role) pair, if the role may attempt it at all.
pub fn rule_for(transition: Transition, role: Role) -> Option<&'static Rule> {
    RULES
        .iter()
        .find(|r| r.transition == transition && r.role == role)
}

/// Check role only; used for `Create`, where no record exists yet.
pub fn authorize_role(actor: &Actor, transition: Transition) -> Result<&'static Rule, PortalError> {
    rule_for(transition, actor.role).ok_or_else(|| {
        PortalError::Forbidden(format!(
            "role {} may not {} service requests",
            actor.role,
            transition.as_str()
        ))
    })
}

/// Check role and relationship against a loaded record.
///
/// `Unassigned` is a state condition rather than a relationship, so it is
/// left to [`check_status`] and the write guard.
pub fn authorize(
    actor: &Actor,
    transition: Transition,
    record: &RequestRecord,
) -> Result<&'static Rule, PortalError> {
    let rule = authorize_role(actor, transition)?;
    let related = match rule.access {
        Any | Unassigned => true,
        Owner => record.owner_id == actor.id,
        Assignee => record.assignee_id == Some(actor.id),
    };
    if !related {
        return Err(PortalError::Forbidden(format!(
            "not allowed to {} service request {}",
            transition.as_str(),
            record.id
        )));
    }
    Ok(rule)
}

/// Check the state preconditions a rule places on the record.
pub fn check_status(rule: &Rule, record: &RequestRecord) -> Result<(), PortalError> {
    if let Some(required) = rule.status {
        if record.status != required && lifecycle::is_terminal(record.status) {
            return Err(PortalError::PreconditionFailed(format!(
                "cannot {} service request {}: it is already {} and can no longer change",
                rule.transition.as_str(),
                record.id,
                record.status
            )));
        }
        if record.status != required {
            return Err(PortalError::PreconditionFailed(format!(
                "cannot {} a service request in status {} (expected {})",
                rule.transition.as_str(),
                record.status,
                required
            )));
        }
    }
    if rule.access == Unassigned && record.assignee_id.is_some() {
        return Err(PortalError::PreconditionFailed(format!(
            "service request {} is already assigned",
            record.id
        )));
    }
    Ok(())
}

/// The write guard that re-asserts, atomically, everything the rule checked.
pub fn guard_for(rule: &Rule, actor: &Actor) -> RequestGuard {
    let mut guard = match rule.status {
        Some(status) => RequestGuard::any().status(status),
        None => RequestGuard::any(),
    };
    match rule.access {
        Any => {}
        Owner => guard = guard.owner(actor.id),
        Assignee => guard = guard.assignee(AssigneeGuard::Is(actor.id)),
        Unassigned => guard = guard.assignee(AssigneeGuard::Unassigned),
    }
    guard
}

#[cfg(test)]
mod tests {
    use super::*;
    use euprava_storage::{FormData, PaymentStatus};

    fn record(owner_id: i64, status: RequestStatus, assignee_id: Option<i64>) -> RequestRecord {
        RequestRecord {
            id: 1,
            owner_id,
            service_id: 2,
            assignee_id,
            status,
            citizen_note: None,
            officer_note: None,
            attachment: None,
            form_data: FormData::new(),
            payment_status: PaymentStatus::NotPaid,
            payment_date: None,
            created_at: String::new(),
            updated_at: String::new(),
        }
    }

    #[test]
    fn every_pair_has_at_most_one_rule() {
        for a in RULES {
            let count = RULES
                .iter()
                .filter(|b| b.transition == a.transition && b.role == a.role)
                .count();
            assert_eq!(count, 1, "duplicate rule for {:?}/{:?}", a.transition, a.role);
        }
    }

    #[test]
    fn only_citizens_create() {
        assert!(authorize_role(&Actor::new(1, Citizen), Transition::Create).is_ok());
        assert!(matches!(
            authorize_role(&Actor::new(1, Officer), Transition::Create),
            Err(PortalError::Forbidden(_))
        ));
        assert!(authorize_role(&Actor::new(1, Admin), Transition::Create).is_err());
    }

    #[test]
    fn citizen_cannot_touch_foreign_request() {
        let rec = record(10, Draft, None);
        let stranger = Actor::new(11, Citizen);
        for t in [Transition::Edit, Transition::Submit, Transition::Delete] {
            assert!(matches!(
                authorize(&stranger, t, &rec),
                Err(PortalError::Forbidden(_))
            ));
        }
        assert!(authorize(&Actor::new(10, Citizen), Transition::Submit, &rec).is_ok());
    }

    #[test]
    fn officers_decide_only_their_own_assignments() {
        let rec = record(10, InReview, Some(7));
        assert!(authorize(&Actor::new(7, Officer), Transition::Decide, &rec).is_ok());
        assert!(matches!(
            authorize(&Actor::new(8, Officer), Transition::Decide, &rec),
            Err(PortalError::Forbidden(_))
        ));
        assert!(authorize(&Actor::new(1, Admin), Transition::Decide, &rec).is_ok());
    }

    #[test]
    fn assign_requires_unassigned_submitted() {
        let officer = Actor::new(7, Officer);
        let rule = authorize(&officer, Transition::Assign, &record(10, Submitted, None)).unwrap();
        assert!(check_status(rule, &record(10, Submitted, None)).is_ok());
        assert!(matches!(
            check_status(rule, &record(10, Submitted, Some(8))),
            Err(PortalError::PreconditionFailed(_))
        ));
        assert!(matches!(
            check_status(rule, &record(10, Draft, None)),
            Err(PortalError::PreconditionFailed(_))
        ));
    }

    #[test]
    fn finished_requests_say_so() {
        let rule = rule_for(Transition::Decide, Officer).unwrap();
        match check_status(rule, &record(10, RequestStatus::Approved, Some(7))) {
            Err(PortalError::PreconditionFailed(msg)) => {
                assert!(msg.contains("already APPROVED"), "{msg}")
            }
            other => panic!("expected PreconditionFailed, got {other:?}"),
        }
        match check_status(rule, &record(10, Submitted, None)) {
            Err(PortalError::PreconditionFailed(msg)) => {
                assert!(msg.contains("expected IN_REVIEW"), "{msg}")
            }
            other => panic!("expected PreconditionFailed, got {other:?}"),
        }
    }

    #[test]
    fn guard_reasserts_rule() {
        let officer = Actor::new(7, Officer);
        let rec = record(10, InReview, Some(7));
        let rule = rule_for(Transition::Decide, Officer).unwrap();
        let guard = guard_for(rule, &officer);
        assert_eq!(guard.status, Some(InReview));
        assert_eq!(guard.assignee, AssigneeGuard::Is(7));
        assert!(guard.matches(&rec));
        assert!(!guard.matches(&record(10, InReview, Some(8))));

        let admin_edit = rule_for(Transition::Edit, Admin).unwrap();
        let guard = guard_for(admin_edit, &Actor::new(1, Admin));
        assert_eq!(guard, RequestGuard::any());
    }
}
