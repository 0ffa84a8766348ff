//! Payment status of a service request.
//!
//! A request for a free service is `NOT_REQUIRED` for its whole life. A
//! request for a paid service moves freely among `NOT_PAID`, `PENDING` and
//! `PAID`. `payment_date` is set exactly while the status is `PAID`.

use euprava_storage::{PaymentStatus, ServiceRecord};
use rust_decimal::Decimal;

use crate::error::PortalError;

/// Payment status a new request starts with.
pub fn initial_status(service: &ServiceRecord) -> PaymentStatus {
    if service.fee > Decimal::ZERO {
        PaymentStatus::NotPaid
    } else {
        PaymentStatus::NotRequired
    }
}

/// Validate a payment update and compute the `(status, date)` pair to write.
pub fn plan_update(
    current: PaymentStatus,
    target: PaymentStatus,
    now: &str,
) -> Result<(PaymentStatus, Option<String>), PortalError> {
    let requires_payment = current != PaymentStatus::NotRequired;
    if requires_payment == (target == PaymentStatus::NotRequired) {
        let reason = if requires_payment {
            "a payable request cannot become NOT_REQUIRED"
        } else {
            "the service for this request has no fee"
        };
        return Err(PortalError::PreconditionFailed(format!(
            "cannot change payment status from {current} to {target}: {reason}"
        )));
    }
    let date = (target == PaymentStatus::Paid).then(|| now.to_string());
    Ok((target, date))
}

#[cfg(test)]
mod tests {
    use super::*;
    use euprava_storage::ServiceStatus;
    use PaymentStatus::*;

    fn service(fee: Decimal) -> ServiceRecord {
        ServiceRecord {
            id: 1,
            institution_id: 1,
            type_id: 1,
            name: "Passport".to_string(),
            description: None,
            fee,
            requires_attachment: false,
            status: ServiceStatus::Active,
        }
    }

    #[test]
    fn initial_status_follows_fee() {
        assert_eq!(initial_status(&service(Decimal::new(50000, 2))), NotPaid);
        assert_eq!(initial_status(&service(Decimal::ZERO)), NotRequired);
    }

    #[test]
    fn paid_sets_date_and_leaving_paid_clears_it() {
        let now = "2025-03-01T10:00:00Z";
        assert_eq!(
            plan_update(NotPaid, Paid, now).unwrap(),
            (Paid, Some(now.to_string()))
        );
        assert_eq!(plan_update(Paid, NotPaid, now).unwrap(), (NotPaid, None));
        assert_eq!(plan_update(Pending, Pending, now).unwrap(), (Pending, None));
    }

    #[test]
    fn free_requests_stay_not_required() {
        let now = "2025-03-01T10:00:00Z";
        assert_eq!(
            plan_update(NotRequired, NotRequired, now).unwrap(),
            (NotRequired, None)
        );
        for target in [NotPaid, Pending, Paid] {
            assert!(matches!(
                plan_update(NotRequired, target, now),
                Err(PortalError::PreconditionFailed(_))
            ));
        }
        assert!(matches!(
            plan_update(Paid, NotRequired, now),
            Err(PortalError::PreconditionFailed(_))
        ));
    }
}
