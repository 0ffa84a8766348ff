use euprava_storage::RequestStatus;

/// Statuses reachable from `from` in one step.
///
/// ```text
/// DRAFT -> SUBMITTED -> IN_REVIEW -> APPROVED
///                                 \-> REJECTED
/// ```
pub fn successors(from: RequestStatus) -> &'static [RequestStatus] {
    use RequestStatus::*;
    match from {
        Draft => &[Submitted],
        Submitted => &[InReview],
        InReview => &[Approved, Rejected],
        Approved | Rejected => &[],
    }
}

pub fn can_transition(from: RequestStatus, to: RequestStatus) -> bool {
    successors(from).contains(&to)
}

pub fn is_terminal(status: RequestStatus) -> bool {
    successors(status).is_empty()
}

#[cfg(test)]
mod tests {
    use super::*;
    use RequestStatus::*;

    /// Position along the forward path.
    fn rank(status: RequestStatus) -> u8 {
        match status {
            Draft => 0,
            Submitted => 1,
            InReview => 2,
            Approved | Rejected => 3,
        }
    }

    #[test]
    fn graph_only_moves_forward() {
        for from in RequestStatus::ALL {
            for to in successors(*from) {
                assert!(rank(*to) > rank(*from), "{from} -> {to} goes backwards");
            }
        }
    }

    #[test]
    fn terminal_states() {
        assert!(is_terminal(Approved));
        assert!(is_terminal(Rejected));
        assert!(!is_terminal(InReview));
        assert!(!can_transition(Approved, Rejected));
        assert!(!can_transition(Rejected, Draft));
    }

    #[test]
    fn no_skipping_review() {
        assert!(!can_transition(Submitted, Approved));
        assert!(!can_transition(Draft, InReview));
        assert!(can_transition(InReview, Rejected));
    }
}
