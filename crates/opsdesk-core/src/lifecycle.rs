//! Ticket lifecycle engine
//!
//! The status state machine is represented as data: a closed mapping from
//! each status to its legal target set. [`plan_transition`] is the single
//! entry point; it is pure (no I/O, no clock access) and returns the effects
//! the caller must apply inside its transaction.
//!
//! Check order matters: a Viewer attempting even a table-legal transition is
//! rejected for insufficient privilege, not for an illegal transition, so
//! clients can render the correct guidance.

use crate::error::AppError;
use crate::models::{Role, TicketStatus};

/// Legal outbound transitions for each status. Any pair not listed is
/// illegal. `Closed` is terminal.
pub fn legal_targets(from: TicketStatus) -> &'static [TicketStatus] {
    match from {
        TicketStatus::Open => &[
            TicketStatus::PendingApproval,
            TicketStatus::InProgress,
            TicketStatus::Closed,
        ],
        TicketStatus::PendingApproval => &[TicketStatus::Approved, TicketStatus::Open],
        TicketStatus::Approved => &[TicketStatus::InProgress, TicketStatus::Closed],
        TicketStatus::InProgress => &[TicketStatus::Resolved, TicketStatus::Closed],
        TicketStatus::Resolved => &[TicketStatus::Closed],
        TicketStatus::Closed => &[],
    }
}

/// Effects of a legal transition, to be applied by the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransitionOutcome {
    pub previous: TicketStatus,
    pub next: TicketStatus,
    /// Stamp `resolved_at` with the current time. Only true on the first
    /// entry into `Resolved`; the milestone is never re-stamped or cleared.
    pub stamp_resolved_at: bool,
    /// Stamp `closed_at` with the current time, first entry into `Closed` only.
    pub stamp_closed_at: bool,
}

/// Decide whether `role` may move a ticket from `current` to `requested`.
///
/// Returns `Ok(None)` when `requested == current`: a same-status request is
/// a no-op for the state machine and the caller proceeds with any other
/// field updates without recording a status change.
///
/// `resolved_at_set` / `closed_at_set` tell the engine whether the milestone
/// timestamps already exist, so it can demand stamping exactly once.
pub fn plan_transition(
    current: TicketStatus,
    requested: TicketStatus,
    role: Role,
    resolved_at_set: bool,
    closed_at_set: bool,
) -> Result<Option<TransitionOutcome>, AppError> {
    if requested == current {
        return Ok(None);
    }

    // Role gate precedes the table lookup.
    if !role.can_change_ticket_status() {
        return Err(AppError::Forbidden(format!(
            "Role {} may not change ticket status",
            role
        )));
    }

    let allowed = legal_targets(current);
    if !allowed.contains(&requested) {
        return Err(AppError::InvalidTransition {
            current,
            requested,
            allowed,
        });
    }

    Ok(Some(TransitionOutcome {
        previous: current,
        next: requested,
        stamp_resolved_at: requested == TicketStatus::Resolved && !resolved_at_set,
        stamp_closed_at: requested == TicketStatus::Closed && !closed_at_set,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL_STATUSES: [TicketStatus; 6] = [
        TicketStatus::Open,
        TicketStatus::PendingApproval,
        TicketStatus::Approved,
        TicketStatus::InProgress,
        TicketStatus::Resolved,
        TicketStatus::Closed,
    ];

    fn plan(current: TicketStatus, requested: TicketStatus, role: Role) -> Result<Option<TransitionOutcome>, AppError> {
        plan_transition(current, requested, role, false, false)
    }

    #[test]
    fn test_open_edges_succeed_for_admin() {
        for target in [
            TicketStatus::PendingApproval,
            TicketStatus::InProgress,
            TicketStatus::Closed,
        ] {
            let outcome = plan(TicketStatus::Open, target, Role::Admin)
                .expect("legal transition")
                .expect("not a no-op");
            assert_eq!(outcome.previous, TicketStatus::Open);
            assert_eq!(outcome.next, target);
        }
    }

    #[test]
    fn test_in_progress_to_open_is_illegal_for_admin() {
        let err = plan(TicketStatus::InProgress, TicketStatus::Open, Role::Admin).unwrap_err();
        match err {
            AppError::InvalidTransition {
                current,
                requested,
                allowed,
            } => {
                assert_eq!(current, TicketStatus::InProgress);
                assert_eq!(requested, TicketStatus::Open);
                assert_eq!(allowed, &[TicketStatus::Resolved, TicketStatus::Closed]);
            }
            other => panic!("Expected InvalidTransition, got {:?}", other),
        }
    }

    #[test]
    fn test_closed_is_terminal() {
        for target in ALL_STATUSES {
            if target == TicketStatus::Closed {
                continue;
            }
            let err = plan(TicketStatus::Closed, target, Role::Owner).unwrap_err();
            assert!(matches!(err, AppError::InvalidTransition { .. }));
        }
    }

    #[test]
    fn test_every_illegal_pair_is_rejected_for_every_privileged_role() {
        for current in ALL_STATUSES {
            for requested in ALL_STATUSES {
                if requested == current || legal_targets(current).contains(&requested) {
                    continue;
                }
                for role in [Role::Owner, Role::Admin, Role::Agent] {
                    let err = plan(current, requested, role).unwrap_err();
                    assert!(
                        matches!(err, AppError::InvalidTransition { .. }),
                        "{:?} -> {:?} as {} should be InvalidTransition",
                        current,
                        requested,
                        role
                    );
                }
            }
        }
    }

    #[test]
    fn test_viewer_is_forbidden_regardless_of_table_membership() {
        for current in ALL_STATUSES {
            for requested in ALL_STATUSES {
                if requested == current {
                    continue;
                }
                let err = plan(current, requested, Role::Viewer).unwrap_err();
                assert!(
                    matches!(err, AppError::Forbidden(_)),
                    "viewer {:?} -> {:?} should be Forbidden, not a table error",
                    current,
                    requested
                );
            }
        }
    }

    #[test]
    fn test_same_status_request_is_a_noop_even_for_viewer() {
        for status in ALL_STATUSES {
            assert!(plan(status, status, Role::Viewer).unwrap().is_none());
            assert!(plan(status, status, Role::Owner).unwrap().is_none());
        }
    }

    #[test]
    fn test_entering_resolved_stamps_once() {
        let outcome = plan_transition(
            TicketStatus::InProgress,
            TicketStatus::Resolved,
            Role::Agent,
            false,
            false,
        )
        .unwrap()
        .unwrap();
        assert!(outcome.stamp_resolved_at);
        assert!(!outcome.stamp_closed_at);

        // A ticket that somehow re-enters Resolved must not re-stamp.
        let outcome = plan_transition(
            TicketStatus::InProgress,
            TicketStatus::Resolved,
            Role::Agent,
            true,
            false,
        )
        .unwrap()
        .unwrap();
        assert!(!outcome.stamp_resolved_at);
    }

    #[test]
    fn test_closing_after_resolution_keeps_resolved_at() {
        let outcome = plan_transition(
            TicketStatus::Resolved,
            TicketStatus::Closed,
            Role::Admin,
            true,
            false,
        )
        .unwrap()
        .unwrap();
        assert!(!outcome.stamp_resolved_at, "resolved_at must never be re-stamped");
        assert!(outcome.stamp_closed_at);
    }

    #[test]
    fn test_approval_flow_round_trip() {
        // open -> pending_approval -> approved -> (per table) and
        // pending_approval -> open is the rejection path.
        assert!(plan(TicketStatus::Open, TicketStatus::PendingApproval, Role::Agent)
            .unwrap()
            .is_some());
        assert!(plan(TicketStatus::PendingApproval, TicketStatus::Approved, Role::Admin)
            .unwrap()
            .is_some());
        assert!(plan(TicketStatus::PendingApproval, TicketStatus::Open, Role::Admin)
            .unwrap()
            .is_some());
        assert!(plan(TicketStatus::Approved, TicketStatus::InProgress, Role::Agent)
            .unwrap()
            .is_some());
    }
}
