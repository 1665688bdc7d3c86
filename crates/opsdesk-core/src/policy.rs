//! Authorization policy
//!
//! Pure decision functions mapping a role to its allowed actions. The role
//! hierarchy is represented as data (an explicit capability table), not as
//! inheritance; every function here is total over [`Role`].
//!
//! The one rule that cannot be expressed statically lives at the removal
//! boundary: an organization must always retain at least one Owner. That
//! check needs a live owner count and is enforced by the member handlers
//! inside the removal/demotion transaction.

use crate::models::Role;

impl Role {
    /// Whether this role may drive the ticket status state machine.
    /// Viewers are rejected before any transition-table lookup.
    pub fn can_change_ticket_status(&self) -> bool {
        !matches!(self, Role::Viewer)
    }

    /// Whether this role may edit ticket fields (title, description,
    /// assignee, requires_approval).
    pub fn can_edit_ticket_fields(&self) -> bool {
        matches!(self, Role::Owner | Role::Admin)
    }

    /// Whether this role may delete tickets.
    pub fn can_delete_ticket(&self) -> bool {
        matches!(self, Role::Owner | Role::Admin)
    }

    /// Whether this role may grant or change member roles.
    pub fn can_change_member_roles(&self) -> bool {
        matches!(self, Role::Owner)
    }

    /// Whether this role may remove members from the organization.
    pub fn can_remove_members(&self) -> bool {
        matches!(self, Role::Owner | Role::Admin)
    }

    /// Whether this role may read the organization's audit log.
    pub fn can_view_audit_log(&self) -> bool {
        matches!(self, Role::Owner | Role::Admin)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL_ROLES: [Role; 4] = [Role::Owner, Role::Admin, Role::Agent, Role::Viewer];

    #[test]
    fn test_status_change_capability() {
        assert!(Role::Owner.can_change_ticket_status());
        assert!(Role::Admin.can_change_ticket_status());
        assert!(Role::Agent.can_change_ticket_status());
        assert!(!Role::Viewer.can_change_ticket_status());
    }

    #[test]
    fn test_field_edit_capability() {
        assert!(Role::Owner.can_edit_ticket_fields());
        assert!(Role::Admin.can_edit_ticket_fields());
        assert!(!Role::Agent.can_edit_ticket_fields());
        assert!(!Role::Viewer.can_edit_ticket_fields());
    }

    #[test]
    fn test_delete_capability() {
        assert!(Role::Owner.can_delete_ticket());
        assert!(Role::Admin.can_delete_ticket());
        assert!(!Role::Agent.can_delete_ticket());
        assert!(!Role::Viewer.can_delete_ticket());
    }

    #[test]
    fn test_role_change_is_owner_only() {
        assert!(Role::Owner.can_change_member_roles());
        for role in [Role::Admin, Role::Agent, Role::Viewer] {
            assert!(!role.can_change_member_roles(), "{} must not change roles", role);
        }
    }

    #[test]
    fn test_member_removal_capability() {
        assert!(Role::Owner.can_remove_members());
        assert!(Role::Admin.can_remove_members());
        assert!(!Role::Agent.can_remove_members());
        assert!(!Role::Viewer.can_remove_members());
    }

    #[test]
    fn test_viewer_has_no_mutating_capability() {
        let viewer = Role::Viewer;
        assert!(!viewer.can_change_ticket_status());
        assert!(!viewer.can_edit_ticket_fields());
        assert!(!viewer.can_delete_ticket());
        assert!(!viewer.can_change_member_roles());
        assert!(!viewer.can_remove_members());
    }

    #[test]
    fn test_capability_functions_are_total() {
        // Every capability function must answer for every role.
        for role in ALL_ROLES {
            let _ = role.can_change_ticket_status();
            let _ = role.can_edit_ticket_fields();
            let _ = role.can_delete_ticket();
            let _ = role.can_change_member_roles();
            let _ = role.can_remove_members();
            let _ = role.can_view_audit_log();
        }
    }
}
