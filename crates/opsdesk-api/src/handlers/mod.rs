use crate::error::HttpAppError;
use crate::state::AppState;
use opsdesk_core::models::Membership;
use opsdesk_core::AppError;
use uuid::Uuid;

pub mod audit_log;
pub mod auth;
pub mod health;
pub mod members;
pub mod organizations;
pub mod tickets;

/// Resolve the caller's membership in an organization, treating absence as an
/// access denial. Every organization-scoped handler goes through this.
pub(crate) async fn require_membership(
    state: &AppState,
    user_id: Uuid,
    organization_id: Uuid,
) -> Result<Membership, HttpAppError> {
    state
        .db
        .memberships
        .find_by_user_and_org(user_id, organization_id)
        .await?
        .ok_or_else(|| HttpAppError(AppError::Forbidden("Not a member of this organization".to_string())))
}
