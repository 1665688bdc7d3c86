//! Membership management handlers
//!
//! Role grants are Owner-only; removal is Owner or Admin. Both the demotion
//! and removal paths re-count Owners inside the mutating transaction so an
//! organization can never lose its last Owner.

use crate::auth::models::AuthUser;
use crate::error::{HttpAppError, ValidatedJson};
use crate::handlers::require_membership;
use crate::state::AppState;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use opsdesk_core::models::{AuditAction, Role};
use opsdesk_core::AppError;
use opsdesk_db::TransactionGuard;
use serde::Deserialize;
use std::sync::Arc;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct AddMemberRequest {
    #[validate(email(message = "must be a valid email address"))]
    pub email: String,
    pub role: Role,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateMemberRoleRequest {
    pub role: Role,
}

/// List an organization's members. Any member may look.
#[tracing::instrument(skip(state), fields(user_id = %auth.user_id))]
pub async fn list_members(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Path(org_id): Path<Uuid>,
) -> Result<impl IntoResponse, HttpAppError> {
    require_membership(&state, auth.user_id, org_id).await?;

    let members = state.db.memberships.list_by_org(org_id).await?;

    Ok(Json(members))
}

/// Add an existing user to the organization with a role. Granting a role is
/// Owner-only, the same rule as changing one.
#[tracing::instrument(skip(state, request), fields(user_id = %auth.user_id))]
pub async fn add_member(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Path(org_id): Path<Uuid>,
    ValidatedJson(request): ValidatedJson<AddMemberRequest>,
) -> Result<impl IntoResponse, HttpAppError> {
    request.validate().map_err(AppError::from)?;

    let membership = require_membership(&state, auth.user_id, org_id).await?;
    if !membership.role.can_change_member_roles() {
        return Err(HttpAppError(AppError::Forbidden(
            "Only an owner may add members".to_string(),
        )));
    }

    let user = state
        .db
        .users
        .find_by_email(&request.email)
        .await?
        .ok_or_else(|| AppError::NotFound("No user with this email".to_string()))?;

    let created = state
        .db
        .memberships
        .create(user.id, org_id, request.role)
        .await?;

    state.audit.record(
        org_id,
        auth.user_id,
        AuditAction::MemberAdded,
        None,
        serde_json::json!({ "member_id": user.id, "email": user.email, "role": request.role }),
    );

    Ok((StatusCode::CREATED, Json(created)))
}

/// Change a member's role. Demoting the last Owner is rejected.
#[tracing::instrument(skip(state, request), fields(user_id = %auth.user_id))]
pub async fn update_member_role(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Path((org_id, member_user_id)): Path<(Uuid, Uuid)>,
    ValidatedJson(request): ValidatedJson<UpdateMemberRoleRequest>,
) -> Result<impl IntoResponse, HttpAppError> {
    let membership = require_membership(&state, auth.user_id, org_id).await?;
    if !membership.role.can_change_member_roles() {
        return Err(HttpAppError(AppError::Forbidden(
            "Only an owner may change member roles".to_string(),
        )));
    }

    let target = state
        .db
        .memberships
        .find_by_user_and_org(member_user_id, org_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Member not found".to_string()))?;

    let mut tx = TransactionGuard::begin(&state.db.pool).await?;
    if target.role == Role::Owner && request.role != Role::Owner {
        let owners = state.db.memberships.count_owners_tx(&mut tx, org_id).await?;
        if owners <= 1 {
            tx.rollback().await?;
            return Err(HttpAppError(AppError::Validation(
                "Cannot demote the organization's only owner".to_string(),
            )));
        }
    }
    let updated = match state
        .db
        .memberships
        .update_role_tx(&mut tx, org_id, member_user_id, request.role)
        .await?
    {
        Some(updated) => updated,
        None => {
            tx.rollback().await?;
            return Err(HttpAppError(AppError::NotFound(
                "Member not found".to_string(),
            )));
        }
    };
    tx.commit().await?;

    state.audit.record(
        org_id,
        auth.user_id,
        AuditAction::MemberRoleChanged,
        None,
        serde_json::json!({
            "member_id": member_user_id,
            "old_role": target.role,
            "new_role": request.role,
        }),
    );

    Ok(Json(updated))
}

/// Remove a member. Removing the last Owner (including Owner self-removal)
/// is rejected.
#[tracing::instrument(skip(state), fields(user_id = %auth.user_id))]
pub async fn remove_member(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Path((org_id, member_user_id)): Path<(Uuid, Uuid)>,
) -> Result<impl IntoResponse, HttpAppError> {
    let membership = require_membership(&state, auth.user_id, org_id).await?;
    if !membership.role.can_remove_members() {
        return Err(HttpAppError(AppError::Forbidden(
            "Only an owner or admin may remove members".to_string(),
        )));
    }

    let target = state
        .db
        .memberships
        .find_by_user_and_org(member_user_id, org_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Member not found".to_string()))?;

    let mut tx = TransactionGuard::begin(&state.db.pool).await?;
    if target.role == Role::Owner {
        let owners = state.db.memberships.count_owners_tx(&mut tx, org_id).await?;
        if owners <= 1 {
            tx.rollback().await?;
            return Err(HttpAppError(AppError::Validation(
                "Cannot remove the organization's last owner".to_string(),
            )));
        }
    }
    let removed = state
        .db
        .memberships
        .delete_tx(&mut tx, org_id, member_user_id)
        .await?;
    if !removed {
        tx.rollback().await?;
        return Err(HttpAppError(AppError::NotFound(
            "Member not found".to_string(),
        )));
    }
    tx.commit().await?;

    state.audit.record(
        org_id,
        auth.user_id,
        AuditAction::MemberRemoved,
        None,
        serde_json::json!({ "member_id": member_user_id, "role": target.role }),
    );

    #[derive(serde::Serialize)]
    struct RemoveResponse {
        message: &'static str,
        member_id: Uuid,
    }

    Ok(Json(RemoveResponse {
        message: "Member removed",
        member_id: member_user_id,
    }))
}
