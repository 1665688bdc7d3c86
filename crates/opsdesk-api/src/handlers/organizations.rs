//! Organization handlers

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
pub struct CreateOrganizationRequest {
    #[validate(length(min = 1, max = 200))]
    pub name: String,
}

/// Create an additional organization. The caller becomes its Owner.
#[tracing::instrument(skip(state, request), fields(user_id = %auth.user_id))]
pub async fn create_organization(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    ValidatedJson(request): ValidatedJson<CreateOrganizationRequest>,
) -> Result<impl IntoResponse, HttpAppError> {
    request.validate().map_err(AppError::from)?;

    let mut tx = TransactionGuard::begin(&state.db.pool).await?;
    let organization = state
        .db
        .organizations
        .create_tx(&mut tx, &request.name)
        .await?;
    state
        .db
        .memberships
        .create_tx(&mut tx, auth.user_id, organization.id, Role::Owner)
        .await?;
    tx.commit().await?;

    state.audit.record(
        organization.id,
        auth.user_id,
        AuditAction::OrganizationCreated,
        None,
        serde_json::json!({ "organization_name": organization.name }),
    );

    Ok((StatusCode::CREATED, Json(organization)))
}

/// Get an organization the caller belongs to.
#[tracing::instrument(skip(state), fields(user_id = %auth.user_id))]
pub async fn get_organization(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Path(org_id): Path<Uuid>,
) -> Result<impl IntoResponse, HttpAppError> {
    require_membership(&state, auth.user_id, org_id).await?;

    let organization = state
        .db
        .organizations
        .get_by_id(org_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Organization not found".to_string()))?;

    Ok(Json(organization))
}
