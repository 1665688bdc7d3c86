//! Audit trail handlers

use crate::auth::models::AuthUser;
use crate::error::HttpAppError;
use crate::handlers::require_membership;
use crate::state::AppState;
use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
    Json,
};
use opsdesk_core::AppError;
use serde::Deserialize;
use std::sync::Arc;
use uuid::Uuid;

/// Query parameters for listing audit entries
#[derive(Debug, Deserialize)]
pub struct ListAuditLogQuery {
    #[serde(default = "default_limit")]
    pub limit: i64,
    #[serde(default)]
    pub offset: i64,
}

fn default_limit() -> i64 {
    50
}

/// List an organization's audit trail, newest first. Owners and admins only.
#[tracing::instrument(skip(state), fields(user_id = %auth.user_id))]
pub async fn list_audit_log(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Path(org_id): Path<Uuid>,
    Query(query): Query<ListAuditLogQuery>,
) -> Result<impl IntoResponse, HttpAppError> {
    let membership = require_membership(&state, auth.user_id, org_id).await?;
    if !membership.role.can_view_audit_log() {
        return Err(HttpAppError(AppError::Forbidden(
            "Only an owner or admin may view the audit log".to_string(),
        )));
    }

    let limit = query.limit.clamp(1, 100);
    let offset = query.offset.max(0);

    let entries = state.db.audit_log.list_by_org(org_id, limit, offset).await?;
    let total = state.db.audit_log.count_by_org(org_id).await?;

    Ok(Json(serde_json::json!({
        "items": entries,
        "total": total,
        "limit": limit,
        "offset": offset,
    })))
}
