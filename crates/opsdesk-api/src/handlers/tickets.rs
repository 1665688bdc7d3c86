//! Ticket handlers
//!
//! The PATCH handler is the orchestration point for the lifecycle engine:
//! it computes the requested delta, asks [`plan_transition`] for the status
//! effects, gates field edits by role, and persists everything as one write.
//! A request producing no net change returns the unmodified ticket without
//! bumping `updated_at` or recording an audit entry.

use crate::auth::models::AuthUser;
use crate::error::{HttpAppError, ValidatedJson};
use crate::handlers::require_membership;
use crate::state::AppState;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use chrono::Utc;
use opsdesk_core::lifecycle::plan_transition;
use opsdesk_core::models::{AuditAction, Ticket, TicketFilter, TicketStatus};
use opsdesk_core::AppError;
use opsdesk_db::db::ticket::TicketUpdate;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateTicketRequest {
    #[validate(length(min = 1, max = 200))]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub requires_approval: bool,
    pub assignee_id: Option<Uuid>,
}

/// Partial update. Absent fields are untouched; `assignee_id: null`
/// explicitly unassigns (hence the double Option).
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct UpdateTicketRequest {
    #[validate(length(min = 1, max = 200))]
    pub title: Option<String>,
    pub description: Option<String>,
    pub status: Option<TicketStatus>,
    pub requires_approval: Option<bool>,
    #[serde(default)]
    #[schema(value_type = Option<Uuid>)]
    pub assignee_id: Option<Option<Uuid>>,
}

const DEFAULT_PAGE_LIMIT: i64 = 10;
const MAX_PAGE_LIMIT: i64 = 100;

/// Query parameters for listing tickets
#[derive(Debug, Deserialize)]
pub struct ListTicketsQuery {
    #[serde(default = "default_page")]
    pub page: i64,
    #[serde(default = "default_limit")]
    pub limit: i64,
    pub status: Option<TicketStatus>,
    pub assignee_id: Option<Uuid>,
    pub creator_id: Option<Uuid>,
}

fn default_page() -> i64 {
    1
}

fn default_limit() -> i64 {
    DEFAULT_PAGE_LIMIT
}

#[derive(Debug, Serialize, ToSchema)]
pub struct TicketListResponse {
    pub items: Vec<Ticket>,
    pub total: i64,
    pub page: i64,
    pub limit: i64,
    pub total_pages: i64,
}

/// Create a ticket. Any member may create; status is always `open`.
#[tracing::instrument(skip(state, request), fields(user_id = %auth.user_id))]
pub async fn create_ticket(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Path(org_id): Path<Uuid>,
    ValidatedJson(request): ValidatedJson<CreateTicketRequest>,
) -> Result<impl IntoResponse, HttpAppError> {
    request.validate().map_err(AppError::from)?;
    require_membership(&state, auth.user_id, org_id).await?;

    if let Some(assignee_id) = request.assignee_id {
        ensure_assignee_is_member(&state, org_id, assignee_id).await?;
    }

    let ticket = state
        .db
        .tickets
        .create(
            org_id,
            auth.user_id,
            &request.title,
            &request.description,
            request.requires_approval,
            request.assignee_id,
        )
        .await?;

    state.audit.record(
        org_id,
        auth.user_id,
        AuditAction::TicketCreated,
        Some(ticket.id),
        serde_json::json!({ "title": ticket.title }),
    );

    Ok((StatusCode::CREATED, Json(ticket)))
}

/// List tickets with optional status/assignee/creator filters, newest first.
/// A limit beyond 100 is rejected, not clamped.
#[tracing::instrument(skip(state), fields(user_id = %auth.user_id))]
pub async fn list_tickets(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Path(org_id): Path<Uuid>,
    Query(query): Query<ListTicketsQuery>,
) -> Result<impl IntoResponse, HttpAppError> {
    require_membership(&state, auth.user_id, org_id).await?;

    if query.page < 1 {
        return Err(HttpAppError(AppError::Validation(
            "page must be at least 1".to_string(),
        )));
    }
    if !(1..=MAX_PAGE_LIMIT).contains(&query.limit) {
        return Err(HttpAppError(AppError::Validation(format!(
            "limit must be between 1 and {}",
            MAX_PAGE_LIMIT
        ))));
    }

    let filter = TicketFilter {
        status: query.status,
        assignee_id: query.assignee_id,
        creator_id: query.creator_id,
    };
    let offset = (query.page - 1)
        .checked_mul(query.limit)
        .ok_or_else(|| AppError::Validation("page is out of range".to_string()))?;

    let items = state
        .db
        .tickets
        .list(org_id, &filter, query.limit, offset)
        .await?;
    let total = state.db.tickets.count(org_id, &filter).await?;

    Ok(Json(TicketListResponse {
        items,
        total,
        page: query.page,
        limit: query.limit,
        total_pages: (total + query.limit - 1) / query.limit,
    }))
}

/// Get a single ticket.
#[tracing::instrument(skip(state), fields(user_id = %auth.user_id))]
pub async fn get_ticket(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Path((org_id, ticket_id)): Path<(Uuid, Uuid)>,
) -> Result<impl IntoResponse, HttpAppError> {
    require_membership(&state, auth.user_id, org_id).await?;

    let ticket = state
        .db
        .tickets
        .get(org_id, ticket_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Ticket not found".to_string()))?;

    Ok(Json(ticket))
}

/// Apply a partial update to a ticket. Status changes go through the
/// lifecycle engine; other field edits require general edit permission.
#[tracing::instrument(skip(state, request), fields(user_id = %auth.user_id))]
pub async fn update_ticket(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Path((org_id, ticket_id)): Path<(Uuid, Uuid)>,
    ValidatedJson(request): ValidatedJson<UpdateTicketRequest>,
) -> Result<impl IntoResponse, HttpAppError> {
    request.validate().map_err(AppError::from)?;
    let membership = require_membership(&state, auth.user_id, org_id).await?;

    let ticket = state
        .db
        .tickets
        .get(org_id, ticket_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Ticket not found".to_string()))?;

    // Status legality and privilege are judged against the ticket's current
    // state before any field edits are considered.
    let outcome = match request.status {
        Some(requested) => plan_transition(
            ticket.status,
            requested,
            membership.role,
            ticket.resolved_at.is_some(),
            ticket.closed_at.is_some(),
        )
        .map_err(HttpAppError::from)?,
        None => None,
    };

    let mut update = TicketUpdate {
        title: ticket.title.clone(),
        description: ticket.description.clone(),
        status: ticket.status,
        requires_approval: ticket.requires_approval,
        assignee_id: ticket.assignee_id,
        approved_by_id: ticket.approved_by_id,
        approved_at: ticket.approved_at,
        resolved_at: ticket.resolved_at,
        closed_at: ticket.closed_at,
    };

    // Old/new pairs for the audit record; only actual changes count.
    let mut field_changes = serde_json::Map::new();

    if let Some(ref title) = request.title {
        if *title != ticket.title {
            field_changes.insert(
                "title".to_string(),
                serde_json::json!({ "old": ticket.title, "new": title }),
            );
            update.title = title.clone();
        }
    }
    if let Some(ref description) = request.description {
        if *description != ticket.description {
            field_changes.insert(
                "description".to_string(),
                serde_json::json!({ "old": ticket.description, "new": description }),
            );
            update.description = description.clone();
        }
    }
    if let Some(requires_approval) = request.requires_approval {
        if requires_approval != ticket.requires_approval {
            field_changes.insert(
                "requires_approval".to_string(),
                serde_json::json!({ "old": ticket.requires_approval, "new": requires_approval }),
            );
            update.requires_approval = requires_approval;
        }
    }
    if let Some(assignee_id) = request.assignee_id {
        if assignee_id != ticket.assignee_id {
            field_changes.insert(
                "assignee_id".to_string(),
                serde_json::json!({ "old": ticket.assignee_id, "new": assignee_id }),
            );
            update.assignee_id = assignee_id;
        }
    }

    if !field_changes.is_empty() && !membership.role.can_edit_ticket_fields() {
        return Err(HttpAppError(AppError::Forbidden(format!(
            "Role {} may not edit ticket fields",
            membership.role
        ))));
    }

    // Assignee validation runs after the permission gate so an unprivileged
    // caller gets the access error, not the membership one.
    if let Some(new_assignee) = update.assignee_id {
        if ticket.assignee_id != Some(new_assignee) {
            ensure_assignee_is_member(&state, org_id, new_assignee).await?;
        }
    }

    let mut changes = serde_json::Map::new();
    let status_changed = outcome.is_some();
    if let Some(outcome) = outcome {
        let now = Utc::now();
        update.status = outcome.next;
        if outcome.stamp_resolved_at {
            update.resolved_at = Some(now);
        }
        if outcome.stamp_closed_at {
            update.closed_at = Some(now);
        }
        // Entering Approved records who approved and when.
        if outcome.next == TicketStatus::Approved {
            update.approved_by_id = Some(auth.user_id);
            update.approved_at = Some(now);
        }
        changes.insert(
            "status".to_string(),
            serde_json::json!({ "old": outcome.previous, "new": outcome.next }),
        );
    }
    changes.extend(field_changes);

    if changes.is_empty() {
        return Ok(Json(ticket));
    }

    // The write is guarded on the status we read; a miss means the ticket
    // was transitioned (or deleted) underneath this request.
    let updated = match state
        .db
        .tickets
        .update(org_id, ticket_id, ticket.status, &update)
        .await?
    {
        Some(updated) => updated,
        None => {
            let err = if state.db.tickets.get(org_id, ticket_id).await?.is_some() {
                AppError::Conflict("Ticket was modified concurrently; re-read and retry".to_string())
            } else {
                AppError::NotFound("Ticket not found".to_string())
            };
            return Err(HttpAppError(err));
        }
    };

    let action = if status_changed {
        AuditAction::TicketStatusChanged
    } else {
        AuditAction::TicketUpdated
    };
    state.audit.record(
        org_id,
        auth.user_id,
        action,
        Some(ticket_id),
        serde_json::Value::Object(changes),
    );

    Ok(Json(updated))
}

/// Delete a ticket. Owners and admins only.
#[tracing::instrument(skip(state), fields(user_id = %auth.user_id))]
pub async fn delete_ticket(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Path((org_id, ticket_id)): Path<(Uuid, Uuid)>,
) -> Result<impl IntoResponse, HttpAppError> {
    let membership = require_membership(&state, auth.user_id, org_id).await?;
    if !membership.role.can_delete_ticket() {
        return Err(HttpAppError(AppError::Forbidden(
            "Only an owner or admin may delete tickets".to_string(),
        )));
    }

    let deleted = state.db.tickets.delete(org_id, ticket_id).await?;
    if !deleted {
        return Err(HttpAppError(AppError::NotFound(
            "Ticket not found".to_string(),
        )));
    }

    state.audit.record(
        org_id,
        auth.user_id,
        AuditAction::TicketDeleted,
        None,
        serde_json::json!({ "ticket_id": ticket_id }),
    );

    #[derive(serde::Serialize)]
    struct DeleteResponse {
        message: &'static str,
        ticket_id: Uuid,
    }

    Ok(Json(DeleteResponse {
        message: "Ticket deleted",
        ticket_id,
    }))
}

/// An assignee must belong to the ticket's organization.
async fn ensure_assignee_is_member(
    state: &AppState,
    org_id: Uuid,
    assignee_id: Uuid,
) -> Result<(), HttpAppError> {
    state
        .db
        .memberships
        .find_by_user_and_org(assignee_id, org_id)
        .await?
        .ok_or_else(|| {
            HttpAppError(AppError::Validation(
                "Assignee is not a member of this organization".to_string(),
            ))
        })?;
    Ok(())
}
