use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter, Result as FmtResult};
use utoipa::ToSchema;
use uuid::Uuid;

/// Closed set of auditable action kinds.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(
    feature = "sqlx",
    sqlx(type_name = "audit_action", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    OrganizationCreated,
    MemberAdded,
    MemberRoleChanged,
    MemberRemoved,
    TicketCreated,
    TicketUpdated,
    TicketStatusChanged,
    TicketDeleted,
}

impl Display for AuditAction {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        let s = match self {
            AuditAction::OrganizationCreated => "organization_created",
            AuditAction::MemberAdded => "member_added",
            AuditAction::MemberRoleChanged => "member_role_changed",
            AuditAction::MemberRemoved => "member_removed",
            AuditAction::TicketCreated => "ticket_created",
            AuditAction::TicketUpdated => "ticket_updated",
            AuditAction::TicketStatusChanged => "ticket_status_changed",
            AuditAction::TicketDeleted => "ticket_deleted",
        };
        write!(f, "{}", s)
    }
}

/// Append-only audit fact. Never updated or deleted by application code;
/// rows disappear only via organization/ticket cascade deletes.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct AuditLogEntry {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub user_id: Uuid,
    pub action: AuditAction,
    pub ticket_id: Option<Uuid>,
    /// Free-form key/value detail, e.g. `{"status": {"old": "open", "new": "closed"}}`.
    #[schema(value_type = Object)]
    pub metadata: serde_json::Value,
    pub created_at: DateTime<Utc>,
}
