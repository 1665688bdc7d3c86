use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter, Result as FmtResult};
use utoipa::ToSchema;
use uuid::Uuid;

/// Ticket lifecycle status.
///
/// `Open` is the sole initial status, set unconditionally at creation
/// (the `requires_approval` flag does not alter it). `Closed` is the sole
/// terminal status. Legal transitions between statuses are defined by the
/// table in [`crate::lifecycle`].
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(
    feature = "sqlx",
    sqlx(type_name = "ticket_status", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum TicketStatus {
    Open,
    PendingApproval,
    Approved,
    InProgress,
    Resolved,
    Closed,
}

impl Display for TicketStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            TicketStatus::Open => write!(f, "open"),
            TicketStatus::PendingApproval => write!(f, "pending_approval"),
            TicketStatus::Approved => write!(f, "approved"),
            TicketStatus::InProgress => write!(f, "in_progress"),
            TicketStatus::Resolved => write!(f, "resolved"),
            TicketStatus::Closed => write!(f, "closed"),
        }
    }
}

/// Ticket entity.
///
/// `organization_id` and `creator_id` are immutable after creation.
/// `resolved_at` and `closed_at` are monotonic milestones: stamped at most
/// once when the ticket first enters the corresponding status and never
/// cleared by later transitions.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Ticket {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub title: String,
    pub description: String,
    pub status: TicketStatus,
    pub requires_approval: bool,
    pub creator_id: Uuid,
    pub assignee_id: Option<Uuid>,
    pub approved_by_id: Option<Uuid>,
    pub approved_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
    pub closed_at: Option<DateTime<Utc>>,
}

/// Filter for ticket listings. All fields are optional conjuncts.
#[derive(Debug, Clone, Default)]
pub struct TicketFilter {
    pub status: Option<TicketStatus>,
    pub assignee_id: Option<Uuid>,
    pub creator_id: Option<Uuid>,
}
