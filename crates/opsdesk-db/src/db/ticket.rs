use chrono::{DateTime, Utc};
use opsdesk_core::models::{Ticket, TicketFilter, TicketStatus};
use opsdesk_core::AppError;
use sqlx::{PgPool, Postgres};
use uuid::Uuid;

/// Field values written back by a ticket update. The caller (the PATCH
/// orchestration) has already decided which values change; the repository
/// persists the full mutable set in one statement. `organization_id` and
/// `creator_id` are deliberately absent: they are immutable after creation.
#[derive(Debug, Clone)]
pub struct TicketUpdate {
    pub title: String,
    pub description: String,
    pub status: TicketStatus,
    pub requires_approval: bool,
    pub assignee_id: Option<Uuid>,
    pub approved_by_id: Option<Uuid>,
    pub approved_at: Option<DateTime<Utc>>,
    pub resolved_at: Option<DateTime<Utc>>,
    pub closed_at: Option<DateTime<Utc>>,
}

#[derive(Clone)]
pub struct TicketRepository {
    pool: PgPool,
}

impl TicketRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create a ticket. Status is always `open` at creation; the
    /// `requires_approval` flag does not alter the initial status.
    #[tracing::instrument(skip(self, description), fields(db.table = "tickets", db.operation = "insert"))]
    pub async fn create(
        &self,
        organization_id: Uuid,
        creator_id: Uuid,
        title: &str,
        description: &str,
        requires_approval: bool,
        assignee_id: Option<Uuid>,
    ) -> Result<Ticket, AppError> {
        let ticket = sqlx::query_as::<Postgres, Ticket>(
            r#"
            INSERT INTO tickets (
                organization_id, title, description, status, requires_approval,
                creator_id, assignee_id
            )
            VALUES ($1, $2, $3, 'open', $4, $5, $6)
            RETURNING *
            "#,
        )
        .bind(organization_id)
        .bind(title)
        .bind(description)
        .bind(requires_approval)
        .bind(creator_id)
        .bind(assignee_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, organization_id = %organization_id, "Failed to create ticket");
            AppError::Database(e)
        })?;

        tracing::info!(
            ticket_id = %ticket.id,
            organization_id = %organization_id,
            "Ticket created"
        );

        Ok(ticket)
    }

    /// Get a ticket by id, scoped to its organization. A ticket belonging to
    /// another organization is indistinguishable from an absent one.
    #[tracing::instrument(skip(self), fields(db.table = "tickets", db.operation = "select", db.record_id = %id))]
    pub async fn get(&self, organization_id: Uuid, id: Uuid) -> Result<Option<Ticket>, AppError> {
        let ticket = sqlx::query_as::<Postgres, Ticket>(
            "SELECT * FROM tickets WHERE id = $1 AND organization_id = $2",
        )
        .bind(id)
        .bind(organization_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "Failed to get ticket");
            AppError::Database(e)
        })?;

        Ok(ticket)
    }

    /// List tickets matching the filter, newest first.
    #[tracing::instrument(skip(self, filter), fields(db.table = "tickets", db.operation = "select"))]
    pub async fn list(
        &self,
        organization_id: Uuid,
        filter: &TicketFilter,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Ticket>, AppError> {
        let tickets = sqlx::query_as::<Postgres, Ticket>(
            r#"
            SELECT * FROM tickets
            WHERE organization_id = $1
              AND ($2::ticket_status IS NULL OR status = $2)
              AND ($3::uuid IS NULL OR assignee_id = $3)
              AND ($4::uuid IS NULL OR creator_id = $4)
            ORDER BY created_at DESC
            LIMIT $5 OFFSET $6
            "#,
        )
        .bind(organization_id)
        .bind(filter.status)
        .bind(filter.assignee_id)
        .bind(filter.creator_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, organization_id = %organization_id, "Failed to list tickets");
            AppError::Database(e)
        })?;

        Ok(tickets)
    }

    /// Count tickets matching the filter (for pagination totals).
    #[tracing::instrument(skip(self, filter), fields(db.table = "tickets", db.operation = "count"))]
    pub async fn count(
        &self,
        organization_id: Uuid,
        filter: &TicketFilter,
    ) -> Result<i64, AppError> {
        let count: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM tickets
            WHERE organization_id = $1
              AND ($2::ticket_status IS NULL OR status = $2)
              AND ($3::uuid IS NULL OR assignee_id = $3)
              AND ($4::uuid IS NULL OR creator_id = $4)
            "#,
        )
        .bind(organization_id)
        .bind(filter.status)
        .bind(filter.assignee_id)
        .bind(filter.creator_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, organization_id = %organization_id, "Failed to count tickets");
            AppError::Database(e)
        })?;

        Ok(count)
    }

    /// Persist a ticket mutation and bump `updated_at`. Callers only reach
    /// this after computing a non-empty delta set against a ticket they read;
    /// `expected_status` is the status they observed. The write only lands if
    /// the row still carries that status, so a concurrent transition cannot
    /// be silently overwritten. `None` means the ticket is gone or was
    /// modified since the read.
    #[tracing::instrument(skip(self, update), fields(db.table = "tickets", db.operation = "update", db.record_id = %id))]
    pub async fn update(
        &self,
        organization_id: Uuid,
        id: Uuid,
        expected_status: TicketStatus,
        update: &TicketUpdate,
    ) -> Result<Option<Ticket>, AppError> {
        let ticket = sqlx::query_as::<Postgres, Ticket>(
            r#"
            UPDATE tickets
            SET title = $3,
                description = $4,
                status = $5,
                requires_approval = $6,
                assignee_id = $7,
                approved_by_id = $8,
                approved_at = $9,
                resolved_at = $10,
                closed_at = $11,
                updated_at = NOW()
            WHERE id = $1 AND organization_id = $2 AND status = $12
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(organization_id)
        .bind(&update.title)
        .bind(&update.description)
        .bind(update.status)
        .bind(update.requires_approval)
        .bind(update.assignee_id)
        .bind(update.approved_by_id)
        .bind(update.approved_at)
        .bind(update.resolved_at)
        .bind(update.closed_at)
        .bind(expected_status)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "Failed to update ticket");
            AppError::Database(e)
        })?;

        Ok(ticket)
    }

    /// Delete a ticket. Attachments and ticket-scoped audit rows go with it
    /// via foreign-key cascade.
    #[tracing::instrument(skip(self), fields(db.table = "tickets", db.operation = "delete", db.record_id = %id))]
    pub async fn delete(&self, organization_id: Uuid, id: Uuid) -> Result<bool, AppError> {
        let result = sqlx::query("DELETE FROM tickets WHERE id = $1 AND organization_id = $2")
            .bind(id)
            .bind(organization_id)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "Failed to delete ticket");
                AppError::Database(e)
            })?;

        Ok(result.rows_affected() > 0)
    }
}
