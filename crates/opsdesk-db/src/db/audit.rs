use opsdesk_core::models::{AuditAction, AuditLogEntry};
use opsdesk_core::AppError;
use sqlx::{PgPool, Postgres};
use uuid::Uuid;

#[derive(Clone)]
pub struct AuditLogRepository {
    pool: PgPool,
}

impl AuditLogRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Append an audit fact. Rows are never updated or deleted by the
    /// application; callers treat failures as non-fatal.
    #[tracing::instrument(skip(self, metadata), fields(db.table = "audit_log", db.operation = "insert"))]
    pub async fn insert(
        &self,
        organization_id: Uuid,
        user_id: Uuid,
        action: AuditAction,
        ticket_id: Option<Uuid>,
        metadata: serde_json::Value,
    ) -> Result<AuditLogEntry, AppError> {
        let entry = sqlx::query_as::<Postgres, AuditLogEntry>(
            r#"
            INSERT INTO audit_log (organization_id, user_id, action, ticket_id, metadata)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *
            "#,
        )
        .bind(organization_id)
        .bind(user_id)
        .bind(action)
        .bind(ticket_id)
        .bind(metadata)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, organization_id = %organization_id, "Failed to insert audit entry");
            AppError::Database(e)
        })?;

        Ok(entry)
    }

    /// List an organization's audit trail, newest first.
    #[tracing::instrument(skip(self), fields(db.table = "audit_log", db.operation = "select"))]
    pub async fn list_by_org(
        &self,
        organization_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<AuditLogEntry>, AppError> {
        let entries = sqlx::query_as::<Postgres, AuditLogEntry>(
            r#"
            SELECT * FROM audit_log
            WHERE organization_id = $1
            ORDER BY created_at DESC
            LIMIT $2 OFFSET $3
            "#,
        )
        .bind(organization_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "Failed to list audit entries");
            AppError::Database(e)
        })?;

        Ok(entries)
    }

    /// Count an organization's audit entries (for pagination totals).
    #[tracing::instrument(skip(self), fields(db.table = "audit_log", db.operation = "count"))]
    pub async fn count_by_org(&self, organization_id: Uuid) -> Result<i64, AppError> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM audit_log WHERE organization_id = $1")
                .bind(organization_id)
                .fetch_one(&self.pool)
                .await
                .map_err(|e| {
                    tracing::error!(error = %e, "Failed to count audit entries");
                    AppError::Database(e)
                })?;

        Ok(count)
    }
}
