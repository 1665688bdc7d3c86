//! Best-effort audit recording
//!
//! Audit facts are persisted after the primary operation has committed, in a
//! background task. A failed audit write never fails the request that caused
//! it; the failure is logged under the `audit` target instead.

use opsdesk_core::models::AuditAction;
use opsdesk_db::AuditLogRepository;
use uuid::Uuid;

#[derive(Clone)]
pub struct AuditSink {
    repository: AuditLogRepository,
}

impl AuditSink {
    pub fn new(repository: AuditLogRepository) -> Self {
        Self { repository }
    }

    /// Record an audit fact in the background. Call only after the mutation
    /// it describes has committed.
    pub fn record(
        &self,
        organization_id: Uuid,
        user_id: Uuid,
        action: AuditAction,
        ticket_id: Option<Uuid>,
        metadata: serde_json::Value,
    ) {
        tracing::info!(
            target: "audit",
            organization_id = %organization_id,
            user_id = %user_id,
            action = %action,
            ticket_id = ?ticket_id,
            "Audit event"
        );

        let repository = self.repository.clone();
        tokio::spawn(async move {
            if let Err(e) = repository
                .insert(organization_id, user_id, action, ticket_id, metadata)
                .await
            {
                tracing::warn!(
                    target: "audit",
                    error = %e,
                    organization_id = %organization_id,
                    "Failed to persist audit entry"
                );
            }
        });
    }
}
