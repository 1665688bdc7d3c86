use opsdesk_core::models::{MemberWithUser, Membership, Role};
use opsdesk_core::AppError;
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

#[derive(Clone)]
pub struct MembershipRepository {
    pool: PgPool,
}

impl MembershipRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Resolve a user's membership within an organization.
    ///
    /// Pure lookup on the unique (user, organization) pair. Absence is not
    /// an error here; callers convert it into an access denial.
    #[tracing::instrument(skip(self), fields(db.table = "memberships", db.operation = "select"))]
    pub async fn find_by_user_and_org(
        &self,
        user_id: Uuid,
        organization_id: Uuid,
    ) -> Result<Option<Membership>, AppError> {
        let membership = sqlx::query_as::<Postgres, Membership>(
            "SELECT * FROM memberships WHERE user_id = $1 AND organization_id = $2",
        )
        .bind(user_id)
        .bind(organization_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "Failed to resolve membership");
            AppError::Database(e)
        })?;

        Ok(membership)
    }

    /// Create a membership. The unique (user, organization) constraint turns
    /// concurrent duplicate adds into a conflict for one of the writers.
    #[tracing::instrument(skip(self), fields(db.table = "memberships", db.operation = "insert"))]
    pub async fn create(
        &self,
        user_id: Uuid,
        organization_id: Uuid,
        role: Role,
    ) -> Result<Membership, AppError> {
        let membership = sqlx::query_as::<Postgres, Membership>(
            r#"
            INSERT INTO memberships (user_id, organization_id, role)
            VALUES ($1, $2, $3)
            RETURNING *
            "#,
        )
        .bind(user_id)
        .bind(organization_id)
        .bind(role)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(ref db_err) = e {
                if db_err.is_unique_violation() {
                    return AppError::Conflict(
                        "User is already a member of this organization".to_string(),
                    );
                }
            }
            tracing::error!(error = %e, "Failed to create membership");
            AppError::Database(e)
        })?;

        tracing::info!(
            user_id = %user_id,
            organization_id = %organization_id,
            role = %role,
            "Membership created"
        );

        Ok(membership)
    }

    /// Create a membership inside an existing transaction (signup / org creation).
    #[tracing::instrument(skip(self, tx), fields(db.table = "memberships", db.operation = "insert"))]
    pub async fn create_tx(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        user_id: Uuid,
        organization_id: Uuid,
        role: Role,
    ) -> Result<Membership, AppError> {
        let membership = sqlx::query_as::<Postgres, Membership>(
            r#"
            INSERT INTO memberships (user_id, organization_id, role)
            VALUES ($1, $2, $3)
            RETURNING *
            "#,
        )
        .bind(user_id)
        .bind(organization_id)
        .bind(role)
        .fetch_one(&mut **tx)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "Failed to create membership");
            AppError::Database(e)
        })?;

        Ok(membership)
    }

    /// List an organization's members with their user records.
    #[tracing::instrument(skip(self), fields(db.table = "memberships", db.operation = "select"))]
    pub async fn list_by_org(
        &self,
        organization_id: Uuid,
    ) -> Result<Vec<MemberWithUser>, AppError> {
        let members = sqlx::query_as::<Postgres, MemberWithUser>(
            r#"
            SELECT
                m.user_id,
                m.organization_id,
                m.role,
                u.email,
                u.name,
                m.created_at
            FROM memberships m
            JOIN users u ON u.id = m.user_id
            WHERE m.organization_id = $1
            ORDER BY m.created_at ASC
            "#,
        )
        .bind(organization_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "Failed to list members");
            AppError::Database(e)
        })?;

        Ok(members)
    }

    /// Count the organization's Owner memberships inside a transaction,
    /// taking row locks on them. Used for the "cannot remove the last owner"
    /// check: the locks serialize concurrent removals/demotions, so two
    /// transactions cannot both count two owners and each delete one.
    #[tracing::instrument(skip(self, tx), fields(db.table = "memberships", db.operation = "count"))]
    pub async fn count_owners_tx(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        organization_id: Uuid,
    ) -> Result<i64, AppError> {
        let count: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM (
                SELECT id FROM memberships
                WHERE organization_id = $1 AND role = 'owner'
                FOR UPDATE
            ) AS owner_rows
            "#,
        )
        .bind(organization_id)
        .fetch_one(&mut **tx)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "Failed to count owners");
            AppError::Database(e)
        })?;

        Ok(count)
    }

    /// Change a member's role inside an existing transaction.
    #[tracing::instrument(skip(self, tx), fields(db.table = "memberships", db.operation = "update"))]
    pub async fn update_role_tx(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        organization_id: Uuid,
        user_id: Uuid,
        role: Role,
    ) -> Result<Option<Membership>, AppError> {
        let membership = sqlx::query_as::<Postgres, Membership>(
            r#"
            UPDATE memberships
            SET role = $3
            WHERE organization_id = $1 AND user_id = $2
            RETURNING *
            "#,
        )
        .bind(organization_id)
        .bind(user_id)
        .bind(role)
        .fetch_optional(&mut **tx)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "Failed to update member role");
            AppError::Database(e)
        })?;

        Ok(membership)
    }

    /// Remove a membership inside an existing transaction.
    #[tracing::instrument(skip(self, tx), fields(db.table = "memberships", db.operation = "delete"))]
    pub async fn delete_tx(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        organization_id: Uuid,
        user_id: Uuid,
    ) -> Result<bool, AppError> {
        let result =
            sqlx::query("DELETE FROM memberships WHERE organization_id = $1 AND user_id = $2")
                .bind(organization_id)
                .bind(user_id)
                .execute(&mut **tx)
                .await
                .map_err(|e| {
                    tracing::error!(error = %e, "Failed to delete membership");
                    AppError::Database(e)
                })?;

        Ok(result.rows_affected() > 0)
    }
}
