use chrono::{DateTime, Utc};
use opsdesk_core::AppError;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool, Postgres};
use uuid::Uuid;

/// Server-side record of an issued refresh token. Only the SHA-256 digest of
/// the opaque token is stored; revocation is row deletion.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct RefreshToken {
    pub id: Uuid,
    pub user_id: Uuid,
    pub token_hash: String,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

#[derive(Clone)]
pub struct RefreshTokenRepository {
    pool: PgPool,
}

impl RefreshTokenRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Store a new refresh token digest with its expiry.
    #[tracing::instrument(skip(self, token_hash), fields(db.table = "refresh_tokens", db.operation = "insert"))]
    pub async fn insert(
        &self,
        user_id: Uuid,
        token_hash: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<RefreshToken, AppError> {
        let token = sqlx::query_as::<Postgres, RefreshToken>(
            r#"
            INSERT INTO refresh_tokens (user_id, token_hash, expires_at)
            VALUES ($1, $2, $3)
            RETURNING *
            "#,
        )
        .bind(user_id)
        .bind(token_hash)
        .bind(expires_at)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, user_id = %user_id, "Failed to store refresh token");
            AppError::Database(e)
        })?;

        Ok(token)
    }

    /// Look up an unexpired refresh token by digest.
    #[tracing::instrument(skip(self, token_hash), fields(db.table = "refresh_tokens", db.operation = "select"))]
    pub async fn find_valid(&self, token_hash: &str) -> Result<Option<RefreshToken>, AppError> {
        let token = sqlx::query_as::<Postgres, RefreshToken>(
            "SELECT * FROM refresh_tokens WHERE token_hash = $1 AND expires_at > NOW()",
        )
        .bind(token_hash)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "Failed to look up refresh token");
            AppError::Database(e)
        })?;

        Ok(token)
    }

    /// Revoke a refresh token by digest. Returns false when no row matched
    /// (already revoked or never issued).
    #[tracing::instrument(skip(self, token_hash), fields(db.table = "refresh_tokens", db.operation = "delete"))]
    pub async fn delete_by_hash(&self, token_hash: &str) -> Result<bool, AppError> {
        let result = sqlx::query("DELETE FROM refresh_tokens WHERE token_hash = $1")
            .bind(token_hash)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "Failed to delete refresh token");
                AppError::Database(e)
            })?;

        Ok(result.rows_affected() > 0)
    }

    /// Drop expired rows. Run opportunistically; losing the race with
    /// another instance is harmless.
    #[tracing::instrument(skip(self), fields(db.table = "refresh_tokens", db.operation = "delete"))]
    pub async fn delete_expired(&self) -> Result<u64, AppError> {
        let result = sqlx::query("DELETE FROM refresh_tokens WHERE expires_at <= NOW()")
            .execute(&self.pool)
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "Failed to purge expired refresh tokens");
                AppError::Database(e)
            })?;

        Ok(result.rows_affected())
    }
}
