use opsdesk_core::models::{slugify, Organization};
use opsdesk_core::AppError;
use rand::Rng;
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

/// Attempts before giving up on finding a free slug. Each retry appends a
/// fresh random suffix, so collisions past the first attempt are unlikely.
const SLUG_ATTEMPTS: usize = 4;

fn random_slug_suffix() -> String {
    let mut rng = rand::rng();
    let bytes: [u8; 3] = rng.random();
    hex::encode(bytes)
}

#[derive(Clone)]
pub struct OrganizationRepository {
    pool: PgPool,
}

impl OrganizationRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create an organization inside an existing transaction. The slug is
    /// derived from the name; uniqueness races are resolved by retrying with
    /// a random suffix (the database constraint is the arbiter).
    #[tracing::instrument(skip(self, tx), fields(db.table = "organizations", db.operation = "insert"))]
    pub async fn create_tx(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        name: &str,
    ) -> Result<Organization, AppError> {
        let base_slug = slugify(name);

        for attempt in 0..SLUG_ATTEMPTS {
            let slug = if attempt == 0 {
                base_slug.clone()
            } else {
                format!("{}-{}", base_slug, random_slug_suffix())
            };

            // ON CONFLICT DO NOTHING keeps the surrounding transaction alive
            // when the slug is taken, so the retry can run in the same tx.
            let result = sqlx::query_as::<Postgres, Organization>(
                r#"
                INSERT INTO organizations (name, slug)
                VALUES ($1, $2)
                ON CONFLICT (slug) DO NOTHING
                RETURNING *
                "#,
            )
            .bind(name)
            .bind(&slug)
            .fetch_optional(&mut **tx)
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "Failed to create organization");
                AppError::Database(e)
            })?;

            match result {
                Some(org) => {
                    tracing::info!(organization_id = %org.id, slug = %org.slug, "Organization created");
                    return Ok(org);
                }
                None => {
                    tracing::debug!(slug = %slug, "Slug taken, retrying with suffix");
                    continue;
                }
            }
        }

        Err(AppError::Internal(format!(
            "Could not allocate a unique slug for organization name '{}'",
            name
        )))
    }

    /// Get an organization by primary key.
    #[tracing::instrument(skip(self), fields(db.table = "organizations", db.operation = "select", db.record_id = %id))]
    pub async fn get_by_id(&self, id: Uuid) -> Result<Option<Organization>, AppError> {
        let org =
            sqlx::query_as::<Postgres, Organization>("SELECT * FROM organizations WHERE id = $1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| {
                    tracing::error!(error = %e, "Failed to get organization");
                    AppError::Database(e)
                })?;

        Ok(org)
    }
}
