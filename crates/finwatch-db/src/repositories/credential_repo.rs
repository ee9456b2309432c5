//! Credential repository implementation
//!
//! Stores the Vault-sealed credential blob per user. Only ciphertext ever
//! reaches this layer; the row is deleted on subscription cancellation.

use async_trait::async_trait;
use finwatch_core::{models::StoredCredential, traits::CredentialRepository, AppError, AppResult};
use sqlx::{PgPool, Row};
use tracing::{debug, error, instrument};
use uuid::Uuid;

/// PostgreSQL implementation of CredentialRepository
pub struct PgCredentialRepository {
    pool: PgPool,
}

impl PgCredentialRepository {
    /// Create a new credential repository
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CredentialRepository for PgCredentialRepository {
    #[instrument(skip(self))]
    async fn get(&self, user_id: Uuid) -> AppResult<Option<StoredCredential>> {
        debug!("Fetching credential for user {}", user_id);

        let result = sqlx::query(
            r#"
            SELECT user_id, blob, updated_at
            FROM credentials
            WHERE user_id = $1
            "#,
        )
        .bind(user_id)
        .map(|row: sqlx::postgres::PgRow| StoredCredential {
            user_id: row.get("user_id"),
            blob: row.get("blob"),
            updated_at: row.get("updated_at"),
        })
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            error!("Database error fetching credential {}: {}", user_id, e);
            AppError::Store(format!("Failed to fetch credential: {}", e))
        })?;

        Ok(result)
    }

    #[instrument(skip(self, credential))]
    async fn put(&self, credential: &StoredCredential) -> AppResult<()> {
        debug!("Upserting credential for user {}", credential.user_id);

        sqlx::query(
            r#"
            INSERT INTO credentials (user_id, blob, updated_at)
            VALUES ($1, $2, $3)
            ON CONFLICT (user_id) DO UPDATE
            SET blob = EXCLUDED.blob,
                updated_at = EXCLUDED.updated_at
            "#,
        )
        .bind(credential.user_id)
        .bind(&credential.blob)
        .bind(credential.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            error!(
                "Database error upserting credential {}: {}",
                credential.user_id, e
            );
            AppError::Store(format!("Failed to upsert credential: {}", e))
        })?;

        Ok(())
    }

    #[instrument(skip(self))]
    async fn delete(&self, user_id: Uuid) -> AppResult<()> {
        debug!("Deleting credential for user {}", user_id);

        sqlx::query("DELETE FROM credentials WHERE user_id = $1")
            .bind(user_id)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                error!("Database error deleting credential {}: {}", user_id, e);
                AppError::Store(format!("Failed to delete credential: {}", e))
            })?;

        Ok(())
    }
}
