//! Contact directory implementation
//!
//! Resolves user ids to notification targets from the users table.

use async_trait::async_trait;
use finwatch_core::{models::Contact, traits::ContactDirectory, AppError, AppResult};
use sqlx::{PgPool, Row};
use tracing::{error, instrument};
use uuid::Uuid;

/// PostgreSQL implementation of ContactDirectory
pub struct PgContactDirectory {
    pool: PgPool,
}

impl PgContactDirectory {
    /// Create a new contact directory
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ContactDirectory for PgContactDirectory {
    #[instrument(skip(self))]
    async fn contact_for(&self, user_id: Uuid) -> AppResult<Option<Contact>> {
        let result = sqlx::query("SELECT name, email FROM users WHERE user_id = $1")
            .bind(user_id)
            .map(|row: sqlx::postgres::PgRow| Contact {
                name: row.get("name"),
                email: row.get("email"),
            })
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| {
                error!("Database error resolving contact {}: {}", user_id, e);
                AppError::Store(format!("Failed to resolve contact: {}", e))
            })?;

        Ok(result)
    }
}
