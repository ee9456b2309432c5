//! Invoice repository implementation
//!
//! Append-only ledger access: existence checks for the issuer's collision
//! loop and plain inserts. No update or delete paths exist on purpose.

use async_trait::async_trait;
use finwatch_core::{models::Invoice, traits::InvoiceRepository, AppError, AppResult};
use sqlx::PgPool;
use tracing::{debug, error, instrument};
use uuid::Uuid;

/// PostgreSQL implementation of InvoiceRepository
pub struct PgInvoiceRepository {
    pool: PgPool,
}

impl PgInvoiceRepository {
    /// Create a new invoice repository
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl InvoiceRepository for PgInvoiceRepository {
    #[instrument(skip(self))]
    async fn exists(&self, id: Uuid) -> AppResult<bool> {
        let result: (bool,) =
            sqlx::query_as("SELECT EXISTS (SELECT 1 FROM invoices WHERE id = $1)")
                .bind(id)
                .fetch_one(&self.pool)
                .await
                .map_err(|e| {
                    error!("Database error checking invoice {}: {}", id, e);
                    AppError::Store(format!("Failed to check invoice id: {}", e))
                })?;

        Ok(result.0)
    }

    #[instrument(skip(self, invoice))]
    async fn insert(&self, invoice: &Invoice) -> AppResult<()> {
        debug!("Inserting invoice {} for user {}", invoice.id, invoice.user_id);

        sqlx::query(
            r#"
            INSERT INTO invoices (id, user_id, issued_at)
            VALUES ($1, $2, $3)
            "#,
        )
        .bind(invoice.id)
        .bind(invoice.user_id)
        .bind(invoice.issued_at)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            error!("Database error inserting invoice {}: {}", invoice.id, e);
            AppError::Store(format!("Failed to insert invoice: {}", e))
        })?;

        Ok(())
    }
}
