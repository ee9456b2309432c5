//! Subscription repository implementation
//!
//! Provides PostgreSQL-backed storage for per-user subscription state.
//! Writes go through single-statement upserts so each record update is
//! atomic; row-level locking serializes concurrent writers to one user.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use finwatch_core::{models::Subscription, traits::SubscriptionRepository, AppError, AppResult};
use sqlx::{PgPool, Row};
use tracing::{debug, error, instrument};
use uuid::Uuid;

/// PostgreSQL implementation of SubscriptionRepository
pub struct PgSubscriptionRepository {
    pool: PgPool,
}

impl PgSubscriptionRepository {
    /// Create a new subscription repository
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn map_row(row: sqlx::postgres::PgRow) -> Subscription {
        Subscription {
            user_id: row.get("user_id"),
            payment_active: row.get("payment_active"),
            last_billed_at: row.get("last_billed_at"),
        }
    }
}

#[async_trait]
impl SubscriptionRepository for PgSubscriptionRepository {
    #[instrument(skip(self))]
    async fn get(&self, user_id: Uuid) -> AppResult<Option<Subscription>> {
        debug!("Fetching subscription for user {}", user_id);

        let result = sqlx::query(
            r#"
            SELECT user_id, payment_active, last_billed_at
            FROM subscriptions
            WHERE user_id = $1
            "#,
        )
        .bind(user_id)
        .map(Self::map_row)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            error!("Database error fetching subscription {}: {}", user_id, e);
            AppError::Store(format!("Failed to fetch subscription: {}", e))
        })?;

        Ok(result)
    }

    #[instrument(skip(self, subscription))]
    async fn put(&self, subscription: &Subscription) -> AppResult<()> {
        debug!(
            "Upserting subscription for user {} (active: {})",
            subscription.user_id, subscription.payment_active
        );

        sqlx::query(
            r#"
            INSERT INTO subscriptions (user_id, payment_active, last_billed_at)
            VALUES ($1, $2, $3)
            ON CONFLICT (user_id) DO UPDATE
            SET payment_active = EXCLUDED.payment_active,
                last_billed_at = EXCLUDED.last_billed_at
            "#,
        )
        .bind(subscription.user_id)
        .bind(subscription.payment_active)
        .bind(subscription.last_billed_at)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            error!(
                "Database error upserting subscription {}: {}",
                subscription.user_id, e
            );
            AppError::Store(format!("Failed to upsert subscription: {}", e))
        })?;

        Ok(())
    }

    #[instrument(skip(self))]
    async fn list_due(&self, cutoff: DateTime<Utc>) -> AppResult<Vec<Subscription>> {
        debug!("Listing subscriptions due before {}", cutoff);

        let rows = sqlx::query(
            r#"
            SELECT user_id, payment_active, last_billed_at
            FROM subscriptions
            WHERE payment_active = TRUE
              AND last_billed_at <= $1
            ORDER BY last_billed_at
            "#,
        )
        .bind(cutoff)
        .map(Self::map_row)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            error!("Database error listing due subscriptions: {}", e);
            AppError::Store(format!("Failed to list due subscriptions: {}", e))
        })?;

        Ok(rows)
    }
}
