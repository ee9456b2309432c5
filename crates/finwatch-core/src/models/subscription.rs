//! Subscription model
//!
//! Tracks, per user, whether recurring billing is active and when it last
//! succeeded. Mutated only by the billing sweep and by explicit
//! upgrade/cancel operations.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Subscription entity (one per user)
///
/// Invariant: `payment_active == true` implies `last_billed_at` is set and
/// a stored credential exists for the user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subscription {
    /// Owning user
    pub user_id: Uuid,

    /// Whether recurring billing is currently active
    pub payment_active: bool,

    /// When the last successful charge was recorded
    pub last_billed_at: Option<DateTime<Utc>>,
}

impl Subscription {
    /// Create an inactive subscription, as at registration time
    pub fn inactive(user_id: Uuid) -> Self {
        Self {
            user_id,
            payment_active: false,
            last_billed_at: None,
        }
    }

    /// Create an active subscription, as at upgrade time
    pub fn active(user_id: Uuid, now: DateTime<Utc>) -> Self {
        Self {
            user_id,
            payment_active: true,
            last_billed_at: Some(now),
        }
    }

    /// Record a successful renewal
    pub fn record_renewal(&mut self, now: DateTime<Utc>) {
        self.payment_active = true;
        self.last_billed_at = Some(now);
    }

    /// Reverse the subscription after a failed or impossible charge
    pub fn deactivate(&mut self) {
        self.payment_active = false;
        self.last_billed_at = None;
    }

    /// Whether this subscription is due for renewal at `now`, given the
    /// billing period length
    pub fn is_due(&self, now: DateTime<Utc>, period: chrono::Duration) -> bool {
        match (self.payment_active, self.last_billed_at) {
            (true, Some(billed)) => billed <= now - period,
            _ => false,
        }
    }
}
