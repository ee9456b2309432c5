//! Invoice model
//!
//! Append-only billing record. Identifiers are random UUIDs whose uniqueness
//! is enforced by the issuer (regenerate on collision before insert);
//! invoices are never mutated or deleted.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Invoice entity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Invoice {
    /// Unique invoice identifier
    pub id: Uuid,

    /// User the invoice was issued to
    pub user_id: Uuid,

    /// Issue timestamp
    pub issued_at: DateTime<Utc>,
}

impl Invoice {
    /// Create an invoice with a freshly generated identifier
    pub fn new(user_id: Uuid) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            issued_at: Utc::now(),
        }
    }

    /// Replace the identifier after a collision
    pub fn regenerate_id(&mut self) {
        self.id = Uuid::new_v4();
    }
}
