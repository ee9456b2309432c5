//! Common traits for repositories and external collaborators
//!
//! The schedulers consume everything below as abstract service calls: the
//! persistence store, the market data provider, the payment gateway, and the
//! notifier. Implementations live in finwatch-db and finwatch-services;
//! tests substitute in-memory fakes.

use crate::error::AppError;
use crate::models::{CardDetails, Contact, InstrumentKind, Invoice, StoredCredential, Subscription};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::collections::HashMap;
use uuid::Uuid;

/// Subscription storage
///
/// Writes to a given user's record must be serialized by the store; reads
/// may be concurrent. `put` is a single atomic call per record.
#[async_trait]
pub trait SubscriptionRepository: Send + Sync {
    /// Fetch one user's subscription
    async fn get(&self, user_id: Uuid) -> Result<Option<Subscription>, AppError>;

    /// Upsert one user's subscription atomically
    async fn put(&self, subscription: &Subscription) -> Result<(), AppError>;

    /// Active subscriptions whose `last_billed_at` is at or before the cutoff
    async fn list_due(&self, cutoff: DateTime<Utc>) -> Result<Vec<Subscription>, AppError>;
}

/// Sealed credential storage (at most one record per user)
#[async_trait]
pub trait CredentialRepository: Send + Sync {
    /// Fetch a user's sealed credential, if any
    async fn get(&self, user_id: Uuid) -> Result<Option<StoredCredential>, AppError>;

    /// Upsert a user's sealed credential
    async fn put(&self, credential: &StoredCredential) -> Result<(), AppError>;

    /// Delete a user's sealed credential (subscription cancellation)
    async fn delete(&self, user_id: Uuid) -> Result<(), AppError>;
}

/// Append-only invoice storage
#[async_trait]
pub trait InvoiceRepository: Send + Sync {
    /// Whether an invoice with this identifier already exists
    async fn exists(&self, id: Uuid) -> Result<bool, AppError>;

    /// Insert a new invoice
    async fn insert(&self, invoice: &Invoice) -> Result<(), AppError>;
}

/// Contact lookup for notification targets
///
/// Resolves a user id to the contact details notifications are delivered
/// to. Backed by the user directory, which is otherwise outside the engine.
#[async_trait]
pub trait ContactDirectory: Send + Sync {
    /// Contact details for a user, if known
    async fn contact_for(&self, user_id: Uuid) -> Result<Option<Contact>, AppError>;
}

/// External quote source
///
/// One interface for both instrument kinds; implementations dispatch on the
/// tagged request rather than composing per-kind facades.
#[async_trait]
pub trait MarketDataProvider: Send + Sync {
    /// Current price for a symbol
    ///
    /// Returns `AppError::QuoteUnavailable` when the symbol is unknown or
    /// the response cannot be interpreted as a price.
    async fn current_price(&self, symbol: &str, kind: InstrumentKind)
        -> Result<Decimal, AppError>;
}

/// Outcome of a single charge attempt
///
/// Transport failures are not an outcome; they surface as
/// `AppError::GatewayUnavailable` so callers can distinguish a rejected card
/// from an unreachable gateway.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChargeOutcome {
    /// The probe charge succeeded
    Approved,
    /// The card was explicitly rejected
    Declined,
}

/// External payment gateway
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Attempt a fixed small probe charge against the card
    async fn attempt_charge(&self, card: &CardDetails) -> Result<ChargeOutcome, AppError>;
}

/// Outbound notification channel (email or equivalent)
///
/// Callers treat delivery as best-effort; a `Notification` error is logged,
/// never raised past the issuing component.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Render `template` with `fields` and deliver it to `contact`
    async fn send(
        &self,
        contact: &Contact,
        template: &str,
        fields: &HashMap<String, String>,
    ) -> Result<(), AppError>;
}
