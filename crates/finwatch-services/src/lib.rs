//! Scheduling and billing services for FinWatch
//!
//! This crate contains the two long-lived control loops and their
//! collaborator adapters:
//!
//! # Architecture
//!
//! Services are designed to be composable and testable:
//! - Each service holds its dependencies as `Arc<dyn Trait>` collaborators
//! - Services are shared across async tasks via Arc
//! - All operations are instrumented with tracing
//! - Errors local to one alert or one subscription resolve to a terminal
//!   state for that entity and never abort sibling work
//!
//! # Services
//!
//! - `AlertScheduler` - per-alert recurring poll-and-compare loops
//! - `BillingSweeper` - daily renewal sweep over due subscriptions
//! - `InvoiceIssuer` - unique-id invoice creation with receipt dispatch
//! - `HttpMarketData` - quote source client (stock and crypto endpoints)
//! - `HttpPaymentGateway` - probe-charge client for renewal checks
//! - `WebhookNotifier` - notification relay client

pub mod alert_scheduler;
pub mod billing_sweep;
pub mod gateway;
pub mod invoice_issuer;
pub mod market_data;
pub mod notifier;

pub use alert_scheduler::AlertScheduler;
pub use billing_sweep::{BillingSweeper, SweepStats};
pub use gateway::HttpPaymentGateway;
pub use invoice_issuer::InvoiceIssuer;
pub use market_data::HttpMarketData;
pub use notifier::WebhookNotifier;

/// Message template identifiers understood by the notification relay
pub mod templates {
    /// Sent once when a price alert fires
    pub const PRICE_ALERT: &str = "price_alert";

    /// Receipt sent after a successful renewal invoice
    pub const INVOICE_RECEIPT: &str = "invoice";
}
