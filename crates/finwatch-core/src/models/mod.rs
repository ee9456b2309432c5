//! Domain models for FinWatch
//!
//! This module contains all the core domain models used throughout the engine.

pub mod alert;
pub mod credential;
pub mod invoice;
pub mod subscription;

pub use alert::{Alert, AlertStatus, Contact, InstrumentKind, WatchDirection};
pub use credential::{CardDetails, StoredCredential};
pub use invoice::Invoice;
pub use subscription::Subscription;
