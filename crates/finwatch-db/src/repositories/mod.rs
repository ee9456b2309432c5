//! Repository implementations
//!
//! This module contains concrete implementations of the storage traits
//! defined in finwatch-core, using sqlx for PostgreSQL access.

pub mod contact_repo;
pub mod credential_repo;
pub mod invoice_repo;
pub mod subscription_repo;

pub use contact_repo::PgContactDirectory;
pub use credential_repo::PgCredentialRepository;
pub use invoice_repo::PgInvoiceRepository;
pub use subscription_repo::PgSubscriptionRepository;
