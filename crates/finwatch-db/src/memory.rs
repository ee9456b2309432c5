//! In-memory store
//!
//! Implements the storage traits over locked maps. Used by the scheduler
//! test suites and usable for local runs without PostgreSQL. A single lock
//! per map gives the same per-record write serialization the SQL store
//! provides through row locking.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use finwatch_core::{
    models::{Contact, Invoice, StoredCredential, Subscription},
    traits::{ContactDirectory, CredentialRepository, InvoiceRepository, SubscriptionRepository},
    AppResult,
};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

/// In-memory key-object store
#[derive(Clone, Default)]
pub struct MemoryStore {
    subscriptions: Arc<RwLock<HashMap<Uuid, Subscription>>>,
    credentials: Arc<RwLock<HashMap<Uuid, StoredCredential>>>,
    invoices: Arc<RwLock<HashMap<Uuid, Invoice>>>,
    contacts: Arc<RwLock<HashMap<Uuid, Contact>>>,
}

impl MemoryStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a notification target for a user
    pub async fn register_contact(&self, user_id: Uuid, contact: Contact) {
        self.contacts.write().await.insert(user_id, contact);
    }

    /// Number of invoices held (test helper)
    pub async fn invoice_count(&self) -> usize {
        self.invoices.read().await.len()
    }

    /// All invoices issued to a user (test helper)
    pub async fn invoices_for(&self, user_id: Uuid) -> Vec<Invoice> {
        self.invoices
            .read()
            .await
            .values()
            .filter(|inv| inv.user_id == user_id)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl SubscriptionRepository for MemoryStore {
    async fn get(&self, user_id: Uuid) -> AppResult<Option<Subscription>> {
        Ok(self.subscriptions.read().await.get(&user_id).cloned())
    }

    async fn put(&self, subscription: &Subscription) -> AppResult<()> {
        self.subscriptions
            .write()
            .await
            .insert(subscription.user_id, subscription.clone());
        Ok(())
    }

    async fn list_due(&self, cutoff: DateTime<Utc>) -> AppResult<Vec<Subscription>> {
        let due = self
            .subscriptions
            .read()
            .await
            .values()
            .filter(|sub| {
                sub.payment_active
                    && sub
                        .last_billed_at
                        .map(|billed| billed <= cutoff)
                        .unwrap_or(false)
            })
            .cloned()
            .collect();
        Ok(due)
    }
}

#[async_trait]
impl CredentialRepository for MemoryStore {
    async fn get(&self, user_id: Uuid) -> AppResult<Option<StoredCredential>> {
        Ok(self.credentials.read().await.get(&user_id).cloned())
    }

    async fn put(&self, credential: &StoredCredential) -> AppResult<()> {
        self.credentials
            .write()
            .await
            .insert(credential.user_id, credential.clone());
        Ok(())
    }

    async fn delete(&self, user_id: Uuid) -> AppResult<()> {
        self.credentials.write().await.remove(&user_id);
        Ok(())
    }
}

#[async_trait]
impl InvoiceRepository for MemoryStore {
    async fn exists(&self, id: Uuid) -> AppResult<bool> {
        Ok(self.invoices.read().await.contains_key(&id))
    }

    async fn insert(&self, invoice: &Invoice) -> AppResult<()> {
        self.invoices
            .write()
            .await
            .insert(invoice.id, invoice.clone());
        Ok(())
    }
}

#[async_trait]
impl ContactDirectory for MemoryStore {
    async fn contact_for(&self, user_id: Uuid) -> AppResult<Option<Contact>> {
        Ok(self.contacts.read().await.get(&user_id).cloned())
    }
}
