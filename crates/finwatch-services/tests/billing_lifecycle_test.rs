//! End-to-end billing lifecycle tests
//!
//! Exercises the upgrade -> renew -> deactivate path across the real vault,
//! the in-memory store, and the sweeper, with only the payment gateway and
//! notification relay faked.

use async_trait::async_trait;
use chrono::{Duration, Utc};
use finwatch_core::{
    config::SchedulerConfig,
    models::{CardDetails, Contact, StoredCredential, Subscription},
    traits::{
        ChargeOutcome, ContactDirectory, CredentialRepository, InvoiceRepository, Notifier,
        PaymentGateway, SubscriptionRepository,
    },
    AppError, AppResult,
};
use finwatch_db::MemoryStore;
use finwatch_services::{BillingSweeper, InvoiceIssuer};
use finwatch_vault::{Vault, VaultKey};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use uuid::Uuid;

/// Gateway fake: approves by default, declines cards whose holder name has
/// been blacklisted, so one sweep can see mixed outcomes
struct SwitchableGateway {
    approve: AtomicBool,
    decline_holders: Mutex<HashSet<String>>,
    charges: AtomicUsize,
}

impl SwitchableGateway {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            approve: AtomicBool::new(true),
            decline_holders: Mutex::new(HashSet::new()),
            charges: AtomicUsize::new(0),
        })
    }

    fn decline_holder(&self, holder: &str) {
        self.decline_holders.lock().unwrap().insert(holder.to_string());
    }
}

#[async_trait]
impl PaymentGateway for SwitchableGateway {
    async fn attempt_charge(&self, card: &CardDetails) -> Result<ChargeOutcome, AppError> {
        self.charges.fetch_add(1, Ordering::SeqCst);
        let declined = self
            .decline_holders
            .lock()
            .unwrap()
            .contains(&card.holder_name);
        if declined || !self.approve.load(Ordering::SeqCst) {
            Ok(ChargeOutcome::Declined)
        } else {
            Ok(ChargeOutcome::Approved)
        }
    }
}

struct RecordingNotifier {
    templates: tokio::sync::Mutex<Vec<String>>,
}

impl RecordingNotifier {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            templates: tokio::sync::Mutex::new(Vec::new()),
        })
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send(
        &self,
        _contact: &Contact,
        template: &str,
        _fields: &HashMap<String, String>,
    ) -> AppResult<()> {
        self.templates.lock().await.push(template.to_string());
        Ok(())
    }
}

struct Harness {
    store: MemoryStore,
    vault: Arc<Vault>,
    gateway: Arc<SwitchableGateway>,
    notifier: Arc<RecordingNotifier>,
    sweeper: BillingSweeper,
}

fn harness() -> Harness {
    let store = MemoryStore::new();
    let vault = Arc::new(Vault::new(VaultKey::generate()));
    let gateway = SwitchableGateway::new();
    let notifier = RecordingNotifier::new();
    let issuer = Arc::new(InvoiceIssuer::new(
        Arc::new(store.clone()) as Arc<dyn InvoiceRepository>,
        notifier.clone(),
    ));
    let sweeper = BillingSweeper::new(
        Arc::new(store.clone()),
        Arc::new(store.clone()),
        Arc::new(store.clone()),
        gateway.clone(),
        vault.clone(),
        issuer,
        &SchedulerConfig::default(),
    );
    Harness {
        store,
        vault,
        gateway,
        notifier,
        sweeper,
    }
}

fn card(holder: &str) -> CardDetails {
    CardDetails {
        number: "4242 4242 4242 4242".to_string(),
        expiry_month: 12,
        expiry_year: 2032,
        cvv: "314".to_string(),
        holder_name: holder.to_string(),
    }
}

/// Simulate the upgrade operation: validate, seal, store, activate, with
/// the first charge dated `age` ago so due-ness can be controlled. The
/// holder name is the user id so the gateway fake can route per user.
async fn upgrade(h: &Harness, age: Duration) -> Uuid {
    let user_id = Uuid::new_v4();
    let card = card(&user_id.to_string());
    card.validate(Utc::now()).unwrap();

    let blob = h.vault.seal(&card).unwrap();
    CredentialRepository::put(&h.store, &StoredCredential::new(user_id, blob))
        .await
        .unwrap();

    let sub = Subscription {
        user_id,
        payment_active: true,
        last_billed_at: Some(Utc::now() - age),
    };
    SubscriptionRepository::put(&h.store, &sub).await.unwrap();

    h.store
        .register_contact(
            user_id,
            Contact {
                name: "Jane".to_string(),
                email: "jane@example.com".to_string(),
            },
        )
        .await;

    user_id
}

#[tokio::test]
async fn test_renewal_records_invoice_and_receipt() {
    let h = harness();
    let user_id = upgrade(&h, Duration::days(31)).await;

    let stats = h.sweeper.run_sweep().await.unwrap();
    assert_eq!(stats.renewed, 1);

    let invoices = h.store.invoices_for(user_id).await;
    assert_eq!(invoices.len(), 1);
    assert_eq!(invoices[0].user_id, user_id);

    let templates = h.notifier.templates.lock().await;
    assert_eq!(templates.as_slice(), ["invoice"]);
}

#[tokio::test]
async fn test_renewed_subscription_is_not_due_again() {
    let h = harness();
    let user_id = upgrade(&h, Duration::days(31)).await;

    let first = h.sweeper.run_sweep().await.unwrap();
    assert_eq!(first.renewed, 1);

    // Immediately after renewal nothing is due
    let second = h.sweeper.run_sweep().await.unwrap();
    assert_eq!(second.examined, 0);
    assert_eq!(h.gateway.charges.load(Ordering::SeqCst), 1);
    assert_eq!(h.store.invoices_for(user_id).await.len(), 1);
}

#[tokio::test]
async fn test_decline_deactivates_and_stops_future_sweeps() {
    let h = harness();
    let user_id = upgrade(&h, Duration::days(31)).await;
    h.gateway.approve.store(false, Ordering::SeqCst);

    let first = h.sweeper.run_sweep().await.unwrap();
    assert_eq!(first.deactivated, 1);

    let sub = SubscriptionRepository::get(&h.store, user_id)
        .await
        .unwrap()
        .unwrap();
    assert!(!sub.payment_active);
    assert!(sub.last_billed_at.is_none());

    // Deactivated subscriptions fall out of the due list for good
    let second = h.sweeper.run_sweep().await.unwrap();
    assert_eq!(second.examined, 0);
    assert_eq!(h.gateway.charges.load(Ordering::SeqCst), 1);
    assert!(h.store.invoices_for(user_id).await.is_empty());
    assert!(h.notifier.templates.lock().await.is_empty());
}

#[tokio::test]
async fn test_cancellation_removes_credential_then_sweep_deactivates() {
    let h = harness();
    let user_id = upgrade(&h, Duration::days(31)).await;

    // The cancel operation deletes the stored card; the subscription is
    // reversed by the next sweep rather than immediately.
    CredentialRepository::delete(&h.store, user_id)
        .await
        .unwrap();

    let stats = h.sweeper.run_sweep().await.unwrap();
    assert_eq!(stats.deactivated, 1);
    assert_eq!(h.gateway.charges.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_mixed_population_single_sweep() {
    let h = harness();
    let due_ok = upgrade(&h, Duration::days(45)).await;
    let due_declined = upgrade(&h, Duration::days(31)).await;
    let fresh = upgrade(&h, Duration::days(1)).await;
    let no_card = upgrade(&h, Duration::days(31)).await;
    h.gateway.decline_holder(&due_declined.to_string());
    CredentialRepository::delete(&h.store, no_card).await.unwrap();

    let stats = h.sweeper.run_sweep().await.unwrap();

    assert_eq!(stats.examined, 3);
    assert_eq!(stats.renewed, 1);
    assert_eq!(stats.deactivated, 2);

    assert!(SubscriptionRepository::get(&h.store, due_ok)
        .await
        .unwrap()
        .unwrap()
        .payment_active);
    assert!(SubscriptionRepository::get(&h.store, fresh)
        .await
        .unwrap()
        .unwrap()
        .payment_active);
    for deactivated in [due_declined, no_card] {
        let sub = SubscriptionRepository::get(&h.store, deactivated)
            .await
            .unwrap()
            .unwrap();
        assert!(!sub.payment_active);
        assert!(sub.last_billed_at.is_none());
    }

    // Exactly one invoice came out of the whole sweep
    assert_eq!(h.store.invoice_count().await, 1);
    assert_eq!(h.store.invoices_for(due_ok).await.len(), 1);
}

#[tokio::test]
async fn test_invoices_accumulate_across_periods() {
    let h = harness();
    let user_id = upgrade(&h, Duration::days(31)).await;

    h.sweeper.run_sweep().await.unwrap();

    // Age the renewed record past the next period boundary
    let sub = Subscription {
        user_id,
        payment_active: true,
        last_billed_at: Some(Utc::now() - Duration::days(31)),
    };
    SubscriptionRepository::put(&h.store, &sub).await.unwrap();
    h.sweeper.run_sweep().await.unwrap();

    let invoices = h.store.invoices_for(user_id).await;
    assert_eq!(invoices.len(), 2);
    assert_ne!(invoices[0].id, invoices[1].id);
}
