//! Billing sweep
//!
//! The recurring renewal loop. Once per interval (daily in production) it
//! lists every active subscription whose last successful charge is older
//! than the billing period and attempts one probe charge per subscription.
//! A successful charge records the renewal and issues an invoice; anything
//! short of an approval (decline, unreachable gateway, missing or
//! unopenable credential) deactivates the subscription. A failure against
//! one subscription never aborts the rest of the sweep.

use crate::invoice_issuer::InvoiceIssuer;
use finwatch_core::{
    config::SchedulerConfig,
    models::Subscription,
    traits::{
        ChargeOutcome, ContactDirectory, CredentialRepository, PaymentGateway,
        SubscriptionRepository,
    },
    AppError, AppResult,
};
use finwatch_vault::Vault;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, instrument, warn};

/// Counters for one sweep pass
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SweepStats {
    /// Due subscriptions examined
    pub examined: usize,
    /// Renewals recorded (charge approved, invoice issued)
    pub renewed: usize,
    /// Subscriptions deactivated (decline, outage, missing or unopenable card)
    pub deactivated: usize,
    /// Subscriptions skipped because persistence failed; retried next sweep
    pub errors: usize,
}

/// What one subscription's renewal attempt resolved to
enum RenewalOutcome {
    Renewed,
    Deactivated,
}

/// Recurring billing sweeper
pub struct BillingSweeper {
    subscriptions: Arc<dyn SubscriptionRepository>,
    credentials: Arc<dyn CredentialRepository>,
    contacts: Arc<dyn ContactDirectory>,
    gateway: Arc<dyn PaymentGateway>,
    vault: Arc<Vault>,
    issuer: Arc<InvoiceIssuer>,
    billing_period: chrono::Duration,
}

impl BillingSweeper {
    pub fn new(
        subscriptions: Arc<dyn SubscriptionRepository>,
        credentials: Arc<dyn CredentialRepository>,
        contacts: Arc<dyn ContactDirectory>,
        gateway: Arc<dyn PaymentGateway>,
        vault: Arc<Vault>,
        issuer: Arc<InvoiceIssuer>,
        config: &SchedulerConfig,
    ) -> Self {
        Self {
            subscriptions,
            credentials,
            contacts,
            gateway,
            vault,
            issuer,
            billing_period: chrono::Duration::days(config.billing_period_days),
        }
    }

    /// Run sweeps until the token is cancelled
    ///
    /// The first sweep runs immediately on startup so renewals missed while
    /// the process was down are caught up; later sweeps follow the interval.
    /// A sweep that fails outright is logged and retried at the next tick.
    pub async fn run_forever(&self, interval: Duration, shutdown: CancellationToken) {
        let mut ticker = tokio::time::interval(interval);

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    info!("Billing sweeper shutting down");
                    return;
                }
                _ = ticker.tick() => {
                    // Shutdown can land mid-sweep; store writes are atomic
                    // per record, so aborting between them is safe.
                    tokio::select! {
                        _ = shutdown.cancelled() => {
                            info!("Billing sweeper shutting down mid-sweep");
                            return;
                        }
                        result = self.run_sweep() => match result {
                            Ok(stats) => {
                                info!(
                                    examined = stats.examined,
                                    renewed = stats.renewed,
                                    deactivated = stats.deactivated,
                                    errors = stats.errors,
                                    "Billing sweep finished"
                                );
                            }
                            Err(e) => {
                                error!("Billing sweep failed: {}", e);
                            }
                        }
                    }
                }
            }
        }
    }

    /// Run one sweep over all due subscriptions
    ///
    /// # Errors
    ///
    /// Returns `AppError::Store` only when the due list itself cannot be
    /// read. Per-subscription failures are absorbed into the stats.
    #[instrument(skip(self))]
    pub async fn run_sweep(&self) -> AppResult<SweepStats> {
        let now = chrono::Utc::now();
        let due = self.subscriptions.list_due(now - self.billing_period).await?;

        let mut stats = SweepStats {
            examined: due.len(),
            ..SweepStats::default()
        };

        for subscription in due {
            let user_id = subscription.user_id;
            match self.renew_one(subscription).await {
                Ok(RenewalOutcome::Renewed) => stats.renewed += 1,
                Ok(RenewalOutcome::Deactivated) => stats.deactivated += 1,
                Err(e) => {
                    stats.errors += 1;
                    warn!(
                        user_id = %user_id,
                        error_code = e.error_code(),
                        "Renewal attempt failed, left for the next sweep: {}", e
                    );
                }
            }
        }

        Ok(stats)
    }

    /// Attempt one subscription's renewal
    ///
    /// Anything short of an approval persists the reversed record. Store
    /// write failures propagate so the subscription keeps its stored state
    /// and is retried by the next sweep.
    async fn renew_one(&self, mut subscription: Subscription) -> AppResult<RenewalOutcome> {
        let user_id = subscription.user_id;

        let card = match self.credentials.get(user_id).await? {
            Some(stored) => match self.vault.open(&stored.blob) {
                Ok(card) => Some(card),
                Err(e) => {
                    warn!(user_id = %user_id, "Stored credential unusable: {}", e);
                    None
                }
            },
            None => {
                warn!(user_id = %user_id, "No stored credential for due subscription");
                None
            }
        };

        let approved = match card {
            Some(card) => match self.gateway.attempt_charge(&card).await {
                Ok(ChargeOutcome::Approved) => true,
                Ok(ChargeOutcome::Declined) => {
                    info!(user_id = %user_id, "Renewal charge declined");
                    false
                }
                // An unreachable gateway reverses the subscription the same
                // way a decline does; the error taxonomy keeps the two apart
                // in the logs so the policy can be changed per deployment.
                Err(e @ AppError::GatewayUnavailable(_)) => {
                    warn!(
                        user_id = %user_id,
                        error_code = e.error_code(),
                        "Gateway unreachable, renewal reversed: {}", e
                    );
                    false
                }
                Err(e) => return Err(e),
            },
            None => false,
        };

        if approved {
            subscription.record_renewal(chrono::Utc::now());
            self.put_with_retry(&subscription).await?;

            let contact = self.contacts.contact_for(user_id).await.unwrap_or_else(|e| {
                warn!(user_id = %user_id, "Contact lookup failed: {}", e);
                None
            });
            if let Err(e) = self.issuer.issue(user_id, contact.as_ref()).await {
                // The renewal is already recorded; an invoice gap is
                // surfaced in the logs for manual reconciliation.
                error!(user_id = %user_id, "Invoice not issued for renewal: {}", e);
            }

            info!(user_id = %user_id, "Subscription renewed");
            Ok(RenewalOutcome::Renewed)
        } else {
            subscription.deactivate();
            self.put_with_retry(&subscription).await?;
            info!(user_id = %user_id, "Subscription deactivated");
            Ok(RenewalOutcome::Deactivated)
        }
    }

    /// Persist a subscription, retrying a failed write once within the tick
    ///
    /// A second failure propagates; the subscription stays in its previous
    /// stored state and is picked up again by the next sweep.
    async fn put_with_retry(&self, subscription: &Subscription) -> AppResult<()> {
        match self.subscriptions.put(subscription).await {
            Ok(()) => Ok(()),
            Err(e) => {
                warn!(
                    user_id = %subscription.user_id,
                    "Subscription write failed, retrying once: {}", e
                );
                self.subscriptions.put(subscription).await
            }
        }
    }
}
