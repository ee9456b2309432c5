//! Alert scheduler
//!
//! Runs one polling loop per submitted price alert. Submission takes an
//! immediate price read to arm the watch direction; the spawned loop then
//! re-reads the price on a fixed interval until the threshold condition is
//! met, a read fails, or the alert is cancelled. Every alert ends in
//! exactly one terminal state and notifies at most once.
//!
//! Alerts live in process memory only. A restart drops pending alerts;
//! users resubmit.

use crate::templates;
use finwatch_core::{
    models::{Alert, AlertStatus, WatchDirection},
    traits::{MarketDataProvider, Notifier},
    AppError, AppResult,
};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument, warn};
use uuid::Uuid;

/// One registered alert and its control handle
struct AlertEntry {
    alert: Alert,
    direction: WatchDirection,
    status: AlertStatus,
    cancel: CancellationToken,
}

/// Scheduler for price alerts
///
/// Cheap to clone; clones share the alert table.
#[derive(Clone)]
pub struct AlertScheduler {
    market: Arc<dyn MarketDataProvider>,
    notifier: Arc<dyn Notifier>,
    poll_interval: Duration,
    alerts: Arc<RwLock<HashMap<Uuid, AlertEntry>>>,
}

impl AlertScheduler {
    pub fn new(
        market: Arc<dyn MarketDataProvider>,
        notifier: Arc<dyn Notifier>,
        poll_interval: Duration,
    ) -> Self {
        Self {
            market,
            notifier,
            poll_interval,
            alerts: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Submit an alert and start its polling loop
    ///
    /// The initial price read decides the watch direction: a current price
    /// below the target arms a rise watch, above arms a fall watch. A
    /// current price exactly at the target is rejected, since neither
    /// direction would describe what the user asked for.
    ///
    /// # Errors
    ///
    /// - `AppError::QuoteUnavailable` if the initial price read fails;
    ///   nothing is registered.
    /// - `AppError::InvalidInput` if the price already equals the target.
    #[instrument(skip(self, alert), fields(symbol = %alert.symbol, id = %alert.id))]
    pub async fn submit(&self, alert: Alert) -> AppResult<Uuid> {
        let current = self
            .market
            .current_price(&alert.symbol, alert.kind)
            .await?;

        let direction = if current < alert.target_price {
            WatchDirection::RiseAbove
        } else if current > alert.target_price {
            WatchDirection::FallBelow
        } else {
            return Err(AppError::InvalidInput(format!(
                "{} already trades at the target price {}",
                alert.symbol, alert.target_price
            )));
        };

        let id = alert.id;
        let cancel = CancellationToken::new();
        let entry = AlertEntry {
            alert: alert.clone(),
            direction,
            status: AlertStatus::Polling,
            cancel: cancel.clone(),
        };
        self.alerts.write().await.insert(id, entry);

        info!(
            "Alert armed: {} {:?} target {} (current {})",
            alert.symbol, direction, alert.target_price, current
        );

        let scheduler = self.clone();
        tokio::spawn(async move {
            scheduler.poll_loop(alert, direction, cancel).await;
        });

        Ok(id)
    }

    /// Cancel a pending alert
    ///
    /// Idempotent for alerts already in a terminal state.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotFound` for an unknown identifier.
    pub async fn cancel(&self, id: Uuid) -> AppResult<()> {
        let alerts = self.alerts.read().await;
        let entry = alerts
            .get(&id)
            .ok_or_else(|| AppError::NotFound(format!("Alert {}", id)))?;
        entry.cancel.cancel();
        drop(alerts);

        self.set_status(id, AlertStatus::Cancelled).await;
        Ok(())
    }

    /// Current lifecycle state of an alert
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotFound` for an unknown identifier.
    pub async fn status(&self, id: Uuid) -> AppResult<AlertStatus> {
        self.alerts
            .read()
            .await
            .get(&id)
            .map(|entry| entry.status)
            .ok_or_else(|| AppError::NotFound(format!("Alert {}", id)))
    }

    /// Number of alerts still polling
    pub async fn active_count(&self) -> usize {
        self.alerts
            .read()
            .await
            .values()
            .filter(|entry| entry.status == AlertStatus::Polling)
            .count()
    }

    /// Stop all polling loops (process shutdown)
    pub async fn shutdown(&self) {
        let alerts = self.alerts.read().await;
        for entry in alerts.values() {
            entry.cancel.cancel();
        }
    }

    /// Move an alert to a terminal state, once
    ///
    /// The first terminal transition wins; later attempts are ignored so a
    /// cancel racing a trigger cannot rewrite history.
    async fn set_status(&self, id: Uuid, status: AlertStatus) {
        if let Some(entry) = self.alerts.write().await.get_mut(&id) {
            if !entry.status.is_terminal() {
                entry.status = status;
                info!(id = %id, "Alert {} -> {}", entry.alert.symbol, status);
            }
        }
    }

    /// Whether the alert is still in `Polling` (cancel may have landed
    /// between polls)
    async fn still_polling(&self, id: Uuid) -> bool {
        self.alerts
            .read()
            .await
            .get(&id)
            .map(|entry| entry.status == AlertStatus::Polling)
            .unwrap_or(false)
    }

    async fn poll_loop(&self, alert: Alert, direction: WatchDirection, cancel: CancellationToken) {
        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    self.set_status(alert.id, AlertStatus::Cancelled).await;
                    return;
                }
                _ = tokio::time::sleep(self.poll_interval) => {
                    if !self.still_polling(alert.id).await {
                        return;
                    }

                    let current = match self
                        .market
                        .current_price(&alert.symbol, alert.kind)
                        .await
                    {
                        Ok(price) => price,
                        Err(e) => {
                            warn!(id = %alert.id, "Price read for {} failed, alert abandoned: {}", alert.symbol, e);
                            self.set_status(alert.id, AlertStatus::Failed).await;
                            return;
                        }
                    };

                    if direction.is_met(current, alert.target_price) {
                        self.fire(&alert, current).await;
                        self.set_status(alert.id, AlertStatus::Triggered).await;
                        return;
                    }
                }
            }
        }
    }

    /// Send the single trigger notification (best-effort)
    async fn fire(&self, alert: &Alert, current: rust_decimal::Decimal) {
        let mut fields = HashMap::new();
        fields.insert("name".to_string(), alert.contact.name.clone());
        fields.insert("symbol".to_string(), alert.symbol.clone());
        fields.insert("target_price".to_string(), alert.target_price.to_string());
        fields.insert("current_price".to_string(), current.to_string());

        if let Err(e) = self
            .notifier
            .send(&alert.contact, templates::PRICE_ALERT, &fields)
            .await
        {
            warn!(id = %alert.id, "Alert notification for {} not delivered: {}", alert.symbol, e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use finwatch_core::models::{Contact, InstrumentKind};
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    const POLL: Duration = Duration::from_secs(300);

    /// Market fake that replays a scripted price sequence, then repeats the
    /// final entry
    struct ScriptedMarket {
        script: Mutex<VecDeque<Result<Decimal, ()>>>,
        last: Mutex<Option<Result<Decimal, ()>>>,
        reads: AtomicUsize,
    }

    impl ScriptedMarket {
        fn new(script: Vec<Result<Decimal, ()>>) -> Arc<Self> {
            Arc::new(Self {
                script: Mutex::new(script.into_iter().collect()),
                last: Mutex::new(None),
                reads: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl MarketDataProvider for ScriptedMarket {
        async fn current_price(
            &self,
            symbol: &str,
            _kind: InstrumentKind,
        ) -> Result<Decimal, AppError> {
            self.reads.fetch_add(1, Ordering::SeqCst);
            let next = {
                let mut script = self.script.lock().unwrap();
                match script.pop_front() {
                    Some(entry) => {
                        *self.last.lock().unwrap() = Some(entry);
                        entry
                    }
                    None => self.last.lock().unwrap().unwrap_or(Err(())),
                }
            };
            next.map_err(|_| AppError::QuoteUnavailable(symbol.to_string()))
        }
    }

    struct CountingNotifier {
        sent: AtomicUsize,
    }

    impl CountingNotifier {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                sent: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl Notifier for CountingNotifier {
        async fn send(
            &self,
            _contact: &Contact,
            _template: &str,
            _fields: &HashMap<String, String>,
        ) -> AppResult<()> {
            self.sent.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn alert(target: Decimal) -> Alert {
        Alert::new(
            "AAPL",
            InstrumentKind::Stock,
            target,
            Contact {
                name: "Jane".to_string(),
                email: "jane@example.com".to_string(),
            },
        )
    }

    fn scheduler(
        market: Arc<ScriptedMarket>,
        notifier: Arc<CountingNotifier>,
    ) -> AlertScheduler {
        AlertScheduler::new(market, notifier, POLL)
    }

    async fn one_poll() {
        tokio::time::sleep(POLL + Duration::from_secs(1)).await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_rise_above_triggers_once() {
        // Initial read arms the direction; the next two reads are polls
        let market = ScriptedMarket::new(vec![Ok(dec!(100)), Ok(dec!(104)), Ok(dec!(106))]);
        let notifier = CountingNotifier::new();
        let sched = scheduler(market.clone(), notifier.clone());

        let id = sched.submit(alert(dec!(105))).await.unwrap();
        assert_eq!(sched.status(id).await.unwrap(), AlertStatus::Polling);

        one_poll().await;
        assert_eq!(sched.status(id).await.unwrap(), AlertStatus::Polling);
        assert_eq!(notifier.sent.load(Ordering::SeqCst), 0);

        one_poll().await;
        assert_eq!(sched.status(id).await.unwrap(), AlertStatus::Triggered);
        assert_eq!(notifier.sent.load(Ordering::SeqCst), 1);

        // Terminal: no further polls, no further notifications
        let reads_after_trigger = market.reads.load(Ordering::SeqCst);
        one_poll().await;
        assert_eq!(market.reads.load(Ordering::SeqCst), reads_after_trigger);
        assert_eq!(notifier.sent.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_fall_below_triggers() {
        let market = ScriptedMarket::new(vec![Ok(dec!(120)), Ok(dec!(99.50))]);
        let notifier = CountingNotifier::new();
        let sched = scheduler(market, notifier.clone());

        let id = sched.submit(alert(dec!(100))).await.unwrap();
        one_poll().await;

        assert_eq!(sched.status(id).await.unwrap(), AlertStatus::Triggered);
        assert_eq!(notifier.sent.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_exact_threshold_hit_triggers() {
        let market = ScriptedMarket::new(vec![Ok(dec!(100)), Ok(dec!(105))]);
        let notifier = CountingNotifier::new();
        let sched = scheduler(market, notifier.clone());

        let id = sched.submit(alert(dec!(105))).await.unwrap();
        one_poll().await;

        assert_eq!(sched.status(id).await.unwrap(), AlertStatus::Triggered);
    }

    #[tokio::test(start_paused = true)]
    async fn test_keeps_polling_while_condition_unmet() {
        let market = ScriptedMarket::new(vec![Ok(dec!(100)), Ok(dec!(101))]);
        let notifier = CountingNotifier::new();
        let sched = scheduler(market.clone(), notifier.clone());

        let id = sched.submit(alert(dec!(105))).await.unwrap();
        one_poll().await;
        one_poll().await;
        one_poll().await;

        assert_eq!(sched.status(id).await.unwrap(), AlertStatus::Polling);
        assert_eq!(notifier.sent.load(Ordering::SeqCst), 0);
        // Initial read plus one per elapsed interval
        assert_eq!(market.reads.load(Ordering::SeqCst), 4);
        assert_eq!(sched.active_count().await, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_equal_initial_price_is_rejected() {
        let market = ScriptedMarket::new(vec![Ok(dec!(105))]);
        let notifier = CountingNotifier::new();
        let sched = scheduler(market, notifier);

        let err = sched.submit(alert(dec!(105))).await.unwrap_err();
        assert!(matches!(err, AppError::InvalidInput(_)));
        assert_eq!(sched.active_count().await, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_initial_quote_failure_registers_nothing() {
        let market = ScriptedMarket::new(vec![Err(())]);
        let notifier = CountingNotifier::new();
        let sched = scheduler(market, notifier);

        let submitted = alert(dec!(105));
        let id = submitted.id;
        let err = sched.submit(submitted).await.unwrap_err();
        assert!(matches!(err, AppError::QuoteUnavailable(_)));
        assert!(matches!(
            sched.status(id).await,
            Err(AppError::NotFound(_))
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_poll_quote_failure_fails_alert() {
        let market = ScriptedMarket::new(vec![Ok(dec!(100)), Err(())]);
        let notifier = CountingNotifier::new();
        let sched = scheduler(market.clone(), notifier.clone());

        let id = sched.submit(alert(dec!(105))).await.unwrap();
        one_poll().await;

        assert_eq!(sched.status(id).await.unwrap(), AlertStatus::Failed);
        assert_eq!(notifier.sent.load(Ordering::SeqCst), 0);

        // Abandoned, not retried
        let reads = market.reads.load(Ordering::SeqCst);
        one_poll().await;
        assert_eq!(market.reads.load(Ordering::SeqCst), reads);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_stops_polling() {
        let market = ScriptedMarket::new(vec![Ok(dec!(100)), Ok(dec!(200))]);
        let notifier = CountingNotifier::new();
        let sched = scheduler(market.clone(), notifier.clone());

        let id = sched.submit(alert(dec!(105))).await.unwrap();
        sched.cancel(id).await.unwrap();

        one_poll().await;
        assert_eq!(sched.status(id).await.unwrap(), AlertStatus::Cancelled);
        assert_eq!(notifier.sent.load(Ordering::SeqCst), 0);
        // Only the initial read happened
        assert_eq!(market.reads.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_after_trigger_keeps_triggered() {
        let market = ScriptedMarket::new(vec![Ok(dec!(100)), Ok(dec!(106))]);
        let notifier = CountingNotifier::new();
        let sched = scheduler(market, notifier);

        let id = sched.submit(alert(dec!(105))).await.unwrap();
        one_poll().await;
        assert_eq!(sched.status(id).await.unwrap(), AlertStatus::Triggered);

        sched.cancel(id).await.unwrap();
        assert_eq!(sched.status(id).await.unwrap(), AlertStatus::Triggered);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_unknown_id() {
        let market = ScriptedMarket::new(vec![]);
        let notifier = CountingNotifier::new();
        let sched = scheduler(market, notifier);

        assert!(matches!(
            sched.cancel(Uuid::new_v4()).await,
            Err(AppError::NotFound(_))
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_cancels_all() {
        let market = ScriptedMarket::new(vec![Ok(dec!(100)), Ok(dec!(101))]);
        let notifier = CountingNotifier::new();
        let sched = scheduler(market, notifier);

        let a = sched.submit(alert(dec!(105))).await.unwrap();
        let b = sched.submit(alert(dec!(110))).await.unwrap();

        sched.shutdown().await;
        one_poll().await;

        assert_eq!(sched.status(a).await.unwrap(), AlertStatus::Cancelled);
        assert_eq!(sched.status(b).await.unwrap(), AlertStatus::Cancelled);
        assert_eq!(sched.active_count().await, 0);
    }
}
