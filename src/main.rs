//! FinWatch billing and alert engine
//!
//! Long-running daemon hosting the two control loops: the daily billing
//! sweep over due subscriptions and the price alert scheduler. Storage is
//! PostgreSQL; quotes, charges, and notifications go through HTTP
//! collaborators configured in `AppConfig`.

use finwatch_core::{config::AppConfig, AppError, AppResult};
use finwatch_db::{
    create_pool, PgContactDirectory, PgCredentialRepository, PgInvoiceRepository,
    PgSubscriptionRepository,
};
use finwatch_services::{
    AlertScheduler, BillingSweeper, HttpMarketData, HttpPaymentGateway, InvoiceIssuer,
    WebhookNotifier,
};
use finwatch_vault::{Vault, VaultKey};
use std::env;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Initialize tracing/logging
fn init_tracing() {
    let log_level = env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "finwatch={},finwatch_services={},finwatch_db={},finwatch_vault={},sqlx=warn",
            log_level, log_level, log_level, log_level
        ))
    });

    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            fmt::layer()
                .with_target(true)
                .with_thread_ids(true)
                .with_file(true)
                .with_line_number(true),
        )
        .init();
}

#[tokio::main]
async fn main() -> AppResult<()> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    // Initialize logging
    init_tracing();

    info!("Starting FinWatch engine v{}", env!("CARGO_PKG_VERSION"));

    let config = AppConfig::load().map_err(AppError::from)?;

    info!("Connecting to database...");
    let pool = create_pool(
        &config.database.url,
        Some(config.database.max_connections),
    )
    .await?;
    info!(
        "Database connection established with {} max connections",
        config.database.max_connections
    );

    // Storage
    let subscriptions = Arc::new(PgSubscriptionRepository::new(pool.clone()));
    let credentials = Arc::new(PgCredentialRepository::new(pool.clone()));
    let invoices = Arc::new(PgInvoiceRepository::new(pool.clone()));
    let contacts = Arc::new(PgContactDirectory::new(pool.clone()));

    // Credential vault, keyed from configuration
    let vault = Arc::new(Vault::new(VaultKey::from_base64(&config.vault.key)?));

    // External collaborators
    let market = Arc::new(HttpMarketData::new(&config.market)?);
    let gateway = Arc::new(HttpPaymentGateway::new(&config.gateway)?);
    let notifier = Arc::new(WebhookNotifier::new(&config.notifier)?);

    let issuer = Arc::new(InvoiceIssuer::new(invoices, notifier.clone()));

    let sweeper = Arc::new(BillingSweeper::new(
        subscriptions,
        credentials,
        contacts,
        gateway,
        vault,
        issuer,
        &config.scheduler,
    ));

    let scheduler = AlertScheduler::new(
        market,
        notifier,
        Duration::from_secs(config.scheduler.alert_poll_secs),
    );
    info!(
        "Alert scheduler ready (poll interval {}s)",
        config.scheduler.alert_poll_secs
    );

    let shutdown = CancellationToken::new();
    let sweep_handle = {
        let sweeper = sweeper.clone();
        let shutdown = shutdown.clone();
        let interval = Duration::from_secs(config.scheduler.sweep_interval_secs);
        tokio::spawn(async move {
            sweeper.run_forever(interval, shutdown).await;
        })
    };
    info!(
        "Billing sweeper running (interval {}s, period {} days)",
        config.scheduler.sweep_interval_secs, config.scheduler.billing_period_days
    );

    tokio::signal::ctrl_c().await?;
    info!("Shutdown signal received");

    shutdown.cancel();
    scheduler.shutdown().await;
    if let Err(e) = sweep_handle.await {
        tracing::warn!("Sweeper task did not join cleanly: {}", e);
    }

    info!("FinWatch engine stopped");
    Ok(())
}
