//! Market data client
//!
//! HTTP client for the external quote API. Equities and crypto pairs are
//! served by separate endpoints upstream; the client dispatches on the
//! instrument kind and presents a single `MarketDataProvider` surface.

use async_trait::async_trait;
use finwatch_core::{
    config::MarketDataConfig, models::InstrumentKind, traits::MarketDataProvider, AppError,
};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, instrument, warn};

/// Quote API client
#[derive(Clone)]
pub struct HttpMarketData {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

/// Quote payload returned by both endpoints
#[derive(Debug, Deserialize)]
struct QuoteResponse {
    /// Current price
    c: f64,
}

impl HttpMarketData {
    /// Create a new client from configuration
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if the HTTP client cannot be built.
    pub fn new(config: &MarketDataConfig) -> Result<Self, AppError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| AppError::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
        })
    }

    fn endpoint(&self, kind: InstrumentKind) -> String {
        match kind {
            InstrumentKind::Stock => format!("{}/quote", self.base_url),
            InstrumentKind::Crypto => format!("{}/crypto/quote", self.base_url),
        }
    }
}

/// Convert a raw quote into a price
///
/// The upstream API reports unknown symbols as a zero quote rather than an
/// HTTP error, so zero and negative values are treated as no quote.
fn parse_price(symbol: &str, raw: f64) -> Result<Decimal, AppError> {
    if !raw.is_finite() || raw <= 0.0 {
        return Err(AppError::QuoteUnavailable(format!(
            "No quote for symbol {}",
            symbol
        )));
    }
    Decimal::try_from(raw)
        .map_err(|e| AppError::QuoteUnavailable(format!("Unusable quote for {}: {}", symbol, e)))
}

#[async_trait]
impl MarketDataProvider for HttpMarketData {
    #[instrument(skip(self))]
    async fn current_price(
        &self,
        symbol: &str,
        kind: InstrumentKind,
    ) -> Result<Decimal, AppError> {
        let response = self
            .client
            .get(self.endpoint(kind))
            .query(&[("symbol", symbol), ("token", self.api_key.as_str())])
            .send()
            .await
            .map_err(|e| {
                warn!("Quote request for {} failed: {}", symbol, e);
                AppError::QuoteUnavailable(format!("Quote request failed: {}", e))
            })?;

        if !response.status().is_success() {
            return Err(AppError::QuoteUnavailable(format!(
                "Quote API returned {} for symbol {}",
                response.status(),
                symbol
            )));
        }

        let quote: QuoteResponse = response.json().await.map_err(|e| {
            AppError::QuoteUnavailable(format!("Malformed quote for {}: {}", symbol, e))
        })?;

        let price = parse_price(symbol, quote.c)?;
        debug!("Quote {} {} = {}", kind, symbol, price);
        Ok(price)
    }
}
