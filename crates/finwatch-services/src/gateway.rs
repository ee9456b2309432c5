//! Payment gateway client
//!
//! Books the fixed probe charge used by the renewal sweep. The adapter
//! keeps the two failure shapes apart: an explicit decline is a final
//! answer about the card, while an unreachable or erroring gateway is
//! transient and reported as `GatewayUnavailable`.

use async_trait::async_trait;
use finwatch_core::{
    config::GatewayConfig,
    models::CardDetails,
    traits::{ChargeOutcome, PaymentGateway},
    AppError,
};
use serde::Deserialize;
use std::time::Duration;
use tracing::{info, instrument, warn};

/// Charge API client (bearer-authenticated form POST)
#[derive(Clone)]
pub struct HttpPaymentGateway {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    probe_amount_cents: u32,
    currency: String,
}

/// Charge response body
#[derive(Debug, Deserialize)]
struct ChargeResponse {
    status: String,
}

/// Map one charge response to an outcome
///
/// Only an explicit `succeeded` is an approval. A card-error status from
/// the provider (HTTP 402 or a `requires_payment_method` body) is a
/// decline; everything else means the gateway did not give an answer.
fn map_charge_response(
    http_status: reqwest::StatusCode,
    body_status: Option<&str>,
) -> Result<ChargeOutcome, AppError> {
    if http_status.is_success() {
        return match body_status {
            Some("succeeded") => Ok(ChargeOutcome::Approved),
            Some(other) => {
                warn!("Charge finished in non-success status {}", other);
                Ok(ChargeOutcome::Declined)
            }
            None => Err(AppError::GatewayUnavailable(
                "Charge response missing status".to_string(),
            )),
        };
    }

    if http_status == reqwest::StatusCode::PAYMENT_REQUIRED {
        return Ok(ChargeOutcome::Declined);
    }

    Err(AppError::GatewayUnavailable(format!(
        "Charge API returned {}",
        http_status
    )))
}

impl HttpPaymentGateway {
    /// Create a new client from configuration
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if the HTTP client cannot be built.
    pub fn new(config: &GatewayConfig) -> Result<Self, AppError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| AppError::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            probe_amount_cents: config.probe_amount_cents,
            currency: config.currency.clone(),
        })
    }
}

#[async_trait]
impl PaymentGateway for HttpPaymentGateway {
    #[instrument(skip(self, card))]
    async fn attempt_charge(&self, card: &CardDetails) -> Result<ChargeOutcome, AppError> {
        let number: String = card.number.chars().filter(|c| c.is_ascii_digit()).collect();
        let form = [
            ("amount", self.probe_amount_cents.to_string()),
            ("currency", self.currency.clone()),
            ("confirm", "true".to_string()),
            ("payment_method_data[type]", "card".to_string()),
            ("payment_method_data[card][number]", number),
            (
                "payment_method_data[card][exp_month]",
                card.expiry_month.to_string(),
            ),
            (
                "payment_method_data[card][exp_year]",
                card.expiry_year.to_string(),
            ),
            ("payment_method_data[card][cvc]", card.cvv.clone()),
        ];

        let response = self
            .client
            .post(format!("{}/v1/payment_intents", self.base_url))
            .bearer_auth(&self.api_key)
            .form(&form)
            .send()
            .await
            .map_err(|e| {
                warn!("Charge request failed: {}", e);
                AppError::GatewayUnavailable(format!("Charge request failed: {}", e))
            })?;

        let http_status = response.status();
        let body_status = if http_status.is_success() {
            let body: ChargeResponse = response.json().await.map_err(|e| {
                AppError::GatewayUnavailable(format!("Malformed charge response: {}", e))
            })?;
            Some(body.status)
        } else {
            None
        };

        let outcome = map_charge_response(http_status, body_status.as_deref())?;
        info!("Probe charge outcome: {:?}", outcome);
        Ok(outcome)
    }
}
