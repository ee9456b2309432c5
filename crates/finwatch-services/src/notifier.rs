//! Notification relay client
//!
//! Posts rendered notifications to an HTTP relay that handles the actual
//! delivery channel. Callers treat delivery as best-effort; the schedulers
//! log a failed send and move on.

use async_trait::async_trait;
use finwatch_core::{config::NotifierConfig, models::Contact, traits::Notifier, AppError};
use serde::Serialize;
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, instrument, warn};

/// Relay client
#[derive(Clone)]
pub struct WebhookNotifier {
    client: reqwest::Client,
    endpoint: String,
    sender: String,
}

/// Payload posted to the relay
#[derive(Debug, Serialize, PartialEq)]
struct NotificationPayload<'a> {
    sender: &'a str,
    to: &'a str,
    template: &'a str,
    fields: &'a HashMap<String, String>,
}

fn build_payload<'a>(
    sender: &'a str,
    contact: &'a Contact,
    template: &'a str,
    fields: &'a HashMap<String, String>,
) -> NotificationPayload<'a> {
    NotificationPayload {
        sender,
        to: &contact.email,
        template,
        fields,
    }
}

impl WebhookNotifier {
    /// Create a new relay client from configuration
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if the HTTP client cannot be built.
    pub fn new(config: &NotifierConfig) -> Result<Self, AppError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| AppError::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            endpoint: config.endpoint.clone(),
            sender: config.sender.clone(),
        })
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    #[instrument(skip(self, contact, fields), fields(template = template))]
    async fn send(
        &self,
        contact: &Contact,
        template: &str,
        fields: &HashMap<String, String>,
    ) -> Result<(), AppError> {
        let payload = build_payload(&self.sender, contact, template, fields);

        let response = self
            .client
            .post(&self.endpoint)
            .json(&payload)
            .send()
            .await
            .map_err(|e| {
                warn!("Notification relay unreachable: {}", e);
                AppError::Notification(format!("Relay request failed: {}", e))
            })?;

        if !response.status().is_success() {
            return Err(AppError::Notification(format!(
                "Relay returned {}",
                response.status()
            )));
        }

        debug!("Notification {} delivered to relay", template);
        Ok(())
    }
}
