//! Invoice issuer
//!
//! Creates uniquely identified invoices for successful renewals and
//! dispatches a best-effort receipt. Identifier uniqueness is enforced by
//! regenerating on collision before insert; a duplicate id would violate
//! the append-only ledger's primary key, so the check is mandatory even
//! though collisions are negligibly rare.

use crate::templates;
use finwatch_core::{
    models::{Contact, Invoice},
    traits::{InvoiceRepository, Notifier},
    AppResult,
};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, instrument, warn};
use uuid::Uuid;

/// Invoice issuer
pub struct InvoiceIssuer {
    invoices: Arc<dyn InvoiceRepository>,
    notifier: Arc<dyn Notifier>,
}

impl InvoiceIssuer {
    /// Create a new invoice issuer
    pub fn new(invoices: Arc<dyn InvoiceRepository>, notifier: Arc<dyn Notifier>) -> Self {
        Self { invoices, notifier }
    }

    /// Issue an invoice to a user and send the receipt
    ///
    /// The receipt notification is best-effort: a delivery failure is
    /// logged and the invoice stands. The financial record takes precedence
    /// over the receipt email.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Store` if the ledger cannot be read or written.
    #[instrument(skip(self, contact))]
    pub async fn issue(&self, user_id: Uuid, contact: Option<&Contact>) -> AppResult<Invoice> {
        let mut invoice = Invoice::new(user_id);

        while self.invoices.exists(invoice.id).await? {
            warn!("Invoice id collision on {}, regenerating", invoice.id);
            invoice.regenerate_id();
        }

        self.invoices.insert(&invoice).await?;
        info!("Issued invoice {} for user {}", invoice.id, user_id);

        match contact {
            Some(contact) => {
                let mut fields = HashMap::new();
                fields.insert("name".to_string(), contact.name.clone());
                fields.insert("uuid".to_string(), invoice.id.to_string());
                fields.insert("today".to_string(), invoice.issued_at.to_rfc3339());

                if let Err(e) = self
                    .notifier
                    .send(contact, templates::INVOICE_RECEIPT, &fields)
                    .await
                {
                    warn!("Receipt for invoice {} not delivered: {}", invoice.id, e);
                }
            }
            None => {
                warn!(
                    "No contact on record for user {}, receipt for invoice {} skipped",
                    user_id, invoice.id
                );
            }
        }

        Ok(invoice)
    }
}
