//! Payment credential models
//!
//! `CardDetails` is the plaintext form of a stored card. It exists only
//! transiently, between `Vault::open` and the gateway call, and its `Debug`
//! impl redacts the sensitive fields. `StoredCredential` is the persisted,
//! Vault-sealed form.

use crate::{AppError, AppResult};
use chrono::{DateTime, Datelike, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::OnceLock;
use uuid::Uuid;

/// 16-digit card numbers in groups of four, or 4-6-5 grouping, with
/// optional spaces between groups
const CARD_NUMBER_PATTERN: &str = r"^(\d{4}\s?\d{4}\s?\d{4}\s?\d{4}|\d{4}\s?\d{6}\s?\d{5})$";

const CVV_PATTERN: &str = r"^\d{3,4}$";

fn card_number_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(CARD_NUMBER_PATTERN).expect("valid card number pattern"))
}

fn cvv_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(CVV_PATTERN).expect("valid cvv pattern"))
}

/// Plaintext payment card fields
///
/// Never persisted or logged in this form; persist via `Vault::seal` only.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CardDetails {
    /// Card number, optionally space-grouped
    pub number: String,

    /// Expiry month (1-12)
    pub expiry_month: u8,

    /// Expiry year, four digits
    pub expiry_year: u16,

    /// Card verification value
    pub cvv: String,

    /// Name on the card
    pub holder_name: String,
}

impl CardDetails {
    /// Normalize a two-digit expiry year to a four-digit one
    ///
    /// Years 00-49 map into the 2000s; anything else is rejected, matching
    /// the upgrade-form rules.
    pub fn expand_two_digit_year(yy: u8) -> AppResult<u16> {
        if yy <= 49 {
            Ok(2000 + yy as u16)
        } else {
            Err(AppError::InvalidInput("Invalid expiration date".into()))
        }
    }

    /// Validate the card fields against the upgrade-form rules
    ///
    /// Checks number shape, expiry ranges, expiry-in-past, and CVV length.
    /// Returns `AppError::InvalidInput` naming the first failing field.
    pub fn validate(&self, now: DateTime<Utc>) -> AppResult<()> {
        if !card_number_re().is_match(self.number.trim()) {
            return Err(AppError::InvalidInput("Invalid credit card".into()));
        }
        if !(1..=12).contains(&self.expiry_month) {
            return Err(AppError::InvalidInput("Invalid expiration date".into()));
        }
        if !(2000..=2049).contains(&self.expiry_year) {
            return Err(AppError::InvalidInput("Invalid expiration date".into()));
        }
        let (year, month) = (now.year() as u16, now.month() as u8);
        if self.expiry_year < year || (self.expiry_year == year && self.expiry_month < month) {
            return Err(AppError::InvalidInput("Credit card is expired".into()));
        }
        if !cvv_re().is_match(&self.cvv) {
            return Err(AppError::InvalidInput("Invalid CVV code".into()));
        }
        Ok(())
    }
}

impl fmt::Debug for CardDetails {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let digits: String = self.number.chars().filter(|c| c.is_ascii_digit()).collect();
        let last4 = if digits.len() >= 4 {
            &digits[digits.len() - 4..]
        } else {
            "????"
        };
        f.debug_struct("CardDetails")
            .field("number", &format_args!("****{}", last4))
            .field("expiry_month", &self.expiry_month)
            .field("expiry_year", &self.expiry_year)
            .field("cvv", &"***")
            .field("holder_name", &self.holder_name)
            .finish()
    }
}

/// Sealed credential record (at most one per user)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredCredential {
    /// Owning user
    pub user_id: Uuid,

    /// Vault-sealed `CardDetails` (nonce-prefixed AES-256-GCM ciphertext)
    pub blob: Vec<u8>,

    /// When the credential was last written
    pub updated_at: DateTime<Utc>,
}

impl StoredCredential {
    /// Create a new sealed credential record
    pub fn new(user_id: Uuid, blob: Vec<u8>) -> Self {
        Self {
            user_id,
            blob,
            updated_at: Utc::now(),
        }
    }
}
