//! Unified error handling for FinWatch
//!
//! This module provides the error taxonomy shared by the schedulers and
//! their collaborators. Errors local to one alert or one subscription are
//! resolved to a terminal state for that entity only; they never abort
//! sibling work.

use thiserror::Error;

/// Main application error type
///
/// All errors in the engine should be converted to this type.
#[derive(Error, Debug)]
pub enum AppError {
    // ==================== Persistence Errors ====================
    #[error("Store error: {0}")]
    Store(String),

    #[error("Store pool error: {0}")]
    Pool(String),

    // ==================== Provider Errors ====================
    /// The quote source could not produce a price for the symbol.
    #[error("Quote unavailable for {0}")]
    QuoteUnavailable(String),

    /// The payment gateway could not be reached (network/timeout).
    /// Transient, unlike an explicit decline.
    #[error("Payment gateway unavailable: {0}")]
    GatewayUnavailable(String),

    /// The payment gateway explicitly rejected the card.
    #[error("Payment declined")]
    PaymentDeclined,

    // ==================== Credential Errors ====================
    /// A sealed credential blob could not be opened (wrong key or
    /// corrupted data). Treated as a billing failure by the sweep.
    #[error("Decryption failed: {0}")]
    Decryption(String),

    // ==================== Resource Errors ====================
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Subscription not found: {0}")]
    SubscriptionNotFound(String),

    // ==================== Notification Errors ====================
    #[error("Notification failed: {0}")]
    Notification(String),

    // ==================== Validation Errors ====================
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    // ==================== Internal Errors ====================
    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl AppError {
    /// Whether the failure is expected to clear on its own, making a later
    /// retry reasonable (the next poll or the next daily sweep).
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            AppError::GatewayUnavailable(_)
                | AppError::QuoteUnavailable(_)
                | AppError::Store(_)
                | AppError::Pool(_)
        )
    }

    /// Returns a short machine-readable code for log fields
    pub fn error_code(&self) -> &'static str {
        match self {
            AppError::Store(_) => "store_error",
            AppError::Pool(_) => "pool_error",
            AppError::QuoteUnavailable(_) => "quote_unavailable",
            AppError::GatewayUnavailable(_) => "gateway_unavailable",
            AppError::PaymentDeclined => "payment_declined",
            AppError::Decryption(_) => "decryption_error",
            AppError::NotFound(_) => "not_found",
            AppError::SubscriptionNotFound(_) => "subscription_not_found",
            AppError::Notification(_) => "notification_error",
            AppError::InvalidInput(_) => "invalid_input",
            AppError::Internal(_) => "internal_error",
            AppError::Config(_) => "config_error",
            AppError::Serialization(_) => "serialization_error",
        }
    }
}

// ==================== From implementations ====================

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Serialization(err.to_string())
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::Internal(err.to_string())
    }
}

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        AppError::Config(err.to_string())
    }
}
