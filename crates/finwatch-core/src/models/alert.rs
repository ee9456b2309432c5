//! Price alert model
//!
//! An alert is a user-configured watch that fires a single notification when
//! a monitored price crosses a threshold. Alerts are held in memory for the
//! duration of their polling loop only; a process restart drops pending
//! alerts.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Instrument kind for a watched symbol
///
/// Selects which quote endpoint the market data provider queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InstrumentKind {
    Stock,
    Crypto,
}

impl fmt::Display for InstrumentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InstrumentKind::Stock => write!(f, "stock"),
            InstrumentKind::Crypto => write!(f, "crypto"),
        }
    }
}

impl InstrumentKind {
    /// Parse from string (case-insensitive)
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "stock" => Some(InstrumentKind::Stock),
            "crypto" => Some(InstrumentKind::Crypto),
            _ => None,
        }
    }
}

/// Notification target for an alert or a receipt
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contact {
    /// Display name used in message templates
    pub name: String,

    /// Delivery address (email or equivalent)
    pub email: String,
}

/// Direction a watch is armed in, decided by the initial price read
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WatchDirection {
    /// Current price started below the target; fire when it reaches or
    /// exceeds the target.
    RiseAbove,
    /// Current price started above the target; fire when it reaches or
    /// drops below the target.
    FallBelow,
}

impl WatchDirection {
    /// Whether `current` satisfies the trigger condition for this direction
    pub fn is_met(&self, current: Decimal, target: Decimal) -> bool {
        match self {
            WatchDirection::RiseAbove => current >= target,
            WatchDirection::FallBelow => current <= target,
        }
    }
}

/// Lifecycle state of an alert
///
/// Explicit state machine replacing recursive timer callbacks. `Triggered`,
/// `Failed`, and `Cancelled` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertStatus {
    /// Direction armed, recurring price checks scheduled
    Polling,
    /// Condition met, single notification sent
    Triggered,
    /// A price read failed; the alert is permanently cancelled
    Failed,
    /// Cancelled by the user before triggering
    Cancelled,
}

impl AlertStatus {
    /// Whether no further poll may be scheduled from this state
    pub fn is_terminal(&self) -> bool {
        !matches!(self, AlertStatus::Polling)
    }
}

impl fmt::Display for AlertStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AlertStatus::Polling => write!(f, "polling"),
            AlertStatus::Triggered => write!(f, "triggered"),
            AlertStatus::Failed => write!(f, "failed"),
            AlertStatus::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// Price alert entity
///
/// Immutable once submitted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Alert {
    /// Unique identifier for cancellation and status queries
    pub id: Uuid,

    /// Watched symbol (ticker or crypto pair)
    pub symbol: String,

    /// Which quote endpoint the symbol belongs to
    pub kind: InstrumentKind,

    /// Price threshold the user wants to be notified about
    pub target_price: Decimal,

    /// Who to notify when the alert fires
    pub contact: Contact,

    /// Submission timestamp
    pub created_at: DateTime<Utc>,
}

impl Alert {
    /// Create a new alert for the given symbol and threshold
    pub fn new(
        symbol: impl Into<String>,
        kind: InstrumentKind,
        target_price: Decimal,
        contact: Contact,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            symbol: symbol.into(),
            kind,
            target_price,
            contact,
            created_at: Utc::now(),
        }
    }
}
