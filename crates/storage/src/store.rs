use async_trait::async_trait;
use thiserror::Error;

use common::models::{ScreenshotRef, Signal, Trade, TradeEvent};

/// Errors surfaced by a document store implementation.
#[derive(Error, Debug)]
pub enum StoreError {
    /// The store is unreachable or timed out. Retryable with backoff.
    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("document not found: {collection}/{id}")]
    NotFound {
        collection: &'static str,
        id: String,
    },

    /// A write collided with an existing append-only document.
    #[error("document already exists: {collection}/{id}")]
    AlreadyExists {
        collection: &'static str,
        id: String,
    },

    /// A stored row failed to decode into its model.
    #[error("corrupt document in {collection}: {reason}")]
    Corrupt {
        collection: &'static str,
        reason: String,
    },
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            // A row that no longer decodes is permanently bad; retrying
            // the read cannot fix it.
            e @ (sqlx::Error::ColumnDecode { .. }
            | sqlx::Error::Decode(_)
            | sqlx::Error::ColumnNotFound(_)) => StoreError::Corrupt {
                collection: "store",
                reason: e.to_string(),
            },
            e => StoreError::Unavailable(e.to_string()),
        }
    }
}

/// The document whose delivery flag a relay instance wants to claim.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ClaimTarget {
    Signal { id: String },
    TradeEvent { id: String },
}

impl ClaimTarget {
    pub fn collection(&self) -> &'static str {
        match self {
            ClaimTarget::Signal { .. } => "signals",
            ClaimTarget::TradeEvent { .. } => "trade_events",
        }
    }

    pub fn id(&self) -> &str {
        match self {
            ClaimTarget::Signal { id } | ClaimTarget::TradeEvent { id } => id,
        }
    }
}

/// Result of an atomic flag claim.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClaimOutcome {
    /// This caller won the flag flip and must perform the notification.
    Claimed,
    /// Another relay instance (or an earlier pass) already owns it.
    AlreadyClaimed,
}

/// Abstraction over the durable document store holding signals, trades and
/// screenshot references.
///
/// `try_claim` is the only cross-process coordination point in the whole
/// service: it must be an atomic compare-and-set on the flag column so that
/// N concurrent relay instances produce exactly one `Claimed`.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn insert_signal(&self, signal: &Signal) -> Result<(), StoreError>;

    async fn signal(&self, id: &str) -> Result<Signal, StoreError>;

    /// Newest-first, regardless of the delivery flag.
    async fn latest_signals(&self, limit: u32) -> Result<Vec<Signal>, StoreError>;

    /// All signals with `delivered = false`, oldest first.
    async fn pending_signals(&self) -> Result<Vec<Signal>, StoreError>;

    /// Writes the trade's current state and appends one `TradeEvent` row
    /// recording the transition, in a single transaction.
    async fn upsert_trade(&self, trade: &Trade) -> Result<(), StoreError>;

    async fn active_trades(&self) -> Result<Vec<Trade>, StoreError>;

    /// All trade events with `app_notified = false`, oldest first.
    async fn pending_trade_events(&self) -> Result<Vec<TradeEvent>, StoreError>;

    async fn try_claim(&self, target: &ClaimTarget) -> Result<ClaimOutcome, StoreError>;

    async fn insert_screenshot(&self, screenshot: &ScreenshotRef) -> Result<(), StoreError>;

    async fn latest_screenshots(&self, limit: u32) -> Result<Vec<ScreenshotRef>, StoreError>;
}
