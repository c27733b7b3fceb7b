use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TradeStatus {
    Pending,
    Active,
    Closed,
    Cancelled,
}

impl TradeStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TradeStatus::Pending => "pending",
            TradeStatus::Active => "active",
            TradeStatus::Closed => "closed",
            TradeStatus::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for TradeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TradeStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(TradeStatus::Pending),
            "active" => Ok(TradeStatus::Active),
            "closed" => Ok(TradeStatus::Closed),
            "cancelled" => Ok(TradeStatus::Cancelled),
            other => Err(format!("unknown trade status: {}", other)),
        }
    }
}

/// Current state of a position, maintained by the external trading system.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Trade {
    pub id: String,
    pub signal_id: Option<String>,
    pub status: TradeStatus,
    pub profit_loss: f64,
    pub updated_at: DateTime<Utc>,
}

/// One notification record per trade transition.
///
/// A trade may change state many times; each transition gets its own
/// append-only event row with its own `app_notified` flag, so every
/// transition is independently gated for delivery. The relay claims the
/// flag and never writes anything else.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradeEvent {
    pub id: String,
    pub trade_id: String,
    pub status: TradeStatus,
    pub profit_loss: f64,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub app_notified: bool,
}

impl TradeEvent {
    /// Builds the event row recording `trade`'s latest transition.
    pub fn for_transition(trade: &Trade) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            trade_id: trade.id.clone(),
            status: trade.status,
            profit_loss: trade.profit_loss,
            created_at: Utc::now(),
            app_notified: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_serializes_lowercase() {
        assert_eq!(
            serde_json::to_string(&TradeStatus::Cancelled).unwrap(),
            "\"cancelled\""
        );
        assert_eq!("active".parse::<TradeStatus>().unwrap(), TradeStatus::Active);
        assert!("open".parse::<TradeStatus>().is_err());
    }

    #[test]
    fn transition_event_carries_trade_state() {
        let trade = Trade {
            id: "t-9".to_string(),
            signal_id: Some("sig-1".to_string()),
            status: TradeStatus::Closed,
            profit_loss: 41.25,
            updated_at: Utc::now(),
        };

        let event = TradeEvent::for_transition(&trade);
        assert_eq!(event.trade_id, "t-9");
        assert_eq!(event.status, TradeStatus::Closed);
        assert_eq!(event.profit_loss, 41.25);
        assert!(!event.app_notified);
    }
}
