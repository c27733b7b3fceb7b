use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{Signal, TradeEvent};

/// Frame pushed to every connected realtime client.
///
/// Serializes to `{"type": "...", "data": {...}, "timestamp": "<ISO8601>"}`,
/// the shape the mobile client already consumes.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum WireEvent {
    #[serde(rename = "NEW_SIGNAL")]
    NewSignal {
        data: Signal,
        timestamp: DateTime<Utc>,
    },
    #[serde(rename = "TRADE_UPDATE")]
    TradeUpdate {
        data: TradeEvent,
        timestamp: DateTime<Utc>,
    },
}

impl WireEvent {
    pub fn new_signal(signal: Signal) -> Self {
        WireEvent::NewSignal {
            data: signal,
            timestamp: Utc::now(),
        }
    }

    pub fn trade_update(event: TradeEvent) -> Self {
        WireEvent::TradeUpdate {
            data: event,
            timestamp: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Direction, TradeStatus};
    use chrono::TimeZone;

    #[test]
    fn signal_frame_has_wire_shape() {
        let event = WireEvent::NewSignal {
            data: Signal {
                id: "sig-7".to_string(),
                symbol: "XAUUSD".to_string(),
                direction: Direction::Buy,
                entry_price: 2374.5,
                stop_loss: 2360.0,
                take_profit: 2395.0,
                confidence: 0.91,
                reasoning: String::new(),
                timeframe: "15m".to_string(),
                created_at: Utc.with_ymd_and_hms(2025, 7, 14, 8, 30, 0).unwrap(),
                delivered: true,
            },
            timestamp: Utc.with_ymd_and_hms(2025, 7, 14, 8, 30, 5).unwrap(),
        };

        let value: serde_json::Value =
            serde_json::from_str(&serde_json::to_string(&event).unwrap()).unwrap();

        assert_eq!(value["type"], "NEW_SIGNAL");
        assert_eq!(value["data"]["id"], "sig-7");
        assert_eq!(value["data"]["direction"], "buy");
        assert!(value["timestamp"].as_str().unwrap().starts_with("2025-07-14T08:30:05"));
    }

    #[test]
    fn trade_frame_is_tagged_trade_update() {
        let event = WireEvent::TradeUpdate {
            data: TradeEvent {
                id: "ev-1".to_string(),
                trade_id: "t-3".to_string(),
                status: TradeStatus::Active,
                profit_loss: -4.2,
                created_at: Utc::now(),
                app_notified: true,
            },
            timestamp: Utc::now(),
        };

        let value: serde_json::Value =
            serde_json::from_str(&serde_json::to_string(&event).unwrap()).unwrap();

        assert_eq!(value["type"], "TRADE_UPDATE");
        assert_eq!(value["data"]["trade_id"], "t-3");
        assert_eq!(value["data"]["status"], "active");
    }
}
