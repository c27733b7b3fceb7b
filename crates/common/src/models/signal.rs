use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Trade direction of a generated signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Buy,
    Sell,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Buy => "buy",
            Direction::Sell => "sell",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Direction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "buy" => Ok(Direction::Buy),
            "sell" => Ok(Direction::Sell),
            other => Err(format!("unknown direction: {}", other)),
        }
    }
}

/// A trading recommendation written into the store by the upstream producer.
///
/// The relay only ever flips `delivered` (false -> true, exactly once); it
/// never creates or deletes signal documents.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Signal {
    pub id: String,
    pub symbol: String,
    pub direction: Direction,
    pub entry_price: f64,
    pub stop_loss: f64,
    pub take_profit: f64,
    /// 0.0 - 1.0
    pub confidence: f64,
    pub reasoning: String,
    pub timeframe: String,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub delivered: bool,
}

impl Signal {
    /// Risk:reward ratio of the signal.
    ///
    /// `(tp - entry) / (entry - sl)` for buys, sign-inverted for sells.
    /// Returns `None` when the stop equals the entry so neither infinity
    /// nor NaN can leak onto the wire.
    pub fn risk_reward(&self) -> Option<f64> {
        let (reward, risk) = match self.direction {
            Direction::Buy => (
                self.take_profit - self.entry_price,
                self.entry_price - self.stop_loss,
            ),
            Direction::Sell => (
                self.entry_price - self.take_profit,
                self.stop_loss - self.entry_price,
            ),
        };

        if risk == 0.0 {
            return None;
        }
        Some(reward / risk)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn gold_buy() -> Signal {
        Signal {
            id: "sig-1".to_string(),
            symbol: "XAUUSD".to_string(),
            direction: Direction::Buy,
            entry_price: 2374.50,
            stop_loss: 2360.00,
            take_profit: 2395.00,
            confidence: 0.87,
            reasoning: "London breakout continuation".to_string(),
            timeframe: "5m".to_string(),
            created_at: Utc.with_ymd_and_hms(2025, 7, 14, 8, 30, 0).unwrap(),
            delivered: false,
        }
    }

    #[test]
    fn risk_reward_for_buy() {
        let ratio = gold_buy().risk_reward().unwrap();
        // 20.50 / 14.50
        assert!((ratio - 1.4138).abs() < 1e-4);
    }

    #[test]
    fn risk_reward_for_sell() {
        let mut signal = gold_buy();
        signal.direction = Direction::Sell;
        signal.take_profit = 2360.00;
        signal.stop_loss = 2395.00;

        let ratio = signal.risk_reward().unwrap();
        assert!((ratio - 14.50 / 20.50).abs() < 1e-4);
    }

    #[test]
    fn risk_reward_is_none_when_stop_equals_entry() {
        let mut signal = gold_buy();
        signal.stop_loss = signal.entry_price;

        assert_eq!(signal.risk_reward(), None);
    }

    #[test]
    fn direction_round_trips_through_serde() {
        let json = serde_json::to_string(&Direction::Buy).unwrap();
        assert_eq!(json, "\"buy\"");
        let back: Direction = serde_json::from_str("\"sell\"").unwrap();
        assert_eq!(back, Direction::Sell);
    }
}
