use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::{Value, json};
use thiserror::Error;
use tracing::info;

use common::models::Signal;

use crate::config::PushConfig;

#[derive(Error, Debug)]
pub enum PushError {
    /// The provider rejected the message; surfaced to the caller, never
    /// retried here.
    #[error("messaging provider error: {0}")]
    Provider(String),

    #[error("messaging transport error: {0}")]
    Transport(#[from] reqwest::Error),
}

/// Provider-agnostic topic message.
#[derive(Debug, Clone, PartialEq)]
pub struct PushMessage {
    pub title: String,
    pub body: String,
    pub topic: String,
    pub data: HashMap<String, String>,
}

/// Seam to the topic-based messaging backend.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PushProvider: Send + Sync {
    /// Returns the provider's message id on success.
    async fn send(&self, message: &PushMessage) -> Result<String, PushError>;
}

/// FCM-style HTTP topic sender.
pub struct FcmClient {
    client: Client,
    endpoint: String,
    server_key: String,
}

impl FcmClient {
    pub fn new(config: &PushConfig) -> Self {
        Self {
            client: Client::builder()
                .user_agent("signal-relay/0.1.0")
                .timeout(Duration::from_secs(30))
                .build()
                .expect("Failed to build HTTP client."),
            endpoint: config.endpoint.clone(),
            server_key: config.server_key.clone(),
        }
    }
}

#[async_trait]
impl PushProvider for FcmClient {
    async fn send(&self, message: &PushMessage) -> Result<String, PushError> {
        let payload = json!({
            "to": format!("/topics/{}", message.topic),
            "notification": {
                "title": message.title,
                "body": message.body,
            },
            "data": message.data,
        });

        let response = self
            .client
            .post(&self.endpoint)
            .header("Authorization", format!("key={}", self.server_key))
            .json(&payload)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(PushError::Provider(format!("HTTP {}: {}", status, text)));
        }

        let body: Value = response.json().await?;
        let message_id = body
            .get("message_id")
            .map(|v| v.to_string().trim_matches('"').to_string())
            .ok_or_else(|| PushError::Provider("response missing message_id".to_string()))?;

        info!("Push notification sent: {}", message_id);
        Ok(message_id)
    }
}

/// Formats documents into push messages and hands them to the provider.
pub struct PushDispatcher {
    provider: Arc<dyn PushProvider>,
    topic: String,
}

impl PushDispatcher {
    pub fn new(provider: Arc<dyn PushProvider>, topic: String) -> Self {
        Self { provider, topic }
    }

    /// Manual notification, driven by the HTTP API.
    pub async fn notify(
        &self,
        title: String,
        body: String,
        data: HashMap<String, String>,
    ) -> Result<String, PushError> {
        self.provider
            .send(&PushMessage {
                title,
                body,
                topic: self.topic.clone(),
                data,
            })
            .await
    }

    /// One alert per claimed signal: direction + confidence in the title,
    /// instrument, entry and risk:reward in the body. The ratio is omitted
    /// entirely when the stop sits on the entry.
    pub async fn send_signal_alert(&self, signal: &Signal) -> Result<String, PushError> {
        let title = format!(
            "{} Signal - {:.0}%",
            signal.direction.as_str().to_uppercase(),
            signal.confidence * 100.0
        );

        let body = match signal.risk_reward() {
            Some(ratio) => format!(
                "{} @ {} | R:R {:.2}:1",
                signal.symbol, signal.entry_price, ratio
            ),
            None => format!("{} @ {}", signal.symbol, signal.entry_price),
        };

        let mut data = HashMap::new();
        data.insert("signal_id".to_string(), signal.id.clone());
        data.insert("confidence".to_string(), signal.confidence.to_string());
        data.insert("entry_price".to_string(), signal.entry_price.to_string());

        self.provider
            .send(&PushMessage {
                title,
                body,
                topic: self.topic.clone(),
                data,
            })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use common::models::Direction;
    use mockall::predicate;

    fn signal() -> Signal {
        Signal {
            id: "sig-1".to_string(),
            symbol: "XAUUSD".to_string(),
            direction: Direction::Buy,
            entry_price: 2374.50,
            stop_loss: 2360.00,
            take_profit: 2395.00,
            confidence: 0.87,
            reasoning: String::new(),
            timeframe: "5m".to_string(),
            created_at: Utc::now(),
            delivered: false,
        }
    }

    #[tokio::test]
    async fn signal_alert_embeds_direction_confidence_and_ratio() {
        let mut provider = MockPushProvider::new();
        provider
            .expect_send()
            .with(predicate::function(|m: &PushMessage| {
                m.title == "BUY Signal - 87%"
                    && m.body == "XAUUSD @ 2374.5 | R:R 1.41:1"
                    && m.topic == "gold-signals"
                    && m.data["signal_id"] == "sig-1"
            }))
            .times(1)
            .returning(|_| Ok("mid-1".to_string()));

        let dispatcher = PushDispatcher::new(Arc::new(provider), "gold-signals".to_string());
        assert_eq!(dispatcher.send_signal_alert(&signal()).await.unwrap(), "mid-1");
    }

    #[tokio::test]
    async fn zero_risk_signal_omits_the_ratio() {
        let mut signal = signal();
        signal.stop_loss = signal.entry_price;

        let mut provider = MockPushProvider::new();
        provider
            .expect_send()
            .with(predicate::function(|m: &PushMessage| {
                m.body == "XAUUSD @ 2374.5" && !m.body.contains("R:R")
            }))
            .times(1)
            .returning(|_| Ok("mid-2".to_string()));

        let dispatcher = PushDispatcher::new(Arc::new(provider), "gold-signals".to_string());
        dispatcher.send_signal_alert(&signal).await.unwrap();
    }

    #[tokio::test]
    async fn provider_errors_surface_to_the_caller() {
        let mut provider = MockPushProvider::new();
        provider
            .expect_send()
            .returning(|_| Err(PushError::Provider("quota exceeded".to_string())));

        let dispatcher = PushDispatcher::new(Arc::new(provider), "gold-signals".to_string());
        let err = dispatcher
            .notify("t".to_string(), "b".to_string(), HashMap::new())
            .await
            .unwrap_err();
        assert!(matches!(err, PushError::Provider(_)));
    }
}
