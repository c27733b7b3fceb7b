use std::env;
use std::net::SocketAddr;
use std::time::Duration;

use anyhow::Context;

/// Topic-messaging backend credentials. Absent means push is disabled and
/// `/api/notify` answers 502.
#[derive(Debug, Clone)]
pub struct PushConfig {
    pub endpoint: String,
    pub server_key: String,
    pub topic: String,
}

#[derive(Debug, Clone)]
pub struct RelayConfig {
    pub database_path: String,
    pub bind_addr: SocketAddr,
    pub poll_interval: Duration,
    pub push: Option<PushConfig>,
}

impl RelayConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_path = env::var("RELAY_DB_PATH").unwrap_or_else(|_| "relay.db".to_string());

        let bind_addr = env::var("RELAY_BIND_ADDR")
            .unwrap_or_else(|_| "0.0.0.0:8080".to_string())
            .parse::<SocketAddr>()
            .context("RELAY_BIND_ADDR must be host:port")?;

        let poll_ms = env::var("FEED_POLL_INTERVAL_MS")
            .unwrap_or_else(|_| "500".to_string())
            .parse::<u64>()
            .context("FEED_POLL_INTERVAL_MS must be an integer")?;

        let push = match (env::var("PUSH_ENDPOINT"), env::var("PUSH_SERVER_KEY")) {
            (Ok(endpoint), Ok(server_key)) => Some(PushConfig {
                endpoint,
                server_key,
                topic: env::var("PUSH_TOPIC")
                    .unwrap_or_else(|_| "goldex-trading-signals".to_string()),
            }),
            _ => None,
        };

        Ok(Self {
            database_path,
            bind_addr,
            poll_interval: Duration::from_millis(poll_ms),
            push,
        })
    }
}
