use std::sync::Arc;
use std::time::Duration;

use dotenvy::dotenv;
use tokio::sync::broadcast;
use tracing::{error, info};

use common::actors::ActorType;
use common::events::WireEvent;
use common::logger;
use feed::{ChangeBatch, ChangeFeed};
use storage::{DeliveryTracker, DocumentStore, SqliteStore, db};

use relay::actors::Supervisor;
use relay::config::RelayConfig;
use relay::http::{AppState, router};
use relay::services::{FcmClient, PushDispatcher, RelayService};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    logger::setup_logger();

    let config = RelayConfig::from_env()?;
    let pool = db::connect(&config.database_path).await?;
    let store: Arc<dyn DocumentStore> = Arc::new(SqliteStore::new(pool));

    let (changes_tx, _) = broadcast::channel::<Arc<ChangeBatch>>(1024);
    let (events_tx, _) = broadcast::channel::<Arc<WireEvent>>(1024);

    let push = config.push.as_ref().map(|push_config| {
        Arc::new(PushDispatcher::new(
            Arc::new(FcmClient::new(push_config)),
            push_config.topic.clone(),
        ))
    });
    if push.is_none() {
        info!("PUSH_ENDPOINT/PUSH_SERVER_KEY not set - push notifications disabled");
    }

    let mut supervisor = Supervisor::new();

    let store_for_feed = store.clone();
    let tx_for_feed = changes_tx.clone();
    let poll_interval = config.poll_interval;
    supervisor.register_actor(
        ActorType::FeedActor,
        Box::new(move || {
            Box::new(ChangeFeed::new(
                store_for_feed.clone(),
                tx_for_feed.clone(),
                poll_interval,
            ))
        }),
    );

    let store_for_relay = store.clone();
    let changes_for_relay = changes_tx.clone();
    let events_for_relay = events_tx.clone();
    let push_for_relay = push.clone();
    supervisor.register_actor(
        ActorType::RelayActor,
        Box::new(move || {
            Box::new(RelayService::new(
                changes_for_relay.subscribe(),
                DeliveryTracker::new(store_for_relay.clone()),
                events_for_relay.clone(),
                push_for_relay.clone(),
            ))
        }),
    );

    let state = Arc::new(AppState {
        store,
        push,
        events_tx,
    });
    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    info!("Signal relay listening on {}", config.bind_addr);

    let server = tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, router(state))
            .with_graceful_shutdown(shutdown_signal())
            .await
        {
            error!("HTTP server error: {}", e);
        }
    });

    tokio::select! {
        _ = supervisor.start() => {}
        _ = tokio::signal::ctrl_c() => info!("Shutdown requested, draining connections"),
    }

    // Best-effort drain of in-flight sends, bounded.
    let _ = tokio::time::timeout(Duration::from_secs(5), server).await;
    Ok(())
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
}
