use std::collections::HashMap;
use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use common::events::WireEvent;
use common::models::{ScreenshotRef, Signal, Trade};
use storage::DocumentStore;

use crate::http::error::ApiError;
use crate::http::ws::websocket_handler;
use crate::services::push_service::PushDispatcher;

const DEFAULT_LIMIT: u32 = 10;
const MAX_LIMIT: u32 = 100;

pub struct AppState {
    pub store: Arc<dyn DocumentStore>,
    pub push: Option<Arc<PushDispatcher>>,
    pub events_tx: broadcast::Sender<Arc<WireEvent>>,
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/ws", get(websocket_handler))
        .route("/api/signals/latest", get(latest_signals_handler))
        .route("/api/trades/active", get(active_trades_handler))
        .route("/api/notify", post(notify_handler))
        .route(
            "/api/screenshots",
            post(record_screenshot_handler).get(latest_screenshots_handler),
        )
        .with_state(state)
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    timestamp: DateTime<Utc>,
    service: &'static str,
}

/// Liveness only: deliberately independent of store connectivity, so a
/// flapping database never takes the process out of rotation.
async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        timestamp: Utc::now(),
        service: "signal-relay",
    })
}

#[derive(Deserialize)]
struct LimitParams {
    limit: Option<u32>,
}

impl LimitParams {
    fn clamped(&self) -> u32 {
        self.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT)
    }
}

async fn latest_signals_handler(
    State(state): State<Arc<AppState>>,
    Query(params): Query<LimitParams>,
) -> Result<Json<Vec<Signal>>, ApiError> {
    let signals = state.store.latest_signals(params.clamped()).await?;
    Ok(Json(signals))
}

async fn active_trades_handler(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<Trade>>, ApiError> {
    let trades = state.store.active_trades().await?;
    Ok(Json(trades))
}

#[derive(Deserialize)]
struct NotifyRequest {
    // Optional at the deserialization layer so a missing field reports a
    // validation error instead of failing extraction.
    title: Option<String>,
    body: Option<String>,
    #[serde(default)]
    data: HashMap<String, String>,
}

#[derive(Serialize)]
struct NotifyResponse {
    success: bool,
    #[serde(rename = "messageId")]
    message_id: String,
}

async fn notify_handler(
    State(state): State<Arc<AppState>>,
    Json(request): Json<NotifyRequest>,
) -> Result<Json<NotifyResponse>, ApiError> {
    let title = request
        .title
        .filter(|t| !t.trim().is_empty())
        .ok_or_else(|| ApiError::Validation("title must not be empty".to_string()))?;
    let body = request
        .body
        .filter(|b| !b.trim().is_empty())
        .ok_or_else(|| ApiError::Validation("body must not be empty".to_string()))?;

    let push = state
        .push
        .as_ref()
        .ok_or_else(|| ApiError::Messaging("push notifications are not configured".to_string()))?;

    let message_id = push.notify(title, body, request.data).await?;

    Ok(Json(NotifyResponse {
        success: true,
        message_id,
    }))
}

#[derive(Deserialize)]
struct ScreenshotUpload {
    filename: String,
    url: String,
    symbol: String,
    timeframe: String,
    trade_id: Option<String>,
    size_bytes: u64,
    captured_at: Option<DateTime<Utc>>,
}

/// Records the metadata of an externally captured chart image. The capture
/// itself happens out of process; this endpoint only appends the audit row.
async fn record_screenshot_handler(
    State(state): State<Arc<AppState>>,
    Json(upload): Json<ScreenshotUpload>,
) -> Result<(StatusCode, Json<ScreenshotRef>), ApiError> {
    if upload.filename.trim().is_empty() || upload.url.trim().is_empty() {
        return Err(ApiError::Validation(
            "filename and url must not be empty".to_string(),
        ));
    }

    let screenshot = ScreenshotRef {
        filename: upload.filename,
        url: upload.url,
        symbol: upload.symbol,
        timeframe: upload.timeframe,
        trade_id: upload.trade_id,
        captured_at: upload.captured_at.unwrap_or_else(Utc::now),
        size_bytes: upload.size_bytes,
    };

    state.store.insert_screenshot(&screenshot).await?;
    Ok((StatusCode::CREATED, Json(screenshot)))
}

async fn latest_screenshots_handler(
    State(state): State<Arc<AppState>>,
    Query(params): Query<LimitParams>,
) -> Result<Json<Vec<ScreenshotRef>>, ApiError> {
    let screenshots = state.store.latest_screenshots(params.clamped()).await?;
    Ok(Json(screenshots))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use chrono::TimeZone;
    use common::models::{Direction, TradeStatus};
    use serde_json::{Value, json};
    use storage::MemoryStore;
    use tower::ServiceExt;

    use crate::services::push_service::{MockPushProvider, PushError};

    fn signal(id: &str, hour: u32) -> Signal {
        Signal {
            id: id.to_string(),
            symbol: "XAUUSD".to_string(),
            direction: Direction::Buy,
            entry_price: 2374.5,
            stop_loss: 2360.0,
            take_profit: 2395.0,
            confidence: 0.8,
            reasoning: String::new(),
            timeframe: "5m".to_string(),
            created_at: Utc.with_ymd_and_hms(2025, 7, 14, hour, 0, 0).unwrap(),
            delivered: false,
        }
    }

    fn state_with(store: Arc<MemoryStore>, push: Option<Arc<PushDispatcher>>) -> Arc<AppState> {
        let (events_tx, _) = broadcast::channel(16);
        Arc::new(AppState {
            store,
            push,
            events_tx,
        })
    }

    async fn body_json(response: axum::response::Response) -> Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn health_is_healthy_without_any_store() {
        let app = router(state_with(Arc::new(MemoryStore::new()), None));

        let response = app
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["service"], "signal-relay");
    }

    #[tokio::test]
    async fn latest_signals_come_newest_first() {
        let store = Arc::new(MemoryStore::new());
        for (id, hour) in [("s1", 8), ("s2", 9), ("s3", 10)] {
            store.insert_signal(&signal(id, hour)).await.unwrap();
        }
        let app = router(state_with(store, None));

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/api/signals/latest?limit=2")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body[0]["id"], "s3");
        assert_eq!(body[1]["id"], "s2");
        assert!(body.as_array().unwrap().len() == 2);
    }

    #[tokio::test]
    async fn active_trades_excludes_other_statuses() {
        let store = Arc::new(MemoryStore::new());
        for (id, status) in [
            ("t1", TradeStatus::Active),
            ("t2", TradeStatus::Closed),
            ("t3", TradeStatus::Pending),
        ] {
            store
                .upsert_trade(&Trade {
                    id: id.to_string(),
                    signal_id: None,
                    status,
                    profit_loss: 0.0,
                    updated_at: Utc::now(),
                })
                .await
                .unwrap();
        }
        let app = router(state_with(store, None));

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/api/trades/active")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        let body = body_json(response).await;
        let trades = body.as_array().unwrap();
        assert_eq!(trades.len(), 1);
        assert_eq!(trades[0]["id"], "t1");
    }

    fn notify_request(payload: Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/api/notify")
            .header("content-type", "application/json")
            .body(Body::from(serde_json::to_vec(&payload).unwrap()))
            .unwrap()
    }

    #[tokio::test]
    async fn notify_requires_title_and_body() {
        let app = router(state_with(Arc::new(MemoryStore::new()), None));

        let response = app
            .clone()
            .oneshot(notify_request(json!({ "title": "", "body": "hello" })))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert!(body["error"].as_str().unwrap().contains("title"));

        // A field that is absent entirely is a validation error too, not
        // an extraction failure.
        let response = app
            .oneshot(notify_request(json!({ "body": "hello" })))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert!(body["error"].as_str().unwrap().contains("title"));
    }

    #[tokio::test]
    async fn notify_returns_the_provider_message_id() {
        let mut provider = MockPushProvider::new();
        provider
            .expect_send()
            .times(1)
            .returning(|_| Ok("mid-42".to_string()));
        let push = Arc::new(PushDispatcher::new(
            Arc::new(provider),
            "gold-signals".to_string(),
        ));
        let app = router(state_with(Arc::new(MemoryStore::new()), Some(push)));

        let response = app
            .oneshot(notify_request(
                json!({ "title": "Manual alert", "body": "tighten stops" }),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["success"], true);
        assert_eq!(body["messageId"], "mid-42");
    }

    #[tokio::test]
    async fn notify_maps_provider_failures_to_bad_gateway() {
        let mut provider = MockPushProvider::new();
        provider
            .expect_send()
            .returning(|_| Err(PushError::Provider("topic quota exceeded".to_string())));
        let push = Arc::new(PushDispatcher::new(
            Arc::new(provider),
            "gold-signals".to_string(),
        ));
        let app = router(state_with(Arc::new(MemoryStore::new()), Some(push)));

        let response = app
            .oneshot(notify_request(json!({ "title": "t", "body": "b" })))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    }

    #[tokio::test]
    async fn screenshot_records_append_once() {
        let store = Arc::new(MemoryStore::new());
        let app = router(state_with(store, None));
        let upload = json!({
            "filename": "XAUUSD_5m_1.png",
            "url": "https://cdn.example/XAUUSD_5m_1.png",
            "symbol": "XAUUSD",
            "timeframe": "5m",
            "size_bytes": 48213
        });
        let request = |payload: &Value| {
            Request::builder()
                .method("POST")
                .uri("/api/screenshots")
                .header("content-type", "application/json")
                .body(Body::from(serde_json::to_vec(payload).unwrap()))
                .unwrap()
        };

        let response = app.clone().oneshot(request(&upload)).await.unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);

        let response = app.oneshot(request(&upload)).await.unwrap();
        assert_eq!(response.status(), StatusCode::CONFLICT);
    }
}
