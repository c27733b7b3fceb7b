use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Metadata for a chart image captured by the external screenshot service.
/// Append-only: written once when the capture completes, never mutated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScreenshotRef {
    pub filename: String,
    pub url: String,
    pub symbol: String,
    pub timeframe: String,
    pub trade_id: Option<String>,
    pub captured_at: DateTime<Utc>,
    pub size_bytes: u64,
}
