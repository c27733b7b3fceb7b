use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};

use common::models::ScreenshotRef;

use crate::repositories::signals_repo::is_unique_violation;
use crate::store::StoreError;

pub struct ScreenshotsRepository;

impl ScreenshotsRepository {
    /// Screenshots are an append-only audit log: inserting a filename twice
    /// is a caller error, never an overwrite.
    pub async fn insert(pool: &SqlitePool, screenshot: &ScreenshotRef) -> Result<(), StoreError> {
        let result = sqlx::query(
            r#"
                INSERT INTO screenshots (
                    filename, url, symbol, timeframe, trade_id, captured_at, size_bytes
                ) VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&screenshot.filename)
        .bind(&screenshot.url)
        .bind(&screenshot.symbol)
        .bind(&screenshot.timeframe)
        .bind(&screenshot.trade_id)
        .bind(screenshot.captured_at)
        .bind(screenshot.size_bytes as i64)
        .execute(pool)
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(e) if is_unique_violation(&e) => Err(StoreError::AlreadyExists {
                collection: "screenshots",
                id: screenshot.filename.clone(),
            }),
            Err(e) => Err(e.into()),
        }
    }

    pub async fn latest(pool: &SqlitePool, limit: u32) -> Result<Vec<ScreenshotRef>, StoreError> {
        let rows = sqlx::query("SELECT * FROM screenshots ORDER BY captured_at DESC LIMIT ?")
            .bind(limit)
            .fetch_all(pool)
            .await?;

        rows.iter().map(Self::from_row).collect()
    }

    fn from_row(row: &SqliteRow) -> Result<ScreenshotRef, StoreError> {
        let size_bytes: i64 = row.try_get("size_bytes")?;
        Ok(ScreenshotRef {
            filename: row.try_get("filename")?,
            url: row.try_get("url")?,
            symbol: row.try_get("symbol")?,
            timeframe: row.try_get("timeframe")?,
            trade_id: row.try_get("trade_id")?,
            captured_at: row.try_get("captured_at")?,
            size_bytes: size_bytes as u64,
        })
    }
}
