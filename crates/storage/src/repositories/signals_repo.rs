use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};

use common::models::Signal;

use crate::store::{ClaimOutcome, StoreError};

pub struct SignalsRepository;

impl SignalsRepository {
    pub async fn insert(pool: &SqlitePool, signal: &Signal) -> Result<(), StoreError> {
        let result = sqlx::query(
            r#"
                INSERT INTO signals (
                    id, symbol, direction, entry_price, stop_loss, take_profit,
                    confidence, reasoning, timeframe, created_at, delivered
                ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&signal.id)
        .bind(&signal.symbol)
        .bind(signal.direction.as_str())
        .bind(signal.entry_price)
        .bind(signal.stop_loss)
        .bind(signal.take_profit)
        .bind(signal.confidence)
        .bind(&signal.reasoning)
        .bind(&signal.timeframe)
        .bind(signal.created_at)
        .bind(signal.delivered)
        .execute(pool)
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(e) if is_unique_violation(&e) => Err(StoreError::AlreadyExists {
                collection: "signals",
                id: signal.id.clone(),
            }),
            Err(e) => Err(e.into()),
        }
    }

    pub async fn fetch(pool: &SqlitePool, id: &str) -> Result<Signal, StoreError> {
        let row = sqlx::query("SELECT * FROM signals WHERE id = ?")
            .bind(id)
            .fetch_optional(pool)
            .await?;

        match row {
            Some(row) => Self::from_row(&row),
            None => Err(StoreError::NotFound {
                collection: "signals",
                id: id.to_string(),
            }),
        }
    }

    pub async fn latest(pool: &SqlitePool, limit: u32) -> Result<Vec<Signal>, StoreError> {
        let rows = sqlx::query("SELECT * FROM signals ORDER BY created_at DESC LIMIT ?")
            .bind(limit)
            .fetch_all(pool)
            .await?;

        rows.iter().map(Self::from_row).collect()
    }

    pub async fn pending(pool: &SqlitePool) -> Result<Vec<Signal>, StoreError> {
        let rows =
            sqlx::query("SELECT * FROM signals WHERE delivered = 0 ORDER BY created_at ASC")
                .fetch_all(pool)
                .await?;

        rows.iter().map(Self::from_row).collect()
    }

    /// Atomic compare-and-set on the delivery flag. The row count decides
    /// who won; concurrent claimers serialize inside SQLite.
    pub async fn try_claim(pool: &SqlitePool, id: &str) -> Result<ClaimOutcome, StoreError> {
        let result = sqlx::query("UPDATE signals SET delivered = 1 WHERE id = ? AND delivered = 0")
            .bind(id)
            .execute(pool)
            .await?;

        if result.rows_affected() == 1 {
            Ok(ClaimOutcome::Claimed)
        } else {
            Ok(ClaimOutcome::AlreadyClaimed)
        }
    }

    fn from_row(row: &SqliteRow) -> Result<Signal, StoreError> {
        let direction: String = row.try_get("direction")?;
        Ok(Signal {
            id: row.try_get("id")?,
            symbol: row.try_get("symbol")?,
            direction: direction.parse().map_err(|reason| StoreError::Corrupt {
                collection: "signals",
                reason,
            })?,
            entry_price: row.try_get("entry_price")?,
            stop_loss: row.try_get("stop_loss")?,
            take_profit: row.try_get("take_profit")?,
            confidence: row.try_get("confidence")?,
            reasoning: row.try_get("reasoning")?,
            timeframe: row.try_get("timeframe")?,
            created_at: row.try_get("created_at")?,
            delivered: row.try_get("delivered")?,
        })
    }
}

pub(crate) fn is_unique_violation(err: &sqlx::Error) -> bool {
    err.as_database_error()
        .is_some_and(|db| db.is_unique_violation())
}
