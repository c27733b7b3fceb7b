use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};

use common::models::{Trade, TradeEvent, TradeStatus};

use crate::store::{ClaimOutcome, StoreError};

pub struct TradesRepository;

impl TradesRepository {
    /// Writes the trade's current state and appends the transition's event
    /// row in the same transaction, so a notification record exists for
    /// every observable state change.
    pub async fn upsert_with_event(pool: &SqlitePool, trade: &Trade) -> Result<(), StoreError> {
        let event = TradeEvent::for_transition(trade);
        let mut tx = pool.begin().await?;

        sqlx::query(
            r#"
                INSERT INTO trades (id, signal_id, status, profit_loss, updated_at)
                VALUES (?, ?, ?, ?, ?)
                ON CONFLICT (id) DO UPDATE SET
                    status = excluded.status,
                    profit_loss = excluded.profit_loss,
                    updated_at = excluded.updated_at
            "#,
        )
        .bind(&trade.id)
        .bind(&trade.signal_id)
        .bind(trade.status.as_str())
        .bind(trade.profit_loss)
        .bind(trade.updated_at)
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r#"
                INSERT INTO trade_events (id, trade_id, status, profit_loss, created_at, app_notified)
                VALUES (?, ?, ?, ?, ?, 0)
            "#,
        )
        .bind(&event.id)
        .bind(&event.trade_id)
        .bind(event.status.as_str())
        .bind(event.profit_loss)
        .bind(event.created_at)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }

    pub async fn active(pool: &SqlitePool) -> Result<Vec<Trade>, StoreError> {
        let rows = sqlx::query("SELECT * FROM trades WHERE status = ? ORDER BY updated_at DESC")
            .bind(TradeStatus::Active.as_str())
            .fetch_all(pool)
            .await?;

        rows.iter().map(Self::trade_from_row).collect()
    }

    pub async fn pending_events(pool: &SqlitePool) -> Result<Vec<TradeEvent>, StoreError> {
        let rows =
            sqlx::query("SELECT * FROM trade_events WHERE app_notified = 0 ORDER BY created_at ASC")
                .fetch_all(pool)
                .await?;

        rows.iter().map(Self::event_from_row).collect()
    }

    pub async fn try_claim_event(pool: &SqlitePool, id: &str) -> Result<ClaimOutcome, StoreError> {
        let result =
            sqlx::query("UPDATE trade_events SET app_notified = 1 WHERE id = ? AND app_notified = 0")
                .bind(id)
                .execute(pool)
                .await?;

        if result.rows_affected() == 1 {
            Ok(ClaimOutcome::Claimed)
        } else {
            Ok(ClaimOutcome::AlreadyClaimed)
        }
    }

    fn trade_from_row(row: &SqliteRow) -> Result<Trade, StoreError> {
        let status: String = row.try_get("status")?;
        Ok(Trade {
            id: row.try_get("id")?,
            signal_id: row.try_get("signal_id")?,
            status: status.parse().map_err(|reason| StoreError::Corrupt {
                collection: "trades",
                reason,
            })?,
            profit_loss: row.try_get("profit_loss")?,
            updated_at: row.try_get("updated_at")?,
        })
    }

    fn event_from_row(row: &SqliteRow) -> Result<TradeEvent, StoreError> {
        let status: String = row.try_get("status")?;
        Ok(TradeEvent {
            id: row.try_get("id")?,
            trade_id: row.try_get("trade_id")?,
            status: status.parse().map_err(|reason| StoreError::Corrupt {
                collection: "trade_events",
                reason,
            })?,
            profit_loss: row.try_get("profit_loss")?,
            created_at: row.try_get("created_at")?,
            app_notified: row.try_get("app_notified")?,
        })
    }
}
