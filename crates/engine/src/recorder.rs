use std::str::FromStr;

use async_trait::async_trait;
use chrono::Utc;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use tracing::{debug, info};

use common::{EntryEvent, OutcomeRecorder, Result, TradeEvent, TradeOutcome};

/// Persists entries and realized trades to SQLite.
///
/// Inserts use `ON CONFLICT(id) DO NOTHING`, so replaying a record after a
/// failed flush never produces a duplicate row.
#[derive(Clone)]
pub struct SqliteRecorder {
    db: SqlitePool,
}

impl SqliteRecorder {
    /// Open (creating if missing) the database at `url` and run migrations.
    pub async fn connect(url: &str) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(url)?.create_if_missing(true);
        // One writer; also keeps `sqlite::memory:` on a single database.
        let db = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await?;
        sqlx::migrate!("../../migrations")
            .run(&db)
            .await
            .map_err(sqlx::Error::from)?;
        info!(url, "Database ready");
        Ok(Self { db })
    }

    /// Wrap an already migrated pool.
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.db
    }

    async fn insert_entry(&self, entry: &EntryEvent) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO entries (
                id, symbol, entry_price, quantity, entry_volume_ratio, entry_timestamp, recorded_at
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            ON CONFLICT(id) DO NOTHING
            "#,
        )
        .bind(&entry.id)
        .bind(&entry.symbol)
        .bind(entry.entry_price)
        .bind(entry.quantity as i64)
        .bind(entry.entry_volume_ratio)
        .bind(entry.entry_timestamp.to_rfc3339())
        .bind(Utc::now().to_rfc3339())
        .execute(&self.db)
        .await?;
        Ok(())
    }

    async fn insert_outcome(&self, outcome: &TradeOutcome) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO trade_outcomes (
                id, symbol, entry_price, exit_price, quantity,
                entry_timestamp, exit_timestamp, pnl_pct, pnl_amount, exit_reason, recorded_at
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
            ON CONFLICT(id) DO NOTHING
            "#,
        )
        .bind(&outcome.id)
        .bind(&outcome.symbol)
        .bind(outcome.entry_price)
        .bind(outcome.exit_price)
        .bind(outcome.quantity as i64)
        .bind(outcome.entry_timestamp.to_rfc3339())
        .bind(outcome.exit_timestamp.to_rfc3339())
        .bind(outcome.pnl_pct)
        .bind(outcome.pnl_amount)
        .bind(outcome.exit_reason.to_string())
        .bind(Utc::now().to_rfc3339())
        .execute(&self.db)
        .await?;
        Ok(())
    }
}

#[async_trait]
impl OutcomeRecorder for SqliteRecorder {
    async fn record(&self, event: &TradeEvent) -> Result<()> {
        match event {
            TradeEvent::Entry(entry) => self.insert_entry(entry).await?,
            TradeEvent::Exit(outcome) => self.insert_outcome(outcome).await?,
        }
        debug!(id = event.id(), symbol = event.symbol(), "Recorded to database");
        Ok(())
    }
}
