//! SQLite-backed store.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info};

use super::Store;
use crate::allocation::AllocationEntry;
use crate::basket::Basket;
use crate::market::PricePoint;
use crate::sentiment::{SentimentObservation, SentimentSource};

// ============================================================================
// Database Schema
// ============================================================================

const CREATE_TABLES_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS baskets (
    id TEXT PRIMARY KEY,
    user_id TEXT NOT NULL,
    name TEXT NOT NULL,
    locked INTEGER NOT NULL DEFAULT 0,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_baskets_user
ON baskets(user_id, created_at);

-- position pins insertion order for first-unlocked tie-breaks
CREATE TABLE IF NOT EXISTS basket_entries (
    basket_id TEXT NOT NULL,
    id TEXT NOT NULL,
    position INTEGER NOT NULL,
    symbol TEXT NOT NULL,
    allocation REAL NOT NULL,
    locked INTEGER NOT NULL DEFAULT 0,
    PRIMARY KEY (basket_id, id)
);

CREATE INDEX IF NOT EXISTS idx_basket_entries_position
ON basket_entries(basket_id, position);

CREATE TABLE IF NOT EXISTS sentiment_observations (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    source TEXT NOT NULL,
    symbol TEXT NOT NULL,
    date TEXT NOT NULL,
    sentiment TEXT NOT NULL,
    entry_price REAL NOT NULL,
    created_at TEXT DEFAULT CURRENT_TIMESTAMP
);

CREATE INDEX IF NOT EXISTS idx_observations_source_symbol
ON sentiment_observations(source, symbol, date);

CREATE TABLE IF NOT EXISTS prices (
    symbol TEXT NOT NULL,
    date TEXT NOT NULL,
    close REAL NOT NULL,
    updated_at TEXT DEFAULT CURRENT_TIMESTAMP,
    PRIMARY KEY (symbol, date)
);
"#;

const DATE_FORMAT: &str = "%Y-%m-%d";

// ============================================================================
// Configuration
// ============================================================================

/// Configuration for the SQLite store
#[derive(Debug, Clone)]
pub struct SqliteStoreConfig {
    /// Path to the database file
    pub db_path: PathBuf,
}

impl SqliteStoreConfig {
    pub fn new(db_path: impl Into<PathBuf>) -> Self {
        Self {
            db_path: db_path.into(),
        }
    }
}

// ============================================================================
// Store
// ============================================================================

/// SQLite store.
pub struct SqliteStore {
    /// rusqlite::Connection is Send but not Sync, so it sits behind a Mutex
    db: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    /// Open (or create) the database file and apply the schema.
    pub fn new(config: SqliteStoreConfig) -> Result<Self> {
        if let Some(parent) = config.db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(&config.db_path).context("Failed to open database")?;
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")
            .context("Failed to set database pragmas")?;

        info!(db_path = %config.db_path.display(), "Opened SQLite store");
        Self::with_connection(conn)
    }

    /// Private in-memory database.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().context("Failed to open in-memory database")?;
        Self::with_connection(conn)
    }

    fn with_connection(conn: Connection) -> Result<Self> {
        conn.execute_batch(CREATE_TABLES_SQL)
            .context("Failed to create database tables")?;
        Ok(Self {
            db: Arc::new(Mutex::new(conn)),
        })
    }

    fn row_to_basket(row: &rusqlite::Row) -> rusqlite::Result<Basket> {
        Ok(Basket {
            id: row.get(0)?,
            user_id: row.get(1)?,
            name: row.get(2)?,
            locked: row.get(3)?,
            created_at: parse_timestamp(row, 4)?,
            updated_at: parse_timestamp(row, 5)?,
            entries: Vec::new(),
        })
    }

    fn row_to_entry(row: &rusqlite::Row) -> rusqlite::Result<AllocationEntry> {
        Ok(AllocationEntry {
            id: row.get(0)?,
            symbol: row.get(1)?,
            allocation: row.get(2)?,
            locked: row.get(3)?,
        })
    }

    fn row_to_observation(row: &rusqlite::Row) -> rusqlite::Result<SentimentObservation> {
        let source_str: String = row.get(0)?;
        let source = source_str.parse::<SentimentSource>().map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(0, Type::Text, e.into())
        })?;

        Ok(SentimentObservation {
            source,
            symbol: row.get(1)?,
            date: parse_date(row, 2)?,
            sentiment: row.get(3)?,
            entry_price: row.get(4)?,
        })
    }

    fn row_to_price(row: &rusqlite::Row) -> rusqlite::Result<PricePoint> {
        Ok(PricePoint {
            symbol: row.get(0)?,
            date: parse_date(row, 1)?,
            close: row.get(2)?,
        })
    }

    fn load_entries(conn: &Connection, basket_id: &str) -> rusqlite::Result<Vec<AllocationEntry>> {
        let mut stmt = conn.prepare(
            "SELECT id, symbol, allocation, locked FROM basket_entries
             WHERE basket_id = ?1 ORDER BY position",
        )?;
        let entries = stmt
            .query_map(params![basket_id], Self::row_to_entry)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(entries)
    }

    fn write_entries(
        tx: &rusqlite::Transaction<'_>,
        basket_id: &str,
        entries: &[AllocationEntry],
    ) -> rusqlite::Result<()> {
        tx.execute(
            "DELETE FROM basket_entries WHERE basket_id = ?1",
            params![basket_id],
        )?;
        let mut stmt = tx.prepare(
            "INSERT INTO basket_entries (basket_id, id, position, symbol, allocation, locked)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        )?;
        for (position, entry) in entries.iter().enumerate() {
            stmt.execute(params![
                basket_id,
                entry.id,
                position as i64,
                entry.symbol,
                entry.allocation,
                entry.locked
            ])?;
        }
        Ok(())
    }
}

fn parse_date(row: &rusqlite::Row, idx: usize) -> rusqlite::Result<NaiveDate> {
    let raw: String = row.get(idx)?;
    NaiveDate::parse_from_str(&raw, DATE_FORMAT)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn parse_timestamp(row: &rusqlite::Row, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(idx)?;
    DateTime::parse_from_rfc3339(&raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn format_date(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

#[async_trait]
impl Store for SqliteStore {
    async fn list_baskets(&self, user_id: &str) -> Result<Vec<Basket>> {
        let db = self.db.lock().await;
        let mut stmt = db.prepare(
            "SELECT id, user_id, name, locked, created_at, updated_at FROM baskets
             WHERE user_id = ?1 ORDER BY created_at, rowid",
        )?;
        let mut baskets = stmt
            .query_map(params![user_id], Self::row_to_basket)?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        for basket in &mut baskets {
            basket.entries = Self::load_entries(&db, &basket.id)?;
        }
        Ok(baskets)
    }

    async fn get_basket(&self, user_id: &str, basket_id: &str) -> Result<Option<Basket>> {
        let db = self.db.lock().await;
        let basket = db
            .query_row(
                "SELECT id, user_id, name, locked, created_at, updated_at FROM baskets
                 WHERE id = ?1 AND user_id = ?2",
                params![basket_id, user_id],
                Self::row_to_basket,
            )
            .optional()?;

        match basket {
            Some(mut basket) => {
                basket.entries = Self::load_entries(&db, &basket.id)?;
                Ok(Some(basket))
            }
            None => Ok(None),
        }
    }

    async fn insert_basket(&self, basket: &Basket) -> Result<()> {
        let mut db = self.db.lock().await;
        let tx = db.transaction()?;
        tx.execute(
            "INSERT INTO baskets (id, user_id, name, locked, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                basket.id,
                basket.user_id,
                basket.name,
                basket.locked,
                basket.created_at.to_rfc3339(),
                basket.updated_at.to_rfc3339()
            ],
        )?;
        Self::write_entries(&tx, &basket.id, &basket.entries)?;
        tx.commit().context("Failed to commit basket insert")?;

        debug!(basket_id = %basket.id, entries = basket.entries.len(), "Inserted basket");
        Ok(())
    }

    async fn update_basket(&self, basket: &Basket) -> Result<()> {
        let mut db = self.db.lock().await;
        let tx = db.transaction()?;
        let updated = tx.execute(
            "UPDATE baskets SET name = ?1, locked = ?2, updated_at = ?3
             WHERE id = ?4 AND user_id = ?5",
            params![
                basket.name,
                basket.locked,
                basket.updated_at.to_rfc3339(),
                basket.id,
                basket.user_id
            ],
        )?;
        if updated == 0 {
            anyhow::bail!("Basket {} does not exist", basket.id);
        }
        Self::write_entries(&tx, &basket.id, &basket.entries)?;
        tx.commit().context("Failed to commit basket update")?;

        debug!(basket_id = %basket.id, entries = basket.entries.len(), "Updated basket");
        Ok(())
    }

    async fn delete_basket(&self, user_id: &str, basket_id: &str) -> Result<bool> {
        let mut db = self.db.lock().await;
        let tx = db.transaction()?;
        let deleted = tx.execute(
            "DELETE FROM baskets WHERE id = ?1 AND user_id = ?2",
            params![basket_id, user_id],
        )?;
        if deleted > 0 {
            tx.execute(
                "DELETE FROM basket_entries WHERE basket_id = ?1",
                params![basket_id],
            )?;
        }
        tx.commit().context("Failed to commit basket delete")?;
        Ok(deleted > 0)
    }

    async fn insert_observations(&self, observations: &[SentimentObservation]) -> Result<usize> {
        let mut db = self.db.lock().await;
        let tx = db.transaction()?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO sentiment_observations (source, symbol, date, sentiment, entry_price)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
            )?;
            for obs in observations {
                stmt.execute(params![
                    obs.source.as_str(),
                    obs.symbol,
                    format_date(obs.date),
                    obs.sentiment,
                    obs.entry_price
                ])?;
            }
        }
        tx.commit().context("Failed to commit observations")?;

        debug!(count = observations.len(), "Stored sentiment observations");
        Ok(observations.len())
    }

    async fn observations(
        &self,
        source: SentimentSource,
        symbol: Option<&str>,
    ) -> Result<Vec<SentimentObservation>> {
        let db = self.db.lock().await;
        let rows = match symbol {
            Some(symbol) => {
                let mut stmt = db.prepare(
                    "SELECT source, symbol, date, sentiment, entry_price FROM sentiment_observations
                     WHERE source = ?1 AND symbol = ?2 ORDER BY id",
                )?;
                let rows = stmt
                    .query_map(params![source.as_str(), symbol], Self::row_to_observation)?
                    .collect::<rusqlite::Result<Vec<_>>>()?;
                rows
            }
            None => {
                let mut stmt = db.prepare(
                    "SELECT source, symbol, date, sentiment, entry_price FROM sentiment_observations
                     WHERE source = ?1 ORDER BY id",
                )?;
                let rows = stmt
                    .query_map(params![source.as_str()], Self::row_to_observation)?
                    .collect::<rusqlite::Result<Vec<_>>>()?;
                rows
            }
        };
        Ok(rows)
    }

    async fn upsert_prices(&self, prices: &[PricePoint]) -> Result<usize> {
        let mut db = self.db.lock().await;
        let tx = db.transaction()?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO prices (symbol, date, close) VALUES (?1, ?2, ?3)
                 ON CONFLICT(symbol, date) DO UPDATE SET
                     close = excluded.close,
                     updated_at = CURRENT_TIMESTAMP",
            )?;
            for price in prices {
                stmt.execute(params![price.symbol, format_date(price.date), price.close])?;
            }
        }
        tx.commit().context("Failed to commit prices")?;

        debug!(count = prices.len(), "Stored price points");
        Ok(prices.len())
    }

    async fn price_history(&self, symbol: &str) -> Result<Vec<PricePoint>> {
        let db = self.db.lock().await;
        let mut stmt = db.prepare(
            "SELECT symbol, date, close FROM prices WHERE symbol = ?1 ORDER BY date",
        )?;
        let history = stmt
            .query_map(params![symbol], Self::row_to_price)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(history)
    }

    async fn latest_prices(&self, symbols: &[String]) -> Result<HashMap<String, f64>> {
        let db = self.db.lock().await;
        let mut stmt = db.prepare(
            "SELECT close FROM prices WHERE symbol = ?1 ORDER BY date DESC LIMIT 1",
        )?;

        let mut latest = HashMap::with_capacity(symbols.len());
        for symbol in symbols {
            if let Some(close) = stmt
                .query_row(params![symbol], |row| row.get::<_, f64>(0))
                .optional()?
            {
                latest.insert(symbol.clone(), close);
            }
        }
        Ok(latest)
    }
}
