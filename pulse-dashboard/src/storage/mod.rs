//! Persistence for baskets, sentiment observations, and prices.
//!
//! Handlers only see the [`Store`] trait; the concrete store is built once at
//! startup and injected through the router state.

pub mod sqlite;

use anyhow::Result;
use async_trait::async_trait;
use std::collections::HashMap;

use crate::basket::Basket;
use crate::market::PricePoint;
use crate::sentiment::{SentimentObservation, SentimentSource, SourceTables};

pub use sqlite::{SqliteStore, SqliteStoreConfig};

/// Backing store used by the dashboard.
#[async_trait]
pub trait Store: Send + Sync {
    /// Baskets owned by a user, oldest first.
    async fn list_baskets(&self, user_id: &str) -> Result<Vec<Basket>>;

    /// One basket, only if the user owns it.
    async fn get_basket(&self, user_id: &str, basket_id: &str) -> Result<Option<Basket>>;

    async fn insert_basket(&self, basket: &Basket) -> Result<()>;

    /// Replace a basket's metadata and entries.
    async fn update_basket(&self, basket: &Basket) -> Result<()>;

    /// Returns whether a basket was deleted.
    async fn delete_basket(&self, user_id: &str, basket_id: &str) -> Result<bool>;

    /// Append observations; returns the number stored.
    async fn insert_observations(&self, observations: &[SentimentObservation]) -> Result<usize>;

    /// Observations for a source in arrival order, optionally for one symbol.
    async fn observations(
        &self,
        source: SentimentSource,
        symbol: Option<&str>,
    ) -> Result<Vec<SentimentObservation>>;

    /// Insert or overwrite closes per (symbol, date).
    async fn upsert_prices(&self, prices: &[PricePoint]) -> Result<usize>;

    /// Full history for a symbol, oldest first.
    async fn price_history(&self, symbol: &str) -> Result<Vec<PricePoint>>;

    /// Latest close per symbol; symbols without prices are absent.
    async fn latest_prices(&self, symbols: &[String]) -> Result<HashMap<String, f64>>;
}

/// Fetch all three source tables concurrently.
pub async fn fetch_source_tables(store: &dyn Store) -> Result<SourceTables> {
    let (google, twitter, news) = tokio::try_join!(
        store.observations(SentimentSource::Google, None),
        store.observations(SentimentSource::Twitter, None),
        store.observations(SentimentSource::News, None),
    )?;

    Ok(SourceTables {
        google,
        twitter,
        news,
    })
}
