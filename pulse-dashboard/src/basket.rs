//! User baskets and their allocation workflows.
//!
//! Every mutation loads the basket, runs it through a [`Rebalancer`] session,
//! finalizes to whole percents, and writes the result back. A basket that
//! fails to finalize is never saved.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{debug, info, trace};
use uuid::Uuid;

use crate::allocation::{total_allocation, Adjustment, AllocationEntry, Rebalancer};
use crate::error::{DashboardError, DashboardResult};
use crate::market::normalize_symbol;
use crate::performance::{basket_return, BasketReturn};
use crate::storage::Store;

/// Longest accepted basket name, in characters.
pub const MAX_BASKET_NAME_LEN: usize = 100;

/// A user's named set of allocations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Basket {
    pub id: String,
    pub user_id: String,
    pub name: String,
    /// Snapshot flag; a locked basket only accepts unlocking
    pub locked: bool,
    pub entries: Vec<AllocationEntry>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Basket {
    pub fn total_allocation(&self) -> f64 {
        total_allocation(&self.entries)
    }

    fn has_symbol(&self, symbol: &str) -> bool {
        self.entries.iter().any(|e| e.symbol == symbol)
    }

    fn entry_mut(&mut self, entry_id: &str) -> Option<&mut AllocationEntry> {
        self.entries.iter_mut().find(|e| e.id == entry_id)
    }
}

/// One slider move.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AllocationMove {
    pub entry_id: String,
    pub allocation: f64,
}

/// Result of a single slider move.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MoveOutcome {
    pub entry_id: String,
    pub outcome: Adjustment,
}

/// Saved basket plus what happened to each requested move.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdjustmentResult {
    pub basket: Basket,
    pub moves: Vec<MoveOutcome>,
}

fn validate_name(name: &str) -> DashboardResult<String> {
    let name = name.trim();
    if name.is_empty() {
        return Err(DashboardError::InvalidRequest(
            "basket name must not be empty".into(),
        ));
    }
    if name.chars().count() > MAX_BASKET_NAME_LEN {
        return Err(DashboardError::InvalidRequest(format!(
            "basket name exceeds {MAX_BASKET_NAME_LEN} characters"
        )));
    }
    Ok(name.to_string())
}

fn validate_symbol(raw: &str) -> DashboardResult<String> {
    let symbol = normalize_symbol(raw);
    if symbol.is_empty() {
        return Err(DashboardError::InvalidRequest(
            "symbol must not be empty".into(),
        ));
    }
    Ok(symbol)
}

fn ensure_unlocked(basket: &Basket) -> DashboardResult<()> {
    if basket.locked {
        return Err(DashboardError::BasketLocked(basket.id.clone()));
    }
    Ok(())
}

fn new_entry_id() -> String {
    Uuid::new_v4().to_string()
}

/// Rebalancer session that traces every change to the basket.
fn session(basket: &Basket) -> Rebalancer {
    let mut rebalancer = Rebalancer::new(basket.entries.clone());
    let basket_id = basket.id.clone();
    rebalancer.subscribe(move |entries: &[AllocationEntry]| {
        trace!(
            basket_id = %basket_id,
            entries = entries.len(),
            total = total_allocation(entries),
            "Allocations changed"
        );
    });
    rebalancer
}

/// Basket operations scoped to one store.
#[derive(Clone)]
pub struct BasketService {
    store: Arc<dyn Store>,
}

impl BasketService {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    async fn load(&self, user_id: &str, basket_id: &str) -> DashboardResult<Basket> {
        self.store
            .get_basket(user_id, basket_id)
            .await?
            .ok_or_else(|| DashboardError::BasketNotFound(basket_id.to_string()))
    }

    async fn save(&self, mut basket: Basket) -> DashboardResult<Basket> {
        basket.updated_at = Utc::now();
        self.store.update_basket(&basket).await?;
        Ok(basket)
    }

    /// Create a basket with the symbols split evenly.
    pub async fn create(
        &self,
        user_id: &str,
        name: &str,
        symbols: &[String],
    ) -> DashboardResult<Basket> {
        let name = validate_name(name)?;

        let mut seen = HashSet::new();
        let mut entries = Vec::with_capacity(symbols.len());
        for raw in symbols {
            let symbol = validate_symbol(raw)?;
            if !seen.insert(symbol.clone()) {
                return Err(DashboardError::InvalidRequest(format!(
                    "duplicate symbol: {symbol}"
                )));
            }
            entries.push(AllocationEntry::new(new_entry_id(), symbol, 0.0));
        }

        let mut rebalancer = Rebalancer::new(entries);
        rebalancer.reset_to_equal();
        let entries = rebalancer.finalize_for_save()?;

        let now = Utc::now();
        let basket = Basket {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            name,
            locked: false,
            entries,
            created_at: now,
            updated_at: now,
        };
        self.store.insert_basket(&basket).await?;

        info!(basket_id = %basket.id, user_id, entries = basket.entries.len(), "Created basket");
        Ok(basket)
    }

    pub async fn list(&self, user_id: &str) -> DashboardResult<Vec<Basket>> {
        Ok(self.store.list_baskets(user_id).await?)
    }

    pub async fn get(&self, user_id: &str, basket_id: &str) -> DashboardResult<Basket> {
        self.load(user_id, basket_id).await
    }

    pub async fn delete(&self, user_id: &str, basket_id: &str) -> DashboardResult<()> {
        if !self.store.delete_basket(user_id, basket_id).await? {
            return Err(DashboardError::BasketNotFound(basket_id.to_string()));
        }
        info!(basket_id, user_id, "Deleted basket");
        Ok(())
    }

    /// Add a symbol. It takes the whole basket if it is the first entry,
    /// otherwise it starts empty.
    pub async fn add_stock(
        &self,
        user_id: &str,
        basket_id: &str,
        symbol: &str,
    ) -> DashboardResult<Basket> {
        let mut basket = self.load(user_id, basket_id).await?;
        ensure_unlocked(&basket)?;

        let symbol = validate_symbol(symbol)?;
        if basket.has_symbol(&symbol) {
            return Err(DashboardError::DuplicateSymbol(symbol));
        }

        let allocation = if basket.entries.is_empty() { 100.0 } else { 0.0 };
        basket
            .entries
            .push(AllocationEntry::new(new_entry_id(), symbol.clone(), allocation));

        let mut rebalancer = session(&basket);
        basket.entries = rebalancer.finalize_for_save()?;

        debug!(basket_id, symbol = %symbol, "Added stock");
        self.save(basket).await
    }

    /// Remove an entry, handing its share to the unlocked peers first.
    pub async fn remove_stock(
        &self,
        user_id: &str,
        basket_id: &str,
        entry_id: &str,
    ) -> DashboardResult<Basket> {
        let mut basket = self.load(user_id, basket_id).await?;
        ensure_unlocked(&basket)?;
        if !basket.entries.iter().any(|e| e.id == entry_id) {
            return Err(DashboardError::EntryNotFound(entry_id.to_string()));
        }

        let mut rebalancer = session(&basket);
        let outcome = rebalancer.set_allocation(entry_id, 0.0);
        debug!(basket_id, entry_id, ?outcome, "Drained entry before removal");

        let mut remaining = Rebalancer::new(
            rebalancer
                .into_entries()
                .into_iter()
                .filter(|e| e.id != entry_id)
                .collect(),
        );
        basket.entries = remaining.finalize_for_save()?;

        self.save(basket).await
    }

    /// Apply slider moves in order within one session, then save.
    pub async fn adjust(
        &self,
        user_id: &str,
        basket_id: &str,
        moves: &[AllocationMove],
    ) -> DashboardResult<AdjustmentResult> {
        let mut basket = self.load(user_id, basket_id).await?;
        ensure_unlocked(&basket)?;

        let mut rebalancer = session(&basket);
        let outcomes: Vec<MoveOutcome> = moves
            .iter()
            .map(|m| MoveOutcome {
                entry_id: m.entry_id.clone(),
                outcome: rebalancer.set_allocation(&m.entry_id, m.allocation),
            })
            .collect();

        let basket = if outcomes.iter().any(|m| m.outcome.is_applied()) {
            basket.entries = rebalancer.finalize_for_save()?;
            self.save(basket).await?
        } else {
            basket
        };

        Ok(AdjustmentResult {
            basket,
            moves: outcomes,
        })
    }

    /// Split the unlocked share evenly.
    pub async fn reset(&self, user_id: &str, basket_id: &str) -> DashboardResult<Basket> {
        let mut basket = self.load(user_id, basket_id).await?;
        ensure_unlocked(&basket)?;

        let mut rebalancer = session(&basket);
        rebalancer.reset_to_equal();
        basket.entries = rebalancer.finalize_for_save()?;

        self.save(basket).await
    }

    pub async fn set_entry_locked(
        &self,
        user_id: &str,
        basket_id: &str,
        entry_id: &str,
        locked: bool,
    ) -> DashboardResult<Basket> {
        let mut basket = self.load(user_id, basket_id).await?;
        ensure_unlocked(&basket)?;

        let entry = basket
            .entry_mut(entry_id)
            .ok_or_else(|| DashboardError::EntryNotFound(entry_id.to_string()))?;
        entry.locked = locked;

        self.save(basket).await
    }

    /// Lock or unlock the basket snapshot.
    pub async fn set_locked(
        &self,
        user_id: &str,
        basket_id: &str,
        locked: bool,
    ) -> DashboardResult<Basket> {
        let mut basket = self.load(user_id, basket_id).await?;
        if basket.locked == locked {
            return Ok(basket);
        }
        basket.locked = locked;

        info!(basket_id, locked, "Changed basket lock");
        self.save(basket).await
    }

    /// Weighted return since `since`, defaulting to the basket's creation day.
    pub async fn performance(
        &self,
        user_id: &str,
        basket_id: &str,
        since: Option<NaiveDate>,
    ) -> DashboardResult<BasketReturn> {
        let basket = self.load(user_id, basket_id).await?;
        let since = since.unwrap_or_else(|| basket.created_at.date_naive());

        let mut histories = HashMap::with_capacity(basket.entries.len());
        for entry in &basket.entries {
            let history = self.store.price_history(&entry.symbol).await?;
            histories.insert(entry.symbol.clone(), history);
        }

        Ok(basket_return(&basket.entries, &histories, since))
    }
}
