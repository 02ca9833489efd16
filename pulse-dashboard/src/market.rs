//! Daily price data.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Daily closing price for a symbol.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PricePoint {
    pub symbol: String,
    pub date: NaiveDate,
    pub close: f64,
}

/// Latest close in a history, regardless of input order.
pub fn latest_close(history: &[PricePoint]) -> Option<&PricePoint> {
    history.iter().max_by_key(|p| p.date)
}

/// First close on or after `since`.
pub fn first_close_since(history: &[PricePoint], since: NaiveDate) -> Option<&PricePoint> {
    history
        .iter()
        .filter(|p| p.date >= since)
        .min_by_key(|p| p.date)
}

/// Normalize a ticker the way every boundary stores it.
pub fn normalize_symbol(raw: &str) -> String {
    raw.trim().to_uppercase()
}
