//! Signal and basket performance metrics.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::allocation::{AllocationEntry, FULL_ALLOCATION};
use crate::market::{first_close_since, latest_close, PricePoint};
use crate::sentiment::{Polarity, UniverseEntry};

/// Percentage change from `entry` to `current`.
pub fn percentage_change(entry: f64, current: f64) -> Option<f64> {
    if !entry.is_finite() || !current.is_finite() || entry <= 0.0 {
        return None;
    }
    Some((current - entry) / entry * 100.0)
}

/// Whether a directional signal called the move.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SignalOutcome {
    Win,
    Loss,
}

impl SignalOutcome {
    /// Neutral and unrecognized sentiments carry no outcome.
    pub fn judge(polarity: Option<Polarity>, change_pct: f64) -> Option<Self> {
        let win = match polarity? {
            Polarity::Positive => change_pct > 0.0,
            Polarity::Negative => change_pct < 0.0,
            Polarity::Neutral => return None,
        };
        Some(if win { Self::Win } else { Self::Loss })
    }
}

/// One universe symbol priced against its signal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PerformanceRow {
    pub symbol: String,
    pub sentiment: String,
    pub entry_price: Option<f64>,
    pub current_price: Option<f64>,
    pub change_pct: Option<f64>,
    pub outcome: Option<SignalOutcome>,
}

/// Performance of the reconciled universe.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PerformanceReport {
    pub rows: Vec<PerformanceRow>,
    /// Rows with a win/loss outcome
    pub evaluated: usize,
    pub wins: usize,
    /// Wins as a percentage of evaluated rows
    pub win_rate: Option<f64>,
    /// Mean change over rows with a price
    pub average_change: Option<f64>,
}

/// Price every universe entry against the latest closes.
pub fn evaluate_universe(
    universe: &[UniverseEntry],
    latest_prices: &HashMap<String, f64>,
) -> PerformanceReport {
    let rows: Vec<PerformanceRow> = universe
        .iter()
        .map(|entry| {
            let entry_price = entry.entry_price();
            let current_price = latest_prices.get(&entry.symbol).copied();
            let change_pct = match (entry_price, current_price) {
                (Some(e), Some(c)) => percentage_change(e, c),
                _ => None,
            };
            let outcome = change_pct.and_then(|c| SignalOutcome::judge(entry.polarity(), c));

            PerformanceRow {
                symbol: entry.symbol.clone(),
                sentiment: entry.sentiment.clone(),
                entry_price,
                current_price,
                change_pct,
                outcome,
            }
        })
        .collect();

    let evaluated = rows.iter().filter(|r| r.outcome.is_some()).count();
    let wins = rows
        .iter()
        .filter(|r| r.outcome == Some(SignalOutcome::Win))
        .count();
    let win_rate = (evaluated > 0).then(|| wins as f64 / evaluated as f64 * 100.0);

    let changes: Vec<f64> = rows.iter().filter_map(|r| r.change_pct).collect();
    let average_change =
        (!changes.is_empty()).then(|| changes.iter().sum::<f64>() / changes.len() as f64);

    PerformanceReport {
        rows,
        evaluated,
        wins,
        win_rate,
        average_change,
    }
}

/// One basket holding's contribution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HoldingReturn {
    pub symbol: String,
    pub allocation: f64,
    pub start_price: f64,
    pub end_price: f64,
    pub change_pct: f64,
    /// `change_pct` scaled by the allocation weight
    pub contribution: f64,
}

/// Allocation-weighted basket return.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BasketReturn {
    pub since: NaiveDate,
    pub holdings: Vec<HoldingReturn>,
    /// Symbols without usable prices in the window
    pub missing: Vec<String>,
    pub total_return_pct: f64,
}

/// Weighted return of a basket from `since` to each symbol's latest close.
pub fn basket_return(
    entries: &[AllocationEntry],
    histories: &HashMap<String, Vec<PricePoint>>,
    since: NaiveDate,
) -> BasketReturn {
    let mut holdings = Vec::new();
    let mut missing = Vec::new();

    for entry in entries {
        let history = histories.get(&entry.symbol).map(Vec::as_slice).unwrap_or(&[]);
        let window = first_close_since(history, since).zip(latest_close(history));

        let Some((start, end)) = window else {
            missing.push(entry.symbol.clone());
            continue;
        };
        let Some(change_pct) = percentage_change(start.close, end.close) else {
            missing.push(entry.symbol.clone());
            continue;
        };

        holdings.push(HoldingReturn {
            symbol: entry.symbol.clone(),
            allocation: entry.allocation,
            start_price: start.close,
            end_price: end.close,
            change_pct,
            contribution: change_pct * entry.allocation / FULL_ALLOCATION,
        });
    }

    let total_return_pct = holdings.iter().map(|h| h.contribution).sum();

    BasketReturn {
        since,
        holdings,
        missing,
        total_return_pct,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sentiment::{SentimentObservation, SentimentSource};

    fn universe_entry(symbol: &str, sentiment: &str, entry_price: f64) -> UniverseEntry {
        UniverseEntry {
            symbol: symbol.to_string(),
            sentiment: sentiment.to_string(),
            observations: vec![SentimentObservation {
                symbol: symbol.to_string(),
                source: SentimentSource::News,
                date: NaiveDate::from_ymd_opt(2024, 5, 1).unwrap(),
                sentiment: sentiment.to_string(),
                entry_price,
            }],
        }
    }

    #[test]
    fn test_percentage_change() {
        assert_eq!(percentage_change(100.0, 110.0), Some(10.0));
        assert_eq!(percentage_change(50.0, 25.0), Some(-50.0));
        assert_eq!(percentage_change(0.0, 25.0), None);
        assert_eq!(percentage_change(10.0, f64::NAN), None);
    }

    #[test]
    fn test_outcome_judgement() {
        assert_eq!(
            SignalOutcome::judge(Some(Polarity::Positive), 2.0),
            Some(SignalOutcome::Win)
        );
        assert_eq!(
            SignalOutcome::judge(Some(Polarity::Negative), 2.0),
            Some(SignalOutcome::Loss)
        );
        assert_eq!(
            SignalOutcome::judge(Some(Polarity::Negative), -0.5),
            Some(SignalOutcome::Win)
        );
        assert_eq!(SignalOutcome::judge(Some(Polarity::Neutral), 5.0), None);
        assert_eq!(SignalOutcome::judge(None, 5.0), None);
    }

    #[test]
    fn test_win_rate() {
        let universe = vec![
            universe_entry("AAPL", "positive", 100.0),
            universe_entry("MSFT", "negative", 100.0),
            universe_entry("TSLA", "positive", 100.0),
            universe_entry("IBM", "neutral", 100.0),
            universe_entry("NVDA", "positive", 100.0),
        ];
        let prices: HashMap<String, f64> = [
            ("AAPL", 110.0),
            ("MSFT", 90.0),
            ("TSLA", 95.0),
            ("IBM", 120.0),
        ]
        .into_iter()
        .map(|(s, p)| (s.to_string(), p))
        .collect();

        let report = evaluate_universe(&universe, &prices);
        assert_eq!(report.evaluated, 3);
        assert_eq!(report.wins, 2);
        let win_rate = report.win_rate.unwrap();
        assert!((win_rate - 200.0 / 3.0).abs() < 1e-9);
        // AAPL +10, MSFT -10, TSLA -5, IBM +20; NVDA has no price
        assert!((report.average_change.unwrap() - 3.75).abs() < 1e-9);
        assert!(report.rows[4].change_pct.is_none());
    }

    #[test]
    fn test_empty_universe_has_no_rates() {
        let report = evaluate_universe(&[], &HashMap::new());
        assert_eq!(report.evaluated, 0);
        assert!(report.win_rate.is_none());
        assert!(report.average_change.is_none());
    }

    #[test]
    fn test_basket_return_weights_by_allocation() {
        let day = |d: u32| NaiveDate::from_ymd_opt(2024, 6, d).unwrap();
        let point = |symbol: &str, d: u32, close: f64| PricePoint {
            symbol: symbol.to_string(),
            date: day(d),
            close,
        };

        let entries = vec![
            AllocationEntry::new("1", "AAPL", 60.0),
            AllocationEntry::new("2", "MSFT", 40.0),
            AllocationEntry::new("3", "GME", 0.0),
        ];
        let mut histories = HashMap::new();
        histories.insert(
            "AAPL".to_string(),
            vec![point("AAPL", 1, 90.0), point("AAPL", 3, 100.0), point("AAPL", 10, 110.0)],
        );
        histories.insert(
            "MSFT".to_string(),
            vec![point("MSFT", 2, 200.0), point("MSFT", 9, 190.0)],
        );

        let result = basket_return(&entries, &histories, day(2));
        assert_eq!(result.missing, vec!["GME".to_string()]);
        // AAPL +10% * 0.6 = 6, MSFT -5% * 0.4 = -2
        assert!((result.total_return_pct - 4.0).abs() < 1e-9);
        assert_eq!(result.holdings[0].start_price, 100.0);
    }
}
