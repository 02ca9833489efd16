//! Cross-source sentiment reconciliation.
//!
//! A symbol enters the universe only when every requested source has a
//! reading for it and all of those latest readings carry the same sentiment.

use std::collections::{BTreeSet, HashMap};

use super::types::{
    sentiment_key, SentimentObservation, SentimentSource, SourceTables, UniverseEntry,
};

/// Latest observation per symbol.
///
/// Ties on date keep the observation seen first.
pub fn latest_by_symbol(
    observations: &[SentimentObservation],
) -> HashMap<&str, &SentimentObservation> {
    let mut latest: HashMap<&str, &SentimentObservation> = HashMap::new();
    for obs in observations {
        latest
            .entry(obs.symbol.as_str())
            .and_modify(|current| {
                if obs.date > current.date {
                    *current = obs;
                }
            })
            .or_insert(obs);
    }
    latest
}

/// Build the reconciled universe for the requested sources.
///
/// Output is sorted by symbol. An empty request yields an empty universe.
pub fn build_universe(tables: &SourceTables, requested: &[SentimentSource]) -> Vec<UniverseEntry> {
    let mut sources: Vec<SentimentSource> = Vec::with_capacity(requested.len());
    for source in requested {
        if !sources.contains(source) {
            sources.push(*source);
        }
    }
    if sources.is_empty() {
        return Vec::new();
    }

    let latest: Vec<HashMap<&str, &SentimentObservation>> = sources
        .iter()
        .map(|source| latest_by_symbol(tables.table(*source)))
        .collect();

    let candidates: BTreeSet<&str> = latest
        .iter()
        .flat_map(|map| map.keys().copied())
        .collect();

    let mut universe = Vec::new();
    for symbol in candidates {
        let Some(observations) = latest
            .iter()
            .map(|map| map.get(symbol).copied())
            .collect::<Option<Vec<&SentimentObservation>>>()
        else {
            continue;
        };

        let agreed = sentiment_key(&observations[0].sentiment);
        if observations
            .iter()
            .all(|obs| sentiment_key(&obs.sentiment) == agreed)
        {
            universe.push(UniverseEntry {
                symbol: symbol.to_string(),
                sentiment: agreed,
                observations: observations.into_iter().cloned().collect(),
            });
        }
    }

    tracing::debug!(
        sources = ?sources,
        retained = universe.len(),
        "Built sentiment universe"
    );
    universe
}
