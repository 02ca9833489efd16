//! Sentiment signals and cross-source reconciliation.

pub mod reconciler;
pub mod types;

pub use reconciler::{build_universe, latest_by_symbol};
pub use types::{
    sentiment_key, Polarity, SentimentObservation, SentimentSource, SourceTables, UniverseEntry,
};
