//! Sentiment data types.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// External signal provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SentimentSource {
    /// Google Trends
    Google,
    /// Twitter/X
    Twitter,
    /// News articles
    News,
}

impl SentimentSource {
    pub const ALL: [SentimentSource; 3] = [Self::Google, Self::Twitter, Self::News];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Google => "google",
            Self::Twitter => "twitter",
            Self::News => "news",
        }
    }
}

impl std::fmt::Display for SentimentSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SentimentSource {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "google" => Ok(Self::Google),
            "twitter" | "x" => Ok(Self::Twitter),
            "news" => Ok(Self::News),
            other => Err(format!("unknown sentiment source: {}", other)),
        }
    }
}

/// Recognized sentiment polarities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Polarity {
    Positive,
    Negative,
    Neutral,
}

impl Polarity {
    /// Classify a raw sentiment label; `None` for anything unrecognized.
    pub fn classify(raw: &str) -> Option<Self> {
        match sentiment_key(raw).as_str() {
            "positive" => Some(Self::Positive),
            "negative" => Some(Self::Negative),
            "neutral" => Some(Self::Neutral),
            _ => None,
        }
    }

    /// Numeric score used for correlation (+1 / 0 / -1).
    pub fn score(&self) -> f64 {
        match self {
            Self::Positive => 1.0,
            Self::Negative => -1.0,
            Self::Neutral => 0.0,
        }
    }
}

/// Comparison key for sentiment labels.
///
/// Labels compare case-insensitively. Labels outside the known polarities
/// are kept as their own literal token ("Mixed" agrees with "mixed" but not
/// with "neutral").
pub fn sentiment_key(raw: &str) -> String {
    raw.to_lowercase()
}

/// One sentiment reading for a symbol from one source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SentimentObservation {
    pub symbol: String,
    pub source: SentimentSource,
    pub date: NaiveDate,
    pub sentiment: String,
    pub entry_price: f64,
}

/// Observation lists fetched per source.
#[derive(Debug, Clone, Default)]
pub struct SourceTables {
    pub google: Vec<SentimentObservation>,
    pub twitter: Vec<SentimentObservation>,
    pub news: Vec<SentimentObservation>,
}

impl SourceTables {
    pub fn table(&self, source: SentimentSource) -> &[SentimentObservation] {
        match source {
            SentimentSource::Google => &self.google,
            SentimentSource::Twitter => &self.twitter,
            SentimentSource::News => &self.news,
        }
    }

    pub fn table_mut(&mut self, source: SentimentSource) -> &mut Vec<SentimentObservation> {
        match source {
            SentimentSource::Google => &mut self.google,
            SentimentSource::Twitter => &mut self.twitter,
            SentimentSource::News => &mut self.news,
        }
    }

    /// Route observations into their source's table, keeping arrival order.
    pub fn from_observations(observations: impl IntoIterator<Item = SentimentObservation>) -> Self {
        let mut tables = Self::default();
        for obs in observations {
            tables.table_mut(obs.source).push(obs);
        }
        tables
    }
}

/// A symbol every requested source agrees on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UniverseEntry {
    pub symbol: String,
    /// Agreed sentiment, lower-cased
    pub sentiment: String,
    /// Latest observation per requested source, in requested order
    pub observations: Vec<SentimentObservation>,
}

impl UniverseEntry {
    pub fn polarity(&self) -> Option<Polarity> {
        Polarity::classify(&self.sentiment)
    }

    /// Entry price from the first requested source's observation.
    pub fn entry_price(&self) -> Option<f64> {
        self.observations.first().map(|o| o.entry_price)
    }
}
