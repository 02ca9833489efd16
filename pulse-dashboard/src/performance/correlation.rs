//! Sentiment/price correlation.
//!
//! Pairs each dated sentiment score with the close-to-close return `lag`
//! trading days later and reports the Pearson coefficient.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use statrs::statistics::Statistics;
use std::collections::BTreeMap;

use crate::market::PricePoint;
use crate::sentiment::{Polarity, SentimentObservation, SentimentSource};

/// Fewer pairs than this yields no coefficient.
pub const MIN_CORRELATION_PAIRS: usize = 3;

/// Largest accepted lag, in trading days (about one year).
pub const MAX_CORRELATION_LAG: usize = 252;

/// Correlation between one source's sentiment and a symbol's returns.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorrelationReport {
    pub symbol: String,
    pub source: SentimentSource,
    pub lag: usize,
    pub pairs: usize,
    pub coefficient: Option<f64>,
}

/// Pearson correlation of two equally long series.
pub fn pearson(xs: &[f64], ys: &[f64]) -> Option<f64> {
    if xs.len() != ys.len() || xs.len() < MIN_CORRELATION_PAIRS {
        return None;
    }

    let sd_x = xs.iter().std_dev();
    let sd_y = ys.iter().std_dev();
    if !(sd_x > 0.0 && sd_y > 0.0) {
        return None;
    }

    let r = xs.iter().covariance(ys.iter()) / (sd_x * sd_y);
    r.is_finite().then(|| r.clamp(-1.0, 1.0))
}

/// Scored sentiment per date; the last observation on a date wins.
fn daily_scores(observations: &[SentimentObservation]) -> BTreeMap<NaiveDate, f64> {
    let mut scores = BTreeMap::new();
    for obs in observations {
        if let Some(polarity) = Polarity::classify(&obs.sentiment) {
            scores.insert(obs.date, polarity.score());
        }
    }
    scores
}

/// Pair sentiment scores with subsequent returns.
pub fn aligned_pairs(
    observations: &[SentimentObservation],
    history: &[PricePoint],
    lag: usize,
) -> (Vec<f64>, Vec<f64>) {
    let mut closes: Vec<&PricePoint> = history.iter().collect();
    closes.sort_by_key(|p| p.date);
    closes.dedup_by_key(|p| p.date);

    let mut scores = Vec::new();
    let mut returns = Vec::new();

    for (date, score) in daily_scores(observations) {
        // First trading day on or after the observation
        let start = closes.partition_point(|p| p.date < date);
        let Some(idx) = start.checked_add(lag) else {
            continue;
        };
        if idx == 0 || idx >= closes.len() {
            continue;
        }

        let prev = closes[idx - 1].close;
        if prev <= 0.0 {
            continue;
        }
        scores.push(score);
        returns.push((closes[idx].close - prev) / prev * 100.0);
    }

    (scores, returns)
}

/// Correlate one source's observations for a symbol with its price history.
pub fn sentiment_price_correlation(
    symbol: &str,
    source: SentimentSource,
    observations: &[SentimentObservation],
    history: &[PricePoint],
    lag: usize,
) -> CorrelationReport {
    let (scores, returns) = aligned_pairs(observations, history, lag);

    CorrelationReport {
        symbol: symbol.to_string(),
        source,
        lag,
        pairs: scores.len(),
        coefficient: pearson(&scores, &returns),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 2, d).unwrap()
    }

    fn observation(d: u32, sentiment: &str) -> SentimentObservation {
        SentimentObservation {
            symbol: "AAPL".into(),
            source: SentimentSource::Twitter,
            date: day(d),
            sentiment: sentiment.into(),
            entry_price: 100.0,
        }
    }

    /// Prices whose daily return is 2% in the direction of `moves`.
    fn history(moves: &[f64]) -> Vec<PricePoint> {
        let mut close = 100.0;
        let mut points = vec![PricePoint {
            symbol: "AAPL".into(),
            date: day(1),
            close,
        }];
        for (i, m) in moves.iter().enumerate() {
            close *= 1.0 + 0.02 * m;
            points.push(PricePoint {
                symbol: "AAPL".into(),
                date: day(i as u32 + 2),
                close,
            });
        }
        points
    }

    #[test]
    fn test_pearson_edge_cases() {
        assert!(pearson(&[1.0, 2.0], &[1.0, 2.0]).is_none());
        assert!(pearson(&[1.0, 1.0, 1.0], &[1.0, 2.0, 3.0]).is_none());
        assert!(pearson(&[1.0, 2.0, 3.0], &[1.0, 2.0]).is_none());

        let r = pearson(&[1.0, 2.0, 3.0, 4.0], &[2.0, 4.0, 6.0, 8.0]).unwrap();
        assert!((r - 1.0).abs() < 1e-9);
        let r = pearson(&[1.0, 2.0, 3.0, 4.0], &[8.0, 6.0, 4.0, 2.0]).unwrap();
        assert!((r + 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_same_day_alignment() {
        let moves = [1.0, -1.0, 1.0, -1.0, 1.0];
        let prices = history(&moves);
        let observations = vec![
            observation(2, "positive"),
            observation(3, "negative"),
            observation(4, "positive"),
            observation(5, "negative"),
            observation(6, "positive"),
        ];

        let report = sentiment_price_correlation(
            "AAPL",
            SentimentSource::Twitter,
            &observations,
            &prices,
            0,
        );
        assert_eq!(report.pairs, 5);
        assert!((report.coefficient.unwrap() - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_lag_shifts_to_next_return() {
        let moves = [1.0, -1.0, 1.0, -1.0, 1.0];
        let prices = history(&moves);
        // Each reading predicts the following day's move
        let observations = vec![
            observation(1, "positive"),
            observation(2, "negative"),
            observation(3, "positive"),
            observation(4, "negative"),
            observation(5, "positive"),
        ];

        let report = sentiment_price_correlation(
            "AAPL",
            SentimentSource::Twitter,
            &observations,
            &prices,
            1,
        );
        assert_eq!(report.pairs, 5);
        assert!((report.coefficient.unwrap() - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_unrecognized_and_unpriced_readings_are_skipped() {
        let prices = history(&[1.0, -1.0]);
        let observations = vec![
            observation(2, "positive"),
            observation(3, "mixed"),
            observation(20, "negative"),
        ];

        let (scores, returns) = aligned_pairs(&observations, &prices, 0);
        assert_eq!(scores, vec![1.0]);
        assert_eq!(returns.len(), 1);
    }

    #[test]
    fn test_huge_lag_yields_no_pairs() {
        let prices = history(&[1.0, -1.0, 1.0, -1.0]);
        let observations = vec![observation(3, "positive")];

        let (scores, returns) = aligned_pairs(&observations, &prices, usize::MAX);
        assert!(scores.is_empty());
        assert!(returns.is_empty());

        let report = sentiment_price_correlation(
            "AAPL",
            SentimentSource::Twitter,
            &observations,
            &prices,
            usize::MAX,
        );
        assert_eq!(report.pairs, 0);
        assert!(report.coefficient.is_none());
    }

    #[test]
    fn test_last_reading_on_a_date_wins() {
        let prices = history(&[1.0]);
        let observations = vec![observation(2, "negative"), observation(2, "positive")];
        let (scores, _) = aligned_pairs(&observations, &prices, 0);
        assert_eq!(scores, vec![1.0]);
    }
}
