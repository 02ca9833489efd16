//! Performance and correlation views.
//!
//! - **Metrics**: percentage change, signal win rate, weighted basket return
//! - **Correlation**: Pearson correlation of sentiment scores and returns

pub mod correlation;
pub mod metrics;

pub use correlation::{
    pearson, sentiment_price_correlation, CorrelationReport, MAX_CORRELATION_LAG,
};
pub use metrics::{
    basket_return, evaluate_universe, percentage_change, BasketReturn, HoldingReturn,
    PerformanceReport, PerformanceRow, SignalOutcome,
};
