//! Pulse Dashboard Library
//!
//! Backend for the market-sentiment dashboard: user baskets with
//! self-balancing allocations, cross-source sentiment reconciliation, and
//! signal performance views.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │                   pulse-dashboard (Rust Service)                    │
//! │                              :4480                                  │
//! ├─────────────────────────────────────────────────────────────────────┤
//! │  ┌─────────────────┐  ┌─────────────────┐  ┌─────────────────┐     │
//! │  │  Allocation     │  │  Signal         │  │  Performance    │     │
//! │  │  Rebalancer     │  │  Reconciler     │  │  & Correlation  │     │
//! │  └─────────────────┘  └─────────────────┘  └─────────────────┘     │
//! │  ┌─────────────────────────────────────────────────────────────┐   │
//! │  │  Store (SQLite): baskets, sentiment observations, prices     │   │
//! │  └─────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Key Concepts
//!
//! ## Allocation invariant
//! - A basket's allocations always sum to 100
//! - Moving one slider redistributes the delta over unlocked peers in
//!   proportion to their share
//! - Saving rounds to whole percents and hands the rounding error to the
//!   first unlocked entry
//!
//! ## Signal universe
//! - Only the latest reading per symbol and source counts
//! - A symbol qualifies when every requested source agrees on its sentiment

#![warn(clippy::all)]
#![allow(clippy::pedantic)]

pub mod allocation;
pub mod auth;
pub mod basket;
pub mod error;
pub mod extract;
pub mod market;
pub mod performance;
pub mod routes;
pub mod sentiment;
pub mod storage;

use anyhow::{Context, Result};
use axum::http::HeaderValue;
use axum::Router;
use pulse_common::config::Config;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

pub use auth::AuthState;
pub use basket::{Basket, BasketService};
pub use error::DashboardError;
pub use routes::{build_router, AppState};
pub use storage::{SqliteStore, SqliteStoreConfig, Store};

/// CORS layer for the configured origins; no origins allows any.
pub fn cors_layer(origins: &[String]) -> CorsLayer {
    let layer = CorsLayer::new().allow_methods(Any).allow_headers(Any);

    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match origin.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(origin = %origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    if allowed.is_empty() {
        layer.allow_origin(Any)
    } else {
        layer.allow_origin(allowed)
    }
}

/// Main dashboard service
pub struct DashboardService {
    config: Config,
    state: AppState,
}

impl DashboardService {
    /// Open the store and prepare shared state.
    pub fn new(config: Config) -> Result<Self> {
        let jwt_secret = config
            .auth
            .jwt_secret
            .clone()
            .context("auth.jwt_secret is not configured")?;
        let auth = AuthState::new(jwt_secret, config.auth.audience.clone());

        let store = SqliteStore::new(SqliteStoreConfig::new(config.database_path()))?;
        let state = AppState::new(Arc::new(store), auth);

        Ok(Self { config, state })
    }

    /// Router with CORS applied.
    pub fn router(&self) -> Router {
        build_router(self.state.clone()).layer(cors_layer(&self.config.server.cors_origins))
    }

    /// Start the dashboard service
    pub async fn start(self) -> Result<()> {
        let app = self.router();

        let addr: SocketAddr = self
            .config
            .bind_address()
            .parse()
            .with_context(|| format!("Invalid bind address {}", self.config.bind_address()))?;
        tracing::info!(address = %addr, "Starting HTTP server");

        let listener = tokio::net::TcpListener::bind(addr).await?;
        axum::serve(listener, app).await?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_service_requires_jwt_secret() {
        let dir = tempdir().unwrap();
        let mut config = Config::default();
        config.database.path = Some(dir.path().join("pulse.db"));

        assert!(DashboardService::new(config.clone()).is_err());

        config.auth.jwt_secret = Some("a".repeat(32));
        assert!(DashboardService::new(config).is_ok());
    }

    #[test]
    fn test_cors_layer_accepts_origin_list() {
        let _ = cors_layer(&[]);
        let _ = cors_layer(&["https://pulse.example.com".to_string(), "bad\norigin".to_string()]);
    }
}
