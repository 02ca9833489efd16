//! HTTP API routes.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    middleware,
    response::IntoResponse,
    routing::{delete, get, post, put},
    Extension, Json, Router,
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use crate::auth::{auth_middleware, AuthState, AuthUser};
use crate::basket::{AllocationMove, BasketService};
use crate::error::{DashboardError, DashboardResult};
use crate::extract::{ApiJson, ApiQuery};
use crate::market::{normalize_symbol, PricePoint};
use crate::performance::{evaluate_universe, sentiment_price_correlation, MAX_CORRELATION_LAG};
use crate::sentiment::{build_universe, SentimentObservation, SentimentSource, UniverseEntry};
use crate::storage::{fetch_source_tables, Store};

/// Application state.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn Store>,
    pub baskets: BasketService,
    pub auth: AuthState,
}

impl AppState {
    pub fn new(store: Arc<dyn Store>, auth: AuthState) -> Self {
        Self {
            baskets: BasketService::new(Arc::clone(&store)),
            store,
            auth,
        }
    }
}

/// Build the application router.
pub fn build_router(state: AppState) -> Router {
    let api = Router::new()
        // Baskets
        .route("/baskets", get(list_baskets).post(create_basket))
        .route("/baskets/:id", get(get_basket).delete(delete_basket))
        .route("/baskets/:id/lock", put(lock_basket))
        .route("/baskets/:id/stocks", post(add_stock))
        .route("/baskets/:id/stocks/:entry_id", delete(remove_stock))
        .route("/baskets/:id/stocks/:entry_id/lock", put(lock_entry))
        .route("/baskets/:id/allocations", post(adjust_allocations))
        .route("/baskets/:id/allocations/reset", post(reset_allocations))
        .route("/baskets/:id/performance", get(basket_performance))
        // Signals
        .route("/sentiment/:source", get(list_sentiment).post(ingest_sentiment))
        .route("/universe", get(get_universe))
        .route("/performance", get(get_performance))
        .route("/correlation/:symbol", get(get_correlation))
        // Prices
        .route("/prices", post(ingest_prices))
        .route("/prices/:symbol", get(price_history))
        .route_layer(middleware::from_fn_with_state(
            state.auth.clone(),
            auth_middleware,
        ));

    Router::new()
        .route("/health", get(health_check))
        .nest("/api/v1", api)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// ============ Envelope ============

#[derive(Debug, Serialize)]
struct ApiResponse<T> {
    success: bool,
    data: T,
}

fn ok<T: Serialize>(data: T) -> Json<ApiResponse<T>> {
    Json(ApiResponse {
        success: true,
        data,
    })
}

// ============ Health Check ============

async fn health_check() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "healthy",
        "service": "pulse-dashboard",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

// ============ Baskets ============

#[derive(Debug, Deserialize)]
struct CreateBasketRequest {
    name: String,
    #[serde(default)]
    symbols: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct LockRequest {
    locked: bool,
}

#[derive(Debug, Deserialize)]
struct AddStockRequest {
    symbol: String,
}

#[derive(Debug, Deserialize)]
struct AdjustRequest {
    adjustments: Vec<AllocationMove>,
}

#[derive(Debug, Deserialize)]
struct BasketPerformanceQuery {
    since: Option<NaiveDate>,
}

async fn list_baskets(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> DashboardResult<impl IntoResponse> {
    let baskets = state.baskets.list(&user.user_id).await?;
    Ok(ok(baskets))
}

async fn create_basket(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    ApiJson(request): ApiJson<CreateBasketRequest>,
) -> DashboardResult<impl IntoResponse> {
    let basket = state
        .baskets
        .create(&user.user_id, &request.name, &request.symbols)
        .await?;
    Ok((StatusCode::CREATED, ok(basket)))
}

async fn get_basket(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<String>,
) -> DashboardResult<impl IntoResponse> {
    Ok(ok(state.baskets.get(&user.user_id, &id).await?))
}

async fn delete_basket(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<String>,
) -> DashboardResult<impl IntoResponse> {
    state.baskets.delete(&user.user_id, &id).await?;
    Ok(ok(serde_json::json!({ "deleted": id })))
}

async fn lock_basket(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<String>,
    ApiJson(request): ApiJson<LockRequest>,
) -> DashboardResult<impl IntoResponse> {
    let basket = state
        .baskets
        .set_locked(&user.user_id, &id, request.locked)
        .await?;
    Ok(ok(basket))
}

async fn add_stock(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<String>,
    ApiJson(request): ApiJson<AddStockRequest>,
) -> DashboardResult<impl IntoResponse> {
    let basket = state
        .baskets
        .add_stock(&user.user_id, &id, &request.symbol)
        .await?;
    Ok(ok(basket))
}

async fn remove_stock(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path((id, entry_id)): Path<(String, String)>,
) -> DashboardResult<impl IntoResponse> {
    let basket = state
        .baskets
        .remove_stock(&user.user_id, &id, &entry_id)
        .await?;
    Ok(ok(basket))
}

async fn lock_entry(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path((id, entry_id)): Path<(String, String)>,
    ApiJson(request): ApiJson<LockRequest>,
) -> DashboardResult<impl IntoResponse> {
    let basket = state
        .baskets
        .set_entry_locked(&user.user_id, &id, &entry_id, request.locked)
        .await?;
    Ok(ok(basket))
}

async fn adjust_allocations(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<String>,
    ApiJson(request): ApiJson<AdjustRequest>,
) -> DashboardResult<impl IntoResponse> {
    let result = state
        .baskets
        .adjust(&user.user_id, &id, &request.adjustments)
        .await?;
    Ok(ok(result))
}

async fn reset_allocations(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<String>,
) -> DashboardResult<impl IntoResponse> {
    Ok(ok(state.baskets.reset(&user.user_id, &id).await?))
}

async fn basket_performance(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<String>,
    ApiQuery(query): ApiQuery<BasketPerformanceQuery>,
) -> DashboardResult<impl IntoResponse> {
    let report = state
        .baskets
        .performance(&user.user_id, &id, query.since)
        .await?;
    Ok(ok(report))
}

// ============ Sentiment ============

#[derive(Debug, Deserialize)]
struct SentimentInput {
    symbol: String,
    date: NaiveDate,
    sentiment: String,
    entry_price: f64,
}

#[derive(Debug, Deserialize)]
struct IngestSentimentRequest {
    observations: Vec<SentimentInput>,
}

#[derive(Debug, Deserialize)]
struct SymbolQuery {
    symbol: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SourcesQuery {
    sources: Option<String>,
}

#[derive(Debug, Serialize)]
struct UniverseResponse {
    sources: Vec<SentimentSource>,
    count: usize,
    entries: Vec<UniverseEntry>,
}

fn parse_source(raw: &str) -> DashboardResult<SentimentSource> {
    raw.parse().map_err(DashboardError::InvalidRequest)
}

/// Parse a comma-separated source list. Absent means every source; present
/// but blank means none.
fn parse_sources(raw: Option<&str>) -> DashboardResult<Vec<SentimentSource>> {
    match raw {
        None => Ok(SentimentSource::ALL.to_vec()),
        Some(list) => list
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(parse_source)
            .collect(),
    }
}

async fn ingest_sentiment(
    State(state): State<AppState>,
    Path(source): Path<String>,
    ApiJson(request): ApiJson<IngestSentimentRequest>,
) -> DashboardResult<impl IntoResponse> {
    let source = parse_source(&source)?;

    let observations = request
        .observations
        .into_iter()
        .map(|input| {
            let symbol = normalize_symbol(&input.symbol);
            if symbol.is_empty() {
                return Err(DashboardError::InvalidRequest("symbol must not be empty".into()));
            }
            if input.sentiment.is_empty() {
                return Err(DashboardError::InvalidRequest(format!(
                    "missing sentiment for {symbol}"
                )));
            }
            if !(input.entry_price.is_finite() && input.entry_price > 0.0) {
                return Err(DashboardError::InvalidRequest(format!(
                    "entry price for {symbol} must be positive"
                )));
            }
            Ok(SentimentObservation {
                symbol,
                source,
                date: input.date,
                sentiment: input.sentiment,
                entry_price: input.entry_price,
            })
        })
        .collect::<DashboardResult<Vec<_>>>()?;

    let stored = state.store.insert_observations(&observations).await?;
    tracing::info!(source = %source, stored, "Ingested sentiment observations");

    Ok((
        StatusCode::CREATED,
        ok(serde_json::json!({ "source": source, "stored": stored })),
    ))
}

async fn list_sentiment(
    State(state): State<AppState>,
    Path(source): Path<String>,
    ApiQuery(query): ApiQuery<SymbolQuery>,
) -> DashboardResult<impl IntoResponse> {
    let source = parse_source(&source)?;
    let symbol = query.symbol.as_deref().map(normalize_symbol);

    let observations = state.store.observations(source, symbol.as_deref()).await?;
    Ok(ok(observations))
}

async fn load_universe(
    store: &dyn Store,
    sources: &[SentimentSource],
) -> DashboardResult<Vec<UniverseEntry>> {
    if sources.is_empty() {
        return Ok(Vec::new());
    }
    let tables = fetch_source_tables(store).await?;
    Ok(build_universe(&tables, sources))
}

async fn get_universe(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<SourcesQuery>,
) -> DashboardResult<impl IntoResponse> {
    let sources = parse_sources(query.sources.as_deref())?;
    let entries = load_universe(state.store.as_ref(), &sources).await?;

    Ok(ok(UniverseResponse {
        sources,
        count: entries.len(),
        entries,
    }))
}

async fn get_performance(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<SourcesQuery>,
) -> DashboardResult<impl IntoResponse> {
    let sources = parse_sources(query.sources.as_deref())?;
    let universe = load_universe(state.store.as_ref(), &sources).await?;

    let symbols: Vec<String> = universe.iter().map(|e| e.symbol.clone()).collect();
    let latest = state.store.latest_prices(&symbols).await?;

    Ok(ok(evaluate_universe(&universe, &latest)))
}

#[derive(Debug, Deserialize)]
struct CorrelationQuery {
    source: Option<String>,
    #[serde(default)]
    lag: usize,
}

async fn get_correlation(
    State(state): State<AppState>,
    Path(symbol): Path<String>,
    ApiQuery(query): ApiQuery<CorrelationQuery>,
) -> DashboardResult<impl IntoResponse> {
    let symbol = normalize_symbol(&symbol);
    let source = query
        .source
        .as_deref()
        .ok_or_else(|| DashboardError::InvalidRequest("missing source parameter".into()))
        .and_then(parse_source)?;
    if query.lag > MAX_CORRELATION_LAG {
        return Err(DashboardError::InvalidRequest(format!(
            "lag must be at most {MAX_CORRELATION_LAG} trading days"
        )));
    }

    let (observations, history) = tokio::try_join!(
        state.store.observations(source, Some(&symbol)),
        state.store.price_history(&symbol),
    )?;

    Ok(ok(sentiment_price_correlation(
        &symbol,
        source,
        &observations,
        &history,
        query.lag,
    )))
}

// ============ Prices ============

#[derive(Debug, Deserialize)]
struct IngestPricesRequest {
    prices: Vec<PricePoint>,
}

async fn ingest_prices(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<IngestPricesRequest>,
) -> DashboardResult<impl IntoResponse> {
    let prices = request
        .prices
        .into_iter()
        .map(|point| {
            let symbol = normalize_symbol(&point.symbol);
            if symbol.is_empty() {
                return Err(DashboardError::InvalidRequest("symbol must not be empty".into()));
            }
            if !(point.close.is_finite() && point.close > 0.0) {
                return Err(DashboardError::InvalidRequest(format!(
                    "close for {symbol} on {} must be positive",
                    point.date
                )));
            }
            Ok(PricePoint { symbol, ..point })
        })
        .collect::<DashboardResult<Vec<_>>>()?;

    let stored = state.store.upsert_prices(&prices).await?;
    Ok((
        StatusCode::CREATED,
        ok(serde_json::json!({ "stored": stored })),
    ))
}

async fn price_history(
    State(state): State<AppState>,
    Path(symbol): Path<String>,
) -> DashboardResult<impl IntoResponse> {
    let history = state.store.price_history(&normalize_symbol(&symbol)).await?;
    Ok(ok(history))
}
