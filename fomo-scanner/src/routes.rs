//! HTTP routes for the scanner service.
//!
//! Read-only views over the ranked cache and the refresh loop, plus one
//! trigger for an immediate refresh.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::State,
    response::Json,
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use tower_http::timeout::TimeoutLayer;

use crate::cache::{fallback_opportunities, CacheStats, RankedCache};
use crate::scheduler::{RefreshScheduler, SchedulerStatus};
use crate::scoring::ScoredOpportunity;

/// Read routes never wait on upstream calls.
const READ_TIMEOUT: Duration = Duration::from_secs(10);

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    pub scheduler: RefreshScheduler,
    fallback: Arc<Vec<ScoredOpportunity>>,
    fallback_cursor: Arc<AtomicUsize>,
}

impl AppState {
    pub fn new(scheduler: RefreshScheduler) -> Self {
        Self {
            scheduler,
            fallback: Arc::new(fallback_opportunities()),
            fallback_cursor: Arc::new(AtomicUsize::new(0)),
        }
    }

    fn cache(&self) -> &Arc<RankedCache> {
        self.scheduler.cache()
    }

    fn next_fallback(&self) -> Option<ScoredOpportunity> {
        if self.fallback.is_empty() {
            return None;
        }
        let index = self.fallback_cursor.fetch_add(1, Ordering::Relaxed) % self.fallback.len();
        self.fallback.get(index).cloned()
    }
}

/// Build the application router.
pub fn build_router(state: AppState) -> Router {
    let reads = Router::new()
        .route("/health", get(health))
        .route("/api/v1/opportunities", get(list_opportunities))
        .route("/api/v1/opportunities/next", get(next_opportunity))
        .route("/api/v1/stats", get(cache_stats))
        .route("/api/v1/status", get(scheduler_status))
        .layer(TimeoutLayer::new(READ_TIMEOUT));

    // A forced refresh runs a whole cycle and is bounded by the cycle timeout
    Router::new()
        .merge(reads)
        .route("/api/v1/refresh", post(force_refresh))
        .with_state(state)
}

// ============================================================================
// Response Types
// ============================================================================

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub service: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct OpportunitiesResponse {
    pub opportunities: Vec<ScoredOpportunity>,
    pub count: usize,
    pub is_fresh: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OpportunitySource {
    Cache,
    Fallback,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct NextResponse {
    pub opportunity: Option<ScoredOpportunity>,
    pub source: OpportunitySource,
    /// Generation the entry came from; absent for fallback entries
    pub generation_id: Option<u64>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RefreshResponse {
    pub refreshed: bool,
    pub stats: CacheStats,
}

// ============================================================================
// Route Handlers
// ============================================================================

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        service: "fomo-scanner".to_string(),
    })
}

async fn list_opportunities(State(state): State<AppState>) -> Json<OpportunitiesResponse> {
    let cache = state.cache();
    let opportunities = cache.snapshot();

    Json(OpportunitiesResponse {
        count: opportunities.len(),
        is_fresh: cache.is_fresh(),
        opportunities,
    })
}

/// Next entry in rotation; well-known assets while the cache is still empty.
async fn next_opportunity(State(state): State<AppState>) -> Json<NextResponse> {
    let response = match state.cache().get_next_tagged() {
        Some((generation_id, opportunity)) => NextResponse {
            opportunity: Some(opportunity),
            source: OpportunitySource::Cache,
            generation_id: Some(generation_id),
        },
        None => {
            tracing::debug!("Cache empty, serving fallback opportunity");
            NextResponse {
                opportunity: state.next_fallback(),
                source: OpportunitySource::Fallback,
                generation_id: None,
            }
        }
    };

    Json(response)
}

async fn cache_stats(State(state): State<AppState>) -> Json<CacheStats> {
    Json(state.cache().stats())
}

async fn scheduler_status(State(state): State<AppState>) -> Json<SchedulerStatus> {
    Json(state.scheduler.status().await)
}

async fn force_refresh(State(state): State<AppState>) -> Json<RefreshResponse> {
    let refreshed = state.scheduler.force_refresh().await;

    Json(RefreshResponse {
        refreshed,
        stats: state.cache().stats(),
    })
}
