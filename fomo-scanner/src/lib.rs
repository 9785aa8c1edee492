//! FOMO Scanner Library
//!
//! Background discovery service for crypto assets showing early momentum.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────────┐
//! │                     fomo-scanner (Rust Service)                      │
//! │                               :4480                                  │
//! ├──────────────────────────────────────────────────────────────────────┤
//! │  DataSource ─► CandidateFilter ─► BatchScorer ─► RankedCache ─► HTTP │
//! │                                  (ScoringPipeline)                   │
//! │                    ▲                                                 │
//! │                    └──────── RefreshScheduler ───────────────────────│
//! └──────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Key Concepts
//!
//! ## FOMO score
//! A 0-100 composite of volume spike, price action, trend, and distribution,
//! optionally adjusted by research overlays, a predictive blend, and
//! historical pattern matching.
//!
//! ## Generation
//! One complete ranked list published to the cache in a single swap.
//! Readers cycle through it round-robin until the next publish.

#![warn(clippy::all)]
#![allow(clippy::pedantic)]

pub mod batch;
pub mod cache;
pub mod clock;
pub mod data;
pub mod filter;
pub mod routes;
pub mod scheduler;
pub mod scoring;

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};

use fomo_common::config::Config;

use crate::batch::BatchScorer;
use crate::cache::RankedCache;
use crate::clock::{Clock, SystemClock};
use crate::data::{shared_limiter, CachedSource, CoinGeckoAdapter, DataSource};
use crate::filter::CandidateFilter;
use crate::routes::AppState;
use crate::scheduler::{RefreshScheduler, SchedulerTiming};
use crate::scoring::ScoringPipeline;

/// Main scanner service
pub struct ScannerService {
    config: Config,
    scheduler: RefreshScheduler,
}

impl ScannerService {
    /// Wire the service against CoinGecko.
    pub fn new(config: Config) -> Self {
        let limiter = shared_limiter("coingecko", config.coingecko.rate_limit_rpm);
        let adapter = CoinGeckoAdapter::from_config(&config.coingecko).with_rate_limiter(limiter);
        let ttl = Duration::from_secs(config.scanner.scoring.history_cache_ttl_secs);
        let source: Arc<dyn DataSource> = Arc::new(CachedSource::new(adapter, ttl));

        Self::with_source(config, source, Arc::new(SystemClock))
    }

    /// Wire the service against any data source and clock.
    pub fn with_source(config: Config, source: Arc<dyn DataSource>, clock: Arc<dyn Clock>) -> Self {
        let scanner = &config.scanner;

        let call_timeout = Duration::from_secs(scanner.batch.call_timeout_secs);

        let filter = CandidateFilter::new(Arc::clone(&source), scanner.filter.clone(), call_timeout);
        let pipeline = Arc::new(ScoringPipeline::new(
            source,
            scanner.scoring.clone(),
            call_timeout,
            Arc::clone(&clock),
        ));
        let batch = BatchScorer::new(pipeline, &scanner.batch);

        let timing = SchedulerTiming::from_config(scanner);
        let cache = Arc::new(RankedCache::new(
            Arc::clone(&clock),
            timing.interval,
            scanner.batch.max_results,
        ));
        let scheduler = RefreshScheduler::new(filter, batch, cache, clock, timing);

        Self { config, scheduler }
    }

    pub fn scheduler(&self) -> &RefreshScheduler {
        &self.scheduler
    }

    pub fn cache(&self) -> Arc<RankedCache> {
        Arc::clone(self.scheduler.cache())
    }

    /// Router with CORS applied.
    pub fn router(&self) -> Router {
        let cors = CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);

        routes::build_router(AppState::new(self.scheduler.clone())).layer(cors)
    }

    /// Run the refresh loop (and the HTTP server when enabled) until
    /// `shutdown` resolves, then stop the loop.
    ///
    /// The listener is bound before the loop starts, so a bad address
    /// fails without leaving a refresh loop behind.
    pub async fn run<F>(self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let server = &self.config.server;
        let listener = if server.enabled {
            Some(bind(&server.host, server.port).await?)
        } else {
            None
        };

        tracing::info!(
            strategy = %self.config.scanner.scoring.strategy,
            interval_secs = self.config.scanner.refresh_interval_secs,
            "Starting scanner"
        );
        let handle = self.scheduler.start();

        let served = match listener {
            Some(listener) => axum::serve(listener, self.router())
                .with_graceful_shutdown(shutdown)
                .await
                .context("HTTP server failed"),
            None => {
                shutdown.await;
                Ok(())
            }
        };

        self.scheduler.stop();
        if let Err(e) = handle.await {
            tracing::warn!(error = %e, "Refresh loop ended abnormally");
        }

        served
    }
}

async fn bind(host: &str, port: u16) -> Result<tokio::net::TcpListener> {
    let ip = host
        .parse::<std::net::IpAddr>()
        .with_context(|| format!("Invalid server host {}", host))?;
    let addr = SocketAddr::from((ip, port));

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    tracing::info!(address = %addr, "Starting HTTP server");
    Ok(listener)
}
