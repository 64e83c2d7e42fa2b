mod anomaly;
mod auth;
mod config;
mod db;
mod errors;
mod metrics;
mod model;
mod notify;
mod oracle;
mod pipeline;
mod ratelimit;
mod rest;
mod store;
mod validate;

use std::sync::Arc;

use axum::{routing::get, Router};
use tracing::{error, info};

#[tokio::main]
async fn main() {
    let cfg = config::Config::from_env();

    // Initialize logging
    tracing_subscriber::fmt::init();

    info!("Starting Telemetry Gateway");
    info!("HTTP server: {}", cfg.http_addr);
    info!(
        "Database: {}",
        cfg.database_url.split('@').last().unwrap_or("***")
    );
    info!(
        "Rate limit: {} events per {}s window",
        cfg.rate_limit_max, cfg.rate_limit_window
    );
    info!(
        "Anomaly detection: window {}, tolerance {}",
        cfg.anomaly_window, cfg.anomaly_tolerance
    );
    if cfg.oracle.is_none() {
        info!("On-chain verification not configured, registration is open");
    }

    // Initialize metrics
    metrics::init_metrics();

    // Connect to database
    let pool = match db::make_pool(&cfg.database_url).await {
        Ok(pool) => pool,
        Err(e) => {
            error!("Failed to connect to database: {}", e);
            std::process::exit(1);
        }
    };

    let store = Arc::new(db::PgStore::new(pool.clone()));
    let notifier = Arc::new(notify::SmsNotifier::new(cfg.twilio.clone()));
    let oracle = Arc::new(oracle::HttpChainOracle::new(cfg.oracle.clone()));
    let limiter = ratelimit::RateLimiter::new(cfg.rate_limit_window, cfg.rate_limit_max);
    let detector = anomaly::AnomalyDetector::new(cfg.anomaly_tolerance);
    let pipeline = Arc::new(pipeline::IngestionPipeline::new(
        store.clone(),
        notifier,
        limiter,
        detector,
        cfg.anomaly_window,
    ));

    // Build HTTP app with REST API and metrics endpoint
    let app = Router::new()
        .route("/metrics", get(metrics_handler))
        .merge(rest::create_router(pool, pipeline, store, oracle));

    // Start HTTP server
    let listener = tokio::net::TcpListener::bind(&cfg.http_addr)
        .await
        .unwrap_or_else(|e| {
            error!("Failed to bind to {}: {}", cfg.http_addr, e);
            std::process::exit(1);
        });

    info!("HTTP server listening on {}", cfg.http_addr);

    let server_handle = tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap_or_else(|e| {
            error!("HTTP server error: {}", e);
        });
    });

    tokio::select! {
        _ = server_handle => {
            error!("HTTP server terminated");
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received shutdown signal");
        }
    }

    info!("Shutting down");
}

async fn metrics_handler() -> String {
    metrics::gather_metrics()
}
