//! Neutral news digest service: binary entrypoint.
//! Boots tracing, configuration, metrics, and the Axum router.

use std::time::Duration;

use neutral_news::api::{self, AppState};
use neutral_news::config::AppConfig;
use neutral_news::metrics::Metrics;
use neutral_news::pipeline::DigestPipeline;
use shuttle_axum::ShuttleAxum;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Compact logs by default, JSON lines when `LOG_FORMAT=json`. Filter from `RUST_LOG`.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("neutral_news=info,warn"));

    let json = std::env::var("LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    // try_init: the platform runtime may already have installed a subscriber
    let _ = if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json())
            .try_init()
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().compact())
            .try_init()
    };
}

#[shuttle_runtime::main]
async fn axum() -> ShuttleAxum {
    // Load .env in local/dev; no-op in prod environments.
    let _ = dotenvy::dotenv();
    init_tracing();

    let cfg = AppConfig::load()?;
    let metrics = Metrics::init(cfg.cache_ttl_secs)?;
    let pipeline = DigestPipeline::from_config(&cfg)?;

    info!(
        sources = ?pipeline.orchestrator().source_names(),
        cache_ttl_secs = cfg.cache_ttl_secs,
        "digest service starting"
    );

    let state = AppState::new(pipeline, Duration::from_secs(cfg.cache_ttl_secs));
    let router = api::router(state).merge(metrics.router());

    Ok(router.into())
}
