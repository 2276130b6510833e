// src/api.rs
//! Thin HTTP surface over `DigestPipeline`.

use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{Query, State},
    http::{HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tower_http::cors::CorsLayer;
use tracing::error;

use crate::cache::DigestCache;
use crate::error::DigestError;
use crate::ingest::types::Article;
use crate::pipeline::{Digest, DigestPipeline};

pub const CACHE_HEADER: &str = "X-Digest-Cache";

#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<DigestPipeline>,
    pub cache: Arc<DigestCache>,
}

impl AppState {
    pub fn new(pipeline: DigestPipeline, cache_ttl: Duration) -> Self {
        Self {
            pipeline: Arc::new(pipeline),
            cache: Arc::new(DigestCache::new(cache_ttl)),
        }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/news", get(news_get).post(news_post))
        .layer(CorsLayer::very_permissive())
        .with_state(state)
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({"status": "healthy", "message": "API is operational"}))
}

#[derive(Debug, Deserialize)]
struct NewsQuery {
    q: Option<String>,
    days: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct NewsBody {
    event: Option<String>,
    days_back: Option<u32>,
}

#[derive(Serialize)]
struct DigestOut<'a> {
    status: &'static str,
    query: &'a str,
    summary: &'a str,
    summary_failed: bool,
    articles: &'a [Article],
    #[serde(skip_serializing_if = "Option::is_none")]
    warning: Option<&'a str>,
    failed_sources: &'a [String],
    degraded: bool,
}

impl<'a> From<&'a Digest> for DigestOut<'a> {
    fn from(d: &'a Digest) -> Self {
        Self {
            status: "ok",
            query: &d.query,
            summary: &d.summary,
            summary_failed: d.summary_failed,
            articles: &d.articles,
            warning: d.warning.as_deref(),
            failed_sources: &d.failed_sources,
            degraded: d.degraded,
        }
    }
}

async fn news_get(State(state): State<AppState>, Query(q): Query<NewsQuery>) -> Response {
    serve_digest(&state, q.q, q.days).await
}

async fn news_post(State(state): State<AppState>, Json(body): Json<NewsBody>) -> Response {
    serve_digest(&state, body.event, body.days_back).await
}

fn error_response(status: StatusCode, message: &str) -> Response {
    (status, Json(json!({"status": "error", "error": message}))).into_response()
}

fn with_cache_header(mut resp: Response, hit: bool) -> Response {
    let v = if hit { "HIT" } else { "MISS" };
    resp.headers_mut()
        .insert(CACHE_HEADER, HeaderValue::from_static(v));
    resp
}

async fn serve_digest(state: &AppState, event: Option<String>, days: Option<u32>) -> Response {
    let event = event.unwrap_or_default().trim().to_string();
    if event.is_empty() {
        return error_response(StatusCode::BAD_REQUEST, "Missing query parameter");
    }
    let days = days
        .filter(|d| *d > 0)
        .unwrap_or(state.pipeline.defaults().lookback_days);

    if let Some(hit) = state.cache.get(&event, days) {
        let resp = Json(DigestOut::from(&hit)).into_response();
        return with_cache_header(resp, true);
    }

    let resp = match state.pipeline.process(&event, Some(days)).await {
        Ok(digest) => {
            let resp = Json(DigestOut::from(&digest)).into_response();
            // error-marked summaries and partial outages are not pinned for the TTL
            if !digest.summary_failed && !digest.degraded {
                state.cache.put(&event, days, digest);
            }
            resp
        }
        Err(e) if e.is_empty_result() => error_response(StatusCode::NOT_FOUND, &e.to_string()),
        Err(DigestError::Internal(e)) => {
            error!(query = %event, error = ?e, "digest failed");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
        }
        Err(e) => error_response(StatusCode::INTERNAL_SERVER_ERROR, &e.to_string()),
    };
    with_cache_header(resp, false)
}
