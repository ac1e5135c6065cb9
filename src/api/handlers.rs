use std::sync::Arc;
use std::time::Instant;

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use tracing::info;

use crate::engine::Engine;

use super::types::*;

/// `GET /search?q=...&k=10`
pub async fn search(
    State(engine): State<Arc<Engine>>,
    Query(params): Query<SearchParams>,
) -> Response {
    let q = match params.q {
        Some(q) => q,
        None => {
            return (
                StatusCode::BAD_REQUEST,
                Json(ErrorResponse::new("missing q param")),
            )
                .into_response()
        }
    };
    let k = params.k.unwrap_or(10).clamp(1, 100) as usize;

    let total_t0 = Instant::now();
    let out = engine.search(&q, k);
    let total_ms = total_t0.elapsed().as_secs_f64() * 1000.0;

    info!(
        query = %q,
        k,
        found = out.found,
        search_ms = out.search_time_ms,
        total_ms,
        "search"
    );

    let mut body = serde_json::to_value(&out).unwrap_or_else(|_| json!({}));
    body["total_time_ms"] = json!(total_ms);
    Json(body).into_response()
}

/// `GET /suggest?q=...&k=5`
pub async fn suggest(
    State(engine): State<Arc<Engine>>,
    Query(params): Query<SuggestParams>,
) -> Response {
    let q = match params.q {
        Some(q) => q,
        None => {
            return (
                StatusCode::BAD_REQUEST,
                Json(ErrorResponse::new("missing q param")),
            )
                .into_response()
        }
    };
    let k = params.k.unwrap_or(5).clamp(1, 10) as usize;
    Json(engine.suggest(&q, k)).into_response()
}

/// `POST /reload`
pub async fn reload(State(engine): State<Arc<Engine>>) -> Json<ReloadResponse> {
    let reloaded = engine.reload();
    Json(ReloadResponse {
        reloaded,
        segments: engine.segment_count(),
    })
}

/// `GET /health`
pub async fn health(State(engine): State<Arc<Engine>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        ok: true,
        segments: engine.segment_count(),
        version: crate::VERSION.to_string(),
    })
}

/// `GET /metrics`
pub async fn metrics(State(engine): State<Arc<Engine>>) -> Response {
    let encoder = prometheus::TextEncoder::new();
    match encoder.encode_to_string(&engine.metrics().registry().gather()) {
        Ok(body) => body.into_response(),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ErrorResponse::new(e.to_string())),
        )
            .into_response(),
    }
}
