use serde::{Deserialize, Serialize};

/// Query string for `GET /search`. `k` is signed so out-of-range
/// values still reach the handler and get clamped there.
#[derive(Debug, Clone, Deserialize)]
pub struct SearchParams {
    pub q: Option<String>,
    pub k: Option<i64>,
}

/// Query string for `GET /suggest`
#[derive(Debug, Clone, Deserialize)]
pub struct SuggestParams {
    pub q: Option<String>,
    pub k: Option<i64>,
}

/// Response for `POST /reload`
#[derive(Debug, Clone, Serialize)]
pub struct ReloadResponse {
    pub reloaded: bool,
    pub segments: usize,
}

/// Response for `GET /health`
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    pub ok: bool,
    pub segments: usize,
    pub version: String,
}

/// API error body
#[derive(Debug, Clone, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
        }
    }
}
