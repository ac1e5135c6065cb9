//! HTTP surface over the engine.

mod handlers;
mod router;
mod types;

pub use router::create_router;
pub use types::{ErrorResponse, HealthResponse, ReloadResponse};
