//! Routing module for the coupon service

use crate::coupons::state::SharedState;
use axum::{
    body::Body,
    extract::Request,
    http::{HeaderName, HeaderValue},
    middleware::Next,
    response::Response,
    routing::get,
    Json, Router,
};
use serde_json::{json, Value};
use std::time::{Duration, Instant};
use tower_http::cors::{Any, CorsLayer};
use tracing::{info, warn};
use uuid::Uuid;

/// Header carrying the per-request id
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Creates and configures the application router with all routes and middleware
pub fn create_app_router(state: SharedState) -> Router {
    // Middleware: CORS (Permissive for local dev)
    let cors_layer = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .merge(crate::coupons::routes())
        .layer(axum::middleware::from_fn(log_requests))
        .layer(cors_layer)
        .with_state(state)
}

/// Middleware: logs every request with its status and latency, and tags the
/// response with a request id.
async fn log_requests(req: Request<Body>, next: Next) -> Response {
    let request_id = Uuid::new_v4().simple().to_string();
    let method = req.method().clone();
    let uri = req.uri().clone();
    let started = Instant::now();

    let mut res = next.run(req).await;
    let status = res.status();
    let elapsed_ms = whole_millis(started.elapsed());

    if status.is_success() {
        info!(%request_id, %method, %uri, status = status.as_u16(), elapsed_ms, "request");
    } else {
        warn!(%request_id, %method, %uri, status = status.as_u16(), elapsed_ms, "request failed");
    }

    if let Ok(value) = HeaderValue::from_str(&request_id) {
        res.headers_mut()
            .insert(HeaderName::from_static(REQUEST_ID_HEADER), value);
    }
    res
}

/// Milliseconds in `elapsed`, saturating at `u64::MAX`.
fn whole_millis(elapsed: Duration) -> u64 {
    u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX)
}

/// Endpoint: GET /
async fn root() -> Json<Value> {
    Json(json!({
        "message": "Coupon Management API",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// Endpoint: GET /health
async fn health() -> Json<Value> {
    Json(json!({ "status": "healthy" }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn elapsed_millis_saturate() {
        assert_eq!(whole_millis(Duration::from_millis(1500)), 1500);
        assert_eq!(whole_millis(Duration::MAX), u64::MAX);
    }
}
