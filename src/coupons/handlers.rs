//! REST API handlers for coupon operations
//!
//! This module implements the HTTP endpoints for coupon management, the
//! applicable-coupons preview and coupon application.

use super::{models::*, service, state::SharedState};
use crate::error::CouponError;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;

/// Creates routes for coupon-related operations
pub fn routes() -> Router<SharedState> {
    Router::new()
        .route("/api/coupons", post(create_coupon).get(list_coupons))
        .route(
            "/api/coupons/:id",
            get(get_coupon).put(update_coupon).delete(delete_coupon),
        )
        .route("/api/coupons/code/:code", get(get_coupon_by_code))
        .route("/api/coupons/:id/stats", get(coupon_stats))
        .route("/api/applicable-coupons", post(applicable_coupons))
        .route("/api/apply-coupon/:id", post(apply_coupon))
}

/// Endpoint: POST /api/coupons
async fn create_coupon(
    State(state): State<SharedState>,
    Json(payload): Json<CouponCreate>,
) -> Result<(StatusCode, Json<Coupon>), CouponError> {
    let coupon = service::create_coupon(&state, payload, Utc::now())?;
    Ok((StatusCode::CREATED, Json(coupon)))
}

/// Endpoint: GET /api/coupons
async fn list_coupons(State(state): State<SharedState>) -> Json<Vec<Coupon>> {
    Json(service::list_coupons(&state))
}

/// Endpoint: GET /api/coupons/{id}
async fn get_coupon(
    State(state): State<SharedState>,
    Path(id): Path<u64>,
) -> Result<Json<Coupon>, CouponError> {
    service::get_coupon(&state, id).map(Json)
}

/// Endpoint: GET /api/coupons/code/{code}
/// Lookup is case-insensitive.
async fn get_coupon_by_code(
    State(state): State<SharedState>,
    Path(code): Path<String>,
) -> Result<Json<Coupon>, CouponError> {
    service::get_coupon_by_code(&state, &code).map(Json)
}

/// Endpoint: PUT /api/coupons/{id}
async fn update_coupon(
    State(state): State<SharedState>,
    Path(id): Path<u64>,
    Json(payload): Json<CouponUpdate>,
) -> Result<Json<Coupon>, CouponError> {
    service::update_coupon(&state, id, payload, Utc::now()).map(Json)
}

/// Endpoint: DELETE /api/coupons/{id}
async fn delete_coupon(
    State(state): State<SharedState>,
    Path(id): Path<u64>,
) -> Result<StatusCode, CouponError> {
    service::delete_coupon(&state, id)?;
    Ok(StatusCode::NO_CONTENT)
}

/// Endpoint: GET /api/coupons/{id}/stats
async fn coupon_stats(
    State(state): State<SharedState>,
    Path(id): Path<u64>,
) -> Result<Json<CouponStats>, CouponError> {
    service::coupon_stats(&state, id).map(Json)
}

/// Endpoint: POST /api/applicable-coupons
/// Reports the discount of every coupon that applies to the cart.
async fn applicable_coupons(
    State(state): State<SharedState>,
    Json(payload): Json<CartRequest>,
) -> Result<Json<ApplicableCouponsResponse>, CouponError> {
    let applicable_coupons = service::applicable_coupons(&state, &payload.cart, Utc::now())?;
    Ok(Json(ApplicableCouponsResponse { applicable_coupons }))
}

/// Endpoint: POST /api/apply-coupon/{id}
/// Returns the updated cart and counts one use of the coupon.
async fn apply_coupon(
    State(state): State<SharedState>,
    Path(id): Path<u64>,
    Json(payload): Json<CartRequest>,
) -> Result<Json<ApplyCouponResponse>, CouponError> {
    let updated_cart = service::apply_coupon(&state, id, &payload.cart, Utc::now())?;
    Ok(Json(ApplyCouponResponse { updated_cart }))
}
