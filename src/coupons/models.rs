//! Coupon Domain Models
//!
//! This module contains the persistent coupon entity and the request and
//! response shapes of the coupon API.

use crate::engine::models::{
    BuyProduct, Cart, CouponDetails, CouponKind, DiscountResult, GetProduct, PricedCart,
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;

// =============================================================================
// Constants
// =============================================================================

/// Minimum length of a coupon code
pub const CODE_MIN_LEN: usize = 4;
/// Maximum length of a coupon code
pub const CODE_MAX_LEN: usize = 50;
/// Repetition limit stored for a BxGy coupon that does not specify one
pub const DEFAULT_REPETITION_LIMIT: u32 = 1;

// =============================================================================
// Coupon Entity
// =============================================================================

/// A stored discount coupon
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Coupon {
    pub id: u64,

    /// Unique, compared case-insensitively
    pub code: String,

    /// Variant tag and payload, flattened into `type` and `details`
    #[serde(flatten)]
    pub details: CouponDetails,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
    pub is_active: bool,

    /// Only ever set on BxGy coupons
    pub repetition_limit: Option<u32>,

    pub times_used: u32,
}

impl Coupon {
    pub fn kind(&self) -> CouponKind {
        self.details.kind()
    }

    /// Maximum number of BxGy sets credited per application.
    pub fn sets_cap(&self) -> u32 {
        self.repetition_limit.unwrap_or(DEFAULT_REPETITION_LIMIT)
    }
}

/// A coupon that has not been assigned an id yet
#[derive(Debug, Clone)]
pub struct NewCoupon {
    pub code: String,
    pub details: CouponDetails,
    pub expires_at: Option<DateTime<Utc>>,
    pub repetition_limit: Option<u32>,
}

// =============================================================================
// Request Models
// =============================================================================

/// Body of `POST /api/coupons`
#[derive(Debug, Deserialize)]
pub struct CouponCreate {
    pub code: String,

    #[serde(rename = "type")]
    pub kind: CouponKind,

    /// Parsed against `kind` by the service
    pub details: Value,

    pub expires_at: Option<DateTime<Utc>>,
}

/// Body of `PUT /api/coupons/{id}`; only supplied fields change
#[derive(Debug, Default, Deserialize)]
pub struct CouponUpdate {
    pub code: Option<String>,

    #[serde(rename = "type")]
    pub kind: Option<CouponKind>,

    pub details: Option<Value>,
    pub expires_at: Option<DateTime<Utc>>,
    pub is_active: Option<bool>,
}

/// BxGy details as submitted, still carrying the repetition limit
#[derive(Debug, Deserialize)]
pub struct BxGyDetailsInput {
    pub buy_products: Vec<BuyProduct>,
    pub get_products: Vec<GetProduct>,

    #[serde(default, alias = "repition_limit")]
    pub repetition_limit: Option<u32>,
}

/// Body of the preview and apply endpoints
#[derive(Debug, Deserialize)]
pub struct CartRequest {
    pub cart: Cart,
}

// =============================================================================
// Response Models
// =============================================================================

/// Response of `POST /api/applicable-coupons`
#[derive(Debug, Serialize)]
pub struct ApplicableCouponsResponse {
    pub applicable_coupons: Vec<DiscountResult>,
}

/// Response of `POST /api/apply-coupon/{id}`
#[derive(Debug, Serialize)]
pub struct ApplyCouponResponse {
    pub updated_cart: PricedCart,
}

/// Usage statistics; the usage fields are only present for BxGy coupons
#[derive(Debug, Serialize, PartialEq)]
pub struct CouponStats {
    pub coupon_id: u64,
    pub code: String,

    #[serde(rename = "type")]
    pub kind: CouponKind,

    pub is_active: bool,
    pub expires_at: Option<DateTime<Utc>>,

    #[serde(flatten)]
    pub usage: Option<UsageStats>,
}

/// Repetition usage of a BxGy coupon
#[derive(Debug, Serialize, PartialEq)]
pub struct UsageStats {
    pub times_used: u32,
    pub repetition_limit: u32,
    pub usage_percentage: Decimal,
    pub remaining_uses: u32,
    pub is_exhausted: bool,
}
