//! Coupon validity predicate

use crate::coupons::models::Coupon;
use chrono::{DateTime, Utc};

/// A coupon is usable when it is active, not past its expiry, and has uses
/// left under its repetition limit.
pub fn is_valid(coupon: &Coupon, now: DateTime<Utc>) -> bool {
    if !coupon.is_active {
        return false;
    }

    if coupon.expires_at.is_some_and(|expires_at| expires_at < now) {
        return false;
    }

    if coupon
        .repetition_limit
        .is_some_and(|limit| coupon.times_used >= limit)
    {
        return false;
    }

    true
}
