//! Coupon Service
//!
//! Business operations behind the coupon API. Every function takes the shared
//! state and, where time matters, the current instant so that tests can pin
//! it.

use super::{
    helpers::{
        default_expiry, parse_details, resolve_repetition_limit, usage_stats, validate_cart,
        validate_code,
    },
    models::{Coupon, CouponCreate, CouponStats, CouponUpdate, NewCoupon},
    state::AppState,
};
use crate::engine::{
    self,
    models::{Cart, CouponKind, DiscountResult, PricedCart},
};
use crate::error::CouponError;
use chrono::{DateTime, Utc};
use tracing::info;

/// Validates and stores a new coupon.
pub fn create_coupon(
    state: &AppState,
    input: CouponCreate,
    now: DateTime<Utc>,
) -> Result<Coupon, CouponError> {
    validate_code(&input.code)?;
    let parsed = parse_details(input.kind, input.details)?;

    let expires_at = match input.expires_at {
        Some(expires_at) => expires_at,
        None => default_expiry(now, state.config.coupons.default_expiry_hours)?,
    };

    let coupon = state.coupons.insert(
        NewCoupon {
            code: input.code,
            details: parsed.details,
            expires_at: Some(expires_at),
            repetition_limit: resolve_repetition_limit(input.kind, parsed.repetition_limit, None),
        },
        now,
    )?;

    info!(
        coupon_id = coupon.id,
        code = %coupon.code,
        variant = %coupon.kind(),
        "coupon created"
    );
    Ok(coupon)
}

pub fn list_coupons(state: &AppState) -> Vec<Coupon> {
    state.coupons.list_all()
}

pub fn get_coupon(state: &AppState, id: u64) -> Result<Coupon, CouponError> {
    state.coupons.find_by_id(id).ok_or(CouponError::NotFound)
}

pub fn get_coupon_by_code(state: &AppState, code: &str) -> Result<Coupon, CouponError> {
    state.coupons.find_by_code(code).ok_or(CouponError::NotFound)
}

/// Applies the supplied fields of `update`; everything else is left alone.
pub fn update_coupon(
    state: &AppState,
    id: u64,
    update: CouponUpdate,
    now: DateTime<Utc>,
) -> Result<Coupon, CouponError> {
    let coupon = state.coupons.update(id, |coupon| {
        if let Some(code) = update.code {
            validate_code(&code)?;
            coupon.code = code;
        }

        match (update.kind, update.details) {
            (Some(kind), None) if kind != coupon.kind() => {
                return Err(CouponError::Validation(
                    "details are required when changing the coupon type".to_string(),
                ));
            }
            (kind, Some(raw)) => {
                let kind = kind.unwrap_or_else(|| coupon.kind());
                let parsed = parse_details(kind, raw)?;
                let previous = match coupon.kind() {
                    CouponKind::Bxgy => coupon.repetition_limit,
                    CouponKind::CartWise | CouponKind::ProductWise => None,
                };

                coupon.repetition_limit =
                    resolve_repetition_limit(kind, parsed.repetition_limit, previous);
                coupon.details = parsed.details;
            }
            (_, None) => {}
        }

        if let Some(expires_at) = update.expires_at {
            coupon.expires_at = Some(expires_at);
        }
        if let Some(is_active) = update.is_active {
            coupon.is_active = is_active;
        }
        coupon.updated_at = now;
        Ok(())
    })?;

    info!(coupon_id = coupon.id, code = %coupon.code, "coupon updated");
    Ok(coupon)
}

pub fn delete_coupon(state: &AppState, id: u64) -> Result<(), CouponError> {
    let coupon = state.coupons.remove(id).ok_or(CouponError::NotFound)?;
    info!(coupon_id = coupon.id, code = %coupon.code, "coupon deleted");
    Ok(())
}

/// Preview: every usable coupon with a non-zero discount for `cart`.
pub fn applicable_coupons(
    state: &AppState,
    cart: &Cart,
    now: DateTime<Utc>,
) -> Result<Vec<DiscountResult>, CouponError> {
    validate_cart(cart)?;

    let coupons = state.coupons.list_all();
    let results =
        engine::evaluate_applicable(cart, &coupons, now, &state.config.engine_options());

    info!(
        cart_lines = cart.items.len(),
        coupons = coupons.len(),
        applicable = results.len(),
        "evaluated applicable coupons"
    );
    Ok(results)
}

/// Applies one coupon and records the use in the same critical section.
pub fn apply_coupon(
    state: &AppState,
    id: u64,
    cart: &Cart,
    now: DateTime<Utc>,
) -> Result<PricedCart, CouponError> {
    validate_cart(cart)?;
    let options = state.config.engine_options();

    let result = state.coupons.transact(id, |coupon| {
        let applied = engine::apply_coupon(cart, coupon, now, &options)?;
        Ok((applied.cart, applied.mutations))
    });

    match &result {
        Ok(priced) => info!(
            coupon_id = id,
            discount = %priced.total_discount,
            final_price = %priced.final_total,
            "coupon applied"
        ),
        Err(CouponError::Engine(err)) => {
            info!(coupon_id = id, kind = err.kind(), error = %err, "coupon rejected")
        }
        Err(err) => info!(coupon_id = id, error = %err, "coupon rejected"),
    }

    result
}

pub fn coupon_stats(state: &AppState, id: u64) -> Result<CouponStats, CouponError> {
    let coupon = get_coupon(state, id)?;

    Ok(CouponStats {
        coupon_id: coupon.id,
        usage: usage_stats(&coupon),
        kind: coupon.kind(),
        is_active: coupon.is_active,
        expires_at: coupon.expires_at,
        code: coupon.code,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use crate::engine::{models::CouponDetails, EngineError};
    use chrono::Duration;
    use rust_decimal::Decimal;
    use serde_json::json;

    fn create(state: &AppState, code: &str, kind: CouponKind, details: serde_json::Value) -> Coupon {
        create_coupon(
            state,
            CouponCreate {
                code: code.to_string(),
                kind,
                details,
                expires_at: None,
            },
            Utc::now(),
        )
        .expect("coupon is valid")
    }

    fn cart(value: serde_json::Value) -> Cart {
        serde_json::from_value(json!({ "items": value })).expect("cart shape")
    }

    #[test]
    fn create_defaults_expiry_and_limit() {
        let state = AppState::default();
        let now = Utc::now();
        let coupon = create_coupon(
            &state,
            CouponCreate {
                code: "BUY2GET1".to_string(),
                kind: CouponKind::Bxgy,
                details: json!({
                    "buy_products": [{ "product_id": 1, "quantity": 2 }],
                    "get_products": [{ "product_id": 3, "quantity": 1 }]
                }),
                expires_at: None,
            },
            now,
        )
        .expect("coupon is valid");

        assert_eq!(coupon.expires_at, Some(now + Duration::hours(24)));
        assert_eq!(coupon.repetition_limit, Some(1));
        assert_eq!(coupon.times_used, 0);
        assert!(coupon.is_active);
    }

    #[test]
    fn unrepresentable_default_expiry_is_an_error() {
        let mut config = AppConfig::default();
        config.coupons.default_expiry_hours = 9_000_000_000_000;
        let state = AppState::new(config);

        let err = create_coupon(
            &state,
            CouponCreate {
                code: "CART10".to_string(),
                kind: CouponKind::CartWise,
                details: json!({ "threshold": 100, "discount": 10 }),
                expires_at: None,
            },
            Utc::now(),
        )
        .unwrap_err();

        assert!(matches!(err, CouponError::Validation(_)));
        assert!(list_coupons(&state).is_empty());
    }

    #[test]
    fn non_bxgy_coupons_never_store_a_limit() {
        let state = AppState::default();
        let coupon = create(
            &state,
            "CART10",
            CouponKind::CartWise,
            json!({ "threshold": 100, "discount": 10, "repetition_limit": 3 }),
        );
        assert_eq!(coupon.repetition_limit, None);
    }

    #[test]
    fn update_changes_only_supplied_fields() {
        let state = AppState::default();
        let coupon = create(
            &state,
            "CART10",
            CouponKind::CartWise,
            json!({ "threshold": 100, "discount": 10 }),
        );

        let updated = update_coupon(
            &state,
            coupon.id,
            CouponUpdate {
                is_active: Some(false),
                ..CouponUpdate::default()
            },
            Utc::now(),
        )
        .expect("update");

        assert!(!updated.is_active);
        assert_eq!(updated.code, coupon.code);
        assert_eq!(updated.details, coupon.details);
        assert_eq!(updated.expires_at, coupon.expires_at);
    }

    #[test]
    fn update_type_requires_details() {
        let state = AppState::default();
        let coupon = create(
            &state,
            "CART10",
            CouponKind::CartWise,
            json!({ "threshold": 100, "discount": 10 }),
        );

        let err = update_coupon(
            &state,
            coupon.id,
            CouponUpdate {
                kind: Some(CouponKind::ProductWise),
                ..CouponUpdate::default()
            },
            Utc::now(),
        )
        .unwrap_err();
        assert!(matches!(err, CouponError::Validation(_)));

        let updated = update_coupon(
            &state,
            coupon.id,
            CouponUpdate {
                kind: Some(CouponKind::Bxgy),
                details: Some(json!({
                    "buy_products": [{ "product_id": 1, "quantity": 2 }],
                    "get_products": [{ "product_id": 3, "quantity": 1 }],
                    "repition_limit": 3
                })),
                ..CouponUpdate::default()
            },
            Utc::now(),
        )
        .expect("update");
        assert!(matches!(updated.details, CouponDetails::Bxgy(_)));
        assert_eq!(updated.repetition_limit, Some(3));
    }

    #[test]
    fn update_rejects_duplicate_code() {
        let state = AppState::default();
        create(
            &state,
            "CART10",
            CouponKind::CartWise,
            json!({ "threshold": 100, "discount": 10 }),
        );
        let other = create(
            &state,
            "CART20",
            CouponKind::CartWise,
            json!({ "threshold": 100, "discount": 20 }),
        );

        let err = update_coupon(
            &state,
            other.id,
            CouponUpdate {
                code: Some("cart10".to_string()),
                ..CouponUpdate::default()
            },
            Utc::now(),
        )
        .unwrap_err();
        assert_eq!(err, CouponError::DuplicateCode("cart10".to_string()));
    }

    #[test]
    fn apply_increments_usage_once_per_success() {
        let state = AppState::default();
        let coupon = create(
            &state,
            "BUY2GET1",
            CouponKind::Bxgy,
            json!({
                "buy_products": [{ "product_id": 1, "quantity": 2 }],
                "get_products": [{ "product_id": 3, "quantity": 1 }],
                "repetition_limit": 2
            }),
        );
        let cart = cart(json!([
            { "product_id": 1, "quantity": 2, "price": 50 },
            { "product_id": 3, "quantity": 1, "price": 25 }
        ]));

        let priced = apply_coupon(&state, coupon.id, &cart, Utc::now()).expect("apply");
        assert_eq!(priced.total_discount, Decimal::new(25, 0));
        assert_eq!(get_coupon(&state, coupon.id).map(|c| c.times_used), Ok(1));

        apply_coupon(&state, coupon.id, &cart, Utc::now()).expect("second apply");
        assert_eq!(get_coupon(&state, coupon.id).map(|c| c.times_used), Ok(2));

        let err = apply_coupon(&state, coupon.id, &cart, Utc::now()).unwrap_err();
        assert_eq!(err, CouponError::Engine(EngineError::InvalidCoupon));
        assert_eq!(get_coupon(&state, coupon.id).map(|c| c.times_used), Ok(2));
    }

    #[test]
    fn concurrent_applies_stop_at_repetition_limit() {
        let state = AppState::default();
        let coupon = create(
            &state,
            "BUY2GET1",
            CouponKind::Bxgy,
            json!({
                "buy_products": [{ "product_id": 1, "quantity": 2 }],
                "get_products": [{ "product_id": 3, "quantity": 1 }],
                "repetition_limit": 5
            }),
        );
        let cart = cart(json!([
            { "product_id": 1, "quantity": 2, "price": 50 },
            { "product_id": 3, "quantity": 1, "price": 25 }
        ]));

        let (shared, cart, id) = (&state, &cart, coupon.id);
        let successes = std::thread::scope(|scope| {
            let handles: Vec<_> = (0..64)
                .map(move |_| {
                    scope.spawn(move || apply_coupon(shared, id, cart, Utc::now()).is_ok())
                })
                .collect();
            handles
                .into_iter()
                .map(|handle| handle.join().expect("apply thread"))
                .filter(|applied| *applied)
                .count()
        });

        assert_eq!(successes, 5);
        assert_eq!(get_coupon(&state, id).map(|c| c.times_used), Ok(5));
    }

    #[test]
    fn rejected_apply_leaves_usage_untouched() {
        let state = AppState::default();
        let coupon = create(
            &state,
            "CART10",
            CouponKind::CartWise,
            json!({ "threshold": 100, "discount": 10 }),
        );
        let cart = cart(json!([{ "product_id": 1, "quantity": 1, "price": 50 }]));

        let err = apply_coupon(&state, coupon.id, &cart, Utc::now()).unwrap_err();
        assert!(matches!(
            err,
            CouponError::Engine(EngineError::UnsatisfiedCondition { .. })
        ));
        assert_eq!(get_coupon(&state, coupon.id).map(|c| c.times_used), Ok(0));
    }

    #[test]
    fn apply_unknown_coupon_is_not_found() {
        let state = AppState::default();
        let cart = cart(json!([{ "product_id": 1, "quantity": 1, "price": 50 }]));
        assert_eq!(
            apply_coupon(&state, 42, &cart, Utc::now()).unwrap_err(),
            CouponError::NotFound
        );
    }

    #[test]
    fn stats_report_usage_for_bxgy_only() {
        let state = AppState::default();
        let cart_wise = create(
            &state,
            "CART10",
            CouponKind::CartWise,
            json!({ "threshold": 100, "discount": 10 }),
        );
        let bxgy = create(
            &state,
            "BUY2GET1",
            CouponKind::Bxgy,
            json!({
                "buy_products": [{ "product_id": 1, "quantity": 2 }],
                "get_products": [{ "product_id": 3, "quantity": 1 }],
                "repetition_limit": 3
            }),
        );
        state.coupons.persist_times_used_increment(bxgy.id);

        assert!(coupon_stats(&state, cart_wise.id)
            .expect("stats")
            .usage
            .is_none());

        let usage = coupon_stats(&state, bxgy.id)
            .expect("stats")
            .usage
            .expect("bxgy usage");
        assert_eq!(usage.times_used, 1);
        assert_eq!(usage.remaining_uses, 2);
        assert_eq!(usage.usage_percentage, Decimal::new(3333, 2));
        assert!(!usage.is_exhausted);
    }

    #[test]
    fn delete_then_lookup_is_not_found() {
        let state = AppState::default();
        let coupon = create(
            &state,
            "CART10",
            CouponKind::CartWise,
            json!({ "threshold": 100, "discount": 10 }),
        );

        delete_coupon(&state, coupon.id).expect("delete");
        assert_eq!(get_coupon(&state, coupon.id), Err(CouponError::NotFound));
        assert_eq!(delete_coupon(&state, coupon.id), Err(CouponError::NotFound));
    }
}
