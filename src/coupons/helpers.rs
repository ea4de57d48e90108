//! Coupon Input Helpers
//!
//! Validation of coupon codes, variant payloads and carts arriving over the
//! API, plus small derivations shared by the service.

use super::models::{
    BxGyDetailsInput, Coupon, UsageStats, CODE_MAX_LEN, CODE_MIN_LEN, DEFAULT_REPETITION_LIMIT,
};
use crate::engine::models::{
    round_money, BxGyDetails, Cart, CartWiseDetails, CouponDetails, CouponKind,
    ProductWiseDetails,
};
use crate::engine::pricer::ensure_priceable;
use crate::error::CouponError;
use chrono::{DateTime, TimeDelta, Utc};
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use serde_json::Value;

/// Variant payload parsed from raw JSON
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedDetails {
    pub details: CouponDetails,

    /// Limit found in BxGy details, if any
    pub repetition_limit: Option<u32>,
}

fn invalid(message: impl Into<String>) -> CouponError {
    CouponError::Validation(message.into())
}

/// Codes are 4–50 ASCII letters or digits.
pub fn validate_code(code: &str) -> Result<(), CouponError> {
    let len = code.chars().count();
    if !(CODE_MIN_LEN..=CODE_MAX_LEN).contains(&len) {
        return Err(invalid(format!(
            "Coupon code must be between {CODE_MIN_LEN} and {CODE_MAX_LEN} characters"
        )));
    }

    if !code.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Err(invalid(
            "Coupon code must be alphanumeric (letters and numbers only)",
        ));
    }

    Ok(())
}

/// Case-insensitive code comparison
pub fn codes_match(a: &str, b: &str) -> bool {
    a.eq_ignore_ascii_case(b)
}

fn decode<T: DeserializeOwned>(kind: CouponKind, raw: Value) -> Result<T, CouponError> {
    serde_json::from_value(raw).map_err(|e| invalid(format!("Invalid {kind} details: {e}")))
}

fn validate_percent(discount: Decimal) -> Result<(), CouponError> {
    if discount <= Decimal::ZERO || discount > Decimal::ONE_HUNDRED {
        return Err(invalid("discount must be greater than 0 and at most 100"));
    }
    Ok(())
}

fn validate_product_id(product_id: u64) -> Result<(), CouponError> {
    if product_id == 0 {
        return Err(invalid("product_id must be greater than 0"));
    }
    Ok(())
}

fn validate_quantity(quantity: u32) -> Result<(), CouponError> {
    if quantity == 0 {
        return Err(invalid("quantity must be greater than 0"));
    }
    Ok(())
}

/// Parses and validates a variant payload for `kind`.
pub fn parse_details(kind: CouponKind, raw: Value) -> Result<ParsedDetails, CouponError> {
    match kind {
        CouponKind::CartWise => {
            let details: CartWiseDetails = decode(kind, raw)?;
            if details.threshold <= Decimal::ZERO {
                return Err(invalid("threshold must be greater than 0"));
            }
            validate_percent(details.discount)?;

            Ok(ParsedDetails {
                details: CouponDetails::CartWise(details),
                repetition_limit: None,
            })
        }
        CouponKind::ProductWise => {
            let details: ProductWiseDetails = decode(kind, raw)?;
            validate_product_id(details.product_id)?;
            validate_percent(details.discount)?;

            Ok(ParsedDetails {
                details: CouponDetails::ProductWise(details),
                repetition_limit: None,
            })
        }
        CouponKind::Bxgy => {
            let input: BxGyDetailsInput = decode(kind, raw)?;
            if input.buy_products.is_empty() || input.get_products.is_empty() {
                return Err(invalid(
                    "bxgy coupons need at least one buy product and one get product",
                ));
            }
            for rule in &input.buy_products {
                validate_product_id(rule.product_id)?;
                validate_quantity(rule.quantity)?;
            }
            for rule in &input.get_products {
                validate_product_id(rule.product_id)?;
                validate_quantity(rule.quantity)?;
                if rule.price.is_some_and(|price| price <= Decimal::ZERO) {
                    return Err(invalid("get product price must be greater than 0"));
                }
            }
            if input.repetition_limit == Some(0) {
                return Err(invalid("repetition_limit must be at least 1"));
            }

            Ok(ParsedDetails {
                details: CouponDetails::Bxgy(BxGyDetails {
                    buy_products: input.buy_products,
                    get_products: input.get_products,
                }),
                repetition_limit: input.repetition_limit,
            })
        }
    }
}

/// Repetition limit to store: BxGy keeps the new value, else the previous
/// one, else the default. Other variants never carry one.
pub fn resolve_repetition_limit(
    kind: CouponKind,
    supplied: Option<u32>,
    previous: Option<u32>,
) -> Option<u32> {
    match kind {
        CouponKind::Bxgy => Some(supplied.or(previous).unwrap_or(DEFAULT_REPETITION_LIMIT)),
        CouponKind::CartWise | CouponKind::ProductWise => None,
    }
}

/// Every line needs a positive product id, quantity and price. Line totals
/// and the cart total must fit in a `Decimal` with room left for applying a
/// percentage to them.
pub fn validate_cart(cart: &Cart) -> Result<(), CouponError> {
    for line in &cart.items {
        validate_product_id(line.product_id)?;
        validate_quantity(line.quantity)?;
        if line.price <= Decimal::ZERO {
            return Err(invalid("price must be greater than 0"));
        }
        if line.checked_line_total().is_none() {
            return Err(invalid(format!(
                "line total for product {} is too large",
                line.product_id
            )));
        }
    }

    ensure_priceable(cart).map_err(|_| invalid("cart total is too large"))
}

/// Expiry given to coupons created without one.
pub fn default_expiry(now: DateTime<Utc>, hours: i64) -> Result<DateTime<Utc>, CouponError> {
    TimeDelta::try_hours(hours)
        .and_then(|delta| now.checked_add_signed(delta))
        .ok_or_else(|| invalid(format!("default expiry of {hours} hours is out of range")))
}

/// Usage figures reported for BxGy coupons.
pub fn usage_stats(coupon: &Coupon) -> Option<UsageStats> {
    if coupon.kind() != CouponKind::Bxgy {
        return None;
    }

    let limit = coupon.sets_cap();
    let percentage = Decimal::from(coupon.times_used) / Decimal::from(limit) * Decimal::ONE_HUNDRED;

    Some(UsageStats {
        times_used: coupon.times_used,
        repetition_limit: limit,
        usage_percentage: round_money(percentage),
        remaining_uses: limit.saturating_sub(coupon.times_used),
        is_exhausted: coupon.times_used >= limit,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn code_length_and_charset() {
        assert!(validate_code("SAVE10").is_ok());
        assert!(validate_code("abc").is_err());
        assert!(validate_code(&"A".repeat(51)).is_err());
        assert!(validate_code(&"A".repeat(50)).is_ok());
        assert!(validate_code("SAVE-10").is_err());
        assert!(validate_code("SAVE 10").is_err());
    }

    #[test]
    fn codes_compare_case_insensitively() {
        assert!(codes_match("Save10", "SAVE10"));
        assert!(!codes_match("SAVE10", "SAVE11"));
    }

    #[test]
    fn cart_wise_details_are_bounded() {
        let parsed = parse_details(
            CouponKind::CartWise,
            json!({ "threshold": 100, "discount": 10 }),
        )
        .expect("valid details");
        assert_eq!(parsed.details.kind(), CouponKind::CartWise);
        assert_eq!(parsed.repetition_limit, None);

        assert!(parse_details(
            CouponKind::CartWise,
            json!({ "threshold": 0, "discount": 10 })
        )
        .is_err());
        assert!(parse_details(
            CouponKind::CartWise,
            json!({ "threshold": 100, "discount": 100.5 })
        )
        .is_err());
    }

    #[test]
    fn product_wise_details_require_product() {
        assert!(parse_details(
            CouponKind::ProductWise,
            json!({ "product_id": 0, "discount": 10 })
        )
        .is_err());
        assert!(parse_details(CouponKind::ProductWise, json!({ "discount": 10 })).is_err());
    }

    #[test]
    fn bxgy_details_accept_legacy_limit_spelling() {
        let parsed = parse_details(
            CouponKind::Bxgy,
            json!({
                "buy_products": [{ "product_id": 1, "quantity": 2 }],
                "get_products": [{ "product_id": 3, "quantity": 1, "price": 25.5 }],
                "repition_limit": 4
            }),
        )
        .expect("valid details");

        assert_eq!(parsed.repetition_limit, Some(4));
        let CouponDetails::Bxgy(details) = parsed.details else {
            panic!("expected bxgy details");
        };
        assert_eq!(details.get_products[0].price, Some(Decimal::new(255, 1)));
    }

    #[test]
    fn bxgy_details_reject_zero_limit_and_empty_rules() {
        assert!(parse_details(
            CouponKind::Bxgy,
            json!({
                "buy_products": [{ "product_id": 1, "quantity": 2 }],
                "get_products": [{ "product_id": 3, "quantity": 1 }],
                "repetition_limit": 0
            }),
        )
        .is_err());
        assert!(parse_details(
            CouponKind::Bxgy,
            json!({ "buy_products": [], "get_products": [{ "product_id": 3, "quantity": 1 }] }),
        )
        .is_err());
    }

    #[test]
    fn repetition_limit_only_survives_on_bxgy() {
        assert_eq!(
            resolve_repetition_limit(CouponKind::Bxgy, None, None),
            Some(DEFAULT_REPETITION_LIMIT)
        );
        assert_eq!(
            resolve_repetition_limit(CouponKind::Bxgy, None, Some(5)),
            Some(5)
        );
        assert_eq!(
            resolve_repetition_limit(CouponKind::Bxgy, Some(2), Some(5)),
            Some(2)
        );
        assert_eq!(
            resolve_repetition_limit(CouponKind::CartWise, Some(2), Some(5)),
            None
        );
    }

    #[test]
    fn cart_lines_must_be_positive() {
        let cart: Cart = serde_json::from_value(json!({
            "items": [{ "product_id": 1, "quantity": 0, "price": 10 }]
        }))
        .expect("cart shape");
        assert!(validate_cart(&cart).is_err());

        let cart: Cart = serde_json::from_value(json!({
            "items": [{ "product_id": 1, "quantity": 1, "price": 10 }]
        }))
        .expect("cart shape");
        assert!(validate_cart(&cart).is_ok());
    }

    #[test]
    fn cart_totals_must_fit() {
        let cart: Cart = serde_json::from_value(json!({
            "items": [{ "product_id": 1, "quantity": 4_000_000_000u32, "price": 1e20 }]
        }))
        .expect("cart shape");
        assert!(matches!(
            validate_cart(&cart),
            Err(CouponError::Validation(message)) if message.contains("too large")
        ));

        let line = json!({ "product_id": 1, "quantity": 1, "price": 1e27 });
        let cart: Cart = serde_json::from_value(json!({ "items": [line] })).expect("cart shape");
        assert!(validate_cart(&cart).is_err());
    }

    #[test]
    fn default_expiry_is_checked() {
        let now = Utc::now();
        assert_eq!(default_expiry(now, 24), Ok(now + TimeDelta::hours(24)));
        assert!(default_expiry(now, 9_000_000_000_000).is_err());
        assert!(default_expiry(now, 2_000_000_000_000).is_err());
    }
}
