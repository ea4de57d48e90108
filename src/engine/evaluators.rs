//! Per-variant discount evaluators
//!
//! Each evaluator is a pure function of the cart and the variant payload and
//! returns the unrounded discount a coupon would yield in preview mode.

use super::error::EngineError;
use super::models::{
    BuyProduct, BxGyDetails, Cart, CartLine, CartWiseDetails, CouponDetails, EngineOptions,
    GetPriceSource, GetProduct, ProductWiseDetails,
};
use rust_decimal::Decimal;
use std::collections::HashMap;

/// Percentages are stored as whole numbers in (0, 100].
fn percent_of(amount: Decimal, percent: Decimal) -> Decimal {
    amount * percent / Decimal::ONE_HUNDRED
}

/// Dispatches on the coupon variant.
///
/// Cart-wise and product-wise amounts never exceed the cart total, which
/// [`ensure_priceable`](super::pricer::ensure_priceable) bounds; only BxGy can
/// value units outside the cart.
pub fn evaluate(
    cart: &Cart,
    details: &CouponDetails,
    repetition_limit: u32,
    options: &EngineOptions,
) -> Result<Decimal, EngineError> {
    match details {
        CouponDetails::CartWise(d) => Ok(cart_wise_discount(cart, d)),
        CouponDetails::ProductWise(d) => Ok(product_wise_discount(cart, d)),
        CouponDetails::Bxgy(d) => bxgy_discount(cart, d, repetition_limit, options),
    }
}

/// Whole-cart percentage once `cart_total >= threshold`, otherwise zero.
pub fn cart_wise_discount(cart: &Cart, details: &CartWiseDetails) -> Decimal {
    let cart_total = cart.total();

    if cart_total >= details.threshold {
        percent_of(cart_total, details.discount)
    } else {
        Decimal::ZERO
    }
}

/// Percentage of the matching line's total, or zero when the product is absent.
pub fn product_wise_discount(cart: &Cart, details: &ProductWiseDetails) -> Decimal {
    cart.lookup()
        .get(&details.product_id)
        .map_or(Decimal::ZERO, |line| {
            percent_of(line.line_total(), details.discount)
        })
}

/// Counts complete buy sets. Every qualifying product contributes its own
/// sets independently (OR aggregation); nothing is combined across products.
pub fn count_buy_sets(lookup: &HashMap<u64, &CartLine>, buy_products: &[BuyProduct]) -> u32 {
    buy_products
        .iter()
        .filter(|rule| rule.quantity > 0)
        .filter_map(|rule| {
            lookup
                .get(&rule.product_id)
                .map(|line| line.quantity / rule.quantity)
        })
        .fold(0u32, u32::saturating_add)
}

/// Number of times the get rules are credited.
pub fn applicable_times(total_buy_sets: u32, repetition_limit: u32) -> u32 {
    total_buy_sets.min(repetition_limit.max(1))
}

/// Free units owed for one get-product entry.
pub fn free_units_owed(entry: &GetProduct, times: u32) -> Result<u32, EngineError> {
    entry
        .quantity
        .checked_mul(times)
        .ok_or(EngineError::Overflow)
}

/// Unit price of a get-product: the cart line's price when present, else the
/// inline price if the options allow it.
pub fn resolve_get_price(
    entry: &GetProduct,
    line: Option<&CartLine>,
    source: GetPriceSource,
) -> Option<Decimal> {
    match (line, source) {
        (Some(line), _) => Some(line.price),
        (None, GetPriceSource::InlineFallback) => entry.price,
        (None, GetPriceSource::CartOnly) => None,
    }
}

/// Value of `units` at `price`, failing instead of overflowing.
pub fn value_of_units(price: Decimal, units: u32) -> Result<Decimal, EngineError> {
    price
        .checked_mul(Decimal::from(units))
        .ok_or(EngineError::Overflow)
}

/// Value of the free units a BxGy coupon grants. Free units of products
/// already in the cart are capped at the quantity on that line.
pub fn bxgy_discount(
    cart: &Cart,
    details: &BxGyDetails,
    repetition_limit: u32,
    options: &EngineOptions,
) -> Result<Decimal, EngineError> {
    let lookup = cart.lookup();

    let total_buy_sets = count_buy_sets(&lookup, &details.buy_products);
    if total_buy_sets == 0 {
        return Ok(Decimal::ZERO);
    }

    let times = applicable_times(total_buy_sets, repetition_limit);

    details
        .get_products
        .iter()
        .try_fold(Decimal::ZERO, |total, entry| {
            let line = lookup.get(&entry.product_id).copied();
            let owed = free_units_owed(entry, times)?;
            let credited = line.map_or(owed, |line| owed.min(line.quantity));

            let Some(price) = resolve_get_price(entry, line, options.price_source) else {
                return Ok(total);
            };
            total
                .checked_add(value_of_units(price, credited)?)
                .ok_or(EngineError::Overflow)
        })
}
