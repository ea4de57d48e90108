//! Cart Pricer
//!
//! Composes the evaluators into the two engine entry points: preview, which
//! reports the discount every usable coupon would yield, and apply, which
//! prices a cart against one coupon and returns the writes the caller must
//! commit alongside it.

use super::{
    error::EngineError,
    evaluators::{
        applicable_times, cart_wise_discount, count_buy_sets, evaluate, free_units_owed,
        resolve_get_price, value_of_units,
    },
    models::{
        round_money, AppliedCoupon, BxGyDetails, Cart, CartWiseDetails, CouponDetails,
        CouponMutation, DiscountResult, EngineOptions, PricedCart, PricedLine,
        ProductWiseDetails, SubtotalPolicy,
    },
    validity::is_valid,
};
use crate::coupons::models::Coupon;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::fmt;
use tracing::{debug, warn};

/// The cart total must fit in a `Decimal` with room for applying a
/// percentage to it.
pub fn ensure_priceable(cart: &Cart) -> Result<(), EngineError> {
    cart.checked_total()
        .and_then(|total| total.checked_mul(Decimal::ONE_HUNDRED))
        .map(|_| ())
        .ok_or(EngineError::Overflow)
}

// =============================================================================
// Preview
// =============================================================================

/// Discount of every valid coupon that yields something for `cart`, in the
/// order the coupons were given. A coupon whose discount cannot be valued is
/// left out. Mutates nothing.
pub fn evaluate_applicable(
    cart: &Cart,
    coupons: &[Coupon],
    now: DateTime<Utc>,
    options: &EngineOptions,
) -> Vec<DiscountResult> {
    if let Err(err) = ensure_priceable(cart) {
        warn!(error = %err, "cart cannot be priced");
        return Vec::new();
    }

    coupons
        .iter()
        .filter(|coupon| is_valid(coupon, now))
        .filter_map(|coupon| {
            let discount = match evaluate(cart, &coupon.details, coupon.sets_cap(), options) {
                Ok(discount) => discount,
                Err(err) => {
                    warn!(coupon_id = coupon.id, error = %err, "skipping coupon in preview");
                    return None;
                }
            };

            (discount > Decimal::ZERO).then(|| DiscountResult {
                coupon_id: coupon.id,
                kind: coupon.kind(),
                discount_amount: round_money(discount),
            })
        })
        .collect()
}

// =============================================================================
// Apply
// =============================================================================

/// Stages of a single apply
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyStage {
    Pending,
    Validated,
    Priced,
    Committed,
    Rejected,
}

impl fmt::Display for ApplyStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ApplyStage::Pending => "pending",
            ApplyStage::Validated => "validated",
            ApplyStage::Priced => "priced",
            ApplyStage::Committed => "committed",
            ApplyStage::Rejected => "rejected",
        };
        f.write_str(name)
    }
}

/// Unrounded line while pricing is in progress
#[derive(Debug, Clone)]
struct WorkingLine {
    product_id: u64,
    quantity: u32,
    price: Decimal,
    discount: Decimal,
}

impl WorkingLine {
    fn line_total(&self) -> Result<Decimal, EngineError> {
        value_of_units(self.price, self.quantity)
    }
}

fn checked_sum(
    amounts: impl IntoIterator<Item = Result<Decimal, EngineError>>,
) -> Result<Decimal, EngineError> {
    amounts.into_iter().try_fold(Decimal::ZERO, |total, amount| {
        total.checked_add(amount?).ok_or(EngineError::Overflow)
    })
}

/// Result of the pricing stage, before rounding
#[derive(Debug)]
struct Pricing {
    lines: Vec<WorkingLine>,
    total_discount: Decimal,
}

impl Pricing {
    fn undiscounted(cart: &Cart) -> Vec<WorkingLine> {
        cart.items
            .iter()
            .map(|line| WorkingLine {
                product_id: line.product_id,
                quantity: line.quantity,
                price: line.price,
                discount: Decimal::ZERO,
            })
            .collect()
    }

    /// Rounds everything once, on the way out. Line discounts are rounded for
    /// display only; the total is the unrounded sum rounded once, and the
    /// final total is derived from the two rounded figures so that
    /// `final_total == subtotal - total_discount` holds exactly.
    fn commit(self, original: &Cart, policy: SubtotalPolicy) -> Result<PricedCart, EngineError> {
        let subtotal = match policy {
            SubtotalPolicy::Original => original.checked_total().ok_or(EngineError::Overflow)?,
            SubtotalPolicy::PostFreeUnits => {
                checked_sum(self.lines.iter().map(WorkingLine::line_total))?
            }
        };

        let subtotal = round_money(subtotal);
        let total_discount = round_money(self.total_discount);

        Ok(PricedCart {
            items: self
                .lines
                .into_iter()
                .map(|line| PricedLine {
                    product_id: line.product_id,
                    quantity: line.quantity,
                    price: line.price,
                    line_discount: round_money(line.discount),
                })
                .collect(),
            subtotal,
            total_discount,
            final_total: subtotal - total_discount,
        })
    }
}

fn enter(coupon_id: u64, stage: ApplyStage) {
    debug!(coupon_id, stage = %stage, "apply stage");
}

/// Prices `cart` against a single coupon.
///
/// On success the returned mutations (the usage increment) must be committed
/// in the same transaction as the result. On error nothing is requested.
pub fn apply_coupon(
    cart: &Cart,
    coupon: &Coupon,
    now: DateTime<Utc>,
    options: &EngineOptions,
) -> Result<AppliedCoupon, EngineError> {
    enter(coupon.id, ApplyStage::Pending);

    if !is_valid(coupon, now) {
        enter(coupon.id, ApplyStage::Rejected);
        return Err(EngineError::InvalidCoupon);
    }

    ensure_priceable(cart).inspect_err(|_| enter(coupon.id, ApplyStage::Rejected))?;

    let mutations = vec![CouponMutation::IncrementTimesUsed {
        coupon_id: coupon.id,
    }];
    enter(coupon.id, ApplyStage::Validated);

    let pricing = match &coupon.details {
        CouponDetails::CartWise(details) => price_cart_wise(cart, details),
        CouponDetails::ProductWise(details) => price_product_wise(cart, details),
        CouponDetails::Bxgy(details) => price_bxgy(cart, details, coupon.sets_cap(), options),
    }
    .inspect_err(|_| enter(coupon.id, ApplyStage::Rejected))?;
    enter(coupon.id, ApplyStage::Priced);

    let priced = pricing
        .commit(cart, coupon.details.subtotal_policy())
        .inspect_err(|_| enter(coupon.id, ApplyStage::Rejected))?;
    enter(coupon.id, ApplyStage::Committed);

    Ok(AppliedCoupon {
        cart: priced,
        mutations,
    })
}

/// Spreads the cart-wise discount over the lines in proportion to each
/// line's share of the cart total.
fn price_cart_wise(cart: &Cart, details: &CartWiseDetails) -> Result<Pricing, EngineError> {
    let total_discount = cart_wise_discount(cart, details);
    if total_discount.is_zero() {
        return Err(EngineError::UnsatisfiedCondition {
            reason: format!("cart total is below the threshold of {}", details.threshold),
        });
    }

    let cart_total = cart.checked_total().ok_or(EngineError::Overflow)?;
    let mut lines = Pricing::undiscounted(cart);
    for line in &mut lines {
        line.discount = line.line_total()? / cart_total * total_discount;
    }

    Ok(Pricing {
        lines,
        total_discount,
    })
}

/// Discounts only the line holding the target product.
fn price_product_wise(cart: &Cart, details: &ProductWiseDetails) -> Result<Pricing, EngineError> {
    let Some(&position) = cart.positions().get(&details.product_id) else {
        return Err(EngineError::ProductNotInCart {
            product_id: details.product_id,
        });
    };

    let mut lines = Pricing::undiscounted(cart);
    let mut total_discount = Decimal::ZERO;
    if let Some(line) = lines.get_mut(position) {
        let Some(scaled) = line.line_total()?.checked_mul(details.discount) else {
            return Err(EngineError::Overflow);
        };
        line.discount = scaled / Decimal::ONE_HUNDRED;
        total_discount = line.discount;
    }

    Ok(Pricing {
        lines,
        total_discount,
    })
}

/// Adds every owed free unit to the cart, uncapped, creating lines for get
/// products that were not in the cart when a price can be resolved for them.
fn price_bxgy(
    cart: &Cart,
    details: &BxGyDetails,
    repetition_limit: u32,
    options: &EngineOptions,
) -> Result<Pricing, EngineError> {
    let total_buy_sets = count_buy_sets(&cart.lookup(), &details.buy_products);
    if total_buy_sets == 0 {
        return Err(EngineError::UnsatisfiedCondition {
            reason: "not enough buy products in cart".to_string(),
        });
    }

    let times = applicable_times(total_buy_sets, repetition_limit);
    let mut lines = Pricing::undiscounted(cart);
    let mut positions = cart.positions();

    for entry in &details.get_products {
        let owed = free_units_owed(entry, times)?;
        if owed == 0 {
            continue;
        }

        if let Some(line) = positions
            .get(&entry.product_id)
            .and_then(|&position| lines.get_mut(position))
        {
            let value = value_of_units(line.price, owed)?;
            let Some(quantity) = line.quantity.checked_add(owed) else {
                return Err(EngineError::Overflow);
            };
            let Some(discount) = line.discount.checked_add(value) else {
                return Err(EngineError::Overflow);
            };
            line.quantity = quantity;
            line.discount = discount;
            continue;
        }

        match resolve_get_price(entry, None, options.price_source) {
            Some(price) => {
                let discount = value_of_units(price, owed)?;
                positions.insert(entry.product_id, lines.len());
                lines.push(WorkingLine {
                    product_id: entry.product_id,
                    quantity: owed,
                    price,
                    discount,
                });
            }
            None => debug!(
                product_id = entry.product_id,
                "no price for free product outside the cart, skipping"
            ),
        }
    }

    let total_discount = checked_sum(lines.iter().map(|line| Ok(line.discount)))?;

    Ok(Pricing {
        lines,
        total_discount,
    })
}
