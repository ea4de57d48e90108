//! Discount Engine Models
//!
//! Value types consumed and produced by the discount engine: the cart, the
//! variant-specific coupon payloads, and the preview/apply results.

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::{collections::HashMap, fmt};

/// Number of decimal places carried by every emitted monetary value.
pub const DECIMAL_PLACES: u32 = 2;

/// Rounds an amount for output. Intermediate sums are never rounded.
pub fn round_money(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(DECIMAL_PLACES, RoundingStrategy::MidpointAwayFromZero)
}

// =============================================================================
// Cart
// =============================================================================

/// A single product line in the cart
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CartLine {
    /// Product identifier
    pub product_id: u64,

    /// Number of units on this line
    pub quantity: u32,

    /// Unit price
    pub price: Decimal,
}

impl CartLine {
    /// `price × quantity`
    pub fn line_total(&self) -> Decimal {
        self.price * Decimal::from(self.quantity)
    }

    /// [`CartLine::line_total`], or `None` when it does not fit in a `Decimal`.
    pub fn checked_line_total(&self) -> Option<Decimal> {
        self.price.checked_mul(Decimal::from(self.quantity))
    }
}

/// The shopping cart a coupon is evaluated against
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Cart {
    pub items: Vec<CartLine>,
}

impl Cart {
    pub fn new(items: Vec<CartLine>) -> Self {
        Self { items }
    }

    /// Sum of `price × quantity` over every line.
    pub fn total(&self) -> Decimal {
        self.items.iter().map(CartLine::line_total).sum()
    }

    /// [`Cart::total`] without the overflow panic.
    pub fn checked_total(&self) -> Option<Decimal> {
        self.items.iter().try_fold(Decimal::ZERO, |total, line| {
            total.checked_add(line.checked_line_total()?)
        })
    }

    /// Builds a product_id → line lookup. When a product appears on more than
    /// one line, the last one wins.
    pub fn lookup(&self) -> HashMap<u64, &CartLine> {
        self.items.iter().map(|line| (line.product_id, line)).collect()
    }

    /// Same as [`Cart::lookup`] but resolves to the line's position.
    pub fn positions(&self) -> HashMap<u64, usize> {
        self.items
            .iter()
            .enumerate()
            .map(|(index, line)| (line.product_id, index))
            .collect()
    }
}

// =============================================================================
// Coupon variants
// =============================================================================

/// Variant tag of a coupon
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CouponKind {
    CartWise,
    ProductWise,
    Bxgy,
}

impl fmt::Display for CouponKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CouponKind::CartWise => write!(f, "cart-wise"),
            CouponKind::ProductWise => write!(f, "product-wise"),
            CouponKind::Bxgy => write!(f, "bxgy"),
        }
    }
}

/// Whole-cart percentage discount once the cart total reaches a threshold
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CartWiseDetails {
    pub threshold: Decimal,

    /// Percentage in (0, 100]
    pub discount: Decimal,
}

/// Percentage discount on a single product line
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProductWiseDetails {
    pub product_id: u64,

    /// Percentage in (0, 100]
    pub discount: Decimal,
}

/// One qualifying product of a "buy" rule
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BuyProduct {
    pub product_id: u64,

    /// Units required for one set
    pub quantity: u32,
}

/// One free product of a "get" rule
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct GetProduct {
    pub product_id: u64,

    /// Free units granted per set
    pub quantity: u32,

    /// Price used when the product is not in the cart
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price: Option<Decimal>,
}

/// "Buy X get Y" payload. The repetition limit lives on the coupon itself.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BxGyDetails {
    pub buy_products: Vec<BuyProduct>,
    pub get_products: Vec<GetProduct>,
}

/// Variant tag plus its payload, serialized as `{"type": ..., "details": ...}`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", content = "details", rename_all = "kebab-case")]
pub enum CouponDetails {
    CartWise(CartWiseDetails),
    ProductWise(ProductWiseDetails),
    Bxgy(BxGyDetails),
}

impl CouponDetails {
    pub fn kind(&self) -> CouponKind {
        match self {
            CouponDetails::CartWise(_) => CouponKind::CartWise,
            CouponDetails::ProductWise(_) => CouponKind::ProductWise,
            CouponDetails::Bxgy(_) => CouponKind::Bxgy,
        }
    }

    /// Which cart the totals of an applied coupon are computed from.
    pub fn subtotal_policy(&self) -> SubtotalPolicy {
        match self {
            CouponDetails::CartWise(_) | CouponDetails::ProductWise(_) => SubtotalPolicy::Original,
            CouponDetails::Bxgy(_) => SubtotalPolicy::PostFreeUnits,
        }
    }
}

// =============================================================================
// Policies
// =============================================================================

/// Subtotal source for an applied cart
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubtotalPolicy {
    /// The cart as submitted
    Original,
    /// The cart after free units were added to it
    PostFreeUnits,
}

/// How a BxGy get-product is priced
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum GetPriceSource {
    /// Only products already in the cart can be valued; others are skipped.
    CartOnly,
    /// Cart price first, then the price given on the get-product entry.
    #[default]
    InlineFallback,
}

/// Knobs the engine reads; everything else is a pure function of the inputs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EngineOptions {
    pub price_source: GetPriceSource,
}

// =============================================================================
// Results
// =============================================================================

/// One entry of the preview response
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DiscountResult {
    pub coupon_id: u64,

    #[serde(rename = "type")]
    pub kind: CouponKind,

    #[serde(rename = "discount")]
    pub discount_amount: Decimal,
}

/// One line of an applied cart
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PricedLine {
    pub product_id: u64,

    /// Possibly increased by free units
    pub quantity: u32,

    pub price: Decimal,

    #[serde(rename = "total_discount")]
    pub line_discount: Decimal,
}

/// Fully priced cart returned by apply mode
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PricedCart {
    pub items: Vec<PricedLine>,

    #[serde(rename = "total_price")]
    pub subtotal: Decimal,

    pub total_discount: Decimal,

    #[serde(rename = "final_price")]
    pub final_total: Decimal,
}

/// A write the persistence layer must commit together with an applied cart
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CouponMutation {
    IncrementTimesUsed { coupon_id: u64 },
}

/// Successful outcome of apply mode
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppliedCoupon {
    pub cart: PricedCart,
    pub mutations: Vec<CouponMutation>,
}
