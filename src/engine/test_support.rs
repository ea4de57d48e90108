//! Fixtures shared by the engine tests

use super::models::{
    BuyProduct, BxGyDetails, Cart, CartLine, CartWiseDetails, CouponDetails, GetProduct,
    ProductWiseDetails,
};
use crate::coupons::models::Coupon;
use chrono::{Duration, Utc};
use rust_decimal::Decimal;

/// Cart from `(product_id, quantity, whole-unit price)` triples.
pub fn cart(lines: &[(u64, u32, i64)]) -> Cart {
    Cart::new(
        lines
            .iter()
            .map(|&(product_id, quantity, price)| CartLine {
                product_id,
                quantity,
                price: Decimal::new(price, 0),
            })
            .collect(),
    )
}

fn coupon(id: u64, details: CouponDetails, repetition_limit: Option<u32>) -> Coupon {
    let now = Utc::now();
    Coupon {
        id,
        code: format!("TEST{id}"),
        details,
        created_at: now,
        updated_at: now,
        expires_at: Some(now + Duration::hours(24)),
        is_active: true,
        repetition_limit,
        times_used: 0,
    }
}

pub fn cart_wise_coupon(id: u64, threshold: i64, discount: i64) -> Coupon {
    coupon(
        id,
        CouponDetails::CartWise(CartWiseDetails {
            threshold: Decimal::new(threshold, 0),
            discount: Decimal::new(discount, 0),
        }),
        None,
    )
}

pub fn product_wise_coupon(id: u64, product_id: u64, discount: i64) -> Coupon {
    coupon(
        id,
        CouponDetails::ProductWise(ProductWiseDetails {
            product_id,
            discount: Decimal::new(discount, 0),
        }),
        None,
    )
}

/// Single buy rule and single get rule, each as `(product_id, quantity)`.
pub fn bxgy_coupon(id: u64, buy: (u64, u32), get: (u64, u32), repetition_limit: u32) -> Coupon {
    coupon(
        id,
        CouponDetails::Bxgy(BxGyDetails {
            buy_products: vec![BuyProduct {
                product_id: buy.0,
                quantity: buy.1,
            }],
            get_products: vec![GetProduct {
                product_id: get.0,
                quantity: get.1,
                price: None,
            }],
        }),
        Some(repetition_limit),
    )
}
