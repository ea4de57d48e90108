use thiserror::Error;

/// Deterministic rejections produced while applying a coupon
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum EngineError {
    #[error("coupon is not valid or has expired")]
    InvalidCoupon,

    #[error("cart does not meet coupon conditions: {reason}")]
    UnsatisfiedCondition { reason: String },

    #[error("product {product_id} not found in cart")]
    ProductNotInCart { product_id: u64 },

    #[error("cart amounts exceed the supported range")]
    Overflow,
}

impl EngineError {
    /// Short machine-friendly label used in logs
    pub fn kind(&self) -> &'static str {
        match self {
            EngineError::InvalidCoupon => "invalid_coupon",
            EngineError::UnsatisfiedCondition { .. } => "unsatisfied_condition",
            EngineError::ProductNotInCart { .. } => "product_not_in_cart",
            EngineError::Overflow => "overflow",
        }
    }
}
