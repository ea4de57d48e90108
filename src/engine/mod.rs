//! Discount Engine
//!
//! Pure discount evaluation over a cart and coupon definitions:
//! - Validity predicate
//! - Cart-wise, product-wise and BxGy evaluators
//! - Cart pricer for preview and apply modes
//!
//! The engine performs no I/O. Apply mode reports the writes it needs as
//! [`models::CouponMutation`] values for the persistence layer to commit.

pub mod error;
pub mod evaluators;
pub mod models;
pub mod pricer;
pub mod validity;

#[cfg(test)]
pub(crate) mod test_support;

// Re-export the entry points used by the service layer
pub use error::EngineError;
pub use models::{EngineOptions, GetPriceSource};
pub use pricer::{apply_coupon, evaluate_applicable};
pub use validity::is_valid;
