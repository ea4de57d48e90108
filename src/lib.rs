//! Coupon Service Library
//!
//! This library provides a coupon-management backend: coupon storage and a
//! discount engine that validates coupons against a cart and prices them.

// Domain modules
pub mod coupons;
pub mod engine;

// Infrastructure
pub mod config;
pub mod error;
pub mod router;
