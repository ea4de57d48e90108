//! Coupon Domain Module
//!
//! This module contains everything around the stored coupon, including:
//! - Domain models (Coupon, API inputs and responses)
//! - Input validation helpers
//! - In-memory persistence and application state
//! - Service operations and REST API handlers

pub mod handlers;
pub mod helpers;
pub mod models;
pub mod service;
pub mod state;

// Re-export commonly used types for convenience
pub use handlers::routes;
pub use state::{AppState, SharedState};
