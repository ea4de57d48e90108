//! Service errors and their HTTP mapping

use crate::engine::EngineError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CouponError {
    #[error("Coupon not found")]
    NotFound,

    #[error("Coupon code '{0}' already exists")]
    DuplicateCode(String),

    #[error("{0}")]
    Validation(String),

    #[error(transparent)]
    Engine(#[from] EngineError),
}

/// Error body, `{"detail": "..."}`
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub detail: String,
}

impl CouponError {
    pub fn status(&self) -> StatusCode {
        match self {
            CouponError::NotFound => StatusCode::NOT_FOUND,
            CouponError::DuplicateCode(_) => StatusCode::CONFLICT,
            CouponError::Validation(_) | CouponError::Engine(EngineError::Overflow) => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            CouponError::Engine(_) => StatusCode::BAD_REQUEST,
        }
    }
}

impl IntoResponse for CouponError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = ErrorResponse {
            detail: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}
