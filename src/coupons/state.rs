//! Coupon State Management
//!
//! In-memory persistence for coupons and the shared application state that
//! the HTTP handlers receive.

use super::{
    helpers::codes_match,
    models::{Coupon, NewCoupon},
};
use crate::config::AppConfig;
use crate::engine::models::CouponMutation;
use crate::error::CouponError;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc, Mutex, PoisonError,
};

// =============================================================================
// Coupon Store
// =============================================================================

/// Coupon storage keyed by id.
///
/// DashMap allows concurrent access without an external Mutex; writes that
/// touch code uniqueness are additionally serialized by `code_guard`.
#[derive(Debug, Default)]
pub struct CouponStore {
    coupons: DashMap<u64, Coupon>,
    next_id: AtomicU64,
    code_guard: Mutex<()>,
}

impl CouponStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn code_taken(&self, code: &str, except: Option<u64>) -> bool {
        self.coupons
            .iter()
            .any(|entry| Some(*entry.key()) != except && codes_match(&entry.code, code))
    }

    /// Stores a new coupon under the next id.
    pub fn insert(&self, new: NewCoupon, now: DateTime<Utc>) -> Result<Coupon, CouponError> {
        let _guard = self.code_guard.lock().unwrap_or_else(PoisonError::into_inner);

        if self.code_taken(&new.code, None) {
            return Err(CouponError::DuplicateCode(new.code));
        }

        let id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        let coupon = Coupon {
            id,
            code: new.code,
            details: new.details,
            created_at: now,
            updated_at: now,
            expires_at: new.expires_at,
            is_active: true,
            repetition_limit: new.repetition_limit,
            times_used: 0,
        };

        self.coupons.insert(id, coupon.clone());
        Ok(coupon)
    }

    pub fn find_by_id(&self, id: u64) -> Option<Coupon> {
        self.coupons.get(&id).map(|entry| entry.value().clone())
    }

    /// Case-insensitive lookup by code
    pub fn find_by_code(&self, code: &str) -> Option<Coupon> {
        self.coupons
            .iter()
            .find(|entry| codes_match(&entry.code, code))
            .map(|entry| entry.value().clone())
    }

    /// All coupons in storage order (ascending id).
    pub fn list_all(&self) -> Vec<Coupon> {
        let mut coupons: Vec<Coupon> = self
            .coupons
            .iter()
            .map(|entry| entry.value().clone())
            .collect();
        coupons.sort_by_key(|coupon| coupon.id);
        coupons
    }

    /// Read-modify-write of a stored coupon, keeping codes unique.
    ///
    /// `edit` works on a copy; nothing is stored when it fails. Updates are
    /// serialized with each other and with inserts by `code_guard`. The stored
    /// id and usage count always win over the copy.
    pub fn update<F>(&self, id: u64, edit: F) -> Result<Coupon, CouponError>
    where
        F: FnOnce(&mut Coupon) -> Result<(), CouponError>,
    {
        let _guard = self.code_guard.lock().unwrap_or_else(PoisonError::into_inner);

        let mut draft = self.find_by_id(id).ok_or(CouponError::NotFound)?;
        edit(&mut draft)?;

        if self.code_taken(&draft.code, Some(id)) {
            return Err(CouponError::DuplicateCode(draft.code));
        }

        let Some(mut slot) = self.coupons.get_mut(&id) else {
            return Err(CouponError::NotFound);
        };
        let times_used = slot.times_used;
        *slot = Coupon {
            id,
            times_used,
            ..draft
        };
        Ok(slot.clone())
    }

    pub fn remove(&self, id: u64) -> Option<Coupon> {
        self.coupons.remove(&id).map(|(_, coupon)| coupon)
    }

    /// Adds one use to a coupon. Returns false when the coupon is gone.
    pub fn persist_times_used_increment(&self, id: u64) -> bool {
        match self.coupons.get_mut(&id) {
            Some(mut coupon) => {
                coupon.times_used = coupon.times_used.saturating_add(1);
                true
            }
            None => false,
        }
    }

    /// Runs `work` against a coupon while holding its entry's write lock and
    /// commits the mutations it returns before the lock is released.
    ///
    /// Concurrent calls for the same id are serialized, so validation and the
    /// usage increment can never interleave. When `work` fails nothing is
    /// written.
    pub fn transact<T, F>(&self, id: u64, work: F) -> Result<T, CouponError>
    where
        F: FnOnce(&Coupon) -> Result<(T, Vec<CouponMutation>), CouponError>,
    {
        let Some(mut entry) = self.coupons.get_mut(&id) else {
            return Err(CouponError::NotFound);
        };

        let (value, mutations) = work(entry.value())?;
        for mutation in mutations {
            match mutation {
                CouponMutation::IncrementTimesUsed { coupon_id } if coupon_id == id => {
                    entry.times_used = entry.times_used.saturating_add(1);
                }
                CouponMutation::IncrementTimesUsed { coupon_id } => {
                    tracing::warn!(coupon_id, "ignoring mutation for a different coupon");
                }
            }
        }

        Ok(value)
    }
}

// =============================================================================
// Application State
// =============================================================================

/// Shared application state that can be safely passed between threads
pub type SharedState = Arc<AppState>;

/// Core application state: coupon storage and the loaded configuration
#[derive(Debug)]
pub struct AppState {
    pub coupons: CouponStore,
    pub config: AppConfig,
}

impl Default for AppState {
    fn default() -> Self {
        Self::new(AppConfig::default())
    }
}

impl AppState {
    pub fn new(config: AppConfig) -> Self {
        Self {
            coupons: CouponStore::new(),
            config,
        }
    }
}
