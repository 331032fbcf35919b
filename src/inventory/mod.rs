pub mod model;
pub mod repository;
pub mod repository_sqlx;

use std::sync::Arc;

use uuid::Uuid;

use crate::error::{AppError, ConflictKind};
use crate::metrics::Counters;

pub use model::Equipment;
pub use repository::InventoryRepository;

/// Thin validating wrapper over `InventoryRepository`. The booking
/// saga calls `reserve`/`release` directly as its compensation
/// primitive; this layer only rejects non-positive quantities before they
/// reach the CAS statement.
pub struct Inventory {
    repo: Arc<dyn InventoryRepository>,
    counters: Counters,
}

impl Inventory {
    pub fn new(repo: Arc<dyn InventoryRepository>, counters: Counters) -> Self {
        Self { repo, counters }
    }

    fn validate_qty(qty: i32) -> Result<(), AppError> {
        if qty < 1 {
            return Err(AppError::Validation("quantity must be at least 1".into()));
        }
        Ok(())
    }

    pub async fn get(&self, equipment_id: Uuid) -> Result<Equipment, AppError> {
        self.repo.get(equipment_id).await
    }

    #[tracing::instrument(skip(self))]
    pub async fn reserve(&self, equipment_id: Uuid, qty: i32) -> Result<Equipment, AppError> {
        Self::validate_qty(qty)?;
        let result = self.repo.reserve(equipment_id, qty).await;
        if let Err(AppError::Conflict(ConflictKind::InsufficientStock)) = &result {
            self.counters
                .inventory_insufficient_stock
                .fetch_add(1, std::sync::atomic::Ordering::Relaxed);
        }
        result
    }

    #[tracing::instrument(skip(self))]
    pub async fn release(&self, equipment_id: Uuid, qty: i32) -> Result<Equipment, AppError> {
        Self::validate_qty(qty)?;
        self.repo.release(equipment_id, qty).await
    }

    pub async fn set_maintenance(&self, equipment_id: Uuid, qty: i32) -> Result<Equipment, AppError> {
        if qty < 0 {
            return Err(AppError::Validation("maintenance quantity cannot be negative".into()));
        }
        self.repo.set_maintenance(equipment_id, qty).await
    }
}
