use async_trait::async_trait;
use uuid::Uuid;

use crate::error::AppError;
use crate::inventory::model::Equipment;

/// Linearizable-per-`equipmentId` reserve/release/maintenance primitives.
/// Reserve/release pairs are the unit of compensation used by the
/// Booking Engine's create-booking saga.
#[async_trait]
pub trait InventoryRepository: Send + Sync {
    async fn get(&self, equipment_id: Uuid) -> Result<Equipment, AppError>;

    /// Atomic compare-and-decrement: succeeds only if `available_qty >= qty`,
    /// then `in_use_qty += qty`. `Conflict(InsufficientStock)` otherwise.
    async fn reserve(&self, equipment_id: Uuid, qty: i32) -> Result<Equipment, AppError>;

    /// Atomic `in_use_qty -= qty`, clamped at zero.
    async fn release(&self, equipment_id: Uuid, qty: i32) -> Result<Equipment, AppError>;

    /// Sets `maintenance_qty`; rejects values exceeding `total_qty - in_use_qty`.
    async fn set_maintenance(&self, equipment_id: Uuid, qty: i32) -> Result<Equipment, AppError>;
}
