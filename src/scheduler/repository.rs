use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::AppError;
use crate::scheduler::model::{Slot, SlotRange, SlotStatus};

/// Conflict-safe CRUD over time slots. Implementations must enforce
/// the non-overlap + gap invariant and the reserve/release/extend CAS
/// transitions as a single atomic statement per studio row.
#[async_trait]
pub trait ScheduleRepository: Send + Sync {
    /// Inserts a new `available` slot iff it does not overlap (within the
    /// gap margin) any non-terminal slot of the same studio. Returns
    /// `Conflict(SlotOverlap)` on violation.
    async fn create_slot(
        &self,
        studio_id: Uuid,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        gap_minutes: i64,
    ) -> Result<Slot, AppError>;

    /// Exact-match lookup for an `available` slot `[start, end)` on the given studio.
    async fn find_available_matching(
        &self,
        studio_id: Uuid,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Option<Slot>, AppError>;

    async fn get(&self, slot_id: Uuid) -> Result<Slot, AppError>;

    /// Atomic `available -> booked` transition, stamping `booking_ref`.
    /// This is the serialization point for concurrent bookings of the same
    /// slot: exactly one caller's CAS succeeds.
    async fn reserve(&self, slot_id: Uuid, booking_id: Uuid) -> Result<Slot, AppError>;

    /// Atomic `{held, booked} -> available` transition, clearing `booking_ref`.
    async fn release(&self, slot_id: Uuid) -> Result<Slot, AppError>;

    /// Atomically moves a slot to a new status, clearing/stamping
    /// `booking_ref` as the target status requires. Used for
    /// `booked -> ongoing -> completed` and `-> cancelled` transitions
    /// driven by the Booking Engine.
    async fn transition(
        &self,
        slot_id: Uuid,
        expected: &[SlotStatus],
        target: SlotStatus,
    ) -> Result<Slot, AppError>;

    /// Atomically extends `end`, provided no subsequent non-terminal slot of
    /// the same studio is violated by the gap predicate.
    async fn extend(
        &self,
        slot_id: Uuid,
        new_end: DateTime<Utc>,
        gap_minutes: i64,
    ) -> Result<Slot, AppError>;

    /// Earliest non-terminal slot of `studio_id` starting at or after `after`, if any.
    async fn earliest_non_terminal_from(
        &self,
        studio_id: Uuid,
        after: DateTime<Utc>,
    ) -> Result<Option<Slot>, AppError>;

    async fn list(
        &self,
        studio_id: Uuid,
        range: &SlotRange,
        statuses: &[SlotStatus],
    ) -> Result<Vec<Slot>, AppError>;
}
