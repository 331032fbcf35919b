use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::booking::model::{Booking, BookingDetail, BookingStatus, Financials, Totals};
use crate::error::AppError;

/// CRUD over bookings, detail lines, and the policy snapshots copied into
/// them at creation time. Booking rows are this
/// component's hard boundary: Slot and Equipment rows are never touched
/// here, only referenced by id.
#[async_trait]
pub trait BookingRepository: Send + Sync {
    /// Persists a new booking and its detail lines as a single local unit of
    /// work. Called only after every cross-boundary reservation (slot,
    /// equipment) has already succeeded, so there is nothing left to roll
    /// back here on failure of this call itself beyond not committing.
    async fn create(&self, booking: Booking, details: Vec<BookingDetail>) -> Result<Booking, AppError>;

    async fn get(&self, id: Uuid) -> Result<Booking, AppError>;

    async fn list_details(&self, booking_id: Uuid) -> Result<Vec<BookingDetail>, AppError>;

    async fn list(
        &self,
        customer_ref: Option<Uuid>,
        status: Option<BookingStatus>,
        page: i64,
        limit: i64,
    ) -> Result<Vec<Booking>, AppError>;

    /// Atomic status CAS, stamping the timestamp column the target status
    /// implies (confirmedAt, checkedInAt, completedAt, cancelledAt, noShowAt).
    /// Fails `Conflict(InvalidTransition)` if the row is not currently in one
    /// of `expected`.
    async fn transition(
        &self,
        id: Uuid,
        expected: &[BookingStatus],
        target: BookingStatus,
        now: DateTime<Utc>,
    ) -> Result<Booking, AppError>;

    async fn update_totals(&self, id: Uuid, totals: Totals) -> Result<Booking, AppError>;

    async fn update_financials(&self, id: Uuid, financials: Financials) -> Result<Booking, AppError>;

    async fn set_cancel_reason(&self, id: Uuid, reason: String) -> Result<Booking, AppError>;

    async fn update_notes(&self, id: Uuid, notes: String) -> Result<Booking, AppError>;

    async fn add_detail(&self, detail: BookingDetail) -> Result<BookingDetail, AppError>;

    async fn remove_detail(&self, detail_id: Uuid) -> Result<BookingDetail, AppError>;
}
