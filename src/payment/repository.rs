use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::AppError;
use crate::payment::model::{Payment, PaymentKind, PaymentStatus};

/// CRUD over payment rows: the Payment Orchestrator's storage boundary.
/// Payment rows are mutated by the Orchestrator only.
#[async_trait]
pub trait PaymentRepository: Send + Sync {
    async fn create(&self, payment: Payment) -> Result<Payment, AppError>;

    async fn get(&self, id: Uuid) -> Result<Payment, AppError>;

    /// Looks up by the gateway's `orderCode`/`transactionId`, the key the
    /// webhook carries. `None` on miss — callers treat a miss as an
    /// idempotent no-op, not an error.
    async fn find_by_transaction_id(&self, transaction_id: &str) -> Result<Option<Payment>, AppError>;

    async fn list_for_booking(&self, booking_ref: Uuid) -> Result<Vec<Payment>, AppError>;

    /// The unexpired pending payment of `kind` for `booking_ref`, if any —
    /// used to idempotently return an existing session instead of creating
    /// a duplicate.
    async fn find_pending(
        &self,
        booking_ref: Uuid,
        kind: PaymentKind,
        now: DateTime<Utc>,
    ) -> Result<Option<Payment>, AppError>;

    /// Atomic `pending -> paid` CAS, stamping `paid_at`. Returns
    /// `Ok(None)` (not an error) if the row was not `pending` — treated as
    /// an already-processed duplicate, not a failure.
    async fn mark_paid(&self, id: Uuid, paid_at: DateTime<Utc>) -> Result<Option<Payment>, AppError>;

    async fn mark_failed(&self, id: Uuid) -> Result<Option<Payment>, AppError>;

    async fn mark_status(&self, id: Uuid, target: PaymentStatus) -> Result<Payment, AppError>;

    /// All `pending` payments whose `expires_at < now`, for the sweep worker.
    async fn list_expired_pending(&self, now: DateTime<Utc>) -> Result<Vec<Payment>, AppError>;
}
