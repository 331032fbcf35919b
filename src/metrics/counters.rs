use std::sync::atomic::AtomicU64;
use std::sync::Arc;

/// Minimal counters for operational visibility: every lifecycle transition
/// and conflict retry is worth counting for dashboards/alerting.
#[derive(Clone, Default)]
pub struct Counters {
    pub bookings_created: Arc<AtomicU64>,
    pub bookings_confirmed: Arc<AtomicU64>,
    pub bookings_cancelled: Arc<AtomicU64>,
    pub bookings_no_show: Arc<AtomicU64>,
    pub bookings_completed: Arc<AtomicU64>,

    pub slot_conflicts: Arc<AtomicU64>,
    pub slot_conflict_retries: Arc<AtomicU64>,
    pub inventory_insufficient_stock: Arc<AtomicU64>,

    pub payments_created: Arc<AtomicU64>,
    pub payments_succeeded: Arc<AtomicU64>,
    pub payments_failed: Arc<AtomicU64>,
    pub payments_expired: Arc<AtomicU64>,
    pub webhooks_rejected_signature: Arc<AtomicU64>,
    pub webhooks_ignored_unknown: Arc<AtomicU64>,
}
