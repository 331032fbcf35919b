use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Half-open interval `[start, end)` on a single studio's calendar — the
/// atomic unit of scheduling.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SlotStatus {
    Available,
    Held,
    Booked,
    Ongoing,
    Completed,
    Cancelled,
}

impl SlotStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            SlotStatus::Available => "available",
            SlotStatus::Held => "held",
            SlotStatus::Booked => "booked",
            SlotStatus::Ongoing => "ongoing",
            SlotStatus::Completed => "completed",
            SlotStatus::Cancelled => "cancelled",
        }
    }

    pub fn parse(s: &str) -> anyhow::Result<Self> {
        Ok(match s {
            "available" => SlotStatus::Available,
            "held" => SlotStatus::Held,
            "booked" => SlotStatus::Booked,
            "ongoing" => SlotStatus::Ongoing,
            "completed" => SlotStatus::Completed,
            "cancelled" => SlotStatus::Cancelled,
            other => anyhow::bail!("unknown slot status: {other}"),
        })
    }

    /// Slots in these statuses participate in the non-overlap + gap invariant.
    pub fn is_non_terminal(self) -> bool {
        matches!(self, SlotStatus::Held | SlotStatus::Booked | SlotStatus::Ongoing)
    }

    /// `bookingRef` is non-null iff status is one of these.
    pub fn requires_booking_ref(self) -> bool {
        matches!(
            self,
            SlotStatus::Held | SlotStatus::Booked | SlotStatus::Ongoing | SlotStatus::Completed
        )
    }
}

#[derive(Clone, Debug)]
pub struct Slot {
    pub id: Uuid,
    pub studio_id: Uuid,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub status: SlotStatus,
    pub booking_ref: Option<Uuid>,
}

impl Slot {
    pub fn duration_minutes(&self) -> i64 {
        (self.end - self.start).num_minutes()
    }

    pub fn duration_hours(&self) -> f64 {
        (self.end - self.start).num_seconds() as f64 / 3600.0
    }
}

/// Filter for `Scheduler::list`.
#[derive(Clone, Debug)]
pub struct SlotRange {
    pub from: DateTime<Utc>,
    pub to: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn non_terminal_statuses() {
        assert!(SlotStatus::Held.is_non_terminal());
        assert!(SlotStatus::Booked.is_non_terminal());
        assert!(SlotStatus::Ongoing.is_non_terminal());
        assert!(!SlotStatus::Available.is_non_terminal());
        assert!(!SlotStatus::Completed.is_non_terminal());
        assert!(!SlotStatus::Cancelled.is_non_terminal());
    }

    #[test]
    fn booking_ref_required_statuses() {
        assert!(SlotStatus::Booked.requires_booking_ref());
        assert!(SlotStatus::Completed.requires_booking_ref());
        assert!(!SlotStatus::Available.requires_booking_ref());
        assert!(!SlotStatus::Cancelled.requires_booking_ref());
    }
}
