use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::policy::{CancellationPolicySnapshot, NoShowPolicySnapshot};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BookingStatus {
    Pending,
    Confirmed,
    CheckedIn,
    Completed,
    Cancelled,
    NoShow,
}

impl BookingStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            BookingStatus::Pending => "pending",
            BookingStatus::Confirmed => "confirmed",
            BookingStatus::CheckedIn => "checked_in",
            BookingStatus::Completed => "completed",
            BookingStatus::Cancelled => "cancelled",
            BookingStatus::NoShow => "no_show",
        }
    }

    pub fn parse(s: &str) -> anyhow::Result<Self> {
        Ok(match s {
            "pending" => BookingStatus::Pending,
            "confirmed" => BookingStatus::Confirmed,
            "checked_in" => BookingStatus::CheckedIn,
            "completed" => BookingStatus::Completed,
            "cancelled" => BookingStatus::Cancelled,
            "no_show" => BookingStatus::NoShow,
            other => anyhow::bail!("unknown booking status: {other}"),
        })
    }

    /// Terminal states: no further transition is ever valid.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            BookingStatus::Completed | BookingStatus::Cancelled | BookingStatus::NoShow
        )
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PayType {
    Full,
    Deposit30,
    Deposit50,
    DepositThenRemainder,
}

impl PayType {
    pub fn as_str(self) -> &'static str {
        match self {
            PayType::Full => "full",
            PayType::Deposit30 => "deposit_30",
            PayType::Deposit50 => "deposit_50",
            PayType::DepositThenRemainder => "deposit_then_remainder",
        }
    }

    pub fn parse(s: &str) -> anyhow::Result<Self> {
        Ok(match s {
            "full" => PayType::Full,
            "deposit_30" => PayType::Deposit30,
            "deposit_50" => PayType::Deposit50,
            "deposit_then_remainder" => PayType::DepositThenRemainder,
            other => anyhow::bail!("unknown pay type: {other}"),
        })
    }

    /// Fraction of `final_amount` that must be paid for `confirm_booking` to
    /// fire. `deposit_then_remainder`'s first-session threshold is
    /// the same 30% used by `deposit_30`; the remainder is a separate
    /// payment created later via `create_remainder`.
    pub fn confirmation_threshold_percent(self) -> i64 {
        match self {
            PayType::Full => 100,
            PayType::Deposit30 => 30,
            PayType::Deposit50 => 50,
            PayType::DepositThenRemainder => 30,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DetailKind {
    Equipment,
    Service,
}

impl DetailKind {
    pub fn as_str(self) -> &'static str {
        match self {
            DetailKind::Equipment => "equipment",
            DetailKind::Service => "service",
        }
    }

    pub fn parse(s: &str) -> anyhow::Result<Self> {
        Ok(match s {
            "equipment" => DetailKind::Equipment,
            "service" => DetailKind::Service,
            other => anyhow::bail!("unknown detail kind: {other}"),
        })
    }
}

/// One line item on a booking. Equipment-kind details are the unit of
/// inventory compensation: deleting one releases its reserved quantity.
#[derive(Clone, Debug)]
pub struct BookingDetail {
    pub id: Uuid,
    pub booking_ref: Uuid,
    pub kind: DetailKind,
    pub target_ref: Uuid,
    pub quantity: i32,
    pub price_per_unit: i64,
    pub subtotal: i64,
}

/// Input shape for a requested detail line, supplied by the caller before
/// persistence (no `id`/`booking_ref` yet).
#[derive(Clone, Debug)]
pub struct DetailRequest {
    pub kind: DetailKind,
    pub target_ref: Uuid,
    pub quantity: i32,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Totals {
    pub before_discount: i64,
    pub discount_amount: i64,
    pub final_amount: i64,
}

impl Totals {
    pub fn compute(before_discount: i64, discount_amount: i64) -> Self {
        let final_amount = (before_discount - discount_amount).max(0);
        Totals {
            before_discount,
            discount_amount,
            final_amount,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Financials {
    pub refund: i64,
    pub charge: i64,
    pub net: i64,
}

#[derive(Clone, Debug, Default)]
pub struct Timestamps {
    pub created_at: Option<DateTime<Utc>>,
    pub confirmed_at: Option<DateTime<Utc>>,
    pub checked_in_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub no_show_at: Option<DateTime<Utc>>,
}

/// The aggregate root of the system. Owns its details and its policy
/// snapshots by value; `slot_ref` is unique — exactly one slot per booking.
#[derive(Clone, Debug)]
pub struct Booking {
    pub id: Uuid,
    pub customer_ref: Uuid,
    pub slot_ref: Uuid,
    pub status: BookingStatus,
    pub totals: Totals,
    pub pay_type: PayType,
    pub cancellation_policy_snapshot: CancellationPolicySnapshot,
    pub no_show_policy_snapshot: NoShowPolicySnapshot,
    pub financials: Financials,
    pub notes: String,
    pub cancel_reason: Option<String>,
    pub timestamps: Timestamps,
}

impl Booking {
    pub fn is_owned_by(&self, customer_ref: Uuid) -> bool {
        self.customer_ref == customer_ref
    }
}
