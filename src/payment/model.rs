use chrono::{DateTime, Utc};
use uuid::Uuid;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PaymentKind {
    Deposit,
    Full,
    Remainder,
    Fine,
}

impl PaymentKind {
    pub fn as_str(self) -> &'static str {
        match self {
            PaymentKind::Deposit => "deposit",
            PaymentKind::Full => "full",
            PaymentKind::Remainder => "remainder",
            PaymentKind::Fine => "fine",
        }
    }

    pub fn parse(s: &str) -> anyhow::Result<Self> {
        Ok(match s {
            "deposit" => PaymentKind::Deposit,
            "full" => PaymentKind::Full,
            "remainder" => PaymentKind::Remainder,
            "fine" => PaymentKind::Fine,
            other => anyhow::bail!("unknown payment kind: {other}"),
        })
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PaymentStatus {
    Pending,
    Paid,
    Failed,
    Cancelled,
    Expired,
    Refunded,
}

impl PaymentStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Paid => "paid",
            PaymentStatus::Failed => "failed",
            PaymentStatus::Cancelled => "cancelled",
            PaymentStatus::Expired => "expired",
            PaymentStatus::Refunded => "refunded",
        }
    }

    pub fn parse(s: &str) -> anyhow::Result<Self> {
        Ok(match s {
            "pending" => PaymentStatus::Pending,
            "paid" => PaymentStatus::Paid,
            "failed" => PaymentStatus::Failed,
            "cancelled" => PaymentStatus::Cancelled,
            "expired" => PaymentStatus::Expired,
            "refunded" => PaymentStatus::Refunded,
            other => anyhow::bail!("unknown payment status: {other}"),
        })
    }
}

/// A gateway-backed payment request against a booking. `amount`
/// is always positive; `transaction_id` is the gateway's `orderCode`,
/// unique per payment, and the key webhook ingress looks up by.
#[derive(Clone, Debug)]
pub struct Payment {
    pub id: Uuid,
    pub booking_ref: Uuid,
    pub amount: i64,
    pub kind: PaymentKind,
    pub status: PaymentStatus,
    pub transaction_id: String,
    pub checkout_url: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub paid_at: Option<DateTime<Utc>>,
}

impl Payment {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.status == PaymentStatus::Pending && self.expires_at < now
    }
}

/// One entry of the `create_payment_options` offer list.
#[derive(Clone, Copy, Debug)]
pub struct PaymentOption {
    pub kind: PaymentKind,
    pub percentage: i64,
    pub amount: i64,
}

/// Result of `create_session`/`create_remainder`, handed back to the HTTP
/// boundary as the response body.
#[derive(Clone, Debug)]
pub struct PaymentSession {
    pub payment_id: Uuid,
    pub checkout_url: String,
    pub qr_code: String,
    pub expires_at: DateTime<Utc>,
}
