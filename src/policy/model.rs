use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PolicyKind {
    Cancellation,
    NoShow,
}

impl PolicyKind {
    pub fn as_str(self) -> &'static str {
        match self {
            PolicyKind::Cancellation => "cancellation",
            PolicyKind::NoShow => "no_show",
        }
    }

    pub fn parse(s: &str) -> anyhow::Result<Self> {
        match s {
            "cancellation" => Ok(PolicyKind::Cancellation),
            "no_show" => Ok(PolicyKind::NoShow),
            other => anyhow::bail!("unknown policy kind: {other}"),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NoShowChargeType {
    FullCharge,
    Percentage,
    Escalating,
}

/// One cancellation-refund bracket: booking cancelled `hoursBefore` or more
/// ahead of start refunds `refundPercentage`%.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct RefundTier {
    pub hours_before: i64,
    pub refund_percentage: i64,
}

/// Immutable copy of the active cancellation policy, captured into the
/// booking at creation time ("snapshots are immutable copies").
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CancellationPolicySnapshot {
    pub policy_id: Uuid,
    pub version: i32,
    pub category: String,
    pub tiers: Vec<RefundTier>,
}

/// Immutable copy of the active no-show policy, captured at booking time.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct NoShowPolicySnapshot {
    pub policy_id: Uuid,
    pub version: i32,
    pub category: String,
    pub charge_type: NoShowChargeType,
    pub charge_percentage: i64,
    pub base_percentage: i64,
    pub step_percentage: i64,
    pub grace_minutes: i64,
}

#[derive(Clone, Debug)]
pub enum PolicyPayload {
    Cancellation { tiers: Vec<RefundTier> },
    NoShow {
        charge_type: NoShowChargeType,
        charge_percentage: i64,
        base_percentage: i64,
        step_percentage: i64,
        grace_minutes: i64,
    },
}

/// A stored policy document. `get_active` returns the current version
/// for a kind; the Booking Engine copies it into a snapshot at creation time.
#[derive(Clone, Debug)]
pub struct Policy {
    pub id: Uuid,
    pub kind: PolicyKind,
    pub category: String,
    pub is_active: bool,
    pub version: i32,
    pub payload: PolicyPayload,
}

impl Policy {
    pub fn into_cancellation_snapshot(self) -> anyhow::Result<CancellationPolicySnapshot> {
        match self.payload {
            PolicyPayload::Cancellation { tiers } => Ok(CancellationPolicySnapshot {
                policy_id: self.id,
                version: self.version,
                category: self.category,
                tiers,
            }),
            PolicyPayload::NoShow { .. } => {
                anyhow::bail!("policy {} is not a cancellation policy", self.id)
            }
        }
    }

    pub fn into_no_show_snapshot(self) -> anyhow::Result<NoShowPolicySnapshot> {
        match self.payload {
            PolicyPayload::NoShow {
                charge_type,
                charge_percentage,
                base_percentage,
                step_percentage,
                grace_minutes,
            } => Ok(NoShowPolicySnapshot {
                policy_id: self.id,
                version: self.version,
                category: self.category,
                charge_type,
                charge_percentage,
                base_percentage,
                step_percentage,
                grace_minutes,
            }),
            PolicyPayload::Cancellation { .. } => {
                anyhow::bail!("policy {} is not a no-show policy", self.id)
            }
        }
    }
}
