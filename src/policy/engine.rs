use chrono::{DateTime, Utc};

use crate::policy::model::{CancellationPolicySnapshot, NoShowChargeType, NoShowPolicySnapshot, RefundTier};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RefundResult {
    pub refund_amount: i64,
    pub charge_amount: i64,
    pub tier_applied: Option<RefundTier>,
}

/// Pure, deterministic refund computation. `now` and `booking_start`
/// are caller-supplied so this never reaches for a clock itself.
pub fn compute_refund(
    policy: &CancellationPolicySnapshot,
    booking_start: DateTime<Utc>,
    now: DateTime<Utc>,
    booking_amount: i64,
) -> RefundResult {
    let hours_before = ((booking_start - now).num_seconds() as f64 / 3600.0).max(0.0);

    let mut tiers = policy.tiers.clone();
    tiers.sort_by(|a, b| b.hours_before.cmp(&a.hours_before));

    let tier = tiers
        .into_iter()
        .find(|t| hours_before >= t.hours_before as f64);

    let refund_percentage = tier.map(|t| t.refund_percentage).unwrap_or(0);
    let refund_amount = (booking_amount * refund_percentage) / 100;
    let charge_amount = booking_amount - refund_amount;

    RefundResult {
        refund_amount,
        charge_amount,
        tier_applied: tier,
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct NoShowChargeResult {
    pub charge_amount: i64,
    pub pct: i64,
}

/// Pure, deterministic no-show charge computation.
pub fn compute_no_show_charge(
    policy: &NoShowPolicySnapshot,
    booking_start: DateTime<Utc>,
    check_in: Option<DateTime<Utc>>,
    booking_amount: i64,
    previous_no_show_count: i64,
) -> NoShowChargeResult {
    if let Some(check_in) = check_in {
        let grace = chrono::Duration::minutes(policy.grace_minutes);
        if check_in <= booking_start + grace {
            return NoShowChargeResult {
                charge_amount: 0,
                pct: 0,
            };
        }
    }

    let pct = match policy.charge_type {
        NoShowChargeType::FullCharge => 100,
        NoShowChargeType::Percentage => policy.charge_percentage,
        NoShowChargeType::Escalating => {
            (policy.base_percentage + policy.step_percentage * previous_no_show_count).min(100)
        }
    };

    NoShowChargeResult {
        charge_amount: (booking_amount * pct) / 100,
        pct,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn cancellation_policy() -> CancellationPolicySnapshot {
        CancellationPolicySnapshot {
            policy_id: Uuid::new_v4(),
            version: 1,
            category: "standard".into(),
            tiers: vec![
                RefundTier { hours_before: 48, refund_percentage: 100 },
                RefundTier { hours_before: 24, refund_percentage: 50 },
                RefundTier { hours_before: 0, refund_percentage: 0 },
            ],
        }
    }

    fn no_show_policy(charge_type: NoShowChargeType) -> NoShowPolicySnapshot {
        NoShowPolicySnapshot {
            policy_id: Uuid::new_v4(),
            version: 1,
            category: "standard".into(),
            charge_type,
            charge_percentage: 60,
            base_percentage: 50,
            step_percentage: 10,
            grace_minutes: 15,
        }
    }

    #[test]
    fn refund_picks_highest_matching_tier() {
        let policy = cancellation_policy();
        let start = Utc::now() + chrono::Duration::hours(50);
        let result = compute_refund(&policy, start, Utc::now(), 1_000_000);
        assert_eq!(result.refund_amount, 1_000_000);
        assert_eq!(result.charge_amount, 0);
    }

    #[test]
    fn refund_falls_back_to_zero_tier() {
        let policy = cancellation_policy();
        let start = Utc::now() + chrono::Duration::hours(1);
        let result = compute_refund(&policy, start, Utc::now(), 1_000_000);
        assert_eq!(result.refund_amount, 0);
        assert_eq!(result.charge_amount, 1_000_000);
    }

    #[test]
    fn refund_floors_the_percentage() {
        let policy = CancellationPolicySnapshot {
            policy_id: Uuid::new_v4(),
            version: 1,
            category: "standard".into(),
            tiers: vec![RefundTier { hours_before: 0, refund_percentage: 33 }],
        };
        let start = Utc::now() + chrono::Duration::hours(1);
        let result = compute_refund(&policy, start, Utc::now(), 100);
        assert_eq!(result.refund_amount, 33);
        assert_eq!(result.charge_amount, 67);
    }

    #[test]
    fn no_show_within_grace_is_not_charged() {
        let policy = no_show_policy(NoShowChargeType::FullCharge);
        let start = Utc::now();
        let check_in = start + chrono::Duration::minutes(14);
        let result = compute_no_show_charge(&policy, start, Some(check_in), 500_000, 0);
        assert_eq!(result.charge_amount, 0);
    }

    #[test]
    fn no_show_full_charge_applies_after_grace() {
        let policy = no_show_policy(NoShowChargeType::FullCharge);
        let start = Utc::now();
        let result = compute_no_show_charge(&policy, start, None, 500_000, 0);
        assert_eq!(result.charge_amount, 500_000);
        assert_eq!(result.pct, 100);
    }

    #[test]
    fn no_show_escalating_charge_is_capped_at_100() {
        let policy = no_show_policy(NoShowChargeType::Escalating);
        let start = Utc::now();
        let result = compute_no_show_charge(&policy, start, None, 1_000_000, 10);
        assert_eq!(result.pct, 100);
        assert_eq!(result.charge_amount, 1_000_000);
    }

    #[test]
    fn no_show_escalating_charge_scales_with_history() {
        let policy = no_show_policy(NoShowChargeType::Escalating);
        let start = Utc::now();
        let result = compute_no_show_charge(&policy, start, None, 1_000_000, 2);
        assert_eq!(result.pct, 70);
        assert_eq!(result.charge_amount, 700_000);
    }
}

#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;
    use uuid::Uuid;

    fn tiers_strategy() -> impl Strategy<Value = Vec<RefundTier>> {
        prop::collection::vec((0i64..200, 0i64..=100), 1..5)
            .prop_map(|v| v.into_iter().map(|(h, p)| RefundTier { hours_before: h, refund_percentage: p }).collect())
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(512))]

        // "refundAmount + chargeAmount = originalAmount" for all tiers/amounts.
        #[test]
        fn refund_and_charge_always_sum_to_original(
            tiers in tiers_strategy(),
            hours_before_cancel in 0i64..200,
            amount in 0i64..10_000_000,
        ) {
            let policy = CancellationPolicySnapshot {
                policy_id: Uuid::new_v4(),
                version: 1,
                category: "standard".into(),
                tiers,
            };
            let start = Utc::now() + chrono::Duration::hours(hours_before_cancel);
            let result = compute_refund(&policy, start, Utc::now(), amount);
            prop_assert_eq!(result.refund_amount + result.charge_amount, amount);
            prop_assert!(result.refund_amount >= 0);
            prop_assert!(result.charge_amount >= 0);
        }

        // no-show charge is always within [0, originalAmount].
        #[test]
        fn no_show_charge_is_bounded_by_original_amount(
            charge_percentage in 0i64..=100,
            base_percentage in 0i64..=100,
            step_percentage in 0i64..=20,
            previous_no_show_count in 0i64..50,
            amount in 0i64..10_000_000,
            charge_type_idx in 0u8..3,
        ) {
            let charge_type = match charge_type_idx {
                0 => NoShowChargeType::FullCharge,
                1 => NoShowChargeType::Percentage,
                _ => NoShowChargeType::Escalating,
            };
            let policy = NoShowPolicySnapshot {
                policy_id: Uuid::new_v4(),
                version: 1,
                category: "standard".into(),
                charge_type,
                charge_percentage,
                base_percentage,
                step_percentage,
                grace_minutes: 15,
            };
            let start = Utc::now();
            let result = compute_no_show_charge(&policy, start, None, amount, previous_no_show_count);
            prop_assert!(result.pct >= 0 && result.pct <= 100);
            prop_assert!(result.charge_amount >= 0 && result.charge_amount <= amount);
        }
    }
}
