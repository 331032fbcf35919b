use async_trait::async_trait;

use crate::error::AppError;

/// Outcome of applying a promotion code to a booking's pre-discount amount.
/// `usage_token` is whatever the validator needs to later commit
/// (increment) or release (no-op) the usage counter; the core only threads
/// it through, it never inspects the value.
#[derive(Clone, Debug, Default)]
pub struct PromotionOutcome {
    pub discount_amount: i64,
    pub usage_token: Option<String>,
}

/// Promotion/coupon validation is a delegated collaborator: code
/// validity, usage limits, min-order, expiry, and applicability all live
/// behind this trait, out of scope for the core itself.
#[async_trait]
pub trait PromotionValidator: Send + Sync {
    /// Validates `code` against `before_discount` and returns the discount to
    /// apply. Does not increment usage; that happens in `commit_usage` only
    /// once the booking is durably persisted.
    async fn validate(&self, code: &str, before_discount: i64) -> Result<PromotionOutcome, AppError>;

    async fn commit_usage(&self, usage_token: &str) -> Result<(), AppError>;

    async fn release_usage(&self, usage_token: &str) -> Result<(), AppError>;
}

/// Default shim: promotion/coupon admin data lives outside the core, which
/// only depends on discounting collaborators by interface. No code is ever
/// valid.
#[derive(Clone, Default)]
pub struct NoDiscountPromotionValidator;

#[async_trait]
impl PromotionValidator for NoDiscountPromotionValidator {
    async fn validate(&self, code: &str, _before_discount: i64) -> Result<PromotionOutcome, AppError> {
        Err(AppError::PolicyViolation(format!(
            "promotion code {code} is not applicable"
        )))
    }

    async fn commit_usage(&self, _usage_token: &str) -> Result<(), AppError> {
        Ok(())
    }

    async fn release_usage(&self, _usage_token: &str) -> Result<(), AppError> {
        Ok(())
    }
}
