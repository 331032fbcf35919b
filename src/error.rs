use thiserror::Error;

/// The named conflict sub-kinds of the booking/scheduling domain. Kept
/// distinct from the top-level `AppError::Conflict` variant so callers can
/// match on exactly which invariant was violated.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConflictKind {
    #[error("slot overlaps an existing non-terminal slot")]
    SlotOverlap,
    #[error("slot is not available for the requested operation")]
    SlotUnavailable,
    #[error("insufficient equipment stock")]
    InsufficientStock,
    #[error("booking transition is not valid from its current state")]
    InvalidTransition,
    #[error("extension would overlap the next slot")]
    ExtensionConflict,
    #[error("a pending payment of this kind already exists")]
    DuplicatePayment,
}

/// Top-level error taxonomy. The HTTP adapter (out of scope here) maps each
/// kind to a status code; `status_code()` documents that mapping for
/// callers that need it without depending on a web framework.
#[derive(Error, Debug)]
pub enum AppError {
    #[error("validation error: {0}")]
    Validation(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("unauthorized")]
    Unauthorized,

    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error("conflict: {0}")]
    Conflict(ConflictKind),

    #[error("policy violation: {0}")]
    PolicyViolation(String),

    #[error("gateway error: {0}")]
    Gateway(String),

    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    /// Status code the HTTP boundary would map this kind to.
    pub fn status_code(&self) -> u16 {
        match self {
            AppError::Validation(_) => 400,
            AppError::NotFound(_) => 404,
            AppError::Unauthorized => 401,
            AppError::Forbidden(_) => 403,
            AppError::Conflict(_) => 409,
            AppError::PolicyViolation(_) => 422,
            AppError::Gateway(_) => 502,
            AppError::Internal(_) => 500,
        }
    }

    /// True for the conflict kinds that permit transparent bounded retry.
    pub fn is_retryable_conflict(&self) -> bool {
        matches!(
            self,
            AppError::Conflict(ConflictKind::SlotUnavailable | ConflictKind::SlotOverlap)
        )
    }

    pub fn conflict(kind: ConflictKind) -> Self {
        AppError::Conflict(kind)
    }
}

pub type AppResult<T> = Result<T, AppError>;
