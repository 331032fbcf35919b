use async_trait::async_trait;
use sqlx::{AnyPool, Row};
use uuid::Uuid;

use crate::error::AppError;
use crate::policy::model::{NoShowChargeType, Policy, PolicyKind, PolicyPayload};

/// Persists and retrieves the active cancellation/no-show policy documents.
/// Policies are versioned; only one row per kind is expected to be active
/// at a time, but the query always takes the highest version among active
/// rows to be forgiving of a bad migration leaving two.
#[async_trait]
pub trait PolicyStore: Send + Sync {
    async fn get_active(&self, kind: PolicyKind) -> Result<Policy, AppError>;
}

pub struct SqlxPolicyStore {
    pool: AnyPool,
}

impl SqlxPolicyStore {
    pub fn new(pool: AnyPool) -> Self {
        Self { pool }
    }
}

#[derive(serde::Deserialize)]
struct CancellationPayloadJson {
    tiers: Vec<crate::policy::model::RefundTier>,
}

#[derive(serde::Deserialize)]
struct NoShowPayloadJson {
    charge_type: NoShowChargeType,
    charge_percentage: i64,
    base_percentage: i64,
    step_percentage: i64,
    grace_minutes: i64,
}

#[async_trait]
impl PolicyStore for SqlxPolicyStore {
    async fn get_active(&self, kind: PolicyKind) -> Result<Policy, AppError> {
        let row = sqlx::query(
            r#"
SELECT id, policy_type, category, payload, is_active, version
FROM policies
WHERE policy_type = ? AND is_active = ?
ORDER BY version DESC
LIMIT 1;
"#,
        )
        .bind(kind.as_str())
        .bind(true)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::Internal(e.into()))?;

        let row = row.ok_or_else(|| {
            AppError::NotFound(format!("no active {} policy", kind.as_str()))
        })?;

        let id: String = row.get("id");
        let category: String = row.get("category");
        let payload_raw: String = row.get("payload");
        let is_active: bool = row.get("is_active");
        let version: i32 = row.get("version");

        let payload = match kind {
            PolicyKind::Cancellation => {
                let parsed: CancellationPayloadJson =
                    serde_json::from_str(&payload_raw).map_err(|e| AppError::Internal(e.into()))?;
                PolicyPayload::Cancellation { tiers: parsed.tiers }
            }
            PolicyKind::NoShow => {
                let parsed: NoShowPayloadJson =
                    serde_json::from_str(&payload_raw).map_err(|e| AppError::Internal(e.into()))?;
                PolicyPayload::NoShow {
                    charge_type: parsed.charge_type,
                    charge_percentage: parsed.charge_percentage,
                    base_percentage: parsed.base_percentage,
                    step_percentage: parsed.step_percentage,
                    grace_minutes: parsed.grace_minutes,
                }
            }
        };

        Ok(Policy {
            id: Uuid::parse_str(&id).map_err(|e| AppError::Internal(e.into()))?,
            kind,
            category,
            is_active,
            version,
            payload,
        })
    }
}
