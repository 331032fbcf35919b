use async_trait::async_trait;
use sqlx::{AnyPool, Row};
use uuid::Uuid;

use crate::error::AppError;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StudioStatus {
    Active,
    Inactive,
    Maintenance,
}

impl StudioStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            StudioStatus::Active => "active",
            StudioStatus::Inactive => "inactive",
            StudioStatus::Maintenance => "maintenance",
        }
    }

    pub fn parse(s: &str) -> anyhow::Result<Self> {
        match s {
            "active" => Ok(StudioStatus::Active),
            "inactive" => Ok(StudioStatus::Inactive),
            "maintenance" => Ok(StudioStatus::Maintenance),
            other => anyhow::bail!("unknown studio status: {other}"),
        }
    }
}

/// A rentable studio. Only `Active` studios accept new bookings.
#[derive(Clone, Debug)]
pub struct Studio {
    pub id: Uuid,
    pub name: String,
    pub base_price_per_hour: i64,
    pub capacity: i32,
    pub status: StudioStatus,
}

impl Studio {
    pub fn is_active(&self) -> bool {
        self.status == StudioStatus::Active
    }
}

#[async_trait]
pub trait StudioRepository: Send + Sync {
    async fn get(&self, id: Uuid) -> Result<Studio, AppError>;
}

pub struct SqlxStudioRepository {
    pool: AnyPool,
}

impl SqlxStudioRepository {
    pub fn new(pool: AnyPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl StudioRepository for SqlxStudioRepository {
    async fn get(&self, id: Uuid) -> Result<Studio, AppError> {
        let row = sqlx::query(
            r#"SELECT id, name, base_price_per_hour, capacity, status FROM studios WHERE id = ?;"#,
        )
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::Internal(e.into()))?;

        let row = row.ok_or_else(|| AppError::NotFound(format!("studio {id}")))?;

        let id_str: String = row.get("id");
        let status_str: String = row.get("status");

        Ok(Studio {
            id: Uuid::parse_str(&id_str).map_err(|e| AppError::Internal(e.into()))?,
            name: row.get("name"),
            base_price_per_hour: row.get("base_price_per_hour"),
            capacity: row.get("capacity"),
            status: StudioStatus::parse(&status_str).map_err(AppError::Internal)?,
        })
    }
}
