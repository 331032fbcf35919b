use async_trait::async_trait;
use sqlx::{AnyPool, Row};
use uuid::Uuid;

use crate::error::{AppError, ConflictKind};
use crate::inventory::model::Equipment;
use crate::inventory::repository::InventoryRepository;

pub struct SqlxInventoryRepository {
    pool: AnyPool,
}

impl SqlxInventoryRepository {
    pub fn new(pool: AnyPool) -> Self {
        Self { pool }
    }
}

fn row_to_equipment(row: &sqlx::any::AnyRow) -> anyhow::Result<Equipment> {
    let id: String = row.get("id");
    let studio_id: String = row.get("studio_id");
    Ok(Equipment {
        id: Uuid::parse_str(&id)?,
        studio_id: Uuid::parse_str(&studio_id)?,
        name: row.get("name"),
        price_per_hour: row.get("price_per_hour"),
        total_qty: row.get("total_qty"),
        maintenance_qty: row.get("maintenance_qty"),
        in_use_qty: row.get("in_use_qty"),
    })
}

#[async_trait]
impl InventoryRepository for SqlxInventoryRepository {
    async fn get(&self, equipment_id: Uuid) -> Result<Equipment, AppError> {
        let row = sqlx::query(
            r#"SELECT id, studio_id, name, price_per_hour, total_qty, maintenance_qty, in_use_qty
FROM equipment WHERE id = ?;"#,
        )
        .bind(equipment_id.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::Internal(e.into()))?;

        let row = row.ok_or_else(|| AppError::NotFound(format!("equipment {equipment_id}")))?;
        row_to_equipment(&row).map_err(AppError::Internal)
    }

    async fn reserve(&self, equipment_id: Uuid, qty: i32) -> Result<Equipment, AppError> {
        let res = sqlx::query(
            r#"
UPDATE equipment
SET in_use_qty = in_use_qty + ?
WHERE id = ? AND (total_qty - maintenance_qty - in_use_qty) >= ?;
"#,
        )
        .bind(qty)
        .bind(equipment_id.to_string())
        .bind(qty)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::Internal(e.into()))?;

        if res.rows_affected() != 1 {
            return Err(AppError::Conflict(ConflictKind::InsufficientStock));
        }

        self.get(equipment_id).await
    }

    async fn release(&self, equipment_id: Uuid, qty: i32) -> Result<Equipment, AppError> {
        let res = sqlx::query(
            r#"
UPDATE equipment
SET in_use_qty = CASE WHEN in_use_qty - ? < 0 THEN 0 ELSE in_use_qty - ? END
WHERE id = ?;
"#,
        )
        .bind(qty)
        .bind(qty)
        .bind(equipment_id.to_string())
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::Internal(e.into()))?;

        if res.rows_affected() != 1 {
            return Err(AppError::NotFound(format!("equipment {equipment_id}")));
        }

        self.get(equipment_id).await
    }

    async fn set_maintenance(&self, equipment_id: Uuid, qty: i32) -> Result<Equipment, AppError> {
        let res = sqlx::query(
            r#"
UPDATE equipment
SET maintenance_qty = ?
WHERE id = ? AND ? <= (total_qty - in_use_qty);
"#,
        )
        .bind(qty)
        .bind(equipment_id.to_string())
        .bind(qty)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::Internal(e.into()))?;

        if res.rows_affected() != 1 {
            return Err(AppError::Validation(
                "maintenance quantity exceeds available stock".into(),
            ));
        }

        self.get(equipment_id).await
    }
}
