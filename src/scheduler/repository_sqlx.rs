use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use sqlx::{AnyPool, Row};
use uuid::Uuid;

use crate::error::{AppError, ConflictKind};
use crate::scheduler::model::{Slot, SlotRange, SlotStatus};
use crate::scheduler::repository::ScheduleRepository;

pub struct SqlxScheduleRepository {
    pool: AnyPool,
}

impl SqlxScheduleRepository {
    pub fn new(pool: AnyPool) -> Self {
        Self { pool }
    }
}

fn epoch(dt: DateTime<Utc>) -> i64 {
    dt.timestamp()
}

fn from_epoch(ts: i64) -> anyhow::Result<DateTime<Utc>> {
    Utc.timestamp_opt(ts, 0)
        .single()
        .ok_or_else(|| anyhow::anyhow!("invalid epoch timestamp: {ts}"))
}

fn row_to_slot(row: &sqlx::any::AnyRow) -> anyhow::Result<Slot> {
    let id: String = row.get("id");
    let studio_id: String = row.get("studio_id");
    let status: String = row.get("status");
    let booking_ref: Option<String> = row.get("booking_ref");

    Ok(Slot {
        id: Uuid::parse_str(&id)?,
        studio_id: Uuid::parse_str(&studio_id)?,
        start: from_epoch(row.get("start_time"))?,
        end: from_epoch(row.get("end_time"))?,
        status: SlotStatus::parse(&status)?,
        booking_ref: booking_ref.map(|s| Uuid::parse_str(&s)).transpose()?,
    })
}

const NON_TERMINAL: &str = "'held','booked','ongoing'";

#[async_trait]
impl ScheduleRepository for SqlxScheduleRepository {
    async fn create_slot(
        &self,
        studio_id: Uuid,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        gap_minutes: i64,
    ) -> Result<Slot, AppError> {
        let gap_secs = gap_minutes * 60;
        let end_plus_gap = epoch(end) + gap_secs;
        let start_minus_gap = epoch(start) - gap_secs;
        let id = Uuid::new_v4();

        let query = format!(
            r#"
INSERT INTO slots (id, studio_id, start_time, end_time, status, booking_ref)
SELECT ?, ?, ?, ?, 'available', NULL
WHERE NOT EXISTS (
  SELECT 1 FROM slots s2
  WHERE s2.studio_id = ?
    AND s2.status IN ({NON_TERMINAL})
    AND s2.start_time < ?
    AND s2.end_time > ?
);
"#
        );

        let res = sqlx::query(&query)
            .bind(id.to_string())
            .bind(studio_id.to_string())
            .bind(epoch(start))
            .bind(epoch(end))
            .bind(studio_id.to_string())
            .bind(end_plus_gap)
            .bind(start_minus_gap)
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::Internal(e.into()))?;

        if res.rows_affected() != 1 {
            return Err(AppError::Conflict(ConflictKind::SlotOverlap));
        }

        self.get(id).await
    }

    async fn find_available_matching(
        &self,
        studio_id: Uuid,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Option<Slot>, AppError> {
        let row = sqlx::query(
            r#"
SELECT id, studio_id, start_time, end_time, status, booking_ref
FROM slots
WHERE studio_id = ? AND start_time = ? AND end_time = ? AND status = 'available'
LIMIT 1;
"#,
        )
        .bind(studio_id.to_string())
        .bind(epoch(start))
        .bind(epoch(end))
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::Internal(e.into()))?;

        row.map(|r| row_to_slot(&r).map_err(AppError::Internal))
            .transpose()
    }

    async fn get(&self, slot_id: Uuid) -> Result<Slot, AppError> {
        let row = sqlx::query(
            r#"SELECT id, studio_id, start_time, end_time, status, booking_ref FROM slots WHERE id = ?;"#,
        )
        .bind(slot_id.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::Internal(e.into()))?;

        let row = row.ok_or_else(|| AppError::NotFound(format!("slot {slot_id}")))?;
        row_to_slot(&row).map_err(AppError::Internal)
    }

    async fn reserve(&self, slot_id: Uuid, booking_id: Uuid) -> Result<Slot, AppError> {
        let res = sqlx::query(
            r#"UPDATE slots SET status = 'booked', booking_ref = ? WHERE id = ? AND status = 'available';"#,
        )
        .bind(booking_id.to_string())
        .bind(slot_id.to_string())
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::Internal(e.into()))?;

        if res.rows_affected() != 1 {
            return Err(AppError::Conflict(ConflictKind::SlotUnavailable));
        }

        self.get(slot_id).await
    }

    async fn release(&self, slot_id: Uuid) -> Result<Slot, AppError> {
        let res = sqlx::query(
            r#"UPDATE slots SET status = 'available', booking_ref = NULL WHERE id = ? AND status IN ('held','booked');"#,
        )
        .bind(slot_id.to_string())
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::Internal(e.into()))?;

        if res.rows_affected() != 1 {
            return Err(AppError::Conflict(ConflictKind::SlotUnavailable));
        }

        self.get(slot_id).await
    }

    async fn transition(
        &self,
        slot_id: Uuid,
        expected: &[SlotStatus],
        target: SlotStatus,
    ) -> Result<Slot, AppError> {
        if expected.is_empty() {
            return Err(AppError::Internal(anyhow::anyhow!(
                "transition requires at least one expected status"
            )));
        }

        let placeholders = expected.iter().map(|_| "?").collect::<Vec<_>>().join(",");
        let clear_ref = !target.requires_booking_ref();

        let query = if clear_ref {
            format!(
                "UPDATE slots SET status = ?, booking_ref = NULL WHERE id = ? AND status IN ({placeholders});"
            )
        } else {
            format!("UPDATE slots SET status = ? WHERE id = ? AND status IN ({placeholders});")
        };

        let mut q = sqlx::query(&query)
            .bind(target.as_str())
            .bind(slot_id.to_string());
        for s in expected {
            q = q.bind(s.as_str());
        }

        let res = q
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::Internal(e.into()))?;

        if res.rows_affected() != 1 {
            return Err(AppError::Conflict(ConflictKind::InvalidTransition));
        }

        self.get(slot_id).await
    }

    async fn extend(
        &self,
        slot_id: Uuid,
        new_end: DateTime<Utc>,
        gap_minutes: i64,
    ) -> Result<Slot, AppError> {
        let current = self.get(slot_id).await?;
        let gap_secs = gap_minutes * 60;
        let end_plus_gap = epoch(new_end) + gap_secs;
        let start_minus_gap = epoch(current.start) - gap_secs;

        let query = format!(
            r#"
UPDATE slots
SET end_time = ?
WHERE id = ?
  AND status IN ('booked','ongoing')
  AND NOT EXISTS (
    SELECT 1 FROM slots s2
    WHERE s2.studio_id = ?
      AND s2.id != ?
      AND s2.status IN ({NON_TERMINAL})
      AND s2.start_time < ?
      AND s2.end_time > ?
  );
"#
        );

        let res = sqlx::query(&query)
            .bind(epoch(new_end))
            .bind(slot_id.to_string())
            .bind(current.studio_id.to_string())
            .bind(slot_id.to_string())
            .bind(end_plus_gap)
            .bind(start_minus_gap)
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::Internal(e.into()))?;

        if res.rows_affected() != 1 {
            return Err(AppError::Conflict(ConflictKind::ExtensionConflict));
        }

        self.get(slot_id).await
    }

    async fn earliest_non_terminal_from(
        &self,
        studio_id: Uuid,
        after: DateTime<Utc>,
    ) -> Result<Option<Slot>, AppError> {
        let query = format!(
            r#"
SELECT id, studio_id, start_time, end_time, status, booking_ref
FROM slots
WHERE studio_id = ? AND status IN ({NON_TERMINAL}) AND start_time >= ?
ORDER BY start_time ASC
LIMIT 1;
"#
        );

        let row = sqlx::query(&query)
            .bind(studio_id.to_string())
            .bind(epoch(after))
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| AppError::Internal(e.into()))?;

        row.map(|r| row_to_slot(&r).map_err(AppError::Internal))
            .transpose()
    }

    async fn list(
        &self,
        studio_id: Uuid,
        range: &SlotRange,
        statuses: &[SlotStatus],
    ) -> Result<Vec<Slot>, AppError> {
        let mut query = String::from(
            r#"SELECT id, studio_id, start_time, end_time, status, booking_ref FROM slots
WHERE studio_id = ? AND start_time < ? AND end_time > ?"#,
        );

        if !statuses.is_empty() {
            let placeholders = statuses.iter().map(|_| "?").collect::<Vec<_>>().join(",");
            query.push_str(&format!(" AND status IN ({placeholders})"));
        }
        query.push_str(" ORDER BY start_time ASC;");

        let mut q = sqlx::query(&query)
            .bind(studio_id.to_string())
            .bind(epoch(range.to))
            .bind(epoch(range.from));
        for s in statuses {
            q = q.bind(s.as_str());
        }

        let rows = q
            .fetch_all(&self.pool)
            .await
            .map_err(|e| AppError::Internal(e.into()))?;

        rows.iter()
            .map(|r| row_to_slot(r).map_err(AppError::Internal))
            .collect()
    }
}
