use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use sqlx::{AnyPool, Row};
use uuid::Uuid;

use crate::booking::model::{
    Booking, BookingDetail, BookingStatus, DetailKind, Financials, PayType, Timestamps, Totals,
};
use crate::booking::repository::BookingRepository;
use crate::error::{AppError, ConflictKind};
use crate::policy::{CancellationPolicySnapshot, NoShowPolicySnapshot};

pub struct SqlxBookingRepository {
    pool: AnyPool,
}

impl SqlxBookingRepository {
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

fn opt_epoch(ts: Option<i64>) -> anyhow::Result<Option<DateTime<Utc>>> {
    ts.map(from_epoch).transpose()
}

fn row_to_booking(row: &sqlx::any::AnyRow) -> anyhow::Result<Booking> {
    let id: String = row.get("id");
    let customer_ref: String = row.get("customer_ref");
    let slot_ref: String = row.get("slot_ref");
    let status: String = row.get("status");
    let pay_type: String = row.get("pay_type");
    let cancellation_snapshot_raw: String = row.get("cancellation_policy_snapshot");
    let no_show_snapshot_raw: String = row.get("no_show_policy_snapshot");

    Ok(Booking {
        id: Uuid::parse_str(&id)?,
        customer_ref: Uuid::parse_str(&customer_ref)?,
        slot_ref: Uuid::parse_str(&slot_ref)?,
        status: BookingStatus::parse(&status)?,
        totals: Totals {
            before_discount: row.get("before_discount"),
            discount_amount: row.get("discount_amount"),
            final_amount: row.get("final_amount"),
        },
        pay_type: PayType::parse(&pay_type)?,
        cancellation_policy_snapshot: serde_json::from_str::<CancellationPolicySnapshot>(
            &cancellation_snapshot_raw,
        )?,
        no_show_policy_snapshot: serde_json::from_str::<NoShowPolicySnapshot>(&no_show_snapshot_raw)?,
        financials: Financials {
            refund: row.get("financial_refund"),
            charge: row.get("financial_charge"),
            net: row.get("financial_net"),
        },
        notes: row.get("notes"),
        cancel_reason: row.get("cancel_reason"),
        timestamps: Timestamps {
            created_at: Some(from_epoch(row.get("created_at"))?),
            confirmed_at: opt_epoch(row.get("confirmed_at"))?,
            checked_in_at: opt_epoch(row.get("checked_in_at"))?,
            completed_at: opt_epoch(row.get("completed_at"))?,
            cancelled_at: opt_epoch(row.get("cancelled_at"))?,
            no_show_at: opt_epoch(row.get("no_show_at"))?,
        },
    })
}

fn row_to_detail(row: &sqlx::any::AnyRow) -> anyhow::Result<BookingDetail> {
    let id: String = row.get("id");
    let booking_ref: String = row.get("booking_ref");
    let kind: String = row.get("kind");
    let target_ref: String = row.get("target_ref");

    Ok(BookingDetail {
        id: Uuid::parse_str(&id)?,
        booking_ref: Uuid::parse_str(&booking_ref)?,
        kind: DetailKind::parse(&kind)?,
        target_ref: Uuid::parse_str(&target_ref)?,
        quantity: row.get("quantity"),
        price_per_unit: row.get("price_per_unit"),
        subtotal: row.get("subtotal"),
    })
}

const BOOKING_COLUMNS: &str = r#"id, customer_ref, slot_ref, status, before_discount, discount_amount,
final_amount, pay_type, cancellation_policy_snapshot, no_show_policy_snapshot,
financial_refund, financial_charge, financial_net, notes, cancel_reason,
created_at, confirmed_at, checked_in_at, completed_at, cancelled_at, no_show_at"#;

#[async_trait]
impl BookingRepository for SqlxBookingRepository {
    async fn create(&self, booking: Booking, details: Vec<BookingDetail>) -> Result<Booking, AppError> {
        let mut tx = self.pool.begin().await.map_err(|e| AppError::Internal(e.into()))?;

        let cancellation_json = serde_json::to_string(&booking.cancellation_policy_snapshot)
            .map_err(|e| AppError::Internal(e.into()))?;
        let no_show_json = serde_json::to_string(&booking.no_show_policy_snapshot)
            .map_err(|e| AppError::Internal(e.into()))?;

        sqlx::query(
            r#"
INSERT INTO bookings (
  id, customer_ref, slot_ref, status, before_discount, discount_amount, final_amount,
  pay_type, cancellation_policy_snapshot, no_show_policy_snapshot,
  financial_refund, financial_charge, financial_net, notes, cancel_reason, created_at
) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, 0, 0, 0, ?, NULL, ?);
"#,
        )
        .bind(booking.id.to_string())
        .bind(booking.customer_ref.to_string())
        .bind(booking.slot_ref.to_string())
        .bind(booking.status.as_str())
        .bind(booking.totals.before_discount)
        .bind(booking.totals.discount_amount)
        .bind(booking.totals.final_amount)
        .bind(booking.pay_type.as_str())
        .bind(cancellation_json)
        .bind(no_show_json)
        .bind(booking.notes.clone())
        .bind(epoch(booking.timestamps.created_at.unwrap_or_else(Utc::now)))
        .execute(&mut *tx)
        .await
        .map_err(|e| AppError::Internal(e.into()))?;

        for detail in &details {
            sqlx::query(
                r#"
INSERT INTO booking_details (id, booking_ref, kind, target_ref, quantity, price_per_unit, subtotal)
VALUES (?, ?, ?, ?, ?, ?, ?);
"#,
            )
            .bind(detail.id.to_string())
            .bind(booking.id.to_string())
            .bind(detail.kind.as_str())
            .bind(detail.target_ref.to_string())
            .bind(detail.quantity)
            .bind(detail.price_per_unit)
            .bind(detail.subtotal)
            .execute(&mut *tx)
            .await
            .map_err(|e| AppError::Internal(e.into()))?;
        }

        tx.commit().await.map_err(|e| AppError::Internal(e.into()))?;

        self.get(booking.id).await
    }

    async fn get(&self, id: Uuid) -> Result<Booking, AppError> {
        let query = format!("SELECT {BOOKING_COLUMNS} FROM bookings WHERE id = ?;");
        let row = sqlx::query(&query)
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| AppError::Internal(e.into()))?;

        let row = row.ok_or_else(|| AppError::NotFound(format!("booking {id}")))?;
        row_to_booking(&row).map_err(AppError::Internal)
    }

    async fn list_details(&self, booking_id: Uuid) -> Result<Vec<BookingDetail>, AppError> {
        let rows = sqlx::query(
            r#"SELECT id, booking_ref, kind, target_ref, quantity, price_per_unit, subtotal
FROM booking_details WHERE booking_ref = ?;"#,
        )
        .bind(booking_id.to_string())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::Internal(e.into()))?;

        rows.iter()
            .map(|r| row_to_detail(r).map_err(AppError::Internal))
            .collect()
    }

    async fn list(
        &self,
        customer_ref: Option<Uuid>,
        status: Option<BookingStatus>,
        page: i64,
        limit: i64,
    ) -> Result<Vec<Booking>, AppError> {
        let mut query = format!("SELECT {BOOKING_COLUMNS} FROM bookings WHERE 1 = 1");
        if customer_ref.is_some() {
            query.push_str(" AND customer_ref = ?");
        }
        if status.is_some() {
            query.push_str(" AND status = ?");
        }
        query.push_str(" ORDER BY created_at DESC LIMIT ? OFFSET ?;");

        let mut q = sqlx::query(&query);
        if let Some(c) = customer_ref {
            q = q.bind(c.to_string());
        }
        if let Some(s) = status {
            q = q.bind(s.as_str());
        }
        let offset = (page.max(1) - 1) * limit;
        q = q.bind(limit).bind(offset);

        let rows = q
            .fetch_all(&self.pool)
            .await
            .map_err(|e| AppError::Internal(e.into()))?;

        rows.iter()
            .map(|r| row_to_booking(r).map_err(AppError::Internal))
            .collect()
    }

    async fn transition(
        &self,
        id: Uuid,
        expected: &[BookingStatus],
        target: BookingStatus,
        now: DateTime<Utc>,
    ) -> Result<Booking, AppError> {
        if expected.is_empty() {
            return Err(AppError::Internal(anyhow::anyhow!(
                "transition requires at least one expected status"
            )));
        }

        let timestamp_column = match target {
            BookingStatus::Confirmed => Some("confirmed_at"),
            BookingStatus::CheckedIn => Some("checked_in_at"),
            BookingStatus::Completed => Some("completed_at"),
            BookingStatus::Cancelled => Some("cancelled_at"),
            BookingStatus::NoShow => Some("no_show_at"),
            BookingStatus::Pending => None,
        };

        let placeholders = expected.iter().map(|_| "?").collect::<Vec<_>>().join(",");
        let query = match timestamp_column {
            Some(col) => format!(
                "UPDATE bookings SET status = ?, {col} = ? WHERE id = ? AND status IN ({placeholders});"
            ),
            None => format!("UPDATE bookings SET status = ? WHERE id = ? AND status IN ({placeholders});"),
        };

        let mut q = sqlx::query(&query).bind(target.as_str());
        if timestamp_column.is_some() {
            q = q.bind(epoch(now));
        }
        q = q.bind(id.to_string());
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

        self.get(id).await
    }

    async fn update_totals(&self, id: Uuid, totals: Totals) -> Result<Booking, AppError> {
        sqlx::query(
            r#"UPDATE bookings SET before_discount = ?, discount_amount = ?, final_amount = ? WHERE id = ?;"#,
        )
        .bind(totals.before_discount)
        .bind(totals.discount_amount)
        .bind(totals.final_amount)
        .bind(id.to_string())
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::Internal(e.into()))?;

        self.get(id).await
    }

    async fn update_financials(&self, id: Uuid, financials: Financials) -> Result<Booking, AppError> {
        sqlx::query(
            r#"UPDATE bookings SET financial_refund = ?, financial_charge = ?, financial_net = ? WHERE id = ?;"#,
        )
        .bind(financials.refund)
        .bind(financials.charge)
        .bind(financials.net)
        .bind(id.to_string())
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::Internal(e.into()))?;

        self.get(id).await
    }

    async fn set_cancel_reason(&self, id: Uuid, reason: String) -> Result<Booking, AppError> {
        sqlx::query(r#"UPDATE bookings SET cancel_reason = ? WHERE id = ?;"#)
            .bind(reason)
            .bind(id.to_string())
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::Internal(e.into()))?;

        self.get(id).await
    }

    async fn update_notes(&self, id: Uuid, notes: String) -> Result<Booking, AppError> {
        sqlx::query(r#"UPDATE bookings SET notes = ? WHERE id = ?;"#)
            .bind(notes)
            .bind(id.to_string())
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::Internal(e.into()))?;

        self.get(id).await
    }

    async fn add_detail(&self, detail: BookingDetail) -> Result<BookingDetail, AppError> {
        sqlx::query(
            r#"
INSERT INTO booking_details (id, booking_ref, kind, target_ref, quantity, price_per_unit, subtotal)
VALUES (?, ?, ?, ?, ?, ?, ?);
"#,
        )
        .bind(detail.id.to_string())
        .bind(detail.booking_ref.to_string())
        .bind(detail.kind.as_str())
        .bind(detail.target_ref.to_string())
        .bind(detail.quantity)
        .bind(detail.price_per_unit)
        .bind(detail.subtotal)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::Internal(e.into()))?;

        Ok(detail)
    }

    async fn remove_detail(&self, detail_id: Uuid) -> Result<BookingDetail, AppError> {
        let row = sqlx::query(
            r#"SELECT id, booking_ref, kind, target_ref, quantity, price_per_unit, subtotal
FROM booking_details WHERE id = ?;"#,
        )
        .bind(detail_id.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::Internal(e.into()))?;

        let row = row.ok_or_else(|| AppError::NotFound(format!("booking detail {detail_id}")))?;
        let detail = row_to_detail(&row).map_err(AppError::Internal)?;

        sqlx::query(r#"DELETE FROM booking_details WHERE id = ?;"#)
            .bind(detail_id.to_string())
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::Internal(e.into()))?;

        Ok(detail)
    }
}
