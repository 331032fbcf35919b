use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use sqlx::{AnyPool, Row};
use uuid::Uuid;

use crate::error::AppError;
use crate::payment::model::{Payment, PaymentKind, PaymentStatus};
use crate::payment::repository::PaymentRepository;

pub struct SqlxPaymentRepository {
    pool: AnyPool,
}

impl SqlxPaymentRepository {
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

fn row_to_payment(row: &sqlx::any::AnyRow) -> anyhow::Result<Payment> {
    let id: String = row.get("id");
    let booking_ref: String = row.get("booking_ref");
    let kind: String = row.get("kind");
    let status: String = row.get("status");
    let created_at: i64 = row.get("created_at");
    let expires_at: i64 = row.get("expires_at");
    let paid_at: Option<i64> = row.get("paid_at");

    Ok(Payment {
        id: Uuid::parse_str(&id)?,
        booking_ref: Uuid::parse_str(&booking_ref)?,
        amount: row.get("amount"),
        kind: PaymentKind::parse(&kind)?,
        status: PaymentStatus::parse(&status)?,
        transaction_id: row.get("transaction_id"),
        checkout_url: row.get("checkout_url"),
        created_at: from_epoch(created_at)?,
        expires_at: from_epoch(expires_at)?,
        paid_at: paid_at.map(from_epoch).transpose()?,
    })
}

const PAYMENT_COLUMNS: &str = r#"id, booking_ref, amount, kind, status, transaction_id, checkout_url,
created_at, expires_at, paid_at"#;

#[async_trait]
impl PaymentRepository for SqlxPaymentRepository {
    async fn create(&self, payment: Payment) -> Result<Payment, AppError> {
        sqlx::query(
            r#"
INSERT INTO payments (id, booking_ref, amount, kind, status, transaction_id, checkout_url,
  created_at, expires_at, paid_at)
VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, NULL);
"#,
        )
        .bind(payment.id.to_string())
        .bind(payment.booking_ref.to_string())
        .bind(payment.amount)
        .bind(payment.kind.as_str())
        .bind(payment.status.as_str())
        .bind(payment.transaction_id.clone())
        .bind(payment.checkout_url.clone())
        .bind(epoch(payment.created_at))
        .bind(epoch(payment.expires_at))
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::Internal(e.into()))?;

        self.get(payment.id).await
    }

    async fn get(&self, id: Uuid) -> Result<Payment, AppError> {
        let query = format!("SELECT {PAYMENT_COLUMNS} FROM payments WHERE id = ?;");
        let row = sqlx::query(&query)
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| AppError::Internal(e.into()))?;

        let row = row.ok_or_else(|| AppError::NotFound(format!("payment {id}")))?;
        row_to_payment(&row).map_err(AppError::Internal)
    }

    async fn find_by_transaction_id(&self, transaction_id: &str) -> Result<Option<Payment>, AppError> {
        let query = format!("SELECT {PAYMENT_COLUMNS} FROM payments WHERE transaction_id = ?;");
        let row = sqlx::query(&query)
            .bind(transaction_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| AppError::Internal(e.into()))?;

        row.as_ref()
            .map(row_to_payment)
            .transpose()
            .map_err(AppError::Internal)
    }

    async fn list_for_booking(&self, booking_ref: Uuid) -> Result<Vec<Payment>, AppError> {
        let query = format!("SELECT {PAYMENT_COLUMNS} FROM payments WHERE booking_ref = ? ORDER BY created_at ASC;");
        let rows = sqlx::query(&query)
            .bind(booking_ref.to_string())
            .fetch_all(&self.pool)
            .await
            .map_err(|e| AppError::Internal(e.into()))?;

        rows.iter()
            .map(|r| row_to_payment(r).map_err(AppError::Internal))
            .collect()
    }

    async fn find_pending(
        &self,
        booking_ref: Uuid,
        kind: PaymentKind,
        now: DateTime<Utc>,
    ) -> Result<Option<Payment>, AppError> {
        let query = format!(
            "SELECT {PAYMENT_COLUMNS} FROM payments WHERE booking_ref = ? AND kind = ? AND status = ? AND expires_at >= ? ORDER BY created_at DESC LIMIT 1;"
        );
        let row = sqlx::query(&query)
            .bind(booking_ref.to_string())
            .bind(kind.as_str())
            .bind(PaymentStatus::Pending.as_str())
            .bind(epoch(now))
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| AppError::Internal(e.into()))?;

        row.as_ref()
            .map(row_to_payment)
            .transpose()
            .map_err(AppError::Internal)
    }

    async fn mark_paid(&self, id: Uuid, paid_at: DateTime<Utc>) -> Result<Option<Payment>, AppError> {
        let res = sqlx::query(r#"UPDATE payments SET status = ?, paid_at = ? WHERE id = ? AND status = ?;"#)
            .bind(PaymentStatus::Paid.as_str())
            .bind(epoch(paid_at))
            .bind(id.to_string())
            .bind(PaymentStatus::Pending.as_str())
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::Internal(e.into()))?;

        if res.rows_affected() != 1 {
            return Ok(None);
        }
        Ok(Some(self.get(id).await?))
    }

    async fn mark_failed(&self, id: Uuid) -> Result<Option<Payment>, AppError> {
        let res = sqlx::query(r#"UPDATE payments SET status = ? WHERE id = ? AND status = ?;"#)
            .bind(PaymentStatus::Failed.as_str())
            .bind(id.to_string())
            .bind(PaymentStatus::Pending.as_str())
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::Internal(e.into()))?;

        if res.rows_affected() != 1 {
            return Ok(None);
        }
        Ok(Some(self.get(id).await?))
    }

    async fn mark_status(&self, id: Uuid, target: PaymentStatus) -> Result<Payment, AppError> {
        sqlx::query(r#"UPDATE payments SET status = ? WHERE id = ?;"#)
            .bind(target.as_str())
            .bind(id.to_string())
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::Internal(e.into()))?;

        self.get(id).await
    }

    async fn list_expired_pending(&self, now: DateTime<Utc>) -> Result<Vec<Payment>, AppError> {
        let query = format!(
            "SELECT {PAYMENT_COLUMNS} FROM payments WHERE status = ? AND expires_at < ?;"
        );
        let rows = sqlx::query(&query)
            .bind(PaymentStatus::Pending.as_str())
            .bind(epoch(now))
            .fetch_all(&self.pool)
            .await
            .map_err(|e| AppError::Internal(e.into()))?;

        rows.iter()
            .map(|r| row_to_payment(r).map_err(AppError::Internal))
            .collect()
    }
}
