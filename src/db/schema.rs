use sqlx::AnyPool;

/// Creates every entity table plus the indices the booking and payment
/// repositories rely on.
///
/// Timestamps are stored as epoch seconds (`BIGINT`) rather than a
/// database-native timestamp type so the same SQL runs unmodified against
/// both the SQLite driver used in tests and the Postgres driver used in
/// production, routing everything through `sqlx::AnyPool`.
pub async fn migrate(pool: &AnyPool) -> anyhow::Result<()> {
    sqlx::query(
        r#"
CREATE TABLE IF NOT EXISTS studios (
  id TEXT PRIMARY KEY,
  name TEXT NOT NULL,
  base_price_per_hour BIGINT NOT NULL,
  capacity INTEGER NOT NULL,
  status TEXT NOT NULL
);
"#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
CREATE TABLE IF NOT EXISTS slots (
  id TEXT PRIMARY KEY,
  studio_id TEXT NOT NULL,
  start_time BIGINT NOT NULL,
  end_time BIGINT NOT NULL,
  status TEXT NOT NULL,
  booking_ref TEXT
);
"#,
    )
    .execute(pool)
    .await?;

    sqlx::query(r#"CREATE INDEX IF NOT EXISTS idx_slots_studio_start ON slots(studio_id, start_time);"#)
        .execute(pool)
        .await?;
    sqlx::query(
        r#"CREATE INDEX IF NOT EXISTS idx_slots_studio_status_start ON slots(studio_id, status, start_time);"#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
CREATE TABLE IF NOT EXISTS equipment (
  id TEXT PRIMARY KEY,
  studio_id TEXT NOT NULL,
  name TEXT NOT NULL,
  price_per_hour BIGINT NOT NULL,
  total_qty INTEGER NOT NULL,
  maintenance_qty INTEGER NOT NULL,
  in_use_qty INTEGER NOT NULL
);
"#,
    )
    .execute(pool)
    .await?;

    sqlx::query(r#"CREATE INDEX IF NOT EXISTS idx_equipment_studio ON equipment(studio_id);"#)
        .execute(pool)
        .await?;

    sqlx::query(
        r#"
CREATE TABLE IF NOT EXISTS policies (
  id TEXT PRIMARY KEY,
  policy_type TEXT NOT NULL,
  category TEXT NOT NULL,
  payload TEXT NOT NULL,
  is_active BOOLEAN NOT NULL,
  version INTEGER NOT NULL
);
"#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"CREATE INDEX IF NOT EXISTS idx_policies_type_active ON policies(policy_type, is_active);"#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
CREATE TABLE IF NOT EXISTS bookings (
  id TEXT PRIMARY KEY,
  customer_ref TEXT NOT NULL,
  slot_ref TEXT NOT NULL UNIQUE,
  status TEXT NOT NULL,

  before_discount BIGINT NOT NULL,
  discount_amount BIGINT NOT NULL,
  final_amount BIGINT NOT NULL,

  pay_type TEXT NOT NULL,

  cancellation_policy_snapshot TEXT NOT NULL,
  no_show_policy_snapshot TEXT NOT NULL,

  financial_refund BIGINT NOT NULL DEFAULT 0,
  financial_charge BIGINT NOT NULL DEFAULT 0,
  financial_net BIGINT NOT NULL DEFAULT 0,

  notes TEXT NOT NULL DEFAULT '',
  cancel_reason TEXT,

  created_at BIGINT NOT NULL,
  confirmed_at BIGINT,
  checked_in_at BIGINT,
  completed_at BIGINT,
  cancelled_at BIGINT,
  no_show_at BIGINT
);
"#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
CREATE TABLE IF NOT EXISTS booking_details (
  id TEXT PRIMARY KEY,
  booking_ref TEXT NOT NULL,
  kind TEXT NOT NULL,
  target_ref TEXT NOT NULL,
  quantity INTEGER NOT NULL,
  price_per_unit BIGINT NOT NULL,
  subtotal BIGINT NOT NULL
);
"#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"CREATE INDEX IF NOT EXISTS idx_booking_details_booking ON booking_details(booking_ref);"#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
CREATE TABLE IF NOT EXISTS payments (
  id TEXT PRIMARY KEY,
  booking_ref TEXT NOT NULL,
  amount BIGINT NOT NULL,
  kind TEXT NOT NULL,
  status TEXT NOT NULL,
  transaction_id TEXT NOT NULL UNIQUE,
  checkout_url TEXT NOT NULL DEFAULT '',
  created_at BIGINT NOT NULL,
  expires_at BIGINT NOT NULL,
  paid_at BIGINT
);
"#,
    )
    .execute(pool)
    .await?;

    sqlx::query(r#"CREATE INDEX IF NOT EXISTS idx_payments_booking ON payments(booking_ref);"#)
        .execute(pool)
        .await?;

    Ok(())
}
