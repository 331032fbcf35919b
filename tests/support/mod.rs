#![allow(dead_code)]

use std::sync::Arc;
use std::sync::Once;

use chrono::{DateTime, Utc};
use sqlx::any::AnyPoolOptions;
use sqlx::AnyPool;
use uuid::Uuid;

use studio_booking_core::booking::{BookingEngine, NoServiceCatalog, SqlxBookingRepository};
use studio_booking_core::config::AppConfig;
use studio_booking_core::db::schema;
use studio_booking_core::inventory::repository_sqlx::SqlxInventoryRepository;
use studio_booking_core::inventory::{Equipment, Inventory, InventoryRepository};
use studio_booking_core::metrics::Counters;
use studio_booking_core::notifier::LoggingNotifier;
use studio_booking_core::payment::{BookingConfirmHook, MockGateway, PaymentOrchestrator, RefundRequester, SqlxPaymentRepository};
use studio_booking_core::policy::SqlxPolicyStore;
use studio_booking_core::promotion::NoDiscountPromotionValidator;
use studio_booking_core::scheduler::repository_sqlx::SqlxScheduleRepository;
use studio_booking_core::scheduler::Scheduler;
use studio_booking_core::studio::{SqlxStudioRepository, StudioStatus};
use studio_booking_core::time::FixedClock;

static INIT_DRIVERS: Once = Once::new();

/// A unique in-memory SQLite database per call, migrated against the same
/// schema production uses against Postgres (schema is driver-portable by
/// construction, see `db::schema`).
pub async fn fresh_pool() -> AnyPool {
    INIT_DRIVERS.call_once(|| {
        sqlx::any::install_default_drivers();
    });

    let url = format!("sqlite:file:{}?mode=memory&cache=shared", Uuid::new_v4());
    let pool = AnyPoolOptions::new()
        .max_connections(4)
        .connect(&url)
        .await
        .expect("connect in-memory sqlite");
    schema::migrate(&pool).await.expect("migrate schema");
    pool
}

pub async fn seed_studio(pool: &AnyPool, base_price_per_hour: i64) -> Uuid {
    let id = Uuid::new_v4();
    sqlx::query(
        "INSERT INTO studios (id, name, base_price_per_hour, capacity, status) VALUES (?, ?, ?, ?, ?);",
    )
    .bind(id.to_string())
    .bind("Test Studio")
    .bind(base_price_per_hour)
    .bind(4)
    .bind(StudioStatus::Active.as_str())
    .execute(pool)
    .await
    .expect("seed studio");
    id
}

pub async fn seed_equipment(pool: &AnyPool, studio_id: Uuid, price_per_hour: i64, total_qty: i32) -> Uuid {
    let id = Uuid::new_v4();
    sqlx::query(
        "INSERT INTO equipment (id, studio_id, name, price_per_hour, total_qty, maintenance_qty, in_use_qty) VALUES (?, ?, ?, ?, ?, 0, 0);",
    )
    .bind(id.to_string())
    .bind(studio_id.to_string())
    .bind("Mixer")
    .bind(price_per_hour)
    .bind(total_qty)
    .execute(pool)
    .await
    .expect("seed equipment");
    id
}

/// Seeds the single active cancellation policy used by S3: tiers
/// `[{48h,100%},{24h,50%},{0h,0%}]`.
pub async fn seed_cancellation_policy(pool: &AnyPool) {
    let payload = serde_json::json!({
        "tiers": [
            { "hours_before": 48, "refund_percentage": 100 },
            { "hours_before": 24, "refund_percentage": 50 },
            { "hours_before": 0, "refund_percentage": 0 },
        ]
    });
    sqlx::query(
        "INSERT INTO policies (id, policy_type, category, payload, is_active, version) VALUES (?, 'cancellation', 'standard', ?, ?, 1);",
    )
    .bind(Uuid::new_v4().to_string())
    .bind(payload.to_string())
    .bind(true)
    .execute(pool)
    .await
    .expect("seed cancellation policy");
}

/// Seeds the single active no-show policy used by S6: graceMinutes=15,
/// chargeType=FULL_CHARGE.
pub async fn seed_no_show_policy(pool: &AnyPool) {
    let payload = serde_json::json!({
        "charge_type": "full_charge",
        "charge_percentage": 100,
        "base_percentage": 0,
        "step_percentage": 0,
        "grace_minutes": 15,
    });
    sqlx::query(
        "INSERT INTO policies (id, policy_type, category, payload, is_active, version) VALUES (?, 'no_show', 'standard', ?, ?, 1);",
    )
    .bind(Uuid::new_v4().to_string())
    .bind(payload.to_string())
    .bind(true)
    .execute(pool)
    .await
    .expect("seed no-show policy");
}

pub fn test_config() -> Arc<AppConfig> {
    let mut cfg = AppConfig::from_env();
    cfg.slot_min_gap_minutes = 30;
    cfg.slot_min_duration_minutes = 60;
    cfg.payment_expiry_minutes = 15;
    cfg.conflict_retry_attempts = 3;
    cfg.conflict_retry_backoff_ms = 5;
    Arc::new(cfg)
}

/// Everything needed to exercise the booking + payment lifecycle together,
/// wired the same way `main::build_app` wires production, but over an
/// in-memory database with a `FixedClock` and a `MockGateway`.
pub struct TestApp {
    pub booking_engine: Arc<BookingEngine>,
    pub payment_orchestrator: Arc<PaymentOrchestrator>,
    pub clock: FixedClock,
    pub pool: AnyPool,
}

pub async fn build_test_app(now: DateTime<Utc>) -> TestApp {
    let pool = fresh_pool().await;

    let studios = Arc::new(SqlxStudioRepository::new(pool.clone()));
    let schedule_repo = Arc::new(SqlxScheduleRepository::new(pool.clone()));
    let inventory_repo = Arc::new(SqlxInventoryRepository::new(pool.clone()));
    let policies = Arc::new(SqlxPolicyStore::new(pool.clone()));
    let bookings = Arc::new(SqlxBookingRepository::new(pool.clone()));
    let payments = Arc::new(SqlxPaymentRepository::new(pool.clone()));

    let cfg = test_config();
    let counters = Counters::default();

    let scheduler = Arc::new(Scheduler::new(schedule_repo, studios.clone(), cfg.clone(), counters.clone()));
    let inventory = Arc::new(Inventory::new(inventory_repo, counters.clone()));

    let clock = FixedClock::new(now);
    let clock_dyn: Arc<dyn studio_booking_core::time::Clock> = Arc::new(clock.clone());
    let notifier: Arc<dyn studio_booking_core::notifier::Notifier> = Arc::new(LoggingNotifier);
    let promotions = Arc::new(NoDiscountPromotionValidator);
    let services = Arc::new(NoServiceCatalog);

    let booking_engine = Arc::new(BookingEngine::new(
        bookings,
        scheduler,
        inventory,
        studios,
        policies,
        promotions,
        services,
        notifier.clone(),
        clock_dyn.clone(),
        counters.clone(),
        cfg.slot_min_gap_minutes,
    ));

    let gateway = Arc::new(MockGateway::new(cfg.gateway_checksum_key.clone()));
    let confirm_hook: Arc<dyn BookingConfirmHook> = booking_engine.clone();
    let payment_orchestrator = Arc::new(PaymentOrchestrator::new(
        payments,
        gateway,
        confirm_hook,
        notifier,
        clock_dyn,
        cfg,
        counters,
    ));

    let refund_requester: Arc<dyn RefundRequester> = payment_orchestrator.clone();
    booking_engine.set_refund_requester(refund_requester);

    TestApp {
        booking_engine,
        payment_orchestrator,
        clock,
        pool,
    }
}

pub async fn equipment_state(pool: &AnyPool, equipment_id: Uuid) -> Equipment {
    let repo = SqlxInventoryRepository::new(pool.clone());
    repo.get(equipment_id).await.expect("equipment exists")
}

pub fn customer_ctx(user_id: Uuid) -> studio_booking_core::auth::AuthContext {
    studio_booking_core::auth::AuthContext::new(user_id, studio_booking_core::auth::Role::Customer)
}

pub fn staff_ctx() -> studio_booking_core::auth::AuthContext {
    studio_booking_core::auth::AuthContext::new(Uuid::new_v4(), studio_booking_core::auth::Role::Staff)
}
