use std::sync::Arc;
use std::time::Duration;

use studio_booking_core::{
    auth::AuthContext,
    booking::{BookingEngine, BookingRepository, NoServiceCatalog, SqlxBookingRepository},
    config::AppConfig,
    db::Db,
    inventory::{Inventory, InventoryRepository},
    inventory::repository_sqlx::SqlxInventoryRepository,
    logger::init_tracing,
    metrics::Counters,
    notifier::LoggingNotifier,
    payment::{
        BookingConfirmHook, HttpGateway, PaymentOrchestrator, PaymentRepository, RefundRequester,
        SqlxPaymentRepository,
    },
    policy::{PolicyStore, SqlxPolicyStore},
    promotion::NoDiscountPromotionValidator,
    scheduler::{repository_sqlx::SqlxScheduleRepository, Scheduler, ScheduleRepository},
    studio::{SqlxStudioRepository, StudioRepository},
    time::{Clock, SystemClock},
};

/// The single aggregate that owns every repository, the clock, the gateway
/// client, and the notifier; handlers (out of scope here) are given this
/// explicitly rather than reaching for module-level state.
struct App {
    booking_engine: Arc<BookingEngine>,
    payment_orchestrator: Arc<PaymentOrchestrator>,
    config: Arc<AppConfig>,
}

async fn build_app(cfg: AppConfig) -> anyhow::Result<App> {
    let cfg = Arc::new(cfg);

    let db = Db::connect(&cfg.database_url).await?;
    db.migrate().await?;

    let studios: Arc<dyn StudioRepository> = Arc::new(SqlxStudioRepository::new((*db.pool).clone()));
    let schedule_repo: Arc<dyn ScheduleRepository> =
        Arc::new(SqlxScheduleRepository::new((*db.pool).clone()));
    let inventory_repo: Arc<dyn InventoryRepository> =
        Arc::new(SqlxInventoryRepository::new((*db.pool).clone()));
    let policies: Arc<dyn PolicyStore> = Arc::new(SqlxPolicyStore::new((*db.pool).clone()));
    let bookings: Arc<dyn BookingRepository> = Arc::new(SqlxBookingRepository::new((*db.pool).clone()));
    let payments: Arc<dyn PaymentRepository> = Arc::new(SqlxPaymentRepository::new((*db.pool).clone()));

    let counters = Counters::default();

    let scheduler = Arc::new(Scheduler::new(
        schedule_repo,
        studios.clone(),
        cfg.clone(),
        counters.clone(),
    ));
    let inventory = Arc::new(Inventory::new(inventory_repo, counters.clone()));

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
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
        clock.clone(),
        counters.clone(),
        cfg.slot_min_gap_minutes,
    ));

    let gateway = Arc::new(HttpGateway::new(
        "https://api.payos.vn".to_string(),
        cfg.gateway_client_id.clone(),
        cfg.gateway_api_key.clone(),
        cfg.gateway_checksum_key.clone(),
    )?);

    let confirm_hook: Arc<dyn BookingConfirmHook> = booking_engine.clone();
    let payment_orchestrator = Arc::new(PaymentOrchestrator::new(
        payments,
        gateway,
        confirm_hook,
        notifier,
        clock,
        cfg.clone(),
        counters,
    ));

    let refund_requester: Arc<dyn RefundRequester> = payment_orchestrator.clone();
    booking_engine.set_refund_requester(refund_requester);

    Ok(App {
        booking_engine,
        payment_orchestrator,
        config: cfg,
    })
}

/// "payments whose expiresAt < now and status=pending are swept to
/// expired by a background worker."
fn start_payment_expiry_sweep(orchestrator: Arc<PaymentOrchestrator>, interval: Duration) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        loop {
            ticker.tick().await;
            match orchestrator.sweep_expired().await {
                Ok(count) if count > 0 => tracing::info!(count, "swept expired payments"),
                Ok(_) => {}
                Err(e) => tracing::error!(error = ?e, "payment expiry sweep failed"),
            }
        }
    });
}

/// "invoked ... automatically by a worker when now ≥ start +
/// graceMinutes and status is still confirmed."
fn start_no_show_sweep(booking_engine: Arc<BookingEngine>, interval: Duration) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        loop {
            ticker.tick().await;

            let due = match booking_engine
                .list_confirmed_for_no_show_sweep()
                .await
            {
                Ok(bookings) => bookings,
                Err(e) => {
                    tracing::error!(error = ?e, "failed to list confirmed bookings for no-show sweep");
                    continue;
                }
            };

            for booking_id in due {
                match booking_engine.auto_mark_no_show_if_due(booking_id).await {
                    Ok(Some(_)) => tracing::info!(%booking_id, "auto-marked booking as no-show"),
                    Ok(None) => {}
                    Err(e) => tracing::error!(%booking_id, error = ?e, "no-show auto-mark failed"),
                }
            }
        }
    });
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    sqlx::any::install_default_drivers();

    let is_production = std::env::var("APP_ENV").unwrap_or_default() == "production";
    init_tracing(is_production);

    tracing::info!("Starting studio booking core...");

    let cfg = AppConfig::from_env();
    let port = cfg.port;
    let app = build_app(cfg).await?;

    start_payment_expiry_sweep(
        app.payment_orchestrator.clone(),
        Duration::from_secs(app.config.payment_sweep_interval_secs),
    );
    start_no_show_sweep(
        app.booking_engine.clone(),
        Duration::from_secs(app.config.no_show_sweep_interval_secs),
    );

    // HTTP transport is out of scope; the core's methods are exercised
    // by an out-of-tree handler layer that would bind to `port`.
    let _ = (port, AuthContext::new);

    tracing::info!("Studio booking core started; waiting for shutdown signal");

    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutdown signal received");

    Ok(())
}
