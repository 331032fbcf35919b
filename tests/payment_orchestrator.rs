mod support;

use chrono::{TimeZone, Utc};
use uuid::Uuid;

use studio_booking_core::booking::{BookingRepository, BookingStatus, CreateBookingRequest, PayType, SqlxBookingRepository};
use studio_booking_core::payment::gateway::sign_canonical_body;
use studio_booking_core::payment::{PaymentKind, PaymentStatus, WebhookOutcome};

use support::{build_test_app, customer_ctx, seed_cancellation_policy, seed_no_show_policy, seed_studio};

fn anchor() -> chrono::DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 2, 0, 0, 0).unwrap()
}

fn webhook_body(order_code: i64, code: &str) -> Vec<u8> {
    serde_json::to_vec(&serde_json::json!({
        "orderCode": order_code,
        "code": code,
        "desc": "",
        "data": {},
    }))
    .unwrap()
}

async fn create_funded_booking(app: &support::TestApp, studio_id: Uuid, pay_type: PayType) -> Uuid {
    let start = anchor() + chrono::Duration::hours(10);
    let end = start + chrono::Duration::hours(2);
    let customer = Uuid::new_v4();
    let booking = app
        .booking_engine
        .create_booking(
            &customer_ctx(customer),
            CreateBookingRequest {
                customer_ref: customer,
                slot_ref: None,
                studio_id: Some(studio_id),
                start: Some(start),
                end: Some(end),
                details: vec![],
                pay_type,
                promo_code: None,
                notes: String::new(),
            },
        )
        .await
        .expect("booking creation succeeds");
    assert_eq!(booking.totals.final_amount, 1_000_000);
    booking.id
}

/// `create_payment_options` offers 30%/50%/full against the remaining balance.
#[tokio::test]
async fn payment_options_reflect_final_amount() {
    let app = build_test_app(anchor()).await;
    seed_cancellation_policy(&app.pool).await;
    seed_no_show_policy(&app.pool).await;
    let studio_id = seed_studio(&app.pool, 500_000).await;
    let booking_id = create_funded_booking(&app, studio_id, PayType::DepositThenRemainder).await;

    let options = app
        .payment_orchestrator
        .create_payment_options(booking_id)
        .await
        .expect("options computed");

    assert_eq!(options[0].kind, PaymentKind::Deposit);
    assert_eq!(options[0].percentage, 30);
    assert_eq!(options[0].amount, 300_000);

    assert_eq!(options[1].percentage, 50);
    assert_eq!(options[1].amount, 500_000);

    assert_eq!(options[2].kind, PaymentKind::Full);
    assert_eq!(options[2].amount, 1_000_000);
}

/// S4: deposit confirms the booking; the later remainder payment tops up
/// cumulativePaid without triggering any further state change.
#[tokio::test]
async fn deposit_then_remainder_flow() {
    let app = build_test_app(anchor()).await;
    seed_cancellation_policy(&app.pool).await;
    seed_no_show_policy(&app.pool).await;
    let studio_id = seed_studio(&app.pool, 500_000).await;
    let booking_id = create_funded_booking(&app, studio_id, PayType::DepositThenRemainder).await;

    let deposit = app
        .payment_orchestrator
        .create_session(booking_id, PaymentKind::Deposit, 30)
        .await
        .expect("deposit session created");

    let deposit_payment = app.payment_orchestrator.get_status(deposit.payment_id).await.unwrap();
    let body = webhook_body(deposit_payment.transaction_id.parse().unwrap(), "00");
    let sig = sign_canonical_body("", &serde_json::from_slice(&body).unwrap()).unwrap();

    let outcome = app.payment_orchestrator.handle_webhook(&body, &sig).await.unwrap();
    assert_eq!(outcome, WebhookOutcome::Processed);

    let bookings = SqlxBookingRepository::new(app.pool.clone());
    let booking = bookings.get(booking_id).await.unwrap();
    assert_eq!(booking.status, BookingStatus::Confirmed);

    let remainder = app
        .payment_orchestrator
        .create_remainder(booking_id)
        .await
        .expect("remainder session created");
    let remainder_payment = app.payment_orchestrator.get_status(remainder.payment_id).await.unwrap();
    assert_eq!(remainder_payment.amount, 700_000);

    let body2 = webhook_body(remainder_payment.transaction_id.parse().unwrap(), "00");
    let sig2 = sign_canonical_body("", &serde_json::from_slice(&body2).unwrap()).unwrap();
    let outcome2 = app.payment_orchestrator.handle_webhook(&body2, &sig2).await.unwrap();
    assert_eq!(outcome2, WebhookOutcome::Processed);

    let booking_after = bookings.get(booking_id).await.unwrap();
    assert_eq!(booking_after.status, BookingStatus::Confirmed, "no further state change expected");
}

/// S5: the same success webhook delivered twice only transitions the
/// payment once; the second delivery is an idempotent no-op.
#[tokio::test]
async fn duplicate_webhook_is_idempotent() {
    let app = build_test_app(anchor()).await;
    seed_cancellation_policy(&app.pool).await;
    seed_no_show_policy(&app.pool).await;
    let studio_id = seed_studio(&app.pool, 500_000).await;
    let booking_id = create_funded_booking(&app, studio_id, PayType::Full).await;

    let session = app
        .payment_orchestrator
        .create_session(booking_id, PaymentKind::Full, 100)
        .await
        .expect("session created");
    let payment = app.payment_orchestrator.get_status(session.payment_id).await.unwrap();

    let body = webhook_body(payment.transaction_id.parse().unwrap(), "00");
    let sig = sign_canonical_body("", &serde_json::from_slice(&body).unwrap()).unwrap();

    let first = app.payment_orchestrator.handle_webhook(&body, &sig).await.unwrap();
    let second = app.payment_orchestrator.handle_webhook(&body, &sig).await.unwrap();

    assert_eq!(first, WebhookOutcome::Processed);
    assert_eq!(second, WebhookOutcome::AlreadyProcessed);

    let final_payment = app.payment_orchestrator.get_status(session.payment_id).await.unwrap();
    assert_eq!(final_payment.status, PaymentStatus::Paid);
}

/// An unrecognized gateway signature is answered as a silent `InvalidSignature`
/// outcome when the anti-replay config flag is set.
#[tokio::test]
async fn invalid_signature_is_silently_rejected_when_configured() {
    let app = build_test_app(anchor()).await;
    seed_cancellation_policy(&app.pool).await;
    seed_no_show_policy(&app.pool).await;
    let studio_id = seed_studio(&app.pool, 500_000).await;
    let booking_id = create_funded_booking(&app, studio_id, PayType::Full).await;

    let session = app
        .payment_orchestrator
        .create_session(booking_id, PaymentKind::Full, 100)
        .await
        .expect("session created");
    let payment = app.payment_orchestrator.get_status(session.payment_id).await.unwrap();

    let body = webhook_body(payment.transaction_id.parse().unwrap(), "00");
    let outcome = app
        .payment_orchestrator
        .handle_webhook(&body, "not-a-real-signature")
        .await
        .expect("default config answers 200 even on bad signature");
    assert_eq!(outcome, WebhookOutcome::InvalidSignature);

    let unchanged = app.payment_orchestrator.get_status(session.payment_id).await.unwrap();
    assert_eq!(unchanged.status, PaymentStatus::Pending);
}

/// Pending payments past `expiresAt` are swept to `expired`.
#[tokio::test]
async fn sweep_expired_marks_pending_payments_expired() {
    let app = build_test_app(anchor()).await;
    seed_cancellation_policy(&app.pool).await;
    seed_no_show_policy(&app.pool).await;
    let studio_id = seed_studio(&app.pool, 500_000).await;
    let booking_id = create_funded_booking(&app, studio_id, PayType::Full).await;

    let session = app
        .payment_orchestrator
        .create_session(booking_id, PaymentKind::Full, 100)
        .await
        .expect("session created");

    app.clock.advance(chrono::Duration::minutes(16));
    let swept = app.payment_orchestrator.sweep_expired().await.unwrap();
    assert_eq!(swept, 1);

    let payment = app.payment_orchestrator.get_status(session.payment_id).await.unwrap();
    assert_eq!(payment.status, PaymentStatus::Expired);
}
