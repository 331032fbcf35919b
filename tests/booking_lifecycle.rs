mod support;

use chrono::{DateTime, TimeZone, Utc};
use uuid::Uuid;

use studio_booking_core::booking::{BookingStatus, CreateBookingRequest, DetailKind, DetailRequest, PayType};
use studio_booking_core::error::{AppError, ConflictKind};

use support::{build_test_app, customer_ctx, seed_cancellation_policy, seed_equipment, seed_no_show_policy, seed_studio};

fn anchor() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 2, 0, 0, 0).unwrap()
}

fn req(
    customer_ref: Uuid,
    studio_id: Uuid,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    details: Vec<DetailRequest>,
) -> CreateBookingRequest {
    CreateBookingRequest {
        customer_ref,
        slot_ref: None,
        studio_id: Some(studio_id),
        start: Some(start),
        end: Some(end),
        details,
        pay_type: PayType::Full,
        promo_code: None,
        notes: String::new(),
    }
}

/// S1: two callers racing to book the same slot — exactly one wins, the
/// loser is told SlotUnavailable, and its equipment reservation is released.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_create_race_has_exactly_one_winner() {
    let app = build_test_app(anchor()).await;
    seed_cancellation_policy(&app.pool).await;
    seed_no_show_policy(&app.pool).await;
    let studio_id = seed_studio(&app.pool, 100_000).await;
    let equipment_id = seed_equipment(&app.pool, studio_id, 10_000, 2).await;

    let start = anchor() + chrono::Duration::hours(10);
    let end = start + chrono::Duration::hours(2);

    // Pre-create the contested slot so both callers race on the same
    // `reserve` CAS rather than on two independent `create_slot` calls.
    let seed_booking = app
        .booking_engine
        .create_booking(
            &customer_ctx(Uuid::new_v4()),
            req(Uuid::new_v4(), studio_id, start, end, vec![]),
        )
        .await
        .expect("seed booking to materialize the slot");
    // Cancel it immediately so the slot goes back to `available` for the race.
    app.booking_engine
        .cancel(&customer_ctx(seed_booking.customer_ref), seed_booking.id, "reset for race".into())
        .await
        .expect("reset slot to available");

    let slot_id = {
        use studio_booking_core::scheduler::ScheduleRepository;
        let repo = studio_booking_core::scheduler::repository_sqlx::SqlxScheduleRepository::new(app.pool.clone());
        repo.find_available_matching(studio_id, start, end)
            .await
            .unwrap()
            .expect("slot available for race")
            .id
    };

    let detail = vec![DetailRequest {
        kind: DetailKind::Equipment,
        target_ref: equipment_id,
        quantity: 1,
    }];

    let make_req = |customer: Uuid| CreateBookingRequest {
        customer_ref: customer,
        slot_ref: Some(slot_id),
        studio_id: None,
        start: None,
        end: None,
        details: detail.clone(),
        pay_type: PayType::Full,
        promo_code: None,
        notes: String::new(),
    };

    let customer_a = Uuid::new_v4();
    let customer_b = Uuid::new_v4();

    let engine_a = app.booking_engine.clone();
    let engine_b = app.booking_engine.clone();
    let auth_a = customer_ctx(customer_a);
    let auth_b = customer_ctx(customer_b);
    let req_a = make_req(customer_a);
    let req_b = make_req(customer_b);

    let (result_a, result_b) = tokio::join!(
        engine_a.create_booking(&auth_a, req_a),
        engine_b.create_booking(&auth_b, req_b),
    );

    let outcomes = [result_a, result_b];
    let winners = outcomes.iter().filter(|r| r.is_ok()).count();
    let losers = outcomes
        .iter()
        .filter(|r| matches!(r, Err(AppError::Conflict(ConflictKind::SlotUnavailable))))
        .count();

    assert_eq!(winners, 1, "exactly one caller should win the race");
    assert_eq!(losers, 1, "the other caller should see SlotUnavailable");

    let equipment = support::equipment_state(&app.pool, equipment_id).await;
    assert_eq!(equipment.in_use_qty, 1, "the loser's equipment reservation must be released");
}

/// S2: a 15-minute gap is rejected; a 30-minute gap is accepted.
#[tokio::test]
async fn gap_invariant_enforced_at_thirty_minutes() {
    let app = build_test_app(anchor()).await;
    seed_cancellation_policy(&app.pool).await;
    seed_no_show_policy(&app.pool).await;
    let studio_id = seed_studio(&app.pool, 100_000).await;

    let first_start = anchor() + chrono::Duration::hours(10);
    let first_end = first_start + chrono::Duration::hours(2);
    app.booking_engine
        .create_booking(&customer_ctx(Uuid::new_v4()), req(Uuid::new_v4(), studio_id, first_start, first_end, vec![]))
        .await
        .expect("first booking succeeds");

    let too_close_start = first_end + chrono::Duration::minutes(15);
    let too_close_end = too_close_start + chrono::Duration::hours(1);
    let result = app
        .booking_engine
        .create_booking(
            &customer_ctx(Uuid::new_v4()),
            req(Uuid::new_v4(), studio_id, too_close_start, too_close_end, vec![]),
        )
        .await;
    assert!(
        matches!(result, Err(AppError::Conflict(ConflictKind::SlotOverlap))),
        "a 15-minute gap must be rejected, got {result:?}"
    );

    let ok_start = first_end + chrono::Duration::minutes(30);
    let ok_end = ok_start + chrono::Duration::hours(1);
    let result = app
        .booking_engine
        .create_booking(
            &customer_ctx(Uuid::new_v4()),
            req(Uuid::new_v4(), studio_id, ok_start, ok_end, vec![]),
        )
        .await;
    assert!(result.is_ok(), "a 30-minute gap must be accepted, got {result:?}");
}

/// S3: cancellation refund tiers `[{48h,100%},{24h,50%},{0h,0%}]`.
#[tokio::test]
async fn cancellation_refund_tiers() {
    let app = build_test_app(anchor()).await;
    seed_cancellation_policy(&app.pool).await;
    seed_no_show_policy(&app.pool).await;
    let studio_id = seed_studio(&app.pool, 500_000).await;

    let cases: [(i64, i64, i64); 3] = [
        (49, 1_000_000, 0),  // T-49h -> full refund
        (30, 500_000, 500_000), // T-30h -> 50% tier
        (1, 0, 1_000_000),   // T-1h -> no refund
    ];

    for (i, (hours_before, expected_refund, expected_charge)) in cases.into_iter().enumerate() {
        let start = anchor() + chrono::Duration::days(10 + i as i64) + chrono::Duration::hours(10);
        let end = start + chrono::Duration::hours(2);

        app.clock.set(start - chrono::Duration::hours(200));
        let customer = Uuid::new_v4();
        let booking = app
            .booking_engine
            .create_booking(&customer_ctx(customer), req(customer, studio_id, start, end, vec![]))
            .await
            .expect("booking creation succeeds");
        assert_eq!(booking.totals.final_amount, 1_000_000);

        app.clock.set(start - chrono::Duration::hours(hours_before));
        let (_, refund) = app
            .booking_engine
            .cancel(&customer_ctx(customer), booking.id, "schedule conflict".into())
            .await
            .expect("cancel succeeds");

        assert_eq!(refund.refund_amount, expected_refund, "case {i}: refund mismatch");
        assert_eq!(refund.charge_amount, expected_charge, "case {i}: charge mismatch");
    }
}

/// S6: no-show grace window — rejected within grace, charged after.
#[tokio::test]
async fn no_show_grace_window() {
    let app = build_test_app(anchor()).await;
    seed_cancellation_policy(&app.pool).await;
    seed_no_show_policy(&app.pool).await;
    let studio_id = seed_studio(&app.pool, 500_000).await;

    let start = anchor() + chrono::Duration::hours(10);
    let end = start + chrono::Duration::hours(1);

    app.clock.set(start - chrono::Duration::hours(1));
    let customer = Uuid::new_v4();
    let booking = app
        .booking_engine
        .create_booking(&customer_ctx(customer), req(customer, studio_id, start, end, vec![]))
        .await
        .expect("booking creation succeeds");
    assert_eq!(booking.totals.final_amount, 500_000);

    app.booking_engine
        .confirm_booking(&support::staff_ctx(), booking.id)
        .await
        .expect("confirm succeeds");

    app.clock.set(start + chrono::Duration::minutes(14));
    let rejected = app
        .booking_engine
        .mark_no_show(&support::staff_ctx(), booking.id, None)
        .await;
    assert!(
        matches!(rejected, Err(AppError::PolicyViolation(_))),
        "mark-no-show at +14min must be rejected as still within grace, got {rejected:?}"
    );

    app.clock.set(start + chrono::Duration::minutes(16));
    let (updated, _) = (
        app.booking_engine
            .mark_no_show(&support::staff_ctx(), booking.id, None)
            .await
            .expect("mark-no-show at +16min must succeed"),
        (),
    );

    assert_eq!(updated.status, BookingStatus::NoShow);
    assert_eq!(updated.financials.charge, 500_000);
    assert_eq!(updated.financials.refund, 0);
}

/// Check-in/check-out happy path releases reserved equipment on check-out.
#[tokio::test]
async fn check_in_and_check_out_release_equipment() {
    let app = build_test_app(anchor()).await;
    seed_cancellation_policy(&app.pool).await;
    seed_no_show_policy(&app.pool).await;
    let studio_id = seed_studio(&app.pool, 100_000).await;
    let equipment_id = seed_equipment(&app.pool, studio_id, 10_000, 2).await;

    let start = anchor() + chrono::Duration::hours(10);
    let end = start + chrono::Duration::hours(1);

    app.clock.set(start - chrono::Duration::minutes(5));
    let customer = Uuid::new_v4();
    let booking = app
        .booking_engine
        .create_booking(
            &customer_ctx(customer),
            req(
                customer,
                studio_id,
                start,
                end,
                vec![DetailRequest { kind: DetailKind::Equipment, target_ref: equipment_id, quantity: 1 }],
            ),
        )
        .await
        .expect("booking creation succeeds");

    app.booking_engine
        .confirm_booking(&support::staff_ctx(), booking.id)
        .await
        .expect("confirm succeeds");

    let checked_in = app
        .booking_engine
        .check_in(&support::staff_ctx(), booking.id)
        .await
        .expect("check-in within window succeeds");
    assert_eq!(checked_in.status, BookingStatus::CheckedIn);

    let checked_out = app
        .booking_engine
        .check_out(&support::staff_ctx(), booking.id)
        .await
        .expect("check-out succeeds");
    assert_eq!(checked_out.status, BookingStatus::Completed);

    let equipment = support::equipment_state(&app.pool, equipment_id).await;
    assert_eq!(equipment.in_use_qty, 0, "equipment must be released on check-out");
}

/// Extending a booking beyond the available gap before the next reservation
/// is rejected; extending within it succeeds and updates totals.
#[tokio::test]
async fn extend_respects_gap_to_next_slot() {
    let app = build_test_app(anchor()).await;
    seed_cancellation_policy(&app.pool).await;
    seed_no_show_policy(&app.pool).await;
    let studio_id = seed_studio(&app.pool, 100_000).await;

    let start = anchor() + chrono::Duration::hours(10);
    let end = start + chrono::Duration::hours(1);
    let next_start = end + chrono::Duration::minutes(90);
    let next_end = next_start + chrono::Duration::hours(1);

    app.clock.set(start - chrono::Duration::hours(1));
    let customer = Uuid::new_v4();
    let booking = app
        .booking_engine
        .create_booking(&customer_ctx(customer), req(customer, studio_id, start, end, vec![]))
        .await
        .expect("booking creation succeeds");
    app.booking_engine
        .create_booking(&customer_ctx(Uuid::new_v4()), req(Uuid::new_v4(), studio_id, next_start, next_end, vec![]))
        .await
        .expect("second booking succeeds");

    app.booking_engine
        .confirm_booking(&support::staff_ctx(), booking.id)
        .await
        .expect("confirm succeeds");

    // Next slot starts 90 min after `end`; min gap is 30 min, so at most
    // 60 min of extension is available.
    let too_far = end + chrono::Duration::minutes(61);
    let result = app.booking_engine.extend(&customer_ctx(customer), booking.id, too_far).await;
    assert!(
        matches!(result, Err(AppError::Conflict(ConflictKind::ExtensionConflict))),
        "extension beyond the available gap must be rejected, got {result:?}"
    );

    let ok_end = end + chrono::Duration::minutes(60);
    let (updated, additional_amount) = app
        .booking_engine
        .extend(&customer_ctx(customer), booking.id, ok_end)
        .await
        .expect("extension within the gap must succeed");
    assert!(additional_amount > 0);
    assert!(updated.totals.final_amount > booking.totals.final_amount);
}
