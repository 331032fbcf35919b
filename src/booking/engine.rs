use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::auth::AuthContext;
use crate::booking::model::{
    Booking, BookingDetail, BookingStatus, DetailKind, DetailRequest, Financials, PayType, Timestamps,
    Totals,
};
use crate::booking::repository::BookingRepository;
use crate::booking::service_catalog::ServiceCatalog;
use crate::error::{AppError, ConflictKind};
use crate::inventory::Inventory;
use crate::metrics::Counters;
use crate::notifier::{notify_best_effort, NotificationKind, Notifier};
use crate::payment::{BookingConfirmHook, BookingPaymentContext, RefundRequester};
use crate::policy::{compute_no_show_charge, compute_refund, NoShowChargeResult, PolicyKind, PolicyStore, RefundResult};
use crate::promotion::PromotionValidator;
use crate::scheduler::{Scheduler, SlotStatus};
use crate::studio::StudioRepository;
use crate::time::Clock;

/// Input shape for `create_booking`. Exactly one of `slot_ref` or
/// `(studio_id, start, end)` must be set — validated at the top of
/// `create_booking`, not by the type, since the HTTP boundary (out of
/// scope) is what actually enforces the `slotId? | studioId,startTime,
/// endTime` either/or shape on the wire.
#[derive(Clone, Debug)]
pub struct CreateBookingRequest {
    pub customer_ref: Uuid,
    pub slot_ref: Option<Uuid>,
    pub studio_id: Option<Uuid>,
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
    pub details: Vec<DetailRequest>,
    pub pay_type: PayType,
    pub promo_code: Option<String>,
    pub notes: String,
}

#[derive(Clone, Debug)]
pub struct ExtensionQuote {
    pub can_extend: bool,
    pub available_minutes: i64,
    pub reason: Option<String>,
}

/// Mutable fields of a staff update. `None` leaves the field untouched;
/// `Some(vec![])` for `add_details`/`remove_detail_ids` is simply "no-op".
#[derive(Clone, Debug, Default)]
pub struct UpdateBookingRequest {
    pub notes: Option<String>,
    pub add_details: Vec<DetailRequest>,
    pub remove_detail_ids: Vec<Uuid>,
    pub discount_amount: Option<i64>,
}

/// Orchestrates the booking lifecycle end to end. Booking rows are this
/// component's exclusive write boundary; Slot and Equipment rows are only
/// ever reached through `Scheduler`/`Inventory`.
pub struct BookingEngine {
    bookings: Arc<dyn BookingRepository>,
    scheduler: Arc<Scheduler>,
    inventory: Arc<Inventory>,
    studios: Arc<dyn StudioRepository>,
    policies: Arc<dyn PolicyStore>,
    promotions: Arc<dyn PromotionValidator>,
    services: Arc<dyn ServiceCatalog>,
    notifier: Arc<dyn Notifier>,
    clock: Arc<dyn Clock>,
    counters: Counters,
    min_gap_minutes: i64,
    refunds: std::sync::OnceLock<Arc<dyn RefundRequester>>,
}

impl BookingEngine {
    pub fn new(
        bookings: Arc<dyn BookingRepository>,
        scheduler: Arc<Scheduler>,
        inventory: Arc<Inventory>,
        studios: Arc<dyn StudioRepository>,
        policies: Arc<dyn PolicyStore>,
        promotions: Arc<dyn PromotionValidator>,
        services: Arc<dyn ServiceCatalog>,
        notifier: Arc<dyn Notifier>,
        clock: Arc<dyn Clock>,
        counters: Counters,
        min_gap_minutes: i64,
    ) -> Self {
        Self {
            bookings,
            scheduler,
            inventory,
            studios,
            policies,
            promotions,
            services,
            notifier,
            clock,
            counters,
            min_gap_minutes,
            refunds: std::sync::OnceLock::new(),
        }
    }

    /// Wires the refund-request collaborator. Split from `new` because the
    /// `PaymentOrchestrator` itself is constructed with a `BookingConfirmHook`
    /// pointing back at this engine — an `Arc<BookingEngine>` must exist
    /// before the orchestrator can be built, so this breaks the cycle.
    pub fn set_refund_requester(&self, refunds: Arc<dyn RefundRequester>) {
        let _ = self.refunds.set(refunds);
    }

    fn refund_requester(&self) -> &Arc<dyn RefundRequester> {
        self.refunds
            .get()
            .expect("refund requester must be wired before use")
    }

    // ---------------------------------------------------------------
    // create
    // ---------------------------------------------------------------

    #[tracing::instrument(skip(self, req))]
    pub async fn create_booking(
        &self,
        auth: &AuthContext,
        req: CreateBookingRequest,
    ) -> Result<Booking, AppError> {
        auth.require_owner_or_staff(req.customer_ref)?;

        let booking_id = Uuid::new_v4();
        let now = self.clock.now();

        // Step 1/2: resolve studio + slot.
        let (slot, studio_active) = match (req.slot_ref, req.studio_id, req.start, req.end) {
            (Some(slot_id), _, _, _) => {
                let slot = self.scheduler.get(slot_id).await?;
                if slot.status != SlotStatus::Available {
                    return Err(AppError::Conflict(ConflictKind::SlotUnavailable));
                }
                let studio = self.studios.get(slot.studio_id).await?;
                (slot, studio.is_active())
            }
            (None, Some(studio_id), Some(start), Some(end)) => {
                let studio = self.studios.get(studio_id).await?;
                if !studio.is_active() {
                    return Err(AppError::Validation(format!(
                        "studio {studio_id} is not accepting bookings"
                    )));
                }
                let slot = self.scheduler.find_or_create_available(studio_id, start, end).await?;
                (slot, true)
            }
            _ => {
                return Err(AppError::Validation(
                    "either slotRef or studioId+startTime+endTime is required".into(),
                ))
            }
        };
        if !studio_active {
            return Err(AppError::Validation("studio is not accepting bookings".into()));
        }

        let studio = self.studios.get(slot.studio_id).await?;

        // Step 3: base amount from studio price × duration (0.1h granularity).
        let duration_hours = round_to_tenth(slot.duration_hours());
        let base_amount = ((studio.base_price_per_hour as f64) * duration_hours).round() as i64;

        // Step 4: details — validate, reserve equipment, compute subtotals.
        let mut reserved_equipment: Vec<(Uuid, i32)> = Vec::new();
        let mut details: Vec<BookingDetail> = Vec::new();
        let mut details_total: i64 = 0;

        let result: Result<(), AppError> = async {
            for d in &req.details {
                if d.quantity < 1 {
                    return Err(AppError::Validation("detail quantity must be at least 1".into()));
                }
                let (price_per_unit, subtotal) = match d.kind {
                    DetailKind::Equipment => {
                        let equipment = self.inventory.get(d.target_ref).await?;
                        if equipment.studio_id != slot.studio_id {
                            return Err(AppError::Validation(
                                "equipment does not belong to the booked studio".into(),
                            ));
                        }
                        self.inventory.reserve(d.target_ref, d.quantity).await?;
                        reserved_equipment.push((d.target_ref, d.quantity));
                        let subtotal = ((equipment.price_per_hour * d.quantity as i64) as f64
                            * duration_hours)
                            .round() as i64;
                        (equipment.price_per_hour, subtotal)
                    }
                    DetailKind::Service => {
                        let price = self.services.price_per_unit(d.target_ref).await?;
                        (price, price * d.quantity as i64)
                    }
                };

                details_total += subtotal;
                details.push(BookingDetail {
                    id: Uuid::new_v4(),
                    booking_ref: booking_id,
                    kind: d.kind,
                    target_ref: d.target_ref,
                    quantity: d.quantity,
                    price_per_unit,
                    subtotal,
                });
            }
            Ok(())
        }
        .await;

        if let Err(e) = result {
            self.release_equipment(&reserved_equipment).await;
            return Err(e);
        }

        let before_discount = base_amount + details_total;

        // Step 5: promotion.
        let mut usage_token: Option<String> = None;
        let discount_amount = if let Some(code) = req.promo_code.as_deref() {
            match self.promotions.validate(code, before_discount).await {
                Ok(outcome) => {
                    usage_token = outcome.usage_token;
                    outcome.discount_amount
                }
                Err(e) => {
                    self.release_equipment(&reserved_equipment).await;
                    return Err(e);
                }
            }
        } else {
            0
        };

        let totals = Totals::compute(before_discount, discount_amount);

        // Step 6: snapshot active policies.
        let cancellation_policy_snapshot = match self.policies.get_active(PolicyKind::Cancellation).await {
            Ok(p) => match p.into_cancellation_snapshot() {
                Ok(s) => s,
                Err(e) => {
                    self.compensate_promotion(&usage_token).await;
                    self.release_equipment(&reserved_equipment).await;
                    return Err(AppError::Internal(e));
                }
            },
            Err(e) => {
                self.compensate_promotion(&usage_token).await;
                self.release_equipment(&reserved_equipment).await;
                return Err(e);
            }
        };
        let no_show_policy_snapshot = match self.policies.get_active(PolicyKind::NoShow).await {
            Ok(p) => match p.into_no_show_snapshot() {
                Ok(s) => s,
                Err(e) => {
                    self.compensate_promotion(&usage_token).await;
                    self.release_equipment(&reserved_equipment).await;
                    return Err(AppError::Internal(e));
                }
            },
            Err(e) => {
                self.compensate_promotion(&usage_token).await;
                self.release_equipment(&reserved_equipment).await;
                return Err(e);
            }
        };

        // Step 7: reserve the slot — the saga's serialization point.
        if let Err(e) = self.scheduler.reserve(slot.id, booking_id).await {
            self.compensate_promotion(&usage_token).await;
            self.release_equipment(&reserved_equipment).await;
            return Err(e);
        }

        let booking = Booking {
            id: booking_id,
            customer_ref: req.customer_ref,
            slot_ref: slot.id,
            status: BookingStatus::Pending,
            totals,
            pay_type: req.pay_type,
            cancellation_policy_snapshot,
            no_show_policy_snapshot,
            financials: Financials::default(),
            notes: req.notes,
            cancel_reason: None,
            timestamps: Timestamps {
                created_at: Some(now),
                ..Default::default()
            },
        };

        // Step 8: persist.
        let persisted = match self.bookings.create(booking, details).await {
            Ok(b) => b,
            Err(e) => {
                self.compensate_promotion(&usage_token).await;
                self.release_equipment(&reserved_equipment).await;
                let _ = self.scheduler.release(slot.id).await;
                return Err(e);
            }
        };

        if let Some(token) = &usage_token {
            // Best-effort: the booking is already durably persisted; a
            // failure to commit usage here is a promotion-ledger gap, not a
            // reason to unwind a committed booking.
            if let Err(e) = self.promotions.commit_usage(token).await {
                tracing::warn!(error = ?e, "failed to commit promotion usage after booking create");
            }
        }

        self.counters.bookings_created.fetch_add(1, std::sync::atomic::Ordering::Relaxed);

        notify_best_effort(
            self.notifier.as_ref(),
            persisted.customer_ref,
            NotificationKind::BookingCreated,
            serde_json::json!({ "bookingId": persisted.id }),
        )
        .await;

        Ok(persisted)
    }

    async fn release_equipment(&self, reserved: &[(Uuid, i32)]) {
        for (equipment_id, qty) in reserved {
            if let Err(e) = self.inventory.release(*equipment_id, *qty).await {
                tracing::warn!(%equipment_id, qty, error = ?e, "failed to release equipment during compensation");
            }
        }
    }

    async fn compensate_promotion(&self, usage_token: &Option<String>) {
        if let Some(token) = usage_token {
            if let Err(e) = self.promotions.release_usage(token).await {
                tracing::warn!(error = ?e, "failed to release promotion usage during compensation");
            }
        }
    }

    // ---------------------------------------------------------------
    // confirm
    // ---------------------------------------------------------------

    /// Staff-triggered manual confirm (`POST /bookings/:id/confirm`).
    /// The payment-driven path goes through `BookingConfirmHook` instead.
    pub async fn confirm_booking(&self, auth: &AuthContext, booking_id: Uuid) -> Result<Booking, AppError> {
        auth.require_staff_or_admin()?;
        self.confirm_internal(booking_id).await
    }

    async fn confirm_internal(&self, booking_id: Uuid) -> Result<Booking, AppError> {
        let now = self.clock.now();
        let booking = self
            .bookings
            .transition(booking_id, &[BookingStatus::Pending], BookingStatus::Confirmed, now)
            .await?;

        self.counters.bookings_confirmed.fetch_add(1, std::sync::atomic::Ordering::Relaxed);

        notify_best_effort(
            self.notifier.as_ref(),
            booking.customer_ref,
            NotificationKind::BookingConfirmed,
            serde_json::json!({ "bookingId": booking.id }),
        )
        .await;

        Ok(booking)
    }

    // ---------------------------------------------------------------
    // check-in / check-out
    // ---------------------------------------------------------------

    pub async fn check_in(&self, auth: &AuthContext, booking_id: Uuid) -> Result<Booking, AppError> {
        auth.require_staff_or_admin()?;

        let booking = self.bookings.get(booking_id).await?;
        if booking.status != BookingStatus::Confirmed {
            return Err(AppError::Conflict(ConflictKind::InvalidTransition));
        }

        let slot = self.scheduler.get(booking.slot_ref).await?;
        let now = self.clock.now();
        let window_start = slot.start - chrono::Duration::minutes(15);
        if now < window_start || now >= slot.end {
            return Err(AppError::PolicyViolation(
                "check-in is only allowed from 15 minutes before start until the slot ends".into(),
            ));
        }

        self.scheduler
            .transition(slot.id, &[SlotStatus::Booked], SlotStatus::Ongoing)
            .await?;

        let updated = match self
            .bookings
            .transition(booking_id, &[BookingStatus::Confirmed], BookingStatus::CheckedIn, now)
            .await
        {
            Ok(b) => b,
            Err(e) => {
                if let Err(compensation_err) = self
                    .scheduler
                    .transition(slot.id, &[SlotStatus::Ongoing], SlotStatus::Booked)
                    .await
                {
                    tracing::warn!(
                        %booking_id, error = ?compensation_err,
                        "failed to revert slot to booked after check-in transition failure"
                    );
                }
                return Err(e);
            }
        };

        Ok(updated)
    }

    pub async fn check_out(&self, auth: &AuthContext, booking_id: Uuid) -> Result<Booking, AppError> {
        auth.require_staff_or_admin()?;

        let booking = self.bookings.get(booking_id).await?;
        if booking.status != BookingStatus::CheckedIn {
            return Err(AppError::Conflict(ConflictKind::InvalidTransition));
        }

        let now = self.clock.now();
        let updated = self
            .bookings
            .transition(booking_id, &[BookingStatus::CheckedIn], BookingStatus::Completed, now)
            .await?;

        let slot = self.scheduler.get(booking.slot_ref).await?;
        self.scheduler
            .transition(slot.id, &[SlotStatus::Ongoing], SlotStatus::Completed)
            .await?;

        for detail in self.bookings.list_details(booking_id).await? {
            if detail.kind == DetailKind::Equipment {
                if let Err(e) = self.inventory.release(detail.target_ref, detail.quantity).await {
                    tracing::warn!(error = ?e, "failed to release equipment on check-out");
                }
            }
        }

        self.counters.bookings_completed.fetch_add(1, std::sync::atomic::Ordering::Relaxed);

        Ok(updated)
    }

    // ---------------------------------------------------------------
    // extend
    // ---------------------------------------------------------------

    pub async fn extension_quote(&self, booking_id: Uuid) -> Result<ExtensionQuote, AppError> {
        let booking = self.bookings.get(booking_id).await?;
        if !matches!(booking.status, BookingStatus::Confirmed | BookingStatus::CheckedIn) {
            return Ok(ExtensionQuote {
                can_extend: false,
                available_minutes: 0,
                reason: Some("booking is not in an extendable state".into()),
            });
        }

        let slot = self.scheduler.get(booking.slot_ref).await?;
        let available_minutes = self.max_extension_minutes(&slot).await?;
        if available_minutes <= 0 {
            return Ok(ExtensionQuote {
                can_extend: false,
                available_minutes: 0,
                reason: Some("no room before the next reservation".into()),
            });
        }

        Ok(ExtensionQuote {
            can_extend: true,
            available_minutes,
            reason: None,
        })
    }

    async fn max_extension_minutes(&self, slot: &crate::scheduler::Slot) -> Result<i64, AppError> {
        let next = self
            .scheduler
            .earliest_non_terminal_from(slot.studio_id, slot.end)
            .await?;
        let gap_minutes = match next {
            Some(n) => (n.start - slot.end).num_minutes(),
            None => i64::MAX / 2,
        };
        Ok((gap_minutes - self.min_gap_minutes).max(0))
    }

    pub async fn extend(
        &self,
        auth: &AuthContext,
        booking_id: Uuid,
        new_end: DateTime<Utc>,
    ) -> Result<(Booking, i64), AppError> {
        let booking = self.bookings.get(booking_id).await?;
        auth.require_owner_or_staff(booking.customer_ref)?;

        if !matches!(booking.status, BookingStatus::Confirmed | BookingStatus::CheckedIn) {
            return Err(AppError::Conflict(ConflictKind::InvalidTransition));
        }

        let slot = self.scheduler.get(booking.slot_ref).await?;
        if new_end <= slot.end {
            return Err(AppError::Validation("newEndTime must be after the current end".into()));
        }

        let max_minutes = self.max_extension_minutes(&slot).await?;
        if max_minutes <= 0 {
            return Err(AppError::Conflict(ConflictKind::ExtensionConflict));
        }

        let requested_minutes = (new_end - slot.end).num_minutes();
        if requested_minutes > max_minutes {
            return Err(AppError::Conflict(ConflictKind::ExtensionConflict));
        }

        let studio = self.studios.get(slot.studio_id).await?;
        let additional_hours = round_to_tenth(requested_minutes as f64 / 60.0);
        let additional_amount = ((studio.base_price_per_hour as f64) * additional_hours).round() as i64;

        self.scheduler.extend(slot.id, new_end).await?;

        let new_totals = Totals::compute(
            booking.totals.before_discount + additional_amount,
            booking.totals.discount_amount,
        );
        let updated = self.bookings.update_totals(booking_id, new_totals).await?;

        Ok((updated, additional_amount))
    }

    // ---------------------------------------------------------------
    // cancel
    // ---------------------------------------------------------------

    pub async fn cancel(
        &self,
        auth: &AuthContext,
        booking_id: Uuid,
        reason: String,
    ) -> Result<(Booking, RefundResult), AppError> {
        let booking = self.bookings.get(booking_id).await?;
        auth.require_owner_or_staff(booking.customer_ref)?;

        if !matches!(booking.status, BookingStatus::Pending | BookingStatus::Confirmed) {
            return Err(AppError::Conflict(ConflictKind::InvalidTransition));
        }

        let slot = self.scheduler.get(booking.slot_ref).await?;
        let now = self.clock.now();

        let refund = compute_refund(
            &booking.cancellation_policy_snapshot,
            slot.start,
            now,
            booking.totals.final_amount,
        );

        let updated = self
            .bookings
            .transition(
                booking_id,
                &[BookingStatus::Pending, BookingStatus::Confirmed],
                BookingStatus::Cancelled,
                now,
            )
            .await?;
        let updated = self.bookings.set_cancel_reason(updated.id, reason.clone()).await?;

        self.scheduler.release(slot.id).await?;
        self.release_booking_equipment(booking_id).await?;

        let financials = Financials {
            refund: refund.refund_amount,
            charge: refund.charge_amount,
            net: -refund.refund_amount,
        };
        let updated = self.bookings.update_financials(updated.id, financials).await?;

        if refund.refund_amount > 0 {
            // Background failure, not a primary-state-change failure (§7):
            // the cancellation itself is already committed, so a refund
            // gateway error is logged and left for retry rather than
            // surfaced to the caller.
            if let Err(e) = self
                .refund_requester()
                .refund_for_booking(booking_id, refund.refund_amount, &reason)
                .await
            {
                tracing::warn!(%booking_id, error = ?e, "refund request failed after cancellation committed");
            }
        }

        self.counters.bookings_cancelled.fetch_add(1, std::sync::atomic::Ordering::Relaxed);

        notify_best_effort(
            self.notifier.as_ref(),
            updated.customer_ref,
            NotificationKind::BookingCancelled,
            serde_json::json!({ "bookingId": updated.id, "refund": refund.refund_amount }),
        )
        .await;

        Ok((updated, refund))
    }

    async fn release_booking_equipment(&self, booking_id: Uuid) -> Result<(), AppError> {
        for detail in self.bookings.list_details(booking_id).await? {
            if detail.kind == DetailKind::Equipment {
                if let Err(e) = self.inventory.release(detail.target_ref, detail.quantity).await {
                    tracing::warn!(error = ?e, "failed to release equipment");
                }
            }
        }
        Ok(())
    }

    // ---------------------------------------------------------------
    // mark no-show
    // ---------------------------------------------------------------

    /// Manual staff invocation (`POST /bookings/:id/no-show`).
    pub async fn mark_no_show(
        &self,
        auth: &AuthContext,
        booking_id: Uuid,
        check_in_time: Option<DateTime<Utc>>,
    ) -> Result<Booking, AppError> {
        auth.require_staff_or_admin()?;
        self.mark_no_show_internal(booking_id, check_in_time).await
    }

    /// Background-worker invocation ("automatically by a worker when
    /// now ≥ start + graceMinutes and status is still confirmed"). Never
    /// fires for any status other than `confirmed`, per spec.
    pub async fn auto_mark_no_show_if_due(&self, booking_id: Uuid) -> Result<Option<Booking>, AppError> {
        let booking = self.bookings.get(booking_id).await?;
        if booking.status != BookingStatus::Confirmed {
            return Ok(None);
        }

        let slot = self.scheduler.get(booking.slot_ref).await?;
        let now = self.clock.now();
        let grace = chrono::Duration::minutes(booking.no_show_policy_snapshot.grace_minutes);
        if now < slot.start + grace {
            return Ok(None);
        }

        self.mark_no_show_internal(booking_id, None).await.map(Some)
    }

    async fn mark_no_show_internal(
        &self,
        booking_id: Uuid,
        check_in_time: Option<DateTime<Utc>>,
    ) -> Result<Booking, AppError> {
        let booking = self.bookings.get(booking_id).await?;
        if booking.status != BookingStatus::Confirmed {
            return Err(AppError::Conflict(ConflictKind::InvalidTransition));
        }

        let slot = self.scheduler.get(booking.slot_ref).await?;
        let previous_no_show_count = self.previous_no_show_count(booking.customer_ref).await?;

        let now = self.clock.now();
        let grace = chrono::Duration::minutes(booking.no_show_policy_snapshot.grace_minutes);
        let effective_instant = check_in_time.unwrap_or(now);
        if effective_instant <= slot.start + grace {
            return Err(AppError::PolicyViolation(
                "still within the no-show grace window".into(),
            ));
        }

        let charge: NoShowChargeResult = compute_no_show_charge(
            &booking.no_show_policy_snapshot,
            slot.start,
            check_in_time,
            booking.totals.final_amount,
            previous_no_show_count,
        );
        let updated = self
            .bookings
            .transition(booking_id, &[BookingStatus::Confirmed], BookingStatus::NoShow, now)
            .await?;

        self.scheduler.release(slot.id).await?;
        self.release_booking_equipment(booking_id).await?;

        let financials = Financials {
            refund: 0,
            charge: charge.charge_amount,
            net: charge.charge_amount,
        };
        let updated = self.bookings.update_financials(updated.id, financials).await?;

        self.counters.bookings_no_show.fetch_add(1, std::sync::atomic::Ordering::Relaxed);

        notify_best_effort(
            self.notifier.as_ref(),
            updated.customer_ref,
            NotificationKind::BookingNoShow,
            serde_json::json!({ "bookingId": updated.id, "charge": charge.charge_amount }),
        )
        .await;

        Ok(updated)
    }

    /// Candidate ids for the background no-show sweep. Returns
    /// every currently `confirmed` booking; `auto_mark_no_show_if_due` itself
    /// re-checks eligibility, so a stale or non-due id here is a harmless
    /// no-op rather than a correctness hazard.
    pub async fn list_confirmed_for_no_show_sweep(&self) -> Result<Vec<Uuid>, AppError> {
        let bookings = self.bookings.list(None, Some(BookingStatus::Confirmed), 1, 10_000).await?;
        Ok(bookings.into_iter().map(|b| b.id).collect())
    }

    async fn previous_no_show_count(&self, customer_ref: Uuid) -> Result<i64, AppError> {
        let bookings = self
            .bookings
            .list(Some(customer_ref), Some(BookingStatus::NoShow), 1, 10_000)
            .await?;
        Ok(bookings.len() as i64)
    }

    // ---------------------------------------------------------------
    // staff update
    // ---------------------------------------------------------------

    pub async fn update(
        &self,
        auth: &AuthContext,
        booking_id: Uuid,
        req: UpdateBookingRequest,
    ) -> Result<Booking, AppError> {
        auth.require_staff_or_admin()?;

        let mut booking = self.bookings.get(booking_id).await?;
        if booking.status.is_terminal() {
            return Err(AppError::Conflict(ConflictKind::InvalidTransition));
        }

        if let Some(notes) = req.notes {
            booking = self.bookings.update_notes(booking_id, notes).await?;
        }

        let duration_hours = {
            let slot = self.scheduler.get(booking.slot_ref).await?;
            round_to_tenth(slot.duration_hours())
        };

        // Mirrors the create-booking saga's compensation shape: track every
        // equipment reservation and every inserted detail row as we go, and
        // unwind both on any failure so a partial `add_details` never leaves
        // dangling reservations or orphan rows (§4.4.7).
        let mut added_equipment: Vec<(Uuid, i32)> = Vec::new();
        let mut added_detail_ids: Vec<Uuid> = Vec::new();
        let mut delta: i64 = 0;

        let add_result: Result<(), AppError> = async {
            for d in &req.add_details {
                let (price_per_unit, subtotal) = match d.kind {
                    DetailKind::Equipment => {
                        self.inventory.reserve(d.target_ref, d.quantity).await?;
                        added_equipment.push((d.target_ref, d.quantity));
                        let equipment = self.inventory.get(d.target_ref).await?;
                        let subtotal = ((equipment.price_per_hour * d.quantity as i64) as f64
                            * duration_hours)
                            .round() as i64;
                        (equipment.price_per_hour, subtotal)
                    }
                    DetailKind::Service => {
                        let price = self.services.price_per_unit(d.target_ref).await?;
                        (price, price * d.quantity as i64)
                    }
                };
                delta += subtotal;
                let detail_id = Uuid::new_v4();
                self.bookings
                    .add_detail(BookingDetail {
                        id: detail_id,
                        booking_ref: booking_id,
                        kind: d.kind,
                        target_ref: d.target_ref,
                        quantity: d.quantity,
                        price_per_unit,
                        subtotal,
                    })
                    .await?;
                added_detail_ids.push(detail_id);
            }
            Ok(())
        }
        .await;

        if let Err(e) = add_result {
            for detail_id in &added_detail_ids {
                if let Err(del_err) = self.bookings.remove_detail(*detail_id).await {
                    tracing::warn!(%detail_id, error = ?del_err, "failed to delete partially-added detail during compensation");
                }
            }
            self.release_equipment(&added_equipment).await;
            return Err(e);
        }

        for detail_id in &req.remove_detail_ids {
            let removed = self.bookings.remove_detail(*detail_id).await?;
            if removed.kind == DetailKind::Equipment {
                let _ = self.inventory.release(removed.target_ref, removed.quantity).await;
            }
            delta -= removed.subtotal;
        }

        let discount_amount = req.discount_amount.unwrap_or(booking.totals.discount_amount);
        let new_before_discount = (booking.totals.before_discount + delta).max(0);
        let new_totals = Totals::compute(new_before_discount, discount_amount);
        let updated = self.bookings.update_totals(booking_id, new_totals).await?;

        Ok(updated)
    }
}

/// Rounds a duration in hours to 0.1h granularity.
fn round_to_tenth(hours: f64) -> f64 {
    (hours * 10.0).round() / 10.0
}

#[async_trait]
impl BookingConfirmHook for BookingEngine {
    /// Fires once per booking: a later payment (e.g. the remainder after a
    /// deposit already confirmed it) also
    /// crosses the threshold and calls this again, so re-confirming an
    /// already-confirmed booking is treated as a no-op rather than an error.
    async fn on_payment_threshold_met(&self, booking_id: Uuid) -> Result<(), AppError> {
        match self.confirm_internal(booking_id).await {
            Ok(_) => Ok(()),
            Err(AppError::Conflict(ConflictKind::InvalidTransition)) => Ok(()),
            Err(e) => Err(e),
        }
    }

    async fn booking_payment_context(&self, booking_id: Uuid) -> Result<BookingPaymentContext, AppError> {
        let booking = self.bookings.get(booking_id).await?;
        Ok(BookingPaymentContext {
            final_amount: booking.totals.final_amount,
            confirmation_threshold_percent: booking.pay_type.confirmation_threshold_percent(),
            customer_ref: booking.customer_ref,
            is_terminal: booking.status.is_terminal(),
        })
    }
}
