use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use uuid::Uuid;

use crate::config::AppConfig;
use crate::error::AppError;
use crate::metrics::Counters;
use crate::notifier::{notify_best_effort, NotificationKind, Notifier};
use crate::payment::gateway::{BuyerInfo, CreateLinkRequest, Gateway, LineItem};
use crate::payment::model::{Payment, PaymentKind, PaymentOption, PaymentSession, PaymentStatus};
use crate::payment::repository::PaymentRepository;
use crate::time::Clock;

/// Narrow hook the Orchestrator calls on successful webhook processing to
/// confirm the booking. Implemented by `booking::engine::BookingEngine`;
/// kept as a trait here so this module does not need to depend on the
/// booking engine's full surface, only the one transition it is allowed to
/// trigger.
#[async_trait]
pub trait BookingConfirmHook: Send + Sync {
    /// Booking id, final_amount, pay_type threshold percent, cumulative paid.
    async fn on_payment_threshold_met(&self, booking_id: Uuid) -> Result<(), AppError>;

    /// `(final_amount, confirmation_threshold_percent, customer_ref)` for the booking.
    async fn booking_payment_context(&self, booking_id: Uuid) -> Result<BookingPaymentContext, AppError>;
}

#[derive(Clone, Copy, Debug)]
pub struct BookingPaymentContext {
    pub final_amount: i64,
    pub confirmation_threshold_percent: i64,
    pub customer_ref: Uuid,
    pub is_terminal: bool,
}

/// Gateway webhook body shape: `{orderCode, code, desc, data}`.
#[derive(Debug, Deserialize)]
pub struct WebhookBody {
    #[serde(rename = "orderCode")]
    pub order_code: i64,
    pub code: String,
    #[allow(dead_code)]
    pub desc: String,
    #[serde(default)]
    pub data: serde_json::Value,
}

const SUCCESS_CODE: &str = "00";

/// Hook that lets the Booking Engine enqueue a refund without depending on
/// the Orchestrator's full surface.
#[async_trait]
pub trait RefundRequester: Send + Sync {
    async fn refund_for_booking(&self, booking_id: Uuid, amount: i64, reason: &str) -> Result<(), AppError>;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WebhookOutcome {
    Processed,
    AlreadyProcessed,
    UnknownTransaction,
    InvalidSignature,
    MarkedFailed,
}

/// Drives the external payment gateway and reconciles webhooks.
/// Payment rows are this component's exclusive boundary.
pub struct PaymentOrchestrator {
    payments: Arc<dyn PaymentRepository>,
    gateway: Arc<dyn Gateway>,
    confirm_hook: Arc<dyn BookingConfirmHook>,
    notifier: Arc<dyn Notifier>,
    clock: Arc<dyn Clock>,
    config: Arc<AppConfig>,
    counters: Counters,
    frontend_url: String,
}

impl PaymentOrchestrator {
    pub fn new(
        payments: Arc<dyn PaymentRepository>,
        gateway: Arc<dyn Gateway>,
        confirm_hook: Arc<dyn BookingConfirmHook>,
        notifier: Arc<dyn Notifier>,
        clock: Arc<dyn Clock>,
        config: Arc<AppConfig>,
        counters: Counters,
    ) -> Self {
        let frontend_url = config.frontend_url.clone();
        Self {
            payments,
            gateway,
            confirm_hook,
            notifier,
            clock,
            config,
            counters,
            frontend_url,
        }
    }

    async fn cumulative_paid(&self, booking_id: Uuid) -> Result<i64, AppError> {
        let payments = self.payments.list_for_booking(booking_id).await?;
        Ok(payments
            .iter()
            .filter(|p| p.status == PaymentStatus::Paid && p.kind != PaymentKind::Fine)
            .map(|p| p.amount)
            .sum())
    }

    /// `create_payment_options`: the offered `{kind, percentage, amount}`
    /// list, no gateway session created yet.
    pub async fn create_payment_options(&self, booking_id: Uuid) -> Result<Vec<PaymentOption>, AppError> {
        let ctx = self.confirm_hook.booking_payment_context(booking_id).await?;
        let paid = self.cumulative_paid(booking_id).await?;
        let remaining = (ctx.final_amount - paid).max(0);

        let pct = |p: i64| (ctx.final_amount * p) / 100;

        Ok(vec![
            PaymentOption {
                kind: PaymentKind::Deposit,
                percentage: 30,
                amount: pct(30).min(remaining),
            },
            PaymentOption {
                kind: PaymentKind::Deposit,
                percentage: 50,
                amount: pct(50).min(remaining),
            },
            PaymentOption {
                kind: PaymentKind::Full,
                percentage: 100,
                amount: remaining,
            },
        ])
    }

    /// `create_session`. Idempotently returns an existing unexpired
    /// pending payment of the same kind rather than creating a duplicate.
    pub async fn create_session(
        &self,
        booking_id: Uuid,
        kind: PaymentKind,
        percentage: i64,
    ) -> Result<PaymentSession, AppError> {
        let ctx = self.confirm_hook.booking_payment_context(booking_id).await?;
        if ctx.is_terminal {
            return Err(AppError::Conflict(crate::error::ConflictKind::InvalidTransition));
        }

        let now = self.clock.now();
        let paid = self.cumulative_paid(booking_id).await?;
        if paid >= ctx.final_amount {
            return Err(AppError::Validation(
                "booking is already fully paid".into(),
            ));
        }

        if let Some(existing) = self.payments.find_pending(booking_id, kind, now).await? {
            return Ok(PaymentSession {
                payment_id: existing.id,
                checkout_url: existing.checkout_url,
                qr_code: String::new(),
                expires_at: existing.expires_at,
            });
        }

        let amount = ((ctx.final_amount * percentage) / 100).min(ctx.final_amount - paid);
        self.create_session_for_amount(booking_id, kind, amount, now)
            .await
    }

    /// `create_remainder`: session for `final_amount - sum(paid deposits)`.
    pub async fn create_remainder(&self, booking_id: Uuid) -> Result<PaymentSession, AppError> {
        let ctx = self.confirm_hook.booking_payment_context(booking_id).await?;
        if ctx.is_terminal {
            return Err(AppError::Conflict(crate::error::ConflictKind::InvalidTransition));
        }

        let paid = self.cumulative_paid(booking_id).await?;
        if paid == 0 {
            return Err(AppError::Validation(
                "no deposit has been paid yet".into(),
            ));
        }

        let remaining = ctx.final_amount - paid;
        if remaining <= 0 {
            return Err(AppError::Validation(
                "booking is already fully paid".into(),
            ));
        }

        let now = self.clock.now();
        if let Some(existing) = self
            .payments
            .find_pending(booking_id, PaymentKind::Remainder, now)
            .await?
        {
            return Ok(PaymentSession {
                payment_id: existing.id,
                checkout_url: existing.checkout_url,
                qr_code: String::new(),
                expires_at: existing.expires_at,
            });
        }

        self.create_session_for_amount(booking_id, PaymentKind::Remainder, remaining, now)
            .await
    }

    async fn create_session_for_amount(
        &self,
        booking_id: Uuid,
        kind: PaymentKind,
        amount: i64,
        now: DateTime<Utc>,
    ) -> Result<PaymentSession, AppError> {
        if amount <= 0 {
            return Err(AppError::Validation(
                "payment amount must be positive".into(),
            ));
        }

        let payment_id = Uuid::new_v4();
        // Gateway order codes are numeric; derive a stable one from the
        // payment id's low bits rather than a random/counter source so a
        // retried create is reproducible for debugging.
        let order_code = (payment_id.as_u128() & 0x7fff_ffff_ffff) as i64;

        let link = self
            .gateway
            .create_link(CreateLinkRequest {
                order_code,
                amount,
                description: format!("Booking {}", &booking_id.to_string()[..8]),
                items: vec![LineItem {
                    name: kind.as_str().to_string(),
                    quantity: 1,
                    price: amount,
                }],
                return_url: format!("{}/bookings/{}", self.frontend_url, booking_id),
                cancel_url: format!("{}/bookings/{}", self.frontend_url, booking_id),
                buyer_info: BuyerInfo::default(),
            })
            .await?;

        let expires_at = now + chrono::Duration::minutes(self.config.payment_expiry_minutes);

        let payment = Payment {
            id: payment_id,
            booking_ref: booking_id,
            amount,
            kind,
            status: PaymentStatus::Pending,
            transaction_id: order_code.to_string(),
            checkout_url: link.checkout_url.clone(),
            created_at: now,
            expires_at,
            paid_at: None,
        };

        let created = self.payments.create(payment).await?;
        self.counters.payments_created.fetch_add(1, std::sync::atomic::Ordering::Relaxed);

        Ok(PaymentSession {
            payment_id: created.id,
            checkout_url: link.checkout_url,
            qr_code: link.qr_code,
            expires_at: created.expires_at,
        })
    }

    pub async fn get_status(&self, payment_id: Uuid) -> Result<Payment, AppError> {
        self.payments.get(payment_id).await
    }

    /// Webhook ingress — the critical reconciliation path.
    #[tracing::instrument(skip(self, raw_body))]
    pub async fn handle_webhook(
        &self,
        raw_body: &[u8],
        signature_hex: &str,
    ) -> Result<WebhookOutcome, AppError> {
        if !self.gateway.verify_signature(raw_body, signature_hex) {
            self.counters
                .webhooks_rejected_signature
                .fetch_add(1, std::sync::atomic::Ordering::Relaxed);
            tracing::warn!("webhook signature verification failed");
            if self.config.webhook_always_200_on_bad_signature {
                return Ok(WebhookOutcome::InvalidSignature);
            }
            return Err(AppError::Unauthorized);
        }

        let body: WebhookBody = serde_json::from_slice(raw_body)
            .map_err(|e| AppError::Validation(format!("malformed webhook body: {e}")))?;

        let Some(payment) = self
            .payments
            .find_by_transaction_id(&body.order_code.to_string())
            .await?
        else {
            self.counters
                .webhooks_ignored_unknown
                .fetch_add(1, std::sync::atomic::Ordering::Relaxed);
            return Ok(WebhookOutcome::UnknownTransaction);
        };

        if payment.status != PaymentStatus::Pending {
            // Step 3: already processed, idempotent no-op.
            return Ok(WebhookOutcome::AlreadyProcessed);
        }

        if body.code != SUCCESS_CODE {
            self.payments.mark_failed(payment.id).await?;
            self.counters
                .payments_failed
                .fetch_add(1, std::sync::atomic::Ordering::Relaxed);

            let ctx = self.confirm_hook.booking_payment_context(payment.booking_ref).await?;
            notify_best_effort(
                self.notifier.as_ref(),
                ctx.customer_ref,
                NotificationKind::PaymentFailed,
                serde_json::json!({ "paymentId": payment.id, "bookingId": payment.booking_ref }),
            )
            .await;

            return Ok(WebhookOutcome::MarkedFailed);
        }

        let now = self.clock.now();
        let Some(paid) = self.payments.mark_paid(payment.id, now).await? else {
            // Lost the race to a concurrent duplicate delivery; idempotent.
            return Ok(WebhookOutcome::AlreadyProcessed);
        };

        self.counters
            .payments_succeeded
            .fetch_add(1, std::sync::atomic::Ordering::Relaxed);

        let cumulative = self.cumulative_paid(paid.booking_ref).await?;
        let ctx = self.confirm_hook.booking_payment_context(paid.booking_ref).await?;

        if !ctx.is_terminal {
            let required = (ctx.final_amount * ctx.confirmation_threshold_percent) / 100;
            if cumulative >= required {
                self.confirm_hook.on_payment_threshold_met(paid.booking_ref).await?;
            }
        }

        notify_best_effort(
            self.notifier.as_ref(),
            ctx.customer_ref,
            NotificationKind::PaymentSuccess,
            serde_json::json!({ "paymentId": paid.id, "bookingId": paid.booking_ref, "amount": paid.amount }),
        )
        .await;

        Ok(WebhookOutcome::Processed)
    }

    /// `request_refund`: marks the payment `refunded`; the actual gateway
    /// refund call is out of scope (the gateway interface only exposes
    /// `create_link`/`verify_signature`), so this records the outcome and
    /// fires the `refund_issued` notification.
    pub async fn request_refund(&self, payment_id: Uuid, amount: i64, reason: &str) -> Result<Payment, AppError> {
        let payment = self.payments.get(payment_id).await?;
        if payment.status != PaymentStatus::Paid {
            return Err(AppError::Validation(
                "only a paid payment can be refunded".into(),
            ));
        }
        if amount > payment.amount {
            return Err(AppError::Validation(
                "refund amount exceeds the original payment".into(),
            ));
        }

        let updated = self.payments.mark_status(payment_id, PaymentStatus::Refunded).await?;
        tracing::info!(%payment_id, amount, reason, "refund recorded");

        let ctx = self.confirm_hook.booking_payment_context(updated.booking_ref).await?;
        notify_best_effort(
            self.notifier.as_ref(),
            ctx.customer_ref,
            NotificationKind::RefundIssued,
            serde_json::json!({ "paymentId": payment_id, "amount": amount, "reason": reason }),
        )
        .await;

        Ok(updated)
    }

    /// Expiry sweep: pending payments past `expires_at` become `expired`.
    /// Does not touch booking state — the caller may open a new session.
    pub async fn sweep_expired(&self) -> Result<usize, AppError> {
        let now = self.clock.now();
        let expired = self.payments.list_expired_pending(now).await?;
        let mut swept = 0;
        for payment in expired {
            self.payments.mark_status(payment.id, PaymentStatus::Expired).await?;
            self.counters
                .payments_expired
                .fetch_add(1, std::sync::atomic::Ordering::Relaxed);
            swept += 1;
        }
        Ok(swept)
    }
}

#[async_trait]
impl RefundRequester for PaymentOrchestrator {
    /// Enqueues a refund request if there exists a paid payment ≥
    /// refundAmount. A no-op if no single paid payment covers it —
    /// partial/split refunds are left unspecified and this crate does not
    /// invent a policy for them.
    async fn refund_for_booking(&self, booking_id: Uuid, amount: i64, reason: &str) -> Result<(), AppError> {
        let payments = self.payments.list_for_booking(booking_id).await?;
        if let Some(candidate) = payments
            .into_iter()
            .find(|p| p.status == PaymentStatus::Paid && p.amount >= amount)
        {
            self.request_refund(candidate.id, amount, reason).await?;
        } else {
            tracing::warn!(%booking_id, amount, "no single paid payment covers the refund amount");
        }
        Ok(())
    }
}
