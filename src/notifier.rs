use async_trait::async_trait;
use serde::Serialize;
use uuid::Uuid;

/// Lifecycle events the Booking Engine and Payment Orchestrator emit.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    BookingCreated,
    BookingConfirmed,
    BookingCancelled,
    BookingNoShow,
    PaymentSuccess,
    PaymentFailed,
    RefundIssued,
}

/// Fire-and-forget outbound notification channel (email/SMS/socket — all out
/// of scope here). The core only depends on this narrow trait; failures
/// are logged and swallowed, never propagated to the caller.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, user_id: Uuid, kind: NotificationKind, payload: serde_json::Value);
}

/// Default shim: logs the event and does nothing else. Production
/// deployments wire a real email/SMS/socket-broadcasting implementation
/// behind this trait; that wiring is out of scope here.
#[derive(Clone, Default)]
pub struct LoggingNotifier;

#[async_trait]
impl Notifier for LoggingNotifier {
    async fn send(&self, user_id: Uuid, kind: NotificationKind, payload: serde_json::Value) {
        tracing::info!(
            %user_id,
            kind = ?kind,
            payload = %payload,
            "notification emitted"
        );
    }
}

/// Sends a notification without letting a slow/failing notifier block or
/// fail the caller. Retries are not attempted here: notifier failures are
/// logged and swallowed, not retried.
pub async fn notify_best_effort(
    notifier: &dyn Notifier,
    user_id: Uuid,
    kind: NotificationKind,
    payload: serde_json::Value,
) {
    notifier.send(user_id, kind, payload).await;
}
