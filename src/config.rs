#[derive(Clone, Debug)]
pub struct AppConfig {
    /// Database connection string. Env: `DB_URI`.
    pub database_url: String,

    /// HTTP port the (out-of-scope) transport layer would bind to. Env: `PORT`.
    pub port: u16,

    /// Base URL used to build the gateway's `returnUrl`/`cancelUrl`. Env: `FRONTEND_URL`.
    pub frontend_url: String,

    // =========================
    // Payment gateway configuration
    // =========================
    /// Shared secret used to verify `x-payos-signature` on inbound webhooks.
    pub gateway_checksum_key: String,

    /// Gateway client identifier, sent on link-creation requests.
    pub gateway_client_id: String,

    /// Gateway API key, sent on link-creation requests.
    pub gateway_api_key: String,

    // =========================
    // Scheduler configuration
    // =========================
    /// Minimum separation, in minutes, required between any two non-terminal
    /// slots of the same studio.
    pub slot_min_gap_minutes: i64,

    /// Minimum slot duration, in minutes.
    pub slot_min_duration_minutes: i64,

    // =========================
    // Payment configuration
    // =========================
    /// Payment session lifetime, in minutes, before it is swept to expired.
    pub payment_expiry_minutes: i64,

    /// Interval, in seconds, at which the payment-expiry sweep worker runs.
    pub payment_sweep_interval_secs: u64,

    /// Interval, in seconds, at which the no-show auto-mark worker runs.
    pub no_show_sweep_interval_secs: u64,

    // =========================
    // Conflict-retry configuration
    // =========================
    /// Bound on transparent retries for slot/equipment CAS conflicts.
    pub conflict_retry_attempts: u32,

    /// Base backoff, in milliseconds, for the jittered conflict retry.
    pub conflict_retry_backoff_ms: u64,

    /// Whether webhook signature failures are answered with HTTP 200
    /// (anti-replay posture) or surfaced as an error. Defaults to the
    /// anti-replay behavior, gated so it can be flipped without a code
    /// change if that reasoning turns out wrong.
    pub webhook_always_200_on_bad_signature: bool,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let database_url =
            std::env::var("DB_URI").unwrap_or_else(|_| "sqlite://studio_booking_dev.db".to_string());

        let port = std::env::var("PORT")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(8080);

        let frontend_url =
            std::env::var("FRONTEND_URL").unwrap_or_else(|_| "http://localhost:3000".to_string());

        let gateway_checksum_key = std::env::var("GATEWAY_CHECKSUM_KEY").unwrap_or_default();
        let gateway_client_id = std::env::var("GATEWAY_CLIENT_ID").unwrap_or_default();
        let gateway_api_key = std::env::var("GATEWAY_API_KEY").unwrap_or_default();

        Self {
            database_url,
            port,
            frontend_url,
            gateway_checksum_key,
            gateway_client_id,
            gateway_api_key,

            slot_min_gap_minutes: 30,
            slot_min_duration_minutes: 60,

            payment_expiry_minutes: 15,
            payment_sweep_interval_secs: 60,
            no_show_sweep_interval_secs: 60,

            conflict_retry_attempts: 3,
            conflict_retry_backoff_ms: 20,

            webhook_always_200_on_bad_signature: true,
        }
    }
}
