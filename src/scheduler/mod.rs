pub mod model;
pub mod repository;
pub mod repository_sqlx;

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::time::sleep;
use uuid::Uuid;

use crate::config::AppConfig;
use crate::error::AppError;
use crate::logger::warn_if_slow;
use crate::metrics::Counters;
use crate::studio::StudioRepository;

pub use model::{Slot, SlotRange, SlotStatus};
pub use repository::ScheduleRepository;

/// Owns the studio calendar. Every write is a single conditional SQL
/// statement in the repository; this layer adds validation, the studio-active
/// check, and a bounded retry for transient CAS losses.
pub struct Scheduler {
    repo: Arc<dyn ScheduleRepository>,
    studios: Arc<dyn StudioRepository>,
    config: Arc<AppConfig>,
    counters: Counters,
}

impl Scheduler {
    pub fn new(
        repo: Arc<dyn ScheduleRepository>,
        studios: Arc<dyn StudioRepository>,
        config: Arc<AppConfig>,
        counters: Counters,
    ) -> Self {
        Self {
            repo,
            studios,
            config,
            counters,
        }
    }

    fn validate_range(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> Result<(), AppError> {
        if end <= start {
            return Err(AppError::Validation("slot end must be after start".into()));
        }
        let minutes = (end - start).num_minutes();
        if minutes < self.config.slot_min_duration_minutes {
            return Err(AppError::Validation(format!(
                "slot duration must be at least {} minutes",
                self.config.slot_min_duration_minutes
            )));
        }
        Ok(())
    }

    async fn assert_studio_active(&self, studio_id: Uuid) -> Result<(), AppError> {
        let studio = self.studios.get(studio_id).await?;
        if !studio.is_active() {
            return Err(AppError::Validation(format!(
                "studio {studio_id} is not accepting bookings"
            )));
        }
        Ok(())
    }

    #[tracing::instrument(skip(self))]
    pub async fn create_slot(
        &self,
        studio_id: Uuid,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Slot, AppError> {
        self.validate_range(start, end)?;
        self.assert_studio_active(studio_id).await?;
        self.repo
            .create_slot(studio_id, start, end, self.config.slot_min_gap_minutes)
            .await
    }

    /// Finds an existing `available` slot matching the window, or creates one.
    /// Used by the Booking Engine's create-booking saga so a booking
    /// request against an empty calendar still succeeds.
    #[tracing::instrument(skip(self))]
    pub async fn find_or_create_available(
        &self,
        studio_id: Uuid,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Slot, AppError> {
        self.validate_range(start, end)?;
        if let Some(slot) = self.repo.find_available_matching(studio_id, start, end).await? {
            return Ok(slot);
        }
        self.create_slot(studio_id, start, end).await
    }

    pub async fn get(&self, slot_id: Uuid) -> Result<Slot, AppError> {
        self.repo.get(slot_id).await
    }

    /// Reserves a slot for a booking, retrying transient CAS losses up to
    /// `conflict_retry_attempts` times before surfacing a definitive
    /// `Conflict(SlotUnavailable)` to the saga.
    #[tracing::instrument(skip(self))]
    pub async fn reserve(&self, slot_id: Uuid, booking_id: Uuid) -> Result<Slot, AppError> {
        warn_if_slow("slot_reserve", std::time::Duration::from_millis(100), async {
            self.with_retry(|| {
                let repo = self.repo.clone();
                async move { repo.reserve(slot_id, booking_id).await }
            })
            .await
        })
        .await
    }

    pub async fn release(&self, slot_id: Uuid) -> Result<Slot, AppError> {
        self.repo.release(slot_id).await
    }

    pub async fn transition(
        &self,
        slot_id: Uuid,
        expected: &[SlotStatus],
        target: SlotStatus,
    ) -> Result<Slot, AppError> {
        self.repo.transition(slot_id, expected, target).await
    }

    #[tracing::instrument(skip(self))]
    pub async fn extend(
        &self,
        slot_id: Uuid,
        new_end: DateTime<Utc>,
    ) -> Result<Slot, AppError> {
        self.repo
            .extend(slot_id, new_end, self.config.slot_min_gap_minutes)
            .await
    }

    pub async fn earliest_non_terminal_from(
        &self,
        studio_id: Uuid,
        after: DateTime<Utc>,
    ) -> Result<Option<Slot>, AppError> {
        self.repo.earliest_non_terminal_from(studio_id, after).await
    }

    pub async fn list(
        &self,
        studio_id: Uuid,
        range: &SlotRange,
        statuses: &[SlotStatus],
    ) -> Result<Vec<Slot>, AppError> {
        self.repo.list(studio_id, range, statuses).await
    }

    /// Bounded exponential-ish backoff retry wrapper for CAS contention.
    /// Only retries conflicts the caller can plausibly win on a second
    /// attempt; validation and not-found errors pass through immediately.
    async fn with_retry<F, Fut>(&self, mut f: F) -> Result<Slot, AppError>
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = Result<Slot, AppError>>,
    {
        let mut attempt: u32 = 0;
        loop {
            match f().await {
                Ok(slot) => return Ok(slot),
                Err(e) if e.is_retryable_conflict() && attempt + 1 < self.config.conflict_retry_attempts => {
                    attempt += 1;
                    self.counters
                        .slot_conflict_retries
                        .fetch_add(1, std::sync::atomic::Ordering::Relaxed);
                    let backoff = self.config.conflict_retry_backoff_ms * attempt as u64;
                    sleep(std::time::Duration::from_millis(backoff)).await;
                }
                Err(e) => {
                    if e.is_retryable_conflict() {
                        self.counters
                            .slot_conflicts
                            .fetch_add(1, std::sync::atomic::Ordering::Relaxed);
                    }
                    return Err(e);
                }
            }
        }
    }
}
