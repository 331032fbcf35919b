use async_trait::async_trait;
use uuid::Uuid;

use crate::error::AppError;

/// Price lookup for `BookingDetail` service-kind line items. The service
/// catalog itself (what services exist, their descriptions, availability
/// windows) is out-of-scope CRUD admin data; the core only depends on
/// this narrow price-at-booking-time capability, the same shape as
/// `PromotionValidator`.
#[async_trait]
pub trait ServiceCatalog: Send + Sync {
    async fn price_per_unit(&self, service_id: Uuid) -> Result<i64, AppError>;
}

/// Default shim: no services are catalogued in the core. Deployments that
/// offer bookable services wire a real catalog lookup behind this trait.
#[derive(Clone, Default)]
pub struct NoServiceCatalog;

#[async_trait]
impl ServiceCatalog for NoServiceCatalog {
    async fn price_per_unit(&self, service_id: Uuid) -> Result<i64, AppError> {
        Err(AppError::NotFound(format!("service {service_id}")))
    }
}
