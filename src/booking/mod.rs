pub mod engine;
pub mod model;
pub mod repository;
pub mod repository_sqlx;
pub mod service_catalog;

pub use engine::{BookingEngine, CreateBookingRequest, ExtensionQuote, UpdateBookingRequest};
pub use model::{
    Booking, BookingDetail, BookingStatus, DetailKind, DetailRequest, Financials, PayType, Timestamps,
    Totals,
};
pub use repository::BookingRepository;
pub use repository_sqlx::SqlxBookingRepository;
pub use service_catalog::{NoServiceCatalog, ServiceCatalog};
