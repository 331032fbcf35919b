pub mod gateway;
pub mod model;
pub mod orchestrator;
pub mod repository;
pub mod repository_sqlx;

pub use gateway::{CreateLinkRequest, CreateLinkResponse, Gateway, HttpGateway, MockGateway};
pub use model::{Payment, PaymentKind, PaymentOption, PaymentSession, PaymentStatus};
pub use orchestrator::{
    BookingConfirmHook, BookingPaymentContext, PaymentOrchestrator, RefundRequester, WebhookOutcome,
};
pub use repository::PaymentRepository;
pub use repository_sqlx::SqlxPaymentRepository;
