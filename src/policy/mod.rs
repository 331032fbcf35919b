pub mod engine;
pub mod model;
pub mod store;

pub use engine::{compute_no_show_charge, compute_refund, NoShowChargeResult, RefundResult};
pub use model::{
    CancellationPolicySnapshot, NoShowChargeType, NoShowPolicySnapshot, Policy, PolicyKind,
    PolicyPayload, RefundTier,
};
pub use store::{PolicyStore, SqlxPolicyStore};
