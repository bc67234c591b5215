pub mod ledger;
pub mod payment;

pub use payment::{PaymentOrchestrator, PaymentOutcome, PaymentRequest};
