use axum::response::{IntoResponse, Response};
use serde::Serialize;
use std::sync::Arc;

use crate::services::PaymentOrchestrator;
use crate::store::PaymentStore;
use crate::utils::response::success;

pub mod payments;

pub use payments::{delete_payment, get_payment, list_ledger, submit_payment};

/// Shared application state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<PaymentOrchestrator>,
    pub store: Arc<dyn PaymentStore>,
}

#[derive(Serialize)]
struct HealthPayload {
    status: &'static str,
    service: &'static str,
}

pub async fn health_check() -> Response {
    let payload = HealthPayload {
        status: "ok",
        service: "scanpay-api",
    };

    success(payload, "Health check successful").into_response()
}
