use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::str::FromStr;
use uuid::Uuid;

use crate::handlers::AppState;
use crate::models::{PaymentMethod, TransactionStatus};
use crate::services::PaymentRequest;
use crate::utils::error::AppError;
use crate::utils::response::{created, empty_success, error as error_response, success};

/// Raw submission body; every field is validated by hand so the caller gets
/// field-level errors instead of a deserializer rejection.
#[derive(Debug, Deserialize)]
pub struct PaymentSubmission {
    pub client: Option<String>,
    pub merchant: Option<String>,
    pub amount: Option<Value>,
    pub payment_method: Option<String>,
    pub description: Option<String>,
}

#[derive(Serialize)]
pub struct PaymentCreatedResponse {
    pub transaction_id: Uuid,
    pub reference: String,
    pub message: String,
    pub status: TransactionStatus,
    pub transaction_ref: Uuid,
}

fn required_uuid(
    field: &str,
    value: &Option<String>,
    errors: &mut serde_json::Map<String, Value>,
) -> Option<Uuid> {
    match value {
        None => {
            errors.insert(field.to_string(), json!("This field is required"));
            None
        }
        Some(raw) => match Uuid::parse_str(raw) {
            Ok(id) => Some(id),
            Err(_) => {
                errors.insert(field.to_string(), json!("Must be a valid UUID"));
                None
            }
        },
    }
}

fn parse_amount(value: &Option<Value>, errors: &mut serde_json::Map<String, Value>) -> Option<Decimal> {
    let raw = match value {
        None => {
            errors.insert("amount".to_string(), json!("This field is required"));
            return None;
        }
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        Some(_) => {
            errors.insert("amount".to_string(), json!("Must be a decimal number"));
            return None;
        }
    };

    let amount = match Decimal::from_str(&raw) {
        Ok(amount) => amount,
        Err(_) => {
            errors.insert("amount".to_string(), json!("Must be a decimal number"));
            return None;
        }
    };

    if amount <= Decimal::ZERO {
        errors.insert("amount".to_string(), json!("Must be greater than zero"));
        return None;
    }
    if amount.normalize().scale() > 2 {
        errors.insert(
            "amount".to_string(),
            json!("At most 2 decimal places are allowed"),
        );
        return None;
    }
    Some(amount)
}

fn validate(body: PaymentSubmission) -> Result<PaymentRequest, Response> {
    let mut errors = serde_json::Map::new();

    let client_id = required_uuid("client", &body.client, &mut errors);
    let merchant_id = required_uuid("merchant", &body.merchant, &mut errors);
    let amount = parse_amount(&body.amount, &mut errors);

    let payment_method = match &body.payment_method {
        None => Some(PaymentMethod::default()),
        Some(raw) => match raw.parse::<PaymentMethod>() {
            Ok(method) => Some(method),
            Err(_) => {
                errors.insert(
                    "payment_method".to_string(),
                    json!("Not a supported payment method"),
                );
                None
            }
        },
    };

    match (client_id, merchant_id, amount, payment_method) {
        (Some(client_id), Some(merchant_id), Some(amount), Some(payment_method))
            if errors.is_empty() =>
        {
            Ok(PaymentRequest {
                client_id,
                merchant_id,
                amount,
                payment_method,
                description: body.description,
            })
        }
        _ => Err(error_response(
            "VALIDATION_ERROR",
            "Invalid payment submission",
            Some(Value::Object(errors)),
            StatusCode::BAD_REQUEST,
        )),
    }
}

/// POST /api/payments. Runs one orchestration end to end; on any credential
/// or gateway failure nothing is persisted and the error kind is preserved
/// in the response code.
pub async fn submit_payment(
    State(state): State<AppState>,
    Json(body): Json<PaymentSubmission>,
) -> Response {
    let request = match validate(body) {
        Ok(request) => request,
        Err(response) => return response,
    };

    match state.orchestrator.process_payment(request).await {
        Ok(outcome) => created(PaymentCreatedResponse {
            transaction_id: outcome.transaction.id,
            reference: outcome.transaction.reference_number.clone(),
            message: "Payment created successfully".to_string(),
            status: outcome.status,
            transaction_ref: outcome.gateway_ref,
        })
        .into_response(),
        Err(e) => e.into_response(),
    }
}

/// GET /api/payments/{id}
pub async fn get_payment(State(state): State<AppState>, Path(id): Path<Uuid>) -> Response {
    match state.store.get_transaction(id).await {
        Ok(Some(transaction)) => success(transaction, "Transaction retrieved").into_response(),
        Ok(None) => {
            AppError::NotFound(format!("Transaction '{}' was not found", id)).into_response()
        }
        Err(e) => e.into_response(),
    }
}

/// DELETE /api/payments/{id}. Administrative delete; cascades to the
/// transaction's ledger entry and recomputes later balances.
pub async fn delete_payment(State(state): State<AppState>, Path(id): Path<Uuid>) -> Response {
    match state.store.delete_transaction(id).await {
        Ok(true) => empty_success("Transaction deleted").into_response(),
        Ok(false) => {
            AppError::NotFound(format!("Transaction '{}' was not found", id)).into_response()
        }
        Err(e) => e.into_response(),
    }
}

/// GET /api/ledger. Lists entries in creation order.
pub async fn list_ledger(State(state): State<AppState>) -> Response {
    match state.store.list_ledger_entries().await {
        Ok(entries) => success(entries, "Ledger entries retrieved").into_response(),
        Err(e) => e.into_response(),
    }
}
