use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::Value;
use thiserror::Error;
use tracing::error;

use crate::utils::response::error as error_response;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Resource not found: {0}")]
    NotFound(String),

    /// Credential provisioning or key issuance against the gateway failed,
    /// or the gateway returned an incomplete body.
    #[error("Credential error: {0}")]
    CredentialError(String),

    /// Obtaining a bearer token failed. Always fatal to the current
    /// orchestration attempt.
    #[error("Access token error: {0}")]
    AccessTokenError(String),

    /// Non-success HTTP status or transport failure on an outbound gateway
    /// call. A provider-supplied failure *reason* is not this error; it is a
    /// successful call whose result is a failed payment.
    #[error("Gateway request error: {0}")]
    GatewayRequestError(String),

    /// Reserved for ledger invariant violations; not raised by the
    /// collection flow.
    #[error("Insufficient balance: {0}")]
    InsufficientBalance(String),

    #[error("Orchestration deadline exceeded")]
    DeadlineExceeded,

    #[error("Database error")]
    DatabaseError(#[from] sqlx::Error),

    #[error("Internal server error")]
    InternalServerError(String),
}

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::ValidationError(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::CredentialError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::AccessTokenError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::GatewayRequestError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::InsufficientBalance(_) => StatusCode::CONFLICT,
            AppError::DeadlineExceeded => StatusCode::GATEWAY_TIMEOUT,
            AppError::DatabaseError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::InternalServerError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            AppError::ValidationError(_) => "VALIDATION_ERROR",
            AppError::NotFound(_) => "NOT_FOUND",
            AppError::CredentialError(_) => "CREDENTIAL_ERROR",
            AppError::AccessTokenError(_) => "ACCESS_TOKEN_ERROR",
            AppError::GatewayRequestError(_) => "GATEWAY_REQUEST_ERROR",
            AppError::InsufficientBalance(_) => "INSUFFICIENT_BALANCE",
            AppError::DeadlineExceeded => "DEADLINE_EXCEEDED",
            AppError::DatabaseError(_) => "DATABASE_ERROR",
            AppError::InternalServerError(_) => "INTERNAL_SERVER_ERROR",
        }
    }

    fn log(&self) {
        match self {
            AppError::ValidationError(msg)
            | AppError::NotFound(msg)
            | AppError::CredentialError(msg)
            | AppError::AccessTokenError(msg)
            | AppError::GatewayRequestError(msg)
            | AppError::InsufficientBalance(msg)
            | AppError::InternalServerError(msg) => {
                error!(error = ?self, message = %msg, "Application error");
            }
            AppError::DeadlineExceeded => {
                error!(error = ?self, "Orchestration deadline exceeded");
            }
            AppError::DatabaseError(e) => {
                error!(error = ?e, "Database error");
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let code = self.code();

        // Log internal details
        self.log();

        // Only expose high-level message to the client
        let public_message = match &self {
            AppError::ValidationError(msg)
            | AppError::NotFound(msg)
            | AppError::CredentialError(msg)
            | AppError::AccessTokenError(msg)
            | AppError::GatewayRequestError(msg)
            | AppError::InsufficientBalance(msg)
            | AppError::InternalServerError(msg) => msg.clone(),
            AppError::DeadlineExceeded => "The payment attempt timed out".to_string(),
            AppError::DatabaseError(_) => "A database error occurred".to_string(),
        };

        let details: Option<Value> = None;

        error_response(code, public_message, details, status)
    }
}
