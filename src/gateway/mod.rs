use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use uuid::Uuid;

use crate::utils::error::AppError;

pub mod credentials;
pub mod momo;

pub use credentials::CredentialProvider;
pub use momo::MomoClient;

/// A provisioned gateway API user and its issued key.
#[derive(Debug, Clone)]
pub struct ApiCredentials {
    pub api_user_id: Uuid,
    pub api_key: String,
}

/// A short-lived bearer token derived from [`ApiCredentials`].
#[derive(Debug, Clone)]
pub struct AccessToken {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

impl AccessToken {
    /// Whether the token should be refreshed, judged `skew_secs` before the
    /// provider-reported expiry.
    pub fn is_expired(&self, skew_secs: i64) -> bool {
        Utc::now() + chrono::Duration::seconds(skew_secs) >= self.expires_at
    }
}

/// Payment status as reported by the provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GatewayStatus {
    Pending,
    Successful,
    Failed,
}

impl FromStr for GatewayStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(GatewayStatus::Pending),
            "SUCCESSFUL" => Ok(GatewayStatus::Successful),
            "FAILED" => Ok(GatewayStatus::Failed),
            other => Err(format!("unknown gateway status '{}'", other)),
        }
    }
}

/// Result of one status poll. A provider-side rejection (a `reason` payload
/// in place of a status) is a successful call whose result is a failed
/// payment, not a transport error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome {
    Status(GatewayStatus),
    Rejected { reason: String, message: String },
}

/// Parameters of one request-to-pay call.
#[derive(Debug, Clone)]
pub struct RequestToPay {
    pub amount: Decimal,
    pub currency: String,
    /// Our reference number, echoed back by the provider as `externalId`.
    pub external_id: String,
    /// Payer MSISDN.
    pub party_id: String,
}

/// The three collection-product operations the orchestrator drives, plus the
/// two provisioning calls the credential provider needs. Every reference id
/// handed to the provider is generated fresh per call and must be treated as
/// single-use.
#[async_trait]
pub trait CollectionGateway: Send + Sync {
    /// Provisions a new API user. The generated reference id *is* the user id.
    async fn provision_api_user(&self) -> Result<Uuid, AppError>;

    /// Issues an API key for a provisioned user.
    async fn create_api_key(&self, api_user_id: Uuid) -> Result<String, AppError>;

    /// Exchanges credentials for a short-lived bearer token.
    async fn create_access_token(
        &self,
        credentials: &ApiCredentials,
    ) -> Result<AccessToken, AppError>;

    /// Initiates an asynchronous debit against the payer's account and
    /// returns the idempotency reference used.
    async fn request_to_pay(&self, token: &str, request: &RequestToPay)
        -> Result<Uuid, AppError>;

    /// A single status poll; the caller decides whether and when to poll
    /// again.
    async fn request_to_pay_status(
        &self,
        token: &str,
        reference: Uuid,
    ) -> Result<PollOutcome, AppError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gateway_status_parses_provider_strings() {
        assert_eq!(
            "SUCCESSFUL".parse::<GatewayStatus>().unwrap(),
            GatewayStatus::Successful
        );
        assert_eq!(
            "PENDING".parse::<GatewayStatus>().unwrap(),
            GatewayStatus::Pending
        );
        assert!("SETTLED".parse::<GatewayStatus>().is_err());
    }

    #[test]
    fn access_token_expiry_honours_skew() {
        let token = AccessToken {
            token: "t".into(),
            expires_at: Utc::now() + chrono::Duration::seconds(30),
        };
        assert!(!token.is_expired(0));
        assert!(token.is_expired(60));
    }
}
