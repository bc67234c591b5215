#![allow(dead_code)]

use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use uuid::Uuid;

use scanpay_server::config::OrchestratorConfig;
use scanpay_server::gateway::{
    AccessToken, ApiCredentials, CollectionGateway, CredentialProvider, GatewayStatus,
    PollOutcome, RequestToPay,
};
use scanpay_server::services::PaymentOrchestrator;
use scanpay_server::store::InMemoryPaymentStore;
use scanpay_server::utils::error::AppError;

/// Scriptable gateway double. Poll outcomes are consumed front to back; once
/// the script is exhausted `default_poll` repeats.
pub struct MockGateway {
    pub fail_token: bool,
    pub fail_initiate: bool,
    /// Status polls report the bearer token as rejected.
    pub reject_token_on_poll: bool,
    pub fixed_reference: Option<Uuid>,
    pub default_poll: PollOutcome,
    pub poll_script: Mutex<VecDeque<PollOutcome>>,
    pub issued_references: Mutex<Vec<Uuid>>,
    pub provision_calls: AtomicUsize,
    pub token_calls: AtomicUsize,
}

impl MockGateway {
    pub fn successful() -> Self {
        Self {
            fail_token: false,
            fail_initiate: false,
            reject_token_on_poll: false,
            fixed_reference: None,
            default_poll: PollOutcome::Status(GatewayStatus::Successful),
            poll_script: Mutex::new(VecDeque::new()),
            issued_references: Mutex::new(Vec::new()),
            provision_calls: AtomicUsize::new(0),
            token_calls: AtomicUsize::new(0),
        }
    }

    pub fn failing_token() -> Self {
        Self {
            fail_token: true,
            ..Self::successful()
        }
    }

    pub fn failing_initiate() -> Self {
        Self {
            fail_initiate: true,
            ..Self::successful()
        }
    }

    pub fn rejecting_token_on_poll() -> Self {
        Self {
            reject_token_on_poll: true,
            ..Self::successful()
        }
    }

    pub fn with_polls(outcomes: Vec<PollOutcome>, default_poll: PollOutcome) -> Self {
        Self {
            poll_script: Mutex::new(outcomes.into()),
            default_poll,
            ..Self::successful()
        }
    }

    pub fn with_reference(mut self, reference: Uuid) -> Self {
        self.fixed_reference = Some(reference);
        self
    }
}

#[async_trait]
impl CollectionGateway for MockGateway {
    async fn provision_api_user(&self) -> Result<Uuid, AppError> {
        self.provision_calls.fetch_add(1, Ordering::SeqCst);
        Ok(Uuid::new_v4())
    }

    async fn create_api_key(&self, _api_user_id: Uuid) -> Result<String, AppError> {
        Ok("mock-api-key".to_string())
    }

    async fn create_access_token(
        &self,
        _credentials: &ApiCredentials,
    ) -> Result<AccessToken, AppError> {
        self.token_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_token {
            return Err(AppError::AccessTokenError(
                "token request returned 401 Unauthorized".to_string(),
            ));
        }
        Ok(AccessToken {
            token: "mock-token".to_string(),
            expires_at: Utc::now() + chrono::Duration::hours(1),
        })
    }

    async fn request_to_pay(
        &self,
        _token: &str,
        _request: &RequestToPay,
    ) -> Result<Uuid, AppError> {
        if self.fail_initiate {
            return Err(AppError::GatewayRequestError(
                "request-to-pay returned 500 Internal Server Error".to_string(),
            ));
        }
        let reference = self.fixed_reference.unwrap_or_else(Uuid::new_v4);
        self.issued_references.lock().await.push(reference);
        Ok(reference)
    }

    async fn request_to_pay_status(
        &self,
        _token: &str,
        _reference: Uuid,
    ) -> Result<PollOutcome, AppError> {
        if self.reject_token_on_poll {
            return Err(AppError::AccessTokenError(
                "gateway rejected the access token".to_string(),
            ));
        }
        let mut script = self.poll_script.lock().await;
        Ok(script.pop_front().unwrap_or_else(|| self.default_poll.clone()))
    }
}

pub fn test_config() -> OrchestratorConfig {
    OrchestratorConfig {
        currency: "EUR".to_string(),
        payer_party_id: "46733123453".to_string(),
        poll_attempts: 3,
        poll_delay: Duration::from_millis(0),
        deadline: Duration::from_secs(5),
    }
}

pub fn orchestrator_with(
    gateway: Arc<MockGateway>,
    store: Arc<InMemoryPaymentStore>,
    config: OrchestratorConfig,
) -> PaymentOrchestrator {
    let credentials = Arc::new(CredentialProvider::new(
        gateway.clone() as Arc<dyn CollectionGateway>,
    ));
    PaymentOrchestrator::new(gateway, credentials, store, config)
}

pub fn amount(raw: &str) -> Decimal {
    raw.parse().unwrap()
}
