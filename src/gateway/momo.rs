use base64::Engine;
use chrono::Utc;
use reqwest::{Client, StatusCode};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::MomoConfig;
use crate::gateway::{AccessToken, ApiCredentials, CollectionGateway, GatewayStatus, PollOutcome, RequestToPay};
use crate::utils::error::AppError;

const REFERENCE_ID_HEADER: &str = "X-Reference-Id";
const TARGET_ENVIRONMENT_HEADER: &str = "X-Target-Environment";
const SUBSCRIPTION_KEY_HEADER: &str = "Ocp-Apim-Subscription-Key";

/// Client for the MTN MoMo collection API. All operations are outbound
/// network calls; idempotency rests entirely on the generated reference ids.
pub struct MomoClient {
    http: Client,
    config: MomoConfig,
}

#[derive(Serialize)]
struct ProvisionBody<'a> {
    #[serde(rename = "providerCallbackHost")]
    provider_callback_host: &'a str,
}

#[derive(Deserialize)]
struct ApiKeyBody {
    #[serde(rename = "apiKey")]
    api_key: Option<String>,
}

#[derive(Serialize)]
struct TokenRequestBody<'a> {
    grant_type: &'a str,
}

#[derive(Deserialize)]
struct TokenBody {
    access_token: String,
    #[serde(default = "default_token_ttl")]
    expires_in: i64,
}

fn default_token_ttl() -> i64 {
    3600
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Payer<'a> {
    party_id_type: &'a str,
    party_id: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RequestToPayBody<'a> {
    amount: Decimal,
    currency: &'a str,
    external_id: &'a str,
    payer: Payer<'a>,
    payer_message: &'a str,
    payee_note: &'a str,
}

/// requesttopay/{ref} returns either `{amount, status}` or, when the
/// provider rejected the payment, `{reason, message}`.
#[derive(Deserialize)]
struct StatusBody {
    status: Option<String>,
    reason: Option<String>,
    message: Option<String>,
}

impl MomoClient {
    pub fn new(config: MomoConfig) -> Result<Self, AppError> {
        let http = Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| AppError::InternalServerError(format!("http client: {}", e)))?;
        Ok(Self { http, config })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url, path)
    }

    fn basic_auth(credentials: &ApiCredentials) -> String {
        let raw = format!("{}:{}", credentials.api_user_id, credentials.api_key);
        format!(
            "Basic {}",
            base64::engine::general_purpose::STANDARD.encode(raw)
        )
    }
}

#[async_trait::async_trait]
impl CollectionGateway for MomoClient {
    async fn provision_api_user(&self) -> Result<Uuid, AppError> {
        let reference_id = Uuid::new_v4();

        let response = self
            .http
            .post(self.url("/v1_0/apiuser"))
            .header(REFERENCE_ID_HEADER, reference_id.to_string())
            .header(SUBSCRIPTION_KEY_HEADER, &self.config.subscription_key)
            .json(&ProvisionBody {
                provider_callback_host: &self.config.callback_host,
            })
            .send()
            .await
            .map_err(|e| AppError::CredentialError(format!("API user provisioning: {}", e)))?;

        if !response.status().is_success() {
            return Err(AppError::CredentialError(format!(
                "API user provisioning returned {}",
                response.status()
            )));
        }

        // The empty-body success means the reference id we generated is now
        // the provider-side user id.
        tracing::info!(api_user = %reference_id, "Provisioned gateway API user");
        Ok(reference_id)
    }

    async fn create_api_key(&self, api_user_id: Uuid) -> Result<String, AppError> {
        let response = self
            .http
            .post(self.url(&format!("/v1_0/apiuser/{}/apikey", api_user_id)))
            .header(SUBSCRIPTION_KEY_HEADER, &self.config.subscription_key)
            .json(&ProvisionBody {
                provider_callback_host: &self.config.callback_host,
            })
            .send()
            .await
            .map_err(|e| AppError::CredentialError(format!("API key issuance: {}", e)))?;

        if !response.status().is_success() {
            return Err(AppError::CredentialError(format!(
                "API key issuance returned {}",
                response.status()
            )));
        }

        let body: ApiKeyBody = response
            .json()
            .await
            .map_err(|e| AppError::CredentialError(format!("API key response body: {}", e)))?;

        body.api_key
            .ok_or_else(|| AppError::CredentialError("API key missing from response".to_string()))
    }

    async fn create_access_token(
        &self,
        credentials: &ApiCredentials,
    ) -> Result<AccessToken, AppError> {
        let response = self
            .http
            .post(self.url("/collection/token/"))
            .header("Authorization", Self::basic_auth(credentials))
            .header(
                SUBSCRIPTION_KEY_HEADER,
                &self.config.collection_subscription_key,
            )
            .json(&TokenRequestBody {
                grant_type: "client_credentials",
            })
            .send()
            .await
            .map_err(|e| AppError::AccessTokenError(format!("token request: {}", e)))?;

        if !response.status().is_success() {
            return Err(AppError::AccessTokenError(format!(
                "token request returned {}",
                response.status()
            )));
        }

        let body: TokenBody = response
            .json()
            .await
            .map_err(|e| AppError::AccessTokenError(format!("token response body: {}", e)))?;

        Ok(AccessToken {
            token: body.access_token,
            expires_at: Utc::now() + chrono::Duration::seconds(body.expires_in),
        })
    }

    async fn request_to_pay(
        &self,
        token: &str,
        request: &RequestToPay,
    ) -> Result<Uuid, AppError> {
        let reference_id = Uuid::new_v4();

        let response = self
            .http
            .post(self.url("/collection/v1_0/requesttopay"))
            .header("Authorization", format!("Bearer {}", token))
            .header(REFERENCE_ID_HEADER, reference_id.to_string())
            .header(TARGET_ENVIRONMENT_HEADER, &self.config.target_environment)
            .header(
                SUBSCRIPTION_KEY_HEADER,
                &self.config.collection_subscription_key,
            )
            .json(&RequestToPayBody {
                amount: request.amount,
                currency: &request.currency,
                external_id: &request.external_id,
                payer: Payer {
                    party_id_type: "MSISDN",
                    party_id: &request.party_id,
                },
                payer_message: "ScanPay payment",
                payee_note: "ScanPay collection",
            })
            .send()
            .await
            .map_err(|e| AppError::GatewayRequestError(format!("request-to-pay: {}", e)))?;

        let status = response.status();
        if status.is_success() {
            tracing::info!(reference = %reference_id, "Payment initiated");
            Ok(reference_id)
        } else if status == StatusCode::UNAUTHORIZED {
            Err(AppError::AccessTokenError(
                "gateway rejected the access token".to_string(),
            ))
        } else {
            Err(AppError::GatewayRequestError(format!(
                "request-to-pay returned {}",
                status
            )))
        }
    }

    async fn request_to_pay_status(
        &self,
        token: &str,
        reference: Uuid,
    ) -> Result<PollOutcome, AppError> {
        let response = self
            .http
            .get(self.url(&format!("/collection/v1_0/requesttopay/{}", reference)))
            .header("Authorization", format!("Bearer {}", token))
            .header(TARGET_ENVIRONMENT_HEADER, &self.config.target_environment)
            .header(
                SUBSCRIPTION_KEY_HEADER,
                &self.config.collection_subscription_key,
            )
            .send()
            .await
            .map_err(|e| AppError::GatewayRequestError(format!("status check: {}", e)))?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED {
            return Err(AppError::AccessTokenError(
                "gateway rejected the access token".to_string(),
            ));
        }
        if !status.is_success() {
            return Err(AppError::GatewayRequestError(format!(
                "status check returned {}",
                status
            )));
        }

        let body: StatusBody = response
            .json()
            .await
            .map_err(|e| AppError::GatewayRequestError(format!("status response body: {}", e)))?;

        if let Some(status) = body.status {
            let status = status
                .parse::<GatewayStatus>()
                .map_err(AppError::GatewayRequestError)?;
            return Ok(PollOutcome::Status(status));
        }

        if let Some(reason) = body.reason {
            return Ok(PollOutcome::Rejected {
                reason,
                message: body.message.unwrap_or_default(),
            });
        }

        Err(AppError::GatewayRequestError(
            "status response carried neither status nor reason".to_string(),
        ))
    }
}
