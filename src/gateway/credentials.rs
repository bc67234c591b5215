use std::sync::Arc;
use tokio::sync::Mutex;

use crate::gateway::{AccessToken, ApiCredentials, CollectionGateway};
use crate::utils::error::AppError;

/// Refresh the token this many seconds before its reported expiry.
const TOKEN_EXPIRY_SKEW_SECS: i64 = 60;

#[derive(Default)]
struct CredentialState {
    credentials: Option<ApiCredentials>,
    token: Option<AccessToken>,
}

/// Process-wide credential cache. A gateway API user is provisioned once,
/// lazily on the first call, and reused for the life of the process; the
/// derived bearer token is refreshed when it nears expiry or after the
/// gateway rejects it. Holding the mutex across the outbound calls gives
/// single-flight behavior under concurrent misses.
pub struct CredentialProvider {
    gateway: Arc<dyn CollectionGateway>,
    state: Mutex<CredentialState>,
}

impl CredentialProvider {
    pub fn new(gateway: Arc<dyn CollectionGateway>) -> Self {
        Self {
            gateway,
            state: Mutex::new(CredentialState::default()),
        }
    }

    /// Acquires the `(api_user_id, api_key)` pair, provisioning it on first
    /// use. No retry here; retries are the orchestrator's call.
    pub async fn acquire(&self) -> Result<ApiCredentials, AppError> {
        let mut state = self.state.lock().await;
        self.ensure_credentials(&mut state).await
    }

    /// Returns a valid bearer token, refreshing the cached one if needed.
    pub async fn bearer_token(&self) -> Result<String, AppError> {
        let mut state = self.state.lock().await;

        let token = match &state.token {
            Some(token) if !token.is_expired(TOKEN_EXPIRY_SKEW_SECS) => token.token.clone(),
            _ => {
                let credentials = self.ensure_credentials(&mut state).await?;
                let fresh = self.gateway.create_access_token(&credentials).await?;
                tracing::debug!(expires_at = %fresh.expires_at, "Refreshed gateway access token");
                let value = fresh.token.clone();
                state.token = Some(fresh);
                value
            }
        };

        Ok(token)
    }

    /// Drops the cached token so the next call refreshes it. Called when the
    /// gateway rejects a token the cache still considered valid.
    pub async fn invalidate_token(&self) {
        let mut state = self.state.lock().await;
        state.token = None;
    }

    async fn ensure_credentials(
        &self,
        state: &mut CredentialState,
    ) -> Result<ApiCredentials, AppError> {
        if let Some(credentials) = &state.credentials {
            return Ok(credentials.clone());
        }

        let api_user_id = self.gateway.provision_api_user().await?;
        let api_key = self.gateway.create_api_key(api_user_id).await?;

        let credentials = ApiCredentials {
            api_user_id,
            api_key,
        };
        state.credentials = Some(credentials.clone());
        Ok(credentials)
    }
}
