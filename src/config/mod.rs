use std::env;
use std::net::SocketAddr;
use std::time::Duration;

use thiserror::Error;

pub mod cors;

pub use cors::create_cors_layer;

const DEFAULT_MOMO_BASE_URL: &str = "https://sandbox.momodeveloper.mtn.com";

#[derive(Debug, Error)]
pub enum ConfigError {
    /// Secrets have no fallback values; startup fails instead.
    #[error("missing required environment variable {0}")]
    Missing(&'static str),

    #[error("invalid value for {0}: {1}")]
    Invalid(&'static str, String),
}

/// Gateway connection settings, consumed by the MoMo client.
#[derive(Debug, Clone)]
pub struct MomoConfig {
    pub base_url: String,
    /// Subscription key for the user-provisioning product area.
    pub subscription_key: String,
    /// Subscription key for the collection product area.
    pub collection_subscription_key: String,
    pub target_environment: String,
    pub callback_host: String,
    /// Per-call timeout on outbound gateway requests.
    pub request_timeout: Duration,
}

/// Knobs of one orchestration run.
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    pub currency: String,
    /// Payer MSISDN debited by request-to-pay.
    pub payer_party_id: String,
    /// Bounded status polling; 1 restores single-shot semantics.
    pub poll_attempts: u32,
    pub poll_delay: Duration,
    /// End-to-end deadline for one run.
    pub deadline: Duration,
}

#[derive(Debug)]
pub struct Config {
    pub database_url: String,
    pub bind_addr: SocketAddr,
    pub momo: MomoConfig,
    pub orchestrator: OrchestratorConfig,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        let bind_addr = optional("BIND_ADDR", "0.0.0.0:3001")
            .parse::<SocketAddr>()
            .map_err(|e| ConfigError::Invalid("BIND_ADDR", e.to_string()))?;

        Ok(Self {
            database_url: required("DATABASE_URL")?,
            bind_addr,
            momo: MomoConfig {
                base_url: optional("MOMO_BASE_URL", DEFAULT_MOMO_BASE_URL),
                subscription_key: required("MOMO_SUBSCRIPTION_KEY")?,
                collection_subscription_key: required("MOMO_COLLECTION_SUBSCRIPTION_KEY")?,
                target_environment: optional("MOMO_TARGET_ENVIRONMENT", "sandbox"),
                callback_host: optional("MOMO_CALLBACK_HOST", "scanpay.local"),
                request_timeout: Duration::from_millis(parsed(
                    "MOMO_REQUEST_TIMEOUT_MS",
                    30_000,
                )?),
            },
            orchestrator: OrchestratorConfig {
                currency: optional("MOMO_CURRENCY", "EUR"),
                payer_party_id: required("MOMO_PAYER_PARTY_ID")?,
                poll_attempts: parsed("MOMO_STATUS_POLL_ATTEMPTS", 3)?,
                poll_delay: Duration::from_millis(parsed("MOMO_STATUS_POLL_DELAY_MS", 2_000)?),
                deadline: Duration::from_millis(parsed("ORCHESTRATION_DEADLINE_MS", 90_000)?),
            },
        })
    }
}

fn required(name: &'static str) -> Result<String, ConfigError> {
    env::var(name).map_err(|_| ConfigError::Missing(name))
}

fn optional(name: &'static str, default: &str) -> String {
    env::var(name).unwrap_or_else(|_| default.to_string())
}

fn parsed<T: std::str::FromStr>(name: &'static str, default: T) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    match env::var(name) {
        Ok(raw) => raw
            .parse::<T>()
            .map_err(|e| ConfigError::Invalid(name, e.to_string())),
        Err(_) => Ok(default),
    }
}
