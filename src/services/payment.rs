use rust_decimal::Decimal;
use std::sync::Arc;
use uuid::Uuid;

use crate::config::OrchestratorConfig;
use crate::gateway::{
    CollectionGateway, CredentialProvider, GatewayStatus, PollOutcome, RequestToPay,
};
use crate::models::{PaymentMethod, Transaction, TransactionStatus};
use crate::services::ledger;
use crate::store::PaymentStore;
use crate::utils::error::AppError;

/// A validated payment submission, ready to orchestrate.
#[derive(Debug, Clone)]
pub struct PaymentRequest {
    pub client_id: Uuid,
    pub merchant_id: Uuid,
    pub amount: Decimal,
    pub payment_method: PaymentMethod,
    pub description: Option<String>,
}

/// What one orchestration run hands back to the boundary layer.
#[derive(Debug, Clone)]
pub struct PaymentOutcome {
    pub transaction: Transaction,
    pub gateway_ref: Uuid,
    pub status: TransactionStatus,
}

enum PollVerdict {
    Final(TransactionStatus),
    StillPending,
}

/// Drives one transaction from creation to a settled state:
/// CREATED -> AUTHENTICATING -> INITIATING -> POLLING -> {SETTLED, FAILED}.
///
/// Local writes are all-or-nothing: the transaction row only becomes visible
/// once the gateway has answered. A rollback cannot un-send a request the
/// gateway already received, so duplicate initiation is prevented by the
/// single-use idempotency reference, not by the local transaction scope.
pub struct PaymentOrchestrator {
    gateway: Arc<dyn CollectionGateway>,
    credentials: Arc<CredentialProvider>,
    store: Arc<dyn PaymentStore>,
    config: OrchestratorConfig,
}

impl PaymentOrchestrator {
    pub fn new(
        gateway: Arc<dyn CollectionGateway>,
        credentials: Arc<CredentialProvider>,
        store: Arc<dyn PaymentStore>,
        config: OrchestratorConfig,
    ) -> Self {
        Self {
            gateway,
            credentials,
            store,
            config,
        }
    }

    /// Runs the whole sequence under an end-to-end deadline.
    pub async fn process_payment(&self, request: PaymentRequest) -> Result<PaymentOutcome, AppError> {
        tokio::time::timeout(self.config.deadline, self.run(request))
            .await
            .map_err(|_| AppError::DeadlineExceeded)?
    }

    async fn run(&self, request: PaymentRequest) -> Result<PaymentOutcome, AppError> {
        // CREATED: the transaction exists in memory only until the gateway
        // has answered.
        let mut transaction = Transaction::new(
            request.client_id,
            request.merchant_id,
            request.amount,
            self.config.currency.clone(),
            request.payment_method,
            request.description,
        );
        tracing::info!(
            reference = %transaction.reference_number,
            amount = %transaction.amount,
            method = %transaction.payment_method,
            "Payment accepted, starting orchestration"
        );

        // AUTHENTICATING
        let token = self.credentials.bearer_token().await?;

        // INITIATING
        let rtp = RequestToPay {
            amount: transaction.amount,
            currency: transaction.currency.clone(),
            external_id: transaction.reference_number.clone(),
            party_id: self.config.payer_party_id.clone(),
        };
        let gateway_ref = match self.gateway.request_to_pay(&token, &rtp).await {
            Ok(reference) => reference,
            Err(e @ AppError::AccessTokenError(_)) => {
                // The cached token outlived its provider-side validity.
                self.credentials.invalidate_token().await;
                return Err(e);
            }
            Err(e) => return Err(e),
        };
        transaction.gateway_ref = Some(gateway_ref);

        // POLLING
        let verdict = match self.poll_status(&token, gateway_ref).await {
            Ok(verdict) => verdict,
            Err(e @ AppError::AccessTokenError(_)) => {
                self.credentials.invalidate_token().await;
                return Err(e);
            }
            Err(e) => return Err(e),
        };

        match verdict {
            PollVerdict::Final(status) => {
                transaction
                    .settle(status)
                    .map_err(AppError::InternalServerError)?;
                let entry = ledger::entry_for(&transaction).ok_or_else(|| {
                    AppError::InternalServerError(
                        "settled transaction without ledger projection".to_string(),
                    )
                })?;
                self.store.record_settlement(&transaction, entry).await?;
                tracing::info!(
                    reference = %transaction.reference_number,
                    status = %status,
                    "Payment settled"
                );
            }
            PollVerdict::StillPending => {
                // The gateway answered, just not finally; keep the row so a
                // later reconciliation can finish the job.
                self.store.record_pending(&transaction).await?;
                tracing::info!(
                    reference = %transaction.reference_number,
                    "Gateway still reports PENDING after poll budget"
                );
            }
        }

        let status = transaction.status;
        Ok(PaymentOutcome {
            transaction,
            gateway_ref,
            status,
        })
    }

    /// Bounded polling with a fixed delay between attempts. One attempt
    /// restores the original single-shot semantics.
    async fn poll_status(&self, token: &str, reference: Uuid) -> Result<PollVerdict, AppError> {
        let attempts = self.config.poll_attempts.max(1);

        for attempt in 1..=attempts {
            if attempt > 1 {
                tokio::time::sleep(self.config.poll_delay).await;
            }

            match self.gateway.request_to_pay_status(token, reference).await? {
                PollOutcome::Status(GatewayStatus::Successful) => {
                    return Ok(PollVerdict::Final(TransactionStatus::Completed));
                }
                PollOutcome::Status(GatewayStatus::Failed) => {
                    return Ok(PollVerdict::Final(TransactionStatus::Failed));
                }
                PollOutcome::Rejected { reason, message } => {
                    tracing::warn!(%reason, %message, "Gateway rejected the payment");
                    return Ok(PollVerdict::Final(TransactionStatus::Failed));
                }
                PollOutcome::Status(GatewayStatus::Pending) => {
                    tracing::debug!(%reference, attempt, "Payment still pending at gateway");
                }
            }
        }

        Ok(PollVerdict::StillPending)
    }
}
