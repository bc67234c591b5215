use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Payment rails accepted at submission time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentMethod {
    MtnMoney,
    AirtelMoney,
    ZamtelKwacha,
    CreditCard,
}

impl PaymentMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::MtnMoney => "MTN_MONEY",
            PaymentMethod::AirtelMoney => "AIRTEL_MONEY",
            PaymentMethod::ZamtelKwacha => "ZAMTEL_KWACHA",
            PaymentMethod::CreditCard => "CREDIT_CARD",
        }
    }
}

impl Default for PaymentMethod {
    fn default() -> Self {
        PaymentMethod::AirtelMoney
    }
}

impl FromStr for PaymentMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "MTN_MONEY" => Ok(PaymentMethod::MtnMoney),
            "AIRTEL_MONEY" => Ok(PaymentMethod::AirtelMoney),
            "ZAMTEL_KWACHA" => Ok(PaymentMethod::ZamtelKwacha),
            "CREDIT_CARD" => Ok(PaymentMethod::CreditCard),
            other => Err(format!("unknown payment method '{}'", other)),
        }
    }
}

impl fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle of a transaction. `Pending` is the only non-terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionStatus {
    Pending,
    Completed,
    Failed,
}

impl TransactionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionStatus::Pending => "PENDING",
            TransactionStatus::Completed => "COMPLETED",
            TransactionStatus::Failed => "FAILED",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TransactionStatus::Completed | TransactionStatus::Failed
        )
    }

    /// Transitions are only allowed out of `Pending`.
    pub fn can_transition_to(&self, next: TransactionStatus) -> bool {
        *self == TransactionStatus::Pending && next.is_terminal()
    }
}

impl FromStr for TransactionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(TransactionStatus::Pending),
            "COMPLETED" => Ok(TransactionStatus::Completed),
            "FAILED" => Ok(TransactionStatus::Failed),
            other => Err(format!("unknown transaction status '{}'", other)),
        }
    }
}

impl fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transaction {
    pub id: Uuid,
    pub client_id: Uuid,
    pub merchant_id: Uuid,
    pub amount: Decimal,
    pub currency: String,
    pub payment_method: PaymentMethod,
    pub status: TransactionStatus,
    /// Our own externally visible identifier, distinct from the gateway's.
    pub reference_number: String,
    /// Provider-side reference of the request-to-pay call, kept for audit.
    pub gateway_ref: Option<Uuid>,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Transaction {
    pub fn new(
        client_id: Uuid,
        merchant_id: Uuid,
        amount: Decimal,
        currency: String,
        payment_method: PaymentMethod,
        description: Option<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            client_id,
            merchant_id,
            amount,
            currency,
            payment_method,
            status: TransactionStatus::Pending,
            reference_number: generate_reference_number(),
            gateway_ref: None,
            description,
            created_at: Utc::now(),
        }
    }

    /// Moves the transaction into a terminal state. Fails if the transition
    /// is not allowed from the current state.
    pub fn settle(&mut self, status: TransactionStatus) -> Result<(), String> {
        if !self.status.can_transition_to(status) {
            return Err(format!("invalid transition {} -> {}", self.status, status));
        }
        self.status = status;
        Ok(())
    }
}

/// Generates the unique, immutable reference number assigned at creation.
pub fn generate_reference_number() -> String {
    format!("TX-{}", Uuid::new_v4().simple())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use std::collections::HashSet;

    fn sample() -> Transaction {
        Transaction::new(
            Uuid::new_v4(),
            Uuid::new_v4(),
            dec!(50.00),
            "EUR".to_string(),
            PaymentMethod::MtnMoney,
            None,
        )
    }

    #[test]
    fn new_transaction_starts_pending() {
        let tx = sample();
        assert_eq!(tx.status, TransactionStatus::Pending);
        assert!(tx.gateway_ref.is_none());
    }

    #[test]
    fn pending_transitions_to_terminal_states_only() {
        assert!(TransactionStatus::Pending.can_transition_to(TransactionStatus::Completed));
        assert!(TransactionStatus::Pending.can_transition_to(TransactionStatus::Failed));
        assert!(!TransactionStatus::Pending.can_transition_to(TransactionStatus::Pending));
        assert!(!TransactionStatus::Completed.can_transition_to(TransactionStatus::Failed));
        assert!(!TransactionStatus::Failed.can_transition_to(TransactionStatus::Completed));
    }

    #[test]
    fn settle_rejects_double_settlement() {
        let mut tx = sample();
        tx.settle(TransactionStatus::Completed).unwrap();
        assert!(tx.settle(TransactionStatus::Failed).is_err());
    }

    #[test]
    fn reference_numbers_do_not_collide() {
        let mut seen = HashSet::new();
        for _ in 0..10_000 {
            assert!(seen.insert(generate_reference_number()));
        }
    }

    #[test]
    fn payment_method_round_trips_through_str() {
        for method in [
            PaymentMethod::MtnMoney,
            PaymentMethod::AirtelMoney,
            PaymentMethod::ZamtelKwacha,
            PaymentMethod::CreditCard,
        ] {
            assert_eq!(method.as_str().parse::<PaymentMethod>().unwrap(), method);
        }
        assert!("VISA".parse::<PaymentMethod>().is_err());
    }

    #[test]
    fn payment_method_serde_uses_wire_names() {
        let json = serde_json::to_string(&PaymentMethod::MtnMoney).unwrap();
        assert_eq!(json, "\"MTN_MONEY\"");
    }
}
