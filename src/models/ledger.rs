use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// One accounting row. Entries form an append-only log in `seq` order;
/// `balance` is the running total `previous balance + debit - credit`.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct LedgerEntry {
    pub id: Uuid,
    pub seq: i64,
    pub transaction_id: Option<Uuid>,
    pub invoice_id: Option<Uuid>,
    pub entry_date: DateTime<Utc>,
    pub description: String,
    pub debit: Decimal,
    pub credit: Decimal,
    pub balance: Decimal,
}

/// A ledger entry before it has been assigned a sequence number and balance.
/// Links to exactly one transaction or one invoice, never both.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewLedgerEntry {
    pub transaction_id: Option<Uuid>,
    pub invoice_id: Option<Uuid>,
    pub description: String,
    pub debit: Decimal,
    pub credit: Decimal,
}

impl NewLedgerEntry {
    pub fn for_transaction(
        transaction_id: Uuid,
        description: String,
        debit: Decimal,
        credit: Decimal,
    ) -> Self {
        Self {
            transaction_id: Some(transaction_id),
            invoice_id: None,
            description,
            debit,
            credit,
        }
    }

    /// Net effect of this entry on the running balance.
    pub fn delta(&self) -> Decimal {
        self.debit - self.credit
    }
}
