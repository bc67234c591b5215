use async_trait::async_trait;
use uuid::Uuid;

use crate::models::{LedgerEntry, NewLedgerEntry, Transaction};
use crate::utils::error::AppError;

pub mod memory;
pub mod postgres;

pub use memory::InMemoryPaymentStore;
pub use postgres::PostgresPaymentStore;

/// Storage port for the payment flow. Ledger appends depend on the previous
/// entry's balance, so implementations must serialize them; the settlement
/// write (transaction row + ledger entry) must be all-or-nothing.
#[async_trait]
pub trait PaymentStore: Send + Sync {
    /// Persists a transaction that is still pending at the gateway. No
    /// ledger entry is produced.
    async fn record_pending(&self, transaction: &Transaction) -> Result<(), AppError>;

    /// Atomically persists a settled transaction together with its ledger
    /// entry. If a ledger entry for this transaction already exists, its
    /// debit/credit are overwritten rather than a second entry appended.
    async fn record_settlement(
        &self,
        transaction: &Transaction,
        entry: NewLedgerEntry,
    ) -> Result<LedgerEntry, AppError>;

    async fn get_transaction(&self, id: Uuid) -> Result<Option<Transaction>, AppError>;

    async fn list_transactions(&self) -> Result<Vec<Transaction>, AppError>;

    /// Administrative delete; cascades to the transaction's ledger entry and
    /// recomputes the running balance of all later entries. Returns whether
    /// anything was deleted.
    async fn delete_transaction(&self, id: Uuid) -> Result<bool, AppError>;

    /// Ledger entries in creation order.
    async fn list_ledger_entries(&self) -> Result<Vec<LedgerEntry>, AppError>;
}
