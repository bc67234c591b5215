use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::models::{LedgerEntry, NewLedgerEntry, Transaction};
use crate::store::PaymentStore;
use crate::utils::error::AppError;

#[derive(Default)]
struct State {
    transactions: HashMap<Uuid, Transaction>,
    ledger: Vec<LedgerEntry>,
    next_seq: i64,
}

impl State {
    fn append_entry(&mut self, entry: NewLedgerEntry) -> LedgerEntry {
        self.next_seq += 1;
        let balance = self.ledger.last().map(|e| e.balance).unwrap_or(Decimal::ZERO)
            + entry.delta();
        let entry = LedgerEntry {
            id: Uuid::new_v4(),
            seq: self.next_seq,
            transaction_id: entry.transaction_id,
            invoice_id: entry.invoice_id,
            entry_date: Utc::now(),
            description: entry.description,
            debit: entry.debit,
            credit: entry.credit,
            balance,
        };
        self.ledger.push(entry.clone());
        entry
    }

    /// Re-derives every running balance in seq order.
    fn recompute_balances(&mut self) {
        let mut balance = Decimal::ZERO;
        for entry in &mut self.ledger {
            balance += entry.debit - entry.credit;
            entry.balance = balance;
        }
    }
}

/// Mutex-guarded in-memory adapter. Holding one lock for the whole mutation
/// gives both the settlement atomicity and the ledger append serialization
/// the port requires. Used by the test suites.
#[derive(Default, Clone)]
pub struct InMemoryPaymentStore {
    state: Arc<Mutex<State>>,
}

impl InMemoryPaymentStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PaymentStore for InMemoryPaymentStore {
    async fn record_pending(&self, transaction: &Transaction) -> Result<(), AppError> {
        let mut state = self.state.lock().await;
        state
            .transactions
            .insert(transaction.id, transaction.clone());
        Ok(())
    }

    async fn record_settlement(
        &self,
        transaction: &Transaction,
        entry: NewLedgerEntry,
    ) -> Result<LedgerEntry, AppError> {
        let mut state = self.state.lock().await;
        state
            .transactions
            .insert(transaction.id, transaction.clone());

        if let Some(pos) = state
            .ledger
            .iter()
            .position(|e| e.transaction_id == Some(transaction.id))
        {
            let existing = &mut state.ledger[pos];
            existing.debit = entry.debit;
            existing.credit = entry.credit;
            existing.description = entry.description;
            state.recompute_balances();
            return Ok(state.ledger[pos].clone());
        }

        Ok(state.append_entry(entry))
    }

    async fn get_transaction(&self, id: Uuid) -> Result<Option<Transaction>, AppError> {
        let state = self.state.lock().await;
        Ok(state.transactions.get(&id).cloned())
    }

    async fn list_transactions(&self) -> Result<Vec<Transaction>, AppError> {
        let state = self.state.lock().await;
        let mut transactions: Vec<_> = state.transactions.values().cloned().collect();
        transactions.sort_by_key(|t| t.created_at);
        Ok(transactions)
    }

    async fn delete_transaction(&self, id: Uuid) -> Result<bool, AppError> {
        let mut state = self.state.lock().await;
        if state.transactions.remove(&id).is_none() {
            return Ok(false);
        }
        state.ledger.retain(|e| e.transaction_id != Some(id));
        state.recompute_balances();
        Ok(true)
    }

    async fn list_ledger_entries(&self) -> Result<Vec<LedgerEntry>, AppError> {
        let state = self.state.lock().await;
        Ok(state.ledger.clone())
    }
}
