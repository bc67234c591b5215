use rust_decimal::Decimal;

use crate::models::{NewLedgerEntry, Transaction, TransactionStatus};

/// Projects a terminal transaction status onto its single ledger entry:
/// a completed payment debits the full amount, a failed one records a
/// zero-charge reversal credit. Pending transactions have no entry.
pub fn entry_for(transaction: &Transaction) -> Option<NewLedgerEntry> {
    let (debit, credit, description) = match transaction.status {
        TransactionStatus::Completed => (
            transaction.amount,
            Decimal::ZERO,
            format!("Payment {} completed", transaction.reference_number),
        ),
        TransactionStatus::Failed => (
            Decimal::ZERO,
            transaction.amount,
            format!("Payment {} failed", transaction.reference_number),
        ),
        TransactionStatus::Pending => return None,
    };

    Some(NewLedgerEntry::for_transaction(
        transaction.id,
        description,
        debit,
        credit,
    ))
}
